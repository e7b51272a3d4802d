//! Position state machine.
//!
//! Turns signals into open/close requests against an `Exchange` and tracks
//! which side, if any, the strategy instance currently holds.
//!
//! | state        | Long        | Short        | Hold  |
//! |--------------|-------------|--------------|-------|
//! | ToOrder      | open long   | open short   | -     |
//! | OrderedLong  | -           | close long   | -     |
//! | OrderedShort | close short | -            | -     |

use std::fmt;
use std::sync::Arc;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use trading_core::error::{ExchangeError, StrategyError};
use trading_core::traits::Exchange;
use trading_core::types::{
    HoldSide, Instrument, MarginMode, OrderRequest, PositionState, Side, Signal, TimeInForce,
};

/// What to do when the exchange rejects a submitted order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmationPolicy {
    /// Keep the transition as if the order went through.
    #[default]
    Optimistic,
    /// Re-query the position and adopt the exchange's view.
    Reconcile,
}

/// Sizing and submission parameters for opening orders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderSettings {
    /// Below this available balance no position is opened
    pub min_balance: Decimal,
    /// Share of the available balance committed as margin
    pub balance_fraction: Decimal,
    pub leverage: Decimal,
    pub margin_mode: MarginMode,
    pub time_in_force: TimeInForce,
    pub confirmation: ConfirmationPolicy,
    /// Attach a random client order id to every opening order
    pub tag_client_order_id: bool,
}

impl Default for OrderSettings {
    fn default() -> Self {
        Self {
            min_balance: dec!(10),
            balance_fraction: dec!(0.25),
            leverage: dec!(20),
            margin_mode: MarginMode::Crossed,
            time_in_force: TimeInForce::Gtc,
            confirmation: ConfirmationPolicy::Optimistic,
            tag_client_order_id: true,
        }
    }
}

impl OrderSettings {
    pub fn validate(&self) -> Result<(), StrategyError> {
        if self.min_balance < Decimal::ZERO {
            return Err(StrategyError::InvalidConfig(
                "min_balance must not be negative".into(),
            ));
        }
        if self.balance_fraction <= Decimal::ZERO || self.balance_fraction > Decimal::ONE {
            return Err(StrategyError::InvalidConfig(
                "balance_fraction must be in (0, 1]".into(),
            ));
        }
        if self.leverage <= Decimal::ZERO {
            return Err(StrategyError::InvalidConfig(
                "leverage must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

/// An order intent produced by a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    OpenLong,
    OpenShort,
    CloseLong,
    CloseShort,
}

impl Action {
    /// State the machine moves to once the action is submitted.
    pub fn target(&self) -> PositionState {
        match self {
            Action::OpenLong => PositionState::OrderedLong,
            Action::OpenShort => PositionState::OrderedShort,
            Action::CloseLong | Action::CloseShort => PositionState::ToOrder,
        }
    }

    pub fn hold_side(&self) -> HoldSide {
        match self {
            Action::OpenLong | Action::CloseLong => HoldSide::Long,
            Action::OpenShort | Action::CloseShort => HoldSide::Short,
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, Action::OpenLong | Action::OpenShort)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::OpenLong => write!(f, "open_long"),
            Action::OpenShort => write!(f, "open_short"),
            Action::CloseLong => write!(f, "close_long"),
            Action::CloseShort => write!(f, "close_short"),
        }
    }
}

/// The transition table.
pub fn transition(state: PositionState, signal: Signal) -> Option<Action> {
    match (state, signal) {
        (PositionState::ToOrder, Signal::Long) => Some(Action::OpenLong),
        (PositionState::ToOrder, Signal::Short) => Some(Action::OpenShort),
        (PositionState::OrderedLong, Signal::Short) => Some(Action::CloseLong),
        (PositionState::OrderedShort, Signal::Long) => Some(Action::CloseShort),
        _ => None,
    }
}

/// Why an action was abandoned before anything was submitted.
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    InsufficientBalance { available: Decimal, required: Decimal },
    ZeroSize,
    QueryFailed(String),
}

/// Result of feeding one signal to the machine.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The table has no action for (state, signal).
    NoOp,
    /// A request went out; `accepted` is false when the exchange refused it.
    Submitted { action: Action, accepted: bool },
    /// Nothing was submitted and the state is unchanged.
    Skipped { action: Action, reason: SkipReason },
}

/// Owns the position state of one (symbol, productType, marginCoin) instance.
pub struct PositionStateMachine {
    exchange: Arc<dyn Exchange>,
    instrument: Instrument,
    settings: OrderSettings,
    state: PositionState,
}

impl PositionStateMachine {
    /// Build the machine with its state taken from the exchange's current position.
    pub async fn initialize(
        exchange: Arc<dyn Exchange>,
        instrument: Instrument,
        settings: OrderSettings,
    ) -> Result<Self, ExchangeError> {
        let position = exchange.get_current_position(&instrument).await?;
        let state = PositionState::from_position(position.as_ref());
        info!(
            instrument = %instrument,
            exchange = exchange.name(),
            state = %state,
            "Position state initialized"
        );
        Ok(Self::with_state(exchange, instrument, settings, state))
    }

    /// Build the machine in a known state without querying the exchange.
    pub fn with_state(
        exchange: Arc<dyn Exchange>,
        instrument: Instrument,
        settings: OrderSettings,
        state: PositionState,
    ) -> Self {
        Self {
            exchange,
            instrument,
            settings,
            state,
        }
    }

    pub fn state(&self) -> PositionState {
        self.state
    }

    pub fn instrument(&self) -> &Instrument {
        &self.instrument
    }

    pub fn settings(&self) -> &OrderSettings {
        &self.settings
    }

    /// Apply one signal.
    pub async fn on_signal(&mut self, signal: Signal) -> Outcome {
        let Some(action) = transition(self.state, signal) else {
            return Outcome::NoOp;
        };
        if action.is_open() {
            self.open(action).await
        } else {
            self.close(action).await
        }
    }

    /// Re-read the position from the exchange and adopt it.
    pub async fn reconcile(&mut self) -> Result<PositionState, ExchangeError> {
        let position = self.exchange.get_current_position(&self.instrument).await?;
        self.state = PositionState::from_position(position.as_ref());
        Ok(self.state)
    }

    async fn open(&mut self, action: Action) -> Outcome {
        let exchange = Arc::clone(&self.exchange);
        let inst = &self.instrument;

        let available = match exchange
            .get_available_balance(&inst.product_type, &inst.margin_coin)
            .await
        {
            Ok(available) => available,
            Err(e) => return self.query_failed(action, "balance", e),
        };
        if available < self.settings.min_balance {
            warn!(
                instrument = %inst,
                %available,
                required = %self.settings.min_balance,
                action = %action,
                "Insufficient balance, not opening"
            );
            return Outcome::Skipped {
                action,
                reason: SkipReason::InsufficientBalance {
                    available,
                    required: self.settings.min_balance,
                },
            };
        }

        let price = match exchange.get_last_price(&inst.symbol, &inst.product_type).await {
            Ok(price) => price,
            Err(e) => return self.query_failed(action, "last price", e),
        };

        let notional = available * self.settings.balance_fraction;
        let size = match exchange
            .compute_open_size(inst, notional, price, self.settings.leverage)
            .await
        {
            Ok(size) => size,
            Err(e) => return self.query_failed(action, "open size", e),
        };
        if size <= Decimal::ZERO {
            warn!(instrument = %inst, %notional, %price, "Computed open size is zero, not opening");
            return Outcome::Skipped {
                action,
                reason: SkipReason::ZeroSize,
            };
        }

        let mut request = OrderRequest::market_open(
            inst,
            Side::opening(action.hold_side()),
            size,
            price,
            self.settings.margin_mode,
        )
        .with_time_in_force(self.settings.time_in_force);
        if self.settings.tag_client_order_id {
            request = request.with_client_order_id(Uuid::new_v4().simple().to_string());
        }

        let accepted = match exchange.place_order(&request).await {
            Ok(response) => {
                info!(
                    instrument = %inst,
                    side = %request.side,
                    %size,
                    %price,
                    order_id = %response.order_id,
                    "Opening order placed"
                );
                true
            }
            Err(e) => {
                error!(instrument = %inst, side = %request.side, %size, error = %e, "Opening order failed");
                false
            }
        };
        self.settle(action, accepted).await
    }

    async fn close(&mut self, action: Action) -> Outcome {
        let exchange = Arc::clone(&self.exchange);
        let inst = &self.instrument;
        let hold_side = action.hold_side();

        let accepted = match exchange
            .close_position(&inst.symbol, &inst.product_type, hold_side)
            .await
        {
            Ok(response) if response.is_complete() => {
                info!(instrument = %inst, %hold_side, orders = ?response.closed, "Position closed");
                true
            }
            Ok(response) => {
                warn!(instrument = %inst, %hold_side, failures = ?response.failed, "Position close partially failed");
                false
            }
            Err(e) => {
                error!(instrument = %inst, %hold_side, error = %e, "Position close failed");
                false
            }
        };
        self.settle(action, accepted).await
    }

    async fn settle(&mut self, action: Action, accepted: bool) -> Outcome {
        let previous = self.state;
        self.state = action.target();

        if !accepted && self.settings.confirmation == ConfirmationPolicy::Reconcile {
            if let Err(e) = self.reconcile().await {
                warn!(instrument = %self.instrument, error = %e, "Reconcile failed, keeping optimistic state");
            }
        }

        info!(
            instrument = %self.instrument,
            from = %previous,
            to = %self.state,
            action = %action,
            accepted,
            "Position state transition"
        );
        Outcome::Submitted { action, accepted }
    }

    fn query_failed(&self, action: Action, what: &str, err: ExchangeError) -> Outcome {
        error!(instrument = %self.instrument, action = %action, error = %err, "Failed to query {}", what);
        Outcome::Skipped {
            action,
            reason: SkipReason::QueryFailed(err.to_string()),
        }
    }
}
