//! In-process exchange for dry runs and tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use std::collections::HashMap;
use tracing::{debug, info};
use trading_core::error::ExchangeError;
use trading_core::traits::Exchange;
use trading_core::types::{
    CloseResponse, HoldSide, Instrument, OpenPosition, OrderRequest, OrderResponse, Side, TradeSide,
};
use uuid::Uuid;

#[derive(Debug, Default)]
struct PaperState {
    balance: Decimal,
    prices: HashMap<String, Decimal>,
    positions: HashMap<String, OpenPosition>,
    orders: Vec<OrderRequest>,
    closes: Vec<(String, HoldSide)>,
    reject_orders: bool,
}

/// Simulated exchange.
///
/// Holds one balance, a last price and at most one position per symbol.
/// Market orders fill immediately at the last price. Every request is
/// recorded for inspection.
pub struct PaperExchange {
    state: Mutex<PaperState>,
    size_precision: u32,
    leverage: Decimal,
}

impl PaperExchange {
    /// Create a paper exchange with `balance` available margin.
    pub fn new(balance: Decimal) -> Self {
        Self {
            state: Mutex::new(PaperState {
                balance,
                ..Default::default()
            }),
            size_precision: 4,
            leverage: dec!(20),
        }
    }

    /// Set the initial last price for a symbol.
    pub fn with_price(self, symbol: impl Into<String>, price: Decimal) -> Self {
        self.state.lock().prices.insert(symbol.into(), price);
        self
    }

    /// Start with an open position.
    pub fn with_position(self, position: OpenPosition) -> Self {
        self.state
            .lock()
            .positions
            .insert(position.symbol.clone(), position);
        self
    }

    /// Number of decimals order sizes are rounded down to.
    pub fn with_size_precision(mut self, decimals: u32) -> Self {
        self.size_precision = decimals;
        self
    }

    /// Leverage used to compute the margin locked by fills.
    pub fn with_leverage(mut self, leverage: Decimal) -> Self {
        self.leverage = leverage;
        self
    }

    pub fn set_price(&self, symbol: &str, price: Decimal) {
        self.state.lock().prices.insert(symbol.to_string(), price);
    }

    pub fn set_balance(&self, balance: Decimal) {
        self.state.lock().balance = balance;
    }

    /// Make `place_order` fail until switched back.
    pub fn reject_orders(&self, reject: bool) {
        self.state.lock().reject_orders = reject;
    }

    pub fn balance(&self) -> Decimal {
        self.state.lock().balance
    }

    pub fn position(&self, symbol: &str) -> Option<OpenPosition> {
        self.state.lock().positions.get(symbol).cloned()
    }

    /// Every request passed to `place_order`, accepted or not.
    pub fn submitted_orders(&self) -> Vec<OrderRequest> {
        self.state.lock().orders.clone()
    }

    /// Every `close_position` call as (symbol, side).
    pub fn close_requests(&self) -> Vec<(String, HoldSide)> {
        self.state.lock().closes.clone()
    }

    fn margin_for(&self, size: Decimal, price: Decimal) -> Decimal {
        if self.leverage.is_zero() {
            size * price
        } else {
            size * price / self.leverage
        }
    }
}

#[async_trait]
impl Exchange for PaperExchange {
    async fn get_current_position(
        &self,
        instrument: &Instrument,
    ) -> Result<Option<OpenPosition>, ExchangeError> {
        Ok(self.position(&instrument.symbol))
    }

    async fn get_available_balance(
        &self,
        _product_type: &str,
        _margin_coin: &str,
    ) -> Result<Decimal, ExchangeError> {
        Ok(self.balance())
    }

    async fn get_last_price(&self, symbol: &str, _product_type: &str) -> Result<Decimal, ExchangeError> {
        self.state
            .lock()
            .prices
            .get(symbol)
            .copied()
            .ok_or_else(|| ExchangeError::NotFound(format!("no price for {symbol}")))
    }

    async fn compute_open_size(
        &self,
        _instrument: &Instrument,
        notional: Decimal,
        price: Decimal,
        leverage: Decimal,
    ) -> Result<Decimal, ExchangeError> {
        if price <= Decimal::ZERO {
            return Err(ExchangeError::Decode(format!("invalid price {price}")));
        }
        let size = notional * leverage / price;
        Ok(size.round_dp_with_strategy(self.size_precision, RoundingStrategy::ToZero))
    }

    async fn place_order(&self, request: &OrderRequest) -> Result<OrderResponse, ExchangeError> {
        let mut state = self.state.lock();
        state.orders.push(request.clone());

        if state.reject_orders {
            return Err(ExchangeError::OrderRejected("paper exchange set to reject".into()));
        }

        let price = state
            .prices
            .get(&request.symbol)
            .copied()
            .or(request.price)
            .ok_or_else(|| ExchangeError::NotFound(format!("no price for {}", request.symbol)))?;
        let margin = self.margin_for(request.size, price);

        match request.trade_side.unwrap_or(TradeSide::Open) {
            TradeSide::Open => {
                if margin > state.balance {
                    return Err(ExchangeError::InsufficientBalance {
                        required: margin,
                        available: state.balance,
                    });
                }
                let hold_side = match request.side {
                    Side::Buy => HoldSide::Long,
                    Side::Sell => HoldSide::Short,
                };
                state.balance -= margin;
                let position = state
                    .positions
                    .entry(request.symbol.clone())
                    .or_insert_with(|| {
                        OpenPosition::new(&request.symbol, hold_side, Decimal::ZERO, price)
                            .with_leverage(self.leverage)
                    });
                let total = position.total + request.size;
                position.open_price_avg =
                    (position.open_price_avg * position.total + price * request.size) / total;
                position.total = total;
                position.available = total;
            }
            TradeSide::Close => {
                return Err(ExchangeError::OrderRejected(
                    "paper exchange closes positions through close_position".into(),
                ));
            }
        }

        let order_id = Uuid::new_v4().to_string();
        info!(
            symbol = %request.symbol,
            side = %request.side,
            size = %request.size,
            %price,
            %order_id,
            "Paper order filled"
        );
        Ok(OrderResponse {
            order_id,
            client_order_id: request.client_order_id.clone(),
        })
    }

    async fn close_position(
        &self,
        symbol: &str,
        _product_type: &str,
        hold_side: HoldSide,
    ) -> Result<CloseResponse, ExchangeError> {
        let mut state = self.state.lock();
        state.closes.push((symbol.to_string(), hold_side));

        let held = state
            .positions
            .get(symbol)
            .filter(|p| p.hold_side == hold_side)
            .cloned()
            .ok_or_else(|| ExchangeError::NotFound(format!("no {hold_side} position on {symbol}")))?;
        let price = state.prices.get(symbol).copied().unwrap_or(held.open_price_avg);

        let pnl = held.pnl_at(price);
        state.balance += self.margin_for(held.total, held.open_price_avg) + pnl;
        state.positions.remove(symbol);
        debug!(symbol, %hold_side, %pnl, balance = %state.balance, "Paper position closed");

        Ok(CloseResponse {
            closed: vec![Uuid::new_v4().to_string()],
            failed: Vec::new(),
        })
    }

    fn name(&self) -> &str {
        "Paper Exchange"
    }
}
