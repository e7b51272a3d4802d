//! Glue between the event bus and one strategy instance.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, trace};

use trading_core::error::{BusError, StrategyError};
use trading_core::event_bus::{events, EventBus, Handler};
use trading_core::traits::{Strategy, StrategyState};
use trading_core::types::{AppendOutcome, Candle, CandleWindow, PositionState, Signal};

use crate::position_machine::{Outcome, PositionStateMachine};

/// Owns the window, the signal engine and the position state machine of one
/// instrument.
///
/// Shared as `Arc<Mutex<TrendTrader>>` so that appending, recomputing and
/// deciding for one frame happen inside a single critical section.
pub struct TrendTrader {
    window: CandleWindow,
    strategy: Box<dyn Strategy>,
    machine: PositionStateMachine,
    last_signal: Signal,
}

impl TrendTrader {
    pub fn new(window: CandleWindow, strategy: Box<dyn Strategy>, machine: PositionStateMachine) -> Self {
        Self {
            window,
            strategy,
            machine,
            last_signal: Signal::Hold,
        }
    }

    /// Handle one `candle_update` payload: an array of candle rows.
    ///
    /// All rows are parsed before the window is touched, so a malformed
    /// frame leaves the window as it was.
    pub async fn on_candle_update(&mut self, payload: &Value) -> Result<Outcome, StrategyError> {
        let rows = payload.as_array().ok_or_else(|| {
            StrategyError::MalformedCandle(format!("candle payload is not an array: {payload}"))
        })?;
        let candles = rows
            .iter()
            .map(Candle::from_row)
            .collect::<Result<Vec<_>, _>>()?;

        for candle in candles {
            let outcome = self.window.append(candle);
            if outcome == AppendOutcome::Rejected {
                debug!(start_time = candle.start_time, "Dropping out-of-order candle");
            }
            self.strategy.on_candle(&self.window, outcome);
        }

        let signal = self.strategy.signal();
        self.last_signal = signal;
        trace!(
            signal = %signal,
            window = self.window.len(),
            indicators = ?self.strategy.state().indicators,
            "Signal evaluated"
        );

        Ok(self.machine.on_signal(signal).await)
    }

    /// Subscribe `trader` to `candle_update` on `bus`.
    ///
    /// Returns the registered handler so the caller can unsubscribe it.
    pub fn attach(trader: &Arc<Mutex<TrendTrader>>, bus: &EventBus) -> Handler {
        let trader = Arc::clone(trader);
        let handler = Handler::suspending(move |payload| {
            let trader = Arc::clone(&trader);
            async move {
                let mut trader = trader.lock().await;
                trader
                    .on_candle_update(&payload)
                    .await
                    .map(|_| ())
                    .map_err(BusError::from)
            }
        });
        bus.subscribe(events::CANDLE_UPDATE, handler.clone());
        handler
    }

    pub fn window(&self) -> &CandleWindow {
        &self.window
    }

    pub fn position_state(&self) -> PositionState {
        self.machine.state()
    }

    pub fn last_signal(&self) -> Signal {
        self.last_signal
    }

    pub fn strategy_state(&self) -> StrategyState {
        self.strategy.state()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::macd_cross::{MacdCrossConfig, MacdCrossStrategy};
    use crate::position_machine::{Action, OrderSettings};
    use rust_decimal_macros::dec;
    use serde_json::json;
    use trading_broker::PaperExchange;
    use trading_core::types::{Instrument, Side};

    const SYMBOL: &str = "BTCUSDT";

    fn row(start_time: i64, close: f64) -> Value {
        let c = close.to_string();
        json!([start_time.to_string(), c, c, c, c, "1", "1", "1"])
    }

    fn trader(exchange: &Arc<PaperExchange>, window_size: usize) -> TrendTrader {
        let machine = PositionStateMachine::with_state(
            exchange.clone(),
            Instrument::new(SYMBOL, "USDT-FUTURES", "USDT"),
            OrderSettings::default(),
            PositionState::ToOrder,
        );
        let strategy = MacdCrossStrategy::new(MacdCrossConfig::default()).unwrap();
        TrendTrader::new(CandleWindow::new(window_size), Box::new(strategy), machine)
    }

    #[tokio::test]
    async fn test_frame_with_crossover_opens_long() {
        let exchange = Arc::new(PaperExchange::new(dec!(1000)).with_price(SYMBOL, dec!(120)));
        let mut trader = trader(&exchange, 100);

        let rows: Vec<Value> = [100.0, 99.0, 98.0, 97.0, 96.0, 120.0]
            .iter()
            .enumerate()
            .map(|(i, &c)| row(i as i64 * 60_000, c))
            .collect();
        let outcome = trader.on_candle_update(&Value::Array(rows)).await.unwrap();

        assert_eq!(
            outcome,
            Outcome::Submitted {
                action: Action::OpenLong,
                accepted: true
            }
        );
        assert_eq!(trader.last_signal(), Signal::Long);
        assert_eq!(trader.position_state(), PositionState::OrderedLong);
        assert_eq!(trader.window().len(), 6);
        assert_eq!(exchange.submitted_orders()[0].side, Side::Buy);
    }

    #[tokio::test]
    async fn test_window_is_trimmed_to_capacity() {
        let exchange = Arc::new(PaperExchange::new(dec!(1000)).with_price(SYMBOL, dec!(100)));
        let mut trader = trader(&exchange, 3);

        for i in 0..5 {
            trader
                .on_candle_update(&json!([row(i * 60_000, 100.0 + i as f64)]))
                .await
                .unwrap();
        }

        let times: Vec<i64> = trader.window().iter().map(|c| c.start_time).collect();
        assert_eq!(times, vec![120_000, 180_000, 240_000]);
    }

    #[tokio::test]
    async fn test_malformed_frame_leaves_window_untouched() {
        let exchange = Arc::new(PaperExchange::new(dec!(1000)));
        let mut trader = trader(&exchange, 10);

        let result = trader
            .on_candle_update(&json!([row(0, 100.0), ["bad"]]))
            .await;

        assert!(matches!(result, Err(StrategyError::MalformedCandle(_))));
        assert!(trader.window().is_empty());
        assert!(trader.on_candle_update(&json!({"not": "rows"})).await.is_err());
    }

    #[tokio::test]
    async fn test_attach_routes_bus_events() {
        let exchange = Arc::new(PaperExchange::new(dec!(1000)).with_price(SYMBOL, dec!(80)));
        let shared = Arc::new(Mutex::new(trader(&exchange, 100)));
        let bus = EventBus::new();

        let handler = TrendTrader::attach(&shared, &bus);
        assert_eq!(bus.handler_count(events::CANDLE_UPDATE), 1);

        let rows: Vec<Value> = [100.0, 101.0, 102.0, 103.0, 104.0, 80.0]
            .iter()
            .enumerate()
            .map(|(i, &c)| row(i as i64 * 60_000, c))
            .collect();
        let summary = bus.publish(events::CANDLE_UPDATE, Value::Array(rows)).await;
        assert_eq!(summary.failed, 0);

        {
            let trader = shared.lock().await;
            assert_eq!(trader.position_state(), PositionState::OrderedShort);
        }
        assert_eq!(exchange.submitted_orders()[0].side, Side::Sell);

        let summary = bus.publish(events::CANDLE_UPDATE, json!("garbage")).await;
        assert_eq!(summary.failed, 1);

        bus.unsubscribe(events::CANDLE_UPDATE, &handler).unwrap();
        assert_eq!(bus.handler_count(events::CANDLE_UPDATE), 0);
    }
}
