//! Run command: stream candles and trade.

use anyhow::{bail, Context, Result};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use trading_broker::{BitgetClient, BitgetConfig, PaperExchange};
use trading_config::AppConfig;
use trading_core::event_bus::{events, EventBus, Handler};
use trading_core::traits::Exchange;
use trading_core::types::{Candle, CandleWindow};
use trading_data::{ConnectionState, StreamClient};
use trading_monitor::attach_connection_monitor;
use trading_strategies::{MacdCrossStrategy, PositionStateMachine, TrendTrader};

use crate::cli::RunArgs;

pub async fn run(args: RunArgs, mut config: AppConfig) -> Result<()> {
    if let Some(symbol) = args.symbol.clone() {
        config.stream.symbol = symbol;
    }
    config.validate().context("invalid configuration")?;

    let instrument = config.instrument();
    let bus = Arc::new(EventBus::new());
    let monitor = attach_connection_monitor(&bus);

    let exchange: Arc<dyn Exchange> = if args.dry_run {
        let paper = Arc::new(
            PaperExchange::new(args.paper_balance).with_leverage(config.order.leverage),
        );
        if let Some(price) = args.paper_price {
            paper.set_price(&instrument.symbol, price);
        }
        follow_last_close(&bus, &paper, &instrument.symbol);
        info!(balance = %args.paper_balance, "Dry run against the paper exchange");
        paper
    } else {
        let settings = &config.exchange;
        let credentials = BitgetConfig::from_env(
            &settings.api_key_env,
            &settings.api_secret_env,
            &settings.passphrase_env,
        )
        .context("Bitget credentials are not configured")?
        .with_base_url(settings.base_url.as_str())
        .with_demo(settings.demo)
        .with_timeout(settings.request_timeout());
        Arc::new(BitgetClient::new(credentials)?)
    };

    let machine = PositionStateMachine::initialize(
        Arc::clone(&exchange),
        instrument.clone(),
        config.order.clone(),
    )
    .await
    .context("failed to query the current position")?;

    let strategy = MacdCrossStrategy::new(config.strategy.macd_config())?;
    let window = CandleWindow::new(config.strategy.window_size)
        .with_policy(config.strategy.window_policy);
    let trader = Arc::new(Mutex::new(TrendTrader::new(
        window,
        Box::new(strategy),
        machine,
    )));
    TrendTrader::attach(&trader, &bus);

    let client = StreamClient::new(config.stream.to_stream_config(), Arc::clone(&bus));
    let handle = client.connect()?;
    info!(
        instrument = %instrument,
        exchange = exchange.name(),
        interval = %config.stream.interval,
        "Trader running, press Ctrl-C to stop"
    );

    let join = handle.join();
    tokio::pin!(join);
    tokio::select! {
        _ = &mut join => {
            warn!(state = ?client.state(), "Stream task ended");
        }
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                error!(error = %e, "Failed to listen for Ctrl-C");
            }
            info!("Shutdown requested");
            client.close();
            (&mut join).await;
        }
    }

    let trader = trader.lock().await;
    info!(
        position = %trader.position_state(),
        last_signal = %trader.last_signal(),
        candles = trader.window().len(),
        stats = ?monitor.stats(),
        "Trader stopped"
    );

    if client.state() == ConnectionState::Failed {
        bail!(
            "stream failed after {} reconnect attempts",
            client.reconnect_attempts()
        );
    }
    Ok(())
}

/// Keep the paper price at the close of the newest candle.
///
/// Subscribed before the trader so orders fill at the price the signal saw.
fn follow_last_close(bus: &EventBus, paper: &Arc<PaperExchange>, symbol: &str) {
    let paper = Arc::clone(paper);
    let symbol = symbol.to_string();
    bus.subscribe(
        events::CANDLE_UPDATE,
        Handler::immediate(move |payload| {
            let newest = payload
                .as_array()
                .and_then(|rows| rows.last())
                .map(Candle::from_row)
                .transpose()?;
            if let Some(candle) = newest {
                paper.set_price(&symbol, candle.close);
            }
            Ok(())
        }),
    );
}
