//! Exchange capability trait.

use crate::error::ExchangeError;
use crate::types::{CloseResponse, HoldSide, Instrument, OpenPosition, OrderRequest, OrderResponse};
use async_trait::async_trait;
use rust_decimal::Decimal;

/// The narrow set of trading capabilities the position state machine needs.
///
/// Implementations talk to a real venue (`BitgetClient`) or simulate one
/// (`PaperExchange`).
#[async_trait]
pub trait Exchange: Send + Sync {
    /// Get the open position for an instrument, if any.
    async fn get_current_position(
        &self,
        instrument: &Instrument,
    ) -> Result<Option<OpenPosition>, ExchangeError>;

    /// Get the available balance of `margin_coin` in the given product line.
    async fn get_available_balance(
        &self,
        product_type: &str,
        margin_coin: &str,
    ) -> Result<Decimal, ExchangeError>;

    /// Get the last traded price.
    async fn get_last_price(&self, symbol: &str, product_type: &str) -> Result<Decimal, ExchangeError>;

    /// Ask the venue how large a position `notional` of margin buys at `price` and `leverage`.
    ///
    /// # Arguments
    /// * `instrument` - The instrument to size for
    /// * `notional` - Margin committed, in margin coin
    /// * `price` - Expected entry price
    /// * `leverage` - Leverage applied to the margin
    async fn compute_open_size(
        &self,
        instrument: &Instrument,
        notional: Decimal,
        price: Decimal,
        leverage: Decimal,
    ) -> Result<Decimal, ExchangeError>;

    /// Submit a new order.
    async fn place_order(&self, request: &OrderRequest) -> Result<OrderResponse, ExchangeError>;

    /// Flatten the position held on `hold_side`.
    async fn close_position(
        &self,
        symbol: &str,
        product_type: &str,
        hold_side: HoldSide,
    ) -> Result<CloseResponse, ExchangeError>;

    /// Get the exchange name.
    fn name(&self) -> &str;
}
