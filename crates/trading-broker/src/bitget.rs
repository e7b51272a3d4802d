//! Bitget v2 mix (futures) REST client.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method, Url};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};
use trading_core::error::ExchangeError;
use trading_core::traits::Exchange;
use trading_core::types::{
    CloseResponse, HoldSide, Instrument, OpenPosition, OrderRequest, OrderResponse,
};

type HmacSha256 = Hmac<Sha256>;

pub const DEFAULT_BASE_URL: &str = "https://api.bitget.com";
const SUCCESS_CODE: &str = "00000";

const SINGLE_POSITION: &str = "/api/v2/mix/position/single-position";
const ACCOUNTS: &str = "/api/v2/mix/account/accounts";
const TICKER: &str = "/api/v2/mix/market/ticker";
const OPEN_COUNT: &str = "/api/v2/mix/account/open-count";
const PLACE_ORDER: &str = "/api/v2/mix/order/place-order";
const CLOSE_POSITIONS: &str = "/api/v2/mix/order/close-positions";

/// Bitget API configuration.
#[derive(Clone)]
pub struct BitgetConfig {
    pub api_key: String,
    pub api_secret: String,
    pub passphrase: String,
    pub base_url: String,
    /// Route requests to demo trading (`paptrading: 1`)
    pub demo: bool,
    pub timeout: Duration,
}

impl BitgetConfig {
    pub fn new(
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
        passphrase: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            passphrase: passphrase.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            demo: false,
            timeout: Duration::from_secs(10),
        }
    }

    /// Load credentials from the named environment variables.
    pub fn from_env(key_var: &str, secret_var: &str, passphrase_var: &str) -> Result<Self, ExchangeError> {
        let read = |name: &str| {
            std::env::var(name)
                .map_err(|_| ExchangeError::Configuration(format!("{name} not set")))
        };
        Ok(Self::new(read(key_var)?, read(secret_var)?, read(passphrase_var)?))
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_demo(mut self, demo: bool) -> Self {
        self.demo = demo;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl std::fmt::Debug for BitgetConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BitgetConfig")
            .field("api_key", &"***")
            .field("base_url", &self.base_url)
            .field("demo", &self.demo)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// String the request signature is computed over.
pub fn prehash(timestamp: &str, method: &str, request_path: &str, query: &str, body: &str) -> String {
    if query.is_empty() {
        format!("{timestamp}{method}{request_path}{body}")
    } else {
        format!("{timestamp}{method}{request_path}?{query}{body}")
    }
}

/// `base64(HMAC_SHA256(secret, prehash))`.
pub fn sign(secret: &str, prehash: &str) -> Result<String, ExchangeError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| ExchangeError::Configuration(e.to_string()))?;
    mac.update(prehash.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    code: String,
    #[serde(default)]
    msg: String,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountRecord {
    margin_coin: String,
    available: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TickerRecord {
    last_pr: String,
}

#[derive(Debug, Deserialize)]
struct OpenCount {
    size: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PositionRecord {
    symbol: String,
    hold_side: String,
    total: String,
    available: Option<String>,
    open_price_avg: Option<String>,
    leverage: Option<String>,
    #[serde(rename = "unrealizedPL")]
    unrealized_pl: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PlaceOrderBody<'a> {
    symbol: &'a str,
    product_type: &'a str,
    margin_mode: String,
    margin_coin: &'a str,
    size: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    price: Option<String>,
    side: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    trade_side: Option<String>,
    order_type: String,
    force: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    client_oid: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reduce_only: Option<&'static str>,
}

impl<'a> From<&'a OrderRequest> for PlaceOrderBody<'a> {
    fn from(req: &'a OrderRequest) -> Self {
        Self {
            symbol: &req.symbol,
            product_type: &req.product_type,
            margin_mode: req.margin_mode.to_string(),
            margin_coin: &req.margin_coin,
            size: req.size.normalize().to_string(),
            price: req.price.map(|p| p.normalize().to_string()),
            side: req.side.to_string(),
            trade_side: req.trade_side.map(|t| t.to_string()),
            order_type: req.order_type.to_string(),
            force: req.time_in_force.to_string(),
            client_oid: req.client_order_id.as_deref(),
            reduce_only: req.reduce_only.map(|r| if r { "YES" } else { "NO" }),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaceOrderData {
    order_id: String,
    client_oid: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ClosePositionsBody<'a> {
    symbol: &'a str,
    product_type: &'a str,
    hold_side: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ClosePositionsData {
    success_list: Vec<CloseSuccess>,
    failure_list: Vec<CloseFailure>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CloseSuccess {
    order_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct CloseFailure {
    order_id: String,
    error_msg: String,
}

impl Default for CloseFailure {
    fn default() -> Self {
        Self {
            order_id: String::new(),
            error_msg: "unknown".to_string(),
        }
    }
}

fn decimal(value: &str, field: &str) -> Result<Decimal, ExchangeError> {
    Decimal::from_str(value)
        .or_else(|_| Decimal::from_scientific(value))
        .map_err(|e| ExchangeError::Decode(format!("{field} '{value}': {e}")))
}

fn optional_decimal(value: Option<&str>, field: &str) -> Result<Decimal, ExchangeError> {
    match value {
        Some(v) if !v.is_empty() => decimal(v, field),
        _ => Ok(Decimal::ZERO),
    }
}

/// Signed client for the Bitget v2 mix endpoints.
pub struct BitgetClient {
    config: BitgetConfig,
    client: Client,
}

impl BitgetClient {
    pub fn new(config: BitgetConfig) -> Result<Self, ExchangeError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ExchangeError::Connection(e.to_string()))?;
        info!(base_url = %config.base_url, demo = config.demo, "Bitget client created");
        Ok(Self { config, client })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T, ExchangeError> {
        self.send(Method::GET, path, query, String::new()).await
    }

    async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T, ExchangeError> {
        let body = serde_json::to_string(body).map_err(|e| ExchangeError::Decode(e.to_string()))?;
        self.send(Method::POST, path, &[], body).await
    }

    async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: String,
    ) -> Result<T, ExchangeError> {
        let mut url = Url::parse(&self.config.base_url)
            .and_then(|base| base.join(path))
            .map_err(|e| ExchangeError::Configuration(format!("invalid url: {e}")))?;
        if !query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(query.iter().map(|(k, v)| (*k, v.as_str())));
        }
        let query_string = url.query().unwrap_or_default().to_string();

        let timestamp = Utc::now().timestamp_millis().to_string();
        let signature = sign(
            &self.config.api_secret,
            &prehash(&timestamp, method.as_str(), path, &query_string, &body),
        )?;

        let mut request = self
            .client
            .request(method.clone(), url)
            .header("ACCESS-KEY", &self.config.api_key)
            .header("ACCESS-SIGN", signature)
            .header("ACCESS-TIMESTAMP", &timestamp)
            .header("ACCESS-PASSPHRASE", &self.config.passphrase)
            .header("paptrading", if self.config.demo { "1" } else { "0" })
            .header("locale", "en-US")
            .header(CONTENT_TYPE, "application/json");
        if !body.is_empty() {
            request = request.body(body);
        }

        debug!(%method, path, query = %query_string, "Bitget request");
        let resp = request
            .send()
            .await
            .map_err(|e| ExchangeError::Connection(e.to_string()))?;
        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| ExchangeError::Connection(e.to_string()))?;

        let envelope: Envelope<T> = match serde_json::from_str(&text) {
            Ok(envelope) => envelope,
            Err(_) if !status.is_success() => {
                return Err(ExchangeError::Api {
                    code: status.as_u16().to_string(),
                    msg: text,
                })
            }
            Err(e) => return Err(ExchangeError::Decode(format!("{path}: {e}"))),
        };
        if envelope.code != SUCCESS_CODE {
            warn!(path, code = %envelope.code, msg = %envelope.msg, "Bitget API error");
            return Err(ExchangeError::Api {
                code: envelope.code,
                msg: envelope.msg,
            });
        }
        envelope
            .data
            .ok_or_else(|| ExchangeError::Decode(format!("{path}: missing data")))
    }
}

#[async_trait]
impl Exchange for BitgetClient {
    async fn get_current_position(
        &self,
        instrument: &Instrument,
    ) -> Result<Option<OpenPosition>, ExchangeError> {
        let records: Vec<PositionRecord> = self
            .get(
                SINGLE_POSITION,
                &[
                    ("symbol", instrument.symbol.clone()),
                    ("productType", instrument.product_type.clone()),
                    ("marginCoin", instrument.margin_coin.clone()),
                ],
            )
            .await?;

        for record in records {
            let total = decimal(&record.total, "total")?;
            if total.is_zero() {
                continue;
            }
            let hold_side = record
                .hold_side
                .parse::<HoldSide>()
                .map_err(ExchangeError::Decode)?;
            return Ok(Some(OpenPosition {
                symbol: record.symbol,
                hold_side,
                total,
                available: optional_decimal(record.available.as_deref(), "available")?,
                open_price_avg: optional_decimal(record.open_price_avg.as_deref(), "openPriceAvg")?,
                leverage: optional_decimal(record.leverage.as_deref(), "leverage")?,
                unrealized_pnl: optional_decimal(record.unrealized_pl.as_deref(), "unrealizedPL")?,
            }));
        }
        Ok(None)
    }

    async fn get_available_balance(
        &self,
        product_type: &str,
        margin_coin: &str,
    ) -> Result<Decimal, ExchangeError> {
        let accounts: Vec<AccountRecord> = self
            .get(ACCOUNTS, &[("productType", product_type.to_string())])
            .await?;

        let account = accounts
            .iter()
            .find(|a| a.margin_coin.eq_ignore_ascii_case(margin_coin))
            .ok_or_else(|| ExchangeError::NotFound(format!("no {margin_coin} account in {product_type}")))?;
        decimal(&account.available, "available")
    }

    async fn get_last_price(&self, symbol: &str, product_type: &str) -> Result<Decimal, ExchangeError> {
        let tickers: Vec<TickerRecord> = self
            .get(
                TICKER,
                &[
                    ("symbol", symbol.to_string()),
                    ("productType", product_type.to_string()),
                ],
            )
            .await?;

        let ticker = tickers
            .first()
            .ok_or_else(|| ExchangeError::NotFound(format!("no ticker for {symbol}")))?;
        decimal(&ticker.last_pr, "lastPr")
    }

    async fn compute_open_size(
        &self,
        instrument: &Instrument,
        notional: Decimal,
        price: Decimal,
        leverage: Decimal,
    ) -> Result<Decimal, ExchangeError> {
        let count: OpenCount = self
            .get(
                OPEN_COUNT,
                &[
                    ("symbol", instrument.symbol.clone()),
                    ("productType", instrument.product_type.clone()),
                    ("marginCoin", instrument.margin_coin.clone()),
                    ("openAmount", notional.normalize().to_string()),
                    ("openPrice", price.normalize().to_string()),
                    ("leverage", leverage.normalize().to_string()),
                ],
            )
            .await?;
        decimal(&count.size, "size")
    }

    async fn place_order(&self, request: &OrderRequest) -> Result<OrderResponse, ExchangeError> {
        let body = PlaceOrderBody::from(request);
        let data: PlaceOrderData = self.post(PLACE_ORDER, &body).await?;
        Ok(OrderResponse {
            order_id: data.order_id,
            client_order_id: data.client_oid,
        })
    }

    async fn close_position(
        &self,
        symbol: &str,
        product_type: &str,
        hold_side: HoldSide,
    ) -> Result<CloseResponse, ExchangeError> {
        let body = ClosePositionsBody {
            symbol,
            product_type,
            hold_side: hold_side.to_string(),
        };
        let data: ClosePositionsData = self.post(CLOSE_POSITIONS, &body).await?;
        Ok(CloseResponse {
            closed: data.success_list.into_iter().map(|s| s.order_id).collect(),
            failed: data
                .failure_list
                .into_iter()
                .map(|f| format!("{}: {}", f.order_id, f.error_msg))
                .collect(),
        })
    }

    fn name(&self) -> &str {
        "Bitget"
    }
}
