//! Websocket frame codec.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use trading_core::error::StreamError;

/// One channel subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionArg {
    pub inst_type: String,
    pub channel: String,
    pub inst_id: String,
}

/// `{"op": "subscribe", "args": [...]}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscribeRequest {
    pub op: String,
    pub args: Vec<SubscriptionArg>,
}

impl SubscribeRequest {
    pub fn subscribe(args: Vec<SubscriptionArg>) -> Self {
        Self {
            op: "subscribe".to_string(),
            args,
        }
    }

    pub fn to_text(&self) -> Result<String, StreamError> {
        serde_json::to_string(self).map_err(|e| StreamError::Protocol(e.to_string()))
    }
}

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    /// Payload of the `data` field
    Data(Value),
    /// Textual heartbeat reply
    Pong,
    /// Anything else: subscription acks, error notices
    Event(Value),
}

/// Decode one text frame.
pub fn parse_frame(text: &str) -> Result<InboundFrame, StreamError> {
    if text.trim() == "pong" {
        return Ok(InboundFrame::Pong);
    }

    let mut value: Value = serde_json::from_str(text)
        .map_err(|e| StreamError::Protocol(format!("invalid frame: {e}")))?;

    match value.as_object_mut().and_then(|obj| obj.remove("data")) {
        Some(data) if !data.is_null() => Ok(InboundFrame::Data(data)),
        _ => Ok(InboundFrame::Event(value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_subscribe_request_shape() {
        let request = SubscribeRequest::subscribe(vec![SubscriptionArg {
            inst_type: "USDT-FUTURES".into(),
            channel: "candle15m".into(),
            inst_id: "BTCUSDT".into(),
        }]);

        assert_eq!(
            request.to_text().unwrap(),
            r#"{"op":"subscribe","args":[{"instType":"USDT-FUTURES","channel":"candle15m","instId":"BTCUSDT"}]}"#
        );
    }

    #[test]
    fn test_data_frame() {
        let frame = parse_frame(
            r#"{"action":"update","arg":{"instType":"USDT-FUTURES","channel":"candle15m","instId":"BTCUSDT"},"data":[["1695835800000","26000","26100","25900","26050","1.5","39000","39000"]]}"#,
        )
        .unwrap();

        match frame {
            InboundFrame::Data(data) => {
                assert_eq!(data[0][0], json!("1695835800000"));
                assert_eq!(data[0][4], json!("26050"));
            }
            other => panic!("expected data frame, got {other:?}"),
        }
    }

    #[test]
    fn test_event_and_pong_frames() {
        assert_eq!(parse_frame("pong").unwrap(), InboundFrame::Pong);

        let ack = parse_frame(r#"{"event":"subscribe","arg":{"channel":"candle15m"}}"#).unwrap();
        assert_eq!(
            ack,
            InboundFrame::Event(json!({"event": "subscribe", "arg": {"channel": "candle15m"}}))
        );

        let null_data = parse_frame(r#"{"event":"noop","data":null}"#).unwrap();
        assert!(matches!(null_data, InboundFrame::Event(_)));
    }

    #[test]
    fn test_malformed_frame() {
        assert!(matches!(parse_frame("{not json"), Err(StreamError::Protocol(_))));
        assert!(parse_frame("").is_err());
    }
}
