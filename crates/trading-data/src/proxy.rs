//! HTTP CONNECT tunnelling for the websocket connection.

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::http::Uri;
use tracing::debug;

use trading_core::error::StreamError;

const MAX_RESPONSE_HEAD: usize = 8 * 1024;

/// HTTP proxy the stream connects through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyConfig {
    pub host: String,
    pub port: u16,
}

impl ProxyConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Open a TCP tunnel to the host of `url` through this proxy.
    ///
    /// The returned stream is positioned right after the proxy's response
    /// head, ready for the websocket handshake.
    pub async fn tunnel(&self, url: &str) -> Result<TcpStream, StreamError> {
        let (host, port) = target_of(url)?;
        let authority = format!("{host}:{port}");
        debug!(proxy = %self, target = %authority, "Opening proxy tunnel");

        let mut stream = TcpStream::connect((self.host.as_str(), self.port))
            .await
            .map_err(|e| StreamError::Proxy(format!("{self}: {e}")))?;

        let request = format!("CONNECT {authority} HTTP/1.1\r\nHost: {authority}\r\n\r\n");
        stream
            .write_all(request.as_bytes())
            .await
            .map_err(|e| StreamError::Proxy(format!("{self}: {e}")))?;

        let head = read_head(&mut stream)
            .await
            .map_err(|e| StreamError::Proxy(format!("{self}: {e}")))?;
        let status = head.lines().next().unwrap_or_default();
        if status.split_whitespace().nth(1) != Some("200") {
            return Err(StreamError::Proxy(format!(
                "{self} refused CONNECT {authority}: {status}"
            )));
        }
        Ok(stream)
    }
}

impl std::fmt::Display for ProxyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Host and port a websocket url connects to.
fn target_of(url: &str) -> Result<(String, u16), StreamError> {
    let uri: Uri = url
        .parse()
        .map_err(|e| StreamError::Connect(format!("invalid url '{url}': {e}")))?;
    let host = uri
        .host()
        .ok_or_else(|| StreamError::Connect(format!("url '{url}' has no host")))?;
    let port = match (uri.port_u16(), uri.scheme_str()) {
        (Some(port), _) => port,
        (None, Some("wss")) => 443,
        (None, Some("ws")) => 80,
        (None, other) => {
            return Err(StreamError::Connect(format!(
                "unsupported scheme {other:?} in '{url}'"
            )))
        }
    };
    Ok((host.to_string(), port))
}

/// Read an HTTP head up to and including the blank line.
///
/// Reads one byte at a time so nothing past the head is consumed.
pub(crate) async fn read_head<S>(stream: &mut S) -> std::io::Result<String>
where
    S: AsyncRead + Unpin,
{
    let mut head = Vec::with_capacity(128);
    let mut byte = [0u8; 1];
    while !head.ends_with(b"\r\n\r\n") {
        if head.len() >= MAX_RESPONSE_HEAD {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "response head too large",
            ));
        }
        if stream.read(&mut byte).await? == 0 {
            return Err(std::io::ErrorKind::UnexpectedEof.into());
        }
        head.push(byte[0]);
    }
    Ok(String::from_utf8_lossy(&head).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[test]
    fn test_target_defaults_port_by_scheme() {
        assert_eq!(
            target_of("wss://ws.bitget.com/v2/ws/public").unwrap(),
            ("ws.bitget.com".to_string(), 443)
        );
        assert_eq!(
            target_of("ws://localhost/feed").unwrap(),
            ("localhost".to_string(), 80)
        );
        assert_eq!(
            target_of("ws://127.0.0.1:9001").unwrap(),
            ("127.0.0.1".to_string(), 9001)
        );
        assert!(target_of("not a url").is_err());
        assert!(target_of("ftp://host/x").is_err());
    }

    #[tokio::test]
    async fn test_read_head_leaves_body_unread() {
        let (mut client, mut server) = tokio::io::duplex(256);
        client
            .write_all(b"HTTP/1.1 200 OK\r\nVia: test\r\n\r\nrest")
            .await
            .unwrap();

        let head = read_head(&mut server).await.unwrap();
        assert_eq!(head, "HTTP/1.1 200 OK\r\nVia: test\r\n\r\n");

        let mut rest = [0u8; 4];
        server.read_exact(&mut rest).await.unwrap();
        assert_eq!(&rest, b"rest");
    }

    #[tokio::test]
    async fn test_tunnel_rejected_by_proxy() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let _ = read_head(&mut socket).await;
            let _ = socket
                .write_all(b"HTTP/1.1 407 Proxy Authentication Required\r\n\r\n")
                .await;
        });

        let proxy = ProxyConfig::new("127.0.0.1", addr.port());
        let err = proxy.tunnel("wss://ws.bitget.com/v2/ws/public").await.unwrap_err();
        match err {
            StreamError::Proxy(message) => {
                assert!(message.contains("407"), "{message}");
                assert!(message.contains("ws.bitget.com:443"), "{message}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_tunnel_to_unreachable_proxy() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let proxy = ProxyConfig::new("127.0.0.1", port);
        assert!(matches!(
            proxy.tunnel("ws://127.0.0.1:9001").await,
            Err(StreamError::Proxy(_))
        ));
    }
}
