//! Duplex socket abstraction and the stock TCP dialer.
//!
//! A [`Dialer`] opens a [`Socket`]: a sink of outbound text frames and a
//! stream of inbound [`SocketFrame`]s. The socket transport only sees this
//! interface, so tests can script the far end in memory.
//!
//! The TCP dialer frames one JSON message per line. A server that wants to
//! close with a status code sends `{"_close": <code>}` before ending the
//! stream; a stream that just ends is an abnormal close.

use std::pin::Pin;

use async_trait::async_trait;
use futures::{Sink, SinkExt, Stream, StreamExt};
use serde::Deserialize;
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LinesCodec, LinesCodecError};

use crate::error::TransportError;

/// Longest accepted line on the TCP framing.
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// One inbound unit from a socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketFrame {
    Text(String),
    Close(u16),
}

pub type FrameSink = Pin<Box<dyn Sink<String, Error = TransportError> + Send>>;
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<SocketFrame, TransportError>> + Send>>;

/// An open duplex socket.
pub struct Socket {
    pub sink: FrameSink,
    pub stream: FrameStream,
}

impl std::fmt::Debug for Socket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Socket").finish_non_exhaustive()
    }
}

/// Opens sockets to an endpoint URL.
#[async_trait]
pub trait Dialer: Send + Sync {
    async fn dial(&self, url: &str) -> Result<Socket, TransportError>;
}

/// Control frame that carries a close status over line framing.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct CloseControl {
    #[serde(rename = "_close")]
    code: u16,
}

/// Encode a close control frame.
pub fn close_frame(code: u16) -> String {
    format!("{{\"_close\":{code}}}")
}

fn parse_line(line: String) -> SocketFrame {
    if line.contains("\"_close\"") {
        if let Ok(control) = serde_json::from_str::<CloseControl>(&line) {
            return SocketFrame::Close(control.code);
        }
    }
    SocketFrame::Text(line)
}

impl From<LinesCodecError> for TransportError {
    fn from(e: LinesCodecError) -> Self {
        match e {
            LinesCodecError::Io(e) => TransportError::Io(e),
            LinesCodecError::MaxLineLengthExceeded => {
                TransportError::Framing("frame exceeds maximum length".into())
            }
        }
    }
}

/// Split a `tcp://host:port/path` endpoint into authority and path.
pub fn parse_endpoint(url: &str) -> Result<(String, String), TransportError> {
    let rest = url
        .strip_prefix("tcp://")
        .ok_or_else(|| TransportError::InvalidEndpoint(url.to_string()))?;

    let (authority, path) = match rest.find('/') {
        Some(i) => (&rest[..i], &rest[i..]),
        None => (rest, "/"),
    };

    if authority.is_empty() || !authority.contains(':') {
        return Err(TransportError::InvalidEndpoint(url.to_string()));
    }

    Ok((authority.to_string(), path.to_string()))
}

/// Dials newline-delimited JSON sockets over TCP.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpDialer;

#[async_trait]
impl Dialer for TcpDialer {
    async fn dial(&self, url: &str) -> Result<Socket, TransportError> {
        let (authority, path) = parse_endpoint(url)?;
        tracing::debug!(%authority, %path, "dialing socket");

        let stream = TcpStream::connect(&authority).await?;
        stream.set_nodelay(true)?;

        let framed = Framed::new(stream, LinesCodec::new_with_max_length(MAX_FRAME_LEN));
        let (sink, stream) = framed.split();

        let sink = sink.sink_map_err(TransportError::from);
        let stream = stream.map(|line| line.map(parse_line).map_err(TransportError::from));

        Ok(Socket {
            sink: Box::pin(sink),
            stream: Box::pin(stream),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_endpoint() {
        assert_eq!(
            parse_endpoint("tcp://127.0.0.1:8000/ws").unwrap(),
            ("127.0.0.1:8000".to_string(), "/ws".to_string())
        );
        assert_eq!(
            parse_endpoint("tcp://localhost:9").unwrap(),
            ("localhost:9".to_string(), "/".to_string())
        );
        assert!(parse_endpoint("ws://localhost:9").is_err());
        assert!(parse_endpoint("tcp://localhost/x").is_err());
        assert!(parse_endpoint("tcp:///x").is_err());
    }

    #[test]
    fn test_close_control_frame() {
        assert_eq!(parse_line(close_frame(3001)), SocketFrame::Close(3001));
        // A message that merely mentions the key is still text
        let text = r#"{"_close": 1, "action": "x"}"#.to_string();
        assert_eq!(parse_line(text.clone()), SocketFrame::Text(text));
    }

    #[tokio::test]
    async fn test_dial_refused() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let result = TcpDialer.dial(&format!("tcp://{addr}/")).await;
        assert!(matches!(result, Err(TransportError::Io(_))));
    }
}
