use crate::traits::*;
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async_with_config, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket transport backed by tokio-tungstenite
///
/// Frames are reassembled by tungstenite and delivered whole, with the
/// message and frame size limits lifted, so a large server push is never
/// truncated. Pings are answered by tungstenite while reading.
pub struct WsTransport {
    subprotocol: Option<String>,
    stream: Option<WsStream>,
    opened_pending: bool,
}

impl WsTransport {
    /// Create a transport that negotiates `subprotocol` (e.g. `"json"`) when connecting
    pub fn new(subprotocol: Option<String>) -> Self {
        Self {
            subprotocol,
            stream: None,
            opened_pending: false,
        }
    }

    /// Check if the socket is currently open
    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    fn socket_config() -> WebSocketConfig {
        let mut config = WebSocketConfig::default();
        config.max_message_size = None;
        config.max_frame_size = None;
        config
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn connect(&mut self, url: &str) -> Result<()> {
        if self.stream.is_some() {
            warn!("connect called on an open transport, closing the old socket first");
            self.close().await?;
        }

        let mut request = url
            .into_client_request()
            .map_err(|e| SocketError::InvalidRequest(e.to_string()))?;

        if let Some(ref protocol) = self.subprotocol {
            let value = HeaderValue::from_str(protocol)
                .map_err(|e| SocketError::InvalidRequest(format!("sub-protocol {}: {}", protocol, e)))?;
            request.headers_mut().insert("Sec-WebSocket-Protocol", value);
        }

        let (stream, response) = connect_async_with_config(request, Some(Self::socket_config()), false)
            .await
            .map_err(|e| SocketError::WebSocket(e.to_string()))?;

        info!("Connected to {} (HTTP {})", url, response.status());
        self.stream = Some(stream);
        self.opened_pending = true;
        Ok(())
    }

    async fn send(&mut self, message: WsMessage) -> Result<()> {
        let stream = self.stream.as_mut().ok_or(SocketError::NotConnected)?;
        stream
            .send(ws_message_to_tungstenite(message))
            .await
            .map_err(|e| SocketError::WebSocket(e.to_string()))
    }

    async fn next_event(&mut self) -> TransportEvent {
        if self.opened_pending {
            self.opened_pending = false;
            return TransportEvent::Opened;
        }

        let Some(stream) = self.stream.as_mut() else {
            return TransportEvent::Closed(Some("transport is not connected".into()));
        };

        loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => return TransportEvent::Frame(WsMessage::Text(text)),
                Some(Ok(Message::Binary(data))) => return TransportEvent::Frame(WsMessage::Binary(data)),
                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) | Some(Ok(Message::Frame(_))) => {
                    continue;
                }
                Some(Ok(Message::Close(frame))) => {
                    let reason = frame.map(|f| format!("{} {}", u16::from(f.code), f.reason));
                    debug!("Server closed the socket: {:?}", reason);
                    self.stream = None;
                    return TransportEvent::Closed(reason);
                }
                Some(Err(e)) => {
                    warn!("WebSocket error: {}", e);
                    self.stream = None;
                    return TransportEvent::Closed(Some(e.to_string()));
                }
                None => {
                    debug!("WebSocket stream ended");
                    self.stream = None;
                    return TransportEvent::Closed(None);
                }
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.opened_pending = false;
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.close(None).await {
                debug!("Error while closing socket (ignored): {}", e);
            }
        }
        Ok(())
    }
}

/// Factory producing a fresh `WsTransport` per connection attempt
#[derive(Debug, Clone, Default)]
pub struct WsTransportFactory {
    subprotocol: Option<String>,
}

impl WsTransportFactory {
    pub fn new(subprotocol: Option<String>) -> Self {
        Self { subprotocol }
    }
}

impl TransportFactory for WsTransportFactory {
    fn create(&self) -> Box<dyn Transport> {
        Box::new(WsTransport::new(self.subprotocol.clone()))
    }
}

/// Convert WsMessage to tungstenite Message
fn ws_message_to_tungstenite(msg: WsMessage) -> Message {
    match msg {
        WsMessage::Text(text) => Message::Text(text),
        WsMessage::Binary(data) => Message::Binary(data),
    }
}
