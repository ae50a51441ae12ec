//! Shared helpers for the rtmsockets integration tests
//!
//! `EchoServer` is a local WebSocket endpoint that accepts the `json`
//! sub-protocol, echoes data frames and closes on request.

use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::{JoinHandle, JoinSet};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::Message;

/// Text frame that makes the server close the socket
pub const CLOSE_REQUEST: &str = "please-close";

pub struct EchoServer {
    addr: SocketAddr,
    acceptor: JoinHandle<()>,
}

impl EchoServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind echo server");
        let addr = listener.local_addr().expect("echo server address");

        // Connection tasks live in the set, so aborting the acceptor ends them too.
        let acceptor = tokio::spawn(async move {
            let mut connections = JoinSet::new();
            while let Ok((stream, _)) = listener.accept().await {
                connections.spawn(serve(stream));
            }
        });

        Self { addr, acceptor }
    }

    /// Cobra-style endpoint URL on this server
    pub fn ws_url(&self) -> String {
        format!("ws://{}/v2?appkey=test", self.addr)
    }
}

impl Drop for EchoServer {
    fn drop(&mut self) {
        self.acceptor.abort();
    }
}

fn accept_json(_request: &Request, mut response: Response) -> Result<Response, ErrorResponse> {
    response
        .headers_mut()
        .insert("Sec-WebSocket-Protocol", HeaderValue::from_static("json"));
    Ok(response)
}

async fn serve(stream: TcpStream) {
    let mut config = WebSocketConfig::default();
    config.max_message_size = None;
    config.max_frame_size = None;

    let Ok(mut ws) = tokio_tungstenite::accept_hdr_async_with_config(stream, accept_json, Some(config)).await else {
        return;
    };

    while let Some(Ok(frame)) = ws.next().await {
        match frame {
            Message::Text(ref text) if text.as_str() == CLOSE_REQUEST => {
                let _ = ws.send(Message::Close(None)).await;
                return;
            }
            Message::Text(_) | Message::Binary(_) => {
                if ws.send(frame).await.is_err() {
                    return;
                }
            }
            Message::Close(_) => return,
            _ => {}
        }
    }
}
