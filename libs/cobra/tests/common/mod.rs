//! Common test utilities for Cobra integration tests
//!
//! `MockTransportFactory` hands the connection task in-memory transports.
//! Every successful connect yields a `MockPeer` that plays the server side:
//! it reads what the client sent and scripts what the client receives.

#![allow(dead_code)]

use async_trait::async_trait;
use cobra::{compute_hash, CobraClient, ConnectionConfig};
use parking_lot::Mutex;
use rtmsockets::{SocketError, Transport, TransportEvent, TransportFactory, WsMessage};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

const WAIT: Duration = Duration::from_secs(5);

pub fn test_config() -> ConnectionConfig {
    ConnectionConfig::new("wss://x", "k", "r", "s")
}

// ============================================================================
// Transport side
// ============================================================================

pub struct MockTransportFactory {
    peers_tx: mpsc::UnboundedSender<MockPeer>,
    created: AtomicUsize,
    failing_connects: AtomicUsize,
}

impl MockTransportFactory {
    pub fn new() -> (Arc<Self>, MockPeers) {
        let (peers_tx, peers_rx) = mpsc::unbounded_channel();
        let factory = Arc::new(Self {
            peers_tx,
            created: AtomicUsize::new(0),
            failing_connects: AtomicUsize::new(0),
        });
        (factory, MockPeers { rx: peers_rx })
    }

    /// Make the next `n` connect attempts fail
    pub fn fail_next_connects(&self, n: usize) {
        self.failing_connects.store(n, Ordering::SeqCst);
    }

    /// Number of transports created so far
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

impl TransportFactory for MockTransportFactory {
    fn create(&self) -> Box<dyn Transport> {
        self.created.fetch_add(1, Ordering::SeqCst);
        let fail = self
            .failing_connects
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let closed = Arc::new(AtomicBool::new(false));

        Box::new(MockTransport {
            outbound: outbound_tx,
            inbound: inbound_rx,
            pending_peer: Some(MockPeer {
                url: String::new(),
                sent: outbound_rx,
                events: inbound_tx,
                closed: Arc::clone(&closed),
            }),
            peers_tx: self.peers_tx.clone(),
            fail,
            opened_pending: false,
            closed,
        })
    }
}

struct MockTransport {
    outbound: mpsc::UnboundedSender<String>,
    inbound: mpsc::UnboundedReceiver<TransportEvent>,
    pending_peer: Option<MockPeer>,
    peers_tx: mpsc::UnboundedSender<MockPeer>,
    fail: bool,
    opened_pending: bool,
    closed: Arc<AtomicBool>,
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&mut self, url: &str) -> rtmsockets::Result<()> {
        if self.fail {
            return Err(SocketError::WebSocket("connection refused".into()));
        }
        if let Some(mut peer) = self.pending_peer.take() {
            peer.url = url.to_string();
            let _ = self.peers_tx.send(peer);
        }
        self.opened_pending = true;
        Ok(())
    }

    async fn send(&mut self, message: WsMessage) -> rtmsockets::Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(SocketError::NotConnected);
        }
        let text = message.as_text().map(str::to_string).unwrap_or_default();
        self.outbound
            .send(text)
            .map_err(|_| SocketError::ConnectionClosed("peer gone".into()))
    }

    async fn next_event(&mut self) -> TransportEvent {
        if self.opened_pending {
            self.opened_pending = false;
            return TransportEvent::Opened;
        }
        match self.inbound.recv().await {
            Some(event) => {
                if matches!(event, TransportEvent::Closed(_)) {
                    self.closed.store(true, Ordering::SeqCst);
                }
                event
            }
            None => TransportEvent::Closed(Some("peer dropped".into())),
        }
    }

    async fn close(&mut self) -> rtmsockets::Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

// ============================================================================
// Server side
// ============================================================================

/// Stream of peers, one per successful connect
pub struct MockPeers {
    rx: mpsc::UnboundedReceiver<MockPeer>,
}

impl MockPeers {
    pub async fn next(&mut self) -> MockPeer {
        tokio::time::timeout(WAIT, self.rx.recv())
            .await
            .expect("timed out waiting for a connection")
            .expect("factory dropped")
    }

    pub fn try_next(&mut self) -> Option<MockPeer> {
        self.rx.try_recv().ok()
    }
}

/// Server end of one mock connection
pub struct MockPeer {
    pub url: String,
    sent: mpsc::UnboundedReceiver<String>,
    events: mpsc::UnboundedSender<TransportEvent>,
    closed: Arc<AtomicBool>,
}

impl MockPeer {
    /// Next frame the client sent, parsed as JSON
    pub async fn next_sent(&mut self) -> Value {
        let text = tokio::time::timeout(WAIT, self.sent.recv())
            .await
            .expect("timed out waiting for the client to send")
            .expect("transport dropped");
        serde_json::from_str(&text).expect("client sent invalid JSON")
    }

    pub fn try_next_sent(&mut self) -> Option<Value> {
        self.sent
            .try_recv()
            .ok()
            .map(|text| serde_json::from_str(&text).expect("client sent invalid JSON"))
    }

    pub fn push(&self, frame: Value) {
        self.push_raw(&frame.to_string());
    }

    pub fn push_raw(&self, text: &str) {
        let _ = self
            .events
            .send(TransportEvent::Frame(WsMessage::Text(text.to_string())));
    }

    /// Simulate the server dropping the socket
    pub fn close(&self, reason: &str) {
        let _ = self.events.send(TransportEvent::Closed(Some(reason.to_string())));
    }

    /// Whether the client closed (or lost) this transport
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Answer the handshake with `nonce` and return the authenticate request
    pub async fn answer_handshake(&mut self, nonce: &str) -> Value {
        let handshake = self.next_sent().await;
        assert_eq!(handshake["action"], "auth/handshake");
        self.push(json!({
            "action": "auth/handshake/ok",
            "id": handshake["id"].clone(),
            "body": {"data": {"nonce": nonce, "version": "0.0.24", "connection_id": "conn-1", "node": "node-a"}},
        }));

        let auth = self.next_sent().await;
        assert_eq!(auth["action"], "auth/authenticate");
        auth
    }

    /// Run handshake and authentication to success; returns the subscribe request
    pub async fn complete_auth(&mut self, secret: &str) -> Value {
        let auth = self.answer_handshake("nonce-1").await;
        assert_eq!(
            auth["body"]["credentials"]["hash"],
            compute_hash(secret, "nonce-1").unwrap()
        );
        self.push(json!({"action": "auth/authenticate/ok", "id": auth["id"].clone()}));

        let subscribe = self.next_sent().await;
        assert_eq!(subscribe["action"], "rtm/subscribe");
        subscribe
    }
}

// ============================================================================
// Client helpers
// ============================================================================

pub type Received = Arc<Mutex<Vec<Value>>>;

/// Client on channel `lobby` backed by `factory`, collecting messages
pub async fn lobby_client(factory: Arc<MockTransportFactory>, settings: cobra::ClientSettings) -> (CobraClient, Received) {
    let received: Received = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&received);

    let client = CobraClient::builder()
        .config(test_config())
        .channel("lobby")
        .settings(settings)
        .transport_factory(factory)
        .on_message(move |message| sink.lock().push(message))
        .build()
        .await
        .expect("client should build");

    (client, received)
}

/// Poll `condition` until it holds
pub async fn wait_for(mut condition: impl FnMut() -> bool) {
    for _ in 0..500 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not met in time");
}

pub fn drain_events(client: &CobraClient) -> Vec<cobra::ConnectionEvent> {
    std::iter::from_fn(|| client.try_recv_event()).collect()
}
