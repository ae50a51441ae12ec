use super::state::{AtomicConnectionState, ConnectionState};
use crate::auth::AuthNegotiator;
use crate::config::ClientSettings;
use crate::dispatcher::{EventDispatcher, RtmEvent};
use crate::error::{CobraError, Result};
use crate::protocol::{actions, decode_message, encode, Pdu, RequestId};
use crate::reconnect::{Decision, ReconnectPolicy};
use crate::subscription::SubscriptionManager;
use crossbeam_channel::{unbounded, Receiver, Sender};
use rtmsockets::{AtomicMetrics, ReconnectionStrategy, SocketError, Transport, TransportEvent, TransportFactory, WsMessage};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Reply channel for an acknowledged publish
pub type PublishAck = oneshot::Sender<Result<()>>;

/// Requests from client handles to the connection task
#[derive(Debug)]
pub enum Command {
    Publish {
        channel: String,
        message: Value,
        ack: Option<PublishAck>,
    },
    Resubscribe {
        channel: String,
        filter: Option<String>,
    },
    Stop,
}

/// Diagnostic events describing the connection lifecycle
///
/// These never carry subscription payloads; messages go to the registered
/// callback only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// Authenticated; metadata comes from the handshake response
    Connected {
        connection_id: Option<String>,
        server_version: Option<String>,
        node: Option<String>,
    },
    Disconnected {
        reason: String,
    },
    Reconnecting {
        attempt: usize,
        delay: Duration,
    },
    /// A failure that did not end the connection
    Error(String),
    GaveUp {
        reason: String,
    },
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Awaiting {
    Nothing,
    Handshake(RequestId),
    Auth(RequestId),
}

impl fmt::Display for Awaiting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Awaiting::Nothing => f.write_str("nothing"),
            Awaiting::Handshake(id) => write!(f, "handshake request {}", id),
            Awaiting::Auth(id) => write!(f, "authenticate request {}", id),
        }
    }
}

#[derive(Debug, Default)]
struct ServerInfo {
    connection_id: Option<String>,
    version: Option<String>,
    node: Option<String>,
}

enum SessionEnd {
    Stopped,
    Failed(CobraError),
}

enum Step {
    Command(Option<Command>),
    Transport(TransportEvent),
    Timeout,
}

/// Drives one logical connection through connect, handshake, authenticate
/// and subscribe, restarting it under the reconnect policy
///
/// Owned by a single tokio task. Transport events, commands and timers are
/// handled one at a time, each handler running to completion. Request ids
/// keep counting across reconnects.
pub struct ConnectionStateMachine {
    url: String,
    auth: AuthNegotiator,
    connect_timeout: Duration,
    response_timeout: Duration,
    factory: Arc<dyn TransportFactory>,
    subscriptions: SubscriptionManager,
    dispatcher: EventDispatcher,
    reconnect: ReconnectPolicy,
    state: Arc<AtomicConnectionState>,
    metrics: Arc<AtomicMetrics>,
    stop_requested: Arc<AtomicBool>,
    events: Sender<ConnectionEvent>,
    next_id: RequestId,
    awaiting: Awaiting,
    deadline: Option<Instant>,
    server: Option<ServerInfo>,
    pending_acks: HashMap<RequestId, PublishAck>,
}

impl ConnectionStateMachine {
    pub fn new(
        url: String,
        auth: AuthNegotiator,
        settings: &ClientSettings,
        factory: Arc<dyn TransportFactory>,
        subscriptions: SubscriptionManager,
        dispatcher: EventDispatcher,
        strategy: Box<dyn ReconnectionStrategy>,
    ) -> (Self, Receiver<ConnectionEvent>) {
        let (events, events_rx) = unbounded();
        let machine = Self {
            url,
            auth,
            connect_timeout: settings.connect_timeout(),
            response_timeout: settings.response_timeout(),
            factory,
            subscriptions,
            dispatcher,
            reconnect: ReconnectPolicy::new(strategy, settings.max_auth_rejections),
            state: Arc::new(AtomicConnectionState::new(ConnectionState::Disconnected)),
            metrics: Arc::new(AtomicMetrics::new()),
            stop_requested: Arc::new(AtomicBool::new(false)),
            events,
            next_id: 0,
            awaiting: Awaiting::Nothing,
            deadline: None,
            server: None,
            pending_acks: HashMap::new(),
        };
        (machine, events_rx)
    }

    pub fn state(&self) -> Arc<AtomicConnectionState> {
        Arc::clone(&self.state)
    }

    pub fn metrics(&self) -> Arc<AtomicMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop_requested)
    }

    fn stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::Acquire)
    }

    fn emit(&self, event: ConnectionEvent) {
        let _ = self.events.send(event);
    }

    /// Main task loop; returns once stopped or out of reconnect attempts
    pub async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        info!("Connection task started");

        loop {
            if self.stop_requested() {
                break;
            }

            let outcome = self.run_session(&mut commands).await;
            self.awaiting = Awaiting::Nothing;
            self.deadline = None;
            self.server = None;
            self.subscriptions.reset_wire();

            let err = match outcome {
                SessionEnd::Stopped => break,
                SessionEnd::Failed(err) => err,
            };

            self.fail_pending_acks(|| CobraError::Transport(SocketError::ConnectionClosed(err.to_string())));
            self.state.set(ConnectionState::Closed);
            if self.stop_requested() {
                break;
            }
            self.emit(ConnectionEvent::Disconnected { reason: err.to_string() });

            match self.reconnect.on_unexpected_close(err.close_cause()) {
                Decision::Retry { delay, attempt } => {
                    info!("Reconnecting in {:?} (attempt {})", delay, attempt + 1);
                    self.emit(ConnectionEvent::Reconnecting {
                        attempt: attempt + 1,
                        delay,
                    });
                    if !self.wait_for_restart(delay, &mut commands).await {
                        break;
                    }
                    self.reconnect.on_restart();
                    self.metrics.increment_reconnects();
                }
                // Sessions restart one at a time here, so `on_restart` has always
                // cleared the overlap guard before the next close. Never start a
                // session without waiting out a delay.
                Decision::AlreadyRestarting => {
                    warn!("Restart already scheduled, not starting another");
                    break;
                }
                Decision::GiveUp => {
                    warn!("Giving up after: {}", err);
                    self.emit(ConnectionEvent::GaveUp { reason: err.to_string() });
                    break;
                }
            }
        }

        self.reconnect.stop();
        self.state.set(ConnectionState::Closed);
        self.fail_pending_acks(|| CobraError::Stopped);
        if self.stop_requested() {
            self.emit(ConnectionEvent::Stopped);
        }
        info!("Connection task exiting");
    }

    /// Sleep out the reconnect delay; false when stop arrived first
    async fn wait_for_restart(&mut self, delay: Duration, commands: &mut mpsc::UnboundedReceiver<Command>) -> bool {
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                biased;
                command = commands.recv() => match command {
                    Some(Command::Stop) | None => return false,
                    Some(command) => self.handle_offline_command(command),
                },
                _ = &mut sleep => return !self.stop_requested(),
            }
        }
    }

    async fn run_session(&mut self, commands: &mut mpsc::UnboundedReceiver<Command>) -> SessionEnd {
        self.state.set(ConnectionState::Connecting);
        let mut transport = self.factory.create();
        debug!("Opening transport");

        let connected = {
            let url = self.url.clone();
            let connect = tokio::time::timeout(self.connect_timeout, transport.connect(&url));
            tokio::pin!(connect);

            loop {
                tokio::select! {
                    biased;
                    command = commands.recv() => match command {
                        Some(Command::Stop) | None => break None,
                        Some(command) => self.handle_offline_command(command),
                    },
                    result = &mut connect => break Some(result),
                }
            }
        };

        match connected {
            None => return self.close_for_stop(transport.as_mut()).await,
            Some(Err(_)) => {
                warn!("Connect timed out after {:?}", self.connect_timeout);
                return SessionEnd::Failed(CobraError::Timeout(format!(
                    "connect did not complete within {:?}",
                    self.connect_timeout
                )));
            }
            Some(Ok(Err(e))) => {
                error!("Failed to connect: {}", e);
                return SessionEnd::Failed(e.into());
            }
            Some(Ok(Ok(()))) => {}
        }

        loop {
            let step = {
                let deadline = self.deadline;
                tokio::select! {
                    biased;
                    command = commands.recv() => Step::Command(command),
                    event = transport.next_event() => Step::Transport(event),
                    _ = sleep_until(deadline) => Step::Timeout,
                }
            };

            if self.stop_requested() {
                return self.close_for_stop(transport.as_mut()).await;
            }

            let result = match step {
                Step::Command(Some(Command::Stop)) | Step::Command(None) => {
                    return self.close_for_stop(transport.as_mut()).await;
                }
                Step::Command(Some(command)) => self.handle_command(command, transport.as_mut()).await,
                Step::Transport(TransportEvent::Opened) => self.on_open(transport.as_mut()).await,
                Step::Transport(TransportEvent::Frame(message)) => self.on_frame(message, transport.as_mut()).await,
                Step::Transport(TransportEvent::Closed(reason)) => {
                    let reason = reason.unwrap_or_else(|| "connection closed".to_string());
                    warn!("Connection closed while {}: {}", self.state.get(), reason);
                    return SessionEnd::Failed(CobraError::Transport(SocketError::ConnectionClosed(reason)));
                }
                Step::Timeout => Err(CobraError::Timeout(format!(
                    "no response to {} within {:?}",
                    self.awaiting, self.response_timeout
                ))),
            };

            if let Err(e) = result {
                if self.stop_requested() {
                    return self.close_for_stop(transport.as_mut()).await;
                }
                error!("Connection error: {}", e);
                self.state.set(ConnectionState::Closing);
                let _ = transport.close().await;
                return SessionEnd::Failed(e);
            }

            if self.stop_requested() {
                return self.close_for_stop(transport.as_mut()).await;
            }
        }
    }

    async fn close_for_stop(&mut self, transport: &mut dyn Transport) -> SessionEnd {
        info!("Stop requested, closing connection");
        self.state.set(ConnectionState::Closing);
        if let Err(e) = transport.close().await {
            debug!("Error while closing transport (ignored): {}", e);
        }
        SessionEnd::Stopped
    }

    // ------------------------------------------------------------------------
    // Transport events
    // ------------------------------------------------------------------------

    async fn on_open(&mut self, transport: &mut dyn Transport) -> Result<()> {
        if self.state.get() != ConnectionState::Connecting {
            return Err(CobraError::Protocol(format!("transport opened while {}", self.state.get())));
        }

        info!("Transport open, starting handshake");
        let id = self.next_request_id();
        let request = self.auth.handshake_request(id);
        self.send_pdu(transport, request).await?;
        self.state.set(ConnectionState::HandshakeSent);
        self.expect(Awaiting::Handshake(id));
        Ok(())
    }

    async fn on_frame(&mut self, message: WsMessage, transport: &mut dyn Transport) -> Result<()> {
        self.metrics.increment_received();
        let pdu = decode_message(&message)?;
        debug!("<- {} (id {:?})", pdu.action(), pdu.id());

        match self.state.get() {
            ConnectionState::HandshakeSent => self.on_handshake_response(pdu, transport).await,
            ConnectionState::Authenticating => self.on_auth_response(pdu, transport).await,
            ConnectionState::Authenticated | ConnectionState::Subscribed => {
                self.on_session_pdu(pdu)
            }
            state => Err(CobraError::Protocol(format!("unexpected {} while {}", pdu.action(), state))),
        }
    }

    async fn on_handshake_response(&mut self, pdu: Pdu, transport: &mut dyn Transport) -> Result<()> {
        match pdu {
            Pdu::HandshakeResponse { id, data } if self.awaiting == Awaiting::Handshake(id) => {
                info!(
                    "Handshake accepted (connection {:?}, server {:?}, node {:?})",
                    data.connection_id, data.version, data.node
                );
                self.server = Some(ServerInfo {
                    connection_id: data.connection_id,
                    version: data.version,
                    node: data.node,
                });

                let auth_id = self.next_request_id();
                let request = self.auth.auth_request(auth_id, &data.nonce)?;
                self.send_pdu(transport, request).await?;
                self.state.set(ConnectionState::Authenticating);
                self.expect(Awaiting::Auth(auth_id));
                Ok(())
            }
            Pdu::ErrorResponse { action, error, .. } => Err(CobraError::Rejected { action, error }),
            other => Err(CobraError::Protocol(format!(
                "expected handshake response to {}, got {} (id {:?})",
                self.awaiting,
                other.action(),
                other.id()
            ))),
        }
    }

    async fn on_auth_response(&mut self, pdu: Pdu, transport: &mut dyn Transport) -> Result<()> {
        match pdu {
            Pdu::AuthResponse { id, ok: true, .. } if self.awaiting == Awaiting::Auth(id) => {
                self.clear_awaiting();
                self.state.set(ConnectionState::Authenticated);
                self.reconnect.on_authenticated();
                info!("Authenticated as role '{}'", self.auth.role());

                let server = self.server.take().unwrap_or_default();
                self.emit(ConnectionEvent::Connected {
                    connection_id: server.connection_id,
                    server_version: server.version,
                    node: server.node,
                });
                self.dispatcher.fire(RtmEvent::Authenticated);

                if self.stop_requested() {
                    return Ok(());
                }
                self.send_subscribe(transport).await
            }
            Pdu::AuthResponse { id, ok: false, reason } if self.awaiting == Awaiting::Auth(id) => {
                Err(CobraError::AuthRejected(reason.unwrap_or_else(|| "authentication_failed".to_string())))
            }
            other => Err(CobraError::Protocol(format!(
                "expected authenticate response to {}, got {} (id {:?})",
                self.awaiting,
                other.action(),
                other.id()
            ))),
        }
    }

    fn on_session_pdu(&mut self, pdu: Pdu) -> Result<()> {
        match pdu {
            Pdu::SubscriptionData {
                subscription_id,
                channel,
                messages,
                position,
            } => {
                if self.state.get() != ConnectionState::Subscribed {
                    return Err(CobraError::Protocol("subscription data before subscribing".to_string()));
                }
                let target = subscription_id.or(channel);
                if let (Some(active), Some(target)) = (self.subscriptions.active(), target.as_deref()) {
                    if active != target {
                        debug!("Dropping push for inactive subscription '{}'", target);
                        return Ok(());
                    }
                }
                if self.deliver(messages) {
                    if let Some(position) = position {
                        self.subscriptions.record_position(position);
                    }
                }
                Ok(())
            }
            Pdu::SubscribeResponse {
                id,
                subscription_id,
                position,
            } => {
                if self.subscriptions.confirm(id, subscription_id, position.clone()) {
                    info!("Subscription confirmed (request {}, position {:?})", id, position);
                } else {
                    debug!("Ignoring reply to superseded subscribe request {}", id);
                }
                Ok(())
            }
            Pdu::UnsubscribeResponse { id } => {
                debug!("Unsubscribe {} confirmed", id);
                Ok(())
            }
            Pdu::PublishResponse { id } => {
                if let Some(ack) = self.pending_acks.remove(&id) {
                    let _ = ack.send(Ok(()));
                }
                Ok(())
            }
            Pdu::ErrorResponse { action, id, error } if action == actions::PUBLISH_ERROR => {
                let rejection = CobraError::Rejected { action, error };
                match id.and_then(|id| self.pending_acks.remove(&id)) {
                    Some(ack) => {
                        let _ = ack.send(Err(rejection));
                    }
                    None => {
                        warn!("{}", rejection);
                        self.emit(ConnectionEvent::Error(rejection.to_string()));
                    }
                }
                Ok(())
            }
            Pdu::ErrorResponse { action, id, error } if action == actions::UNSUBSCRIBE_ERROR => {
                warn!("Unsubscribe {:?} failed: {}", id, error);
                Ok(())
            }
            Pdu::ErrorResponse { action, error, .. } => Err(CobraError::Rejected { action, error }),
            other => Err(CobraError::Protocol(format!(
                "unexpected {} while {}",
                other.action(),
                self.state.get()
            ))),
        }
    }

    /// Fire the callback per message; false when stop cut the batch short
    fn deliver(&mut self, messages: Vec<Value>) -> bool {
        for message in messages {
            if self.stop_requested() {
                debug!("Stop requested, dropping remaining messages");
                return false;
            }
            self.dispatcher.fire(RtmEvent::MessageReceived(message));
            self.metrics.increment_delivered();
        }
        true
    }

    // ------------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------------

    async fn handle_command(&mut self, command: Command, transport: &mut dyn Transport) -> Result<()> {
        match command {
            Command::Publish { channel, message, ack } => {
                if !self.state.get().is_authenticated() {
                    reject_publish(ack, CobraError::NotAuthenticated);
                    return Ok(());
                }
                let id = self.next_request_id();
                self.send_pdu(transport, Pdu::PublishRequest { id, channel, message }).await?;
                if let Some(ack) = ack {
                    self.pending_acks.retain(|_, pending| !pending.is_closed());
                    self.pending_acks.insert(id, ack);
                }
                Ok(())
            }
            Command::Resubscribe { channel, filter } => {
                info!("Switching subscription to '{}'", channel);
                self.subscriptions.subscribe(channel, filter);
                if !self.state.get().is_authenticated() {
                    return Ok(());
                }
                if let Some(previous) = self.subscriptions.take_active() {
                    let id = self.next_request_id();
                    self.send_pdu(
                        transport,
                        Pdu::UnsubscribeRequest {
                            id,
                            subscription_id: previous,
                        },
                    )
                    .await?;
                }
                self.send_subscribe(transport).await
            }
            Command::Stop => Ok(()),
        }
    }

    /// Commands arriving while no authenticated session exists
    fn handle_offline_command(&mut self, command: Command) {
        match command {
            Command::Publish { ack, .. } => reject_publish(ack, CobraError::NotAuthenticated),
            Command::Resubscribe { channel, filter } => {
                debug!("Subscription intent changed to '{}' while offline", channel);
                self.subscriptions.subscribe(channel, filter);
            }
            Command::Stop => {}
        }
    }

    // ------------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------------

    async fn send_subscribe(&mut self, transport: &mut dyn Transport) -> Result<()> {
        if !self.subscriptions.has_intent() {
            debug!("No subscription configured");
            return Ok(());
        }

        let id = self.next_request_id();
        if let Some(request) = self.subscriptions.materialize(id) {
            if let Pdu::SubscribeRequest { channel, position, .. } = &request {
                info!("Subscribing to '{}' (from position {:?})", channel, position);
            }
            self.send_pdu(transport, request).await?;
            self.subscriptions.mark_sent(id);
        }
        self.state.set(ConnectionState::Subscribed);
        Ok(())
    }

    /// Only the action and id are logged; bodies carry hashes and payloads
    async fn send_pdu(&mut self, transport: &mut dyn Transport, pdu: Pdu) -> Result<()> {
        debug!("-> {} (id {:?})", pdu.action(), pdu.id());
        transport.send(WsMessage::Text(encode(&pdu))).await?;
        self.metrics.increment_sent();
        Ok(())
    }

    fn next_request_id(&mut self) -> RequestId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn expect(&mut self, awaiting: Awaiting) {
        self.awaiting = awaiting;
        self.deadline = Some(Instant::now() + self.response_timeout);
    }

    fn clear_awaiting(&mut self) {
        self.awaiting = Awaiting::Nothing;
        self.deadline = None;
    }

    fn fail_pending_acks(&mut self, error: impl Fn() -> CobraError) {
        for (_, ack) in self.pending_acks.drain() {
            let _ = ack.send(Err(error()));
        }
    }
}

fn reject_publish(ack: Option<PublishAck>, error: CobraError) {
    match ack {
        Some(ack) => {
            let _ = ack.send(Err(error));
        }
        None => warn!("Dropping publish: {}", error),
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
