pub mod builder;

pub use builder::{states, CobraClientBuilder};

use crate::connection::{AtomicConnectionState, Command, ConnectionEvent, ConnectionState, ConnectionStateMachine};
use crate::error::{CobraError, Result};
use crossbeam_channel::Receiver;
use rtmsockets::{AtomicMetrics, Metrics};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Create a new client builder
pub fn builder() -> CobraClientBuilder<states::NoConfig, states::NoChannel> {
    CobraClientBuilder::new()
}

/// Handle to a running Cobra connection
///
/// All methods are non-blocking: they queue a command for the connection
/// task, which serializes them with transport events. Dropping the handle
/// stops the connection.
pub struct CobraClient {
    command_tx: mpsc::UnboundedSender<Command>,
    state: Arc<AtomicConnectionState>,
    metrics: Arc<AtomicMetrics>,
    stop_requested: Arc<AtomicBool>,
    event_rx: Receiver<ConnectionEvent>,
    publish_timeout: Duration,
    task_handle: Option<JoinHandle<()>>,
}

impl CobraClient {
    pub fn builder() -> CobraClientBuilder<states::NoConfig, states::NoChannel> {
        builder()
    }

    pub(crate) fn spawn(
        machine: ConnectionStateMachine,
        event_rx: Receiver<ConnectionEvent>,
        publish_timeout: Duration,
    ) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let state = machine.state();
        let metrics = machine.metrics();
        let stop_requested = machine.stop_flag();

        let task_handle = tokio::spawn(machine.run(command_rx));

        Self {
            command_tx,
            state,
            metrics,
            stop_requested,
            event_rx,
            publish_timeout,
            task_handle: Some(task_handle),
        }
    }

    /// Queue a message for `channel` without waiting for the server
    ///
    /// Fails with `NotAuthenticated` while no authenticated session exists.
    pub fn publish(&self, channel: impl Into<String>, message: Value) -> Result<()> {
        if self.is_stopped() {
            return Err(CobraError::Stopped);
        }
        if !self.is_authenticated() {
            return Err(CobraError::NotAuthenticated);
        }
        self.send_command(Command::Publish {
            channel: channel.into(),
            message,
            ack: None,
        })
    }

    /// Publish and wait for the server's acknowledgement
    pub async fn publish_confirmed(&self, channel: impl Into<String>, message: Value) -> Result<()> {
        if self.is_stopped() {
            return Err(CobraError::Stopped);
        }

        let (ack_tx, ack_rx) = oneshot::channel();
        self.send_command(Command::Publish {
            channel: channel.into(),
            message,
            ack: Some(ack_tx),
        })?;

        match tokio::time::timeout(self.publish_timeout, ack_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(CobraError::Stopped),
            Err(_) => Err(CobraError::Timeout(format!(
                "publish not acknowledged within {:?}",
                self.publish_timeout
            ))),
        }
    }

    /// Switch the subscription to `channel`
    ///
    /// On a live connection the old subscription is dropped on the wire
    /// first; otherwise the change applies when the next connection
    /// authenticates.
    pub fn resubscribe(&self, channel: impl Into<String>, filter: Option<String>) -> Result<()> {
        if self.is_stopped() {
            return Err(CobraError::Stopped);
        }
        self.send_command(Command::Resubscribe {
            channel: channel.into(),
            filter,
        })
    }

    /// Stop the client; idempotent
    ///
    /// No callback starts after this returns, and no reconnect is attempted.
    pub fn stop(&self) {
        if self.stop_requested.swap(true, Ordering::AcqRel) {
            debug!("Stop already requested");
            return;
        }
        info!("Stopping Cobra client");
        let _ = self.command_tx.send(Command::Stop);
    }

    #[inline]
    pub fn is_stopped(&self) -> bool {
        self.stop_requested.load(Ordering::Acquire)
    }

    #[inline]
    pub fn connection_state(&self) -> ConnectionState {
        self.state.get()
    }

    #[inline]
    pub fn is_authenticated(&self) -> bool {
        self.state.get().is_authenticated()
    }

    pub fn metrics(&self) -> Metrics {
        self.metrics.snapshot()
    }

    /// Try to receive a diagnostic event (non-blocking)
    pub fn try_recv_event(&self) -> Option<ConnectionEvent> {
        self.event_rx.try_recv().ok()
    }

    /// Receive a diagnostic event (blocking)
    pub fn recv_event(&self) -> std::result::Result<ConnectionEvent, crossbeam_channel::RecvError> {
        self.event_rx.recv()
    }

    /// Stop and wait for the connection task to finish
    pub async fn shutdown(mut self) -> Result<()> {
        self.stop();
        if let Some(handle) = self.task_handle.take() {
            handle
                .await
                .map_err(|e| CobraError::Protocol(format!("connection task failed: {}", e)))?;
        }
        info!("Cobra client shut down");
        Ok(())
    }

    fn send_command(&self, command: Command) -> Result<()> {
        self.command_tx.send(command).map_err(|_| CobraError::Stopped)
    }
}

impl Drop for CobraClient {
    fn drop(&mut self) {
        self.stop();
    }
}
