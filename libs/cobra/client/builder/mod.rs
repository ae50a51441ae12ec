pub mod states;

use super::CobraClient;
use crate::auth::AuthNegotiator;
use crate::config::{ClientSettings, ConnectionConfig};
use crate::connection::ConnectionStateMachine;
use crate::dispatcher::{EventDispatcher, EventKind, RtmEvent};
use crate::error::{CobraError, Result};
use crate::subscription::SubscriptionManager;
use rtmsockets::{FixedDelay, ReconnectionStrategy, TransportFactory, WsTransportFactory};
use serde_json::Value;
use states::*;
use std::sync::Arc;
use tracing::info;

/// Sub-protocol the Cobra server expects
pub const SUBPROTOCOL: &str = "json";

/// Type-state builder for [`CobraClient`]
///
/// `build()` only exists once both `config()` and `channel()` were called.
pub struct CobraClientBuilder<C, Ch>
where
    C: ConfigState,
    Ch: ChannelState,
{
    _state: TypeState<C, Ch>,
    config: Option<ConnectionConfig>,
    channel: Option<String>,
    filter: Option<String>,
    settings: ClientSettings,
    reconnect_strategy: Option<Box<dyn ReconnectionStrategy>>,
    transport_factory: Option<Arc<dyn TransportFactory>>,
    dispatcher: EventDispatcher,
}

impl CobraClientBuilder<NoConfig, NoChannel> {
    pub fn new() -> Self {
        Self {
            _state: TypeState::new(),
            config: None,
            channel: None,
            filter: None,
            settings: ClientSettings::default(),
            reconnect_strategy: None,
            transport_factory: None,
            dispatcher: EventDispatcher::new(),
        }
    }
}

impl Default for CobraClientBuilder<NoConfig, NoChannel> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C, Ch> CobraClientBuilder<C, Ch>
where
    C: ConfigState,
    Ch: ChannelState,
{
    fn transition<C2, Ch2>(self) -> CobraClientBuilder<C2, Ch2>
    where
        C2: ConfigState,
        Ch2: ChannelState,
    {
        CobraClientBuilder {
            _state: TypeState::new(),
            config: self.config,
            channel: self.channel,
            filter: self.filter,
            settings: self.settings,
            reconnect_strategy: self.reconnect_strategy,
            transport_factory: self.transport_factory,
            dispatcher: self.dispatcher,
        }
    }

    /// Server-side filter; defaults to ``SELECT * FROM `<channel>` ``
    pub fn filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn settings(mut self, settings: ClientSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Replace the fixed-delay strategy derived from the settings
    pub fn reconnect_strategy<S>(mut self, strategy: S) -> Self
    where
        S: ReconnectionStrategy + 'static,
    {
        self.reconnect_strategy = Some(Box::new(strategy));
        self
    }

    pub fn transport_factory(mut self, factory: Arc<dyn TransportFactory>) -> Self {
        self.transport_factory = Some(factory);
        self
    }

    /// Called once per delivered message, in arrival order
    pub fn on_message<F>(mut self, mut callback: F) -> Self
    where
        F: FnMut(Value) + Send + 'static,
    {
        self.dispatcher.on(EventKind::MessageReceived, move |event| {
            if let RtmEvent::MessageReceived(message) = event {
                callback(message);
            }
        });
        self
    }

    /// Called each time a connection authenticates, reconnects included
    pub fn on_authenticated<F>(mut self, mut callback: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        self.dispatcher.on(EventKind::Authenticated, move |_| callback());
        self
    }
}

impl<Ch: ChannelState> CobraClientBuilder<NoConfig, Ch> {
    pub fn config(mut self, config: ConnectionConfig) -> CobraClientBuilder<HasConfig, Ch> {
        self.config = Some(config);
        self.transition()
    }
}

impl<C: ConfigState> CobraClientBuilder<C, NoChannel> {
    pub fn channel(mut self, channel: impl Into<String>) -> CobraClientBuilder<C, HasChannel> {
        self.channel = Some(channel.into());
        self.transition()
    }
}

impl CobraClientBuilder<HasConfig, HasChannel> {
    /// Validate the configuration and start the connection task
    ///
    /// Returns as soon as the task is spawned; connecting happens in the
    /// background.
    pub async fn build(self) -> Result<CobraClient> {
        let config = self
            .config
            .ok_or_else(|| CobraError::Configuration("connection config not set".to_string()))?;
        let channel = self
            .channel
            .ok_or_else(|| CobraError::Configuration("channel not set".to_string()))?;

        config.validate().map_err(|e| CobraError::Configuration(e.to_string()))?;
        self.settings
            .validate()
            .map_err(|e| CobraError::Configuration(e.to_string()))?;
        if channel.trim().is_empty() {
            return Err(CobraError::Configuration("channel must not be empty".to_string()));
        }
        let url = config.url().map_err(|e| CobraError::Configuration(e.to_string()))?;

        let mut subscriptions = SubscriptionManager::new();
        subscriptions.subscribe(channel, self.filter);

        let strategy: Box<dyn ReconnectionStrategy> = match self.reconnect_strategy {
            Some(strategy) => strategy,
            None => Box::new(FixedDelay::new(
                self.settings.reconnect_delay(),
                self.settings.max_reconnect_attempts,
            )),
        };
        let factory: Arc<dyn TransportFactory> = match self.transport_factory {
            Some(factory) => factory,
            None => Arc::new(WsTransportFactory::new(Some(SUBPROTOCOL.to_string()))),
        };

        info!("Starting Cobra client for {} as role '{}'", config.endpoint, config.rolename);
        let (machine, events) = ConnectionStateMachine::new(
            url,
            AuthNegotiator::new(config.rolename, config.rolesecret),
            &self.settings,
            factory,
            subscriptions,
            self.dispatcher,
            strategy,
        );

        Ok(CobraClient::spawn(machine, events, self.settings.publish_timeout()))
    }
}
