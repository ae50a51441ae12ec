use crate::protocol::{Pdu, RequestId};

/// Filter used when a subscription names none
pub fn default_filter(channel: &str) -> String {
    format!("SELECT * FROM `{}`", channel)
}

/// A channel plus an optional server-side filter expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub channel: String,
    pub filter: Option<String>,
}

impl Subscription {
    pub fn new(channel: impl Into<String>, filter: Option<String>) -> Self {
        Self {
            channel: channel.into(),
            filter,
        }
    }

    /// The filter sent on the wire; blank filters fall back to the default
    pub fn effective_filter(&self) -> String {
        match self.filter.as_deref().map(str::trim) {
            Some(filter) if !filter.is_empty() => filter.to_string(),
            _ => default_filter(&self.channel),
        }
    }

    /// The server names a subscription after its channel unless told otherwise
    pub fn subscription_id(&self) -> &str {
        &self.channel
    }
}

/// Tracks the single subscription intent and what is live on the wire
///
/// Changing the intent never touches the socket by itself; the connection
/// decides when to materialize it. The last stream position seen survives
/// reconnects so the next subscribe resumes from it, and is forgotten when
/// the intent moves to another channel.
#[derive(Debug, Default)]
pub struct SubscriptionManager {
    current: Option<Subscription>,
    active: Option<String>,
    pending: Option<(RequestId, String)>,
    position: Option<String>,
}

impl SubscriptionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a new intent, returning the one it replaced
    pub fn subscribe(&mut self, channel: impl Into<String>, filter: Option<String>) -> Option<Subscription> {
        let next = Subscription::new(channel, filter);
        if self.current.as_ref().map(|sub| sub.channel.as_str()) != Some(next.channel.as_str()) {
            self.position = None;
        }
        self.current.replace(next)
    }

    pub fn current(&self) -> Option<&Subscription> {
        self.current.as_ref()
    }

    pub fn has_intent(&self) -> bool {
        self.current.is_some()
    }

    /// Build the subscribe request for the current intent
    pub fn materialize(&self, id: RequestId) -> Option<Pdu> {
        self.current.as_ref().map(|sub| Pdu::SubscribeRequest {
            id,
            channel: sub.channel.clone(),
            filter: Some(sub.effective_filter()),
            position: self.position.clone(),
        })
    }

    /// Note that subscribe request `id` went out for the current intent
    ///
    /// Pushes for it are accepted right away; the reply only confirms it.
    pub fn mark_sent(&mut self, id: RequestId) {
        if let Some(subscription_id) = self.current.as_ref().map(|sub| sub.subscription_id().to_string()) {
            self.pending = Some((id, subscription_id.clone()));
            self.active = Some(subscription_id);
        }
    }

    /// Apply a subscribe reply; false when it answers no outstanding request
    pub fn confirm(&mut self, id: RequestId, subscription_id: Option<String>, position: Option<String>) -> bool {
        match self.pending.take() {
            Some((pending_id, requested)) if pending_id == id => {
                self.active = Some(subscription_id.unwrap_or(requested));
                if position.is_some() {
                    self.position = position;
                }
                true
            }
            other => {
                self.pending = other;
                false
            }
        }
    }

    /// Record the stream position of a delivered push
    pub fn record_position(&mut self, position: String) {
        self.position = Some(position);
    }

    pub fn position(&self) -> Option<&str> {
        self.position.as_deref()
    }

    /// Record the subscription id the server is now delivering on
    pub fn mark_active(&mut self, subscription_id: impl Into<String>) {
        self.active = Some(subscription_id.into());
    }

    pub fn active(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn take_active(&mut self) -> Option<String> {
        self.pending = None;
        self.active.take()
    }

    /// Forget wire state after the socket is gone; intent and position survive
    pub fn reset_wire(&mut self) {
        self.active = None;
        self.pending = None;
    }
}
