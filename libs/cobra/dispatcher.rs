use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// Event names a callback can be registered for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Authenticated,
    MessageReceived,
}

/// A consumer notification
#[derive(Debug, Clone, PartialEq)]
pub enum RtmEvent {
    Authenticated,
    MessageReceived(Value),
}

impl RtmEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            RtmEvent::Authenticated => EventKind::Authenticated,
            RtmEvent::MessageReceived(_) => EventKind::MessageReceived,
        }
    }
}

pub type EventCallback = Box<dyn FnMut(RtmEvent) + Send>;

/// One callback per event kind, invoked synchronously on the connection task
#[derive(Default)]
pub struct EventDispatcher {
    callbacks: HashMap<EventKind, EventCallback>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` for `kind`, replacing any earlier registration
    pub fn on<F>(&mut self, kind: EventKind, callback: F)
    where
        F: FnMut(RtmEvent) + Send + 'static,
    {
        self.callbacks.insert(kind, Box::new(callback));
    }

    pub fn has(&self, kind: EventKind) -> bool {
        self.callbacks.contains_key(&kind)
    }

    /// Deliver `event`; a kind with no callback is dropped silently
    pub fn fire(&mut self, event: RtmEvent) {
        if let Some(callback) = self.callbacks.get_mut(&event.kind()) {
            callback(event);
        }
    }
}

impl fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("registered", &self.callbacks.keys().collect::<Vec<_>>())
            .finish()
    }
}
