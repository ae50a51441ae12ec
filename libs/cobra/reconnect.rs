use crate::error::CloseCause;
use rtmsockets::ReconnectionStrategy;
use std::time::Duration;
use tracing::{debug, warn};

/// What to do after a connection ended without being asked to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Start a fresh connection after `delay`
    Retry { delay: Duration, attempt: usize },
    /// A restart is already scheduled; ignore this close
    AlreadyRestarting,
    /// Stop for good
    GiveUp,
}

/// Decides whether and when to restart after an unexpected close
///
/// Wraps a [`ReconnectionStrategy`] for the delay and adds the rules the
/// strategy knows nothing about: the overlap guard, the stop flag and the
/// cap on consecutive authentication rejections.
pub struct ReconnectPolicy {
    strategy: Box<dyn ReconnectionStrategy>,
    max_auth_rejections: Option<usize>,
    attempt: usize,
    auth_rejections: usize,
    restarting: bool,
    stopped: bool,
}

impl ReconnectPolicy {
    pub fn new(strategy: Box<dyn ReconnectionStrategy>, max_auth_rejections: Option<usize>) -> Self {
        Self {
            strategy,
            max_auth_rejections,
            attempt: 0,
            auth_rejections: 0,
            restarting: false,
            stopped: false,
        }
    }

    pub fn on_unexpected_close(&mut self, cause: CloseCause) -> Decision {
        if self.stopped {
            return Decision::GiveUp;
        }
        if self.restarting {
            debug!("Restart already scheduled, ignoring close");
            return Decision::AlreadyRestarting;
        }

        if cause == CloseCause::AuthRejected {
            self.auth_rejections += 1;
            if let Some(max) = self.max_auth_rejections {
                if self.auth_rejections >= max {
                    warn!("Authentication rejected {} times in a row, giving up", self.auth_rejections);
                    return Decision::GiveUp;
                }
            }
        }

        match self.strategy.next_delay(self.attempt) {
            Some(delay) => {
                let attempt = self.attempt;
                self.attempt += 1;
                self.restarting = true;
                Decision::Retry { delay, attempt }
            }
            None => {
                warn!("Reconnection strategy exhausted after {} attempts", self.attempt);
                Decision::GiveUp
            }
        }
    }

    /// The scheduled restart has begun
    pub fn on_restart(&mut self) {
        self.restarting = false;
    }

    /// A connection authenticated; consecutive-failure counters start over
    pub fn on_authenticated(&mut self) {
        self.attempt = 0;
        self.auth_rejections = 0;
    }

    pub fn stop(&mut self) {
        self.stopped = true;
        self.restarting = false;
    }

    pub fn is_restarting(&self) -> bool {
        self.restarting
    }

    pub fn auth_rejections(&self) -> usize {
        self.auth_rejections
    }
}
