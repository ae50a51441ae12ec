use std::time::Duration;

/// How long to wait before reconnecting, and when to stop trying
///
/// `attempt` counts reconnects since the last successful session, starting
/// at 0.
pub trait ReconnectionStrategy: Send + Sync {
    /// `None` means give up
    fn next_delay(&self, attempt: usize) -> Option<Duration>;

    fn should_reconnect(&self, attempt: usize) -> bool {
        self.next_delay(attempt).is_some()
    }
}

/// Optional cap on attempts shared by the bounded strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct AttemptLimit(Option<usize>);

impl AttemptLimit {
    fn allows(self, attempt: usize) -> bool {
        self.0.map_or(true, |max| attempt < max)
    }
}

/// Same delay before every attempt
///
/// `FixedDelay::default()` waits one second and never gives up.
#[derive(Debug, Clone)]
pub struct FixedDelay {
    delay: Duration,
    limit: AttemptLimit,
}

impl FixedDelay {
    pub fn new(delay: Duration, max_attempts: Option<usize>) -> Self {
        Self {
            delay,
            limit: AttemptLimit(max_attempts),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl Default for FixedDelay {
    fn default() -> Self {
        Self::new(Duration::from_millis(1000), None)
    }
}

impl ReconnectionStrategy for FixedDelay {
    fn next_delay(&self, attempt: usize) -> Option<Duration> {
        self.limit.allows(attempt).then_some(self.delay)
    }
}

/// `initial * 2^attempt`, capped at `max`
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    initial: Duration,
    max: Duration,
    limit: AttemptLimit,
}

impl ExponentialBackoff {
    pub fn new(initial_delay: Duration, max_delay: Duration, max_attempts: Option<usize>) -> Self {
        Self {
            initial: initial_delay,
            max: max_delay,
            limit: AttemptLimit(max_attempts),
        }
    }
}

impl ReconnectionStrategy for ExponentialBackoff {
    fn next_delay(&self, attempt: usize) -> Option<Duration> {
        if !self.limit.allows(attempt) {
            return None;
        }
        // Shifts past 31 would overflow; the cap applies long before that.
        let factor = 1u32.checked_shl(attempt.min(31) as u32).unwrap_or(u32::MAX);
        let delay = self.initial.checked_mul(factor).unwrap_or(self.max);
        Some(delay.min(self.max))
    }
}

/// Give up on the first disconnect
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverReconnect;

impl ReconnectionStrategy for NeverReconnect {
    fn next_delay(&self, _attempt: usize) -> Option<Duration> {
        None
    }
}
