use std::time::Duration;

/// Capped exponential backoff between reconnection attempts.
///
/// The n-th consecutive failure (0-based) waits `min(base * 2^n, cap)`. Once
/// `max_attempts` delays have been handed out, `next_delay` returns `None` until
/// the policy is reset.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    attempt: u32,
    max_attempts: u32,
    base: Duration,
    cap: Duration,
}

impl ReconnectPolicy {
    pub fn new(base: Duration, cap: Duration, max_attempts: u32) -> Self {
        Self {
            attempt: 0,
            max_attempts,
            base,
            cap,
        }
    }

    /// Consumes one attempt and returns how long to wait before it.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.is_exhausted() {
            return None;
        }
        let factor = 2u32.saturating_pow(self.attempt);
        let delay = self.base.saturating_mul(factor).min(self.cap);
        self.attempt += 1;
        Some(delay)
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn is_exhausted(&self) -> bool {
        self.attempt >= self.max_attempts
    }
}
