use std::time::Duration;

use rand::Rng;

/// Backoff and dead-letter rules applied on negative acknowledgement.
///
/// A nacked job is held back for `backoff + jitter`, where jitter is drawn
/// uniformly from `[0, jitter]` on every call so that consumers failing
/// together do not retry together.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub backoff: Duration,
    pub jitter: Duration,
    pub max_retries: u32,
}

impl RetryPolicy {
    pub fn new(backoff: Duration, jitter: Duration, max_retries: u32) -> Self {
        Self {
            backoff,
            jitter,
            max_retries,
        }
    }

    /// Delay before a nacked job is eligible again
    pub fn next_delay(&self) -> Duration {
        self.next_delay_with(&mut rand::thread_rng())
    }

    /// Same as `next_delay` with a caller-supplied rng
    pub fn next_delay_with<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        let ceiling = u64::try_from(self.jitter.as_millis()).unwrap_or(u64::MAX);
        let jitter_ms = if ceiling == 0 {
            0
        } else {
            rng.gen_range(0..=ceiling)
        };
        self.backoff.saturating_add(Duration::from_millis(jitter_ms))
    }

    /// Jobs past the ceiling are never claimed or counted again
    pub fn is_dead_lettered(&self, retries: u32) -> bool {
        retries > self.max_retries
    }
}
