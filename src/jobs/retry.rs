// src/jobs/retry.rs
//
// Exponential backoff with jitter, keyed off attempt count. A small
// deterministic-shape helper rather than a backoff crate: the curve here
// is simple enough not to warrant one.

use rand::Rng;
use std::time::Duration;

const BASE_SECS: u64 = 2;
const MAX_SECS: u64 = 60 * 30;

/// Delay before the next retry, given the attempt count that just failed.
/// `2^attempt` seconds, capped, with up to 20% jitter so a burst of jobs
/// retrying together doesn't wake up in lockstep.
pub fn backoff(attempt: i32) -> Duration {
    let exp = attempt.clamp(0, 20) as u32;
    let base = BASE_SECS.saturating_mul(1u64 << exp).min(MAX_SECS);

    let jitter_frac = rand::rng().random_range(0.0..0.2);
    let jittered = (base as f64) * (1.0 + jitter_frac);
    Duration::from_secs_f64(jittered)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grows_with_attempt_and_stays_capped() {
        let first = backoff(0);
        let later = backoff(10);
        assert!(first < later);
        assert!(later <= Duration::from_secs(MAX_SECS) * 2);
    }
}
