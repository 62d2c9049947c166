//! Exponential backoff with jitter.

use std::time::Duration;

use rand::Rng;

/// Calculate the wait after `attempt` failed attempts.
///
/// Doubles from `min` with each attempt, adds up to 10% jitter, and always
/// stays within `[min, max]`.
pub fn calculate_backoff(attempt: u32, min: Duration, max: Duration) -> Duration {
    let max = max.max(min);
    if attempt == 0 {
        return min;
    }

    let base_ms = min.as_millis() as u64;
    let max_ms = max.as_millis() as u64;

    let exponential_base = 2u64.saturating_pow(attempt - 1);
    let delay_ms = base_ms.saturating_mul(exponential_base);
    let capped_delay = delay_ms.min(max_ms);

    // Apply jitter (0 to 10% of the delay)
    let jitter_range = capped_delay / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(capped_delay.saturating_add(jitter)).clamp(min, max)
}
