use rand::Rng;
use std::time::Duration;
use tokio::time::sleep;

/// Suspend the current task for `ms` milliseconds.
pub async fn sleep_ms(ms: u64) {
    sleep(Duration::from_millis(ms)).await;
}

/// Suspend for a uniformly random duration in `[min_ms, max_ms]`.
pub async fn sleep_range_ms(min_ms: u64, max_ms: u64) {
    let ms = random_ms(min_ms, max_ms);
    sleep(Duration::from_millis(ms)).await;
}

fn random_ms(min_ms: u64, max_ms: u64) -> u64 {
    if max_ms <= min_ms {
        return min_ms;
    }
    rand::rng().random_range(min_ms..=max_ms)
}
