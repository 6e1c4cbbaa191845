//! Timing helper for ad-hoc measurements

use std::time::{Duration, Instant};

use tracing::info;

/// Run `f`, log how long it took under `label`, and return both
pub fn measure<R>(label: &str, f: impl FnOnce() -> R) -> (R, Duration) {
    let start = Instant::now();
    let value = f();
    let elapsed = start.elapsed();

    info!(label, elapsed_ms = elapsed.as_secs_f64() * 1000.0, "measured");
    (value, elapsed)
}
