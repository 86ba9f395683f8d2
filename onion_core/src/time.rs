/*! Functions to work with time
*/

use std::time::{Duration, Instant};

/// Return current time. It's taken from tokio so that tests can pause and
/// advance it.
pub fn clock_now() -> Instant {
    tokio::time::Instant::now().into_std()
}

/// Returns the amount of time elapsed since this instant was created.
pub fn clock_elapsed(time: Instant) -> Duration {
    clock_now() - time
}
