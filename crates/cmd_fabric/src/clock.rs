//! Monotonic clock helper.
//!
//! All fabric timestamps are nanoseconds on a process-local monotonic
//! epoch; wall-clock time never enters the core.

use std::sync::OnceLock;
use std::time::Instant;

static EPOCH: OnceLock<Instant> = OnceLock::new();

/// Nanoseconds since the first call in this process. Monotonic.
pub fn monotonic_nanos() -> u64 {
    let epoch = EPOCH.get_or_init(Instant::now);
    epoch.elapsed().as_nanos() as u64
}
