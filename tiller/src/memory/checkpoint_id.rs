//! Sortable checkpoint id minting.
//!
//! Ids are fixed-width epoch microseconds plus a short random suffix, e.g.
//! `0001722470123456789-3f9a2c`. Fixed width makes lexicographic order equal to
//! creation order; the suffix disambiguates ids minted by different processes. A
//! process-wide atomic register keeps ids strictly increasing even when the clock
//! ties or steps backwards.

use std::sync::atomic::{AtomicU64, Ordering};

/// The last microsecond timestamp used, to enforce strict monotonicity.
static LAST_MICROS: AtomicU64 = AtomicU64::new(0);

fn next_micros() -> u64 {
    let now = chrono::Utc::now().timestamp_micros().max(0) as u64;
    let mut last = LAST_MICROS.load(Ordering::Relaxed);
    loop {
        let candidate = if now > last { now } else { last + 1 };
        match LAST_MICROS.compare_exchange_weak(
            last,
            candidate,
            Ordering::Relaxed,
            Ordering::Relaxed,
        ) {
            Ok(_) => return candidate,
            Err(observed) => last = observed,
        }
    }
}

/// Mints a new checkpoint id, strictly greater (lexicographically) than any id this
/// process has minted before.
pub fn next_checkpoint_id() -> String {
    let micros = next_micros();
    let suffix = &uuid::Uuid::new_v4().simple().to_string()[..6];
    format!("{micros:019}-{suffix}")
}
