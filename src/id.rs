//! ID generation utilities for Director
//!
//! Provides functions for generating unique identifiers for workers and events.

use rand::Rng;

/// Get current timestamp in milliseconds since Unix epoch
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// Generate a worker ID for a slot within a shift
///
/// Format: `w-{shift:04}-{index:03}-{seed_hex}`
/// Example: `w-0012-007-a1b2`
///
/// Shift number and slot index make the ID unique within one director.
/// The suffix folds the worker's seed, so a seeded run replays its IDs.
pub fn generate_worker_id(shift_number: u64, index: usize, seed: u64) -> String {
    let suffix = (seed ^ (seed >> 16) ^ (seed >> 32) ^ (seed >> 48)) as u16;
    format!("w-{:04}-{:03}-{:04x}", shift_number, index, suffix)
}

/// Generate an event ID
///
/// Format: `{prefix}-{timestamp_ms}-{random_hex}`
pub fn generate_event_id(prefix: &str) -> String {
    let timestamp = now_ms();
    let random: u16 = rand::rng().random();
    format!("{}-{}-{:04x}", prefix, timestamp, random)
}
