//! Alert rule evaluation over parsed transfer events.

mod engine;

pub use engine::AlertEngine;

/// Cooldown key for the cumulative-volume rule of one (mint, direction).
pub fn cumulative_cooldown_key(mint: &str, direction: crate::events::Direction) -> String {
    format!("{}:{}:cumulative", mint, direction.as_str())
}

/// Sells in a row required to trigger the sequential-sells rule.
pub const SEQUENTIAL_SELLS_TRIGGER: u64 = 5;
