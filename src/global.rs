use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use std::env;
use std::sync::Mutex;

pub static CMD_ARGS: Lazy<Mutex<Vec<String>>> = Lazy::new(|| Mutex::new(env::args().collect()));

// Startup timestamp, reported by /status and the Telegram /status command
pub static STARTUP_TIME: Lazy<DateTime<Utc>> = Lazy::new(Utc::now);

/// Check if debug logging is enabled via the command line.
pub fn is_debug_enabled() -> bool {
    if let Ok(args) = CMD_ARGS.lock() {
        args.contains(&"--debug".to_string())
    } else {
        false
    }
}

/// Seconds since process start, for uptime reporting.
pub fn uptime_seconds() -> u64 {
    (Utc::now() - *STARTUP_TIME).num_seconds().max(0) as u64
}
