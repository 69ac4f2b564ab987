//! Structured console logging for mintwatch
//!
//! Fixed-width colored prefixes, standard levels, and debug filtering
//! driven by the `--debug` command-line flag.
//!
//! ```rust,ignore
//! use mintwatch::logger::{self, LogTag};
//!
//! logger::info(LogTag::Webhook, "Batch accepted: 3 events");
//! logger::warning(LogTag::Prices, "DexScreener returned no pairs");
//! logger::debug(LogTag::Store, "ZADD mint:buy 1700000000"); // only with --debug
//! ```

use chrono::Local;
use colored::*;

use crate::global;

/// Width of the tag column, brackets excluded.
const TAG_WIDTH: usize = 9;
/// Width of the level column, brackets excluded.
const LEVEL_WIDTH: usize = 7;

/// Log tags for categorizing log messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTag {
    Webhook,
    Parser,
    Alerts,
    Prices,
    Store,
    Notify,
    Telegram,
    Scheduler,
    Webserver,
    Database,
    Helius,
    System,
}

impl LogTag {
    fn as_str(&self) -> &'static str {
        match self {
            LogTag::Webhook => "WEBHOOK",
            LogTag::Parser => "PARSER",
            LogTag::Alerts => "ALERTS",
            LogTag::Prices => "PRICES",
            LogTag::Store => "STORE",
            LogTag::Notify => "NOTIFY",
            LogTag::Telegram => "TELEGRAM",
            LogTag::Scheduler => "SCHEDULER",
            LogTag::Webserver => "WEBSERVER",
            LogTag::Database => "DATABASE",
            LogTag::Helius => "HELIUS",
            LogTag::System => "SYSTEM",
        }
    }

    fn colored(&self) -> ColoredString {
        let padded = format!("{:<width$}", self.as_str(), width = TAG_WIDTH);
        match self {
            LogTag::Webhook => padded.bright_cyan().bold(),
            LogTag::Parser => padded.cyan().bold(),
            LogTag::Alerts => padded.bright_red().bold(),
            LogTag::Prices => padded.bright_blue().bold(),
            LogTag::Store => padded.bright_magenta().bold(),
            LogTag::Notify => padded.bright_green().bold(),
            LogTag::Telegram => padded.blue().bold(),
            LogTag::Scheduler => padded.yellow().bold(),
            LogTag::Webserver => padded.bright_yellow().bold(),
            LogTag::Database => padded.magenta().bold(),
            LogTag::Helius => padded.green().bold(),
            LogTag::System => padded.white().bold(),
        }
    }
}

/// Log at ERROR level (always shown).
pub fn error(tag: LogTag, message: &str) {
    print_line(tag, "ERROR", message);
}

/// Log at WARNING level (always shown).
pub fn warning(tag: LogTag, message: &str) {
    print_line(tag, "WARN", message);
}

/// Log at INFO level (always shown).
pub fn info(tag: LogTag, message: &str) {
    print_line(tag, "INFO", message);
}

/// Log at DEBUG level. Only shown when the process was started with `--debug`.
pub fn debug(tag: LogTag, message: &str) {
    if global::is_debug_enabled() {
        print_line(tag, "DEBUG", message);
    }
}

fn print_line(tag: LogTag, level: &str, message: &str) {
    let time = Local::now().format("%H:%M:%S").to_string();

    let level_str = format!("{:<width$}", level, width = LEVEL_WIDTH);
    let level_colored = match level {
        "ERROR" => level_str.bright_red().bold(),
        "WARN" => level_str.bright_yellow().bold(),
        "DEBUG" => level_str.bright_black().bold(),
        _ => level_str.bright_blue().bold(),
    };

    println!(
        "{} [{}] [{}] {}",
        time.dimmed(),
        tag.colored(),
        level_colored,
        message.bright_white()
    );
}
