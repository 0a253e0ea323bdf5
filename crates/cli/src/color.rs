// SPDX-License-Identifier: MIT

//! ANSI color helpers for `view_status`/`outage_summary` output. No clap
//! dependency here — this binary has no interactive subcommand surface,
//! just task-mode text output.

use std::io::IsTerminal;

pub mod codes {
    /// Section headers: pastel cyan / steel blue.
    pub const HEADER: u8 = 74;
    /// Descriptions and context: medium grey.
    pub const CONTEXT: u8 = 245;
    /// Muted / secondary text: darker grey.
    pub const MUTED: u8 = 240;
}

/// Priority: `NO_COLOR=1` disables, `COLOR=1` forces, otherwise a TTY check.
pub fn should_colorize() -> bool {
    if std::env::var("NO_COLOR").is_ok_and(|v| v == "1") {
        return false;
    }
    if std::env::var("COLOR").is_ok_and(|v| v == "1") {
        return true;
    }
    std::io::stdout().is_terminal()
}

fn fg256(code: u8) -> String {
    format!("\x1b[38;5;{code}m")
}

const RESET: &str = "\x1b[0m";

pub fn header(text: &str) -> String {
    if should_colorize() {
        format!("{}{}{}", fg256(codes::HEADER), text, RESET)
    } else {
        text.to_string()
    }
}

pub fn context(text: &str) -> String {
    if should_colorize() {
        format!("{}{}{}", fg256(codes::CONTEXT), text, RESET)
    } else {
        text.to_string()
    }
}

pub fn muted(text: &str) -> String {
    if should_colorize() {
        format!("{}{}{}", fg256(codes::MUTED), text, RESET)
    } else {
        text.to_string()
    }
}

pub fn green(text: &str) -> String {
    if !should_colorize() {
        return text.to_string();
    }
    format!("\x1b[32m{text}{RESET}")
}

pub fn yellow(text: &str) -> String {
    if !should_colorize() {
        return text.to_string();
    }
    format!("\x1b[33m{text}{RESET}")
}

/// Colorize a status word based on its semantic meaning for this pipeline's
/// domain (queue rows, breaker state, reconciliation outcomes).
///
/// - Green: synced, completed, closed, healthy, ok
/// - Yellow: pending, queued, retrying, half_open, waiting, checking
/// - Red: failed, dead, open, dlq, error
/// - Default (no color): unrecognized words
pub fn status(text: &str) -> String {
    if !should_colorize() {
        return text.to_string();
    }
    let lower = text.trim_start().to_lowercase();
    let first_word = lower.split(|c: char| !c.is_alphanumeric()).next().unwrap_or("");
    let code = match first_word {
        "synced" | "completed" | "closed" | "healthy" | "ok" => "\x1b[32m",
        "pending" | "queued" | "retrying" | "half_open" | "waiting" | "checking" => "\x1b[33m",
        "failed" | "dead" | "open" | "dlq" | "error" => "\x1b[31m",
        _ => return text.to_string(),
    };
    format!("{code}{text}{RESET}")
}

/// Apply a color unconditionally — used by [`crate::table::Table`], which
/// has already decided whether to colorize and applies it after padding.
pub fn apply_header(text: &str) -> String {
    format!("{}{}{}", fg256(codes::HEADER), text, RESET)
}

pub fn apply_muted(text: &str) -> String {
    format!("{}{}{}", fg256(codes::MUTED), text, RESET)
}

pub fn apply_status(text: &str) -> String {
    let lower = text.trim_start().to_lowercase();
    let first_word = lower.split(|c: char| !c.is_alphanumeric()).next().unwrap_or("");
    let code = match first_word {
        "synced" | "completed" | "closed" | "healthy" | "ok" => "\x1b[32m",
        "pending" | "queued" | "retrying" | "half_open" | "waiting" | "checking" => "\x1b[33m",
        "failed" | "dead" | "open" | "dlq" | "error" => "\x1b[31m",
        _ => return text.to_string(),
    };
    format!("{code}{text}{RESET}")
}
