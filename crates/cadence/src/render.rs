//! Plain-terminal rendering of log entries.

use std::io::{self, IsTerminal, Write};

use crossterm::style::Stylize;
use serde_json::Value;

use crate::log_buffer::{LogEntry, LogSink, Severity};

const MAX_MESSAGE_CHARS: usize = 2048;
pub const EMPTY_LOG_TEXT: &str = "No logs yet. Start performing actions to see results here.";

/// Strips control characters (including ANSI escapes and bidi overrides) from
/// text that may have come from the remote service, and caps its length.
pub fn sanitize_message(input: &str) -> String {
    let mut out = String::with_capacity(input.len().min(MAX_MESSAGE_CHARS));
    let mut in_escape = false;
    let mut count = 0usize;
    for c in input.chars() {
        if in_escape {
            // CSI sequences end on a final byte in '@'..='~'.
            if ('@'..='~').contains(&c) && c != '[' {
                in_escape = false;
            }
            continue;
        }
        match c {
            '\x1b' => in_escape = true,
            '\t' | '\n' | '\r' => {
                out.push(' ');
                count += 1;
            }
            c if c.is_control() || is_bidi_control(c) => {}
            c => {
                out.push(c);
                count += 1;
            }
        }
        if count >= MAX_MESSAGE_CHARS {
            out.push_str(" ...[truncated]");
            break;
        }
    }
    out
}

fn is_bidi_control(c: char) -> bool {
    matches!(c, '\u{061C}' | '\u{200E}' | '\u{200F}')
        || ('\u{202A}'..='\u{202E}').contains(&c)
        || ('\u{2066}'..='\u{2069}').contains(&c)
}

fn severity_tag(severity: Severity, color: bool) -> String {
    let label = severity.as_str().to_ascii_uppercase();
    if !color {
        return label;
    }
    match severity {
        Severity::Info => label.cyan().to_string(),
        Severity::Success => label.green().to_string(),
        Severity::Warning => label.yellow().to_string(),
        Severity::Error => label.red().bold().to_string(),
    }
}

pub fn format_payload(payload: &Value) -> String {
    let pretty = serde_json::to_string_pretty(payload).unwrap_or_else(|_| payload.to_string());
    let mut out = String::from("  Response Data:\n");
    for line in pretty.lines() {
        out.push_str("    ");
        out.push_str(line);
        out.push('\n');
    }
    out
}

/// `[HH:MM:SS] SEVERITY message`, followed by the indented raw payload when
/// the entry carries one.
pub fn format_entry(entry: &LogEntry, color: bool) -> String {
    let mut out = format!(
        "[{}] {} {}\n",
        entry.time_label(),
        severity_tag(entry.severity(), color),
        sanitize_message(entry.message())
    );
    if let Some(payload) = entry.raw_response() {
        out.push_str(&format_payload(payload));
    }
    out
}

/// Newest first, like the buffer itself.
pub fn format_log(entries: &[LogEntry], color: bool) -> String {
    if entries.is_empty() {
        return format!("{EMPTY_LOG_TEXT}\n");
    }
    entries.iter().map(|e| format_entry(e, color)).collect()
}

/// Streams each appended entry to stdout as it happens.
pub struct ConsoleSink {
    color: bool,
    show_payloads: bool,
}

impl ConsoleSink {
    pub fn new(show_payloads: bool) -> Self {
        Self {
            color: io::stdout().is_terminal(),
            show_payloads,
        }
    }
}

impl LogSink for ConsoleSink {
    fn entry_appended(&self, entry: &LogEntry) {
        let text = if self.show_payloads {
            format_entry(entry, self.color)
        } else {
            format!(
                "[{}] {} {}\n",
                entry.time_label(),
                severity_tag(entry.severity(), self.color),
                sanitize_message(entry.message())
            )
        };
        let mut stdout = io::stdout().lock();
        let _ = stdout.write_all(text.as_bytes());
        let _ = stdout.flush();
    }
}
