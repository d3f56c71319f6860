//! Output formatting for CLI commands

use serde::Serialize;

/// Format output as pretty JSON (non-ASCII kept as-is)
pub fn format_output<T: Serialize>(data: &T) -> String {
    serde_json::to_string_pretty(data).unwrap_or_else(|_| "{}".to_string())
}

/// Print JSON output to stdout
pub fn print_output<T: Serialize>(data: &T) {
    println!("{}", format_output(data));
}
