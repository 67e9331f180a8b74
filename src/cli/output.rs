//! Output Formatting
//!
//! Formats command results for display.

use serde_json::Value;

/// Format a result as pretty JSON, or compact JSON in raw mode
pub fn format_value(value: &Value, raw: bool) -> String {
    let formatted = if raw {
        serde_json::to_string(value)
    } else {
        serde_json::to_string_pretty(value)
    };
    formatted.unwrap_or_else(|_| value.to_string())
}
