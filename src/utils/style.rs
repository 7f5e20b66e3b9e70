// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeflow contributors

//! Terminal styling

use colored::Colorize;

use crate::Value;

/// Kind of a status line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    Error,
    Warning,
}

impl Status {
    fn marker(self) -> colored::ColoredString {
        match self {
            Self::Ok => "✓".green(),
            Self::Error => "✗".red(),
            Self::Warning => "⚠".yellow(),
        }
    }
}

/// Print an indented line prefixed with a status marker
pub fn print_status(status: Status, msg: &str) {
    println!("  {} {}", status.marker(), msg);
}

/// Print a bold section title preceded by a blank line
pub fn print_section(title: &str) {
    println!();
    println!("{}:", title.bold());
}

/// Compact rendering of a value; strings are shown without quotes
pub fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// `(a, b, c)`, or `()` for no arguments
pub fn format_args_list(args: &[String]) -> String {
    format!("({})", args.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(&json!("abc")), "abc");
        assert_eq!(format_value(&json!(3)), "3");
        assert_eq!(format_value(&json!([1, 2])), "[1,2]");
    }

    #[test]
    fn test_format_args_list() {
        assert_eq!(format_args_list(&[]), "()");
        assert_eq!(format_args_list(&["a".into(), "b".into()]), "(a, b)");
    }
}
