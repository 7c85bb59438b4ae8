//! Query Result Formatter Module
//!
//! Renders a [`QueryResult`] as plain text for chat replies and streamed
//! progress. The layout depends on the result's shape:
//!
//! - Single value: `42`
//! - Single row: `name: "Quinoa", quantity: 0`
//! - Multiple rows: a header line followed by numbered rows

use serde_json::Value as JsonValue;
use std::fmt::Write;

use crate::executor::QueryResult;

/// Formats query results in a compact, human-readable format
#[must_use]
pub fn format_query_result(result: &QueryResult) -> String {
    if result.rows.is_empty() {
        return "No results returned.".to_string();
    }

    if result.rows.len() == 1 {
        let row = &result.rows[0];
        if row.len() == 1 {
            // Single field: just return the value
            return format_value(&row[0]);
        }

        let fields: Vec<String> = result
            .columns
            .iter()
            .zip(row)
            .map(|(column, value)| format!("{column}: {}", format_value(value)))
            .collect();
        return fields.join(", ");
    }

    let mut res = String::new();
    writeln!(res, "{}", result.columns.join(" | ")).unwrap();

    for (idx, row) in result.rows.iter().enumerate() {
        let values: Vec<String> = row.iter().map(format_value).collect();
        writeln!(res, "{}. {}", idx + 1, values.join(" | ")).unwrap();
    }

    res.trim_end().to_string()
}

/// Formats a single decoded value
fn format_value(value: &JsonValue) -> String {
    match value {
        JsonValue::Null => "NULL".to_string(),
        JsonValue::String(s) => format!("\"{s}\""),
        JsonValue::Array(arr) => {
            let elements: Vec<String> = arr.iter().map(format_value).collect();
            format!("[{}]", elements.join(", "))
        }
        other => other.to_string(),
    }
}
