// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Multi-line, human readable record rendering. Debug aid only.

use serde_json::Value;

use super::Record;

const TRUNCATION_MARK: &str = "..";

// '| ' + ' | ' + ' |'
const BORDER_OVERHEAD: usize = 7;

impl Record {
    /// Render the record as an aligned key/value table.
    ///
    /// Column widths come from the longest key and value, with the value
    /// column bounded so a line fits in `width`. Longer values are cut and
    /// end in `..`. Output depends only on the record, so it is stable for
    /// snapshots.
    pub fn format_for_display(&self, width: usize, header: bool, border: bool) -> String {
        let attrs: Vec<(String, String)> = self
            .fields()
            .map(|(k, v)| (k.to_string(), display_value(v)))
            .collect();

        let max_key_len = attrs.iter().map(|(k, _)| char_len(k)).max().unwrap_or(0);
        let longest_value = attrs.iter().map(|(_, v)| char_len(v)).max().unwrap_or(0);

        let mut max_value_len = width.saturating_sub(max_key_len);
        if border {
            max_value_len = max_value_len.saturating_sub(BORDER_OVERHEAD);
        }
        let max_value_len = max_value_len.min(longest_value);

        let line_len = max_key_len + max_value_len + if border { BORDER_OVERHEAD } else { 2 };

        let border_line = format!(
            "+-{}-+-{}-+",
            "-".repeat(max_key_len),
            "-".repeat(max_value_len)
        );

        let mut lines = Vec::new();

        if header {
            let serial = self
                .serial()
                .map(|s| s.to_string())
                .unwrap_or_else(|| "none".to_string());
            let title = format!("{} [{}]", self.record_type(), serial);
            if border {
                let inner = line_len.saturating_sub(4);
                lines.push(border_line.clone());
                lines.push(format!("| {} |", pad(&title, inner)));
            } else {
                lines.push(title);
            }
        }

        if border {
            lines.push(border_line.clone());
        }

        for (key, value) in &attrs {
            let value = if char_len(value) > max_value_len {
                truncate(value, max_value_len)
            } else {
                pad(value, max_value_len)
            };

            if border {
                lines.push(format!("| {} | {} |", pad(key, max_key_len), value));
            } else {
                let key = format!("{}:", key);
                lines.push(format!("{} {}", pad(&key, max_key_len + 1), value));
            }
        }

        if border {
            lines.push(border_line);
        }

        lines.join("\n")
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::Null => "none".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn pad(s: &str, width: usize) -> String {
    format!("{:<width$}", s, width = width)
}

/// Cut `s` to exactly `width` chars, ending in as much of the marker as fits.
fn truncate(s: &str, width: usize) -> String {
    let keep = width.saturating_sub(TRUNCATION_MARK.len());
    let mut out: String = s.chars().take(keep).collect();
    out.extend(TRUNCATION_MARK.chars().take(width - keep));
    out
}
