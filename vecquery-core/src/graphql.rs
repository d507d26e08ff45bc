//! GraphQL literal rendering shared by the request model.

use std::fmt::Write;

/// True when `value` matches the GraphQL name grammar `[_A-Za-z][_0-9A-Za-z]*`.
pub fn is_name(value: &str) -> bool {
    let mut chars = value.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Render `value` as a quoted GraphQL string literal.
pub fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for ch in value.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0c}' => out.push_str("\\f"),
            c if (c as u32) < 0x20 => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Render a list of strings as `["a","b"]`.
pub fn quote_list<S: AsRef<str>>(values: &[S]) -> String {
    let items: Vec<String> = values.iter().map(|v| quote(v.as_ref())).collect();
    format!("[{}]", items.join(","))
}

/// Render a finite float. `Display` never emits exponent notation.
pub fn float<T: std::fmt::Display>(value: T) -> String {
    format!("{}", value)
}

/// Render an `f32` slice as `[0.1,0.2]` using the shortest round-trip form.
pub fn vector(values: &[f32]) -> String {
    let items: Vec<String> = values.iter().map(|v| float(*v)).collect();
    format!("[{}]", items.join(","))
}
