//! Manifest text handling: comment stripping and JSON parsing.
//!
//! Sites routinely ship manifests with `//` or `/* */` comments, which
//! browsers tolerate. Comments are removed outside string literals before
//! parsing; everything else must be strict JSON.

use crate::types::ManifestParseError;
use serde_json::Value;

/// Remove `//` line comments and `/* */` block comments outside of strings.
///
/// Line comments keep their terminating newline. An unterminated block
/// comment swallows the rest of the input.
pub fn strip_json_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    let mut in_string = false;
    let mut escaped = false;

    while let Some(c) = chars.next() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        match (c, chars.peek()) {
            ('"', _) => {
                in_string = true;
                out.push(c);
            }
            ('/', Some('/')) => {
                for skipped in chars.by_ref() {
                    if skipped == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            ('/', Some('*')) => {
                chars.next();
                let mut prev = '\0';
                for skipped in chars.by_ref() {
                    if prev == '*' && skipped == '/' {
                        break;
                    }
                    prev = skipped;
                }
            }
            _ => out.push(c),
        }
    }

    out
}

/// Parse manifest text into a JSON object after stripping comments and a BOM.
pub fn parse_manifest(text: &str) -> Result<Value, ManifestParseError> {
    let text = text.trim_start_matches('\u{feff}');
    let stripped = strip_json_comments(text);
    if stripped.trim().is_empty() {
        return Err(ManifestParseError::Empty);
    }

    let value: Value = serde_json::from_str(&stripped)?;
    if !value.is_object() {
        return Err(ManifestParseError::NotAnObject);
    }
    Ok(value)
}
