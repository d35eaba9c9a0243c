//! Balanced-bracket extraction.
//!
//! All structural characters (`[ ] { } " \`) are ASCII, so the scan walks
//! bytes and every returned slice boundary falls on a UTF-8 char boundary.

use serde::de::DeserializeOwned;

/// Extract the first balanced structure starting at the first `[` or `{`.
///
/// Returns `None` if the text has no opening bracket, if the structure is
/// never closed, or if a closer does not match its opener.
#[must_use]
pub fn extract_balanced(text: &str) -> Option<&str> {
    let start = text.find(['[', '{'])?;
    scan_from(text, start)
}

/// Extract the first balanced array, starting at the first `[`.
#[must_use]
pub fn extract_array(text: &str) -> Option<&str> {
    let start = text.find('[')?;
    scan_from(text, start)
}

/// Extract the first balanced object, starting at the first `{`.
#[must_use]
pub fn extract_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    scan_from(text, start)
}

/// Extract the first balanced structure and deserialize it.
#[must_use]
pub fn parse_embedded<T: DeserializeOwned>(text: &str) -> Option<T> {
    serde_json::from_str(extract_balanced(text)?).ok()
}

fn scan_from(text: &str, start: usize) -> Option<&str> {
    let bytes = text.as_bytes();
    let mut closers: Vec<u8> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &byte) in bytes.get(start..)?.iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if byte == b'\\' {
                escaped = true;
            } else if byte == b'"' {
                in_string = false;
            }
            continue;
        }

        match byte {
            b'"' => in_string = true,
            b'[' => closers.push(b']'),
            b'{' => closers.push(b'}'),
            b']' | b'}' => {
                if closers.pop() != Some(byte) {
                    return None;
                }
                if closers.is_empty() {
                    return text.get(start..=start + offset);
                }
            }
            _ => {}
        }
    }

    None
}
