//! Conversion between key bytes and their command-line spelling.
//!
//! Keys are written as text with `\0` for the bucket separator, `\\` for a
//! backslash and `\xNN` for any other byte.

use crate::error::{CliError, CliResult};
use std::fmt::Write;

/// Parses a key argument.
pub fn parse_key(input: &str) -> CliResult<Vec<u8>> {
    let invalid = |reason: &str| CliError::InvalidKey {
        input: input.to_string(),
        reason: reason.to_string(),
    };

    let bytes = input.as_bytes();
    let mut key = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'\\' {
            key.push(bytes[i]);
            i += 1;
            continue;
        }
        match bytes.get(i + 1) {
            Some(b'0') => {
                key.push(0);
                i += 2;
            }
            Some(b'\\') => {
                key.push(b'\\');
                i += 2;
            }
            Some(b'x') => {
                let hex = bytes
                    .get(i + 2..i + 4)
                    .ok_or_else(|| invalid("truncated \\x escape"))?;
                let hex = std::str::from_utf8(hex).map_err(|_| invalid("bad \\x escape"))?;
                let byte = u8::from_str_radix(hex, 16).map_err(|_| invalid("bad \\x escape"))?;
                key.push(byte);
                i += 4;
            }
            _ => return Err(invalid("unknown escape")),
        }
    }

    if key.is_empty() {
        return Err(invalid("key is empty"));
    }
    Ok(key)
}

/// Formats key bytes for display, escaping what [`parse_key`] would.
pub fn display_key(key: &[u8]) -> String {
    let mut out = String::with_capacity(key.len());
    for &byte in key {
        match byte {
            0 => out.push_str("\\0"),
            b'\\' => out.push_str("\\\\"),
            0x20..=0x7e => out.push(byte as char),
            _ => {
                let _ = write!(out, "\\x{byte:02x}");
            }
        }
    }
    out
}
