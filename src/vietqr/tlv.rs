//! EMVCo tag-length-value fields.
//!
//! A field is a 2-digit tag, a 2-digit decimal length and the value. Lengths
//! count characters; after sanitization every value is ASCII, so characters
//! and bytes agree.

use crate::error::{LedgerError, Result};

/// Encode one field.
#[must_use]
pub fn tlv(tag: &str, value: &str) -> String {
    format!("{}{:02}{}", tag, value.chars().count(), value)
}

/// Whitespace as the payload sanitizer sees it, after non-ASCII is gone.
fn is_payload_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\x0b' | '\x0c' | '\r' | '\x1c'..='\x1f')
}

/// Make free text safe for a payload field.
///
/// Drops non-ASCII characters, collapses whitespace runs to one space, trims,
/// then truncates to `max_len` characters. A truncation may leave a trailing
/// space. `max_len == 0` means no limit.
#[must_use]
pub fn sanitize_ascii(text: &str, max_len: usize) -> String {
    let ascii: String = text.chars().filter(char::is_ascii).collect();
    let collapsed = ascii
        .split(is_payload_space)
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    if max_len > 0 && collapsed.len() > max_len {
        collapsed[..max_len].to_string()
    } else {
        collapsed
    }
}

/// A decoded field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlvField {
    pub tag: String,
    pub value: String,
}

impl TlvField {
    /// Decode the value as nested fields (tags 38 and 62 are templates).
    pub fn children(&self) -> Result<Vec<TlvField>> {
        decode_tlv(&self.value)
    }
}

/// Split a payload (or a template value) into its fields, in order.
///
/// # Errors
///
/// Returns a validation error when a header is truncated, a tag or length is
/// not two decimal digits, or a value runs past the end of the input.
pub fn decode_tlv(payload: &str) -> Result<Vec<TlvField>> {
    let chars: Vec<char> = payload.chars().collect();
    let mut fields = Vec::new();
    let mut pos = 0;

    while pos < chars.len() {
        if pos + 4 > chars.len() {
            return Err(LedgerError::validation(format!(
                "truncated TLV header at offset {}",
                pos
            )));
        }

        let tag: String = chars[pos..pos + 2].iter().collect();
        let len_digits: String = chars[pos + 2..pos + 4].iter().collect();
        if !tag.chars().all(|c| c.is_ascii_digit()) {
            return Err(LedgerError::validation(format!(
                "invalid TLV tag '{}' at offset {}",
                tag, pos
            )));
        }
        let len: usize = len_digits
            .parse()
            .ok()
            .filter(|_| len_digits.chars().all(|c| c.is_ascii_digit()))
            .ok_or_else(|| {
                LedgerError::validation(format!(
                    "invalid TLV length '{}' for tag {}",
                    len_digits, tag
                ))
            })?;

        let start = pos + 4;
        let end = start + len;
        if end > chars.len() {
            return Err(LedgerError::validation(format!(
                "TLV value for tag {} overruns input ({} > {})",
                tag,
                end,
                chars.len()
            )));
        }

        fields.push(TlvField {
            tag,
            value: chars[start..end].iter().collect(),
        });
        pos = end;
    }

    Ok(fields)
}
