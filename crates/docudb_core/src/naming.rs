//! File name encoding for keys, index values and identifiers.
//!
//! Record files, index value directories and primary-key marker files are
//! named by percent-encoding the raw string. Only `[A-Za-z0-9._-]` passes
//! through, and the special names `.` and `..` are fully encoded.

use crate::error::{CoreError, CoreResult};
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Characters escaped in file names.
const FILE_NAME: &AsciiSet = &NON_ALPHANUMERIC.remove(b'.').remove(b'_').remove(b'-');

/// Longest file name most file systems accept.
pub const MAX_NAME_BYTES: usize = 255;

/// Encodes `raw` into a single safe path segment.
///
/// # Errors
///
/// Returns `DataTypeConstraintViolation` if the encoded name is empty or longer
/// than [`MAX_NAME_BYTES`].
pub fn encode_name(raw: &str) -> CoreResult<String> {
    let encoded = match raw {
        "." => "%2E".to_string(),
        ".." => "%2E%2E".to_string(),
        _ => utf8_percent_encode(raw, FILE_NAME).to_string(),
    };
    if encoded.is_empty() || encoded.len() > MAX_NAME_BYTES {
        return Err(CoreError::DataTypeConstraintViolation {
            message: format!(
                "encoded name must be 1..={MAX_NAME_BYTES} bytes, found {}",
                encoded.len()
            ),
        });
    }
    Ok(encoded)
}

/// Reverses [`encode_name`].
///
/// # Errors
///
/// Returns `Internal` if the decoded bytes are not UTF-8.
pub fn decode_name(encoded: &str) -> CoreResult<String> {
    percent_decode_str(encoded)
        .decode_utf8()
        .map(|s| s.into_owned())
        .map_err(|e| CoreError::internal(format!("undecodable file name {encoded}: {e}")))
}

/// Whether `name` may be used as a datastore or collection directory.
#[must_use]
pub fn is_valid_identifier(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_NAME_BYTES
        && !name.starts_with('.')
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-' || b == b'.')
}
