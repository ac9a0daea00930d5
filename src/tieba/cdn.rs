//! Unwrapping of vendor-wrapped CDN references.
//!
//! Some image fields are not URLs but proxy references. The wrapper format
//! is assumed to be `tbimg://c/<url>&<signature>` (or
//! `tbimgs://c/<url>&<signature>` when the proxy hop is secure); no sample
//! of the real format is on hand. The real URL sits after a fixed-length
//! prefix and ends at the first `&`. Values that do not carry the assumed
//! tag are treated as plain URLs.

use super::models::non_empty;

/// Leading tag of every wrapped reference.
const WRAPPER_TAG: &str = "tbimg";

/// Length of the non-secure wrapper prefix (`tbimg://c/`).
const WRAPPER_PREFIX_LEN: usize = 10;

/// Extract the payload URL of a wrapped reference.
///
/// Only values starting with the assumed `tbimg` tag are unwrapped; any
/// other string is returned unchanged, `&` and all. Returns `None` when
/// the result is empty.
#[must_use]
pub fn unwrap_cdn(wrapped: &str) -> Option<String> {
    if !wrapped.starts_with(WRAPPER_TAG) {
        return non_empty(wrapped);
    }

    let secure = wrapped.chars().nth(5) == Some('s');
    let skip = if secure {
        WRAPPER_PREFIX_LEN + 1
    } else {
        WRAPPER_PREFIX_LEN
    };

    let payload = wrapped.get(skip..)?;
    let payload = payload.split('&').next().unwrap_or(payload);
    non_empty(payload)
}

/// First populated candidate, already unwrapped.
///
/// Candidates are tried in the order given.
pub fn first_unwrapped<'a, I>(candidates: I) -> Option<String>
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    candidates.into_iter().flatten().find_map(unwrap_cdn)
}
