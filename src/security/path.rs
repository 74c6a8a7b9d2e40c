//! Request path canonicalization.
//!
//! Access decisions are made on the request path, and upstreams route on the
//! path they resolve. Both must agree, so a path whose canonical form differs
//! from what was sent is refused before any other check.
//!
//! # Design Decisions
//! - Escaped unreserved characters (`%2e`, `%61`, ...) are decoded, other escapes are kept
//! - `\` counts as a separator since URL parsers treat it as one for http
//! - A trailing slash is part of the canonical form; `..` never climbs above the root

use std::borrow::Cow;

/// Canonical form of `path`.
///
/// Empty and `.` segments are dropped and `..` removes the previous segment.
/// Returns the input unchanged when it is already canonical.
pub fn canonicalize(path: &str) -> Cow<'_, str> {
    let decoded = decode_unreserved(path);
    let unified = if decoded.contains('\\') {
        Cow::Owned(decoded.replace('\\', "/"))
    } else {
        decoded
    };

    let mut kept: Vec<&str> = Vec::new();
    let mut trailing_slash = false;
    for segment in unified.split('/').skip(1) {
        trailing_slash = matches!(segment, "" | "." | "..");
        match segment {
            "" | "." => {}
            ".." => {
                kept.pop();
            }
            other => kept.push(other),
        }
    }

    let mut canonical = String::with_capacity(unified.len());
    for segment in &kept {
        canonical.push('/');
        canonical.push_str(segment);
    }
    if canonical.is_empty() || trailing_slash {
        canonical.push('/');
    }

    if canonical == path {
        Cow::Borrowed(path)
    } else {
        Cow::Owned(canonical)
    }
}

/// Returns true if `path` needs no rewriting to be canonical.
pub fn is_canonical(path: &str) -> bool {
    matches!(canonicalize(path), Cow::Borrowed(_))
}

fn decode_unreserved(path: &str) -> Cow<'_, str> {
    if !path.contains('%') {
        return Cow::Borrowed(path);
    }

    let bytes = path.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(hi), Some(lo)) = (hex_value(bytes[i + 1]), hex_value(bytes[i + 2])) {
                let byte = (hi << 4) | lo;
                if is_unreserved(byte) {
                    out.push(byte);
                    i += 3;
                    continue;
                }
            }
        }
        out.push(bytes[i]);
        i += 1;
    }

    match String::from_utf8(out) {
        Ok(decoded) if decoded == path => Cow::Borrowed(path),
        Ok(decoded) => Cow::Owned(decoded),
        Err(_) => Cow::Borrowed(path),
    }
}

fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

fn is_unreserved(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'.' | b'_' | b'~')
}
