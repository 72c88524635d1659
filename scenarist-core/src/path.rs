//! Dot-path parsing for per-test state access.
//!
//! State keys address nested values with dots (`user.profile.tier`), array
//! elements with brackets (`items[0]`) and array appends with a trailing
//! `[]` (`cart.items[]`). The same parser backs the state manager, the
//! template engine and the schema validator, so a key that validates is a
//! key the engine can write.
//!
//! Segments named `__proto__`, `constructor` or `prototype` are rejected
//! at any depth, so state snapshots never carry them.

use thiserror::Error;

/// Maximum accepted length of a raw path, in bytes.
pub const MAX_PATH_LENGTH: usize = 256;

/// Segment names that are never read or written.
pub const DANGEROUS_KEYS: [&str; 3] = ["__proto__", "constructor", "prototype"];

/// Returns `true` if `key` is on the dangerous-key denylist.
#[must_use]
pub fn is_dangerous_key(key: &str) -> bool {
    DANGEROUS_KEYS.contains(&key)
}

/// Reasons a raw path is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    /// The path was empty
    #[error("path is empty")]
    Empty,

    /// The path exceeded [`MAX_PATH_LENGTH`]
    #[error("path is {len} bytes long (limit: {MAX_PATH_LENGTH})")]
    TooLong {
        /// Length of the rejected path
        len: usize,
    },

    /// Two dots in a row, or a leading/trailing dot
    #[error("path contains an empty segment")]
    EmptySegment,

    /// Unbalanced or non-numeric bracket index
    #[error("malformed array index in segment '{0}'")]
    MalformedIndex(String),

    /// A segment is on the denylist
    #[error("segment '{0}' is not allowed")]
    DangerousKey(String),
}

/// A parsed state path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatePath {
    segments: Vec<String>,
    append: bool,
}

impl StatePath {
    /// Parses a raw dot-path.
    ///
    /// # Errors
    ///
    /// Returns a [`PathError`] if the path is empty, too long, has empty
    /// segments or malformed brackets, or names a dangerous key.
    pub fn parse(raw: &str) -> Result<Self, PathError> {
        if raw.is_empty() {
            return Err(PathError::Empty);
        }
        if raw.len() > MAX_PATH_LENGTH {
            return Err(PathError::TooLong { len: raw.len() });
        }

        let (body, append) = raw
            .strip_suffix("[]")
            .map_or((raw, false), |stripped| (stripped, true));
        if body.is_empty() {
            return Err(PathError::Empty);
        }

        let mut segments = Vec::new();
        for part in body.split('.') {
            parse_part(part, &mut segments)?;
        }

        if let Some(bad) = segments.iter().find(|s| is_dangerous_key(s)) {
            return Err(PathError::DangerousKey(bad.clone()));
        }

        Ok(Self { segments, append })
    }

    /// The path's segments, with bracket indexes expanded into their own
    /// segments (`items[0].id` → `["items", "0", "id"]`).
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Whether the path ended in `[]`.
    #[must_use]
    pub const fn is_append(&self) -> bool {
        self.append
    }
}

/// Splits one dot-separated part into a name plus any bracket indexes.
fn parse_part(part: &str, segments: &mut Vec<String>) -> Result<(), PathError> {
    let (name, mut rest) = part.find('[').map_or((part, ""), |i| part.split_at(i));

    if name.contains(']') {
        return Err(PathError::MalformedIndex(part.to_string()));
    }
    if name.is_empty() {
        return Err(if rest.is_empty() {
            PathError::EmptySegment
        } else {
            PathError::MalformedIndex(part.to_string())
        });
    }
    segments.push(name.to_string());

    while !rest.is_empty() {
        let inner = rest
            .strip_prefix('[')
            .and_then(|r| r.find(']').map(|end| (&r[..end], &r[end + 1..])));
        let Some((index, remaining)) = inner else {
            return Err(PathError::MalformedIndex(part.to_string()));
        };
        if index.is_empty() || !index.bytes().all(|b| b.is_ascii_digit()) {
            return Err(PathError::MalformedIndex(part.to_string()));
        }
        segments.push(index.to_string());
        rest = remaining;
    }

    Ok(())
}
