//! Repository name and manifest reference grammars.
//!
//! All matches are anchored: the whole string must satisfy the grammar,
//! never a substring of it.

use std::fmt;

use crate::digest::Digest;

/// Longest allowed tag: one leading character plus up to 127 more.
const TAG_MAX: usize = 128;

/// Whether `name` is a valid repository name: one or more `/`-separated
/// segments, each matching `[a-z0-9]+([._-][a-z0-9]+)*`.
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && name.split('/').all(is_valid_name_segment)
}

fn is_valid_name_segment(segment: &str) -> bool {
    // [a-z0-9]+([._-][a-z0-9]+)*
    let mut run = 0usize;
    for b in segment.bytes() {
        match b {
            b'a'..=b'z' | b'0'..=b'9' => run += 1,
            b'.' | b'_' | b'-' => {
                if run == 0 {
                    return false;
                }
                run = 0;
            }
            _ => return false,
        }
    }
    run > 0
}

/// Whether `tag` is a valid tag name: `[a-zA-Z0-9_][a-zA-Z0-9._-]{0,127}`.
pub fn is_valid_tag(tag: &str) -> bool {
    let bytes = tag.as_bytes();
    if bytes.is_empty() || bytes.len() > TAG_MAX {
        return false;
    }
    let first = bytes[0];
    if !(first.is_ascii_alphanumeric() || first == b'_') {
        return false;
    }
    bytes[1..]
        .iter()
        .all(|&b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'-'))
}

/// Whether `reference` is a valid manifest reference, i.e. classifies as
/// either a tag or a digest.
pub fn is_valid_reference(reference: &str) -> bool {
    Reference::parse(reference).is_some()
}

/// A parsed manifest reference: a mutable tag or an immutable digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
    /// Mutable, human-assigned tag name.
    Tag(String),
    /// Immutable content digest.
    Digest(Digest),
}

impl Reference {
    /// Classify a reference string.
    ///
    /// The digest form is tried first (a digest can never satisfy the tag
    /// grammar, the `:` separator is not a tag character); a string
    /// matching neither grammar is `None`.
    pub fn parse(reference: &str) -> Option<Self> {
        if let Ok(digest) = reference.parse::<Digest>() {
            return Some(Reference::Digest(digest));
        }
        if is_valid_tag(reference) {
            return Some(Reference::Tag(reference.to_string()));
        }
        None
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reference::Tag(tag) => f.write_str(tag),
            Reference::Digest(digest) => write!(f, "{digest}"),
        }
    }
}
