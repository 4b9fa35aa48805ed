//! Ledger membership
//!
//! The ledger is plain text, one identifier per line. Comparison is
//! case-insensitive and ignores surrounding whitespace and blank lines.

use std::fmt;

/// Canonical form of a ledger line or raw identifier
pub fn normalize(identifier: &str) -> String {
    identifier.trim().to_lowercase()
}

/// A normalized identifier that fits on exactly one ledger line
///
/// Non-blank after trimming and free of control characters, so it can
/// neither split into several entries nor merge with a neighbour.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier(String);

impl Identifier {
    /// `None` for blank input or input containing control characters
    pub fn parse(raw: &str) -> Option<Self> {
        let entry = normalize(raw);
        if entry.is_empty() || entry.chars().any(char::is_control) {
            return None;
        }
        Some(Self(entry))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whether `identifier` already appears in `content`
///
/// Input that is not a valid [`Identifier`] is never a member.
pub fn is_member(content: &str, identifier: &str) -> bool {
    let Some(candidate) = Identifier::parse(identifier) else {
        return false;
    };
    content
        .lines()
        .map(normalize)
        .filter(|line| !line.is_empty())
        .any(|line| line == candidate.as_str())
}

/// New ledger content with `identifier` appended on its own line
pub fn append_identifier(content: &str, identifier: &Identifier) -> String {
    let entry = identifier.as_str();
    let mut next = String::with_capacity(content.len() + entry.len() + 2);
    next.push_str(content);
    if !content.is_empty() && !content.ends_with('\n') {
        next.push('\n');
    }
    next.push_str(entry);
    next.push('\n');
    next
}

/// Number of non-blank entries
pub fn entry_count(content: &str) -> usize {
    content.lines().filter(|l| !l.trim().is_empty()).count()
}
