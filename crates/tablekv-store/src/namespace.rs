//! Namespace and key validation.
//!
//! Namespace names become table identifiers and are interpolated into SQL,
//! so they are checked against an allow-list before any statement is built.
//! Names are folded to lowercase: SQLite matches table names
//! case-insensitively while MySQL on Linux does not, so `Users` and `users`
//! must name the same namespace on both. Keys are always bound as
//! parameters; they are only checked against the width of the `id` column.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{StoreError, StoreResult};

/// Width of the `VARCHAR` primary-key column.
pub const MAX_KEY_CHARS: usize = 14;

static NAMESPACE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,63}$").expect("namespace pattern is valid")
});

/// A validated namespace name, safe to use as a table identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Namespace(String);

impl Namespace {
    /// Validate `name` as a namespace identifier, folding it to lowercase.
    pub fn parse(name: &str) -> StoreResult<Self> {
        let reserved = name
            .get(..7)
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case("sqlite_"));
        if reserved || !NAMESPACE_RE.is_match(name) {
            return Err(StoreError::InvalidNamespace(name.to_string()));
        }
        Ok(Self(name.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Check that a record key fits the `id` column.
pub fn validate_key(key: &str) -> StoreResult<()> {
    let len = key.chars().count();
    if len == 0 || len > MAX_KEY_CHARS {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    Ok(())
}
