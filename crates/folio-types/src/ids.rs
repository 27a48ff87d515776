//! Typed identifiers for blocks, documents, and grid rows.
//!
//! `BlockId` mirrors the exchange format, where an id is either a number or a
//! string. Blocks created locally get negative numbers until the persistence
//! boundary hands out permanent ids; nothing in the engine treats the two
//! forms differently. `RowId` names a multi-column row and only lives as long
//! as some block references it.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a block, unique within one document.
///
/// Untagged on the wire: `12`, `-3`, and `"intro"` are all valid ids.
#[derive(Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BlockId {
    /// Numeric id. Negative values are temporary (not yet persisted).
    Num(i64),
    /// String key assigned by an external system.
    Key(String),
}

impl BlockId {
    /// Temporary id handed out by a store before the first save.
    ///
    /// `seq` starts at 1; the id is `-seq` so it can never collide with a
    /// permanent numeric id.
    pub fn temporary(seq: u64) -> Self {
        Self::Num(-(seq as i64))
    }

    /// Whether the persistence boundary has yet to assign a permanent id.
    pub fn is_temporary(&self) -> bool {
        matches!(self, Self::Num(n) if *n < 0)
    }

    /// Parse a command-line / user-supplied id.
    ///
    /// Integers become [`BlockId::Num`], anything else a [`BlockId::Key`].
    pub fn parse(s: &str) -> Result<Self, IdError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(IdError::Empty);
        }
        Ok(match s.parse::<i64>() {
            Ok(n) => Self::Num(n),
            Err(_) => Self::Key(s.to_string()),
        })
    }
}

impl From<i64> for BlockId {
    fn from(n: i64) -> Self {
        Self::Num(n)
    }
}

impl From<&str> for BlockId {
    fn from(s: &str) -> Self {
        Self::Key(s.to_string())
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Num(n) => write!(f, "{n}"),
            Self::Key(k) => write!(f, "{k}"),
        }
    }
}

impl fmt::Debug for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockId({self})")
    }
}

/// Owning document reference. Opaque to the engine.
#[derive(Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DocumentId({})", self.0)
    }
}

/// Identity of a multi-column row, replicated on every member block.
#[derive(Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RowId(String);

impl RowId {
    /// Fresh random row id (UUIDv4, hyphenated).
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 8 characters, for log lines and compact UI labels.
    pub fn short(&self) -> &str {
        let end = self
            .0
            .char_indices()
            .nth(8)
            .map(|(i, _)| i)
            .unwrap_or(self.0.len());
        &self.0[..end]
    }
}

impl From<&str> for RowId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RowId({})", self.short())
    }
}

/// Error from parsing a user-supplied id.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum IdError {
    #[error("block id must not be empty")]
    Empty,
}

// ============================================================================
// Tests
// ============================================================================
