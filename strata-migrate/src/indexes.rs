//! Hierarchical script indexes.
//!
//! Every folder and file name of a script path may start with a numeric
//! index. The indexes of all path segments, in order, form the script's
//! [`ScriptIndexes`]: `01_schema/02_tables/03_users.sql` becomes `1.2.3`,
//! `01_schema/views/users.sql` becomes `1.x.x` (and is rejected, see
//! [`crate::script::ScriptFactory`]), `repeatable/users.sql` becomes `x.x`.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::MigrationError;

/// Placeholder used for absent indexes in the canonical string form.
pub const ABSENT_INDEX: &str = "x";

/// Ordered sequence of optional indexes extracted from a script path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ScriptIndexes {
    indexes: Vec<Option<u64>>,
}

impl ScriptIndexes {
    /// Create indexes from the given elements.
    pub fn new(indexes: Vec<Option<u64>>) -> Self {
        Self { indexes }
    }

    /// The individual elements.
    pub fn as_slice(&self) -> &[Option<u64>] {
        &self.indexes
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.indexes.len()
    }

    /// Whether there are no elements at all.
    pub fn is_empty(&self) -> bool {
        self.indexes.is_empty()
    }

    /// The last element, `None` when absent or when there are no elements.
    pub fn last(&self) -> Option<u64> {
        self.indexes.last().copied().flatten()
    }

    /// Incremental scripts end with a present index.
    pub fn is_incremental(&self) -> bool {
        self.last().is_some()
    }

    /// Repeatable scripts end with an absent index.
    pub fn is_repeatable(&self) -> bool {
        !self.is_incremental()
    }

    /// Whether any element is present.
    pub fn has_any_index(&self) -> bool {
        self.indexes.iter().any(Option::is_some)
    }

    /// Canonical string form, e.g. `1.x.2`.
    pub fn to_canonical_string(&self) -> String {
        self.indexes
            .iter()
            .map(|index| match index {
                Some(value) => value.to_string(),
                None => ABSENT_INDEX.to_string(),
            })
            .collect::<Vec<_>>()
            .join(".")
    }
}

impl Ord for ScriptIndexes {
    fn cmp(&self, other: &Self) -> Ordering {
        // NOTE: a present index sorts before an absent one at the same
        // position. This is asymmetric with `Option`'s own ordering and is
        // kept as is: stored histories depend on incremental scripts
        // sorting ahead of repeatable ones.
        for (this, that) in self.indexes.iter().zip(other.indexes.iter()) {
            let ordering = match (this, that) {
                (Some(a), Some(b)) => a.cmp(b),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        self.indexes.len().cmp(&other.indexes.len())
    }
}

impl PartialOrd for ScriptIndexes {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for ScriptIndexes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_canonical_string())
    }
}

impl FromStr for ScriptIndexes {
    type Err = MigrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Ok(Self::default());
        }

        let indexes = trimmed
            .split('.')
            .map(|part| {
                if part.eq_ignore_ascii_case(ABSENT_INDEX) {
                    Ok(None)
                } else if !part.is_empty() && part.chars().all(|c| c.is_ascii_digit()) {
                    part.parse::<u64>()
                        .map(Some)
                        .map_err(|e| MigrationError::invalid_indexes(s, e.to_string()))
                } else {
                    Err(MigrationError::invalid_indexes(
                        s,
                        format!("'{}' is neither a number nor '{}'", part, ABSENT_INDEX),
                    ))
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { indexes })
    }
}

impl TryFrom<String> for ScriptIndexes {
    type Error = MigrationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ScriptIndexes> for String {
    fn from(value: ScriptIndexes) -> Self {
        value.to_canonical_string()
    }
}
