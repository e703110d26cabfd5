//! SQL dialects and procedural-block detection.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::MigrationError;

/// SQL dialect a script is written in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dialect {
    /// Plain SQL, no procedural blocks.
    #[default]
    #[serde(rename = "generic")]
    Generic,
    /// Oracle PL/SQL.
    #[serde(rename = "oracle")]
    Oracle,
    /// IBM DB2 SQL PL.
    #[serde(rename = "db2")]
    Db2,
    /// PostgreSQL PL/pgSQL.
    #[serde(rename = "postgresql")]
    PostgreSql,
    /// MySQL / MariaDB.
    #[serde(rename = "mysql")]
    MySql,
    /// Informix SPL.
    #[serde(rename = "informix")]
    Informix,
}

impl Dialect {
    /// Every dialect.
    pub const ALL: [Dialect; 6] = [
        Dialect::Generic,
        Dialect::Oracle,
        Dialect::Db2,
        Dialect::PostgreSql,
        Dialect::MySql,
        Dialect::Informix,
    ];

    /// Configuration name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Dialect::Generic => "generic",
            Dialect::Oracle => "oracle",
            Dialect::Db2 => "db2",
            Dialect::PostgreSql => "postgresql",
            Dialect::MySql => "mysql",
            Dialect::Informix => "informix",
        }
    }

    /// Whether a backslash escapes the next character by default.
    pub fn backslash_escaping(&self) -> bool {
        matches!(self, Dialect::MySql)
    }

    /// Whether `{ ... }` is a comment.
    pub fn curly_brace_comments(&self) -> bool {
        matches!(self, Dialect::Informix)
    }

    /// Detector for statements that start a procedural block.
    pub fn block_matcher(&self) -> BlockMatcher {
        let phrases: &'static [&'static str] = match self {
            Dialect::Generic => &[],
            Dialect::Oracle => ORACLE_BLOCK_STARTERS,
            Dialect::Db2 => DB2_BLOCK_STARTERS,
            Dialect::PostgreSql => POSTGRESQL_BLOCK_STARTERS,
            Dialect::MySql => MYSQL_BLOCK_STARTERS,
            Dialect::Informix => INFORMIX_BLOCK_STARTERS,
        };
        BlockMatcher::new(phrases)
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dialect {
    type Err = MigrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        match lower.as_str() {
            "postgres" => return Ok(Dialect::PostgreSql),
            "mariadb" => return Ok(Dialect::MySql),
            _ => {}
        }
        Dialect::ALL
            .into_iter()
            .find(|d| d.as_str() == lower)
            .ok_or_else(|| MigrationError::config(format!("unknown dialect '{}'", s)))
    }
}

const ORACLE_BLOCK_STARTERS: &[&str] = &[
    "CREATE FUNCTION",
    "CREATE OR REPLACE FUNCTION",
    "CREATE PROCEDURE",
    "CREATE OR REPLACE PROCEDURE",
    "CREATE PACKAGE",
    "CREATE OR REPLACE PACKAGE",
    "CREATE PACKAGE BODY",
    "CREATE OR REPLACE PACKAGE BODY",
    "CREATE TRIGGER",
    "CREATE OR REPLACE TRIGGER",
    "CREATE TYPE",
    "CREATE OR REPLACE TYPE",
    "CREATE TYPE BODY",
    "CREATE OR REPLACE TYPE BODY",
    "CREATE LIBRARY",
    "CREATE OR REPLACE LIBRARY",
    "DECLARE",
    "BEGIN",
];

const DB2_BLOCK_STARTERS: &[&str] = &[
    "CREATE FUNCTION",
    "CREATE OR REPLACE FUNCTION",
    "CREATE PROCEDURE",
    "CREATE OR REPLACE PROCEDURE",
    "CREATE TRIGGER",
    "CREATE OR REPLACE TRIGGER",
    "BEGIN",
];

const POSTGRESQL_BLOCK_STARTERS: &[&str] = &[
    "CREATE FUNCTION",
    "CREATE OR REPLACE FUNCTION",
    "CREATE PROCEDURE",
    "CREATE OR REPLACE PROCEDURE",
    "CREATE RULE",
    "CREATE OR REPLACE RULE",
    "CREATE TRIGGER",
    "CREATE OR REPLACE TRIGGER",
    "DO",
];

const MYSQL_BLOCK_STARTERS: &[&str] = &["CREATE PROCEDURE", "CREATE FUNCTION", "CREATE TRIGGER"];

const INFORMIX_BLOCK_STARTERS: &[&str] = &["CREATE PROCEDURE", "CREATE FUNCTION"];

/// Matches the start of a statement against a dialect's block starters.
#[derive(Debug, Clone, Copy)]
pub struct BlockMatcher {
    phrases: &'static [&'static str],
    max_words: usize,
}

impl BlockMatcher {
    /// Matcher for a fixed phrase table. Phrases are upper case, single-spaced.
    pub fn new(phrases: &'static [&'static str]) -> Self {
        let max_words = phrases
            .iter()
            .map(|p| p.split(' ').count())
            .max()
            .unwrap_or(0);
        Self { phrases, max_words }
    }

    /// Whether the dialect has procedural blocks at all.
    pub fn is_enabled(&self) -> bool {
        !self.phrases.is_empty()
    }

    /// Word count of the longest starter phrase.
    pub fn max_words(&self) -> usize {
        self.max_words
    }

    /// Whether `prefix` is exactly one of the starter phrases.
    ///
    /// Comparison is on the upper-cased prefix; trailing content or
    /// different internal whitespace never matches.
    pub fn is_start_of_block(&self, prefix: &str) -> bool {
        let upper = prefix.to_uppercase();
        self.phrases.iter().any(|phrase| *phrase == upper)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_oracle_matcher() {
        let matcher = Dialect::Oracle.block_matcher();
        assert!(matcher.is_start_of_block("CREATE PACKAGE"));
        assert!(matcher.is_start_of_block("create or replace function"));
        assert!(matcher.is_start_of_block("DECLARE"));
        assert!(matcher.is_start_of_block("BEGIN"));
        assert!(!matcher.is_start_of_block("CREATE TABLE"));
    }

    #[test]
    fn test_matcher_rejects_trailing_content() {
        let matcher = Dialect::Oracle.block_matcher();
        assert!(!matcher.is_start_of_block("CREATE PACKAGE SOMETHING"));
    }

    #[test]
    fn test_matcher_rejects_other_whitespace() {
        let matcher = Dialect::Oracle.block_matcher();
        assert!(!matcher.is_start_of_block("CREATE  PACKAGE"));
        assert!(!matcher.is_start_of_block("CREATE\tPACKAGE"));
        assert!(!matcher.is_start_of_block(" CREATE PACKAGE"));
    }

    #[test]
    fn test_generic_has_no_blocks() {
        let matcher = Dialect::Generic.block_matcher();
        assert!(!matcher.is_enabled());
        assert!(!matcher.is_start_of_block("BEGIN"));
    }

    #[test]
    fn test_postgres_begin_is_not_a_block() {
        let matcher = Dialect::PostgreSql.block_matcher();
        assert!(!matcher.is_start_of_block("BEGIN"));
        assert!(matcher.is_start_of_block("DO"));
    }

    #[test]
    fn test_max_words() {
        assert_eq!(Dialect::Oracle.block_matcher().max_words(), 5);
        assert_eq!(Dialect::MySql.block_matcher().max_words(), 2);
        assert_eq!(Dialect::Generic.block_matcher().max_words(), 0);
    }

    #[test]
    fn test_dialect_from_str() {
        assert_eq!("Oracle".parse::<Dialect>().unwrap(), Dialect::Oracle);
        assert_eq!("postgres".parse::<Dialect>().unwrap(), Dialect::PostgreSql);
        assert_eq!("mysql".parse::<Dialect>().unwrap(), Dialect::MySql);
        assert!("sybase".parse::<Dialect>().is_err());
        for dialect in Dialect::ALL {
            assert_eq!(dialect.to_string().parse::<Dialect>().unwrap(), dialect);
        }
    }

    #[test]
    fn test_dialect_defaults() {
        assert!(Dialect::MySql.backslash_escaping());
        assert!(!Dialect::Oracle.backslash_escaping());
        assert!(Dialect::Informix.curly_brace_comments());
        assert!(!Dialect::Db2.curly_brace_comments());
    }
}
