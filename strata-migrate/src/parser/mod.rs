//! Statement splitting.
//!
//! A script is split into individual statements by a small state machine
//! ([`ParseState`]). Ordinary statements end at `;`. Statements that open a
//! stored-program body (see [`Dialect::block_matcher`]) keep their internal
//! semicolons and end at a line holding a single `/`. They are returned
//! with their trailing newline, while ordinary statements are trimmed.
//!
//! ```rust
//! use strata_migrate::{Dialect, ScriptParser};
//!
//! let parser = ScriptParser::new("01_init.sql", "CREATE TABLE a(id INT);\n-- done\n", Dialect::Generic);
//! let statements = parser.statements().unwrap();
//! assert_eq!(statements, vec!["CREATE TABLE a(id INT)"]);
//! ```

mod dialect;
mod params;
mod state;

pub use dialect::{BlockMatcher, Dialect};
pub use params::substitute_parameters;
pub use state::{Action, ParseOptions, ParseState, Resume, Transition};

use std::collections::BTreeMap;

use crate::config::ParserConfig;
use crate::error::{MigrateResult, MigrationError};
use crate::script::Script;

/// Splits one script into statements.
#[derive(Debug)]
pub struct ScriptParser {
    script_name: String,
    chars: Vec<char>,
    position: usize,
    line: usize,
    state: ParseState,
    options: ParseOptions,
    matcher: BlockMatcher,
    builder: StatementBuilder,
    finished: bool,
}

impl ScriptParser {
    /// Parser with the dialect's default options and no parameters.
    pub fn new(script_name: impl Into<String>, text: &str, dialect: Dialect) -> Self {
        let options = ParseOptions {
            backslash_escaping: dialect.backslash_escaping(),
            curly_brace_comments: dialect.curly_brace_comments(),
        };
        Self::with_options(script_name, text, dialect, options, &BTreeMap::new())
    }

    /// Parser with explicit options and substitution parameters.
    pub fn with_options(
        script_name: impl Into<String>,
        text: &str,
        dialect: Dialect,
        options: ParseOptions,
        parameters: &BTreeMap<String, String>,
    ) -> Self {
        let normalized = normalize_line_endings(text);
        let substituted = substitute_parameters(&normalized, parameters);

        Self {
            script_name: script_name.into(),
            chars: substituted.chars().collect(),
            position: 0,
            line: 1,
            state: ParseState::Normal,
            options,
            matcher: dialect.block_matcher(),
            builder: StatementBuilder::default(),
            finished: false,
        }
    }

    /// Name of the script being parsed.
    pub fn script_name(&self) -> &str {
        &self.script_name
    }

    /// Parse the next statement, `None` once the script is exhausted.
    pub fn parse_next(&mut self) -> MigrateResult<Option<String>> {
        if self.finished {
            return Ok(None);
        }

        while self.position < self.chars.len() {
            let current = self.chars[self.position];
            let next = self.chars.get(self.position + 1).copied();
            let previous = self.state;
            let transition = previous.transition(current, next, &self.options);

            self.position += 1;
            if current == '\n' {
                self.line += 1;
            }
            let consumes_next = matches!(
                transition.action,
                Action::AppendWithNext | Action::DiscardWithNext
            );
            if consumes_next {
                self.position += 1;
                if next == Some('\n') {
                    self.line += 1;
                }
            }

            self.state = transition.state;
            let tracking = previous == ParseState::Normal;

            let line = self.line_of(current);

            match transition.action {
                Action::Append => self.builder.push(current, line, tracking),
                Action::AppendWithNext => {
                    self.builder.push(current, line, tracking);
                    if let Some(next) = next {
                        self.builder.push(next, self.line, tracking);
                    }
                }
                Action::Discard | Action::DiscardWithNext => {}
                Action::EndStatement => {
                    if let Some(statement) = self.builder.finish_statement() {
                        return Ok(Some(statement));
                    }
                    continue;
                }
                Action::EndLine => {
                    if let Some(statement) = self.builder.end_line() {
                        self.state = ParseState::Normal;
                        if !statement.is_empty() {
                            return Ok(Some(statement));
                        }
                    }
                    continue;
                }
            }

            let word_boundary = tracking
                && (self.state.is_comment()
                    || (transition.action == Action::Append && current.is_whitespace()));
            if word_boundary && self.builder.close_word(&self.matcher) {
                self.state = self.state.into_block();
                self.builder.enter_block();
            }
        }

        self.finished = true;
        self.finish()
    }

    /// Collect all remaining statements.
    pub fn statements(mut self) -> MigrateResult<Vec<String>> {
        let mut statements = Vec::new();
        while let Some(statement) = self.parse_next()? {
            statements.push(statement);
        }
        Ok(statements)
    }

    // A newline is counted before it is pushed; attribute it to its own line.
    fn line_of(&self, current: char) -> usize {
        if current == '\n' { self.line - 1 } else { self.line }
    }

    fn finish(&mut self) -> MigrateResult<Option<String>> {
        let line = self.builder.start_line.unwrap_or(self.line);

        if self.state.is_quoted() {
            return Err(MigrationError::parse(
                &self.script_name,
                line,
                "unterminated quoted literal",
            ));
        }

        match self.state.resume() {
            Resume::Normal => {
                if self.builder.is_blank() {
                    Ok(None)
                } else {
                    Err(MigrationError::parse(
                        &self.script_name,
                        line,
                        "last statement is not terminated by ';'",
                    ))
                }
            }
            Resume::ProceduralBlock => {
                let statement = self.builder.finish_block();
                self.state = ParseState::Normal;
                Ok(statement.filter(|s| !s.is_empty()))
            }
        }
    }
}

impl Iterator for ScriptParser {
    type Item = MigrateResult<String>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.parse_next() {
            Ok(Some(statement)) => Some(Ok(statement)),
            Ok(None) => None,
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

/// Creates parsers configured from [`ParserConfig`].
#[derive(Debug, Clone)]
pub struct ScriptParserFactory {
    dialect: Dialect,
    options: ParseOptions,
    parameters: BTreeMap<String, String>,
}

impl ScriptParserFactory {
    /// Create a factory.
    pub fn new(config: &ParserConfig) -> Self {
        Self {
            dialect: config.dialect,
            options: ParseOptions {
                backslash_escaping: config.backslash_escaping_enabled(),
                curly_brace_comments: config.dialect.curly_brace_comments(),
            },
            parameters: config.parameters.clone(),
        }
    }

    /// Configured dialect.
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// A fresh parser over the script's content.
    pub fn create_parser(&self, script: &Script) -> MigrateResult<ScriptParser> {
        let content = script.content().ok_or_else(|| {
            MigrationError::other(format!("script '{}' has no content", script.file_name()))
        })?;
        Ok(self.parser_for_text(script.file_name(), content))
    }

    /// A fresh parser over arbitrary text.
    pub fn parser_for_text(&self, script_name: &str, text: &str) -> ScriptParser {
        ScriptParser::with_options(script_name, text, self.dialect, self.options, &self.parameters)
    }
}

fn normalize_line_endings(text: &str) -> String {
    if text.contains('\r') {
        text.replace("\r\n", "\n").replace('\r', "\n")
    } else {
        text.to_string()
    }
}

/// Accumulates the text of the statement being parsed.
#[derive(Debug, Default)]
struct StatementBuilder {
    text: String,
    /// Byte offset where the current line of a block starts.
    line_start: usize,
    start_line: Option<usize>,
    word: String,
    words: Vec<String>,
    words_done: bool,
}

impl StatementBuilder {
    fn push(&mut self, ch: char, line: usize, tracking: bool) {
        if self.start_line.is_none() && !ch.is_whitespace() {
            self.start_line = Some(line);
        }
        self.text.push(ch);
        if tracking && !self.words_done && !ch.is_whitespace() {
            self.word.extend(ch.to_uppercase());
        }
    }

    fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    /// Close the current word; `true` when the words read so far open a block.
    fn close_word(&mut self, matcher: &BlockMatcher) -> bool {
        if self.words_done || self.word.is_empty() {
            return false;
        }
        self.words.push(std::mem::take(&mut self.word));
        if self.words.len() > matcher.max_words() {
            self.words_done = true;
            return false;
        }
        if matcher.is_start_of_block(&self.words.join(" ")) {
            self.words_done = true;
            return true;
        }
        false
    }

    fn enter_block(&mut self) {
        self.line_start = self.text.rfind('\n').map(|i| i + 1).unwrap_or(0);
    }

    fn finish_statement(&mut self) -> Option<String> {
        let statement = self.text.trim().to_string();
        self.reset();
        (!statement.is_empty()).then_some(statement)
    }

    /// Handle a newline inside a block. Returns the statement when the line
    /// just completed is the `/` terminator.
    fn end_line(&mut self) -> Option<String> {
        if is_block_terminator(&self.text[self.line_start..]) {
            let statement = self.text[..self.line_start].trim_start().to_string();
            self.reset();
            return Some(statement);
        }
        self.text.push('\n');
        self.line_start = self.text.len();
        None
    }

    fn finish_block(&mut self) -> Option<String> {
        let end = if is_block_terminator(&self.text[self.line_start..]) {
            self.line_start
        } else {
            self.text.len()
        };
        let mut statement = self.text[..end].trim_start().to_string();
        self.reset();
        if statement.trim().is_empty() {
            return None;
        }
        if !statement.ends_with('\n') {
            statement.push('\n');
        }
        Some(statement)
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}

fn is_block_terminator(line: &str) -> bool {
    line.starts_with('/') && line.trim_end() == "/"
}
