//! Parser state machine.
//!
//! Every step looks at the current character and the one after it and
//! yields the next state together with what to do with the character.

/// Code state to go back to when a comment or literal closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resume {
    Normal,
    ProceduralBlock,
}

impl From<Resume> for ParseState {
    fn from(resume: Resume) -> Self {
        match resume {
            Resume::Normal => ParseState::Normal,
            Resume::ProceduralBlock => ParseState::ProceduralBlock,
        }
    }
}

/// Where the parser currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseState {
    /// Ordinary SQL, `;` ends a statement.
    Normal,
    /// Inside a stored-program body, a `/` line ends the statement.
    ProceduralBlock,
    /// After `--`, up to the end of the line.
    LineComment(Resume),
    /// Between `/*` and `*/`.
    BlockComment(Resume),
    /// Between `{` and `}`.
    CurlyBraceComment(Resume),
    /// Inside `'...'`.
    SingleQuoted(Resume),
    /// Inside `"..."`.
    DoubleQuoted(Resume),
}

/// What to do with the current character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Keep the character.
    Append,
    /// Keep the character and the next one.
    AppendWithNext,
    /// Drop the character.
    Discard,
    /// Drop the character and the next one.
    DiscardWithNext,
    /// The character terminates the statement and is dropped.
    EndStatement,
    /// A newline inside a procedural block.
    EndLine,
}

/// Result of one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub state: ParseState,
    pub action: Action,
}

impl Transition {
    fn new(state: ParseState, action: Action) -> Self {
        Self { state, action }
    }
}

/// Lexical options derived from the dialect and configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseOptions {
    pub backslash_escaping: bool,
    pub curly_brace_comments: bool,
}

impl ParseState {
    /// Code state this state belongs to.
    pub fn resume(&self) -> Resume {
        match self {
            ParseState::Normal => Resume::Normal,
            ParseState::ProceduralBlock => Resume::ProceduralBlock,
            ParseState::LineComment(r)
            | ParseState::BlockComment(r)
            | ParseState::CurlyBraceComment(r)
            | ParseState::SingleQuoted(r)
            | ParseState::DoubleQuoted(r) => *r,
        }
    }

    /// Whether this is a comment state.
    pub fn is_comment(&self) -> bool {
        matches!(
            self,
            ParseState::LineComment(_) | ParseState::BlockComment(_) | ParseState::CurlyBraceComment(_)
        )
    }

    /// Whether this is a quoted literal.
    pub fn is_quoted(&self) -> bool {
        matches!(self, ParseState::SingleQuoted(_) | ParseState::DoubleQuoted(_))
    }

    /// The same state, but returning into a procedural block.
    pub fn into_block(self) -> Self {
        let block = Resume::ProceduralBlock;
        match self {
            ParseState::Normal | ParseState::ProceduralBlock => ParseState::ProceduralBlock,
            ParseState::LineComment(_) => ParseState::LineComment(block),
            ParseState::BlockComment(_) => ParseState::BlockComment(block),
            ParseState::CurlyBraceComment(_) => ParseState::CurlyBraceComment(block),
            ParseState::SingleQuoted(_) => ParseState::SingleQuoted(block),
            ParseState::DoubleQuoted(_) => ParseState::DoubleQuoted(block),
        }
    }

    /// Step the machine.
    pub fn transition(self, current: char, next: Option<char>, options: &ParseOptions) -> Transition {
        match self {
            ParseState::Normal | ParseState::ProceduralBlock => self.code(current, next, options),
            ParseState::LineComment(resume) => {
                if current == '\n' {
                    let action = match resume {
                        Resume::Normal => Action::Append,
                        Resume::ProceduralBlock => Action::EndLine,
                    };
                    Transition::new(resume.into(), action)
                } else {
                    Transition::new(self, Action::Discard)
                }
            }
            ParseState::BlockComment(resume) => {
                if current == '*' && next == Some('/') {
                    Transition::new(resume.into(), Action::DiscardWithNext)
                } else {
                    Transition::new(self, Action::Discard)
                }
            }
            ParseState::CurlyBraceComment(resume) => {
                if current == '}' {
                    Transition::new(resume.into(), Action::Discard)
                } else {
                    Transition::new(self, Action::Discard)
                }
            }
            ParseState::SingleQuoted(resume) => self.quoted('\'', resume, current, next, options),
            ParseState::DoubleQuoted(resume) => self.quoted('"', resume, current, next, options),
        }
    }

    fn code(self, current: char, next: Option<char>, options: &ParseOptions) -> Transition {
        let resume = self.resume();
        match current {
            '-' if next == Some('-') => {
                Transition::new(ParseState::LineComment(resume), Action::DiscardWithNext)
            }
            '/' if next == Some('*') => {
                Transition::new(ParseState::BlockComment(resume), Action::DiscardWithNext)
            }
            '{' if options.curly_brace_comments => {
                Transition::new(ParseState::CurlyBraceComment(resume), Action::Discard)
            }
            '\'' => Transition::new(ParseState::SingleQuoted(resume), Action::Append),
            '"' => Transition::new(ParseState::DoubleQuoted(resume), Action::Append),
            '\\' if options.backslash_escaping && next.is_some() => {
                Transition::new(self, Action::AppendWithNext)
            }
            ';' if resume == Resume::Normal => Transition::new(self, Action::EndStatement),
            '\n' if resume == Resume::ProceduralBlock => Transition::new(self, Action::EndLine),
            _ => Transition::new(self, Action::Append),
        }
    }

    fn quoted(
        self,
        quote: char,
        resume: Resume,
        current: char,
        next: Option<char>,
        options: &ParseOptions,
    ) -> Transition {
        if current == quote {
            // a doubled quote stays inside the literal
            if next == Some(quote) {
                Transition::new(self, Action::AppendWithNext)
            } else {
                Transition::new(resume.into(), Action::Append)
            }
        } else if current == '\\' && options.backslash_escaping && next.is_some() {
            Transition::new(self, Action::AppendWithNext)
        } else {
            Transition::new(self, Action::Append)
        }
    }
}
