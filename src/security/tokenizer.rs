//! Command tokenizer for the supported shell subset.
//!
//! # Grammar
//!
//! ```text
//! command   := operation ( "&&" operation )*
//! operation := word*
//! word      := ( bare | '...' | "..." )+
//! ```
//!
//! - Words are separated by spaces or tabs.
//! - Single quotes are literal. Double quotes are literal except that `$`,
//!   backticks and backslashes are rejected inside them.
//! - Outside quotes, `| ; & < > ( ) { } $` and backticks are rejected, as is a
//!   word starting with `~`, a newline, or a lone `&`.
//! - Outside quotes, the glob characters `* ? [` are rejected: the shell would
//!   expand them into paths that were never checked. Quote them to pass them
//!   literally.
//! - A backslash is a literal path separator on Windows and rejected elsewhere.
//!
//! Anything outside this subset is a [`SyntaxError`]; it is never passed
//! through.

use thiserror::Error;

const SEPARATOR: &str = "&&";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyntaxError {
    #[error("unsupported shell syntax '{found}' at byte {offset}")]
    Unsupported { found: char, offset: usize },

    #[error("unterminated {quote} quote starting at byte {offset}")]
    UnterminatedQuote { quote: char, offset: usize },

    #[error("home directory expansion at byte {offset} is not supported")]
    TildeExpansion { offset: usize },
}

/// One `&&`-delimited segment of a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    pub verb: String,
    pub arguments: Vec<String>,
    /// The trimmed source text of this segment, quotes included.
    pub source: String,
}

/// A tokenizer failure together with the index of the operation it hit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatedSyntaxError {
    pub index: usize,
    pub error: SyntaxError,
}

/// Split `command` into operations. Segments with no words are skipped.
pub fn tokenize(command: &str) -> Result<Vec<Operation>, LocatedSyntaxError> {
    let mut lexer = Lexer::new(command);
    let mut operations = Vec::new();

    loop {
        let index = operations.len();
        let start = lexer.pos;
        let words = lexer
            .operation_words()
            .map_err(|error| LocatedSyntaxError { index, error })?;
        let source = command[start..lexer.pos].trim().to_string();

        if let Some((verb, arguments)) = words.split_first() {
            operations.push(Operation {
                verb: verb.clone(),
                arguments: arguments.to_vec(),
                source,
            });
        }

        if !lexer.eat_separator() {
            break;
        }
    }

    Ok(operations)
}

struct Lexer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn at_separator(&self) -> bool {
        self.input[self.pos..].starts_with(SEPARATOR)
    }

    fn eat_separator(&mut self) -> bool {
        if self.at_separator() {
            self.pos += SEPARATOR.len();
            true
        } else {
            false
        }
    }

    fn skip_blanks(&mut self) {
        while matches!(self.peek(), Some(' ' | '\t')) {
            self.pos += 1;
        }
    }

    /// Read words up to the next separator or end of input.
    fn operation_words(&mut self) -> Result<Vec<String>, SyntaxError> {
        let mut words = Vec::new();
        loop {
            self.skip_blanks();
            if self.peek().is_none() || self.at_separator() {
                return Ok(words);
            }
            words.push(self.word()?);
        }
    }

    fn word(&mut self) -> Result<String, SyntaxError> {
        let mut word = String::new();
        if self.peek() == Some('~') {
            return Err(SyntaxError::TildeExpansion { offset: self.pos });
        }

        while let Some(ch) = self.peek() {
            let offset = self.pos;
            match ch {
                ' ' | '\t' => break,
                '&' if self.at_separator() => break,
                '\'' => {
                    self.bump();
                    self.single_quoted(&mut word, offset)?;
                }
                '"' => {
                    self.bump();
                    self.double_quoted(&mut word, offset)?;
                }
                '\\' if cfg!(windows) => {
                    self.bump();
                    word.push(ch);
                }
                c if is_metachar(c) => {
                    return Err(SyntaxError::Unsupported { found: c, offset });
                }
                c => {
                    self.bump();
                    word.push(c);
                }
            }
        }
        Ok(word)
    }

    fn single_quoted(&mut self, word: &mut String, open: usize) -> Result<(), SyntaxError> {
        while let Some(ch) = self.bump() {
            if ch == '\'' {
                return Ok(());
            }
            word.push(ch);
        }
        Err(SyntaxError::UnterminatedQuote { quote: '\'', offset: open })
    }

    fn double_quoted(&mut self, word: &mut String, open: usize) -> Result<(), SyntaxError> {
        while let Some(ch) = self.peek() {
            let offset = self.pos;
            self.bump();
            match ch {
                '"' => return Ok(()),
                '$' | '`' | '\\' => return Err(SyntaxError::Unsupported { found: ch, offset }),
                c => word.push(c),
            }
        }
        Err(SyntaxError::UnterminatedQuote { quote: '"', offset: open })
    }
}

fn is_metachar(c: char) -> bool {
    matches!(
        c,
        '|' | ';' | '&' | '<' | '>' | '(' | ')' | '{' | '}' | '$' | '`' | '\\' | '\n' | '\r'
            // globs
            | '*' | '?' | '['
    )
}
