//! Lexical analysis.
//!
//! The [`Lexer`] turns input text into a flat sequence of [`Token`]s:
//! single-character punctuation, quoted strings (escapes decoded, the
//! surrounding quotes retained so later passes can tell strings from
//! identifiers), and maximal runs of everything else. Comments and
//! whitespace are stripped here; interpreting the lexemes is the parser's
//! job.

use crate::error::{ConfigError, Position, Result};
use std::iter::Peekable;
use std::path::{Path, PathBuf};
use std::str::Chars;
use std::sync::Arc;

/// Characters that always form a single-character token.
const PUNCTUATION: [char; 10] = ['{', '}', '[', ']', '(', ')', ',', '=', ':', ';'];

/// Tests whether a character belongs to the fixed punctuation set.
pub(crate) fn is_punctuation(c: char) -> bool {
    PUNCTUATION.contains(&c)
}

/// A single lexeme with its source coordinates.
///
/// Tokens own their text. String-literal tokens keep their surrounding
/// quotes; the content between the quotes has escape sequences already
/// decoded.
#[derive(Debug, Clone)]
pub struct Token {
    text: String,
    file: Arc<PathBuf>,
    line: usize,
    column: usize,
}

impl Token {
    pub(crate) fn new(text: impl Into<String>, file: Arc<PathBuf>, position: Position) -> Self {
        Self {
            text: text.into(),
            file,
            line: position.line,
            column: position.column,
        }
    }

    /// The lexeme text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The file this token was read from.
    pub fn file(&self) -> &Path {
        &self.file
    }

    /// Line of the token's first character (1-based).
    pub fn line(&self) -> usize {
        self.line
    }

    /// Column of the token's first character (1-based).
    pub fn column(&self) -> usize {
        self.column
    }

    /// Position of the token's first character.
    pub fn position(&self) -> Position {
        Position::new(self.line, self.column)
    }

    pub(crate) fn is(&self, lexeme: &str) -> bool {
        self.text == lexeme
    }

    pub(crate) fn is_string(&self) -> bool {
        self.text.starts_with('"')
    }

    pub(crate) fn is_punctuation(&self) -> bool {
        let mut chars = self.text.chars();
        matches!((chars.next(), chars.next()), (Some(c), None) if is_punctuation(c))
    }

    pub(crate) fn file_handle(&self) -> Arc<PathBuf> {
        Arc::clone(&self.file)
    }

    /// A parse error pointing at this token's first character.
    pub(crate) fn error(&self, message: impl Into<String>) -> ConfigError {
        ConfigError::parse(message, (*self.file).clone(), self.position())
    }

    /// A parse error pointing one past this token's end, used for
    /// end-of-input diagnostics anchored to the last token seen.
    pub(crate) fn error_at_end(&self, message: impl Into<String>) -> ConfigError {
        let end = Position::new(self.line, self.column + self.text.chars().count());
        ConfigError::parse(message, (*self.file).clone(), end)
    }

    /// Splices an adjacent string literal onto this one: the closing quote
    /// here and the opening quote there are dropped.
    pub(crate) fn splice_string(&mut self, other: &Token) {
        debug_assert!(self.is_string() && other.is_string());
        self.text.pop();
        self.text.push_str(&other.text[1..]);
    }
}

/// Tokenizer over a single input text.
pub struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
    file: Arc<PathBuf>,
    line: usize,
    column: usize,
}

impl<'a> Lexer<'a> {
    /// Creates a lexer over `input`; `file` is recorded on every token and
    /// in every diagnostic.
    pub fn new(input: &'a str, file: impl Into<PathBuf>) -> Self {
        Self {
            chars: input.chars().peekable(),
            file: Arc::new(file.into()),
            line: 1,
            column: 1,
        }
    }

    /// Consumes the input and returns all tokens.
    pub fn tokenize(mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            self.skip_trivia()?;
            let start = self.position();
            let c = match self.bump() {
                Some(c) => c,
                None => break,
            };
            let token = match c {
                c if is_punctuation(c) => Token::new(c, Arc::clone(&self.file), start),
                '"' => self.lex_string(start)?,
                '\\' => return Err(self.err("unexpected character '\\'", start)),
                other => self.lex_word(other, start),
            };
            tokens.push(token);
        }
        Ok(tokens)
    }

    /// Position of the next unread character.
    fn position(&self) -> Position {
        Position::new(self.line, self.column)
    }

    fn err(&self, message: impl Into<String>, position: Position) -> ConfigError {
        ConfigError::parse(message, (*self.file).clone(), position)
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    /// Skips whitespace and all three comment forms. `#` and `//` run to
    /// end of line; `/* */` does not nest and must be closed before end of
    /// input. A `/` not followed by `/` or `*` is a lexical error.
    fn skip_trivia(&mut self) -> Result<()> {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some('#') => {
                    self.bump();
                    self.skip_line_comment();
                }
                Some('/') => {
                    let start = self.position();
                    self.bump();
                    match self.peek() {
                        Some('/') => {
                            self.bump();
                            self.skip_line_comment();
                        }
                        Some('*') => {
                            self.bump();
                            self.skip_block_comment()?;
                        }
                        Some(other) => {
                            return Err(self.err(
                                format!("unexpected character '{other}' after '/'"),
                                start,
                            ));
                        }
                        None => {
                            return Err(self.err("unexpected end of input after '/'", start));
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn skip_line_comment(&mut self) {
        while let Some(c) = self.bump() {
            if c == '\n' {
                break;
            }
        }
    }

    fn skip_block_comment(&mut self) -> Result<()> {
        loop {
            match self.bump() {
                Some('*') if self.peek() == Some('/') => {
                    self.bump();
                    return Ok(());
                }
                Some(_) => {}
                None => {
                    let end = self.position();
                    return Err(self.err("unterminated comment", end));
                }
            }
        }
    }

    /// Lexes a string literal; the opening quote has been consumed. The
    /// token keeps both quotes and holds decoded escape sequences.
    fn lex_string(&mut self, start: Position) -> Result<Token> {
        let mut text = String::from('"');
        loop {
            let at = self.position();
            match self.bump() {
                None => return Err(self.err("unterminated string", self.position())),
                Some('"') => {
                    text.push('"');
                    return Ok(Token::new(text, Arc::clone(&self.file), start));
                }
                Some('\\') => match self.bump() {
                    None => return Err(self.err("unterminated string", self.position())),
                    Some('\\') => text.push('\\'),
                    Some('"') => text.push('"'),
                    Some('t') => text.push('\t'),
                    Some('n') => text.push('\n'),
                    Some(other) => {
                        return Err(self.err(format!("invalid escape sequence '\\{other}'"), at));
                    }
                },
                Some(c) => text.push(c),
            }
        }
    }

    /// Lexes an identifier or numeric literal: a maximal run ending at
    /// whitespace, punctuation, a quote, or a comment introducer.
    fn lex_word(&mut self, first: char, start: Position) -> Token {
        let mut text = String::new();
        text.push(first);
        while let Some(c) = self.peek() {
            if c.is_whitespace() || is_punctuation(c) || matches!(c, '"' | '/' | '\\' | '#') {
                break;
            }
            text.push(c);
            self.bump();
        }
        Token::new(text, Arc::clone(&self.file), start)
    }
}
