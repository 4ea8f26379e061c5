//! Parsing tokens into a setting tree.
//!
//! Parsing runs in three passes over a token vector: `@include` directives
//! are expanded by recursively tokenizing each matched file and splicing
//! its tokens in place of the directive; adjacent string literals are
//! concatenated; then the grammar pass builds the tree by recursive
//! descent. The first diagnosed error aborts the parse.

use crate::error::{ConfigError, Position, Result};
use crate::lexer::{Lexer, Token};
use crate::setting::{
    IntegerFormat, Payload, ScalarValue, SettingId, SettingTree, SettingType, SourceInfo,
};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Nested includes beyond this depth abort with a file-I/O error, which
/// bounds include cycles.
pub(crate) const MAX_INCLUDE_DEPTH: usize = 64;

/// Aggregates nested beyond this depth abort the parse.
const MAX_NESTING_DEPTH: usize = 128;

static RX_HEX: Lazy<Regex> = Lazy::new(|| Regex::new("^0[Xx][0-9A-Fa-f]+$").unwrap());
static RX_HEX64: Lazy<Regex> = Lazy::new(|| Regex::new("^0[Xx][0-9A-Fa-f]+LL?$").unwrap());
static RX_INT: Lazy<Regex> = Lazy::new(|| Regex::new("^[-+]?[0-9]+$").unwrap());
static RX_INT64: Lazy<Regex> = Lazy::new(|| Regex::new("^[-+]?[0-9]+LL?$").unwrap());
static RX_FLOAT: Lazy<Regex> = Lazy::new(|| {
    Regex::new("^(?:[-+]?[0-9]*\\.[0-9]*(?:[eE][-+]?[0-9]+)?|[-+]?[0-9]+(?:\\.[0-9]*)?[eE][-+]?[0-9]+)$")
        .unwrap()
});

/// Resolves a file name against the include directory: absolute paths
/// pass through, everything else is joined onto `include_dir`.
pub(crate) fn resolve_path(path: &Path, include_dir: &Path) -> Result<PathBuf> {
    if path.as_os_str().is_empty() {
        return Err(ConfigError::invalid_argument("filename is empty"));
    }
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(include_dir.join(path))
    }
}

/// Reads and tokenizes one file, expanding its includes.
pub(crate) fn load_tokens(path: &Path, include_dir: &Path, depth: usize) -> Result<Vec<Token>> {
    if depth > MAX_INCLUDE_DEPTH {
        return Err(ConfigError::file_io(
            path,
            io::Error::other(format!(
                "maximum include depth ({MAX_INCLUDE_DEPTH}) exceeded"
            )),
        ));
    }
    let text = fs::read_to_string(path).map_err(|e| ConfigError::file_io(path, e))?;
    let tokens = Lexer::new(&text, path).tokenize()?;
    expand_includes(tokens, include_dir, depth)
}

/// Replaces each `@include <path>` token pair with the tokens of every
/// file the path names.
pub(crate) fn expand_includes(
    tokens: Vec<Token>,
    include_dir: &Path,
    depth: usize,
) -> Result<Vec<Token>> {
    let mut out = Vec::with_capacity(tokens.len());
    let mut iter = tokens.into_iter();
    while let Some(token) = iter.next() {
        if token.is("@include") {
            let path_token = iter
                .next()
                .ok_or_else(|| token.error_at_end("expected a path after '@include'"))?;
            out.extend(include_files(&path_token, include_dir, depth)?);
        } else {
            out.push(token);
        }
    }
    Ok(out)
}

/// Collects the files an include path names and tokenizes each one.
///
/// A path without a directory separator names exactly one file. Otherwise
/// the final component is an anchored regex pattern over the parent
/// directory's regular-file entries, matched in enumeration order; zero
/// matches contribute zero tokens.
fn include_files(path_token: &Token, include_dir: &Path, depth: usize) -> Result<Vec<Token>> {
    let raw = unquote(path_token.text());
    if raw.is_empty() {
        return Err(path_token.error("empty include path"));
    }
    let resolved = resolve_path(Path::new(raw), include_dir)?;
    let resolved = resolved.to_string_lossy().into_owned();

    let mut files: Vec<PathBuf> = Vec::new();
    match resolved.rfind('/') {
        None => files.push(PathBuf::from(&resolved)),
        Some(split) if split + 1 == resolved.len() => {
            return Err(ConfigError::file_io(
                &resolved,
                io::Error::other("include path has no file component"),
            ));
        }
        Some(split) => {
            let directory = &resolved[..split];
            let pattern = &resolved[split + 1..];
            let regex = Regex::new(&format!("^{pattern}$"))
                .map_err(|_| path_token.error(format!("invalid include pattern '{pattern}'")))?;
            for entry in fs::read_dir(directory).map_err(|e| ConfigError::file_io(directory, e))? {
                let entry = entry.map_err(|e| ConfigError::file_io(directory, e))?;
                let file_type = entry
                    .file_type()
                    .map_err(|e| ConfigError::file_io(entry.path(), e))?;
                if file_type.is_file() && regex.is_match(&entry.file_name().to_string_lossy()) {
                    files.push(entry.path());
                }
            }
        }
    }

    let mut tokens = Vec::new();
    for file in files {
        tokens.extend(load_tokens(&file, include_dir, depth + 1)?);
    }
    Ok(tokens)
}

fn unquote(text: &str) -> &str {
    if text.len() >= 2 && text.starts_with('"') && text.ends_with('"') {
        &text[1..text.len() - 1]
    } else {
        text
    }
}

/// Merges adjacent string-literal tokens, splicing out the quote pair
/// between them. The merged token keeps the left token's coordinates.
pub(crate) fn concat_strings(tokens: Vec<Token>) -> Vec<Token> {
    let mut out: Vec<Token> = Vec::with_capacity(tokens.len());
    for token in tokens {
        match out.last_mut() {
            Some(previous) if previous.is_string() && token.is_string() => {
                previous.splice_string(&token);
            }
            _ => out.push(token),
        }
    }
    out
}

/// Classifies and parses one scalar token: quoted strings, case-folded
/// booleans, hex and decimal integers (`L`/`LL` marks 64-bit), and
/// floats, in that order. Integer overflow is a parse error.
fn parse_scalar_token(token: &Token) -> Result<(ScalarValue, IntegerFormat)> {
    let text = token.text();
    let out_of_range = || token.error(format!("integer literal '{text}' out of range"));

    if text.starts_with('"') {
        let content = &text[1..text.len() - 1];
        return Ok((ScalarValue::Str(content.to_string()), IntegerFormat::Decimal));
    }
    if text.eq_ignore_ascii_case("true") {
        return Ok((ScalarValue::Boolean(true), IntegerFormat::Decimal));
    }
    if text.eq_ignore_ascii_case("false") {
        return Ok((ScalarValue::Boolean(false), IntegerFormat::Decimal));
    }
    if RX_HEX.is_match(text) {
        let value = i32::from_str_radix(&text[2..], 16).map_err(|_| out_of_range())?;
        return Ok((ScalarValue::Int(value), IntegerFormat::Hex));
    }
    if RX_HEX64.is_match(text) {
        let digits = text[2..].trim_end_matches('L');
        let value = i64::from_str_radix(digits, 16).map_err(|_| out_of_range())?;
        return Ok((ScalarValue::Int64(value), IntegerFormat::Hex));
    }
    if RX_INT.is_match(text) {
        let value = text.parse::<i32>().map_err(|_| out_of_range())?;
        return Ok((ScalarValue::Int(value), IntegerFormat::Decimal));
    }
    if RX_INT64.is_match(text) {
        let value = text
            .trim_end_matches('L')
            .parse::<i64>()
            .map_err(|_| out_of_range())?;
        return Ok((ScalarValue::Int64(value), IntegerFormat::Decimal));
    }
    if RX_FLOAT.is_match(text) {
        let value = text
            .parse::<f32>()
            .map_err(|_| token.error(format!("invalid scalar '{text}'")))?;
        return Ok((ScalarValue::Float(value), IntegerFormat::Decimal));
    }
    Err(token.error(format!("invalid scalar '{text}'")))
}

fn source_of(token: &Token) -> SourceInfo {
    SourceInfo::new(token.file_handle(), token.line(), token.column())
}

/// Where a parsed value gets attached.
enum Target<'a> {
    /// A named child of a group.
    Group { parent: SettingId, name: &'a Token },
    /// An anonymous element of a list.
    List { parent: SettingId },
}

/// The grammar pass: consumes the flattened token vector and builds the
/// tree rooted at an anonymous group.
pub(crate) struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    file: PathBuf,
}

impl Parser {
    /// Parses a file (with include expansion) into a tree.
    pub(crate) fn parse_file(path: &Path, include_dir: &Path) -> Result<SettingTree> {
        let tokens = load_tokens(path, include_dir, 0)?;
        Self::build(tokens, path)
    }

    /// Parses in-memory text into a tree; diagnostics use the pseudo-file
    /// name `<string>`.
    pub(crate) fn parse_str(text: &str, include_dir: &Path) -> Result<SettingTree> {
        let file = Path::new("<string>");
        let tokens = Lexer::new(text, file).tokenize()?;
        let tokens = expand_includes(tokens, include_dir, 0)?;
        Self::build(tokens, file)
    }

    fn build(tokens: Vec<Token>, file: &Path) -> Result<SettingTree> {
        let tokens = concat_strings(tokens);
        let mut parser = Parser {
            tokens,
            pos: 0,
            file: file.to_path_buf(),
        };
        let mut tree = SettingTree::new();
        let root = tree.root_id();
        while parser.peek().is_some() {
            parser.parse_setting(&mut tree, root, 0)?;
        }
        Ok(tree)
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    /// End-of-input error anchored one past the last token.
    fn eof_error(&self) -> ConfigError {
        match self.tokens.last() {
            Some(last) => last.error_at_end("unexpected end of file"),
            None => ConfigError::parse("unexpected end of file", self.file.clone(), Position::start()),
        }
    }

    /// `setting := IDENT ("=" | ":") value terminator?`
    fn parse_setting(&mut self, tree: &mut SettingTree, group: SettingId, depth: usize) -> Result<()> {
        let name = match self.bump() {
            Some(token) => token,
            None => return Err(self.eof_error()),
        };
        if name.is_punctuation() {
            return Err(name.error(format!("unexpected token '{}'", name.text())));
        }
        if name.is_string() {
            return Err(name.error("expected a setting name"));
        }
        match self.bump() {
            Some(token) if token.is("=") || token.is(":") => {}
            Some(token) => {
                return Err(token.error(format!(
                    "expected '=' or ':' after setting name, found '{}'",
                    token.text()
                )));
            }
            None => return Err(name.error_at_end("unexpected end of file")),
        }
        self.parse_value(
            tree,
            Target::Group {
                parent: group,
                name: &name,
            },
            depth,
        )?;
        // at most one trailing ';' or ',' is consumed
        if self.peek().map(|t| t.is(";") || t.is(",")).unwrap_or(false) {
            self.bump();
        }
        Ok(())
    }

    fn attach(
        &self,
        tree: &mut SettingTree,
        target: &Target<'_>,
        payload: Payload,
        format: IntegerFormat,
        source: SourceInfo,
    ) -> Result<SettingId> {
        match target {
            Target::Group { parent, name } => {
                tree.attach_to_group(*parent, name.text(), payload, format, Some(source))
            }
            Target::List { parent } => tree.attach_to_list(*parent, payload, format, Some(source)),
        }
    }

    /// `value := scalar | group | list | array`
    fn parse_value(
        &mut self,
        tree: &mut SettingTree,
        target: Target<'_>,
        depth: usize,
    ) -> Result<SettingId> {
        if depth > MAX_NESTING_DEPTH {
            return Err(match self.peek() {
                Some(token) => token.error("maximum nesting depth exceeded"),
                None => self.eof_error(),
            });
        }
        let token = match self.bump() {
            Some(token) => token,
            None => return Err(self.eof_error()),
        };
        let source = match &target {
            Target::Group { name, .. } => source_of(name),
            Target::List { .. } => source_of(&token),
        };
        match token.text() {
            "{" => {
                let id = self.attach(
                    tree,
                    &target,
                    Payload::empty(SettingType::Group),
                    IntegerFormat::Decimal,
                    source,
                )?;
                loop {
                    match self.peek() {
                        None => return Err(token.error("unmatched '{'")),
                        Some(t) if t.is("}") => {
                            self.bump();
                            break;
                        }
                        Some(_) => self.parse_setting(tree, id, depth + 1)?,
                    }
                }
                Ok(id)
            }
            "(" => {
                let id = self.attach(
                    tree,
                    &target,
                    Payload::empty(SettingType::List),
                    IntegerFormat::Decimal,
                    source,
                )?;
                if self.peek().map(|t| t.is(")")).unwrap_or(false) {
                    self.bump();
                    return Ok(id);
                }
                loop {
                    self.parse_value(tree, Target::List { parent: id }, depth + 1)?;
                    match self.bump() {
                        Some(t) if t.is(",") => continue,
                        Some(t) if t.is(")") => break,
                        Some(t) => {
                            return Err(t.error(format!(
                                "expected ',' or ')' in list, found '{}'",
                                t.text()
                            )));
                        }
                        None => return Err(token.error("unmatched '('")),
                    }
                }
                Ok(id)
            }
            "[" => {
                let id = self.attach(
                    tree,
                    &target,
                    Payload::empty(SettingType::Array),
                    IntegerFormat::Decimal,
                    source,
                )?;
                if self.peek().map(|t| t.is("]")).unwrap_or(false) {
                    self.bump();
                    return Ok(id);
                }
                loop {
                    let element = match self.bump() {
                        Some(t) => t,
                        None => return Err(token.error("unmatched '['")),
                    };
                    if matches!(element.text(), "{" | "(" | "[") {
                        return Err(element.error("array elements must be scalar values"));
                    }
                    let (value, format) = parse_scalar_token(&element)?;
                    tree.attach_to_array(
                        id,
                        Payload::from_scalar(value),
                        format,
                        Some(source_of(&element)),
                    )?;
                    match self.bump() {
                        Some(t) if t.is(",") => continue,
                        Some(t) if t.is("]") => break,
                        Some(t) => {
                            return Err(t.error(format!(
                                "expected ',' or ']' in array, found '{}'",
                                t.text()
                            )));
                        }
                        None => return Err(token.error("unmatched '['")),
                    }
                }
                Ok(id)
            }
            _ => {
                let (value, format) = parse_scalar_token(&token)?;
                self.attach(tree, &target, Payload::from_scalar(value), format, source)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scalar(text: &str) -> Result<(ScalarValue, IntegerFormat)> {
        let tokens = Lexer::new(text, "test.cfg").tokenize()?;
        parse_scalar_token(&tokens[0])
    }

    #[test]
    fn scalar_typing_follows_the_literal_rules() {
        assert_eq!(scalar("42").unwrap().0, ScalarValue::Int(42));
        assert_eq!(scalar("-7").unwrap().0, ScalarValue::Int(-7));
        assert_eq!(scalar("+7").unwrap().0, ScalarValue::Int(7));
        assert_eq!(scalar("42L").unwrap().0, ScalarValue::Int64(42));
        assert_eq!(scalar("42LL").unwrap().0, ScalarValue::Int64(42));
        assert_eq!(scalar("TRUE").unwrap().0, ScalarValue::Boolean(true));
        assert_eq!(scalar("False").unwrap().0, ScalarValue::Boolean(false));
        assert_eq!(scalar("1.5").unwrap().0, ScalarValue::Float(1.5));
        assert_eq!(scalar(".5").unwrap().0, ScalarValue::Float(0.5));
        assert_eq!(scalar("1.").unwrap().0, ScalarValue::Float(1.0));
        assert_eq!(scalar("2e3").unwrap().0, ScalarValue::Float(2000.0));
        assert_eq!(scalar("1.5e-2").unwrap().0, ScalarValue::Float(0.015));
    }

    #[test]
    fn hex_literals_set_the_format_hint() {
        assert_eq!(
            scalar("0xFF").unwrap(),
            (ScalarValue::Int(255), IntegerFormat::Hex)
        );
        assert_eq!(
            scalar("0XffL").unwrap(),
            (ScalarValue::Int64(255), IntegerFormat::Hex)
        );
    }

    #[test]
    fn int_overflow_is_a_parse_error() {
        assert!(scalar("2147483648").is_err());
        assert!(scalar("0xFFFFFFFF").is_err());
        assert!(scalar("9223372036854775808L").is_err());
        assert!(scalar("2147483647").is_ok());
    }

    #[test]
    fn unclassifiable_tokens_are_invalid_scalars() {
        for bad in ["banana", "12x", "1.2.3", "--4", "0x", "L", "."] {
            assert!(scalar(bad).is_err(), "expected invalid scalar for {bad:?}");
        }
    }
}
