//! The document façade.
//!
//! A [`Config`] owns one setting tree and the include directory used to
//! resolve relative paths, both for `@include` directives and for
//! [`read_file`](Config::read_file) / [`write_file`](Config::write_file).

use crate::error::{ConfigError, Result};
use crate::parser::{resolve_path, Parser};
use crate::printer;
use crate::setting::{SettingMut, SettingRef, SettingTree};
use std::env;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// A configuration document: an anonymous root group plus the include
/// directory.
///
/// ```
/// use cfgtree::Config;
///
/// let config: Config = "port = 8080;\nname = \"demo\";".parse()?;
/// assert_eq!(config.root().lookup_value::<i32>("port"), Some(8080));
/// # Ok::<(), cfgtree::ConfigError>(())
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    tree: SettingTree,
    include_dir: PathBuf,
}

impl Config {
    /// An empty document. The include directory defaults to the process's
    /// current working directory.
    pub fn new() -> Self {
        Self {
            tree: SettingTree::new(),
            include_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }

    /// Parses a file into a new document.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let mut config = Self::new();
        config.read_file(path)?;
        Ok(config)
    }

    /// Parses a file, replacing the current tree. Relative paths resolve
    /// against the include directory. The tree is left unchanged on error.
    pub fn read_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let resolved = resolve_path(path.as_ref(), &self.include_dir)?;
        self.tree = Parser::parse_file(&resolved, &self.include_dir)?;
        Ok(())
    }

    /// Parses in-memory text, replacing the current tree. `@include`
    /// directives resolve against the include directory. The tree is left
    /// unchanged on error.
    pub fn read_str(&mut self, text: &str) -> Result<()> {
        self.tree = Parser::parse_str(text, &self.include_dir)?;
        Ok(())
    }

    /// Pretty-prints the document to a file, truncating any previous
    /// contents and flushing before returning.
    pub fn write_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let resolved = resolve_path(path.as_ref(), &self.include_dir)?;
        let mut file =
            fs::File::create(&resolved).map_err(|e| ConfigError::file_io(&resolved, e))?;
        file.write_all(printer::print_document(&self.tree).as_bytes())
            .map_err(|e| ConfigError::file_io(&resolved, e))?;
        file.flush().map_err(|e| ConfigError::file_io(&resolved, e))?;
        Ok(())
    }

    /// Sets the directory non-absolute paths resolve against.
    pub fn set_include_dir(&mut self, dir: impl Into<PathBuf>) {
        self.include_dir = dir.into();
    }

    /// The directory non-absolute paths resolve against.
    pub fn include_dir(&self) -> &Path {
        &self.include_dir
    }

    /// Read access to the root group.
    pub fn root(&self) -> SettingRef<'_> {
        SettingRef::new(&self.tree, self.tree.root_id())
    }

    /// Mutable access to the root group.
    pub fn root_mut(&mut self) -> SettingMut<'_> {
        let root = self.tree.root_id();
        SettingMut::new(&mut self.tree, root)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        let mut config = Config::new();
        config.read_str(s)?;
        Ok(config)
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&printer::print_document(&self.tree))
    }
}
