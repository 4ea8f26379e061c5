//! # cfgtree
//!
//! A parser, typed tree model, and pretty-printer for libconfig-style
//! configuration text, with serde integration.
//!
//! ## Overview
//!
//! Documents are trees of named settings: scalars (32- and 64-bit
//! integers, single-precision floats, strings, booleans), homogeneous
//! arrays of scalars, heterogeneous lists, and name-keyed groups.
//! Settings are addressed by dotted paths, read through type-checked
//! conversions, mutated in place, and printed back to text that parses
//! into an equal tree.
//!
//! ## Basic usage
//!
//! ```
//! use cfgtree::Config;
//!
//! let config: Config = r#"
//!     server = {
//!         host = "localhost";
//!         port = 8080;
//!         backends = ( "alpha", "beta" );
//!     };
//!     retries = [1, 2, 4];
//! "#
//! .parse()?;
//!
//! let root = config.root();
//! assert_eq!(root.lookup("server.port")?.value::<i32>()?, 8080);
//! assert_eq!(root.lookup("server.backends.[1]")?.as_str()?, "beta");
//! assert_eq!(root.lookup("retries")?.len(), 3);
//! # Ok::<(), cfgtree::ConfigError>(())
//! ```
//!
//! ## Serde integration
//!
//! Use `#[derive(Deserialize)]` to read whole documents into structs:
//!
//! ```
//! use serde::Deserialize;
//!
//! #[derive(Debug, Deserialize)]
//! struct Limits {
//!     connections: u32,
//!     timeout: f64,
//! }
//!
//! let limits: Limits = cfgtree::from_str("connections = 64;\ntimeout = 2.5;")?;
//! assert_eq!(limits.connections, 64);
//! # Ok::<(), cfgtree::ConfigError>(())
//! ```
//!
//! ## Mutation and round-tripping
//!
//! ```
//! use cfgtree::{Config, IntegerFormat, SettingType};
//!
//! let mut config = Config::new();
//! let mut root = config.root_mut();
//! let mut group = root.add("device", SettingType::Group)?;
//! group.add_value("id", 0x2a)?.set_format(IntegerFormat::Hex);
//! group.add_value("label", "spin")?;
//!
//! let text = config.to_string();
//! let reparsed: Config = text.parse()?;
//! assert!(reparsed.root() == config.root());
//! # Ok::<(), cfgtree::ConfigError>(())
//! ```
//!
//! ## Includes
//!
//! `@include "other.cfg"` splices another file's tokens in place of the
//! directive before grammar parsing; the final path component may be a
//! regex pattern matched against the files of its parent directory.
//! Relative paths resolve against [`Config::include_dir`]. Include
//! recursion is bounded; exceeding the bound is a file-I/O error.
//!
//! ## Errors
//!
//! Everything surfaces as a [`ConfigError`]: parse errors carry the file,
//! line, and column of the offending token; lookup failures carry the
//! requested path. The library never writes to stderr.

pub mod config;
pub mod de;
pub mod error;
pub mod lexer;
mod parser;
mod printer;
pub mod setting;

pub use config::Config;
pub use de::{from_config, from_file, from_setting, from_str};
pub use error::{ConfigError, Position, Result};
pub use lexer::{Lexer, Token};
pub use setting::{
    Children, DetachedSetting, FromSetting, IntegerFormat, ScalarValue, SettingMut, SettingRef,
    SettingType, SourceInfo,
};
