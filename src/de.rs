//! Serde integration: deserialize Rust types from a parsed tree.
//!
//! Groups drive struct and map visitors, lists and arrays drive
//! sequences, and scalars visit the matching primitive. String settings
//! are borrowed from the tree, so `&str` fields work when deserializing
//! through [`from_config`].
//!
//! ```
//! use serde::Deserialize;
//!
//! #[derive(Deserialize)]
//! struct Server {
//!     host: String,
//!     port: u16,
//!     debug: bool,
//! }
//!
//! let server: Server = cfgtree::from_str(
//!     r#"
//!     host = "localhost";
//!     port = 8080;
//!     debug = true;
//!     "#,
//! )?;
//! assert_eq!(server.port, 8080);
//! # Ok::<(), cfgtree::ConfigError>(())
//! ```

use crate::config::Config;
use crate::error::{ConfigError, Result};
use crate::setting::{SettingRef, SettingType};
use serde::de::{self, DeserializeOwned, IntoDeserializer, MapAccess, SeqAccess, Visitor};
use serde::forward_to_deserialize_any;
use std::fmt::Display;
use std::path::Path;

impl de::Error for ConfigError {
    fn custom<T: Display>(msg: T) -> Self {
        ConfigError::type_error(msg.to_string())
    }
}

/// Parses text and deserializes the resulting document.
pub fn from_str<T: DeserializeOwned>(text: &str) -> Result<T> {
    let config: Config = text.parse()?;
    from_config(&config)
}

/// Parses a file and deserializes the resulting document.
pub fn from_file<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let config = Config::from_file(path)?;
    from_config(&config)
}

/// Deserializes a parsed document starting at its root group.
pub fn from_config<'de, T: de::Deserialize<'de>>(config: &'de Config) -> Result<T> {
    from_setting(config.root())
}

/// Deserializes starting at an arbitrary setting.
pub fn from_setting<'de, T: de::Deserialize<'de>>(setting: SettingRef<'de>) -> Result<T> {
    T::deserialize(SettingDeserializer { setting })
}

#[derive(Clone, Copy)]
struct SettingDeserializer<'de> {
    setting: SettingRef<'de>,
}

impl<'de> de::Deserializer<'de> for SettingDeserializer<'de> {
    type Error = ConfigError;

    fn deserialize_any<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        match self.setting.setting_type() {
            SettingType::Boolean => visitor.visit_bool(self.setting.value()?),
            SettingType::Int => visitor.visit_i32(self.setting.value()?),
            SettingType::Int64 => visitor.visit_i64(self.setting.value()?),
            SettingType::Float => visitor.visit_f32(self.setting.value()?),
            SettingType::String => visitor.visit_borrowed_str(self.setting.as_str()?),
            SettingType::Array | SettingType::List => {
                visitor.visit_seq(Elements::new(self.setting))
            }
            SettingType::Group => visitor.visit_map(Members::new(self.setting)),
        }
    }

    fn deserialize_option<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        visitor.visit_some(self)
    }

    fn deserialize_newtype_struct<V>(self, _name: &'static str, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        visitor.visit_newtype_struct(self)
    }

    /// Enums deserialize from string settings as unit variants.
    fn deserialize_enum<V>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        visitor.visit_enum(self.setting.as_str()?.into_deserializer())
    }

    forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string
        bytes byte_buf unit unit_struct seq tuple tuple_struct map struct
        identifier ignored_any
    }
}

struct Elements<'de> {
    setting: SettingRef<'de>,
    index: usize,
}

impl<'de> Elements<'de> {
    fn new(setting: SettingRef<'de>) -> Self {
        Self { setting, index: 0 }
    }
}

impl<'de> SeqAccess<'de> for Elements<'de> {
    type Error = ConfigError;

    fn next_element_seed<T>(&mut self, seed: T) -> Result<Option<T::Value>>
    where
        T: de::DeserializeSeed<'de>,
    {
        match self.setting.child(self.index) {
            Some(child) => {
                self.index += 1;
                seed.deserialize(SettingDeserializer { setting: child })
                    .map(Some)
            }
            None => Ok(None),
        }
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.setting.len().saturating_sub(self.index))
    }
}

struct Members<'de> {
    setting: SettingRef<'de>,
    index: usize,
}

impl<'de> Members<'de> {
    fn new(setting: SettingRef<'de>) -> Self {
        Self { setting, index: 0 }
    }
}

impl<'de> MapAccess<'de> for Members<'de> {
    type Error = ConfigError;

    fn next_key_seed<K>(&mut self, seed: K) -> Result<Option<K::Value>>
    where
        K: de::DeserializeSeed<'de>,
    {
        match self.setting.child(self.index) {
            Some(child) => seed.deserialize(child.name().into_deserializer()).map(Some),
            None => Ok(None),
        }
    }

    fn next_value_seed<V>(&mut self, seed: V) -> Result<V::Value>
    where
        V: de::DeserializeSeed<'de>,
    {
        let child = self
            .setting
            .child(self.index)
            .ok_or_else(|| ConfigError::type_error("group value requested past the last member"))?;
        self.index += 1;
        seed.deserialize(SettingDeserializer { setting: child })
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.setting.len().saturating_sub(self.index))
    }
}
