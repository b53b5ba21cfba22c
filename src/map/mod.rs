//! Property maps over repository nodes.
//!
//! [`PropertyMap`] is the read-only view, [`ModifiablePropertyMap`] writes
//! through to the node on every change. Both implement [`ValueMap`]; read
//! operations return `Result` because a cache miss may reach the repository.

mod entry;
mod escape;
mod helper;
mod modifiable;
mod property_map;

pub use entry::CacheEntry;
pub use escape::{
    escape_illegal_jcr_chars, escape_path_segments, iso9075_decode, iso9075_encode,
    iso9075_encode_path, unescape_illegal_jcr_chars,
};
pub use helper::HelperData;
pub use modifiable::{handle_mixin_types, ModifiablePropertyMap};
pub use property_map::PropertyMap;

use crate::types::{MapError, Result};
use crate::value::{Converted, Convertible, Value, ValueType};

/// Typed key-value access to a node's properties.
pub trait ValueMap {
    /// The natural materialized value of `key`.
    fn get_value(&self, key: &str) -> Result<Option<Value>>;

    /// The value of `key` converted to `target`. [`ValueType::Unknown`]
    /// yields the natural value.
    fn get_as(&self, key: &str, target: &ValueType) -> Result<Option<Converted>>;

    /// The value of `key` converted to `T`.
    fn get<T: Convertible>(&self, key: &str) -> Result<Option<T>>
    where
        Self: Sized,
    {
        Ok(self
            .get_as(key, &T::value_type())?
            .and_then(T::from_converted))
    }

    /// The value of `key` converted to `T`, or `default` when it is absent or
    /// not convertible.
    fn get_or<T: Convertible>(&self, key: &str, default: T) -> Result<T>
    where
        Self: Sized,
    {
        Ok(self.get(key)?.unwrap_or(default))
    }

    /// Like [`ValueMap::get_or`], with the target taken from the default's
    /// runtime type. Without a default this is [`ValueMap::get_value`].
    fn get_or_value(&self, key: &str, default: Option<Value>) -> Result<Option<Value>> {
        let Some(default) = default else {
            return self.get_value(key);
        };
        let converted = self
            .get_as(key, &ValueType::of(&default))?
            .and_then(Converted::into_value);
        Ok(Some(converted.unwrap_or(default)))
    }

    /// Whether `key` has a value.
    fn contains_key(&self, key: &str) -> Result<bool>;

    /// Whether any property materializes to `value`.
    fn contains_value(&self, value: &Value) -> Result<bool>;

    /// Number of properties, synthetic ones included.
    fn len(&self) -> Result<usize>;

    /// Whether the map has no properties.
    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// All keys in read order.
    fn keys(&self) -> Result<Vec<String>>;

    /// All keys with their materialized values.
    fn entries(&self) -> Result<Vec<(String, Value)>>;

    /// All materialized values.
    fn values(&self) -> Result<Vec<Value>>;

    /// Path of the underlying node.
    fn path(&self) -> Result<String>;

    /// Writes `value` under `key`, returning the previous value.
    fn put(&mut self, _key: &str, _value: Value) -> Result<Option<Value>> {
        Err(MapError::Unsupported("put"))
    }

    /// Writes every entry in order. Entries written before a failure stay
    /// written.
    fn put_all<I, K>(&mut self, _entries: I) -> Result<()>
    where
        Self: Sized,
        I: IntoIterator<Item = (K, Value)>,
        K: AsRef<str>,
    {
        Err(MapError::Unsupported("put_all"))
    }

    /// Removes `key`, returning the previous value.
    fn remove(&mut self, _key: &str) -> Result<Option<Value>> {
        Err(MapError::Unsupported("remove"))
    }

    /// Removing every property is never supported.
    fn clear(&mut self) -> Result<()> {
        Err(MapError::Unsupported("clear"))
    }
}

/// Strips the `./` prefix callers may use for node-relative keys.
fn check_key(key: &str) -> &str {
    key.strip_prefix("./").unwrap_or(key)
}
