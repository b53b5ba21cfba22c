//! Typed, cached property maps over content-repository nodes.
//!
//! A [`PropertyMap`] reads a node's properties lazily, caches them and
//! converts them on demand into whatever type the caller asks for. The
//! [`ModifiablePropertyMap`] adds write-through `put` and `remove`. The
//! repository itself stays behind the traits in [`repo`]; [`repo::memory`]
//! is a complete in-memory backend.

#![warn(missing_docs)]

pub mod map;
pub mod options;
pub mod repo;
pub mod types;
pub mod value;

pub use map::{CacheEntry, HelperData, ModifiablePropertyMap, PropertyMap, ValueMap};
pub use options::{ConfigError, MapOptions};
pub use types::{ConversionError, MapError, RepoResult, RepositoryError, Result};
pub use value::{Converted, Convertible, StoredValue, Value, ValueType};
