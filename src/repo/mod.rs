//! Repository collaborators.
//!
//! The maps never talk to storage directly: they read and write through a
//! [`Node`] handle, materialize values through [`Property`] handles and use the
//! node's [`Session`] for namespace lookups and binary creation. The
//! [`memory`] module provides a complete in-memory implementation.

pub mod memory;

use std::fmt::Debug;
use std::sync::Arc;

use bytes::Bytes;

use crate::types::{RepoResult, RepositoryError};
use crate::value::{Binary, PropertyType, StoredValue, Value};

/// Shared handle to a live property.
pub type PropertyHandle = Arc<dyn Property>;

/// A property on a repository node.
pub trait Property: Debug + Send + Sync {
    /// Storage name of the property.
    fn name(&self) -> &str;

    /// Declared storage type.
    fn property_type(&self) -> PropertyType;

    /// Whether the property is multi-valued.
    fn is_multiple(&self) -> bool;

    /// Materializes the property. Multi-valued properties yield
    /// [`Value::Array`]; binaries yield a lazily readable [`Value::Binary`].
    fn value(&self) -> RepoResult<Value>;

    /// Length of a single-valued property.
    fn length(&self) -> RepoResult<u64>;

    /// Per-element lengths of a multi-valued property.
    fn lengths(&self) -> RepoResult<Vec<u64>>;
}

/// The session a node was obtained from.
pub trait Session: Send + Sync {
    /// Currently registered namespace prefixes, including the empty prefix.
    fn namespace_prefixes(&self) -> RepoResult<Vec<String>>;

    /// Creates a binary value from raw content.
    fn create_binary(&self, content: Vec<u8>) -> RepoResult<Binary> {
        Ok(Binary::from_bytes(Bytes::from(content)))
    }
}

/// Resolves type names while deserializing stored objects.
pub trait TypeLoader: Send + Sync {
    /// Whether objects of `type_name` may be materialized.
    fn resolves(&self, type_name: &str) -> bool;
}

/// A repository node.
///
/// Mutating methods take `&self`; implementations are handles onto shared
/// storage and synchronize internally.
pub trait Node: Debug {
    /// Absolute path of the node.
    fn path(&self) -> RepoResult<String>;

    /// Session that owns the node.
    fn session(&self) -> &dyn Session;

    /// Whether the (possibly relative) property path exists.
    fn has_property(&self, name: &str) -> RepoResult<bool>;

    /// Looks up a property, failing with [`RepositoryError::NotFound`] when it
    /// does not exist.
    fn property(&self, name: &str) -> RepoResult<PropertyHandle>;

    /// Looks up a property, returning `None` when it does not exist.
    fn property_or_none(&self, name: &str) -> RepoResult<Option<PropertyHandle>> {
        if self.has_property(name)? {
            match self.property(name) {
                Ok(property) => Ok(Some(property)),
                Err(RepositoryError::NotFound(_)) => Ok(None),
                Err(err) => Err(err),
            }
        } else {
            Ok(None)
        }
    }

    /// All properties of the node.
    fn properties(&self) -> RepoResult<Vec<PropertyHandle>>;

    /// Name of the node's primary type, from the node type registry.
    fn primary_node_type(&self) -> RepoResult<String>;

    /// Names of the node's mixin types.
    fn mixin_node_types(&self) -> RepoResult<Vec<String>>;

    /// Adds a mixin type.
    fn add_mixin(&self, name: &str) -> RepoResult<()>;

    /// Removes a mixin type.
    fn remove_mixin(&self, name: &str) -> RepoResult<()>;

    /// Replaces the primary type.
    fn set_primary_type(&self, name: &str) -> RepoResult<()>;

    /// Writes a single-valued property.
    fn set_property(&self, name: &str, value: StoredValue) -> RepoResult<()>;

    /// Writes a multi-valued property.
    fn set_multi_property(&self, name: &str, values: Vec<StoredValue>) -> RepoResult<()>;

    /// Removes a property; missing properties are ignored.
    fn remove_property(&self, name: &str) -> RepoResult<()>;
}
