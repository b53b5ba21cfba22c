use std::fmt;

use rustc_hash::FxHashSet;
use tracing::{debug, warn};

use crate::repo::Node;
use crate::types::{
    MapError, RepoResult, RepositoryError, Result, JCR_MIXIN_TYPES, JCR_PRIMARY_TYPE,
};
use crate::value::{Converted, Convertible, StoredValue, Value, ValueType};

use super::property_map::Cached;
use super::{check_key, CacheEntry, HelperData, PropertyMap, ValueMap};

/// Reconciles the node's mixins with `mixin_types`: mixins not listed are
/// removed, listed ones not yet present are added. `None` removes them all.
pub fn handle_mixin_types(node: &dyn Node, mixin_types: Option<&[String]>) -> RepoResult<()> {
    let mut wanted: FxHashSet<&str> = mixin_types
        .unwrap_or_default()
        .iter()
        .map(String::as_str)
        .collect();
    for existing in node.mixin_node_types()? {
        if !wanted.remove(existing.as_str()) {
            warn!(mixin = %existing, "mixin_types.remove");
            node.remove_mixin(&existing)?;
        }
    }
    // Keep the caller's order for additions.
    for name in mixin_types.unwrap_or_default() {
        if wanted.remove(name.as_str()) {
            node.add_mixin(name)?;
        }
    }
    Ok(())
}

/// Property map that writes through to its node.
///
/// Every `put` and `remove` is applied to the node immediately; nothing is
/// saved. Reads behave exactly like [`PropertyMap`].
pub struct ModifiablePropertyMap<'a> {
    inner: PropertyMap<'a>,
}

impl<'a> ModifiablePropertyMap<'a> {
    /// Creates an empty map over `node`.
    pub fn new(node: &'a dyn Node, helper: &'a HelperData) -> Self {
        Self {
            inner: PropertyMap::new(node, helper),
        }
    }

    /// The read-only view sharing this map's cache.
    pub fn as_property_map(&self) -> &PropertyMap<'a> {
        &self.inner
    }

    fn node_path(&self) -> String {
        self.inner
            .node()
            .path()
            .unwrap_or_else(|_| String::from("<unavailable>"))
    }

    fn rejected(&self, key: &str, value: &Value, err: impl fmt::Display) -> MapError {
        MapError::InvalidArgument(format!(
            "value of kind '{}' for property '{key}' can't be put into node '{}': {err}",
            value.kind_name(),
            self.node_path()
        ))
    }

    fn convert<T: Convertible>(&self, entry: &CacheEntry) -> Option<T> {
        let node = self.inner.node();
        entry
            .convert_to_type(&T::value_type(), node, self.inner.helper())
            .and_then(T::from_converted)
    }

    fn write(&self, name: &str, entry: &CacheEntry) -> RepoResult<()> {
        let node = self.inner.node();
        if name == JCR_MIXIN_TYPES {
            let types: Option<Vec<String>> = self.convert(entry);
            return handle_mixin_types(node, types.as_deref());
        }
        if name == JCR_PRIMARY_TYPE {
            return match self.convert::<String>(entry) {
                Some(primary) => node.set_primary_type(&primary),
                None => Err(RepositoryError::ValueFormat(format!(
                    "{name} must be a single name"
                ))),
            };
        }
        if entry.is_array() {
            let values: Vec<StoredValue> = self.convert(entry).unwrap_or_default();
            return node.set_multi_property(name, values);
        }
        match self.convert::<StoredValue>(entry) {
            Some(value) => node.set_property(name, value),
            None => Err(RepositoryError::ValueFormat(format!(
                "{name} has no stored form"
            ))),
        }
    }
}

impl ValueMap for ModifiablePropertyMap<'_> {
    fn get_value(&self, key: &str) -> Result<Option<Value>> {
        self.inner.get_value(key)
    }

    fn get_as(&self, key: &str, target: &ValueType) -> Result<Option<Converted>> {
        self.inner.get_as(key, target)
    }

    fn contains_key(&self, key: &str) -> Result<bool> {
        self.inner.contains_key(key)
    }

    fn contains_value(&self, value: &Value) -> Result<bool> {
        self.inner.contains_value(value)
    }

    fn len(&self) -> Result<usize> {
        self.inner.len()
    }

    fn keys(&self) -> Result<Vec<String>> {
        self.inner.keys()
    }

    fn entries(&self) -> Result<Vec<(String, Value)>> {
        self.inner.entries()
    }

    fn values(&self) -> Result<Vec<Value>> {
        self.inner.values()
    }

    fn path(&self) -> Result<String> {
        self.inner.path()
    }

    fn put(&mut self, key: &str, value: Value) -> Result<Option<Value>> {
        let key = check_key(key);
        if key.contains('/') {
            return Err(MapError::InvalidArgument(format!("invalid key: {key}")));
        }
        self.inner.read_fully()?;
        let previous = self.inner.get_value(key)?;

        let entry = CacheEntry::from_value(value.clone(), self.inner.node())
            .map_err(|err| self.rejected(key, &value, err))?;
        let name = self.inner.escape_key_name(key)?;
        debug!(key, storage_name = %name, kind = value.kind_name(), "modifiable_map.put");
        self.write(&name, &entry)
            .map_err(|err| self.rejected(key, &value, err))?;

        self.inner.insert_cached(
            key,
            Cached {
                raw: entry,
                materialized: value,
            },
        );
        Ok(previous)
    }

    fn put_all<I, K>(&mut self, entries: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: AsRef<str>,
    {
        for (key, value) in entries {
            self.put(key.as_ref(), value)?;
        }
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<Option<Value>> {
        let key = check_key(key);
        self.inner.read_fully()?;
        let name = self.inner.escape_key_name(key)?;
        let node = self.inner.node();
        let removed = match node.property_or_none(&name) {
            Ok(Some(_)) => node.remove_property(&name).map(|()| true),
            Ok(None) => Ok(false),
            Err(err) => Err(err),
        };
        match removed {
            Ok(removed) => {
                debug!(key, removed, "modifiable_map.remove");
                Ok(self.inner.evict(key).map(|cached| cached.materialized))
            }
            Err(err) => Err(MapError::InvalidArgument(format!(
                "property '{key}' can't be removed from node '{}': {err}",
                self.node_path()
            ))),
        }
    }
}

impl fmt::Display for ModifiablePropertyMap<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.inner.render("ModifiablePropertyMap", f)
    }
}

impl fmt::Debug for ModifiablePropertyMap<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ModifiablePropertyMap")
            .field(&self.inner)
            .finish()
    }
}
