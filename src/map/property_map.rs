use std::cell::RefCell;
use std::fmt;

use indexmap::IndexMap;
use tracing::{debug, trace};

use crate::repo::{Node, PropertyHandle};
use crate::types::{MapError, RepoResult, Result, JCR_PRIMARY_TYPE, SLING_RESOURCE_TYPE};
use crate::value::{Converted, Value, ValueType};

use super::escape::{
    escape_illegal_jcr_chars, escape_path_segments, iso9075_decode, iso9075_encode_path,
    unescape_illegal_jcr_chars,
};
use super::{check_key, CacheEntry, HelperData, ValueMap};

/// A cache slot: the entry and the value it materialized to, stored together.
#[derive(Clone, Debug)]
pub(super) struct Cached {
    pub(super) raw: CacheEntry,
    pub(super) materialized: Value,
}

impl Cached {
    fn from_property(property: PropertyHandle) -> RepoResult<Self> {
        let raw = CacheEntry::from_property(property)?;
        let materialized = raw.property_value()?;
        Ok(Self { raw, materialized })
    }
}

#[derive(Debug, Default)]
struct CacheState {
    entries: IndexMap<String, Cached>,
    fully_read: bool,
}

/// Read-only property map over one node.
///
/// Properties are read lazily and cached; once a full read happened, misses
/// are answered without asking the repository. The cache uses interior
/// mutability, so a map must stay on one thread.
pub struct PropertyMap<'a> {
    node: &'a dyn Node,
    helper: &'a HelperData,
    state: RefCell<CacheState>,
}

impl<'a> PropertyMap<'a> {
    /// Creates an empty map over `node`.
    pub fn new(node: &'a dyn Node, helper: &'a HelperData) -> Self {
        Self {
            node,
            helper,
            state: RefCell::new(CacheState::default()),
        }
    }

    pub(super) fn node(&self) -> &'a dyn Node {
        self.node
    }

    pub(super) fn helper(&self) -> &'a HelperData {
        self.helper
    }

    /// Whether every property has been read.
    pub fn is_fully_read(&self) -> bool {
        self.state.borrow().fully_read
    }

    /// Reads one property, consulting the cache first.
    pub(super) fn read(&self, name: &str) -> Result<Option<Cached>> {
        if name.is_empty() {
            return Ok(None);
        }
        if name.contains('/') {
            return self.read_path(name);
        }
        {
            let state = self.state.borrow();
            if let Some(cached) = state.entries.get(name) {
                trace!(key = name, "property_map.cache_hit");
                return Ok(Some(cached.clone()));
            }
            if state.fully_read {
                trace!(key = name, "property_map.absent_after_full_read");
                return Ok(None);
            }
        }

        let escaped = self.escape_key_name(name)?;
        if let Some(property) = self.node.property_or_none(&escaped)? {
            return Ok(Some(self.cache_property(property)?));
        }
        if name == SLING_RESOURCE_TYPE && self.helper.options().synthesize_resource_type {
            return match self.read(JCR_PRIMARY_TYPE)? {
                Some(primary) => Ok(Some(self.cache_value(name, primary.materialized)?)),
                None => Ok(None),
            };
        }
        if name == JCR_PRIMARY_TYPE {
            return self.read_primary_type().map(Some);
        }
        Ok(None)
    }

    /// Resolves a relative property path. Results are not cached.
    fn read_path(&self, name: &str) -> Result<Option<Cached>> {
        let escaped = escape_path_segments(name);
        if self.helper.options().legacy_path_encoding {
            let legacy = iso9075_encode_path(name);
            if let Some(property) = self.node.property_or_none(&legacy)? {
                return Ok(Some(Cached::from_property(property)?));
            }
            if legacy == escaped {
                return Ok(None);
            }
        }
        match self.node.property_or_none(&escaped)? {
            Some(property) => Ok(Some(Cached::from_property(property)?)),
            None => Ok(None),
        }
    }

    /// Caches `property` under the key decoded from its storage name. An
    /// existing entry for that key wins.
    fn cache_property(&self, property: PropertyHandle) -> RepoResult<Cached> {
        let key = self.decode_key(property.name());
        if let Some(cached) = self.state.borrow().entries.get(&key) {
            return Ok(cached.clone());
        }
        let cached = Cached::from_property(property)?;
        self.state.borrow_mut().entries.insert(key, cached.clone());
        Ok(cached)
    }

    /// Caches a synthetic value under `key` unless the key is already cached.
    fn cache_value(&self, key: &str, value: Value) -> Result<Cached> {
        if let Some(cached) = self.state.borrow().entries.get(key) {
            return Ok(cached.clone());
        }
        let raw = CacheEntry::from_value(value, self.node)?;
        let materialized = raw.property_value()?;
        let cached = Cached { raw, materialized };
        self.state
            .borrow_mut()
            .entries
            .insert(key.to_owned(), cached.clone());
        Ok(cached)
    }

    /// Caches the primary type obtained from the node type registry. Used
    /// only when the property itself cannot be read.
    fn read_primary_type(&self) -> Result<Cached> {
        let primary = self.node.primary_node_type()?;
        self.cache_value(JCR_PRIMARY_TYPE, Value::String(primary))
    }

    fn decode_key(&self, name: &str) -> String {
        if self.helper.options().legacy_path_encoding && name.contains("_x") {
            let decoded = iso9075_decode(name);
            if decoded != name {
                return decoded;
            }
        }
        unescape_illegal_jcr_chars(name)
    }

    /// Escapes a key into a storage name. Only the local part is escaped when
    /// the key starts with a registered namespace prefix.
    pub(super) fn escape_key_name(&self, key: &str) -> Result<String> {
        if let Some(idx) = key.find(':') {
            if idx > 0 && key.len() > idx + 1 {
                let prefix = &key[..idx];
                if self
                    .helper
                    .is_registered_prefix(self.node.session(), prefix)?
                {
                    let escaped = format!("{prefix}:{}", escape_illegal_jcr_chars(&key[idx + 1..]));
                    trace!(key, escaped = %escaped, "property_map.escape_prefixed");
                    return Ok(escaped);
                }
            }
        }
        Ok(escape_illegal_jcr_chars(key))
    }

    /// Reads every property once. Cached entries are kept, and the primary
    /// and resource types are synthesized when the node does not expose them.
    pub fn read_fully(&self) -> Result<()> {
        if self.state.borrow().fully_read {
            return Ok(());
        }
        let path = self.node.path().unwrap_or_default();
        debug!(path = %path, "property_map.read_fully");
        let context = || format!("failed to read properties of {path}");
        let into_state = |err: MapError| match err {
            MapError::Repository(source) => MapError::state(context(), source),
            other => other,
        };

        let properties = self
            .node
            .properties()
            .map_err(|source| MapError::state(context(), source))?;
        for property in properties {
            self.cache_property(property)
                .map_err(|source| MapError::state(context(), source))?;
        }
        if !self.state.borrow().entries.contains_key(JCR_PRIMARY_TYPE) {
            self.read_primary_type().map_err(into_state)?;
        }
        if self.helper.options().synthesize_resource_type {
            let primary = {
                let state = self.state.borrow();
                if state.entries.contains_key(SLING_RESOURCE_TYPE) {
                    None
                } else {
                    state
                        .entries
                        .get(JCR_PRIMARY_TYPE)
                        .map(|cached| cached.materialized.clone())
                }
            };
            if let Some(primary) = primary {
                self.cache_value(SLING_RESOURCE_TYPE, primary)
                    .map_err(into_state)?;
            }
        }
        let mut state = self.state.borrow_mut();
        state.fully_read = true;
        debug!(path = %path, entries = state.entries.len(), "property_map.read_fully.done");
        Ok(())
    }

    /// Replaces the cache slot for `key`.
    pub(super) fn insert_cached(&self, key: &str, cached: Cached) {
        self.state
            .borrow_mut()
            .entries
            .insert(key.to_owned(), cached);
    }

    /// Drops the cache slot for `key`, keeping the order of the others.
    pub(super) fn evict(&self, key: &str) -> Option<Cached> {
        self.state.borrow_mut().entries.shift_remove(key)
    }

    pub(super) fn render(&self, label: &str, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Err(err) = self.read_fully() {
            debug!(error = %err, "property_map.render.partial");
        }
        let node = self
            .node
            .path()
            .unwrap_or_else(|_| String::from("<unavailable>"));
        write!(f, "{label} [node={node}, values={{")?;
        let state = self.state.borrow();
        for (idx, (key, cached)) in state.entries.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{key}={}", cached.materialized)?;
        }
        f.write_str("}]")
    }
}

impl ValueMap for PropertyMap<'_> {
    fn get_value(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.read(check_key(key))?.map(|cached| cached.materialized))
    }

    fn get_as(&self, key: &str, target: &ValueType) -> Result<Option<Converted>> {
        if *target == ValueType::Unknown {
            return Ok(self.get_value(key)?.map(Converted::Value));
        }
        Ok(self
            .read(check_key(key))?
            .and_then(|cached| cached.raw.convert_to_type(target, self.node, self.helper)))
    }

    fn contains_key(&self, key: &str) -> Result<bool> {
        self.read_fully()?;
        Ok(self.read(check_key(key))?.is_some())
    }

    fn contains_value(&self, value: &Value) -> Result<bool> {
        self.read_fully()?;
        let state = self.state.borrow();
        Ok(state
            .entries
            .values()
            .any(|cached| cached.materialized == *value))
    }

    fn len(&self) -> Result<usize> {
        self.read_fully()?;
        Ok(self.state.borrow().entries.len())
    }

    fn keys(&self) -> Result<Vec<String>> {
        self.read_fully()?;
        Ok(self.state.borrow().entries.keys().cloned().collect())
    }

    fn entries(&self) -> Result<Vec<(String, Value)>> {
        self.read_fully()?;
        Ok(self
            .state
            .borrow()
            .entries
            .iter()
            .map(|(key, cached)| (key.clone(), cached.materialized.clone()))
            .collect())
    }

    fn values(&self) -> Result<Vec<Value>> {
        self.read_fully()?;
        Ok(self
            .state
            .borrow()
            .entries
            .values()
            .map(|cached| cached.materialized.clone())
            .collect())
    }

    fn path(&self) -> Result<String> {
        self.node
            .path()
            .map_err(|source| MapError::state("failed to read node path", source))
    }
}

impl fmt::Display for PropertyMap<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.render("PropertyMap", f)
    }
}

impl fmt::Debug for PropertyMap<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("PropertyMap")
            .field("node", &self.node)
            .field("cached", &state.entries.len())
            .field("fully_read", &state.fully_read)
            .finish()
    }
}
