//! In-memory repository.
//!
//! Nodes keep their properties in insertion order and expose the primary and
//! mixin types as `jcr:primaryType` / `jcr:mixinTypes` properties, the way a
//! content repository does. Every node counts the calls the maps make into it
//! so cache behaviour can be observed.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use tracing::trace;

use crate::types::{
    RepoResult, RepositoryError, JCR_MIXIN_TYPES, JCR_PRIMARY_TYPE, NT_UNSTRUCTURED,
};
use crate::value::{Binary, PropertyType, StoredValue, Value};

use super::{Node, Property, PropertyHandle, Session};

const DEFAULT_PREFIXES: &[&str] = &["", "jcr", "nt", "mix", "sling", "sv", "xml"];

/// Session holding the namespace registry.
#[derive(Debug)]
pub struct MemorySession {
    prefixes: Mutex<Vec<String>>,
    prefix_calls: AtomicU64,
}

impl Default for MemorySession {
    fn default() -> Self {
        Self {
            prefixes: Mutex::new(DEFAULT_PREFIXES.iter().map(|p| p.to_string()).collect()),
            prefix_calls: AtomicU64::new(0),
        }
    }
}

impl MemorySession {
    /// Session with the built-in prefixes registered.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Registers an additional namespace prefix.
    pub fn register_namespace(&self, prefix: &str) {
        let mut prefixes = self.prefixes.lock();
        if !prefixes.iter().any(|p| p == prefix) {
            prefixes.push(prefix.to_owned());
        }
    }

    /// Number of times the prefix list was requested.
    pub fn prefix_calls(&self) -> u64 {
        self.prefix_calls.load(Ordering::Relaxed)
    }
}

impl Session for MemorySession {
    fn namespace_prefixes(&self) -> RepoResult<Vec<String>> {
        self.prefix_calls.fetch_add(1, Ordering::Relaxed);
        Ok(self.prefixes.lock().clone())
    }
}

/// A stored property.
#[derive(Debug)]
pub struct MemoryProperty {
    name: String,
    kind: PropertyType,
    values: Vec<StoredValue>,
    multiple: bool,
}

impl MemoryProperty {
    fn single(name: &str, kind: PropertyType, value: StoredValue) -> Self {
        Self {
            name: name.to_owned(),
            kind,
            values: vec![value],
            multiple: false,
        }
    }

    fn multi(name: &str, kind: PropertyType, values: Vec<StoredValue>) -> Self {
        Self {
            name: name.to_owned(),
            kind,
            values,
            multiple: true,
        }
    }

    fn first(&self) -> RepoResult<&StoredValue> {
        self.values
            .first()
            .ok_or_else(|| RepositoryError::ValueFormat(format!("{} has no value", self.name)))
    }
}

impl Property for MemoryProperty {
    fn name(&self) -> &str {
        &self.name
    }

    fn property_type(&self) -> PropertyType {
        self.kind
    }

    fn is_multiple(&self) -> bool {
        self.multiple
    }

    fn value(&self) -> RepoResult<Value> {
        if self.multiple {
            Ok(Value::Array(self.values.iter().map(StoredValue::to_value).collect()))
        } else {
            Ok(self.first()?.to_value())
        }
    }

    fn length(&self) -> RepoResult<u64> {
        if self.multiple {
            return Err(RepositoryError::ValueFormat(format!(
                "{} is multi-valued",
                self.name
            )));
        }
        self.first()?.length()
    }

    fn lengths(&self) -> RepoResult<Vec<u64>> {
        if !self.multiple {
            return Err(RepositoryError::ValueFormat(format!(
                "{} is single-valued",
                self.name
            )));
        }
        self.values.iter().map(StoredValue::length).collect()
    }
}

/// Call counters for a [`MemoryNode`].
#[derive(Debug, Default)]
pub struct NodeMetrics {
    enumerations: AtomicU64,
    lookups: AtomicU64,
    type_lookups: AtomicU64,
    writes: AtomicU64,
}

/// Point-in-time copy of [`NodeMetrics`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NodeMetricsSnapshot {
    /// Full property enumerations.
    pub enumerations: u64,
    /// Single property lookups.
    pub lookups: u64,
    /// Primary node type lookups.
    pub type_lookups: u64,
    /// Mutations of any kind.
    pub writes: u64,
}

impl NodeMetrics {
    /// Current counter values.
    pub fn snapshot(&self) -> NodeMetricsSnapshot {
        NodeMetricsSnapshot {
            enumerations: self.enumerations.load(Ordering::Relaxed),
            lookups: self.lookups.load(Ordering::Relaxed),
            type_lookups: self.type_lookups.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
        }
    }

    fn inc(&self, counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

#[derive(Debug)]
struct NodeState {
    primary_type: String,
    mixins: Vec<String>,
    properties: IndexMap<String, Arc<MemoryProperty>>,
    children: IndexMap<String, Arc<MemoryNode>>,
    hide_primary_type: bool,
    fail_enumeration: bool,
    fail_path: bool,
}

/// A node held in memory.
#[derive(Debug)]
pub struct MemoryNode {
    path: String,
    session: Arc<MemorySession>,
    state: Mutex<NodeState>,
    metrics: NodeMetrics,
}

impl MemoryNode {
    /// A root-level node of type `nt:unstructured` with its own session.
    pub fn new(path: &str) -> Self {
        Self::with_session(path, MemorySession::new())
    }

    /// A node of type `nt:unstructured` sharing `session`.
    pub fn with_session(path: &str, session: Arc<MemorySession>) -> Self {
        Self {
            path: path.to_owned(),
            session,
            state: Mutex::new(NodeState {
                primary_type: NT_UNSTRUCTURED.to_owned(),
                mixins: Vec::new(),
                properties: IndexMap::new(),
                children: IndexMap::new(),
                hide_primary_type: false,
                fail_enumeration: false,
                fail_path: false,
            }),
            metrics: NodeMetrics::default(),
        }
    }

    /// Adds (or returns the existing) child node.
    pub fn add_child(&self, name: &str) -> Arc<MemoryNode> {
        let mut state = self.state.lock();
        let path = if self.path.ends_with('/') {
            format!("{}{name}", self.path)
        } else {
            format!("{}/{name}", self.path)
        };
        let session = self.session.clone();
        state
            .children
            .entry(name.to_owned())
            .or_insert_with(|| Arc::new(MemoryNode::with_session(&path, session)))
            .clone()
    }

    /// Stores `value` under `name`, converting it to its native form.
    pub fn insert(&self, name: &str, value: impl Into<Value>) -> RepoResult<()> {
        match value.into() {
            Value::Array(items) => {
                let stored = items
                    .iter()
                    .map(|item| self.native(name, item))
                    .collect::<RepoResult<Vec<_>>>()?;
                self.set_multi_property(name, stored)
            }
            single => {
                let stored = self.native(name, &single)?;
                self.set_property(name, stored)
            }
        }
    }

    fn native(&self, name: &str, value: &Value) -> RepoResult<StoredValue> {
        StoredValue::create(value, self.session.as_ref())?.ok_or_else(|| {
            let kind = value.kind_name();
            RepositoryError::ValueFormat(format!("{name}: {kind} has no stored form"))
        })
    }

    /// Hides the `jcr:primaryType` property; the type stays available
    /// through [`Node::primary_node_type`].
    pub fn hide_primary_type_property(&self, hide: bool) {
        self.state.lock().hide_primary_type = hide;
    }

    /// Makes property enumeration fail.
    pub fn fail_enumeration(&self, fail: bool) {
        self.state.lock().fail_enumeration = fail;
    }

    /// Makes [`Node::path`] fail, as for a node removed by another session.
    pub fn fail_path(&self, fail: bool) {
        self.state.lock().fail_path = fail;
    }

    /// The node's call counters.
    pub fn metrics(&self) -> &NodeMetrics {
        &self.metrics
    }

    /// The node's session.
    pub fn memory_session(&self) -> &Arc<MemorySession> {
        &self.session
    }

    fn type_property(state: &NodeState, name: &str) -> Option<Arc<MemoryProperty>> {
        match name {
            JCR_PRIMARY_TYPE if !state.hide_primary_type => Some(Arc::new(MemoryProperty::single(
                JCR_PRIMARY_TYPE,
                PropertyType::Name,
                StoredValue::String(state.primary_type.clone()),
            ))),
            JCR_MIXIN_TYPES if !state.mixins.is_empty() => Some(Arc::new(MemoryProperty::multi(
                JCR_MIXIN_TYPES,
                PropertyType::Name,
                state.mixins.iter().cloned().map(StoredValue::String).collect(),
            ))),
            _ => None,
        }
    }

    fn local_property(&self, name: &str) -> Option<Arc<MemoryProperty>> {
        let state = self.state.lock();
        Self::type_property(&state, name).or_else(|| state.properties.get(name).cloned())
    }

    fn resolve(&self, path: &str) -> Option<Arc<MemoryProperty>> {
        let Some((parent, name)) = path.rsplit_once('/') else {
            return self.local_property(path);
        };
        let mut node: Option<Arc<MemoryNode>> = None;
        for segment in parent.split('/').filter(|s| !s.is_empty() && *s != ".") {
            let child = {
                let current = node.as_deref().unwrap_or(self);
                let state = current.state.lock();
                state.children.get(segment).cloned()
            }?;
            node = Some(child);
        }
        node.as_deref().unwrap_or(self).local_property(name)
    }

    fn lookup(&self, name: &str) -> Option<Arc<MemoryProperty>> {
        self.metrics.inc(&self.metrics.lookups);
        let found = self.resolve(name);
        trace!(path = %self.path, property = name, found = found.is_some(), "memory.lookup");
        found
    }

    fn check_writable(name: &str) -> RepoResult<()> {
        if name == JCR_PRIMARY_TYPE || name == JCR_MIXIN_TYPES {
            return Err(RepositoryError::ConstraintViolation(format!(
                "{name} is protected"
            )));
        }
        Ok(())
    }

    fn buffered(value: StoredValue) -> RepoResult<StoredValue> {
        match value {
            StoredValue::Binary(binary) if binary.len().is_none() => {
                Ok(StoredValue::Binary(Binary::from_bytes(binary.read_to_end()?)))
            }
            other => Ok(other),
        }
    }
}

impl Node for MemoryNode {
    fn path(&self) -> RepoResult<String> {
        if self.state.lock().fail_path {
            return Err(RepositoryError::Other(String::from("node is no longer valid")));
        }
        Ok(self.path.clone())
    }

    fn session(&self) -> &dyn Session {
        self.session.as_ref()
    }

    fn has_property(&self, name: &str) -> RepoResult<bool> {
        Ok(self.lookup(name).is_some())
    }

    fn property(&self, name: &str) -> RepoResult<PropertyHandle> {
        match self.lookup(name) {
            Some(property) => Ok(property),
            None => Err(RepositoryError::NotFound(format!("{}/{name}", self.path))),
        }
    }

    fn property_or_none(&self, name: &str) -> RepoResult<Option<PropertyHandle>> {
        Ok(self.lookup(name).map(|p| p as PropertyHandle))
    }

    fn properties(&self) -> RepoResult<Vec<PropertyHandle>> {
        self.metrics.inc(&self.metrics.enumerations);
        let state = self.state.lock();
        if state.fail_enumeration {
            return Err(RepositoryError::Other(format!(
                "cannot enumerate properties of {}",
                self.path
            )));
        }
        let mut out: Vec<PropertyHandle> = Vec::with_capacity(state.properties.len() + 2);
        for name in [JCR_PRIMARY_TYPE, JCR_MIXIN_TYPES] {
            if let Some(property) = Self::type_property(&state, name) {
                out.push(property);
            }
        }
        out.extend(state.properties.values().map(|p| p.clone() as PropertyHandle));
        Ok(out)
    }

    fn primary_node_type(&self) -> RepoResult<String> {
        self.metrics.inc(&self.metrics.type_lookups);
        Ok(self.state.lock().primary_type.clone())
    }

    fn mixin_node_types(&self) -> RepoResult<Vec<String>> {
        Ok(self.state.lock().mixins.clone())
    }

    fn add_mixin(&self, name: &str) -> RepoResult<()> {
        self.metrics.inc(&self.metrics.writes);
        let mut state = self.state.lock();
        if !state.mixins.iter().any(|m| m == name) {
            state.mixins.push(name.to_owned());
        }
        Ok(())
    }

    fn remove_mixin(&self, name: &str) -> RepoResult<()> {
        self.metrics.inc(&self.metrics.writes);
        let mut state = self.state.lock();
        let before = state.mixins.len();
        state.mixins.retain(|m| m != name);
        if state.mixins.len() == before {
            return Err(RepositoryError::NotFound(format!("mixin {name}")));
        }
        Ok(())
    }

    fn set_primary_type(&self, name: &str) -> RepoResult<()> {
        self.metrics.inc(&self.metrics.writes);
        self.state.lock().primary_type = name.to_owned();
        Ok(())
    }

    fn set_property(&self, name: &str, value: StoredValue) -> RepoResult<()> {
        Self::check_writable(name)?;
        self.metrics.inc(&self.metrics.writes);
        let value = Self::buffered(value)?;
        let property = MemoryProperty::single(name, value.property_type(), value);
        self.state
            .lock()
            .properties
            .insert(name.to_owned(), Arc::new(property));
        Ok(())
    }

    fn set_multi_property(&self, name: &str, values: Vec<StoredValue>) -> RepoResult<()> {
        Self::check_writable(name)?;
        self.metrics.inc(&self.metrics.writes);
        let values = values
            .into_iter()
            .map(Self::buffered)
            .collect::<RepoResult<Vec<_>>>()?;
        let kind = values
            .first()
            .map_or(PropertyType::String, StoredValue::property_type);
        let property = MemoryProperty::multi(name, kind, values);
        self.state
            .lock()
            .properties
            .insert(name.to_owned(), Arc::new(property));
        Ok(())
    }

    fn remove_property(&self, name: &str) -> RepoResult<()> {
        Self::check_writable(name)?;
        self.metrics.inc(&self.metrics.writes);
        self.state.lock().properties.shift_remove(name);
        Ok(())
    }
}
