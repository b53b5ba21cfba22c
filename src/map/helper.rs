use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use tracing::trace;

use crate::options::MapOptions;
use crate::repo::{Session, TypeLoader};
use crate::types::RepoResult;

/// State shared by the maps of one resource provider: options, the optional
/// type loader and the namespace prefix cache.
pub struct HelperData {
    options: MapOptions,
    type_loader: Option<Arc<dyn TypeLoader>>,
    prefixes: Mutex<Option<Arc<FxHashSet<String>>>>,
}

impl HelperData {
    /// Helper with the given options and no type loader.
    pub fn new(options: MapOptions) -> Self {
        Self {
            options,
            type_loader: None,
            prefixes: Mutex::new(None),
        }
    }

    /// Sets the loader consulted when deserializing stored objects.
    pub fn with_type_loader(mut self, loader: Arc<dyn TypeLoader>) -> Self {
        self.type_loader = Some(loader);
        self
    }

    /// The options maps created with this helper follow.
    pub fn options(&self) -> &MapOptions {
        &self.options
    }

    /// The configured type loader.
    pub fn type_loader(&self) -> Option<Arc<dyn TypeLoader>> {
        self.type_loader.clone()
    }

    /// Registered namespace prefixes, fetched from `session` on first use.
    pub fn namespace_prefixes(&self, session: &dyn Session) -> RepoResult<Arc<FxHashSet<String>>> {
        if !self.options.cache_namespace_prefixes {
            return Ok(Arc::new(session.namespace_prefixes()?.into_iter().collect()));
        }
        let mut cached = self.prefixes.lock();
        if let Some(prefixes) = cached.as_ref() {
            return Ok(prefixes.clone());
        }
        let prefixes: Arc<FxHashSet<String>> =
            Arc::new(session.namespace_prefixes()?.into_iter().collect());
        trace!(count = prefixes.len(), "helper.namespace_prefixes.loaded");
        *cached = Some(prefixes.clone());
        Ok(prefixes)
    }

    /// Whether `prefix` is a registered namespace prefix.
    pub fn is_registered_prefix(&self, session: &dyn Session, prefix: &str) -> RepoResult<bool> {
        Ok(self.namespace_prefixes(session)?.contains(prefix))
    }
}

impl Default for HelperData {
    fn default() -> Self {
        Self::new(MapOptions::default())
    }
}

impl fmt::Debug for HelperData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HelperData")
            .field("options", &self.options)
            .field("has_type_loader", &self.type_loader.is_some())
            .field("prefixes_cached", &self.prefixes.lock().is_some())
            .finish()
    }
}
