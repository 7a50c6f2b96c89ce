//! Project registry
//!
//! A `Project` owns the stores of all its sub-projects, keyed by
//! directory path, and routes every store operation by that key. It also
//! keeps the set of editor names seen in loaded and saved annotations.
//!
//! Lock order: the store map, then the status sources, then the locks
//! inside a single store.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{info, warn};

use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::models::{Annotation, ClientId, PageSpan};
use crate::query::{MatchingPage, QueryPayload, SearchQuery};
use crate::storage::{ProjectFiles, StoreError, StoreResult};
use crate::store::{AudioStats, NextPage, ProjectStore, StoreOptions, SubProjectStats};
use crate::validation::Validator;

/// Separator in the sub-project directory list
pub const DIR_SEPARATOR: char = ':';

/// Registry key for a sub-project directory
///
/// Trimmed, with trailing `/` removed. Blank entries have no key.
pub fn sub_project_key(dir: &str) -> Option<String> {
    let key = dir.trim().trim_end_matches('/');
    if key.is_empty() {
        None
    } else {
        Some(key.to_string())
    }
}

/// Registry of sub-project stores
pub struct Project {
    stores: RwLock<BTreeMap<String, Arc<ProjectStore>>>,
    status_sources: RwLock<BTreeSet<String>>,
    validator: Option<Arc<dyn Validator>>,
    options: StoreOptions,
}

impl Project {
    /// Create a registry from a colon-separated list of sub-project directories
    ///
    /// Every directory must exist and contain `source/`. Nothing is read
    /// until `load_data`.
    pub fn new(
        project_dirs: &str,
        options: StoreOptions,
        validator: Option<Arc<dyn Validator>>,
    ) -> StoreResult<Self> {
        let project = Self {
            stores: RwLock::new(BTreeMap::new()),
            status_sources: RwLock::new(BTreeSet::new()),
            validator,
            options,
        };
        for dir in project_dirs.split(DIR_SEPARATOR) {
            project.add_sub_project(dir)?;
        }
        Ok(project)
    }

    /// Register a sub-project directory without loading it
    ///
    /// Returns the registry key, or `None` for a blank entry or a
    /// directory that is already registered.
    pub fn add_sub_project(&self, dir: &str) -> StoreResult<Option<String>> {
        let Some(key) = sub_project_key(dir) else {
            return Ok(None);
        };
        ProjectFiles::new(PathBuf::from(&key)).check_layout()?;

        let mut stores = self.stores.write();
        if stores.contains_key(&key) {
            warn!("Skipping duplicate sub project '{}'", key);
            return Ok(None);
        }
        let store = ProjectStore::new(&key, self.options, self.validator.clone());
        stores.insert(key.clone(), Arc::new(store));
        info!("Added sub project '{}'", key);
        Ok(Some(key))
    }

    /// Load every registered sub-project
    ///
    /// A sub-project that fails to load is reported as a diagnostic and
    /// left empty; the others still load.
    pub fn load_data(&self) -> Vec<Diagnostic> {
        let stores = self.stores.write();
        let mut diagnostics = Vec::new();
        for (key, store) in stores.iter() {
            diagnostics.extend(load_store(key, store));
        }
        self.collect_status_sources(stores.values());
        diagnostics
    }

    /// Reload one sub-project from disk
    ///
    /// Only the page data is replaced; locks held in the sub-project stay.
    pub fn load_sub_project(&self, name: &str) -> StoreResult<Vec<Diagnostic>> {
        let key = sub_project_key(name).unwrap_or_default();
        let stores = self.stores.write();
        let store = stores
            .get(&key)
            .ok_or_else(|| StoreError::UnknownSubProject(name.to_string()))?;
        let diagnostics = store.load()?;
        info!("Reloaded sub project '{}'", key);
        self.collect_status_sources(std::iter::once(store));
        Ok(diagnostics)
    }

    /// Remove a sub-project from the registry
    pub fn unload_sub_project(&self, name: &str) -> StoreResult<()> {
        let key = sub_project_key(name).unwrap_or_default();
        match self.stores.write().remove(&key) {
            Some(_) => {
                info!("Unloaded sub project '{}'", key);
                Ok(())
            }
            None => Err(StoreError::UnknownSubProject(name.to_string())),
        }
    }

    /// Registered sub-project keys, sorted
    pub fn list_sub_projects(&self) -> Vec<String> {
        self.stores.read().keys().cloned().collect()
    }

    fn collect_status_sources<'a>(&self, stores: impl Iterator<Item = &'a Arc<ProjectStore>>) {
        let mut sources = self.status_sources.write();
        for store in stores {
            sources.extend(store.status_sources());
        }
    }

    fn store(&self, sub_project: &str) -> StoreResult<Arc<ProjectStore>> {
        let key = sub_project_key(sub_project).unwrap_or_default();
        self.stores
            .read()
            .get(&key)
            .cloned()
            .ok_or_else(|| StoreError::UnknownSubProject(sub_project.to_string()))
    }

    // ==================== Routed store operations ====================

    pub fn page_from_id(&self, sub_project: &str, id: &str) -> StoreResult<PageSpan> {
        self.store(sub_project)?.page_from_id(id)
    }

    pub fn build_audio_path(&self, sub_project: &str, audio: &str) -> StoreResult<PathBuf> {
        self.store(sub_project)?.build_audio_path(audio)
    }

    pub fn list_audio_files(&self, sub_project: &str) -> StoreResult<Vec<String>> {
        Ok(self.store(sub_project)?.list_audio_files())
    }

    pub fn page_count(&self, sub_project: &str) -> StoreResult<usize> {
        Ok(self.store(sub_project)?.page_count())
    }

    pub fn contains_annotation(&self, sub_project: &str, id: &str) -> StoreResult<bool> {
        Ok(self.store(sub_project)?.contains_annotation(id))
    }

    pub fn lock(&self, sub_project: &str, page_id: &str, client: &ClientId) -> StoreResult<()> {
        self.store(sub_project)?.lock(page_id, client)
    }

    pub fn unlock(&self, sub_project: &str, page_id: &str, client: &ClientId) -> StoreResult<()> {
        self.store(sub_project)?.unlock(page_id, client)
    }

    pub fn is_locked(&self, sub_project: &str, page_id: &str) -> StoreResult<bool> {
        Ok(self.store(sub_project)?.is_locked(page_id))
    }

    pub fn locked_by(&self, sub_project: &str, page_id: &str) -> StoreResult<Option<ClientId>> {
        Ok(self.store(sub_project)?.locked_by(page_id))
    }

    /// Find and optionally lock the next page in a sub-project
    pub fn get_next_page(
        &self,
        sub_project: &str,
        query: &QueryPayload,
        current_page: &str,
        client: &ClientId,
        lock_on_load: bool,
    ) -> StoreResult<NextPage> {
        let store = self.store(sub_project)?;
        let outcome = store.get_next_page(query, current_page, client, lock_on_load)?;
        Ok(match outcome {
            NextPage::Page(mut annotation) => {
                annotation.sub_project = store.name().to_string();
                NextPage::Page(annotation)
            }
            message => message,
        })
    }

    /// Save an annotation to the sub-project named in its `sub_proj` field
    ///
    /// The page must already be known to that sub-project.
    pub fn save(&self, annotation: Annotation) -> StoreResult<()> {
        if annotation.id().trim().is_empty() {
            return Err(StoreError::EmptyPageId);
        }
        let stores = self.stores.read();
        let key = sub_project_key(&annotation.sub_project).unwrap_or_default();
        let store = stores
            .get(&key)
            .ok_or_else(|| StoreError::UnknownSubProject(annotation.sub_project.clone()))?;

        if !store.contains_annotation(annotation.id()) {
            let other = stores
                .iter()
                .find(|(_, s)| s.contains_annotation(annotation.id()))
                .map(|(name, _)| name.clone());
            return Err(StoreError::NoSuchPage {
                page_id: annotation.id().to_string(),
                sub_project: key,
                other,
            });
        }

        self.status_sources.write().extend(
            annotation
                .status_sources()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
        );
        store.save(annotation)
    }

    pub fn search(&self, sub_project: &str, query: &SearchQuery) -> StoreResult<Vec<MatchingPage>> {
        Ok(self.store(sub_project)?.search(query))
    }

    pub fn audio_stats(&self, sub_project: &str) -> StoreResult<AudioStats> {
        Ok(self.store(sub_project)?.audio_stats())
    }

    // ==================== Registry-wide operations ====================

    /// Release every lock held by a client in every sub-project
    ///
    /// Returns the total number of locks released.
    pub fn unlock_all(&self, client: &ClientId) -> StoreResult<usize> {
        let stores = self.stores.read();
        let mut released = 0;
        for store in stores.values() {
            released += store.unlock_all(client)?;
        }
        Ok(released)
    }

    /// Distinct clients holding a lock anywhere, sorted
    pub fn lock_holders(&self) -> Vec<ClientId> {
        let stores = self.stores.read();
        let holders: BTreeSet<ClientId> = stores
            .values()
            .flat_map(|store| store.lock_holders())
            .collect();
        holders.into_iter().collect()
    }

    /// Page statistics per sub-project
    pub fn stats(&self) -> BTreeMap<String, SubProjectStats> {
        self.stores
            .read()
            .iter()
            .map(|(key, store)| (key.clone(), store.stats()))
            .collect()
    }

    /// Editor names seen in loaded or saved annotations, sorted
    pub fn status_sources(&self) -> Vec<String> {
        self.status_sources.read().iter().cloned().collect()
    }
}

fn load_store(key: &str, store: &ProjectStore) -> Vec<Diagnostic> {
    match store.load() {
        Ok(diagnostics) => diagnostics,
        Err(e) => vec![Diagnostic::error(
            DiagnosticKind::LoadFailed,
            format!("failed to load subproj '{}' : {}", key, e),
        )],
    }
}
