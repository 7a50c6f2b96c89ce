//! Per sub-project page store
//!
//! The `ProjectStore` owns one sub-project's pages, annotations and page
//! locks:
//! - pages come from `source/*.json`, in file then list order
//! - annotations come from `annotation/*.json`, one per page
//! - locks live only in memory
//!
//! ## Locking
//!
//! Two independent reader-writer locks guard the store. The data lock
//! covers pages and annotations; the lock table has its own. Whenever
//! both are held, the data lock is taken first.
//!
//! ## Usage
//!
//! ```ignore
//! let store = ProjectStore::new("projects/batch1", StoreOptions::default(), None);
//! let diagnostics = store.load()?;
//!
//! let client = ClientId::new("conn-1", "anna");
//! match store.get_next_page(&query, "", &client, true)? {
//!     NextPage::Page(annotation) => { /* edit, then */ store.save(annotation)?; }
//!     NextPage::Message(msg) => println!("{}", msg),
//! }
//! ```

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::locks::LockTable;
use crate::models::{status, Annotation, ClientId, PageSpan};
use crate::query::{MatchingPage, PageQuery, QueryPayload, RequestIndex, SearchQuery};
use crate::storage::persistence::read_json;
use crate::storage::{migrate, ProjectFiles, StoreError, StoreResult};
use crate::validation::Validator;

/// Load-time behavior of a store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreOptions {
    /// Reject pages whose audio file is missing under `source/`
    pub verify_audio: bool,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self { verify_audio: true }
    }
}

/// Result of a next-page request
#[derive(Debug, Clone, PartialEq)]
pub enum NextPage {
    /// The page, with its 1-based `index` set
    Page(Annotation),
    /// Nothing to return; the message says why
    Message(String),
}

impl NextPage {
    pub fn page(&self) -> Option<&Annotation> {
        match self {
            NextPage::Page(annotation) => Some(annotation),
            NextPage::Message(_) => None,
        }
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            NextPage::Page(_) => None,
            NextPage::Message(msg) => Some(msg),
        }
    }
}

/// Page-level progress counters for one sub-project
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubProjectStats {
    pub pages_tot: usize,
    pub pages_done: usize,
    pub pages_skip: usize,
    pub pages_delete: usize,
    pub pages_locked: usize,
    /// `"<user>: <count>"`, sorted by user
    pub pages_locked_by: Vec<String>,
    pub done_by_editor: BTreeMap<String, usize>,
}

/// Named counters
pub type Counters = BTreeMap<String, usize>;

/// Counters per audio file (extension stripped), plus `"all"`
pub type StatsPerAudio = BTreeMap<String, Counters>;

/// Key for whole-project totals in `StatsPerAudio`
pub const ALL_AUDIO: &str = "all";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioStats {
    pub pages: StatsPerAudio,
    pub chunks: StatsPerAudio,
}

#[derive(Debug, Default)]
struct StoreData {
    /// Served pages, in source order
    pages: Vec<PageSpan>,
    annotations: HashMap<String, Annotation>,
}

impl StoreData {
    fn annotation_for(&self, page: &PageSpan) -> Annotation {
        self.annotations
            .get(&page.id)
            .cloned()
            .unwrap_or_else(|| Annotation::for_page(page.clone()))
    }
}

/// Pages, annotations and locks of one sub-project
pub struct ProjectStore {
    name: String,
    files: ProjectFiles,
    options: StoreOptions,
    data: RwLock<StoreData>,
    locks: LockTable,
    validator: Option<Arc<dyn Validator>>,
}

impl ProjectStore {
    /// Create an empty store for a sub-project directory; call `load` to read it
    pub fn new(
        project_dir: impl Into<PathBuf>,
        options: StoreOptions,
        validator: Option<Arc<dyn Validator>>,
    ) -> Self {
        let project_dir = project_dir.into();
        Self {
            name: project_dir.to_string_lossy().to_string(),
            files: ProjectFiles::new(project_dir),
            options,
            data: RwLock::new(StoreData::default()),
            locks: LockTable::new(),
            validator,
        }
    }

    /// Sub-project name (its directory path)
    pub fn name(&self) -> &str {
        &self.name
    }

    // ==================== Loading ====================

    /// Read all pages and annotations from disk, replacing the in-memory data
    ///
    /// Problems with individual files are returned as diagnostics and the
    /// file is skipped. Only a broken directory layout is an error.
    pub fn load(&self) -> StoreResult<Vec<Diagnostic>> {
        let mut data = self.data.write();
        self.files.ensure_layout()?;

        let mut diagnostics = Vec::new();
        let pages = self.load_pages(&mut diagnostics);
        info!("Loaded {} source pages for '{}'", pages.len(), self.name);

        let annotations = self.load_annotations(&mut diagnostics);
        info!(
            "Loaded {} annotation files for '{}'",
            annotations.len(),
            self.name
        );

        let pages = check_integrity(pages, &annotations, &mut diagnostics);
        *data = StoreData { pages, annotations };

        Ok(diagnostics)
    }

    fn load_pages(&self, diagnostics: &mut Vec<Diagnostic>) -> Vec<PageSpan> {
        let mut pages = Vec::new();
        let mut seen = HashSet::new();

        for path in self.files.source_files() {
            let file_pages: Vec<PageSpan> = match read_json(&path, "pages") {
                Ok(p) => p,
                Err(diag) => {
                    diagnostics.push(diag);
                    continue;
                }
            };

            if let Err(diag) = self.validate_pages(&file_pages) {
                diagnostics.push(Diagnostic {
                    message: format!(
                        "validation error for pages loaded from file {} : {}",
                        path.display(),
                        diag.message
                    ),
                    ..diag
                });
                continue;
            }

            for page in file_pages {
                if seen.insert(page.id.clone()) {
                    pages.push(page);
                } else {
                    diagnostics.push(Diagnostic::error(
                        DiagnosticKind::DuplicatePage,
                        format!(
                            "duplicate page id {} in file {} (skipping the page)",
                            page.id,
                            path.display()
                        ),
                    ));
                }
            }
        }
        pages
    }

    fn validate_page(&self, page: &PageSpan) -> Result<(), Diagnostic> {
        let invalid = |msg: String| {
            Err(Diagnostic::error(
                DiagnosticKind::InvalidPage,
                format!("invalid page id {} : {}", page.id, msg),
            ))
        };

        if page.id.trim().is_empty() {
            return invalid("no id".to_string());
        }
        if page.audio.trim().is_empty() {
            return invalid("no audio".to_string());
        }
        if !page.span().is_valid() {
            return invalid(format!(
                "page end must be after page start, found start: {}, end: {}",
                page.start, page.end
            ));
        }
        if self.options.verify_audio {
            let audio_path = self.files.audio_path(&page.audio);
            if !audio_path.exists() {
                return invalid(format!(
                    "audio file does not exist: {} (expected location: {})",
                    page.audio,
                    audio_path.display()
                ));
            }
        }
        Ok(())
    }

    /// Check one source file: valid pages, unique ids, strictly ordered
    /// and non-overlapping
    fn validate_pages(&self, pages: &[PageSpan]) -> Result<(), Diagnostic> {
        let mut seen = HashSet::new();
        for (i, page) in pages.iter().enumerate() {
            self.validate_page(page)?;
            if !seen.insert(page.id.as_str()) {
                return Err(Diagnostic::error(
                    DiagnosticKind::DuplicatePage,
                    format!("duplicate ids for source data: {}", page.id),
                ));
            }
            if i > 0 {
                check_order(&pages[i - 1], page, "pages").map_err(|msg| {
                    Diagnostic::error(DiagnosticKind::PageOrder, msg)
                })?;
            }
        }
        Ok(())
    }

    fn load_annotations(&self, diagnostics: &mut Vec<Diagnostic>) -> HashMap<String, Annotation> {
        let mut annotations = HashMap::new();
        let mut migrated = 0usize;

        for path in self.files.annotation_files() {
            let mut annotation: Annotation = match read_json(&path, "annotation") {
                Ok(a) => a,
                Err(diag) => {
                    diagnostics.push(diag);
                    continue;
                }
            };

            if let Err(msg) = validate_annotation(&annotation) {
                diagnostics.push(Diagnostic::error(
                    DiagnosticKind::InvalidAnnotation,
                    format!("invalid annotation in file {} : {}", path.display(), msg),
                ));
                continue;
            }

            if annotations.contains_key(annotation.id()) {
                diagnostics.push(Diagnostic::error(
                    DiagnosticKind::DuplicateAnnotation,
                    format!(
                        "duplicate page ids for annotation data: {} in {}",
                        annotation.id(),
                        path.display()
                    ),
                ));
                continue;
            }

            if file_stem(&path) != annotation.id() {
                diagnostics.push(Diagnostic::error(
                    DiagnosticKind::IdMismatch,
                    format!(
                        "annotation file {} has a different ID than its page: {}",
                        path.display(),
                        annotation.id()
                    ),
                ));
            }

            let applied = migrate(&mut annotation);
            if !applied.is_empty() {
                debug!("Migrated {} with {:?}", annotation.id(), applied);
                migrated += 1;
            }

            annotations.insert(annotation.id().to_string(), annotation);
        }

        if migrated > 0 {
            diagnostics.push(Diagnostic::warning(
                DiagnosticKind::Migrated,
                format!(
                    "{} annotation(s) in {} use a legacy page status (read as '{}')",
                    migrated,
                    self.name,
                    status::NORMAL
                ),
            ));
        }
        annotations
    }

    // ==================== Lookup ====================

    /// Source page by id
    pub fn page_from_id(&self, id: &str) -> StoreResult<PageSpan> {
        self.data
            .read()
            .pages
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .ok_or_else(|| StoreError::UnknownPage(id.to_string()))
    }

    /// Current in-memory annotation for a page
    pub fn annotation(&self, id: &str) -> Option<Annotation> {
        self.data.read().annotations.get(id).cloned()
    }

    /// Whether an annotation with this page id is loaded
    pub fn contains_annotation(&self, id: &str) -> bool {
        self.data.read().annotations.contains_key(id)
    }

    /// Number of page annotations
    pub fn page_count(&self) -> usize {
        self.data.read().annotations.len()
    }

    /// Resolve an audio file against the sub-project's audio root
    pub fn build_audio_path(&self, audio: &str) -> StoreResult<PathBuf> {
        if audio.trim().is_empty() {
            return Err(StoreError::EmptyAudioPath);
        }
        Ok(self.files.audio_path(audio))
    }

    /// Distinct audio file base names (no directory, no extension), in source order
    pub fn list_audio_files(&self) -> Vec<String> {
        let data = self.data.read();
        let mut seen = HashSet::new();
        data.pages
            .iter()
            .filter_map(|p| {
                Path::new(&p.audio)
                    .file_stem()
                    .map(|s| s.to_string_lossy().to_string())
            })
            .filter(|name| seen.insert(name.clone()))
            .collect()
    }

    /// Non-empty status sources across all annotations
    pub fn status_sources(&self) -> BTreeSet<String> {
        let data = self.data.read();
        data.annotations
            .values()
            .flat_map(|a| a.status_sources())
            .map(str::to_string)
            .collect()
    }

    // ==================== Locking ====================

    pub fn lock(&self, page_id: &str, client: &ClientId) -> StoreResult<()> {
        self.locks.lock(page_id, client)
    }

    pub fn unlock(&self, page_id: &str, client: &ClientId) -> StoreResult<()> {
        self.locks.unlock(page_id, client)
    }

    /// Release every lock held by this exact client; returns the count
    pub fn unlock_all(&self, client: &ClientId) -> StoreResult<usize> {
        self.locks.unlock_all(client)
    }

    pub fn is_locked(&self, page_id: &str) -> bool {
        self.locks.is_locked(page_id)
    }

    pub fn locked_by(&self, page_id: &str) -> Option<ClientId> {
        self.locks.holder(page_id)
    }

    /// Distinct clients holding locks in this store
    pub fn lock_holders(&self) -> Vec<ClientId> {
        self.locks.holders()
    }

    // ==================== Traversal ====================

    /// Find the next page for a client
    ///
    /// - `request_index` set: jump to `first`, `last` or a 0-based position
    /// - `curr_id` set: walk `step_size` matching, unlocked pages from it;
    ///   a zero step never arrives
    /// - otherwise: the first matching, unlocked page walking from position
    ///   0 (a negative step only looks at position 0)
    ///
    /// With `lock_on_load` the returned page is locked for `client`. "No
    /// such page" and lost lock races are messages, not errors.
    pub fn get_next_page(
        &self,
        query: &QueryPayload,
        current_page: &str,
        client: &ClientId,
        lock_on_load: bool,
    ) -> StoreResult<NextPage> {
        debug!("GetNextPage query {:?}", query);
        if client.id.trim().is_empty() {
            return Err(StoreError::EmptyClientId(client.clone()));
        }
        if client.user_name.trim().is_empty() {
            return Err(StoreError::EmptyUserName(client.clone()));
        }

        let data = self.data.read();

        if !query.request_index.is_empty() {
            return self.page_at_index(&data, query, current_page, client, lock_on_load);
        }

        let matcher = PageQuery::compile(&query.request)?;
        let forward = query.step_size >= 0;
        let len = data.pages.len();

        let fresh = query.curr_id.is_empty();
        let hops = if fresh { 1 } else { query.step_size.unsigned_abs() };

        let positions: Box<dyn Iterator<Item = usize>> = if fresh {
            if forward {
                Box::new(0..len)
            } else {
                Box::new(0..len.min(1))
            }
        } else {
            let Some(current) = data.pages.iter().position(|p| p.id == query.curr_id) else {
                return Ok(NextPage::Message(format!(
                    "no page with id {} in sub proj '{}'",
                    query.curr_id, self.name
                )));
            };
            if forward {
                Box::new(current + 1..len)
            } else {
                Box::new((0..current).rev())
            }
        };

        let mut seen = 0u64;
        for i in positions {
            let page = &data.pages[i];
            if self.locks.is_locked(&page.id) {
                continue;
            }
            let mut annotation = data.annotation_for(page);
            if !matcher.matches(&annotation, self.validator.as_deref()) {
                continue;
            }
            seen += 1;
            if seen != hops {
                continue;
            }

            if lock_on_load {
                match self.locks.lock(&page.id, client) {
                    Ok(()) => {}
                    Err(StoreError::AlreadyLocked { .. }) => {
                        return Ok(NextPage::Message(format!("{} is already locked", page.id)));
                    }
                    Err(e) => return Err(e),
                }
            }
            annotation.index = i as i64 + 1;
            return Ok(NextPage::Page(annotation));
        }

        Ok(NextPage::Message(format!(
            "no page matching query request\n{}",
            query.request.pretty()
        )))
    }

    fn page_at_index(
        &self,
        data: &StoreData,
        query: &QueryPayload,
        current_page: &str,
        client: &ClientId,
        lock_on_load: bool,
    ) -> StoreResult<NextPage> {
        let index = RequestIndex::parse(&query.request_index)
            .and_then(|r| r.resolve(data.pages.len()))
            .ok_or_else(|| StoreError::InvalidRequestIndex {
                index: query.request_index.clone(),
                pages: data.pages.len(),
            })?;

        let page = &data.pages[index];
        if page.id == current_page {
            return Ok(NextPage::Message(
                "user is already at the requested page".to_string(),
            ));
        }

        let mut annotation = data.annotation_for(page);
        if lock_on_load {
            if let Err(e) = self.locks.lock(&page.id, client) {
                return Ok(NextPage::Message(format!("page is already locked: {}", e)));
            }
        }
        annotation.index = index as i64 + 1;
        Ok(NextPage::Page(annotation))
    }

    // ==================== Saving ====================

    /// Store an annotation in memory and on disk
    ///
    /// Text and status fields are normalized first. If writing the file
    /// fails the in-memory record is already updated; the error means
    /// memory and disk may differ.
    pub fn save(&self, mut annotation: Annotation) -> StoreResult<()> {
        annotation.normalize();
        if annotation.id().trim().is_empty() {
            return Err(StoreError::EmptyPageId);
        }
        let annotation = annotation.to_persisted();

        let mut data = self.data.write();
        data.annotations
            .insert(annotation.id().to_string(), annotation.clone());

        let path = self.files.write_annotation(&annotation).map_err(|e| {
            warn!("Failed to write {}: {}", annotation.id(), e);
            e
        })?;
        info!(
            "Saved {} ({}) to {:?}",
            annotation.id(),
            annotation.current_status.name,
            path
        );
        Ok(())
    }

    // ==================== Search ====================

    /// Pages with at least one chunk matching the query, in source order
    pub fn search(&self, query: &SearchQuery) -> Vec<MatchingPage> {
        let data = self.data.read();
        data.pages
            .iter()
            .filter_map(|p| data.annotations.get(&p.id))
            .filter_map(|annotation| {
                let matching_chunks: Vec<usize> = annotation
                    .chunks
                    .iter()
                    .enumerate()
                    .filter(|(_, c)| query.chunk_matches(c))
                    .map(|(i, _)| i)
                    .collect();
                (!matching_chunks.is_empty()).then(|| MatchingPage {
                    matching_chunks,
                    page: annotation.clone(),
                })
            })
            .collect()
    }

    // ==================== Stats ====================

    /// Page-level progress counters
    pub fn stats(&self) -> SubProjectStats {
        let data = self.data.read();
        let mut stats = SubProjectStats {
            pages_tot: data.annotations.len(),
            ..SubProjectStats::default()
        };

        for annotation in data.annotations.values() {
            let derived = annotation.derived_status();
            match derived.as_str() {
                status::SKIP => stats.pages_skip += 1,
                status::DELETE => stats.pages_delete += 1,
                _ => {}
            }
            if !is_pending(&derived) {
                stats.pages_done += 1;
                for editor in annotation.editors() {
                    *stats.done_by_editor.entry(editor).or_default() += 1;
                }
            }
        }

        let locks = self.locks.snapshot();
        stats.pages_locked = locks.len();
        let mut by_user: BTreeMap<&str, usize> = BTreeMap::new();
        for client in locks.values() {
            *by_user.entry(client.user_name.as_str()).or_default() += 1;
        }
        stats.pages_locked_by = by_user
            .into_iter()
            .map(|(user, n)| format!("{}: {}", user, n))
            .collect();

        stats
    }

    /// Page and chunk counters per audio file and for the whole sub-project
    pub fn audio_stats(&self) -> AudioStats {
        let data = self.data.read();
        let locks = self.locks.snapshot();
        let mut stats = AudioStats::default();

        for annotation in data.annotations.values() {
            let audio = audio_key(&annotation.page.audio);

            let mut page_keys = vec!["total".to_string()];
            if let Some(holder) = locks.get(annotation.id()) {
                page_keys.push("locked".to_string());
                page_keys.push(format!("locked by:{}", holder.user_name));
            }
            let derived = annotation.derived_status();
            if derived == status::UNCHECKED {
                page_keys.push(derived);
            } else {
                page_keys.push("checked".to_string());
                page_keys.push(format!("status:{}", derived));
            }
            let sources: BTreeSet<&str> = annotation
                .chunks
                .iter()
                .map(|c| c.current_status.source.as_str())
                .filter(|s| !s.is_empty())
                .collect();
            page_keys.extend(sources.into_iter().map(|s| format!("source:{}", s)));
            if !annotation.comment.trim().is_empty() {
                page_keys.push("comment".to_string());
            }
            bump(&mut stats.pages, &audio, &page_keys);

            for chunk in &annotation.chunks {
                let mut chunk_keys = vec!["total".to_string()];
                let name = &chunk.current_status.name;
                if name == status::UNCHECKED {
                    chunk_keys.push(name.clone());
                } else {
                    chunk_keys.push("checked".to_string());
                    chunk_keys.push(format!("status:{}", name));
                }
                if !chunk.current_status.source.is_empty() {
                    chunk_keys.push(format!("source:{}", chunk.current_status.source));
                }
                bump(&mut stats.chunks, &audio, &chunk_keys);
            }
        }

        stats.pages.entry(ALL_AUDIO.to_string()).or_default();
        stats.chunks.entry(ALL_AUDIO.to_string()).or_default();
        stats
    }
}

/// Pages not yet done
fn is_pending(derived_status: &str) -> bool {
    derived_status.eq_ignore_ascii_case(status::SKIP)
        || derived_status.eq_ignore_ascii_case(status::UNCHECKED)
}

fn bump(stats: &mut StatsPerAudio, audio: &str, keys: &[String]) {
    for scope in [audio, ALL_AUDIO] {
        let counters = stats.entry(scope.to_string()).or_default();
        for key in keys {
            *counters.entry(key.clone()).or_default() += 1;
        }
    }
}

/// Audio path without its extension
fn audio_key(audio: &str) -> String {
    Path::new(audio)
        .with_extension("")
        .to_string_lossy()
        .to_string()
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// Consecutive intervals must be ordered by start and end, and not overlap
fn check_order(prev: &impl Interval, next: &impl Interval, what: &str) -> Result<(), String> {
    let (prev_start, prev_end) = prev.bounds();
    let (start, end) = next.bounds();
    if prev_start > start {
        return Err(format!(
            "{} must be ordered by start time, found {} before {}",
            what,
            prev.describe(),
            next.describe()
        ));
    }
    if prev_end > end {
        return Err(format!(
            "{} must be ordered by end time, found {} before {}",
            what,
            prev.describe(),
            next.describe()
        ));
    }
    if start < prev_end {
        return Err(format!(
            "overlapping {} is not allowed, found {} before {}",
            what,
            prev.describe(),
            next.describe()
        ));
    }
    Ok(())
}

trait Interval {
    fn bounds(&self) -> (i64, i64);
    fn describe(&self) -> String;
}

impl Interval for PageSpan {
    fn bounds(&self) -> (i64, i64) {
        (self.start, self.end)
    }

    fn describe(&self) -> String {
        self.to_string()
    }
}

impl Interval for crate::models::TranscriptionChunk {
    fn bounds(&self) -> (i64, i64) {
        (self.start, self.end)
    }

    fn describe(&self) -> String {
        format!("chunk {} [{}-{}]", self.uuid, self.start, self.end)
    }
}

fn validate_annotation(annotation: &Annotation) -> Result<(), String> {
    let page = &annotation.page;
    if page.id.trim().is_empty() {
        return Err("no id".to_string());
    }
    if page.audio.trim().is_empty() {
        return Err("no audio".to_string());
    }
    if !page.span().is_valid() {
        return Err(format!(
            "annotation end must be after annotation start, found start: {}, end: {}",
            page.start, page.end
        ));
    }
    for (i, chunk) in annotation.chunks.iter().enumerate() {
        if !chunk.span().is_valid() {
            return Err(format!(
                "chunk end must be after chunk start, found start: {}, end: {}",
                chunk.start, chunk.end
            ));
        }
        if i > 0 {
            check_order(&annotation.chunks[i - 1], chunk, "chunks")?;
        }
        if chunk.current_status.name.is_empty() {
            return Err(format!("missing current status for chunk {}", chunk.uuid));
        }
    }
    Ok(())
}

/// Drop pages without annotations and flag annotations that disagree
/// with (or lack) their page
fn check_integrity(
    pages: Vec<PageSpan>,
    annotations: &HashMap<String, Annotation>,
    diagnostics: &mut Vec<Diagnostic>,
) -> Vec<PageSpan> {
    if pages.is_empty() {
        diagnostics.push(Diagnostic::error(
            DiagnosticKind::NoPages,
            "found no pages in source data",
        ));
    }
    if annotations.is_empty() {
        diagnostics.push(Diagnostic::error(
            DiagnosticKind::NoAnnotations,
            "found no annotation data",
        ));
    }

    let by_id: HashMap<&str, &PageSpan> = pages.iter().map(|p| (p.id.as_str(), p)).collect();
    let mut ids: Vec<&String> = annotations.keys().collect();
    ids.sort();
    for id in ids {
        let annotation = &annotations[id];
        match by_id.get(id.as_str()) {
            None => diagnostics.push(Diagnostic::error(
                DiagnosticKind::OrphanAnnotation,
                format!("annotation data with id {} not found in source data", id),
            )),
            Some(page) if page.audio != annotation.page.audio => {
                diagnostics.push(Diagnostic::error(
                    DiagnosticKind::AudioMismatch,
                    format!(
                        "annotation data {} has a different audio than source data: {} vs {}",
                        id, annotation.page.audio, page.audio
                    ),
                ))
            }
            Some(_) => {}
        }
    }

    let (served, unannotated): (Vec<PageSpan>, Vec<PageSpan>) = pages
        .into_iter()
        .partition(|p| annotations.contains_key(&p.id));
    for page in unannotated {
        diagnostics.push(Diagnostic::error(
            DiagnosticKind::UnannotatedPage,
            format!(
                "page data with id {} not found in annotation data (removing the page)",
                page.id
            ),
        ));
    }
    served
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{StatusTag, TranscriptionChunk};
    use crate::query::QueryRequest;
    use crate::validation::Issue;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Write a sub-project with one source file and one annotation per page
    fn write_project(dir: &Path, pages: &[PageSpan], chunk_statuses: &[&[&str]]) {
        fs::create_dir_all(dir.join("source")).unwrap();
        fs::create_dir_all(dir.join("annotation")).unwrap();
        fs::write(
            dir.join("source").join("pages.json"),
            serde_json::to_vec(pages).unwrap(),
        )
        .unwrap();
        for (page, statuses) in pages.iter().zip(chunk_statuses) {
            fs::write(dir.join("source").join(&page.audio), b"RIFF").unwrap();
            let mut anno = Annotation::for_page(page.clone());
            anno.current_status = StatusTag::named("normal");
            anno.chunks = statuses
                .iter()
                .enumerate()
                .map(|(i, s)| {
                    let mut c = TranscriptionChunk::new(i as i64 * 10, i as i64 * 10 + 5, "text");
                    c.current_status = StatusTag::new(*s, "anna");
                    c
                })
                .collect();
            fs::write(
                dir.join("annotation").join(format!("{}.json", page.id)),
                serde_json::to_vec(&anno).unwrap(),
            )
            .unwrap();
        }
    }

    fn pages(n: usize) -> Vec<PageSpan> {
        (1..=n)
            .map(|i| {
                let start = i as i64 * 1000;
                PageSpan::new(format!("p{}", i), "a.wav", start, start + 900)
            })
            .collect()
    }

    fn loaded_store(temp_dir: &TempDir, n: usize) -> ProjectStore {
        let unchecked: &[&str] = &["unchecked"];
        let statuses = vec![unchecked; n];
        write_project(temp_dir.path(), &pages(n), &statuses);
        let store = ProjectStore::new(temp_dir.path(), StoreOptions::default(), None);
        let diagnostics = store.load().unwrap();
        assert!(diagnostics.is_empty(), "{:?}", diagnostics);
        store
    }

    fn anna() -> ClientId {
        ClientId::new("conn-a", "anna")
    }

    fn bert() -> ClientId {
        ClientId::new("conn-b", "bert")
    }

    fn walk(curr_id: &str, step_size: i64) -> QueryPayload {
        QueryPayload {
            request: QueryRequest::any(),
            step_size,
            curr_id: curr_id.to_string(),
            ..QueryPayload::default()
        }
    }

    fn at(index: &str) -> QueryPayload {
        QueryPayload {
            request: QueryRequest::any(),
            request_index: index.to_string(),
            ..QueryPayload::default()
        }
    }

    #[test]
    fn test_load_creates_annotation_dir() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir_all(temp_dir.path().join("source")).unwrap();
        let store = ProjectStore::new(temp_dir.path(), StoreOptions::default(), None);

        let diagnostics = store.load().unwrap();
        assert!(temp_dir.path().join("annotation").is_dir());
        let kinds: Vec<_> = diagnostics.iter().map(|d| d.kind).collect();
        assert_eq!(kinds, vec![DiagnosticKind::NoPages, DiagnosticKind::NoAnnotations]);
    }

    #[test]
    fn test_load_missing_project_dir_is_error() {
        let temp_dir = TempDir::new().unwrap();
        let store = ProjectStore::new(
            temp_dir.path().join("nope"),
            StoreOptions::default(),
            None,
        );
        assert!(matches!(
            store.load(),
            Err(StoreError::MissingDirectory { .. })
        ));
    }

    #[test]
    fn test_load_skips_broken_files_and_keeps_going() {
        let temp_dir = TempDir::new().unwrap();
        write_project(temp_dir.path(), &pages(2), &[&["ok"], &["ok"]]);
        fs::write(temp_dir.path().join("source").join("broken.json"), "[{").unwrap();
        fs::write(
            temp_dir.path().join("annotation").join("zz.json"),
            "not json",
        )
        .unwrap();

        let store = ProjectStore::new(temp_dir.path(), StoreOptions::default(), None);
        let diagnostics = store.load().unwrap();

        assert_eq!(diagnostics.len(), 2);
        assert!(diagnostics
            .iter()
            .all(|d| d.kind == DiagnosticKind::ParseFailed));
        assert_eq!(store.page_count(), 2);
        assert!(store.page_from_id("p2").is_ok());
    }

    #[test]
    fn test_unordered_source_file_is_rejected_whole() {
        let temp_dir = TempDir::new().unwrap();
        let mut unordered = pages(3);
        unordered.swap(0, 1);
        write_project(temp_dir.path(), &unordered, &[&["ok"], &["ok"], &["ok"]]);

        let store = ProjectStore::new(temp_dir.path(), StoreOptions::default(), None);
        let diagnostics = store.load().unwrap();

        assert!(diagnostics
            .iter()
            .any(|d| d.kind == DiagnosticKind::PageOrder));
        assert!(store.page_from_id("p1").is_err());
        assert!(store.page_from_id("p3").is_err());
    }

    #[test]
    fn test_overlapping_pages_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let overlapping = vec![
            PageSpan::new("p1", "a.wav", 0, 1000),
            PageSpan::new("p2", "a.wav", 900, 2000),
        ];
        write_project(temp_dir.path(), &overlapping, &[&["ok"], &["ok"]]);

        let store = ProjectStore::new(temp_dir.path(), StoreOptions::default(), None);
        let diagnostics = store.load().unwrap();
        let order = diagnostics
            .iter()
            .find(|d| d.kind == DiagnosticKind::PageOrder)
            .unwrap();
        assert!(order.message.contains("overlapping"));
    }

    #[test]
    fn test_missing_audio_file_rejected_when_verified() {
        let temp_dir = TempDir::new().unwrap();
        write_project(temp_dir.path(), &pages(1), &[&["ok"]]);
        fs::remove_file(temp_dir.path().join("source").join("a.wav")).unwrap();

        let strict = ProjectStore::new(temp_dir.path(), StoreOptions::default(), None);
        let diagnostics = strict.load().unwrap();
        assert!(diagnostics
            .iter()
            .any(|d| d.kind == DiagnosticKind::InvalidPage));

        let lenient = ProjectStore::new(
            temp_dir.path(),
            StoreOptions {
                verify_audio: false,
            },
            None,
        );
        assert!(lenient.load().unwrap().is_empty());
        assert_eq!(lenient.page_count(), 1);
    }

    #[test]
    fn test_integrity_pass() {
        let temp_dir = TempDir::new().unwrap();
        write_project(temp_dir.path(), &pages(3), &[&["ok"], &["ok"], &["ok"]]);
        let annotation_dir = temp_dir.path().join("annotation");
        // p2 loses its annotation, p3's annotation points at other audio
        fs::remove_file(annotation_dir.join("p2.json")).unwrap();
        let mut p3: Annotation =
            serde_json::from_slice(&fs::read(annotation_dir.join("p3.json")).unwrap()).unwrap();
        p3.page.audio = "b.wav".into();
        fs::write(annotation_dir.join("p3.json"), serde_json::to_vec(&p3).unwrap()).unwrap();
        // orphan annotation
        let mut orphan = p3.clone();
        orphan.page = PageSpan::new("p9", "a.wav", 50_000, 51_000);
        fs::write(
            annotation_dir.join("p9.json"),
            serde_json::to_vec(&orphan).unwrap(),
        )
        .unwrap();

        let store = ProjectStore::new(temp_dir.path(), StoreOptions::default(), None);
        let diagnostics = store.load().unwrap();
        let kinds: HashSet<_> = diagnostics.iter().map(|d| d.kind).collect();

        assert!(kinds.contains(&DiagnosticKind::UnannotatedPage));
        assert!(kinds.contains(&DiagnosticKind::AudioMismatch));
        assert!(kinds.contains(&DiagnosticKind::OrphanAnnotation));
        assert!(store.page_from_id("p2").is_err());
        // flagged, not removed
        assert!(store.page_from_id("p3").is_ok());
        assert!(store.contains_annotation("p9"));
    }

    #[test]
    fn test_annotation_file_name_mismatch_flagged() {
        let temp_dir = TempDir::new().unwrap();
        write_project(temp_dir.path(), &pages(1), &[&["ok"]]);
        let annotation_dir = temp_dir.path().join("annotation");
        fs::rename(annotation_dir.join("p1.json"), annotation_dir.join("old.json")).unwrap();

        let store = ProjectStore::new(temp_dir.path(), StoreOptions::default(), None);
        let diagnostics = store.load().unwrap();
        assert!(diagnostics
            .iter()
            .any(|d| d.kind == DiagnosticKind::IdMismatch));
        assert!(store.contains_annotation("p1"));
    }

    #[test]
    fn test_legacy_page_status_migrated() {
        let temp_dir = TempDir::new().unwrap();
        write_project(temp_dir.path(), &pages(1), &[&["ok"]]);
        let path = temp_dir.path().join("annotation").join("p1.json");
        let mut anno: Annotation = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        anno.current_status = StatusTag::named("in progress");
        fs::write(&path, serde_json::to_vec(&anno).unwrap()).unwrap();

        let store = ProjectStore::new(temp_dir.path(), StoreOptions::default(), None);
        let diagnostics = store.load().unwrap();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].kind, DiagnosticKind::Migrated);
        assert!(!diagnostics[0].is_error());
        assert_eq!(store.annotation("p1").unwrap().current_status.name, "normal");
    }

    #[test]
    fn test_fresh_walk_then_relative_walk() {
        let temp_dir = TempDir::new().unwrap();
        let store = loaded_store(&temp_dir, 3);

        let first = store.get_next_page(&walk("", 1), "", &anna(), false).unwrap();
        let first = first.page().unwrap();
        assert_eq!(first.id(), "p1");
        assert_eq!(first.index, 1);

        let second = store
            .get_next_page(&walk("p1", 1), "", &anna(), false)
            .unwrap();
        let second = second.page().unwrap();
        assert_eq!(second.id(), "p2");
        assert_eq!(second.index, 2);
    }

    #[test]
    fn test_walk_step_size_and_direction() {
        let temp_dir = TempDir::new().unwrap();
        let store = loaded_store(&temp_dir, 5);

        let next = store.get_next_page(&walk("p1", 3), "", &anna(), false).unwrap();
        assert_eq!(next.page().unwrap().id(), "p4");

        let back = store.get_next_page(&walk("p4", -2), "", &anna(), false).unwrap();
        assert_eq!(back.page().unwrap().id(), "p2");

        let fresh_back = store.get_next_page(&walk("", -1), "", &anna(), false).unwrap();
        assert_eq!(fresh_back.page().unwrap().id(), "p1");
        assert_eq!(fresh_back.page().unwrap().index, 1);

        let fresh_far = store.get_next_page(&walk("", 3), "", &anna(), false).unwrap();
        assert_eq!(fresh_far.page().unwrap().id(), "p1");
    }

    #[test]
    fn test_fresh_backward_walk_only_checks_first_page() {
        let temp_dir = TempDir::new().unwrap();
        let store = loaded_store(&temp_dir, 3);
        store.lock("p1", &anna()).unwrap();

        let outcome = store.get_next_page(&walk("", -1), "", &bert(), false).unwrap();
        assert!(outcome
            .message()
            .unwrap()
            .starts_with("no page matching query request"));
    }

    #[test]
    fn test_zero_step_walk_finds_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let store = loaded_store(&temp_dir, 3);

        let outcome = store.get_next_page(&walk("p1", 0), "", &anna(), false).unwrap();
        assert!(outcome
            .message()
            .unwrap()
            .starts_with("no page matching query request"));

        let fresh = store.get_next_page(&walk("", 0), "", &anna(), false).unwrap();
        assert_eq!(fresh.page().unwrap().id(), "p1");
    }

    #[test]
    fn test_walk_off_the_end_is_message() {
        let temp_dir = TempDir::new().unwrap();
        let store = loaded_store(&temp_dir, 3);

        let outcome = store.get_next_page(&walk("p3", 1), "", &anna(), false).unwrap();
        let msg = outcome.message().unwrap();
        assert!(msg.starts_with("no page matching query request"));
        assert!(msg.contains("page_status"));

        let outcome = store.get_next_page(&walk("p1", -1), "", &anna(), false).unwrap();
        assert!(outcome.page().is_none());
    }

    #[test]
    fn test_walk_skips_locked_pages() {
        let temp_dir = TempDir::new().unwrap();
        let store = loaded_store(&temp_dir, 5);
        store.lock("p1", &anna()).unwrap();
        store.lock("p2", &anna()).unwrap();
        store.lock("p3", &anna()).unwrap();

        let outcome = store.get_next_page(&walk("", 1), "", &bert(), true).unwrap();
        let page = outcome.page().unwrap();
        assert_eq!(page.id(), "p4");
        assert_eq!(store.locked_by("p4"), Some(bert()));
    }

    #[test]
    fn test_walk_skips_only_locked_page_in_middle() {
        let temp_dir = TempDir::new().unwrap();
        let store = loaded_store(&temp_dir, 5);
        store.lock("p3", &anna()).unwrap();

        let outcome = store.get_next_page(&walk("p2", 1), "", &bert(), false).unwrap();
        assert_eq!(outcome.page().unwrap().id(), "p4");
    }

    #[test]
    fn test_walk_applies_query() {
        let temp_dir = TempDir::new().unwrap();
        write_project(
            temp_dir.path(),
            &pages(4),
            &[&["ok"], &["unchecked"], &["ok"], &["skip", "ok"]],
        );
        let store = ProjectStore::new(temp_dir.path(), StoreOptions::default(), None);
        store.load().unwrap();

        let query = QueryPayload {
            request: QueryRequest {
                status: "skip".into(),
                ..QueryRequest::any()
            },
            step_size: 1,
            ..QueryPayload::default()
        };
        let outcome = store.get_next_page(&query, "", &anna(), false).unwrap();
        assert_eq!(outcome.page().unwrap().id(), "p4");
        assert_eq!(outcome.page().unwrap().index, 4);
    }

    #[test]
    fn test_walk_from_unknown_id_is_message() {
        let temp_dir = TempDir::new().unwrap();
        let store = loaded_store(&temp_dir, 2);
        let outcome = store.get_next_page(&walk("p42", 1), "", &anna(), false).unwrap();
        assert!(outcome.message().unwrap().contains("p42"));
    }

    #[test]
    fn test_invalid_regex_is_error() {
        let temp_dir = TempDir::new().unwrap();
        let store = loaded_store(&temp_dir, 2);
        let mut query = walk("", 1);
        query.request.trans_re = "[".into();
        assert!(matches!(
            store.get_next_page(&query, "", &anna(), false),
            Err(StoreError::InvalidRegex { .. })
        ));
    }

    #[test]
    fn test_request_index_modes() {
        let temp_dir = TempDir::new().unwrap();
        let store = loaded_store(&temp_dir, 3);

        let first = store.get_next_page(&at("first"), "", &anna(), false).unwrap();
        assert_eq!(first.page().unwrap().id(), "p1");
        assert_eq!(first.page().unwrap().index, 1);

        let last = store.get_next_page(&at("last"), "", &anna(), false).unwrap();
        assert_eq!(last.page().unwrap().id(), "p3");

        let middle = store.get_next_page(&at("1"), "", &anna(), true).unwrap();
        assert_eq!(middle.page().unwrap().id(), "p2");
        assert!(store.is_locked("p2"));

        let already = store.get_next_page(&at("1"), "p2", &anna(), true).unwrap();
        assert_eq!(
            already.message(),
            Some("user is already at the requested page")
        );

        let taken = store.get_next_page(&at("1"), "", &bert(), true).unwrap();
        assert!(taken.message().unwrap().contains("already locked"));

        assert!(matches!(
            store.get_next_page(&at("3"), "", &anna(), false),
            Err(StoreError::InvalidRequestIndex { .. })
        ));
        assert!(matches!(
            store.get_next_page(&at("middle"), "", &anna(), false),
            Err(StoreError::InvalidRequestIndex { .. })
        ));
    }

    #[test]
    fn test_first_on_empty_store_is_error() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir_all(temp_dir.path().join("source")).unwrap();
        let store = ProjectStore::new(temp_dir.path(), StoreOptions::default(), None);
        store.load().unwrap();

        for index in ["first", "last", "0"] {
            assert!(matches!(
                store.get_next_page(&at(index), "", &anna(), false),
                Err(StoreError::InvalidRequestIndex { pages: 0, .. })
            ));
        }
    }

    #[test]
    fn test_next_page_requires_client_identity() {
        let temp_dir = TempDir::new().unwrap();
        let store = loaded_store(&temp_dir, 1);
        assert!(matches!(
            store.get_next_page(&walk("", 1), "", &ClientId::new("", "anna"), false),
            Err(StoreError::EmptyClientId(_))
        ));
        assert!(matches!(
            store.get_next_page(&walk("", 1), "", &ClientId::new("c", " "), false),
            Err(StoreError::EmptyUserName(_))
        ));
    }

    #[test]
    fn test_concurrent_walks_lock_distinct_pages() {
        let temp_dir = TempDir::new().unwrap();
        let store = loaded_store(&temp_dir, 8);
        let pages_won = AtomicUsize::new(0);

        std::thread::scope(|s| {
            for i in 0..8 {
                let store = &store;
                let pages_won = &pages_won;
                s.spawn(move || {
                    let client = ClientId::new(format!("conn-{}", i), format!("user-{}", i));
                    let outcome = store.get_next_page(&walk("", 1), "", &client, true).unwrap();
                    if outcome.page().is_some() {
                        pages_won.fetch_add(1, Ordering::SeqCst);
                    }
                });
            }
        });

        // Every returned page is locked, and no page has two holders
        let won = pages_won.load(Ordering::SeqCst);
        assert_eq!(store.stats().pages_locked, won);
        assert!(won >= 1);
    }

    #[test]
    fn test_validator_predicate() {
        struct Flagger;
        impl Validator for Flagger {
            fn validate_annotation(&self, annotation: &Annotation) -> Vec<Issue> {
                if annotation.id() == "p2" {
                    vec![Issue::new("rule", "error", "flagged")]
                } else {
                    Vec::new()
                }
            }
            fn identical_transcriptions(&self, _annotation: &Annotation) -> Vec<Issue> {
                Vec::new()
            }
        }

        let temp_dir = TempDir::new().unwrap();
        write_project(temp_dir.path(), &pages(3), &[&["ok"], &["ok"], &["ok"]]);
        let store = ProjectStore::new(
            temp_dir.path(),
            StoreOptions::default(),
            Some(Arc::new(Flagger)),
        );
        store.load().unwrap();

        let mut query = walk("", 1);
        query.request.validation_issue.has_issue = true;
        let outcome = store.get_next_page(&query, "", &anna(), false).unwrap();
        assert_eq!(outcome.page().unwrap().id(), "p2");
    }

    #[test]
    fn test_save_normalizes_and_persists() {
        let temp_dir = TempDir::new().unwrap();
        let store = loaded_store(&temp_dir, 2);

        let mut anno = store.annotation("p1").unwrap();
        anno.index = 1;
        anno.comment = "checked twice".into();
        anno.chunks[0].text = "  hej\u{00A0}då  ".into();
        anno.chunks[0].set_status(StatusTag::new(" ok ", " anna "));
        store.save(anno.clone()).unwrap();

        let in_memory = store.annotation("p1").unwrap();
        assert_eq!(in_memory.chunks[0].text, "hej då");
        assert_eq!(in_memory.chunks[0].current_status.name, "ok");
        assert_eq!(in_memory.chunks[0].current_status.source, "anna");
        assert_eq!(in_memory.index, 0);

        let on_disk = fs::read_to_string(temp_dir.path().join("annotation").join("p1.json")).unwrap();
        assert!(on_disk.contains("\"trans\": \"hej då\""));
        assert!(!on_disk.contains("\"index\""));

        // Reload yields the saved record
        let reloaded = ProjectStore::new(temp_dir.path(), StoreOptions::default(), None);
        reloaded.load().unwrap();
        assert_eq!(reloaded.annotation("p1").unwrap(), in_memory);
    }

    #[test]
    fn test_save_rejects_empty_page_id() {
        let temp_dir = TempDir::new().unwrap();
        let store = loaded_store(&temp_dir, 1);
        let anno = Annotation::for_page(PageSpan::new("  ", "a.wav", 0, 10));
        assert!(matches!(store.save(anno), Err(StoreError::EmptyPageId)));
    }

    #[test]
    fn test_save_write_failure_keeps_memory_update() {
        let temp_dir = TempDir::new().unwrap();
        let store = loaded_store(&temp_dir, 1);
        let annotation_dir = temp_dir.path().join("annotation");
        fs::remove_dir_all(&annotation_dir).unwrap();

        let mut anno = store.annotation("p1").unwrap();
        anno.comment = "lost on disk".into();
        assert!(store.save(anno).is_err());
        assert_eq!(store.annotation("p1").unwrap().comment, "lost on disk");
    }

    #[test]
    fn test_stats() {
        let temp_dir = TempDir::new().unwrap();
        write_project(
            temp_dir.path(),
            &pages(4),
            &[&["ok", "ok"], &["unchecked", "ok"], &["skip", "ok"], &["ok2"]],
        );
        let store = ProjectStore::new(temp_dir.path(), StoreOptions::default(), None);
        store.load().unwrap();

        let mut p4 = store.annotation("p4").unwrap();
        p4.current_status = StatusTag::new("delete", "bert");
        store.save(p4).unwrap();
        store.lock("p1", &anna()).unwrap();
        store.lock("p2", &anna()).unwrap();
        store.lock("p3", &bert()).unwrap();

        let stats = store.stats();
        assert_eq!(stats.pages_tot, 4);
        // p1 ok, p4 delete
        assert_eq!(stats.pages_done, 2);
        assert_eq!(stats.pages_skip, 1);
        assert_eq!(stats.pages_delete, 1);
        assert_eq!(stats.pages_locked, 3);
        assert_eq!(stats.pages_locked_by, vec!["anna: 2", "bert: 1"]);
        assert_eq!(stats.done_by_editor.get("anna"), Some(&2));
    }

    #[test]
    fn test_audio_stats() {
        let temp_dir = TempDir::new().unwrap();
        let pages = vec![
            PageSpan::new("p1", "a.wav", 0, 900),
            PageSpan::new("p2", "b.wav", 1000, 1900),
        ];
        write_project(temp_dir.path(), &pages, &[&["ok", "unchecked"], &["ok"]]);
        let store = ProjectStore::new(temp_dir.path(), StoreOptions::default(), None);
        store.load().unwrap();
        store.lock("p2", &bert()).unwrap();

        let stats = store.audio_stats();
        assert_eq!(stats.pages["a"]["unchecked"], 1);
        assert_eq!(stats.pages["b"]["status:ok"], 1);
        assert_eq!(stats.pages["b"]["locked by:bert"], 1);
        assert_eq!(stats.pages["all"]["total"], 2);
        assert_eq!(stats.pages["all"]["source:anna"], 2);
        assert_eq!(stats.chunks["a"]["total"], 2);
        assert_eq!(stats.chunks["all"]["checked"], 2);
        assert_eq!(stats.chunks["all"]["status:ok"], 2);
        assert_eq!(stats.chunks["all"]["unchecked"], 1);
    }

    #[test]
    fn test_search() {
        let temp_dir = TempDir::new().unwrap();
        write_project(
            temp_dir.path(),
            &pages(2),
            &[&["ok", "skip", "unchecked"], &["unchecked", "unchecked"]],
        );
        let store = ProjectStore::new(temp_dir.path(), StoreOptions::default(), None);
        store.load().unwrap();

        assert!(store.search(&SearchQuery::default()).is_empty());

        let hits = store.search(&SearchQuery {
            statuses: vec!["ok".into(), "skip".into()],
            trans_re: None,
        });
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].page.id(), "p1");
        assert_eq!(hits[0].matching_chunks, vec![0, 1]);

        let all_unchecked = store.search(&SearchQuery {
            statuses: vec!["unchecked".into()],
            trans_re: None,
        });
        assert_eq!(all_unchecked.len(), 2);
        assert_eq!(all_unchecked[1].matching_chunks, vec![0, 1]);
    }

    #[test]
    fn test_audio_lookup() {
        let temp_dir = TempDir::new().unwrap();
        let pages = vec![
            PageSpan::new("p1", "a.wav", 0, 900),
            PageSpan::new("p2", "a.wav", 1000, 1900),
            PageSpan::new("p3", "b.mp3", 2000, 2900),
        ];
        write_project(temp_dir.path(), &pages, &[&["ok"], &["ok"], &["ok"]]);
        let store = ProjectStore::new(temp_dir.path(), StoreOptions::default(), None);
        store.load().unwrap();

        assert_eq!(store.list_audio_files(), vec!["a", "b"]);
        assert_eq!(
            store.build_audio_path("a.wav").unwrap(),
            temp_dir.path().join("source").join("a.wav")
        );
        assert!(matches!(
            store.build_audio_path(""),
            Err(StoreError::EmptyAudioPath)
        ));
        assert_eq!(store.status_sources().into_iter().collect::<Vec<_>>(), vec!["anna"]);
    }
}
