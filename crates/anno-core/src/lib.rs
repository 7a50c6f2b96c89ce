//! Anno Core Library
//!
//! This crate provides the page store behind anno, a concurrent
//! annotation tool for transcribed audio. Audio is split into pages;
//! editors walk the pages, lock the one they work on, and save their
//! annotation of it.
//!
//! # Architecture
//!
//! - **ProjectStore**: one sub-project's pages, annotations and locks
//! - **Project**: registry of sub-projects, routing every operation by name
//!
//! All reads are served from memory. Annotations are written through to
//! `annotation/<page id>.json` on save.
//!
//! # Quick Start
//!
//! ```text
//! let project = Project::new("data/batch1:data/batch2", StoreOptions::default(), None)?;
//! for diagnostic in project.load_data() {
//!     eprintln!("{}", diagnostic);
//! }
//!
//! let client = ClientId::new("conn-1", "anna");
//! if let NextPage::Page(page) = project.get_next_page("data/batch1", &query, "", &client, true)? {
//!     // edit the page, then
//!     project.save(page)?;
//! }
//! ```
//!
//! # Modules
//!
//! - `project`: Sub-project registry (main entry point)
//! - `store`: Per sub-project store, traversal and statistics
//! - `models`: Pages, chunks, status tags and annotations
//! - `query`: Next-page and search queries
//! - `locks`: Page lock table
//! - `storage`: On-disk layout, errors and record migrations
//! - `diagnostics`: Load diagnostics
//! - `validation`: External validator interface
//! - `config`: Application configuration

pub mod config;
pub mod diagnostics;
pub mod locks;
pub mod models;
pub mod project;
pub mod query;
pub mod storage;
pub mod store;
pub mod validation;

pub use config::Config;
pub use diagnostics::{has_errors, Diagnostic, DiagnosticKind, Level};
pub use models::{Annotation, ClientId, PageSpan, StatusTag, TranscriptionChunk};
pub use project::Project;
pub use query::{MatchingPage, QueryPayload, QueryRequest, SearchQuery};
pub use storage::{StoreError, StoreResult};
pub use store::{AudioStats, NextPage, ProjectStore, StoreOptions, SubProjectStats};
pub use validation::{Issue, Validator};
