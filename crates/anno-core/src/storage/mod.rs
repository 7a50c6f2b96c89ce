//! Storage layer
//!
//! Handles the on-disk layout of a sub-project and the migrations
//! applied to records as they are read.
//!
//! ## Layout
//!
//! - **source/**: page lists (JSON arrays) and audio files
//! - **annotation/**: one pretty-printed JSON annotation per page

pub mod error;
pub mod migration;
pub mod persistence;

pub use error::{StoreError, StoreResult};
pub use migration::{migrate, FORMAT_VERSION};
pub use persistence::ProjectFiles;
