//! Record migrations applied on load
//!
//! Older annotation files carry status values that the current format
//! no longer uses. Each migration is a numbered transform applied once
//! to every loaded annotation, in version order. Migrations only change
//! the in-memory record; the file is rewritten on the next save.

use tracing::debug;

use crate::models::{status, Annotation};

/// Current record format version
pub const FORMAT_VERSION: u32 = 1;

/// A single numbered record transform
pub struct Migration {
    pub version: u32,
    pub description: &'static str,
    /// Returns true if the record was changed
    apply: fn(&mut Annotation) -> bool,
}

/// All migrations, in version order
pub const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    description: "empty or 'in progress' page status becomes 'normal'",
    apply: default_page_status,
}];

fn default_page_status(annotation: &mut Annotation) -> bool {
    let name = annotation.current_status.name.as_str();
    if name.is_empty() || name == status::IN_PROGRESS {
        annotation.current_status.name = status::NORMAL.to_string();
        return true;
    }
    false
}

/// Apply every migration to a loaded record
///
/// Returns the versions of the migrations that changed the record.
pub fn migrate(annotation: &mut Annotation) -> Vec<u32> {
    MIGRATIONS
        .iter()
        .filter_map(|m| {
            if !(m.apply)(annotation) {
                return None;
            }
            debug!("Migrated {} to v{}: {}", annotation.id(), m.version, m.description);
            Some(m.version)
        })
        .collect()
}
