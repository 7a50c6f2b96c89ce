//! Validator interface
//!
//! Transcription rules live outside this crate. The store only needs to
//! know whether an annotation has issues, for the "has validation issue"
//! query predicate.

use serde::{Deserialize, Serialize};

use crate::models::Annotation;

/// A problem reported by a validator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub rule_name: String,
    pub level: String,
    pub message: String,
    /// Chunk the issue refers to, or -1 for the whole page
    pub chunk_index: i64,
}

impl Issue {
    pub fn new(
        rule_name: impl Into<String>,
        level: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            rule_name: rule_name.into(),
            level: level.into(),
            message: message.into(),
            chunk_index: -1,
        }
    }
}

/// Externally supplied annotation validator
pub trait Validator: Send + Sync {
    /// Rule-based issues for the annotation
    fn validate_annotation(&self, annotation: &Annotation) -> Vec<Issue>;

    /// Issues for repeated identical transcriptions within the page
    fn identical_transcriptions(&self, annotation: &Annotation) -> Vec<Issue>;
}
