//! Page queries
//!
//! `QueryPayload` is the request as clients send it: loosely typed
//! strings where `"any"` (or an empty string) is a wildcard. Before a
//! scan it is compiled into a `PageQuery`, with one optional matcher per
//! dimension and the transcription regex compiled once.

use std::collections::HashSet;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::models::{null_as_default, status, Annotation, TranscriptionChunk};
use crate::storage::{StoreError, StoreResult};
use crate::validation::Validator;

fn is_zero(n: &i64) -> bool {
    *n == 0
}

/// Next-page request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryPayload {
    pub request: QueryRequest,
    /// Signed hop count: direction and number of matching pages to move
    pub step_size: i64,
    /// `first`, `last` or a 0-based position; overrides the walk
    pub request_index: String,
    /// Page to walk from; empty starts from the beginning
    pub curr_id: String,
    #[serde(skip_serializing_if = "is_zero")]
    pub context: i64,
}

/// Page filter, as sent by clients
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryRequest {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub page_status: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub status: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub audio_file: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub source: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub trans_re: String,
    pub validation_issue: ValidationIssueFilter,
}

impl QueryRequest {
    /// A request matching every page
    pub fn any() -> Self {
        Self {
            page_status: status::ANY.to_string(),
            status: status::ANY.to_string(),
            audio_file: status::ANY.to_string(),
            source: status::ANY.to_string(),
            ..Self::default()
        }
    }

    /// Indented JSON rendering, used in "no match" messages
    pub fn pretty(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| format!("{:?}", self))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationIssueFilter {
    pub has_issue: bool,
    /// Only count issues from these rules; empty means any rule
    #[serde(deserialize_with = "null_as_default")]
    pub rule_names: Vec<String>,
}

/// Absolute page position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestIndex {
    First,
    Last,
    At(usize),
}

impl RequestIndex {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "first" => Some(Self::First),
            "last" => Some(Self::Last),
            other => other.parse().ok().map(Self::At),
        }
    }

    /// 0-based position in a list of `len` pages, if in bounds
    pub fn resolve(self, len: usize) -> Option<usize> {
        let index = match self {
            Self::First => 0,
            Self::Last => len.checked_sub(1)?,
            Self::At(i) => i,
        };
        (index < len).then_some(index)
    }
}

#[derive(Debug, Clone)]
enum ChunkStatus {
    /// Neither empty nor unchecked
    Checked,
    Named(String),
}

impl ChunkStatus {
    fn matches(&self, chunk: &TranscriptionChunk) -> bool {
        match self {
            ChunkStatus::Checked => chunk.is_checked(),
            ChunkStatus::Named(name) => chunk.current_status.name == *name,
        }
    }
}

/// Compiled page predicate; every present matcher must hold
#[derive(Debug, Clone, Default)]
pub struct PageQuery {
    page_status: Option<String>,
    chunk_status: Option<ChunkStatus>,
    source: Option<String>,
    audio_prefix: Option<String>,
    trans_re: Option<Regex>,
    /// Rule names to count; empty set means any rule
    issue_rules: Option<HashSet<String>>,
}

fn non_wildcard(value: &str) -> Option<String> {
    if value.is_empty() || value == status::ANY {
        None
    } else {
        Some(value.to_string())
    }
}

impl PageQuery {
    pub fn compile(request: &QueryRequest) -> StoreResult<Self> {
        let trans_re = if request.trans_re.is_empty() {
            None
        } else {
            let re = Regex::new(&request.trans_re).map_err(|source| StoreError::InvalidRegex {
                pattern: request.trans_re.clone(),
                source,
            })?;
            Some(re)
        };

        let chunk_status = non_wildcard(&request.status).map(|s| {
            if s == status::CHECKED {
                ChunkStatus::Checked
            } else {
                ChunkStatus::Named(s)
            }
        });

        let issue_rules = request
            .validation_issue
            .has_issue
            .then(|| request.validation_issue.rule_names.iter().cloned().collect());

        Ok(Self {
            page_status: non_wildcard(&request.page_status),
            chunk_status,
            source: non_wildcard(&request.source),
            audio_prefix: non_wildcard(&request.audio_file),
            trans_re,
            issue_rules,
        })
    }

    /// Evaluate the predicate, cheapest matchers first
    ///
    /// Without a validator the validation-issue matcher is satisfied.
    pub fn matches(&self, annotation: &Annotation, validator: Option<&dyn Validator>) -> bool {
        self.page_status_matches(annotation)
            && self.chunk_status_matches(annotation)
            && self.source_matches(annotation)
            && self.audio_matches(annotation)
            && self.trans_matches(annotation)
            && self.issue_matches(annotation, validator)
    }

    fn page_status_matches(&self, annotation: &Annotation) -> bool {
        match &self.page_status {
            None => true,
            Some(wanted) => {
                let name = &annotation.current_status.name;
                name.is_empty() || name == wanted
            }
        }
    }

    fn chunk_status_matches(&self, annotation: &Annotation) -> bool {
        match &self.chunk_status {
            None => true,
            Some(wanted) => annotation.chunks.iter().any(|c| wanted.matches(c)),
        }
    }

    fn source_matches(&self, annotation: &Annotation) -> bool {
        match &self.source {
            None => true,
            Some(wanted) => annotation
                .chunks
                .iter()
                .any(|c| c.current_status.source == *wanted),
        }
    }

    fn audio_matches(&self, annotation: &Annotation) -> bool {
        match &self.audio_prefix {
            None => true,
            Some(prefix) => annotation.page.audio.starts_with(prefix.as_str()),
        }
    }

    fn trans_matches(&self, annotation: &Annotation) -> bool {
        match &self.trans_re {
            None => true,
            Some(re) => annotation.chunks.iter().any(|c| re.find(&c.text).is_some()),
        }
    }

    fn issue_matches(&self, annotation: &Annotation, validator: Option<&dyn Validator>) -> bool {
        let (Some(rules), Some(validator)) = (&self.issue_rules, validator) else {
            return true;
        };
        let issues = validator.validate_annotation(annotation);
        if rules.is_empty() {
            !issues.is_empty()
        } else {
            issues.iter().any(|i| rules.contains(&i.rule_name))
        }
    }
}

/// Chunk-level search over a whole sub-project
#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    /// Chunk status names to look for
    pub statuses: Vec<String>,
    pub trans_re: Option<Regex>,
}

impl SearchQuery {
    /// Build a search from status names and an optional regex pattern
    pub fn compile(statuses: Vec<String>, trans_re: Option<&str>) -> StoreResult<Self> {
        let trans_re = trans_re
            .filter(|p| !p.is_empty())
            .map(|pattern| {
                Regex::new(pattern).map_err(|source| StoreError::InvalidRegex {
                    pattern: pattern.to_string(),
                    source,
                })
            })
            .transpose()?;
        Ok(Self { statuses, trans_re })
    }

    /// A chunk matches when it satisfies every given criterion;
    /// a query without criteria matches nothing
    pub fn chunk_matches(&self, chunk: &TranscriptionChunk) -> bool {
        let status_hit = self
            .statuses
            .iter()
            .any(|s| *s == chunk.current_status.name);
        let trans_hit = self
            .trans_re
            .as_ref()
            .map(|re| re.is_match(&chunk.text));

        match (self.statuses.is_empty(), trans_hit) {
            (false, Some(trans_hit)) => status_hit && trans_hit,
            (false, None) => status_hit,
            (true, Some(trans_hit)) => trans_hit,
            (true, None) => false,
        }
    }
}

/// A page with the positions of its matching chunks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchingPage {
    pub matching_chunks: Vec<usize>,
    pub page: Annotation,
}
