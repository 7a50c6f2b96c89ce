//! Sub-project file persistence
//!
//! A sub-project is a directory with two subdirectories:
//!
//! - `source/` - JSON arrays of pages, plus the audio files they refer to
//! - `annotation/` - one JSON annotation per page, named `<page id>.json`
//!
//! Annotation files are written atomically (write to temp file, then
//! rename) so a crash never leaves a partially written annotation.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::ser::{Formatter, PrettyFormatter};
use tracing::info;

use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::models::Annotation;
use crate::storage::error::{StoreError, StoreResult};

const SOURCE_DIR: &str = "source";
const ANNOTATION_DIR: &str = "annotation";
const JSON_EXTENSION: &str = "json";

/// File layout of one sub-project
#[derive(Debug, Clone)]
pub struct ProjectFiles {
    project_dir: PathBuf,
    source_dir: PathBuf,
    annotation_dir: PathBuf,
}

impl ProjectFiles {
    pub fn new(project_dir: impl Into<PathBuf>) -> Self {
        let project_dir = project_dir.into();
        Self {
            source_dir: project_dir.join(SOURCE_DIR),
            annotation_dir: project_dir.join(ANNOTATION_DIR),
            project_dir,
        }
    }

    /// Check that the project and `source/` directories exist
    pub fn check_layout(&self) -> StoreResult<()> {
        require_dir(&self.project_dir)?;
        require_dir(&self.source_dir)
    }

    /// Check the directory layout, creating `annotation/` if missing
    pub fn ensure_layout(&self) -> StoreResult<()> {
        self.check_layout()?;

        if !self.annotation_dir.exists() {
            fs::create_dir(&self.annotation_dir).map_err(|source| {
                StoreError::CreateDirectory {
                    path: self.annotation_dir.clone(),
                    source,
                }
            })?;
            info!("Created annotation dir {:?}", self.annotation_dir);
        } else if !self.annotation_dir.is_dir() {
            return Err(StoreError::NotADirectory {
                path: self.annotation_dir.clone(),
            });
        }
        Ok(())
    }

    /// Page list files, sorted by name
    pub fn source_files(&self) -> Vec<PathBuf> {
        list_json_files(&self.source_dir)
    }

    /// Annotation files, sorted by name
    pub fn annotation_files(&self) -> Vec<PathBuf> {
        list_json_files(&self.annotation_dir)
    }

    /// Canonical location of a page's annotation
    pub fn annotation_path(&self, page_id: &str) -> PathBuf {
        self.annotation_dir
            .join(format!("{}.{}", page_id, JSON_EXTENSION))
    }

    /// Location of an audio file referenced by a page
    pub fn audio_path(&self, audio: &str) -> PathBuf {
        self.source_dir.join(audio)
    }

    /// Write an annotation to its canonical path, replacing any previous file
    ///
    /// The derived `index` field is never written.
    pub fn write_annotation(&self, annotation: &Annotation) -> StoreResult<PathBuf> {
        let path = self.annotation_path(annotation.id());
        let bytes = to_pretty_json(&annotation.to_persisted()).map_err(|source| {
            StoreError::Serialize {
                path: path.clone(),
                source,
            }
        })?;
        atomic_write(&path, &bytes)?;
        Ok(path)
    }
}

fn require_dir(path: &Path) -> StoreResult<()> {
    if !path.exists() {
        return Err(StoreError::MissingDirectory {
            path: path.to_path_buf(),
        });
    }
    if !path.is_dir() {
        return Err(StoreError::NotADirectory {
            path: path.to_path_buf(),
        });
    }
    Ok(())
}

/// List `*.json` files directly in `dir`, sorted by path
///
/// An unreadable directory yields an empty list.
pub fn list_json_files(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| path.extension().is_some_and(|ext| ext == JSON_EXTENSION))
        .collect();
    files.sort();
    files
}

/// Read and decode one JSON file, reporting failure as a diagnostic
pub fn read_json<T: DeserializeOwned>(path: &Path, what: &str) -> Result<T, Diagnostic> {
    let bytes = fs::read(path).map_err(|e| {
        Diagnostic::error(
            DiagnosticKind::ReadFailed,
            format!("couldn't read {} file {} : {}", what, path.display(), e),
        )
    })?;
    serde_json::from_slice(&bytes).map_err(|e| {
        Diagnostic::error(
            DiagnosticKind::ParseFailed,
            format!("couldn't unmarshal {} file {} : {}", what, path.display(), e),
        )
    })
}

/// Pretty formatter that also writes `<`, `>`, `&`, U+2028 and U+2029
/// as `\uXXXX` escapes
struct EscapingFormatter<'a> {
    pretty: PrettyFormatter<'a>,
}

impl Formatter for EscapingFormatter<'_> {
    fn begin_array<W: ?Sized + Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.pretty.begin_array(writer)
    }

    fn end_array<W: ?Sized + Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.pretty.end_array(writer)
    }

    fn begin_array_value<W: ?Sized + Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        self.pretty.begin_array_value(writer, first)
    }

    fn end_array_value<W: ?Sized + Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.pretty.end_array_value(writer)
    }

    fn begin_object<W: ?Sized + Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.pretty.begin_object(writer)
    }

    fn end_object<W: ?Sized + Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.pretty.end_object(writer)
    }

    fn begin_object_key<W: ?Sized + Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        self.pretty.begin_object_key(writer, first)
    }

    fn begin_object_value<W: ?Sized + Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.pretty.begin_object_value(writer)
    }

    fn end_object_value<W: ?Sized + Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.pretty.end_object_value(writer)
    }

    fn write_string_fragment<W: ?Sized + Write>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()> {
        let mut start = 0;
        for (i, c) in fragment.char_indices() {
            let escaped = match c {
                '<' => "\\u003c",
                '>' => "\\u003e",
                '&' => "\\u0026",
                '\u{2028}' => "\\u2028",
                '\u{2029}' => "\\u2029",
                _ => continue,
            };
            writer.write_all(fragment[start..i].as_bytes())?;
            writer.write_all(escaped.as_bytes())?;
            start = i + c.len_utf8();
        }
        writer.write_all(fragment[start..].as_bytes())
    }
}

/// Encode as JSON with a one-space indent, and a one-space prefix on
/// every line after the first
pub fn to_pretty_json<T: Serialize>(value: &T) -> serde_json::Result<Vec<u8>> {
    let mut out = Vec::new();
    let formatter = EscapingFormatter {
        pretty: PrettyFormatter::with_indent(b" "),
    };
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
    value.serialize(&mut serializer)?;

    // Raw newlines only occur between tokens; string newlines are escaped.
    let mut prefixed = Vec::with_capacity(out.len() + out.len() / 8);
    for byte in out {
        prefixed.push(byte);
        if byte == b'\n' {
            prefixed.push(b' ');
        }
    }
    Ok(prefixed)
}

/// Write data to a file atomically
///
/// 1. Write to a temporary file in the same directory
/// 2. Sync the file to disk
/// 3. Rename the temp file to the target path
///
/// This ensures the target file is never left in a partially-written state.
fn atomic_write(path: &Path, data: &[u8]) -> StoreResult<()> {
    let temp_path = path.with_extension("tmp");

    let mut file =
        File::create(&temp_path).map_err(|e| StoreError::from_io(e, temp_path.clone()))?;

    file.write_all(data)
        .map_err(|e| StoreError::from_io(e, temp_path.clone()))?;

    file.sync_all()
        .map_err(|e| StoreError::from_io(e, temp_path.clone()))?;

    fs::rename(&temp_path, path).map_err(|e| StoreError::from_io(e, path.to_path_buf()))?;

    Ok(())
}
