//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use std::collections::BTreeMap;

use serde::Serialize;

use anno_core::store::{StatsPerAudio, ALL_AUDIO};
use anno_core::{Annotation, AudioStats, Diagnostic, MatchingPage, SubProjectStats};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Check if output is in quiet mode
    pub fn is_quiet(&self) -> bool {
        matches!(self.format, OutputFormat::Quiet)
    }

    fn print_json<T: Serialize + ?Sized>(&self, value: &T) {
        match serde_json::to_string_pretty(value) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("Failed to encode JSON: {}", e),
        }
    }

    /// Print load diagnostics
    pub fn print_diagnostics(&self, diagnostics: &[Diagnostic]) {
        match self.format {
            OutputFormat::Human => {
                for diagnostic in diagnostics {
                    println!("{}", diagnostic);
                }
                let errors = diagnostics.iter().filter(|d| d.is_error()).count();
                println!(
                    "\n{} error(s), {} warning(s)",
                    errors,
                    diagnostics.len() - errors
                );
            }
            OutputFormat::Json => self.print_json(diagnostics),
            OutputFormat::Quiet => {
                for diagnostic in diagnostics.iter().filter(|d| d.is_error()) {
                    println!("{}", diagnostic.message);
                }
            }
        }
    }

    /// Print page statistics per sub-project
    pub fn print_stats(&self, stats: &BTreeMap<String, SubProjectStats>) {
        match self.format {
            OutputFormat::Human => {
                for (name, s) in stats {
                    println!("{}", name);
                    println!("  Pages:   {}", s.pages_tot);
                    println!("  Done:    {} ({})", s.pages_done, percent(s.pages_done, s.pages_tot));
                    println!("  Skipped: {}", s.pages_skip);
                    println!("  Deleted: {}", s.pages_delete);
                    println!("  Locked:  {}", s.pages_locked);
                    for entry in &s.pages_locked_by {
                        println!("    {}", entry);
                    }
                    if !s.done_by_editor.is_empty() {
                        println!("  Done by editor:");
                        for (editor, n) in &s.done_by_editor {
                            println!("    {}: {}", editor, n);
                        }
                    }
                }
            }
            OutputFormat::Json => self.print_json(stats),
            OutputFormat::Quiet => {
                for (name, s) in stats {
                    println!("{}\t{}\t{}", name, s.pages_done, s.pages_tot);
                }
            }
        }
    }

    /// Print page and chunk counters per audio file
    pub fn print_audio_stats(&self, stats: &AudioStats) {
        match self.format {
            OutputFormat::Human => {
                println!("── Pages ──");
                print_counter_table(&stats.pages);
                println!();
                println!("── Chunks ──");
                print_counter_table(&stats.chunks);
            }
            OutputFormat::Json => self.print_json(stats),
            OutputFormat::Quiet => {
                if let Some(all) = stats.pages.get(ALL_AUDIO) {
                    println!("{}", all.get("total").copied().unwrap_or(0));
                }
            }
        }
    }

    /// Print a plain list of names
    pub fn print_names(&self, names: &[String], what: &str) {
        match self.format {
            OutputFormat::Human => {
                if names.is_empty() {
                    println!("No {} found.", what);
                    return;
                }
                for name in names {
                    println!("{}", name);
                }
                println!("\n{} {}", names.len(), what);
            }
            OutputFormat::Json => self.print_json(names),
            OutputFormat::Quiet => {
                for name in names {
                    println!("{}", name);
                }
            }
        }
    }

    /// Print a page returned by traversal
    pub fn print_page(&self, page: &Annotation) {
        match self.format {
            OutputFormat::Human => {
                println!("Page:    {} ({} in sub project)", page.id(), ordinal(page.index));
                println!("Audio:   {} [{}-{} ms]", page.page.audio, page.page.start, page.page.end);
                println!("Status:  {} (derived: {})", page.current_status.name, page.derived_status());
                if !page.comment.is_empty() {
                    println!("Comment: {}", page.comment);
                }
                if !page.chunks.is_empty() {
                    println!();
                    for chunk in &page.chunks {
                        println!("{}", chunk_line(chunk));
                    }
                }
            }
            OutputFormat::Json => self.print_json(page),
            OutputFormat::Quiet => println!("{}", page.id()),
        }
    }

    /// Print search hits
    pub fn print_matches(&self, matches: &[MatchingPage]) {
        match self.format {
            OutputFormat::Human => {
                if matches.is_empty() {
                    println!("No matching chunks found.");
                    return;
                }
                let mut chunks = 0;
                for hit in matches {
                    println!("{} ({})", hit.page.id(), hit.page.page.audio);
                    for &i in &hit.matching_chunks {
                        if let Some(chunk) = hit.page.chunks.get(i) {
                            println!("  {}", chunk_line(chunk));
                            chunks += 1;
                        }
                    }
                }
                println!("\n{} chunk(s) in {} page(s)", chunks, matches.len());
            }
            OutputFormat::Json => self.print_json(matches),
            OutputFormat::Quiet => {
                for hit in matches {
                    println!("{}", hit.page.id());
                }
            }
        }
    }

    /// Print an informational message
    pub fn message(&self, msg: &str) {
        match self.format {
            OutputFormat::Human => println!("{}", msg),
            OutputFormat::Json => {
                println!("{}", serde_json::json!({"message": msg}));
            }
            OutputFormat::Quiet => {}
        }
    }
}

fn print_counter_table(stats: &StatsPerAudio) {
    for (audio, counters) in stats {
        println!("{}", audio);
        for (key, n) in counters {
            println!("  {:<24} {}", key, n);
        }
    }
}

/// Share of `part` in `total`, as a whole percentage
fn percent(part: usize, total: usize) -> String {
    if total == 0 {
        return "0%".to_string();
    }
    format!("{}%", part * 100 / total)
}

fn ordinal(index: i64) -> String {
    let suffix = match (index % 10, index % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{}{}", index, suffix)
}

fn chunk_line(chunk: &anno_core::TranscriptionChunk) -> String {
    format!(
        "[{:>6}-{:<6}] {:<10} {}",
        chunk.start,
        chunk.end,
        chunk.current_status.name,
        truncate_line(&chunk.text, 60)
    )
}

/// Truncate a string to max characters, adding "..." if truncated
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len - 3).collect();
        format!("{}...", kept)
    }
}

/// Truncate to first line and max length
fn truncate_line(s: &str, max_len: usize) -> String {
    let first_line = s.lines().next().unwrap_or("");
    truncate(first_line, max_len)
}
