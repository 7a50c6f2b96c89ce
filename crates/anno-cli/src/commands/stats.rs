//! Stats command handlers

use anyhow::{Context, Result};

use anno_core::Project;

use crate::output::Output;

/// Page progress for every sub-project
pub fn show(project: &Project, output: &Output) -> Result<()> {
    output.print_stats(&project.stats());
    Ok(())
}

/// Page and chunk counters per audio file of one sub-project
pub fn audio(project: &Project, sub_project: &str, output: &Output) -> Result<()> {
    let stats = project
        .audio_stats(sub_project)
        .with_context(|| format!("Failed to compute audio stats for '{}'", sub_project))?;
    output.print_audio_stats(&stats);
    Ok(())
}
