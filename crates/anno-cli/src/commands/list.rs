//! Listing command handlers

use anyhow::Result;

use anno_core::Project;

use crate::output::Output;

/// Editor names seen in any sub-project
pub fn sources(project: &Project, output: &Output) -> Result<()> {
    output.print_names(&project.status_sources(), "source(s)");
    Ok(())
}

/// Audio files of a sub-project, without extension
pub fn audio_files(project: &Project, sub_project: &str, output: &Output) -> Result<()> {
    let files = project.list_audio_files(sub_project)?;
    output.print_names(&files, "audio file(s)");
    Ok(())
}
