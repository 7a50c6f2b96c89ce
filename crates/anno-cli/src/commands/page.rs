//! Page command handlers

use anyhow::{Context, Result};

use anno_core::{ClientId, NextPage, Project, QueryPayload, SearchQuery};

use crate::output::Output;

/// Identity used for read-only requests from the command line
fn cli_client() -> ClientId {
    let user = std::env::var("USER")
        .ok()
        .filter(|u| !u.trim().is_empty())
        .unwrap_or_else(|| "anno".to_string());
    ClientId::new(format!("cli-{}", std::process::id()), user)
}

/// Show the page a next-page request would return, without locking it
pub fn next(project: &Project, sub_project: &str, query: QueryPayload, output: &Output) -> Result<()> {
    let outcome = project
        .get_next_page(sub_project, &query, "", &cli_client(), false)
        .context("Next page request failed")?;

    match outcome {
        NextPage::Page(page) => output.print_page(&page),
        NextPage::Message(msg) => output.message(&msg),
    }
    Ok(())
}

/// Chunks matching a status set and/or a transcription regex
pub fn search(
    project: &Project,
    sub_project: &str,
    statuses: Vec<String>,
    trans: Option<String>,
    output: &Output,
) -> Result<()> {
    let query = SearchQuery::compile(statuses, trans.as_deref())?;
    let matches = project.search(sub_project, &query)?;
    output.print_matches(&matches);
    Ok(())
}
