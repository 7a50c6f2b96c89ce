//! Check command handler

use anyhow::{bail, Result};

use anno_core::{has_errors, Diagnostic, Project};

use crate::output::Output;

/// Report load diagnostics; fails if any of them is an error
pub fn run(project: &Project, diagnostics: &[Diagnostic], output: &Output) -> Result<()> {
    output.print_diagnostics(diagnostics);

    if has_errors(diagnostics) {
        let errors = diagnostics.iter().filter(|d| d.is_error()).count();
        bail!("{} error(s) found while loading", errors);
    }

    if !output.is_quiet() {
        let pages: usize = project
            .list_sub_projects()
            .iter()
            .filter_map(|sub| project.page_count(sub).ok())
            .sum();
        output.message(&format!(
            "✓ {} sub project(s), {} page(s) loaded",
            project.list_sub_projects().len(),
            pages
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::OutputFormat;
    use anno_core::{PageSpan, StoreOptions};
    use std::fs;
    use tempfile::TempDir;

    fn sub_project(temp_dir: &TempDir, with_annotation: bool) -> String {
        let dir = temp_dir.path().join("batch");
        fs::create_dir_all(dir.join("source")).unwrap();
        fs::create_dir_all(dir.join("annotation")).unwrap();
        let page = PageSpan::new("p1", "a.wav", 0, 1000);
        fs::write(
            dir.join("source").join("pages.json"),
            serde_json::to_vec(&vec![page.clone()]).unwrap(),
        )
        .unwrap();
        if with_annotation {
            fs::write(
                dir.join("annotation").join("p1.json"),
                serde_json::to_vec(&anno_core::Annotation::for_page(page)).unwrap(),
            )
            .unwrap();
        }
        dir.to_string_lossy().to_string()
    }

    fn check(dirs: &str) -> Result<()> {
        let project = Project::new(dirs, StoreOptions { verify_audio: false }, None).unwrap();
        let diagnostics = project.load_data();
        run(&project, &diagnostics, &Output::new(OutputFormat::Quiet))
    }

    #[test]
    fn test_check_clean_project() {
        let temp_dir = TempDir::new().unwrap();
        assert!(check(&sub_project(&temp_dir, true)).is_ok());
    }

    #[test]
    fn test_check_fails_on_error_diagnostics() {
        let temp_dir = TempDir::new().unwrap();
        let err = check(&sub_project(&temp_dir, false)).unwrap_err();
        assert!(err.to_string().contains("error(s) found while loading"));
    }
}
