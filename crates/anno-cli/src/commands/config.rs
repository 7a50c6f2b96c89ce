//! Config command handlers

use std::path::PathBuf;

use anyhow::Result;

use anno_core::Config;

use crate::output::{Output, OutputFormat};

/// Show the effective configuration
pub fn show(config: &Config, config_path: Option<&PathBuf>, output: &Output) -> Result<()> {
    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "project_dirs": config.project_dirs,
                    "sub_projects": config.sub_projects(),
                    "verify_audio": config.verify_audio,
                    "log_level": config.log_level
                })
            );
        }
        OutputFormat::Quiet => {
            for dir in config.sub_projects() {
                println!("{}", dir);
            }
        }
        OutputFormat::Human => {
            let effective_path = config_path
                .cloned()
                .unwrap_or_else(Config::config_file_path);
            println!("Configuration:");
            println!("  verify_audio: {}", config.verify_audio);
            println!("  log_level:    {}", config.log_level);
            println!("  project_dirs:");
            let dirs = config.sub_projects();
            if dirs.is_empty() {
                println!("    (not set)");
            }
            for dir in dirs {
                println!("    {}", dir);
            }
            println!();
            println!("Config file: {}", effective_path.display());
        }
    }

    Ok(())
}
