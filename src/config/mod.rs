mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::collections::HashSet;
use std::path::Path;

/// Problems found while validating a project.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("project defines no settings")]
    NoSettings,

    #[error("project lists no files")]
    NoFiles,

    #[error("setting #{0} has an empty name")]
    EmptySettingName(usize),

    #[error("setting '{0}' is defined more than once")]
    DuplicateSetting(String),

    #[error("file '{file}' selects unknown setting '{setting}'")]
    UnknownSelection { file: String, setting: String },

    #[error("two conversions would write the same output file: {0}")]
    OutputCollision(String),

    #[error("invalid engine setting: {0}")]
    Engine(String),
}

/// Load and validate a project from a TOML file.
///
/// Relative paths in the project are resolved against the file's directory.
pub fn load_project(path: &Path) -> Result<Project> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read project file: {:?}", path))?;

    let base_dir = path.parent().unwrap_or_else(|| Path::new(""));
    parse_project(&content, base_dir)
        .with_context(|| format!("Invalid project file: {:?}", path))
}

/// Parse and validate a project from TOML text.
pub fn parse_project(content: &str, base_dir: &Path) -> Result<Project> {
    let mut project: Project = toml::from_str(content).context("Failed to parse project")?;
    project.base_dir = base_dir.to_path_buf();

    validate_project(&project)?;

    for file in &project.files {
        let path = project.resolve(&file.path);
        if !path.exists() {
            tracing::warn!("Input file does not exist: {:?}", path);
        }
    }

    Ok(project)
}

/// Validate a project
pub fn validate_project(project: &Project) -> std::result::Result<(), ConfigError> {
    if project.engine.max_parallel_jobs == 0 {
        return Err(ConfigError::Engine("max_parallel_jobs must be at least 1".into()));
    }
    if project.engine.progress_batch == 0 {
        return Err(ConfigError::Engine("progress_batch must be at least 1".into()));
    }

    if project.settings.is_empty() {
        return Err(ConfigError::NoSettings);
    }
    if project.files.is_empty() {
        return Err(ConfigError::NoFiles);
    }

    let mut names = HashSet::new();
    for (index, setting) in project.settings.iter().enumerate() {
        if setting.name.trim().is_empty() {
            return Err(ConfigError::EmptySettingName(index));
        }
        if !names.insert(setting.name.as_str()) {
            return Err(ConfigError::DuplicateSetting(setting.name.clone()));
        }
    }

    for file in &project.files {
        for name in file.select.iter().flatten() {
            if !names.contains(name.as_str()) {
                return Err(ConfigError::UnknownSelection {
                    file: file.path.display().to_string(),
                    setting: name.clone(),
                });
            }
        }
    }

    let mut outputs = HashSet::new();
    for cell in project.cells() {
        if let Some(output) = project.output_path(cell) {
            if !outputs.insert(output.clone()) {
                return Err(ConfigError::OutputCollision(output.display().to_string()));
            }
        }
    }

    Ok(())
}
