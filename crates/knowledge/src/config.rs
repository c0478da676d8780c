//! Knowledge base configuration and on-disk layout.
//!
//! Every base lives in `.prosearch/knowledge/<base>/` with `config.yaml`,
//! `index.sqlite` and `sources.jsonl`.

use crate::types::KnowledgeBaseConfig;
use prosearch_core::{AppError, AppResult};
use std::fs;
use std::path::{Path, PathBuf};

/// Load a base's persisted configuration, if it has one.
pub fn load_config(workspace: &Path, base_name: &str) -> AppResult<Option<KnowledgeBaseConfig>> {
    let config_path = get_config_path(workspace, base_name);

    if !config_path.exists() {
        tracing::debug!("No config file for knowledge base '{}'", base_name);
        return Ok(None);
    }

    let content = fs::read_to_string(&config_path).map_err(|e| {
        AppError::Knowledge(format!("Failed to read config at {:?}: {}", config_path, e))
    })?;

    let mut config: KnowledgeBaseConfig = serde_yaml::from_str(&content).map_err(|e| {
        AppError::Knowledge(format!("Failed to parse config at {:?}: {}", config_path, e))
    })?;

    // The directory name is authoritative
    config.name = base_name.to_string();

    Ok(Some(config))
}

/// Save knowledge base configuration.
pub fn save_config(workspace: &Path, config: &KnowledgeBaseConfig) -> AppResult<()> {
    let config_path = get_config_path(workspace, &config.name);

    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            AppError::Knowledge(format!("Failed to create config directory: {}", e))
        })?;
    }

    let yaml = serde_yaml::to_string(config)
        .map_err(|e| AppError::Knowledge(format!("Failed to serialize config: {}", e)))?;

    fs::write(&config_path, yaml).map_err(|e| {
        AppError::Knowledge(format!("Failed to write config to {:?}: {}", config_path, e))
    })?;

    tracing::debug!("Saved knowledge base config for '{}'", config.name);
    Ok(())
}

/// List the names of all bases in the workspace.
pub fn list_bases(workspace: &Path) -> AppResult<Vec<String>> {
    let root = workspace.join(".prosearch").join("knowledge");
    if !root.exists() {
        return Ok(Vec::new());
    }

    let mut names = Vec::new();
    for entry in fs::read_dir(&root)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            names.push(entry.file_name().to_string_lossy().to_string());
        }
    }
    names.sort();
    Ok(names)
}

/// Get the base directory for a knowledge base.
pub fn get_base_dir(workspace: &Path, base_name: &str) -> PathBuf {
    workspace
        .join(".prosearch")
        .join("knowledge")
        .join(base_name)
}

/// Get the path to a base's config file.
pub fn get_config_path(workspace: &Path, base_name: &str) -> PathBuf {
    get_base_dir(workspace, base_name).join("config.yaml")
}

/// Get the SQLite index path for a base.
pub fn get_index_path(workspace: &Path, base_name: &str) -> PathBuf {
    get_base_dir(workspace, base_name).join("index.sqlite")
}

/// Get the sources JSONL path for a base.
pub fn get_sources_path(workspace: &Path, base_name: &str) -> PathBuf {
    get_base_dir(workspace, base_name).join("sources.jsonl")
}
