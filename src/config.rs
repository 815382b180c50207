use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::migrate::mapping::{UnmappedTagPolicy, WorkflowMapping};
use crate::migrate::NestingMode;

#[derive(Debug, Deserialize, Default)]
pub struct AppConfig {
    pub asana: Option<AsanaConfig>,
    pub clubhouse: Option<ClubhouseConfig>,
    pub import: Option<ImportConfig>,
}

#[derive(Debug, Deserialize, Default)]
pub struct AsanaConfig {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub project_id: Option<String>,
    pub moved_tag_id: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct ClubhouseConfig {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub project_id: Option<i64>,
    pub complete_workflow_id: Option<i64>,
}

#[derive(Debug, Deserialize, Default)]
pub struct ImportConfig {
    /// Asana tag gid or name to Clubhouse workflow state id.
    #[serde(default)]
    pub workflow_states: HashMap<String, i64>,
    pub unmapped_tags: Option<UnmappedTagPolicy>,
    pub nesting: Option<NestingMode>,
    pub ignore_email_domain: Option<bool>,
    pub skip_moved_tag: Option<bool>,
}

/// Everything one migration run needs, resolved from flags, environment and
/// the config file.
#[derive(Debug, Clone)]
pub struct MigrationConfig {
    pub asana_project_id: String,
    pub asana_moved_tag_id: Option<String>,
    /// Leave the Asana task untouched after import.
    pub skip_moved_tag: bool,
    pub clubhouse_project_id: i64,
    pub mapping: WorkflowMapping,
    pub unmapped_tags: UnmappedTagPolicy,
    pub nesting: NestingMode,
    pub ignore_email_domain: bool,
    pub commit: bool,
}

pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".asana2clubhouse")
}

fn config_path() -> PathBuf {
    data_dir().join("config.toml")
}

/// Load the config file. The default location may be absent; an explicitly
/// given path must exist.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => {
            let default = config_path();
            if !default.exists() {
                return Ok(AppConfig::default());
            }
            default
        }
    };
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config from {}", path.display()))?;
    let config: AppConfig = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parses_full_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[asana]
api_key = "asana-secret"
project_id = "1100"
moved_tag_id = "2200"

[clubhouse]
api_key = "ch-secret"
project_id = 12
complete_workflow_id = 500000010

[import]
unmapped_tags = "skip"
nesting = "epic"
ignore_email_domain = true

[import.workflow_states]
"in review" = 500000020
"3300" = 500000030
"#
        )
        .unwrap();

        let config = load_config(Some(file.path())).unwrap();
        let asana = config.asana.unwrap();
        assert_eq!(asana.api_key.as_deref(), Some("asana-secret"));
        assert_eq!(asana.moved_tag_id.as_deref(), Some("2200"));
        let clubhouse = config.clubhouse.unwrap();
        assert_eq!(clubhouse.project_id, Some(12));
        assert_eq!(clubhouse.complete_workflow_id, Some(500000010));
        let import = config.import.unwrap();
        assert_eq!(import.unmapped_tags, Some(UnmappedTagPolicy::Skip));
        assert_eq!(import.nesting, Some(NestingMode::Epic));
        assert_eq!(import.workflow_states.get("in review"), Some(&500000020));
        assert_eq!(import.workflow_states.len(), 2);
    }

    #[test]
    fn empty_file_is_default() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let config = load_config(Some(file.path())).unwrap();
        assert!(config.asana.is_none());
        assert!(config.import.is_none());
    }

    #[test]
    fn explicit_missing_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(Some(&dir.path().join("nope.toml"))).unwrap_err();
        assert!(err.to_string().contains("Failed to read config"));
    }

    #[test]
    fn invalid_toml_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[clubhouse]\nproject_id = \"not a number\"").unwrap();
        let err = load_config(Some(file.path())).unwrap_err();
        assert!(err.to_string().contains("Failed to parse"));
    }
}
