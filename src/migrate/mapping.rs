use std::collections::HashMap;

use serde::Deserialize;
use thiserror::Error;

use crate::model::asana::Task;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MappingError {
    #[error("invalid mapping '{0}', expected TAG=WORKFLOW_STATE_ID")]
    Malformed(String),
    #[error("invalid workflow state id '{value}' for tag '{tag}'")]
    InvalidState { tag: String, value: String },
    #[error("tag '{tag}' is mapped to both {first} and {second}")]
    Conflict { tag: String, first: i64, second: i64 },
}

/// What to do with a task whose tags are not in the mapping table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum UnmappedTagPolicy {
    /// Import anyway, falling back to the completion state.
    #[default]
    Ignore,
    /// Leave the task in Asana and count it as skipped.
    Skip,
}

/// Resolved workflow state for a single task.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    pub workflow_state_id: Option<i64>,
    /// Names of the task's tags when none of them is mapped. Empty when a tag
    /// matched, when the task has no tags, or when the mapping table is empty.
    pub unmapped: Vec<String>,
}

/// Static tag to workflow state table. Keys match either a tag gid or a tag
/// name. Read-only once built.
#[derive(Debug, Clone, Default)]
pub struct WorkflowMapping {
    by_tag: HashMap<String, i64>,
    complete: Option<i64>,
}

impl WorkflowMapping {
    pub fn new<I>(pairs: I, complete: Option<i64>) -> Result<Self, MappingError>
    where
        I: IntoIterator<Item = (String, i64)>,
    {
        let mut by_tag = HashMap::new();
        for (tag, state) in pairs {
            if let Some(&existing) = by_tag.get(&tag) {
                if existing != state {
                    return Err(MappingError::Conflict {
                        tag,
                        first: existing,
                        second: state,
                    });
                }
                continue;
            }
            by_tag.insert(tag, state);
        }
        Ok(Self { by_tag, complete })
    }

    pub fn is_empty(&self) -> bool {
        self.by_tag.is_empty()
    }

    pub fn len(&self) -> usize {
        self.by_tag.len()
    }

    pub fn get(&self, tag: &str) -> Option<i64> {
        self.by_tag.get(tag).copied()
    }

    /// First mapped tag wins, in the order Asana lists them. Completed tasks
    /// without a mapped tag land in the completion state, if configured.
    pub fn resolve(&self, task: &Task) -> Resolution {
        for tag in &task.tags {
            if let Some(state) = self.get(&tag.gid).or_else(|| self.get(&tag.name)) {
                return Resolution {
                    workflow_state_id: Some(state),
                    unmapped: Vec::new(),
                };
            }
        }

        let unmapped = if self.is_empty() {
            Vec::new()
        } else {
            task.tags.iter().map(|t| t.name.clone()).collect()
        };
        let workflow_state_id = if task.completed { self.complete } else { None };

        Resolution {
            workflow_state_id,
            unmapped,
        }
    }
}

/// Parse a `TAG=WORKFLOW_STATE_ID` pair as given on the command line.
pub fn parse_pair(raw: &str) -> Result<(String, i64), MappingError> {
    let (tag, value) = raw
        .split_once('=')
        .ok_or_else(|| MappingError::Malformed(raw.to_string()))?;
    let tag = tag.trim();
    let value = value.trim();
    if tag.is_empty() {
        return Err(MappingError::Malformed(raw.to_string()));
    }
    let state = value.parse::<i64>().map_err(|_| MappingError::InvalidState {
        tag: tag.to_string(),
        value: value.to_string(),
    })?;
    Ok((tag.to_string(), state))
}
