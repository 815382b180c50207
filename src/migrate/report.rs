use std::fmt;

use super::error::ItemError;
use super::ImportPlan;
use crate::model::asana::TaskRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Story,
    Epic,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKind::Story => f.write_str("story"),
            RecordKind::Epic => f.write_str("epic"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedRecord {
    pub kind: RecordKind,
    pub id: i64,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    BlankName,
    Section,
    AlreadyMigrated { tag: String },
    Unmapped { tags: Vec<String> },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::BlankName => f.write_str("task has no name"),
            SkipReason::Section => f.write_str("task is a section"),
            SkipReason::AlreadyMigrated { tag } => {
                write!(f, "already migrated, tagged with '{tag}'")
            }
            SkipReason::Unmapped { tags } => {
                write!(f, "no workflow state mapped for tags {}", tags.join(", "))
            }
        }
    }
}

/// Result of migrating one source task.
#[derive(Debug)]
pub enum Outcome {
    Created(Vec<CreatedRecord>),
    Previewed(ImportPlan),
    Skipped(SkipReason),
    Failed(ItemError),
}

#[derive(Debug, Default)]
pub struct Summary {
    pub created: usize,
    pub previewed: usize,
    pub skipped: Vec<(TaskRef, SkipReason)>,
    pub failed: Vec<(TaskRef, String)>,
}

impl Summary {
    pub fn record(&mut self, task: &TaskRef, outcome: Outcome) {
        match outcome {
            Outcome::Created(_) => self.created += 1,
            Outcome::Previewed(_) => self.previewed += 1,
            Outcome::Skipped(reason) => self.skipped.push((task.clone(), reason)),
            Outcome::Failed(err) => self.failed.push((task.clone(), err.to_string())),
        }
    }

    pub fn unmapped(&self) -> usize {
        self.skipped
            .iter()
            .filter(|(_, r)| matches!(r, SkipReason::Unmapped { .. }))
            .count()
    }

    pub fn total(&self) -> usize {
        self.created + self.previewed + self.skipped.len() + self.failed.len()
    }

    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} tasks: {} created, {} previewed, {} skipped ({} unmapped), {} failed",
            self.total(),
            self.created,
            self.previewed,
            self.skipped.len(),
            self.unmapped(),
            self.failed.len()
        )?;
        for (task, err) in &self.failed {
            write!(f, "\n  failed {} '{}': {err}", task.gid, task.name)?;
        }
        Ok(())
    }
}
