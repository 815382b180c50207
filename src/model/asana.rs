use chrono::NaiveDate;
use serde::Deserialize;

/// Compact task reference as returned by list endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskRef {
    pub gid: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct User {
    pub gid: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Tag {
    pub gid: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Project {
    pub gid: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Section {
    pub gid: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Membership {
    pub project: Option<Project>,
    pub section: Option<Section>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EnumValue {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CustomField {
    #[serde(default)]
    pub name: String,
    pub enum_value: Option<EnumValue>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Task {
    pub gid: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub completed: bool,
    pub completed_at: Option<String>,
    pub created_at: Option<String>,
    pub modified_at: Option<String>,
    pub due_on: Option<NaiveDate>,
    pub resource_subtype: Option<String>,
    pub assignee: Option<User>,
    #[serde(default)]
    pub followers: Vec<User>,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default)]
    pub memberships: Vec<Membership>,
    #[serde(default)]
    pub custom_fields: Vec<CustomField>,
    /// Nesting depth below the migrated task: 0 for the task itself, 1 for its
    /// direct subtasks and so on. Not part of the API payload.
    #[serde(skip)]
    pub level: usize,
}

impl Task {
    pub fn is_section(&self) -> bool {
        self.resource_subtype.as_deref() == Some("section")
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t.gid == tag || t.name == tag)
    }
}

/// An entry of a task's activity feed. Asana calls these "stories"; only the
/// ones of type `comment` are user-written.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Story {
    #[serde(rename = "type", default)]
    pub kind: String,
    pub resource_subtype: Option<String>,
    #[serde(default)]
    pub text: String,
    pub created_at: Option<String>,
    pub created_by: Option<User>,
}

impl Story {
    pub fn is_system(&self) -> bool {
        self.kind == "system"
    }

    pub fn is_edited(&self) -> bool {
        self.resource_subtype.as_deref() == Some("comment_edited")
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Attachment {
    pub gid: String,
    #[serde(default)]
    pub name: String,
    pub download_url: Option<String>,
}
