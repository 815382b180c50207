use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct Member {
    pub id: String,
    pub profile: Profile,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Profile {
    pub id: Option<String>,
    #[serde(default)]
    pub mention_name: String,
    pub email_address: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoryType {
    Feature,
    Bug,
    #[default]
    Chore,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CreateLabel {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
}

impl CreateLabel {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            external_id: None,
        }
    }
}

/// Checklist entry embedded in a story.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CreateTask {
    pub description: String,
    #[serde(skip_serializing_if = "is_false")]
    pub complete: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub owner_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CreateComment {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CreateStory {
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub story_type: StoryType,
    pub project_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workflow_state_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub epic_id: Option<i64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<CreateLabel>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tasks: Vec<CreateTask>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub comments: Vec<CreateComment>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub owner_ids: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub follower_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requested_by_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at_override: Option<String>,
    #[serde(skip_serializing_if = "is_false")]
    pub archived: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub file_ids: Vec<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CreateEpic {
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<CreateLabel>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub owner_ids: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub follower_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requested_by_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at_override: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Story {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub app_url: String,
    #[serde(default)]
    pub comments: Vec<Comment>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Comment {
    pub id: i64,
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Epic {
    pub id: i64,
    #[serde(default)]
    pub app_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadedFile {
    pub id: i64,
    #[serde(default)]
    pub name: String,
}

fn is_false(value: &bool) -> bool {
    !*value
}
