pub mod asana;
pub mod clubhouse;

use anyhow::Result;
use async_trait::async_trait;

use crate::model::asana::{Attachment, Story as AsanaStory, Task, TaskRef, User};
use crate::model::clubhouse::{
    CreateComment, CreateEpic, CreateStory, Epic, Member, Story, UploadedFile,
};

/// Read side of the migration. Apart from the two write-back calls used to
/// mark a task as migrated, nothing here changes the source system.
#[async_trait]
pub trait Source: Send + Sync {
    async fn list_users(&self) -> Result<Vec<User>>;
    async fn list_tasks(&self, project_id: &str) -> Result<Vec<TaskRef>>;
    async fn get_task(&self, task_id: &str) -> Result<Task>;
    async fn list_subtasks(&self, task_id: &str) -> Result<Vec<TaskRef>>;
    async fn list_stories(&self, task_id: &str) -> Result<Vec<AsanaStory>>;
    async fn list_attachments(&self, task_id: &str) -> Result<Vec<Attachment>>;
    async fn download(&self, url: &str) -> Result<Vec<u8>>;
    async fn add_comment(&self, task_id: &str, text: &str) -> Result<()>;
    async fn add_tag(&self, task_id: &str, tag_id: &str) -> Result<()>;
}

#[async_trait]
pub trait Destination: Send + Sync {
    async fn list_members(&self) -> Result<Vec<Member>>;
    async fn create_story(&self, story: &CreateStory) -> Result<Story>;
    async fn create_epic(&self, epic: &CreateEpic) -> Result<Epic>;
    async fn create_epic_comment(&self, epic_id: i64, comment: &CreateComment) -> Result<()>;
    async fn upload_file(
        &self,
        file_name: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<UploadedFile>;
    /// Returns None when the story does not exist.
    async fn get_story(&self, story_id: i64) -> Result<Option<Story>>;
    async fn delete_comment(&self, story_id: i64, comment_id: i64) -> Result<()>;
}

/// Turn a non-2xx response into an error carrying the status and body.
pub(crate) async fn ensure_success(
    resp: reqwest::Response,
    service: &str,
) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    tracing::error!(%status, %body, "{service} request failed");
    anyhow::bail!("{service} returned {status}: {body}")
}

#[cfg(test)]
pub mod tests;
