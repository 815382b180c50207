use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::{ensure_success, Source};
use crate::model::asana::{Attachment, Story, Task, TaskRef, User};

pub const DEFAULT_BASE_URL: &str = "https://app.asana.com/api/1.0";

const PAGE_SIZE: &str = "100";

const TASK_FIELDS: &str = "name,notes,completed,completed_at,created_at,modified_at,due_on,\
resource_subtype,assignee.name,assignee.email,followers.name,followers.email,tags.name,\
projects.name,memberships.project.name,memberships.section.name,custom_fields.name,\
custom_fields.enum_value.name";

const STORY_FIELDS: &str = "type,resource_subtype,text,created_at,created_by.name,created_by.email";

pub struct AsanaClient {
    base_url: String,
    access_token: String,
    client: reqwest::Client,
}

impl AsanaClient {
    pub fn new(access_token: String, base_url: Option<String>) -> Self {
        Self {
            base_url: base_url
                .as_deref()
                .unwrap_or(DEFAULT_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            access_token,
            client: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, fields: Option<&str>) -> Result<T> {
        let mut request = self.client.get(self.url(path)).bearer_auth(&self.access_token);
        if let Some(fields) = fields {
            request = request.query(&[("opt_fields", fields)]);
        }
        let resp = request
            .send()
            .await
            .with_context(|| format!("Asana request GET {path} failed"))?;
        let envelope: Envelope<T> = ensure_success(resp, "Asana")
            .await?
            .json()
            .await
            .with_context(|| format!("Failed to parse Asana response for {path}"))?;
        Ok(envelope.data)
    }

    /// Fetch every page of a list endpoint.
    async fn get_all<T: DeserializeOwned>(&self, path: &str, fields: &str) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut offset: Option<String> = None;

        loop {
            let page: Envelope<Vec<T>> = {
                let mut request = self
                    .client
                    .get(self.url(path))
                    .bearer_auth(&self.access_token)
                    .query(&[("limit", PAGE_SIZE), ("opt_fields", fields)]);
                if let Some(offset) = &offset {
                    request = request.query(&[("offset", offset)]);
                }
                let resp = request
                    .send()
                    .await
                    .with_context(|| format!("Asana request GET {path} failed"))?;
                ensure_success(resp, "Asana")
                    .await?
                    .json()
                    .await
                    .with_context(|| format!("Failed to parse Asana response for {path}"))?
            };

            items.extend(page.data);
            match page.next_page {
                Some(next) => offset = Some(next.offset),
                None => break,
            }
        }

        Ok(items)
    }

    async fn post(&self, path: &str, data: serde_json::Value) -> Result<()> {
        let resp = self
            .client
            .post(self.url(path))
            .bearer_auth(&self.access_token)
            .json(&serde_json::json!({ "data": data }))
            .send()
            .await
            .with_context(|| format!("Asana request POST {path} failed"))?;
        ensure_success(resp, "Asana").await?;
        Ok(())
    }
}

#[derive(Deserialize)]
struct Envelope<T> {
    data: T,
    #[serde(default)]
    next_page: Option<NextPage>,
}

#[derive(Deserialize)]
struct NextPage {
    offset: String,
}

#[derive(Deserialize)]
struct Me {
    #[serde(default)]
    workspaces: Vec<Workspace>,
}

#[derive(Deserialize)]
struct Workspace {
    gid: String,
}

#[async_trait]
impl Source for AsanaClient {
    async fn list_users(&self) -> Result<Vec<User>> {
        let me: Me = self.get("users/me", Some("workspaces")).await?;
        let workspace = me
            .workspaces
            .first()
            .context("Asana user has no workspaces")?;
        self.get_all(&format!("workspaces/{}/users", workspace.gid), "name,email")
            .await
    }

    async fn list_tasks(&self, project_id: &str) -> Result<Vec<TaskRef>> {
        self.get_all(&format!("projects/{project_id}/tasks"), "name")
            .await
    }

    async fn get_task(&self, task_id: &str) -> Result<Task> {
        self.get(&format!("tasks/{task_id}"), Some(TASK_FIELDS))
            .await
    }

    async fn list_subtasks(&self, task_id: &str) -> Result<Vec<TaskRef>> {
        self.get_all(&format!("tasks/{task_id}/subtasks"), "name")
            .await
    }

    async fn list_stories(&self, task_id: &str) -> Result<Vec<Story>> {
        self.get_all(&format!("tasks/{task_id}/stories"), STORY_FIELDS)
            .await
    }

    async fn list_attachments(&self, task_id: &str) -> Result<Vec<Attachment>> {
        self.get_all(
            &format!("tasks/{task_id}/attachments"),
            "name,download_url",
        )
        .await
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        // Download URLs are pre-signed, no auth header.
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .context("Attachment download failed")?;
        let bytes = ensure_success(resp, "Asana attachment host")
            .await?
            .bytes()
            .await
            .context("Failed to read attachment body")?;
        Ok(bytes.to_vec())
    }

    async fn add_comment(&self, task_id: &str, text: &str) -> Result<()> {
        self.post(
            &format!("tasks/{task_id}/stories"),
            serde_json::json!({ "text": text }),
        )
        .await
    }

    async fn add_tag(&self, task_id: &str, tag_id: &str) -> Result<()> {
        self.post(
            &format!("tasks/{task_id}/addTag"),
            serde_json::json!({ "tag": tag_id }),
        )
        .await
    }
}
