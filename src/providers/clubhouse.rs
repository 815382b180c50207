use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;

use super::{ensure_success, Destination};
use crate::model::clubhouse::{
    CreateComment, CreateEpic, CreateStory, Epic, Member, Story, UploadedFile,
};

pub const DEFAULT_BASE_URL: &str = "https://api.clubhouse.io/api/v3";

pub struct ClubhouseClient {
    base_url: String,
    api_token: String,
    client: reqwest::Client,
}

impl ClubhouseClient {
    pub fn new(api_token: String, base_url: Option<String>) -> Self {
        Self {
            base_url: base_url
                .as_deref()
                .unwrap_or(DEFAULT_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            api_token,
            client: reqwest::Client::new(),
        }
    }

    fn auth_params(&self) -> [(&str, &str); 1] {
        [("token", &self.api_token)]
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

#[async_trait]
impl Destination for ClubhouseClient {
    async fn list_members(&self) -> Result<Vec<Member>> {
        let resp = self
            .client
            .get(self.url("members"))
            .query(&self.auth_params())
            .send()
            .await
            .context("Clubhouse members request failed")?;
        ensure_success(resp, "Clubhouse")
            .await?
            .json()
            .await
            .context("Failed to parse Clubhouse members")
    }

    async fn create_story(&self, story: &CreateStory) -> Result<Story> {
        let resp = self
            .client
            .post(self.url("stories"))
            .query(&self.auth_params())
            .json(story)
            .send()
            .await
            .context("Clubhouse create story request failed")?;
        ensure_success(resp, "Clubhouse")
            .await?
            .json()
            .await
            .context("Failed to parse created Clubhouse story")
    }

    async fn create_epic(&self, epic: &CreateEpic) -> Result<Epic> {
        let resp = self
            .client
            .post(self.url("epics"))
            .query(&self.auth_params())
            .json(epic)
            .send()
            .await
            .context("Clubhouse create epic request failed")?;
        ensure_success(resp, "Clubhouse")
            .await?
            .json()
            .await
            .context("Failed to parse created Clubhouse epic")
    }

    async fn create_epic_comment(&self, epic_id: i64, comment: &CreateComment) -> Result<()> {
        let resp = self
            .client
            .post(self.url(&format!("epics/{epic_id}/comments")))
            .query(&self.auth_params())
            .json(comment)
            .send()
            .await
            .context("Clubhouse create epic comment request failed")?;
        ensure_success(resp, "Clubhouse").await?;
        Ok(())
    }

    async fn upload_file(
        &self,
        file_name: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<UploadedFile> {
        let part = Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(content_type)
            .with_context(|| format!("Invalid content type {content_type}"))?;
        let form = Form::new().part("file", part);

        let resp = self
            .client
            .post(self.url("files"))
            .query(&self.auth_params())
            .multipart(form)
            .send()
            .await
            .with_context(|| format!("Clubhouse upload of {file_name} failed"))?;
        let files: Vec<UploadedFile> = ensure_success(resp, "Clubhouse")
            .await?
            .json()
            .await
            .context("Failed to parse Clubhouse upload response")?;
        files
            .into_iter()
            .next()
            .with_context(|| format!("Clubhouse returned no file for {file_name}"))
    }

    async fn get_story(&self, story_id: i64) -> Result<Option<Story>> {
        let resp = self
            .client
            .get(self.url(&format!("stories/{story_id}")))
            .query(&self.auth_params())
            .send()
            .await
            .with_context(|| format!("Clubhouse request for story {story_id} failed"))?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let story = ensure_success(resp, "Clubhouse")
            .await?
            .json()
            .await
            .with_context(|| format!("Failed to parse Clubhouse story {story_id}"))?;
        Ok(Some(story))
    }

    async fn delete_comment(&self, story_id: i64, comment_id: i64) -> Result<()> {
        let resp = self
            .client
            .delete(self.url(&format!("stories/{story_id}/comments/{comment_id}")))
            .query(&self.auth_params())
            .send()
            .await
            .with_context(|| {
                format!("Clubhouse delete of comment {comment_id} on story {story_id} failed")
            })?;
        ensure_success(resp, "Clubhouse").await?;
        Ok(())
    }
}
