use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use async_trait::async_trait;

use super::{Destination, Source};
use crate::model::asana::{Attachment, Story as AsanaStory, Tag, Task, TaskRef, User};
use crate::model::clubhouse::{
    CreateComment, CreateEpic, CreateStory, Epic, Member, Story, UploadedFile,
};

/// Shared log of side-effecting calls, kept by the test after the mock is
/// handed over.
#[derive(Debug, Default, Clone)]
pub struct Calls(Arc<Mutex<Vec<String>>>);

impl Calls {
    pub fn push(&self, call: String) {
        self.0.lock().unwrap().push(call);
    }

    pub fn all(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.0.lock().unwrap().len()
    }
}

#[derive(Default)]
pub struct MockSource {
    pub users: Vec<User>,
    pub project_tasks: Vec<TaskRef>,
    tasks: Arc<Mutex<HashMap<String, Task>>>,
    subtasks: HashMap<String, Vec<TaskRef>>,
    stories: HashMap<String, Vec<AsanaStory>>,
    attachments: HashMap<String, Vec<Attachment>>,
    fail_tag_on: Option<String>,
    pub writes: Calls,
}

impl MockSource {
    /// Add a top-level task of the migrated project.
    pub fn with_task(mut self, task: Task) -> Self {
        self.project_tasks.push(TaskRef {
            gid: task.gid.clone(),
            name: task.name.clone(),
        });
        self.tasks.lock().unwrap().insert(task.gid.clone(), task);
        self
    }

    /// Reference a task in the project listing without a body behind it.
    pub fn with_missing_task(mut self, gid: &str) -> Self {
        self.project_tasks.push(TaskRef {
            gid: gid.into(),
            name: "missing".into(),
        });
        self
    }

    pub fn with_subtask(mut self, parent: &str, task: Task) -> Self {
        self.subtasks
            .entry(parent.to_string())
            .or_default()
            .push(TaskRef {
                gid: task.gid.clone(),
                name: task.name.clone(),
            });
        self.tasks.lock().unwrap().insert(task.gid.clone(), task);
        self
    }

    pub fn with_story(mut self, task: &str, story: AsanaStory) -> Self {
        self.stories.entry(task.to_string()).or_default().push(story);
        self
    }

    pub fn with_attachment(mut self, task: &str, name: &str) -> Self {
        self.attachments
            .entry(task.to_string())
            .or_default()
            .push(Attachment {
                gid: format!("att-{name}"),
                name: name.into(),
                download_url: Some(format!("https://files.example/{name}")),
            });
        self
    }

    pub fn with_user(mut self, user: User) -> Self {
        self.users.push(user);
        self
    }

    /// Reject `add_tag` for one task.
    pub fn failing_tag_on(mut self, task_id: &str) -> Self {
        self.fail_tag_on = Some(task_id.into());
        self
    }
}

#[async_trait]
impl Source for MockSource {
    async fn list_users(&self) -> Result<Vec<User>> {
        Ok(self.users.clone())
    }

    async fn list_tasks(&self, _project_id: &str) -> Result<Vec<TaskRef>> {
        Ok(self.project_tasks.clone())
    }

    async fn get_task(&self, task_id: &str) -> Result<Task> {
        self.tasks
            .lock()
            .unwrap()
            .get(task_id)
            .cloned()
            .with_context(|| format!("task {task_id} not found"))
    }

    async fn list_subtasks(&self, task_id: &str) -> Result<Vec<TaskRef>> {
        Ok(self.subtasks.get(task_id).cloned().unwrap_or_default())
    }

    async fn list_stories(&self, task_id: &str) -> Result<Vec<AsanaStory>> {
        Ok(self.stories.get(task_id).cloned().unwrap_or_default())
    }

    async fn list_attachments(&self, task_id: &str) -> Result<Vec<Attachment>> {
        Ok(self.attachments.get(task_id).cloned().unwrap_or_default())
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        Ok(format!("contents of {url}").into_bytes())
    }

    async fn add_comment(&self, task_id: &str, text: &str) -> Result<()> {
        self.writes.push(format!("comment {task_id}: {text}"));
        Ok(())
    }

    async fn add_tag(&self, task_id: &str, tag_id: &str) -> Result<()> {
        if self.fail_tag_on.as_deref() == Some(task_id) {
            anyhow::bail!("Asana returned 403 Forbidden");
        }
        self.writes.push(format!("tag {task_id}: {tag_id}"));
        if let Some(task) = self.tasks.lock().unwrap().get_mut(task_id) {
            task.tags.push(Tag {
                gid: tag_id.into(),
                name: "moved".into(),
            });
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MockDestination {
    pub members: Vec<Member>,
    pub writes: Calls,
    pub stories: Arc<Mutex<Vec<CreateStory>>>,
    pub epics: Arc<Mutex<Vec<CreateEpic>>>,
    pub existing: HashMap<i64, Story>,
    fail_story_named: Option<String>,
    fail_uploads: bool,
    next_id: AtomicI64,
}

impl MockDestination {
    pub fn with_member(mut self, member: Member) -> Self {
        self.members.push(member);
        self
    }

    pub fn failing_on(mut self, story_name: &str) -> Self {
        self.fail_story_named = Some(story_name.into());
        self
    }

    pub fn failing_uploads(mut self) -> Self {
        self.fail_uploads = true;
        self
    }

    fn next_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }
}

#[async_trait]
impl Destination for MockDestination {
    async fn list_members(&self) -> Result<Vec<Member>> {
        Ok(self.members.clone())
    }

    async fn create_story(&self, story: &CreateStory) -> Result<Story> {
        if self.fail_story_named.as_deref() == Some(story.name.as_str()) {
            anyhow::bail!("Clubhouse returned 500 Internal Server Error");
        }
        let id = self.next_id();
        self.writes.push(format!("story {}", story.name));
        self.stories.lock().unwrap().push(story.clone());
        Ok(Story {
            id,
            name: story.name.clone(),
            app_url: format!("https://app.clubhouse.io/test/story/{id}"),
            comments: Vec::new(),
        })
    }

    async fn create_epic(&self, epic: &CreateEpic) -> Result<Epic> {
        let id = self.next_id();
        self.writes.push(format!("epic {}", epic.name));
        self.epics.lock().unwrap().push(epic.clone());
        Ok(Epic {
            id,
            app_url: format!("https://app.clubhouse.io/test/epic/{id}"),
        })
    }

    async fn create_epic_comment(&self, epic_id: i64, comment: &CreateComment) -> Result<()> {
        self.writes
            .push(format!("epic comment {epic_id}: {}", comment.text));
        Ok(())
    }

    async fn upload_file(
        &self,
        file_name: &str,
        content_type: &str,
        _bytes: Vec<u8>,
    ) -> Result<UploadedFile> {
        if self.fail_uploads {
            anyhow::bail!("Clubhouse returned 413 Payload Too Large");
        }
        let id = self.next_id();
        self.writes
            .push(format!("file {file_name} ({content_type})"));
        Ok(UploadedFile {
            id,
            name: file_name.into(),
        })
    }

    async fn get_story(&self, story_id: i64) -> Result<Option<Story>> {
        Ok(self.existing.get(&story_id).cloned())
    }

    async fn delete_comment(&self, story_id: i64, comment_id: i64) -> Result<()> {
        self.writes
            .push(format!("delete comment {comment_id} on {story_id}"));
        Ok(())
    }
}

#[tokio::test]
async fn missing_source_task_is_an_error() {
    let source = MockSource::default().with_missing_task("404");
    let err = source.get_task("404").await.unwrap_err();
    assert!(err.to_string().contains("not found"));
}

#[tokio::test]
async fn add_tag_is_visible_on_next_fetch() {
    let source = MockSource::default().with_task(Task {
        gid: "1".into(),
        name: "Task".into(),
        ..Default::default()
    });
    source.add_tag("1", "99").await.unwrap();
    assert!(source.get_task("1").await.unwrap().has_tag("99"));
    assert_eq!(source.writes.all(), vec!["tag 1: 99".to_string()]);
}

#[tokio::test]
async fn destination_assigns_increasing_ids() {
    let destination = MockDestination::default();
    let a = destination
        .create_story(&CreateStory {
            name: "a".into(),
            ..Default::default()
        })
        .await
        .unwrap();
    let epic = destination
        .create_epic(&CreateEpic {
            name: "e".into(),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(a.id, 1);
    assert_eq!(epic.id, 2);
    assert_eq!(destination.writes.len(), 2);
}

#[tokio::test]
async fn destination_failure_propagates() {
    let destination = MockDestination::default().failing_on("broken");
    let result = destination
        .create_story(&CreateStory {
            name: "broken".into(),
            ..Default::default()
        })
        .await;
    assert!(result.unwrap_err().to_string().contains("500"));
    assert_eq!(destination.writes.len(), 0);
}

#[tokio::test]
async fn trait_objects_are_interchangeable() {
    let destinations: Vec<Box<dyn Destination>> = vec![
        Box::new(MockDestination::default()),
        Box::new(MockDestination::default().failing_on("x")),
    ];
    for destination in &destinations {
        assert!(destination.get_story(1).await.unwrap().is_none());
    }
}
