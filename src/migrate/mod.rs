pub mod attachments;
pub mod cleanup;
pub mod error;
pub mod mapping;
pub mod report;
pub mod story;
pub mod users;

use std::fmt;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{debug, error, info, warn};

use crate::config::MigrationConfig;
use crate::model::asana::{Task, TaskRef};
use crate::model::clubhouse::{CreateComment, CreateEpic, CreateStory};
use crate::providers::{Destination, Source};
use error::ItemError;
use mapping::UnmappedTagPolicy;
use report::{CreatedRecord, Outcome, RecordKind, SkipReason, Summary};
use story::{StoryContext, TaskBundle, MOVE_MESSAGE};
use users::UserDirectory;

/// How a task with subtasks is laid out in Clubhouse.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum NestingMode {
    /// One story per task; subtasks become its checklist.
    #[default]
    Flatten,
    /// An epic per task with subtasks, and one story per direct subtask.
    Epic,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EpicPlan {
    pub epic: CreateEpic,
    pub comments: Vec<CreateComment>,
}

/// The records that will be created for one source task.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportPlan {
    pub epic: Option<EpicPlan>,
    pub stories: Vec<CreateStory>,
}

impl fmt::Display for ImportPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(epic) = &self.epic {
            write!(f, " epic '{}' with", epic.epic.name)?;
        }
        for (i, story) in self.stories.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, " story '{}'", story.name)?;
            if let Some(state) = story.workflow_state_id {
                write!(f, " in workflow state {state}")?;
            }
        }
        Ok(())
    }
}

pub struct Migrator {
    source: Box<dyn Source>,
    destination: Box<dyn Destination>,
    config: MigrationConfig,
    users: UserDirectory,
}

impl Migrator {
    /// Loads the user directories of both systems; nothing is written.
    pub async fn new(
        source: Box<dyn Source>,
        destination: Box<dyn Destination>,
        config: MigrationConfig,
    ) -> Result<Self> {
        let asana_users = source
            .list_users()
            .await
            .context("Failed to list Asana users")?;
        let members = destination
            .list_members()
            .await
            .context("Failed to list Clubhouse members")?;
        let users = UserDirectory::build(&asana_users, &members, config.ignore_email_domain);

        Ok(Self {
            source,
            destination,
            config,
            users,
        })
    }

    /// Migrate every task of the configured project, one at a time. Only a
    /// failure to enumerate the project aborts the run.
    pub async fn run(&self) -> Result<Summary> {
        if self.config.commit {
            info!("Commit mode enabled. Stories will be created and Asana tasks updated.");
        } else {
            info!("Preview mode enabled. Nothing will be created or modified.");
        }

        let tasks = self
            .source
            .list_tasks(&self.config.asana_project_id)
            .await
            .with_context(|| {
                format!(
                    "Failed to list tasks of Asana project {}",
                    self.config.asana_project_id
                )
            })?;
        info!(count = tasks.len(), "Found tasks to migrate");

        let mut summary = Summary::default();
        for task_ref in &tasks {
            let outcome = self.import_task(task_ref).await;
            log_outcome(task_ref, &outcome);
            summary.record(task_ref, outcome);
        }
        Ok(summary)
    }

    pub async fn import_task(&self, task_ref: &TaskRef) -> Outcome {
        match self.try_import(&task_ref.gid).await {
            Ok(outcome) => outcome,
            Err(err) => Outcome::Failed(err),
        }
    }

    async fn try_import(&self, task_id: &str) -> Result<Outcome, ItemError> {
        let task = self
            .source
            .get_task(task_id)
            .await
            .map_err(ItemError::Source)?;

        if let Some(reason) = self.skip_reason(&task) {
            return Ok(Outcome::Skipped(reason));
        }

        let resolution = self.config.mapping.resolve(&task);
        if !resolution.unmapped.is_empty() {
            match self.config.unmapped_tags {
                UnmappedTagPolicy::Skip => {
                    return Ok(Outcome::Skipped(SkipReason::Unmapped {
                        tags: resolution.unmapped,
                    }));
                }
                UnmappedTagPolicy::Ignore => {
                    debug!(task = %task.gid, tags = ?resolution.unmapped, "No mapped tag, using default state");
                }
            }
        }

        let (mut root, mut descendants) = self.collect(task).await?;
        if self.config.nesting == NestingMode::Epic {
            descendants = self.prune_skipped(root.task.level, descendants);
        }

        if self.config.commit {
            self.copy_attachments(&mut root).await?;
            for bundle in &mut descendants {
                self.copy_attachments(bundle).await?;
            }
        }

        let plan = self.plan(&root, &descendants, resolution.workflow_state_id);
        if let Ok(json) = serde_json::to_string_pretty(&plan.stories) {
            debug!("{json}");
        }

        if !self.config.commit {
            return Ok(Outcome::Previewed(plan));
        }

        let created = self.execute(plan).await?;
        self.write_back(&root.task, &created).await?;
        Ok(Outcome::Created(created))
    }

    fn skip_reason(&self, task: &Task) -> Option<SkipReason> {
        if task.name.trim().is_empty() {
            return Some(SkipReason::BlankName);
        }
        if task.is_section() {
            return Some(SkipReason::Section);
        }
        let moved = self.config.asana_moved_tag_id.as_deref()?;
        task.has_tag(moved).then(|| SkipReason::AlreadyMigrated {
            tag: moved.to_string(),
        })
    }

    /// Fetch the task's activity and its subtask tree, depth first, each
    /// subtask annotated with its level below the root.
    async fn collect(&self, task: Task) -> Result<(TaskBundle, Vec<TaskBundle>), ItemError> {
        let stories = self
            .source
            .list_stories(&task.gid)
            .await
            .map_err(ItemError::Source)?;

        let mut pending: Vec<(String, usize)> = self
            .source
            .list_subtasks(&task.gid)
            .await
            .map_err(ItemError::Source)?
            .into_iter()
            .rev()
            .map(|r| (r.gid, task.level + 1))
            .collect();

        let mut descendants = Vec::new();
        while let Some((gid, level)) = pending.pop() {
            let mut subtask = self.source.get_task(&gid).await.map_err(ItemError::Source)?;
            subtask.level = level;

            let children = self
                .source
                .list_subtasks(&gid)
                .await
                .map_err(ItemError::Source)?;
            pending.extend(children.into_iter().rev().map(|r| (r.gid, level + 1)));

            let stories = self
                .source
                .list_stories(&gid)
                .await
                .map_err(ItemError::Source)?;
            descendants.push(TaskBundle {
                task: subtask,
                stories,
                file_ids: Vec::new(),
            });
        }

        let root = TaskBundle {
            task,
            stories,
            file_ids: Vec::new(),
        };
        Ok((root, descendants))
    }

    /// Drop direct subtasks that would be skipped as tasks of their own,
    /// along with everything nested below them.
    fn prune_skipped(&self, root_level: usize, descendants: Vec<TaskBundle>) -> Vec<TaskBundle> {
        let direct_level = root_level + 1;
        let mut dropping = false;
        descendants
            .into_iter()
            .filter(|bundle| {
                if bundle.task.level == direct_level {
                    dropping = match self.skip_reason(&bundle.task) {
                        Some(reason) => {
                            info!(
                                "Skipping subtask {} '{}' and its subtasks: {reason}",
                                bundle.task.gid,
                                bundle.task.name.trim()
                            );
                            true
                        }
                        None => false,
                    };
                }
                !dropping
            })
            .collect()
    }

    async fn copy_attachments(&self, bundle: &mut TaskBundle) -> Result<(), ItemError> {
        let attachments = self
            .source
            .list_attachments(&bundle.task.gid)
            .await
            .map_err(ItemError::Attachments)?;

        for attachment in attachments {
            let name = attachment.name.trim();
            let Some(url) = attachment.download_url.as_deref() else {
                warn!(
                    task = %bundle.task.gid,
                    "Attachment {} '{name}' has no download URL, skipping",
                    attachment.gid
                );
                continue;
            };
            info!("Fetching {name} for {} ...", bundle.task.gid);
            let bytes = self
                .source
                .download(url)
                .await
                .map_err(ItemError::Attachments)?;
            let content_type = attachments::content_type(name, &bytes);
            info!("Uploading {name} as {content_type} ...");
            let file = self
                .destination
                .upload_file(name, content_type, bytes)
                .await
                .map_err(ItemError::Attachments)?;
            debug!("Uploaded {} as file {}", file.name, file.id);
            bundle.file_ids.push(file.id);
        }
        Ok(())
    }

    fn plan(
        &self,
        root: &TaskBundle,
        descendants: &[TaskBundle],
        workflow_state_id: Option<i64>,
    ) -> ImportPlan {
        let ctx = StoryContext {
            asana_project_id: &self.config.asana_project_id,
            clubhouse_project_id: self.config.clubhouse_project_id,
            users: &self.users,
        };

        if self.config.nesting == NestingMode::Flatten || descendants.is_empty() {
            return ImportPlan {
                epic: None,
                stories: vec![ctx.build_story(root, descendants, workflow_state_id)],
            };
        }

        let epic = EpicPlan {
            epic: ctx.build_epic(root),
            comments: ctx.build_comments(root, root.task.level),
        };

        let direct_level = root.task.level + 1;
        let starts: Vec<usize> = descendants
            .iter()
            .enumerate()
            .filter(|(_, b)| b.task.level == direct_level)
            .map(|(i, _)| i)
            .collect();

        let mut stories: Vec<CreateStory> = starts
            .iter()
            .enumerate()
            .map(|(n, &start)| {
                let end = starts.get(n + 1).copied().unwrap_or(descendants.len());
                let child = &descendants[start];
                let state = self.config.mapping.resolve(&child.task).workflow_state_id;
                ctx.build_story(child, &descendants[start + 1..end], state)
            })
            .collect();

        // Epics take no files; the parent's attachments go to the first story.
        if let Some(first) = stories.first_mut() {
            let mut file_ids = root.file_ids.clone();
            file_ids.append(&mut first.file_ids);
            first.file_ids = file_ids;
        }

        ImportPlan {
            epic: Some(epic),
            stories,
        }
    }

    async fn execute(&self, plan: ImportPlan) -> Result<Vec<CreatedRecord>, ItemError> {
        let mut created: Vec<CreatedRecord> = Vec::new();

        let epic_id = match &plan.epic {
            Some(epic_plan) => {
                let epic = self
                    .destination
                    .create_epic(&epic_plan.epic)
                    .await
                    .map_err(|e| creation_error(&created, e))?;
                created.push(CreatedRecord {
                    kind: RecordKind::Epic,
                    id: epic.id,
                    url: epic.app_url,
                });
                for comment in &epic_plan.comments {
                    self.destination
                        .create_epic_comment(epic.id, comment)
                        .await
                        .map_err(|e| creation_error(&created, e))?;
                }
                Some(epic.id)
            }
            None => None,
        };

        for mut story in plan.stories {
            story.epic_id = epic_id;
            let response = self
                .destination
                .create_story(&story)
                .await
                .map_err(|e| creation_error(&created, e))?;
            created.push(CreatedRecord {
                kind: RecordKind::Story,
                id: response.id,
                url: response.app_url,
            });
        }

        Ok(created)
    }

    /// Leave a trail on the Asana task so a later run skips it.
    async fn write_back(&self, task: &Task, created: &[CreatedRecord]) -> Result<(), ItemError> {
        if self.config.skip_moved_tag {
            debug!("Skipping updating Asana task {}", task.gid);
            return Ok(());
        }
        let Some(primary) = created.first() else {
            return Ok(());
        };

        self.source
            .add_comment(&task.gid, &format!("{MOVE_MESSAGE}{}", primary.url))
            .await
            .map_err(|cause| ItemError::WriteBack {
                url: primary.url.clone(),
                cause,
            })?;

        if let Some(tag) = &self.config.asana_moved_tag_id {
            self.source
                .add_tag(&task.gid, tag)
                .await
                .map_err(|cause| ItemError::WriteBack {
                    url: primary.url.clone(),
                    cause,
                })?;
        }
        Ok(())
    }
}

fn creation_error(created: &[CreatedRecord], cause: anyhow::Error) -> ItemError {
    if created.is_empty() {
        ItemError::Destination(cause)
    } else {
        ItemError::Partial {
            created: created.iter().map(|r| r.url.clone()).collect(),
            cause,
        }
    }
}

fn log_outcome(task: &TaskRef, outcome: &Outcome) {
    match outcome {
        Outcome::Created(records) => {
            for record in records {
                info!(
                    "Task {}: {} {} created at: {}",
                    task.gid, record.kind, record.id, record.url
                );
            }
        }
        Outcome::Previewed(plan) => info!("Task {}: would create{plan}", task.gid),
        Outcome::Skipped(reason) => info!("Skipping task {} '{}': {reason}", task.gid, task.name),
        Outcome::Failed(err) => error!("Task {} '{}' failed: {err}", task.gid, task.name),
    }
}
