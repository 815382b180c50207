use crate::migrate::users::UserDirectory;
use crate::model::asana::{Story as AsanaStory, Task};
use crate::model::clubhouse::{
    CreateComment, CreateEpic, CreateLabel, CreateStory, CreateTask, StoryType,
};

/// Prefix of the comment left on a migrated Asana task. Comments starting
/// with it are never copied over.
pub const MOVE_MESSAGE: &str = "The task moved to ";

pub const SOURCE_LABEL: &str = "From Asana";

pub fn task_url(project_id: &str, task_gid: &str) -> String {
    format!("https://app.asana.com/0/{project_id}/{task_gid}/f")
}

/// A task together with what was fetched for it.
#[derive(Debug, Clone, Default)]
pub struct TaskBundle {
    pub task: Task,
    pub stories: Vec<AsanaStory>,
    pub file_ids: Vec<i64>,
}

pub struct StoryContext<'a> {
    pub asana_project_id: &'a str,
    pub clubhouse_project_id: i64,
    pub users: &'a UserDirectory,
}

impl StoryContext<'_> {
    fn url(&self, task: &Task) -> String {
        task_url(self.asana_project_id, &task.gid)
    }

    /// Build the story for `root`; `descendants` become its checklist and
    /// contribute their comments and files.
    pub fn build_story(
        &self,
        root: &TaskBundle,
        descendants: &[TaskBundle],
        workflow_state_id: Option<i64>,
    ) -> CreateStory {
        let task = &root.task;

        let mut comments = self.build_comments(root, task.level);
        for bundle in descendants {
            comments.extend(self.build_comments(bundle, task.level));
        }

        let mut file_ids = root.file_ids.clone();
        for bundle in descendants {
            file_ids.extend(&bundle.file_ids);
        }

        CreateStory {
            name: task.name.trim().to_string(),
            description: self.description(task),
            story_type: story_type(task),
            project_id: self.clubhouse_project_id,
            workflow_state_id,
            epic_id: None,
            labels: labels(task),
            tasks: descendants
                .iter()
                .map(|b| self.build_task(&b.task, task.level))
                .collect(),
            comments,
            owner_ids: self.owners(task),
            follower_ids: self.users.member_ids(&task.followers),
            requested_by_id: self.requester(root),
            deadline: deadline(task),
            external_id: Some(self.url(task)),
            created_at: task.created_at.clone(),
            updated_at: task.modified_at.clone(),
            completed_at_override: task.completed_at.clone(),
            archived: task.completed_at.is_some(),
            file_ids,
        }
    }

    pub fn build_epic(&self, root: &TaskBundle) -> CreateEpic {
        let task = &root.task;
        CreateEpic {
            name: task.name.trim().to_string(),
            description: self.description(task),
            labels: labels(task),
            owner_ids: self.owners(task),
            follower_ids: self.users.member_ids(&task.followers),
            requested_by_id: self.requester(root),
            deadline: deadline(task),
            external_id: Some(self.url(task)),
            created_at: task.created_at.clone(),
            updated_at: task.modified_at.clone(),
            completed_at_override: task.completed_at.clone(),
        }
    }

    /// User comments of a task, skipping system events and the migrator's
    /// own "moved" notes. `root_level` is the level of the story's root task;
    /// comments from deeper tasks link back to the task they were made on.
    pub fn build_comments(&self, bundle: &TaskBundle, root_level: usize) -> Vec<CreateComment> {
        let task = &bundle.task;
        let url = self.url(task);
        bundle
            .stories
            .iter()
            .filter(|s| !s.is_system() && !s.text.starts_with(MOVE_MESSAGE))
            .map(|story| {
                let author_id = self.users.member_id(story.created_by.as_ref());

                let mut header = Vec::new();
                let mut posted_by = String::new();
                if author_id.is_none() {
                    let name = story
                        .created_by
                        .as_ref()
                        .map_or("unknown", |u| u.name.as_str());
                    posted_by.push_str(&format!("> Posted by: {name} "));
                }
                if story.is_edited() {
                    posted_by.push_str("(Edited)");
                }
                if !posted_by.is_empty() {
                    header.push(posted_by.trim_end().to_string());
                }
                if task.level > root_level {
                    header.push(format!("> Posted on: [{}]({url})", task.name.trim()));
                }

                let body = story.text.trim();
                let text = if header.is_empty() {
                    body.to_string()
                } else {
                    format!("{}\n\n{body}", header.join("\n"))
                };

                CreateComment {
                    text: self.users.rewrite_mentions(&text),
                    author_id,
                    created_at: story.created_at.clone(),
                    external_id: Some(url.clone()),
                }
            })
            .collect()
    }

    fn build_task(&self, subtask: &Task, root_level: usize) -> CreateTask {
        // Subtasks of subtasks are rendered as bullets.
        let prefix = if subtask.level > root_level + 1 {
            " * "
        } else {
            ""
        };
        let url = self.url(subtask);
        CreateTask {
            description: format!("{prefix}[{}]({url})\n{}", subtask.name, subtask.notes)
                .trim_end()
                .to_string(),
            complete: subtask.completed,
            created_at: subtask.created_at.clone(),
            external_id: Some(url),
            owner_ids: self.owners(subtask),
        }
    }

    fn description(&self, task: &Task) -> String {
        format!(
            "{}\n\n> Imported from [Asana]({})",
            task.notes.trim(),
            self.url(task)
        )
        .trim()
        .to_string()
    }

    fn owners(&self, task: &Task) -> Vec<String> {
        self.users
            .member_id(task.assignee.as_ref())
            .into_iter()
            .collect()
    }

    /// The author of the first entry in the task's activity feed.
    fn requester(&self, bundle: &TaskBundle) -> Option<String> {
        let first = bundle.stories.first()?;
        self.users.member_id(first.created_by.as_ref())
    }
}

pub fn labels(task: &Task) -> Vec<CreateLabel> {
    let mut labels = vec![CreateLabel::named(SOURCE_LABEL)];
    labels.extend(
        task.tags
            .iter()
            .filter(|t| !t.name.is_empty())
            .map(|t| CreateLabel::named(t.name.clone())),
    );
    labels.extend(task.projects.iter().map(|p| CreateLabel {
        name: p.name.clone(),
        external_id: Some(format!("https://app.asana.com/0/{}", p.gid)),
    }));
    labels.extend(
        task.custom_fields
            .iter()
            .filter_map(|f| f.enum_value.as_ref())
            .filter(|v| !v.name.is_empty())
            .map(|v| CreateLabel::named(v.name.clone())),
    );
    labels.extend(section_label(task));
    labels
}

fn section_label(task: &Task) -> Option<CreateLabel> {
    task.memberships.iter().find_map(|m| {
        let section = m.section.as_ref()?;
        let project = m.project.as_ref()?;
        Some(CreateLabel {
            name: section.name.replace(':', "").trim().to_string(),
            external_id: Some(format!(
                "https://app.asana.com/0/{}/{}",
                project.gid, section.gid
            )),
        })
    })
}

/// `bug` when the task lives in a project named "bug"; otherwise decided by
/// a custom field named "type"; `chore` when neither says anything.
pub fn story_type(task: &Task) -> StoryType {
    if task
        .projects
        .iter()
        .any(|p| p.name.trim().eq_ignore_ascii_case("bug"))
    {
        return StoryType::Bug;
    }

    for field in &task.custom_fields {
        if !field.name.trim().eq_ignore_ascii_case("type") {
            continue;
        }
        let Some(value) = &field.enum_value else {
            continue;
        };
        match value.name.trim().to_lowercase().as_str() {
            "bug" => return StoryType::Bug,
            "feature" => return StoryType::Feature,
            _ => {}
        }
    }

    StoryType::Chore
}

/// `due_on` is a bare date; the deadline is the end of that day.
pub fn deadline(task: &Task) -> Option<String> {
    task.due_on
        .map(|date| format!("{}T23:59:59Z", date.format("%Y-%m-%d")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::asana::{CustomField, EnumValue, Membership, Project, Section, Tag, User};
    use crate::model::clubhouse::{Member, Profile};
    use chrono::NaiveDate;

    fn users() -> UserDirectory {
        UserDirectory::build(
            &[
                User {
                    gid: "10000001".into(),
                    name: "Ada".into(),
                    email: Some("ada@corp.com".into()),
                },
                User {
                    gid: "20000002".into(),
                    name: "Bob".into(),
                    email: Some("bob@corp.com".into()),
                },
            ],
            &[Member {
                id: "m-ada".into(),
                profile: Profile {
                    id: Some("p-ada".into()),
                    mention_name: "ada".into(),
                    email_address: Some("ada@corp.com".into()),
                },
            }],
            false,
        )
    }

    fn ada() -> User {
        User {
            gid: "10000001".into(),
            name: "Ada".into(),
            email: Some("ada@corp.com".into()),
        }
    }

    fn bob() -> User {
        User {
            gid: "20000002".into(),
            name: "Bob".into(),
            email: Some("bob@corp.com".into()),
        }
    }

    fn comment(text: &str, by: User) -> AsanaStory {
        AsanaStory {
            kind: "comment".into(),
            resource_subtype: Some("comment_added".into()),
            text: text.into(),
            created_at: Some("2020-01-02T00:00:00Z".into()),
            created_by: Some(by),
        }
    }

    fn bundle(task: Task) -> TaskBundle {
        TaskBundle {
            task,
            ..Default::default()
        }
    }

    #[test]
    fn story_copies_title_description_and_state() {
        let users = users();
        let ctx = StoryContext {
            asana_project_id: "p1",
            clubhouse_project_id: 9,
            users: &users,
        };
        let task = Task {
            gid: "1".into(),
            name: "  Fix bug ".into(),
            notes: "It crashes\n".into(),
            assignee: Some(ada()),
            ..Default::default()
        };
        let story = ctx.build_story(&bundle(task), &[], Some(500));

        assert_eq!(story.name, "Fix bug");
        assert_eq!(
            story.description,
            "It crashes\n\n> Imported from [Asana](https://app.asana.com/0/p1/1/f)"
        );
        assert_eq!(story.workflow_state_id, Some(500));
        assert_eq!(story.project_id, 9);
        assert_eq!(story.owner_ids, vec!["m-ada".to_string()]);
        assert_eq!(
            story.external_id.as_deref(),
            Some("https://app.asana.com/0/p1/1/f")
        );
        assert!(!story.archived);
    }

    #[test]
    fn completed_task_is_archived_with_override() {
        let users = users();
        let ctx = StoryContext {
            asana_project_id: "p1",
            clubhouse_project_id: 9,
            users: &users,
        };
        let task = Task {
            gid: "1".into(),
            name: "Done".into(),
            completed: true,
            completed_at: Some("2020-05-05T10:00:00Z".into()),
            ..Default::default()
        };
        let story = ctx.build_story(&bundle(task), &[], None);
        assert!(story.archived);
        assert_eq!(
            story.completed_at_override.as_deref(),
            Some("2020-05-05T10:00:00Z")
        );
    }

    #[test]
    fn subtasks_become_checklist_with_nested_bullets() {
        let users = users();
        let ctx = StoryContext {
            asana_project_id: "p1",
            clubhouse_project_id: 9,
            users: &users,
        };
        let child = Task {
            gid: "2".into(),
            name: "Child".into(),
            completed: true,
            level: 1,
            ..Default::default()
        };
        let grandchild = Task {
            gid: "3".into(),
            name: "Grandchild".into(),
            notes: "details".into(),
            level: 2,
            ..Default::default()
        };
        let root = Task {
            gid: "1".into(),
            name: "Root".into(),
            ..Default::default()
        };
        let story = ctx.build_story(&bundle(root), &[bundle(child), bundle(grandchild)], None);

        assert_eq!(story.tasks.len(), 2);
        assert_eq!(
            story.tasks[0].description,
            "[Child](https://app.asana.com/0/p1/2/f)"
        );
        assert!(story.tasks[0].complete);
        assert_eq!(
            story.tasks[1].description,
            " * [Grandchild](https://app.asana.com/0/p1/3/f)\ndetails"
        );
    }

    #[test]
    fn comments_skip_system_and_moved_entries() {
        let users = users();
        let ctx = StoryContext {
            asana_project_id: "p1",
            clubhouse_project_id: 9,
            users: &users,
        };
        let mut system = comment("added to project", ada());
        system.kind = "system".into();
        let moved = comment("The task moved to https://app.clubhouse.io/x/story/1", ada());
        let root = TaskBundle {
            task: Task {
                gid: "1".into(),
                name: "Root".into(),
                ..Default::default()
            },
            stories: vec![system, moved, comment("looks good", ada())],
            file_ids: vec![],
        };

        let comments = ctx.build_comments(&root, 0);
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].text, "looks good");
        assert_eq!(comments[0].author_id.as_deref(), Some("m-ada"));
    }

    #[test]
    fn comment_by_unknown_author_on_subtask_is_attributed() {
        let users = users();
        let ctx = StoryContext {
            asana_project_id: "p1",
            clubhouse_project_id: 9,
            users: &users,
        };
        let mut edited = comment("  hi  ", bob());
        edited.resource_subtype = Some("comment_edited".into());
        let sub = TaskBundle {
            task: Task {
                gid: "2".into(),
                name: "Child".into(),
                level: 1,
                ..Default::default()
            },
            stories: vec![edited],
            file_ids: vec![],
        };

        let comments = ctx.build_comments(&sub, 0);
        assert_eq!(
            comments[0].text,
            "> Posted by: Bob (Edited)\n> Posted on: [Child](https://app.asana.com/0/p1/2/f)\n\nhi"
        );
        assert_eq!(comments[0].author_id, None);
    }

    #[test]
    fn requester_is_author_of_first_story() {
        let users = users();
        let ctx = StoryContext {
            asana_project_id: "p1",
            clubhouse_project_id: 9,
            users: &users,
        };
        let root = TaskBundle {
            task: Task {
                gid: "1".into(),
                name: "Root".into(),
                ..Default::default()
            },
            stories: vec![comment("first", ada()), comment("second", bob())],
            file_ids: vec![4],
        };
        let story = ctx.build_story(&root, &[], None);
        assert_eq!(story.requested_by_id.as_deref(), Some("m-ada"));
        assert_eq!(story.file_ids, vec![4]);
    }

    #[test]
    fn labels_collect_tags_projects_fields_and_section() {
        let task = Task {
            tags: vec![Tag {
                gid: "t".into(),
                name: "urgent".into(),
            }],
            projects: vec![Project {
                gid: "p1".into(),
                name: "Platform".into(),
            }],
            custom_fields: vec![
                CustomField {
                    name: "Priority".into(),
                    enum_value: Some(EnumValue { name: "High".into() }),
                },
                CustomField {
                    name: "Estimate".into(),
                    enum_value: None,
                },
            ],
            memberships: vec![Membership {
                project: Some(Project {
                    gid: "p1".into(),
                    name: "Platform".into(),
                }),
                section: Some(Section {
                    gid: "s1".into(),
                    name: "Backlog:".into(),
                }),
            }],
            ..Default::default()
        };

        let mut labels = labels(&task);
        let names: Vec<&str> = labels.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["From Asana", "urgent", "Platform", "High", "Backlog"]
        );
        let section = labels.pop().unwrap();
        assert_eq!(
            section.external_id.as_deref(),
            Some("https://app.asana.com/0/p1/s1")
        );
    }

    #[test]
    fn story_type_from_project_or_type_field() {
        let bug_project = Task {
            projects: vec![Project {
                gid: "p".into(),
                name: " Bug ".into(),
            }],
            ..Default::default()
        };
        assert_eq!(story_type(&bug_project), StoryType::Bug);

        let feature_field = Task {
            custom_fields: vec![CustomField {
                name: "Type".into(),
                enum_value: Some(EnumValue {
                    name: "Feature".into(),
                }),
            }],
            ..Default::default()
        };
        assert_eq!(story_type(&feature_field), StoryType::Feature);

        assert_eq!(story_type(&Task::default()), StoryType::Chore);
    }

    #[test]
    fn deadline_is_end_of_due_day() {
        let task = Task {
            due_on: NaiveDate::from_ymd_opt(2021, 7, 4),
            ..Default::default()
        };
        assert_eq!(deadline(&task).as_deref(), Some("2021-07-04T23:59:59Z"));
        assert_eq!(deadline(&Task::default()), None);
    }

    #[test]
    fn epic_carries_parent_fields() {
        let users = users();
        let ctx = StoryContext {
            asana_project_id: "p1",
            clubhouse_project_id: 9,
            users: &users,
        };
        let root = bundle(Task {
            gid: "1".into(),
            name: "Big thing".into(),
            notes: "Many parts".into(),
            followers: vec![ada(), bob()],
            ..Default::default()
        });
        let epic = ctx.build_epic(&root);
        assert_eq!(epic.name, "Big thing");
        assert!(epic.description.starts_with("Many parts"));
        assert_eq!(epic.follower_ids, vec!["m-ada".to_string()]);
    }
}
