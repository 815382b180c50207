use std::ops::Range;

use tracing::{debug, info, warn};

use crate::providers::Destination;

pub const DEFAULT_PREFIX: &str = "The task moved to https://app.clubhouse.io/";

#[derive(Debug, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub checked: usize,
    pub missing: usize,
    /// Comments deleted, or that would be deleted in preview mode.
    pub matched: usize,
    pub failed: usize,
}

/// Delete comments starting with `prefix` from every story id in `stories`.
/// Per-story errors are logged and counted, never fatal.
pub async fn cleanup_comments(
    destination: &dyn Destination,
    stories: Range<i64>,
    prefix: &str,
    commit: bool,
) -> CleanupReport {
    let mut report = CleanupReport::default();

    for story_id in stories {
        info!("Checking story {story_id}");
        report.checked += 1;

        let story = match destination.get_story(story_id).await {
            Ok(Some(story)) => story,
            Ok(None) => {
                info!("Story {story_id} not found, skipping");
                report.missing += 1;
                continue;
            }
            Err(e) => {
                warn!("Failed to fetch story {story_id}: {e:#}");
                report.failed += 1;
                continue;
            }
        };

        debug!("Story {story_id} '{}' has {} comments", story.name, story.comments.len());
        for comment in story.comments.iter().filter(|c| c.text.starts_with(prefix)) {
            report.matched += 1;
            if !commit {
                info!("Would delete comment {} from story {story_id}", comment.id);
                continue;
            }
            info!("Deleting comment {} from story {story_id}", comment.id);
            if let Err(e) = destination.delete_comment(story_id, comment.id).await {
                warn!("Failed to delete comment {}: {e:#}", comment.id);
                report.failed += 1;
            }
        }
    }

    report
}
