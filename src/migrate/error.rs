use thiserror::Error;

/// Why a single task could not be migrated. The run carries on with the next
/// task after any of these.
#[derive(Debug, Error)]
pub enum ItemError {
    #[error("reading from Asana failed: {0:#}")]
    Source(anyhow::Error),

    #[error("copying attachments failed: {0:#}")]
    Attachments(anyhow::Error),

    #[error("creating the Clubhouse record failed: {0:#}")]
    Destination(anyhow::Error),

    #[error("created {} before failing: {cause:#}", .created.join(", "))]
    Partial {
        created: Vec<String>,
        cause: anyhow::Error,
    },

    #[error("created {url} but updating the Asana task failed: {cause:#}")]
    WriteBack { url: String, cause: anyhow::Error },
}
