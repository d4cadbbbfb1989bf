use crate::types::{ReplaceGraphRequest, StoredGraph, StoryRecord};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("resource not found: {resource} ({id})")]
    NotFound { resource: &'static str, id: String },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("unresolved {entity} key '{key}'")]
    UnresolvedReference { entity: &'static str, key: String },

    #[error("serialization failed: {0}")]
    Serialization(String),

    #[error("backend failure: {0}")]
    Backend(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Backend(format!("sqlite: {value}"))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization(value.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Owns the persisted story graphs.
///
/// `replace_graph` is replace-all: the story's previous nodes, paths and transitions are
/// deleted and the payload's inserted as one unit. Either all of it lands or none of it does.
#[async_trait::async_trait]
pub trait GraphStore: Send + Sync {
    async fn replace_graph(&self, request: ReplaceGraphRequest) -> StoreResult<StoryRecord>;

    async fn get_story(&self, slug: &str) -> StoreResult<Option<StoryRecord>>;

    async fn load_graph(&self, slug: &str) -> StoreResult<StoredGraph>;
}
