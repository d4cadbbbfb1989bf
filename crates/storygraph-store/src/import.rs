use crate::store::{GraphStore, StoreError};
use crate::types::{ReplaceGraphRequest, StoryRecord};
use serde_json::Value;
use storygraph::{ConvertError, ConvertOptions, Diagnostic, StoryPayload, Visibility, prepare_story};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ImportOptions {
    pub convert: ConvertOptions,
    /// Replace the story stored under this slug rather than the converted one.
    pub target_slug: Option<String>,
    pub visibility: Option<Visibility>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ImportOutcome {
    pub story: StoryRecord,
    pub payload: StoryPayload,
    pub repairs: Vec<Diagnostic>,
}

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error(transparent)]
    Convert(#[from] ConvertError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Runs the conversion pipeline on `raw` and replaces the stored graph with the result.
/// Nothing is written when conversion or validation fails.
pub async fn import_story<S>(
    store: &S,
    owner: &str,
    raw: &Value,
    options: &ImportOptions,
) -> Result<ImportOutcome, ImportError>
where
    S: GraphStore + ?Sized,
{
    let prepared = prepare_story(raw, &options.convert)?;
    if !prepared.repairs.is_empty() {
        tracing::debug!(repairs = prepared.repairs.len(), "document needed repair before import");
    }

    let request = ReplaceGraphRequest {
        owner: owner.to_string(),
        payload: prepared.payload.clone(),
        target_slug: options.target_slug.clone(),
        visibility: options.visibility,
    };
    let story = store.replace_graph(request).await?;

    Ok(ImportOutcome {
        story,
        payload: prepared.payload,
        repairs: prepared.repairs,
    })
}
