use crate::{
    ConvertError, ConvertOptions, Diagnostic, PayloadRule, StoryDocument, StoryPayload,
    ValidationError, ValidationStage, convert_document, repair_document_with_report,
    validate_document, validate_payload,
};
use serde_json::Value;

#[derive(Clone, Debug, PartialEq)]
pub struct PreparedStory {
    pub document: StoryDocument,
    pub repairs: Vec<Diagnostic>,
    pub payload: StoryPayload,
}

/// Repair -> pre-validate -> convert -> post-validate.
pub fn prepare_story(raw: &Value, options: &ConvertOptions) -> Result<PreparedStory, ConvertError> {
    prepare_story_with_rules(raw, options, &[])
}

pub fn prepare_story_with_rules(
    raw: &Value,
    options: &ConvertOptions,
    extra_rules: &[&dyn PayloadRule],
) -> Result<PreparedStory, ConvertError> {
    let (document, repairs) = repair_document_with_report(raw);

    validate_document(&document)
        .map_err(|diagnostic| ValidationError::single(ValidationStage::PreConversion, diagnostic))?;

    let payload = convert_document(&document, options)?;

    validate_payload(&payload, extra_rules)
        .map_err(|diagnostic| ValidationError::single(ValidationStage::PostConversion, diagnostic))?;

    Ok(PreparedStory {
        document,
        repairs,
        payload,
    })
}
