use crate::{StoryPayload, is_slug_safe};
use thiserror::Error;

pub const MAX_SLUG_CHARS: usize = 120;
pub const MAX_TITLE_CHARS: usize = 200;
pub const MAX_SUMMARY_CHARS: usize = 1000;
pub const MAX_TAG_CHARS: usize = 64;
pub const MAX_KEY_CHARS: usize = 200;

/// Structural contract every payload satisfies before leaving the converter.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct SchemaViolation {
    pub field: String,
    pub message: String,
}

impl SchemaViolation {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

pub fn check_payload_schema(payload: &StoryPayload) -> Result<(), SchemaViolation> {
    check_key("slug", &payload.slug, MAX_SLUG_CHARS)?;
    check_text("title", &payload.title, MAX_TITLE_CHARS, true)?;
    check_text("summary", &payload.summary, MAX_SUMMARY_CHARS, false)?;

    for (index, tag) in payload.tags.iter().enumerate() {
        check_text(&format!("tags[{index}]"), tag, MAX_TAG_CHARS, true)?;
    }

    for (index, node) in payload.nodes.iter().enumerate() {
        check_key(&format!("nodes[{index}].key"), &node.key, MAX_KEY_CHARS)?;
        if let Some(title) = &node.title {
            check_text(&format!("nodes[{index}].title"), title, MAX_TITLE_CHARS, false)?;
        }
    }

    for (index, path) in payload.paths.iter().enumerate() {
        check_key(&format!("paths[{index}].key"), &path.key, MAX_KEY_CHARS)?;
        check_text(&format!("paths[{index}].label"), &path.label, MAX_TITLE_CHARS, true)?;
    }

    for (index, transition) in payload.transitions.iter().enumerate() {
        check_key(&format!("transitions[{index}].from"), &transition.from, MAX_KEY_CHARS)?;
        check_key(&format!("transitions[{index}].path"), &transition.path, MAX_KEY_CHARS)?;
        if let Some(to) = &transition.to {
            check_key(&format!("transitions[{index}].to"), to, MAX_KEY_CHARS)?;
        }
    }

    Ok(())
}

fn check_key(field: &str, value: &str, max: usize) -> Result<(), SchemaViolation> {
    if value.is_empty() {
        return Err(SchemaViolation::new(field, "must not be empty"));
    }
    if value.chars().count() > max {
        return Err(SchemaViolation::new(
            field,
            format!("must be at most {max} characters"),
        ));
    }
    if !is_slug_safe(value) {
        return Err(SchemaViolation::new(
            field,
            format!("'{value}' must contain only lowercase letters, digits and '-'"),
        ));
    }
    Ok(())
}

fn check_text(field: &str, value: &str, max: usize, required: bool) -> Result<(), SchemaViolation> {
    if required && value.trim().is_empty() {
        return Err(SchemaViolation::new(field, "must not be empty"));
    }
    if value.chars().count() > max {
        return Err(SchemaViolation::new(
            field,
            format!("must be at most {max} characters"),
        ));
    }
    Ok(())
}
