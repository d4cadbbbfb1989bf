use crate::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("unreadable input: {0}")]
    Input(String),
    #[error("unsupported source format: {0}")]
    UnsupportedFormat(String),
    #[error("document contains no passages")]
    EmptyDocument,
    #[error("payload schema violation: {0}")]
    Schema(String),
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

#[derive(Debug, Error, Clone)]
#[error("{stage} validation failed: {}", first_message(.diagnostics))]
pub struct ValidationError {
    pub stage: ValidationStage,
    pub diagnostics: Vec<Diagnostic>,
    pub errors_count: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValidationStage {
    PreConversion,
    PostConversion,
}

impl std::fmt::Display for ValidationStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PreConversion => f.write_str("pre-conversion"),
            Self::PostConversion => f.write_str("post-conversion"),
        }
    }
}

impl ValidationError {
    pub fn new(stage: ValidationStage, diagnostics: Vec<Diagnostic>) -> Self {
        let errors_count = diagnostics.iter().filter(|d| d.is_error()).count();
        Self {
            stage,
            diagnostics,
            errors_count,
        }
    }

    pub fn single(stage: ValidationStage, diagnostic: Diagnostic) -> Self {
        Self::new(stage, vec![diagnostic])
    }
}

fn first_message(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .find(|d| d.is_error())
        .or_else(|| diagnostics.first())
        .map(ToString::to_string)
        .unwrap_or_else(|| "no diagnostics".to_string())
}
