use crate::ConvertError;
use serde_json::Value;

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceFormat {
    Json,
    Html,
    Archive,
}

impl SourceFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Html => "html",
            Self::Archive => "archive",
        }
    }
}

/// Converts a non-JSON upload (an HTML story export, an archive) into the interchange format.
pub trait SourceAdapter: Send + Sync {
    fn name(&self) -> &str;
    fn accepts(&self, format: SourceFormat) -> bool;
    fn to_interchange(&self, bytes: &[u8]) -> Result<Value, ConvertError>;
}

pub fn detect_format(bytes: &[u8]) -> SourceFormat {
    if bytes.starts_with(ZIP_MAGIC) {
        return SourceFormat::Archive;
    }
    let body = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    match body.iter().find(|byte| !byte.is_ascii_whitespace()) {
        Some(b'<') => SourceFormat::Html,
        _ => SourceFormat::Json,
    }
}

/// Reads an upload into a JSON value. Nothing is repaired here.
pub fn load_source(bytes: &[u8], adapters: &[&dyn SourceAdapter]) -> Result<Value, ConvertError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(ConvertError::Input("upload is empty".to_string()));
    }

    let format = detect_format(bytes);
    if format != SourceFormat::Json {
        let Some(adapter) = adapters.iter().find(|adapter| adapter.accepts(format)) else {
            return Err(ConvertError::UnsupportedFormat(format!(
                "{} uploads need an adapter",
                format.as_str()
            )));
        };
        tracing::debug!(adapter = adapter.name(), format = format.as_str(), "adapting upload");
        return adapter.to_interchange(bytes);
    }

    let body = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    serde_json::from_slice(body).map_err(|err| ConvertError::Input(format!("invalid JSON: {err}")))
}
