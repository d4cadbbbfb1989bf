use crate::convert::truncate_chars;
use crate::{
    Diagnostic, KeyArena, Link, MAX_TAG_CHARS, PLACEHOLDER_STORY_NAME, Passage, Position, Severity,
    StoryDocument, UntrustedDocument, UntrustedEntry, UntrustedPassage, extract_links,
};
use serde_json::{Map, Value};

/// Normalizes any JSON value into a [`StoryDocument`]. Never fails.
pub fn repair_document(raw: &Value) -> StoryDocument {
    repair_document_with_report(raw).0
}

/// Like [`repair_document`], also returning one diagnostic per fix applied.
pub fn repair_document_with_report(raw: &Value) -> (StoryDocument, Vec<Diagnostic>) {
    let untrusted = UntrustedDocument::from_value(raw);
    let mut report = Vec::new();

    if !raw.is_object() {
        report.push(Diagnostic::new(
            "document_record",
            Severity::Warning,
            "document is not an object; treating it as an empty story",
        ));
    }
    if untrusted.passages.is_some() && !matches!(untrusted.passages, Some(Value::Array(_))) {
        report.push(Diagnostic::new(
            "passages_list",
            Severity::Warning,
            "passages field is not a list; ignoring it",
        ));
    }

    let mut names = KeyArena::new();
    let passages: Vec<Passage> = untrusted
        .entries()
        .into_iter()
        .enumerate()
        .map(|(index, entry)| repair_entry(index + 1, entry, &mut names, &mut report))
        .collect();

    let name = non_empty_string(untrusted.name.as_ref()).unwrap_or_else(|| {
        report.push(Diagnostic::new(
            "document_name",
            Severity::Info,
            format!("document has no name; using '{PLACEHOLDER_STORY_NAME}'"),
        ));
        PLACEHOLDER_STORY_NAME.to_string()
    });

    let start_node = untrusted
        .startnode
        .as_ref()
        .and_then(numeric_id)
        .filter(|pid| passages.iter().any(|p| p.pid == *pid))
        .unwrap_or_else(|| {
            let fallback = passages.first().map(|p| p.pid).unwrap_or(1);
            if untrusted.startnode.is_some() {
                report.push(Diagnostic::new(
                    "start_node",
                    Severity::Warning,
                    format!("start node reference is invalid; using passage id {fallback}"),
                ));
            }
            fallback
        });

    let document = StoryDocument {
        name,
        description: non_empty_string(untrusted.description.as_ref()),
        tags: normalize_tags(untrusted.tags.as_ref()),
        start_node,
        passages,
    };

    for diagnostic in report.iter().filter(|d| d.severity == Severity::Warning) {
        tracing::warn!(rule = %diagnostic.rule, "{}", diagnostic.message);
    }
    tracing::debug!(
        passages = document.passages.len(),
        fixes = report.len(),
        "repaired story document"
    );

    (document, report)
}

fn repair_entry(
    position: usize,
    entry: UntrustedEntry,
    names: &mut KeyArena,
    report: &mut Vec<Diagnostic>,
) -> Passage {
    let placeholder = format!("passage-{position}");
    match entry {
        UntrustedEntry::Malformed(raw) => {
            let name = names.claim(&placeholder);
            report.push(
                Diagnostic::new(
                    "passage_record",
                    Severity::Warning,
                    format!("passage #{position} is not an object; replaced with a placeholder"),
                )
                .with_passage(name.clone()),
            );
            let mut passage = Passage::new(position as u64, name, "");
            passage.source = raw;
            passage
        }
        UntrustedEntry::Record(record) => repair_record(position, placeholder, record, names, report),
    }
}

fn repair_record(
    position: usize,
    placeholder: String,
    record: UntrustedPassage,
    names: &mut KeyArena,
    report: &mut Vec<Diagnostic>,
) -> Passage {
    let declared = non_empty_string(record.name.as_ref()).unwrap_or_else(|| {
        report.push(
            Diagnostic::new(
                "passage_name",
                Severity::Info,
                format!("passage #{position} has no name"),
            )
            .with_passage(placeholder.clone()),
        );
        placeholder
    });
    let name = names.claim(&declared);
    if name != declared {
        report.push(
            Diagnostic::new(
                "unique_names",
                Severity::Info,
                format!("duplicate passage name '{declared}' renamed to '{name}'"),
            )
            .with_passage(name.clone()),
        );
    }

    let pid = record.pid.as_ref().and_then(numeric_id).unwrap_or_else(|| {
        if record.pid.is_some() {
            report.push(
                Diagnostic::new(
                    "passage_pid",
                    Severity::Info,
                    format!("passage id is not numeric; using {position}"),
                )
                .with_passage(name.clone()),
            );
        }
        position as u64
    });

    let text = match &record.text {
        Some(Value::String(text)) => text.clone(),
        _ => String::new(),
    };

    let described: Vec<Link> = match &record.links {
        Some(Value::Array(items)) => items.iter().filter_map(link_from_value).collect(),
        _ => Vec::new(),
    };
    let links = if described.is_empty() {
        extract_links(&text)
    } else {
        described
    };

    let metadata = match record.metadata {
        Some(Value::Object(map)) => Some(map),
        Some(_) => {
            report.push(
                Diagnostic::new(
                    "passage_metadata",
                    Severity::Info,
                    "passage metadata is not an object; discarded",
                )
                .with_passage(name.clone()),
            );
            None
        }
        None => None,
    };

    Passage {
        pid,
        name,
        tags: normalize_tags(record.tags.as_ref()),
        links,
        position: record.position.as_ref().and_then(position_from_value),
        metadata,
        source: record.raw,
        text,
    }
}

/// Link entries name their target under `link`, their label under `name`, and may carry
/// `text`. Entries with none of the three are dropped.
fn link_from_value(value: &Value) -> Option<Link> {
    let Value::Object(map) = value else {
        return None;
    };
    let name = string_field(map, "name");
    let target = string_field(map, "link");
    let text = string_field(map, "text");

    let label = name.clone().or_else(|| text.clone()).or_else(|| target.clone())?;
    let target = target.or(name).or(text)?;
    Some(Link::new(label, target))
}

fn string_field(map: &Map<String, Value>, key: &str) -> Option<String> {
    non_empty_string(map.get(key))
}

fn non_empty_string(value: Option<&Value>) -> Option<String> {
    match value {
        Some(Value::String(text)) if !text.trim().is_empty() => Some(text.trim().to_string()),
        _ => None,
    }
}

fn numeric_id(value: &Value) -> Option<u64> {
    match value {
        Value::Number(number) => number.as_u64(),
        Value::String(text) => text.trim().parse::<u64>().ok(),
        _ => None,
    }
}

fn number_like(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn position_from_value(value: &Value) -> Option<Position> {
    let Value::Object(map) = value else {
        return None;
    };
    Some(Position {
        x: number_like(map.get("x"))?,
        y: number_like(map.get("y"))?,
    })
}

pub(crate) fn normalize_tags(value: Option<&Value>) -> Vec<String> {
    let mut tags: Vec<String> = match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| item.as_str())
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
            .map(str::to_string)
            .collect(),
        Some(Value::String(joined)) => joined
            .split(|ch: char| ch.is_whitespace() || ch == ',')
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    };
    for tag in &mut tags {
        if tag.chars().count() > MAX_TAG_CHARS {
            *tag = truncate_chars(tag, MAX_TAG_CHARS);
        }
    }
    let mut seen = std::collections::HashSet::new();
    tags.retain(|tag| seen.insert(tag.clone()));
    tags
}
