use crate::{
    CanonicalNode, CanonicalPath, CanonicalTransition, ConvertError, KeyArena, Link, NodeContent,
    MAX_KEY_CHARS, MAX_SLUG_CHARS, MAX_TITLE_CHARS, NodeType, Passage, Provenance, StoryDocument,
    StoryPayload, Visibility, cap_key_base, check_payload_schema, slugify,
};
use serde_json::{Value, json};
use std::collections::{BTreeMap, HashMap};

pub const FALLBACK_SLUG: &str = "untitled-story";
pub const DECISION_TAG: &str = "decision";
pub const TERMINAL_PATH_SUFFIX: &str = "end";
pub const TERMINAL_PATH_LABEL: &str = "End";
pub const SYNOPSIS_MAX_CHARS: usize = 240;
pub const SUMMARY_MAX_CHARS: usize = 500;

const FALLBACK_NODE_KEY: &str = "passage";
const FALLBACK_CHOICE_SLUG: &str = "choice";
const FALLBACK_PATH_LABEL: &str = "Continue";

/// Caller-supplied values that take precedence over derived ones.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConvertOptions {
    pub slug: Option<String>,
    pub title: Option<String>,
    pub summary: Option<String>,
    pub tags: Option<Vec<String>>,
    pub visibility: Option<Visibility>,
}

pub fn convert_document(
    document: &StoryDocument,
    options: &ConvertOptions,
) -> Result<StoryPayload, ConvertError> {
    if document.passages.is_empty() {
        return Err(ConvertError::EmptyDocument);
    }

    let slug = non_blank(options.slug.as_deref())
        .map(str::to_string)
        .or_else(|| {
            Some(cap_key_base(&slugify(&document.name), MAX_SLUG_CHARS))
                .filter(|slug| !slug.is_empty())
        })
        .unwrap_or_else(|| FALLBACK_SLUG.to_string());

    let mut node_keys = KeyArena::new();
    let mut key_by_name: HashMap<&str, String> = HashMap::with_capacity(document.passages.len());
    let mut passage_keys = Vec::with_capacity(document.passages.len());
    for passage in &document.passages {
        let base = Some(cap_key_base(&slugify(&passage.name), MAX_KEY_CHARS))
            .filter(|slug| !slug.is_empty())
            .unwrap_or_else(|| FALLBACK_NODE_KEY.to_string());
        let key = node_keys.claim(&base);
        key_by_name.entry(passage.name.as_str()).or_insert_with(|| key.clone());
        passage_keys.push(key);
    }

    let resolved: Vec<Vec<(&Link, &str)>> = document
        .passages
        .iter()
        .zip(&passage_keys)
        .map(|(passage, node_key)| resolve_links(passage, node_key, &key_by_name))
        .collect();

    let nodes: Vec<CanonicalNode> = document
        .passages
        .iter()
        .zip(&passage_keys)
        .zip(&resolved)
        .map(|((passage, key), links)| build_node(passage, key, links.len()))
        .collect();

    let mut paths = PathSynthesizer::default();
    let mut transitions = Vec::new();
    for (node_key, links) in passage_keys.iter().zip(&resolved) {
        if links.is_empty() {
            let path_key = paths.terminal(node_key);
            transitions.push(CanonicalTransition {
                from: node_key.clone(),
                to: None,
                path: path_key,
                ordering: 0,
            });
            continue;
        }

        for (ordering, (link, destination)) in links.iter().enumerate() {
            let path_key = paths.choice(node_key, link);
            transitions.push(CanonicalTransition {
                from: node_key.clone(),
                to: Some((*destination).to_string()),
                path: path_key,
                ordering: ordering as u32,
            });
        }
    }

    let summary = non_blank(options.summary.as_deref())
        .map(str::to_string)
        .or_else(|| {
            non_blank(document.description.as_deref())
                .map(|description| truncate_chars(description, SUMMARY_MAX_CHARS))
        })
        .unwrap_or_else(|| derive_summary(&nodes));

    let payload = StoryPayload {
        slug,
        title: non_blank(options.title.as_deref())
            .map(str::to_string)
            .unwrap_or_else(|| truncate_chars(&document.name, MAX_TITLE_CHARS)),
        summary,
        tags: options.tags.clone().unwrap_or_else(|| document.tags.clone()),
        visibility: options.visibility.unwrap_or_default(),
        nodes,
        paths: paths.into_paths(),
        transitions,
    };

    check_payload_schema(&payload).map_err(|violation| ConvertError::Schema(violation.to_string()))?;

    tracing::debug!(
        slug = %payload.slug,
        nodes = payload.nodes.len(),
        paths = payload.paths.len(),
        transitions = payload.transitions.len(),
        "converted story document"
    );
    Ok(payload)
}

/// Keeps links whose target names a known passage, paired with the destination key.
fn resolve_links<'a>(
    passage: &'a Passage,
    node_key: &str,
    key_by_name: &'a HashMap<&str, String>,
) -> Vec<(&'a Link, &'a str)> {
    passage
        .links
        .iter()
        .filter_map(|link| match key_by_name.get(link.target.as_str()) {
            Some(destination) => Some((link, destination.as_str())),
            None => {
                tracing::warn!(
                    passage = %passage.name,
                    node = %node_key,
                    target = %link.target,
                    "dropping link to unknown passage"
                );
                None
            }
        })
        .collect()
}

fn build_node(passage: &Passage, key: &str, surviving_links: usize) -> CanonicalNode {
    let media = passage
        .metadata
        .as_ref()
        .and_then(|metadata| metadata.get("media"))
        .and_then(Value::as_object)
        .cloned();

    CanonicalNode {
        key: key.to_string(),
        title: Some(truncate_chars(&passage.name, MAX_TITLE_CHARS)),
        synopsis: synopsis(&passage.text),
        node_type: NodeType::infer(surviving_links, passage.has_tag(DECISION_TAG)),
        content: NodeContent {
            text: passage.text.clone(),
            tags: passage.tags.clone(),
            provenance: Provenance {
                pid: passage.pid,
                name: passage.name.clone(),
                position: passage.position,
                metadata: passage.metadata.clone(),
                raw: passage.source.clone(),
            },
        },
        media,
    }
}

/// Allocates path keys. One path per (source node, choice slug); terminal paths per node.
#[derive(Debug, Default)]
struct PathSynthesizer {
    arena: KeyArena,
    by_choice: BTreeMap<(String, String), String>,
    paths: Vec<CanonicalPath>,
}

impl PathSynthesizer {
    fn terminal(&mut self, node_key: &str) -> String {
        let key = self
            .arena
            .claim(&cap_key_base(&format!("{node_key}-{TERMINAL_PATH_SUFFIX}"), MAX_KEY_CHARS));
        self.paths.push(CanonicalPath {
            key: key.clone(),
            label: TERMINAL_PATH_LABEL.to_string(),
            summary: None,
            metadata: Some(json!({ "ending": true })),
        });
        key
    }

    fn choice(&mut self, node_key: &str, link: &Link) -> String {
        let choice_slug = [link.label.as_str(), link.target.as_str()]
            .into_iter()
            .map(slugify)
            .find(|slug| !slug.is_empty())
            .unwrap_or_else(|| FALLBACK_CHOICE_SLUG.to_string());

        let lookup = (node_key.to_string(), choice_slug);
        if let Some(existing) = self.by_choice.get(&lookup) {
            return existing.clone();
        }

        let key = self
            .arena
            .claim(&cap_key_base(&format!("{node_key}-{}", lookup.1), MAX_KEY_CHARS));
        let label = [link.label.trim(), link.target.trim()]
            .into_iter()
            .find(|label| !label.is_empty())
            .map(|label| truncate_chars(label, MAX_TITLE_CHARS))
            .unwrap_or_else(|| FALLBACK_PATH_LABEL.to_string());
        self.paths.push(CanonicalPath {
            key: key.clone(),
            label,
            summary: None,
            metadata: Some(json!({
                "link": { "label": link.label, "target": link.target }
            })),
        });
        self.by_choice.insert(lookup, key.clone());
        key
    }

    fn into_paths(self) -> Vec<CanonicalPath> {
        self.paths
    }
}

fn synopsis(text: &str) -> Option<String> {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .take(2)
        .collect();
    if lines.is_empty() {
        return None;
    }
    Some(truncate_chars(&lines.join(" "), SYNOPSIS_MAX_CHARS))
}

fn derive_summary(nodes: &[CanonicalNode]) -> String {
    let synopses: Vec<&str> = nodes
        .iter()
        .filter_map(|node| node.synopsis.as_deref())
        .filter(|synopsis| !synopsis.is_empty())
        .take(2)
        .collect();
    truncate_chars(&synopses.join(" "), SUMMARY_MAX_CHARS)
}

/// Cuts to at most `max` characters, ending with an ellipsis when shortened.
pub(crate) fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max.saturating_sub(1)).collect();
    out.truncate(out.trim_end().len());
    out.push('…');
    out
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}
