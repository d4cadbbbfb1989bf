use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

static LINK_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[\[(.*?)\]\]").expect("link pattern should compile")
});

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub label: String,
    pub target: String,
}

impl Link {
    pub fn new(label: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            target: target.into(),
        }
    }
}

/// Extracts `[[...]]` links from passage text in order of appearance.
///
/// Supported forms: `[[label->target]]`, `[[label|target]]`, `[[target<-label]]`, `[[target]]`.
pub fn extract_links(text: &str) -> Vec<Link> {
    LINK_PATTERN
        .captures_iter(text)
        .filter_map(|captures| captures.get(1))
        .filter_map(|interior| parse_link_interior(interior.as_str()))
        .collect()
}

fn parse_link_interior(interior: &str) -> Option<Link> {
    if interior.trim().is_empty() {
        return None;
    }

    let (label, target) = if let Some((label, target)) = interior.rsplit_once("->") {
        (label, target)
    } else if let Some((label, target)) = interior.split_once('|') {
        (label, target)
    } else if let Some((target, label)) = interior.split_once("<-") {
        (label, target)
    } else {
        (interior, interior)
    };

    let label = label.trim();
    let target = target.trim();
    match (label.is_empty(), target.is_empty()) {
        (true, true) => None,
        (true, false) => Some(Link::new(target, target)),
        (false, true) => Some(Link::new(label, label)),
        (false, false) => Some(Link::new(label, target)),
    }
}
