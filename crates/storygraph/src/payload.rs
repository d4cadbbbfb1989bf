use crate::Position;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeType {
    Narrative,
    Decision,
    Resolution,
}

impl NodeType {
    /// Total classification over the surviving outgoing link count and the decision tag.
    /// A passage left without links is a resolution even when tagged as a decision.
    pub fn infer(outgoing_links: usize, decision_tagged: bool) -> Self {
        match (outgoing_links, decision_tagged) {
            (0, _) => Self::Resolution,
            (_, true) => Self::Decision,
            (1, false) => Self::Narrative,
            (_, false) => Self::Decision,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Narrative => "NARRATIVE",
            Self::Decision => "DECISION",
            Self::Resolution => "RESOLUTION",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "NARRATIVE" => Some(Self::Narrative),
            "DECISION" => Some(Self::Decision),
            "RESOLUTION" => Some(Self::Resolution),
            _ => None,
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Visibility {
    #[default]
    Private,
    Unlisted,
    Public,
}

impl Visibility {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Private => "PRIVATE",
            Self::Unlisted => "UNLISTED",
            Self::Public => "PUBLIC",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_uppercase().as_str() {
            "PRIVATE" => Some(Self::Private),
            "UNLISTED" => Some(Self::Unlisted),
            "PUBLIC" => Some(Self::Public),
            _ => None,
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    pub pid: u64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
    pub raw: Value,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeContent {
    pub text: String,
    pub tags: Vec<String>,
    pub provenance: Provenance,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CanonicalNode {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synopsis: Option<String>,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    pub content: NodeContent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media: Option<Map<String, Value>>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CanonicalPath {
    pub key: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalTransition {
    pub from: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    pub path: String,
    pub ordering: u32,
}

impl CanonicalTransition {
    pub fn is_terminal(&self) -> bool {
        self.to.is_none()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoryPayload {
    pub slug: String,
    pub title: String,
    pub summary: String,
    pub tags: Vec<String>,
    pub visibility: Visibility,
    pub nodes: Vec<CanonicalNode>,
    pub paths: Vec<CanonicalPath>,
    pub transitions: Vec<CanonicalTransition>,
}

impl StoryPayload {
    pub fn node(&self, key: &str) -> Option<&CanonicalNode> {
        self.nodes.iter().find(|node| node.key == key)
    }

    pub fn path(&self, key: &str) -> Option<&CanonicalPath> {
        self.paths.iter().find(|path| path.key == key)
    }

    pub fn outgoing<'a>(
        &'a self,
        node_key: &'a str,
    ) -> impl Iterator<Item = &'a CanonicalTransition> + 'a {
        self.transitions.iter().filter(move |t| t.from == node_key)
    }
}
