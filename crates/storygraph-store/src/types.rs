use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use storygraph::{NodeContent, NodeType, StoryPayload, Visibility};

pub type EntityId = i64;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReplaceGraphRequest {
    pub owner: String,
    pub payload: StoryPayload,
    /// Stores under this slug instead of the payload's.
    pub target_slug: Option<String>,
    pub visibility: Option<Visibility>,
}

impl ReplaceGraphRequest {
    pub fn new(owner: impl Into<String>, payload: StoryPayload) -> Self {
        Self {
            owner: owner.into(),
            payload,
            target_slug: None,
            visibility: None,
        }
    }

    pub fn slug(&self) -> &str {
        self.target_slug
            .as_deref()
            .map(str::trim)
            .filter(|slug| !slug.is_empty())
            .unwrap_or(self.payload.slug.as_str())
    }

    pub fn resolved_visibility(&self) -> Visibility {
        self.visibility.unwrap_or(self.payload.visibility)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryRecord {
    pub id: EntityId,
    pub slug: String,
    pub owner: String,
    pub title: String,
    pub summary: String,
    pub tags: Vec<String>,
    pub visibility: Visibility,
    pub payload_hash: String,
    pub revision: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoredNode {
    pub id: EntityId,
    pub story_id: EntityId,
    pub key: String,
    pub title: Option<String>,
    pub synopsis: Option<String>,
    pub node_type: NodeType,
    pub content: NodeContent,
    pub media: Option<Map<String, Value>>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoredPath {
    pub id: EntityId,
    pub story_id: EntityId,
    pub key: String,
    pub label: String,
    pub summary: Option<String>,
    pub metadata: Option<Value>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredTransition {
    pub id: EntityId,
    pub story_id: EntityId,
    pub from_node_id: EntityId,
    pub to_node_id: Option<EntityId>,
    pub path_id: EntityId,
    pub ordering: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoredGraph {
    pub story: StoryRecord,
    pub nodes: Vec<StoredNode>,
    pub paths: Vec<StoredPath>,
    pub transitions: Vec<StoredTransition>,
}

impl StoredGraph {
    pub fn node_by_key(&self, key: &str) -> Option<&StoredNode> {
        self.nodes.iter().find(|node| node.key == key)
    }

    pub fn node_by_id(&self, id: EntityId) -> Option<&StoredNode> {
        self.nodes.iter().find(|node| node.id == id)
    }

    pub fn path_by_id(&self, id: EntityId) -> Option<&StoredPath> {
        self.paths.iter().find(|path| path.id == id)
    }

    pub fn outgoing(&self, node_id: EntityId) -> impl Iterator<Item = &StoredTransition> + '_ {
        self.transitions
            .iter()
            .filter(move |transition| transition.from_node_id == node_id)
    }
}
