use crate::store::{StoreError, StoreResult};
use crate::types::{
    EntityId, ReplaceGraphRequest, StoredNode, StoredPath, StoredTransition, StoryRecord,
};
use std::collections::HashMap;
use storygraph::{CanonicalNode, CanonicalPath, StoryPayload, is_slug_safe};

/// Destination for the rows of one graph replace. Each insert returns the storage id.
pub(crate) trait RowWriter {
    fn insert_node(&mut self, story_id: EntityId, node: &CanonicalNode) -> StoreResult<EntityId>;

    fn insert_path(&mut self, story_id: EntityId, path: &CanonicalPath) -> StoreResult<EntityId>;

    fn insert_transition(
        &mut self,
        story_id: EntityId,
        from_node_id: EntityId,
        to_node_id: Option<EntityId>,
        path_id: EntityId,
        ordering: u32,
    ) -> StoreResult<EntityId>;
}

/// Inserts nodes, then paths, then transitions, resolving canonical keys through the
/// ids captured along the way.
pub(crate) fn write_rows<W: RowWriter>(
    writer: &mut W,
    story_id: EntityId,
    payload: &StoryPayload,
) -> StoreResult<()> {
    let mut node_ids: HashMap<&str, EntityId> = HashMap::with_capacity(payload.nodes.len());
    for node in &payload.nodes {
        let id = writer.insert_node(story_id, node)?;
        if node_ids.insert(node.key.as_str(), id).is_some() {
            return Err(StoreError::InvalidInput(format!(
                "node key '{}' appears more than once",
                node.key
            )));
        }
    }

    let mut path_ids: HashMap<&str, EntityId> = HashMap::with_capacity(payload.paths.len());
    for path in &payload.paths {
        let id = writer.insert_path(story_id, path)?;
        if path_ids.insert(path.key.as_str(), id).is_some() {
            return Err(StoreError::InvalidInput(format!(
                "path key '{}' appears more than once",
                path.key
            )));
        }
    }

    let node_id = |key: &str| {
        node_ids
            .get(key)
            .copied()
            .ok_or_else(|| StoreError::UnresolvedReference {
                entity: "node",
                key: key.to_string(),
            })
    };

    for transition in &payload.transitions {
        let from = node_id(transition.from.as_str())?;
        let to = transition.to.as_deref().map(node_id).transpose()?;
        let path = path_ids.get(transition.path.as_str()).copied().ok_or_else(|| {
            StoreError::UnresolvedReference {
                entity: "path",
                key: transition.path.clone(),
            }
        })?;
        writer.insert_transition(story_id, from, to, path, transition.ordering)?;
    }

    Ok(())
}

/// Rows staged in memory with ids allocated from the given counters.
#[derive(Clone, Debug, Default)]
pub struct StagedGraph {
    pub next_node_id: EntityId,
    pub next_path_id: EntityId,
    pub next_transition_id: EntityId,
    pub nodes: Vec<StoredNode>,
    pub paths: Vec<StoredPath>,
    pub transitions: Vec<StoredTransition>,
}

impl StagedGraph {
    pub fn stage(
        story_id: EntityId,
        payload: &StoryPayload,
        next_node_id: EntityId,
        next_path_id: EntityId,
        next_transition_id: EntityId,
    ) -> StoreResult<Self> {
        let mut staged = Self {
            next_node_id,
            next_path_id,
            next_transition_id,
            ..Self::default()
        };
        write_rows(&mut staged, story_id, payload)?;
        Ok(staged)
    }
}

fn allocate(counter: &mut EntityId) -> EntityId {
    if *counter <= 0 {
        *counter = 1;
    }
    let id = *counter;
    *counter += 1;
    id
}

impl RowWriter for StagedGraph {
    fn insert_node(&mut self, story_id: EntityId, node: &CanonicalNode) -> StoreResult<EntityId> {
        let id = allocate(&mut self.next_node_id);
        self.nodes.push(StoredNode {
            id,
            story_id,
            key: node.key.clone(),
            title: node.title.clone(),
            synopsis: node.synopsis.clone(),
            node_type: node.node_type,
            content: node.content.clone(),
            media: node.media.clone(),
        });
        Ok(id)
    }

    fn insert_path(&mut self, story_id: EntityId, path: &CanonicalPath) -> StoreResult<EntityId> {
        let id = allocate(&mut self.next_path_id);
        self.paths.push(StoredPath {
            id,
            story_id,
            key: path.key.clone(),
            label: path.label.clone(),
            summary: path.summary.clone(),
            metadata: path.metadata.clone(),
        });
        Ok(id)
    }

    fn insert_transition(
        &mut self,
        story_id: EntityId,
        from_node_id: EntityId,
        to_node_id: Option<EntityId>,
        path_id: EntityId,
        ordering: u32,
    ) -> StoreResult<EntityId> {
        let id = allocate(&mut self.next_transition_id);
        self.transitions.push(StoredTransition {
            id,
            story_id,
            from_node_id,
            to_node_id,
            path_id,
            ordering,
        });
        Ok(id)
    }
}

pub fn payload_hash(payload: &StoryPayload) -> StoreResult<String> {
    let encoded = serde_json::to_vec(payload)?;
    Ok(blake3::hash(&encoded).to_hex().to_string())
}

/// Identifier and title collisions are refused before anything is deleted.
pub(crate) fn check_replace_conflicts(
    request: &ReplaceGraphRequest,
    existing: Option<&StoryRecord>,
    title_clash: Option<&StoryRecord>,
) -> StoreResult<()> {
    if request.owner.trim().is_empty() {
        return Err(StoreError::InvalidInput("owner must not be empty".to_string()));
    }
    let slug = request.slug();
    if !is_slug_safe(slug) {
        return Err(StoreError::InvalidInput(format!(
            "slug '{slug}' must contain only lowercase letters, digits and '-'"
        )));
    }
    if let Some(existing) = existing {
        if existing.owner != request.owner {
            return Err(StoreError::Conflict(format!(
                "story '{}' belongs to another owner",
                existing.slug
            )));
        }
    }
    if let Some(clash) = title_clash {
        return Err(StoreError::Conflict(format!(
            "title '{}' is already used by story '{}'",
            request.payload.title, clash.slug
        )));
    }
    Ok(())
}

/// The story record as it reads after the replace commits.
pub(crate) fn next_story_record(
    id: EntityId,
    existing: Option<&StoryRecord>,
    request: &ReplaceGraphRequest,
    payload_hash: String,
) -> StoryRecord {
    StoryRecord {
        id,
        slug: request.slug().to_string(),
        owner: request.owner.clone(),
        title: request.payload.title.clone(),
        summary: request.payload.summary.clone(),
        tags: request.payload.tags.clone(),
        visibility: request.resolved_visibility(),
        payload_hash,
        revision: existing.map(|story| story.revision + 1).unwrap_or(1),
    }
}

pub(crate) fn titles_clash(left: &str, right: &str) -> bool {
    left.trim().to_lowercase() == right.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use storygraph::{ConvertOptions, prepare_story};

    fn payload() -> StoryPayload {
        prepare_story(
            &json!({
                "name": "Ward",
                "passages": [
                    {"name": "start", "text": "[[Left->a]] [[Right->b]]"},
                    {"name": "a"},
                    {"name": "b"}
                ]
            }),
            &ConvertOptions::default(),
        )
        .expect("should prepare")
        .payload
    }

    #[test]
    fn stage_payload_expected_ids_resolved_through_keys() {
        let payload = payload();
        let staged = StagedGraph::stage(7, &payload, 10, 20, 30).expect("should stage");

        assert_eq!(staged.nodes.len(), 3);
        assert_eq!(staged.nodes[0].id, 10);
        assert_eq!(staged.paths[0].id, 20);
        assert_eq!(staged.next_node_id, 13);

        let start = staged.nodes.iter().find(|n| n.key == "start").expect("start");
        let a = staged.nodes.iter().find(|n| n.key == "a").expect("a");
        let first = &staged.transitions[0];
        assert_eq!(first.story_id, 7);
        assert_eq!(first.from_node_id, start.id);
        assert_eq!(first.to_node_id, Some(a.id));
        assert_eq!(first.ordering, 0);
    }

    #[test]
    fn stage_unknown_destination_expected_unresolved_reference() {
        let mut payload = payload();
        payload.transitions[1].to = Some("ghost".to_string());
        let error = StagedGraph::stage(1, &payload, 1, 1, 1).expect_err("should fail");
        assert!(matches!(
            error,
            StoreError::UnresolvedReference { entity: "node", ref key } if key == "ghost"
        ));
    }

    #[test]
    fn stage_duplicate_path_key_expected_invalid_input() {
        let mut payload = payload();
        let duplicate = payload.paths[0].clone();
        payload.paths.push(duplicate);
        let error = StagedGraph::stage(1, &payload, 1, 1, 1).expect_err("should fail");
        assert!(matches!(error, StoreError::InvalidInput(_)));
    }

    #[test]
    fn check_replace_conflicts_unsafe_target_slug_expected_invalid_input() {
        let mut request = ReplaceGraphRequest::new("ana", payload());
        request.target_slug = Some("Bad Slug".to_string());
        let error = check_replace_conflicts(&request, None, None).expect_err("should fail");
        assert!(matches!(error, StoreError::InvalidInput(message) if message.contains("Bad Slug")));

        request.target_slug = Some("  night-ward ".to_string());
        check_replace_conflicts(&request, None, None).expect("trimmed safe slug should pass");
    }

    #[test]
    fn payload_hash_same_payload_expected_stable_hex() {
        let first = payload_hash(&payload()).expect("should hash");
        let second = payload_hash(&payload()).expect("should hash");
        assert_eq!(first, second);
        assert_eq!(first.len(), 64);
    }

    #[test]
    fn titles_clash_expected_case_and_whitespace_insensitive() {
        assert!(titles_clash("Night Shift", "  night shift "));
        assert!(!titles_clash("Night Shift", "Day Shift"));
    }
}
