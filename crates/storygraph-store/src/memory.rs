use crate::staging::{
    StagedGraph, check_replace_conflicts, next_story_record, payload_hash, titles_clash,
};
use crate::store::{GraphStore, StoreError, StoreResult};
use crate::types::{
    EntityId, ReplaceGraphRequest, StoredGraph, StoredNode, StoredPath, StoredTransition,
    StoryRecord,
};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Clone, Debug, Default)]
struct MemoryState {
    next_story_id: EntityId,
    next_node_id: EntityId,
    next_path_id: EntityId,
    next_transition_id: EntityId,
    stories: BTreeMap<String, StoryRecord>,
    nodes: BTreeMap<EntityId, StoredNode>,
    paths: BTreeMap<EntityId, StoredPath>,
    transitions: BTreeMap<EntityId, StoredTransition>,
}

impl MemoryState {
    fn title_clash(&self, request: &ReplaceGraphRequest) -> Option<&StoryRecord> {
        let slug = request.slug();
        self.stories.values().find(|story| {
            story.slug != slug
                && story.owner == request.owner
                && titles_clash(&story.title, &request.payload.title)
        })
    }

    fn commit(&mut self, story: StoryRecord, staged: StagedGraph) {
        let story_id = story.id;
        self.transitions.retain(|_, row| row.story_id != story_id);
        self.paths.retain(|_, row| row.story_id != story_id);
        self.nodes.retain(|_, row| row.story_id != story_id);

        self.next_node_id = staged.next_node_id;
        self.next_path_id = staged.next_path_id;
        self.next_transition_id = staged.next_transition_id;
        self.nodes.extend(staged.nodes.into_iter().map(|row| (row.id, row)));
        self.paths.extend(staged.paths.into_iter().map(|row| (row.id, row)));
        self.transitions
            .extend(staged.transitions.into_iter().map(|row| (row.id, row)));
        self.stories.insert(story.slug.clone(), story);
    }
}

/// Process-local store. A replace is staged completely before the state is touched,
/// and applied under a single lock.
#[derive(Clone, Debug, Default)]
pub struct MemoryGraphStore {
    inner: Arc<Mutex<MemoryState>>,
}

impl MemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, MemoryState>> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Backend("memory graph store mutex poisoned".to_string()))
    }
}

#[async_trait::async_trait]
impl GraphStore for MemoryGraphStore {
    async fn replace_graph(&self, request: ReplaceGraphRequest) -> StoreResult<StoryRecord> {
        let mut state = self.lock()?;

        let existing = state.stories.get(request.slug()).cloned();
        check_replace_conflicts(&request, existing.as_ref(), state.title_clash(&request))?;

        let hash = payload_hash(&request.payload)?;
        let story_id = existing
            .as_ref()
            .map(|story| story.id)
            .unwrap_or_else(|| state.next_story_id.max(1));

        let staged = StagedGraph::stage(
            story_id,
            &request.payload,
            state.next_node_id,
            state.next_path_id,
            state.next_transition_id,
        )?;

        let story = next_story_record(story_id, existing.as_ref(), &request, hash);
        if existing.is_none() {
            state.next_story_id = story_id + 1;
        }
        state.commit(story.clone(), staged);

        tracing::info!(
            slug = %story.slug,
            revision = story.revision,
            "replaced story graph in memory store"
        );
        Ok(story)
    }

    async fn get_story(&self, slug: &str) -> StoreResult<Option<StoryRecord>> {
        Ok(self.lock()?.stories.get(slug).cloned())
    }

    async fn load_graph(&self, slug: &str) -> StoreResult<StoredGraph> {
        let state = self.lock()?;
        let story = state
            .stories
            .get(slug)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                resource: "story",
                id: slug.to_string(),
            })?;

        let nodes: Vec<StoredNode> = state
            .nodes
            .values()
            .filter(|row| row.story_id == story.id)
            .cloned()
            .collect();
        let paths: Vec<StoredPath> = state
            .paths
            .values()
            .filter(|row| row.story_id == story.id)
            .cloned()
            .collect();
        let mut transitions: Vec<StoredTransition> = state
            .transitions
            .values()
            .filter(|row| row.story_id == story.id)
            .cloned()
            .collect();
        transitions.sort_by_key(|row| (row.from_node_id, row.ordering, row.id));

        Ok(StoredGraph {
            story,
            nodes,
            paths,
            transitions,
        })
    }
}
