use serde_json::{Value, json};
use storygraph::{ConvertOptions, NodeType, Visibility, prepare_story};
use storygraph_store::{
    GraphStore, ImportError, ImportOptions, MemoryGraphStore, ReplaceGraphRequest, SqliteGraphStore,
    StoreError, import_story,
};

fn ward_v1() -> Value {
    json!({
        "name": "Night Ward",
        "tags": ["medical"],
        "passages": [
            {"pid": 1, "name": "Arrival", "text": "[[Triage]]"},
            {"pid": 2, "name": "Triage", "tags": ["decision"], "text": "[[Resus->Resus]] [[Wait->Waiting]]"},
            {"pid": 3, "name": "Resus", "text": "Stable."},
            {"pid": 4, "name": "Waiting", "text": "The clock ticks."}
        ]
    })
}

fn ward_v2() -> Value {
    json!({
        "name": "Night Ward",
        "passages": [
            {"pid": 1, "name": "Arrival", "text": "[[Discharge]]"},
            {"pid": 2, "name": "Discharge", "text": "Home."}
        ]
    })
}

fn memory() -> MemoryGraphStore {
    MemoryGraphStore::new()
}

fn sqlite() -> SqliteGraphStore {
    SqliteGraphStore::open_in_memory().expect("sqlite store should open")
}

async fn assert_reimport_replaces_graph(store: &dyn GraphStore) {
    let options = ImportOptions::default();
    let first = import_story(store, "ana", &ward_v1(), &options)
        .await
        .expect("first import");
    assert_eq!(first.story.revision, 1);
    assert_eq!(first.story.slug, "night-ward");

    let graph = store.load_graph("night-ward").await.expect("load");
    assert_eq!(graph.nodes.len(), 4);
    assert_eq!(graph.transitions.len(), 5);
    let triage = graph.node_by_key("triage").expect("triage node");
    assert_eq!(triage.node_type, NodeType::Decision);
    let orderings: Vec<u32> = graph.outgoing(triage.id).map(|t| t.ordering).collect();
    assert_eq!(orderings, vec![0, 1]);

    let second = import_story(store, "ana", &ward_v2(), &options)
        .await
        .expect("second import");
    assert_eq!(second.story.id, first.story.id);
    assert_eq!(second.story.revision, 2);
    assert_ne!(second.story.payload_hash, first.story.payload_hash);

    let graph = store.load_graph("night-ward").await.expect("load");
    let keys: Vec<&str> = graph.nodes.iter().map(|node| node.key.as_str()).collect();
    assert_eq!(keys, vec!["arrival", "discharge"]);
    assert_eq!(graph.paths.len(), 2);
    assert_eq!(graph.transitions.len(), 2);
    assert!(graph.node_by_key("triage").is_none());
    for transition in &graph.transitions {
        assert!(graph.node_by_id(transition.from_node_id).is_some());
        assert!(graph.path_by_id(transition.path_id).is_some());
    }
}

async fn assert_failed_replace_keeps_previous_graph(store: &dyn GraphStore) {
    import_story(store, "ana", &ward_v1(), &ImportOptions::default())
        .await
        .expect("first import");
    let before = store.load_graph("night-ward").await.expect("load");

    let mut payload = prepare_story(&ward_v2(), &ConvertOptions::default())
        .expect("prepare")
        .payload;
    payload.transitions[0].to = Some("nowhere".to_string());
    let error = store
        .replace_graph(ReplaceGraphRequest::new("ana", payload))
        .await
        .expect_err("should fail");
    assert!(matches!(
        error,
        StoreError::UnresolvedReference { entity: "node", ref key } if key == "nowhere"
    ));

    let after = store.load_graph("night-ward").await.expect("load");
    assert_eq!(after, before);
}

async fn assert_conflicts_refused(store: &dyn GraphStore) {
    import_story(store, "ana", &ward_v1(), &ImportOptions::default())
        .await
        .expect("first import");

    let error = import_story(store, "bo", &ward_v2(), &ImportOptions::default())
        .await
        .expect_err("different owner should conflict");
    assert!(error.to_string().contains("another owner"), "{error}");

    let renamed = ImportOptions {
        target_slug: Some("ward-copy".to_string()),
        ..ImportOptions::default()
    };
    let error = import_story(store, "ana", &ward_v2(), &renamed)
        .await
        .expect_err("same title under another slug should conflict");
    assert!(error.to_string().contains("already used"), "{error}");

    let graph = store.load_graph("night-ward").await.expect("load");
    assert_eq!(graph.story.revision, 1);
    assert!(store.get_story("ward-copy").await.expect("get").is_none());
}

async fn assert_overrides_applied(store: &dyn GraphStore) {
    let options = ImportOptions {
        convert: ConvertOptions {
            title: Some("Ward, Late".to_string()),
            tags: Some(vec!["night".to_string()]),
            ..ConvertOptions::default()
        },
        target_slug: Some("late-ward".to_string()),
        visibility: Some(Visibility::Unlisted),
    };
    let outcome = import_story(store, "ana", &ward_v1(), &options)
        .await
        .expect("import");

    let story = store
        .get_story("late-ward")
        .await
        .expect("get")
        .expect("story stored under target slug");
    assert_eq!(story, outcome.story);
    assert_eq!(story.title, "Ward, Late");
    assert_eq!(story.tags, vec!["night".to_string()]);
    assert_eq!(story.visibility, Visibility::Unlisted);
}

async fn assert_unsafe_target_slug_refused(store: &dyn GraphStore) {
    let options = ImportOptions {
        target_slug: Some("Bad Slug".to_string()),
        ..ImportOptions::default()
    };
    let error = import_story(store, "ana", &ward_v1(), &options)
        .await
        .expect_err("unsafe slug should be refused");
    assert!(matches!(error, ImportError::Store(StoreError::InvalidInput(_))), "{error}");
    assert!(store.get_story("Bad Slug").await.expect("get").is_none());
}

async fn assert_missing_story_not_found(store: &dyn GraphStore) {
    assert_eq!(store.get_story("ghost").await.expect("get"), None);
    let error = store.load_graph("ghost").await.expect_err("should fail");
    assert!(matches!(error, StoreError::NotFound { resource: "story", .. }));
}

#[tokio::test(flavor = "current_thread")]
async fn memory_store_reimport_expected_graph_replaced() {
    assert_reimport_replaces_graph(&memory()).await;
}

#[tokio::test(flavor = "current_thread")]
async fn sqlite_store_reimport_expected_graph_replaced() {
    assert_reimport_replaces_graph(&sqlite()).await;
}

#[tokio::test(flavor = "current_thread")]
async fn memory_store_unresolved_transition_expected_previous_graph_kept() {
    assert_failed_replace_keeps_previous_graph(&memory()).await;
}

#[tokio::test(flavor = "current_thread")]
async fn sqlite_store_unresolved_transition_expected_previous_graph_kept() {
    assert_failed_replace_keeps_previous_graph(&sqlite()).await;
}

#[tokio::test(flavor = "current_thread")]
async fn memory_store_conflicting_import_expected_refused() {
    assert_conflicts_refused(&memory()).await;
}

#[tokio::test(flavor = "current_thread")]
async fn sqlite_store_conflicting_import_expected_refused() {
    assert_conflicts_refused(&sqlite()).await;
}

#[tokio::test(flavor = "current_thread")]
async fn memory_store_overrides_expected_applied() {
    assert_overrides_applied(&memory()).await;
}

#[tokio::test(flavor = "current_thread")]
async fn sqlite_store_overrides_expected_applied() {
    assert_overrides_applied(&sqlite()).await;
}

#[tokio::test(flavor = "current_thread")]
async fn memory_store_unsafe_target_slug_expected_invalid_input() {
    assert_unsafe_target_slug_refused(&memory()).await;
}

#[tokio::test(flavor = "current_thread")]
async fn sqlite_store_unsafe_target_slug_expected_invalid_input() {
    assert_unsafe_target_slug_refused(&sqlite()).await;
}

#[tokio::test(flavor = "current_thread")]
async fn memory_store_missing_story_expected_not_found() {
    assert_missing_story_not_found(&memory()).await;
}

#[tokio::test(flavor = "current_thread")]
async fn sqlite_store_missing_story_expected_not_found() {
    assert_missing_story_not_found(&sqlite()).await;
}

#[tokio::test(flavor = "current_thread")]
async fn sqlite_file_store_reopen_expected_graph_persisted() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db_path = dir.path().join("nested").join("stories.db");

    {
        let store = SqliteGraphStore::open(&db_path).expect("open");
        import_story(&store, "ana", &ward_v1(), &ImportOptions::default())
            .await
            .expect("import");
    }

    let store = SqliteGraphStore::open(&db_path).expect("reopen");
    let graph = store.load_graph("night-ward").await.expect("load");
    assert_eq!(graph.story.owner, "ana");
    assert_eq!(graph.story.tags, vec!["medical".to_string()]);
    assert_eq!(graph.nodes.len(), 4);
    let terminal: Vec<_> = graph
        .transitions
        .iter()
        .filter(|t| t.to_node_id.is_none())
        .collect();
    assert_eq!(terminal.len(), 2);
}
