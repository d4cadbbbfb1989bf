use crate::staging::{
    RowWriter, check_replace_conflicts, next_story_record, payload_hash, titles_clash, write_rows,
};
use crate::store::{GraphStore, StoreError, StoreResult};
use crate::types::{
    EntityId, ReplaceGraphRequest, StoredGraph, StoredNode, StoredPath, StoredTransition,
    StoryRecord,
};
use rusqlite::{Connection, OptionalExtension, Transaction, params};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use storygraph::{CanonicalNode, CanonicalPath, NodeType, Visibility};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS stories (
      id INTEGER PRIMARY KEY AUTOINCREMENT,
      slug TEXT NOT NULL UNIQUE,
      owner TEXT NOT NULL,
      title TEXT NOT NULL,
      summary TEXT NOT NULL,
      tags_json TEXT NOT NULL,
      visibility TEXT NOT NULL,
      payload_hash TEXT NOT NULL,
      revision INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS story_nodes (
      id INTEGER PRIMARY KEY AUTOINCREMENT,
      story_id INTEGER NOT NULL REFERENCES stories(id),
      key TEXT NOT NULL,
      title TEXT,
      synopsis TEXT,
      node_type TEXT NOT NULL,
      content_json TEXT NOT NULL,
      media_json TEXT,
      UNIQUE (story_id, key)
    );

    CREATE TABLE IF NOT EXISTS story_paths (
      id INTEGER PRIMARY KEY AUTOINCREMENT,
      story_id INTEGER NOT NULL REFERENCES stories(id),
      key TEXT NOT NULL,
      label TEXT NOT NULL,
      summary TEXT,
      metadata_json TEXT,
      UNIQUE (story_id, key)
    );

    CREATE TABLE IF NOT EXISTS story_transitions (
      id INTEGER PRIMARY KEY AUTOINCREMENT,
      story_id INTEGER NOT NULL REFERENCES stories(id),
      from_node_id INTEGER NOT NULL REFERENCES story_nodes(id),
      to_node_id INTEGER REFERENCES story_nodes(id),
      path_id INTEGER NOT NULL REFERENCES story_paths(id),
      ordering INTEGER NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_story_transitions_source
      ON story_transitions(story_id, from_node_id, ordering);
"#;

const STORY_COLUMNS: &str =
    "id, slug, owner, title, summary, tags_json, visibility, payload_hash, revision";

/// SQLite-backed store. A replace runs inside one transaction; any failure rolls it back.
#[derive(Debug)]
pub struct SqliteGraphStore {
    conn: Mutex<Connection>,
}

impl SqliteGraphStore {
    pub fn open(db_path: impl AsRef<Path>) -> StoreResult<Self> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|err| {
                StoreError::Backend(format!("create database directory failed: {err}"))
            })?;
        }
        let conn = Connection::open(db_path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> StoreResult<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Backend("sqlite graph store mutex poisoned".to_string()))
    }
}

#[async_trait::async_trait]
impl GraphStore for SqliteGraphStore {
    async fn replace_graph(&self, request: ReplaceGraphRequest) -> StoreResult<StoryRecord> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let slug = request.slug().to_string();
        let existing = story_by_slug(&tx, &slug)?;
        let title_clash = title_clash_tx(&tx, &request, &slug)?;
        check_replace_conflicts(&request, existing.as_ref(), title_clash.as_ref())?;

        let hash = payload_hash(&request.payload)?;
        let story_id = match &existing {
            Some(story) => story.id,
            None => {
                tx.execute(
                    "INSERT INTO stories(slug, owner, title, summary, tags_json, visibility, payload_hash, revision) \
                     VALUES (?1, ?2, '', '', '[]', ?3, '', 0)",
                    params![slug, request.owner, request.resolved_visibility().as_str()],
                )?;
                tx.last_insert_rowid()
            }
        };
        let story = next_story_record(story_id, existing.as_ref(), &request, hash);

        tx.execute(
            "UPDATE stories SET owner = ?2, title = ?3, summary = ?4, tags_json = ?5, \
             visibility = ?6, payload_hash = ?7, revision = ?8 WHERE id = ?1",
            params![
                story.id,
                story.owner,
                story.title,
                story.summary,
                serde_json::to_string(&story.tags)?,
                story.visibility.as_str(),
                story.payload_hash,
                to_sqlite_i64(story.revision)?,
            ],
        )?;

        tx.execute("DELETE FROM story_transitions WHERE story_id = ?1", params![story_id])?;
        tx.execute("DELETE FROM story_paths WHERE story_id = ?1", params![story_id])?;
        tx.execute("DELETE FROM story_nodes WHERE story_id = ?1", params![story_id])?;

        write_rows(&mut TxRowWriter { tx: &tx }, story_id, &request.payload)?;

        tx.commit()?;
        tracing::info!(
            slug = %story.slug,
            revision = story.revision,
            nodes = request.payload.nodes.len(),
            transitions = request.payload.transitions.len(),
            "replaced story graph in sqlite store"
        );
        Ok(story)
    }

    async fn get_story(&self, slug: &str) -> StoreResult<Option<StoryRecord>> {
        let conn = self.lock()?;
        story_by_slug(&conn, slug)
    }

    async fn load_graph(&self, slug: &str) -> StoreResult<StoredGraph> {
        let conn = self.lock()?;
        let story = story_by_slug(&conn, slug)?.ok_or_else(|| StoreError::NotFound {
            resource: "story",
            id: slug.to_string(),
        })?;

        Ok(StoredGraph {
            nodes: load_nodes(&conn, story.id)?,
            paths: load_paths(&conn, story.id)?,
            transitions: load_transitions(&conn, story.id)?,
            story,
        })
    }
}

struct TxRowWriter<'a, 'conn> {
    tx: &'a Transaction<'conn>,
}

impl RowWriter for TxRowWriter<'_, '_> {
    fn insert_node(&mut self, story_id: EntityId, node: &CanonicalNode) -> StoreResult<EntityId> {
        let media = node.media.as_ref().map(serde_json::to_string).transpose()?;
        self.tx.execute(
            "INSERT INTO story_nodes(story_id, key, title, synopsis, node_type, content_json, media_json) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                story_id,
                node.key,
                node.title,
                node.synopsis,
                node.node_type.as_str(),
                serde_json::to_string(&node.content)?,
                media,
            ],
        )?;
        Ok(self.tx.last_insert_rowid())
    }

    fn insert_path(&mut self, story_id: EntityId, path: &CanonicalPath) -> StoreResult<EntityId> {
        let metadata = path.metadata.as_ref().map(serde_json::to_string).transpose()?;
        self.tx.execute(
            "INSERT INTO story_paths(story_id, key, label, summary, metadata_json) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![story_id, path.key, path.label, path.summary, metadata],
        )?;
        Ok(self.tx.last_insert_rowid())
    }

    fn insert_transition(
        &mut self,
        story_id: EntityId,
        from_node_id: EntityId,
        to_node_id: Option<EntityId>,
        path_id: EntityId,
        ordering: u32,
    ) -> StoreResult<EntityId> {
        self.tx.execute(
            "INSERT INTO story_transitions(story_id, from_node_id, to_node_id, path_id, ordering) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![story_id, from_node_id, to_node_id, path_id, i64::from(ordering)],
        )?;
        Ok(self.tx.last_insert_rowid())
    }
}

struct StoryRow {
    id: EntityId,
    slug: String,
    owner: String,
    title: String,
    summary: String,
    tags_json: String,
    visibility: String,
    payload_hash: String,
    revision: i64,
}

impl StoryRow {
    fn into_record(self) -> StoreResult<StoryRecord> {
        Ok(StoryRecord {
            id: self.id,
            tags: serde_json::from_str(&self.tags_json)?,
            visibility: Visibility::parse(&self.visibility).ok_or_else(|| {
                StoreError::Serialization(format!("unknown visibility '{}'", self.visibility))
            })?,
            revision: u64::try_from(self.revision).map_err(|_| {
                StoreError::Serialization(format!("negative revision {}", self.revision))
            })?,
            slug: self.slug,
            owner: self.owner,
            title: self.title,
            summary: self.summary,
            payload_hash: self.payload_hash,
        })
    }
}

fn story_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoryRow> {
    Ok(StoryRow {
        id: row.get(0)?,
        slug: row.get(1)?,
        owner: row.get(2)?,
        title: row.get(3)?,
        summary: row.get(4)?,
        tags_json: row.get(5)?,
        visibility: row.get(6)?,
        payload_hash: row.get(7)?,
        revision: row.get(8)?,
    })
}

fn story_by_slug(conn: &Connection, slug: &str) -> StoreResult<Option<StoryRecord>> {
    conn.query_row(
        &format!("SELECT {STORY_COLUMNS} FROM stories WHERE slug = ?1"),
        params![slug],
        story_row,
    )
    .optional()?
    .map(StoryRow::into_record)
    .transpose()
}

fn title_clash_tx(
    tx: &Transaction<'_>,
    request: &ReplaceGraphRequest,
    slug: &str,
) -> StoreResult<Option<StoryRecord>> {
    let mut stmt = tx.prepare(&format!(
        "SELECT {STORY_COLUMNS} FROM stories WHERE owner = ?1 AND slug <> ?2"
    ))?;
    let rows = stmt.query_map(params![request.owner, slug], story_row)?;
    for row in rows {
        let story = row?.into_record()?;
        if titles_clash(&story.title, &request.payload.title) {
            return Ok(Some(story));
        }
    }
    Ok(None)
}

fn load_nodes(conn: &Connection, story_id: EntityId) -> StoreResult<Vec<StoredNode>> {
    let mut stmt = conn.prepare(
        "SELECT id, key, title, synopsis, node_type, content_json, media_json \
         FROM story_nodes WHERE story_id = ?1 ORDER BY id",
    )?;
    let rows = stmt.query_map(params![story_id], |row| {
        Ok((
            row.get::<_, EntityId>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, Option<String>>(2)?,
            row.get::<_, Option<String>>(3)?,
            row.get::<_, String>(4)?,
            row.get::<_, String>(5)?,
            row.get::<_, Option<String>>(6)?,
        ))
    })?;

    let mut nodes = Vec::new();
    for row in rows {
        let (id, key, title, synopsis, node_type, content_json, media_json) = row?;
        nodes.push(StoredNode {
            id,
            story_id,
            node_type: NodeType::parse(&node_type).ok_or_else(|| {
                StoreError::Serialization(format!("unknown node type '{node_type}'"))
            })?,
            content: serde_json::from_str(&content_json)?,
            media: media_json.as_deref().map(serde_json::from_str).transpose()?,
            key,
            title,
            synopsis,
        });
    }
    Ok(nodes)
}

fn load_paths(conn: &Connection, story_id: EntityId) -> StoreResult<Vec<StoredPath>> {
    let mut stmt = conn.prepare(
        "SELECT id, key, label, summary, metadata_json \
         FROM story_paths WHERE story_id = ?1 ORDER BY id",
    )?;
    let rows = stmt.query_map(params![story_id], |row| {
        Ok((
            row.get::<_, EntityId>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, Option<String>>(3)?,
            row.get::<_, Option<String>>(4)?,
        ))
    })?;

    let mut paths = Vec::new();
    for row in rows {
        let (id, key, label, summary, metadata_json) = row?;
        paths.push(StoredPath {
            id,
            story_id,
            key,
            label,
            summary,
            metadata: metadata_json.as_deref().map(serde_json::from_str).transpose()?,
        });
    }
    Ok(paths)
}

fn load_transitions(conn: &Connection, story_id: EntityId) -> StoreResult<Vec<StoredTransition>> {
    let mut stmt = conn.prepare(
        "SELECT id, from_node_id, to_node_id, path_id, ordering \
         FROM story_transitions WHERE story_id = ?1 ORDER BY from_node_id, ordering, id",
    )?;
    let rows = stmt.query_map(params![story_id], |row| {
        Ok((
            row.get::<_, EntityId>(0)?,
            row.get::<_, EntityId>(1)?,
            row.get::<_, Option<EntityId>>(2)?,
            row.get::<_, EntityId>(3)?,
            row.get::<_, i64>(4)?,
        ))
    })?;

    let mut transitions = Vec::new();
    for row in rows {
        let (id, from_node_id, to_node_id, path_id, ordering) = row?;
        transitions.push(StoredTransition {
            id,
            story_id,
            from_node_id,
            to_node_id,
            path_id,
            ordering: u32::try_from(ordering).map_err(|_| {
                StoreError::Serialization(format!("ordering {ordering} out of range"))
            })?,
        });
    }
    Ok(transitions)
}

fn to_sqlite_i64(value: u64) -> StoreResult<i64> {
    i64::try_from(value).map_err(|_| StoreError::InvalidInput(format!("{value} exceeds i64")))
}
