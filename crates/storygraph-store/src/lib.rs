pub mod import;
pub mod memory;
pub mod sqlite;
pub mod staging;
pub mod store;
pub mod types;

pub use import::{ImportError, ImportOptions, ImportOutcome, import_story};
pub use memory::MemoryGraphStore;
pub use sqlite::SqliteGraphStore;
pub use staging::{StagedGraph, payload_hash};
pub use store::{GraphStore, StoreError, StoreResult};
pub use types::{
    EntityId, ReplaceGraphRequest, StoredGraph, StoredNode, StoredPath, StoredTransition,
    StoryRecord,
};
