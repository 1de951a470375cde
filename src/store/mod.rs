pub mod bridge;
pub mod json_store;
pub mod schema;

use crate::error::StoreError;
use crate::session::entry::{ActivityEvent, VocabularyEntry};

pub use bridge::PersistenceBridge;
pub use json_store::JsonStore;

/// Durable home of the vocabulary table and the activity log.
pub trait DurableStore {
    /// All vocabulary rows, ordered by id.
    fn load_vocabulary(&self) -> Result<Vec<VocabularyEntry>, StoreError>;

    /// The full activity log, ordered by id.
    fn load_activity_events(&self) -> Result<Vec<ActivityEvent>, StoreError>;

    /// Highest stored activity id, 0 when the log is empty.
    fn load_max_activity_id(&self) -> Result<u64, StoreError>;

    /// Upsert rows by id. Rows not mentioned are kept.
    fn write_vocabulary(&self, entries: &[VocabularyEntry]) -> Result<(), StoreError>;

    /// Append events to the log in one write. Events already stored verbatim
    /// are skipped; any other reuse of an existing id is an error.
    fn append_activity_events(&self, events: &[ActivityEvent]) -> Result<(), StoreError>;
}
