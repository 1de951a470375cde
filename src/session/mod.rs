pub mod entry;
pub mod state;

pub use entry::{ActivityEvent, VocabularyEntry};
pub use state::SessionState;
