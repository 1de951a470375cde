use std::collections::HashSet;

use crate::error::DrillError;
use crate::session::entry::{ActivityEvent, VocabularyEntry};
use crate::session::state::SessionState;
use crate::store::DurableStore;

/// Moves session state in and out of a [`DurableStore`].
pub struct PersistenceBridge<S> {
    store: S,
}

impl<S: DurableStore> PersistenceBridge<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Read vocabulary, history and the highest stored event id. Never writes.
    pub fn load(&self) -> Result<SessionState, DrillError> {
        let entries = self.store.load_vocabulary()?;
        let history = self.store.load_activity_events()?;
        let max_persisted_id = self.store.load_max_activity_id()?;

        validate_entries(&entries)?;
        validate_history(&entries, &history, max_persisted_id)?;

        tracing::info!(
            entries = entries.len(),
            events = history.len(),
            max_persisted_id,
            "loaded session"
        );
        Ok(SessionState::new(entries, history, max_persisted_id))
    }

    /// Write the vocabulary, then the buffered events, and only then clear
    /// the buffer. On error the session is left exactly as it was, and a
    /// retry rewrites the same rows and event ids.
    pub fn flush(&self, state: &mut SessionState) -> Result<usize, DrillError> {
        self.store.write_vocabulary(state.entries())?;
        self.store.append_activity_events(state.pending_events())?;

        let flushed = state.mark_flushed();
        tracing::info!(
            flushed,
            max_persisted_id = state.max_persisted_id(),
            "flushed session"
        );
        Ok(flushed)
    }
}

pub(crate) fn validate_entries(entries: &[VocabularyEntry]) -> Result<(), DrillError> {
    let mut ids = HashSet::new();
    let mut sources = HashSet::new();
    for entry in entries {
        if entry.id == 0 || !ids.insert(entry.id) {
            return Err(DrillError::DataIntegrity(format!(
                "vocabulary id {} is zero or repeated",
                entry.id
            )));
        }
        if entry.source_text.trim().is_empty() || entry.target_text.trim().is_empty() {
            return Err(DrillError::DataIntegrity(format!(
                "vocabulary entry {} has empty text",
                entry.id
            )));
        }
        if !sources.insert(entry.source_key()) {
            return Err(DrillError::DataIntegrity(format!(
                "vocabulary entry {} repeats source \"{}\"",
                entry.id, entry.source_text
            )));
        }
        if let Some(reason) = entry.inconsistency() {
            return Err(DrillError::DataIntegrity(format!(
                "vocabulary entry {} {reason}",
                entry.id
            )));
        }
    }
    Ok(())
}

pub(crate) fn validate_history(
    entries: &[VocabularyEntry],
    history: &[ActivityEvent],
    max_persisted_id: u64,
) -> Result<(), DrillError> {
    let word_ids: HashSet<u64> = entries.iter().map(|e| e.id).collect();
    let mut previous = 0;
    for event in history {
        if event.id <= previous {
            return Err(DrillError::DataIntegrity(format!(
                "activity id {} does not follow {previous}",
                event.id
            )));
        }
        if !word_ids.contains(&event.word_id) {
            return Err(DrillError::DataIntegrity(format!(
                "activity {} references unknown word {}",
                event.id, event.word_id
            )));
        }
        previous = event.id;
    }
    if previous > max_persisted_id {
        return Err(DrillError::DataIntegrity(format!(
            "stored max activity id {max_persisted_id} is below history id {previous}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};

    use chrono::{DateTime, NaiveDate, TimeZone, Utc};

    use super::*;
    use crate::engine::ScoreModel;
    use crate::error::StoreError;

    #[derive(Default)]
    struct MemoryStore {
        vocabulary: RefCell<Vec<VocabularyEntry>>,
        events: RefCell<Vec<ActivityEvent>>,
        fail_vocabulary: Cell<bool>,
        fail_events: Cell<bool>,
    }

    fn unavailable() -> StoreError {
        StoreError::Io {
            path: "memory".into(),
            source: std::io::Error::other("store unavailable"),
        }
    }

    impl DurableStore for &MemoryStore {
        fn load_vocabulary(&self) -> Result<Vec<VocabularyEntry>, StoreError> {
            Ok(self.vocabulary.borrow().clone())
        }

        fn load_activity_events(&self) -> Result<Vec<ActivityEvent>, StoreError> {
            Ok(self.events.borrow().clone())
        }

        fn load_max_activity_id(&self) -> Result<u64, StoreError> {
            Ok(self.events.borrow().iter().map(|e| e.id).max().unwrap_or(0))
        }

        fn write_vocabulary(&self, entries: &[VocabularyEntry]) -> Result<(), StoreError> {
            if self.fail_vocabulary.get() {
                return Err(unavailable());
            }
            let mut rows = self.vocabulary.borrow_mut();
            for entry in entries {
                match rows.iter_mut().find(|r| r.id == entry.id) {
                    Some(row) => *row = entry.clone(),
                    None => rows.push(entry.clone()),
                }
            }
            Ok(())
        }

        fn append_activity_events(&self, events: &[ActivityEvent]) -> Result<(), StoreError> {
            if self.fail_events.get() {
                return Err(unavailable());
            }
            self.events.borrow_mut().extend_from_slice(events);
            Ok(())
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
    }

    fn at(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, d, 9, 30, 0).unwrap()
    }

    fn stored_event(id: u64, word_id: u64) -> ActivityEvent {
        ActivityEvent {
            id,
            word_id,
            correct: true,
            timestamp: at(1),
        }
    }

    fn seeded_store() -> MemoryStore {
        let store = MemoryStore::default();
        let mut tested = VocabularyEntry::new(1, "Hund", "dog", day(1));
        tested.correct_attempts = 2;
        tested.last_activity = Some(day(1));
        *store.vocabulary.borrow_mut() = vec![tested, VocabularyEntry::new(2, "Katze", "cat", day(1))];
        *store.events.borrow_mut() = vec![stored_event(1, 1), stored_event(2, 1)];
        store
    }

    #[test]
    fn load_reads_max_id_and_does_not_write() {
        let store = seeded_store();
        let bridge = PersistenceBridge::new(&store);
        let state = bridge.load().unwrap();
        assert_eq!(state.max_persisted_id(), 2);
        assert_eq!(state.entries().len(), 2);
        assert_eq!(state.merged_activity_history().count(), 2);

        let again = bridge.load().unwrap();
        assert_eq!(again.entries(), state.entries());
    }

    #[test]
    fn empty_store_starts_at_zero() {
        let store = MemoryStore::default();
        let state = PersistenceBridge::new(&store).load().unwrap();
        assert_eq!(state.max_persisted_id(), 0);
        assert!(state.is_empty());
    }

    #[test]
    fn flush_advances_max_by_event_count() {
        let store = seeded_store();
        let bridge = PersistenceBridge::new(&store);
        let mut state = bridge.load().unwrap();
        let model = ScoreModel::default();

        state.record_attempt(2, true, at(3), &model).unwrap();
        state.record_attempt(2, false, at(3), &model).unwrap();
        state.record_attempt(1, true, at(3), &model).unwrap();

        assert_eq!(bridge.flush(&mut state).unwrap(), 3);
        assert_eq!(state.max_persisted_id(), 5);
        assert!(state.pending_events().is_empty());
        assert_eq!(state.record_event(1, true, at(4)).id, 6);

        let ids: Vec<u64> = store.events.borrow().iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
        assert_eq!(store.vocabulary.borrow()[1].attempts(), 2);
    }

    #[test]
    fn failed_event_write_keeps_buffer_for_retry() {
        let store = seeded_store();
        let bridge = PersistenceBridge::new(&store);
        let mut state = bridge.load().unwrap();
        state.record_attempt(2, true, at(3), &ScoreModel::default()).unwrap();

        store.fail_events.set(true);
        assert!(matches!(bridge.flush(&mut state), Err(DrillError::Persistence(_))));
        assert_eq!(state.pending_events().len(), 1);
        assert_eq!(state.max_persisted_id(), 2);

        store.fail_events.set(false);
        assert_eq!(bridge.flush(&mut state).unwrap(), 1);
        let ids: Vec<u64> = store.events.borrow().iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn failed_vocabulary_write_skips_events() {
        let store = seeded_store();
        let bridge = PersistenceBridge::new(&store);
        let mut state = bridge.load().unwrap();
        state.record_event(1, false, at(3));

        store.fail_vocabulary.set(true);
        assert!(bridge.flush(&mut state).is_err());
        assert_eq!(store.events.borrow().len(), 2);
        assert_eq!(state.pending_events().len(), 1);
    }

    #[test]
    fn appended_entries_are_flushed() {
        let store = seeded_store();
        let bridge = PersistenceBridge::new(&store);
        let mut state = bridge.load().unwrap();
        state.append_entry("Vogel", "bird", day(5)).unwrap();
        bridge.flush(&mut state).unwrap();

        let reloaded = bridge.load().unwrap();
        assert_eq!(reloaded.entries().len(), 3);
        assert_eq!(reloaded.entry(3).map(|e| e.source_text.as_str()), Some("Vogel"));
    }

    #[test]
    fn inconsistent_counters_fail_load() {
        let store = seeded_store();
        store.vocabulary.borrow_mut()[1].wrong_attempts = 4;
        let err = PersistenceBridge::new(&store).load().unwrap_err();
        assert!(matches!(err, DrillError::DataIntegrity(_)));
    }

    #[test]
    fn saturated_counters_load_without_panicking() {
        let store = seeded_store();
        {
            let mut rows = store.vocabulary.borrow_mut();
            rows[0].correct_attempts = u32::MAX;
            rows[0].wrong_attempts = 1;
        }
        let state = PersistenceBridge::new(&store).load().unwrap();
        assert_eq!(state.entry(1).unwrap().attempts(), 4_294_967_296);

        // a saturated entry with no practice date is still reported, not wrapped
        store.vocabulary.borrow_mut()[0].last_activity = None;
        let err = PersistenceBridge::new(&store).load().unwrap_err();
        assert!(err.to_string().contains("has attempts but no last activity date"));
    }

    #[test]
    fn out_of_order_history_fails_load() {
        let store = seeded_store();
        store.events.borrow_mut().swap(0, 1);
        let err = PersistenceBridge::new(&store).load().unwrap_err();
        assert!(err.to_string().contains("does not follow"));
    }

    #[test]
    fn dangling_word_reference_fails_load() {
        let store = seeded_store();
        store.events.borrow_mut().push(stored_event(3, 77));
        assert!(PersistenceBridge::new(&store).load().is_err());
    }
}
