use chrono::{DateTime, NaiveDate, Utc};

use crate::engine::ScoreModel;
use crate::engine::stats::{self, StatsOptions, Summary};
use crate::error::DrillError;
use crate::session::entry::{ActivityEvent, VocabularyEntry, normalize_source};

/// The working set of one run: the vocabulary, the durable history it was
/// loaded with, and the events recorded since the last flush.
#[derive(Clone, Debug, Default)]
pub struct SessionState {
    entries: Vec<VocabularyEntry>,
    durable_history: Vec<ActivityEvent>,
    buffer: Vec<ActivityEvent>,
    max_persisted_id: u64,
}

impl SessionState {
    pub fn new(
        entries: Vec<VocabularyEntry>,
        durable_history: Vec<ActivityEvent>,
        max_persisted_id: u64,
    ) -> Self {
        Self {
            entries,
            durable_history,
            buffer: Vec::new(),
            max_persisted_id,
        }
    }

    pub fn entries(&self) -> &[VocabularyEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entry(&self, id: u64) -> Option<&VocabularyEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn max_persisted_id(&self) -> u64 {
        self.max_persisted_id
    }

    /// Events recorded since the last successful flush, oldest first.
    pub fn pending_events(&self) -> &[ActivityEvent] {
        &self.buffer
    }

    pub fn next_event_id(&self) -> u64 {
        self.max_persisted_id + self.buffer.len() as u64 + 1
    }

    fn next_entry_id(&self) -> u64 {
        self.entries.iter().map(|e| e.id).max().unwrap_or(0) + 1
    }

    /// Append an event for `word_id` to the session buffer. Does not touch
    /// the entry itself; see [`SessionState::record_attempt`].
    pub fn record_event(&mut self, word_id: u64, correct: bool, now: DateTime<Utc>) -> &ActivityEvent {
        let event = ActivityEvent {
            id: self.next_event_id(),
            word_id,
            correct,
            timestamp: now,
        };
        self.buffer.push(event);
        &self.buffer[self.buffer.len() - 1]
    }

    /// Apply a finished practice attempt: counters, last activity, score and
    /// the buffered event. The entry is left untouched if rescoring fails.
    pub fn record_attempt(
        &mut self,
        word_id: u64,
        correct: bool,
        now: DateTime<Utc>,
        model: &ScoreModel,
    ) -> Result<&ActivityEvent, DrillError> {
        let index = self
            .entries
            .iter()
            .position(|e| e.id == word_id)
            .ok_or(DrillError::UnknownEntry(word_id))?;

        let today = now.date_naive();
        let mut updated = self.entries[index].clone();
        let counter = if correct {
            &mut updated.correct_attempts
        } else {
            &mut updated.wrong_attempts
        };
        *counter = counter.checked_add(1).ok_or_else(|| DrillError::InvalidEntry {
            id: word_id,
            reason: "attempt counter is at its maximum".to_string(),
        })?;
        updated.last_activity = Some(today);
        updated.score = model.score(&updated, today)?;

        self.entries[index] = updated;
        Ok(self.record_event(word_id, correct, now))
    }

    /// Add a new word pair. Sources are unique ignoring case.
    pub fn append_entry(
        &mut self,
        source_text: &str,
        target_text: &str,
        today: NaiveDate,
    ) -> Result<&VocabularyEntry, DrillError> {
        let source_text = source_text.trim();
        let target_text = target_text.trim();
        if source_text.is_empty() || target_text.is_empty() {
            return Err(DrillError::EmptyText);
        }

        let key = normalize_source(source_text);
        if self.entries.iter().any(|e| e.source_key() == key) {
            return Err(DrillError::DuplicateEntry(source_text.to_string()));
        }

        let entry = VocabularyEntry::new(self.next_entry_id(), source_text, target_text, today);
        self.entries.push(entry);
        Ok(&self.entries[self.entries.len() - 1])
    }

    pub fn update_all_scores(&mut self, model: &ScoreModel, today: NaiveDate) -> Result<(), DrillError> {
        model.update_all_scores(&mut self.entries, today)
    }

    /// Durable history followed by the session buffer.
    pub fn merged_activity_history(&self) -> impl Iterator<Item = &ActivityEvent> + '_ {
        self.durable_history.iter().chain(self.buffer.iter())
    }

    pub fn summarize(&self, today: NaiveDate, options: &StatsOptions) -> Summary {
        stats::summarize(&self.entries, self.merged_activity_history(), today, options)
    }

    /// Move the buffer into durable history once the store has accepted it.
    pub(crate) fn mark_flushed(&mut self) -> usize {
        let flushed = self.buffer.len();
        self.max_persisted_id += flushed as u64;
        self.durable_history.append(&mut self.buffer);
        flushed
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn noon(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    fn seeded() -> SessionState {
        let today = day(2024, 6, 1);
        let entries = vec![
            VocabularyEntry::new(1, "Hund", "dog", today),
            VocabularyEntry::new(2, "Katze", "cat", today),
        ];
        let history = vec![ActivityEvent {
            id: 41,
            word_id: 1,
            correct: true,
            timestamp: noon(2024, 5, 30),
        }];
        SessionState::new(entries, history, 41)
    }

    #[test]
    fn event_ids_continue_after_persisted_max() {
        let mut state = seeded();
        let first = state.record_event(1, true, noon(2024, 6, 2)).id;
        let second = state.record_event(2, false, noon(2024, 6, 2)).id;
        assert_eq!((first, second), (42, 43));
        assert_eq!(state.pending_events().len(), 2);
    }

    #[test]
    fn mark_flushed_advances_max_and_clears_buffer() {
        let mut state = seeded();
        for _ in 0..3 {
            state.record_event(1, true, noon(2024, 6, 2));
        }
        assert_eq!(state.mark_flushed(), 3);
        assert_eq!(state.max_persisted_id(), 44);
        assert!(state.pending_events().is_empty());
        assert_eq!(state.record_event(2, true, noon(2024, 6, 3)).id, 45);
    }

    #[test]
    fn merged_history_is_durable_then_buffered() {
        let mut state = seeded();
        state.record_event(2, false, noon(2024, 6, 2));
        let ids: Vec<u64> = state.merged_activity_history().map(|e| e.id).collect();
        assert_eq!(ids, vec![41, 42]);
    }

    #[test]
    fn append_assigns_next_id() {
        let mut state = seeded();
        let entry = state.append_entry("Vogel", "bird", day(2024, 6, 2)).unwrap();
        assert_eq!(entry.id, 3);
        assert_eq!(entry.score, 0.0);
        assert_eq!(entry.last_activity, None);
        assert_eq!(entry.date_added, day(2024, 6, 2));
    }

    #[test]
    fn append_rejects_case_insensitive_duplicate() {
        let mut state = seeded();
        let before: Vec<u64> = state.entries().iter().map(|e| e.id).collect();
        let err = state.append_entry("KATZE", "kitty", day(2024, 6, 2)).unwrap_err();
        assert!(matches!(err, DrillError::DuplicateEntry(_)));
        let after: Vec<u64> = state.entries().iter().map(|e| e.id).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn append_rejects_blank_text() {
        let mut state = seeded();
        assert!(matches!(
            state.append_entry("  ", "x", day(2024, 6, 2)),
            Err(DrillError::EmptyText)
        ));
    }

    #[test]
    fn record_attempt_updates_entry_and_buffers_event() {
        let mut state = seeded();
        let model = ScoreModel::default();
        let event = state.record_attempt(2, false, noon(2024, 6, 5), &model).unwrap();
        assert_eq!(event.id, 42);
        assert!(!event.correct);

        let entry = state.entry(2).unwrap();
        assert_eq!(entry.wrong_attempts, 1);
        assert_eq!(entry.last_activity, Some(day(2024, 6, 5)));
        // all wrong, practiced today
        assert_eq!(entry.score, 0.6);
    }

    #[test]
    fn record_attempt_at_counter_limit_is_rejected() {
        let today = day(2024, 6, 1);
        let mut entry = VocabularyEntry::new(1, "Hund", "dog", today);
        entry.correct_attempts = u32::MAX;
        entry.last_activity = Some(today);
        let mut state = SessionState::new(vec![entry], Vec::new(), 0);

        let result = state.record_attempt(1, true, noon(2024, 6, 2), &ScoreModel::default());
        assert!(matches!(result, Err(DrillError::InvalidEntry { id: 1, .. })));
        assert_eq!(state.entry(1).unwrap().correct_attempts, u32::MAX);
        assert!(state.pending_events().is_empty());
    }

    #[test]
    fn record_attempt_for_unknown_word_changes_nothing() {
        let mut state = seeded();
        let model = ScoreModel::default();
        assert!(matches!(
            state.record_attempt(99, true, noon(2024, 6, 5), &model),
            Err(DrillError::UnknownEntry(99))
        ));
        assert!(state.pending_events().is_empty());
    }
}
