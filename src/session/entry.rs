use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::store::schema::last_activity_format;

/// One word pair with its practice statistics.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VocabularyEntry {
    pub id: u64,
    pub source_text: String,
    pub target_text: String,
    pub correct_attempts: u32,
    pub wrong_attempts: u32,
    /// `None` until the first attempt. Stored as `"Not tested"`.
    #[serde(with = "last_activity_format")]
    pub last_activity: Option<NaiveDate>,
    /// Derived priority. Recomputed at load; the stored value is only a cache.
    #[serde(default)]
    pub score: f64,
    pub date_added: NaiveDate,
}

impl VocabularyEntry {
    pub fn new(id: u64, source_text: &str, target_text: &str, today: NaiveDate) -> Self {
        Self {
            id,
            source_text: source_text.to_string(),
            target_text: target_text.to_string(),
            correct_attempts: 0,
            wrong_attempts: 0,
            last_activity: None,
            score: 0.0,
            date_added: today,
        }
    }

    pub fn attempts(&self) -> u64 {
        self.correct_attempts as u64 + self.wrong_attempts as u64
    }

    pub fn is_tested(&self) -> bool {
        self.attempts() > 0
    }

    /// The date recency is measured from: last practice, or creation if never practiced.
    pub fn reference_date(&self) -> NaiveDate {
        self.last_activity.unwrap_or(self.date_added)
    }

    /// Case-insensitive comparison key for duplicate detection.
    pub fn source_key(&self) -> String {
        normalize_source(&self.source_text)
    }

    /// Describe why the counters and `last_activity` disagree, if they do.
    pub fn inconsistency(&self) -> Option<&'static str> {
        match (self.is_tested(), self.last_activity) {
            (true, None) => Some("has attempts but no last activity date"),
            (false, Some(_)) => Some("has a last activity date but no attempts"),
            _ => None,
        }
    }
}

pub fn normalize_source(text: &str) -> String {
    text.trim().to_lowercase()
}

/// One recorded practice attempt. Never mutated after creation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActivityEvent {
    pub id: u64,
    pub word_id: u64,
    pub correct: bool,
    pub timestamp: DateTime<Utc>,
}
