use chrono::NaiveDate;

use crate::error::DrillError;
use crate::session::entry::VocabularyEntry;

pub const DEFAULT_ACCURACY_WEIGHT: f64 = 0.6;
pub const DEFAULT_RECENCY_WEIGHT: f64 = 0.4;
pub const DEFAULT_EPSILON: f64 = 1e-6;
pub const DEFAULT_RECENCY_CAP_DAYS: u32 = 30;
pub const DEFAULT_PRECISION: u32 = 2;

/// Turns an entry's attempt counters and last practice date into a priority.
/// Higher scores mean the word is more urgent to practice.
#[derive(Clone, Debug, PartialEq)]
pub struct ScoreModel {
    pub accuracy_weight: f64,
    pub recency_weight: f64,
    pub epsilon: f64,
    pub recency_cap_days: u32,
    pub precision: u32,
}

impl Default for ScoreModel {
    fn default() -> Self {
        Self {
            accuracy_weight: DEFAULT_ACCURACY_WEIGHT,
            recency_weight: DEFAULT_RECENCY_WEIGHT,
            epsilon: DEFAULT_EPSILON,
            recency_cap_days: DEFAULT_RECENCY_CAP_DAYS,
            precision: DEFAULT_PRECISION,
        }
    }
}

/// Share of correct attempts. The epsilon keeps untested entries at 0.0.
pub fn accuracy(entry: &VocabularyEntry, epsilon: f64) -> f64 {
    let correct = entry.correct_attempts as f64;
    let total = entry.attempts() as f64;
    correct / (total + epsilon)
}

/// Whole days between `today` and the entry's reference date, never negative.
pub fn days_since_activity(entry: &VocabularyEntry, today: NaiveDate) -> i64 {
    today
        .signed_duration_since(entry.reference_date())
        .num_days()
        .max(0)
}

pub fn round_to(value: f64, digits: u32) -> f64 {
    let factor = 10f64.powi(digits as i32);
    (value * factor).round() / factor
}

impl ScoreModel {
    pub fn wrongness(&self, entry: &VocabularyEntry) -> f64 {
        1.0 - accuracy(entry, self.epsilon)
    }

    /// Days since activity scaled linearly onto [0, 1], saturating at the cap.
    pub fn recency_fraction(&self, entry: &VocabularyEntry, today: NaiveDate) -> f64 {
        let cap = self.recency_cap_days.max(1) as i64;
        let days = days_since_activity(entry, today).min(cap);
        days as f64 / cap as f64
    }

    pub fn score(&self, entry: &VocabularyEntry, today: NaiveDate) -> Result<f64, DrillError> {
        if let Some(reason) = entry.inconsistency() {
            return Err(DrillError::InvalidEntry {
                id: entry.id,
                reason: reason.to_string(),
            });
        }

        let raw = self.wrongness(entry) * self.accuracy_weight
            + self.recency_fraction(entry, today) * self.recency_weight;
        if !raw.is_finite() || raw < 0.0 {
            return Err(DrillError::InvalidEntry {
                id: entry.id,
                reason: format!("computed score {raw} is out of range"),
            });
        }

        Ok(round_to(raw, self.precision))
    }

    /// Recompute every score in one pass. Nothing is assigned unless all
    /// entries score successfully.
    pub fn update_all_scores(
        &self,
        entries: &mut [VocabularyEntry],
        today: NaiveDate,
    ) -> Result<(), DrillError> {
        if entries.is_empty() {
            return Err(DrillError::EmptyVocabulary);
        }

        let scores = entries
            .iter()
            .map(|entry| self.score(entry, today))
            .collect::<Result<Vec<_>, _>>()?;
        for (entry, score) in entries.iter_mut().zip(scores) {
            entry.score = score;
        }
        Ok(())
    }
}
