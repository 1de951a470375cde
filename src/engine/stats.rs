use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::Serialize;

use crate::engine::scoring::{
    DEFAULT_EPSILON, DEFAULT_PRECISION, accuracy, days_since_activity, round_to,
};
use crate::session::entry::{ActivityEvent, VocabularyEntry};

pub const DEFAULT_STALENESS_DAYS: u32 = 10;

#[derive(Clone, Debug)]
pub struct StatsOptions {
    pub epsilon: f64,
    pub precision: u32,
    pub staleness_threshold_days: u32,
}

impl Default for StatsOptions {
    fn default() -> Self {
        Self {
            epsilon: DEFAULT_EPSILON,
            precision: DEFAULT_PRECISION,
            staleness_threshold_days: DEFAULT_STALENESS_DAYS,
        }
    }
}

/// Read-only snapshot of vocabulary health. Distribution metrics are `None`
/// when they are undefined for the collection size (empty vocabulary, or a
/// standard deviation over a single entry).
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Summary {
    pub total_words: usize,
    pub tested_words: usize,
    pub untested_words: usize,
    pub accuracy_mean: Option<f64>,
    pub accuracy_q1: Option<f64>,
    pub accuracy_std_dev: Option<f64>,
    pub days_since_activity_mean: Option<f64>,
    pub days_since_activity_q3: Option<f64>,
    pub stale_fraction: Option<f64>,
    pub total_events: usize,
    pub event_accuracy: Option<f64>,
    pub practice_days: usize,
    pub events_today: usize,
}

impl Summary {
    /// Metric name to value, counts included.
    pub fn as_map(&self) -> BTreeMap<&'static str, Option<f64>> {
        BTreeMap::from([
            ("total_words", Some(self.total_words as f64)),
            ("tested_words", Some(self.tested_words as f64)),
            ("untested_words", Some(self.untested_words as f64)),
            ("accuracy_mean", self.accuracy_mean),
            ("accuracy_q1", self.accuracy_q1),
            ("accuracy_std_dev", self.accuracy_std_dev),
            ("days_since_activity_mean", self.days_since_activity_mean),
            ("days_since_activity_q3", self.days_since_activity_q3),
            ("stale_fraction", self.stale_fraction),
            ("total_events", Some(self.total_events as f64)),
            ("event_accuracy", self.event_accuracy),
            ("practice_days", Some(self.practice_days as f64)),
            ("events_today", Some(self.events_today as f64)),
        ])
    }
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation (n - 1). Undefined below two values.
pub fn sample_std_dev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    Some((ss / (values.len() - 1) as f64).sqrt())
}

/// Quantile by linear interpolation between closest ranks.
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64))
}

pub fn summarize<'a>(
    entries: &[VocabularyEntry],
    history: impl IntoIterator<Item = &'a ActivityEvent>,
    today: NaiveDate,
    options: &StatsOptions,
) -> Summary {
    let round = |v: Option<f64>| v.map(|v| round_to(v, options.precision));

    let tested_words = entries.iter().filter(|e| e.is_tested()).count();
    let accuracies: Vec<f64> = entries
        .iter()
        .map(|e| accuracy(e, options.epsilon))
        .collect();
    let days: Vec<f64> = entries
        .iter()
        .map(|e| days_since_activity(e, today) as f64)
        .collect();
    let stale = days
        .iter()
        .filter(|d| **d > options.staleness_threshold_days as f64)
        .count();
    let stale_fraction = if entries.is_empty() {
        None
    } else {
        Some(stale as f64 / entries.len() as f64)
    };

    let mut total_events = 0;
    let mut correct_events = 0;
    let mut events_today = 0;
    let mut practice_days = BTreeSet::new();
    for event in history {
        total_events += 1;
        if event.correct {
            correct_events += 1;
        }
        let date = event.timestamp.date_naive();
        if date == today {
            events_today += 1;
        }
        practice_days.insert(date);
    }
    let event_accuracy = if total_events == 0 {
        None
    } else {
        Some(correct_events as f64 / total_events as f64)
    };

    Summary {
        total_words: entries.len(),
        tested_words,
        untested_words: entries.len() - tested_words,
        accuracy_mean: round(mean(&accuracies)),
        accuracy_q1: round(quantile(&accuracies, 0.25)),
        accuracy_std_dev: round(sample_std_dev(&accuracies)),
        days_since_activity_mean: round(mean(&days)),
        days_since_activity_q3: round(quantile(&days, 0.75)),
        stale_fraction: round(stale_fraction),
        total_events,
        event_accuracy: round(event_accuracy),
        practice_days: practice_days.len(),
        events_today,
    }
}
