use rand::Rng;
use rand::distributions::{Distribution, WeightedIndex};

use crate::engine::scoring::{DEFAULT_PRECISION, round_to};
use crate::error::DrillError;
use crate::session::entry::VocabularyEntry;

pub const DEFAULT_NOISE_AMPLITUDE: f64 = 0.15;
pub const DEFAULT_MIN_WEIGHT: f64 = 0.001;

/// Picks the next word to practice: score plus bounded jitter, then one
/// weighted draw over all entries.
#[derive(Clone, Debug, PartialEq)]
pub struct WeightedSelector {
    pub noise_amplitude: f64,
    pub min_weight: f64,
    /// Precision of the scores being sampled; weights keep one extra digit.
    pub score_precision: u32,
}

impl Default for WeightedSelector {
    fn default() -> Self {
        Self {
            noise_amplitude: DEFAULT_NOISE_AMPLITUDE,
            min_weight: DEFAULT_MIN_WEIGHT,
            score_precision: DEFAULT_PRECISION,
        }
    }
}

impl WeightedSelector {
    /// Jittered, floored selection weight for every entry, in input order.
    pub fn weights<R: Rng + ?Sized>(
        &self,
        entries: &[VocabularyEntry],
        rng: &mut R,
    ) -> Result<Vec<f64>, DrillError> {
        entries
            .iter()
            .enumerate()
            .map(|(index, entry)| {
                if !entry.score.is_finite() {
                    return Err(DrillError::InvalidWeight {
                        index,
                        weight: entry.score,
                    });
                }
                let jitter = if self.noise_amplitude > 0.0 {
                    rng.gen_range(0.0..self.noise_amplitude)
                } else {
                    0.0
                };
                let weight = round_to(entry.score + jitter, self.score_precision + 1);
                Ok(weight.max(self.min_weight))
            })
            .collect()
    }

    /// Index into `entries` of the word to ask next.
    pub fn select<R: Rng + ?Sized>(
        &self,
        entries: &[VocabularyEntry],
        rng: &mut R,
    ) -> Result<usize, DrillError> {
        if entries.is_empty() {
            return Err(DrillError::EmptyVocabulary);
        }

        let weights = self.weights(entries, rng)?;
        if let Some((index, &weight)) = weights
            .iter()
            .enumerate()
            .find(|(_, w)| !w.is_finite() || **w <= 0.0)
        {
            return Err(DrillError::InvalidWeight { index, weight });
        }

        let dist = WeightedIndex::new(&weights).map_err(|_| DrillError::InvalidWeight {
            index: 0,
            weight: weights.iter().sum(),
        })?;
        let index = dist.sample(rng);
        tracing::debug!(index, weight = weights[index], "selected entry");
        Ok(index)
    }
}
