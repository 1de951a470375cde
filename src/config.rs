use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::engine::scoring::{
    DEFAULT_ACCURACY_WEIGHT, DEFAULT_EPSILON, DEFAULT_PRECISION, DEFAULT_RECENCY_CAP_DAYS,
    DEFAULT_RECENCY_WEIGHT, ScoreModel,
};
use crate::engine::selector::{DEFAULT_MIN_WEIGHT, DEFAULT_NOISE_AMPLITUDE, WeightedSelector};
use crate::engine::stats::{DEFAULT_STALENESS_DAYS, StatsOptions};

const MAX_PRECISION: u32 = 6;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_accuracy_weight")]
    pub accuracy_weight: f64,
    #[serde(default = "default_recency_weight")]
    pub recency_weight: f64,
    #[serde(default = "default_epsilon")]
    pub epsilon: f64,
    #[serde(default = "default_recency_cap_days")]
    pub recency_cap_days: u32,
    #[serde(default = "default_score_precision")]
    pub score_precision: u32,
    #[serde(default = "default_noise_amplitude")]
    pub noise_amplitude: f64,
    #[serde(default = "default_min_weight")]
    pub min_weight: f64,
    #[serde(default = "default_staleness_threshold_days")]
    pub staleness_threshold_days: u32,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

fn default_accuracy_weight() -> f64 {
    DEFAULT_ACCURACY_WEIGHT
}
fn default_recency_weight() -> f64 {
    DEFAULT_RECENCY_WEIGHT
}
fn default_epsilon() -> f64 {
    DEFAULT_EPSILON
}
fn default_recency_cap_days() -> u32 {
    DEFAULT_RECENCY_CAP_DAYS
}
fn default_score_precision() -> u32 {
    DEFAULT_PRECISION
}
fn default_noise_amplitude() -> f64 {
    DEFAULT_NOISE_AMPLITUDE
}
fn default_min_weight() -> f64 {
    DEFAULT_MIN_WEIGHT
}
fn default_staleness_threshold_days() -> u32 {
    DEFAULT_STALENESS_DAYS
}
fn default_data_dir() -> String {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("wordrill")
        .to_string_lossy()
        .to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            accuracy_weight: default_accuracy_weight(),
            recency_weight: default_recency_weight(),
            epsilon: default_epsilon(),
            recency_cap_days: default_recency_cap_days(),
            score_precision: default_score_precision(),
            noise_amplitude: default_noise_amplitude(),
            min_weight: default_min_weight(),
            staleness_threshold_days: default_staleness_threshold_days(),
            data_dir: default_data_dir(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = fs::read_to_string(path)?;
            toml::from_str::<Config>(&content)?
        } else {
            Config::default()
        };
        config.validate();
        Ok(config)
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("wordrill")
            .join("config.toml")
    }

    /// Clamp values that would make scores or weights meaningless.
    pub fn validate(&mut self) {
        fn non_negative(value: f64, fallback: f64) -> f64 {
            if value.is_finite() { value.max(0.0) } else { fallback }
        }
        fn positive(value: f64, fallback: f64) -> f64 {
            if value.is_finite() && value > 0.0 { value } else { fallback }
        }

        self.accuracy_weight = non_negative(self.accuracy_weight, default_accuracy_weight());
        self.recency_weight = non_negative(self.recency_weight, default_recency_weight());
        self.noise_amplitude = non_negative(self.noise_amplitude, default_noise_amplitude());
        self.epsilon = positive(self.epsilon, default_epsilon());
        self.min_weight = positive(self.min_weight, default_min_weight());
        self.recency_cap_days = self.recency_cap_days.max(1);
        self.score_precision = self.score_precision.min(MAX_PRECISION);
        if self.data_dir.trim().is_empty() {
            self.data_dir = default_data_dir();
        }
    }

    pub fn data_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir)
    }

    pub fn score_model(&self) -> ScoreModel {
        ScoreModel {
            accuracy_weight: self.accuracy_weight,
            recency_weight: self.recency_weight,
            epsilon: self.epsilon,
            recency_cap_days: self.recency_cap_days,
            precision: self.score_precision,
        }
    }

    pub fn selector(&self) -> WeightedSelector {
        WeightedSelector {
            noise_amplitude: self.noise_amplitude,
            min_weight: self.min_weight,
            score_precision: self.score_precision,
        }
    }

    pub fn stats_options(&self) -> StatsOptions {
        StatsOptions {
            epsilon: self.epsilon,
            precision: self.score_precision,
            staleness_threshold_days: self.staleness_threshold_days,
        }
    }
}
