use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::session::entry::{ActivityEvent, VocabularyEntry};

pub const SCHEMA_VERSION: u32 = 1;
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// `last_activity` is stored as a date string, or the literal `"Not tested"`.
pub mod last_activity_format {
    use chrono::NaiveDate;
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::DATE_FORMAT;

    pub const NOT_TESTED: &str = "Not tested";

    pub fn serialize<S: Serializer>(value: &Option<NaiveDate>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(date) => serializer.serialize_str(&date.format(DATE_FORMAT).to_string()),
            None => serializer.serialize_str(NOT_TESTED),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<NaiveDate>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        if raw == NOT_TESTED {
            return Ok(None);
        }
        NaiveDate::parse_from_str(&raw, DATE_FORMAT)
            .map(Some)
            .map_err(|e| D::Error::custom(format!("invalid last_activity {raw:?}: {e}")))
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VocabularyData {
    pub schema_version: u32,
    pub entries: Vec<VocabularyEntry>,
}

impl Default for VocabularyData {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            entries: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ActivityData {
    pub schema_version: u32,
    pub events: Vec<ActivityEvent>,
}

impl Default for ActivityData {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            events: Vec::new(),
        }
    }
}

impl ActivityData {
    pub fn max_id(&self) -> u64 {
        self.events.iter().map(|e| e.id).max().unwrap_or(0)
    }
}

pub const EXPORT_VERSION: u32 = 1;

/// A full backup: settings, vocabulary and every persisted activity event.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExportData {
    pub wordrill_export_version: u32,
    pub exported_at: DateTime<Utc>,
    pub config: Config,
    pub vocabulary: VocabularyData,
    pub activity: ActivityData,
}
