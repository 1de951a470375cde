use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Serialize, de::DeserializeOwned};

use crate::config::Config;
use crate::error::StoreError;
use crate::session::entry::{ActivityEvent, VocabularyEntry};
use crate::store::DurableStore;
use crate::store::bridge::{validate_entries, validate_history};
use crate::store::schema::{ActivityData, EXPORT_VERSION, ExportData, VocabularyData};

const VOCABULARY_FILE: &str = "vocabulary.json";
const ACTIVITY_FILE: &str = "activity.json";

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn write_synced(path: &Path, contents: &str) -> Result<(), StoreError> {
    let mut file = fs::File::create(path).map_err(io_error(path))?;
    file.write_all(contents.as_bytes()).map_err(io_error(path))?;
    file.sync_all().map_err(io_error(path))
}

fn encode<T: Serialize>(name: &str, data: &T) -> Result<String, StoreError> {
    serde_json::to_string_pretty(data).map_err(|source| StoreError::Encode {
        name: name.to_string(),
        source,
    })
}

/// Vocabulary and activity log as two JSON documents in one directory.
/// Every write goes to a `.tmp` sibling first and is renamed into place.
pub struct JsonStore {
    base_dir: PathBuf,
}

impl JsonStore {
    pub fn open(base_dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let base_dir = base_dir.into();
        fs::create_dir_all(&base_dir).map_err(io_error(&base_dir))?;
        Ok(Self { base_dir })
    }

    fn file_path(&self, name: &str) -> PathBuf {
        self.base_dir.join(name)
    }

    /// Missing files read as empty; unreadable or unparsable ones are errors.
    fn load<T: DeserializeOwned + Default>(&self, name: &str) -> Result<T, StoreError> {
        let path = self.file_path(name);
        if !path.exists() {
            return Ok(T::default());
        }
        let content = fs::read_to_string(&path).map_err(io_error(&path))?;
        serde_json::from_str(&content).map_err(|source| StoreError::Corrupt { path, source })
    }

    fn save<T: Serialize>(&self, name: &str, data: &T) -> Result<(), StoreError> {
        let path = self.file_path(name);
        let tmp_path = path.with_extension("tmp");

        let json = encode(name, data)?;
        write_synced(&tmp_path, &json)?;
        fs::rename(&tmp_path, &path).map_err(io_error(&path))
    }

    fn load_activity(&self) -> Result<ActivityData, StoreError> {
        self.load(ACTIVITY_FILE)
    }

    /// Bundle config, vocabulary and activity into one backup document.
    pub fn export_all(&self, config: &Config) -> Result<ExportData, StoreError> {
        Ok(ExportData {
            wordrill_export_version: EXPORT_VERSION,
            exported_at: Utc::now(),
            config: config.clone(),
            vocabulary: self.load(VOCABULARY_FILE)?,
            activity: self.load_activity()?,
        })
    }

    /// Replace the store contents with a backup.
    ///
    /// Stage phase: write every file to `.json.tmp`; on failure remove them.
    /// Commit phase: move each original to `.json.bak`, then the staged file
    /// into place. A failed commit restores the backups. Backups are removed
    /// once every file is committed.
    pub fn import_all(&self, data: &ExportData) -> Result<(), StoreError> {
        if data.wordrill_export_version != EXPORT_VERSION {
            return Err(StoreError::UnsupportedExportVersion {
                found: data.wordrill_export_version,
                expected: EXPORT_VERSION,
            });
        }

        let entries = &data.vocabulary.entries;
        validate_entries(entries)
            .and_then(|()| validate_history(entries, &data.activity.events, data.activity.max_id()))
            .map_err(|e| StoreError::Import {
                stage: "validation",
                message: e.to_string(),
            })?;

        let files: Vec<(&str, String)> = vec![
            (VOCABULARY_FILE, encode(VOCABULARY_FILE, &data.vocabulary)?),
            (ACTIVITY_FILE, encode(ACTIVITY_FILE, &data.activity)?),
        ];

        let mut staged: Vec<PathBuf> = Vec::new();
        for (name, json) in &files {
            let tmp_path = self.file_path(name).with_extension("json.tmp");
            if let Err(e) = write_synced(&tmp_path, json) {
                for tmp in &staged {
                    let _ = fs::remove_file(tmp);
                }
                return Err(StoreError::Import {
                    stage: "staging",
                    message: e.to_string(),
                });
            }
            staged.push(tmp_path);
        }

        // (final_path, bak_path, had_original)
        let mut committed: Vec<(PathBuf, PathBuf, bool)> = Vec::new();
        let rollback = |committed: &[(PathBuf, PathBuf, bool)]| {
            for (final_path, bak_path, had_original) in committed {
                if *had_original {
                    let _ = fs::rename(bak_path, final_path);
                } else {
                    let _ = fs::remove_file(final_path);
                }
            }
        };

        for (i, (name, _)) in files.iter().enumerate() {
            let final_path = self.file_path(name);
            let bak_path = final_path.with_extension("json.bak");
            let had_original = final_path.exists();

            if had_original {
                if let Err(e) = fs::rename(&final_path, &bak_path) {
                    rollback(committed.as_slice());
                    for tmp in &staged {
                        let _ = fs::remove_file(tmp);
                    }
                    return Err(StoreError::Import {
                        stage: "commit (backup)",
                        message: e.to_string(),
                    });
                }
            }

            if let Err(e) = fs::rename(&staged[i], &final_path) {
                if had_original {
                    let _ = fs::rename(&bak_path, &final_path);
                }
                rollback(committed.as_slice());
                for tmp in &staged[i..] {
                    let _ = fs::remove_file(tmp);
                }
                return Err(StoreError::Import {
                    stage: "commit (rename)",
                    message: e.to_string(),
                });
            }

            committed.push((final_path, bak_path, had_original));
        }

        for (_, bak_path, had_original) in &committed {
            if *had_original {
                let _ = fs::remove_file(bak_path);
            }
        }
        tracing::info!(
            entries = data.vocabulary.entries.len(),
            events = data.activity.events.len(),
            "imported backup"
        );
        Ok(())
    }

    /// Resolve `.bak` files left by an interrupted import. A backup whose
    /// final file is missing is the only copy and is moved back into place;
    /// otherwise it is removed. Returns true if any were found.
    pub fn check_interrupted_import(&self) -> Result<bool, StoreError> {
        let mut found = false;
        for name in [VOCABULARY_FILE, ACTIVITY_FILE] {
            let final_path = self.file_path(name);
            let bak_path = final_path.with_extension("json.bak");
            if !bak_path.exists() {
                continue;
            }
            found = true;
            if final_path.exists() {
                fs::remove_file(&bak_path).map_err(io_error(&bak_path))?;
            } else {
                fs::rename(&bak_path, &final_path).map_err(io_error(&final_path))?;
                tracing::warn!(file = name, "restored backup left by an interrupted import");
            }
        }
        Ok(found)
    }
}

pub fn write_export(path: &Path, data: &ExportData) -> Result<(), StoreError> {
    write_synced(path, &encode("export", data)?)
}

pub fn read_export(path: &Path) -> Result<ExportData, StoreError> {
    let content = fs::read_to_string(path).map_err(io_error(path))?;
    serde_json::from_str(&content).map_err(|source| StoreError::Corrupt {
        path: path.to_path_buf(),
        source,
    })
}

impl DurableStore for JsonStore {
    fn load_vocabulary(&self) -> Result<Vec<VocabularyEntry>, StoreError> {
        let mut entries = self.load::<VocabularyData>(VOCABULARY_FILE)?.entries;
        entries.sort_by_key(|e| e.id);
        Ok(entries)
    }

    fn load_activity_events(&self) -> Result<Vec<ActivityEvent>, StoreError> {
        Ok(self.load_activity()?.events)
    }

    fn load_max_activity_id(&self) -> Result<u64, StoreError> {
        Ok(self.load_activity()?.max_id())
    }

    fn write_vocabulary(&self, entries: &[VocabularyEntry]) -> Result<(), StoreError> {
        let stored: VocabularyData = self.load(VOCABULARY_FILE)?;
        let mut rows: BTreeMap<u64, VocabularyEntry> =
            stored.entries.into_iter().map(|e| (e.id, e)).collect();
        for entry in entries {
            rows.insert(entry.id, entry.clone());
        }

        self.save(
            VOCABULARY_FILE,
            &VocabularyData {
                entries: rows.into_values().collect(),
                ..VocabularyData::default()
            },
        )
    }

    fn append_activity_events(&self, events: &[ActivityEvent]) -> Result<(), StoreError> {
        if events.is_empty() {
            return Ok(());
        }

        let mut data = self.load_activity()?;
        let existing: HashMap<u64, &ActivityEvent> = data.events.iter().map(|e| (e.id, e)).collect();
        let mut max_id = data.max_id();
        let mut fresh = Vec::with_capacity(events.len());
        for event in events {
            match existing.get(&event.id) {
                Some(stored) if *stored == event => {
                    tracing::warn!(id = event.id, "activity event already stored, skipping");
                }
                Some(_) => return Err(StoreError::IdCollision { id: event.id }),
                None if event.id <= max_id => return Err(StoreError::IdCollision { id: event.id }),
                None => {
                    max_id = event.id;
                    fresh.push(event.clone());
                }
            }
        }

        data.events.extend(fresh);
        self.save(ACTIVITY_FILE, &data)
    }
}
