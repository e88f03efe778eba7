// THEORY:
// The `alert_store` module is the engine's memory of past alerts. It is a plain
// keyed map from identity to `AlertRecord`, with two ways in and out of the
// process: `save` writes the whole map as a JSON array in one shot, and `load`
// replaces the map with the contents of such a file.
//
// Key architectural principles:
// 1.  **Explicit Reconciliation**: Memory and disk agree only right after a
//     `save` or `load`. Inserting never touches the file.
// 2.  **Best-Effort Persistence**: `save` and `load` never fail loudly. A missing,
//     unreadable or malformed file is logged and leaves the store as it was.
//     `try_save`/`try_load` expose the same operations with their errors for
//     callers that want to react.
// 3.  **Record-Level Tolerance**: One bad entry in the alert log does not cost
//     the others. Entries missing a field or carrying an unparseable value are
//     skipped with a log line and loading carries on.

use crate::error::{Result, VigilError};
use chrono::{NaiveDate, NaiveTime, SubsecRound, Timelike};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info, warn};

const DATE_FORMAT: &str = "%Y-%m-%d";
const HOUR_FORMAT: &str = "%H:%M:%S";
const HOUR_FORMAT_MILLIS: &str = "%H:%M:%S%.3f";
const HOUR_PARSE_FORMAT: &str = "%H:%M:%S%.f";

/// A persisted alert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertRecord {
    pub id: String,
    pub img_path: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub camera: usize,
}

/// Field to order `AlertStore::sorted_by` results on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    Camera,
    Hour,
    Date,
}

/// On-disk shape of one alert log entry.
#[derive(Debug, Serialize, Deserialize)]
struct AlertEntry {
    id: String,
    #[serde(rename = "imgPath")]
    img_path: String,
    date: String,
    hour: String,
    camera: usize,
}

impl From<&AlertRecord> for AlertEntry {
    fn from(record: &AlertRecord) -> Self {
        let hour_format = if record.time.nanosecond() == 0 {
            HOUR_FORMAT
        } else {
            HOUR_FORMAT_MILLIS
        };
        Self {
            id: record.id.clone(),
            img_path: record.img_path.clone(),
            date: record.date.format(DATE_FORMAT).to_string(),
            hour: record.time.format(hour_format).to_string(),
            camera: record.camera,
        }
    }
}

impl AlertEntry {
    fn into_record(self, index: usize) -> Result<AlertRecord> {
        let malformed = |reason: String| VigilError::MalformedRecord { index, reason };

        if self.id.is_empty() {
            return Err(malformed("empty id".into()));
        }
        if self.img_path.is_empty() {
            return Err(malformed(format!("empty imgPath for {}", self.id)));
        }
        let date = NaiveDate::parse_from_str(&self.date, DATE_FORMAT)
            .map_err(|e| malformed(format!("bad date {:?} for {}: {e}", self.date, self.id)))?;
        let time = NaiveTime::parse_from_str(&self.hour, HOUR_PARSE_FORMAT)
            .map_err(|e| malformed(format!("bad hour {:?} for {}: {e}", self.hour, self.id)))?;

        Ok(AlertRecord {
            id: self.id,
            img_path: self.img_path,
            date,
            time,
            camera: self.camera,
        })
    }
}

/// Keyed collection of alert records. At most one record per id.
#[derive(Debug, Default, Clone)]
pub struct AlertStore {
    records: BTreeMap<String, AlertRecord>,
}

impl AlertStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a record, replacing any existing one under the same id.
    /// `time` is truncated to milliseconds, the precision the alert log keeps.
    pub fn insert(
        &mut self,
        id: impl Into<String>,
        img_path: impl Into<String>,
        date: NaiveDate,
        time: NaiveTime,
        camera: usize,
    ) {
        let id = id.into();
        debug!(%id, camera, "adding alert");
        let record = AlertRecord {
            id: id.clone(),
            img_path: img_path.into(),
            date,
            time: time.trunc_subsecs(3),
            camera,
        };
        self.records.insert(id, record);
        debug!(total = self.records.len(), "alert store size");
    }

    pub fn contains(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&AlertRecord> {
        self.records.get(id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = &AlertRecord> {
        self.records.values()
    }

    /// All records in ascending order of `field`. Ties keep id order.
    pub fn sorted_by(&self, field: SortField) -> Vec<AlertRecord> {
        let mut records: Vec<AlertRecord> = self.records.values().cloned().collect();
        match field {
            SortField::Camera => records.sort_by_key(|r| r.camera),
            SortField::Hour => records.sort_by_key(|r| r.time),
            SortField::Date => records.sort_by_key(|r| r.date),
        }
        records
    }

    /// Writes every record to `path`, logging instead of failing.
    pub fn save(&self, path: &Path) {
        if let Err(e) = self.try_save(path) {
            warn!(path = %path.display(), error = %e, "could not save alerts");
        }
    }

    /// Writes every record to `path` as a single JSON array.
    pub fn try_save(&self, path: &Path) -> Result<()> {
        let entries: Vec<AlertEntry> = self.records.values().map(AlertEntry::from).collect();
        let document = serde_json::to_string_pretty(&entries)?;
        std::fs::write(path, document)?;
        info!(path = %path.display(), count = entries.len(), "alerts saved");
        Ok(())
    }

    /// Replaces the store with the alerts in `path`, logging instead of failing.
    pub fn load(&mut self, path: &Path) {
        if let Err(e) = self.try_load(path) {
            warn!(path = %path.display(), error = %e, "could not load alerts");
        }
    }

    /// Replaces the store with the alerts in `path`.
    ///
    /// On a file-level error the store is left untouched. Otherwise it is cleared
    /// and refilled; malformed entries are skipped. Returns the number loaded.
    pub fn try_load(&mut self, path: &Path) -> Result<usize> {
        let data = std::fs::read(path)?;
        let document: Value = serde_json::from_slice(&data)?;
        let Value::Array(entries) = document else {
            return Err(VigilError::MalformedDocument(format!(
                "expected a JSON array in {}",
                path.display()
            )));
        };

        self.records.clear();

        for (index, value) in entries.into_iter().enumerate() {
            let record = serde_json::from_value::<AlertEntry>(value)
                .map_err(|e| VigilError::MalformedRecord {
                    index,
                    reason: e.to_string(),
                })
                .and_then(|entry| entry.into_record(index));

            match record {
                Ok(record) => {
                    self.records.insert(record.id.clone(), record);
                }
                Err(e) => warn!(error = %e, "skipping alert entry"),
            }
        }

        for record in self.records.values() {
            debug!(
                id = %record.id,
                img_path = %record.img_path,
                date = %record.date,
                hour = %record.time.format(HOUR_FORMAT),
                camera = record.camera,
                "loaded alert"
            );
        }
        info!(path = %path.display(), count = self.records.len(), "alerts loaded");

        Ok(self.records.len())
    }
}
