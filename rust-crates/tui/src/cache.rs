use std::{
    fs,
    path::{
        Path,
        PathBuf,
    },
};

use chrono::{
    DateTime,
    Utc,
};
use color_eyre::eyre::{
    Result,
    WrapErr,
};
use serde::{
    Deserialize,
    Serialize,
};

pub const CACHE_ROOT: &str = ".haiku";
const DAY_END_FILE: &str = "day_end.json";

/// The last end-of-day instant the client derived, kept on disk so the
/// countdown is stable across restarts. Never authoritative: a freshly
/// derived value always wins, and a record for another day is discarded.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayEndRecord {
    pub day_id: u64,
    pub ends_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct DayEndStore {
    path: PathBuf,
}

impl DayEndStore {
    pub fn new() -> Result<Self> {
        Self::at_root(Path::new(CACHE_ROOT))
    }

    /// Store rooted at an explicit directory, used by tests.
    pub fn at_root(root: &Path) -> Result<Self> {
        if !root.exists() {
            fs::create_dir_all(root).wrap_err_with(|| {
                format!("Failed to create cache directory {}", root.display())
            })?;
        }
        Ok(Self {
            path: root.join(DAY_END_FILE),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the cached record for the given day, if one is present and
    /// readable. Corrupt or stale records are simply dropped.
    pub fn load_for_day(&self, day_id: u64) -> Option<DayEndRecord> {
        let data = fs::read(&self.path).ok()?;
        let record: DayEndRecord = serde_json::from_slice(&data).ok()?;
        (record.day_id == day_id).then_some(record)
    }

    pub fn save(&self, record: &DayEndRecord) -> Result<()> {
        let json = serde_json::to_vec_pretty(record)
            .wrap_err("Failed to serialize day end record")?;
        fs::write(&self.path, json).wrap_err("Failed to write day end record")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use chrono::TimeZone;

    fn temp_store(tag: &str) -> (PathBuf, DayEndStore) {
        let root = std::env::temp_dir().join(format!(
            "haiku-cache-{tag}-{}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&root);
        let store = DayEndStore::at_root(&root).unwrap();
        (root, store)
    }

    #[test]
    fn save_and_load_for_day__round_trips_the_record() {
        // given
        let (root, store) = temp_store("roundtrip");
        let record = DayEndRecord {
            day_id: 42,
            ends_at: Utc.with_ymd_and_hms(2026, 3, 5, 0, 0, 0).unwrap(),
        };

        // when
        store.save(&record).unwrap();

        // then
        assert_eq!(store.load_for_day(42), Some(record));

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn load_for_day__drops_records_for_another_day() {
        let (root, store) = temp_store("stale");
        let record = DayEndRecord {
            day_id: 42,
            ends_at: Utc.with_ymd_and_hms(2026, 3, 5, 0, 0, 0).unwrap(),
        };
        store.save(&record).unwrap();

        assert_eq!(store.load_for_day(43), None);

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn load_for_day__drops_missing_or_corrupt_files() {
        let (root, store) = temp_store("corrupt");
        assert_eq!(store.load_for_day(1), None);

        fs::write(store.path(), b"not json").unwrap();
        assert_eq!(store.load_for_day(1), None);

        let _ = fs::remove_dir_all(&root);
    }
}
