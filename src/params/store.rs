use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Utc;
use tracing::{error, info, warn};

use super::{Adjustment, AdjustmentMap, ParameterSet};
use crate::error::{Result, TunerError};

/// Storage for one parameter document. `store_document` must be an atomic
/// overwrite: readers see either the old document or the new one, never a
/// torn write.
pub trait ConfigBackend {
    /// `Ok(None)` when no document exists yet.
    fn load_document(&self) -> Result<Option<String>>;
    fn store_document(&self, doc: &str) -> Result<()>;
}

/// JSON file on disk; atomicity via write-to-temp-then-rename.
pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl ConfigBackend for JsonFileBackend {
    fn load_document(&self) -> Result<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(doc) => Ok(Some(doc)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(TunerError::ParameterPersistence(format!(
                "reading {}: {}",
                self.path.display(),
                e
            ))),
        }
    }

    fn store_document(&self, doc: &str) -> Result<()> {
        let persist = || -> std::io::Result<()> {
            if let Some(parent) = self.path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent)?;
                }
            }
            let tmp = self.path.with_extension("json.tmp");
            fs::write(&tmp, doc)?;
            fs::rename(&tmp, &self.path)
        };
        persist().map_err(|e| {
            TunerError::ParameterPersistence(format!("writing {}: {}", self.path.display(), e))
        })
    }
}

/// In-memory backend for tests and dry runs.
#[derive(Default)]
pub struct MemoryBackend {
    doc: Mutex<Option<String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConfigBackend for MemoryBackend {
    fn load_document(&self) -> Result<Option<String>> {
        Ok(self.doc.lock().expect("backend lock poisoned").clone())
    }

    fn store_document(&self, doc: &str) -> Result<()> {
        *self.doc.lock().expect("backend lock poisoned") = Some(doc.to_string());
        Ok(())
    }
}

const MAX_BACKUPS: usize = 5;

/// Versioned, backed-up owner of the [`ParameterSet`].
///
/// Mutations are not atomic across backup+apply; callers must serialize
/// them. The store assumes at most one in-flight mutation.
pub struct ParameterStore<B: ConfigBackend> {
    backend: B,
    current: ParameterSet,
    backups: VecDeque<ParameterSet>,
}

impl<B: ConfigBackend> ParameterStore<B> {
    /// Load from the backend; absence or corruption falls back to the
    /// default set, which is persisted immediately.
    pub fn open(backend: B) -> Self {
        let current = match backend.load_document() {
            Ok(Some(doc)) => match serde_json::from_str::<ParameterSet>(&doc) {
                Ok(set) => {
                    info!("loaded parameter set version {}", set.version);
                    set
                }
                Err(e) => {
                    warn!("parameter document corrupt ({}), recreating defaults", e);
                    Self::persist_default(&backend)
                }
            },
            Ok(None) => {
                info!("no parameter document found, creating defaults");
                Self::persist_default(&backend)
            }
            Err(e) => {
                warn!("parameter backend unreadable ({}), using defaults", e);
                ParameterSet::default()
            }
        };

        Self {
            backend,
            current,
            backups: VecDeque::new(),
        }
    }

    fn persist_default(backend: &B) -> ParameterSet {
        let set = ParameterSet::default();
        match serde_json::to_string_pretty(&set) {
            Ok(doc) => {
                if let Err(e) = backend.store_document(&doc) {
                    error!("could not persist default parameters: {}", e);
                }
            }
            Err(e) => error!("could not serialize default parameters: {}", e),
        }
        set
    }

    pub fn current(&self) -> &ParameterSet {
        &self.current
    }

    pub fn backup_count(&self) -> usize {
        self.backups.len()
    }

    /// Persist the current set, stamping `last_updated`.
    pub fn save(&mut self) -> Result<()> {
        self.current.last_updated = Utc::now();
        let doc = serde_json::to_string_pretty(&self.current)
            .map_err(|e| TunerError::ParameterPersistence(e.to_string()))?;
        self.backend.store_document(&doc)?;
        info!("saved parameter set version {}", self.current.version);
        Ok(())
    }

    /// Snapshot the current set onto the backup ring (max 5, oldest out).
    pub fn backup(&mut self) {
        self.backups.push_back(self.current.clone());
        while self.backups.len() > MAX_BACKUPS {
            self.backups.pop_front();
        }
    }

    /// Apply keyed adjustments, bump the version by 0.1 and stamp the
    /// grade. The whole map is validated against a scratch copy first, so
    /// an unknown key rejects the call with the stored set untouched. A
    /// persistence failure rolls back automatically.
    pub fn apply_adjustments(&mut self, adjustments: &AdjustmentMap) -> Result<&ParameterSet> {
        self.apply_with_grade(adjustments, "TUNED")
    }

    pub fn apply_with_grade(
        &mut self,
        adjustments: &AdjustmentMap,
        grade: &str,
    ) -> Result<&ParameterSet> {
        if adjustments.is_empty() {
            return Err(TunerError::InvalidConfiguration(
                "empty adjustment map".to_string(),
            ));
        }

        let mut next = self.current.clone();
        for (key, adjustment) in adjustments {
            next.apply(key, *adjustment)?;
        }
        next.version = self.current.version.bump();
        next.performance_grade = grade.to_string();

        self.backup();
        self.current = next;

        if let Err(e) = self.save() {
            warn!("persistence failed after apply ({}), rolling back", e);
            self.rollback()?;
            return Err(e);
        }

        info!(
            "applied {} adjustments, now at version {}",
            adjustments.len(),
            self.current.version
        );
        Ok(&self.current)
    }

    /// Replace key fields with a preset tuned for one metric; grounded in
    /// the documented optimization profiles.
    pub fn optimize_for_metric(&mut self, metric: &str) -> Result<&ParameterSet> {
        let presets: &[(&str, f64)] = match metric {
            "score_accuracy" => &[
                ("pitcher.era_weight", 0.4),
                ("pitcher.recent_form_weight", 0.35),
                ("team.offensive_runs_weight", 0.45),
                ("advanced.regression_factor", 0.2),
            ],
            "win_probability" => &[
                ("team.recent_form_weight", 0.3),
                ("pitcher.era_weight", 0.3),
                ("team.home_field_advantage", 0.2),
                ("game_situation.series_opener_adjustment", 0.05),
            ],
            "betting_roi" => &[
                ("betting.minimum_edge_percentage", 7.0),
                ("betting.high_confidence_threshold", 0.7),
                ("betting.conservative_bet_percentage", 1.5),
            ],
            other => {
                return Err(TunerError::InvalidConfiguration(format!(
                    "no optimization profile for metric: {}",
                    other
                )))
            }
        };

        let map: AdjustmentMap = presets
            .iter()
            .map(|(path, value)| (path.to_string(), Adjustment::Set(*value)))
            .collect();
        let grade = format!("OPTIMIZED_FOR_{}", metric.to_uppercase());
        self.apply_with_grade(&map, &grade)
    }

    /// Restore the most recent backup, field for field.
    pub fn rollback(&mut self) -> Result<&ParameterSet> {
        let previous = self.backups.pop_back().ok_or_else(|| {
            TunerError::ParameterPersistence("no backup available to roll back to".to_string())
        })?;
        info!(
            "rolled back from version {} to {}",
            self.current.version, previous.version
        );
        self.current = previous;
        Ok(&self.current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ParamVersion;

    fn store() -> ParameterStore<MemoryBackend> {
        ParameterStore::open(MemoryBackend::new())
    }

    fn multiply(key: &str, factor: f64) -> AdjustmentMap {
        let mut map = AdjustmentMap::new();
        map.insert(key.to_string(), Adjustment::Multiply(factor));
        map
    }

    #[test]
    fn test_open_creates_and_persists_default() {
        let backend = MemoryBackend::new();
        assert!(backend.load_document().unwrap().is_none());
        let store = ParameterStore::open(backend);
        assert_eq!(store.current().version, ParamVersion::initial());
        assert!(store.backend.load_document().unwrap().is_some());
    }

    #[test]
    fn test_open_recovers_from_corruption() {
        let backend = MemoryBackend::new();
        backend.store_document("{ not json").unwrap();
        let store = ParameterStore::open(backend);
        assert_eq!(store.current().performance_grade, "UNTESTED");
        // The corrupt document was replaced by a valid default.
        let doc = store.backend.load_document().unwrap().unwrap();
        assert!(serde_json::from_str::<ParameterSet>(&doc).is_ok());
    }

    #[test]
    fn test_scenario_d_apply_bumps_version_and_fields() {
        let mut store = store();
        assert_eq!(store.current().pitcher.era_weight, 0.35);

        store
            .apply_adjustments(&multiply("pitcher_impact_weight", 1.2))
            .unwrap();
        assert!((store.current().pitcher.era_weight - 0.42).abs() < 1e-12);
        assert_eq!(store.current().version.to_string(), "1.1");
        assert_eq!(store.current().performance_grade, "TUNED");
    }

    #[test]
    fn test_version_never_decreases() {
        let mut store = store();
        let mut last = store.current().version;
        for _ in 0..12 {
            store
                .apply_adjustments(&multiply("pitcher_impact_weight", 1.01))
                .unwrap();
            let v = store.current().version;
            assert!(v > last);
            last = v;
        }
        assert_eq!(last.to_string(), "2.2");
    }

    #[test]
    fn test_rollback_restores_exact_fields() {
        let mut store = store();
        let before = store.current().clone();

        store
            .apply_adjustments(&multiply("pitcher_impact_weight", 1.3))
            .unwrap();
        assert_ne!(store.current(), &before);

        store.rollback().unwrap();
        assert_eq!(store.current(), &before);
    }

    #[test]
    fn test_unknown_key_leaves_store_untouched() {
        let mut store = store();
        let before = store.current().clone();

        let err = store
            .apply_adjustments(&multiply("warp_factor", 2.0))
            .unwrap_err();
        assert!(matches!(err, TunerError::InvalidConfiguration(_)));
        assert_eq!(store.current(), &before);
        assert_eq!(store.backup_count(), 0);
    }

    #[test]
    fn test_backup_ring_bounded() {
        let mut store = store();
        for _ in 0..8 {
            store
                .apply_adjustments(&multiply("pitcher_impact_weight", 1.0))
                .unwrap();
        }
        assert_eq!(store.backup_count(), 5);
    }

    #[test]
    fn test_optimize_for_metric_preset() {
        let mut store = store();
        store.optimize_for_metric("score_accuracy").unwrap();
        assert_eq!(store.current().pitcher.era_weight, 0.4);
        assert_eq!(store.current().advanced.regression_factor, 0.2);
        assert_eq!(
            store.current().performance_grade,
            "OPTIMIZED_FOR_SCORE_ACCURACY"
        );

        assert!(store.optimize_for_metric("vibes").is_err());
    }

    #[test]
    fn test_file_backend_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prediction_config.json");

        {
            let mut store = ParameterStore::open(JsonFileBackend::new(&path));
            store
                .apply_adjustments(&multiply("pitcher_impact_weight", 1.2))
                .unwrap();
        }

        let reopened = ParameterStore::open(JsonFileBackend::new(&path));
        assert_eq!(reopened.current().version.to_string(), "1.1");
        assert!((reopened.current().pitcher.era_weight - 0.42).abs() < 1e-12);
    }

    /// Backend that accepts the first write (the persisted default) and
    /// fails afterwards, for exercising automatic rollback.
    struct FlakyBackend {
        writes: Mutex<u32>,
    }

    impl ConfigBackend for FlakyBackend {
        fn load_document(&self) -> Result<Option<String>> {
            Ok(None)
        }

        fn store_document(&self, _doc: &str) -> Result<()> {
            let mut writes = self.writes.lock().unwrap();
            *writes += 1;
            if *writes > 1 {
                return Err(TunerError::ParameterPersistence("disk full".to_string()));
            }
            Ok(())
        }
    }

    #[test]
    fn test_persistence_failure_rolls_back() {
        let mut store = ParameterStore::open(FlakyBackend {
            writes: Mutex::new(0),
        });
        let before = store.current().clone();

        let err = store
            .apply_adjustments(&multiply("pitcher_impact_weight", 1.2))
            .unwrap_err();
        assert!(matches!(err, TunerError::ParameterPersistence(_)));
        assert_eq!(store.current().pitcher.era_weight, before.pitcher.era_weight);
        assert_eq!(store.current().version, before.version);
    }
}
