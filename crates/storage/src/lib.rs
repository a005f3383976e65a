use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use takeoff_core::{Calibration, Measure, MeasureId, MemoryStore, PageKey, RecordStore, StoreError};
use tracing::{debug, warn};

const RECORDS_SCHEMA_VERSION: u32 = 1;
const RECORDS_FILE: &str = "takeoff.json";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("unable to resolve local data directory")]
    NoDataDirectory,
    #[error("unsupported records version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RecordsEnvelope {
    version: u32,
    measures: Vec<Measure>,
    calibrations: Vec<Calibration>,
}

/// Record store persisted as one JSON document under a root directory
///
/// Every write rewrites the document through a temp file and a rename, so a
/// crash leaves either the old or the new records on disk.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    root: PathBuf,
    records: MemoryStore,
}

impl JsonFileStore {
    /// Open the store in the platform data directory
    pub fn from_default_project() -> Result<Self, StorageError> {
        let dirs = ProjectDirs::from("dev", "PlanTakeoff", "PlanTakeoff")
            .ok_or(StorageError::NoDataDirectory)?;

        Self::open(dirs.data_local_dir())
    }

    /// Open the store rooted at `root`, loading existing records if present
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        let records = load_records(&root.join(RECORDS_FILE))?;
        debug!(
            root = %root.display(),
            measures = records.measures().len(),
            "opened record store"
        );
        Ok(Self { root, records })
    }

    pub fn records_path(&self) -> PathBuf {
        self.root.join(RECORDS_FILE)
    }

    pub fn measures(&self) -> &[Measure] {
        self.records.measures()
    }

    fn save(&self) -> Result<(), StorageError> {
        fs::create_dir_all(&self.root)?;

        let envelope = RecordsEnvelope {
            version: RECORDS_SCHEMA_VERSION,
            measures: self.records.measures().to_vec(),
            calibrations: self.records.calibrations(),
        };

        let bytes = serde_json::to_vec_pretty(&envelope)?;
        let path = self.records_path();
        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, bytes)?;
        fs::rename(&temp_path, &path)?;
        Ok(())
    }

    fn commit(&self, operation: &'static str) -> Result<(), StoreError> {
        self.save().map_err(|error| {
            warn!(operation, %error, "failed to write records");
            StoreError::new(operation, error.to_string())
        })
    }
}

fn load_records(path: &Path) -> Result<MemoryStore, StorageError> {
    if !path.exists() {
        return Ok(MemoryStore::new());
    }

    let bytes = fs::read(path)?;
    let envelope: RecordsEnvelope = serde_json::from_slice(&bytes)?;
    if envelope.version != RECORDS_SCHEMA_VERSION {
        return Err(StorageError::UnsupportedVersion {
            found: envelope.version,
            expected: RECORDS_SCHEMA_VERSION,
        });
    }

    Ok(MemoryStore::from_records(envelope.measures, envelope.calibrations))
}

impl RecordStore for JsonFileStore {
    fn insert_measure(&mut self, measure: &Measure) -> Result<MeasureId, StoreError> {
        let id = self.records.insert_measure(measure)?;
        self.commit("insert_measure")?;
        Ok(id)
    }

    fn delete_measure(&mut self, id: MeasureId) -> Result<(), StoreError> {
        self.records.delete_measure(id)?;
        self.commit("delete_measure")
    }

    fn upsert_calibration(&mut self, calibration: &Calibration) -> Result<PageKey, StoreError> {
        let key = self.records.upsert_calibration(calibration)?;
        self.commit("upsert_calibration")?;
        Ok(key)
    }

    fn list_measures(&self, plan_id: Option<&str>) -> Result<Vec<Measure>, StoreError> {
        self.records.list_measures(plan_id)
    }

    fn get_calibration(&self, page: &PageKey) -> Result<Option<Calibration>, StoreError> {
        self.records.get_calibration(page)
    }

    fn list_calibrations(&self) -> Result<Vec<Calibration>, StoreError> {
        self.records.list_calibrations()
    }
}
