//! Record store seam
//!
//! The session writes measures and calibrations through [`RecordStore`] and
//! never waits on it to update its own view. [`MemoryStore`] is the default
//! backend; durable backends live in other crates.

use std::collections::HashMap;

use crate::calibration::{Calibration, PageKey};
use crate::error::StoreError;
use crate::measure::{Measure, MeasureId};

pub trait RecordStore {
    /// Persist a new measure and return its id
    fn insert_measure(&mut self, measure: &Measure) -> Result<MeasureId, StoreError>;
    /// Remove a measure; deleting an unknown id is not an error
    fn delete_measure(&mut self, id: MeasureId) -> Result<(), StoreError>;
    /// Create or overwrite the calibration for its page
    fn upsert_calibration(&mut self, calibration: &Calibration) -> Result<PageKey, StoreError>;
    /// Measures in insertion order, optionally limited to one plan
    fn list_measures(&self, plan_id: Option<&str>) -> Result<Vec<Measure>, StoreError>;
    fn get_calibration(&self, page: &PageKey) -> Result<Option<Calibration>, StoreError>;
    fn list_calibrations(&self) -> Result<Vec<Calibration>, StoreError>;
}

/// Volatile store backed by in-process collections
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    measures: Vec<Measure>,
    calibrations: HashMap<PageKey, Calibration>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from previously saved records
    pub fn from_records(measures: Vec<Measure>, calibrations: Vec<Calibration>) -> Self {
        let calibrations = calibrations
            .into_iter()
            .map(|c| (c.scope().clone(), c))
            .collect();
        Self {
            measures,
            calibrations,
        }
    }

    pub fn measures(&self) -> &[Measure] {
        &self.measures
    }

    /// Calibrations sorted by page, for stable output
    pub fn calibrations(&self) -> Vec<Calibration> {
        let mut all: Vec<Calibration> = self.calibrations.values().cloned().collect();
        all.sort_by(|a, b| a.scope().cmp(b.scope()));
        all
    }
}

impl RecordStore for MemoryStore {
    fn insert_measure(&mut self, measure: &Measure) -> Result<MeasureId, StoreError> {
        if self.measures.iter().any(|m| m.id() == measure.id()) {
            return Err(StoreError::new(
                "insert_measure",
                format!("duplicate measure id {}", measure.id()),
            ));
        }
        self.measures.push(measure.clone());
        Ok(measure.id())
    }

    fn delete_measure(&mut self, id: MeasureId) -> Result<(), StoreError> {
        self.measures.retain(|m| m.id() != id);
        Ok(())
    }

    fn upsert_calibration(&mut self, calibration: &Calibration) -> Result<PageKey, StoreError> {
        let key = calibration.scope().clone();
        self.calibrations.insert(key.clone(), calibration.clone());
        Ok(key)
    }

    fn list_measures(&self, plan_id: Option<&str>) -> Result<Vec<Measure>, StoreError> {
        Ok(self
            .measures
            .iter()
            .filter(|m| match plan_id {
                Some(plan) => m.plan_id() == plan,
                None => true,
            })
            .cloned()
            .collect())
    }

    fn get_calibration(&self, page: &PageKey) -> Result<Option<Calibration>, StoreError> {
        Ok(self.calibrations.get(page).cloned())
    }

    fn list_calibrations(&self) -> Result<Vec<Calibration>, StoreError> {
        Ok(self.calibrations())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::finalize;
    use crate::geometry::Point;
    use crate::measure::{MeasureAttributes, MeasureKind};

    fn count_on(plan: &str) -> Measure {
        finalize(
            &PageKey::new(plan, 1),
            MeasureKind::Count,
            vec![Point::new(1.0, 1.0)],
            None,
            &MeasureAttributes::default(),
        )
        .unwrap()
    }

    fn calibration(page: u32, real_distance: f64) -> Calibration {
        Calibration::from_reference(
            PageKey::new("plan-a", page),
            Point::new(0.0, 0.0),
            Point::new(100.0, 0.0),
            real_distance,
            "m",
            1.0,
        )
        .unwrap()
    }

    #[test]
    fn test_insert_list_delete() {
        let mut store = MemoryStore::new();
        let a = count_on("plan-a");
        let b = count_on("plan-b");
        assert_eq!(store.insert_measure(&a).unwrap(), a.id());
        store.insert_measure(&b).unwrap();

        assert_eq!(store.list_measures(None).unwrap().len(), 2);
        assert_eq!(store.list_measures(Some("plan-b")).unwrap(), vec![b.clone()]);

        store.delete_measure(a.id()).unwrap();
        store.delete_measure(a.id()).unwrap();
        assert_eq!(store.list_measures(None).unwrap(), vec![b]);
    }

    #[test]
    fn test_duplicate_insert_rejected() {
        let mut store = MemoryStore::new();
        let a = count_on("plan-a");
        store.insert_measure(&a).unwrap();
        let err = store.insert_measure(&a).unwrap_err();
        assert_eq!(err.operation, "insert_measure");
    }

    #[test]
    fn test_upsert_calibration_last_write_wins() {
        let mut store = MemoryStore::new();
        store.upsert_calibration(&calibration(1, 10.0)).unwrap();
        store.upsert_calibration(&calibration(2, 5.0)).unwrap();
        let key = store.upsert_calibration(&calibration(1, 20.0)).unwrap();

        assert_eq!(key, PageKey::new("plan-a", 1));
        assert_eq!(store.list_calibrations().unwrap().len(), 2);
        let stored = store.get_calibration(&key).unwrap().unwrap();
        assert_eq!(stored.real_distance(), 20.0);
        assert_eq!(stored.pixels_per_unit(), 5.0);
    }

    #[test]
    fn test_from_records() {
        let a = count_on("plan-a");
        let store = MemoryStore::from_records(vec![a.clone()], vec![calibration(3, 1.0)]);
        assert_eq!(store.measures(), &[a]);
        assert!(store
            .get_calibration(&PageKey::new("plan-a", 3))
            .unwrap()
            .is_some());
    }
}
