//! Page calibration
//!
//! A calibration maps canonical pixel distances on one plan page to a
//! real-world unit. It is built from two picked points and a typed distance.
//! At most one calibration exists per (plan, page); a new one replaces the old.

use crate::error::{TakeoffError, TakeoffResult};
use crate::geometry::{distance, Point};
use std::collections::HashMap;

/// Identifies one page of one plan
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
pub struct PageKey {
    pub plan_id: String,
    pub page: u32,
}

impl PageKey {
    pub fn new(plan_id: impl Into<String>, page: u32) -> Self {
        Self {
            plan_id: plan_id.into(),
            page,
        }
    }
}

impl std::fmt::Display for PageKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.plan_id, self.page)
    }
}

/// Resolved pixel-to-real-world scale for a page
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "CalibrationRecord")]
pub struct Calibration {
    /// Canonical pixels per real-world unit (always > 0)
    pixels_per_unit: f64,
    /// Unit of measurement (e.g. "ft", "m")
    real_unit: String,
    /// Distance the user typed for the reference segment
    real_distance: f64,
    /// Page this calibration applies to
    scope: PageKey,
    /// Reference segment endpoints in canonical space
    reference: [Point; 2],
}

/// Unchecked shape of a stored calibration
#[derive(serde::Deserialize)]
struct CalibrationRecord {
    pixels_per_unit: f64,
    real_unit: String,
    real_distance: f64,
    scope: PageKey,
    reference: [Point; 2],
}

impl TryFrom<CalibrationRecord> for Calibration {
    type Error = TakeoffError;

    fn try_from(record: CalibrationRecord) -> Result<Self, Self::Error> {
        if !record.real_distance.is_finite() || record.real_distance <= 0.0 {
            return Err(TakeoffError::InvalidDistance(record.real_distance));
        }
        if !record.pixels_per_unit.is_finite() || record.pixels_per_unit <= 0.0 {
            return Err(TakeoffError::InvalidScale(record.pixels_per_unit));
        }

        Ok(Self {
            pixels_per_unit: record.pixels_per_unit,
            real_unit: record.real_unit,
            real_distance: record.real_distance,
            scope: record.scope,
            reference: record.reference,
        })
    }
}

impl Calibration {
    /// Build a calibration from a reference segment and its real length
    ///
    /// # Errors
    /// - `InvalidDistance` when `real_distance` is not a positive number
    /// - `DegenerateCalibration` when the endpoints coincide or are closer than
    ///   `epsilon_px`
    pub fn from_reference(
        scope: PageKey,
        p0: Point,
        p1: Point,
        real_distance: f64,
        real_unit: impl Into<String>,
        epsilon_px: f64,
    ) -> TakeoffResult<Self> {
        if !real_distance.is_finite() || real_distance <= 0.0 {
            return Err(TakeoffError::InvalidDistance(real_distance));
        }

        let pixel_distance = distance(p0, p1);
        if !pixel_distance.is_finite() || pixel_distance <= 0.0 || pixel_distance < epsilon_px {
            return Err(TakeoffError::DegenerateCalibration {
                pixel_distance,
                epsilon: epsilon_px,
            });
        }

        Ok(Self {
            pixels_per_unit: pixel_distance / real_distance,
            real_unit: real_unit.into(),
            real_distance,
            scope,
            reference: [p0, p1],
        })
    }

    pub fn pixels_per_unit(&self) -> f64 {
        self.pixels_per_unit
    }

    pub fn real_unit(&self) -> &str {
        &self.real_unit
    }

    /// Unit label for areas measured under this calibration
    pub fn area_unit(&self) -> String {
        format!("{}²", self.real_unit)
    }

    pub fn real_distance(&self) -> f64 {
        self.real_distance
    }

    pub fn scope(&self) -> &PageKey {
        &self.scope
    }

    pub fn reference(&self) -> [Point; 2] {
        self.reference
    }

    /// Convert a canonical pixel length to real-world units
    pub fn to_real_length(&self, pixel_length: f64) -> f64 {
        to_real_length(pixel_length, self)
    }

    /// Convert a canonical pixel area to real-world square units
    pub fn to_real_area(&self, pixel_area: f64) -> f64 {
        to_real_area(pixel_area, self)
    }
}

/// Pixel length → real length (linear scale)
pub fn to_real_length(pixel_length: f64, calibration: &Calibration) -> f64 {
    pixel_length / calibration.pixels_per_unit
}

/// Real length → pixel length
pub fn to_pixel_length(real_length: f64, calibration: &Calibration) -> f64 {
    real_length * calibration.pixels_per_unit
}

/// Pixel area → real area; areas scale with the square of the linear factor
pub fn to_real_area(pixel_area: f64, calibration: &Calibration) -> f64 {
    let ratio = calibration.pixels_per_unit;
    pixel_area / (ratio * ratio)
}

/// Real area → pixel area
pub fn to_pixel_area(real_area: f64, calibration: &Calibration) -> f64 {
    let ratio = calibration.pixels_per_unit;
    real_area * ratio * ratio
}

/// Progress of a two-point calibration capture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureProgress {
    /// One point picked, waiting for the second
    NeedsSecondPoint,
    /// Both points picked, waiting for the real distance
    AwaitingDistance,
}

/// In-progress capture of the two calibration reference points
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CalibrationCapture {
    points: Vec<Point>,
}

impl CalibrationCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Discard any picked points
    pub fn begin(&mut self) {
        self.points.clear();
    }

    /// Record a reference point
    ///
    /// # Errors
    /// `CalibrationPointsFull` once two points are held; resolve or cancel first.
    pub fn add_point(&mut self, point: Point) -> TakeoffResult<CaptureProgress> {
        match self.points.len() {
            0 => {
                self.points.push(point);
                Ok(CaptureProgress::NeedsSecondPoint)
            }
            1 => {
                self.points.push(point);
                Ok(CaptureProgress::AwaitingDistance)
            }
            _ => Err(TakeoffError::CalibrationPointsFull),
        }
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn is_awaiting_distance(&self) -> bool {
        self.points.len() == 2
    }

    /// Pixel length of the captured reference segment, if complete
    pub fn pixel_distance(&self) -> Option<f64> {
        match self.points.as_slice() {
            [p0, p1] => Some(distance(*p0, *p1)),
            _ => None,
        }
    }

    /// Turn the captured segment into a calibration for `scope`
    ///
    /// The capture is left untouched on error so the caller decides whether to
    /// keep it open (bad distance) or restart it (coincident points).
    pub fn resolve(
        &self,
        scope: PageKey,
        real_distance: f64,
        real_unit: &str,
        epsilon_px: f64,
    ) -> TakeoffResult<Calibration> {
        let [p0, p1] = match self.points.as_slice() {
            [p0, p1] => [*p0, *p1],
            _ => return Err(TakeoffError::NoCalibrationInProgress),
        };
        Calibration::from_reference(scope, p0, p1, real_distance, real_unit, epsilon_px)
    }
}

/// Calibrations keyed by (plan, page), last write wins
#[derive(Debug, Clone, Default)]
pub struct CalibrationBook {
    by_page: HashMap<PageKey, Calibration>,
}

impl CalibrationBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a calibration, returning the one it replaced
    pub fn set(&mut self, calibration: Calibration) -> Option<Calibration> {
        self.by_page.insert(calibration.scope().clone(), calibration)
    }

    pub fn get(&self, key: &PageKey) -> Option<&Calibration> {
        self.by_page.get(key)
    }

    pub fn len(&self) -> usize {
        self.by_page.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_page.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Calibration> {
        self.by_page.values()
    }
}

impl FromIterator<Calibration> for CalibrationBook {
    fn from_iter<I: IntoIterator<Item = Calibration>>(iter: I) -> Self {
        let mut book = Self::new();
        for calibration in iter {
            book.set(calibration);
        }
        book
    }
}
