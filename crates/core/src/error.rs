//! Error types for the takeoff engine

use crate::measure::MeasureId;

/// Recoverable errors raised while calibrating or finalizing a shape
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TakeoffError {
    #[error("shape needs at least {required} points, got {actual}")]
    InsufficientPoints { required: usize, actual: usize },

    #[error("page {page} of plan {plan_id} has no calibration")]
    CalibrationRequired { plan_id: String, page: u32 },

    #[error("real distance must be positive, got {0}")]
    InvalidDistance(f64),

    #[error("pixels per unit must be positive, got {0}")]
    InvalidScale(f64),

    #[error("zoom {zoom_percent}% at render scale {base_render_scale} does not map to the screen")]
    InvalidViewTransform { zoom_percent: f64, base_render_scale: f64 },

    #[error("calibration points are {pixel_distance:.3}px apart, below the {epsilon}px minimum")]
    DegenerateCalibration { pixel_distance: f64, epsilon: f64 },

    #[error("calibration capture already has two points")]
    CalibrationPointsFull,

    #[error("no calibration capture in progress")]
    NoCalibrationInProgress,

    #[error("measure not found: {0}")]
    MeasureNotFound(MeasureId),
}

pub type TakeoffResult<T> = Result<T, TakeoffError>;

/// Failure reported by a record store
#[derive(Debug, thiserror::Error)]
#[error("record store {operation} failed: {message}")]
pub struct StoreError {
    pub operation: &'static str,
    pub message: String,
}

impl StoreError {
    pub fn new(operation: &'static str, message: impl Into<String>) -> Self {
        Self {
            operation,
            message: message.into(),
        }
    }
}
