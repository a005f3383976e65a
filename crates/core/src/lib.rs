//! Plan Takeoff Core Library
//!
//! Calibration, geometry and tool state for measuring quantities on
//! rasterized plan pages.

pub mod calibration;
pub mod config;
pub mod error;
pub mod factory;
pub mod geometry;
pub mod measure;
pub mod overlay;
pub mod session;
pub mod store;
pub mod tool;

pub use calibration::{
    to_pixel_area, to_pixel_length, to_real_area, to_real_length, Calibration, CalibrationBook,
    CalibrationCapture, CaptureProgress, PageKey,
};
pub use config::{ConfigError, EngineConfig};
pub use error::{StoreError, TakeoffError, TakeoffResult};
pub use factory::{finalize, finalize_with_count_unit};
pub use geometry::{polygon_area, polyline_length, rectangle_area, Point};
pub use measure::{Color, Measure, MeasureAttributes, MeasureId, MeasureKind, COUNT_UNIT};
pub use overlay::{render_overlay, DrawInstruction, OverlayInput, OverlayStyle, ViewTransform};
pub use session::{DispatchOutcome, TakeoffSession};
pub use store::{MemoryStore, RecordStore};
pub use tool::{transition, Effect, Tool, ToolEvent, ToolState, TransitionContext};
