//! Tool state machine
//!
//! Drawing is modelled as a tagged state plus pure transitions:
//! `(state, event) -> (state, Result<effect>)`. The effect tells the caller
//! what to persist; the machine itself never touches storage.
//!
//! Points handed to the machine are already in canonical page space.

use crate::calibration::{Calibration, CalibrationCapture, CaptureProgress, PageKey};
use crate::config::EngineConfig;
use crate::error::{TakeoffError, TakeoffResult};
use crate::factory;
use crate::geometry::Point;
use crate::measure::{Measure, MeasureAttributes, MeasureId, MeasureKind};

/// Tools in the palette
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Tool {
    #[default]
    Select,
    Pan,
    Calibrate,
    Line,
    Rectangle,
    Polygon,
    Count,
}

impl Tool {
    /// The measure kind a drawing tool produces
    pub fn measure_kind(&self) -> Option<MeasureKind> {
        match self {
            Tool::Line => Some(MeasureKind::Line),
            Tool::Rectangle => Some(MeasureKind::Rectangle),
            Tool::Polygon => Some(MeasureKind::Polygon),
            Tool::Count => Some(MeasureKind::Count),
            Tool::Select | Tool::Pan | Tool::Calibrate => None,
        }
    }
}

impl From<MeasureKind> for Tool {
    fn from(kind: MeasureKind) -> Self {
        match kind {
            MeasureKind::Line => Tool::Line,
            MeasureKind::Rectangle => Tool::Rectangle,
            MeasureKind::Polygon => Tool::Polygon,
            MeasureKind::Count => Tool::Count,
        }
    }
}

impl std::str::FromStr for Tool {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "select" => Ok(Tool::Select),
            "pan" => Ok(Tool::Pan),
            "calibrate" => Ok(Tool::Calibrate),
            other => other.parse::<MeasureKind>().map(Tool::from),
        }
    }
}

/// Transient drawing state; never persisted
#[derive(Debug, Clone, PartialEq)]
pub enum ToolState {
    /// Nothing in progress; `tool` stays selected for the next click
    Idle { tool: Tool },
    /// A drawing tool was just picked
    AwaitingFirstPoint { kind: MeasureKind },
    /// Points are being collected for a shape
    ///
    /// `count_id` is set once a count session has persisted its measure.
    Accumulating {
        kind: MeasureKind,
        points: Vec<Point>,
        count_id: Option<MeasureId>,
    },
    /// Calibration reference points are being picked
    CapturingCalibration { capture: CalibrationCapture },
    /// Both reference points picked; waiting for the real distance
    AwaitingCalibrationDistance { capture: CalibrationCapture },
}

impl Default for ToolState {
    fn default() -> Self {
        ToolState::Idle { tool: Tool::Select }
    }
}

impl ToolState {
    /// Tool currently selected in the palette
    pub fn active_tool(&self) -> Tool {
        match self {
            ToolState::Idle { tool } => *tool,
            ToolState::AwaitingFirstPoint { kind } | ToolState::Accumulating { kind, .. } => {
                Tool::from(*kind)
            }
            ToolState::CapturingCalibration { .. }
            | ToolState::AwaitingCalibrationDistance { .. } => Tool::Calibrate,
        }
    }

    /// Points picked so far for the shape or calibration in progress
    pub fn current_points(&self) -> &[Point] {
        match self {
            ToolState::Accumulating { points, .. } => points,
            ToolState::CapturingCalibration { capture }
            | ToolState::AwaitingCalibrationDistance { capture } => capture.points(),
            ToolState::Idle { .. } | ToolState::AwaitingFirstPoint { .. } => &[],
        }
    }

    /// Whether a shape or calibration is in progress
    pub fn is_drawing(&self) -> bool {
        !matches!(
            self,
            ToolState::Idle { .. } | ToolState::AwaitingFirstPoint { .. }
        )
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, ToolState::Idle { .. })
    }
}

/// Input to the state machine
#[derive(Debug, Clone, PartialEq)]
pub enum ToolEvent {
    SelectTool(Tool),
    /// Single click at a canonical point
    Click(Point),
    /// Double click; finishes line and polygon shapes
    DoubleClick,
    /// Explicit finish command
    Finish,
    /// Explicit cancel command
    Cancel,
    /// Drop the most recent point of the shape in progress
    UndoPoint,
    /// Real-world length of the captured calibration segment
    SubmitCalibration { real_distance: f64, real_unit: String },
}

/// Side effect requested by a transition
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    None,
    /// Store a finalized measure, deleting `replaces` first when set
    PersistMeasure {
        measure: Measure,
        replaces: Option<MeasureId>,
    },
    /// Store a calibration, overwriting the one for its page
    StoreCalibration(Calibration),
    /// Hit-test existing measures at a canonical point
    SelectAt(Point),
}

/// Read-only inputs a transition may consult
#[derive(Debug, Clone, Copy)]
pub struct TransitionContext<'a> {
    pub page: &'a PageKey,
    pub calibration: Option<&'a Calibration>,
    pub attributes: &'a MeasureAttributes,
    pub config: &'a EngineConfig,
}

/// Advance the machine by one event
///
/// The returned state is always well-defined, also on error: failed shapes are
/// discarded, a bad calibration distance keeps the capture open, and a
/// degenerate calibration restarts point capture.
pub fn transition(
    state: ToolState,
    event: ToolEvent,
    ctx: &TransitionContext<'_>,
) -> (ToolState, TakeoffResult<Effect>) {
    match event {
        ToolEvent::SelectTool(tool) => (enter_tool(tool), Ok(Effect::None)),
        ToolEvent::Click(point) => click(state, point, ctx),
        ToolEvent::DoubleClick | ToolEvent::Finish => finish(state, ctx),
        ToolEvent::Cancel => {
            let tool = state.active_tool();
            (ToolState::Idle { tool }, Ok(Effect::None))
        }
        ToolEvent::UndoPoint => (undo_point(state), Ok(Effect::None)),
        ToolEvent::SubmitCalibration {
            real_distance,
            real_unit,
        } => submit_calibration(state, real_distance, &real_unit, ctx),
    }
}

fn enter_tool(tool: Tool) -> ToolState {
    match (tool, tool.measure_kind()) {
        (_, Some(kind)) => ToolState::AwaitingFirstPoint { kind },
        (Tool::Calibrate, None) => ToolState::CapturingCalibration {
            capture: CalibrationCapture::new(),
        },
        (tool, None) => ToolState::Idle { tool },
    }
}

fn click(
    state: ToolState,
    point: Point,
    ctx: &TransitionContext<'_>,
) -> (ToolState, TakeoffResult<Effect>) {
    match state {
        ToolState::Idle { tool: Tool::Select } => {
            (ToolState::Idle { tool: Tool::Select }, Ok(Effect::SelectAt(point)))
        }
        ToolState::Idle { tool: Tool::Pan } => {
            (ToolState::Idle { tool: Tool::Pan }, Ok(Effect::None))
        }
        // A click with a tool still selected starts the next shape or capture
        ToolState::Idle { tool } => click(enter_tool(tool), point, ctx),

        ToolState::AwaitingFirstPoint { kind: MeasureKind::Count } => {
            count_click(Vec::new(), None, point, ctx)
        }
        ToolState::AwaitingFirstPoint { kind } => (
            ToolState::Accumulating {
                kind,
                points: vec![point],
                count_id: None,
            },
            Ok(Effect::None),
        ),

        ToolState::Accumulating {
            kind: MeasureKind::Count,
            points,
            count_id,
        } => count_click(points, count_id, point, ctx),
        ToolState::Accumulating {
            kind: MeasureKind::Rectangle,
            mut points,
            ..
        } => {
            // Second corner completes the rectangle
            points.push(point);
            complete(MeasureKind::Rectangle, points, ctx)
        }
        ToolState::Accumulating {
            kind,
            mut points,
            count_id,
        } => {
            points.push(point);
            (
                ToolState::Accumulating {
                    kind,
                    points,
                    count_id,
                },
                Ok(Effect::None),
            )
        }

        ToolState::CapturingCalibration { mut capture } => match capture.add_point(point) {
            Ok(CaptureProgress::NeedsSecondPoint) => {
                (ToolState::CapturingCalibration { capture }, Ok(Effect::None))
            }
            Ok(CaptureProgress::AwaitingDistance) => (
                ToolState::AwaitingCalibrationDistance { capture },
                Ok(Effect::None),
            ),
            Err(error) => (ToolState::AwaitingCalibrationDistance { capture }, Err(error)),
        },
        ToolState::AwaitingCalibrationDistance { capture } => (
            ToolState::AwaitingCalibrationDistance { capture },
            Err(TakeoffError::CalibrationPointsFull),
        ),
    }
}

/// Every count click finalizes; the session's measure is recreated under the
/// same id with the grown point list.
fn count_click(
    mut points: Vec<Point>,
    count_id: Option<MeasureId>,
    point: Point,
    ctx: &TransitionContext<'_>,
) -> (ToolState, TakeoffResult<Effect>) {
    points.push(point);
    match build(MeasureKind::Count, points.clone(), ctx) {
        Ok(measure) => {
            let measure = match count_id {
                Some(id) => measure.with_id(id),
                None => measure,
            };
            let state = ToolState::Accumulating {
                kind: MeasureKind::Count,
                points,
                count_id: Some(measure.id()),
            };
            (
                state,
                Ok(Effect::PersistMeasure {
                    measure,
                    replaces: count_id,
                }),
            )
        }
        Err(error) => {
            points.pop();
            let state = ToolState::Accumulating {
                kind: MeasureKind::Count,
                points,
                count_id,
            };
            (state, Err(error))
        }
    }
}

fn finish(state: ToolState, ctx: &TransitionContext<'_>) -> (ToolState, TakeoffResult<Effect>) {
    match state {
        ToolState::Accumulating {
            kind: MeasureKind::Count,
            ..
        } => (
            ToolState::Idle { tool: Tool::Count },
            Ok(Effect::None),
        ),
        ToolState::Accumulating {
            kind, mut points, ..
        } => {
            // A double click also delivers its clicks; drop the repeated point
            points.dedup();
            complete(kind, points, ctx)
        }
        other => (other, Ok(Effect::None)),
    }
}

/// Finalize a shape and go idle; on failure the points are discarded
fn complete(
    kind: MeasureKind,
    points: Vec<Point>,
    ctx: &TransitionContext<'_>,
) -> (ToolState, TakeoffResult<Effect>) {
    let idle = ToolState::Idle {
        tool: Tool::from(kind),
    };
    let result = build(kind, points, ctx).map(|measure| Effect::PersistMeasure {
        measure,
        replaces: None,
    });
    (idle, result)
}

fn build(
    kind: MeasureKind,
    points: Vec<Point>,
    ctx: &TransitionContext<'_>,
) -> TakeoffResult<Measure> {
    factory::finalize_with_count_unit(
        ctx.page,
        kind,
        points,
        ctx.calibration,
        ctx.attributes,
        &ctx.config.count_unit,
    )
}

fn undo_point(state: ToolState) -> ToolState {
    match state {
        ToolState::Accumulating {
            kind,
            mut points,
            count_id: None,
        } => {
            points.pop();
            if points.is_empty() {
                ToolState::AwaitingFirstPoint { kind }
            } else {
                ToolState::Accumulating {
                    kind,
                    points,
                    count_id: None,
                }
            }
        }
        // Count markers are already persisted
        other => other,
    }
}

fn submit_calibration(
    state: ToolState,
    real_distance: f64,
    real_unit: &str,
    ctx: &TransitionContext<'_>,
) -> (ToolState, TakeoffResult<Effect>) {
    let capture = match state {
        ToolState::AwaitingCalibrationDistance { capture } => capture,
        other => return (other, Err(TakeoffError::NoCalibrationInProgress)),
    };

    match capture.resolve(
        ctx.page.clone(),
        real_distance,
        real_unit,
        ctx.config.calibration_epsilon_px,
    ) {
        Ok(calibration) => (
            ToolState::Idle {
                tool: Tool::Calibrate,
            },
            Ok(Effect::StoreCalibration(calibration)),
        ),
        Err(error @ TakeoffError::DegenerateCalibration { .. }) => (
            ToolState::CapturingCalibration {
                capture: CalibrationCapture::new(),
            },
            Err(error),
        ),
        Err(error) => (ToolState::AwaitingCalibrationDistance { capture }, Err(error)),
    }
}
