//! Overlay projection
//!
//! Produces screen-space draw instructions for the transparent layer above
//! the rendered page. Everything here is a read-only projection of measures,
//! the in-progress tool state and the page calibration.
//!
//! Rotation is baked into the rendered page image, so canonical points only
//! need the zoom scale applied.

use crate::calibration::{Calibration, PageKey};
use crate::error::{TakeoffError, TakeoffResult};
use crate::geometry::Point;
use crate::measure::{Color, Measure, MeasureKind};
use crate::tool::ToolState;

/// Zoom state reported by the page renderer
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct ViewTransform {
    /// Zoom level as a percentage (100 = actual size)
    zoom_percent: f64,
    /// Page rotation already applied by the renderer
    rotation_degrees: f64,
    /// Renderer scale at 100% zoom
    base_render_scale: f64,
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self {
            zoom_percent: 100.0,
            rotation_degrees: 0.0,
            base_render_scale: 1.0,
        }
    }
}

impl ViewTransform {
    /// # Errors
    /// `InvalidViewTransform` unless zoom and render scale are positive and finite.
    pub fn new(
        zoom_percent: f64,
        rotation_degrees: f64,
        base_render_scale: f64,
    ) -> TakeoffResult<Self> {
        let positive = |v: f64| v.is_finite() && v > 0.0;
        if !positive(zoom_percent) || !positive(base_render_scale) {
            return Err(TakeoffError::InvalidViewTransform {
                zoom_percent,
                base_render_scale,
            });
        }

        let rotation_degrees = if rotation_degrees.is_finite() {
            rotation_degrees.rem_euclid(360.0)
        } else {
            0.0
        };
        Ok(Self {
            zoom_percent,
            rotation_degrees,
            base_render_scale,
        })
    }

    pub fn zoom_percent(&self) -> f64 {
        self.zoom_percent
    }

    pub fn rotation_degrees(&self) -> f64 {
        self.rotation_degrees
    }

    /// Canonical pixel → screen pixel factor
    pub fn scale(&self) -> f64 {
        self.zoom_percent / 100.0 * self.base_render_scale
    }

    pub fn canonical_to_screen(&self, point: Point) -> Point {
        let scale = self.scale();
        Point::new(point.x * scale, point.y * scale)
    }

    /// Map pointer input back into canonical space
    pub fn screen_to_canonical(&self, point: Point) -> Point {
        let scale = self.scale();
        Point::new(point.x / scale, point.y / scale)
    }
}

/// Appearance of overlay elements, in screen pixels
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayStyle {
    pub stroke_width: f64,
    pub marker_radius: f64,
    /// Alpha applied to a measure's color for area fills
    pub fill_alpha: u8,
    pub calibration_color: Color,
    pub label_color: Color,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            stroke_width: 2.0,
            marker_radius: 5.0,
            fill_alpha: 64,
            calibration_color: Color::ORANGE,
            label_color: Color::rgb(0, 0, 0),
        }
    }
}

/// Screen-space draw instruction
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DrawInstruction {
    /// Connected segments; `closed` joins the last point to the first
    Polyline {
        points: Vec<Point>,
        color: Color,
        width: f64,
        closed: bool,
        dashed: bool,
    },
    /// Axis-aligned rectangle between two corners
    Rectangle {
        min: Point,
        max: Point,
        stroke: Color,
        fill: Option<Color>,
        width: f64,
        dashed: bool,
    },
    /// Closed polygon with optional fill
    Polygon {
        points: Vec<Point>,
        stroke: Color,
        fill: Option<Color>,
        width: f64,
    },
    /// Filled circular marker
    Marker {
        center: Point,
        radius: f64,
        color: Color,
    },
    /// Text anchored at a point
    Label {
        position: Point,
        text: String,
        color: Color,
    },
}

/// Everything the overlay needs for one frame
#[derive(Debug, Clone, Copy)]
pub struct OverlayInput<'a> {
    pub page: &'a PageKey,
    pub measures: &'a [Measure],
    pub tool_state: &'a ToolState,
    pub calibration: Option<&'a Calibration>,
    /// Color of the shape being drawn
    pub pending_color: Color,
    pub transform: &'a ViewTransform,
}

/// Build the draw list for one frame
///
/// Order: finalized measures, then the calibration reference, then the shape
/// in progress on top.
pub fn render_overlay(input: &OverlayInput<'_>, style: &OverlayStyle) -> Vec<DrawInstruction> {
    let transform = input.transform;
    let mut instructions = Vec::new();

    for measure in input.measures.iter().filter(|m| m.is_on(input.page)) {
        push_measure(&mut instructions, measure, transform, style);
    }

    if let Some(calibration) = input.calibration.filter(|c| c.scope() == input.page) {
        let [p0, p1] = calibration.reference();
        push_calibration_segment(&mut instructions, &[p0, p1], transform, style);
    }

    push_in_progress(&mut instructions, input, style);

    instructions
}

fn push_measure(
    out: &mut Vec<DrawInstruction>,
    measure: &Measure,
    transform: &ViewTransform,
    style: &OverlayStyle,
) {
    let color = measure.color();
    let points: Vec<Point> = measure
        .points()
        .iter()
        .map(|p| transform.canonical_to_screen(*p))
        .collect();

    match measure.kind() {
        MeasureKind::Line => out.push(DrawInstruction::Polyline {
            points,
            color,
            width: style.stroke_width,
            closed: false,
            dashed: false,
        }),
        MeasureKind::Rectangle => {
            if let [a, b, ..] = points.as_slice() {
                let (min, max) = corners(*a, *b);
                out.push(DrawInstruction::Rectangle {
                    min,
                    max,
                    stroke: color,
                    fill: Some(with_alpha(color, style.fill_alpha)),
                    width: style.stroke_width,
                    dashed: false,
                });
            }
        }
        MeasureKind::Polygon => out.push(DrawInstruction::Polygon {
            points,
            stroke: color,
            fill: Some(with_alpha(color, style.fill_alpha)),
            width: style.stroke_width,
        }),
        MeasureKind::Count => {
            for center in points {
                out.push(DrawInstruction::Marker {
                    center,
                    radius: style.marker_radius,
                    color,
                });
            }
        }
    }

    out.push(DrawInstruction::Label {
        position: transform.canonical_to_screen(measure.label_anchor()),
        text: measure.formatted_value(),
        color: style.label_color,
    });
}

fn push_calibration_segment(
    out: &mut Vec<DrawInstruction>,
    canonical: &[Point],
    transform: &ViewTransform,
    style: &OverlayStyle,
) {
    let points: Vec<Point> = canonical
        .iter()
        .map(|p| transform.canonical_to_screen(*p))
        .collect();

    for center in &points {
        out.push(DrawInstruction::Marker {
            center: *center,
            radius: style.marker_radius,
            color: style.calibration_color,
        });
    }
    if points.len() == 2 {
        out.push(DrawInstruction::Polyline {
            points,
            color: style.calibration_color,
            width: style.stroke_width,
            closed: false,
            dashed: true,
        });
    }
}

fn push_in_progress(
    out: &mut Vec<DrawInstruction>,
    input: &OverlayInput<'_>,
    style: &OverlayStyle,
) {
    let transform = input.transform;
    match input.tool_state {
        ToolState::CapturingCalibration { capture }
        | ToolState::AwaitingCalibrationDistance { capture } => {
            push_calibration_segment(out, capture.points(), transform, style);
        }
        // Count markers are already persisted and drawn with the measures
        ToolState::Accumulating {
            kind: MeasureKind::Count,
            ..
        } => {}
        ToolState::Accumulating { kind, points, .. } => {
            let screen: Vec<Point> = points
                .iter()
                .map(|p| transform.canonical_to_screen(*p))
                .collect();
            for center in &screen {
                out.push(DrawInstruction::Marker {
                    center: *center,
                    radius: style.marker_radius / 2.0,
                    color: input.pending_color,
                });
            }
            if screen.len() >= 2 {
                out.push(DrawInstruction::Polyline {
                    points: screen,
                    color: input.pending_color,
                    width: style.stroke_width,
                    closed: *kind == MeasureKind::Polygon && points.len() >= 3,
                    dashed: true,
                });
            }
        }
        ToolState::Idle { .. } | ToolState::AwaitingFirstPoint { .. } => {}
    }
}

fn corners(a: Point, b: Point) -> (Point, Point) {
    (
        Point::new(a.x.min(b.x), a.y.min(b.y)),
        Point::new(a.x.max(b.x), a.y.max(b.y)),
    )
}

fn with_alpha(color: Color, alpha: u8) -> Color {
    Color { a: alpha, ..color }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::CalibrationCapture;
    use crate::factory::finalize;
    use crate::measure::MeasureAttributes;

    fn page() -> PageKey {
        PageKey::new("plan-a", 1)
    }

    fn calibration() -> Calibration {
        Calibration::from_reference(
            page(),
            Point::new(0.0, 0.0),
            Point::new(100.0, 0.0),
            10.0,
            "ft",
            1.0,
        )
        .unwrap()
    }

    fn rectangle_on(page: &PageKey) -> Measure {
        let cal = Calibration::from_reference(
            page.clone(),
            Point::new(0.0, 0.0),
            Point::new(100.0, 0.0),
            10.0,
            "ft",
            1.0,
        )
        .unwrap();
        finalize(
            page,
            MeasureKind::Rectangle,
            vec![Point::new(20.0, 30.0), Point::new(0.0, 0.0)],
            Some(&cal),
            &MeasureAttributes::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_transform_scale() {
        let transform = ViewTransform::new(200.0, 90.0, 1.5).unwrap();
        assert_eq!(transform.scale(), 3.0);
        assert_eq!(
            transform.canonical_to_screen(Point::new(10.0, 20.0)),
            Point::new(30.0, 60.0)
        );
        assert_eq!(
            transform.screen_to_canonical(Point::new(30.0, 60.0)),
            Point::new(10.0, 20.0)
        );
        assert_eq!(transform.rotation_degrees(), 90.0);
        assert_eq!(
            ViewTransform::new(100.0, -90.0, 1.0).unwrap().rotation_degrees(),
            270.0
        );
    }

    #[test]
    fn test_transform_rejects_non_positive_scale() {
        for (zoom, base) in [(0.0, 1.0), (-50.0, 1.0), (100.0, 0.0), (f64::NAN, 1.0)] {
            assert!(matches!(
                ViewTransform::new(zoom, 0.0, base),
                Err(TakeoffError::InvalidViewTransform { .. })
            ));
        }
    }

    #[test]
    fn test_measures_scaled_and_filtered_by_page() {
        let here = rectangle_on(&page());
        let elsewhere = rectangle_on(&PageKey::new("plan-a", 2));
        let measures = vec![here, elsewhere];
        let state = ToolState::default();
        let transform = ViewTransform::new(50.0, 0.0, 1.0).unwrap();

        let instructions = render_overlay(
            &OverlayInput {
                page: &page(),
                measures: &measures,
                tool_state: &state,
                calibration: None,
                pending_color: Color::BLUE,
                transform: &transform,
            },
            &OverlayStyle::default(),
        );

        assert_eq!(instructions.len(), 2);
        match &instructions[0] {
            DrawInstruction::Rectangle { min, max, fill, .. } => {
                assert_eq!(*min, Point::new(0.0, 0.0));
                assert_eq!(*max, Point::new(10.0, 15.0));
                assert_eq!(fill.map(|c| c.a), Some(64));
            }
            other => panic!("unexpected instruction {other:?}"),
        }
        match &instructions[1] {
            DrawInstruction::Label { position, text, .. } => {
                assert_eq!(*position, Point::new(5.0, 7.5));
                assert_eq!(text, "6.00 ft²");
            }
            other => panic!("unexpected instruction {other:?}"),
        }
    }

    #[test]
    fn test_calibration_and_in_progress_layers() {
        let cal = calibration();
        let state = ToolState::Accumulating {
            kind: MeasureKind::Polygon,
            points: vec![
                Point::new(0.0, 0.0),
                Point::new(10.0, 0.0),
                Point::new(10.0, 10.0),
            ],
            count_id: None,
        };
        let transform = ViewTransform::default();

        let instructions = render_overlay(
            &OverlayInput {
                page: &page(),
                measures: &[],
                tool_state: &state,
                calibration: Some(&cal),
                pending_color: Color::BLUE,
                transform: &transform,
            },
            &OverlayStyle::default(),
        );

        // 2 calibration markers + dashed reference, 3 vertex markers + outline
        assert_eq!(instructions.len(), 7);
        assert!(matches!(
            instructions[2],
            DrawInstruction::Polyline { dashed: true, .. }
        ));
        match instructions.last() {
            Some(DrawInstruction::Polyline { closed, color, .. }) => {
                assert!(*closed);
                assert_eq!(*color, Color::BLUE);
            }
            other => panic!("unexpected instruction {other:?}"),
        }
    }

    #[test]
    fn test_calibration_capture_markers() {
        let mut capture = CalibrationCapture::new();
        capture.add_point(Point::new(4.0, 4.0)).unwrap();
        let state = ToolState::CapturingCalibration { capture };
        let transform = ViewTransform::new(200.0, 0.0, 1.0).unwrap();

        let instructions = render_overlay(
            &OverlayInput {
                page: &page(),
                measures: &[],
                tool_state: &state,
                calibration: None,
                pending_color: Color::BLUE,
                transform: &transform,
            },
            &OverlayStyle::default(),
        );

        assert_eq!(
            instructions,
            vec![DrawInstruction::Marker {
                center: Point::new(8.0, 8.0),
                radius: 5.0,
                color: Color::ORANGE,
            }]
        );
    }

    #[test]
    fn test_render_does_not_touch_measures() {
        let measures = vec![rectangle_on(&page())];
        let before = measures.clone();
        let state = ToolState::default();
        let transform = ViewTransform::new(300.0, 0.0, 2.0).unwrap();
        let _ = render_overlay(
            &OverlayInput {
                page: &page(),
                measures: &measures,
                tool_state: &state,
                calibration: None,
                pending_color: Color::RED,
                transform: &transform,
            },
            &OverlayStyle::default(),
        );
        assert_eq!(measures, before);
    }
}
