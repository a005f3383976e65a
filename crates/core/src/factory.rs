//! Measurement factory
//!
//! Turns a finished point sequence into a priced [`Measure`]. The calibration
//! check runs before any geometry so an uncalibrated page never yields a
//! half-computed value.

use crate::calibration::{Calibration, PageKey};
use crate::error::{TakeoffError, TakeoffResult};
use crate::geometry::{self, Point};
use crate::measure::{Measure, MeasureAttributes, MeasureKind, COUNT_UNIT};

/// Build a measure for `kind` from canonical `points`
///
/// # Errors
/// - `CalibrationRequired` for line, rectangle and polygon without a calibration
/// - `InsufficientPoints` when the shape has too few points for its kind
pub fn finalize(
    page: &PageKey,
    kind: MeasureKind,
    points: Vec<Point>,
    calibration: Option<&Calibration>,
    attributes: &MeasureAttributes,
) -> TakeoffResult<Measure> {
    finalize_with_count_unit(page, kind, points, calibration, attributes, COUNT_UNIT)
}

/// Same as [`finalize`] with a configurable unit label for counts
pub fn finalize_with_count_unit(
    page: &PageKey,
    kind: MeasureKind,
    points: Vec<Point>,
    calibration: Option<&Calibration>,
    attributes: &MeasureAttributes,
    count_unit: &str,
) -> TakeoffResult<Measure> {
    let required = || TakeoffError::CalibrationRequired {
        plan_id: page.plan_id.clone(),
        page: page.page,
    };

    let (value, unit) = match kind {
        MeasureKind::Count => {
            if points.is_empty() {
                return Err(TakeoffError::InsufficientPoints {
                    required: 1,
                    actual: 0,
                });
            }
            (points.len() as f64, count_unit.to_string())
        }
        MeasureKind::Line => {
            let cal = calibration.ok_or_else(required)?;
            let pixels = geometry::polyline_length(&points)?;
            (cal.to_real_length(pixels), cal.real_unit().to_string())
        }
        MeasureKind::Rectangle => {
            let cal = calibration.ok_or_else(required)?;
            let [p0, p1] = match points.as_slice() {
                [p0, p1] => [*p0, *p1],
                _ => {
                    return Err(TakeoffError::InsufficientPoints {
                        required: 2,
                        actual: points.len(),
                    })
                }
            };
            (cal.to_real_area(geometry::rectangle_area(p0, p1)), cal.area_unit())
        }
        MeasureKind::Polygon => {
            let cal = calibration.ok_or_else(required)?;
            let pixels = geometry::polygon_area(&points)?;
            (cal.to_real_area(pixels), cal.area_unit())
        }
    };

    Ok(Measure::new(page, kind, points, value, unit, attributes))
}

#[cfg(test)]
mod tests {
    use super::*;

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

    fn priced(unit_price: f64) -> MeasureAttributes {
        MeasureAttributes {
            unit_price,
            ..MeasureAttributes::default()
        }
    }

    #[test]
    fn test_line_value() {
        let cal = calibration();
        let measure = finalize(
            &page(),
            MeasureKind::Line,
            vec![Point::new(0.0, 0.0), Point::new(50.0, 0.0)],
            Some(&cal),
            &priced(2.0),
        )
        .unwrap();

        assert_eq!(measure.value(), 5.0);
        assert_eq!(measure.unit(), "ft");
        assert_eq!(measure.total_price(), 10.0);
    }

    #[test]
    fn test_rectangle_scenario() {
        let cal = calibration();
        let measure = finalize(
            &page(),
            MeasureKind::Rectangle,
            vec![Point::new(0.0, 0.0), Point::new(20.0, 30.0)],
            Some(&cal),
            &priced(5.0),
        )
        .unwrap();

        assert!((measure.value() - 6.0).abs() < 1e-12);
        assert_eq!(measure.unit(), "ft²");
        assert!((measure.total_price() - 30.0).abs() < 1e-12);
    }

    #[test]
    fn test_polygon_value() {
        let cal = calibration();
        let measure = finalize(
            &page(),
            MeasureKind::Polygon,
            vec![
                Point::new(0.0, 0.0),
                Point::new(100.0, 0.0),
                Point::new(100.0, 100.0),
                Point::new(0.0, 100.0),
            ],
            Some(&cal),
            &priced(0.0),
        )
        .unwrap();

        assert_eq!(measure.value(), 100.0);
        assert_eq!(measure.unit(), "ft²");
        assert_eq!(measure.total_price(), 0.0);
    }

    #[test]
    fn test_count_without_calibration() {
        let measure = finalize(
            &page(),
            MeasureKind::Count,
            vec![Point::new(1.0, 1.0), Point::new(9.0, 9.0), Point::new(4.0, 4.0)],
            None,
            &priced(12.5),
        )
        .unwrap();

        assert_eq!(measure.value(), 3.0);
        assert_eq!(measure.unit(), COUNT_UNIT);
        assert_eq!(measure.total_price(), 37.5);
    }

    #[test]
    fn test_calibration_required() {
        for kind in [MeasureKind::Line, MeasureKind::Rectangle, MeasureKind::Polygon] {
            let result = finalize(
                &page(),
                kind,
                vec![Point::new(0.0, 0.0), Point::new(1.0, 1.0), Point::new(2.0, 0.0)],
                None,
                &priced(1.0),
            );
            assert!(matches!(result, Err(TakeoffError::CalibrationRequired { .. })));
        }
    }

    #[test]
    fn test_calibration_checked_before_geometry() {
        // Too few points AND no calibration: calibration wins
        let result = finalize(&page(), MeasureKind::Polygon, vec![], None, &priced(1.0));
        assert!(matches!(result, Err(TakeoffError::CalibrationRequired { .. })));
    }

    #[test]
    fn test_insufficient_points() {
        let cal = calibration();
        let polygon = finalize(
            &page(),
            MeasureKind::Polygon,
            vec![Point::new(0.0, 0.0), Point::new(10.0, 0.0)],
            Some(&cal),
            &priced(1.0),
        );
        assert!(matches!(
            polygon,
            Err(TakeoffError::InsufficientPoints { required: 3, actual: 2 })
        ));

        let rectangle = finalize(
            &page(),
            MeasureKind::Rectangle,
            vec![Point::new(0.0, 0.0)],
            Some(&cal),
            &priced(1.0),
        );
        assert!(matches!(
            rectangle,
            Err(TakeoffError::InsufficientPoints { required: 2, actual: 1 })
        ));

        let count = finalize(&page(), MeasureKind::Count, vec![], None, &priced(1.0));
        assert!(count.is_err());
    }
}
