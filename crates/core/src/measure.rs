//! Persisted takeoff measures
//!
//! A measure is created once, when a shape is finalized, and is never edited
//! in place. Changing one means deleting it and creating a replacement.

use crate::calibration::PageKey;
use crate::geometry::{self, Point};

/// Unique identifier for a measure
pub type MeasureId = uuid::Uuid;

/// Unit recorded on count measures
pub const COUNT_UNIT: &str = "unité";

/// Kind of measurement a shape produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeasureKind {
    /// Length along an open path
    Line,
    /// Area of an axis-aligned rectangle given by two corners
    Rectangle,
    /// Area of a closed polygon
    Polygon,
    /// Number of placed markers
    Count,
}

impl MeasureKind {
    /// Whether this kind converts through a page calibration
    pub fn needs_calibration(&self) -> bool {
        !matches!(self, MeasureKind::Count)
    }

    /// Fewest points a finished shape of this kind may have
    pub fn min_points(&self) -> usize {
        match self {
            MeasureKind::Count => 1,
            MeasureKind::Line | MeasureKind::Rectangle => 2,
            MeasureKind::Polygon => 3,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            MeasureKind::Line => "line",
            MeasureKind::Rectangle => "rectangle",
            MeasureKind::Polygon => "polygon",
            MeasureKind::Count => "count",
        }
    }
}

impl std::fmt::Display for MeasureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for MeasureKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "line" => Ok(MeasureKind::Line),
            "rectangle" | "rect" => Ok(MeasureKind::Rectangle),
            "polygon" => Ok(MeasureKind::Polygon),
            "count" => Ok(MeasureKind::Count),
            other => Err(format!("unknown measure kind: {other}")),
        }
    }
}

/// RGBA color representation
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const RED: Color = Color { r: 255, g: 0, b: 0, a: 255 };
    pub const BLUE: Color = Color { r: 0, g: 0, b: 255, a: 255 };
    pub const ORANGE: Color = Color { r: 255, g: 140, b: 0, a: 255 };

    /// Create an opaque color
    pub fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Parse `#RRGGBB` or `#RRGGBBAA`
    pub fn from_hex(hex: &str) -> Option<Self> {
        let digits = hex.strip_prefix('#').unwrap_or(hex);
        if !digits.is_ascii() {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(digits.get(i..i + 2)?, 16).ok();
        match digits.len() {
            6 => Some(Self::rgb(channel(0)?, channel(2)?, channel(4)?)),
            8 => Some(Self {
                r: channel(0)?,
                g: channel(2)?,
                b: channel(4)?,
                a: channel(6)?,
            }),
            _ => None,
        }
    }

    /// Format as `#RRGGBB`, appending alpha only when not opaque
    pub fn to_hex(&self) -> String {
        if self.a == 255 {
            format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
        } else {
            format!("#{:02X}{:02X}{:02X}{:02X}", self.r, self.g, self.b, self.a)
        }
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::RED
    }
}

/// User-chosen attributes applied to the next finalized shape
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MeasureAttributes {
    pub label: String,
    pub category: String,
    pub color: Color,
    /// Price per unit of value; zero is allowed
    pub unit_price: f64,
}

impl Default for MeasureAttributes {
    fn default() -> Self {
        Self {
            label: String::new(),
            category: String::new(),
            color: Color::default(),
            unit_price: 0.0,
        }
    }
}

/// A finalized, priced measurement on one plan page
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Measure {
    id: MeasureId,
    kind: MeasureKind,
    /// Canonical-space points as clicked
    points: Vec<Point>,
    /// Real-world length, area or count
    value: f64,
    unit: String,
    label: String,
    category: String,
    color: Color,
    unit_price: f64,
    total_price: f64,
    plan_id: String,
    page_number: u32,
}

impl Measure {
    pub(crate) fn new(
        page: &PageKey,
        kind: MeasureKind,
        points: Vec<Point>,
        value: f64,
        unit: String,
        attributes: &MeasureAttributes,
    ) -> Self {
        Self {
            id: MeasureId::new_v4(),
            kind,
            points,
            value,
            unit,
            label: attributes.label.clone(),
            category: attributes.category.clone(),
            color: attributes.color,
            unit_price: attributes.unit_price,
            total_price: value * attributes.unit_price,
            plan_id: page.plan_id.clone(),
            page_number: page.page,
        }
    }

    /// Reuse an existing id for a recreated measure
    pub(crate) fn with_id(mut self, id: MeasureId) -> Self {
        self.id = id;
        self
    }

    pub fn id(&self) -> MeasureId {
        self.id
    }

    pub fn kind(&self) -> MeasureKind {
        self.kind
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn color(&self) -> Color {
        self.color
    }

    pub fn unit_price(&self) -> f64 {
        self.unit_price
    }

    pub fn total_price(&self) -> f64 {
        self.total_price
    }

    pub fn plan_id(&self) -> &str {
        &self.plan_id
    }

    pub fn page_number(&self) -> u32 {
        self.page_number
    }

    pub fn page_key(&self) -> PageKey {
        PageKey::new(self.plan_id.clone(), self.page_number)
    }

    pub fn is_on(&self, page: &PageKey) -> bool {
        self.plan_id == page.plan_id && self.page_number == page.page
    }

    /// Value with unit, e.g. `6.00 ft²`
    pub fn formatted_value(&self) -> String {
        match self.kind {
            MeasureKind::Count => format!("{} {}", self.value, self.unit),
            _ => format!("{:.2} {}", self.value, self.unit),
        }
    }

    /// Where the value label should be drawn, in canonical space
    pub fn label_anchor(&self) -> Point {
        let anchor = match self.kind {
            MeasureKind::Line => geometry::path_midpoint(&self.points),
            MeasureKind::Rectangle => match self.points.as_slice() {
                [a, b, ..] => Some(a.midpoint(b)),
                _ => None,
            },
            MeasureKind::Polygon => geometry::centroid(&self.points),
            MeasureKind::Count => self.points.first().copied(),
        };
        anchor.unwrap_or_default()
    }

    /// Check whether a canonical point selects this measure
    pub fn hit_test(&self, point: Point, tolerance: f64) -> bool {
        match self.kind {
            MeasureKind::Line => self
                .points
                .windows(2)
                .any(|w| geometry::point_near_segment(point, w[0], w[1], tolerance)),
            MeasureKind::Polygon => {
                let n = self.points.len();
                (0..n).any(|i| {
                    geometry::point_near_segment(
                        point,
                        self.points[i],
                        self.points[(i + 1) % n],
                        tolerance,
                    )
                })
            }
            MeasureKind::Rectangle => match geometry::bounding_box(&self.points) {
                Some((min_x, min_y, max_x, max_y)) => {
                    point.x >= min_x - tolerance
                        && point.x <= max_x + tolerance
                        && point.y >= min_y - tolerance
                        && point.y <= max_y + tolerance
                }
                None => false,
            },
            MeasureKind::Count => self
                .points
                .iter()
                .any(|marker| geometry::hit_test(point, *marker, tolerance)),
        }
    }
}
