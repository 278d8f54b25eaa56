//! Geospatial value objects.
//!
//! Shapes render to the legacy coordinate-pair operators used with `2d`
//! indexes (`$center`, `$box`, `$polygon`, `$centerSphere`). Distances pair a
//! magnitude with a [`Metric`]; the normalized value (magnitude divided by the
//! metric's multiplier) is what spherical queries expect.

use std::fmt;

use bson::Bson;

use crate::error::{MongoError, MongoResult};

/// A unit of distance expressed as a multiplier against radians.
pub trait Metric: fmt::Debug + Send + Sync {
    /// Multiplier converting a normalized value into this unit.
    fn multiplier(&self) -> f64;

    /// Short unit name.
    fn abbreviation(&self) -> &'static str;
}

/// Built-in metrics.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Metrics {
    /// Kilometers on the earth's equator.
    Kilometers,
    /// Miles on the earth's equator.
    Miles,
    /// Plain coordinate units.
    #[default]
    Neutral,
}

impl Metric for Metrics {
    fn multiplier(&self) -> f64 {
        match self {
            Self::Kilometers => 6378.137,
            Self::Miles => 3963.191,
            Self::Neutral => 1.0,
        }
    }

    fn abbreviation(&self) -> &'static str {
        match self {
            Self::Kilometers => "km",
            Self::Miles => "mi",
            Self::Neutral => "",
        }
    }
}

/// A magnitude in a given metric.
///
/// Equality compares the (value, metric) pair, so `1 km` and `0.62 mi` are
/// not equal even though they describe similar lengths.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Distance {
    value: f64,
    metric: Metrics,
}

impl Distance {
    /// Create a distance in the given metric.
    pub fn new(value: f64, metric: Metrics) -> Self {
        Self { value, metric }
    }

    /// Create a distance in plain coordinate units.
    pub fn neutral(value: f64) -> Self {
        Self::new(value, Metrics::Neutral)
    }

    /// Raw magnitude.
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Unit of the magnitude.
    pub fn metric(&self) -> Metrics {
        self.metric
    }

    /// Magnitude divided by the metric multiplier.
    pub fn normalized_value(&self) -> f64 {
        self.value / self.metric.multiplier()
    }

    /// Add two distances, expressing the result in this distance's metric.
    pub fn add(&self, other: &Distance) -> Distance {
        self.add_in(other, self.metric)
    }

    /// Add two distances, expressing the result in `metric`.
    pub fn add_in(&self, other: &Distance, metric: Metrics) -> Distance {
        if self.metric == metric && other.metric == metric {
            return Distance::new(self.value + other.value, metric);
        }
        let normalized = self.normalized_value() + other.normalized_value();
        Distance::new(normalized * metric.multiplier(), metric)
    }

    /// The same length expressed in another metric.
    pub fn in_metric(&self, metric: Metrics) -> Distance {
        if self.metric == metric {
            return *self;
        }
        Distance::new(self.normalized_value() * metric.multiplier(), metric)
    }
}

impl std::ops::Add for Distance {
    type Output = Distance;

    fn add(self, rhs: Distance) -> Distance {
        Distance::add(&self, &rhs)
    }
}

impl fmt::Display for Distance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.metric.abbreviation() {
            "" => write!(f, "{}", self.value),
            unit => write!(f, "{} {unit}", self.value),
        }
    }
}

/// A point in coordinate space, `x` being longitude for geographic data.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    /// X coordinate.
    pub x: f64,
    /// Y coordinate.
    pub y: f64,
}

impl Point {
    /// Create a point.
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// The `[x, y]` pair.
    pub fn as_bson(&self) -> Bson {
        Bson::Array(vec![Bson::Double(self.x), Bson::Double(self.y)])
    }
}

impl From<(f64, f64)> for Point {
    fn from((x, y): (f64, f64)) -> Self {
        Self::new(x, y)
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Point [x={}, y={}]", self.x, self.y)
    }
}

/// A region usable with `$geoWithin`.
pub trait Shape: fmt::Debug + Send + Sync {
    /// Operator keyword naming the shape.
    fn command(&self) -> &'static str;

    /// Operator argument.
    fn as_bson(&self) -> Bson;

    /// `{ <command>: <argument> }`.
    fn as_document(&self) -> bson::Document {
        let mut document = bson::Document::new();
        document.insert(self.command(), self.as_bson());
        document
    }
}

/// A flat circle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Circle {
    center: Point,
    radius: f64,
}

impl Circle {
    /// Create a circle; the radius must not be negative.
    pub fn new(center: Point, radius: f64) -> MongoResult<Self> {
        if radius.is_nan() || radius < 0.0 {
            return Err(MongoError::invalid_operation(format!(
                "circle radius must be zero or greater, got {radius}"
            )));
        }
        Ok(Self { center, radius })
    }

    /// Center point.
    pub fn center(&self) -> Point {
        self.center
    }

    /// Radius in coordinate units.
    pub fn radius(&self) -> f64 {
        self.radius
    }
}

impl Shape for Circle {
    fn command(&self) -> &'static str {
        "$center"
    }

    fn as_bson(&self) -> Bson {
        Bson::Array(vec![self.center.as_bson(), Bson::Double(self.radius)])
    }
}

/// A circle on a sphere; the radius is a [`Distance`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sphere {
    center: Point,
    radius: Distance,
}

impl Sphere {
    /// Create a sphere.
    pub fn new(center: Point, radius: Distance) -> Self {
        Self { center, radius }
    }

    /// Center point.
    pub fn center(&self) -> Point {
        self.center
    }

    /// Radius.
    pub fn radius(&self) -> Distance {
        self.radius
    }
}

impl Shape for Sphere {
    fn command(&self) -> &'static str {
        "$centerSphere"
    }

    fn as_bson(&self) -> Bson {
        Bson::Array(vec![
            self.center.as_bson(),
            Bson::Double(self.radius.normalized_value()),
        ])
    }
}

/// An axis-aligned box given by two opposite corners.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoBox {
    first: Point,
    second: Point,
}

impl GeoBox {
    /// Create a box from its lower-left and upper-right corners.
    pub fn new(first: Point, second: Point) -> Self {
        Self { first, second }
    }

    /// Lower-left corner.
    pub fn first(&self) -> Point {
        self.first
    }

    /// Upper-right corner.
    pub fn second(&self) -> Point {
        self.second
    }
}

impl Shape for GeoBox {
    fn command(&self) -> &'static str {
        "$box"
    }

    fn as_bson(&self) -> Bson {
        Bson::Array(vec![self.first.as_bson(), self.second.as_bson()])
    }
}

/// A closed polygon of at least three points.
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    points: Vec<Point>,
}

impl Polygon {
    /// Create a polygon.
    pub fn new(points: Vec<Point>) -> MongoResult<Self> {
        if points.len() < 3 {
            return Err(MongoError::invalid_operation(format!(
                "a polygon needs at least 3 points, got {}",
                points.len()
            )));
        }
        Ok(Self { points })
    }

    /// Vertices in order.
    pub fn points(&self) -> &[Point] {
        &self.points
    }
}

impl Shape for Polygon {
    fn command(&self) -> &'static str {
        "$polygon"
    }

    fn as_bson(&self) -> Bson {
        Bson::Array(self.points.iter().map(Point::as_bson).collect())
    }
}
