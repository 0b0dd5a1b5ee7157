//! Piecewise-affine functions, defined by support points.
use crate::error::ModelError;
use anyhow::{Result, ensure};

/// One affine piece of a [`PiecewiseAffine`] function
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    /// The gradient of the piece
    pub slope: f64,
    /// The value of the piece's extension at x = 0
    pub intercept: f64,
    /// The lowest x covered
    pub lower: f64,
    /// The highest x covered
    pub upper: f64,
}

impl Segment {
    /// Evaluate the affine piece at x
    pub fn evaluate(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }

    /// Whether x lies within the segment (inclusive of both ends)
    pub fn contains(&self, x: f64) -> bool {
        self.lower <= x && x <= self.upper
    }
}

/// A continuous function made of affine pieces between consecutive support points
#[derive(Debug, Clone, PartialEq)]
pub struct PiecewiseAffine {
    points: Vec<(f64, f64)>,
}

impl PiecewiseAffine {
    /// Create a new function from support points.
    ///
    /// There must be at least two points, with finite coordinates and strictly increasing x.
    pub fn new(element: &str, points: Vec<(f64, f64)>) -> Result<Self> {
        ensure!(
            points.len() >= 2,
            ModelError::data_consistency(
                element,
                "a piecewise-affine function needs at least two support points"
            )
        );
        ensure!(
            points.iter().all(|(x, y)| x.is_finite() && y.is_finite()),
            ModelError::data_consistency(element, "support points must be finite")
        );
        ensure!(
            points.windows(2).all(|w| w[0].0 < w[1].0),
            ModelError::data_consistency(
                element,
                "support points must have strictly increasing x values"
            )
        );

        Ok(Self { points })
    }

    /// The support points
    pub fn points(&self) -> &[(f64, f64)] {
        &self.points
    }

    /// The affine pieces, in order of increasing x
    pub fn segments(&self) -> Vec<Segment> {
        self.points
            .windows(2)
            .map(|w| {
                let ((x0, y0), (x1, y1)) = (w[0], w[1]);
                let slope = (y1 - y0) / (x1 - x0);
                Segment {
                    slope,
                    intercept: y0 - slope * x0,
                    lower: x0,
                    upper: x1,
                }
            })
            .collect()
    }

    /// The index of the segment containing x.
    ///
    /// At a support point shared by two segments, the lower-indexed segment is returned.
    pub fn segment_of(&self, x: f64) -> Option<usize> {
        self.segments().iter().position(|segment| segment.contains(x))
    }

    /// Evaluate the function at x, or `None` if x is outside the support points
    pub fn evaluate(&self, x: f64) -> Option<f64> {
        let segments = self.segments();
        let segment = segments.iter().find(|segment| segment.contains(x))?;
        Some(segment.evaluate(x))
    }

    /// The lowest x of the domain
    pub fn lower(&self) -> f64 {
        self.points[0].0
    }

    /// The highest x of the domain
    pub fn upper(&self) -> f64 {
        self.points[self.points.len() - 1].0
    }
}
