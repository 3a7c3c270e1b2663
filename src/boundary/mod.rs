//! Boundary model: parametrized surface patches the mesh boundary lies on.
//!
//! A [`BoundarySegment`] maps a 2D parameter onto its 3D surface. When a
//! boundary edge is refined its midpoint is placed by
//! [`BoundarySegment::mid_project`] so that refined meshes converge to the
//! analytic surface instead of the polyhedral level-0 approximation.
//!
//! Segments are registered on a [`Boundary`] and addressed by [`BndIdx`].
//! Refinement never inspects the concrete segment type.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::geometry::metrics::{add, scale};
use crate::geometry::{Point2, Point3};
use crate::mesh_error::MeshError;

/// Index of a boundary segment within its [`Boundary`].
pub type BndIdx = u16;

/// A vertex' position in the parameter space of one boundary segment.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BndPoint {
    pub segment: BndIdx,
    pub coord2d: Point2,
}

impl BndPoint {
    pub fn new(segment: BndIdx, coord2d: Point2) -> Self {
        Self { segment, coord2d }
    }
}

/// A parametrized surface patch.
pub trait BoundarySegment: fmt::Debug {
    /// Map a parameter to world coordinates.
    fn map(&self, p: Point2) -> Point3;

    /// Midpoint of the boundary edge `p0`-`p1`, projected onto this segment.
    ///
    /// Returns the 3D position and its parameter. The default uses the
    /// parameter-space midpoint, which is exact for affine patches.
    fn mid_project(&self, p0: &BndPoint, p1: &BndPoint) -> (Point3, Point2) {
        let mid = [
            0.5 * (p0.coord2d[0] + p1.coord2d[0]),
            0.5 * (p0.coord2d[1] + p1.coord2d[1]),
        ];
        (self.map(mid), mid)
    }
}

/// The set of boundary segments owned by a hierarchy.
#[derive(Debug, Default)]
pub struct Boundary {
    segments: Vec<Box<dyn BoundarySegment>>,
}

impl Boundary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a segment and return its index.
    pub fn add_segment(&mut self, segment: Box<dyn BoundarySegment>) -> Result<BndIdx, MeshError> {
        let idx = BndIdx::try_from(self.segments.len()).map_err(|_| {
            MeshError::InvalidBuilderInput("too many boundary segments".to_string())
        })?;
        self.segments.push(segment);
        Ok(idx)
    }

    pub fn segment(&self, idx: BndIdx) -> Result<&dyn BoundarySegment, MeshError> {
        self.segments
            .get(usize::from(idx))
            .map(|s| s.as_ref())
            .ok_or(MeshError::UnknownBoundarySegment(idx))
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

/// Parallelogram `origin + s * e1 + t * e2` with `(s, t)` in `[0, 1]^2`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AffineSquare {
    pub origin: Point3,
    pub e1: Point3,
    pub e2: Point3,
}

impl AffineSquare {
    pub fn new(origin: Point3, e1: Point3, e2: Point3) -> Self {
        Self { origin, e1, e2 }
    }
}

impl BoundarySegment for AffineSquare {
    fn map(&self, p: Point2) -> Point3 {
        add(self.origin, add(scale(self.e1, p[0]), scale(self.e2, p[1])))
    }
}

/// Triangle `origin + s * e1 + t * e2` with `s, t >= 0`, `s + t <= 1`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AffineTriangle {
    pub origin: Point3,
    pub e1: Point3,
    pub e2: Point3,
}

impl AffineTriangle {
    pub fn new(origin: Point3, e1: Point3, e2: Point3) -> Self {
        Self { origin, e1, e2 }
    }

    /// Triangle spanned by three corners.
    pub fn from_corners(a: Point3, b: Point3, c: Point3) -> Self {
        use crate::geometry::metrics::sub;
        Self::new(a, sub(b, a), sub(c, a))
    }
}

impl BoundarySegment for AffineTriangle {
    fn map(&self, p: Point2) -> Point3 {
        add(self.origin, add(scale(self.e1, p[0]), scale(self.e2, p[1])))
    }
}
