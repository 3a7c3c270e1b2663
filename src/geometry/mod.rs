//! Geometry utilities for tetra-multigrid.
//!
//! Plain `[f64; 3]` arithmetic plus the simplex metrics (volumes, normals,
//! barycentric coordinates, circumspheres) used by the hierarchy queries.

pub mod metrics;

pub use metrics::{Point2, Point3};
