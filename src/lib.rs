#![cfg_attr(docsrs, feature(doc_cfg))]
//! # tetra-multigrid
//!
//! tetra-multigrid maintains an adaptive, hierarchical tetrahedral mesh for finite-element
//! PDE codes. A coarse level-0 mesh is refined locally, level by level, with the red/green
//! rule catalog of Bey; every triangulation level stays conforming after each cycle.
//!
//! ## Features
//! - Simplex entities in per-level `slotmap` arenas, cross-referenced by stable handles
//! - A constant catalog of 64 refinement rules, one per edge pattern
//! - Mark restriction, conforming closure, unrefinement and refinement in one [`MultiGrid::refine`]
//! - Recycling of children and sub-simplices when a refinement rule changes
//! - Parametrized boundary segments so refined boundaries follow the analytic surface
//! - Two iterator families per entity kind: the full forest and the triangulation of a level
//! - An opt-in sanity checker covering all structural invariants
//!
//! ## Usage
//! ```
//! use tetra_multigrid::prelude::*;
//!
//! let mut mg = MultiGrid::new(&BrickBuilder::unit_cube())?;
//! let (first, _) = mg.triang_tetras(0).next().unwrap();
//! mg.mark_for_refinement(first)?;
//! mg.refine()?;
//! assert!(mg.is_sane(SanityOptions::all()));
//! # Ok::<(), MeshError>(())
//! ```
//!
//! ## Handles
//! Handles returned by queries and iterators stay valid until the next refinement
//! cycle. Re-acquire them afterwards.

pub mod boundary;
pub mod debug_invariants;
pub mod geometry;
pub mod mesh_error;
pub mod mesh_generation;
pub mod topology;

pub use debug_invariants::DebugInvariants;

/// A convenient prelude to import the most-used traits & types:
pub mod prelude {
    pub use crate::boundary::{
        AffineSquare, AffineTriangle, BndIdx, BndPoint, Boundary, BoundarySegment,
    };
    pub use crate::debug_invariants::DebugInvariants;
    pub use crate::geometry::{Point2, Point3};
    pub use crate::mesh_error::MeshError;
    pub use crate::mesh_generation::{BrickBuilder, LevelZero, MeshBuilder, TetraBuilder};
    pub use crate::topology::locate::Location;
    pub use crate::topology::multigrid::{LevelSize, MultiGrid, MultiGridOptions};
    pub use crate::topology::refine_rule::{
        GREEN_REG_REF_MARK, NO_REF_MARK, REG_REF_MARK, REMOVE_MARK,
    };
    pub use crate::topology::simplex::{
        Edge, EdgeHandle, Face, FaceHandle, Tetra, TetraHandle, Vertex, VertexHandle,
    };
    pub use crate::topology::validation::{SanityOptions, validate_multigrid};
}
