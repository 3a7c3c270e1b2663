//! MeshError: unified error type for tetra-multigrid public APIs.
//!
//! Refinement never panics on malformed input or broken invariants; every such
//! condition surfaces here. A refinement cycle that returns an error leaves the
//! hierarchy in an undefined state and it must not be refined again.

use thiserror::Error;

use crate::boundary::BndIdx;

/// Unified error type for multigrid construction, refinement and queries.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MeshError {
    /// An edge whose endpoints share more than two boundary segments.
    #[error("edge {v0}-{v1} lies on {count} boundary segments (at most two allowed)")]
    EdgeOnTooManyBoundarySegments { v0: u64, v1: u64, count: usize },
    /// Three boundary vertices share more than one boundary segment.
    #[error("face {vertices:?} lies on more than one boundary segment")]
    FaceOnTooManyBoundarySegments { vertices: [u64; 3] },
    /// The two segment projections of a junction edge do not agree.
    #[error(
        "boundary projections of edge {v0}-{v1} disagree by {distance:e} (tolerance {tolerance:e})"
    )]
    BoundaryProjectionMismatch {
        v0: u64,
        v1: u64,
        distance: f64,
        tolerance: f64,
    },
    /// A boundary index with no registered segment.
    #[error("unknown boundary segment {0}")]
    UnknownBoundarySegment(BndIdx),
    /// A boundary edge endpoint carries no parameter for the edge's segment.
    #[error("vertex {vertex} has no boundary description for segment {segment}")]
    NonBoundaryVertex { vertex: u64, segment: BndIdx },
    /// Both same-level (or both child) slots of a face are already taken.
    #[error("face slot {slot} is already linked to tetra {linked}")]
    FaceSlotOccupied { slot: usize, linked: u64 },
    /// Unlinking a tetra that is not registered on the face.
    #[error("tetra {0} is not a neighbor of this face")]
    NoSuchNeighbor(u64),
    /// A tetra linked to a face more than one level below it.
    #[error("tetra {tetra} on level {tetra_level} cannot link to a face on level {face_level}")]
    IllegalGreenLevel {
        tetra: u64,
        tetra_level: usize,
        face_level: usize,
    },
    /// An edge refinement counter released more often than requested.
    #[error("refinement counter of edge {v0}-{v1} would drop below zero")]
    EdgeMarkUnderflow { v0: u64, v1: u64 },
    /// A sub-edge of an already refined edge could not be found.
    #[error("sub-edge {v0}-{v1} of a refined edge is missing")]
    MissingSubEdge { v0: u64, v1: u64 },
    /// A vertex needed by the refinement rule does not exist.
    #[error("refinement of tetra {tetra} needs local vertex {local} which does not exist")]
    MissingLocalVertex { tetra: u64, local: u8 },
    /// A handle whose entity was erased or never existed.
    #[error("stale {kind} handle on level {level}")]
    StaleHandle { kind: &'static str, level: usize },
    /// Marking requests are accepted on leaves only.
    #[error("tetra {0} is refined; only unrefined tetrahedra accept marks")]
    MarkOnRefinedTetra(u64),
    /// Local face index outside `0..4` or edge index outside `0..6`.
    #[error("local index {index} out of range for a {kind}")]
    LocalIndexOutOfRange { kind: &'static str, index: usize },
    /// Face or tetra queried in a triangulation it does not belong to.
    #[error("{kind} is not part of the triangulation at level {level}")]
    NotInTriangulation { kind: &'static str, level: usize },
    /// Degenerate geometry, reported with a dump of the offending entity.
    #[error("degenerate geometry while computing {what}:\n{dump}")]
    DegenerateGeometry { what: &'static str, dump: String },
    /// Invalid coordinates or parameters handed to a geometric routine.
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),
    /// Invalid input handed to a level-0 builder.
    #[error("invalid builder input: {0}")]
    InvalidBuilderInput(String),
    /// A structural invariant found broken by the sanity checker.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}
