//! The tetrahedral mesh hierarchy.
//!
//! This module provides the entities and the machinery of the multilevel mesh:
//! - [`reference`] and [`refine_rule`]: local numbering and the constant rule catalog
//! - [`simplex`]: vertices, edges, faces and tetrahedra with their arena handles
//! - [`multigrid`]: the hierarchy manager with marking and geometric queries
//! - [`hierarchy`] and [`tetra_refine`]: the refinement cycle
//! - [`iter`], [`locate`], [`validation`] and [`dump`]: consumer and debug access
//!
//! Most users build a [`MultiGrid`] from a builder, mark leaves, call
//! [`MultiGrid::refine`] and walk the result with the `triang_*` iterators.

pub mod dump;
pub mod hierarchy;
pub mod iter;
pub mod locate;
pub mod multigrid;
pub mod recycle;
pub mod reference;
pub mod refine_rule;
pub mod simplex;
pub mod tetra_refine;
pub mod validation;

pub use locate::Location;
pub use multigrid::{LevelSize, MultiGrid, MultiGridOptions};
pub use simplex::*;
pub use validation::{SanityOptions, validate_multigrid};
