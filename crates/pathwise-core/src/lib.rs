//! Core types shared by every Pathwise solver.
//!
//! This is the leaf crate with zero internal dependencies. It defines
//! the lattice description ([`Grid`]), the numeric field stored on it
//! ([`ValueArray`]), edge handling ([`BoundarySpec`]), the seeded
//! generator every stochastic computation receives explicitly
//! ([`DeterministicRng`]), and the cooperative [`CancelToken`].

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod boundary;
pub mod cancel;
pub mod error;
pub mod grid;
pub mod hash;
pub mod rng;

pub use boundary::{enforce_boundary, resolve_index, Boundary, BoundarySpec};
pub use cancel::CancelToken;
pub use error::GridError;
pub use grid::{Coords, Grid, GridSpec, ValueArray};
pub use hash::{fnv1a_bytes, fnv1a_f64s, seed_from_str};
pub use rng::DeterministicRng;
