//! Error types for grid construction and indexing.

use std::error::Error;
use std::fmt;

/// Errors arising from grid construction, field allocation, or indexing.
#[derive(Clone, Debug, PartialEq)]
pub enum GridError {
    /// `shape`, `spacing` and `origin` have different lengths.
    DimensionMismatch {
        /// Length of `shape`.
        shape: usize,
        /// Length of `spacing`.
        spacing: usize,
        /// Length of `origin`.
        origin: usize,
    },
    /// Attempted to construct a grid with zero axes or a zero-length axis.
    EmptyGrid,
    /// A spacing entry is zero, negative, or not finite.
    InvalidSpacing {
        /// Axis of the offending entry.
        axis: usize,
        /// The offending value.
        value: f64,
    },
    /// An origin entry is not finite.
    InvalidOrigin {
        /// Axis of the offending entry.
        axis: usize,
        /// The offending value.
        value: f64,
    },
    /// The product of the shape exceeds `usize::MAX`.
    CellCountOverflow,
    /// A buffer does not match the grid's cell count.
    LengthMismatch {
        /// Cells the grid expects.
        expected: usize,
        /// Length of the supplied buffer.
        actual: usize,
    },
    /// A coordinate lies outside the grid.
    CoordOutOfBounds {
        /// The offending coordinate.
        coords: Vec<usize>,
        /// The grid shape.
        shape: Vec<usize>,
    },
    /// The boundary description names a different number of axes than the grid.
    BoundaryAxisMismatch {
        /// Axes in the grid.
        grid: usize,
        /// Axes in the boundary.
        boundary: usize,
    },
}

impl fmt::Display for GridError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DimensionMismatch {
                shape,
                spacing,
                origin,
            } => write!(
                f,
                "grid dimension mismatch: {shape} shape axes, {spacing} spacings, {origin} origins"
            ),
            Self::EmptyGrid => write!(f, "grid must have at least one axis and one cell per axis"),
            Self::InvalidSpacing { axis, value } => {
                write!(f, "spacing on axis {axis} must be finite and positive, got {value}")
            }
            Self::InvalidOrigin { axis, value } => {
                write!(f, "origin on axis {axis} must be finite, got {value}")
            }
            Self::CellCountOverflow => write!(f, "grid cell count overflows usize"),
            Self::LengthMismatch { expected, actual } => {
                write!(f, "buffer has {actual} values, grid has {expected} cells")
            }
            Self::CoordOutOfBounds { coords, shape } => {
                write!(f, "coordinate {coords:?} out of bounds for shape {shape:?}")
            }
            Self::BoundaryAxisMismatch { grid, boundary } => write!(
                f,
                "boundary describes {boundary} axes but the grid has {grid}"
            ),
        }
    }
}

impl Error for GridError {}
