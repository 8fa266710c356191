//! Typed errors shared by the NURBS curve and surface types.

/// Invariant violations detected while building a curve or surface from raw
/// control data.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConstructionError {
    #[error("degree must be >= 1, got {degree}")]
    InvalidDegree { degree: usize },
    #[error("at least {min} control points required, got {count}")]
    TooFewControlPoints { count: usize, min: usize },
    #[error("{what} length must be {expected}, got {actual}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("knots must be non-decreasing")]
    KnotsNotMonotone,
    #[error("distinct knots must be strictly increasing")]
    KnotsNotDistinct,
    #[error("knot multiplicity {multiplicity} at index {index} is outside 1..={max}")]
    InvalidMultiplicity {
        index: usize,
        multiplicity: usize,
        max: usize,
    },
    #[error("periodic knot vector requires equal end multiplicities ({first} != {last})")]
    PeriodicEndMultiplicity { first: usize, last: usize },
    #[error("weights must be finite and > 0 (index {index} is {value})")]
    InvalidWeight { index: usize, value: f64 },
    #[error("control point {index} is not finite")]
    NonFiniteControlPoint { index: usize },
    #[error("control net rows must all have {expected} points (row {row} has {actual})")]
    RaggedControlNet {
        row: usize,
        expected: usize,
        actual: usize,
    },
    #[error("interpolation failed: {0}")]
    Interpolation(String),
    #[error("knot normalization failed: {0}")]
    Normalization(#[from] DomainError),
}

/// Parameter-range and index errors raised by evaluation and editing.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DomainError {
    #[error("parameter range [{u1}, {u2}] is degenerate")]
    DegenerateRange { u1: f64, u2: f64 },
    #[error("parameter range [{u1}, {u2}] is inverted")]
    InvertedRange { u1: f64, u2: f64 },
    #[error("parameter {param} outside domain [{lo}, {hi}]")]
    OutOfDomain { param: f64, lo: f64, hi: f64 },
    #[error("derivative order must be >= 1, got {order}")]
    InvalidDerivativeOrder { order: usize },
    #[error("index {index} out of bounds (valid 0..{len})")]
    IndexOutOfBounds { index: usize, len: usize },
    #[error("expected {expected} knot values, got {actual}")]
    KnotCountMismatch { expected: usize, actual: usize },
    #[error("knot multiplicity {multiplicity} exceeds degree {degree}")]
    MultiplicityTooHigh { multiplicity: usize, degree: usize },
    #[error("knot values must be strictly increasing")]
    KnotsNotIncreasing,
    #[error("weight must be finite and > 0, got {value}")]
    InvalidWeight { value: f64 },
}

/// Failures while merging curves into one.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConcatError {
    #[error("no curves to concatenate")]
    Empty,
    #[error("curve {index} starts {distance} away from the previous end (tolerance {tolerance})")]
    Gap {
        index: usize,
        distance: f64,
        tolerance: f64,
    },
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Construction(#[from] ConstructionError),
}
