//! The geometric kernel seam.
//!
//! Boolean sectioning, edge joining, distance queries and projections are
//! reached through [`GeometricKernel`] so that the extraction pipeline does
//! not depend on one implementation. [`NativeKernel`] is the built-in one.

mod native;
mod project;
mod section;
mod shape;
mod wires;

pub use native::{NativeKernel, NativeKernelOptions};
pub use project::{project_point_to_curve, project_point_to_surface};
pub use shape::{Edge, Face, FaceRange, Shape, Wire};
pub use wires::{distance_to_wire, join_edges_to_wires};

use crate::geom::{NurbsCurve, NurbsSurface, Point3};

/// Failures reported by a kernel operation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum KernelError {
    #[error("unsupported shapes for {operation}: {first} and {second}")]
    UnsupportedShapes {
        operation: &'static str,
        first: &'static str,
        second: &'static str,
    },
    #[error("degenerate geometry: {0}")]
    Degenerate(String),
}

/// Closest point on a curve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurveProjection {
    pub parameter: f64,
    pub point: Point3,
    pub distance: f64,
}

/// Closest point on a surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceProjection {
    pub u: f64,
    pub v: f64,
    pub point: Point3,
    pub distance: f64,
}

/// Operations the extraction pipeline needs from a geometric kernel.
pub trait GeometricKernel {
    /// Section of two shapes, returned as loose edges.
    ///
    /// `refine_edges` asks the kernel to merge edges that continue each
    /// other across face boundaries.
    fn intersect(&self, first: &Shape, second: &Shape, refine_edges: bool) -> Result<Shape, KernelError>;

    /// Group edges into connected wires.
    fn join_edges_to_wires(&self, edges: &[Edge]) -> Vec<Wire>;

    /// Index of the candidate closest to `point`. `None` when empty.
    fn nearest_shape(&self, point: Point3, candidates: &[Wire]) -> Option<usize>;

    fn project_point_to_curve(&self, point: Point3, curve: &NurbsCurve) -> Option<CurveProjection>;

    fn project_point_to_surface(&self, point: Point3, surface: &NurbsSurface) -> Option<SurfaceProjection>;

    /// Face spanning the whole surface.
    fn face_from_surface(&self, surface: &NurbsSurface) -> Shape;

    /// Split faces that are closed in a direction so none wraps onto itself.
    fn divide_closed(&self, shape: Shape) -> Shape;

    /// Split faces along internal C0 knot lines.
    fn divide_c0(&self, shape: Shape) -> Shape;
}
