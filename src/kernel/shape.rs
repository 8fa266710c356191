//! Minimal boundary representation exchanged with a [`GeometricKernel`].
//!
//! Only the pieces the extraction pipeline consumes are modelled: faces as
//! bounded parameter patches of a surface, edges as curves, wires as ordered
//! edge chains, and a [`Shape`] enum to pass any of them around.
//!
//! [`GeometricKernel`]: super::GeometricKernel

use crate::geom::{AnyCurve, AnySurface, Curve3, NurbsCurve, PlaneSurface, Point3, Surface};

/// Parameter bounds of a face. `None` leaves that direction unbounded.
pub type FaceRange = Option<(f64, f64)>;

/// A surface restricted to a rectangle of its parameter space.
#[derive(Debug, Clone, PartialEq)]
pub struct Face {
    surface: AnySurface,
    u_range: FaceRange,
    v_range: FaceRange,
}

impl Face {
    /// Face over the full domain of a NURBS surface, or an unbounded plane.
    #[must_use]
    pub fn new(surface: AnySurface) -> Self {
        let (u_range, v_range) = match &surface {
            AnySurface::Plane(_) => (None, None),
            AnySurface::Nurbs(s) => (Some(s.domain_u()), Some(s.domain_v())),
        };
        Self {
            surface,
            u_range,
            v_range,
        }
    }

    #[must_use]
    pub fn from_plane(plane: PlaneSurface) -> Self {
        Self::new(AnySurface::Plane(plane))
    }

    /// Same surface, restricted to `[u0, u1] × [v0, v1]`.
    #[must_use]
    pub fn with_bounds(&self, u: (f64, f64), v: (f64, f64)) -> Self {
        Self {
            surface: self.surface.clone(),
            u_range: Some(u),
            v_range: Some(v),
        }
    }

    #[must_use]
    pub fn surface(&self) -> &AnySurface {
        &self.surface
    }

    #[must_use]
    pub const fn u_range(&self) -> FaceRange {
        self.u_range
    }

    #[must_use]
    pub const fn v_range(&self) -> FaceRange {
        self.v_range
    }

    #[must_use]
    pub fn is_bounded(&self) -> bool {
        self.u_range.is_some() && self.v_range.is_some()
    }
}

/// A curve used as a topological edge, over the curve's whole domain.
#[derive(Debug, Clone)]
pub struct Edge {
    curve: AnyCurve,
}

impl Edge {
    #[must_use]
    pub fn new(curve: impl Into<AnyCurve>) -> Self {
        Self {
            curve: curve.into(),
        }
    }

    #[must_use]
    pub fn curve(&self) -> &AnyCurve {
        &self.curve
    }

    #[must_use]
    pub fn start_point(&self) -> Point3 {
        let (a, _) = self.curve.domain();
        self.curve.point_at(a)
    }

    #[must_use]
    pub fn end_point(&self) -> Point3 {
        let (_, b) = self.curve.domain();
        self.curve.point_at(b)
    }

    #[must_use]
    pub fn mid_point(&self) -> Point3 {
        let (a, b) = self.curve.domain();
        self.curve.point_at(0.5 * (a + b))
    }

    /// NURBS geometry of the edge, if it has one.
    #[must_use]
    pub fn to_nurbs(&self) -> Option<NurbsCurve> {
        self.curve.to_nurbs()
    }

    /// Same geometry within `tol`, in either direction, judged on the end
    /// and middle points.
    #[must_use]
    pub fn same_as(&self, other: &Self, tol: f64) -> bool {
        let close = |a: Point3, b: Point3| a.distance_to(b) <= tol;
        let ends = (close(self.start_point(), other.start_point())
            && close(self.end_point(), other.end_point()))
            || (close(self.start_point(), other.end_point())
                && close(self.end_point(), other.start_point()));
        ends && close(self.mid_point(), other.mid_point())
    }
}

/// Edges connected end to end, in chain order.
#[derive(Debug, Clone, Default)]
pub struct Wire {
    edges: Vec<Edge>,
}

impl Wire {
    #[must_use]
    pub fn new(edges: Vec<Edge>) -> Self {
        Self { edges }
    }

    #[must_use]
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    #[must_use]
    pub fn into_edges(self) -> Vec<Edge> {
        self.edges
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

/// Anything a kernel takes or returns.
#[derive(Debug, Clone, Default)]
pub enum Shape {
    #[default]
    Empty,
    Face(Face),
    /// Faces sharing boundaries, such as a face after division.
    Shell(Vec<Face>),
    Wire(Wire),
    /// Loose edges, such as a section result.
    Edges(Vec<Edge>),
}

impl Shape {
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Face(_) => "face",
            Self::Shell(_) => "shell",
            Self::Wire(_) => "wire",
            Self::Edges(_) => "edges",
        }
    }

    /// Every face of the shape.
    #[must_use]
    pub fn faces(&self) -> Vec<&Face> {
        match self {
            Self::Face(face) => vec![face],
            Self::Shell(faces) => faces.iter().collect(),
            Self::Empty | Self::Wire(_) | Self::Edges(_) => Vec::new(),
        }
    }

    /// Every edge of the shape, in storage order.
    #[must_use]
    pub fn edges(&self) -> Vec<&Edge> {
        match self {
            Self::Wire(wire) => wire.edges().iter().collect(),
            Self::Edges(edges) => edges.iter().collect(),
            Self::Empty | Self::Face(_) | Self::Shell(_) => Vec::new(),
        }
    }

    /// Edges with geometric duplicates removed, first occurrence kept.
    #[must_use]
    pub fn unique_edges(&self, tol: f64) -> Vec<Edge> {
        let mut unique: Vec<Edge> = Vec::new();
        for edge in self.edges() {
            if unique.iter().any(|kept| kept.same_as(edge, tol)) {
                log::debug!("dropping duplicate section edge");
                continue;
            }
            unique.push(edge.clone());
        }
        unique
    }
}

impl From<Face> for Shape {
    fn from(value: Face) -> Self {
        Self::Face(value)
    }
}

impl From<Wire> for Shape {
    fn from(value: Wire) -> Self {
        Self::Wire(value)
    }
}

impl From<PlaneSurface> for Shape {
    fn from(value: PlaneSurface) -> Self {
        Self::Face(Face::from_plane(value))
    }
}
