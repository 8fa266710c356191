//! Built-in [`GeometricKernel`] for plane sections of NURBS faces.

use crate::geom::{AnySurface, NurbsCurve, NurbsSurface, PlaneSurface, Point3, Surface, Tolerance};

use super::section::{fit_polyline, merge_polylines, section_face};
use super::shape::{Edge, Face, Shape, Wire};
use super::{CurveProjection, GeometricKernel, KernelError, SurfaceProjection};

/// Tunables of the native kernel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NativeKernelOptions {
    /// Approximate number of grid intervals per face direction when sampling
    /// a section.
    pub grid_density: usize,
    /// Distance below which edge ends are considered connected.
    pub join_tolerance: f64,
    /// Iteration cap for the Newton and root-refinement loops.
    pub newton_iterations: usize,
    /// Seed samples per knot span for projections.
    pub samples_per_span: usize,
    /// Degree of the curves fitted through section points.
    pub fit_degree: usize,
}

impl NativeKernelOptions {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            grid_density: 48,
            join_tolerance: 1e-6,
            newton_iterations: 32,
            samples_per_span: 16,
            fit_degree: 3,
        }
    }

    #[must_use]
    pub const fn with_grid_density(mut self, density: usize) -> Self {
        self.grid_density = density;
        self
    }

    #[must_use]
    pub const fn with_join_tolerance(mut self, tolerance: f64) -> Self {
        self.join_tolerance = tolerance;
        self
    }

    #[must_use]
    pub const fn with_newton_iterations(mut self, iterations: usize) -> Self {
        self.newton_iterations = iterations;
        self
    }

    #[must_use]
    pub const fn with_samples_per_span(mut self, samples: usize) -> Self {
        self.samples_per_span = samples;
        self
    }

    #[must_use]
    pub const fn with_fit_degree(mut self, degree: usize) -> Self {
        self.fit_degree = degree;
        self
    }
}

impl Default for NativeKernelOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// Pure-Rust kernel covering planes cut against NURBS faces.
///
/// Sections are traced by marching squares on the face parameter grid and
/// fitted with interpolating B-splines; they are approximations whose
/// points lie on both surfaces to within the refinement tolerance.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeKernel {
    options: NativeKernelOptions,
}

impl NativeKernel {
    #[must_use]
    pub const fn new(options: NativeKernelOptions) -> Self {
        Self { options }
    }

    #[must_use]
    pub const fn options(&self) -> &NativeKernelOptions {
        &self.options
    }
}

/// The cutting plane and the NURBS faces of a plane/face pair, in either
/// order.
fn plane_and_faces<'a>(first: &'a Shape, second: &'a Shape) -> Option<(&'a PlaneSurface, Vec<&'a Face>)> {
    let as_plane = |shape: &'a Shape| match shape {
        Shape::Face(face) => match face.surface() {
            AnySurface::Plane(plane) => Some(plane),
            AnySurface::Nurbs(_) => None,
        },
        _ => None,
    };
    let nurbs_faces = |shape: &'a Shape| {
        let faces = shape.faces();
        let all_nurbs = !faces.is_empty() && faces.iter().all(|face| face.surface().as_nurbs().is_some());
        all_nurbs.then_some(faces)
    };

    if let (Some(plane), Some(faces)) = (as_plane(first), nurbs_faces(second)) {
        return Some((plane, faces));
    }
    if let (Some(plane), Some(faces)) = (as_plane(second), nurbs_faces(first)) {
        return Some((plane, faces));
    }
    None
}

/// Collapse a face list back into a shape.
fn faces_to_shape(mut faces: Vec<Face>) -> Shape {
    match faces.len() {
        0 => Shape::Empty,
        1 => faces.pop().map_or(Shape::Empty, Shape::Face),
        _ => Shape::Shell(faces),
    }
}

fn shape_faces(shape: Shape) -> Result<Vec<Face>, Shape> {
    match shape {
        Shape::Face(face) => Ok(vec![face]),
        Shape::Shell(faces) => Ok(faces),
        other => Err(other),
    }
}

/// Split `range` at each of `cuts` lying strictly inside it.
fn split_range(range: (f64, f64), cuts: &[f64]) -> Vec<(f64, f64)> {
    let (a, b) = range;
    let eps = Tolerance::PARAMETER.relative_to(b - a);
    let mut stops = vec![a];
    stops.extend(cuts.iter().copied().filter(|&c| c > a + eps && c < b - eps));
    stops.push(b);
    stops.windows(2).map(|w| (w[0], w[1])).collect()
}

/// Every sub-face of `face` over the product of the given ranges.
fn subdivide(face: &Face, u_ranges: &[(f64, f64)], v_ranges: &[(f64, f64)]) -> Vec<Face> {
    v_ranges
        .iter()
        .flat_map(|&v| u_ranges.iter().map(move |&u| face.with_bounds(u, v)))
        .collect()
}

fn face_ranges(face: &Face, surface: &NurbsSurface) -> ((f64, f64), (f64, f64)) {
    (
        face.u_range().unwrap_or_else(|| surface.domain_u()),
        face.v_range().unwrap_or_else(|| surface.domain_v()),
    )
}

/// Distinct knots whose multiplicity reaches the degree.
fn c0_knots(knots: &[f64], mults: &[usize], degree: usize) -> Vec<f64> {
    knots
        .iter()
        .zip(mults)
        .filter(|&(_, &m)| m >= degree)
        .map(|(&k, _)| k)
        .collect()
}

impl GeometricKernel for NativeKernel {
    fn intersect(&self, first: &Shape, second: &Shape, refine_edges: bool) -> Result<Shape, KernelError> {
        let (plane, faces) = plane_and_faces(first, second).ok_or_else(|| KernelError::UnsupportedShapes {
            operation: "intersect",
            first: first.kind(),
            second: second.kind(),
        })?;
        if plane.u_axis.cross(plane.v_axis).normalized().is_none() {
            return Err(KernelError::Degenerate("cutting plane has no normal".to_owned()));
        }

        let mut polylines: Vec<Vec<Point3>> = faces
            .iter()
            .flat_map(|face| section_face(face, plane, &self.options))
            .collect();
        if refine_edges {
            let before = polylines.len();
            polylines = merge_polylines(polylines, self.options.join_tolerance);
            log::debug!("refined {} section pieces into {}", before, polylines.len());
        }

        let edges: Vec<Edge> = polylines
            .iter()
            .filter_map(|points| fit_polyline(points, self.options.fit_degree))
            .map(Edge::new)
            .collect();
        log::debug!("section of {} faces produced {} edges", faces.len(), edges.len());
        Ok(Shape::Edges(edges))
    }

    fn join_edges_to_wires(&self, edges: &[Edge]) -> Vec<Wire> {
        super::wires::join_edges_to_wires(edges, self.options.join_tolerance)
    }

    fn nearest_shape(&self, point: Point3, candidates: &[Wire]) -> Option<usize> {
        let distances: Vec<f64> = candidates
            .iter()
            .map(|wire| super::wires::distance_to_wire(point, wire, &self.options))
            .collect();
        let (best, best_distance) = distances
            .iter()
            .copied()
            .enumerate()
            .min_by(|a, b| a.1.total_cmp(&b.1))?;
        let ties = distances
            .iter()
            .filter(|&&d| (d - best_distance).abs() <= self.options.join_tolerance)
            .count();
        if ties > 1 {
            log::debug!("{ties} wires tie at distance {best_distance}; keeping index {best}");
        }
        Some(best)
    }

    fn project_point_to_curve(&self, point: Point3, curve: &NurbsCurve) -> Option<CurveProjection> {
        super::project::project_point_to_curve(point, curve, &self.options)
    }

    fn project_point_to_surface(&self, point: Point3, surface: &NurbsSurface) -> Option<SurfaceProjection> {
        super::project::project_point_to_surface(point, surface, &self.options)
    }

    fn face_from_surface(&self, surface: &NurbsSurface) -> Shape {
        Shape::Face(Face::new(AnySurface::Nurbs(surface.clone())))
    }

    fn divide_closed(&self, shape: Shape) -> Shape {
        let faces = match shape_faces(shape) {
            Ok(faces) => faces,
            Err(other) => return other,
        };
        let mut out = Vec::with_capacity(faces.len());
        for face in faces {
            let Some(surface) = face.surface().as_nurbs() else {
                out.push(face);
                continue;
            };
            let (u, v) = face_ranges(&face, surface);
            let whole_u = u == surface.domain_u();
            let whole_v = v == surface.domain_v();
            let u_cuts: Vec<f64> = (whole_u && surface.is_u_closed())
                .then(|| 0.5 * (u.0 + u.1))
                .into_iter()
                .collect();
            let v_cuts: Vec<f64> = (whole_v && surface.is_v_closed())
                .then(|| 0.5 * (v.0 + v.1))
                .into_iter()
                .collect();
            if u_cuts.is_empty() && v_cuts.is_empty() {
                out.push(face);
                continue;
            }
            log::debug!("dividing closed face (u cuts {u_cuts:?}, v cuts {v_cuts:?})");
            out.extend(subdivide(&face, &split_range(u, &u_cuts), &split_range(v, &v_cuts)));
        }
        faces_to_shape(out)
    }

    fn divide_c0(&self, shape: Shape) -> Shape {
        let faces = match shape_faces(shape) {
            Ok(faces) => faces,
            Err(other) => return other,
        };
        let mut out = Vec::with_capacity(faces.len());
        for face in faces {
            let Some(surface) = face.surface().as_nurbs() else {
                out.push(face);
                continue;
            };
            let (u, v) = face_ranges(&face, surface);
            let u_ranges = split_range(u, &c0_knots(surface.uknots(), surface.umult(), surface.p()));
            let v_ranges = split_range(v, &c0_knots(surface.vknots(), surface.vmult(), surface.q()));
            if u_ranges.len() == 1 && v_ranges.len() == 1 {
                out.push(face);
                continue;
            }
            log::debug!(
                "dividing face at C0 knots into {}x{} pieces",
                u_ranges.len(),
                v_ranges.len()
            );
            out.extend(subdivide(&face, &u_ranges, &v_ranges));
        }
        faces_to_shape(out)
    }
}
