//! Outer-mold-line reference surfaces.
//!
//! A [`Wing`] owns the reference surface of a lifting body together with
//! the boundary shape the kernel cuts against, and derives structural
//! reference curves from it.

mod extract;

pub use extract::{ExtractCurveOptions, ExtractDiagnostics, ExtractError};

use std::fmt;

use crate::geom::{NurbsCurve, NurbsSurface, PlaneSurface, Point3, Vec3};
use crate::kernel::{GeometricKernel, NativeKernel, Shape};

/// Reference surface of a wing and the face shape derived from it.
///
/// The shape is a cache of the surface and is rebuilt in [`Wing::set_sref`]
/// before that call returns. `Wing` is not internally synchronized; share it
/// across threads behind a lock so that surface replacement is serialized
/// against extraction.
pub struct Wing {
    name: String,
    kernel: Box<dyn GeometricKernel + Send + Sync>,
    sref: NurbsSurface,
    sref_shape: Shape,
}

impl Wing {
    /// Wing using the built-in kernel, with closed and C0 division enabled.
    #[must_use]
    pub fn new(name: impl Into<String>, sref: NurbsSurface) -> Self {
        Self::with_kernel(name, sref, Box::new(NativeKernel::default()))
    }

    /// Wing backed by a caller-supplied kernel.
    #[must_use]
    pub fn with_kernel(
        name: impl Into<String>,
        sref: NurbsSurface,
        kernel: Box<dyn GeometricKernel + Send + Sync>,
    ) -> Self {
        let sref_shape = build_shape(kernel.as_ref(), &sref, true, true);
        Self {
            name: name.into(),
            kernel,
            sref,
            sref_shape,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    #[must_use]
    pub fn kernel(&self) -> &dyn GeometricKernel {
        self.kernel.as_ref()
    }

    #[must_use]
    pub fn sref(&self) -> &NurbsSurface {
        &self.sref
    }

    /// Face shape of the reference surface, possibly divided.
    #[must_use]
    pub fn sref_shape(&self) -> &Shape {
        &self.sref_shape
    }

    /// Replace the reference surface and rebuild its shape.
    ///
    /// The shape starts as a single face; `divide_closed` splits it where
    /// the surface closes on itself and `divide_c0` along C0 knot lines.
    pub fn set_sref(&mut self, srf: NurbsSurface, divide_closed: bool, divide_c0: bool) {
        let shape = build_shape(self.kernel.as_ref(), &srf, divide_closed, divide_c0);
        self.sref = srf;
        self.sref_shape = shape;
    }

    #[must_use]
    pub fn u1(&self) -> f64 {
        self.sref.u1()
    }

    #[must_use]
    pub fn u2(&self) -> f64 {
        self.sref.u2()
    }

    #[must_use]
    pub fn v1(&self) -> f64 {
        self.sref.v1()
    }

    #[must_use]
    pub fn v2(&self) -> f64 {
        self.sref.v2()
    }

    #[must_use]
    pub fn uknots(&self) -> &[f64] {
        self.sref.uknots()
    }

    #[must_use]
    pub fn vknots(&self) -> &[f64] {
        self.sref.vknots()
    }

    pub fn eval(&self, u: f64, v: f64) -> Result<Point3, ExtractError> {
        Ok(self.sref.eval(u, v)?)
    }

    /// Unnormalized surface normal `Su × Sv`.
    pub fn norm(&self, u: f64, v: f64) -> Result<Vec3, ExtractError> {
        Ok(self.sref.norm(u, v)?)
    }

    /// Surface parameters of the point on the reference surface nearest to
    /// `point`.
    pub fn invert(&self, point: Point3) -> Result<(f64, f64), ExtractError> {
        self.kernel
            .project_point_to_surface(point, &self.sref)
            .map(|proj| (proj.u, proj.v))
            .ok_or(ExtractError::FailedToInvertPoint { point: point.to_array() })
    }

    /// Plane through `S(u1, v1)`, `S(u2, v2)` and the first point offset
    /// along the surface normal there.
    pub fn extract_plane(&self, u1: f64, v1: f64, u2: f64, v2: f64) -> Result<PlaneSurface, ExtractError> {
        let p1 = self.eval(u1, v1)?;
        let p2 = self.eval(u2, v2)?;
        let p3 = p1.add_vec(self.norm(u1, v1)?);
        PlaneSurface::by_points(p1, p2, p3).ok_or(ExtractError::DegeneratePlane { u1, v1, u2, v2 })
    }

    /// Iso-curve at constant `u` or, when `u` is `None`, constant `v`.
    pub fn isocurve(&self, u: Option<f64>, v: Option<f64>) -> Result<NurbsCurve, ExtractError> {
        match (u, v) {
            (Some(u), _) => Ok(self.sref.u_iso(u)?),
            (None, Some(v)) => Ok(self.sref.v_iso(v)?),
            (None, None) => Err(ExtractError::InvalidIsoInput),
        }
    }
}

impl fmt::Debug for Wing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wing")
            .field("name", &self.name)
            .field("sref", &self.sref)
            .field("sref_shape", &self.sref_shape.kind())
            .finish_non_exhaustive()
    }
}

fn build_shape(kernel: &dyn GeometricKernel, srf: &NurbsSurface, divide_closed: bool, divide_c0: bool) -> Shape {
    let mut shape = kernel.face_from_surface(srf);
    if divide_closed {
        shape = kernel.divide_closed(shape);
    }
    if divide_c0 {
        shape = kernel.divide_c0(shape);
    }
    log::debug!(
        "built reference shape: {} with {} faces",
        shape.kind(),
        shape.faces().len()
    );
    shape
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::Tolerance;

    fn flat() -> NurbsSurface {
        NurbsSurface::by_data(
            vec![
                vec![Point3::new(0.0, 0.0, 0.0), Point3::new(0.0, 10.0, 0.0)],
                vec![Point3::new(10.0, 0.0, 0.0), Point3::new(10.0, 10.0, 0.0)],
            ],
            vec![0.0, 1.0],
            vec![0.0, 1.0],
            vec![2, 2],
            vec![2, 2],
            1,
            1,
            None,
            false,
            false,
        )
        .unwrap()
    }

    fn tube() -> NurbsSurface {
        let ring = |z: f64| {
            vec![
                Point3::new(1.0, 0.0, z),
                Point3::new(0.0, 1.0, z),
                Point3::new(-1.0, 0.0, z),
                Point3::new(0.0, -1.0, z),
            ]
        };
        NurbsSurface::by_data(
            vec![ring(0.0), ring(1.0)],
            vec![0.0, 1.0],
            vec![0.0, 1.0, 2.0, 3.0, 4.0],
            vec![2, 2],
            vec![1, 1, 1, 1, 1],
            1,
            1,
            None,
            false,
            true,
        )
        .unwrap()
    }

    #[test]
    fn accessors_follow_the_reference_surface() {
        let wing = Wing::new("wing", flat());
        assert_eq!(wing.name(), "wing");
        assert_eq!((wing.u1(), wing.u2(), wing.v1(), wing.v2()), (0.0, 1.0, 0.0, 1.0));
        assert_eq!(wing.uknots(), &[0.0, 1.0]);
        assert_eq!(wing.sref_shape().kind(), "face");
        let tol = Tolerance::new(1e-9);
        assert!(tol.approx_eq_point3(wing.eval(0.5, 0.5).unwrap(), Point3::new(5.0, 5.0, 0.0)));
        assert!(tol.approx_eq_vec3(wing.norm(0.5, 0.5).unwrap(), Vec3::new(0.0, 0.0, 100.0)));
        assert!(matches!(wing.eval(2.0, 0.5), Err(ExtractError::Domain(_))));
    }

    #[test]
    fn set_sref_rebuilds_the_shape() {
        let mut wing = Wing::new("wing", flat());
        wing.set_sref(tube(), true, true);
        assert_eq!(wing.sref_shape().faces().len(), 4);
        wing.set_sref(tube(), true, false);
        assert_eq!(wing.sref_shape().faces().len(), 2);
        wing.set_sref(tube(), false, false);
        assert_eq!(wing.sref_shape().kind(), "face");
        assert!((wing.v2() - 4.0).abs() < 1e-12);
    }

    #[test]
    fn invert_recovers_parameters() {
        let wing = Wing::new("wing", flat());
        let (u, v) = wing.invert(Point3::new(2.5, 7.5, 3.0)).unwrap();
        assert!((u - 0.25).abs() < 1e-9);
        assert!((v - 0.75).abs() < 1e-9);
    }

    #[test]
    fn plane_uses_the_unnormalized_normal() {
        let wing = Wing::new("wing", flat());
        let plane = wing.extract_plane(0.0, 0.0, 1.0, 0.0).unwrap();
        let tol = Tolerance::new(1e-9);
        assert!(tol.approx_eq_point3(plane.origin, Point3::ORIGIN));
        assert!(tol.approx_eq_vec3(plane.normal(), Vec3::new(0.0, -1.0, 0.0)));
        assert!(matches!(
            wing.extract_plane(0.5, 0.5, 0.5, 0.5),
            Err(ExtractError::DegeneratePlane { .. })
        ));
    }

    #[test]
    fn isocurve_prefers_u() {
        let wing = Wing::new("wing", flat());
        let tol = Tolerance::new(1e-9);
        let iso = wing.isocurve(Some(0.3), Some(0.9)).unwrap();
        assert!(tol.approx_eq_point3(iso.eval(0.5).unwrap(), Point3::new(3.0, 5.0, 0.0)));
        let iso = wing.isocurve(None, Some(0.9)).unwrap();
        assert!(tol.approx_eq_point3(iso.eval(0.5).unwrap(), Point3::new(5.0, 9.0, 0.0)));
        assert_eq!(wing.isocurve(None, None), Err(ExtractError::InvalidIsoInput));
    }
}
