use super::core::{Point3, Tolerance, Vec3};
use super::curve::{AnyCurve, Line3};
use super::error::DomainError;
use super::nurbs_surface::NurbsSurface;

/// Relative step for the finite-difference derivative fallback.
const DERIVATIVE_STEP: f64 = 1e-6;

pub trait Surface {
    fn point_at(&self, u: f64, v: f64) -> Point3;

    #[must_use]
    fn domain_u(&self) -> (f64, f64) {
        (0.0, 1.0)
    }

    #[must_use]
    fn domain_v(&self) -> (f64, f64) {
        (0.0, 1.0)
    }

    #[must_use]
    fn is_u_closed(&self) -> bool {
        false
    }

    #[must_use]
    fn is_v_closed(&self) -> bool {
        false
    }

    #[must_use]
    fn partial_derivatives_at(&self, u: f64, v: f64) -> (Vec3, Vec3) {
        let (u0, u1) = self.domain_u();
        let (v0, v1) = self.domain_v();
        let hu = DERIVATIVE_STEP * (u1 - u0).abs();
        let hv = DERIVATIVE_STEP * (v1 - v0).abs();

        let difference = |a: (f64, f64), b: (f64, f64), h: f64| {
            if !h.is_finite() || h == 0.0 {
                return Vec3::ZERO;
            }
            self.point_at(b.0, b.1)
                .sub_point(self.point_at(a.0, a.1))
                .mul_scalar(1.0 / h)
        };

        let (ua, ub) = ((u - hu).max(u0), (u + hu).min(u1));
        let (va, vb) = ((v - hv).max(v0), (v + hv).min(v1));
        (
            difference((ua, v), (ub, v), ub - ua),
            difference((u, va), (u, vb), vb - va),
        )
    }

    #[must_use]
    fn normal_at(&self, u: f64, v: f64) -> Option<Vec3> {
        let (du, dv) = self.partial_derivatives_at(u, v);
        du.cross(dv).normalized()
    }
}

/// Unbounded plane `origin + u·u_axis + v·v_axis`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaneSurface {
    pub origin: Point3,
    pub u_axis: Vec3,
    pub v_axis: Vec3,
}

impl PlaneSurface {
    #[must_use]
    pub const fn new(origin: Point3, u_axis: Vec3, v_axis: Vec3) -> Self {
        Self {
            origin,
            u_axis,
            v_axis,
        }
    }

    /// Plane through three points with `u_axis` along `p2 - p1`.
    ///
    /// `None` when the points are collinear or coincident.
    #[must_use]
    pub fn by_points(p1: Point3, p2: Point3, p3: Point3) -> Option<Self> {
        let a = p2.sub_point(p1);
        let b = p3.sub_point(p1);
        let scale = a.length() * b.length();
        let normal = a.cross(b);
        if !(scale > 0.0) || normal.length() <= Tolerance::ZERO_LENGTH.relative_to(scale) {
            return None;
        }
        let normal = normal.normalized()?;
        let u_axis = a.normalized()?;
        Some(Self::new(p1, u_axis, normal.cross(u_axis)))
    }

    /// Plane through `origin` perpendicular to `normal`.
    #[must_use]
    pub fn by_normal(origin: Point3, normal: Vec3) -> Option<Self> {
        let normal = normal.normalized()?;
        let u_axis = normal.any_orthogonal();
        Some(Self::new(origin, u_axis, normal.cross(u_axis)))
    }

    /// Unit normal, `u_axis × v_axis`.
    #[must_use]
    pub fn normal(&self) -> Vec3 {
        self.u_axis.cross(self.v_axis).normalized().unwrap_or(Vec3::Z)
    }

    /// Signed distance of `point` along the normal.
    #[must_use]
    pub fn distance(&self, point: Point3) -> f64 {
        point.sub_point(self.origin).dot(self.normal())
    }

    /// Plane parameters of the orthogonal projection of `point`.
    #[must_use]
    pub fn invert(&self, point: Point3) -> (f64, f64) {
        let d = point.sub_point(self.origin);
        let (uu, uv, vv) = (
            self.u_axis.dot(self.u_axis),
            self.u_axis.dot(self.v_axis),
            self.v_axis.dot(self.v_axis),
        );
        let (du, dv) = (d.dot(self.u_axis), d.dot(self.v_axis));
        let det = uu * vv - uv * uv;
        if det == 0.0 {
            return (0.0, 0.0);
        }
        ((du * vv - dv * uv) / det, (dv * uu - du * uv) / det)
    }
}

impl Surface for PlaneSurface {
    fn point_at(&self, u: f64, v: f64) -> Point3 {
        self.origin
            .add_vec(self.u_axis.mul_scalar(u))
            .add_vec(self.v_axis.mul_scalar(v))
    }

    fn partial_derivatives_at(&self, _u: f64, _v: f64) -> (Vec3, Vec3) {
        (self.u_axis, self.v_axis)
    }

    fn normal_at(&self, _u: f64, _v: f64) -> Option<Vec3> {
        self.u_axis.cross(self.v_axis).normalized()
    }
}

/// Classifier over the surface kinds this crate understands.
#[derive(Debug, Clone, PartialEq)]
pub enum AnySurface {
    Plane(PlaneSurface),
    Nurbs(NurbsSurface),
}

impl AnySurface {
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Plane(_) => "plane",
            Self::Nurbs(_) => "nurbs",
        }
    }

    #[must_use]
    pub fn as_nurbs(&self) -> Option<&NurbsSurface> {
        match self {
            Self::Nurbs(surface) => Some(surface),
            Self::Plane(_) => None,
        }
    }

    /// Iso-curve at constant `u`, classified.
    ///
    /// For a plane this is the unit segment along `v_axis` starting at
    /// `(u, 0)`.
    pub fn u_iso(&self, u: f64) -> Result<AnyCurve, DomainError> {
        match self {
            Self::Plane(plane) => Ok(AnyCurve::Line(Line3::new(
                plane.point_at(u, 0.0),
                plane.point_at(u, 1.0),
            ))),
            Self::Nurbs(surface) => surface.u_iso(u).map(AnyCurve::Nurbs),
        }
    }

    /// Iso-curve at constant `v`, classified.
    pub fn v_iso(&self, v: f64) -> Result<AnyCurve, DomainError> {
        match self {
            Self::Plane(plane) => Ok(AnyCurve::Line(Line3::new(
                plane.point_at(0.0, v),
                plane.point_at(1.0, v),
            ))),
            Self::Nurbs(surface) => surface.v_iso(v).map(AnyCurve::Nurbs),
        }
    }

    fn inner(&self) -> &dyn Surface {
        match self {
            Self::Plane(s) => s,
            Self::Nurbs(s) => s,
        }
    }
}

impl Surface for AnySurface {
    fn point_at(&self, u: f64, v: f64) -> Point3 {
        self.inner().point_at(u, v)
    }

    fn domain_u(&self) -> (f64, f64) {
        self.inner().domain_u()
    }

    fn domain_v(&self) -> (f64, f64) {
        self.inner().domain_v()
    }

    fn is_u_closed(&self) -> bool {
        self.inner().is_u_closed()
    }

    fn is_v_closed(&self) -> bool {
        self.inner().is_v_closed()
    }

    fn partial_derivatives_at(&self, u: f64, v: f64) -> (Vec3, Vec3) {
        self.inner().partial_derivatives_at(u, v)
    }

    fn normal_at(&self, u: f64, v: f64) -> Option<Vec3> {
        self.inner().normal_at(u, v)
    }
}

impl From<PlaneSurface> for AnySurface {
    fn from(value: PlaneSurface) -> Self {
        Self::Plane(value)
    }
}

impl From<NurbsSurface> for AnySurface {
    fn from(value: NurbsSurface) -> Self {
        Self::Nurbs(value)
    }
}
