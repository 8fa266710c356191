use std::f64::consts::{FRAC_PI_2, PI, TAU};
use std::fmt;
use std::sync::Arc;

use super::core::{Point3, Vec3};
use super::error::{ConstructionError, DomainError};
use super::nurbs_curve::NurbsCurve;

/// Relative step for the finite-difference derivative fallback.
const DERIVATIVE_STEP: f64 = 1e-6;

pub trait Curve3 {
    fn point_at(&self, t: f64) -> Point3;

    #[must_use]
    fn domain(&self) -> (f64, f64) {
        (0.0, 1.0)
    }

    #[must_use]
    fn is_closed(&self) -> bool {
        false
    }

    #[must_use]
    fn derivative_at(&self, t: f64) -> Vec3 {
        let (a, b) = self.domain();
        let span = b - a;
        if !span.is_finite() || span == 0.0 {
            return Vec3::ZERO;
        }

        let h = DERIVATIVE_STEP * span.abs();
        let t0 = (t - h).max(a);
        let t1 = (t + h).min(b);
        if t1 == t0 {
            return Vec3::ZERO;
        }

        let p0 = self.point_at(t0);
        let p1 = self.point_at(t1);
        p1.sub_point(p0).mul_scalar(1.0 / (t1 - t0))
    }

    /// Returns the unit tangent vector at parameter `t`.
    /// Returns `None` if the derivative is zero or degenerate.
    #[must_use]
    fn tangent_at(&self, t: f64) -> Option<Vec3> {
        self.derivative_at(t).normalized()
    }

    /// Short name of the geometry type, used in diagnostics.
    #[must_use]
    fn kind(&self) -> &'static str {
        "curve"
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Analytic curves
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Line3 {
    pub start: Point3,
    pub end: Point3,
}

impl Line3 {
    #[must_use]
    pub const fn new(start: Point3, end: Point3) -> Self {
        Self { start, end }
    }

    #[must_use]
    pub const fn direction(self) -> Vec3 {
        self.end.sub_point(self.start)
    }
}

impl Curve3 for Line3 {
    fn point_at(&self, t: f64) -> Point3 {
        let dir = self.direction();
        self.start.add_vec(dir.mul_scalar(t))
    }

    fn derivative_at(&self, _t: f64) -> Vec3 {
        self.direction()
    }

    fn kind(&self) -> &'static str {
        "line"
    }
}

/// Circle parameterized over `[0, 1]`, one full turn from `x_axis`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Circle3 {
    pub center: Point3,
    pub x_axis: Vec3,
    pub y_axis: Vec3,
    pub radius: f64,
}

impl Circle3 {
    #[must_use]
    pub fn new(center: Point3, normal: Vec3, radius: f64) -> Self {
        let (x_axis, y_axis) = frame_axes_from_normal(normal);
        Self {
            center,
            x_axis,
            y_axis,
            radius,
        }
    }

    #[must_use]
    pub fn from_center_xaxis_normal(center: Point3, x_axis: Vec3, normal: Vec3, radius: f64) -> Self {
        let (x_axis, y_axis) = frame_axes_from_xaxis_normal(x_axis, normal);
        Self {
            center,
            x_axis,
            y_axis,
            radius,
        }
    }

    /// Exact rational representation of the arc between two curve
    /// parameters, parameterized over the same range.
    pub fn to_nurbs_range(&self, t0: f64, t1: f64) -> Result<NurbsCurve, ConstructionError> {
        conic_arc(
            self.center,
            self.x_axis * self.radius,
            self.y_axis * self.radius,
            (t0, t1),
        )
    }
}

impl Curve3 for Circle3 {
    fn point_at(&self, t: f64) -> Point3 {
        let angle = TAU * t;
        self.center
            .add_vec(self.x_axis.mul_scalar(self.radius * angle.cos()))
            .add_vec(self.y_axis.mul_scalar(self.radius * angle.sin()))
    }

    fn is_closed(&self) -> bool {
        true
    }

    fn derivative_at(&self, t: f64) -> Vec3 {
        let angle = TAU * t;
        let dx = self.x_axis.mul_scalar(-self.radius * angle.sin());
        let dy = self.y_axis.mul_scalar(self.radius * angle.cos());
        dx.add(dy).mul_scalar(TAU)
    }

    fn kind(&self) -> &'static str {
        "circle"
    }
}

/// Ellipse parameterized over `[0, 1]`, one full turn from `x_axis`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ellipse3 {
    pub center: Point3,
    pub x_axis: Vec3,
    pub y_axis: Vec3,
    pub radius_x: f64,
    pub radius_y: f64,
}

impl Ellipse3 {
    #[must_use]
    pub fn new(center: Point3, x_axis: Vec3, y_axis: Vec3, radius_x: f64, radius_y: f64) -> Self {
        let (x_axis, y_axis) = frame_axes_from_xy(x_axis, y_axis);
        Self {
            center,
            x_axis,
            y_axis,
            radius_x,
            radius_y,
        }
    }

    #[must_use]
    pub fn from_normal(center: Point3, normal: Vec3, radius_x: f64, radius_y: f64) -> Self {
        let (x_axis, y_axis) = frame_axes_from_normal(normal);
        Self {
            center,
            x_axis,
            y_axis,
            radius_x,
            radius_y,
        }
    }

    pub fn to_nurbs_range(&self, t0: f64, t1: f64) -> Result<NurbsCurve, ConstructionError> {
        conic_arc(
            self.center,
            self.x_axis * self.radius_x,
            self.y_axis * self.radius_y,
            (t0, t1),
        )
    }
}

impl Curve3 for Ellipse3 {
    fn point_at(&self, t: f64) -> Point3 {
        let angle = TAU * t;
        self.center
            .add_vec(self.x_axis.mul_scalar(self.radius_x * angle.cos()))
            .add_vec(self.y_axis.mul_scalar(self.radius_y * angle.sin()))
    }

    fn is_closed(&self) -> bool {
        true
    }

    fn derivative_at(&self, t: f64) -> Vec3 {
        let angle = TAU * t;
        let dx = self.x_axis.mul_scalar(-self.radius_x * angle.sin());
        let dy = self.y_axis.mul_scalar(self.radius_y * angle.cos());
        dx.add(dy).mul_scalar(TAU)
    }

    fn kind(&self) -> &'static str {
        "ellipse"
    }
}

/// Rational quadratic arc of the conic `center + cos(θ)·xr + sin(θ)·yr` for
/// `θ = 2π·t`, `t` in `range`, split into at most quarter turns.
fn conic_arc(center: Point3, xr: Vec3, yr: Vec3, range: (f64, f64)) -> Result<NurbsCurve, ConstructionError> {
    let (t0, t1) = range;
    let start = TAU * t0;
    let sweep = (TAU * (t1 - t0)).min(TAU);
    if !(sweep > 0.0) {
        return Err(ConstructionError::Normalization(DomainError::DegenerateRange { u1: t0, u2: t1 }));
    }

    let arcs = if sweep <= FRAC_PI_2 {
        1
    } else if sweep <= PI {
        2
    } else if sweep <= 1.5 * PI {
        3
    } else {
        4
    };
    let step = sweep / arcs as f64;
    let mid_weight = (0.5 * step).cos();
    let on = |theta: f64| center.add_vec(xr * theta.cos()).add_vec(yr * theta.sin());

    let mut poles = vec![on(start)];
    let mut weights = vec![1.0];
    for i in 0..arcs {
        let mid = start + (i as f64 + 0.5) * step;
        let end = start + (i + 1) as f64 * step;
        let shoulder = center.add_vec((xr * mid.cos() + yr * mid.sin()) / mid_weight);
        poles.push(shoulder);
        weights.push(mid_weight);
        poles.push(on(end));
        weights.push(1.0);
    }

    let mut knots = vec![0.0];
    let mut mults = vec![3];
    for i in 1..arcs {
        knots.push(i as f64 / arcs as f64);
        mults.push(2);
    }
    knots.push(1.0);
    mults.push(3);

    let mut curve = NurbsCurve::by_data(poles, knots, mults, 2, Some(weights), false)?;
    if !curve.set_domain(t0, t0 + sweep / TAU) {
        return Err(ConstructionError::Normalization(DomainError::InvertedRange { u1: t0, u2: t1 }));
    }
    Ok(curve)
}

// ─────────────────────────────────────────────────────────────────────────────
// Trimmed curves and the classifier
// ─────────────────────────────────────────────────────────────────────────────

/// A basis curve restricted to `[u1, u2]` of its own parameter.
#[derive(Debug, Clone)]
pub struct TrimmedCurve {
    basis: Box<AnyCurve>,
    u1: f64,
    u2: f64,
}

impl TrimmedCurve {
    pub fn new(basis: AnyCurve, u1: f64, u2: f64) -> Result<Self, DomainError> {
        if !(u1 < u2) {
            return Err(DomainError::InvertedRange { u1, u2 });
        }
        // Trimming a trimmed curve trims its basis.
        let (basis, u1, u2) = match basis {
            AnyCurve::Trimmed(inner) => {
                let (a, b) = (u1.max(inner.u1), u2.min(inner.u2));
                if !(a < b) {
                    return Err(DomainError::DegenerateRange { u1: a, u2: b });
                }
                (inner.basis, a, b)
            }
            other => (Box::new(other), u1, u2),
        };
        Ok(Self { basis, u1, u2 })
    }

    #[must_use]
    pub fn basis(&self) -> &AnyCurve {
        &self.basis
    }

    /// Convert to a NURBS curve with the same end points.
    ///
    /// `None` when the basis curve has no NURBS form.
    #[must_use]
    pub fn to_nurbs(&self) -> Option<NurbsCurve> {
        match self.basis.as_ref() {
            AnyCurve::Line(line) => NurbsCurve::by_data(
                vec![line.point_at(self.u1), line.point_at(self.u2)],
                vec![self.u1, self.u2],
                vec![2, 2],
                1,
                None,
                false,
            )
            .ok(),
            AnyCurve::Circle(circle) => circle.to_nurbs_range(self.u1, self.u2).ok(),
            AnyCurve::Ellipse(ellipse) => ellipse.to_nurbs_range(self.u1, self.u2).ok(),
            AnyCurve::Nurbs(curve) => {
                let mut curve = curve.clone();
                curve.segment(self.u1, self.u2).then_some(curve)
            }
            AnyCurve::Trimmed(_) | AnyCurve::Generic(_) => None,
        }
    }
}

impl Curve3 for TrimmedCurve {
    fn point_at(&self, t: f64) -> Point3 {
        self.basis.point_at(t)
    }

    fn domain(&self) -> (f64, f64) {
        (self.u1, self.u2)
    }

    fn derivative_at(&self, t: f64) -> Vec3 {
        self.basis.derivative_at(t)
    }

    fn kind(&self) -> &'static str {
        "trimmed"
    }
}

/// Classifier over the curve kinds this crate understands. Anything else is
/// carried as an opaque `Generic` curve.
#[derive(Clone)]
pub enum AnyCurve {
    Line(Line3),
    Circle(Circle3),
    Ellipse(Ellipse3),
    Nurbs(NurbsCurve),
    Trimmed(TrimmedCurve),
    Generic(Arc<dyn Curve3 + Send + Sync>),
}

impl AnyCurve {
    /// NURBS form of this curve. `None` for generic curves.
    #[must_use]
    pub fn to_nurbs(&self) -> Option<NurbsCurve> {
        match self {
            Self::Line(line) => NurbsCurve::from_knot_sequence(
                1,
                vec![line.start, line.end],
                &[0.0, 0.0, 1.0, 1.0],
                None,
            )
            .ok(),
            Self::Circle(circle) => circle.to_nurbs_range(0.0, 1.0).ok(),
            Self::Ellipse(ellipse) => ellipse.to_nurbs_range(0.0, 1.0).ok(),
            Self::Nurbs(curve) => Some(curve.clone()),
            Self::Trimmed(trimmed) => trimmed.to_nurbs(),
            Self::Generic(_) => None,
        }
    }

    #[must_use]
    pub fn as_nurbs(&self) -> Option<&NurbsCurve> {
        match self {
            Self::Nurbs(curve) => Some(curve),
            _ => None,
        }
    }

    fn inner(&self) -> &dyn Curve3 {
        match self {
            Self::Line(c) => c,
            Self::Circle(c) => c,
            Self::Ellipse(c) => c,
            Self::Nurbs(c) => c,
            Self::Trimmed(c) => c,
            Self::Generic(c) => c.as_ref(),
        }
    }
}

impl Curve3 for AnyCurve {
    fn point_at(&self, t: f64) -> Point3 {
        self.inner().point_at(t)
    }

    fn domain(&self) -> (f64, f64) {
        self.inner().domain()
    }

    fn is_closed(&self) -> bool {
        self.inner().is_closed()
    }

    fn derivative_at(&self, t: f64) -> Vec3 {
        self.inner().derivative_at(t)
    }

    fn kind(&self) -> &'static str {
        self.inner().kind()
    }
}

impl fmt::Debug for AnyCurve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Line(c) => f.debug_tuple("Line").field(c).finish(),
            Self::Circle(c) => f.debug_tuple("Circle").field(c).finish(),
            Self::Ellipse(c) => f.debug_tuple("Ellipse").field(c).finish(),
            Self::Nurbs(c) => f.debug_tuple("Nurbs").field(c).finish(),
            Self::Trimmed(c) => f.debug_tuple("Trimmed").field(c).finish(),
            Self::Generic(c) => f
                .debug_struct("Generic")
                .field("kind", &c.kind())
                .field("domain", &c.domain())
                .finish(),
        }
    }
}

impl From<Line3> for AnyCurve {
    fn from(value: Line3) -> Self {
        Self::Line(value)
    }
}

impl From<Circle3> for AnyCurve {
    fn from(value: Circle3) -> Self {
        Self::Circle(value)
    }
}

impl From<Ellipse3> for AnyCurve {
    fn from(value: Ellipse3) -> Self {
        Self::Ellipse(value)
    }
}

impl From<NurbsCurve> for AnyCurve {
    fn from(value: NurbsCurve) -> Self {
        Self::Nurbs(value)
    }
}

impl From<TrimmedCurve> for AnyCurve {
    fn from(value: TrimmedCurve) -> Self {
        Self::Trimmed(value)
    }
}

fn frame_axes_from_normal(normal: Vec3) -> (Vec3, Vec3) {
    let z = normal.normalized().unwrap_or(Vec3::Z);
    let x = z.any_orthogonal();
    let y = z.cross(x).normalized().unwrap_or(Vec3::Y);
    (x, y)
}

fn frame_axes_from_xaxis_normal(x_axis: Vec3, normal: Vec3) -> (Vec3, Vec3) {
    let z = normal.normalized().unwrap_or(Vec3::Z);
    let projected = x_axis.sub(z.mul_scalar(x_axis.dot(z)));
    let x = projected.normalized().unwrap_or_else(|| z.any_orthogonal());
    let y = z.cross(x).normalized().unwrap_or(Vec3::Y);
    (x, y)
}

fn frame_axes_from_xy(x_axis: Vec3, y_axis: Vec3) -> (Vec3, Vec3) {
    let x = x_axis.normalized().unwrap_or(Vec3::X);
    let z = x.cross(y_axis).normalized().unwrap_or(Vec3::Z);
    let y = z.cross(x).normalized().unwrap_or(Vec3::Y);
    (x, y)
}
