//! Rational B-spline curves with in-place editing.
//!
//! A [`NurbsCurve`] keeps its knot vector as distinct values plus
//! multiplicities and its poles in Euclidean form with separate weights. The
//! homogeneous, flat-knot form used by the evaluation algorithms is derived
//! from those after every edit. Periodic curves store one period and are
//! unrolled by `degree` wrapped poles for evaluation.
//!
//! Non-periodic curves are always held clamped: unclamped input is converted
//! on construction without changing its shape.

use super::core::{HPoint4, Point3, Tolerance, Vec3};
use super::curve::Curve3;
use super::error::{ConstructionError, DomainError};
use super::knots::{self, KnotVector};
use super::param;
use super::quadrature;

#[derive(Debug, Clone, PartialEq)]
pub struct NurbsCurve {
    kv: KnotVector,
    poles: Vec<Point3>,
    weights: Vec<f64>,
    cpw: Vec<HPoint4>,
}

impl NurbsCurve {
    /// Build a curve from control points, distinct knots and multiplicities.
    ///
    /// Missing weights default to 1. For a periodic curve the knots describe
    /// one period, the first and last multiplicities must match and there is
    /// one pole per flat knot of the period.
    pub fn by_data(
        cp: Vec<Point3>,
        knots: Vec<f64>,
        mults: Vec<usize>,
        degree: usize,
        weights: Option<Vec<f64>>,
        is_periodic: bool,
    ) -> Result<Self, ConstructionError> {
        check_points(&cp)?;
        let weights = check_weights(weights, cp.len())?;
        let kv = KnotVector::new(knots, mults, degree, is_periodic, cp.len())?;
        let mut curve = Self::from_parts(kv, cp, weights);
        if !curve.kv.is_periodic() && !curve.kv.is_clamped() {
            let (lo, hi) = (curve.u1(), curve.u2());
            let (kv, polys) = curve.kv.segment(&[curve.cpw()], lo, hi)?;
            curve.adopt(kv, &polys);
        }
        Ok(curve)
    }

    /// Build a non-periodic curve from a flat knot sequence of length
    /// `cp.len() + degree + 1`.
    pub fn from_knot_sequence(
        degree: usize,
        cp: Vec<Point3>,
        uk: &[f64],
        weights: Option<Vec<f64>>,
    ) -> Result<Self, ConstructionError> {
        knots::validate_sequence(uk, degree, cp.len())?;
        let (distinct, mults) = knots::compress(uk, 0.0);
        Self::by_data(cp, distinct, mults, degree, weights, false)
    }

    /// Degree-1 curve through `points`, parameterized by cumulative chord
    /// length.
    pub fn from_polyline(points: &[Point3]) -> Result<Self, ConstructionError> {
        if points.len() < 2 {
            return Err(ConstructionError::TooFewControlPoints {
                count: points.len(),
                min: 2,
            });
        }
        let mut knots = Vec::with_capacity(points.len());
        let mut total = 0.0;
        knots.push(total);
        for pair in points.windows(2) {
            total += pair[0].distance_to(pair[1]);
            knots.push(total);
        }
        let mut mults = vec![1; points.len()];
        mults[0] = 2;
        mults[points.len() - 1] = 2;
        Self::by_data(points.to_vec(), knots, mults, 1, None, false)
    }

    /// Creates a B-spline curve that interpolates exactly through the given
    /// points.
    ///
    /// Uses chord-length parameters over `[0, 1]`, an averaged knot vector and
    /// a dense solve of the collocation system. `degree` is clamped to
    /// `1..points.len()`.
    pub fn interpolate_through_points(points: &[Point3], degree: usize) -> Result<Self, ConstructionError> {
        if points.len() < 2 {
            return Err(ConstructionError::TooFewControlPoints {
                count: points.len(),
                min: 2,
            });
        }
        if points.len() == 2 {
            return Self::from_knot_sequence(1, points.to_vec(), &[0.0, 0.0, 1.0, 1.0], None);
        }

        let p = degree.clamp(1, points.len() - 1);
        let params = chord_length_parameters(points)?;
        let uk = averaging_knot_vector(&params, p);
        let poles = solve_interpolation_system(points, &params, &uk, p)?;
        Self::from_knot_sequence(p, poles, &uk, None)
    }

    /// Assemble a curve from an already validated knot vector and matching
    /// base poles.
    pub(crate) fn from_parts(kv: KnotVector, poles: Vec<Point3>, weights: Vec<f64>) -> Self {
        let mut curve = Self {
            kv,
            poles,
            weights,
            cpw: Vec::new(),
        };
        curve.rebuild();
        curve
    }

    fn rebuild(&mut self) {
        let base = param::homogenize(&self.poles, &self.weights);
        self.cpw = self.kv.unroll_polygon(&base, 1);
    }

    /// Take over a knot vector and the single polygon produced for it.
    fn adopt(&mut self, kv: KnotVector, polygons: &[Vec<HPoint4>]) {
        let (poles, weights) = polygons
            .first()
            .map(|poly| param::dehomogenize(poly))
            .unwrap_or_default();
        self.kv = kv;
        self.poles = poles;
        self.weights = weights;
        self.rebuild();
    }

    // ── accessors ────────────────────────────────────────────────────────────

    /// Degree.
    #[must_use]
    pub const fn p(&self) -> usize {
        self.kv.degree()
    }

    /// Number of control points.
    #[must_use]
    pub fn n(&self) -> usize {
        self.poles.len()
    }

    /// Distinct knot values.
    #[must_use]
    pub fn knots(&self) -> &[f64] {
        self.kv.knots()
    }

    /// Multiplicity of each distinct knot.
    #[must_use]
    pub fn mult(&self) -> &[usize] {
        self.kv.mults()
    }

    /// Flat knot sequence. One period for periodic curves.
    #[must_use]
    pub fn uk(&self) -> Vec<f64> {
        self.kv.sequence()
    }

    #[must_use]
    pub fn knot_vector(&self) -> &KnotVector {
        &self.kv
    }

    #[must_use]
    pub fn cp(&self) -> &[Point3] {
        &self.poles
    }

    #[must_use]
    pub fn w(&self) -> &[f64] {
        &self.weights
    }

    /// Homogeneous control points `(x·w, y·w, z·w, w)`.
    #[must_use]
    pub fn cpw(&self) -> Vec<HPoint4> {
        param::homogenize(&self.poles, &self.weights)
    }

    /// First parameter of the domain.
    #[must_use]
    pub fn u1(&self) -> f64 {
        self.kv.lo()
    }

    /// Last parameter of the domain.
    #[must_use]
    pub fn u2(&self) -> f64 {
        self.kv.hi()
    }

    /// Start point.
    #[must_use]
    pub fn p1(&self) -> Point3 {
        self.point_unchecked(self.u1())
    }

    /// End point.
    #[must_use]
    pub fn p2(&self) -> Point3 {
        self.point_unchecked(self.u2())
    }

    #[must_use]
    pub const fn is_periodic(&self) -> bool {
        self.kv.is_periodic()
    }

    /// Periodic curves are closed; others are closed when their end points
    /// coincide within [`Tolerance::PROJECTION`].
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.is_periodic() || Tolerance::PROJECTION.approx_eq_point3(self.p1(), self.p2())
    }

    /// Length of the whole curve.
    #[must_use]
    pub fn length(&self) -> f64 {
        self.arc_length(self.u1(), self.u2(), Tolerance::DEFAULT.eps)
    }

    // ── evaluation ───────────────────────────────────────────────────────────

    /// Point at `u`.
    ///
    /// Non-periodic curves reject parameters further than
    /// [`Tolerance::PARAMETER`] outside the domain; periodic curves wrap.
    pub fn eval(&self, u: f64) -> Result<Point3, DomainError> {
        let u = self.kv.checked(u)?;
        Ok(self.point_unchecked(u))
    }

    /// The `d`-th derivative at `u`, `d >= 1`.
    pub fn deriv(&self, u: f64, d: usize) -> Result<Vec3, DomainError> {
        if d == 0 {
            return Err(DomainError::InvalidDerivativeOrder { order: d });
        }
        let u = self.kv.checked(u)?;
        Ok(self.derivatives_unchecked(u, d)[d])
    }

    pub(crate) fn point_unchecked(&self, u: f64) -> Point3 {
        let u = self.kv.normalize(u);
        let p = self.p();
        let span = self.kv.span(u);
        let mut d = self.cpw[span - p..=span].to_vec();
        knots::de_boor(&mut d, span, p, u, self.kv.flat());
        let h = d[p];
        h.to_point3().unwrap_or(Point3::new(h.x, h.y, h.z))
    }

    /// Point (index 0, as a vector) and derivatives up to order `d`.
    pub(crate) fn derivatives_unchecked(&self, u: f64, d: usize) -> Vec<Vec3> {
        let u = self.kv.normalize(u);
        let p = self.p();
        let span = self.kv.span(u);
        let basis = knots::ders_basis_funs(span, u, p, d, self.kv.flat());

        let mut aders = vec![HPoint4::ZERO; d + 1];
        for (k, row) in basis.iter().enumerate().take(d.min(p) + 1) {
            for (j, &b) in row.iter().enumerate() {
                aders[k] = aders[k].add(self.cpw[span - p + j].mul_scalar(b));
            }
        }
        rational_derivatives(&aders)
    }

    /// Arc length between two parameters.
    ///
    /// The operands are swapped when `u1 > u2`, so the result is symmetric
    /// and never negative. Non-periodic curves clamp both ends to the domain.
    #[must_use]
    pub fn arc_length(&self, u1: f64, u2: f64, tol: f64) -> f64 {
        let (a, b) = if u1 <= u2 { (u1, u2) } else { (u2, u1) };
        let (a, b) = if self.is_periodic() {
            (a, b)
        } else {
            (a.clamp(self.u1(), self.u2()), b.clamp(self.u1(), self.u2()))
        };
        if !(b > a) {
            return 0.0;
        }
        let breaks = quadrature::clip_breaks(&self.kv.breakpoints(a, b), a, b);
        let mut speed = |u: f64| self.derivatives_unchecked(u, 1)[1].length();
        quadrature::adaptive_over(&mut speed, &breaks, tol).max(0.0)
    }

    // ── parameter maps ───────────────────────────────────────────────────────

    /// Parameter on the reversed curve matching `u` on this one.
    #[must_use]
    pub fn reversed_u(&self, u: f64) -> f64 {
        self.u1() + self.u2() - u
    }

    /// Map a local parameter in `[0, 1]` onto the domain.
    pub fn local_to_global_param(&self, t: f64) -> Result<f64, DomainError> {
        param::local_to_global(self.u1(), self.u2(), t)
    }

    /// Map a domain parameter into `[0, 1]`.
    pub fn global_to_local_param(&self, u: f64) -> Result<f64, DomainError> {
        param::global_to_local(self.u1(), self.u2(), u)
    }

    // ── in-place edits ───────────────────────────────────────────────────────

    /// Reverse the direction of parameterization in place. The domain is
    /// unchanged and `eval(reversed_u(u))` afterwards equals `eval(u)` before.
    pub fn reverse(&mut self) {
        self.poles = self.kv.reverse_poles(&self.poles);
        self.weights = self.kv.reverse_poles(&self.weights);
        self.kv = self.kv.reversed();
        self.rebuild();
    }

    /// Reparameterize the curve onto `[u1, u2]` without changing its shape.
    /// Returns `false`, leaving the curve untouched, unless `u1 < u2`.
    pub fn set_domain(&mut self, u1: f64, u2: f64) -> bool {
        if !(u1 < u2) {
            return false;
        }
        if self.kv.set_domain(u1, u2).is_err() {
            return false;
        }
        self.rebuild();
        true
    }

    /// Restrict the curve in place to `[u1, u2]`, discarding the rest.
    ///
    /// The range is clamped to the domain of a non-periodic curve. A periodic
    /// curve is unrolled as needed so that ranges crossing the seam are
    /// honored, and the result is no longer periodic. Returns `false`,
    /// leaving the curve untouched, unless `u1 < u2` and the clamped range is
    /// non-empty.
    pub fn segment(&mut self, u1: f64, u2: f64) -> bool {
        if !(u1 < u2) {
            return false;
        }
        match self.kv.segment(&[self.cpw()], u1, u2) {
            Ok((kv, polys)) => {
                self.adopt(kv, &polys);
                true
            }
            Err(err) => {
                log::debug!("curve segment [{u1}, {u2}] rejected: {err}");
                false
            }
        }
    }

    /// Insert `u` `times` times without changing the curve shape.
    pub fn insert_knot(&mut self, u: f64, times: usize) -> Result<(), DomainError> {
        let (kv, polys) = self
            .kv
            .insert(&[self.cpw()], u, times, Tolerance::PARAMETER.eps)?;
        self.adopt(kv, &polys);
        Ok(())
    }

    /// Replace control point `i`, optionally with a new weight.
    pub fn set_cp(&mut self, i: usize, cp: Point3, weight: Option<f64>) -> Result<(), DomainError> {
        if i >= self.poles.len() {
            return Err(DomainError::IndexOutOfBounds {
                index: i,
                len: self.poles.len(),
            });
        }
        if let Some(w) = weight {
            if !w.is_finite() || w <= 0.0 {
                return Err(DomainError::InvalidWeight { value: w });
            }
            self.weights[i] = w;
        }
        self.poles[i] = cp;
        self.rebuild();
        Ok(())
    }
}

impl Curve3 for NurbsCurve {
    fn point_at(&self, t: f64) -> Point3 {
        self.point_unchecked(t)
    }

    fn domain(&self) -> (f64, f64) {
        (self.u1(), self.u2())
    }

    fn is_closed(&self) -> bool {
        NurbsCurve::is_closed(self)
    }

    fn derivative_at(&self, t: f64) -> Vec3 {
        self.derivatives_unchecked(t, 1)[1]
    }

    fn kind(&self) -> &'static str {
        "nurbs"
    }
}

/// Derivatives of a rational curve from the derivatives of its homogeneous
/// form. Index 0 holds the point as a vector.
pub(crate) fn rational_derivatives(aders: &[HPoint4]) -> Vec<Vec3> {
    let w0 = aders[0].w;
    let mut ck: Vec<Vec3> = Vec::with_capacity(aders.len());
    for k in 0..aders.len() {
        let mut v = aders[k].xyz();
        for i in 1..=k {
            v = v - ck[k - i] * (knots::binomial(k, i) * aders[i].w);
        }
        ck.push(v / w0);
    }
    ck
}

pub(crate) fn check_points(cp: &[Point3]) -> Result<(), ConstructionError> {
    match cp.iter().position(|p| !p.is_finite()) {
        Some(index) => Err(ConstructionError::NonFiniteControlPoint { index }),
        None => Ok(()),
    }
}

pub(crate) fn check_weights(weights: Option<Vec<f64>>, count: usize) -> Result<Vec<f64>, ConstructionError> {
    let Some(weights) = weights else {
        return Ok(vec![1.0; count]);
    };
    if weights.len() != count {
        return Err(ConstructionError::LengthMismatch {
            what: "weights",
            expected: count,
            actual: weights.len(),
        });
    }
    if let Some(index) = weights.iter().position(|w| !w.is_finite() || *w <= 0.0) {
        return Err(ConstructionError::InvalidWeight {
            index,
            value: weights[index],
        });
    }
    Ok(weights)
}

/// Chord-length parameters normalized to `[0, 1]`.
fn chord_length_parameters(points: &[Point3]) -> Result<Vec<f64>, ConstructionError> {
    let mut lengths = Vec::with_capacity(points.len());
    lengths.push(0.0);
    let mut total = 0.0;
    for window in points.windows(2) {
        total += window[1].distance_to(window[0]);
        lengths.push(total);
    }
    if !(total > 0.0) {
        return Err(ConstructionError::Interpolation(
            "interpolation points are coincident".to_string(),
        ));
    }
    for length in &mut lengths {
        *length /= total;
    }
    Ok(lengths)
}

/// Clamped knot vector whose interior knots average `degree` consecutive
/// parameters.
fn averaging_knot_vector(params: &[f64], degree: usize) -> Vec<f64> {
    let n = params.len();
    let p = degree;
    let mut knots = Vec::with_capacity(n + p + 1);
    knots.extend(std::iter::repeat_n(0.0, p + 1));
    for j in 1..n - p {
        let sum: f64 = params[j..j + p].iter().sum();
        knots.push(sum / p as f64);
    }
    knots.extend(std::iter::repeat_n(1.0, p + 1));
    knots
}

fn solve_interpolation_system(
    data_points: &[Point3],
    params: &[f64],
    uk: &[f64],
    degree: usize,
) -> Result<Vec<Point3>, ConstructionError> {
    let n = data_points.len();
    let p = degree;

    let mut matrix = vec![vec![0.0; n]; n];
    for (row, &t) in matrix.iter_mut().zip(params) {
        let span = knots::find_span(n - 1, p, t, uk);
        let basis = knots::ders_basis_funs(span, t, p, 0, uk);
        for (j, &b) in basis[0].iter().enumerate() {
            row[span - p + j] = b;
        }
    }

    let mut columns = [vec![0.0; n], vec![0.0; n], vec![0.0; n]];
    let rhs: [Vec<f64>; 3] = [
        data_points.iter().map(|pt| pt.x).collect(),
        data_points.iter().map(|pt| pt.y).collect(),
        data_points.iter().map(|pt| pt.z).collect(),
    ];
    for (column, rhs) in columns.iter_mut().zip(&rhs) {
        solve_linear_system(&matrix, rhs, column)?;
    }

    Ok((0..n)
        .map(|i| Point3::new(columns[0][i], columns[1][i], columns[2][i]))
        .collect())
}

/// Gaussian elimination with partial pivoting.
fn solve_linear_system(matrix: &[Vec<f64>], rhs: &[f64], result: &mut [f64]) -> Result<(), ConstructionError> {
    let n = matrix.len();
    let singular = || ConstructionError::Interpolation("singular interpolation system".to_string());

    let mut aug: Vec<Vec<f64>> = matrix
        .iter()
        .zip(rhs)
        .map(|(row, &b)| {
            let mut r = row.clone();
            r.push(b);
            r
        })
        .collect();

    for k in 0..n {
        let mut max_row = k;
        let mut max_val = aug[k][k].abs();
        for (i, row) in aug.iter().enumerate().skip(k + 1) {
            if row[k].abs() > max_val {
                max_val = row[k].abs();
                max_row = i;
            }
        }
        if max_val < 1e-14 {
            return Err(singular());
        }
        aug.swap(k, max_row);

        let pivot_row = aug[k].clone();
        for row in aug.iter_mut().skip(k + 1) {
            let factor = row[k] / pivot_row[k];
            for (value, &pivot) in row.iter_mut().zip(&pivot_row).skip(k) {
                *value -= factor * pivot;
            }
        }
    }

    for i in (0..n).rev() {
        let mut sum = aug[i][n];
        for j in (i + 1)..n {
            sum -= aug[i][j] * result[j];
        }
        if aug[i][i].abs() < 1e-14 {
            return Err(singular());
        }
        result[i] = sum / aug[i][i];
    }
    Ok(())
}
