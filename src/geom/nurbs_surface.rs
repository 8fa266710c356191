//! Rational B-spline surfaces.
//!
//! Control points are stored row-major along u: the pole `(i, j)` lives at
//! `j * n() + i`, with `i` indexing the u direction. Each direction carries
//! its own [`KnotVector`], so periodicity, segmentation and knot insertion
//! work per direction exactly as they do for curves.

use super::core::{HPoint4, Point3, Tolerance, Vec3};
use super::error::{ConstructionError, DomainError};
use super::knots::{self, KnotVector};
use super::nurbs_curve::{NurbsCurve, check_points, check_weights};
use super::param;
use super::quadrature;
use super::surface::{PlaneSurface, Surface};

type Polygons = Vec<Vec<HPoint4>>;

#[derive(Debug, Clone, PartialEq)]
pub struct NurbsSurface {
    u: KnotVector,
    v: KnotVector,
    poles: Vec<Point3>,
    weights: Vec<f64>,
    cpw: Vec<HPoint4>,
}

impl NurbsSurface {
    /// Build a surface from a `cp[i][j]` control net (`i` along u, `j` along
    /// v), distinct knots and multiplicities per direction.
    #[allow(clippy::too_many_arguments)]
    pub fn by_data(
        cp: Vec<Vec<Point3>>,
        uknots: Vec<f64>,
        vknots: Vec<f64>,
        umult: Vec<usize>,
        vmult: Vec<usize>,
        p: usize,
        q: usize,
        weights: Option<Vec<Vec<f64>>>,
        u_periodic: bool,
        v_periodic: bool,
    ) -> Result<Self, ConstructionError> {
        let nu = cp.len();
        let nv = cp.first().map_or(0, Vec::len);
        for (row, points) in cp.iter().enumerate() {
            if points.len() != nv {
                return Err(ConstructionError::RaggedControlNet {
                    row,
                    expected: nv,
                    actual: points.len(),
                });
            }
        }
        if let Some(weights) = &weights {
            if weights.len() != nu {
                return Err(ConstructionError::LengthMismatch {
                    what: "weight rows",
                    expected: nu,
                    actual: weights.len(),
                });
            }
            for (row, values) in weights.iter().enumerate() {
                if values.len() != nv {
                    return Err(ConstructionError::RaggedControlNet {
                        row,
                        expected: nv,
                        actual: values.len(),
                    });
                }
            }
        }

        let mut poles = vec![Point3::ORIGIN; nu * nv];
        for (i, row) in cp.iter().enumerate() {
            for (j, &point) in row.iter().enumerate() {
                poles[j * nu + i] = point;
            }
        }
        let weights = weights.map(|rows| {
            let mut flat = vec![1.0; nu * nv];
            for (i, row) in rows.iter().enumerate() {
                for (j, &w) in row.iter().enumerate() {
                    flat[j * nu + i] = w;
                }
            }
            flat
        });

        let u = KnotVector::new(uknots, umult, p, u_periodic, nu)?;
        let v = KnotVector::new(vknots, vmult, q, v_periodic, nv)?;
        Self::assemble(u, v, poles, weights)
    }

    /// Build a non-periodic surface from flat knot sequences and a control
    /// net stored as `v_index * u_count + u_index`.
    #[allow(clippy::too_many_arguments)]
    pub fn from_knot_sequences(
        degree_u: usize,
        degree_v: usize,
        u_count: usize,
        v_count: usize,
        control_points: Vec<Point3>,
        knots_u: &[f64],
        knots_v: &[f64],
        weights: Option<Vec<f64>>,
    ) -> Result<Self, ConstructionError> {
        if control_points.len() != u_count * v_count {
            return Err(ConstructionError::LengthMismatch {
                what: "control points",
                expected: u_count * v_count,
                actual: control_points.len(),
            });
        }
        knots::validate_sequence(knots_u, degree_u, u_count)?;
        knots::validate_sequence(knots_v, degree_v, v_count)?;
        let (uk, um) = knots::compress(knots_u, 0.0);
        let (vk, vm) = knots::compress(knots_v, 0.0);
        let u = KnotVector::new(uk, um, degree_u, false, u_count)?;
        let v = KnotVector::new(vk, vm, degree_v, false, v_count)?;
        Self::assemble(u, v, control_points, weights)
    }

    fn assemble(
        u: KnotVector,
        v: KnotVector,
        poles: Vec<Point3>,
        weights: Option<Vec<f64>>,
    ) -> Result<Self, ConstructionError> {
        check_points(&poles)?;
        let weights = check_weights(weights, poles.len())?;
        let mut surface = Self {
            u,
            v,
            poles,
            weights,
            cpw: Vec::new(),
        };
        surface.rebuild();

        if !surface.u.is_periodic() && !surface.u.is_clamped() {
            let (lo, hi) = (surface.u1(), surface.u2());
            let (kv, polys) = surface.u.segment(&surface.u_polygons(), lo, hi)?;
            surface.adopt_u(kv, &polys);
        }
        if !surface.v.is_periodic() && !surface.v.is_clamped() {
            let (lo, hi) = (surface.v1(), surface.v2());
            let (kv, polys) = surface.v.segment(&surface.v_polygons(), lo, hi)?;
            surface.adopt_v(kv, &polys);
        }
        Ok(surface)
    }

    fn rebuild(&mut self) {
        let (nu, nv) = (self.n(), self.m());
        let (mu, mv) = (self.u.unrolled_count(), self.v.unrolled_count());
        let base = param::homogenize(&self.poles, &self.weights);
        self.cpw = (0..mv)
            .flat_map(|j| {
                let row = (j % nv) * nu;
                let base = &base;
                (0..mu).map(move |i| base[row + i % nu])
            })
            .collect();
    }

    /// Base homogeneous polygons along u, one per v index.
    fn u_polygons(&self) -> Polygons {
        let nu = self.n();
        let base = param::homogenize(&self.poles, &self.weights);
        base.chunks(nu).map(<[HPoint4]>::to_vec).collect()
    }

    /// Base homogeneous polygons along v, one per u index.
    fn v_polygons(&self) -> Polygons {
        let (nu, nv) = (self.n(), self.m());
        let base = param::homogenize(&self.poles, &self.weights);
        (0..nu)
            .map(|i| (0..nv).map(|j| base[j * nu + i]).collect())
            .collect()
    }

    fn adopt_u(&mut self, kv: KnotVector, polys: &[Vec<HPoint4>]) {
        let flat: Vec<HPoint4> = polys.iter().flatten().copied().collect();
        let (poles, weights) = param::dehomogenize(&flat);
        self.u = kv;
        self.poles = poles;
        self.weights = weights;
        self.rebuild();
    }

    fn adopt_v(&mut self, kv: KnotVector, polys: &[Vec<HPoint4>]) {
        let nu = polys.len();
        let nv = polys.first().map_or(0, Vec::len);
        let mut flat = vec![HPoint4::ZERO; nu * nv];
        for (i, poly) in polys.iter().enumerate() {
            for (j, &h) in poly.iter().enumerate() {
                flat[j * nu + i] = h;
            }
        }
        let (poles, weights) = param::dehomogenize(&flat);
        self.v = kv;
        self.poles = poles;
        self.weights = weights;
        self.rebuild();
    }

    // ── accessors ────────────────────────────────────────────────────────────

    #[must_use]
    pub const fn p(&self) -> usize {
        self.u.degree()
    }

    #[must_use]
    pub const fn q(&self) -> usize {
        self.v.degree()
    }

    /// Number of control points along u.
    #[must_use]
    pub fn n(&self) -> usize {
        self.u.pole_count()
    }

    /// Number of control points along v.
    #[must_use]
    pub fn m(&self) -> usize {
        self.v.pole_count()
    }

    #[must_use]
    pub fn uknots(&self) -> &[f64] {
        self.u.knots()
    }

    #[must_use]
    pub fn vknots(&self) -> &[f64] {
        self.v.knots()
    }

    #[must_use]
    pub fn umult(&self) -> &[usize] {
        self.u.mults()
    }

    #[must_use]
    pub fn vmult(&self) -> &[usize] {
        self.v.mults()
    }

    #[must_use]
    pub fn uk(&self) -> Vec<f64> {
        self.u.sequence()
    }

    #[must_use]
    pub fn vk(&self) -> Vec<f64> {
        self.v.sequence()
    }

    #[must_use]
    pub fn u_knot_vector(&self) -> &KnotVector {
        &self.u
    }

    #[must_use]
    pub fn v_knot_vector(&self) -> &KnotVector {
        &self.v
    }

    /// Control net as `cp[i][j]`.
    #[must_use]
    pub fn cp(&self) -> Vec<Vec<Point3>> {
        let (nu, nv) = (self.n(), self.m());
        (0..nu)
            .map(|i| (0..nv).map(|j| self.poles[j * nu + i]).collect())
            .collect()
    }

    /// Weights as `w[i][j]`.
    #[must_use]
    pub fn w(&self) -> Vec<Vec<f64>> {
        let (nu, nv) = (self.n(), self.m());
        (0..nu)
            .map(|i| (0..nv).map(|j| self.weights[j * nu + i]).collect())
            .collect()
    }

    #[must_use]
    pub fn cp_at(&self, i: usize, j: usize) -> Option<Point3> {
        (i < self.n() && j < self.m()).then(|| self.poles[j * self.n() + i])
    }

    #[must_use]
    pub fn w_at(&self, i: usize, j: usize) -> Option<f64> {
        (i < self.n() && j < self.m()).then(|| self.weights[j * self.n() + i])
    }

    #[must_use]
    pub fn u1(&self) -> f64 {
        self.u.lo()
    }

    #[must_use]
    pub fn u2(&self) -> f64 {
        self.u.hi()
    }

    #[must_use]
    pub fn v1(&self) -> f64 {
        self.v.lo()
    }

    #[must_use]
    pub fn v2(&self) -> f64 {
        self.v.hi()
    }

    #[must_use]
    pub const fn is_u_periodic(&self) -> bool {
        self.u.is_periodic()
    }

    #[must_use]
    pub const fn is_v_periodic(&self) -> bool {
        self.v.is_periodic()
    }

    // ── evaluation ───────────────────────────────────────────────────────────

    pub fn eval(&self, u: f64, v: f64) -> Result<Point3, DomainError> {
        let (u, v) = (self.u.checked(u)?, self.v.checked(v)?);
        Ok(self.point_unchecked(u, v))
    }

    /// Mixed partial derivative `∂^(nu+nv) S / ∂u^nu ∂v^nv`.
    pub fn deriv(&self, u: f64, v: f64, nu: usize, nv: usize) -> Result<Vec3, DomainError> {
        if nu + nv == 0 {
            return Err(DomainError::InvalidDerivativeOrder { order: 0 });
        }
        let (u, v) = (self.u.checked(u)?, self.v.checked(v)?);
        Ok(self.derivatives_unchecked(u, v, nu + nv)[nu][nv])
    }

    /// Unnormalized normal `Su × Sv`.
    pub fn norm(&self, u: f64, v: f64) -> Result<Vec3, DomainError> {
        let (u, v) = (self.u.checked(u)?, self.v.checked(v)?);
        let skl = self.derivatives_unchecked(u, v, 1);
        Ok(skl[1][0].cross(skl[0][1]))
    }

    pub(crate) fn point_unchecked(&self, u: f64, v: f64) -> Point3 {
        Point3::ORIGIN.add_vec(self.derivatives_unchecked(u, v, 0)[0][0])
    }

    /// `skl[k][l]` holds the derivative of order `k` in u and `l` in v for
    /// `k + l <= d`; `skl[0][0]` is the point as a vector.
    pub(crate) fn derivatives_unchecked(&self, u: f64, v: f64, d: usize) -> Vec<Vec<Vec3>> {
        let (u, v) = (self.u.normalize(u), self.v.normalize(v));
        let (p, q) = (self.p(), self.q());
        let mu = self.u.unrolled_count();
        let su = self.u.span(u);
        let sv = self.v.span(v);
        let nu = knots::ders_basis_funs(su, u, p, d, self.u.flat());
        let nv = knots::ders_basis_funs(sv, v, q, d, self.v.flat());

        let mut aders: Vec<Vec<HPoint4>> = (0..=d).map(|k| vec![HPoint4::ZERO; d - k + 1]).collect();
        for (k, row_u) in nu.iter().enumerate() {
            let mut temp = vec![HPoint4::ZERO; q + 1];
            for (s, slot) in temp.iter_mut().enumerate() {
                let row = (sv - q + s) * mu;
                for (r, &b) in row_u.iter().enumerate() {
                    *slot = slot.add(self.cpw[row + su - p + r].mul_scalar(b));
                }
            }
            for (l, row_v) in nv.iter().enumerate().take(d - k + 1) {
                aders[k][l] = temp
                    .iter()
                    .zip(row_v)
                    .fold(HPoint4::ZERO, |acc, (t, &b)| acc.add(t.mul_scalar(b)));
            }
        }
        rational_surface_derivatives(&aders)
    }

    /// Area of the patch `[u1, u2] × [v1, v2]`, integrating `|Su × Sv|`.
    #[must_use]
    pub fn surface_area(&self, u1: f64, v1: f64, u2: f64, v2: f64, tol: f64) -> f64 {
        let (ua, ub) = if u1 <= u2 { (u1, u2) } else { (u2, u1) };
        let (va, vb) = if v1 <= v2 { (v1, v2) } else { (v2, v1) };
        if !(ub > ua) || !(vb > va) {
            return 0.0;
        }
        let ubreaks = quadrature::clip_breaks(&self.u.breakpoints(ua, ub), ua, ub);
        let vbreaks = quadrature::clip_breaks(&self.v.breakpoints(va, vb), va, vb);
        let mut density = |u: f64, v: f64| {
            let skl = self.derivatives_unchecked(u, v, 1);
            skl[1][0].cross(skl[0][1]).length()
        };
        quadrature::adaptive_2d(&mut density, &ubreaks, &vbreaks, tol)
    }

    /// Area of the whole surface.
    #[must_use]
    pub fn area(&self) -> f64 {
        self.surface_area(self.u1(), self.v1(), self.u2(), self.v2(), Tolerance::LOOSE.eps)
    }

    pub fn local_to_global_param(&self, t: f64, s: f64) -> Result<(f64, f64), DomainError> {
        Ok((
            param::local_to_global(self.u1(), self.u2(), t)?,
            param::local_to_global(self.v1(), self.v2(), s)?,
        ))
    }

    pub fn global_to_local_param(&self, u: f64, v: f64) -> Result<(f64, f64), DomainError> {
        Ok((
            param::global_to_local(self.u1(), self.u2(), u)?,
            param::global_to_local(self.v1(), self.v2(), v)?,
        ))
    }

    // ── iso-curves and planarity ─────────────────────────────────────────────

    /// Iso-curve at constant `u`, running along v.
    pub fn u_iso(&self, u: f64) -> Result<NurbsCurve, DomainError> {
        let u = self.u.checked(u)?;
        let p = self.p();
        let mu = self.u.unrolled_count();
        let span = self.u.span(u);
        let basis = knots::ders_basis_funs(span, u, p, 0, self.u.flat());
        let column: Vec<HPoint4> = (0..self.m())
            .map(|j| {
                basis[0].iter().enumerate().fold(HPoint4::ZERO, |acc, (r, &b)| {
                    acc.add(self.cpw[j * mu + span - p + r].mul_scalar(b))
                })
            })
            .collect();
        let (poles, weights) = param::dehomogenize(&column);
        Ok(NurbsCurve::from_parts(self.v.clone(), poles, weights))
    }

    /// Iso-curve at constant `v`, running along u.
    pub fn v_iso(&self, v: f64) -> Result<NurbsCurve, DomainError> {
        let v = self.v.checked(v)?;
        let q = self.q();
        let mu = self.u.unrolled_count();
        let span = self.v.span(v);
        let basis = knots::ders_basis_funs(span, v, q, 0, self.v.flat());
        let row: Vec<HPoint4> = (0..self.n())
            .map(|i| {
                basis[0].iter().enumerate().fold(HPoint4::ZERO, |acc, (s, &b)| {
                    acc.add(self.cpw[(span - q + s) * mu + i].mul_scalar(b))
                })
            })
            .collect();
        let (poles, weights) = param::dehomogenize(&row);
        Ok(NurbsCurve::from_parts(self.u.clone(), poles, weights))
    }

    /// `true` when every control point lies within `tol` of one plane.
    #[must_use]
    pub fn is_planar(&self, tol: f64) -> bool {
        self.as_plane(tol).is_some()
    }

    /// The plane containing the surface, if it is planar within `tol`.
    ///
    /// The plane origin is `S(u1, v1)` and its `u_axis` follows `Su` there.
    /// Non-planar surfaces return `None`.
    #[must_use]
    pub fn as_plane(&self, tol: f64) -> Option<PlaneSurface> {
        let count = self.poles.len() as f64;
        let centroid = self
            .poles
            .iter()
            .fold(Vec3::ZERO, |acc, p| acc + p.to_vec3())
            / count;
        let centroid = Point3::new(centroid.x, centroid.y, centroid.z);

        let (nu, nv) = (self.n(), self.m());
        let corner = |i: usize, j: usize| self.poles[j * nu + i];
        let diagonal = corner(nu - 1, nv - 1)
            .sub_point(corner(0, 0))
            .cross(corner(0, nv - 1).sub_point(corner(nu - 1, 0)));
        let (uc, vc) = (0.5 * (self.u1() + self.u2()), 0.5 * (self.v1() + self.v2()));
        let center_normal = self.derivatives_unchecked(uc, vc, 1);
        let center_normal = center_normal[1][0].cross(center_normal[0][1]);

        let normal = [center_normal, diagonal]
            .into_iter()
            .filter_map(Vec3::normalized)
            .find(|n| {
                self.poles
                    .iter()
                    .all(|p| p.sub_point(centroid).dot(*n).abs() <= tol)
            })?;

        let start = self.point_unchecked(self.u1(), self.v1());
        let origin = start.add_vec(normal * -start.sub_point(centroid).dot(normal));
        let su = self.derivatives_unchecked(self.u1(), self.v1(), 1)[1][0];
        let u_axis = (su - normal * su.dot(normal))
            .normalized()
            .unwrap_or_else(|| normal.any_orthogonal());
        Some(PlaneSurface::new(origin, u_axis, normal.cross(u_axis)))
    }

    // ── in-place edits ───────────────────────────────────────────────────────

    /// Reparameterize u onto `[u1, u2]`. `false` unless `u1 < u2`.
    pub fn set_udomain(&mut self, u1: f64, u2: f64) -> bool {
        if !(u1 < u2) || self.u.set_domain(u1, u2).is_err() {
            return false;
        }
        self.rebuild();
        true
    }

    /// Reparameterize v onto `[v1, v2]`. `false` unless `v1 < v2`.
    pub fn set_vdomain(&mut self, v1: f64, v2: f64) -> bool {
        if !(v1 < v2) || self.v.set_domain(v1, v2).is_err() {
            return false;
        }
        self.rebuild();
        true
    }

    /// Restrict the surface in place to `[u1, u2] × [v1, v2]`.
    ///
    /// Returns `false`, leaving the surface untouched, unless both ranges are
    /// ordered and non-empty after clamping.
    pub fn segment(&mut self, u1: f64, u2: f64, v1: f64, v2: f64) -> bool {
        if !(u1 < u2) || !(v1 < v2) {
            return false;
        }
        let mut trimmed = self.clone();
        match trimmed.segment_in_place(u1, u2, v1, v2) {
            Ok(()) => {
                *self = trimmed;
                true
            }
            Err(err) => {
                log::debug!("surface segment [{u1}, {u2}] x [{v1}, {v2}] rejected: {err}");
                false
            }
        }
    }

    fn segment_in_place(&mut self, u1: f64, u2: f64, v1: f64, v2: f64) -> Result<(), DomainError> {
        let (kv, polys) = self.u.segment(&self.u_polygons(), u1, u2)?;
        self.adopt_u(kv, &polys);
        let (kv, polys) = self.v.segment(&self.v_polygons(), v1, v2)?;
        self.adopt_v(kv, &polys);
        Ok(())
    }

    /// Raise the multiplicity of `u` to `m`, inserting it if new. Existing
    /// knots within `tol` are reused; nothing happens when the multiplicity
    /// is already at least `m`.
    pub fn insert_uknot(&mut self, u: f64, m: usize, tol: f64) -> Result<(), DomainError> {
        let times = m.saturating_sub(self.u.multiplicity_near(u, tol));
        let (kv, polys) = self.u.insert(&self.u_polygons(), u, times, tol)?;
        self.adopt_u(kv, &polys);
        Ok(())
    }

    /// v counterpart of [`insert_uknot`](Self::insert_uknot).
    pub fn insert_vknot(&mut self, v: f64, m: usize, tol: f64) -> Result<(), DomainError> {
        let times = m.saturating_sub(self.v.multiplicity_near(v, tol));
        let (kv, polys) = self.v.insert(&self.v_polygons(), v, times, tol)?;
        self.adopt_v(kv, &polys);
        Ok(())
    }

    /// Distinct u-knot indices bracketing `u`.
    #[must_use]
    pub fn locate_u(&self, u: f64, tol: f64) -> (usize, usize) {
        knots::locate(self.u.knots(), u, tol)
    }

    /// Distinct v-knot indices bracketing `v`.
    #[must_use]
    pub fn locate_v(&self, v: f64, tol: f64) -> (usize, usize) {
        knots::locate(self.v.knots(), v, tol)
    }

    /// Replace the distinct u-knot values; the count must match.
    pub fn set_uknots(&mut self, values: &[f64]) -> Result<(), DomainError> {
        self.u.set_values(values)?;
        self.rebuild();
        Ok(())
    }

    /// Replace the distinct v-knot values; the count must match.
    pub fn set_vknots(&mut self, values: &[f64]) -> Result<(), DomainError> {
        self.v.set_values(values)?;
        self.rebuild();
        Ok(())
    }

    /// Replace control point `(i, j)`, optionally with a new weight.
    pub fn set_cp(&mut self, i: usize, j: usize, cp: Point3, weight: Option<f64>) -> Result<(), DomainError> {
        let (nu, nv) = (self.n(), self.m());
        if i >= nu {
            return Err(DomainError::IndexOutOfBounds { index: i, len: nu });
        }
        if j >= nv {
            return Err(DomainError::IndexOutOfBounds { index: j, len: nv });
        }
        if let Some(w) = weight {
            check_weight(w)?;
            self.weights[j * nu + i] = w;
        }
        self.poles[j * nu + i] = cp;
        self.rebuild();
        Ok(())
    }

    /// Replace the row of control points at u index `i` (all v indices).
    pub fn set_cp_row(&mut self, i: usize, cp: &[Point3], weights: Option<&[f64]>) -> Result<(), DomainError> {
        let (nu, nv) = (self.n(), self.m());
        if i >= nu {
            return Err(DomainError::IndexOutOfBounds { index: i, len: nu });
        }
        check_line(cp, weights, nv)?;
        for (j, &point) in cp.iter().enumerate() {
            self.poles[j * nu + i] = point;
            if let Some(weights) = weights {
                self.weights[j * nu + i] = weights[j];
            }
        }
        self.rebuild();
        Ok(())
    }

    /// Replace the column of control points at v index `j` (all u indices).
    pub fn set_cp_col(&mut self, j: usize, cp: &[Point3], weights: Option<&[f64]>) -> Result<(), DomainError> {
        let (nu, nv) = (self.n(), self.m());
        if j >= nv {
            return Err(DomainError::IndexOutOfBounds { index: j, len: nv });
        }
        check_line(cp, weights, nu)?;
        for (i, &point) in cp.iter().enumerate() {
            self.poles[j * nu + i] = point;
            if let Some(weights) = weights {
                self.weights[j * nu + i] = weights[i];
            }
        }
        self.rebuild();
        Ok(())
    }

    fn boundary_closed(&self, along_u: bool) -> bool {
        let (nu, nv) = (self.n(), self.m());
        let tol = Tolerance::PROJECTION;
        if along_u {
            (0..nv).all(|j| {
                let (a, b) = (j * nu, j * nu + nu - 1);
                tol.approx_eq_point3(self.poles[a], self.poles[b])
                    && tol.approx_eq_f64(self.weights[a], self.weights[b])
            })
        } else {
            (0..nu).all(|i| {
                let (a, b) = (i, (nv - 1) * nu + i);
                tol.approx_eq_point3(self.poles[a], self.poles[b])
                    && tol.approx_eq_f64(self.weights[a], self.weights[b])
            })
        }
    }
}

impl Surface for NurbsSurface {
    fn point_at(&self, u: f64, v: f64) -> Point3 {
        self.point_unchecked(u, v)
    }

    fn domain_u(&self) -> (f64, f64) {
        (self.u1(), self.u2())
    }

    fn domain_v(&self) -> (f64, f64) {
        (self.v1(), self.v2())
    }

    fn is_u_closed(&self) -> bool {
        self.u.is_periodic() || self.boundary_closed(true)
    }

    fn is_v_closed(&self) -> bool {
        self.v.is_periodic() || self.boundary_closed(false)
    }

    fn partial_derivatives_at(&self, u: f64, v: f64) -> (Vec3, Vec3) {
        let skl = self.derivatives_unchecked(u, v, 1);
        (skl[1][0], skl[0][1])
    }
}

fn check_weight(w: f64) -> Result<(), DomainError> {
    if w.is_finite() && w > 0.0 {
        Ok(())
    } else {
        Err(DomainError::InvalidWeight { value: w })
    }
}

fn check_line(cp: &[Point3], weights: Option<&[f64]>, expected: usize) -> Result<(), DomainError> {
    if cp.len() != expected {
        return Err(DomainError::IndexOutOfBounds {
            index: cp.len(),
            len: expected,
        });
    }
    if let Some(weights) = weights {
        if weights.len() != expected {
            return Err(DomainError::IndexOutOfBounds {
                index: weights.len(),
                len: expected,
            });
        }
        weights.iter().try_for_each(|&w| check_weight(w))?;
    }
    Ok(())
}

/// Derivatives of a rational surface from those of its homogeneous form.
fn rational_surface_derivatives(aders: &[Vec<HPoint4>]) -> Vec<Vec<Vec3>> {
    let d = aders.len() - 1;
    let w00 = aders[0][0].w;
    let mut skl: Vec<Vec<Vec3>> = (0..=d).map(|k| Vec::with_capacity(d - k + 1)).collect();
    for k in 0..=d {
        for l in 0..=d - k {
            let mut v = aders[k][l].xyz();
            for j in 1..=l {
                v = v - skl[k][l - j] * (knots::binomial(l, j) * aders[0][j].w);
            }
            for i in 1..=k {
                v = v - skl[k - i][l] * (knots::binomial(k, i) * aders[i][0].w);
                let mut v2 = Vec3::ZERO;
                for j in 1..=l {
                    v2 = v2 + skl[k - i][l - j] * (knots::binomial(l, j) * aders[i][j].w);
                }
                v = v - v2 * knots::binomial(k, i);
            }
            skl[k].push(v / w00);
        }
    }
    skl
}
