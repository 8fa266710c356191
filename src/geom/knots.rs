//! Knot vector bookkeeping shared by curves and surfaces.
//!
//! Knot vectors travel in two forms: distinct values with multiplicities, and
//! the expanded ("flat") sequence used by the evaluation algorithms. Periodic
//! knot vectors describe one period and are unrolled into a flat sequence
//! before evaluation.

use super::core::{HPoint4, Tolerance};
use super::error::{ConstructionError, DomainError};

/// Expand distinct knots and multiplicities into a flat sequence.
#[must_use]
pub fn expand(knots: &[f64], mults: &[usize]) -> Vec<f64> {
    knots
        .iter()
        .zip(mults)
        .flat_map(|(&k, &m)| std::iter::repeat_n(k, m))
        .collect()
}

/// Collapse a flat sequence into distinct knots and multiplicities.
///
/// Values within `tol` of the previous distinct knot are merged into it.
#[must_use]
pub fn compress(sequence: &[f64], tol: f64) -> (Vec<f64>, Vec<usize>) {
    let mut knots: Vec<f64> = Vec::new();
    let mut mults: Vec<usize> = Vec::new();
    for &value in sequence {
        match (knots.last(), mults.last_mut()) {
            (Some(&last), Some(count)) if (value - last).abs() <= tol => *count += 1,
            _ => {
                knots.push(value);
                mults.push(1);
            }
        }
    }
    (knots, mults)
}

/// Validate distinct knots and multiplicities against a degree and pole count.
pub fn validate(
    knots: &[f64],
    mults: &[usize],
    degree: usize,
    pole_count: usize,
    periodic: bool,
) -> Result<(), ConstructionError> {
    if degree == 0 {
        return Err(ConstructionError::InvalidDegree { degree });
    }
    if knots.len() != mults.len() {
        return Err(ConstructionError::LengthMismatch {
            what: "multiplicities",
            expected: knots.len(),
            actual: mults.len(),
        });
    }
    if knots.len() < 2 {
        return Err(ConstructionError::LengthMismatch {
            what: "distinct knots",
            expected: 2,
            actual: knots.len(),
        });
    }
    if knots.iter().any(|k| !k.is_finite()) {
        return Err(ConstructionError::KnotsNotMonotone);
    }
    if knots.windows(2).any(|w| w[1] <= w[0]) {
        return Err(ConstructionError::KnotsNotDistinct);
    }

    let last = mults.len() - 1;
    for (index, &m) in mults.iter().enumerate() {
        let end = index == 0 || index == last;
        let max = if end && !periodic { degree + 1 } else { degree };
        if m == 0 || m > max {
            return Err(ConstructionError::InvalidMultiplicity {
                index,
                multiplicity: m,
                max,
            });
        }
    }

    if periodic {
        if mults[0] != mults[last] {
            return Err(ConstructionError::PeriodicEndMultiplicity {
                first: mults[0],
                last: mults[last],
            });
        }
        let expected: usize = mults[..last].iter().sum();
        if pole_count != expected {
            return Err(ConstructionError::LengthMismatch {
                what: "periodic control points",
                expected,
                actual: pole_count,
            });
        }
        if pole_count < degree + 1 {
            return Err(ConstructionError::TooFewControlPoints {
                count: pole_count,
                min: degree + 1,
            });
        }
    } else {
        if pole_count < degree + 1 {
            return Err(ConstructionError::TooFewControlPoints {
                count: pole_count,
                min: degree + 1,
            });
        }
        let total: usize = mults.iter().sum();
        if total != pole_count + degree + 1 {
            return Err(ConstructionError::LengthMismatch {
                what: "knot multiplicity sum",
                expected: pole_count + degree + 1,
                actual: total,
            });
        }
        let flat = expand(knots, mults);
        if flat[pole_count] <= flat[degree] {
            return Err(ConstructionError::KnotsNotDistinct);
        }
    }
    Ok(())
}

/// Validate a flat knot sequence for a non-periodic spline.
pub fn validate_sequence(
    sequence: &[f64],
    degree: usize,
    pole_count: usize,
) -> Result<(), ConstructionError> {
    if degree == 0 {
        return Err(ConstructionError::InvalidDegree { degree });
    }
    if sequence.len() != pole_count + degree + 1 {
        return Err(ConstructionError::LengthMismatch {
            what: "knots",
            expected: pole_count + degree + 1,
            actual: sequence.len(),
        });
    }
    if sequence.iter().any(|k| !k.is_finite()) || sequence.windows(2).any(|w| w[1] < w[0]) {
        return Err(ConstructionError::KnotsNotMonotone);
    }
    if sequence[degree + pole_count] <= sequence[degree] {
        return Err(ConstructionError::KnotsNotDistinct);
    }
    Ok(())
}

/// Unroll one period of a periodic knot vector into a flat sequence.
///
/// `periods` full periods are laid out starting at `knots[0]`, padded with
/// `degree` continued knots on either side, so the active domain of the
/// result is `[seq[degree], seq[degree + periods * N]]` where `N` is the
/// number of base control points.
#[must_use]
pub fn unroll_periodic(knots: &[f64], mults: &[usize], degree: usize, periods: usize) -> Vec<f64> {
    let last = knots.len().saturating_sub(1);
    let base = expand(&knots[..last], &mults[..last]);
    let n = base.len() as isize;
    if n == 0 {
        return Vec::new();
    }
    let period = knots[last] - knots[0];
    let p = degree as isize;
    let upper = n * periods.max(1) as isize + p;
    (-p..=upper)
        .map(|j| {
            let shift = j.div_euclid(n);
            base[j.rem_euclid(n) as usize] + shift as f64 * period
        })
        .collect()
}

/// Find the knot span index for `u`.
///
/// `last_pole` is the index of the last control point, so the active domain is
/// `[knots[degree], knots[last_pole + 1]]`. Values outside are clamped to the
/// first or last span.
#[must_use]
pub fn find_span(last_pole: usize, degree: usize, u: f64, knots: &[f64]) -> usize {
    if u >= knots[last_pole + 1] {
        let mut span = last_pole;
        while span > degree && knots[span] >= knots[last_pole + 1] {
            span -= 1;
        }
        return span;
    }
    if u <= knots[degree] {
        let mut span = degree;
        while span < last_pole && knots[span + 1] <= knots[degree] {
            span += 1;
        }
        return span;
    }

    let mut low = degree;
    let mut high = last_pole + 1;
    let mut mid = (low + high) / 2;
    while u < knots[mid] || u >= knots[mid + 1] {
        if u < knots[mid] {
            high = mid;
        } else {
            low = mid;
        }
        mid = (low + high) / 2;
    }
    mid
}

/// Nonvanishing basis functions and their derivatives up to order `n` at `u`.
///
/// Returns `ders[k][j]`, the `k`-th derivative of `N_{span-p+j, p}`. Rows above
/// the degree are zero.
#[must_use]
pub fn ders_basis_funs(span: usize, u: f64, degree: usize, n: usize, knots: &[f64]) -> Vec<Vec<f64>> {
    let p = degree;
    let mut ndu = vec![vec![0.0; p + 1]; p + 1];
    let mut left = vec![0.0; p + 1];
    let mut right = vec![0.0; p + 1];
    ndu[0][0] = 1.0;

    for j in 1..=p {
        left[j] = u - knots[span + 1 - j];
        right[j] = knots[span + j] - u;
        let mut saved = 0.0;
        for r in 0..j {
            ndu[j][r] = right[r + 1] + left[j - r];
            let temp = if ndu[j][r] == 0.0 { 0.0 } else { ndu[r][j - 1] / ndu[j][r] };
            ndu[r][j] = saved + right[r + 1] * temp;
            saved = left[j - r] * temp;
        }
        ndu[j][j] = saved;
    }

    let mut ders = vec![vec![0.0; p + 1]; n + 1];
    for j in 0..=p {
        ders[0][j] = ndu[j][p];
    }

    let top = n.min(p);
    let mut a = vec![vec![0.0; p + 1]; 2];
    for r in 0..=p {
        let (mut s1, mut s2) = (0usize, 1usize);
        a[0][0] = 1.0;
        for k in 1..=top {
            let mut d = 0.0;
            let rk = r as isize - k as isize;
            let pk = p - k;
            if r >= k {
                let denom = ndu[pk + 1][rk as usize];
                a[s2][0] = if denom == 0.0 { 0.0 } else { a[s1][0] / denom };
                d = a[s2][0] * ndu[rk as usize][pk];
            }
            let j1 = if rk >= -1 { 1 } else { (-rk) as usize };
            let j2 = if r as isize - 1 <= pk as isize { k - 1 } else { p - r };
            for j in j1..=j2 {
                let idx = (rk + j as isize) as usize;
                let denom = ndu[pk + 1][idx];
                a[s2][j] = if denom == 0.0 { 0.0 } else { (a[s1][j] - a[s1][j - 1]) / denom };
                d += a[s2][j] * ndu[idx][pk];
            }
            if r <= pk {
                let denom = ndu[pk + 1][r];
                a[s2][k] = if denom == 0.0 { 0.0 } else { -a[s1][k - 1] / denom };
                d += a[s2][k] * ndu[r][pk];
            }
            ders[k][r] = d;
            std::mem::swap(&mut s1, &mut s2);
        }
    }

    let mut factor = p as f64;
    for k in 1..=top {
        for value in &mut ders[k] {
            *value *= factor;
        }
        factor *= (p - k) as f64;
    }
    ders
}

/// Binomial coefficient as a float.
#[must_use]
pub fn binomial(n: usize, k: usize) -> f64 {
    if k > n {
        return 0.0;
    }
    let k = k.min(n - k);
    (0..k).fold(1.0, |acc, i| acc * (n - i) as f64 / (i + 1) as f64)
}

/// Snap `u` onto an existing knot when it lies within `tol` of one.
#[must_use]
pub fn snap_to_knot(u: f64, sequence: &[f64], tol: f64) -> f64 {
    sequence
        .iter()
        .copied()
        .find(|k| (k - u).abs() <= tol)
        .unwrap_or(u)
}

/// Number of entries of `sequence` exactly equal to `u`.
#[must_use]
pub fn multiplicity(sequence: &[f64], u: f64) -> usize {
    sequence.iter().filter(|&&k| k == u).count()
}

/// Insertion span for `u`: the last index `k` with `sequence[k] <= u` (capped
/// so that `sequence[k + 1]` exists) and the count `s` of knots equal to `u`
/// ending at `k`.
#[must_use]
pub fn insertion_span(sequence: &[f64], u: f64) -> (usize, usize) {
    let upper = sequence.partition_point(|&k| k <= u);
    let k = upper.saturating_sub(1).min(sequence.len().saturating_sub(2));
    let s = sequence[..=k].iter().rev().take_while(|&&v| v == u).count();
    (k, s)
}

/// Insert `u` into a homogeneous control polygon `times` times.
///
/// The curve shape is unchanged. `u` must lie inside the active domain and the
/// resulting multiplicity may not exceed `degree`.
pub fn insert_knot(
    degree: usize,
    sequence: &[f64],
    poles: &[HPoint4],
    u: f64,
    times: usize,
) -> Result<(Vec<f64>, Vec<HPoint4>), DomainError> {
    let p = degree;
    let np = poles.len() - 1;
    let (lo, hi) = (sequence[p], sequence[np + 1]);
    if u < lo || u > hi {
        return Err(DomainError::OutOfDomain { param: u, lo, hi });
    }
    if times == 0 {
        return Ok((sequence.to_vec(), poles.to_vec()));
    }

    let (k, s) = insertion_span(sequence, u);
    if s + times > p {
        return Err(DomainError::MultiplicityTooHigh {
            multiplicity: s + times,
            degree: p,
        });
    }
    let r = times;

    let mut knots = Vec::with_capacity(sequence.len() + r);
    knots.extend_from_slice(&sequence[..=k]);
    knots.extend(std::iter::repeat_n(u, r));
    knots.extend_from_slice(&sequence[k + 1..]);

    let mut q = vec![HPoint4::ZERO; np + 1 + r];
    q[..=k - p].copy_from_slice(&poles[..=k - p]);
    for i in k - s..=np {
        q[i + r] = poles[i];
    }

    let mut temp: Vec<HPoint4> = poles[k - p..=k - s].to_vec();
    let mut l = k - p;
    for j in 1..=r {
        l = k - p + j;
        for i in 0..=p - j - s {
            let denom = sequence[i + k + 1] - sequence[l + i];
            let alpha = if denom == 0.0 { 0.0 } else { (u - sequence[l + i]) / denom };
            temp[i] = temp[i].lerp(temp[i + 1], alpha);
        }
        q[l] = temp[0];
        q[k + r - j - s] = temp[p - j - s];
    }
    for i in l + 1..k - s {
        q[i] = temp[i - l];
    }

    Ok((knots, q))
}

/// Restrict a homogeneous control polygon to `[u1, u2]`.
///
/// Both ends are raised to multiplicity `degree` by knot insertion, then the
/// poles between them are extracted and the knot vector is clamped at the new
/// ends. Both parameters must lie inside the active domain with `u1 < u2`.
pub fn extract_segment(
    degree: usize,
    sequence: &[f64],
    poles: &[HPoint4],
    u1: f64,
    u2: f64,
) -> Result<(Vec<f64>, Vec<HPoint4>), DomainError> {
    if !(u1 < u2) {
        return Err(DomainError::InvertedRange { u1, u2 });
    }
    let p = degree;

    let (_, s1) = insertion_span(sequence, u1);
    let (seq, poles) = insert_knot(p, sequence, poles, u1, p.saturating_sub(s1))?;
    let (_, s2) = insertion_span(&seq, u2);
    let (seq, poles) = insert_knot(p, &seq, &poles, u2, p.saturating_sub(s2))?;

    // C(u1) = P[e1 - p] and C(u2) = P[s2 - 1] once both have multiplicity p.
    let e1 = seq.partition_point(|&k| k <= u1) - 1;
    let s2 = seq.partition_point(|&k| k < u2);

    let mut knots = Vec::with_capacity(s2 - e1 + 2 * p + 1);
    knots.extend(std::iter::repeat_n(u1, p + 1));
    knots.extend_from_slice(&seq[e1 + 1..s2]);
    knots.extend(std::iter::repeat_n(u2, p + 1));

    Ok((knots, poles[e1 - p..s2].to_vec()))
}

/// De Boor's algorithm on the `degree + 1` homogeneous poles of `span`.
///
/// On return `d[degree]` holds the curve point at `u`.
pub fn de_boor(d: &mut [HPoint4], span: usize, degree: usize, u: f64, knots: &[f64]) {
    let p = degree;
    for r in 1..=p {
        for j in (r..=p).rev() {
            let i = span - p + j;
            let denom = knots[i + p + 1 - r] - knots[i];
            let alpha = if denom == 0.0 { 0.0 } else { (u - knots[i]) / denom };
            d[j] = d[j - 1].lerp(d[j], alpha);
        }
    }
}

/// Locate the distinct-knot interval containing `u`.
///
/// Returns `(i1, i2)` where `knots[i1] <= u <= knots[i2]`. When `u` coincides
/// with a knot within `tol`, both indices equal that knot's index. Values
/// outside the knot range return the nearest end twice.
#[must_use]
pub fn locate(knots: &[f64], u: f64, tol: f64) -> (usize, usize) {
    if let Some(i) = knots.iter().position(|&k| (k - u).abs() <= tol) {
        return (i, i);
    }
    let upper = knots.partition_point(|&k| k < u);
    if upper == 0 {
        (0, 0)
    } else if upper >= knots.len() {
        let last = knots.len() - 1;
        (last, last)
    } else {
        (upper - 1, upper)
    }
}

/// One parametric direction of a spline: degree, distinct knots with
/// multiplicities, and periodicity.
///
/// Non-periodic knot vectors produced by this type are clamped. Edits that
/// change the pole layout (`segment`, `insert`) take the base control
/// polygons along this direction and return the rewritten polygons together
/// with the new knot vector.
#[derive(Debug, Clone, PartialEq)]
pub struct KnotVector {
    degree: usize,
    knots: Vec<f64>,
    mults: Vec<usize>,
    periodic: bool,
    flat: Vec<f64>,
}

impl KnotVector {
    pub fn new(
        knots: Vec<f64>,
        mults: Vec<usize>,
        degree: usize,
        periodic: bool,
        pole_count: usize,
    ) -> Result<Self, ConstructionError> {
        validate(&knots, &mults, degree, pole_count, periodic)?;
        Ok(Self::from_parts(degree, knots, mults, periodic))
    }

    fn from_parts(degree: usize, knots: Vec<f64>, mults: Vec<usize>, periodic: bool) -> Self {
        let flat = if periodic {
            unroll_periodic(&knots, &mults, degree, 1)
        } else {
            expand(&knots, &mults)
        };
        Self {
            degree,
            knots,
            mults,
            periodic,
            flat,
        }
    }

    /// Non-periodic knot vector from an exact flat sequence.
    #[must_use]
    pub fn from_flat(degree: usize, sequence: &[f64]) -> Self {
        let (knots, mults) = compress(sequence, 0.0);
        Self::from_parts(degree, knots, mults, false)
    }

    #[must_use]
    pub const fn degree(&self) -> usize {
        self.degree
    }

    #[must_use]
    pub fn knots(&self) -> &[f64] {
        &self.knots
    }

    #[must_use]
    pub fn mults(&self) -> &[usize] {
        &self.mults
    }

    #[must_use]
    pub const fn is_periodic(&self) -> bool {
        self.periodic
    }

    /// Flat sequence used for evaluation, unrolled by one period when
    /// periodic.
    #[must_use]
    pub fn flat(&self) -> &[f64] {
        &self.flat
    }

    /// Flat sequence of the stored knots, one period when periodic.
    #[must_use]
    pub fn sequence(&self) -> Vec<f64> {
        expand(&self.knots, &self.mults)
    }

    /// Number of base control points along this direction.
    #[must_use]
    pub fn pole_count(&self) -> usize {
        let total: usize = self.mults.iter().sum();
        if self.periodic {
            total - self.mults[self.mults.len() - 1]
        } else {
            total - self.degree - 1
        }
    }

    /// Number of poles in the evaluation form.
    #[must_use]
    pub fn unrolled_count(&self) -> usize {
        self.flat.len() - self.degree - 1
    }

    #[must_use]
    pub fn lo(&self) -> f64 {
        self.flat[self.degree]
    }

    #[must_use]
    pub fn hi(&self) -> f64 {
        self.flat[self.unrolled_count()]
    }

    #[must_use]
    pub fn is_clamped(&self) -> bool {
        let ends = self.degree + 1;
        self.mults.first() == Some(&ends) && self.mults.last() == Some(&ends)
    }

    /// Wrap (periodic) or clamp `u` into the domain.
    #[must_use]
    pub fn normalize(&self, u: f64) -> f64 {
        if self.periodic {
            super::param::wrap(u, self.lo(), self.hi())
        } else {
            u.clamp(self.lo(), self.hi())
        }
    }

    /// Like [`normalize`](Self::normalize) but rejects non-periodic
    /// parameters further than [`Tolerance::PARAMETER`] outside the domain.
    pub fn checked(&self, u: f64) -> Result<f64, DomainError> {
        let (lo, hi) = (self.lo(), self.hi());
        if !u.is_finite() {
            return Err(DomainError::OutOfDomain { param: u, lo, hi });
        }
        if !self.periodic {
            let tol = Tolerance::PARAMETER.eps;
            if u < lo - tol || u > hi + tol {
                return Err(DomainError::OutOfDomain { param: u, lo, hi });
            }
        }
        Ok(self.normalize(u))
    }

    /// Span index of `u` in the evaluation form.
    #[must_use]
    pub fn span(&self, u: f64) -> usize {
        find_span(self.unrolled_count() - 1, self.degree, u, &self.flat)
    }

    /// Affinely move the domain onto `[u1, u2]`.
    pub fn set_domain(&mut self, u1: f64, u2: f64) -> Result<(), DomainError> {
        let mut knots = self.knots.clone();
        super::param::reparameterize_knots(u1, u2, &mut knots)?;
        *self = Self::from_parts(self.degree, knots, self.mults.clone(), self.periodic);
        Ok(())
    }

    /// Knot vector of the reversed parameterization over the same domain.
    #[must_use]
    pub fn reversed(&self) -> Self {
        let (a, b) = (self.lo(), self.hi());
        let mut knots: Vec<f64> = self.knots.iter().rev().map(|k| a + b - k).collect();
        let last = knots.len() - 1;
        knots[0] = a;
        knots[last] = b;
        let mut mults = self.mults.clone();
        mults.reverse();
        Self::from_parts(self.degree, knots, mults, self.periodic)
    }

    /// Reorder base poles to match [`reversed`](Self::reversed).
    #[must_use]
    pub fn reverse_poles<T: Copy>(&self, base: &[T]) -> Vec<T> {
        if !self.periodic {
            return base.iter().rev().copied().collect();
        }
        // Pole i supports flat knots i-p..i+1; reflecting the period maps it
        // to index n + m0 + p - 2 - i.
        let n = base.len();
        let offset = n + self.mults[0] + self.degree - 2;
        (0..n).map(|j| base[(offset - j) % n]).collect()
    }

    /// Base polygon extended by the wrapped poles of `periods` periods.
    #[must_use]
    pub fn unroll_polygon<T: Copy>(&self, base: &[T], periods: usize) -> Vec<T> {
        if !self.periodic {
            return base.to_vec();
        }
        let n = base.len();
        (0..n * periods.max(1) + self.degree).map(|i| base[i % n]).collect()
    }

    /// Sorted distinct knots covering `[a, b]`, continued across periods.
    #[must_use]
    pub fn breakpoints(&self, a: f64, b: f64) -> Vec<f64> {
        if !self.periodic {
            return self.knots.clone();
        }
        let (lo, hi) = (self.lo(), self.hi());
        let period = hi - lo;
        let first = ((a - lo) / period).floor() as i64;
        let last = ((b - lo) / period).ceil() as i64;
        let interior = &self.knots[..self.knots.len() - 1];
        (first..=last)
            .flat_map(|m| interior.iter().map(move |k| k + m as f64 * period))
            .collect()
    }

    /// Restrict every base polygon to `[u1, u2]`.
    ///
    /// Non-periodic ranges are clamped to the domain. Periodic ranges are
    /// shifted into the first period and may cross the seam, up to one full
    /// period; the result is never periodic.
    pub fn segment(
        &self,
        polygons: &[Vec<HPoint4>],
        u1: f64,
        u2: f64,
    ) -> Result<(Self, Vec<Vec<HPoint4>>), DomainError> {
        if !(u1 < u2) {
            return Err(DomainError::InvertedRange { u1, u2 });
        }
        let p = self.degree;
        let tol = Tolerance::PARAMETER.eps;

        let (seq, polys, lo, hi) = if self.periodic {
            let (a, b) = (self.lo(), self.hi());
            let period = b - a;
            let shift = ((u1 - a) / period).floor() * period;
            let s1 = (u1 - shift).max(a);
            let s2 = (u2 - shift).min(s1 + period);
            let periods = (((s2 - a) / period).ceil() as usize).max(1);
            let seq = unroll_periodic(&self.knots, &self.mults, p, periods);
            let polys: Vec<Vec<HPoint4>> = polygons
                .iter()
                .map(|base| self.unroll_polygon(base, periods))
                .collect();
            let end = seq[seq.len() - p - 1];
            (seq, polys, s1, s2.min(end))
        } else {
            (
                self.flat.clone(),
                polygons.to_vec(),
                u1.max(self.lo()),
                u2.min(self.hi()),
            )
        };

        let lo = snap_to_knot(lo, &seq, tol);
        let hi = snap_to_knot(hi, &seq, tol);
        if !(lo < hi) {
            return Err(DomainError::DegenerateRange { u1: lo, u2: hi });
        }

        let mut flat = None;
        let mut out = Vec::with_capacity(polys.len());
        for poly in &polys {
            let (k, q) = extract_segment(p, &seq, poly, lo, hi)?;
            flat = Some(k);
            out.push(q);
        }
        let flat = flat.ok_or(DomainError::DegenerateRange { u1: lo, u2: hi })?;
        Ok((Self::from_flat(p, &flat), out))
    }

    /// Insert `u` `times` times into every base polygon without changing the
    /// shape. `u` is snapped to an existing knot within `tol`.
    pub fn insert(
        &self,
        polygons: &[Vec<HPoint4>],
        u: f64,
        times: usize,
        tol: f64,
    ) -> Result<(Self, Vec<Vec<HPoint4>>), DomainError> {
        if times == 0 {
            return Ok((self.clone(), polygons.to_vec()));
        }
        let p = self.degree;

        if !self.periodic {
            let u = snap_to_knot(self.checked(u)?, &self.flat, tol);
            let mut seq = None;
            let mut out = Vec::with_capacity(polygons.len());
            for poly in polygons {
                let (k, q) = insert_knot(p, &self.flat, poly, u, times)?;
                seq = Some(k);
                out.push(q);
            }
            let kv = seq.map_or_else(|| self.clone(), |k| Self::from_flat(p, &k));
            return Ok((kv, out));
        }

        // Insert at u and one period later on a two-period unroll; the first
        // N + times poles are then the new periodic poles.
        let (a, b) = (self.lo(), self.hi());
        let period = b - a;
        let mut u = snap_to_knot(super::param::wrap(u, a, b), &self.knots, tol);
        if u == b {
            u = a;
        }
        let n = self.pole_count();
        let seq = unroll_periodic(&self.knots, &self.mults, p, 2);
        let mut out = Vec::with_capacity(polygons.len());
        for base in polygons {
            let poly = self.unroll_polygon(base, 2);
            let (seq1, poly) = insert_knot(p, &seq, &poly, u, times)?;
            let (_, poly) = insert_knot(p, &seq1, &poly, u + period, times)?;
            out.push(poly[..n + times].to_vec());
        }

        let mut knots = self.knots.clone();
        let mut mults = self.mults.clone();
        match knots.iter().position(|&k| k == u) {
            Some(0) => {
                let last = mults.len() - 1;
                mults[0] += times;
                mults[last] += times;
            }
            Some(i) => mults[i] += times,
            None => {
                let at = knots.partition_point(|&k| k < u);
                knots.insert(at, u);
                mults.insert(at, times);
            }
        }
        Ok((Self::from_parts(p, knots, mults, true), out))
    }

    /// Multiplicity of the distinct knot within `tol` of `u`, or 0.
    #[must_use]
    pub fn multiplicity_near(&self, u: f64, tol: f64) -> usize {
        let u = if self.periodic { self.normalize(u) } else { u };
        self.knots
            .iter()
            .position(|k| (k - u).abs() <= tol)
            .map_or(0, |i| self.mults[i])
    }

    /// Replace the distinct knot values, keeping multiplicities.
    pub fn set_values(&mut self, values: &[f64]) -> Result<(), DomainError> {
        if values.len() != self.knots.len() {
            return Err(DomainError::KnotCountMismatch {
                expected: self.knots.len(),
                actual: values.len(),
            });
        }
        if values.iter().any(|v| !v.is_finite()) || values.windows(2).any(|w| w[1] <= w[0]) {
            return Err(DomainError::KnotsNotIncreasing);
        }
        *self = Self::from_parts(self.degree, values.to_vec(), self.mults.clone(), self.periodic);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expand_and_compress_round_trip() {
        let flat = expand(&[0.0, 0.5, 1.0], &[3, 1, 3]);
        assert_eq!(flat, vec![0.0, 0.0, 0.0, 0.5, 1.0, 1.0, 1.0]);
        let (k, m) = compress(&flat, 1e-12);
        assert_eq!(k, vec![0.0, 0.5, 1.0]);
        assert_eq!(m, vec![3, 1, 3]);
    }

    #[test]
    fn validate_rejects_bad_sums() {
        assert!(validate(&[0.0, 1.0], &[2, 2], 1, 2, false).is_ok());
        assert!(matches!(
            validate(&[0.0, 1.0], &[2, 2], 1, 3, false),
            Err(ConstructionError::LengthMismatch { .. })
        ));
        assert!(matches!(
            validate(&[0.0, 0.5, 1.0], &[2, 2, 2], 1, 3, false),
            Err(ConstructionError::InvalidMultiplicity { index: 1, .. })
        ));
        assert!(matches!(
            validate(&[0.0, 2.0, 1.0], &[2, 1, 2], 1, 3, false),
            Err(ConstructionError::KnotsNotDistinct)
        ));
    }

    #[test]
    fn validate_periodic() {
        let knots = [0.0, 1.0, 2.0, 3.0, 4.0];
        assert!(validate(&knots, &[1, 1, 1, 1, 1], 3, 4, true).is_ok());
        assert!(matches!(
            validate(&knots, &[1, 1, 1, 1, 2], 3, 4, true),
            Err(ConstructionError::PeriodicEndMultiplicity { .. })
        ));
    }

    #[test]
    fn unrolled_periodic_sequence_is_continued() {
        let seq = unroll_periodic(&[0.0, 1.0, 2.0, 3.0, 4.0], &[1, 1, 1, 1, 1], 3, 1);
        assert_eq!(seq, (-3..=7).map(f64::from).collect::<Vec<_>>());
    }

    #[test]
    fn find_span_handles_ends_and_interior() {
        let knots = [0.0, 0.0, 0.0, 1.0, 2.0, 3.0, 3.0, 3.0];
        assert_eq!(find_span(4, 2, 0.0, &knots), 2);
        assert_eq!(find_span(4, 2, 1.5, &knots), 3);
        assert_eq!(find_span(4, 2, 3.0, &knots), 4);
    }

    #[test]
    fn basis_functions_partition_unity() {
        let knots = [0.0, 0.0, 0.0, 1.0, 2.0, 3.0, 4.0, 4.0, 5.0, 5.0, 5.0];
        let u = 2.5;
        let span = find_span(7, 2, u, &knots);
        let ders = ders_basis_funs(span, u, 2, 2, &knots);
        let sum: f64 = ders[0].iter().sum();
        assert!((sum - 1.0).abs() < 1e-12);
        assert!((ders[0][0] - 0.125).abs() < 1e-12);
        assert!((ders[0][1] - 0.75).abs() < 1e-12);
        assert!((ders[0][2] - 0.125).abs() < 1e-12);
        let dsum: f64 = ders[1].iter().sum();
        assert!(dsum.abs() < 1e-12);
        assert!((ders[1][0] + 0.5).abs() < 1e-12);
        assert!((ders[1][2] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn insert_knot_keeps_polygon_on_degree_one() {
        let knots = [0.0, 0.0, 1.0, 1.0];
        let poles = [HPoint4::new(0.0, 0.0, 0.0, 1.0), HPoint4::new(2.0, 0.0, 0.0, 1.0)];
        let (k, q) = insert_knot(1, &knots, &poles, 0.25, 1).expect("insert");
        assert_eq!(k, vec![0.0, 0.0, 0.25, 1.0, 1.0]);
        assert_eq!(q.len(), 3);
        assert!((q[1].x - 0.5).abs() < 1e-12);
    }

    #[test]
    fn insert_knot_rejects_excess_multiplicity() {
        let knots = [0.0, 0.0, 0.0, 0.5, 1.0, 1.0, 1.0];
        let poles = vec![HPoint4::new(0.0, 0.0, 0.0, 1.0); 4];
        assert!(matches!(
            insert_knot(2, &knots, &poles, 0.5, 2),
            Err(DomainError::MultiplicityTooHigh { .. })
        ));
        assert!(insert_knot(2, &knots, &poles, 2.0, 1).is_err());
    }

    #[test]
    fn extract_segment_clamps_new_ends() {
        let knots = [0.0, 0.0, 0.0, 1.0, 2.0, 2.0, 2.0];
        let poles = [
            HPoint4::new(0.0, 0.0, 0.0, 1.0),
            HPoint4::new(1.0, 2.0, 0.0, 1.0),
            HPoint4::new(3.0, 2.0, 0.0, 1.0),
            HPoint4::new(4.0, 0.0, 0.0, 1.0),
        ];
        let (k, q) = extract_segment(2, &knots, &poles, 0.5, 1.5).expect("segment");
        assert_eq!(k, vec![0.5, 0.5, 0.5, 1.0, 1.5, 1.5, 1.5]);
        assert_eq!(q.len(), 4);
        assert_eq!(k.len(), q.len() + 3);
    }

    #[test]
    fn knot_vector_counts_and_domain() {
        let kv = KnotVector::new(vec![0.0, 1.0, 2.0], vec![3, 1, 3], 2, false, 4).expect("valid");
        assert_eq!(kv.pole_count(), 4);
        assert_eq!(kv.unrolled_count(), 4);
        assert_eq!((kv.lo(), kv.hi()), (0.0, 2.0));
        assert!(kv.is_clamped());
        assert!(kv.checked(2.5).is_err());

        let periodic =
            KnotVector::new(vec![0.0, 1.0, 2.0, 3.0], vec![1, 1, 1, 1], 2, true, 3).expect("valid");
        assert_eq!(periodic.pole_count(), 3);
        assert_eq!(periodic.unrolled_count(), 5);
        assert_eq!((periodic.lo(), periodic.hi()), (0.0, 3.0));
        assert_eq!(periodic.checked(4.0), Ok(1.0));
    }

    #[test]
    fn set_values_requires_matching_count() {
        let mut kv = KnotVector::new(vec![0.0, 1.0], vec![2, 2], 1, false, 2).expect("valid");
        assert!(matches!(
            kv.set_values(&[0.0, 0.5, 1.0]),
            Err(DomainError::KnotCountMismatch { .. })
        ));
        assert_eq!(kv.set_values(&[1.0, 0.0]), Err(DomainError::KnotsNotIncreasing));
        kv.set_values(&[2.0, 4.0]).expect("valid values");
        assert_eq!(kv.flat(), &[2.0, 2.0, 4.0, 4.0]);
    }

    #[test]
    fn locate_reports_bracketing_knots() {
        let knots = [0.0, 1.0, 2.0];
        assert_eq!(locate(&knots, 1.0, 1e-10), (1, 1));
        assert_eq!(locate(&knots, 1.5, 1e-10), (1, 2));
        assert_eq!(locate(&knots, -1.0, 1e-10), (0, 0));
        assert_eq!(locate(&knots, 3.0, 1e-10), (2, 2));
    }

    #[test]
    fn binomial_values() {
        assert_eq!(binomial(4, 2), 6.0);
        assert_eq!(binomial(5, 0), 1.0);
        assert_eq!(binomial(2, 3), 0.0);
    }
}
