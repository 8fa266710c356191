//! Numerical integration for arc length and surface area.

/// Five-point Gauss–Legendre nodes on `[-1, 1]`.
const GL5_NODES: [f64; 5] = [
    -0.906_179_845_938_664,
    -0.538_469_310_105_683_1,
    0.0,
    0.538_469_310_105_683_1,
    0.906_179_845_938_664,
];

const GL5_WEIGHTS: [f64; 5] = [
    0.236_926_885_056_189_1,
    0.478_628_670_499_366_5,
    0.568_888_888_888_888_9,
    0.478_628_670_499_366_5,
    0.236_926_885_056_189_1,
];

/// Deepest bisection level for the adaptive rules.
const MAX_DEPTH: usize = 24;

/// Fixed five-point Gauss–Legendre rule over `[a, b]`.
pub fn gauss_legendre<F: FnMut(f64) -> f64>(f: &mut F, a: f64, b: f64) -> f64 {
    let half = 0.5 * (b - a);
    let mid = 0.5 * (a + b);
    GL5_NODES
        .iter()
        .zip(GL5_WEIGHTS.iter())
        .map(|(&x, &w)| w * f(mid + half * x))
        .sum::<f64>()
        * half
}

/// Adaptive Gauss–Legendre integration over `[a, b]`.
///
/// Intervals are bisected until the two halves agree with the whole to within
/// `tol`. A non-positive tolerance falls back to a small default.
pub fn adaptive<F: FnMut(f64) -> f64>(f: &mut F, a: f64, b: f64, tol: f64) -> f64 {
    if a == b {
        return 0.0;
    }
    let tol = if tol > 0.0 { tol } else { 1e-9 };
    let whole = gauss_legendre(f, a, b);
    refine(f, a, b, whole, tol, 0)
}

fn refine<F: FnMut(f64) -> f64>(f: &mut F, a: f64, b: f64, whole: f64, tol: f64, depth: usize) -> f64 {
    let mid = 0.5 * (a + b);
    let left = gauss_legendre(f, a, mid);
    let right = gauss_legendre(f, mid, b);
    let split = left + right;
    if depth >= MAX_DEPTH || (split - whole).abs() <= tol {
        return split;
    }
    refine(f, a, mid, left, 0.5 * tol, depth + 1) + refine(f, mid, b, right, 0.5 * tol, depth + 1)
}

/// Adaptive integration over consecutive breakpoints, e.g. the distinct knots
/// of a spline, so that each piece is smooth.
pub fn adaptive_over<F: FnMut(f64) -> f64>(f: &mut F, breaks: &[f64], tol: f64) -> f64 {
    let pieces = breaks.len().saturating_sub(1).max(1) as f64;
    breaks
        .windows(2)
        .filter(|w| w[1] > w[0])
        .map(|w| adaptive(f, w[0], w[1], tol / pieces))
        .sum()
}

/// Nested adaptive integration of `f(u, v)` over a rectangle split at the
/// given breakpoints in each direction.
pub fn adaptive_2d<F: FnMut(f64, f64) -> f64>(
    f: &mut F,
    ubreaks: &[f64],
    vbreaks: &[f64],
    tol: f64,
) -> f64 {
    let mut outer = |u: f64| {
        let mut inner = |v: f64| f(u, v);
        adaptive_over(&mut inner, vbreaks, tol)
    };
    adaptive_over(&mut outer, ubreaks, tol)
}

/// Restrict sorted breakpoints to `[lo, hi]`, keeping both ends.
#[must_use]
pub fn clip_breaks(breaks: &[f64], lo: f64, hi: f64) -> Vec<f64> {
    let mut out = vec![lo];
    out.extend(breaks.iter().copied().filter(|&b| b > lo && b < hi));
    out.push(hi);
    out
}
