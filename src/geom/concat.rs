//! Degree elevation and C0 joining of NURBS curves.
//!
//! Curves are elevated by splitting them into Bézier pieces, raising each
//! piece and re-assembling; interior knots come back with full multiplicity,
//! so the result is exact but only C0 at old knots. Joining lines up the
//! chain end to end, reverses pieces that arrive backwards and snaps gaps up
//! to the tolerance onto a shared pole.

use super::core::{HPoint4, Point3, Tolerance};
use super::error::{ConcatError, DomainError};
use super::knots;
use super::nurbs_curve::NurbsCurve;
use super::param;

/// Non-periodic copy of `curve` over its full domain.
fn clamped(curve: &NurbsCurve) -> Result<NurbsCurve, ConcatError> {
    if !curve.is_periodic() {
        return Ok(curve.clone());
    }
    let (u1, u2) = (curve.u1(), curve.u2());
    let mut open = curve.clone();
    if open.segment(u1, u2) {
        Ok(open)
    } else {
        Err(DomainError::DegenerateRange { u1, u2 }.into())
    }
}

/// Raise `curve` to `degree` without changing its shape.
///
/// Curves already at or above `degree` are returned unchanged apart from
/// periodic ones, which always come back clamped.
pub fn elevate_degree(curve: &NurbsCurve, degree: usize) -> Result<NurbsCurve, ConcatError> {
    let curve = clamped(curve)?;
    let p = curve.p();
    if degree <= p {
        return Ok(curve);
    }
    let t = degree - p;

    // Bézier decomposition: every interior knot to multiplicity p.
    let mut seq = curve.uk();
    let mut poles = curve.cpw();
    let distinct = curve.knots().to_vec();
    let mults = curve.mult().to_vec();
    for (&u, &m) in distinct.iter().zip(&mults).skip(1).take(distinct.len().saturating_sub(2)) {
        if m < p {
            let (s, q) = knots::insert_knot(p, &seq, &poles, u, p - m)?;
            seq = s;
            poles = q;
        }
    }

    let pieces = distinct.len() - 1;
    let mut elevated: Vec<HPoint4> = Vec::with_capacity(pieces * degree + 1);
    for piece in 0..pieces {
        let bezier = &poles[piece * p..=piece * p + p];
        let raised = elevate_bezier(bezier, t);
        let skip = usize::from(piece > 0);
        elevated.extend_from_slice(&raised[skip..]);
    }

    let mut new_mults = vec![degree; distinct.len()];
    new_mults[0] = degree + 1;
    new_mults[pieces] = degree + 1;
    let (cp, weights) = param::dehomogenize(&elevated);
    Ok(NurbsCurve::by_data(cp, distinct, new_mults, degree, Some(weights), false)?)
}

/// Raise a homogeneous Bézier polygon by `t` degrees.
fn elevate_bezier(poles: &[HPoint4], t: usize) -> Vec<HPoint4> {
    let p = poles.len() - 1;
    (0..=p + t)
        .map(|i| {
            let lo = i.saturating_sub(t);
            let hi = p.min(i);
            let denom = knots::binomial(p + t, i);
            (lo..=hi).fold(HPoint4::ZERO, |acc, j| {
                let coef = knots::binomial(p, j) * knots::binomial(t, i - j) / denom;
                acc.add(poles[j].mul_scalar(coef))
            })
        })
        .collect()
}

/// Join `curves` end to end into a single curve.
///
/// The chain follows the input order. The first curve is reversed when its
/// start, rather than its end, meets the second; each later curve is reversed
/// when its end meets the chain. Gaps up to `tol` are closed by merging the
/// two end poles. Degrees are raised to the highest in the chain and each
/// piece keeps its own parameter length, shifted to start where the previous
/// one ended.
pub fn concatenate_curves(curves: &[NurbsCurve], tol: f64) -> Result<NurbsCurve, ConcatError> {
    let Some(first) = curves.first() else {
        return Err(ConcatError::Empty);
    };
    if curves.len() == 1 {
        return Ok(first.clone());
    }

    let degree = curves.iter().map(NurbsCurve::p).max().unwrap_or(1);
    let mut chain: Vec<NurbsCurve> = Vec::with_capacity(curves.len());

    let mut head = elevate_degree(first, degree)?;
    let next = &curves[1];
    let to_next = |p: Point3| p.distance_to(next.p1()).min(p.distance_to(next.p2()));
    if to_next(head.p1()) < to_next(head.p2()) {
        head.reverse();
    }
    chain.push(head);

    for (index, curve) in curves.iter().enumerate().skip(1) {
        let end = chain[chain.len() - 1].p2();
        let mut piece = elevate_degree(curve, degree)?;
        let (to_start, to_end) = (end.distance_to(piece.p1()), end.distance_to(piece.p2()));
        if to_end < to_start {
            piece.reverse();
        }
        let distance = to_start.min(to_end);
        if distance > tol {
            return Err(ConcatError::Gap {
                index,
                distance,
                tolerance: tol,
            });
        }
        if distance > Tolerance::DEFAULT.eps {
            log::warn!("snapping {distance:e} gap before curve {index}");
        }
        chain.push(piece);
    }

    let mut iter = chain.into_iter();
    let Some(first) = iter.next() else {
        return Err(ConcatError::Empty);
    };
    let mut seq = first.uk();
    let mut poles = first.cpw();
    for piece in iter {
        let shift = seq[seq.len() - 1] - piece.u1();
        let mut piece_poles = piece.cpw();
        let last = poles.len() - 1;
        let scale = poles[last].w / piece_poles[0].w;
        for pole in &mut piece_poles {
            *pole = pole.mul_scalar(scale);
        }
        poles[last] = poles[last].lerp(piece_poles[0], 0.5);
        poles.extend_from_slice(&piece_poles[1..]);

        seq.pop();
        seq.extend(piece.uk().iter().skip(degree + 1).map(|k| k + shift));
    }

    let (cp, weights) = param::dehomogenize(&poles);
    Ok(NurbsCurve::from_knot_sequence(degree, cp, &seq, Some(weights))?)
}
