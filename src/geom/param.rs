//! Parameter mapping, knot reparameterization and homogeneous packing.

use super::core::{HPoint4, Point3};
use super::error::DomainError;

/// Map a global parameter `u` in `[u1, u2]` to the local domain `[0, 1]`.
pub fn global_to_local(u1: f64, u2: f64, u: f64) -> Result<f64, DomainError> {
    let span = u2 - u1;
    if span == 0.0 {
        return Err(DomainError::DegenerateRange { u1, u2 });
    }
    Ok((u - u1) / span)
}

/// Map a local parameter `t` in `[0, 1]` to the global domain `[u1, u2]`.
pub fn local_to_global(u1: f64, u2: f64, t: f64) -> Result<f64, DomainError> {
    if u1 == u2 {
        return Err(DomainError::DegenerateRange { u1, u2 });
    }
    Ok(u1 + t * (u2 - u1))
}

/// Slice form of [`global_to_local`].
pub fn global_to_local_all(u1: f64, u2: f64, values: &[f64]) -> Result<Vec<f64>, DomainError> {
    values.iter().map(|&u| global_to_local(u1, u2, u)).collect()
}

/// Slice form of [`local_to_global`].
pub fn local_to_global_all(u1: f64, u2: f64, values: &[f64]) -> Result<Vec<f64>, DomainError> {
    values.iter().map(|&t| local_to_global(u1, u2, t)).collect()
}

/// Wrap `value` into the periodic interval `[start, end)`.
#[must_use]
pub fn wrap(value: f64, start: f64, end: f64) -> f64 {
    let span = end - start;
    if !span.is_finite() || span <= 0.0 {
        return start;
    }
    let t = (value - start).rem_euclid(span);
    let wrapped = start + t;
    if wrapped >= end { start } else { wrapped }
}

/// Affinely rescale `knots` in place so the first and last values become
/// `u1` and `u2`.
///
/// Interior ratios, and therefore multiplicities, are preserved. The first
/// and last entries are assigned exactly rather than computed so that the new
/// domain bounds carry no rounding error.
pub fn reparameterize_knots(u1: f64, u2: f64, knots: &mut [f64]) -> Result<(), DomainError> {
    if !(u1 < u2) {
        return Err(DomainError::InvertedRange { u1, u2 });
    }
    let (Some(&first), Some(&last)) = (knots.first(), knots.last()) else {
        return Ok(());
    };
    let span = last - first;
    if span <= 0.0 {
        return Err(DomainError::DegenerateRange { u1: first, u2: last });
    }

    let scale = (u2 - u1) / span;
    let count = knots.len();
    for (index, knot) in knots.iter_mut().enumerate() {
        *knot = if *knot == first {
            u1
        } else if *knot == last || index + 1 == count {
            u2
        } else {
            u1 + (*knot - first) * scale
        };
    }
    Ok(())
}

/// Pack Euclidean control points and weights into homogeneous form.
///
/// Missing weights default to 1.
#[must_use]
pub fn homogenize(points: &[Point3], weights: &[f64]) -> Vec<HPoint4> {
    points
        .iter()
        .enumerate()
        .map(|(i, p)| p.weighted(weights.get(i).copied().unwrap_or(1.0)))
        .collect()
}

/// Grid form of [`homogenize`] for a `cp[i][j]` control net.
#[must_use]
pub fn homogenize_grid(points: &[Vec<Point3>], weights: &[Vec<f64>]) -> Vec<Vec<HPoint4>> {
    points
        .iter()
        .enumerate()
        .map(|(i, row)| homogenize(row, weights.get(i).map_or(&[][..], Vec::as_slice)))
        .collect()
}

/// Split homogeneous points back into Euclidean points and weights.
///
/// Points with a degenerate weight fall back to their unweighted coordinates.
#[must_use]
pub fn dehomogenize(points: &[HPoint4]) -> (Vec<Point3>, Vec<f64>) {
    points
        .iter()
        .map(|h| {
            let p = h
                .to_point3()
                .unwrap_or_else(|| Point3::new(h.x, h.y, h.z));
            (p, h.w)
        })
        .unzip()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn degenerate_range_is_rejected() {
        assert!(matches!(
            global_to_local(2.0, 2.0, 1.0),
            Err(DomainError::DegenerateRange { .. })
        ));
        assert!(local_to_global(2.0, 2.0, 0.5).is_err());
    }

    #[test]
    fn reversed_range_still_maps() {
        assert_eq!(global_to_local(4.0, 2.0, 3.0), Ok(0.5));
        assert_eq!(local_to_global(4.0, 2.0, 0.25), Ok(3.5));
    }

    #[test]
    fn wrap_into_period() {
        assert_eq!(wrap(5.0, 0.0, 4.0), 1.0);
        assert_eq!(wrap(-1.0, 0.0, 4.0), 3.0);
        assert_eq!(wrap(4.0, 0.0, 4.0), 0.0);
    }

    #[test]
    fn reparameterize_preserves_ratios() {
        let mut knots = [0.0, 0.0, 1.0, 3.0, 4.0, 4.0];
        reparameterize_knots(10.0, 18.0, &mut knots).expect("valid range");
        assert_eq!(knots, [10.0, 10.0, 12.0, 16.0, 18.0, 18.0]);
    }

    #[test]
    fn reparameterize_rejects_inverted_range() {
        let mut knots = [0.0, 1.0, 2.0];
        assert!(reparameterize_knots(1.0, 0.0, &mut knots).is_err());
        assert_eq!(knots, [0.0, 1.0, 2.0]);
    }

    #[test]
    fn homogenize_defaults_missing_weights() {
        let pts = [Point3::new(1.0, 2.0, 3.0), Point3::new(1.0, 1.0, 1.0)];
        let h = homogenize(&pts, &[2.0]);
        assert_eq!(h[0], HPoint4::new(2.0, 4.0, 6.0, 2.0));
        assert_eq!(h[1], HPoint4::new(1.0, 1.0, 1.0, 1.0));
        let (back, w) = dehomogenize(&h);
        assert_eq!(back, pts);
        assert_eq!(w, vec![2.0, 1.0]);
    }
}
