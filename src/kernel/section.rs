//! Plane sections of NURBS faces by marching squares.
//!
//! The signed distance to the plane is sampled on a parameter grid over the
//! face. Every grid edge whose end values change sign carries one crossing,
//! refined on the true surface and shared by the two cells on either side,
//! so the cell segments chain into consistent polylines.

use std::collections::HashMap;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::geom::{NurbsCurve, NurbsSurface, PlaneSurface, Point3, Surface, Tolerance};

use super::native::NativeKernelOptions;
use super::shape::Face;

/// A grid edge: `U(i, j)` runs from node `(i, j)` to `(i + 1, j)`, `V(i, j)`
/// from `(i, j)` to `(i, j + 1)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum GridEdge {
    U(usize, usize),
    V(usize, usize),
}

struct SectionGrid<'a> {
    surface: &'a NurbsSurface,
    plane: &'a PlaneSurface,
    us: Vec<f64>,
    vs: Vec<f64>,
    values: Vec<f64>,
}

impl<'a> SectionGrid<'a> {
    fn sample(
        surface: &'a NurbsSurface,
        plane: &'a PlaneSurface,
        u_range: (f64, f64),
        v_range: (f64, f64),
        density: usize,
    ) -> Self {
        let us = grid_parameters(&surface.u_knot_vector().breakpoints(u_range.0, u_range.1), u_range, density);
        let vs = grid_parameters(&surface.v_knot_vector().breakpoints(v_range.0, v_range.1), v_range, density);
        let values = sample_rows(surface, plane, &us, &vs).concat();
        Self {
            surface,
            plane,
            us,
            vs,
            values,
        }
    }

    fn value(&self, i: usize, j: usize) -> f64 {
        self.values[j * self.us.len() + i]
    }

    fn node(&self, i: usize, j: usize) -> (f64, f64) {
        (self.us[i], self.vs[j])
    }

    fn ends(&self, edge: GridEdge) -> ((usize, usize), (usize, usize)) {
        match edge {
            GridEdge::U(i, j) => ((i, j), (i + 1, j)),
            GridEdge::V(i, j) => ((i, j), (i, j + 1)),
        }
    }

    fn signed_distance(&self, u: f64, v: f64) -> f64 {
        signed_distance(self.surface, self.plane, u, v)
    }

    /// Zero of the signed distance along a sign-changing grid edge, by
    /// Illinois-modified regula falsi.
    fn crossing(&self, edge: GridEdge, iterations: usize) -> (f64, f64) {
        let ((ia, ja), (ib, jb)) = self.ends(edge);
        let (a, b) = (self.node(ia, ja), self.node(ib, jb));
        let at = |t: f64| (a.0 + (b.0 - a.0) * t, a.1 + (b.1 - a.1) * t);

        let (mut t0, mut f0) = (0.0, self.value(ia, ja));
        let (mut t1, mut f1) = (1.0, self.value(ib, jb));
        let mut t = t0;
        let mut side = 0i8;
        for _ in 0..iterations.max(1) {
            let denom = f1 - f0;
            if denom == 0.0 {
                break;
            }
            t = ((t0 * f1 - t1 * f0) / denom).clamp(0.0, 1.0);
            let (u, v) = at(t);
            let f = self.signed_distance(u, v);
            if f.abs() <= Tolerance::ZERO_LENGTH.eps {
                break;
            }
            if (f >= 0.0) == (f1 >= 0.0) {
                t1 = t;
                f1 = f;
                if side == -1 {
                    f0 *= 0.5;
                }
                side = -1;
            } else {
                t0 = t;
                f0 = f;
                if side == 1 {
                    f1 *= 0.5;
                }
                side = 1;
            }
        }
        at(t)
    }

    /// Cell segments as pairs of crossed grid edges.
    fn segments(&self) -> Vec<(GridEdge, GridEdge)> {
        let inside = |i: usize, j: usize| self.value(i, j) >= 0.0;
        let mut out = Vec::new();
        for j in 0..self.vs.len().saturating_sub(1) {
            for i in 0..self.us.len().saturating_sub(1) {
                let corners = [inside(i, j), inside(i + 1, j), inside(i + 1, j + 1), inside(i, j + 1)];
                // Edges in corner order: bottom, right, top, left.
                let edges = [GridEdge::U(i, j), GridEdge::V(i + 1, j), GridEdge::U(i, j + 1), GridEdge::V(i, j)];
                let crossed: Vec<usize> = (0..4).filter(|&k| corners[k] != corners[(k + 1) % 4]).collect();
                match crossed.len() {
                    2 => out.push((edges[crossed[0]], edges[crossed[1]])),
                    4 => {
                        let (u0, u1) = (self.us[i], self.us[i + 1]);
                        let (v0, v1) = (self.vs[j], self.vs[j + 1]);
                        let center = self.signed_distance(0.5 * (u0 + u1), 0.5 * (v0 + v1)) >= 0.0;
                        // Cut off each corner on the other side of the center.
                        for k in 0..4 {
                            if corners[k] != center {
                                out.push((edges[(k + 3) % 4], edges[k]));
                            }
                        }
                    }
                    _ => {}
                }
            }
        }
        out
    }
}

fn signed_distance(surface: &NurbsSurface, plane: &PlaneSurface, u: f64, v: f64) -> f64 {
    plane.distance(surface.point_unchecked(u, v))
}

fn sample_row(surface: &NurbsSurface, plane: &PlaneSurface, us: &[f64], v: f64) -> Vec<f64> {
    us.iter().map(|&u| signed_distance(surface, plane, u, v)).collect()
}

#[cfg(feature = "parallel")]
fn sample_rows(surface: &NurbsSurface, plane: &PlaneSurface, us: &[f64], vs: &[f64]) -> Vec<Vec<f64>> {
    vs.par_iter().map(|&v| sample_row(surface, plane, us, v)).collect()
}

#[cfg(not(feature = "parallel"))]
fn sample_rows(surface: &NurbsSurface, plane: &PlaneSurface, us: &[f64], vs: &[f64]) -> Vec<Vec<f64>> {
    vs.iter().map(|&v| sample_row(surface, plane, us, v)).collect()
}

/// Grid parameters over `range`: every break inside it, with each interval
/// subdivided in proportion to its share of the range.
fn grid_parameters(breaks: &[f64], range: (f64, f64), density: usize) -> Vec<f64> {
    let (a, b) = range;
    let mut stops = vec![a];
    stops.extend(breaks.iter().copied().filter(|&k| k > a && k < b));
    stops.push(b);

    let span = b - a;
    let density = density.max(2) as f64;
    let mut out = Vec::new();
    for pair in stops.windows(2) {
        let (s, e) = (pair[0], pair[1]);
        let count = ((density * (e - s) / span).ceil() as usize).max(1);
        out.extend((0..count).map(|k| s + (e - s) * k as f64 / count as f64));
    }
    out.push(b);
    out
}

/// Chain segments that share grid edges. Open chains are walked from their
/// free ends first, then the remaining closed loops.
fn chain_segments(segments: &[(GridEdge, GridEdge)]) -> Vec<Vec<GridEdge>> {
    let mut incident: HashMap<GridEdge, Vec<usize>> = HashMap::new();
    for (index, &(a, b)) in segments.iter().enumerate() {
        incident.entry(a).or_default().push(index);
        incident.entry(b).or_default().push(index);
    }
    let degree = |edge: GridEdge| incident.get(&edge).map_or(0, Vec::len);

    let mut used = vec![false; segments.len()];
    let mut chains = Vec::new();
    let walk = |start: usize, from: GridEdge, used: &mut [bool]| {
        let mut chain = vec![from];
        let (mut current, mut key) = (start, from);
        loop {
            used[current] = true;
            let (a, b) = segments[current];
            key = if a == key { b } else { a };
            chain.push(key);
            let next = incident
                .get(&key)
                .and_then(|list| list.iter().copied().find(|&s| !used[s]));
            match next {
                Some(s) => current = s,
                None => break,
            }
        }
        chain
    };

    for (index, &(a, b)) in segments.iter().enumerate() {
        if used[index] {
            continue;
        }
        if degree(a) == 1 {
            chains.push(walk(index, a, &mut used));
        } else if degree(b) == 1 {
            chains.push(walk(index, b, &mut used));
        }
    }
    for (index, &(a, _)) in segments.iter().enumerate() {
        if !used[index] {
            chains.push(walk(index, a, &mut used));
        }
    }
    chains
}

/// Drop points closer than `eps` to their predecessor. The final point
/// always survives so chain ends stay exact.
fn dedupe(points: Vec<Point3>, eps: f64) -> Vec<Point3> {
    let count = points.len();
    let mut out: Vec<Point3> = Vec::with_capacity(count);
    for (index, point) in points.into_iter().enumerate() {
        let kept = out.len();
        match out.last_mut() {
            Some(last) if last.distance_to(point) <= eps => {
                if index + 1 == count && kept > 1 {
                    *last = point;
                }
            }
            _ => out.push(point),
        }
    }
    out
}

/// Section polylines of `face` with `plane`, one per connected chain.
pub(crate) fn section_face(face: &Face, plane: &PlaneSurface, options: &NativeKernelOptions) -> Vec<Vec<Point3>> {
    let Some(surface) = face.surface().as_nurbs() else {
        return Vec::new();
    };
    let u_range = face.u_range().unwrap_or_else(|| surface.domain_u());
    let v_range = face.v_range().unwrap_or_else(|| surface.domain_v());

    let grid = SectionGrid::sample(surface, plane, u_range, v_range, options.grid_density);
    let segments = grid.segments();
    let mut crossings: HashMap<GridEdge, Point3> = HashMap::new();
    let mut polylines = Vec::new();
    for chain in chain_segments(&segments) {
        let points: Vec<Point3> = chain
            .iter()
            .map(|&edge| {
                *crossings.entry(edge).or_insert_with(|| {
                    let (u, v) = grid.crossing(edge, options.newton_iterations);
                    surface.point_unchecked(u, v)
                })
            })
            .collect();
        let points = dedupe(points, Tolerance::LOOSE.eps);
        if points.len() < 2 {
            log::warn!("skipping degenerate section chain of {} grid edges", chain.len());
            continue;
        }
        polylines.push(points);
    }
    log::debug!(
        "sectioned face on a {}x{} grid: {} segments, {} chains",
        grid.us.len(),
        grid.vs.len(),
        segments.len(),
        polylines.len()
    );
    polylines
}

/// Join polylines whose ends meet, reversing pieces as needed.
pub(crate) fn merge_polylines(polylines: Vec<Vec<Point3>>, tolerance: f64) -> Vec<Vec<Point3>> {
    let tolerance = tolerance.max(1e-12);
    let mut remaining: Vec<Vec<Point3>> = polylines.into_iter().rev().collect();
    let mut result = Vec::new();

    while let Some(mut current) = remaining.pop() {
        let mut changed = true;
        while changed {
            changed = false;
            let mut index = 0;
            while index < remaining.len() {
                if let Some(merged) = try_merge(&current, &remaining[index], tolerance) {
                    current = merged;
                    remaining.remove(index);
                    changed = true;
                } else {
                    index += 1;
                }
            }
        }
        result.push(current);
    }
    result
}

fn try_merge(target: &[Point3], candidate: &[Point3], tolerance: f64) -> Option<Vec<Point3>> {
    let (start, end) = (*target.first()?, *target.last()?);
    let (c_start, c_end) = (*candidate.first()?, *candidate.last()?);
    if start.distance_to(end) < tolerance && target.len() > 2 {
        return None;
    }
    let near = |a: Point3, b: Point3| a.distance_to(b) < tolerance;

    if near(end, c_start) {
        let mut merged = target.to_vec();
        merged.extend_from_slice(&candidate[1..]);
        return Some(merged);
    }
    if near(end, c_end) {
        let mut merged = target.to_vec();
        merged.extend(candidate.iter().rev().skip(1));
        return Some(merged);
    }
    if near(start, c_end) {
        let mut merged = candidate.to_vec();
        merged.pop();
        merged.extend_from_slice(target);
        return Some(merged);
    }
    if near(start, c_start) {
        let mut merged: Vec<Point3> = candidate.iter().rev().copied().collect();
        merged.pop();
        merged.extend_from_slice(target);
        return Some(merged);
    }
    None
}

/// Curve through a section polyline.
pub(crate) fn fit_polyline(points: &[Point3], degree: usize) -> Option<NurbsCurve> {
    let fitted = if points.len() >= 4 && degree > 1 {
        NurbsCurve::interpolate_through_points(points, degree)
    } else {
        NurbsCurve::from_polyline(points)
    };
    match fitted {
        Ok(curve) => Some(curve),
        Err(err) => {
            log::warn!("could not fit section curve through {} points: {err}", points.len());
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::{AnySurface, Vec3};

    fn flat_square() -> NurbsSurface {
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

    #[test]
    fn grid_includes_interior_breaks() {
        let us = grid_parameters(&[0.0, 0.3, 1.0], (0.0, 1.0), 10);
        assert!(us.contains(&0.3));
        assert_eq!(us.first(), Some(&0.0));
        assert_eq!(us.last(), Some(&1.0));
        assert!(us.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn straight_section_spans_the_face() {
        let face = Face::new(AnySurface::Nurbs(flat_square()));
        let plane = PlaneSurface::new(Point3::new(3.3, 0.0, 0.0), Vec3::Y, Vec3::Z);
        let chains = section_face(&face, &plane, &NativeKernelOptions::default());
        assert_eq!(chains.len(), 1);
        let chain = &chains[0];
        let ends = [chain[0], chain[chain.len() - 1]];
        let tol = Tolerance::new(1e-9);
        assert!(chain.iter().all(|p| (p.x - 3.3).abs() < 1e-9 && p.z.abs() < 1e-12));
        assert!(ends.iter().any(|&p| tol.approx_eq_point3(p, Point3::new(3.3, 0.0, 0.0))));
        assert!(ends.iter().any(|&p| tol.approx_eq_point3(p, Point3::new(3.3, 10.0, 0.0))));
    }

    #[test]
    fn missing_plane_gives_no_chains() {
        let face = Face::new(AnySurface::Nurbs(flat_square()));
        let plane = PlaneSurface::new(Point3::new(0.0, 0.0, 1.0), Vec3::X, Vec3::Y);
        assert!(section_face(&face, &plane, &NativeKernelOptions::default()).is_empty());
    }

    #[test]
    fn polylines_merge_across_reversed_pieces() {
        let a = vec![Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 0.0, 0.0)];
        let b = vec![Point3::new(2.0, 0.0, 0.0), Point3::new(1.0, 0.0, 0.0)];
        let c = vec![Point3::new(5.0, 0.0, 0.0), Point3::new(6.0, 0.0, 0.0)];
        let merged = merge_polylines(vec![a, b, c], 1e-7);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].len(), 3);
        assert_eq!(merged[0][2], Point3::new(2.0, 0.0, 0.0));
    }

    #[test]
    fn dedupe_keeps_the_exact_end() {
        let points = vec![
            Point3::ORIGIN,
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0 + 1e-9, 0.0, 0.0),
        ];
        let out = dedupe(points, 1e-6);
        assert_eq!(out.len(), 2);
        assert_eq!(out[1], Point3::new(1.0 + 1e-9, 0.0, 0.0));
    }

    #[test]
    fn short_chains_fit_as_polylines() {
        let curve = fit_polyline(&[Point3::ORIGIN, Point3::new(1.0, 1.0, 0.0)], 3).unwrap();
        assert_eq!(curve.p(), 1);
        let points: Vec<Point3> = (0..6).map(|k| Point3::new(f64::from(k), 0.0, 0.0)).collect();
        assert_eq!(fit_polyline(&points, 3).unwrap().p(), 3);
    }
}
