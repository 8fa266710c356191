//! Point inversion onto curves and surfaces.
//!
//! Both searches seed Newton's method from the best of a coarse sample set
//! and keep the seed when Newton wanders off, so the result is never worse
//! than the sampling.

use crate::geom::{NurbsCurve, NurbsSurface, Point3, Tolerance, param};

use super::native::NativeKernelOptions;
use super::{CurveProjection, SurfaceProjection};

fn fit_parameter(u: f64, lo: f64, hi: f64, periodic: bool) -> f64 {
    if periodic {
        param::wrap(u, lo, hi)
    } else {
        u.clamp(lo, hi)
    }
}

/// Sample parameters across `breaks`, `per_span` intervals between each
/// pair of consecutive breaks.
fn samples(breaks: &[f64], per_span: usize) -> Vec<f64> {
    let per_span = per_span.max(1);
    let mut out = Vec::with_capacity(breaks.len() * per_span + 1);
    for pair in breaks.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        out.extend((0..per_span).map(|k| a + (b - a) * k as f64 / per_span as f64));
    }
    if let Some(&last) = breaks.last() {
        out.push(last);
    }
    out
}

/// Closest point on `curve` to `point`.
///
/// `None` only for non-finite input or a curve that evaluates to non-finite
/// points.
#[must_use]
pub fn project_point_to_curve(
    point: Point3,
    curve: &NurbsCurve,
    options: &NativeKernelOptions,
) -> Option<CurveProjection> {
    if !point.is_finite() {
        return None;
    }
    let (lo, hi) = (curve.u1(), curve.u2());
    let periodic = curve.is_periodic();
    let distance = |u: f64| curve.point_unchecked(u).distance_to(point);

    let (mut best_u, mut best_d) = samples(curve.knots(), options.samples_per_span)
        .into_iter()
        .map(|u| (u, distance(u)))
        .filter(|(_, d)| d.is_finite())
        .min_by(|a, b| a.1.total_cmp(&b.1))?;

    let mut u = best_u;
    for _ in 0..options.newton_iterations {
        let ders = curve.derivatives_unchecked(u, 2);
        let r = ders[0] - point.to_vec3();
        let f = ders[1].dot(r);
        let df = ders[2].dot(r) + ders[1].length_squared();
        if !(df.abs() > 0.0) || !f.is_finite() {
            break;
        }
        let next = fit_parameter(u - f / df, lo, hi, periodic);
        let step = (next - u).abs();
        u = next;
        if step <= Tolerance::PARAMETER.eps * (hi - lo).abs().max(1.0) {
            break;
        }
    }
    let d = distance(u);
    if d.is_finite() && d <= best_d {
        best_u = u;
        best_d = d;
    }

    Some(CurveProjection {
        parameter: best_u,
        point: curve.point_unchecked(best_u),
        distance: best_d,
    })
}

/// Closest point on `surface` to `point`, as surface parameters.
#[must_use]
pub fn project_point_to_surface(
    point: Point3,
    surface: &NurbsSurface,
    options: &NativeKernelOptions,
) -> Option<SurfaceProjection> {
    if !point.is_finite() {
        return None;
    }
    let (u_lo, u_hi) = (surface.u1(), surface.u2());
    let (v_lo, v_hi) = (surface.v1(), surface.v2());
    let (u_periodic, v_periodic) = (surface.is_u_periodic(), surface.is_v_periodic());
    let distance = |u: f64, v: f64| surface.point_unchecked(u, v).distance_to(point);

    let us = samples(surface.uknots(), options.samples_per_span);
    let vs = samples(surface.vknots(), options.samples_per_span);
    let ((mut best_u, mut best_v), mut best_d) = us
        .iter()
        .flat_map(|&u| vs.iter().map(move |&v| (u, v)))
        .map(|(u, v)| ((u, v), distance(u, v)))
        .filter(|(_, d)| d.is_finite())
        .min_by(|a, b| a.1.total_cmp(&b.1))?;

    let (mut u, mut v) = (best_u, best_v);
    let scale = (u_hi - u_lo).abs().max(v_hi - v_lo).max(1.0);
    for _ in 0..options.newton_iterations {
        let skl = surface.derivatives_unchecked(u, v, 2);
        let r = skl[0][0] - point.to_vec3();
        let (su, sv) = (skl[1][0], skl[0][1]);
        let f = r.dot(su);
        let g = r.dot(sv);
        let a = su.length_squared() + r.dot(skl[2][0]);
        let b = su.dot(sv) + r.dot(skl[1][1]);
        let d = sv.length_squared() + r.dot(skl[0][2]);
        let det = a * d - b * b;
        if !(det.abs() > 0.0) || !det.is_finite() {
            break;
        }
        let du = (-f * d + g * b) / det;
        let dv = (-g * a + f * b) / det;
        let next_u = fit_parameter(u + du, u_lo, u_hi, u_periodic);
        let next_v = fit_parameter(v + dv, v_lo, v_hi, v_periodic);
        let step = (next_u - u).abs() + (next_v - v).abs();
        u = next_u;
        v = next_v;
        if step <= Tolerance::PARAMETER.eps * scale {
            break;
        }
    }
    let d = distance(u, v);
    if d.is_finite() && d <= best_d {
        best_u = u;
        best_v = v;
        best_d = d;
    }

    Some(SurfaceProjection {
        u: best_u,
        v: best_v,
        point: surface.point_unchecked(best_u, best_v),
        distance: best_d,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::Circle3;
    use crate::geom::Vec3;

    #[test]
    fn point_on_line_inverts_to_its_parameter() {
        let line = NurbsCurve::from_polyline(&[Point3::ORIGIN, Point3::new(4.0, 0.0, 0.0)]).unwrap();
        let proj = project_point_to_curve(Point3::new(1.5, 2.0, 0.0), &line, &NativeKernelOptions::default()).unwrap();
        assert!((proj.parameter - 1.5).abs() < 1e-9);
        assert!((proj.distance - 2.0).abs() < 1e-9);
    }

    #[test]
    fn newton_refines_on_a_rational_arc() {
        let arc = Circle3::new(Point3::ORIGIN, Vec3::Z, 1.0)
            .to_nurbs_range(0.0, 0.5)
            .unwrap();
        let target = arc.eval(0.1234).unwrap();
        let outside = Point3::ORIGIN.add_vec(target.to_vec3() * 3.0);
        let proj = project_point_to_curve(outside, &arc, &NativeKernelOptions::default()).unwrap();
        assert!((proj.parameter - 0.1234).abs() < 1e-8);
        assert!((proj.distance - 2.0).abs() < 1e-9);
    }

    #[test]
    fn beyond_the_end_projects_to_the_end() {
        let line = NurbsCurve::from_polyline(&[Point3::ORIGIN, Point3::new(1.0, 0.0, 0.0)]).unwrap();
        let proj = project_point_to_curve(Point3::new(3.0, 0.0, 0.0), &line, &NativeKernelOptions::default()).unwrap();
        assert_eq!(proj.parameter, 1.0);
        let nan = Point3::new(f64::NAN, 0.0, 0.0);
        assert!(project_point_to_curve(nan, &line, &NativeKernelOptions::default()).is_none());
    }

    #[test]
    fn surface_inversion_of_a_twisted_patch() {
        let surface = NurbsSurface::by_data(
            vec![
                vec![Point3::new(0.0, 0.0, 0.0), Point3::new(0.0, 10.0, 0.0)],
                vec![Point3::new(10.0, 0.0, 0.0), Point3::new(10.0, 10.0, 3.0)],
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
        .unwrap();
        let on = surface.eval(0.37, 0.81).unwrap();
        let proj = project_point_to_surface(on, &surface, &NativeKernelOptions::default()).unwrap();
        assert!((proj.u - 0.37).abs() < 1e-8);
        assert!((proj.v - 0.81).abs() < 1e-8);
        assert!(proj.distance < 1e-9);
    }
}
