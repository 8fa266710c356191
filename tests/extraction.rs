use std::sync::Arc;

use sref_engine::geom::{
    AnyCurve, Curve3, Line3, NurbsCurve, NurbsSurface, PlaneSurface, Point3, Tolerance,
};
use sref_engine::kernel::{
    CurveProjection, Edge, GeometricKernel, KernelError, NativeKernel, Shape, SurfaceProjection, Wire,
};
use sref_engine::oml::{ExtractCurveOptions, ExtractError, Wing};

fn flat_square(size: f64) -> NurbsSurface {
    NurbsSurface::by_data(
        vec![
            vec![Point3::new(0.0, 0.0, 0.0), Point3::new(0.0, size, 0.0)],
            vec![Point3::new(size, 0.0, 0.0), Point3::new(size, size, 0.0)],
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

/// Quadratic 3x3 patch over the square `[0, 10]^2` with heights
/// `h(u) + h(v)` at the poles, `h = [0, bump_u, 0]` and `[0, bump_v, 0]`.
fn bumped_square(bump_u: f64, bump_v: f64) -> NurbsSurface {
    let hu = [0.0, bump_u, 0.0];
    let hv = [0.0, bump_v, 0.0];
    let cp: Vec<Vec<Point3>> = (0..3)
        .map(|i| {
            (0..3)
                .map(|j| Point3::new(5.0 * i as f64, 5.0 * j as f64, hu[i] + hv[j]))
                .collect::<Vec<_>>()
        })
        .collect();
    NurbsSurface::by_data(
        cp,
        vec![0.0, 1.0],
        vec![0.0, 1.0],
        vec![3, 3],
        vec![3, 3],
        2,
        2,
        None,
        false,
        false,
    )
    .unwrap()
}

fn max_plane_distance(curve: &NurbsCurve, plane: &PlaneSurface) -> f64 {
    (0..=10)
        .map(|k| {
            let t = curve.u1() + (curve.u2() - curve.u1()) * f64::from(k) / 10.0;
            plane.distance(curve.eval(t).unwrap()).abs()
        })
        .fold(0.0, f64::max)
}

/// Kernel returning a fixed section and delegating everything else to the
/// native kernel.
struct ScriptedKernel {
    section: Vec<Edge>,
    fail_curve_projection: bool,
    native: NativeKernel,
}

impl ScriptedKernel {
    fn new(section: Vec<Edge>) -> Self {
        Self {
            section,
            fail_curve_projection: false,
            native: NativeKernel::default(),
        }
    }
}

impl GeometricKernel for ScriptedKernel {
    fn intersect(&self, _first: &Shape, _second: &Shape, _refine_edges: bool) -> Result<Shape, KernelError> {
        Ok(Shape::Edges(self.section.clone()))
    }

    fn join_edges_to_wires(&self, edges: &[Edge]) -> Vec<Wire> {
        self.native.join_edges_to_wires(edges)
    }

    fn nearest_shape(&self, point: Point3, candidates: &[Wire]) -> Option<usize> {
        self.native.nearest_shape(point, candidates)
    }

    fn project_point_to_curve(&self, point: Point3, curve: &NurbsCurve) -> Option<CurveProjection> {
        if self.fail_curve_projection {
            return None;
        }
        self.native.project_point_to_curve(point, curve)
    }

    fn project_point_to_surface(&self, point: Point3, surface: &NurbsSurface) -> Option<SurfaceProjection> {
        self.native.project_point_to_surface(point, surface)
    }

    fn face_from_surface(&self, surface: &NurbsSurface) -> Shape {
        self.native.face_from_surface(surface)
    }

    fn divide_closed(&self, shape: Shape) -> Shape {
        self.native.divide_closed(shape)
    }

    fn divide_c0(&self, shape: Shape) -> Shape {
        self.native.divide_c0(shape)
    }
}

fn horizontal(y: f64) -> Edge {
    Edge::new(Line3::new(Point3::new(0.0, y, 0.0), Point3::new(10.0, y, 0.0)))
}

fn general() -> ExtractCurveOptions {
    ExtractCurveOptions::default().use_iso_shortcut(false)
}

#[test]
fn planar_extraction_hits_the_requested_points() {
    let wing = Wing::new("wing", flat_square(10.0));
    let (curve, diagnostics) = wing
        .extract_curve_with_diagnostics(0.2, 0.1, 0.8, 0.9, None, ExtractCurveOptions::default())
        .unwrap();

    let tol = Tolerance::new(1e-6);
    assert!(tol.approx_eq_point3(curve.p1(), wing.eval(0.2, 0.1).unwrap()));
    assert!(tol.approx_eq_point3(curve.p2(), wing.eval(0.8, 0.9).unwrap()));
    assert!((curve.length() - 10.0).abs() < 1e-6);
    assert!(!diagnostics.used_iso_shortcut);
    assert_eq!(diagnostics.wire_count, 1);
    assert!(diagnostics.warnings.is_empty());
}

#[test]
fn extraction_runs_from_the_first_point() {
    let wing = Wing::new("wing", flat_square(10.0));
    let forward = wing
        .extract_curve(0.2, 0.1, 0.8, 0.9, None, ExtractCurveOptions::default())
        .unwrap();
    let backward = wing
        .extract_curve(0.8, 0.9, 0.2, 0.1, None, ExtractCurveOptions::default())
        .unwrap();
    let tol = Tolerance::new(1e-6);
    assert!(tol.approx_eq_point3(forward.p1(), backward.p2()));
    assert!(tol.approx_eq_point3(forward.p2(), backward.p1()));
}

#[test]
fn iso_shortcut_agrees_with_the_section() {
    let wing = Wing::new("wing", flat_square(10.0));
    let (iso, iso_diag) = wing
        .extract_curve_with_diagnostics(0.3, 0.9, 0.3, 0.1, None, ExtractCurveOptions::default())
        .unwrap();
    let (cut, cut_diag) = wing
        .extract_curve_with_diagnostics(0.3, 0.9, 0.3, 0.1, None, general())
        .unwrap();

    assert!(iso_diag.used_iso_shortcut);
    assert!(iso_diag.reversed);
    assert!(!cut_diag.used_iso_shortcut);
    let tol = Tolerance::new(1e-6);
    for curve in [&iso, &cut] {
        assert!(tol.approx_eq_point3(curve.p1(), Point3::new(3.0, 9.0, 0.0)));
        assert!(tol.approx_eq_point3(curve.p2(), Point3::new(3.0, 1.0, 0.0)));
        assert!((curve.length() - 8.0).abs() < 1e-6);
    }
}

#[test]
fn zero_wires_is_an_error() {
    let wing = Wing::with_kernel("wing", flat_square(10.0), Box::new(ScriptedKernel::new(Vec::new())));
    let result = wing.extract_curve(0.2, 0.1, 0.8, 0.9, None, ExtractCurveOptions::default());
    assert_eq!(result, Err(ExtractError::NoCurveExtracted));
}

#[test]
fn nearest_of_three_wires_is_selected() {
    let section = vec![horizontal(5.0), horizontal(1.0), horizontal(-3.0)];
    let wing = Wing::with_kernel("wing", flat_square(10.0), Box::new(ScriptedKernel::new(section)));
    let (curve, diagnostics) = wing
        .extract_curve_with_diagnostics(0.1, 0.12, 0.9, 0.12, None, general())
        .unwrap();

    assert_eq!(diagnostics.wire_count, 3);
    assert_eq!(diagnostics.selected_wire, Some(1));
    let tol = Tolerance::new(1e-9);
    assert!(tol.approx_eq_point3(curve.p1(), Point3::new(1.0, 1.0, 0.0)));
    assert!(tol.approx_eq_point3(curve.p2(), Point3::new(9.0, 1.0, 0.0)));
    assert_eq!(diagnostics.warnings.len(), 2);
}

#[test]
fn connected_edges_are_merged_before_trimming() {
    let section = vec![
        Edge::new(Line3::new(Point3::new(5.0, 2.0, 0.0), Point3::new(10.0, 2.0, 0.0))),
        Edge::new(Line3::new(Point3::new(5.0, 2.0, 0.0), Point3::new(0.0, 2.0, 0.0))),
    ];
    let wing = Wing::with_kernel("wing", flat_square(10.0), Box::new(ScriptedKernel::new(section)));
    let curve = wing
        .extract_curve(0.2, 0.2, 0.7, 0.2, None, general())
        .unwrap();
    let tol = Tolerance::new(1e-9);
    assert!(tol.approx_eq_point3(curve.p1(), Point3::new(2.0, 2.0, 0.0)));
    assert!(tol.approx_eq_point3(curve.p2(), Point3::new(7.0, 2.0, 0.0)));
    assert!((curve.length() - 5.0).abs() < 1e-9);
}

#[test]
fn failed_projection_aborts() {
    let mut kernel = ScriptedKernel::new(vec![horizontal(1.0)]);
    kernel.fail_curve_projection = true;
    let wing = Wing::with_kernel("wing", flat_square(10.0), Box::new(kernel));
    let result = wing.extract_curve(0.1, 0.1, 0.9, 0.1, None, general());
    assert!(matches!(result, Err(ExtractError::FailedToInvertPoint { .. })));
}

#[test]
fn generic_edges_are_unsupported() {
    struct Wave;
    impl Curve3 for Wave {
        fn point_at(&self, t: f64) -> Point3 {
            Point3::new(10.0 * t, 1.0 + t.sin(), 0.0)
        }
    }
    let section = vec![Edge::new(AnyCurve::Generic(Arc::new(Wave)))];
    let wing = Wing::with_kernel("wing", flat_square(10.0), Box::new(ScriptedKernel::new(section)));
    let result = wing.extract_curve(0.1, 0.1, 0.9, 0.1, None, general());
    assert_eq!(result, Err(ExtractError::UnsupportedCurveType("curve")));
}

#[test]
fn explicit_basis_is_passed_to_the_kernel() {
    let wing = Wing::new("wing", flat_square(10.0));
    let plane = wing.extract_plane(0.2, 0.1, 0.8, 0.9).unwrap();
    let curve = wing
        .extract_curve(0.2, 0.1, 0.8, 0.9, Some(&Shape::from(plane)), ExtractCurveOptions::default())
        .unwrap();
    let tol = Tolerance::new(1e-6);
    assert!(tol.approx_eq_point3(curve.p1(), Point3::new(2.0, 1.0, 0.0)));

    let unsupported = wing.extract_curve(0.2, 0.1, 0.8, 0.9, Some(&Shape::Empty), ExtractCurveOptions::default());
    assert!(matches!(unsupported, Err(ExtractError::Kernel(KernelError::UnsupportedShapes { .. }))));
}

#[test]
fn curved_section_hits_both_points_in_the_plane() {
    let wing = Wing::new("dome", bumped_square(2.0, 2.0));
    assert!(!wing.sref().is_planar(Tolerance::LOOSE.eps));
    let (curve, diagnostics) = wing
        .extract_curve_with_diagnostics(0.2, 0.3, 0.8, 0.6, None, general())
        .unwrap();

    assert_eq!(diagnostics.wire_count, 1);
    let tol = Tolerance::new(1e-3);
    assert!(tol.approx_eq_point3(curve.p1(), wing.eval(0.2, 0.3).unwrap()));
    assert!(tol.approx_eq_point3(curve.p2(), wing.eval(0.8, 0.6).unwrap()));
    let plane = wing.extract_plane(0.2, 0.3, 0.8, 0.6).unwrap();
    assert!(max_plane_distance(&curve, &plane) < 1e-6);
}

#[test]
fn iso_shortcut_is_skipped_when_the_iso_curve_leaves_the_plane() {
    let wing = Wing::new("dome", bumped_square(2.0, 2.0));
    let plane = wing.extract_plane(0.3, 0.1, 0.3, 0.9).unwrap();
    let iso = wing.isocurve(Some(0.3), None).unwrap();
    assert!(plane.distance(iso.eval(0.5).unwrap()).abs() > 0.05);

    let (curve, diagnostics) = wing
        .extract_curve_with_diagnostics(0.3, 0.1, 0.3, 0.9, None, ExtractCurveOptions::default())
        .unwrap();
    let section = wing.extract_curve(0.3, 0.1, 0.3, 0.9, None, general()).unwrap();

    assert!(!diagnostics.used_iso_shortcut);
    assert!(max_plane_distance(&curve, &plane) < 1e-6);
    let tol = Tolerance::new(1e-12);
    for k in 0..=10 {
        let s = f64::from(k) / 10.0;
        let a = curve.eval(curve.u1() + (curve.u2() - curve.u1()) * s).unwrap();
        let b = section.eval(section.u1() + (section.u2() - section.u1()) * s).unwrap();
        assert!(tol.approx_eq_point3(a, b));
    }
    let tol = Tolerance::new(1e-3);
    assert!(tol.approx_eq_point3(curve.p1(), wing.eval(0.3, 0.1).unwrap()));
    assert!(tol.approx_eq_point3(curve.p2(), wing.eval(0.3, 0.9).unwrap()));
}

#[test]
fn iso_shortcut_agrees_with_a_curved_section() {
    let wing = Wing::new("ridge", bumped_square(0.0, 2.0));
    let (iso, iso_diag) = wing
        .extract_curve_with_diagnostics(0.3, 0.1, 0.3, 0.9, None, ExtractCurveOptions::default())
        .unwrap();
    let cut = wing.extract_curve(0.3, 0.1, 0.3, 0.9, None, general()).unwrap();
    assert!(iso_diag.used_iso_shortcut);

    let tol = Tolerance::new(1e-3);
    assert!(tol.approx_eq_point3(iso.p1(), cut.p1()));
    assert!(tol.approx_eq_point3(iso.p2(), cut.p2()));
    let kernel = NativeKernel::default();
    for k in 0..=10 {
        let t = iso.u1() + (iso.u2() - iso.u1()) * f64::from(k) / 10.0;
        let proj = kernel.project_point_to_curve(iso.eval(t).unwrap(), &cut).unwrap();
        assert!(proj.distance < 1e-3);
    }
}
