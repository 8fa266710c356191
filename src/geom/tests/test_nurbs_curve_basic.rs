use crate::geom::{ConstructionError, Curve3, DomainError, NurbsCurve, Point3, Tolerance, Vec3};

fn cubic() -> NurbsCurve {
    NurbsCurve::by_data(
        vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 2.0, 0.0),
            Point3::new(2.0, -1.0, 1.0),
            Point3::new(3.0, 1.0, 0.0),
            Point3::new(4.0, 0.0, 2.0),
        ],
        vec![0.0, 0.4, 1.0],
        vec![4, 1, 4],
        3,
        Some(vec![1.0, 0.5, 2.0, 1.0, 1.0]),
        false,
    )
    .unwrap()
}

/// Uniform periodic quadratic over the unit square's corners.
fn periodic_square() -> NurbsCurve {
    NurbsCurve::by_data(
        vec![
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(-1.0, 0.0, 0.0),
            Point3::new(0.0, -1.0, 0.0),
        ],
        vec![0.0, 1.0, 2.0, 3.0, 4.0],
        vec![1, 1, 1, 1, 1],
        2,
        None,
        true,
    )
    .unwrap()
}

#[test]
fn construction_rejects_invalid_data() {
    let cp = vec![Point3::ORIGIN, Point3::new(1.0, 0.0, 0.0)];
    assert!(matches!(
        NurbsCurve::by_data(cp.clone(), vec![0.0, 1.0], vec![1, 1], 0, None, false),
        Err(ConstructionError::InvalidDegree { .. })
    ));
    assert!(matches!(
        NurbsCurve::by_data(cp.clone(), vec![0.0, 1.0], vec![2, 1], 1, None, false),
        Err(ConstructionError::LengthMismatch { .. })
    ));
    assert!(matches!(
        NurbsCurve::by_data(cp.clone(), vec![1.0, 0.0], vec![2, 2], 1, None, false),
        Err(ConstructionError::KnotsNotDistinct)
    ));
    assert!(matches!(
        NurbsCurve::by_data(cp.clone(), vec![0.0, 1.0], vec![2, 2], 1, Some(vec![1.0, -1.0]), false),
        Err(ConstructionError::InvalidWeight { index: 1, .. })
    ));
    assert!(matches!(
        NurbsCurve::by_data(cp, vec![0.0, 1.0], vec![2, 2], 1, Some(vec![1.0]), false),
        Err(ConstructionError::LengthMismatch { .. })
    ));
}

#[test]
fn accessors_describe_the_curve() {
    let curve = cubic();
    assert_eq!(curve.p(), 3);
    assert_eq!(curve.n(), 5);
    assert_eq!(curve.knots(), &[0.0, 0.4, 1.0]);
    assert_eq!(curve.mult(), &[4, 1, 4]);
    assert_eq!(curve.uk().len(), 9);
    assert_eq!(curve.cpw()[1].to_array(), [0.5, 1.0, 0.0, 0.5]);
    assert_eq!((curve.u1(), curve.u2()), (0.0, 1.0));
    assert_eq!(curve.p1(), Point3::ORIGIN);
    assert!(Tolerance::DEFAULT.approx_eq_point3(curve.p2(), Point3::new(4.0, 0.0, 2.0)));
    assert!(!curve.is_periodic());
    assert!(!curve.is_closed());
}

#[test]
fn eval_and_deriv_respect_the_domain() {
    let curve = cubic();
    assert!(curve.eval(1.0 + 1e-12).is_ok());
    assert!(matches!(curve.eval(1.1), Err(DomainError::OutOfDomain { .. })));
    assert!(matches!(curve.deriv(0.5, 0), Err(DomainError::InvalidDerivativeOrder { .. })));

    // exact first derivative against a central difference
    let h = 1e-6;
    let u = 0.3;
    let fd = curve
        .eval(u + h)
        .unwrap()
        .sub_point(curve.eval(u - h).unwrap())
        .mul_scalar(0.5 / h);
    let exact = curve.deriv(u, 1).unwrap();
    assert!(Tolerance::new(1e-5).approx_eq_vec3(fd, exact));
    assert_eq!(curve.derivative_at(u), exact);
}

#[test]
fn reversal_is_an_involution_and_keeps_points() {
    let original = cubic();
    let mut curve = original.clone();
    curve.reverse();
    let tol = Tolerance::new(1e-9);
    for &u in &[0.0, 0.2, 0.4, 0.77, 1.0] {
        let ur = curve.reversed_u(u);
        assert!((curve.reversed_u(ur) - u).abs() < 1e-15);
        assert!(tol.approx_eq_point3(curve.eval(ur).unwrap(), original.eval(u).unwrap()));
    }
    assert!(tol.approx_eq_point3(curve.p1(), original.p2()));
    curve.reverse();
    assert!(tol.approx_eq_point3(curve.eval(0.3).unwrap(), original.eval(0.3).unwrap()));
}

#[test]
fn segment_keeps_end_points_and_rejects_bad_ranges() {
    let original = cubic();
    let mut curve = original.clone();
    assert!(!curve.segment(0.5, 0.5));
    assert!(!curve.segment(0.7, 0.2));
    assert_eq!(curve, original);

    assert!(curve.segment(0.2, 0.7));
    let tol = Tolerance::new(1e-9);
    assert!((curve.u1() - 0.2).abs() < 1e-12);
    assert!((curve.u2() - 0.7).abs() < 1e-12);
    assert!(tol.approx_eq_point3(curve.p1(), original.eval(0.2).unwrap()));
    assert!(tol.approx_eq_point3(curve.p2(), original.eval(0.7).unwrap()));
    assert!(tol.approx_eq_point3(curve.eval(0.45).unwrap(), original.eval(0.45).unwrap()));

    // clamped to the domain
    let mut wide = original.clone();
    assert!(wide.segment(-1.0, 0.5));
    assert_eq!(wide.u1(), 0.0);
}

#[test]
fn arc_length_is_symmetric() {
    let curve = cubic();
    let forward = curve.arc_length(0.1, 0.9, 1e-10);
    let backward = curve.arc_length(0.9, 0.1, 1e-10);
    assert!(forward > 0.0);
    assert!((forward - backward).abs() < 1e-12);
    assert_eq!(curve.arc_length(0.5, 0.5, 1e-10), 0.0);

    let line = NurbsCurve::from_polyline(&[Point3::ORIGIN, Point3::new(3.0, 4.0, 0.0)]).unwrap();
    assert!((line.length() - 5.0).abs() < 1e-9);
}

#[test]
fn set_domain_reparameterizes() {
    let original = cubic();
    let mut curve = original.clone();
    assert!(!curve.set_domain(1.0, 1.0));
    assert!(!curve.set_domain(2.0, 1.0));
    assert!(curve.set_domain(10.0, 20.0));
    assert_eq!((curve.u1(), curve.u2()), (10.0, 20.0));
    assert!((curve.knots()[1] - 14.0).abs() < 1e-12);

    let tol = Tolerance::new(1e-9);
    let u = curve.local_to_global_param(0.3).unwrap();
    assert!((u - 13.0).abs() < 1e-12);
    assert!(tol.approx_eq_point3(curve.eval(u).unwrap(), original.eval(0.3).unwrap()));
    assert!((curve.global_to_local_param(u).unwrap() - 0.3).abs() < 1e-12);
}

#[test]
fn knot_insertion_and_control_point_edits() {
    let original = cubic();
    let mut curve = original.clone();
    curve.insert_knot(0.7, 2).unwrap();
    assert_eq!(curve.n(), 7);
    assert_eq!(curve.mult(), &[4, 1, 2, 4]);
    let tol = Tolerance::new(1e-9);
    for &u in &[0.1, 0.55, 0.7, 0.95] {
        assert!(tol.approx_eq_point3(curve.eval(u).unwrap(), original.eval(u).unwrap()));
    }
    assert!(curve.insert_knot(0.7, 2).is_err());
    assert!(curve.insert_knot(2.0, 1).is_err());

    assert!(matches!(
        curve.set_cp(7, Point3::ORIGIN, None),
        Err(DomainError::IndexOutOfBounds { index: 7, len: 7 })
    ));
    assert!(curve.set_cp(0, Point3::ORIGIN, Some(0.0)).is_err());
    curve.set_cp(0, Point3::new(-1.0, 0.0, 0.0), Some(3.0)).unwrap();
    assert_eq!(curve.p1(), Point3::new(-1.0, 0.0, 0.0));
    assert_eq!(curve.w()[0], 3.0);
}

#[test]
fn interpolation_passes_through_points() {
    let points = [
        Point3::new(0.0, 0.0, 0.0),
        Point3::new(1.0, 1.0, 0.0),
        Point3::new(2.0, 0.0, 0.0),
        Point3::new(3.0, 1.0, 0.0),
    ];
    let curve = NurbsCurve::interpolate_through_points(&points, 3).unwrap();
    assert_eq!(curve.p(), 3);
    let tol = Tolerance::new(1e-9);
    for (k, point) in points.iter().enumerate() {
        let u = k as f64 / 3.0;
        assert!(tol.approx_eq_point3(curve.eval(u).unwrap(), *point));
    }
    assert!(NurbsCurve::interpolate_through_points(&[Point3::ORIGIN, Point3::ORIGIN, Point3::ORIGIN], 2).is_err());
}

#[test]
fn periodic_curve_wraps() {
    let curve = periodic_square();
    let tol = Tolerance::new(1e-12);
    assert!(curve.is_periodic());
    assert!(curve.is_closed());
    assert_eq!(curve.n(), 4);
    assert_eq!((curve.u1(), curve.u2()), (0.0, 4.0));
    assert!(tol.approx_eq_point3(curve.eval(0.0).unwrap(), Point3::new(0.5, 0.5, 0.0)));
    assert!(tol.approx_eq_point3(curve.eval(1.0).unwrap(), Point3::new(-0.5, 0.5, 0.0)));
    assert!(tol.approx_eq_point3(curve.eval(0.5).unwrap(), Point3::new(0.0, 0.75, 0.0)));
    assert!(tol.approx_eq_point3(curve.eval(4.5).unwrap(), curve.eval(0.5).unwrap()));
    assert!(tol.approx_eq_point3(curve.eval(-3.5).unwrap(), curve.eval(0.5).unwrap()));
}

#[test]
fn periodic_reversal_and_seam_segment() {
    let original = periodic_square();
    let mut reversed = original.clone();
    reversed.reverse();
    assert!(reversed.is_periodic());
    let tol = Tolerance::new(1e-9);
    for &u in &[0.0, 0.3, 1.7, 3.2] {
        let back = reversed.eval(reversed.reversed_u(u)).unwrap();
        assert!(tol.approx_eq_point3(back, original.eval(u).unwrap()));
    }

    let mut piece = original.clone();
    assert!(piece.segment(3.5, 4.5));
    assert!(!piece.is_periodic());
    assert!((piece.u1() - 3.5).abs() < 1e-12);
    assert!((piece.u2() - 4.5).abs() < 1e-12);
    assert!(tol.approx_eq_point3(piece.eval(4.0).unwrap(), Point3::new(0.5, 0.5, 0.0)));
    assert!(tol.approx_eq_point3(piece.p1(), original.eval(3.5).unwrap()));
    assert!(tol.approx_eq_point3(piece.p2(), original.eval(0.5).unwrap()));
}

#[test]
fn periodic_knot_insertion_keeps_shape() {
    let original = periodic_square();
    let mut curve = original.clone();
    curve.insert_knot(2.5, 1).unwrap();
    assert!(curve.is_periodic());
    assert_eq!(curve.n(), 5);
    assert_eq!(curve.knots(), &[0.0, 1.0, 2.0, 2.5, 3.0, 4.0]);
    let tol = Tolerance::new(1e-9);
    for &u in &[0.2, 1.0, 2.4, 2.5, 3.9] {
        assert!(tol.approx_eq_point3(curve.eval(u).unwrap(), original.eval(u).unwrap()));
    }
}

#[test]
fn tangent_of_a_line_is_its_direction() {
    let line = NurbsCurve::from_polyline(&[Point3::ORIGIN, Point3::new(0.0, 2.0, 0.0)]).unwrap();
    let t = line.tangent_at(1.0).unwrap();
    assert!(Tolerance::DEFAULT.approx_eq_vec3(t, Vec3::Y));
    assert_eq!(line.kind(), "nurbs");
}
