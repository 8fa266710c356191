use crate::geom::{
    Circle3, ConstructionError, NurbsCurve, NurbsCurveRecord, NurbsSurface, NurbsSurfaceRecord,
    Point3, Tolerance, Vec3,
};

#[test]
fn rational_curve_survives_json() {
    let arc = Circle3::new(Point3::ORIGIN, Vec3::Z, 3.0)
        .to_nurbs_range(0.0, 0.4)
        .unwrap();
    let json = serde_json::to_string(&NurbsCurveRecord::from(&arc)).unwrap();
    let record: NurbsCurveRecord = serde_json::from_str(&json).unwrap();
    assert!(record.weights.is_some());

    let restored = NurbsCurve::try_from(record).unwrap();
    let tol = Tolerance::new(1e-12);
    for &u in &[0.0, 0.13, 0.25, 0.4] {
        assert!(tol.approx_eq_point3(restored.eval(u).unwrap(), arc.eval(u).unwrap()));
    }
}

#[test]
fn polynomial_curve_omits_weights() {
    let curve = NurbsCurve::from_polyline(&[
        Point3::new(0.0, 0.0, 0.0),
        Point3::new(1.0, 0.0, 0.0),
        Point3::new(1.0, 1.0, 0.0),
    ])
    .unwrap();
    let value = serde_json::to_value(NurbsCurveRecord::from(&curve)).unwrap();
    assert!(value.get("weights").is_none());
    assert_eq!(value["degree"], 1);
    assert_eq!(value["multiplicities"], serde_json::json!([2, 1, 2]));
}

#[test]
fn hand_written_record_is_validated() {
    let json = r#"{
        "degree": 2,
        "control_points": [[0, 0, 0], [1, 1, 0], [2, 0, 0]],
        "knots": [0.0, 1.0],
        "multiplicities": [3, 2]
    }"#;
    let record: NurbsCurveRecord = serde_json::from_str(json).unwrap();
    assert!(!record.is_periodic);
    assert!(matches!(
        NurbsCurve::try_from(record),
        Err(ConstructionError::LengthMismatch { .. }) | Err(ConstructionError::InvalidMultiplicity { .. })
    ));
}

#[test]
fn surface_record_round_trip() {
    let surface = NurbsSurface::by_data(
        vec![
            vec![Point3::new(0.0, 0.0, 0.0), Point3::new(0.0, 1.0, 0.0)],
            vec![Point3::new(1.0, 0.0, 0.0), Point3::new(1.0, 1.0, 1.0)],
        ],
        vec![0.0, 1.0],
        vec![0.0, 2.0],
        vec![2, 2],
        vec![2, 2],
        1,
        1,
        Some(vec![vec![1.0, 2.0], vec![1.0, 1.0]]),
        false,
        false,
    )
    .unwrap();

    let json = serde_json::to_string(&NurbsSurfaceRecord::from(&surface)).unwrap();
    let record: NurbsSurfaceRecord = serde_json::from_str(&json).unwrap();
    assert_eq!(record.v.knots, vec![0.0, 2.0]);
    let restored = NurbsSurface::try_from(record).unwrap();
    assert_eq!(restored, surface);
}
