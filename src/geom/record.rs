//! Plain serde records for persisting curves and surfaces.
//!
//! Records carry the raw construction data only. Converting a record back
//! goes through the validating constructors, so a hand-edited record can
//! fail with a [`ConstructionError`].

use serde::{Deserialize, Serialize};

use super::core::Point3;
use super::error::ConstructionError;
use super::nurbs_curve::NurbsCurve;
use super::nurbs_surface::NurbsSurface;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NurbsCurveRecord {
    pub degree: usize,
    pub control_points: Vec<[f64; 3]>,
    /// Omitted for non-rational curves.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weights: Option<Vec<f64>>,
    pub knots: Vec<f64>,
    pub multiplicities: Vec<usize>,
    #[serde(default)]
    pub is_periodic: bool,
}

/// Knot data of one surface direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplineDirectionRecord {
    pub degree: usize,
    pub knots: Vec<f64>,
    pub multiplicities: Vec<usize>,
    #[serde(default)]
    pub is_periodic: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NurbsSurfaceRecord {
    pub u: SplineDirectionRecord,
    pub v: SplineDirectionRecord,
    /// `control_points[i][j]`, `i` along u.
    pub control_points: Vec<Vec<[f64; 3]>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weights: Option<Vec<Vec<f64>>>,
}

fn is_rational(weights: &[f64]) -> bool {
    weights.iter().any(|&w| w != 1.0)
}

impl From<&NurbsCurve> for NurbsCurveRecord {
    fn from(curve: &NurbsCurve) -> Self {
        Self {
            degree: curve.p(),
            control_points: curve.cp().iter().map(|p| p.to_array()).collect(),
            weights: is_rational(curve.w()).then(|| curve.w().to_vec()),
            knots: curve.knots().to_vec(),
            multiplicities: curve.mult().to_vec(),
            is_periodic: curve.is_periodic(),
        }
    }
}

impl TryFrom<NurbsCurveRecord> for NurbsCurve {
    type Error = ConstructionError;

    fn try_from(record: NurbsCurveRecord) -> Result<Self, Self::Error> {
        let cp = record.control_points.into_iter().map(Point3::from).collect();
        Self::by_data(
            cp,
            record.knots,
            record.multiplicities,
            record.degree,
            record.weights,
            record.is_periodic,
        )
    }
}

impl From<&NurbsSurface> for NurbsSurfaceRecord {
    fn from(surface: &NurbsSurface) -> Self {
        let weights = surface.w();
        let rational = weights.iter().any(|row| is_rational(row));
        Self {
            u: SplineDirectionRecord {
                degree: surface.p(),
                knots: surface.uknots().to_vec(),
                multiplicities: surface.umult().to_vec(),
                is_periodic: surface.is_u_periodic(),
            },
            v: SplineDirectionRecord {
                degree: surface.q(),
                knots: surface.vknots().to_vec(),
                multiplicities: surface.vmult().to_vec(),
                is_periodic: surface.is_v_periodic(),
            },
            control_points: surface
                .cp()
                .iter()
                .map(|row| row.iter().map(|p| p.to_array()).collect())
                .collect(),
            weights: rational.then_some(weights),
        }
    }
}

impl TryFrom<NurbsSurfaceRecord> for NurbsSurface {
    type Error = ConstructionError;

    fn try_from(record: NurbsSurfaceRecord) -> Result<Self, Self::Error> {
        let cp = record
            .control_points
            .into_iter()
            .map(|row| row.into_iter().map(Point3::from).collect())
            .collect();
        Self::by_data(
            cp,
            record.u.knots,
            record.v.knots,
            record.u.multiplicities,
            record.v.multiplicities,
            record.u.degree,
            record.v.degree,
            record.weights,
            record.u.is_periodic,
            record.v.is_periodic,
        )
    }
}
