mod concat;
mod core;
mod curve;
mod error;
pub mod knots;
mod nurbs_curve;
mod nurbs_surface;
pub mod param;
pub mod quadrature;
mod record;
mod surface;

pub use concat::{concatenate_curves, elevate_degree};
pub use core::{HPoint4, Point3, Tolerance, Vec3};
pub use curve::{AnyCurve, Circle3, Curve3, Ellipse3, Line3, TrimmedCurve};
pub use error::{ConcatError, ConstructionError, DomainError};
pub use knots::KnotVector;
pub use nurbs_curve::NurbsCurve;
pub use nurbs_surface::NurbsSurface;
pub use record::{NurbsCurveRecord, NurbsSurfaceRecord, SplineDirectionRecord};
pub use surface::{AnySurface, PlaneSurface, Surface};

#[cfg(test)]
mod tests;
