//! Reference-curve extraction on a wing reference surface.
//!
//! The pipeline cuts the reference shape with a basis shape (by default the
//! plane from [`Wing::extract_plane`]), chains the section edges into wires,
//! picks the wire nearest the first point, merges it into one NURBS curve
//! and trims that curve between the two requested points. Every stage either
//! succeeds or aborts the extraction with its own error.

use crate::geom::{
    ConcatError, Curve3, DomainError, NurbsCurve, PlaneSurface, Point3, Tolerance, concatenate_curves,
};
use crate::kernel::{KernelError, Shape, Wire};

use super::Wing;

/// Failures of an extraction stage.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExtractError {
    #[error("points at ({u1}, {v1}) and ({u2}, {v2}) do not define a plane")]
    DegeneratePlane { u1: f64, v1: f64, u2: f64, v2: f64 },
    #[error("intersection failed: {0}")]
    Kernel(#[from] KernelError),
    #[error("failed to extract any curves")]
    NoCurveExtracted,
    #[error("unsupported curve type created: {0}")]
    UnsupportedCurveType(&'static str),
    #[error("could not merge wire edges: {0}")]
    Concat(#[from] ConcatError),
    #[error("failed to invert point {point:?}")]
    FailedToInvertPoint { point: [f64; 3] },
    #[error("curve segment [{t1}, {t2}] is degenerate")]
    DegenerateSegment { t1: f64, t2: f64 },
    #[error("isocurve needs a u or a v parameter")]
    InvalidIsoInput,
    #[error(transparent)]
    Domain(#[from] DomainError),
}

/// Options for [`Wing::extract_curve`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExtractCurveOptions {
    /// Ask the kernel to merge section edges across face boundaries.
    pub refine_edges: bool,
    /// Take the iso-curve directly when no basis shape is given, the two
    /// points share a u or v parameter and the iso-curve lies in the section
    /// plane.
    pub use_iso_shortcut: bool,
    /// Largest gap tolerated between consecutive wire edges.
    pub gap_tolerance: f64,
    /// Distance under which two section edges count as the same edge.
    pub edge_tolerance: f64,
}

impl ExtractCurveOptions {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            refine_edges: true,
            use_iso_shortcut: true,
            gap_tolerance: 1e-6,
            edge_tolerance: 1e-7,
        }
    }

    #[must_use]
    pub const fn refine_edges(mut self, refine: bool) -> Self {
        self.refine_edges = refine;
        self
    }

    #[must_use]
    pub const fn use_iso_shortcut(mut self, enabled: bool) -> Self {
        self.use_iso_shortcut = enabled;
        self
    }

    #[must_use]
    pub const fn with_gap_tolerance(mut self, tolerance: f64) -> Self {
        self.gap_tolerance = tolerance;
        self
    }

    #[must_use]
    pub const fn with_edge_tolerance(mut self, tolerance: f64) -> Self {
        self.edge_tolerance = tolerance;
        self
    }
}

impl Default for ExtractCurveOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// What happened during an extraction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractDiagnostics {
    /// Whether the iso-curve shortcut replaced the intersection.
    pub used_iso_shortcut: bool,
    /// Unique section edges.
    pub edge_count: usize,
    /// Wires built from those edges.
    pub wire_count: usize,
    /// Index of the chosen wire.
    pub selected_wire: Option<usize>,
    /// Whether the curve was reversed to run from the first point.
    pub reversed: bool,
    /// Distances from the requested points to the extracted curve.
    pub endpoint_distances: Option<(f64, f64)>,
    /// Warnings generated during the operation.
    pub warnings: Vec<String>,
}

impl Wing {
    /// Curve in the reference surface between `(u1, v1)` and `(u2, v2)`.
    ///
    /// `basis` is the shape cut against the reference shape; when `None` the
    /// plane from [`Wing::extract_plane`] is used. The points should lie on
    /// or near that section, otherwise they are projected onto it.
    pub fn extract_curve(
        &self,
        u1: f64,
        v1: f64,
        u2: f64,
        v2: f64,
        basis: Option<&Shape>,
        options: ExtractCurveOptions,
    ) -> Result<NurbsCurve, ExtractError> {
        self.extract_curve_with_diagnostics(u1, v1, u2, v2, basis, options)
            .map(|(curve, _)| curve)
    }

    /// [`Wing::extract_curve`], also reporting what the pipeline did.
    pub fn extract_curve_with_diagnostics(
        &self,
        u1: f64,
        v1: f64,
        u2: f64,
        v2: f64,
        basis: Option<&Shape>,
        options: ExtractCurveOptions,
    ) -> Result<(NurbsCurve, ExtractDiagnostics), ExtractError> {
        let mut diagnostics = ExtractDiagnostics::default();
        let p1 = self.eval(u1, v1)?;
        let p2 = self.eval(u2, v2)?;

        let plane;
        let basis = match basis {
            Some(shape) => shape,
            None => {
                let section_plane = self.extract_plane(u1, v1, u2, v2)?;
                if options.use_iso_shortcut {
                    if let Some(curve) =
                        self.iso_shortcut(u1, v1, u2, v2, &section_plane, &mut diagnostics)?
                    {
                        return Ok((curve, diagnostics));
                    }
                }
                plane = Shape::from(section_plane);
                &plane
            }
        };
        log::debug!("extract_curve: cutting {} against {}", basis.kind(), self.sref_shape.kind());

        let section = self.kernel.intersect(basis, &self.sref_shape, options.refine_edges)?;
        let edges = section.unique_edges(options.edge_tolerance);
        let wires = self.kernel.join_edges_to_wires(&edges);
        diagnostics.edge_count = edges.len();
        diagnostics.wire_count = wires.len();
        log::debug!("extract_curve: {} edges in {} wires", edges.len(), wires.len());

        let index = match wires.len() {
            0 => return Err(ExtractError::NoCurveExtracted),
            1 => 0,
            _ => self
                .kernel
                .nearest_shape(p1, &wires)
                .ok_or(ExtractError::NoCurveExtracted)?,
        };
        diagnostics.selected_wire = Some(index);
        let wire = wires.get(index).ok_or(ExtractError::NoCurveExtracted)?;

        let mut curve = merge_wire(wire, options.gap_tolerance)?;
        let (t1, d1) = self.invert_on_curve(p1, &curve)?;
        let (t2, d2) = self.invert_on_curve(p2, &curve)?;
        diagnostics.endpoint_distances = Some((d1, d2));
        for (label, d) in [("first", d1), ("second", d2)] {
            if d > Tolerance::LOOSE.eps {
                let message = format!("{label} point lies {d} from the extracted curve");
                log::warn!("{message}");
                diagnostics.warnings.push(message);
            }
        }

        let (t1, t2) = orient(&mut curve, t1, t2, &mut diagnostics);
        if !curve.segment(t1, t2) {
            return Err(ExtractError::DegenerateSegment { t1, t2 });
        }
        log::debug!("extract_curve: trimmed to [{t1}, {t2}]");
        Ok((curve, diagnostics))
    }

    /// Iso-curve between the points when they share a parameter and the
    /// iso-curve lies in `plane`, `None` otherwise.
    ///
    /// A curve with positive weights lies in a plane exactly when all of its
    /// poles do, so only the poles are tested.
    fn iso_shortcut(
        &self,
        u1: f64,
        v1: f64,
        u2: f64,
        v2: f64,
        plane: &PlaneSurface,
        diagnostics: &mut ExtractDiagnostics,
    ) -> Result<Option<NurbsCurve>, ExtractError> {
        let same = |a: f64, b: f64| Tolerance::PARAMETER.approx_eq_f64(a, b);
        let (mut curve, t1, t2) = if same(u1, u2) {
            (self.sref.u_iso(u1)?, v1, v2)
        } else if same(v1, v2) {
            (self.sref.v_iso(v1)?, u1, u2)
        } else {
            return Ok(None);
        };
        let off_plane = curve
            .cp()
            .iter()
            .map(|&pole| plane.distance(pole).abs())
            .fold(0.0_f64, f64::max);
        if off_plane > Tolerance::LOOSE.eps {
            log::debug!(
                "extract_curve: iso-curve leaves the section plane by {off_plane:e}, intersecting instead"
            );
            return Ok(None);
        }
        diagnostics.used_iso_shortcut = true;
        log::debug!("extract_curve: using iso-curve shortcut");

        let (t1, t2) = orient(&mut curve, t1, t2, diagnostics);
        if !curve.segment(t1, t2) {
            return Err(ExtractError::DegenerateSegment { t1, t2 });
        }
        Ok(Some(curve))
    }

    fn invert_on_curve(&self, point: Point3, curve: &NurbsCurve) -> Result<(f64, f64), ExtractError> {
        self.kernel
            .project_point_to_curve(point, curve)
            .map(|proj| (proj.parameter, proj.distance))
            .ok_or(ExtractError::FailedToInvertPoint { point: point.to_array() })
    }
}

/// Reverse `curve` when needed so that `t1 <= t2`, mapping the parameters
/// onto the reversed curve.
fn orient(curve: &mut NurbsCurve, t1: f64, t2: f64, diagnostics: &mut ExtractDiagnostics) -> (f64, f64) {
    if t1 > t2 {
        curve.reverse();
        diagnostics.reversed = true;
        (curve.reversed_u(t1), curve.reversed_u(t2))
    } else {
        (t1, t2)
    }
}

/// One NURBS curve through every edge of `wire`.
fn merge_wire(wire: &Wire, gap_tolerance: f64) -> Result<NurbsCurve, ExtractError> {
    let curves = wire
        .edges()
        .iter()
        .map(|edge| {
            edge.to_nurbs()
                .ok_or_else(|| ExtractError::UnsupportedCurveType(edge.curve().kind()))
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(concatenate_curves(&curves, gap_tolerance)?)
}
