//! Edge chaining and distance queries on wires.

use crate::geom::{Curve3, Point3};

use super::native::NativeKernelOptions;
use super::project::project_point_to_curve;
use super::shape::{Edge, Wire};

/// Edges chained so far, with the free end points of the chain.
struct Chain {
    edges: Vec<Edge>,
    start: Point3,
    end: Point3,
}

impl Chain {
    fn new(edge: Edge) -> Self {
        Self {
            start: edge.start_point(),
            end: edge.end_point(),
            edges: vec![edge],
        }
    }

    fn is_closed(&self, tolerance: f64) -> bool {
        self.edges.len() > 1 && self.start.distance_to(self.end) < tolerance
    }

    /// Attach `candidate` at whichever free end it touches. Returns the edge
    /// back when it touches neither.
    fn try_attach(&mut self, candidate: Edge, tolerance: f64) -> Result<(), Edge> {
        let (a, b) = (candidate.start_point(), candidate.end_point());
        let near = |p: Point3, q: Point3| p.distance_to(q) < tolerance;

        // Case 1: end of chain meets start of candidate
        if near(self.end, a) {
            self.end = b;
            self.edges.push(candidate);
            return Ok(());
        }
        // Case 2: end of chain meets end of candidate
        if near(self.end, b) {
            self.end = a;
            self.edges.push(candidate);
            return Ok(());
        }
        // Case 3: start of chain meets end of candidate
        if near(self.start, b) {
            self.start = a;
            self.edges.insert(0, candidate);
            return Ok(());
        }
        // Case 4: start of chain meets start of candidate
        if near(self.start, a) {
            self.start = b;
            self.edges.insert(0, candidate);
            return Ok(());
        }
        Err(candidate)
    }
}

/// Group `edges` into connected wires.
///
/// Edges keep their own orientation; a wire only orders them along the
/// chain. Chains are grown from the first unused edge in input order until
/// nothing else touches either end or the chain closes.
#[must_use]
pub fn join_edges_to_wires(edges: &[Edge], tolerance: f64) -> Vec<Wire> {
    let tolerance = tolerance.max(1e-12);
    let mut remaining: Vec<Edge> = edges.iter().rev().cloned().collect();
    let mut wires = Vec::new();

    while let Some(seed) = remaining.pop() {
        let mut chain = Chain::new(seed);
        let mut changed = true;
        while changed && !chain.is_closed(tolerance) {
            changed = false;
            let mut index = remaining.len();
            while index > 0 {
                index -= 1;
                let candidate = remaining.remove(index);
                match chain.try_attach(candidate, tolerance) {
                    Ok(()) => {
                        changed = true;
                        break;
                    }
                    Err(candidate) => remaining.insert(index, candidate),
                }
            }
        }
        wires.push(Wire::new(chain.edges));
    }

    log::debug!("joined {} edges into {} wires", edges.len(), wires.len());
    wires
}

/// Shortest distance from `point` to any edge of `wire`.
///
/// Edges without a NURBS form are sampled. An empty wire is infinitely far.
#[must_use]
pub fn distance_to_wire(point: Point3, wire: &Wire, options: &NativeKernelOptions) -> f64 {
    wire.edges()
        .iter()
        .map(|edge| distance_to_edge(point, edge, options))
        .fold(f64::INFINITY, f64::min)
}

fn distance_to_edge(point: Point3, edge: &Edge, options: &NativeKernelOptions) -> f64 {
    if let Some(curve) = edge.to_nurbs() {
        if let Some(projection) = project_point_to_curve(point, &curve, options) {
            return projection.distance;
        }
    }
    let curve = edge.curve();
    let (a, b) = curve.domain();
    let count = options.samples_per_span.max(1) * 8;
    (0..=count)
        .map(|k| curve.point_at(a + (b - a) * k as f64 / count as f64).distance_to(point))
        .fold(f64::INFINITY, f64::min)
}
