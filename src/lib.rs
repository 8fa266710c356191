#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! NURBS curves and surfaces, a geometric-kernel seam, and structural
//! reference-curve extraction on wing reference surfaces.
//!
//! - [`geom`] holds the curve and surface types with their parametrization,
//!   evaluation and in-place editing operations.
//! - [`kernel`] defines the [`kernel::GeometricKernel`] trait used for
//!   sectioning and projection, plus the built-in [`kernel::NativeKernel`].
//! - [`oml`] owns a reference surface and extracts trimmed curves from it.
//!
//! The library logs through the `log` facade and installs no logger.

pub mod geom;
pub mod kernel;
pub mod oml;
