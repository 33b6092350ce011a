//! # Workflows Module
//!
//! Top-level procedures that combine the force field, the minimizer and the geometry
//! tools into complete runs.
//!
//! ## Architecture
//!
//! - **Docking** ([`dock`]) - Start-pose generation from translation points and a
//!   rotation table, group partitioning for distributed runs, and multi-stage
//!   minimization of every start pose against a fixed receptor
//! - **Helical Assemblies** ([`helix`]) - Screw analysis of two consecutive monomers,
//!   construction of n-mers by repeated screw application, and groove-width sampling
//!
//! ## Key Capabilities
//!
//! - **Coarse-grained parallelism** over independent start poses (`parallel` feature)
//! - **Progress monitoring** through an optional [`ProgressReporter`] callback
//! - **Trajectory recording** for single-pose diagnostic runs
//!
//! [`ProgressReporter`]: crate::engine::progress::ProgressReporter

pub mod dock;
pub mod helix;
