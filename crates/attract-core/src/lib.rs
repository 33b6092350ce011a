//! # ATTRACT Core Library
//!
//! A rigid-body docking library: molecular assemblies are represented as point
//! particles grouped into rigid bodies, moved by rigid transformations, scored with
//! a pairlist-based non-bonded force field and refined by bounded quasi-Newton
//! minimization over six degrees of freedom per body.
//!
//! ## Architectural Philosophy
//!
//! The library follows a strict three-layer architecture.
//!
//! - **[`core`]: The Foundation.** Geometry primitives, the lazy-transform coordinate
//!   store, rigid bodies and selections, superposition and screw decomposition, and the
//!   pure mathematical representation of the force field (`potentials`, `pairlist`,
//!   `scoring`).
//!
//! - **[`engine`]: The Logic Core.** The stateful layer: the ATTRACT force field that maps
//!   rigid-body variables onto energies and analytic gradients, the bounded L-BFGS
//!   minimizer, configuration, progress reporting and error types.
//!
//! - **[`workflows`]: The Public API.** Complete procedures built on the two lower
//!   layers: multi-stage docking from a grid of start poses and helical assembly
//!   analysis/construction.

pub mod core;
pub mod engine;
pub mod workflows;
