//! # Core Module
//!
//! Stateless building blocks of the docking engine.
//!
//! - **Geometry** ([`utils::geometry`]) - 4x4 rigid transforms, axis-angle and Euler rotations
//! - **Molecular Representation** ([`models`]) - Atoms, the lazy-transform coordinate store,
//!   rigid bodies and index-set selections
//! - **Energy Calculations** ([`forcefield`]) - Parameter tables, pair potentials, pairlists
//!   and pairwise scoring
//! - **Superposition** ([`superpose`]) - Kabsch fitting, RMSD and screw decomposition

pub mod forcefield;
pub mod models;
pub mod superpose;
pub mod utils;
