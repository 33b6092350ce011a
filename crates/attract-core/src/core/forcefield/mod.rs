//! # Force Field Module
//!
//! This module provides the non-bonded interaction model used to score and minimize
//! rigid-body docking poses with the ATTRACT coarse-grained force field.
//!
//! ## Overview
//!
//! Interaction energies are summed over pairs of beads closer than a cutoff. Each pair
//! contributes:
//!
//! - **Van der Waals** energy from the soft 8-6 potential, with pair coefficients
//!   combined from per-type radii and amplitudes
//! - **Electrostatic** energy from Coulomb's law with either a distance-dependent or a
//!   constant dielectric
//! - An optional **switching function** that brings both terms smoothly to zero at the
//!   cutoff
//!
//! ## Key Components
//!
//! - [`params`] - Immutable parameter table and its TOML/CSV loader
//! - [`pairlist`] - Cutoff-based pair enumeration between two bodies
//! - [`scoring`] - Pair energies, energy sums over pairlists and per-atom gradients
//! - [`term`] - Energy term aggregation and reporting
//!
//! ## Usage
//!
//! ```ignore
//! use attract::core::forcefield::{params::AttractParams, scoring::Scorer};
//!
//! let params = AttractParams::load(&globals_path, &types_path)?;
//! let scorer = Scorer::new(&params, 10.0)?;
//! let energy = scorer.score_bodies(&receptor, &ligand)?;
//! println!("vdw = {}, coulomb = {}", energy.vdw, energy.coulomb);
//! ```

pub mod pairlist;
pub mod params;
pub(crate) mod potentials;
pub mod scoring;
pub mod term;
