//! # Engine Module
//!
//! The stateful layer of the library: everything that turns a set of rigid bodies and
//! a parameter table into a minimization problem and solves it.
//!
//! ## Overview
//!
//! Each movable body contributes six variables, three Euler angles and a translation,
//! applied about the body's center. The force field maps those variables onto the
//! ATTRACT energy and its analytic gradient; the minimizer drives them downhill under
//! per-variable bounds that freeze the axes a body is not allowed to move along.
//!
//! ## Architecture
//!
//! - **Bodies** ([`body`]) - Mobility flags and re-application of minimized variables
//! - **Force Field** ([`forcefield`]) - Multi-body energy and gradient with Verlet-skin
//!   pairlist reuse
//! - **Minimizer** ([`minimizer`]) - Bounded L-BFGS over any [`minimizer::Objective`]
//! - **Configuration** ([`config`]) - Minimizer, force-field and docking settings
//! - **Progress Monitoring** ([`progress`]) - Optional callback for run events
//! - **Error Handling** ([`error`]) - Engine-level error type
//!
//! ## Usage
//!
//! ```ignore
//! use attract::engine::body::AttractBody;
//! use attract::engine::config::{ForceFieldConfig, MinimizerConfig};
//! use attract::engine::forcefield::AttractForceField;
//! use attract::engine::minimizer::Lbfgs;
//!
//! let mut ff = AttractForceField::new(&params, ForceFieldConfig::new(50.0))?;
//! ff.add_body(AttractBody::fixed(receptor))?;
//! ff.add_body(AttractBody::new(ligand))?;
//!
//! let mut minimizer = Lbfgs::new(&mut ff, MinimizerConfig::default())?;
//! let status = minimizer.minimize(100)?;
//! let variables = minimizer.minimized_variables().to_vec();
//! ```

pub mod body;
pub mod config;
pub mod error;
pub mod forcefield;
pub(crate) mod line_search;
pub mod minimizer;
pub mod progress;
