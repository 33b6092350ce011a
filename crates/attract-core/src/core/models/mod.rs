//! # Core Models Module
//!
//! Data structures that represent molecular assemblies as rigid collections of
//! point particles.
//!
//! ## Key Components
//!
//! - [`atom`] - Per-atom identity and force-field metadata, plus copied atom snapshots
//! - [`coords`] - The lazy-transform coordinate store: raw coordinates plus one pending
//!   rigid transform that is applied on read and baked in on `sync`
//! - [`rigidbody`] - A rigid body owning a coordinate store and index-aligned metadata
//! - [`selection`] - Index-set views over a rigid body with boolean combinators
//!
//! ## Usage
//!
//! ```ignore
//! use attract::core::models::{atom::AtomProperty, rigidbody::RigidBody};
//! use nalgebra::{Point3, Vector3};
//!
//! let mut body = RigidBody::new();
//! body.add_atom(AtomProperty::new("CA"), Point3::new(1.0, 0.0, 0.0));
//! body.translate(&Vector3::new(0.0, 2.0, 0.0));
//! let center = body.find_center()?;
//! ```

pub mod atom;
pub mod coords;
pub mod rigidbody;
pub mod selection;

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("Index {index} is out of range for a collection of {len} atoms")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("Operation requires at least one atom, but the body is empty")]
    EmptyBody,
    #[error("Bodies differ in size ({left} vs {right} atoms)")]
    SizeMismatch { left: usize, right: usize },
}
