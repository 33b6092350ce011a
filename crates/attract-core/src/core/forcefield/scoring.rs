use super::pairlist::{AtomPair, PairList, validate_cutoff};
use super::params::{AttractParams, Dielectric};
use super::potentials::{
    attract_8_6, coulomb_constant_dielectric, coulomb_distance_dependent, switching,
};
use super::term::EnergyTerm;
use crate::core::models::atom::AtomProperty;
use crate::core::models::rigidbody::RigidBody;
use nalgebra::{Point3, Vector3};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ScoringError {
    #[error("Cutoff must be a positive, finite distance (got {0})")]
    InvalidCutoff(f64),
    #[error("Atom {atom_index} has type {type_id}, which has no force-field parameters")]
    UnknownAtomType { atom_index: usize, type_id: usize },
    #[error("Pair ({a}, {b}) is out of range for the scored atoms")]
    PairIndexOutOfRange { a: usize, b: usize },
}

/// Per-atom gradient buffers for the two sides of a pairlist.
pub struct GradientSink<'g> {
    pub a: &'g mut [Vector3<f64>],
    pub b: &'g mut [Vector3<f64>],
}

/// Evaluates ATTRACT non-bonded energies under a fixed cutoff.
#[derive(Debug, Clone, Copy)]
pub struct Scorer<'p> {
    params: &'p AttractParams,
    cutoff: f64,
    cutoff2: f64,
    switch_on2: Option<f64>,
}

impl<'p> Scorer<'p> {
    pub fn new(params: &'p AttractParams, cutoff: f64) -> Result<Self, ScoringError> {
        validate_cutoff(cutoff)?;
        let cutoff2 = cutoff * cutoff;
        let switch_on2 = params
            .globals()
            .switch_on
            .map(|r_on| r_on * r_on)
            .filter(|&r_on2| r_on2 < cutoff2);
        Ok(Self {
            params,
            cutoff,
            cutoff2,
            switch_on2,
        })
    }

    pub fn cutoff(&self) -> f64 {
        self.cutoff
    }

    pub fn params(&self) -> &'p AttractParams {
        self.params
    }

    /// Checks that every atom's type has parameters.
    pub fn validate_types(&self, properties: &[AtomProperty]) -> Result<(), ScoringError> {
        match properties
            .iter()
            .position(|p| !self.params.has_type(p.type_id))
        {
            Some(atom_index) => Err(ScoringError::UnknownAtomType {
                atom_index,
                type_id: properties[atom_index].type_id,
            }),
            None => Ok(()),
        }
    }

    /// Energy of one pair at squared distance `r2`, with `dE/dr²`.
    ///
    /// Pairs at or beyond the cutoff contribute nothing.
    #[inline]
    pub fn pair_energy(
        &self,
        a: &AtomProperty,
        b: &AtomProperty,
        r2: f64,
    ) -> Option<(EnergyTerm, f64)> {
        if r2 >= self.cutoff2 {
            return Some((EnergyTerm::default(), 0.0));
        }
        let coefficients = self.params.pair(a.type_id, b.type_id)?;
        let (vdw, d_vdw) = attract_8_6(r2, coefficients.repulsive, coefficients.attractive);
        let (coulomb, d_coulomb) = if a.charge == 0.0 || b.charge == 0.0 {
            (0.0, 0.0)
        } else {
            match self.params.globals().dielectric {
                Dielectric::DistanceDependent { scale } => {
                    coulomb_distance_dependent(r2, a.charge, b.charge, scale)
                }
                Dielectric::Constant { value } => {
                    coulomb_constant_dielectric(r2, a.charge, b.charge, value)
                }
            }
        };

        let Some(switch_on2) = self.switch_on2 else {
            return Some((EnergyTerm::new(vdw, coulomb), d_vdw + d_coulomb));
        };
        let (s, ds) = switching(r2, switch_on2, self.cutoff2);
        let term = EnergyTerm::new(vdw * s, coulomb * s);
        let derivative = (d_vdw + d_coulomb) * s + (vdw + coulomb) * ds;
        Some((term, derivative))
    }

    /// Sums pair energies over `pairs`, optionally accumulating per-atom gradients.
    ///
    /// Pairs whose current distance is at or beyond the cutoff are skipped, so a
    /// pairlist built with a larger radius gives the same result as one built at the
    /// cutoff.
    ///
    /// # Errors
    ///
    /// Returns [`ScoringError::PairIndexOutOfRange`] when a pair indexes past the atoms
    /// or the gradient buffers of either side.
    pub fn score_pairs(
        &self,
        a: (&[AtomProperty], &[Point3<f64>]),
        b: (&[AtomProperty], &[Point3<f64>]),
        pairs: &[AtomPair],
        mut gradients: Option<GradientSink<'_>>,
    ) -> Result<EnergyTerm, ScoringError> {
        let (props_a, points_a) = a;
        let (props_b, points_b) = b;
        self.validate_types(props_a)?;
        self.validate_types(props_b)?;

        let mut energy = EnergyTerm::default();
        for pair in pairs {
            let out_of_range = ScoringError::PairIndexOutOfRange {
                a: pair.a,
                b: pair.b,
            };
            let (Some(point_a), Some(point_b), Some(prop_a), Some(prop_b)) = (
                points_a.get(pair.a),
                points_b.get(pair.b),
                props_a.get(pair.a),
                props_b.get(pair.b),
            ) else {
                return Err(out_of_range);
            };
            let delta = point_a - point_b;
            let r2 = delta.norm_squared();
            if r2 >= self.cutoff2 {
                continue;
            }
            let (term, derivative) =
                self.pair_energy(prop_a, prop_b, r2)
                    .ok_or(ScoringError::UnknownAtomType {
                        atom_index: pair.a,
                        type_id: prop_a.type_id,
                    })?;
            energy += term;

            if let Some(sink) = gradients.as_mut() {
                let (Some(grad_a), Some(grad_b)) =
                    (sink.a.get_mut(pair.a), sink.b.get_mut(pair.b))
                else {
                    return Err(out_of_range);
                };
                let force = delta * (2.0 * derivative);
                *grad_a += force;
                *grad_b -= force;
            }
        }
        Ok(energy)
    }

    /// Energy between two posed bodies, building the pairlist at the cutoff.
    pub fn score_bodies(&self, a: &RigidBody, b: &RigidBody) -> Result<EnergyTerm, ScoringError> {
        let points_a = a.coordinates();
        let points_b = b.coordinates();
        let pairlist = PairList::from_points(&points_a, &points_b, self.cutoff)?;
        self.score_pairs(
            (a.properties(), points_a.as_slice()),
            (b.properties(), points_b.as_slice()),
            pairlist.pairs(),
            None,
        )
    }
}
