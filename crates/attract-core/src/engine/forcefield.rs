use super::body::{AttractBody, RIGID_VARIABLES};
use super::config::ForceFieldConfig;
use super::error::EngineError;
use super::minimizer::Objective;
use crate::core::forcefield::pairlist::PairList;
use crate::core::forcefield::params::AttractParams;
use crate::core::forcefield::scoring::{GradientSink, Scorer};
use crate::core::forcefield::term::EnergyTerm;
use crate::core::models::atom::AtomProperty;
use crate::core::models::rigidbody::RigidBody;
use crate::core::utils::geometry::{euler_rotation, euler_rotation_derivatives};
use itertools::Itertools;
use nalgebra::{Matrix3, Point3, Vector3};
use tracing::trace;

/// One body as seen by the force field: its reference pose and the pose of the last
/// evaluation.
#[derive(Debug, Clone)]
struct BodyState {
    properties: Vec<AtomProperty>,
    center: Point3<f64>,
    /// Reference coordinates relative to `center`.
    arms: Vec<Vector3<f64>>,
    rotatable: bool,
    translatable: bool,
    offset: Option<usize>,
    posed: Vec<Point3<f64>>,
    rotation_derivatives: [Matrix3<f64>; 3],
}

impl BodyState {
    fn pose(&mut self, variables: &[f64]) {
        let Some(offset) = self.offset else {
            return;
        };
        let v = &variables[offset..offset + RIGID_VARIABLES];
        let (phi, theta, chi) = if self.rotatable {
            (v[0], v[1], v[2])
        } else {
            (0.0, 0.0, 0.0)
        };
        let translation = if self.translatable {
            Vector3::new(v[3], v[4], v[5])
        } else {
            Vector3::zeros()
        };
        let rotation = euler_rotation(phi, theta, chi);
        self.rotation_derivatives = euler_rotation_derivatives(phi, theta, chi);
        let origin = self.center + translation;
        for (posed, arm) in self.posed.iter_mut().zip(&self.arms) {
            *posed = origin + rotation * arm;
        }
    }
}

/// Pairlist between two bodies, built with the skin and the positions it was built at.
#[derive(Debug, Clone)]
struct CachedPairList {
    i: usize,
    j: usize,
    pairlist: Option<PairList>,
    anchor_i: Vec<Point3<f64>>,
    anchor_j: Vec<Point3<f64>>,
}

impl CachedPairList {
    fn new(i: usize, j: usize) -> Self {
        Self {
            i,
            j,
            pairlist: None,
            anchor_i: Vec::new(),
            anchor_j: Vec::new(),
        }
    }
}

/// The ATTRACT energy of a set of rigid bodies as a function of their rigid-body
/// variables.
///
/// Each movable body owns six consecutive variables `[phi, theta, chi, tx, ty, tz]`,
/// applied as an Euler rotation about the body's center at construction time followed
/// by a translation. Fixed bodies own no variables. Every pair of bodies is scored.
///
/// Pairlists are built at `cutoff + pairlist_skin` and only rebuilt once some atom of
/// either body has moved more than half the skin since the last build. Pairs are still
/// filtered at the cutoff on every evaluation, so reuse never changes the energy.
#[derive(Debug, Clone)]
pub struct AttractForceField<'p> {
    scorer: Scorer<'p>,
    skin: f64,
    bodies: Vec<BodyState>,
    pairlists: Vec<CachedPairList>,
    dimension: usize,
    last_energy: EnergyTerm,
    pairlist_builds: usize,
}

impl<'p> AttractForceField<'p> {
    pub fn new(params: &'p AttractParams, config: ForceFieldConfig) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self {
            scorer: Scorer::new(params, config.cutoff)?,
            skin: config.pairlist_skin,
            bodies: Vec::new(),
            pairlists: Vec::new(),
            dimension: 0,
            last_energy: EnergyTerm::default(),
            pairlist_builds: 0,
        })
    }

    /// Registers a body and returns its index. The body's effective coordinates become
    /// its reference pose.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Model`] for an empty body and [`EngineError::Scoring`]
    /// when an atom type has no parameters.
    pub fn add_body(&mut self, body: AttractBody) -> Result<usize, EngineError> {
        let center = body.body().find_center()?;
        self.scorer.validate_types(body.body().properties())?;

        let posed = body.body().coordinates();
        let arms = posed.iter().map(|p| p - center).collect();
        let offset = body.is_movable().then(|| {
            let offset = self.dimension;
            self.dimension += RIGID_VARIABLES;
            offset
        });

        let index = self.bodies.len();
        self.pairlists = (0..=index)
            .tuple_combinations()
            .map(|(i, j)| CachedPairList::new(i, j))
            .collect();
        self.bodies.push(BodyState {
            rotatable: body.is_rotatable(),
            translatable: body.is_translatable(),
            properties: body.into_body().properties().to_vec(),
            center,
            arms,
            offset,
            posed,
            rotation_derivatives: [Matrix3::zeros(); 3],
        });
        Ok(index)
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Index of the first variable of body `index`, or `None` for a fixed body.
    pub fn variable_offset(&self, index: usize) -> Option<usize> {
        self.bodies.get(index).and_then(|b| b.offset)
    }

    pub fn cutoff(&self) -> f64 {
        self.scorer.cutoff()
    }

    /// Energy terms of the last evaluation.
    pub fn last_energy(&self) -> EnergyTerm {
        self.last_energy
    }

    pub fn vdw(&self) -> f64 {
        self.last_energy.vdw
    }

    pub fn coulomb(&self) -> f64 {
        self.last_energy.coulomb
    }

    /// Number of pairlist constructions so far.
    pub fn pairlist_builds(&self) -> usize {
        self.pairlist_builds
    }

    /// Coordinates of body `index` at the last evaluated pose.
    pub fn posed_coordinates(&self, index: usize) -> Option<&[Point3<f64>]> {
        self.bodies.get(index).map(|b| b.posed.as_slice())
    }

    /// Scores two already posed bodies with a fresh pairlist at `cutoff`, using this
    /// force field's parameters.
    pub fn nonbonded(
        &self,
        a: &RigidBody,
        b: &RigidBody,
        cutoff: f64,
    ) -> Result<EnergyTerm, EngineError> {
        let scorer = Scorer::new(self.scorer.params(), cutoff)?;
        Ok(scorer.score_bodies(a, b)?)
    }

    /// Evaluates the energy at `variables`, writing the analytic gradient into
    /// `gradient` when one is given.
    pub fn energy(
        &mut self,
        variables: &[f64],
        gradient: Option<&mut [f64]>,
    ) -> Result<EnergyTerm, EngineError> {
        if variables.len() != self.dimension {
            return Err(EngineError::Internal(format!(
                "expected {} variables, got {}",
                self.dimension,
                variables.len()
            )));
        }
        for body in &mut self.bodies {
            body.pose(variables);
        }
        self.refresh_pairlists()?;

        let want_gradient = gradient.is_some();
        let mut atom_gradients: Vec<Vec<Vector3<f64>>> = if want_gradient {
            self.bodies
                .iter()
                .map(|b| vec![Vector3::zeros(); b.posed.len()])
                .collect()
        } else {
            Vec::new()
        };

        let mut total = EnergyTerm::default();
        for cached in &self.pairlists {
            let Some(pairlist) = &cached.pairlist else {
                continue;
            };
            let (a, b) = (&self.bodies[cached.i], &self.bodies[cached.j]);
            let sink = if want_gradient {
                let (left, right) = atom_gradients.split_at_mut(cached.j);
                Some(GradientSink {
                    a: left[cached.i].as_mut_slice(),
                    b: right[0].as_mut_slice(),
                })
            } else {
                None
            };
            total += self.scorer.score_pairs(
                (a.properties.as_slice(), a.posed.as_slice()),
                (b.properties.as_slice(), b.posed.as_slice()),
                pairlist.pairs(),
                sink,
            )?;
        }
        self.last_energy = total;

        if let Some(gradient) = gradient {
            gradient.fill(0.0);
            for (body, atoms) in self.bodies.iter().zip(&atom_gradients) {
                let Some(offset) = body.offset else {
                    continue;
                };
                let g = &mut gradient[offset..offset + RIGID_VARIABLES];
                if body.rotatable {
                    for (k, derivative) in body.rotation_derivatives.iter().enumerate() {
                        g[k] = atoms
                            .iter()
                            .zip(&body.arms)
                            .map(|(grad, arm)| grad.dot(&(derivative * arm)))
                            .sum();
                    }
                }
                if body.translatable {
                    let sum: Vector3<f64> = atoms.iter().sum();
                    g[3..].copy_from_slice(sum.as_slice());
                }
            }
        }
        Ok(total)
    }

    fn refresh_pairlists(&mut self) -> Result<(), EngineError> {
        let limit2 = (0.5 * self.skin).powi(2);
        let moved_beyond = |anchor: &[Point3<f64>], posed: &[Point3<f64>]| {
            anchor.len() != posed.len()
                || anchor
                    .iter()
                    .zip(posed)
                    .any(|(a, p)| (p - a).norm_squared() > limit2)
        };
        let radius = self.scorer.cutoff() + self.skin;

        for cached in &mut self.pairlists {
            let (a, b) = (&self.bodies[cached.i], &self.bodies[cached.j]);
            let stale = cached.pairlist.is_none()
                || moved_beyond(&cached.anchor_i, &a.posed)
                || moved_beyond(&cached.anchor_j, &b.posed);
            if !stale {
                continue;
            }
            let pairlist = PairList::from_points(&a.posed, &b.posed, radius)?;
            trace!(
                bodies = ?(cached.i, cached.j),
                pairs = pairlist.len(),
                "Rebuilt pairlist."
            );
            cached.pairlist = Some(pairlist);
            cached.anchor_i.clone_from(&a.posed);
            cached.anchor_j.clone_from(&b.posed);
            self.pairlist_builds += 1;
        }
        Ok(())
    }
}

impl Objective for AttractForceField<'_> {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn bounds(&self) -> Vec<(f64, f64)> {
        let mut bounds = vec![(f64::NEG_INFINITY, f64::INFINITY); self.dimension];
        for body in &self.bodies {
            let Some(offset) = body.offset else {
                continue;
            };
            if !body.rotatable {
                bounds[offset..offset + 3].fill((0.0, 0.0));
            }
            if !body.translatable {
                bounds[offset + 3..offset + RIGID_VARIABLES].fill((0.0, 0.0));
            }
        }
        bounds
    }

    fn evaluate(&mut self, variables: &[f64], gradient: &mut [f64]) -> Result<f64, EngineError> {
        Ok(self.energy(variables, Some(gradient))?.total())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::forcefield::params::{DEFAULT_DIELECTRIC_SCALE, GlobalParams, TypeParam};
    use crate::core::forcefield::potentials::COULOMB_CONSTANT;
    use crate::engine::body::apply_rigid_variables;
    use crate::engine::config::MinimizerConfig;
    use crate::engine::minimizer::{Lbfgs, MinimizationStatus};

    const TOLERANCE: f64 = 1e-9;

    fn params() -> AttractParams {
        AttractParams::new(
            GlobalParams::default(),
            vec![
                TypeParam {
                    type_id: 1,
                    radius: 3.0,
                    amplitude: 1.0,
                },
                TypeParam {
                    type_id: 2,
                    radius: 4.0,
                    amplitude: 10.0,
                },
            ],
        )
        .unwrap()
    }

    fn body(beads: &[(usize, f64, [f64; 3])]) -> RigidBody {
        RigidBody::from_atoms(beads.iter().map(|&(type_id, charge, [x, y, z])| {
            (
                AtomProperty {
                    type_id,
                    charge,
                    ..AtomProperty::default()
                },
                Point3::new(x, y, z),
            )
        }))
    }

    fn receptor() -> RigidBody {
        body(&[
            (1, 0.5, [0.0, 0.0, 0.0]),
            (2, -1.0, [3.0, 1.0, 0.0]),
            (1, 0.0, [0.0, 4.0, 1.0]),
            (2, 0.3, [-2.0, 2.0, -2.0]),
        ])
    }

    fn ligand() -> RigidBody {
        body(&[
            (2, 1.0, [6.0, 2.0, 1.0]),
            (1, -0.5, [7.5, 3.0, 0.0]),
            (2, 0.0, [8.0, 0.5, 2.0]),
        ])
    }

    fn docking_pair(params: &AttractParams, config: ForceFieldConfig) -> AttractForceField<'_> {
        let mut ff = AttractForceField::new(params, config).unwrap();
        ff.add_body(AttractBody::fixed(receptor())).unwrap();
        ff.add_body(AttractBody::new(ligand())).unwrap();
        ff
    }

    #[test]
    fn fixed_bodies_own_no_variables() {
        let params = params();
        let ff = docking_pair(&params, ForceFieldConfig::new(50.0));
        assert_eq!(ff.body_count(), 2);
        assert_eq!(ff.dimension(), RIGID_VARIABLES);
        assert_eq!(ff.variable_offset(0), None);
        assert_eq!(ff.variable_offset(1), Some(0));
    }

    #[test]
    fn add_body_rejects_empty_and_unknown_types() {
        let params = params();
        let mut ff = AttractForceField::new(&params, ForceFieldConfig::new(10.0)).unwrap();
        assert!(matches!(
            ff.add_body(AttractBody::new(RigidBody::new())),
            Err(EngineError::Model { .. })
        ));
        assert!(matches!(
            ff.add_body(AttractBody::new(body(&[(7, 0.0, [0.0, 0.0, 0.0])]))),
            Err(EngineError::Scoring { .. })
        ));
    }

    #[test]
    fn total_is_exactly_vdw_plus_coulomb() {
        let params = params();
        let mut ff = docking_pair(&params, ForceFieldConfig::new(50.0));
        let term = ff
            .energy(&[0.1, -0.2, 0.3, 0.5, 0.0, -0.5], None)
            .unwrap();
        assert_eq!(term.total(), ff.vdw() + ff.coulomb());
        assert!(term.vdw != 0.0 && term.coulomb != 0.0);
    }

    #[test]
    fn zero_variables_match_static_scoring() {
        let params = params();
        let mut ff = docking_pair(&params, ForceFieldConfig::new(50.0));
        let term = ff.energy(&[0.0; RIGID_VARIABLES], None).unwrap();
        let reference = ff.nonbonded(&receptor(), &ligand(), 50.0).unwrap();
        assert!((term.total() - reference.total()).abs() < TOLERANCE);
    }

    #[test]
    fn evaluated_pose_matches_reapplied_variables() {
        let params = params();
        let mut ff = docking_pair(&params, ForceFieldConfig::new(50.0));
        let variables = [0.4, -1.1, 2.0, 1.5, -0.5, 3.0];
        let term = ff.energy(&variables, None).unwrap();

        let mut moved = ligand();
        apply_rigid_variables(&mut moved, &variables).unwrap();
        for (posed, reapplied) in ff.posed_coordinates(1).unwrap().iter().zip(moved.coordinates()) {
            assert!((posed - reapplied).norm() < TOLERANCE);
        }
        let reference = ff.nonbonded(&receptor(), &moved, 50.0).unwrap();
        assert!((term.total() - reference.total()).abs() < TOLERANCE);
    }

    #[test]
    fn analytic_gradient_matches_finite_differences() {
        let params = params();
        let mut ff = docking_pair(&params, ForceFieldConfig::new(100.0));
        let variables = [0.3, 0.7, -0.4, -0.5, 0.8, 0.2];
        let mut gradient = [0.0; RIGID_VARIABLES];
        ff.evaluate(&variables, &mut gradient).unwrap();

        let h = 1e-6;
        for k in 0..RIGID_VARIABLES {
            let mut plus = variables;
            let mut minus = variables;
            plus[k] += h;
            minus[k] -= h;
            let numeric = (ff.energy(&plus, None).unwrap().total()
                - ff.energy(&minus, None).unwrap().total())
                / (2.0 * h);
            let scale = numeric.abs().max(1.0);
            assert!(
                (gradient[k] - numeric).abs() < 1e-5 * scale,
                "variable {k}: analytic {} vs numeric {numeric}",
                gradient[k]
            );
        }
    }

    #[test]
    fn locked_rotation_is_frozen_in_bounds_and_gradient() {
        let params = params();
        let mut ff = AttractForceField::new(&params, ForceFieldConfig::new(50.0)).unwrap();
        ff.add_body(AttractBody::fixed(receptor())).unwrap();
        ff.add_body(AttractBody::new(ligand()).with_rotation(false))
            .unwrap();

        let bounds = ff.bounds();
        assert_eq!(&bounds[..3], &[(0.0, 0.0); 3]);
        assert_eq!(bounds[3], (f64::NEG_INFINITY, f64::INFINITY));

        let mut gradient = [1.0; RIGID_VARIABLES];
        ff.evaluate(&[0.5, 0.5, 0.5, 0.0, 0.0, 0.0], &mut gradient).unwrap();
        assert_eq!(&gradient[..3], &[0.0; 3]);
        assert!(gradient[3..].iter().any(|g| *g != 0.0));
    }

    #[test]
    fn pairlist_reuse_inside_skin_is_exact() {
        let params = params();
        let cutoff = 6.0;
        let mut skinned = docking_pair(&params, ForceFieldConfig::new(cutoff).with_skin(2.0));
        let mut fresh = docking_pair(&params, ForceFieldConfig::new(cutoff).with_skin(0.0));

        let steps = [
            [0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
            [0.0, 0.0, 0.0, -0.3, 0.2, 0.0],
            [0.0, 0.0, 0.0, -0.6, 0.4, 0.1],
            [0.0, 0.0, 0.0, -0.9, 0.1, 0.2],
        ];
        for variables in &steps {
            let reused = skinned.energy(variables, None).unwrap();
            let rebuilt = fresh.energy(variables, None).unwrap();
            assert!((reused.total() - rebuilt.total()).abs() < TOLERANCE);
        }
        assert_eq!(skinned.pairlist_builds(), 1);
        assert_eq!(fresh.pairlist_builds(), steps.len());
    }

    #[test]
    fn three_bodies_score_every_pair() {
        let params = params();
        let third = body(&[(1, 0.2, [-6.0, 0.0, 0.0])]);
        let mut ff = AttractForceField::new(&params, ForceFieldConfig::new(50.0)).unwrap();
        ff.add_body(AttractBody::fixed(receptor())).unwrap();
        ff.add_body(AttractBody::new(ligand())).unwrap();
        ff.add_body(AttractBody::new(third.clone())).unwrap();
        assert_eq!(ff.dimension(), 2 * RIGID_VARIABLES);

        let total = ff.energy(&[0.0; 2 * RIGID_VARIABLES], None).unwrap().total();
        let expected = ff.nonbonded(&receptor(), &ligand(), 50.0).unwrap().total()
            + ff.nonbonded(&receptor(), &third, 50.0).unwrap().total()
            + ff.nonbonded(&ligand(), &third, 50.0).unwrap().total();
        assert!((total - expected).abs() < TOLERANCE);
    }

    #[test]
    fn wrong_variable_count_is_an_error() {
        let params = params();
        let mut ff = docking_pair(&params, ForceFieldConfig::new(50.0));
        assert!(matches!(
            ff.energy(&[0.0; 3], None),
            Err(EngineError::Internal(_))
        ));
    }

    #[test]
    fn minimizer_finds_symmetric_optimum_between_two_fixed_beads() {
        let params = params();
        let receptor = body(&[(2, 0.0, [0.0, 0.0, 0.0]), (2, 0.0, [10.0, 0.0, 0.0])]);
        let probe = body(&[(2, 0.0, [5.0, 5.0, 0.0])]);

        let mut ff = AttractForceField::new(&params, ForceFieldConfig::new(100.0)).unwrap();
        ff.add_body(AttractBody::fixed(receptor)).unwrap();
        ff.add_body(AttractBody::new(probe)).unwrap();

        let mut minimizer = Lbfgs::new(&mut ff, MinimizerConfig::default()).unwrap();
        let status = minimizer.minimize(200).unwrap();
        assert_eq!(status, MinimizationStatus::Converged);

        let expected = [0.0, 0.0, 0.0, 0.0, -5.0, 0.0];
        for (value, target) in minimizer.minimized_variables().iter().zip(expected) {
            assert!((value - target).abs() < 1e-4, "{:?}", minimizer.minimized_variables());
        }
    }

    #[test]
    fn minimizer_finds_symmetric_optimum_between_two_fixed_charges() {
        let params = AttractParams::new(
            GlobalParams::default(),
            vec![TypeParam {
                type_id: 3,
                radius: 1.0,
                amplitude: 0.0,
            }],
        )
        .unwrap();
        let receptor = body(&[(3, 1.0, [0.0, 0.0, 0.0]), (3, 1.0, [10.0, 0.0, 0.0])]);
        let probe = body(&[(3, -1.0, [5.0, 5.0, 0.0])]);

        let mut ff = AttractForceField::new(&params, ForceFieldConfig::new(100.0)).unwrap();
        ff.add_body(AttractBody::fixed(receptor)).unwrap();
        ff.add_body(AttractBody::new(probe)).unwrap();

        let mut minimizer = Lbfgs::new(&mut ff, MinimizerConfig::default()).unwrap();
        let status = minimizer.minimize(200).unwrap();
        assert_eq!(status, MinimizationStatus::Converged);

        let expected = [0.0, 0.0, 0.0, 0.0, -5.0, 0.0];
        for (value, target) in minimizer.minimized_variables().iter().zip(expected) {
            assert!((value - target).abs() < 1e-4, "{:?}", minimizer.minimized_variables());
        }
        let coulomb = -2.0 * COULOMB_CONSTANT / (DEFAULT_DIELECTRIC_SCALE * 25.0);
        assert!((minimizer.energy().unwrap() - coulomb).abs() < 1e-6);
    }
}
