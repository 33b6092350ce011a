use crate::core::forcefield::params::AttractParams;
use crate::core::forcefield::term::EnergyTerm;
use crate::core::models::rigidbody::RigidBody;
use crate::core::superpose::rmsd;
use crate::engine::body::{AttractBody, RIGID_VARIABLES, apply_rigid_variables};
use crate::engine::config::{ConfigError, DockingConfig};
use crate::engine::error::EngineError;
use crate::engine::forcefield::AttractForceField;
use crate::engine::minimizer::Lbfgs;
use crate::engine::progress::{Progress, ProgressReporter};
use nalgebra::Point3;
use std::f64::consts::TAU;
use tracing::{info, instrument, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Docking Euler angles in radians, in the order used by
/// [`euler_rotation`](crate::core::utils::geometry::euler_rotation).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EulerAngles {
    pub phi: f64,
    pub theta: f64,
    pub chi: f64,
}

/// One start position of the ligand: its center is placed on `translation` after the
/// ligand has been rotated by `rotation` about its own center.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StartPose {
    /// 1-based number of the translation.
    pub translation_id: usize,
    /// 1-based number of the rotation.
    pub rotation_id: usize,
    pub translation: Point3<f64>,
    pub rotation: EulerAngles,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PoseStatus {
    Completed,
    /// A stage's minimizer failed; the pose holds the last accepted variables of that
    /// stage and later stages were skipped.
    MinimizerFailed { stage: usize, reason: String },
}

#[derive(Debug, Clone)]
pub struct PoseResult {
    pub start: StartPose,
    pub status: PoseStatus,
    /// Receptor-ligand energy of the final pose at the configured final cutoff.
    pub energy: EnergyTerm,
    /// RMSD to the reference ligand, when one was given.
    pub rmsd: Option<f64>,
    /// Accepted minimizer iterations summed over all stages.
    pub iterations: usize,
    /// The ligand in its final pose.
    pub ligand: RigidBody,
    /// Per-stage variable trajectories, empty unless trajectory recording is enabled.
    pub trajectories: Vec<Vec<Vec<f64>>>,
}

/// Expands a rotation table into start orientations.
///
/// Each entry of `lines` is a polar angle `theta` in degrees with the number of azimuth
/// steps `nphi` at that polar angle. For every line, `phi` takes the values
/// `(j + 1) * 2π / nphi` for `j` in `0..nphi`, and for every `phi` the spin `chi` takes
/// `(i + 1) * 2π / nchi` for `i` in `0..nchi`.
pub fn rotation_grid(lines: &[(f64, usize)], nchi: usize) -> Vec<EulerAngles> {
    let mut rotations = Vec::with_capacity(lines.iter().map(|(_, nphi)| nphi * nchi).sum());
    for &(theta_degrees, nphi) in lines {
        let theta = theta_degrees.to_radians();
        for j in 0..nphi {
            let phi = (j + 1) as f64 * TAU / nphi as f64;
            for i in 0..nchi {
                let chi = (i + 1) as f64 * TAU / nchi as f64;
                rotations.push(EulerAngles { phi, theta, chi });
            }
        }
    }
    rotations
}

/// Every combination of a translation and a rotation, translation-major, numbered from 1.
pub fn start_poses(translations: &[Point3<f64>], rotations: &[EulerAngles]) -> Vec<StartPose> {
    translations
        .iter()
        .enumerate()
        .flat_map(|(t, translation)| {
            rotations
                .iter()
                .enumerate()
                .map(move |(r, rotation)| StartPose {
                    translation_id: t + 1,
                    rotation_id: r + 1,
                    translation: *translation,
                    rotation: *rotation,
                })
        })
        .collect()
}

/// Splits `items` into `ngroups` consecutive groups and returns group `ngroup` (1-based).
///
/// Every group holds `len / ngroups` items, except the last, which also takes the
/// remainder. Concatenating all groups in order gives back `items`.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidValue`] when `ngroups` is zero or `ngroup` is outside
/// `1..=ngroups`.
pub fn partition_into_groups<T>(
    items: &[T],
    ngroups: usize,
    ngroup: usize,
) -> Result<&[T], ConfigError> {
    if ngroups == 0 {
        return Err(ConfigError::InvalidValue {
            parameter: "ngroups",
            reason: "must be at least 1".to_string(),
        });
    }
    if ngroup == 0 || ngroup > ngroups {
        return Err(ConfigError::InvalidValue {
            parameter: "ngroup",
            reason: format!("must be between 1 and {ngroups}, got {ngroup}"),
        });
    }
    let size = items.len() / ngroups;
    let start = (ngroup - 1) * size;
    if ngroup == ngroups {
        Ok(&items[start..])
    } else {
        Ok(&items[start..start + size])
    }
}

/// Docks `ligand` against the fixed `receptor` from every start pose.
///
/// Each pose is minimized through all configured stages in order. After every stage the
/// minimized variables are applied to the ligand, which becomes the start of the next
/// stage. The final pose is scored at [`DockingConfig::final_cutoff`]. Poses are
/// independent and run in parallel when the `parallel` feature is enabled; results come
/// back in the order of `poses`.
///
/// # Errors
///
/// Minimizer failures are recorded per pose in [`PoseResult::status`]. Any other error
/// (an empty body, an atom type without parameters, a reference of the wrong size)
/// aborts the run.
#[instrument(skip_all, name = "docking_workflow", fields(poses = poses.len()))]
pub fn dock(
    receptor: &RigidBody,
    ligand: &RigidBody,
    poses: &[StartPose],
    params: &AttractParams,
    config: &DockingConfig,
    reference: Option<&RigidBody>,
    reporter: &ProgressReporter,
) -> Result<Vec<PoseResult>, EngineError> {
    info!(
        stages = config.stages.len(),
        receptor_atoms = receptor.len(),
        ligand_atoms = ligand.len(),
        "Starting docking run."
    );
    reporter.report(Progress::RunStart {
        total_poses: poses.len() as u64,
    });

    let context = DockingContext {
        receptor,
        ligand,
        params,
        config,
        reference,
        reporter,
    };

    #[cfg(not(feature = "parallel"))]
    let iterator = poses.iter();

    #[cfg(feature = "parallel")]
    let iterator = poses.par_iter();

    let results: Vec<Result<PoseResult, EngineError>> = iterator
        .enumerate()
        .map(|(index, start)| context.dock_pose(index, start))
        .collect();

    let results = results.into_iter().collect::<Result<Vec<_>, _>>()?;
    reporter.report(Progress::RunFinish);
    info!(poses = results.len(), "Docking run complete.");
    Ok(results)
}

struct DockingContext<'a> {
    receptor: &'a RigidBody,
    ligand: &'a RigidBody,
    params: &'a AttractParams,
    config: &'a DockingConfig,
    reference: Option<&'a RigidBody>,
    reporter: &'a ProgressReporter<'a>,
}

impl DockingContext<'_> {
    fn dock_pose(&self, index: usize, start: &StartPose) -> Result<PoseResult, EngineError> {
        let mut ligand = self.ligand.clone();
        let center = ligand.find_center()?;
        ligand.translate(&-center.coords);
        ligand.euler_rotate(start.rotation.phi, start.rotation.theta, start.rotation.chi);
        ligand.translate(&start.translation.coords);
        ligand.sync_coords();

        let mut status = PoseStatus::Completed;
        let mut iterations = 0;
        let mut trajectories = Vec::new();

        for (stage_index, stage) in self.config.stages.iter().enumerate() {
            let mut forcefield =
                AttractForceField::new(self.params, self.config.force_field_config(stage.cutoff))?;
            forcefield.add_body(AttractBody::fixed(self.receptor.clone()))?;
            forcefield.add_body(AttractBody::new(ligand.clone()))?;

            let mut minimizer = Lbfgs::new(&mut forcefield, self.config.minimizer)?;
            let (variables, failure) = match minimizer.minimize(stage.max_iterations) {
                Ok(_) => (minimizer.minimized_variables().to_vec(), None),
                Err(EngineError::MinimizerFailure {
                    variables, reason, ..
                }) => (variables, Some(reason)),
                Err(e) => return Err(e),
            };
            iterations += minimizer.iteration_count();
            if self.config.minimizer.record_trajectory {
                trajectories.push(minimizer.trajectory().to_vec());
            }

            let variables: [f64; RIGID_VARIABLES] =
                variables.as_slice().try_into().map_err(|_| {
                    EngineError::Internal(format!(
                        "expected {RIGID_VARIABLES} ligand variables, got {}",
                        variables.len()
                    ))
                })?;
            apply_rigid_variables(&mut ligand, &variables)?;
            ligand.sync_coords();

            if let Some(reason) = failure {
                warn!(
                    pose = index,
                    stage = stage_index,
                    %reason,
                    "Minimizer failed; keeping the last accepted pose."
                );
                self.reporter.report(Progress::PoseFailed {
                    pose: index,
                    reason: reason.clone(),
                });
                status = PoseStatus::MinimizerFailed {
                    stage: stage_index,
                    reason,
                };
                break;
            }
        }

        let scoring = AttractForceField::new(
            self.params,
            self.config.force_field_config(self.config.final_cutoff),
        )?;
        let energy = scoring.nonbonded(self.receptor, &ligand, self.config.final_cutoff)?;
        let rmsd = self
            .reference
            .map(|reference| rmsd_to_reference(reference, &ligand))
            .transpose()?;

        if status == PoseStatus::Completed {
            self.reporter.report(Progress::PoseFinished {
                pose: index,
                energy: energy.total(),
                iterations,
            });
        }

        Ok(PoseResult {
            start: *start,
            status,
            energy,
            rmsd,
            iterations,
            ligand,
            trajectories,
        })
    }
}

/// RMSD over alpha carbons when the reference has any, over all atoms otherwise.
fn rmsd_to_reference(reference: &RigidBody, ligand: &RigidBody) -> Result<f64, EngineError> {
    let reference_ca = reference.ca();
    if reference_ca.is_empty() {
        return Ok(rmsd(reference, ligand)?);
    }
    let ligand_ca = ligand.ca().materialize();
    Ok(rmsd(&reference_ca.materialize(), &ligand_ca)?)
}
