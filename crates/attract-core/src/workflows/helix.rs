use crate::core::models::rigidbody::RigidBody;
use crate::core::superpose::{Screw, superpose, superpose_points, transform_to_screw};
use crate::core::utils::geometry::{distance, try_unit};
use crate::engine::error::EngineError;
use nalgebra::{Point3, Vector3};
use std::f64::consts::TAU;
use tracing::{debug, instrument};

/// Geometry of the helix generated by repeating the move from one monomer to the next.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HelixAnalysis {
    pub screw: Screw,
    /// Rise per full turn in Angstrom; `None` when the monomers are related by a pure
    /// translation.
    pub pitch: Option<f64>,
    pub monomers_per_turn: Option<f64>,
    /// Smallest and largest distance of the first monomer's atoms to the screw axis.
    pub min_axis_distance: f64,
    pub max_axis_distance: f64,
    pub right_handed: bool,
}

/// Screw motion taking `mono1` onto `mono2`, with the derived helix parameters.
///
/// The monomers must have the same atoms in the same order.
///
/// # Errors
///
/// Returns [`EngineError::Superpose`] when the monomers are empty or differ in size.
#[instrument(skip_all, name = "helix_analysis")]
pub fn analyze(mono1: &RigidBody, mono2: &RigidBody) -> Result<HelixAnalysis, EngineError> {
    let superposition = superpose(mono2, mono1)?;
    let screw = transform_to_screw(&superposition.matrix);

    let (min_axis_distance, max_axis_distance) = axis_distance_range(mono1, &screw);
    let monomers_per_turn = (screw.angle > 0.0).then(|| TAU / screw.angle);
    let pitch = monomers_per_turn.map(|n| (screw.translation * n).abs());

    debug!(
        angle = screw.angle,
        translation = screw.translation,
        rmsd = superposition.rmsd,
        "Monomer screw computed."
    );

    Ok(HelixAnalysis {
        screw,
        pitch,
        monomers_per_turn,
        min_axis_distance,
        max_axis_distance,
        right_handed: screw.is_right_handed(),
    })
}

/// Builds `count` copies of `monomer`, each one the previous moved by `screw`.
///
/// Copies get chain ids `A`, `B`, ... cycling after `Z`. With `align_on_z` the monomer is
/// first moved so that the screw axis becomes the z axis through the origin, and the
/// assembly is built around that axis instead.
pub fn construct(
    monomer: &RigidBody,
    screw: &Screw,
    count: usize,
    align_on_z: bool,
) -> Result<RigidBody, EngineError> {
    let mut current = monomer.clone();
    let screw = if align_on_z {
        let axis_point = *screw.point();
        let axis_end = axis_point + screw.axis().into_inner();
        let alignment = superpose_points(
            &[Point3::origin(), Point3::new(0.0, 0.0, 1.0)],
            &[axis_point, axis_end],
        )?;
        current.apply_matrix(&alignment.matrix);
        Screw::new(
            Point3::origin(),
            &Vector3::z(),
            screw.angle,
            screw.translation,
        )
        .map_err(|e| EngineError::Internal(e.to_string()))?
    } else {
        *screw
    };

    let step = screw.to_transform();
    let mut assembly = RigidBody::new();
    for i in 0..count {
        let mut copy = current.clone();
        relabel_chain(&mut copy, &chain_letter(i))?;
        assembly = &assembly + &copy;
        current.apply_matrix(&step);
    }
    Ok(assembly)
}

/// Screws with more monomers per turn than this are rejected by [`groove_width`].
pub const MAX_GROOVE_MONOMERS_PER_TURN: usize = 1000;

/// Narrowest point of the groove at one sampled position along the strand.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GrooveSample {
    /// Rotation about the axis, in radians, of the sample past the second monomer.
    pub angle: f64,
    /// Mean of the closest distances to the strand below and to the strand one turn
    /// above.
    pub width: f64,
    /// Distance from the axis at which `width` was found.
    pub radius: f64,
}

/// Samples the groove between consecutive turns of the helix generated by `screw`.
///
/// A probe follows the helical path of the monomer's center over `count` monomer
/// steps, starting at the second monomer, with two samples per degree of rotation. At
/// each sample the probe sits half a pitch above the strand, at every whole-Angstrom
/// radius from the middle to the outer edge of the monomer, and the radius giving the
/// narrowest groove is kept. Only the four monomers nearest to the probe on each
/// strand are considered.
///
/// # Errors
///
/// Returns [`EngineError::DegenerateHelix`] when the screw does not rotate, needs more
/// than [`MAX_GROOVE_MONOMERS_PER_TURN`] monomers per turn, or the monomer's center
/// lies on the axis, and [`EngineError::Model`] for an empty monomer.
#[instrument(skip_all, name = "groove_width", fields(count = count))]
pub fn groove_width(
    monomer: &RigidBody,
    screw: &Screw,
    count: usize,
) -> Result<Vec<GrooveSample>, EngineError> {
    if !(screw.angle > 0.0) {
        return Err(EngineError::DegenerateHelix(
            "a pure translation has no groove".to_string(),
        ));
    }
    let per_turn = (TAU / screw.angle).ceil();
    if per_turn > MAX_GROOVE_MONOMERS_PER_TURN as f64 {
        return Err(EngineError::DegenerateHelix(format!(
            "{per_turn} monomers per turn exceeds {MAX_GROOVE_MONOMERS_PER_TURN}"
        )));
    }
    let per_turn = per_turn as usize;
    let pitch = screw.translation * TAU / screw.angle;
    let axis = screw.axis().into_inner();
    let (min_distance, max_distance) = axis_distance_range(monomer, screw);
    let first_radius = (0.5 * (min_distance + max_distance)).round() as usize;
    let last_radius = (max_distance.round() as usize).max(first_radius);

    let step = screw.to_transform();
    let center = step.apply(&monomer.find_center()?);
    let mut copies = Vec::with_capacity(count + per_turn + 2);
    let mut current = monomer.coordinates();
    for _ in 0..count + per_turn + 2 {
        let next = current.iter().map(|p| step.apply(p)).collect();
        copies.push(std::mem::replace(&mut current, next));
    }

    let substeps = ((2.0 * screw.angle.to_degrees()).round() as usize).max(1);
    let mut samples = Vec::with_capacity(count * substeps);
    for i in 1..=count {
        let below = &copies[i - 1..=i + 2];
        let above = &copies[i + per_turn - 2..=i + per_turn + 1];
        for j in 1..=substeps {
            let fraction = (i - 1) as f64 + j as f64 / substeps as f64;
            let partial = Screw::new(
                *screw.point(),
                &axis,
                screw.angle * fraction,
                screw.translation * fraction,
            )
            .map_err(|e| EngineError::Internal(e.to_string()))?;
            let probe_center = partial.to_transform().apply(&center);
            let foot = screw.point() + axis * (probe_center - screw.point()).dot(&axis);
            let outward = try_unit(&(probe_center - foot)).map_err(|_| {
                EngineError::DegenerateHelix("monomer center lies on the screw axis".to_string())
            })?;

            let (width, radius) = (first_radius..=last_radius)
                .map(|r| {
                    let radius = r as f64;
                    let probe = foot + outward.into_inner() * radius + axis * (0.5 * pitch);
                    let width = 0.5 * (closest(&probe, below) + closest(&probe, above));
                    (width, radius)
                })
                .fold((f64::INFINITY, 0.0), |best, candidate| {
                    if candidate.0 < best.0 { candidate } else { best }
                });
            samples.push(GrooveSample {
                angle: screw.angle * fraction,
                width,
                radius,
            });
        }
    }
    debug!(
        samples = samples.len(),
        monomers_per_turn = per_turn,
        "Groove sampled."
    );
    Ok(samples)
}

fn closest(probe: &Point3<f64>, copies: &[Vec<Point3<f64>>]) -> f64 {
    copies
        .iter()
        .flatten()
        .map(|p| distance(probe, p))
        .fold(f64::INFINITY, f64::min)
}

fn chain_letter(index: usize) -> String {
    char::from(b'A' + (index % 26) as u8).to_string()
}

fn relabel_chain(body: &mut RigidBody, chain_id: &str) -> Result<(), EngineError> {
    for i in 0..body.len() {
        let mut property = body.atom_property(i)?.clone();
        property.chain_id = chain_id.to_string();
        body.set_atom_property(i, property)?;
    }
    Ok(())
}

fn axis_distance_range(body: &RigidBody, screw: &Screw) -> (f64, f64) {
    body.coordinate_store()
        .iter()
        .map(|p| (p - screw.point()).cross(&screw.axis().into_inner()).norm())
        .fold((f64::INFINITY, 0.0), |(min, max), d| (min.min(d), max.max(d)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::atom::AtomProperty;

    const TOLERANCE: f64 = 1e-6;

    fn monomer() -> RigidBody {
        RigidBody::from_atoms(vec![
            (AtomProperty::new("CA"), Point3::new(6.0, 2.0, 0.0)),
            (AtomProperty::new("CB"), Point3::new(4.0, 5.0, 1.5)),
            (AtomProperty::new("CA"), Point3::new(8.0, 3.0, -1.0)),
            (AtomProperty::new("N"), Point3::new(5.5, -1.0, 0.5)),
        ])
    }

    fn ten_fold_screw(rise: f64) -> Screw {
        Screw::new(Point3::new(1.0, 2.0, 0.0), &Vector3::z(), TAU / 10.0, rise).unwrap()
    }

    fn moved(body: &RigidBody, screw: &Screw) -> RigidBody {
        let mut copy = body.clone();
        copy.apply_matrix(&screw.to_transform());
        copy
    }

    #[test]
    fn analyze_recovers_ten_fold_right_handed_helix() {
        let screw = ten_fold_screw(3.4);
        let analysis = analyze(&monomer(), &moved(&monomer(), &screw)).unwrap();

        assert!((analysis.screw.angle - TAU / 10.0).abs() < TOLERANCE);
        assert!((analysis.screw.translation - 3.4).abs() < TOLERANCE);
        assert!((analysis.screw.axis().z - 1.0).abs() < TOLERANCE);
        assert!((analysis.monomers_per_turn.unwrap() - 10.0).abs() < 1e-4);
        assert!((analysis.pitch.unwrap() - 34.0).abs() < 1e-4);
        assert!(analysis.right_handed);
    }

    #[test]
    fn negative_rise_is_left_handed() {
        let screw = ten_fold_screw(-2.0);
        let analysis = analyze(&monomer(), &moved(&monomer(), &screw)).unwrap();
        assert!(!analysis.right_handed);
        assert!((analysis.pitch.unwrap() - 20.0).abs() < 1e-4);
    }

    #[test]
    fn axis_distances_span_the_monomer() {
        let screw = Screw::new(Point3::origin(), &Vector3::z(), 1.0, 1.0).unwrap();
        let body = RigidBody::from_atoms(vec![
            (AtomProperty::default(), Point3::new(2.0, 0.0, 0.0)),
            (AtomProperty::default(), Point3::new(0.0, 5.0, 1.0)),
            (AtomProperty::default(), Point3::new(3.0, 4.0, -7.0)),
        ]);
        let (min, max) = axis_distance_range(&body, &screw);
        assert!((min - 2.0).abs() < TOLERANCE);
        assert!((max - 5.0).abs() < TOLERANCE);
    }

    #[test]
    fn pure_translation_has_no_pitch() {
        let mut shifted = monomer();
        shifted.translate(&Vector3::new(0.0, 0.0, 4.0));
        let analysis = analyze(&monomer(), &shifted).unwrap();
        assert_eq!(analysis.screw.angle, 0.0);
        assert!(analysis.pitch.is_none());
        assert!(analysis.monomers_per_turn.is_none());
        assert!((analysis.screw.translation - 4.0).abs() < TOLERANCE);
    }

    #[test]
    fn analyze_rejects_mismatched_monomers() {
        let smaller = RigidBody::from_atoms(vec![(AtomProperty::default(), Point3::origin())]);
        assert!(matches!(
            analyze(&monomer(), &smaller),
            Err(EngineError::Superpose { .. })
        ));
    }

    #[test]
    fn construct_stacks_screw_copies_with_chain_ids() {
        let screw = ten_fold_screw(3.4);
        let assembly = construct(&monomer(), &screw, 4, false).unwrap();
        assert_eq!(assembly.len(), 4 * monomer().len());

        let chain_a = assembly.select_chain_id("A").materialize();
        let chain_b = assembly.select_chain_id("B").materialize();
        assert_eq!(chain_a.len(), monomer().len());
        assert_eq!(assembly.select_chain_id("D").len(), monomer().len());
        assert!(assembly.select_chain_id("E").is_empty());

        let expected = moved(&monomer(), &screw);
        for (built, reference) in chain_b.coordinates().iter().zip(expected.coordinates()) {
            assert!((built - reference).norm() < TOLERANCE);
        }

        let analysis = analyze(&chain_a, &chain_b).unwrap();
        assert!((analysis.screw.angle - screw.angle).abs() < TOLERANCE);
        assert!((analysis.screw.translation - screw.translation).abs() < TOLERANCE);
    }

    #[test]
    fn construct_on_z_puts_axis_through_origin() {
        let screw = ten_fold_screw(3.4);
        let original = analyze(&monomer(), &moved(&monomer(), &screw)).unwrap();
        let assembly = construct(&monomer(), &screw, 3, true).unwrap();

        let chain_a = assembly.select_chain_id("A").materialize();
        let chain_b = assembly.select_chain_id("B").materialize();
        let aligned = analyze(&chain_a, &chain_b).unwrap();

        assert!((aligned.screw.axis().z - 1.0).abs() < TOLERANCE);
        assert!(aligned.screw.point().coords.xy().norm() < 1e-5);
        assert!((aligned.min_axis_distance - original.min_axis_distance).abs() < 1e-5);
        assert!((aligned.max_axis_distance - original.max_axis_distance).abs() < 1e-5);
    }

    #[test]
    fn chain_ids_wrap_after_z() {
        let single = RigidBody::from_atoms(vec![(AtomProperty::default(), Point3::new(3.0, 0.0, 0.0))]);
        let assembly = construct(&single, &ten_fold_screw(1.0), 27, false).unwrap();
        assert_eq!(assembly.atom_property(25).unwrap().chain_id, "Z");
        assert_eq!(assembly.atom_property(26).unwrap().chain_id, "A");
        assert!(construct(&single, &ten_fold_screw(1.0), 0, false).unwrap().is_empty());
    }

    fn four_fold_bead_helix() -> (RigidBody, Screw) {
        let bead = RigidBody::from_atoms(vec![(
            AtomProperty::default(),
            Point3::new(8.0, 0.0, 0.0),
        )]);
        let screw = Screw::new(Point3::origin(), &Vector3::z(), TAU / 4.0, 3.0).unwrap();
        (bead, screw)
    }

    #[test]
    fn groove_width_is_half_the_pitch_at_monomer_positions() {
        let (bead, screw) = four_fold_bead_helix();
        let samples = groove_width(&bead, &screw, 3).unwrap();
        assert_eq!(samples.len(), 3 * 180);
        assert!(samples.iter().all(|s| s.radius == 8.0));
        assert!(samples.iter().all(|s| s.width > 6.0 - 1e-9));

        for k in 1..=3 {
            let at_monomer = samples[k * 180 - 1];
            assert!((at_monomer.angle - k as f64 * TAU / 4.0).abs() < 1e-12);
            assert!((at_monomer.width - 6.0).abs() < 1e-9);
        }
        let between = samples[89];
        assert!(between.width > 7.0);
    }

    #[test]
    fn groove_width_rejects_degenerate_helices() {
        let (bead, _) = four_fold_bead_helix();
        let translation = Screw::new(Point3::origin(), &Vector3::z(), 0.0, 3.0).unwrap();
        assert!(matches!(
            groove_width(&bead, &translation, 2),
            Err(EngineError::DegenerateHelix(_))
        ));

        let on_axis = RigidBody::from_atoms(vec![(
            AtomProperty::default(),
            Point3::new(0.0, 0.0, 1.0),
        )]);
        let screw = Screw::new(Point3::origin(), &Vector3::z(), TAU / 4.0, 3.0).unwrap();
        assert!(matches!(
            groove_width(&on_axis, &screw, 2),
            Err(EngineError::DegenerateHelix(_))
        ));
        let nearly_straight = Screw::new(Point3::origin(), &Vector3::z(), 1e-6, 3.0).unwrap();
        assert!(matches!(
            groove_width(&bead, &nearly_straight, 2),
            Err(EngineError::DegenerateHelix(_))
        ));
        assert!(groove_width(&bead, &screw, 0).unwrap().is_empty());
    }
}
