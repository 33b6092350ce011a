use super::scoring::ScoringError;
use crate::core::models::rigidbody::RigidBody;
use crate::core::utils::geometry::distance_squared;
use nalgebra::Point3;
use std::collections::HashMap;

/// Above this many candidate pairs the cell grid replaces the exhaustive scan.
const GRID_THRESHOLD: usize = 4096;

/// Cell indices must stay below this magnitude for neighbouring cells to be exact.
const MAX_CELL_INDEX: f64 = (1u64 << 40) as f64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AtomPair {
    /// Index into the first body.
    pub a: usize,
    /// Index into the second body.
    pub b: usize,
}

/// Snapshot of all index pairs `(a, b)` with `distance(a, b) < cutoff`.
///
/// Pairs are ordered by `a`, then by `b`. The list is not updated when either body
/// moves; callers rebuild it.
#[derive(Debug, Clone, PartialEq)]
pub struct PairList {
    cutoff: f64,
    pairs: Vec<AtomPair>,
}

impl PairList {
    /// Builds the pairlist between the effective coordinates of two bodies.
    ///
    /// # Errors
    ///
    /// Returns [`ScoringError::InvalidCutoff`] unless `cutoff` is finite and positive.
    pub fn build(a: &RigidBody, b: &RigidBody, cutoff: f64) -> Result<Self, ScoringError> {
        Self::from_points(&a.coordinates(), &b.coordinates(), cutoff)
    }

    pub fn from_points(
        a: &[Point3<f64>],
        b: &[Point3<f64>],
        cutoff: f64,
    ) -> Result<Self, ScoringError> {
        validate_cutoff(cutoff)?;
        let use_grid = a.len().saturating_mul(b.len()) > GRID_THRESHOLD
            && fits_grid(a, cutoff)
            && fits_grid(b, cutoff);
        let pairs = if use_grid {
            grid_pairs(a, b, cutoff)
        } else {
            brute_force_pairs(a, b, cutoff)
        };
        Ok(Self { cutoff, pairs })
    }

    /// Exhaustive O(|a|·|b|) construction.
    pub fn brute_force(
        a: &[Point3<f64>],
        b: &[Point3<f64>],
        cutoff: f64,
    ) -> Result<Self, ScoringError> {
        validate_cutoff(cutoff)?;
        Ok(Self {
            cutoff,
            pairs: brute_force_pairs(a, b, cutoff),
        })
    }

    pub fn cutoff(&self) -> f64 {
        self.cutoff
    }

    pub fn pairs(&self) -> &[AtomPair] {
        &self.pairs
    }

    pub fn iter(&self) -> std::slice::Iter<'_, AtomPair> {
        self.pairs.iter()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

impl<'a> IntoIterator for &'a PairList {
    type Item = &'a AtomPair;
    type IntoIter = std::slice::Iter<'a, AtomPair>;

    fn into_iter(self) -> Self::IntoIter {
        self.pairs.iter()
    }
}

pub(crate) fn validate_cutoff(cutoff: f64) -> Result<(), ScoringError> {
    if cutoff.is_finite() && cutoff > 0.0 {
        Ok(())
    } else {
        Err(ScoringError::InvalidCutoff(cutoff))
    }
}

fn brute_force_pairs(a: &[Point3<f64>], b: &[Point3<f64>], cutoff: f64) -> Vec<AtomPair> {
    let cutoff2 = cutoff * cutoff;
    let mut pairs = Vec::new();
    for (i, pa) in a.iter().enumerate() {
        for (j, pb) in b.iter().enumerate() {
            if distance_squared(pa, pb) < cutoff2 {
                pairs.push(AtomPair { a: i, b: j });
            }
        }
    }
    pairs
}

type CellKey = (i64, i64, i64);

fn fits_grid(points: &[Point3<f64>], cell_size: f64) -> bool {
    points
        .iter()
        .all(|p| p.coords.iter().all(|c| (c / cell_size).abs() < MAX_CELL_INDEX))
}

fn cell_of(p: &Point3<f64>, cell_size: f64) -> CellKey {
    (
        (p.x / cell_size).floor() as i64,
        (p.y / cell_size).floor() as i64,
        (p.z / cell_size).floor() as i64,
    )
}

fn grid_pairs(a: &[Point3<f64>], b: &[Point3<f64>], cutoff: f64) -> Vec<AtomPair> {
    let cutoff2 = cutoff * cutoff;
    let mut cells: HashMap<CellKey, Vec<usize>> = HashMap::new();
    for (j, pb) in b.iter().enumerate() {
        cells.entry(cell_of(pb, cutoff)).or_default().push(j);
    }

    let mut pairs = Vec::new();
    let mut neighbors = Vec::new();
    for (i, pa) in a.iter().enumerate() {
        let (cx, cy, cz) = cell_of(pa, cutoff);
        neighbors.clear();
        for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    let key = (cx + dx, cy + dy, cz + dz);
                    if let Some(members) = cells.get(&key) {
                        neighbors.extend(
                            members
                                .iter()
                                .copied()
                                .filter(|&j| distance_squared(pa, &b[j]) < cutoff2),
                        );
                    }
                }
            }
        }
        neighbors.sort_unstable();
        pairs.extend(neighbors.iter().map(|&j| AtomPair { a: i, b: j }));
    }
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::atom::AtomProperty;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn line_body(xs: &[f64]) -> RigidBody {
        RigidBody::from_atoms(
            xs.iter()
                .map(|&x| (AtomProperty::default(), Point3::new(x, 0.0, 0.0))),
        )
    }

    fn random_cloud(rng: &mut StdRng, n: usize, extent: f64) -> Vec<Point3<f64>> {
        (0..n)
            .map(|_| {
                Point3::new(
                    rng.gen_range(-extent..extent),
                    rng.gen_range(-extent..extent),
                    rng.gen_range(-extent..extent),
                )
            })
            .collect()
    }

    #[test]
    fn cutoff_just_above_two_finds_single_pair() {
        let receptor = line_body(&[1.0, 2.0]);
        let ligand = line_body(&[4.0, 5.0]);
        let pairlist = PairList::build(&receptor, &ligand, 2.01).unwrap();
        assert_eq!(pairlist.pairs(), &[AtomPair { a: 1, b: 0 }]);
    }

    #[test]
    fn cutoff_just_above_three_finds_three_pairs() {
        let receptor = line_body(&[1.0, 2.0]);
        let ligand = line_body(&[4.0, 5.0]);
        let pairlist = PairList::build(&receptor, &ligand, 3.01).unwrap();
        assert_eq!(
            pairlist.pairs(),
            &[
                AtomPair { a: 0, b: 0 },
                AtomPair { a: 1, b: 0 },
                AtomPair { a: 1, b: 1 },
            ]
        );
    }

    #[test]
    fn pair_at_exactly_cutoff_distance_is_excluded() {
        let receptor = line_body(&[1.0, 2.0]);
        let ligand = line_body(&[4.0, 5.0]);
        let pairlist = PairList::build(&receptor, &ligand, 3.0).unwrap();
        assert_eq!(pairlist.pairs(), &[AtomPair { a: 1, b: 0 }]);
    }

    #[test]
    fn pairlist_uses_effective_coordinates() {
        let receptor = line_body(&[1.0, 2.0]);
        let mut ligand = line_body(&[4.0, 5.0]);
        ligand.translate(&nalgebra::Vector3::new(-2.0, 0.0, 0.0));
        let pairlist = PairList::build(&receptor, &ligand, 1.5).unwrap();
        assert_eq!(
            pairlist.pairs(),
            &[
                AtomPair { a: 0, b: 0 },
                AtomPair { a: 1, b: 0 },
                AtomPair { a: 1, b: 1 },
            ]
        );
    }

    #[test]
    fn non_positive_or_non_finite_cutoff_is_rejected() {
        let body = line_body(&[0.0]);
        for cutoff in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let result = PairList::build(&body, &body, cutoff);
            assert!(matches!(result, Err(ScoringError::InvalidCutoff(_))));
        }
    }

    #[test]
    fn empty_bodies_give_empty_pairlist() {
        let pairlist = PairList::build(&RigidBody::new(), &line_body(&[0.0]), 5.0).unwrap();
        assert!(pairlist.is_empty());
    }

    #[test]
    fn grid_matches_brute_force_exactly() {
        let mut rng = StdRng::seed_from_u64(7);
        for (n, extent, cutoff) in [(120, 15.0, 4.0), (90, 8.0, 6.5), (200, 30.0, 3.0)] {
            let a = random_cloud(&mut rng, n, extent);
            let b = random_cloud(&mut rng, n, extent);
            assert!(n * n > GRID_THRESHOLD);
            let accelerated = PairList::from_points(&a, &b, cutoff).unwrap();
            let exhaustive = PairList::brute_force(&a, &b, cutoff).unwrap();
            assert!(!exhaustive.is_empty());
            assert_eq!(accelerated, exhaustive);
        }
    }

    #[test]
    fn grid_handles_negative_coordinates_on_cell_boundaries() {
        let a: Vec<_> = (0..80)
            .map(|i| Point3::new(-(i as f64), 0.0, 0.0))
            .collect();
        let b: Vec<_> = (0..80)
            .map(|i| Point3::new(-(i as f64) - 2.0, 0.0, 0.0))
            .collect();
        let accelerated = PairList::from_points(&a, &b, 2.0).unwrap();
        let exhaustive = PairList::brute_force(&a, &b, 2.0).unwrap();
        assert_eq!(accelerated, exhaustive);
    }

    #[test]
    fn huge_coordinates_fall_back_to_exhaustive_scan() {
        let a: Vec<_> = (0..70)
            .map(|i| Point3::new(1e300, i as f64, 0.0))
            .collect();
        let b: Vec<_> = (0..70)
            .map(|i| Point3::new(1e300, i as f64 + 0.5, 0.0))
            .collect();
        assert!(!fits_grid(&a, 1.0));
        assert!(fits_grid(&[Point3::new(1e6, -1e6, 0.0)], 1.0));

        let pairlist = PairList::from_points(&a, &b, 1.0).unwrap();
        assert_eq!(pairlist, PairList::brute_force(&a, &b, 1.0).unwrap());
        assert_eq!(pairlist.len(), 70 + 69);
    }
}
