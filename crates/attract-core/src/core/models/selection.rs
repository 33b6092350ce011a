use super::rigidbody::RigidBody;
use nalgebra::Point3;
use std::ops::{BitAnd, BitOr, Not};
use std::ptr;

/// An ordered index subset of one [`RigidBody`].
///
/// A selection borrows its body and copies nothing until [`materialize`](Self::materialize)
/// is called. Indices are kept sorted and unique. Combining selections that belong to
/// different bodies is a programming error and panics.
#[derive(Debug, Clone)]
pub struct AtomSelection<'a> {
    body: &'a RigidBody,
    indices: Vec<usize>,
}

impl<'a> AtomSelection<'a> {
    pub(crate) fn new(body: &'a RigidBody, mut indices: Vec<usize>) -> Self {
        indices.sort_unstable();
        indices.dedup();
        Self { body, indices }
    }

    pub fn body(&self) -> &'a RigidBody {
        self.body
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn contains(&self, index: usize) -> bool {
        self.indices.binary_search(&index).is_ok()
    }

    /// Effective coordinates of the selected atoms, read through the body's pending transform.
    pub fn coordinates(&self) -> Vec<Point3<f64>> {
        let store = self.body.coordinate_store();
        self.indices
            .iter()
            .filter_map(|&i| store.get(i).ok())
            .collect()
    }

    /// Copies the selected atoms into a standalone body with synced coordinates.
    pub fn materialize(&self) -> RigidBody {
        // Indices come from the borrowed body, so extraction cannot go out of range.
        self.body.extract(&self.indices).unwrap_or_default()
    }

    fn assert_same_body(&self, other: &AtomSelection<'_>) {
        assert!(
            ptr::eq(self.body, other.body),
            "cannot combine selections of two different rigid bodies"
        );
    }
}

impl<'a> BitAnd for AtomSelection<'a> {
    type Output = AtomSelection<'a>;

    fn bitand(self, rhs: Self) -> Self::Output {
        self.assert_same_body(&rhs);
        let indices = self
            .indices
            .iter()
            .copied()
            .filter(|&i| rhs.contains(i))
            .collect();
        AtomSelection::new(self.body, indices)
    }
}

impl<'a> BitOr for AtomSelection<'a> {
    type Output = AtomSelection<'a>;

    fn bitor(self, rhs: Self) -> Self::Output {
        self.assert_same_body(&rhs);
        let mut indices = self.indices;
        indices.extend(rhs.indices);
        AtomSelection::new(self.body, indices)
    }
}

impl<'a> Not for AtomSelection<'a> {
    type Output = AtomSelection<'a>;

    fn not(self) -> Self::Output {
        let indices = (0..self.body.len()).filter(|&i| !self.contains(i)).collect();
        AtomSelection::new(self.body, indices)
    }
}

#[cfg(test)]
mod tests {
    use crate::core::models::atom::AtomProperty;
    use crate::core::models::rigidbody::RigidBody;
    use nalgebra::{Point3, Vector3};

    fn residue_atom(atom_type: &str, residue_id: i32) -> AtomProperty {
        AtomProperty {
            atom_type: atom_type.to_string(),
            residue_id,
            ..AtomProperty::default()
        }
    }

    fn chain() -> RigidBody {
        let mut body = RigidBody::new();
        for residue_id in -2..=3 {
            let x = residue_id as f64 * 3.8;
            body.add_atom(residue_atom("N", residue_id), Point3::new(x - 1.0, 0.0, 0.0));
            body.add_atom(residue_atom("CA", residue_id), Point3::new(x, 0.0, 0.0));
            body.add_atom(residue_atom("CB", residue_id), Point3::new(x, 1.5, 0.0));
        }
        body
    }

    #[test]
    fn and_intersects_index_sets() {
        let body = chain();
        let selection = body.ca() & body.select_residue_range(-2, 0);
        assert_eq!(selection.indices(), &[1, 4, 7]);
    }

    #[test]
    fn or_unions_index_sets_in_body_order() {
        let body = chain();
        let selection = body.select_atom_type("CB") | body.select_atom_type("N");
        assert_eq!(selection.len(), 12);
        assert!(selection.indices().windows(2).all(|w| w[0] < w[1]));
        assert!(!selection.contains(1));
    }

    #[test]
    fn not_complements_within_body() {
        let body = chain();
        let not_ca = !body.ca();
        assert_eq!(not_ca.len(), 12);
        assert!((not_ca & body.ca()).is_empty());
        assert_eq!((!body.select_all()).len(), 0);
    }

    #[test]
    fn complement_of_residue_range_partitions_the_body() {
        let body = chain();
        let inside = body.select_residue_range(0, 1);
        let outside = !inside.clone();
        assert_eq!(inside.len() + outside.len(), body.len());
        assert_eq!((inside | outside).len(), body.len());
    }

    #[test]
    fn materialize_copies_effective_coordinates() {
        let mut body = chain();
        body.translate(&Vector3::new(0.0, 0.0, 2.0));
        let ca = body.ca().materialize();
        assert_eq!(ca.len(), 6);
        assert!(ca.coordinate_store().pending_transform().is_identity(0.0));
        for i in 0..ca.len() {
            assert_eq!(ca.atom_property(i).unwrap().atom_type, "CA");
            assert!((ca.get_coords(i).unwrap().z - 2.0).abs() < 1e-12);
        }
    }

    #[test]
    fn materialized_body_is_independent() {
        let body = chain();
        let mut copy = body.select_residue_range(3, 3).materialize();
        copy.translate(&Vector3::new(100.0, 0.0, 0.0));
        assert_eq!(body.get_coords(16).unwrap(), Point3::new(3.0 * 3.8, 0.0, 0.0));
    }

    #[test]
    fn selection_coordinates_follow_pending_moves() {
        let mut body = chain();
        body.translate(&Vector3::new(1.0, 0.0, 0.0));
        let coords = body.ca().coordinates();
        assert_eq!(coords.len(), 6);
        assert!((coords[2].x - 1.0).abs() < 1e-12);
    }

    #[test]
    #[should_panic(expected = "different rigid bodies")]
    fn combining_selections_of_different_bodies_panics() {
        let a = chain();
        let b = chain();
        let _ = a.ca() & b.ca();
    }
}
