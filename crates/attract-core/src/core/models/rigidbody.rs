use super::ModelError;
use super::atom::{Atom, AtomProperty};
use super::coords::CoordinateStore;
use super::selection::AtomSelection;
use crate::core::utils::geometry::{GeometryError, Transform};
use crate::core::utils::identifiers::{ALPHA_CARBON_NAME, is_backbone_atom, matches_wildcard};
use nalgebra::{Matrix3, Point3, Vector3};
use std::collections::{BTreeMap, HashMap};
use std::ops::Add;

/// A rigid collection of particles: one coordinate store plus index-aligned metadata.
///
/// All movement operations act on the whole body through the store's pending
/// transform. Bodies have value semantics: `clone` copies the raw coordinate buffer,
/// the pending transform and the metadata, so two bodies never observe each other's
/// moves.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RigidBody {
    /// Per-atom identity and force-field metadata, aligned with `coords`.
    properties: Vec<AtomProperty>,
    /// Lazily transformed coordinates.
    coords: CoordinateStore,
    /// Free-form per-atom annotations that have no field on [`AtomProperty`].
    extras: HashMap<usize, BTreeMap<String, String>>,
}

impl RigidBody {
    /// Creates a new, empty rigid body.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a body from ordered `(metadata, coordinate)` pairs, with an identity
    /// pending transform.
    pub fn from_atoms<I>(atoms: I) -> Self
    where
        I: IntoIterator<Item = (AtomProperty, Point3<f64>)>,
    {
        let (properties, points): (Vec<_>, Vec<_>) = atoms.into_iter().unzip();
        Self {
            properties,
            coords: CoordinateStore::from_points(points),
            extras: HashMap::new(),
        }
    }

    /// Appends one atom at the effective coordinate `coords`.
    pub fn add_atom(&mut self, property: AtomProperty, coords: Point3<f64>) {
        self.properties.push(property);
        self.coords.push(coords);
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Effective coordinate of atom `index`.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::IndexOutOfRange`] if `index >= len()`.
    pub fn get_coords(&self, index: usize) -> Result<Point3<f64>, ModelError> {
        self.coords.get(index)
    }

    /// Sets the effective coordinate of atom `index`.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::IndexOutOfRange`] if `index >= len()`.
    pub fn set_coords(&mut self, index: usize, coords: Point3<f64>) -> Result<(), ModelError> {
        self.coords.set(index, coords)
    }

    /// Raw stored coordinate of atom `index`; see [`CoordinateStore::unsafe_get`].
    pub fn unsafe_get_coords(&self, index: usize) -> Result<Point3<f64>, ModelError> {
        self.coords.unsafe_get(index)
    }

    /// Bakes the pending transform into the stored coordinates.
    pub fn sync_coords(&mut self) {
        self.coords.sync();
    }

    pub fn coordinate_store(&self) -> &CoordinateStore {
        &self.coords
    }

    /// Effective coordinates of every atom, in order.
    pub fn coordinates(&self) -> Vec<Point3<f64>> {
        self.coords.to_points()
    }

    pub fn properties(&self) -> &[AtomProperty] {
        &self.properties
    }

    /// Returns the metadata of atom `index`.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::IndexOutOfRange`] if `index >= len()`.
    pub fn atom_property(&self, index: usize) -> Result<&AtomProperty, ModelError> {
        self.properties.get(index).ok_or(ModelError::IndexOutOfRange {
            index,
            len: self.properties.len(),
        })
    }

    /// Replaces the metadata of atom `index`, leaving its coordinate untouched.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::IndexOutOfRange`] if `index >= len()`.
    pub fn set_atom_property(
        &mut self,
        index: usize,
        property: AtomProperty,
    ) -> Result<(), ModelError> {
        let len = self.properties.len();
        let slot = self
            .properties
            .get_mut(index)
            .ok_or(ModelError::IndexOutOfRange { index, len })?;
        *slot = property;
        Ok(())
    }

    /// Returns a snapshot of atom `index` with its current effective coordinate.
    ///
    /// The snapshot is a copy: mutating it does not affect the body.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::IndexOutOfRange`] if `index >= len()`.
    pub fn copy_atom(&self, index: usize) -> Result<Atom, ModelError> {
        let property = self.atom_property(index)?.clone();
        let coords = self.coords.get(index)?;
        Ok(Atom::new(property, coords))
    }

    /// Overwrites both metadata and effective coordinate of atom `index`.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::IndexOutOfRange`] if `index >= len()`.
    pub fn set_atom(&mut self, index: usize, atom: Atom) -> Result<(), ModelError> {
        self.coords.set(index, atom.coords)?;
        self.set_atom_property(index, atom.property)
    }

    /// Iterator over atom snapshots.
    pub fn atoms(&self) -> impl Iterator<Item = Atom> + '_ {
        self.properties
            .iter()
            .zip(self.coords.iter())
            .map(|(property, coords)| Atom::new(property.clone(), coords))
    }

    /// Attaches a free-form annotation to atom `index`.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::IndexOutOfRange`] if `index >= len()`.
    pub fn set_extra(&mut self, index: usize, key: &str, value: &str) -> Result<(), ModelError> {
        let len = self.len();
        if index >= len {
            return Err(ModelError::IndexOutOfRange { index, len });
        }
        self.extras
            .entry(index)
            .or_default()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    pub fn extra(&self, index: usize, key: &str) -> Option<&str> {
        self.extras
            .get(&index)
            .and_then(|entries| entries.get(key))
            .map(String::as_str)
    }

    /// Arithmetic mean of the effective coordinates.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::EmptyBody`] if the body has no atoms.
    pub fn find_center(&self) -> Result<Point3<f64>, ModelError> {
        if self.is_empty() {
            return Err(ModelError::EmptyBody);
        }
        let sum = self
            .coords
            .iter()
            .fold(Vector3::zeros(), |acc, p| acc + p.coords);
        Ok(Point3::from(sum / self.len() as f64))
    }

    /// Largest distance from the center to any atom.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::EmptyBody`] if the body has no atoms.
    pub fn radius(&self) -> Result<f64, ModelError> {
        let center = self.find_center()?;
        Ok(self
            .coords
            .iter()
            .map(|p| (p - center).norm())
            .fold(0.0, f64::max))
    }

    /// Root mean square distance of the atoms from the center.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::EmptyBody`] if the body has no atoms.
    pub fn radius_of_gyration(&self) -> Result<f64, ModelError> {
        let center = self.find_center()?;
        let sum: f64 = self.coords.iter().map(|p| (p - center).norm_squared()).sum();
        Ok((sum / self.len() as f64).sqrt())
    }

    /// Translates the body so that its center sits at the origin.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::EmptyBody`] if the body has no atoms.
    pub fn center_to_origin(&mut self) -> Result<(), ModelError> {
        let center = self.find_center()?;
        self.translate(&-center.coords);
        Ok(())
    }

    pub fn translate(&mut self, v: &Vector3<f64>) {
        self.coords.translate(v);
    }

    /// Rotates the body by `angle` radians about the line through `point` along `axis`.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::ZeroLengthVector`] if `axis` has zero length.
    pub fn rotate(
        &mut self,
        point: &Point3<f64>,
        axis: &Vector3<f64>,
        angle: f64,
    ) -> Result<(), GeometryError> {
        self.coords.rotate(point, axis, angle)
    }

    /// Rotates the body by `angle` radians about the axis running from `a` to `b`.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::ZeroLengthVector`] if `a` and `b` coincide.
    pub fn ab_rotate(
        &mut self,
        a: &Point3<f64>,
        b: &Point3<f64>,
        angle: f64,
    ) -> Result<(), GeometryError> {
        self.coords.rotate(a, &(b - a), angle)
    }

    /// Euler rotation about the origin, `Rz(phi) * Ry(theta) * Rz(chi)`.
    pub fn euler_rotate(&mut self, phi: f64, theta: f64, chi: f64) {
        self.coords.euler_rotate(phi, theta, chi);
    }

    /// Applies `rotation` about `center`.
    pub fn rotate_about(&mut self, center: &Point3<f64>, rotation: &Matrix3<f64>) {
        self.coords.rotate_about(center, rotation);
    }

    /// Applies an arbitrary rigid transform after any pending moves.
    pub fn apply_matrix(&mut self, transform: &Transform) {
        self.coords.apply_transform(transform);
    }

    /// Copies the atoms at `indices` into a new standalone body.
    ///
    /// Coordinates are the current effective ones, so the result starts with an
    /// identity pending transform. Extras follow their atoms to the new indices.
    pub(crate) fn extract(&self, indices: &[usize]) -> Result<RigidBody, ModelError> {
        let mut body = RigidBody::new();
        for (new_index, &old_index) in indices.iter().enumerate() {
            let atom = self.copy_atom(old_index)?;
            body.properties.push(atom.property);
            body.coords.push(atom.coords);
            if let Some(entries) = self.extras.get(&old_index) {
                body.extras.insert(new_index, entries.clone());
            }
        }
        Ok(body)
    }

    /// Concatenation with effective coordinates of both operands.
    ///
    /// Equivalent to syncing copies of `self` and `other` and appending their raw
    /// buffers; neither operand is modified.
    pub fn concat(&self, other: &RigidBody) -> RigidBody {
        let offset = self.len();
        let mut properties = Vec::with_capacity(offset + other.len());
        properties.extend_from_slice(&self.properties);
        properties.extend_from_slice(&other.properties);

        let mut points = self.coords.to_points();
        points.extend(other.coords.iter());

        let mut extras = self.extras.clone();
        extras.extend(
            other
                .extras
                .iter()
                .map(|(index, entries)| (index + offset, entries.clone())),
        );

        RigidBody {
            properties,
            coords: CoordinateStore::from_points(points),
            extras,
        }
    }

    pub fn select_all(&self) -> AtomSelection<'_> {
        AtomSelection::new(self, (0..self.len()).collect())
    }

    /// Selects atoms whose type name matches `pattern` (`*` matches any run).
    pub fn select_atom_type(&self, pattern: &str) -> AtomSelection<'_> {
        self.select_where(|p| matches_wildcard(pattern, &p.atom_type))
    }

    pub fn select_residue_type(&self, residue_type: &str) -> AtomSelection<'_> {
        let wanted = residue_type.trim();
        self.select_where(|p| p.residue_type.trim() == wanted)
    }

    pub fn select_chain_id(&self, chain_id: &str) -> AtomSelection<'_> {
        let wanted = chain_id.trim();
        self.select_where(|p| p.chain_id.trim() == wanted)
    }

    /// Selects atoms with `start <= residue_id <= end`.
    pub fn select_residue_range(&self, start: i32, end: i32) -> AtomSelection<'_> {
        self.select_where(|p| (start..=end).contains(&p.residue_id))
    }

    /// Alpha carbons.
    pub fn ca(&self) -> AtomSelection<'_> {
        self.select_atom_type(ALPHA_CARBON_NAME)
    }

    pub fn backbone(&self) -> AtomSelection<'_> {
        self.select_where(|p| is_backbone_atom(&p.atom_type))
    }

    fn select_where<F>(&self, predicate: F) -> AtomSelection<'_>
    where
        F: Fn(&AtomProperty) -> bool,
    {
        let indices = self
            .properties
            .iter()
            .enumerate()
            .filter(|(_, p)| predicate(p))
            .map(|(i, _)| i)
            .collect();
        AtomSelection::new(self, indices)
    }
}

impl Add for RigidBody {
    type Output = RigidBody;

    fn add(mut self, mut rhs: RigidBody) -> Self::Output {
        self.sync_coords();
        rhs.sync_coords();
        let offset = self.properties.len();
        self.properties.append(&mut rhs.properties);
        for p in rhs.coords.iter() {
            self.coords.push(p);
        }
        self.extras.extend(
            rhs.extras
                .into_iter()
                .map(|(index, entries)| (index + offset, entries)),
        );
        self
    }
}

impl Add<&RigidBody> for &RigidBody {
    type Output = RigidBody;

    fn add(self, rhs: &RigidBody) -> Self::Output {
        self.concat(rhs)
    }
}
