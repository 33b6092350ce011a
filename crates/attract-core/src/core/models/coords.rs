use super::ModelError;
use crate::core::utils::geometry::{GeometryError, Transform};
use nalgebra::{Matrix3, Point3, Vector3};

/// Raw particle coordinates paired with one pending rigid transform.
///
/// The effective coordinate of particle `i` is `pending.apply(raw[i])`. Rigid moves
/// only update `pending`, so repeated rotations and translations cost a 4x4 product
/// instead of a pass over every particle. [`sync`](Self::sync) bakes the pending
/// transform into the raw buffer and resets it to identity.
///
/// Cloning produces an independent raw buffer; two stores never alias.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoordinateStore {
    raw: Vec<Point3<f64>>,
    pending: Transform,
}

impl CoordinateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_points(points: Vec<Point3<f64>>) -> Self {
        Self {
            raw: points,
            pending: Transform::identity(),
        }
    }

    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Effective (transformed) coordinate of particle `index`.
    pub fn get(&self, index: usize) -> Result<Point3<f64>, ModelError> {
        self.raw
            .get(index)
            .map(|p| self.pending.apply(p))
            .ok_or(ModelError::IndexOutOfRange {
                index,
                len: self.raw.len(),
            })
    }

    /// Stores `point` as the new effective coordinate of particle `index`.
    ///
    /// The store is synced first, so `point` is written to the raw buffer as is.
    pub fn set(&mut self, index: usize, point: Point3<f64>) -> Result<(), ModelError> {
        let len = self.raw.len();
        if index >= len {
            return Err(ModelError::IndexOutOfRange { index, len });
        }
        self.sync();
        self.raw[index] = point;
        Ok(())
    }

    /// Raw stored coordinate of particle `index`, ignoring the pending transform.
    ///
    /// Equals [`get`](Self::get) only right after [`sync`](Self::sync).
    pub fn unsafe_get(&self, index: usize) -> Result<Point3<f64>, ModelError> {
        self.raw.get(index).copied().ok_or(ModelError::IndexOutOfRange {
            index,
            len: self.raw.len(),
        })
    }

    /// Appends a particle whose effective coordinate is `point`.
    pub fn push(&mut self, point: Point3<f64>) {
        self.sync();
        self.raw.push(point);
    }

    pub fn sync(&mut self) {
        if self.pending.is_identity(0.0) {
            return;
        }
        let pending = self.pending;
        for p in self.raw.iter_mut() {
            *p = pending.apply(p);
        }
        self.pending = Transform::identity();
    }

    pub fn pending_transform(&self) -> &Transform {
        &self.pending
    }

    /// Composes `transform` after the pending transform.
    pub fn apply_transform(&mut self, transform: &Transform) {
        self.pending = self.pending.then(transform);
    }

    pub fn translate(&mut self, v: &Vector3<f64>) {
        self.apply_transform(&Transform::translation(v));
    }

    pub fn rotate(
        &mut self,
        point: &Point3<f64>,
        axis: &Vector3<f64>,
        angle: f64,
    ) -> Result<(), GeometryError> {
        let rotation = Transform::rotation_about_axis(point, axis, angle)?;
        self.apply_transform(&rotation);
        Ok(())
    }

    /// Euler rotation about the origin.
    pub fn euler_rotate(&mut self, phi: f64, theta: f64, chi: f64) {
        self.apply_transform(&Transform::euler(phi, theta, chi));
    }

    /// Rotation by `rotation` about `center`.
    pub fn rotate_about(&mut self, center: &Point3<f64>, rotation: &Matrix3<f64>) {
        let origin = center.coords;
        let transform = Transform::translation(&-origin)
            .then(&Transform::from_parts(rotation, &Vector3::zeros()))
            .then(&Transform::translation(&origin));
        self.apply_transform(&transform);
    }

    /// Iterator over effective coordinates.
    pub fn iter(&self) -> impl Iterator<Item = Point3<f64>> + '_ {
        self.raw.iter().map(move |p| self.pending.apply(p))
    }

    pub fn to_points(&self) -> Vec<Point3<f64>> {
        self.iter().collect()
    }
}
