use nalgebra::{Matrix3, Matrix4, Point3, Rotation3, Unit, Vector3};
use std::fmt;
use std::ops::Mul;
use thiserror::Error;

const ZERO_LENGTH_EPSILON: f64 = 1e-12;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum GeometryError {
    #[error("Element ({row}, {col}) is out of bounds for a 4x4 transform")]
    IndexOutOfRange { row: usize, col: usize },
    #[error("Cannot derive a direction from a zero-length vector")]
    ZeroLengthVector,
}

#[inline]
pub fn distance(a: &Point3<f64>, b: &Point3<f64>) -> f64 {
    (a - b).norm()
}

#[inline]
pub fn distance_squared(a: &Point3<f64>, b: &Point3<f64>) -> f64 {
    (a - b).norm_squared()
}

/// Normalizes `v`, failing instead of producing a NaN or zero direction.
pub fn try_unit(v: &Vector3<f64>) -> Result<Unit<Vector3<f64>>, GeometryError> {
    Unit::try_new(*v, ZERO_LENGTH_EPSILON).ok_or(GeometryError::ZeroLengthVector)
}

/// Rotation matrix for the docking Euler angles.
///
/// The convention is `Rz(phi) * Ry(theta) * Rz(chi)` acting on column vectors, so `chi`
/// is applied first. Minimized angles are re-applied through this same function.
pub fn euler_rotation(phi: f64, theta: f64, chi: f64) -> Matrix3<f64> {
    rot_z(phi) * rot_y(theta) * rot_z(chi)
}

/// Partial derivatives of [`euler_rotation`] with respect to `phi`, `theta` and `chi`.
pub fn euler_rotation_derivatives(phi: f64, theta: f64, chi: f64) -> [Matrix3<f64>; 3] {
    let (rz_phi, ry_theta, rz_chi) = (rot_z(phi), rot_y(theta), rot_z(chi));
    [
        d_rot_z(phi) * ry_theta * rz_chi,
        rz_phi * d_rot_y(theta) * rz_chi,
        rz_phi * ry_theta * d_rot_z(chi),
    ]
}

fn rot_z(angle: f64) -> Matrix3<f64> {
    Rotation3::from_axis_angle(&Vector3::z_axis(), angle).into_inner()
}

fn rot_y(angle: f64) -> Matrix3<f64> {
    Rotation3::from_axis_angle(&Vector3::y_axis(), angle).into_inner()
}

fn d_rot_z(angle: f64) -> Matrix3<f64> {
    let (s, c) = angle.sin_cos();
    Matrix3::new(-s, -c, 0.0, c, -s, 0.0, 0.0, 0.0, 0.0)
}

fn d_rot_y(angle: f64) -> Matrix3<f64> {
    let (s, c) = angle.sin_cos();
    Matrix3::new(-s, 0.0, c, 0.0, 0.0, 0.0, -c, 0.0, -s)
}

/// An affine rigid transform stored as a 4x4 homogeneous matrix.
///
/// Points are treated as column vectors with an implicit `w = 1`. Composition is
/// expressed with [`Transform::then`]: `a.then(&b)` applies `a` first, then `b`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    matrix: Matrix4<f64>,
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

impl Transform {
    pub fn identity() -> Self {
        Self {
            matrix: Matrix4::identity(),
        }
    }

    pub fn from_matrix(matrix: Matrix4<f64>) -> Self {
        Self { matrix }
    }

    pub fn from_parts(rotation: &Matrix3<f64>, translation: &Vector3<f64>) -> Self {
        let mut matrix = Matrix4::identity();
        matrix.fixed_view_mut::<3, 3>(0, 0).copy_from(rotation);
        matrix.fixed_view_mut::<3, 1>(0, 3).copy_from(translation);
        Self { matrix }
    }

    pub fn translation(v: &Vector3<f64>) -> Self {
        Self::from_parts(&Matrix3::identity(), v)
    }

    /// Rotation by `angle` radians (right-hand rule) about the line through `point`
    /// with direction `axis`.
    pub fn rotation_about_axis(
        point: &Point3<f64>,
        axis: &Vector3<f64>,
        angle: f64,
    ) -> Result<Self, GeometryError> {
        let unit_axis = try_unit(axis)?;
        let rotation = Rotation3::from_axis_angle(&unit_axis, angle).into_inner();
        let origin = point.coords;
        Ok(Self::translation(&-origin)
            .then(&Self::from_parts(&rotation, &Vector3::zeros()))
            .then(&Self::translation(&origin)))
    }

    /// Euler rotation about the origin, see [`euler_rotation`].
    pub fn euler(phi: f64, theta: f64, chi: f64) -> Self {
        Self::from_parts(&euler_rotation(phi, theta, chi), &Vector3::zeros())
    }

    pub fn matrix(&self) -> &Matrix4<f64> {
        &self.matrix
    }

    pub fn rotation_part(&self) -> Matrix3<f64> {
        self.matrix.fixed_view::<3, 3>(0, 0).into_owned()
    }

    pub fn translation_part(&self) -> Vector3<f64> {
        self.matrix.fixed_view::<3, 1>(0, 3).into_owned()
    }

    pub fn get(&self, row: usize, col: usize) -> Result<f64, GeometryError> {
        self.matrix
            .get((row, col))
            .copied()
            .ok_or(GeometryError::IndexOutOfRange { row, col })
    }

    pub fn set(&mut self, row: usize, col: usize, value: f64) -> Result<(), GeometryError> {
        let slot = self
            .matrix
            .get_mut((row, col))
            .ok_or(GeometryError::IndexOutOfRange { row, col })?;
        *slot = value;
        Ok(())
    }

    /// Returns the transform that applies `self` first and `next` second.
    #[inline]
    pub fn then(&self, next: &Transform) -> Transform {
        Transform {
            matrix: next.matrix * self.matrix,
        }
    }

    #[inline]
    pub fn apply(&self, point: &Point3<f64>) -> Point3<f64> {
        let m = &self.matrix;
        Point3::new(
            m[(0, 0)] * point.x + m[(0, 1)] * point.y + m[(0, 2)] * point.z + m[(0, 3)],
            m[(1, 0)] * point.x + m[(1, 1)] * point.y + m[(1, 2)] * point.z + m[(1, 3)],
            m[(2, 0)] * point.x + m[(2, 1)] * point.y + m[(2, 2)] * point.z + m[(2, 3)],
        )
    }

    pub fn is_identity(&self, epsilon: f64) -> bool {
        (self.matrix - Matrix4::identity()).amax() <= epsilon
    }
}

impl Mul for Transform {
    type Output = Transform;

    fn mul(self, rhs: Transform) -> Self::Output {
        Transform {
            matrix: self.matrix * rhs.matrix,
        }
    }
}

impl fmt::Display for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in 0..4 {
            let line: Vec<String> = (0..4)
                .map(|col| format!("{:12.6}", self.matrix[(row, col)]))
                .collect();
            writeln!(f, "{}", line.join(" "))?;
        }
        Ok(())
    }
}
