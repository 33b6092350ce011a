//! Optimal rigid superposition of corresponding point sets and screw-motion
//! decomposition of rigid transforms.
//!
//! [`superpose`] returns the proper rotation plus translation that maps the mobile
//! points onto the reference points with the least sum of squared deviations (Kabsch).
//! [`transform_to_screw`] expresses any rigid transform as a rotation about an axis
//! combined with a translation along that same axis.

use crate::core::models::ModelError;
use crate::core::models::rigidbody::RigidBody;
use crate::core::utils::geometry::{GeometryError, Transform, try_unit};
use nalgebra::{Matrix3, Point3, Rotation3, SVD, Unit, Vector3};
use std::f64::consts::PI;
use thiserror::Error;

/// Below this rotation angle a transform is treated as a pure translation.
const SCREW_ANGLE_EPSILON: f64 = 1e-9;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SuperposeError {
    #[error("Superposition requires at least one point in each set")]
    InsufficientPoints,
    #[error("Point sets differ in size (reference has {reference}, mobile has {mobile})")]
    ShapeMismatch { reference: usize, mobile: usize },
    #[error("Singular value decomposition of the covariance matrix failed")]
    DecompositionFailed,
}

/// Result of a superposition: the transform to apply to the mobile set and the
/// resulting deviation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Superposition {
    pub matrix: Transform,
    pub rmsd: f64,
}

/// Best rigid transform mapping `mobile` onto `reference`, atom by atom.
///
/// # Errors
///
/// Returns [`SuperposeError::InsufficientPoints`] if either body is empty and
/// [`SuperposeError::ShapeMismatch`] if their sizes differ.
pub fn superpose(reference: &RigidBody, mobile: &RigidBody) -> Result<Superposition, SuperposeError> {
    superpose_points(&reference.coordinates(), &mobile.coordinates())
}

pub fn superpose_points(
    reference: &[Point3<f64>],
    mobile: &[Point3<f64>],
) -> Result<Superposition, SuperposeError> {
    if reference.is_empty() || mobile.is_empty() {
        return Err(SuperposeError::InsufficientPoints);
    }
    if reference.len() != mobile.len() {
        return Err(SuperposeError::ShapeMismatch {
            reference: reference.len(),
            mobile: mobile.len(),
        });
    }

    let reference_center = centroid(reference);
    let mobile_center = centroid(mobile);

    let mut covariance = Matrix3::<f64>::zeros();
    for (r, m) in reference.iter().zip(mobile) {
        covariance += (m - mobile_center) * (r - reference_center).transpose();
    }

    let svd = SVD::new(covariance, true, true);
    let u = svd.u.ok_or(SuperposeError::DecompositionFailed)?;
    let mut v = svd
        .v_t
        .ok_or(SuperposeError::DecompositionFailed)?
        .transpose();

    if (v * u.transpose()).determinant() < 0.0 {
        let smallest = svd.singular_values.imin();
        v.column_mut(smallest).neg_mut();
    }
    let rotation = v * u.transpose();
    let translation = reference_center.coords - rotation * mobile_center.coords;
    let matrix = Transform::from_parts(&rotation, &translation);

    let squared: f64 = reference
        .iter()
        .zip(mobile)
        .map(|(r, m)| (matrix.apply(m) - r).norm_squared())
        .sum();
    let rmsd = (squared / reference.len() as f64).sqrt();

    Ok(Superposition { matrix, rmsd })
}

/// Root mean square deviation between the effective coordinates of two bodies,
/// without any fitting.
///
/// # Errors
///
/// Returns [`ModelError::EmptyBody`] if the bodies are empty and
/// [`ModelError::SizeMismatch`] if their sizes differ.
pub fn rmsd(a: &RigidBody, b: &RigidBody) -> Result<f64, ModelError> {
    if a.len() != b.len() {
        return Err(ModelError::SizeMismatch {
            left: a.len(),
            right: b.len(),
        });
    }
    if a.is_empty() {
        return Err(ModelError::EmptyBody);
    }
    let squared: f64 = a
        .coordinate_store()
        .iter()
        .zip(b.coordinate_store().iter())
        .map(|(p, q)| (p - q).norm_squared())
        .sum();
    Ok((squared / a.len() as f64).sqrt())
}

fn centroid(points: &[Point3<f64>]) -> Point3<f64> {
    let sum = points.iter().fold(Vector3::zeros(), |acc, p| acc + p.coords);
    Point3::from(sum / points.len() as f64)
}

/// A rotation by `angle` about the axis through `point` along `axis`, followed by a
/// translation of `translation` along the same axis.
///
/// The sign of `angle * translation` gives the handedness of the motion: positive is
/// right-handed, negative is left-handed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Screw {
    point: Point3<f64>,
    axis: Unit<Vector3<f64>>,
    pub angle: f64,
    pub translation: f64,
}

impl Screw {
    /// # Errors
    ///
    /// Returns [`GeometryError::ZeroLengthVector`] if `axis` has zero length.
    pub fn new(
        point: Point3<f64>,
        axis: &Vector3<f64>,
        angle: f64,
        translation: f64,
    ) -> Result<Self, GeometryError> {
        Ok(Self {
            point,
            axis: try_unit(axis)?,
            angle,
            translation,
        })
    }

    pub fn point(&self) -> &Point3<f64> {
        &self.point
    }

    pub fn axis(&self) -> &Unit<Vector3<f64>> {
        &self.axis
    }

    pub fn is_right_handed(&self) -> bool {
        self.angle * self.translation > 0.0
    }

    pub fn to_transform(&self) -> Transform {
        let rotation = Rotation3::from_axis_angle(&self.axis, self.angle).into_inner();
        let p = self.point.coords;
        let translation = p - rotation * p + self.axis.into_inner() * self.translation;
        Transform::from_parts(&rotation, &translation)
    }
}

/// Decomposes a rigid transform into a screw motion.
///
/// The returned angle lies in `[0, π]`. For a pure translation the axis is the
/// translation direction (the x axis for the identity) and the axis point is the origin.
pub fn transform_to_screw(transform: &Transform) -> Screw {
    let r = transform.rotation_part();
    let t = transform.translation_part();

    let skew = Vector3::new(r[(2, 1)] - r[(1, 2)], r[(0, 2)] - r[(2, 0)], r[(1, 0)] - r[(0, 1)]);
    let cos_angle = ((r.trace() - 1.0) / 2.0).clamp(-1.0, 1.0);
    let angle = (0.5 * skew.norm()).atan2(cos_angle);

    if angle < SCREW_ANGLE_EPSILON {
        let axis = Unit::try_new(t, SCREW_ANGLE_EPSILON).unwrap_or_else(Vector3::x_axis);
        return Screw {
            point: Point3::origin(),
            axis,
            angle: 0.0,
            translation: axis.dot(&t),
        };
    }

    let axis = if PI - angle > 1e-4 {
        Unit::new_normalize(skew)
    } else {
        near_half_turn_axis(&r, cos_angle, &skew)
    };

    let translation = axis.dot(&t);
    let t_perp = t - axis.into_inner() * translation;
    let cot_half = 1.0 / (0.5 * angle).tan();
    let point = 0.5 * (t_perp + cot_half * axis.cross(&t_perp));

    Screw {
        point: Point3::from(point),
        axis,
        angle,
        translation,
    }
}

fn near_half_turn_axis(r: &Matrix3<f64>, cos_angle: f64, skew: &Vector3<f64>) -> Unit<Vector3<f64>> {
    // Symmetric part: cos(a) I + (1 - cos(a)) u u^T
    let outer = ((r + r.transpose()) * 0.5 - Matrix3::identity() * cos_angle) / (1.0 - cos_angle);
    let column = outer.diagonal().imax();
    let candidate = outer.column(column).into_owned();
    let axis = Unit::try_new(candidate, SCREW_ANGLE_EPSILON).unwrap_or_else(Vector3::z_axis);
    if axis.dot(skew) < 0.0 {
        Unit::new_unchecked(-axis.into_inner())
    } else {
        axis
    }
}
