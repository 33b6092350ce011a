use crate::core::models::ModelError;
use crate::core::models::rigidbody::RigidBody;
use crate::core::utils::geometry::euler_rotation;
use nalgebra::Vector3;

/// Number of rigid-body variables per movable body: three Euler angles followed by
/// three translation components.
pub const RIGID_VARIABLES: usize = 6;

/// A rigid body taking part in a minimization, with per-kind mobility flags.
#[derive(Debug, Clone, PartialEq)]
pub struct AttractBody {
    body: RigidBody,
    rotatable: bool,
    translatable: bool,
}

impl AttractBody {
    /// A body that may both rotate and translate.
    pub fn new(body: RigidBody) -> Self {
        Self {
            body,
            rotatable: true,
            translatable: true,
        }
    }

    /// A body held in place, conventionally the receptor.
    pub fn fixed(body: RigidBody) -> Self {
        Self {
            body,
            rotatable: false,
            translatable: false,
        }
    }

    pub fn with_rotation(mut self, rotatable: bool) -> Self {
        self.rotatable = rotatable;
        self
    }

    pub fn with_translation(mut self, translatable: bool) -> Self {
        self.translatable = translatable;
        self
    }

    pub fn body(&self) -> &RigidBody {
        &self.body
    }

    pub fn into_body(self) -> RigidBody {
        self.body
    }

    pub fn is_rotatable(&self) -> bool {
        self.rotatable
    }

    pub fn is_translatable(&self) -> bool {
        self.translatable
    }

    pub fn is_movable(&self) -> bool {
        self.rotatable || self.translatable
    }
}

/// Moves `body` to the pose encoded by `variables`
/// `[phi, theta, chi, tx, ty, tz]`: an Euler rotation about the body's current center
/// followed by a translation.
///
/// This is the same parameterization the force field minimizes over, so applying the
/// minimized variables to the starting body reproduces the minimized pose.
///
/// # Errors
///
/// Returns [`ModelError::EmptyBody`] if the body has no atoms.
pub fn apply_rigid_variables(
    body: &mut RigidBody,
    variables: &[f64; RIGID_VARIABLES],
) -> Result<(), ModelError> {
    let center = body.find_center()?;
    let rotation = euler_rotation(variables[0], variables[1], variables[2]);
    body.rotate_about(&center, &rotation);
    body.translate(&Vector3::new(variables[3], variables[4], variables[5]));
    Ok(())
}
