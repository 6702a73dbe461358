//! Header-based pre-registration of the moving volume onto the fixed volume.

use crate::geometry::{GeometryQuality, VoxelToWorld};

use nalgebra::{Matrix3, Matrix4, Vector3};
use tracing::{debug, warn};

/// Skew above which the pre-registration rotation is reported as not orthonormal.
const ORTHONORMALITY_TOLERANCE: f64 = 1e-6;

/// Rigid transform (rotation + translation) from the moving frame into the fixed frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PreRegistration {
    rotation: Matrix3<f64>,
    translation: Vector3<f64>,
    quality: GeometryQuality,
}

impl Default for PreRegistration {
    fn default() -> Self {
        Self {
            rotation: Matrix3::identity(),
            translation: Vector3::zeros(),
            quality: GeometryQuality::Full,
        }
    }
}

impl PreRegistration {
    /// Rotation `R_fixed^T · R_moving`, translation `origin_moving - origin_fixed`.
    ///
    /// The translation is the raw world-space delta of the two origins and is
    /// not rotated. When either side has no direction cosines the result is
    /// flagged [`GeometryQuality::Degraded`].
    pub fn solve(fixed: &VoxelToWorld, moving: &VoxelToWorld) -> Self {
        let rotation = fixed.rotation().transpose() * moving.rotation();
        let translation = moving.origin() - fixed.origin();
        let quality = match (fixed.quality(), moving.quality()) {
            (GeometryQuality::Full, GeometryQuality::Full) => GeometryQuality::Full,
            _ => GeometryQuality::Degraded,
        };

        let registration = Self {
            rotation,
            translation,
            quality,
        };
        let skew = registration.orthonormality_error();
        if skew > ORTHONORMALITY_TOLERANCE {
            warn!(skew, "pre-registration rotation is not orthonormal");
        }
        debug!(?translation, ?quality, "pre-registration solved");
        registration
    }

    pub fn rotation(&self) -> &Matrix3<f64> {
        &self.rotation
    }

    pub fn translation(&self) -> &Vector3<f64> {
        &self.translation
    }

    pub fn quality(&self) -> GeometryQuality {
        self.quality
    }

    /// Largest deviation of `R^T · R` from the identity.
    pub fn orthonormality_error(&self) -> f64 {
        (self.rotation.transpose() * self.rotation - Matrix3::identity()).amax()
    }

    pub fn to_matrix(&self) -> Matrix4<f64> {
        let mut matrix = self.rotation.to_homogeneous();
        matrix.fixed_view_mut::<3, 1>(0, 3).copy_from(&self.translation);
        matrix
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::{Point3, Rotation3};

    fn geometry(direction: Matrix3<f64>, origin: Point3<f64>) -> VoxelToWorld {
        VoxelToWorld::from_parts(
            &direction,
            &Vector3::new(0.8, 0.8, 3.0),
            &origin,
            GeometryQuality::Full,
        )
    }

    #[test]
    fn identical_geometry_is_identity() {
        let g = geometry(Matrix3::identity(), Point3::new(-120.0, -80.0, 33.0));
        let registration = PreRegistration::solve(&g, &g);
        assert_relative_eq!(*registration.rotation(), Matrix3::identity());
        assert_relative_eq!(*registration.translation(), Vector3::zeros());
        assert_relative_eq!(registration.to_matrix(), Matrix4::identity());
    }

    #[test]
    fn translation_is_raw_origin_delta() {
        let turn = *Rotation3::from_euler_angles(0.0, 0.0, 0.3).matrix();
        let fixed = geometry(turn, Point3::new(0.0, 0.0, 0.0));
        let moving = geometry(Matrix3::identity(), Point3::new(10.0, 0.0, 5.0));
        let registration = PreRegistration::solve(&fixed, &moving);
        assert_relative_eq!(*registration.translation(), Vector3::new(10.0, 0.0, 5.0));
        assert_relative_eq!(*registration.rotation(), turn.transpose(), epsilon = 1e-12);
    }

    #[test]
    fn relative_rotation_between_frames() {
        let a = *Rotation3::from_euler_angles(0.1, 0.2, 0.3).matrix();
        let b = *Rotation3::from_euler_angles(-0.4, 0.0, 0.9).matrix();
        let registration = PreRegistration::solve(
            &geometry(a, Point3::origin()),
            &geometry(b, Point3::origin()),
        );
        assert_relative_eq!(*registration.rotation(), a.transpose() * b, epsilon = 1e-12);
        assert!(registration.orthonormality_error() < 1e-12);
    }

    #[test]
    fn degraded_input_is_flagged() {
        let fixed = VoxelToWorld::default();
        let moving = geometry(Matrix3::identity(), Point3::new(0.0, 0.0, 5.0));
        let registration = PreRegistration::solve(&fixed, &moving);
        assert_eq!(registration.quality(), GeometryQuality::Degraded);
        assert_relative_eq!(*registration.rotation(), Matrix3::identity());
    }
}
