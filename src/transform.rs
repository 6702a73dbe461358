//! Interactive rotation/translation layered on top of the pre-registration.

use crate::registration::PreRegistration;

use nalgebra::{Matrix4, Point3, Rotation3, Translation3, Vector3};

/// User adjustment: rotation in degrees (applied X, then Y, then Z) about a
/// centre point, followed by a translation in mm.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct UserTransform {
    pub rotation: Vector3<f64>,
    pub translation: Vector3<f64>,
}

impl UserTransform {
    pub fn is_identity(&self) -> bool {
        self.rotation == Vector3::zeros() && self.translation == Vector3::zeros()
    }

    /// `T(t) · T(c) · Rz · Ry · Rx · T(-c)`
    pub fn matrix(&self, center: &Point3<f64>) -> Matrix4<f64> {
        let rx = Rotation3::from_axis_angle(&Vector3::x_axis(), self.rotation.x.to_radians());
        let ry = Rotation3::from_axis_angle(&Vector3::y_axis(), self.rotation.y.to_radians());
        let rz = Rotation3::from_axis_angle(&Vector3::z_axis(), self.rotation.z.to_radians());

        let to_origin = Translation3::from(-center.coords).to_homogeneous();
        let back = Translation3::from(center.coords).to_homogeneous();
        let shift = Translation3::from(self.translation).to_homogeneous();

        shift * back * (rz * ry * rx).to_homogeneous() * to_origin
    }
}

/// Holds the pre-registration baseline and the user adjustment and composes
/// them into the transform that drives reslicing.
#[derive(Clone, Debug)]
pub struct TransformCompositor {
    pre_registration: PreRegistration,
    user: UserTransform,
    center: Point3<f64>,
    dirty: bool,
}

impl Default for TransformCompositor {
    fn default() -> Self {
        Self {
            pre_registration: PreRegistration::default(),
            user: UserTransform::default(),
            center: Point3::origin(),
            dirty: true,
        }
    }
}

impl TransformCompositor {
    pub fn set_rotation(&mut self, rx: f64, ry: f64, rz: f64) {
        self.user.rotation = Vector3::new(rx, ry, rz);
        self.dirty = true;
    }

    pub fn set_translation(&mut self, tx: f64, ty: f64, tz: f64) {
        self.user.translation = Vector3::new(tx, ty, tz);
        self.dirty = true;
    }

    /// Zero the user rotation and translation. The pre-registration is kept.
    pub fn reset(&mut self) {
        self.user = UserTransform::default();
        self.dirty = true;
    }

    /// Rotation centre, the physical centre of the fixed volume.
    pub fn set_center(&mut self, center: Point3<f64>) {
        self.center = center;
        self.dirty = true;
    }

    pub fn set_pre_registration(&mut self, pre_registration: PreRegistration) {
        self.pre_registration = pre_registration;
        self.dirty = true;
    }

    pub fn pre_registration(&self) -> &PreRegistration {
        &self.pre_registration
    }

    pub fn user(&self) -> &UserTransform {
        &self.user
    }

    pub fn center(&self) -> &Point3<f64> {
        &self.center
    }

    /// User-only matrix, without the pre-registration.
    pub fn user_matrix(&self) -> Matrix4<f64> {
        self.user.matrix(&self.center)
    }

    /// Pre-registration first, user adjustment on top.
    pub fn current(&self) -> Matrix4<f64> {
        self.user_matrix() * self.pre_registration.to_matrix()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Return the composed matrix and mark the compositor clean.
    pub fn take(&mut self) -> Matrix4<f64> {
        self.dirty = false;
        self.current()
    }
}
