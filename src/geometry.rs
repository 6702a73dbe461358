//! Voxel-to-world geometry of a loaded volume.

use crate::volume::Volume;

use nalgebra::{Matrix3, Matrix4, Point3, Vector3};
use tracing::warn;

/// Whether the direction cosines of a volume were available.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GeometryQuality {
    Full,
    /// No direction cosines in the source; identity rotation was assumed.
    Degraded,
}

/// Affine 4×4 matrix mapping integer voxel indices to patient coordinates (mm).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VoxelToWorld {
    matrix: Matrix4<f64>,
    quality: GeometryQuality,
}

impl Default for VoxelToWorld {
    fn default() -> Self {
        Self {
            matrix: Matrix4::identity(),
            quality: GeometryQuality::Degraded,
        }
    }
}

impl VoxelToWorld {
    /// Build the matrix of `volume`.
    ///
    /// Column `i` of the upper 3×3 block is direction column `i` scaled by
    /// `spacing[i]`. The translation column is `origin_override` when given,
    /// otherwise the origin reported by the reader.
    pub fn resolve(volume: &Volume, origin_override: Option<Point3<f64>>) -> Self {
        let (direction, quality) = match volume.direction() {
            Some(direction) => (*direction, GeometryQuality::Full),
            None => {
                warn!("volume has no direction cosines, assuming identity orientation");
                (Matrix3::identity(), GeometryQuality::Degraded)
            }
        };
        let origin = origin_override.unwrap_or_else(|| volume.origin());
        Self::from_parts(&direction, &volume.spacing(), &origin, quality)
    }

    pub fn from_parts(
        direction: &Matrix3<f64>,
        spacing: &Vector3<f64>,
        origin: &Point3<f64>,
        quality: GeometryQuality,
    ) -> Self {
        let mut matrix = Matrix4::identity();
        for i in 0..3 {
            let column = direction.column(i) * spacing[i];
            matrix.fixed_view_mut::<3, 1>(0, i).copy_from(&column);
        }
        matrix.fixed_view_mut::<3, 1>(0, 3).copy_from(&origin.coords);
        Self { matrix, quality }
    }

    pub fn matrix(&self) -> &Matrix4<f64> {
        &self.matrix
    }

    pub fn quality(&self) -> GeometryQuality {
        self.quality
    }

    /// World position of voxel (0, 0, 0).
    pub fn origin(&self) -> Vector3<f64> {
        self.matrix.fixed_view::<3, 1>(0, 3).into_owned()
    }

    /// Upper 3×3 block with each column scaled back to unit length.
    ///
    /// A zero column is left as is.
    pub fn rotation(&self) -> Matrix3<f64> {
        let mut block: Matrix3<f64> = self.matrix.fixed_view::<3, 3>(0, 0).into_owned();
        for mut column in block.column_iter_mut() {
            let norm = column.norm();
            if norm > 0.0 {
                column /= norm;
            }
        }
        block
    }

    pub fn transform_voxel(&self, index: &Point3<f64>) -> Point3<f64> {
        self.matrix.transform_point(index)
    }
}
