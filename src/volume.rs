use crate::enums::{Orientation, RowOrder};

use nalgebra::{Matrix3, Point3, Vector3};
use ndarray::{Array3, ArrayView2, Axis, s};
use rayon::prelude::*;

/// Inclusive index bounds of a volume per axis, in `(x, y, z)` order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Extent {
    pub min: [i64; 3],
    pub max: [i64; 3],
}

impl Extent {
    /// Extent starting at index 0 for an array of shape `(depth, height, width)`.
    pub fn from_dim(dim: (usize, usize, usize)) -> Self {
        let (depth, height, width) = dim;
        Self {
            min: [0, 0, 0],
            max: [width as i64 - 1, height as i64 - 1, depth as i64 - 1],
        }
    }

    pub fn len(&self, axis: usize) -> usize {
        (self.max[axis] - self.min[axis] + 1).max(0) as usize
    }

    /// True when some axis holds no index.
    pub fn is_empty(&self) -> bool {
        (0..3).any(|axis| self.max[axis] < self.min[axis])
    }

    /// Bounds of the slice index for an orientation.
    pub fn range(&self, orientation: Orientation) -> (i64, i64) {
        let axis = orientation.fixed_axis();
        (self.min[axis], self.max[axis])
    }

    /// Clamp `index` into the axis bounds and return the zero-based offset.
    ///
    /// The axis must not be empty.
    pub fn clamp_offset(&self, axis: usize, index: i64) -> usize {
        (index.clamp(self.min[axis], self.max[axis]) - self.min[axis]) as usize
    }

    /// Voxel-space centre of the extent.
    pub fn center(&self) -> Vector3<f64> {
        Vector3::from_fn(|i, _| 0.5 * (self.min[i] + self.max[i]) as f64)
    }
}

/// A scalar volume with its header geometry.
///
/// Voxels are stored `(z, y, x)`. Spacing, origin and direction are expressed
/// in `(x, y, z)` order. A volume is never mutated in place; operations that
/// change voxels return a new volume.
#[derive(Clone, Debug)]
pub struct Volume {
    data: Array3<f32>,
    spacing: Vector3<f64>,
    origin: Point3<f64>,
    direction: Option<Matrix3<f64>>,
    row_order: RowOrder,
}

impl Volume {
    pub fn new(data: Array3<f32>, spacing: Vector3<f64>, origin: Point3<f64>) -> Self {
        Self {
            data,
            spacing,
            origin,
            direction: None,
            row_order: RowOrder::TopDown,
        }
    }

    /// Declare the row order of `data` as delivered by the reader.
    pub fn with_row_order(mut self, row_order: RowOrder) -> Self {
        self.row_order = row_order;
        self
    }

    /// Attach direction cosines. Columns are the world directions of the x, y and z voxel axes.
    pub fn with_direction(mut self, direction: Option<Matrix3<f64>>) -> Self {
        self.direction = direction;
        self
    }

    /// Get the dimensions of the volume (depth, height, width)
    pub fn dim(&self) -> (usize, usize, usize) {
        self.data.dim()
    }

    /// Get a reference to the underlying data
    pub fn data(&self) -> &Array3<f32> {
        &self.data
    }

    pub fn spacing(&self) -> Vector3<f64> {
        self.spacing
    }

    /// Reader-reported world position of voxel (0, 0, 0).
    pub fn origin(&self) -> Point3<f64> {
        self.origin
    }

    pub fn direction(&self) -> Option<&Matrix3<f64>> {
        self.direction.as_ref()
    }

    pub fn row_order(&self) -> RowOrder {
        self.row_order
    }

    pub fn extent(&self) -> Extent {
        Extent::from_dim(self.dim())
    }

    /// True when the volume has no voxel along some axis.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Reverse the rows (the y axis) keeping the geometry.
    pub fn flip_rows(self) -> Self {
        let Self {
            mut data,
            spacing,
            origin,
            direction,
            row_order,
        } = self;
        data.invert_axis(Axis(1));
        Self {
            data: data.as_standard_layout().into_owned(),
            spacing,
            origin,
            direction,
            row_order: match row_order {
                RowOrder::TopDown => RowOrder::BottomUp,
                RowOrder::BottomUp => RowOrder::TopDown,
            },
        }
    }

    /// Flip bottom-up data so that row 0 is the top row.
    pub fn into_top_down(self) -> Self {
        match self.row_order {
            RowOrder::TopDown => self,
            RowOrder::BottomUp => self.flip_rows(),
        }
    }

    pub fn min_value(&self) -> Option<f32> {
        self.data
            .as_slice_memory_order()?
            .par_iter()
            .copied()
            .reduce_with(f32::min)
    }

    /// Physical centre of the volume, from extent, spacing and origin.
    pub fn center_world(&self) -> Point3<f64> {
        self.origin + self.extent().center().component_mul(&self.spacing)
    }

    /// In-plane `(row, column)` spacing of a slice in the given orientation.
    pub fn plane_spacing(&self, orientation: &Orientation) -> (f64, f64) {
        let s = self.spacing;
        match orientation {
            Orientation::Axial => (s.y, s.x),
            Orientation::Coronal => (s.z, s.x),
            Orientation::Sagittal => (s.z, s.y),
        }
    }

    /// Slice at an extent index, clamped into the valid range of the axis.
    pub fn get_slice_from_axis(
        &self,
        index: i64,
        orientation: &Orientation,
    ) -> ArrayView2<'_, f32> {
        let offset = self.extent().clamp_offset(orientation.fixed_axis(), index);
        match orientation {
            Orientation::Axial => self.data.slice(s![offset, .., ..]),
            Orientation::Coronal => self.data.slice(s![.., offset, ..]),
            Orientation::Sagittal => self.data.slice(s![.., .., offset]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(dim: (usize, usize, usize)) -> Volume {
        let data = Array3::from_shape_fn(dim, |(z, y, x)| (z * 100 + y * 10 + x) as f32);
        Volume::new(data, Vector3::new(1.0, 1.0, 2.0), Point3::origin())
    }

    #[test]
    fn extent_matches_dimensions() {
        let volume = ramp((10, 4, 3));
        let extent = volume.extent();
        assert_eq!(extent.min, [0, 0, 0]);
        assert_eq!(extent.max, [2, 3, 9]);
        assert_eq!(extent.range(Orientation::Axial), (0, 9));
        assert_eq!(extent.range(Orientation::Sagittal), (0, 2));
    }

    #[test]
    fn empty_axis_is_detected() {
        let volume = Volume::new(Array3::zeros((0, 4, 4)), Vector3::repeat(1.0), Point3::origin());
        assert!(volume.is_empty());
        assert!(volume.extent().is_empty());
        assert!(!ramp((1, 1, 1)).extent().is_empty());
    }

    #[test]
    fn slices_follow_orientation() {
        let volume = ramp((3, 4, 5));
        assert_eq!(volume.get_slice_from_axis(1, &Orientation::Axial).dim(), (4, 5));
        assert_eq!(volume.get_slice_from_axis(1, &Orientation::Coronal).dim(), (3, 5));
        assert_eq!(volume.get_slice_from_axis(1, &Orientation::Sagittal).dim(), (3, 4));
        assert_eq!(volume.get_slice_from_axis(2, &Orientation::Axial)[[1, 3]], 213.0);
    }

    #[test]
    fn out_of_range_index_is_clamped() {
        let volume = ramp((3, 4, 5));
        let low = volume.get_slice_from_axis(-7, &Orientation::Axial);
        let high = volume.get_slice_from_axis(99, &Orientation::Axial);
        assert_eq!(low[[0, 0]], 0.0);
        assert_eq!(high[[0, 0]], 200.0);
    }

    #[test]
    fn flip_reverses_rows_only() {
        let volume = ramp((2, 3, 2)).flip_rows();
        assert_eq!(volume.data()[[0, 0, 1]], 21.0);
        assert_eq!(volume.data()[[1, 2, 0]], 100.0);
        assert_eq!(volume.origin(), Point3::origin());
        assert_eq!(volume.row_order(), RowOrder::BottomUp);
    }

    #[test]
    fn top_down_normalisation_flips_once() {
        let volume = ramp((1, 3, 1)).with_row_order(RowOrder::BottomUp).into_top_down();
        assert_eq!(volume.row_order(), RowOrder::TopDown);
        assert_eq!(volume.data()[[0, 0, 0]], 20.0);
        let untouched = ramp((1, 3, 1)).into_top_down();
        assert_eq!(untouched.data()[[0, 0, 0]], 0.0);
    }

    #[test]
    fn center_uses_spacing_and_origin() {
        let data = Array3::zeros((10, 5, 5));
        let volume = Volume::new(data, Vector3::new(1.0, 1.0, 2.0), Point3::new(1.0, 2.0, 3.0));
        assert_eq!(volume.center_world(), Point3::new(3.0, 4.0, 12.0));
    }

    #[test]
    fn min_value_scans_all_voxels() {
        let mut data = Array3::from_elem((2, 2, 2), 5.0f32);
        data[[1, 0, 1]] = -1024.0;
        let volume = Volume::new(data, Vector3::repeat(1.0), Point3::origin());
        assert_eq!(volume.min_value(), Some(-1024.0));
    }
}
