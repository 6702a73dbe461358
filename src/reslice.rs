//! Resampling of the moving volume onto the fixed volume's grid.

use crate::enums::Interpolation;
use crate::interpolator::Interpolator;
use crate::volume::{Extent, Volume};

use nalgebra::{Matrix3, Matrix4, Point3, Vector3};
use ndarray::{Array3, Axis};
use rayon::prelude::*;
use tracing::debug;

/// Output grid of the resampler. Always the fixed volume's grid.
#[derive(Clone, Debug, PartialEq)]
pub struct OutputGrid {
    pub extent: Extent,
    pub spacing: Vector3<f64>,
    pub origin: Point3<f64>,
    pub direction: Option<Matrix3<f64>>,
}

impl OutputGrid {
    pub fn of(volume: &Volume) -> Self {
        Self {
            extent: volume.extent(),
            spacing: volume.spacing(),
            origin: volume.origin(),
            direction: volume.direction().copied(),
        }
    }

    fn dim(&self) -> (usize, usize, usize) {
        (self.extent.len(2), self.extent.len(1), self.extent.len(0))
    }
}

/// Reslices an input volume through a 4×4 matrix.
///
/// The reslice axes map a point of the output grid to the point of the input
/// that is sampled for it. Points falling outside the input read as the
/// background level.
#[derive(Clone, Debug)]
pub struct Resampler {
    grid: Option<OutputGrid>,
    axes: Matrix4<f64>,
    background: f32,
    interpolation: Interpolation,
}

impl Default for Resampler {
    fn default() -> Self {
        Self {
            grid: None,
            axes: Matrix4::identity(),
            background: 0.0,
            interpolation: Interpolation::Linear,
        }
    }
}

impl Resampler {
    pub fn set_output_grid(&mut self, grid: OutputGrid) {
        self.grid = Some(grid);
    }

    pub fn output_grid(&self) -> Option<&OutputGrid> {
        self.grid.as_ref()
    }

    pub fn set_reslice_axes(&mut self, axes: Matrix4<f64>) {
        self.axes = axes;
    }

    pub fn reslice_axes(&self) -> &Matrix4<f64> {
        &self.axes
    }

    pub fn set_background_level(&mut self, background: f32) {
        self.background = background;
    }

    pub fn background_level(&self) -> f32 {
        self.background
    }

    pub fn set_interpolation(&mut self, interpolation: Interpolation) {
        self.interpolation = interpolation;
    }

    pub fn interpolation(&self) -> Interpolation {
        self.interpolation
    }

    /// Resample `input` onto the output grid. `None` until a grid is set.
    pub fn execute(&self, input: &Volume) -> Option<Volume> {
        let grid = self.grid.as_ref()?;
        let dim = grid.dim();
        debug!(?dim, interpolation = ?self.interpolation, "reslicing moving volume");

        let source = input.data().view();
        let in_origin = input.origin().coords;
        let in_spacing = input.spacing();
        let in_min = Vector3::from_fn(|i, _| input.extent().min[i] as f64);
        let out_min = grid.extent.min;

        let mut data = Array3::from_elem(dim, self.background);
        data.axis_iter_mut(Axis(0))
            .into_par_iter()
            .enumerate()
            .for_each(|(k, mut plane)| {
                for ((j, i), value) in plane.indexed_iter_mut() {
                    let voxel = Vector3::new(
                        (out_min[0] + i as i64) as f64,
                        (out_min[1] + j as i64) as f64,
                        (out_min[2] + k as i64) as f64,
                    );
                    let point = grid.origin + voxel.component_mul(&grid.spacing);
                    let mapped = self.axes.transform_point(&point);
                    let index = (mapped.coords - in_origin).component_div(&in_spacing) - in_min;
                    let index = [index.x, index.y, index.z];
                    if let Some(sample) = Interpolator::sample(&source, index, self.interpolation) {
                        *value = sample;
                    }
                }
            });

        Some(Volume::new(data, grid.spacing, grid.origin).with_direction(grid.direction))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Translation3;

    fn volume(origin: Point3<f64>) -> Volume {
        let data = Array3::from_shape_fn((4, 3, 3), |(z, y, x)| (z * 100 + y * 10 + x) as f32);
        Volume::new(data, Vector3::new(1.0, 1.0, 2.0), origin)
    }

    #[test]
    fn no_grid_no_output() {
        assert!(Resampler::default().execute(&volume(Point3::origin())).is_none());
    }

    #[test]
    fn identity_axes_copy_input() {
        let input = volume(Point3::origin());
        let mut resampler = Resampler::default();
        resampler.set_output_grid(OutputGrid::of(&input));
        let output = resampler.execute(&input).expect("grid is set");
        assert_eq!(output.data(), input.data());
        assert_eq!(output.extent(), input.extent());
    }

    #[test]
    fn translation_shifts_samples() {
        let input = volume(Point3::origin());
        let mut resampler = Resampler::default();
        resampler.set_output_grid(OutputGrid::of(&input));
        resampler.set_background_level(-1000.0);
        resampler.set_reslice_axes(Translation3::new(0.0, 0.0, 2.0).to_homogeneous());
        let output = resampler.execute(&input).expect("grid is set");
        // Output slice k samples input slice k + 1.
        assert_eq!(output.data()[[0, 1, 2]], 112.0);
        assert_eq!(output.data()[[2, 0, 0]], 300.0);
        assert_eq!(output.data()[[3, 0, 0]], -1000.0);
    }

    #[test]
    fn output_follows_fixed_grid() {
        let input = volume(Point3::origin());
        let fixed = Volume::new(
            Array3::zeros((2, 2, 2)),
            Vector3::new(2.0, 2.0, 2.0),
            Point3::new(0.0, 0.0, 2.0),
        );
        let mut resampler = Resampler::default();
        resampler.set_interpolation(Interpolation::Nearest);
        resampler.set_output_grid(OutputGrid::of(&fixed));
        let output = resampler.execute(&input).expect("grid is set");
        assert_eq!(output.dim(), (2, 2, 2));
        assert_eq!(output.spacing(), Vector3::new(2.0, 2.0, 2.0));
        // World (2, 2, 4) is input voxel (2, 2, 2).
        assert_eq!(output.data()[[1, 1, 1]], 222.0);
    }
}
