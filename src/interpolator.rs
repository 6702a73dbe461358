use crate::enums::Interpolation;

use ndarray::ArrayView3;

/// Voxels within this distance outside the grid still sample the edge value.
const BORDER: f64 = 0.5;

pub(crate) struct Interpolator;

impl Interpolator {
    /// Sample `volume` (stored `(z, y, x)`) at a continuous `(x, y, z)` index.
    ///
    /// Returns `None` for points further than half a voxel outside the grid.
    #[inline]
    pub(crate) fn sample(
        volume: &ArrayView3<f32>,
        index: [f64; 3],
        interpolation: Interpolation,
    ) -> Option<f32> {
        let (depth, height, width) = volume.dim();
        let size = [width, height, depth];
        if size.contains(&0) {
            return None;
        }

        let mut clamped = [0.0; 3];
        for axis in 0..3 {
            let upper = (size[axis] - 1) as f64;
            let value = index[axis];
            if !(-BORDER..=upper + BORDER).contains(&value) {
                return None;
            }
            clamped[axis] = value.clamp(0.0, upper);
        }

        Some(match interpolation {
            Interpolation::Nearest => Self::nearest(volume, clamped),
            Interpolation::Linear => Self::trilinear_interpolate(volume, clamped),
        })
    }

    #[inline]
    fn nearest(volume: &ArrayView3<f32>, [x, y, z]: [f64; 3]) -> f32 {
        volume[[z.round() as usize, y.round() as usize, x.round() as usize]]
    }

    #[inline]
    pub(crate) fn trilinear_interpolate(volume: &ArrayView3<f32>, [x, y, z]: [f64; 3]) -> f32 {
        let (depth, height, width) = volume.dim();

        let x0 = x.floor() as usize;
        let y0 = y.floor() as usize;
        let z0 = z.floor() as usize;
        let x1 = (x0 + 1).min(width - 1);
        let y1 = (y0 + 1).min(height - 1);
        let z1 = (z0 + 1).min(depth - 1);

        let dx = (x - x0 as f64) as f32;
        let dy = (y - y0 as f64) as f32;
        let dz = (z - z0 as f64) as f32;
        let one_minus_dx = 1.0 - dx;
        let one_minus_dy = 1.0 - dy;
        let one_minus_dz = 1.0 - dz;

        let lerp_row = |zi: usize, yi: usize| {
            volume[[zi, yi, x0]].mul_add(one_minus_dx, volume[[zi, yi, x1]] * dx)
        };

        let v00 = lerp_row(z0, y0);
        let v01 = lerp_row(z0, y1);
        let v10 = lerp_row(z1, y0);
        let v11 = lerp_row(z1, y1);

        let v0 = v00.mul_add(one_minus_dy, v01 * dy);
        let v1 = v10.mul_add(one_minus_dy, v11 * dy);

        v0.mul_add(one_minus_dz, v1 * dz)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    fn ramp() -> Array3<f32> {
        Array3::from_shape_fn((2, 2, 2), |(z, y, x)| (z * 4 + y * 2 + x) as f32)
    }

    #[test]
    fn grid_points_are_exact() {
        let volume = ramp();
        let view = volume.view();
        for mode in [Interpolation::Linear, Interpolation::Nearest] {
            assert_eq!(Interpolator::sample(&view, [1.0, 0.0, 1.0], mode), Some(5.0));
        }
    }

    #[test]
    fn linear_blends_neighbours() {
        let volume = ramp();
        let value = Interpolator::sample(&volume.view(), [0.5, 0.5, 0.5], Interpolation::Linear);
        assert_eq!(value, Some(3.5));
    }

    #[test]
    fn nearest_rounds() {
        let volume = ramp();
        let value = Interpolator::sample(&volume.view(), [0.6, 0.2, 0.9], Interpolation::Nearest);
        assert_eq!(value, Some(5.0));
    }

    #[test]
    fn half_voxel_border_then_background() {
        let volume = ramp();
        let view = volume.view();
        let linear = |index| Interpolator::sample(&view, index, Interpolation::Linear);
        assert_eq!(linear([-0.4, 0.0, 0.0]), Some(0.0));
        assert_eq!(linear([1.4, 1.0, 1.0]), Some(7.0));
        assert_eq!(linear([-0.6, 0.0, 0.0]), None);
        let nearest = Interpolator::sample(&view, [0.0, 0.0, f64::NAN], Interpolation::Nearest);
        assert_eq!(nearest, None);
    }
}
