//! Blending of a fixed slice and a resliced moving slice into one display image.

use crate::enums::{ColorPair, DisplayColor, Interpolation};

use image::imageops::{self, FilterType};
use image::{GrayImage, ImageBuffer, ImageResult, Rgb, RgbImage};
use ndarray::{Array2, Zip};
use rayon::prelude::*;
use std::path::Path;

/// Windowed 8-bit planes of one (orientation, index) request.
#[derive(Clone, Debug, PartialEq)]
pub struct SlicePair {
    pub fixed: Array2<u8>,
    /// `None` while no moving volume is loaded.
    pub moving: Option<Array2<u8>>,
}

/// Display settings of the fusion view.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FusionState {
    opacity: f32,
    pub interpolation: Interpolation,
    pub fixed_color: DisplayColor,
    pub moving_color: DisplayColor,
    pub coloring_enabled: bool,
}

impl Default for FusionState {
    fn default() -> Self {
        let (fixed_color, moving_color, coloring_enabled) = ColorPair::default().colors();
        Self {
            opacity: 0.5,
            interpolation: Interpolation::Linear,
            fixed_color,
            moving_color,
            coloring_enabled,
        }
    }
}

impl FusionState {
    /// Weight of the moving volume, clamped into `[0, 1]`. NaN reads as 0.
    pub fn set_opacity(&mut self, opacity: f32) {
        self.opacity = if opacity.is_nan() { 0.0 } else { opacity.clamp(0.0, 1.0) };
    }

    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    pub fn set_color_pair(&mut self, pair: ColorPair) {
        (self.fixed_color, self.moving_color, self.coloring_enabled) = pair.colors();
    }
}

/// Brightness of `(fixed, moving)` for a blend opacity.
///
/// Below one half the fixed volume stays at full brightness while the moving
/// volume fades in; above it the moving volume stays full and the fixed one
/// fades out. Both are full at exactly one half.
pub fn crossfade(opacity: f32) -> (f32, f32) {
    if opacity <= 0.5 {
        (1.0, opacity * 2.0)
    } else {
        (2.0 * (1.0 - opacity), 1.0)
    }
}

/// An 8-bit display image.
#[derive(Clone, Debug, PartialEq)]
pub enum FusedImage {
    Gray(GrayImage),
    Rgb(RgbImage),
}

impl FusedImage {
    pub fn width(&self) -> u32 {
        match self {
            Self::Gray(image) => image.width(),
            Self::Rgb(image) => image.width(),
        }
    }

    pub fn height(&self) -> u32 {
        match self {
            Self::Gray(image) => image.height(),
            Self::Rgb(image) => image.height(),
        }
    }

    pub fn is_rgb(&self) -> bool {
        matches!(self, Self::Rgb(_))
    }

    pub fn as_raw(&self) -> &[u8] {
        match self {
            Self::Gray(image) => image.as_raw(),
            Self::Rgb(image) => image.as_raw(),
        }
    }

    pub fn save(&self, path: impl AsRef<Path>) -> ImageResult<()> {
        match self {
            Self::Gray(image) => image.save(path),
            Self::Rgb(image) => image.save(path),
        }
    }
}

pub struct SliceCompositor;

impl SliceCompositor {
    /// Compose `pair` into a display image.
    ///
    /// `plane_spacing` is the `(row, column)` spacing of the plane; the output
    /// keeps the plane height and rescales its width to the physical aspect
    /// ratio. `None` for an empty plane or mismatched plane shapes.
    pub fn composite(
        pair: &SlicePair,
        state: &FusionState,
        plane_spacing: (f64, f64),
    ) -> Option<FusedImage> {
        let fixed = &pair.fixed;
        let (height, width) = fixed.dim();
        if height == 0 || width == 0 {
            return None;
        }
        if let Some(moving) = &pair.moving {
            if moving.dim() != fixed.dim() {
                return None;
            }
        }

        let image = match (&pair.moving, state.coloring_enabled) {
            (None, false) => FusedImage::Gray(Self::gray_image(fixed)?),
            (Some(moving), false) => {
                let alpha = state.opacity();
                let blended = Zip::from(fixed)
                    .and(moving)
                    .par_map_collect(|&f, &m| (f as f32 * (1.0 - alpha) + m as f32 * alpha) as u8);
                FusedImage::Gray(Self::gray_image(&blended)?)
            }
            (None, true) => match state.fixed_color {
                DisplayColor::Grayscale => FusedImage::Gray(Self::gray_image(fixed)?),
                color => FusedImage::Rgb(Self::rgb_image(fixed, |v| color.map(v))?),
            },
            (Some(moving), true) => {
                let (fixed_gain, moving_gain) = crossfade(state.opacity());
                let combined = Zip::from(fixed).and(moving).par_map_collect(|&f, &m| {
                    let a = state.fixed_color.map(Self::scale(f, fixed_gain));
                    let b = state.moving_color.map(Self::scale(m, moving_gain));
                    [
                        a[0].saturating_add(b[0]),
                        a[1].saturating_add(b[1]),
                        a[2].saturating_add(b[2]),
                    ]
                });
                FusedImage::Rgb(Self::rgb_image(&combined, |rgb| rgb)?)
            }
        };

        Some(Self::correct_aspect(image, plane_spacing))
    }

    #[inline]
    fn scale(value: u8, gain: f32) -> u8 {
        (gain * value as f32).clamp(0.0, 255.0) as u8
    }

    fn gray_image(plane: &Array2<u8>) -> Option<GrayImage> {
        let (height, width) = plane.dim();
        ImageBuffer::from_raw(width as u32, height as u32, plane.iter().copied().collect())
    }

    fn rgb_image<T: Copy + Sync>(
        plane: &Array2<T>,
        to_rgb: impl Fn(T) -> [u8; 3] + Sync + Send,
    ) -> Option<RgbImage> {
        let (height, width) = plane.dim();
        let pixel_data: Vec<u8> = plane
            .as_standard_layout()
            .as_slice()?
            .par_iter()
            .flat_map_iter(|&v| to_rgb(v))
            .collect();
        ImageBuffer::<Rgb<u8>, _>::from_raw(width as u32, height as u32, pixel_data)
    }

    /// Rescale the width so one pixel covers the same physical size in both directions.
    fn correct_aspect(image: FusedImage, (spacing_row, spacing_col): (f64, f64)) -> FusedImage {
        let (width, height) = (image.width(), image.height());
        let physical_height = height as f64 * spacing_row;
        let physical_width = width as f64 * spacing_col;
        let aspect = if physical_height != 0.0 {
            physical_width / physical_height
        } else {
            1.0
        };
        let display_width = ((height as f64 * aspect).round() as u32).max(1);
        if display_width == width {
            return image;
        }

        match image {
            FusedImage::Gray(image) => FusedImage::Gray(imageops::resize(
                &image,
                display_width,
                height,
                FilterType::Triangle,
            )),
            FusedImage::Rgb(image) => FusedImage::Rgb(imageops::resize(
                &image,
                display_width,
                height,
                FilterType::Triangle,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn state(coloring_enabled: bool, opacity: f32) -> FusionState {
        let mut state = FusionState {
            coloring_enabled,
            ..FusionState::default()
        };
        state.set_opacity(opacity);
        state
    }

    #[test]
    fn crossfade_midpoint_is_full() {
        assert_eq!(crossfade(0.5), (1.0, 1.0));
        assert_eq!(crossfade(0.0), (1.0, 0.0));
        assert_eq!(crossfade(1.0), (0.0, 1.0));
        assert_eq!(crossfade(0.25), (1.0, 0.5));
    }

    #[test]
    fn opacity_is_clamped() {
        assert_eq!(state(true, 1.7).opacity(), 1.0);
        assert_eq!(state(true, -0.2).opacity(), 0.0);
    }

    #[test]
    fn fixed_only_without_coloring_is_gray() {
        let pair = SlicePair {
            fixed: array![[1, 2], [3, 4]],
            moving: None,
        };
        let image = SliceCompositor::composite(&pair, &state(false, 0.5), (1.0, 1.0)).unwrap();
        assert_eq!(image, FusedImage::Gray(GrayImage::from_raw(2, 2, vec![1, 2, 3, 4]).unwrap()));
    }

    #[test]
    fn gray_blend_weights_by_opacity() {
        let pair = SlicePair {
            fixed: array![[200, 0]],
            moving: Some(array![[0, 100]]),
        };
        let image = SliceCompositor::composite(&pair, &state(false, 0.25), (1.0, 1.0)).unwrap();
        assert!(!image.is_rgb());
        assert_eq!(image.as_raw(), &[150, 25]);
    }

    #[test]
    fn fixed_only_is_color_mapped() {
        let pair = SlicePair {
            fixed: array![[7]],
            moving: None,
        };
        let image = SliceCompositor::composite(&pair, &state(true, 0.5), (1.0, 1.0)).unwrap();
        assert_eq!(image.as_raw(), &[7, 0, 7]);

        let mut gray = state(true, 0.5);
        gray.fixed_color = DisplayColor::Grayscale;
        let image = SliceCompositor::composite(&pair, &gray, (1.0, 1.0)).unwrap();
        assert_eq!(image.as_raw(), &[7]);
    }

    #[test]
    fn colored_blend_adds_and_saturates() {
        let pair = SlicePair {
            fixed: array![[200]],
            moving: Some(array![[100]]),
        };
        let mut colors = state(true, 0.5);
        colors.set_color_pair(ColorPair::BlueYellow);
        let image = SliceCompositor::composite(&pair, &colors, (1.0, 1.0)).unwrap();
        assert_eq!(image.as_raw(), &[100, 100, 200]);

        colors.fixed_color = DisplayColor::Grayscale;
        colors.moving_color = DisplayColor::Grayscale;
        let image = SliceCompositor::composite(&pair, &colors, (1.0, 1.0)).unwrap();
        assert_eq!(image.as_raw(), &[255, 255, 255]);
    }

    #[test]
    fn colored_blend_fades_fixed_above_half() {
        let pair = SlicePair {
            fixed: array![[200]],
            moving: Some(array![[100]]),
        };
        let image = SliceCompositor::composite(&pair, &state(true, 0.75), (1.0, 1.0)).unwrap();
        // Purple fixed at half brightness, green moving at full.
        assert_eq!(image.as_raw(), &[100, 100, 100]);
    }

    #[test]
    fn aspect_ratio_rescales_width() {
        let pair = SlicePair {
            fixed: Array2::from_elem((10, 4), 50),
            moving: None,
        };
        let image = SliceCompositor::composite(&pair, &state(false, 0.5), (2.0, 1.0)).unwrap();
        assert_eq!(image.height(), 10);
        assert_eq!(image.width(), 2);
        assert!(image.as_raw().iter().all(|&v| v == 50));
    }

    #[test]
    fn empty_or_mismatched_planes_yield_nothing() {
        let empty = SlicePair {
            fixed: Array2::zeros((0, 3)),
            moving: None,
        };
        assert!(SliceCompositor::composite(&empty, &state(true, 0.5), (1.0, 1.0)).is_none());
        let mismatched = SlicePair {
            fixed: Array2::zeros((2, 2)),
            moving: Some(Array2::zeros((2, 3))),
        };
        assert!(SliceCompositor::composite(&mismatched, &state(true, 0.5), (1.0, 1.0)).is_none());
    }
}
