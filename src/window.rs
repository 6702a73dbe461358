use ndarray::{Array2, ArrayView2, Zip};

/// Window centre/width used to map raw intensities to 8-bit gray.
///
/// Read-only; build a new window to change the parameters.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Window {
    center: f32,
    width: f32,
}

impl Default for Window {
    /// Soft-tissue window, centre 40 and width 400.
    fn default() -> Self {
        Self {
            center: 40.0,
            width: 400.0,
        }
    }
}

impl Window {
    /// `None` unless both values are finite and `width >= 1`.
    pub fn new(center: f32, width: f32) -> Option<Self> {
        if center.is_finite() && width.is_finite() && width >= 1.0 {
            Some(Self { center, width })
        } else {
            None
        }
    }

    #[inline]
    pub fn center(&self) -> f32 {
        self.center
    }

    #[inline]
    pub fn width(&self) -> f32 {
        self.width
    }

    /// `clip((v - (c - 0.5)) / (w - 1) + 0.5, 0, 1)`, scaled to 255 and truncated.
    ///
    /// A width of exactly 1 is a step at `c - 0.5`.
    #[inline]
    pub fn eval(&self, value: f32) -> u8 {
        let normalized = if self.width > 1.0 {
            ((value - (self.center - 0.5)) / (self.width - 1.0) + 0.5).clamp(0.0, 1.0)
        } else if value > self.center - 0.5 {
            1.0
        } else {
            0.0
        };
        (normalized * 255.0) as u8
    }

    pub fn apply(&self, plane: &ArrayView2<'_, f32>) -> Array2<u8> {
        let mut out = Array2::zeros(plane.dim());
        Zip::from(&mut out)
            .and(plane)
            .par_for_each(|out, &value| *out = self.eval(value));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_degenerate_width() {
        assert!(Window::new(40.0, 0.5).is_none());
        assert!(Window::new(f32::NAN, 400.0).is_none());
        assert!(Window::new(40.0, 1.0).is_some());
    }

    #[test]
    fn center_is_mid_gray() {
        for width in [256.0, 400.0, 1500.0, 4000.0] {
            let window = Window::new(40.0, width).unwrap();
            let value = window.eval(40.0);
            assert!((127..=128).contains(&value), "width {width} gave {value}");
        }
    }

    #[test]
    fn window_bounds_saturate() {
        let window = Window::default();
        assert_eq!(window.eval(-160.0), 0);
        assert_eq!(window.eval(-1024.0), 0);
        assert_eq!(window.eval(240.0), 255);
        assert_eq!(window.eval(3000.0), 255);
    }

    #[test]
    fn soft_tissue_golden_values() {
        let window = Window::default();
        assert_eq!(window.eval(40.0), 127);
        assert_eq!(window.eval(0.0), 102);
    }

    #[test]
    fn unit_width_is_a_step() {
        let window = Window::new(10.0, 1.0).unwrap();
        assert_eq!(window.eval(9.0), 0);
        assert_eq!(window.eval(10.0), 255);
    }
}
