use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Orientation {
    Axial,
    Coronal,
    Sagittal,
}

impl Orientation {
    pub const ALL: [Orientation; 3] = [Self::Axial, Self::Coronal, Self::Sagittal];

    /// Volume axis held constant by a slice of this orientation (0 = x, 1 = y, 2 = z).
    pub fn fixed_axis(self) -> usize {
        match self {
            Self::Axial => 2,
            Self::Coronal => 1,
            Self::Sagittal => 0,
        }
    }
}

/// Sampling used when the moving volume is resliced onto the fixed grid.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Interpolation {
    #[default]
    Linear,
    Nearest,
}

/// Order in which the loader stacks slices along the volume's z axis.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SortBy {
    #[default]
    ImagePositionPatient,
    InstanceNumber,
    /// Keep the order the objects were given in.
    None,
}

/// Row order of the voxel data a reader delivers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RowOrder {
    /// First row is the top of the image, as stored in DICOM.
    #[default]
    TopDown,
    BottomUp,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VolumeRole {
    Fixed,
    Moving,
}

impl fmt::Display for VolumeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed => f.write_str("fixed"),
            Self::Moving => f.write_str("moving"),
        }
    }
}

/// Display color applied to one volume when coloring is enabled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DisplayColor {
    Grayscale,
    Green,
    Purple,
    Blue,
    Yellow,
    Red,
    Cyan,
}

impl DisplayColor {
    /// Channel selection of this color for an 8-bit intensity.
    #[inline]
    pub fn map(self, v: u8) -> [u8; 3] {
        match self {
            Self::Grayscale => [v, v, v],
            Self::Green => [0, v, 0],
            Self::Purple => [v, 0, v],
            Self::Blue => [0, 0, v],
            Self::Yellow => [v, v, 0],
            Self::Red => [v, 0, 0],
            Self::Cyan => [0, v, v],
        }
    }
}

/// Fixed/moving color combinations offered to the user.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ColorPair {
    Grayscale,
    #[default]
    PurpleGreen,
    BlueYellow,
    RedCyan,
}

impl ColorPair {
    pub fn label(self) -> &'static str {
        match self {
            Self::Grayscale => "No Colors (Grayscale)",
            Self::PurpleGreen => "Purple + Green",
            Self::BlueYellow => "Blue + Yellow",
            Self::RedCyan => "Red + Cyan",
        }
    }

    /// Resolve a preset label. Unknown labels fall back to purple + green.
    pub fn from_label(label: &str) -> Self {
        match label {
            "No Colors (Grayscale)" => Self::Grayscale,
            "Blue + Yellow" => Self::BlueYellow,
            "Red + Cyan" => Self::RedCyan,
            _ => Self::PurpleGreen,
        }
    }

    /// `(fixed_color, moving_color, coloring_enabled)`
    pub fn colors(self) -> (DisplayColor, DisplayColor, bool) {
        match self {
            Self::Grayscale => (DisplayColor::Grayscale, DisplayColor::Grayscale, false),
            Self::PurpleGreen => (DisplayColor::Purple, DisplayColor::Green, true),
            Self::BlueYellow => (DisplayColor::Blue, DisplayColor::Yellow, true),
            Self::RedCyan => (DisplayColor::Red, DisplayColor::Cyan, true),
        }
    }
}
