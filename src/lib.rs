//! # DICOM-fusion library
//!
//! This crate overlays two DICOM series of the same patient, a fixed
//! (reference) volume and a moving (overlay) volume, and renders fused 2D
//! slices of the pair.
//!
//! Both series are read with the dicom-rs ecosystem into volumes. The moving
//! volume is first aligned to the fixed one from the header geometry alone
//! (direction cosines and origins, no image-based registration). On top of that
//! the user can rotate and translate the overlay interactively. The moving
//! volume is then resliced onto the fixed volume's grid, using rayon where the
//! environment supports it. Slices can be taken in the three medical axes and
//! are windowed, colored and blended:
//!  - Axial (fixed z)
//!  - Coronal (fixed y)
//!  - Sagittal (fixed x)
//!
//!  Every rendered slice is rescaled in width so that pixels are square on
//!  screen, including axial slices with unequal row and column spacing.
//!  DICOM files are assumed to have the following attributes:
//!   - One series per directory
//!   - No multiframe (always the first frame is used)
//!   - Slices sharing the same orientation and pixel grid
//!
//! # Examples
//!
//! ## Fusing two series
//!
//! Load a CT as the fixed volume and a PET as the overlay, nudge the overlay
//! and save the axial slice at index 40.
//!
//! ```no_run
//! # use dicom_fusion::{FusionLoader, LogProgress, Orientation, Window};
//! let mut engine = FusionLoader::new("ct", "pet")
//!     .load(&LogProgress)
//!     .expect("should have loaded both series");
//! engine.set_rotation(0.0, 0.0, 2.5);
//! engine.set_translation(0.0, -4.0, 0.0);
//! let image = engine
//!     .render_slice(Orientation::Axial, 40, &Window::default())
//!     .expect("fixed volume is loaded");
//! image.save("fused.png").expect("should have written the image");
//! ```

pub mod compositor;
pub mod engine;
pub mod enums;
pub mod error;
pub mod fusion_loader;
pub mod geometry;
mod interpolator;
pub mod registration;
pub mod reslice;
pub mod transform;
pub mod volume;
pub mod volume_loader;
pub mod window;

pub use compositor::{FusedImage, FusionState, SliceCompositor, SlicePair};
pub use engine::{FusionEngine, FusionEvent, LoadedVolume, ResliceState};
pub use enums::{ColorPair, DisplayColor, Interpolation, Orientation, SortBy, VolumeRole};
pub use error::FusionError;
pub use fusion_loader::{FusionLoader, LoadProgress, LogProgress, NoProgress};
pub use geometry::{GeometryQuality, VoxelToWorld};
pub use registration::PreRegistration;
pub use transform::{TransformCompositor, UserTransform};
pub use volume::{Extent, Volume};
pub use volume_loader::{VolumeLoader, VolumeLoaderError};
pub use window::Window;
