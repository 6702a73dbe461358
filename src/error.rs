use crate::enums::VolumeRole;
use crate::volume_loader::VolumeLoaderError;

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FusionError {
    #[error("Failed to load {role} volume: {source}")]
    Load {
        role: VolumeRole,
        #[source]
        source: VolumeLoaderError,
    },

    #[error("No overlay files selected")]
    EmptySelection,

    #[error("Selected files span multiple directories: {0:?}")]
    MixedDirectories(Vec<PathBuf>),

    #[error("No fixed volume to render a slice from")]
    NoFixedVolume,

    #[error("Slice could not be composited")]
    EmptySlice,

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

impl FusionError {
    pub(crate) fn load(role: VolumeRole) -> impl FnOnce(VolumeLoaderError) -> Self {
        move |source| Self::Load { role, source }
    }

    /// Role of the volume that failed to load, if this is a load failure.
    pub fn role(&self) -> Option<VolumeRole> {
        match self {
            Self::Load { role, .. } => Some(*role),
            _ => None,
        }
    }
}
