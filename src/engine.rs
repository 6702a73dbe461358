//! Fixed/moving volume pair with lazy reslicing and slice extraction.

use crate::compositor::{FusedImage, FusionState, SliceCompositor, SlicePair};
use crate::enums::{ColorPair, DisplayColor, Interpolation, Orientation, SortBy, VolumeRole};
use crate::error::FusionError;
use crate::geometry::VoxelToWorld;
use crate::registration::PreRegistration;
use crate::reslice::{OutputGrid, Resampler};
use crate::transform::{TransformCompositor, UserTransform};
use crate::volume::{Extent, Volume};
use crate::volume_loader::{VolumeLoader, VolumeLoaderError};
use crate::window::Window;

use nalgebra::{Matrix4, Point3};
use std::path::Path;
use tracing::{debug, info, warn};

/// A volume prepared for fusion: rows top-down, voxel-to-world matrix resolved.
#[derive(Clone, Debug)]
pub struct LoadedVolume {
    role: VolumeRole,
    volume: Volume,
    geometry: VoxelToWorld,
}

impl LoadedVolume {
    /// Normalise the row order and resolve the voxel-to-world matrix.
    ///
    /// `origin_override` is the true position of the first slice; when given
    /// it replaces the reader-reported origin in the matrix.
    ///
    /// # Errors
    ///
    /// A volume with an empty axis has no slices and is rejected.
    pub fn prepare(
        role: VolumeRole,
        volume: Volume,
        origin_override: Option<Point3<f64>>,
    ) -> Result<Self, VolumeLoaderError> {
        if volume.is_empty() {
            return Err(VolumeLoaderError::NoValidImages);
        }
        let volume = volume.into_top_down();
        let geometry = VoxelToWorld::resolve(&volume, origin_override);
        info!(
            %role,
            dim = ?volume.dim(),
            quality = ?geometry.quality(),
            "volume prepared"
        );
        Ok(Self {
            role,
            volume,
            geometry,
        })
    }

    pub fn from_directory(role: VolumeRole, path: &Path) -> Result<Self, VolumeLoaderError> {
        let volume = VolumeLoader::load_from_directory(path, SortBy::default())?;
        let origin = VolumeLoader::first_slice_position(path)?;
        Self::prepare(role, volume, origin)
    }

    pub fn role(&self) -> VolumeRole {
        self.role
    }

    pub fn volume(&self) -> &Volume {
        &self.volume
    }

    pub fn geometry(&self) -> &VoxelToWorld {
        &self.geometry
    }
}

/// How much of the resliced moving volume must be recomputed on the next read.
///
/// Ordered by severity; marking a state never lowers the current one.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum ResliceState {
    Clean,
    /// Transform or interpolation changed; the output grid is still valid.
    TransformDirty,
    /// A volume was (re)loaded; the output grid must be resynchronised.
    #[default]
    VolumeDirty,
}

impl ResliceState {
    fn mark(&mut self, state: ResliceState) {
        *self = (*self).max(state);
    }
}

/// Change notification pushed to registered observers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FusionEvent {
    VolumeLoaded(VolumeRole),
    TransformChanged,
    DisplayChanged,
}

pub type Observer = Box<dyn FnMut(FusionEvent) + Send>;

/// Owns the fixed and moving volumes and produces fused slices.
///
/// Every query returns `None` until a fixed volume is loaded. Transform edits
/// only mark the state dirty; the moving volume is resliced on the next read.
#[derive(Default)]
pub struct FusionEngine {
    fixed: Option<LoadedVolume>,
    moving: Option<LoadedVolume>,
    compositor: TransformCompositor,
    resampler: Resampler,
    resliced: Option<Volume>,
    state: ResliceState,
    display: FusionState,
    observers: Vec<Observer>,
}

impl FusionEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback invoked after every change of the engine.
    pub fn subscribe(&mut self, observer: impl FnMut(FusionEvent) + Send + 'static) {
        self.observers.push(Box::new(observer));
    }

    fn notify(&mut self, event: FusionEvent) {
        for observer in &mut self.observers {
            observer(event);
        }
    }

    /// Load the reference volume from a DICOM directory.
    ///
    /// On error nothing is changed.
    pub fn load_fixed(&mut self, path: impl AsRef<Path>) -> Result<(), FusionError> {
        let loaded = LoadedVolume::from_directory(VolumeRole::Fixed, path.as_ref())
            .map_err(FusionError::load(VolumeRole::Fixed))?;
        self.install_fixed(loaded);
        Ok(())
    }

    /// Load the overlay volume from a DICOM directory.
    ///
    /// On error nothing is changed.
    pub fn load_moving(&mut self, path: impl AsRef<Path>) -> Result<(), FusionError> {
        let loaded = LoadedVolume::from_directory(VolumeRole::Moving, path.as_ref())
            .map_err(FusionError::load(VolumeRole::Moving))?;
        self.install_moving(loaded);
        Ok(())
    }

    /// Install an in-memory reference volume. On error nothing is changed.
    pub fn load_fixed_volume(
        &mut self,
        volume: Volume,
        origin_override: Option<Point3<f64>>,
    ) -> Result<(), FusionError> {
        let loaded = LoadedVolume::prepare(VolumeRole::Fixed, volume, origin_override)
            .map_err(FusionError::load(VolumeRole::Fixed))?;
        self.install_fixed(loaded);
        Ok(())
    }

    /// Install an in-memory overlay volume. On error nothing is changed.
    pub fn load_moving_volume(
        &mut self,
        volume: Volume,
        origin_override: Option<Point3<f64>>,
    ) -> Result<(), FusionError> {
        let loaded = LoadedVolume::prepare(VolumeRole::Moving, volume, origin_override)
            .map_err(FusionError::load(VolumeRole::Moving))?;
        self.install_moving(loaded);
        Ok(())
    }

    fn install_fixed(&mut self, fixed: LoadedVolume) {
        let volume = fixed.volume();
        if let Some(min) = volume.min_value() {
            self.resampler.set_background_level(min);
        }
        self.compositor.set_center(volume.center_world());
        self.resampler.set_output_grid(OutputGrid::of(volume));
        self.fixed = Some(fixed);
        self.sync_transform();
        self.state.mark(ResliceState::VolumeDirty);
        self.notify(FusionEvent::VolumeLoaded(VolumeRole::Fixed));
    }

    fn install_moving(&mut self, moving: LoadedVolume) {
        let fixed_geometry = match &self.fixed {
            Some(fixed) => *fixed.geometry(),
            None => {
                warn!("moving volume loaded before a fixed volume, pre-registration uses identity");
                VoxelToWorld::default()
            }
        };
        let pre_registration = PreRegistration::solve(&fixed_geometry, moving.geometry());
        info!(
            translation = ?pre_registration.translation(),
            quality = ?pre_registration.quality(),
            "pre-registration computed"
        );

        self.compositor.set_pre_registration(pre_registration);
        self.compositor.reset();
        self.moving = Some(moving);
        self.sync_transform();
        self.state.mark(ResliceState::VolumeDirty);
        self.notify(FusionEvent::VolumeLoaded(VolumeRole::Moving));
    }

    /// Push the recomposed transform into the resampler if it changed.
    fn sync_transform(&mut self) {
        if self.compositor.is_dirty() {
            self.resampler.set_reslice_axes(self.compositor.take());
            self.state.mark(ResliceState::TransformDirty);
        }
    }

    /// Rotation in degrees about the fixed volume centre, applied X, Y, then Z.
    pub fn set_rotation(&mut self, rx: f64, ry: f64, rz: f64) {
        self.compositor.set_rotation(rx, ry, rz);
        self.sync_transform();
        self.notify(FusionEvent::TransformChanged);
    }

    /// Translation in mm, applied after the rotation.
    pub fn set_translation(&mut self, tx: f64, ty: f64, tz: f64) {
        self.compositor.set_translation(tx, ty, tz);
        self.sync_transform();
        self.notify(FusionEvent::TransformChanged);
    }

    /// Clear the user rotation and translation, keeping the pre-registration.
    pub fn reset_transform(&mut self) {
        self.compositor.reset();
        self.sync_transform();
        self.notify(FusionEvent::TransformChanged);
    }

    pub fn set_interpolation(&mut self, interpolation: Interpolation) {
        if self.display.interpolation != interpolation {
            self.display.interpolation = interpolation;
            self.resampler.set_interpolation(interpolation);
            self.state.mark(ResliceState::TransformDirty);
        }
        self.notify(FusionEvent::DisplayChanged);
    }

    pub fn set_opacity(&mut self, opacity: f32) {
        self.display.set_opacity(opacity);
        self.notify(FusionEvent::DisplayChanged);
    }

    pub fn set_color_pair(&mut self, pair: ColorPair) {
        self.display.set_color_pair(pair);
        self.notify(FusionEvent::DisplayChanged);
    }

    pub fn set_colors(&mut self, fixed: DisplayColor, moving: DisplayColor) {
        self.display.fixed_color = fixed;
        self.display.moving_color = moving;
        self.notify(FusionEvent::DisplayChanged);
    }

    pub fn set_coloring_enabled(&mut self, enabled: bool) {
        self.display.coloring_enabled = enabled;
        self.notify(FusionEvent::DisplayChanged);
    }

    pub fn fusion_state(&self) -> &FusionState {
        &self.display
    }

    pub fn state(&self) -> ResliceState {
        self.state
    }

    pub fn fixed(&self) -> Option<&LoadedVolume> {
        self.fixed.as_ref()
    }

    pub fn moving(&self) -> Option<&LoadedVolume> {
        self.moving.as_ref()
    }

    /// Bounds of the fixed volume, `None` before it is loaded.
    pub fn fixed_extent(&self) -> Option<Extent> {
        self.fixed.as_ref().map(|fixed| fixed.volume().extent())
    }

    /// Valid slice indices for an orientation.
    pub fn slice_range(&self, orientation: Orientation) -> Option<(i64, i64)> {
        self.fixed_extent().map(|extent| extent.range(orientation))
    }

    /// Current user rotation and translation.
    pub fn user_transform(&self) -> UserTransform {
        *self.compositor.user()
    }

    /// Matrix of the user adjustment alone.
    pub fn user_matrix(&self) -> Matrix4<f64> {
        self.compositor.user_matrix()
    }

    /// Matrix currently driving the reslice.
    pub fn composed_transform(&self) -> Matrix4<f64> {
        self.compositor.current()
    }

    /// Pre-registration of the loaded moving volume.
    pub fn pre_registration(&self) -> Option<&PreRegistration> {
        self.moving.as_ref().map(|_| self.compositor.pre_registration())
    }

    /// Moving volume resampled onto the fixed grid, recomputed if stale.
    pub fn resliced_moving(&mut self) -> Option<&Volume> {
        self.refresh();
        self.resliced.as_ref()
    }

    fn refresh(&mut self) {
        match self.state {
            ResliceState::Clean => return,
            ResliceState::VolumeDirty => {
                if let Some(fixed) = &self.fixed {
                    self.resampler.set_output_grid(OutputGrid::of(fixed.volume()));
                }
            }
            ResliceState::TransformDirty => {}
        }
        debug!(state = ?self.state, "refreshing resliced moving volume");
        self.resliced = self
            .moving
            .as_ref()
            .and_then(|moving| self.resampler.execute(moving.volume()));
        self.state = ResliceState::Clean;
    }

    /// Windowed fixed and resliced moving planes at `index`.
    ///
    /// Axial slices fix z, coronal y and sagittal x. The index is clamped into
    /// the fixed extent.
    pub fn extract_slice(
        &mut self,
        orientation: Orientation,
        index: i64,
        window: &Window,
    ) -> Option<SlicePair> {
        self.fixed.as_ref()?;
        self.refresh();

        let fixed = self.fixed.as_ref()?;
        let fixed_plane = window.apply(&fixed.volume().get_slice_from_axis(index, &orientation));
        let moving_plane = self
            .resliced
            .as_ref()
            .map(|resliced| window.apply(&resliced.get_slice_from_axis(index, &orientation)));

        Some(SlicePair {
            fixed: fixed_plane,
            moving: moving_plane,
        })
    }

    /// Fused display image at `index` with the current display settings.
    pub fn render_slice(
        &mut self,
        orientation: Orientation,
        index: i64,
        window: &Window,
    ) -> Option<FusedImage> {
        let pair = self.extract_slice(orientation, index, window)?;
        let spacing = self.fixed.as_ref()?.volume().plane_spacing(&orientation);
        SliceCompositor::composite(&pair, &self.display, spacing)
    }
}
