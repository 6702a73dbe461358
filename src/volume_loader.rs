use crate::{enums::SortBy, volume::Volume};

use dicom::{
    core::Tag,
    object::{FileDicomObject, InMemDicomObject, open_file},
    pixeldata::{ConvertOptions, PixelDecoder, VoiLutOption},
};
use dicom_dictionary_std::tags;
use nalgebra::{Matrix3, Point3, Vector3};
use ndarray::{Array2, Array3, s};
use rayon::prelude::*;
use std::{
    fs,
    path::{Path, PathBuf},
};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum VolumeLoaderError {
    #[error("No files found in {0}")]
    NoFiles(PathBuf),

    #[error("No valid DICOM images found")]
    NoValidImages,

    #[error("Inconsistent image dimensions")]
    InconsistentDimensions,

    #[error("Missing spacing information")]
    MissingSpacing,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("DICOM error: {0}")]
    Dicom(#[from] dicom::object::ReadError),
}

/// A decoded slice with the header fields needed to stack it.
struct Slice {
    order: Option<f64>,
    position: Option<Vector3<f64>>,
    image: Array2<f32>,
}

pub struct VolumeLoader;

impl VolumeLoader {
    /// Load a volume from DICOM objects
    ///
    /// # Arguments
    ///
    /// * `dicom_objects` - Slice of DICOM file objects
    /// * `sort_by` - Method to sort the slices
    ///
    /// # Errors
    ///
    /// Returns error if no valid images found, dimensions are inconsistent or
    /// the pixel spacing is missing
    pub fn load_from_dicom_objects(
        dicom_objects: &[FileDicomObject<InMemDicomObject>],
        sort_by: SortBy,
    ) -> Result<Volume, VolumeLoaderError> {
        let first = dicom_objects.first().ok_or(VolumeLoaderError::NoValidImages)?;
        let direction = Self::get_direction(first);
        if direction.is_none() {
            warn!("ImageOrientationPatient missing, volume orientation unknown");
        }
        let normal = direction.map_or(Vector3::z(), |d| d.column(2).into_owned());

        let mut slices: Vec<Slice> = dicom_objects
            .par_iter()
            .filter_map(|dicom_object| Self::extract_slice(dicom_object, &sort_by, &normal))
            .collect();

        if slices.is_empty() {
            return Err(VolumeLoaderError::NoValidImages);
        }

        Self::sort_slices(&mut slices, sort_by);
        Self::validate_dimensions(&slices)?;

        let (x_spacing, y_spacing) =
            Self::get_pixel_spacing(dicom_objects).ok_or(VolumeLoaderError::MissingSpacing)?;
        let z_spacing = Self::get_slice_spacing(&slices, &normal)
            .or_else(|| Self::get_declared_slice_spacing(dicom_objects))
            .unwrap_or(1.0);
        let spacing = Vector3::new(x_spacing, y_spacing, z_spacing);

        let origin = slices[0]
            .position
            .map_or_else(Point3::origin, Point3::from);
        let volume_array = Self::build_volume_array(&slices);
        info!(
            dim = ?volume_array.dim(),
            ?spacing,
            ?origin,
            "volume assembled"
        );

        Ok(Volume::new(volume_array, spacing, origin).with_direction(direction))
    }

    /// Load a volume from file paths
    pub fn load_from_file_paths(
        paths: &[impl AsRef<Path> + Sync],
        sort_by: SortBy,
    ) -> Result<Volume, VolumeLoaderError> {
        let objects: Vec<_> = paths
            .par_iter()
            .filter_map(|path| match open_file(path.as_ref()) {
                Ok(object) => Some(object),
                Err(err) => {
                    debug!(path = %path.as_ref().display(), %err, "skipping unreadable file");
                    None
                }
            })
            .collect();

        Self::load_from_dicom_objects(&objects, sort_by)
    }

    /// Load a volume from every file of a directory
    pub fn load_from_directory(
        path: impl AsRef<Path>,
        sort_by: SortBy,
    ) -> Result<Volume, VolumeLoaderError> {
        let paths = Self::list_files(path.as_ref())?;
        if paths.is_empty() {
            return Err(VolumeLoaderError::NoFiles(path.as_ref().to_path_buf()));
        }

        Self::load_from_file_paths(&paths, sort_by)
    }

    /// ImagePositionPatient of the first file of `path` in file-name order.
    ///
    /// Readers may reorder slices, so the origin they report is not always the
    /// position of this file. Files that are not DICOM are skipped.
    pub fn first_slice_position(
        path: impl AsRef<Path>,
    ) -> Result<Option<Point3<f64>>, VolumeLoaderError> {
        let paths = Self::list_files(path.as_ref())?;
        Ok(paths
            .iter()
            .find_map(|path| open_file(path).ok())
            .and_then(|object| Self::get_f64_vec(&object, tags::IMAGE_POSITION_PATIENT))
            .filter(|position| position.len() >= 3)
            .map(|position| Point3::new(position[0], position[1], position[2])))
    }

    /// Regular files of a directory, sorted by name.
    pub fn list_files(path: &Path) -> Result<Vec<PathBuf>, VolumeLoaderError> {
        let mut paths: Vec<_> = fs::read_dir(path)?
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .collect();
        paths.sort();
        Ok(paths)
    }

    fn extract_slice(
        dicom_object: &FileDicomObject<InMemDicomObject>,
        sort_by: &SortBy,
        normal: &Vector3<f64>,
    ) -> Option<Slice> {
        let position = Self::get_f64_vec(dicom_object, tags::IMAGE_POSITION_PATIENT)
            .filter(|p| p.len() >= 3)
            .map(|p| Vector3::new(p[0], p[1], p[2]));
        let order = match sort_by {
            SortBy::ImagePositionPatient => position.map(|p| p.dot(normal)),
            SortBy::InstanceNumber => dicom_object
                .element(tags::INSTANCE_NUMBER)
                .ok()?
                .to_int::<i32>()
                .ok()
                .map(f64::from),
            SortBy::None => None,
        };
        let image = Self::decode_image(dicom_object)?;
        Some(Slice {
            order,
            position,
            image,
        })
    }

    fn decode_image(dicom_object: &FileDicomObject<InMemDicomObject>) -> Option<Array2<f32>> {
        let pixel_data = dicom_object.decode_pixel_data().ok()?;
        let options = ConvertOptions::new().with_voi_lut(VoiLutOption::Identity);
        pixel_data
            .to_ndarray_with_options::<f32>(&options)
            .ok()
            .map(|arr| arr.slice_move(s![0, .., .., 0]))
    }

    fn sort_slices(slices: &mut [Slice], sort_by: SortBy) {
        if !matches!(sort_by, SortBy::None) {
            slices.sort_by(|a, b| {
                a.order
                    .partial_cmp(&b.order)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
        }
    }

    fn validate_dimensions(slices: &[Slice]) -> Result<(), VolumeLoaderError> {
        let first_dim = slices[0].image.dim();
        if slices.iter().any(|slice| slice.image.dim() != first_dim) {
            return Err(VolumeLoaderError::InconsistentDimensions);
        }
        Ok(())
    }

    fn build_volume_array(slices: &[Slice]) -> Array3<f32> {
        let (height, width) = slices[0].image.dim();
        let depth = slices.len();
        let mut volume = Array3::<f32>::zeros((depth, height, width));

        for (i, slice) in slices.iter().enumerate() {
            volume.slice_mut(s![i, .., ..]).assign(&slice.image);
        }

        volume
    }

    /// Columns: row direction, column direction and their normal.
    fn get_direction(dicom_object: &FileDicomObject<InMemDicomObject>) -> Option<Matrix3<f64>> {
        let cosines = Self::get_f64_vec(dicom_object, tags::IMAGE_ORIENTATION_PATIENT)?;
        if cosines.len() < 6 {
            return None;
        }
        let row = Vector3::new(cosines[0], cosines[1], cosines[2]).try_normalize(f64::EPSILON)?;
        let column = Vector3::new(cosines[3], cosines[4], cosines[5]).try_normalize(f64::EPSILON)?;
        let normal = row.cross(&column).try_normalize(f64::EPSILON)?;
        Some(Matrix3::from_columns(&[row, column, normal]))
    }

    /// `(x, y)` spacing. PixelSpacing stores the row spacing (y) first.
    fn get_pixel_spacing(
        dicom_objects: &[FileDicomObject<InMemDicomObject>],
    ) -> Option<(f64, f64)> {
        dicom_objects.iter().find_map(|dicom_object| {
            let pixel_spacing = Self::get_f64_vec(dicom_object, tags::PIXEL_SPACING)?;
            match pixel_spacing[..] {
                [y, x, ..] if x > 0.0 && y > 0.0 => Some((x, y)),
                _ => None,
            }
        })
    }

    /// Distance between the first two slice positions along the normal.
    fn get_slice_spacing(slices: &[Slice], normal: &Vector3<f64>) -> Option<f64> {
        let first = slices.first()?.position?;
        let second = slices.get(1)?.position?;
        let spacing = (second - first).dot(normal).abs();
        (spacing > f64::EPSILON).then_some(spacing)
    }

    fn get_declared_slice_spacing(
        dicom_objects: &[FileDicomObject<InMemDicomObject>],
    ) -> Option<f64> {
        dicom_objects.iter().find_map(|dicom_object| {
            [tags::SPACING_BETWEEN_SLICES, tags::SLICE_THICKNESS]
                .into_iter()
                .find_map(|tag| {
                    dicom_object
                        .element(tag)
                        .ok()?
                        .to_float64()
                        .ok()
                        .filter(|spacing| *spacing > 0.0)
                })
        })
    }

    fn get_f64_vec(dicom_object: &FileDicomObject<InMemDicomObject>, tag: Tag) -> Option<Vec<f64>> {
        dicom_object.element(tag).ok()?.to_multi_float64().ok()
    }
}
