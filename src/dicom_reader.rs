//! A [`CaptureReader`] over a directory of single-frame DICOM files.
//!
//! The series is exposed as one capture with one timepoint and one channel.
//! Planes are decoded to 16-bit samples when the directory is opened and
//! handed out in native byte order.

use crate::{
    enums::SortBy,
    reader::{CaptureReader, ReaderError, ReaderFactory},
};

use dicom::{
    object::{FileDicomObject, InMemDicomObject, open_file},
    pixeldata::{ConvertOptions, PixelDecoder, VoiLutOption},
};
use dicom_dictionary_std::tags;
use ndarray::{Array2, s};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, warn};

/// Opens DICOM series directories.
#[derive(Debug, Clone, Copy, Default)]
pub struct DicomSeriesFactory {
    pub sort_by: SortBy,
}

impl DicomSeriesFactory {
    pub fn new(sort_by: SortBy) -> Self {
        Self { sort_by }
    }
}

impl ReaderFactory for DicomSeriesFactory {
    type Reader = DicomSeriesReader;

    fn open(&self, path: &Path) -> Result<Self::Reader, ReaderError> {
        DicomSeriesReader::open_directory(path, self.sort_by)
    }
}

#[derive(Debug)]
pub struct DicomSeriesReader {
    planes: Vec<Array2<u16>>,
    positions: Vec<f64>,
    voxel_size: f32,
    open: bool,
}

impl DicomSeriesReader {
    /// Read every .dcm file of `path` into a plane stack.
    pub fn open_directory(path: &Path, sort_by: SortBy) -> Result<Self, ReaderError> {
        let paths: Vec<PathBuf> = fs::read_dir(path)?
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| {
                path.extension()
                    .and_then(|s| s.to_str())
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("dcm"))
            })
            .collect();

        if paths.is_empty() {
            return Err(ReaderError::NoValidImages);
        }

        let objects = paths
            .iter()
            .map(|path| open_file(path))
            .collect::<Result<Vec<_>, _>>()?;

        Self::from_dicom_objects(&objects, sort_by)
    }

    pub fn from_dicom_objects(
        dicom_objects: &[FileDicomObject<InMemDicomObject>],
        sort_by: SortBy,
    ) -> Result<Self, ReaderError> {
        let mut planes_with_order: Vec<_> = dicom_objects
            .iter()
            .filter_map(|dicom_object| Self::extract_plane(dicom_object, sort_by))
            .collect();

        if planes_with_order.is_empty() {
            return Err(ReaderError::NoValidImages);
        }

        Self::sort_planes(&mut planes_with_order, sort_by);

        let first_dim = planes_with_order[0].2.dim();
        if planes_with_order
            .iter()
            .any(|(_, _, plane)| plane.dim() != first_dim)
        {
            return Err(ReaderError::InconsistentDimensions);
        }

        let (pixel_spacing, slice_thickness) =
            Self::get_spacing(dicom_objects).ok_or(ReaderError::MissingSpacing)?;

        let positions: Vec<Option<f64>> = planes_with_order
            .iter()
            .map(|(_, position, _)| *position)
            .collect();
        let positions = Self::axial_positions(&positions, slice_thickness);
        let planes: Vec<_> = planes_with_order
            .into_iter()
            .map(|(_, _, plane)| plane)
            .collect();

        debug!(planes = planes.len(), "Opened DICOM series");
        Ok(Self {
            planes,
            positions,
            voxel_size: pixel_spacing,
            open: true,
        })
    }

    /// Axial position of every plane, in sorted order.
    ///
    /// Image Position (Patient) is used only when every plane carries it.
    /// Otherwise the whole series falls back to `z * SliceThickness`.
    fn axial_positions(positions: &[Option<f64>], slice_thickness: f32) -> Vec<f64> {
        if let Some(complete) = positions.iter().copied().collect::<Option<Vec<f64>>>() {
            return complete;
        }
        if positions.iter().any(Option::is_some) {
            warn!("Image Position (Patient) missing on some planes, using slice thickness");
        }
        (0..positions.len())
            .map(|z| z as f64 * f64::from(slice_thickness))
            .collect()
    }

    /// Sort key, axial position and decoded pixels of one object.
    fn extract_plane(
        dicom_object: &FileDicomObject<InMemDicomObject>,
        sort_by: SortBy,
    ) -> Option<(Option<f32>, Option<f64>, Array2<u16>)> {
        let position = Self::image_position_z(dicom_object);
        let order = match sort_by {
            SortBy::ImagePositionPatient => position.map(|z| z as f32),
            SortBy::TablePosition => dicom_object
                .element(tags::TABLE_POSITION)
                .ok()?
                .to_float32()
                .ok(),
            SortBy::InstanceNumber => dicom_object
                .element(tags::INSTANCE_NUMBER)
                .ok()?
                .to_int::<i32>()
                .ok()
                .map(|n| n as f32),
            SortBy::None => Some(0.0),
        };
        let plane = Self::decode_plane(dicom_object)?;
        Some((order, position, plane))
    }

    fn image_position_z(dicom_object: &FileDicomObject<InMemDicomObject>) -> Option<f64> {
        let pos = dicom_object
            .element(tags::IMAGE_POSITION_PATIENT)
            .ok()?
            .to_multi_float32()
            .ok()?;
        pos.get(2).map(|&z| f64::from(z))
    }

    fn decode_plane(dicom_object: &FileDicomObject<InMemDicomObject>) -> Option<Array2<u16>> {
        let pixel_data = dicom_object.decode_pixel_data().ok()?;
        let options = ConvertOptions::new().with_voi_lut(VoiLutOption::First);
        pixel_data
            .to_ndarray_with_options::<u16>(&options)
            .ok()
            .map(|arr| arr.slice_move(s![0, .., .., 0]))
    }

    fn sort_planes(planes: &mut [(Option<f32>, Option<f64>, Array2<u16>)], sort_by: SortBy) {
        if !matches!(sort_by, SortBy::None) {
            planes.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        }
    }

    /// Lateral pixel spacing and slice thickness of the first object that has both.
    fn get_spacing(dicom_objects: &[FileDicomObject<InMemDicomObject>]) -> Option<(f32, f32)> {
        dicom_objects.iter().find_map(|dicom_object| {
            let pixel_spacing = dicom_object
                .element(tags::PIXEL_SPACING)
                .ok()?
                .to_multi_float32()
                .ok()?;

            let slice_thickness = dicom_object
                .element(tags::SLICE_THICKNESS)
                .ok()?
                .to_float32()
                .ok()?;

            Some((*pixel_spacing.first()?, slice_thickness))
        })
    }

    fn ensure_open(&self) -> Result<(), ReaderError> {
        if self.open {
            Ok(())
        } else {
            Err(ReaderError::Closed)
        }
    }

    fn check_capture(&self, capture: usize) -> Result<(), ReaderError> {
        self.ensure_open()?;
        if capture != 0 {
            return Err(ReaderError::CaptureOutOfRange { capture, count: 1 });
        }
        Ok(())
    }
}

impl CaptureReader for DicomSeriesReader {
    fn capture_count(&self) -> Result<usize, ReaderError> {
        self.ensure_open()?;
        Ok(1)
    }

    fn bytes_per_pixel(&self, capture: usize) -> Result<usize, ReaderError> {
        self.check_capture(capture)?;
        Ok(std::mem::size_of::<u16>())
    }

    fn dimensions(&self, capture: usize) -> Result<(usize, usize, usize), ReaderError> {
        self.check_capture(capture)?;
        let (height, width) = self.planes[0].dim();
        Ok((width, height, self.planes.len()))
    }

    fn voxel_size(&self, capture: usize) -> Result<f32, ReaderError> {
        self.check_capture(capture)?;
        Ok(self.voxel_size)
    }

    fn axial_position(
        &self,
        capture: usize,
        _timepoint: usize,
        z: usize,
    ) -> Result<f64, ReaderError> {
        self.check_capture(capture)?;
        self.positions
            .get(z)
            .copied()
            .ok_or(ReaderError::PlaneOutOfRange {
                z,
                depth: self.positions.len(),
            })
    }

    fn read_plane(
        &mut self,
        buffer: &mut [u8],
        capture: usize,
        _illumination: usize,
        _timepoint: usize,
        z: usize,
        _channel: usize,
    ) -> Result<(), ReaderError> {
        self.check_capture(capture)?;
        let plane = self.planes.get(z).ok_or(ReaderError::PlaneOutOfRange {
            z,
            depth: self.planes.len(),
        })?;

        let samples: Vec<u16> = plane.iter().copied().collect();
        let bytes: &[u8] = bytemuck::cast_slice(&samples);
        if bytes.len() != buffer.len() {
            return Err(ReaderError::BufferSize {
                expected: bytes.len(),
                actual: buffer.len(),
            });
        }
        buffer.copy_from_slice(bytes);
        Ok(())
    }

    fn close(&mut self) -> Result<(), ReaderError> {
        self.open = false;
        self.planes.clear();
        self.positions.clear();
        Ok(())
    }
}
