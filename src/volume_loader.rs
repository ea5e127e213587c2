use crate::{
    backend::BackendCapability,
    config::LoaderConfig,
    enums::{Endianness, ZSpacingPolicy},
    metadata::{MetadataCache, VolumeGeometry},
    reader::{CaptureReader, ReaderError, ReaderFactory, ReaderGuard},
    registry::{SequenceRegistry, ViewId},
    volume::{Sample, Volume},
};

use byteorder::{BigEndian, ByteOrder, LittleEndian, NativeEndian};
use ndarray::Axis;
use std::{
    path::PathBuf,
    sync::Arc,
};
use thiserror::Error;
use tracing::{debug, error, warn};

/// Bytes per sample of the planes the loader can reinterpret.
const SAMPLE_BYTES: usize = 2;

#[derive(Debug, Error)]
pub enum VolumeLoaderError {
    #[error("Reader backend '{0}' is not available")]
    BackendUnavailable(String),

    #[error("No view description for {0}")]
    ViewNotFound(ViewId),

    #[error("Failed to open {}: {source}", path.display())]
    ReaderOpenFailed { path: PathBuf, source: ReaderError },

    #[error("Failed to query geometry: {0}")]
    ReaderQueryFailed(#[source] ReaderError),

    #[error("Failed to read plane {z}: {source}")]
    ReaderReadFailed { z: usize, source: ReaderError },

    #[error("Failed to close reader: {0}")]
    ReaderCloseFailed(#[source] ReaderError),

    #[error("Capture {capture} out of range, source has {count} capture(s)")]
    CaptureOutOfRange { capture: usize, count: usize },

    #[error(
        "Inconsistent geometry: {width}x{height}x{depth} at {bytes_per_pixel} byte(s) per pixel"
    )]
    GeometryInconsistent {
        width: usize,
        height: usize,
        depth: usize,
        bytes_per_pixel: usize,
    },

    #[error("Wrote {written} samples, volume holds {expected}")]
    SampleCountMismatch { written: usize, expected: usize },
}

/// Reader indices a view resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedView {
    pub timepoint: usize,
    pub capture: usize,
    pub channel: usize,
    pub illumination: usize,
}

/// Loads the volumes of a sequence out of one source file.
///
/// Each load opens its own reader, so one loader can serve many threads.
pub struct VolumeLoader<F, S> {
    path: PathBuf,
    factory: F,
    registry: Arc<S>,
    backend: Arc<BackendCapability>,
    metadata: Arc<MetadataCache>,
    config: LoaderConfig,
}

impl<F, S> VolumeLoader<F, S>
where
    F: ReaderFactory,
    S: SequenceRegistry,
{
    pub fn new(
        path: impl Into<PathBuf>,
        factory: F,
        registry: Arc<S>,
        backend: Arc<BackendCapability>,
    ) -> Self {
        Self {
            path: path.into(),
            factory,
            registry,
            backend,
            metadata: Arc::new(MetadataCache::new()),
            config: LoaderConfig::default(),
        }
    }

    /// Publish geometry into a shared cache instead of a private one.
    pub fn with_metadata_cache(mut self, metadata: Arc<MetadataCache>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_config(mut self, config: LoaderConfig) -> Self {
        self.config = config;
        self
    }

    pub fn metadata_cache(&self) -> &Arc<MetadataCache> {
        &self.metadata
    }

    /// Load a view as floats, `None` if anything fails.
    ///
    /// With `normalize` the samples are rescaled into `[0, 1]`.
    pub fn load_float(&self, view: ViewId, normalize: bool) -> Option<Volume<f32>> {
        self.try_load_float(view, normalize)
            .inspect_err(|e| error!(%view, "Failed to load {}: {}", view, e))
            .ok()
    }

    /// Load a view as raw unsigned 16-bit samples, `None` if anything fails.
    pub fn load_unsigned16(&self, view: ViewId) -> Option<Volume<u16>> {
        self.try_load_unsigned16(view)
            .inspect_err(|e| error!(%view, "Failed to load {}: {}", view, e))
            .ok()
    }

    /// Publish the geometry of a view without reading any plane.
    pub fn load_metadata(&self, view: ViewId) {
        if let Err(e) = self.try_load_metadata(view) {
            error!(%view, "Failed to load metadata for {}: {}", view, e);
        }
    }

    pub fn try_load_float(
        &self,
        view: ViewId,
        normalize: bool,
    ) -> Result<Volume<f32>, VolumeLoaderError> {
        self.load_volume(view, |volume: &mut Volume<f32>| {
            if normalize {
                volume.normalize();
            }
        })
    }

    pub fn try_load_unsigned16(&self, view: ViewId) -> Result<Volume<u16>, VolumeLoaderError> {
        self.load_volume(view, |_: &mut Volume<u16>| {})
    }

    pub fn try_load_metadata(&self, view: ViewId) -> Result<VolumeGeometry, VolumeLoaderError> {
        self.ensure_backend()?;
        let resolved = self.resolve(view)?;
        let mut guard = self.open()?;

        let geometry = {
            let reader = guard.reader().map_err(VolumeLoaderError::ReaderQueryFailed)?;
            self.check_capture(reader, &resolved)?;
            derive_geometry(reader, &resolved, self.config.z_spacing_policy)?
        };
        self.metadata.update_metadata(view, geometry);

        guard.close().map_err(VolumeLoaderError::ReaderCloseFailed)?;
        Ok(geometry)
    }

    /// Look up the reader indices of a view.
    pub fn resolve(&self, view: ViewId) -> Result<ResolvedView, VolumeLoaderError> {
        let vd = self
            .registry
            .view_description(&view)
            .ok_or(VolumeLoaderError::ViewNotFound(view))?;

        Ok(ResolvedView {
            timepoint: vd.timepoint,
            capture: vd.setup.angle,
            channel: vd.setup.channel,
            illumination: vd.setup.illumination,
        })
    }

    fn ensure_backend(&self) -> Result<(), VolumeLoaderError> {
        if self.backend.is_available() {
            Ok(())
        } else {
            Err(VolumeLoaderError::BackendUnavailable(
                self.backend.name().to_string(),
            ))
        }
    }

    fn open(&self) -> Result<ReaderGuard<F::Reader>, VolumeLoaderError> {
        let reader =
            self.factory
                .open(&self.path)
                .map_err(|source| VolumeLoaderError::ReaderOpenFailed {
                    path: self.path.clone(),
                    source,
                })?;
        debug!(path = %self.path.display(), "Opened reader");
        Ok(ReaderGuard::new(reader))
    }

    fn load_volume<T: Sample>(
        &self,
        view: ViewId,
        finish: impl FnOnce(&mut Volume<T>),
    ) -> Result<Volume<T>, VolumeLoaderError> {
        self.ensure_backend()?;
        let resolved = self.resolve(view)?;
        let mut guard = self.open()?;

        let (mut volume, geometry) = {
            let reader = guard.reader_mut().map_err(VolumeLoaderError::ReaderQueryFailed)?;
            self.check_capture(reader, &resolved)?;

            let (width, height, depth) = reader
                .dimensions(resolved.capture)
                .map_err(VolumeLoaderError::ReaderQueryFailed)?;
            let bpp = reader
                .bytes_per_pixel(resolved.capture)
                .map_err(VolumeLoaderError::ReaderQueryFailed)?;
            check_layout(width, height, depth, bpp)?;
            let mut volume = Volume::<T>::zeros(width, height, depth);

            let written = populate_volume(reader, &mut volume, &resolved, self.config.endianness)?;
            finish(&mut volume);

            let geometry = derive_geometry(&*reader, &resolved, self.config.z_spacing_policy)?;
            if written != geometry.voxel_count() {
                return Err(VolumeLoaderError::SampleCountMismatch {
                    written,
                    expected: geometry.voxel_count(),
                });
            }
            (volume, geometry)
        };

        volume.spacing = (geometry.voxel_size_x, geometry.voxel_size_y, geometry.z_spacing);
        self.metadata.update_metadata(view, geometry);

        guard.close().map_err(VolumeLoaderError::ReaderCloseFailed)?;
        debug!(%view, ?geometry, "Loaded volume");
        Ok(volume)
    }

    fn check_capture(
        &self,
        reader: &F::Reader,
        resolved: &ResolvedView,
    ) -> Result<(), VolumeLoaderError> {
        if !self.config.check_capture_range {
            return Ok(());
        }
        let count = reader
            .capture_count()
            .map_err(VolumeLoaderError::ReaderQueryFailed)?;
        if resolved.capture >= count {
            return Err(VolumeLoaderError::CaptureOutOfRange {
                capture: resolved.capture,
                count,
            });
        }
        Ok(())
    }
}

/// Reject sample widths other than 16 bits and volumes whose byte size does
/// not fit in memory addressing.
fn check_layout(
    width: usize,
    height: usize,
    depth: usize,
    bytes_per_pixel: usize,
) -> Result<(), VolumeLoaderError> {
    let bytes = width
        .checked_mul(height)
        .and_then(|n| n.checked_mul(depth))
        .and_then(|n| n.checked_mul(bytes_per_pixel))
        .filter(|&n| n <= isize::MAX as usize);

    if bytes_per_pixel != SAMPLE_BYTES || bytes.is_none() {
        return Err(VolumeLoaderError::GeometryInconsistent {
            width,
            height,
            depth,
            bytes_per_pixel,
        });
    }
    Ok(())
}

/// Fill `volume` plane by plane, z ascending.
///
/// Samples of plane `z` land in `volume.data[[z, y, x]]` in row-major order,
/// the same order the reader lays them out in the buffer. Returns the number
/// of samples written.
pub fn populate_volume<R, T>(
    reader: &mut R,
    volume: &mut Volume<T>,
    resolved: &ResolvedView,
    endianness: Endianness,
) -> Result<usize, VolumeLoaderError>
where
    R: CaptureReader + ?Sized,
    T: Sample,
{
    let bpp = reader
        .bytes_per_pixel(resolved.capture)
        .map_err(VolumeLoaderError::ReaderQueryFailed)?;
    let (depth, height, width) = volume.dim();
    check_layout(width, height, depth, bpp)?;

    let plane_len = volume.width() * volume.height();
    let mut buffer = vec![0u8; bpp * plane_len];
    let mut samples = vec![0u16; plane_len];
    let mut written = 0;

    for (z, mut plane) in volume.data.axis_iter_mut(Axis(0)).enumerate() {
        reader
            .read_plane(
                &mut buffer,
                resolved.capture,
                resolved.illumination,
                resolved.timepoint,
                z,
                resolved.channel,
            )
            .map_err(|source| VolumeLoaderError::ReaderReadFailed { z, source })?;

        decode_samples(&buffer, &mut samples, endianness);

        for (dst, &src) in plane.iter_mut().zip(&samples) {
            *dst = T::from_raw(src);
            written += 1;
        }
    }

    Ok(written)
}

/// Query dimensions, voxel size and z-spacing of the resolved capture.
///
/// The z-spacing is the distance between the first two planes, or 1 for a
/// single plane.
pub fn derive_geometry<R>(
    reader: &R,
    resolved: &ResolvedView,
    policy: ZSpacingPolicy,
) -> Result<VolumeGeometry, VolumeLoaderError>
where
    R: CaptureReader + ?Sized,
{
    let capture = resolved.capture;
    let (width, height, depth) = reader
        .dimensions(capture)
        .map_err(VolumeLoaderError::ReaderQueryFailed)?;
    let voxel_size = reader
        .voxel_size(capture)
        .map_err(VolumeLoaderError::ReaderQueryFailed)?;

    let z_spacing = if depth > 1 {
        let timepoint = match policy {
            ZSpacingPolicy::FixedTimepointZero => 0,
            ZSpacingPolicy::PerVolumeTimepoint => resolved.timepoint,
        };
        let z0 = reader
            .axial_position(capture, timepoint, 0)
            .map_err(VolumeLoaderError::ReaderQueryFailed)?;
        let z1 = reader
            .axial_position(capture, timepoint, 1)
            .map_err(VolumeLoaderError::ReaderQueryFailed)?;
        (z1 - z0) as f32
    } else {
        1.0
    };

    if z_spacing <= 0.0 {
        warn!(capture, z_spacing, "Non-positive z-spacing reported by reader");
    }

    Ok(VolumeGeometry {
        width,
        height,
        depth,
        voxel_size_x: voxel_size,
        voxel_size_y: voxel_size,
        z_spacing,
    })
}

/// Decode `samples.len()` 16-bit samples from `bytes`.
fn decode_samples(bytes: &[u8], samples: &mut [u16], endianness: Endianness) {
    match endianness {
        Endianness::Little => LittleEndian::read_u16_into(bytes, samples),
        Endianness::Big => BigEndian::read_u16_into(bytes, samples),
        Endianness::Native => NativeEndian::read_u16_into(bytes, samples),
    }
}
