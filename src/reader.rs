//! The reader capability consumed by the volume loader.
//!
//! A [`CaptureReader`] is an open handle onto one source file. It answers
//! geometry queries per capture stream and copies single raw z-planes into a
//! caller-owned byte buffer. Readers are produced by a [`ReaderFactory`] and
//! are never shared between loads.

use std::path::Path;

use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum ReaderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("DICOM error: {0}")]
    Dicom(#[from] dicom::object::ReadError),

    #[error("No valid images found")]
    NoValidImages,

    #[error("Inconsistent image dimensions")]
    InconsistentDimensions,

    #[error("Missing spacing information")]
    MissingSpacing,

    #[error("Capture {capture} out of range, source has {count} capture(s)")]
    CaptureOutOfRange { capture: usize, count: usize },

    #[error("Plane {z} out of range, capture has {depth} plane(s)")]
    PlaneOutOfRange { z: usize, depth: usize },

    #[error("Plane buffer holds {actual} bytes, expected {expected}")]
    BufferSize { expected: usize, actual: usize },

    #[error("Reader is closed")]
    Closed,

    #[error("Backend error: {0}")]
    Backend(String),
}

/// An open source file exposing per-capture geometry and raw planes.
pub trait CaptureReader {
    /// Number of capture streams in the file.
    fn capture_count(&self) -> Result<usize, ReaderError>;

    /// Byte width of one sample of `capture`.
    fn bytes_per_pixel(&self, capture: usize) -> Result<usize, ReaderError>;

    /// `(width, height, depth)` of `capture`, depth counted in planes.
    fn dimensions(&self, capture: usize) -> Result<(usize, usize, usize), ReaderError>;

    /// Lateral voxel size, shared by x and y.
    fn voxel_size(&self, capture: usize) -> Result<f32, ReaderError>;

    /// Position of plane `z` along the optical axis.
    fn axial_position(&self, capture: usize, timepoint: usize, z: usize)
    -> Result<f64, ReaderError>;

    /// Fill `buffer` with the raw bytes of exactly one plane.
    fn read_plane(
        &mut self,
        buffer: &mut [u8],
        capture: usize,
        illumination: usize,
        timepoint: usize,
        z: usize,
        channel: usize,
    ) -> Result<(), ReaderError>;

    fn close(&mut self) -> Result<(), ReaderError>;
}

/// Opens source files, one fresh reader per call.
pub trait ReaderFactory: Send + Sync {
    type Reader: CaptureReader;

    fn open(&self, path: &Path) -> Result<Self::Reader, ReaderError>;
}

/// Scoped ownership of an open reader.
///
/// [`ReaderGuard::close`] hands the close result back to the caller. A guard
/// dropped without being closed still closes its reader and logs a failure.
pub struct ReaderGuard<R: CaptureReader> {
    reader: Option<R>,
}

impl<R: CaptureReader> ReaderGuard<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: Some(reader),
        }
    }

    pub fn reader(&self) -> Result<&R, ReaderError> {
        self.reader.as_ref().ok_or(ReaderError::Closed)
    }

    pub fn reader_mut(&mut self) -> Result<&mut R, ReaderError> {
        self.reader.as_mut().ok_or(ReaderError::Closed)
    }

    pub fn close(mut self) -> Result<(), ReaderError> {
        match self.reader.take() {
            Some(mut reader) => reader.close(),
            None => Ok(()),
        }
    }
}

impl<R: CaptureReader> Drop for ReaderGuard<R> {
    fn drop(&mut self) {
        if let Some(mut reader) = self.reader.take() {
            if let Err(e) = reader.close() {
                warn!("Failed to close reader: {}", e);
            }
        }
    }
}
