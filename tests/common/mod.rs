//! A scripted in-memory reader for driving the loader in tests.

#![allow(dead_code)]

use std::path::Path;
use std::sync::{Arc, Mutex};

use capture_volume::{CaptureReader, ReaderError, ReaderFactory};

/// Geometry and pixel content of one synthetic capture.
#[derive(Debug, Clone)]
pub struct SyntheticCapture {
    pub width: usize,
    pub height: usize,
    pub depth: usize,
    pub bytes_per_pixel: usize,
    pub voxel_size: f32,
    /// Axial position of plane `z` at timepoint `t` is `t_offset * t + positions[z]`.
    pub positions: Vec<f64>,
    pub timepoint_offset: f64,
    /// Raw plane bytes, one entry per z.
    pub planes: Vec<Vec<u8>>,
}

impl SyntheticCapture {
    /// A capture whose samples all hold `value`, in native byte order.
    pub fn uniform(width: usize, height: usize, depth: usize, value: u16) -> Self {
        let plane: Vec<u8> = std::iter::repeat_n(value.to_ne_bytes(), width * height)
            .flatten()
            .collect();
        Self {
            width,
            height,
            depth,
            bytes_per_pixel: 2,
            voxel_size: 1.0,
            positions: (0..depth).map(|z| z as f64).collect(),
            timepoint_offset: 0.0,
            planes: vec![plane; depth],
        }
    }

    /// A capture where every sample holds its own linear index.
    pub fn ramp(width: usize, height: usize, depth: usize) -> Self {
        let plane_len = width * height;
        let planes = (0..depth)
            .map(|z| {
                (0..plane_len)
                    .flat_map(|i| ((z * plane_len + i) as u16).to_ne_bytes())
                    .collect::<Vec<u8>>()
            })
            .collect();
        Self {
            planes,
            ..Self::uniform(width, height, depth, 0)
        }
    }

    pub fn with_voxel_size(mut self, voxel_size: f32) -> Self {
        self.voxel_size = voxel_size;
        self
    }

    pub fn with_positions(mut self, positions: Vec<f64>) -> Self {
        self.positions = positions;
        self
    }

    pub fn with_timepoint_offset(mut self, offset: f64) -> Self {
        self.timepoint_offset = offset;
        self
    }

    pub fn with_bytes_per_pixel(mut self, bytes_per_pixel: usize) -> Self {
        self.bytes_per_pixel = bytes_per_pixel;
        self
    }

    pub fn with_planes(mut self, planes: Vec<Vec<u8>>) -> Self {
        self.planes = planes;
        self
    }
}

/// Something the loader did to a reader.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Open,
    ReadPlane {
        capture: usize,
        illumination: usize,
        timepoint: usize,
        z: usize,
        channel: usize,
    },
    AxialPosition {
        capture: usize,
        timepoint: usize,
        z: usize,
    },
    Close,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum Failure {
    #[default]
    None,
    Open,
    Dimensions,
    ReadPlane(usize),
    Close,
}

#[derive(Clone, Default)]
pub struct SyntheticFactory {
    captures: Vec<SyntheticCapture>,
    failure: Failure,
    events: Arc<Mutex<Vec<Event>>>,
}

impl SyntheticFactory {
    pub fn new(captures: Vec<SyntheticCapture>) -> Self {
        Self {
            captures,
            ..Self::default()
        }
    }

    pub fn failing(mut self, failure: Failure) -> Self {
        self.failure = failure;
        self
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, matches: impl Fn(&Event) -> bool) -> usize {
        self.events().iter().filter(|e| matches(e)).count()
    }

    pub fn opens(&self) -> usize {
        self.count(|e| *e == Event::Open)
    }

    pub fn closes(&self) -> usize {
        self.count(|e| *e == Event::Close)
    }

    pub fn plane_reads(&self) -> Vec<usize> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::ReadPlane { z, .. } => Some(z),
                _ => None,
            })
            .collect()
    }
}

impl ReaderFactory for SyntheticFactory {
    type Reader = SyntheticReader;

    fn open(&self, _path: &Path) -> Result<Self::Reader, ReaderError> {
        if self.failure == Failure::Open {
            return Err(ReaderError::Backend("cannot open file".to_string()));
        }
        self.events.lock().unwrap().push(Event::Open);
        Ok(SyntheticReader {
            captures: self.captures.clone(),
            failure: self.failure,
            events: Arc::clone(&self.events),
        })
    }
}

pub struct SyntheticReader {
    captures: Vec<SyntheticCapture>,
    failure: Failure,
    events: Arc<Mutex<Vec<Event>>>,
}

impl SyntheticReader {
    fn capture(&self, capture: usize) -> Result<&SyntheticCapture, ReaderError> {
        self.captures
            .get(capture)
            .ok_or(ReaderError::CaptureOutOfRange {
                capture,
                count: self.captures.len(),
            })
    }
}

impl CaptureReader for SyntheticReader {
    fn capture_count(&self) -> Result<usize, ReaderError> {
        Ok(self.captures.len())
    }

    fn bytes_per_pixel(&self, capture: usize) -> Result<usize, ReaderError> {
        Ok(self.capture(capture)?.bytes_per_pixel)
    }

    fn dimensions(&self, capture: usize) -> Result<(usize, usize, usize), ReaderError> {
        if self.failure == Failure::Dimensions {
            return Err(ReaderError::Backend("no dimensions".to_string()));
        }
        let c = self.capture(capture)?;
        Ok((c.width, c.height, c.depth))
    }

    fn voxel_size(&self, capture: usize) -> Result<f32, ReaderError> {
        Ok(self.capture(capture)?.voxel_size)
    }

    fn axial_position(
        &self,
        capture: usize,
        timepoint: usize,
        z: usize,
    ) -> Result<f64, ReaderError> {
        self.events.lock().unwrap().push(Event::AxialPosition {
            capture,
            timepoint,
            z,
        });
        let c = self.capture(capture)?;
        let position = c.positions.get(z).ok_or(ReaderError::PlaneOutOfRange {
            z,
            depth: c.depth,
        })?;
        Ok(c.timepoint_offset * timepoint as f64 + position)
    }

    fn read_plane(
        &mut self,
        buffer: &mut [u8],
        capture: usize,
        illumination: usize,
        timepoint: usize,
        z: usize,
        channel: usize,
    ) -> Result<(), ReaderError> {
        self.events.lock().unwrap().push(Event::ReadPlane {
            capture,
            illumination,
            timepoint,
            z,
            channel,
        });
        if self.failure == Failure::ReadPlane(z) {
            return Err(ReaderError::Backend(format!("plane {} unreadable", z)));
        }
        let c = self.capture(capture)?;
        let plane = c.planes.get(z).ok_or(ReaderError::PlaneOutOfRange {
            z,
            depth: c.depth,
        })?;
        if plane.len() != buffer.len() {
            return Err(ReaderError::BufferSize {
                expected: plane.len(),
                actual: buffer.len(),
            });
        }
        buffer.copy_from_slice(plane);
        Ok(())
    }

    fn close(&mut self) -> Result<(), ReaderError> {
        self.events.lock().unwrap().push(Event::Close);
        if self.failure == Failure::Close {
            return Err(ReaderError::Backend("close failed".to_string()));
        }
        Ok(())
    }
}
