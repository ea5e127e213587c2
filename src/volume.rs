use image::{GrayImage, ImageBuffer};
use ndarray::{Array3, ArrayView2, Axis};
use rayon::prelude::*;

/// Element type of a destination volume.
pub trait Sample: Copy + Default + Send + Sync + 'static {
    /// Convert one raw 16-bit sample.
    fn from_raw(value: u16) -> Self;
}

impl Sample for u16 {
    #[inline]
    fn from_raw(value: u16) -> Self {
        value
    }
}

impl Sample for f32 {
    #[inline]
    fn from_raw(value: u16) -> Self {
        f32::from(value)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Volume<T> {
    pub data: Array3<T>,
    pub spacing: (f32, f32, f32),
}

impl<T: Sample> Volume<T> {
    pub fn new(data: Array3<T>, spacing: (f32, f32, f32)) -> Self {
        Self { data, spacing }
    }

    /// Allocate a zero-filled volume of `width x height x depth` samples.
    pub fn zeros(width: usize, height: usize, depth: usize) -> Self {
        Self::new(
            Array3::from_elem((depth, height, width), T::default()),
            (1.0, 1.0, 1.0),
        )
    }

    /// Get the dimensions of the volume (depth, height, width)
    pub fn dim(&self) -> (usize, usize, usize) {
        self.data.dim()
    }

    pub fn width(&self) -> usize {
        self.data.dim().2
    }

    pub fn height(&self) -> usize {
        self.data.dim().1
    }

    pub fn depth(&self) -> usize {
        self.data.dim().0
    }

    /// Total number of samples.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Get a reference to the underlying data
    pub fn data(&self) -> &Array3<T> {
        &self.data
    }

    /// Get a mutable reference to the underlying data
    pub fn data_mut(&mut self) -> &mut Array3<T> {
        &mut self.data
    }

    pub fn plane(&self, z: usize) -> Option<ArrayView2<'_, T>> {
        (z < self.depth()).then(|| self.data.index_axis(Axis(0), z))
    }
}

impl Volume<u16> {
    #[inline]
    fn normalize_to_u8(value: u16) -> u8 {
        ((value as f32 / 65535.0) * 255.0).clamp(0.0, 255.0) as u8
    }

    /// Render plane `z` as an 8-bit image over the full 16-bit range.
    pub fn plane_image(&self, z: usize) -> Option<GrayImage> {
        let plane = self.plane(z)?;
        let (height, width) = plane.dim();
        let pixel_data: Vec<u8> = plane
            .iter()
            .map(|&v| Self::normalize_to_u8(v))
            .collect();
        ImageBuffer::from_raw(width as u32, height as u32, pixel_data)
    }
}

impl Volume<f32> {
    /// Minimum and maximum sample, `None` for an empty volume.
    pub fn min_max(&self) -> Option<(f32, f32)> {
        self.data.iter().fold(None, |acc, &v| match acc {
            None => Some((v, v)),
            Some((min, max)) => Some((min.min(v), max.max(v))),
        })
    }

    /// Rescale all samples linearly into `[0, 1]`.
    ///
    /// A constant volume becomes all zeros.
    pub fn normalize(&mut self) {
        let Some((min, max)) = self.min_max() else {
            return;
        };
        let range = max - min;
        if range > 0.0 {
            let inv_range = 1.0 / range;
            self.data.par_mapv_inplace(|v| (v - min) * inv_range);
        } else {
            self.data.par_mapv_inplace(|_| 0.0);
        }
    }

    /// Render plane `z` as an 8-bit image windowed to the plane's own range.
    pub fn plane_image(&self, z: usize) -> Option<GrayImage> {
        let plane = self.plane(z)?;
        let (height, width) = plane.dim();
        let samples: Vec<f32> = plane.iter().copied().collect();
        let (min, max) = samples
            .par_iter()
            .fold(
                || (f32::INFINITY, f32::NEG_INFINITY),
                |(min, max), &v| (min.min(v), max.max(v)),
            )
            .reduce(
                || (f32::INFINITY, f32::NEG_INFINITY),
                |a, b| (a.0.min(b.0), a.1.max(b.1)),
            );
        let range = max - min;
        let pixel_data: Vec<u8> = samples
            .par_iter()
            .map(|&v| {
                if range > 0.0 {
                    (((v - min) / range) * 255.0).clamp(0.0, 255.0) as u8
                } else {
                    0
                }
            })
            .collect();
        ImageBuffer::from_raw(width as u32, height as u32, pixel_data)
    }
}

impl From<&Volume<u16>> for Volume<f32> {
    fn from(volume: &Volume<u16>) -> Self {
        Volume::new(volume.data.mapv(f32::from_raw), volume.spacing)
    }
}
