//! # Capture-volume library
//!
//! This crate assembles 3-D image volumes out of multi-capture microscopy
//! sources, one z-plane at a time.
//!
//! A source file is read through a [`CaptureReader`], a small capability
//! interface that reports per-capture geometry and copies single raw planes
//! into a byte buffer. The [`VolumeLoader`] maps a logical view (timepoint
//! and view setup) to reader indices through a [`SequenceRegistry`], fills
//! a destination [`Volume`] plane by plane and publishes the discovered
//! geometry into a shared [`MetadataCache`]:
//!  - dimensions (width, height, depth)
//!  - lateral voxel size
//!  - z-spacing, measured between the first two planes
//!
//! Volumes come in two flavours: raw unsigned 16-bit samples, or floats
//! that can optionally be rescaled into `[0, 1]`. Raw plane bytes are decoded
//! with a configurable byte order.
//!
//! The readers of proprietary formats often depend on a native library.
//! Whether that library could be loaded is modelled by a
//! [`BackendCapability`], probed once and shared between loaders. A pure
//! Rust [`DicomSeriesReader`] over a directory of DICOM files is bundled.
//!
//! # Examples
//!
//! ## Loading a view of a DICOM series
//!
//! ```no_run
//! # use capture_volume::{
//! #     BackendCapability, DicomSeriesFactory, SequenceDescription, SortBy, ViewId, ViewSetup,
//! #     VolumeLoader,
//! # };
//! # use std::sync::Arc;
//! let sequence = SequenceDescription::new()
//!     .with_timepoints([0])
//!     .with_setup(ViewSetup::new(0, 0, 0));
//! let loader = VolumeLoader::new(
//!     "dicom",
//!     DicomSeriesFactory::new(SortBy::InstanceNumber),
//!     Arc::new(sequence),
//!     Arc::new(BackendCapability::available("dicom")),
//! );
//!
//! let view = ViewId::new(0, 0);
//! let volume = loader
//!     .load_unsigned16(view)
//!     .expect("should have loaded the view");
//! let image = volume
//!     .plane_image(volume.depth() / 2)
//!     .expect("should have returned the middle plane");
//! image.save("result.png").expect("should have written the image");
//!
//! let geometry = loader.metadata_cache().get(&view);
//! ```

pub mod backend;
pub mod config;
pub mod dicom_reader;
pub mod enums;
pub mod metadata;
pub mod reader;
pub mod registry;
pub mod volume;
pub mod volume_loader;

pub use backend::BackendCapability;
pub use config::{Cli, LoaderConfig};
pub use dicom_reader::{DicomSeriesFactory, DicomSeriesReader};
pub use enums::{Endianness, SortBy, ZSpacingPolicy};
pub use metadata::{MetadataCache, VolumeGeometry};
pub use reader::{CaptureReader, ReaderError, ReaderFactory, ReaderGuard};
pub use registry::{SequenceDescription, SequenceRegistry, ViewDescription, ViewId, ViewSetup};
pub use volume::{Sample, Volume};
pub use volume_loader::{
    ResolvedView, VolumeLoader, VolumeLoaderError, derive_geometry, populate_volume,
};
