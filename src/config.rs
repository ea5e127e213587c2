//! Loader options and the command line of the `capture-volume` binary.
//!
//! Every command line option can also be set through an environment
//! variable with the `VOLUME_` prefix:
//!
//! - `VOLUME_TIMEPOINT` - Timepoint id of the view (default: 0)
//! - `VOLUME_SETUP` - View setup id of the view (default: 0)
//! - `VOLUME_ANGLE` - Angle attribute id, i.e. the capture index (default: 0)
//! - `VOLUME_CHANNEL` - Channel attribute id (default: 0)
//! - `VOLUME_ILLUMINATION` - Illumination attribute id (default: 0)
//! - `VOLUME_SORT_BY` - Plane order of a DICOM series (default: image-position-patient)
//! - `VOLUME_ENDIANNESS` - Byte order of raw samples (default: native)
//! - `VOLUME_Z_SPACING` - Z-spacing policy (default: fixed-timepoint-zero)

use std::path::PathBuf;

use clap::Parser;

use crate::enums::{Endianness, SortBy, ZSpacingPolicy};
use crate::registry::{SequenceDescription, ViewId, ViewSetup};

// =============================================================================
// Loader Configuration
// =============================================================================

/// Options applied to every load of a [`crate::VolumeLoader`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoaderConfig {
    /// Byte order used to decode plane buffers.
    pub endianness: Endianness,

    /// Timepoint queried for the axial positions behind the z-spacing.
    pub z_spacing_policy: ZSpacingPolicy,

    /// Reject capture indices the reader does not report.
    pub check_capture_range: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            endianness: Endianness::default(),
            z_spacing_policy: ZSpacingPolicy::default(),
            check_capture_range: true,
        }
    }
}

impl LoaderConfig {
    pub fn with_endianness(mut self, endianness: Endianness) -> Self {
        self.endianness = endianness;
        self
    }

    pub fn with_z_spacing_policy(mut self, policy: ZSpacingPolicy) -> Self {
        self.z_spacing_policy = policy;
        self
    }

    pub fn with_capture_range_check(mut self, enabled: bool) -> Self {
        self.check_capture_range = enabled;
        self
    }
}

// =============================================================================
// CLI Arguments
// =============================================================================

/// Load one view of a DICOM series as a volume and report its geometry.
#[derive(Parser, Debug, Clone)]
#[command(name = "capture-volume")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Directory holding the .dcm files of the series.
    pub source: PathBuf,

    /// Timepoint id of the view.
    #[arg(long, default_value_t = 0, env = "VOLUME_TIMEPOINT")]
    pub timepoint: usize,

    /// View setup id of the view.
    #[arg(long, default_value_t = 0, env = "VOLUME_SETUP")]
    pub setup: usize,

    /// Angle attribute id of the setup, used as capture index.
    #[arg(long, default_value_t = 0, env = "VOLUME_ANGLE")]
    pub angle: usize,

    /// Channel attribute id of the setup.
    #[arg(long, default_value_t = 0, env = "VOLUME_CHANNEL")]
    pub channel: usize,

    /// Illumination attribute id of the setup.
    #[arg(long, default_value_t = 0, env = "VOLUME_ILLUMINATION")]
    pub illumination: usize,

    /// Plane order of the series.
    #[arg(long, value_enum, default_value_t = SortBy::default(), env = "VOLUME_SORT_BY")]
    pub sort_by: SortBy,

    /// Byte order of the raw 16-bit samples.
    #[arg(long, value_enum, default_value_t = Endianness::default(), env = "VOLUME_ENDIANNESS")]
    pub endianness: Endianness,

    /// Timepoint used to measure the z-spacing.
    #[arg(long, value_enum, default_value_t = ZSpacingPolicy::default(), env = "VOLUME_Z_SPACING")]
    pub z_spacing: ZSpacingPolicy,

    /// Load as 32-bit floats instead of raw 16-bit samples.
    #[arg(long)]
    pub float: bool,

    /// Load as floats rescaled into [0, 1]. Implies `--float`.
    #[arg(long)]
    pub normalize: bool,

    /// Only read the geometry, skip the pixel data.
    #[arg(long, conflicts_with_all = ["float", "normalize", "plane_png"])]
    pub metadata_only: bool,

    /// Write the middle plane of the volume as PNG to this path.
    #[arg(long)]
    pub plane_png: Option<PathBuf>,

    /// Enable verbose logging.
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Whether the volume is loaded as floats.
    pub fn loads_float(&self) -> bool {
        self.float || self.normalize
    }

    pub fn view(&self) -> ViewId {
        ViewId::new(self.timepoint, self.setup)
    }

    pub fn loader_config(&self) -> LoaderConfig {
        LoaderConfig::default()
            .with_endianness(self.endianness)
            .with_z_spacing_policy(self.z_spacing)
    }

    /// A single-view sequence matching the command line.
    pub fn sequence(&self) -> SequenceDescription {
        SequenceDescription::new()
            .with_timepoints([self.timepoint])
            .with_setup(
                ViewSetup::new(self.setup, self.angle, self.channel)
                    .with_illumination(self.illumination),
            )
    }
}
