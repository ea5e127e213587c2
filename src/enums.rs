use clap::ValueEnum;

/// Byte order of the 16-bit samples a reader writes into a plane buffer.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Endianness {
    Little,
    Big,
    #[default]
    Native,
}

/// Which timepoint the axial positions for the z-spacing are queried at.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ZSpacingPolicy {
    /// Always query timepoint 0, whatever the timepoint of the volume.
    #[default]
    FixedTimepointZero,
    /// Query the timepoint of the volume being loaded.
    PerVolumeTimepoint,
}

/// Order of the planes of a DICOM series.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SortBy {
    #[default]
    ImagePositionPatient,
    TablePosition,
    InstanceNumber,
    None,
}
