use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use image::GrayImage;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use capture_volume::{BackendCapability, Cli, DicomSeriesFactory, VolumeGeometry, VolumeLoader};

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let loader = VolumeLoader::new(
        &cli.source,
        DicomSeriesFactory::new(cli.sort_by),
        Arc::new(cli.sequence()),
        Arc::new(BackendCapability::available("dicom")),
    )
    .with_config(cli.loader_config());
    let view = cli.view();

    if cli.metadata_only {
        loader.load_metadata(view);
    } else if cli.loads_float() {
        let Some(volume) = loader.load_float(view, cli.normalize) else {
            return ExitCode::FAILURE;
        };
        info!("Loaded {:?} float samples", volume.dim());
        if let Some(path) = &cli.plane_png {
            if !save_plane(volume.plane_image(volume.depth() / 2), path) {
                return ExitCode::FAILURE;
            }
        }
    } else {
        let Some(volume) = loader.load_unsigned16(view) else {
            return ExitCode::FAILURE;
        };
        info!("Loaded {:?} 16-bit samples", volume.dim());
        if let Some(path) = &cli.plane_png {
            if !save_plane(volume.plane_image(volume.depth() / 2), path) {
                return ExitCode::FAILURE;
            }
        }
    }

    match loader.metadata_cache().get(&view) {
        Some(geometry) => print_geometry(&geometry),
        None => ExitCode::FAILURE,
    }
}

fn save_plane(image: Option<GrayImage>, path: &Path) -> bool {
    let Some(image) = image else {
        error!("Volume has no planes");
        return false;
    };
    match image.save(path) {
        Ok(()) => {
            info!("Wrote middle plane to {}", path.display());
            true
        }
        Err(e) => {
            error!("Failed to write {}: {}", path.display(), e);
            false
        }
    }
}

fn print_geometry(geometry: &VolumeGeometry) -> ExitCode {
    match serde_json::to_string_pretty(geometry) {
        Ok(json) => {
            println!("{}", json);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Failed to serialize geometry: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "capture_volume=debug"
    } else {
        "capture_volume=info"
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| env_filter.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
