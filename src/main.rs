use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use mapviz::{load_font, Color};

use streetmap::cache::Cache;
use streetmap::config::{load_style_overrides, ServiceArgs};
use streetmap::download::Downloader;
use streetmap::geocode::{get_place_coordinates, NominatimClient};
use streetmap::notice::Notice;
use streetmap::session::{Action, GenerateRequest, InputMethod, SessionController, DEFAULT_BBOX_SIZE, DEFAULT_FILENAME};
use streetmap::style::{Preset, StyleOptions, DEFAULT_BACKGROUND};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    services: ServiceArgs,

    /// Path to the output directory
    #[arg(short, long, default_value = "output")]
    output_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Look up the coordinates of a place
    Geocode {
        /// Free-form place name, e.g. "Boston, MA"
        place: String,

        /// Try "downtown <place>" first
        #[arg(short, long)]
        downtown: bool,
    },

    /// Download the streets around a place or point and render them to PNG
    Generate {
        /// Place name to center the map on
        #[arg(short, long, conflicts_with_all = ["lat", "lon"])]
        place: Option<String>,

        /// Focus on the downtown of the place, with a smaller area
        #[arg(short, long, requires = "place")]
        downtown: bool,

        /// Latitude of the map center
        #[arg(long, requires = "lon", allow_hyphen_values = true)]
        lat: Option<f64>,

        /// Longitude of the map center
        #[arg(long, requires = "lat", allow_hyphen_values = true)]
        lon: Option<f64>,

        /// Half-size of the area around the point, in degrees
        #[arg(short, long, default_value_t = DEFAULT_BBOX_SIZE)]
        bbox_size: f64,

        /// Named color scheme
        #[arg(long, value_enum, default_value_t = Preset::None)]
        preset: Preset,

        /// Background color as #rrggbb
        #[arg(long, default_value_t = DEFAULT_BACKGROUND)]
        background: Color,

        /// Leave the background transparent
        #[arg(long)]
        transparent: bool,

        /// Do not draw the legend
        #[arg(long)]
        no_legend: bool,

        /// JSON file with per-bucket color and width overrides
        #[arg(long)]
        style: Option<PathBuf>,

        /// Output file name, without extension
        #[arg(short, long, default_value = DEFAULT_FILENAME)]
        filename: String,
    },

    /// Clear the cache
    ClearCache,
}

fn report(notices: &[Notice]) -> Result<()> {
    for notice in notices {
        println!("[{}] {}", level(notice), notice.message());
    }
    if let Some(failure) = notices.iter().rev().find(|notice| notice.is_error()) {
        bail!("{}", failure.message());
    }
    Ok(())
}

fn level(notice: &Notice) -> &'static str {
    match notice {
        Notice::Success(_) => "ok",
        Notice::Info(_) => "info",
        Notice::Warning(_) => "warning",
        Notice::Error(_) => "error",
    }
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let config = cli.services.to_config();

    match cli.command {
        Commands::Geocode { place, downtown } => {
            let geocoder = NominatimClient::new(&config)
                .context("Failed to create geocoder")?;
            let outcome = get_place_coordinates(&geocoder, &place, downtown);
            report(&outcome.notices)?;
            match outcome.location {
                Some(location) => println!("{:.6}, {:.6}", location.lat, location.lng),
                None => bail!("No coordinates found for '{}'", place),
            }
        },

        Commands::Generate {
            place, downtown, lat, lon, bbox_size, preset, background, transparent, no_legend, style, filename,
        } => {
            let overrides = match &style {
                Some(path) => load_style_overrides(path)
                    .with_context(|| format!("Failed to read style file {}", path.display()))?,
                None => Default::default(),
            };
            let font = load_font(cli.services.font.as_deref())
                .context("Failed to load font")?;

            let geocoder = NominatimClient::new(&config)
                .context("Failed to create geocoder")?;
            let downloader = Downloader::new(&config)
                .context("Failed to create downloader")?;
            let mut session = SessionController::new(geocoder, downloader).with_font(font);

            let input_method = if lat.is_some() { InputMethod::Coordinates } else { InputMethod::Place };
            if let (Some(lat), Some(lon)) = (lat, lon) {
                report(&session.apply(Action::ApplyCoordinates { lat, lon }))?;
            }

            let request = GenerateRequest {
                input_method,
                place: place.unwrap_or_default(),
                downtown,
                bbox_size,
                lat,
                lon,
                style: StyleOptions {
                    preset,
                    transparent,
                    background,
                    legend: !no_legend,
                    overrides,
                },
            };
            report(&session.generate(&request))?;

            let (name, bytes) = session.download(&filename)
                .context("No map was generated")?
                .context("Failed to encode PNG")?;

            std::fs::create_dir_all(&cli.output_dir)
                .context("Failed to create output directory")?;
            let output_path = cli.output_dir.join(name);
            std::fs::write(&output_path, bytes)
                .with_context(|| format!("Failed to write {}", output_path.display()))?;
            info!("Wrote map to {}", output_path.display());
            println!("{}", output_path.display());
        },

        Commands::ClearCache => {
            info!("Clearing cache");
            let cache = Cache::new(&cli.services.cache_dir)
                .context("Failed to open cache")?;
            cache.clear()
                .context("Failed to clear cache")?;
            info!("Cache cleared");
        },
    }

    Ok(())
}
