use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Args;
use reqwest::blocking::Client;

use crate::error::StatusOr;
use crate::style::StyleOverrides;

/// Endpoints and HTTP settings for the external map services.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub nominatim_url: String,
    pub overpass_url: String,
    /// Nominatim's usage policy requires an identifying user agent
    pub user_agent: String,
    pub timeout: Duration,
    /// Response cache directory; `None` disables caching
    pub cache_dir: Option<PathBuf>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            nominatim_url: "https://nominatim.openstreetmap.org/search".to_string(),
            overpass_url: "https://overpass-api.de/api/interpreter".to_string(),
            user_agent: concat!("streetmap/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout: Duration::from_secs(180),
            cache_dir: Some(PathBuf::from(".cache")),
        }
    }
}

impl ServiceConfig {
    pub fn http_client(&self) -> StatusOr<Client> {
        Ok(Client::builder()
            .user_agent(self.user_agent.clone())
            .timeout(self.timeout)
            .build()?)
    }
}

/// Command line flags shared by every front end.
#[derive(Args, Debug, Clone)]
pub struct ServiceArgs {
    /// Path to the cache directory
    #[arg(short, long, default_value = ".cache")]
    pub cache_dir: PathBuf,

    /// Do not cache geocoding and Overpass responses
    #[arg(long)]
    pub no_cache: bool,

    /// TrueType font for legend labels; a system font is used when omitted
    #[arg(long)]
    pub font: Option<PathBuf>,

    /// Nominatim search endpoint
    #[arg(long, default_value = "https://nominatim.openstreetmap.org/search")]
    pub nominatim_url: String,

    /// Overpass interpreter endpoint
    #[arg(long, default_value = "https://overpass-api.de/api/interpreter")]
    pub overpass_url: String,

    /// User agent sent to both services
    #[arg(long)]
    pub user_agent: Option<String>,

    /// HTTP timeout in seconds, also passed to Overpass
    #[arg(long, default_value_t = 180)]
    pub timeout_secs: u64,
}

impl ServiceArgs {
    pub fn to_config(&self) -> ServiceConfig {
        let defaults = ServiceConfig::default();
        ServiceConfig {
            nominatim_url: self.nominatim_url.clone(),
            overpass_url: self.overpass_url.clone(),
            user_agent: self.user_agent.clone().unwrap_or(defaults.user_agent),
            timeout: Duration::from_secs(self.timeout_secs),
            cache_dir: (!self.no_cache).then(|| self.cache_dir.clone()),
        }
    }
}

/// Read per-bucket overrides from a JSON style file, e.g.
/// `{"colors": {"primary": "#ff0000"}, "widths": {"<100": 0.2}}`.
pub fn load_style_overrides<P: AsRef<Path>>(path: P) -> StatusOr<StyleOverrides> {
    let file = File::open(path.as_ref())?;
    Ok(serde_json::from_reader(file)?)
}
