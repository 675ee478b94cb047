use thiserror::Error;

#[derive(Error, Debug)]
pub enum MapError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Failed to parse response: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("Geocoding error: {0}")]
    GeocodeError(String),

    #[error("Fetch error: {0}")]
    FetchError(String),

    #[error("Invalid coordinates: latitude {lat}, longitude {lon}")]
    InvalidCoordinates { lat: f64, lon: f64 },

    #[error("Invalid style: {0}")]
    StyleError(String),

    #[error("Render error: {0}")]
    RenderError(#[from] mapviz::RenderError),
}

pub type StatusOr<T> = Result<T, MapError>;
