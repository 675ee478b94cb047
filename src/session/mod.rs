//! The session controller: owns the UI state, runs the reducer and drives
//! geocode, fetch and render on behalf of a front end.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use log::{error, info};
use mapviz::{encode_png, Font, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::download::{BoundingBox, GraphFetcher, GraphSource};
use crate::error::StatusOr;
use crate::geocode::{get_place_coordinates, GeocodingService};
use crate::model::{LatLng, StreetGraph};
use crate::notice::Notice;
use crate::pipeline::render_street_map;
use crate::style::StyleOptions;

mod state;

pub use state::{reduce, Action, InputMethod, MapEvent, UiState, DEFAULT_LOCATION};

/// Bounding box slider range and default, in degrees
pub const MIN_BBOX_SIZE: f64 = 0.005;
pub const MAX_BBOX_SIZE: f64 = 0.05;
pub const DEFAULT_BBOX_SIZE: f64 = 0.015;
/// Half-size cap when the map is focused on a downtown
pub const DOWNTOWN_BBOX_SIZE: f64 = 0.015;

pub const DEFAULT_FILENAME: &str = "street_map";
pub const OUTPUT_DPI: f32 = 300.0;

/// Street networks kept in memory per session, most recent last
const MAX_CACHED_GRAPHS: usize = 4;

fn default_downtown() -> bool {
    true
}

/// Events a front end can post. Each maps onto one reducer action.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    SelectInputMethod { method: InputMethod },
    EnterPlace { name: String, #[serde(default = "default_downtown")] downtown: bool },
    /// Blank fields arrive as `null`
    ApplyCoordinates { lat: Option<f64>, lon: Option<f64> },
    MoveMarker,
    CenterOnMarker,
    Reset,
    Map(MapEvent),
}

/// Everything the Generate button reads.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerateRequest {
    pub input_method: InputMethod,
    pub place: String,
    pub downtown: bool,
    /// Half-size of the bounding box around the marker, in degrees
    pub bbox_size: f64,
    /// Coordinate fields as typed; only checked in coordinate mode
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub style: StyleOptions,
}

impl Default for GenerateRequest {
    fn default() -> Self {
        Self {
            input_method: InputMethod::Place,
            place: String::new(),
            downtown: default_downtown(),
            bbox_size: DEFAULT_BBOX_SIZE,
            lat: None,
            lon: None,
            style: StyleOptions::default(),
        }
    }
}

impl GenerateRequest {
    /// Where the street network comes from for a marker at `marker`.
    pub fn source(&self, marker: LatLng) -> GraphSource {
        let size = self.bbox_size.clamp(MIN_BBOX_SIZE, MAX_BBOX_SIZE);
        match self.input_method {
            InputMethod::Place if !self.place.trim().is_empty() && !self.downtown => {
                GraphSource::Place(self.place.trim().to_string())
            }
            InputMethod::Place if self.downtown => {
                GraphSource::BoundingBox(BoundingBox::around(marker, size.min(DOWNTOWN_BBOX_SIZE)))
            }
            _ => GraphSource::BoundingBox(BoundingBox::around(marker, size)),
        }
    }

    fn coordinates_valid(&self) -> bool {
        if self.input_method != InputMethod::Coordinates {
            return true;
        }
        match (self.lat, self.lon) {
            (Some(lat), Some(lon)) => LatLng::new(lat, lon).is_valid(),
            _ => false,
        }
    }
}

/// The last generated map.
#[derive(Clone, Debug)]
pub struct RenderedFigure {
    pub image: RgbaImage,
    pub transparent: bool,
    pub generated_at: DateTime<Utc>,
}

/// One user's session.
pub struct SessionController<G, F> {
    geocoder: G,
    fetcher: F,
    font: Option<Font<'static>>,
    state: UiState,
    graphs: VecDeque<(String, StreetGraph)>,
    figure: Option<RenderedFigure>,
}

impl<G: GeocodingService, F: GraphFetcher> SessionController<G, F> {
    pub fn new(geocoder: G, fetcher: F) -> Self {
        Self {
            geocoder,
            fetcher,
            font: None,
            state: UiState::default(),
            graphs: VecDeque::new(),
            figure: None,
        }
    }

    /// Font for the legend labels
    pub fn with_font(mut self, font: Option<Font<'static>>) -> Self {
        self.font = font;
        self
    }

    pub fn state(&self) -> &UiState {
        &self.state
    }

    pub fn figure(&self) -> Option<&RenderedFigure> {
        self.figure.as_ref()
    }

    /// Run one action through the reducer.
    pub fn apply(&mut self, action: Action) -> Vec<Notice> {
        let (state, notices) = reduce(std::mem::take(&mut self.state), action);
        self.state = state;
        for notice in &notices {
            notice.log();
        }
        notices
    }

    /// Record a place name and geocode it when it is new, or when no
    /// location has been set yet.
    pub fn enter_place(&mut self, name: &str, downtown: bool) -> Vec<Notice> {
        let name = name.trim();
        let changed = name != self.state.location_name;
        let mut notices = self.apply(Action::SetLocationName(name.to_string()));

        if name.is_empty() || !(changed || !self.state.location_set) {
            return notices;
        }

        let outcome = get_place_coordinates(&self.geocoder, name, downtown);
        notices.extend(outcome.notices);
        notices.extend(self.apply(Action::PlaceResolved {
            name: name.to_string(),
            downtown,
            coords: outcome.location,
        }));
        notices
    }

    pub fn dispatch(&mut self, event: Event) -> Vec<Notice> {
        match event {
            Event::EnterPlace { name, downtown } => self.enter_place(&name, downtown),
            Event::SelectInputMethod { method } => self.apply(Action::SelectInputMethod(method)),
            Event::ApplyCoordinates { lat, lon } => self.apply(Action::ApplyCoordinates {
                lat: lat.unwrap_or(f64::NAN),
                lon: lon.unwrap_or(f64::NAN),
            }),
            Event::MoveMarker => self.apply(Action::MoveMarker),
            Event::CenterOnMarker => self.apply(Action::CenterOnMarker),
            Event::Reset => self.apply(Action::Reset),
            Event::Map(map) => self.apply(Action::MapEvent(map)),
        }
    }

    /// Fetch a street network, reusing one of the last few when the source repeats.
    fn fetch(&mut self, source: &GraphSource) -> StatusOr<&StreetGraph> {
        let key = source.key();
        let entry = match self.graphs.iter().position(|(cached, _)| *cached == key) {
            Some(index) => {
                info!("Reusing street network for {}", key);
                self.graphs.remove(index)
            }
            None => None,
        };
        let entry = match entry {
            Some(entry) => entry,
            None => (key, self.fetcher.fetch_graph(source)?),
        };

        if self.graphs.len() >= MAX_CACHED_GRAPHS {
            self.graphs.pop_front();
        }
        self.graphs.push_back(entry);
        // Just pushed
        Ok(&self.graphs[self.graphs.len() - 1].1)
    }

    /// Fetch, classify and render the map around the marker. On success the
    /// figure replaces the previous one; on failure the previous one stays.
    pub fn generate(&mut self, request: &GenerateRequest) -> Vec<Notice> {
        let mut notices = self.apply(Action::SelectInputMethod(request.input_method));

        if request.input_method == InputMethod::Place && !request.place.trim().is_empty() {
            notices.extend(self.enter_place(&request.place, request.downtown));
        }

        if !request.coordinates_valid() {
            let notice = Notice::Error("Please enter valid latitude and longitude.".to_string());
            notice.log();
            notices.push(notice);
            return notices;
        }

        let style = match request.style.resolve() {
            Ok(style) => style,
            Err(e) => {
                notices.push(Notice::Error(e.to_string()));
                return notices;
            }
        };

        let source = request.source(self.state.marker);
        info!("Generating map from {}", source.key());

        let font = self.font.clone();
        let result = self.fetch(&source).and_then(|graph| {
            if graph.is_empty() {
                return Ok(None);
            }
            render_street_map(graph, &style, font.as_ref()).map(Some)
        });

        let notice = match result {
            Ok(Some(image)) => {
                self.figure = Some(RenderedFigure {
                    image,
                    transparent: style.background.is_transparent(),
                    generated_at: Utc::now(),
                });
                Notice::Success("Map generated.".to_string())
            }
            Ok(None) => Notice::Error("No road data found. Try adjusting your input.".to_string()),
            Err(e) => {
                error!("Generation from {} failed: {}", source.key(), e);
                Notice::Error(format!("Error fetching street network: {}", e))
            }
        };
        notice.log();
        notices.push(notice);
        notices
    }

    /// PNG bytes of the current figure and the file name to save them under.
    pub fn download(&self, filename: &str) -> Option<StatusOr<(String, Vec<u8>)>> {
        let figure = self.figure.as_ref()?;
        let filename = match filename.trim() {
            "" => DEFAULT_FILENAME,
            name => name,
        };
        Some(encode_png(&figure.image, OUTPUT_DPI)
            .map(|bytes| (format!("{}.png", filename), bytes))
            .map_err(Into::into))
    }
}
