use serde::{Deserialize, Serialize};

use crate::model::LatLng;
use crate::notice::Notice;

pub const DEFAULT_LOCATION: LatLng = LatLng::new(42.3579, -71.0604);
pub const DEFAULT_ZOOM: f64 = 14.0;
/// Zoom used after the first successful downtown lookup
pub const DOWNTOWN_ZOOM: f64 = 16.0;

/// Map movements smaller than this are echoes of our own state, not user input.
const MAP_TOLERANCE: f64 = 1e-2;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputMethod {
    #[default]
    Place,
    Coordinates,
}

/// Everything the interactive map and its controls remember between events.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UiState {
    /// Area of interest for generation
    pub marker: LatLng,
    /// What the map widget is looking at
    pub center: LatLng,
    pub zoom: f64,
    pub last_input_method: InputMethod,
    pub stored_lat: f64,
    pub stored_lon: f64,
    pub location_set: bool,
    pub location_name: String,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            marker: DEFAULT_LOCATION,
            center: DEFAULT_LOCATION,
            zoom: DEFAULT_ZOOM,
            last_input_method: InputMethod::Place,
            stored_lat: DEFAULT_LOCATION.lat,
            stored_lon: DEFAULT_LOCATION.lng,
            location_set: false,
            location_name: String::new(),
        }
    }
}

impl UiState {
    pub fn stored(&self) -> LatLng {
        LatLng::new(self.stored_lat, self.stored_lon)
    }

    fn store(&mut self, position: LatLng) {
        self.stored_lat = position.lat;
        self.stored_lon = position.lng;
    }
}

/// What the map widget reports after an interaction. Every field is optional.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapEvent {
    pub last_clicked: Option<LatLng>,
    pub center: Option<LatLng>,
    pub zoom: Option<f64>,
}

/// All the ways the state can change.
#[derive(Clone, Debug, PartialEq)]
pub enum Action {
    SelectInputMethod(InputMethod),
    SetLocationName(String),
    /// Result of geocoding `name`
    PlaceResolved { name: String, downtown: bool, coords: Option<LatLng> },
    ApplyCoordinates { lat: f64, lon: f64 },
    MoveMarker,
    CenterOnMarker,
    Reset,
    MapEvent(MapEvent),
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < MAP_TOLERANCE
}

fn describe(position: LatLng) -> String {
    format!("({:.5}, {:.5})", position.lat, position.lng)
}

/// Apply one action. The input state is consumed; the returned notices are
/// meant for the user.
pub fn reduce(mut state: UiState, action: Action) -> (UiState, Vec<Notice>) {
    let mut notices = Vec::new();

    match action {
        Action::SelectInputMethod(method) => state.last_input_method = method,
        Action::SetLocationName(name) => state.location_name = name,
        Action::PlaceResolved { name, downtown, coords } => match coords {
            Some(position) => {
                state.marker = position;
                state.center = position;
                state.store(position);
                if downtown && !state.location_set {
                    state.zoom = DOWNTOWN_ZOOM;
                }
                state.location_set = true;
            }
            None => notices.push(Notice::Warning(format!(
                "Could not find coordinates for '{}'. Using default coordinates.", name))),
        },
        Action::ApplyCoordinates { lat, lon } => {
            let position = LatLng::new(lat, lon);
            if position.is_valid() {
                state.store(position);
                state.marker = position;
                state.center = position;
                notices.push(Notice::Success(format!("Coordinates updated to: {}", describe(position))));
            } else {
                notices.push(Notice::Error("Please enter valid latitude and longitude.".to_string()));
            }
        }
        Action::MoveMarker => {
            let marker = state.marker;
            state.store(marker);
            notices.push(Notice::Success(format!(
                "Input fields updated with marker position: {}", describe(marker))));
        }
        Action::CenterOnMarker => {
            state.center = state.marker;
            notices.push(Notice::Success(format!(
                "Map centered on marker position: {}", describe(state.marker))));
        }
        Action::Reset => state = UiState::default(),
        Action::MapEvent(event) => {
            if let Some(clicked) = event.last_clicked {
                state.marker = clicked;
                if state.last_input_method == InputMethod::Coordinates {
                    notices.push(Notice::Info(format!("Map clicked at: {}", describe(clicked))));
                }
            }
            if let Some(center) = event.center {
                if !(close(center.lat, state.center.lat) && close(center.lng, state.center.lng)) {
                    state.center = center;
                }
            }
            if let Some(zoom) = event.zoom {
                if !close(zoom, state.zoom) {
                    state.zoom = zoom;
                }
            }
        }
    }

    (state, notices)
}
