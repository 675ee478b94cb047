//! In-memory stand-ins for the external services.

use std::cell::RefCell;
use std::collections::HashMap;

use crate::download::{GraphFetcher, GraphSource};
use crate::error::{MapError, StatusOr};
use crate::geocode::{GeocodingService, Place, PlaceBounds};
use crate::model::{Edge, EdgeAttributes, Highway, LatLng, Node, StreetGraph};

/// Geocoder answering from a fixed table. Unknown queries find nothing.
#[derive(Default)]
pub struct FakeGeocoder {
    answers: HashMap<String, Option<LatLng>>,
    queries: RefCell<Vec<String>>,
}

impl FakeGeocoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_place(mut self, query: &str, location: LatLng) -> Self {
        self.answers.insert(query.to_string(), Some(location));
        self
    }

    /// Make `query` fail as if the service were down.
    pub fn with_error(mut self, query: &str) -> Self {
        self.answers.insert(query.to_string(), None);
        self
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.borrow().clone()
    }
}

impl GeocodingService for FakeGeocoder {
    fn search(&self, query: &str) -> StatusOr<Vec<Place>> {
        self.queries.borrow_mut().push(query.to_string());
        match self.answers.get(query) {
            Some(Some(location)) => Ok(vec![Place {
                display_name: query.to_string(),
                location: *location,
                osm_type: Some("relation".to_string()),
                osm_id: Some(1000 + self.answers.len() as i64),
                bounds: Some(PlaceBounds {
                    south: location.lat - 0.01,
                    north: location.lat + 0.01,
                    west: location.lng - 0.01,
                    east: location.lng + 0.01,
                }),
            }]),
            Some(None) => Err(MapError::GeocodeError("service unavailable".to_string())),
            None => Ok(Vec::new()),
        }
    }
}

/// Fetcher that hands out one prepared graph, or fails when it has none.
#[derive(Default)]
pub struct FakeFetcher {
    graph: Option<StreetGraph>,
    requests: RefCell<Vec<GraphSource>>,
}

impl FakeFetcher {
    pub fn returning(graph: StreetGraph) -> Self {
        Self { graph: Some(graph), requests: RefCell::default() }
    }

    pub fn failing() -> Self {
        Self::default()
    }

    pub fn requests(&self) -> Vec<GraphSource> {
        self.requests.borrow().clone()
    }
}

impl GraphFetcher for FakeFetcher {
    fn fetch_graph(&self, source: &GraphSource) -> StatusOr<StreetGraph> {
        self.requests.borrow_mut().push(source.clone());
        self.graph.clone()
            .ok_or_else(|| MapError::FetchError("Overpass returned HTTP 504 Gateway Timeout".to_string()))
    }
}

/// Three streets around a corner in Boston: a short residential stub, a
/// longer residential street and a primary road.
pub fn small_graph() -> StreetGraph {
    let mut graph = StreetGraph::new();
    let nodes = [
        (1, 42.3579, -71.0604),
        (2, 42.3585, -71.0604),
        (3, 42.3585, -71.0580),
        (4, 42.3620, -71.0604),
    ];
    for (id, lat, lng) in nodes {
        graph.add_node(Node { id, lat, lng });
    }

    let streets = [
        (1, 2, 66.7, "residential"),
        (2, 3, 197.0, "residential"),
        (2, 4, 389.2, "primary"),
    ];
    for (a, b, length, class) in streets {
        let geometry = [a, b].iter()
            .map(|id| (graph.nodes[id].lng, graph.nodes[id].lat))
            .collect();
        graph.add_edge(Edge {
            source_node_id: a,
            destination_node_id: b,
            geometry,
            attributes: EdgeAttributes {
                length: Some(length),
                highway: Some(Highway::Single(class.to_string())),
                ..EdgeAttributes::default()
            },
        });
    }
    graph
}
