use log::info;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use crate::cache::Cache;
use crate::config::ServiceConfig;
use crate::error::{MapError, StatusOr};
use crate::geocode::{GeocodingService, NominatimClient, Place};
use crate::model::processor::process_overpass_json;
use crate::model::{LatLng, StreetGraph};

/// Every road, path and track, minus areas and roads that do not exist yet (or any more)
pub const NETWORK_FILTER: &str = concat!(
    r#"["highway"]["area"!~"yes"]"#,
    r#"["highway"!~"abandoned|construction|no|planned|platform|proposed|raceway|razed"]"#,
);

/// Overpass derives area ids from the OSM id of the outline
const RELATION_AREA_OFFSET: i64 = 3_600_000_000;
const WAY_AREA_OFFSET: i64 = 2_400_000_000;

/// A latitude/longitude rectangle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
}

impl BoundingBox {
    /// Square of half-size `half_size` degrees around a point: (top, bottom, right, left).
    pub fn around(center: LatLng, half_size: f64) -> Self {
        Self {
            north: center.lat + half_size,
            south: center.lat - half_size,
            east: center.lng + half_size,
            west: center.lng - half_size,
        }
    }

    /// Overpass wants `(south, west, north, east)`
    pub fn to_overpass(&self) -> String {
        format!("{},{},{},{}", self.south, self.west, self.north, self.east)
    }
}

/// Sources for street network data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GraphSource {
    /// A named place, resolved to its OSM outline
    Place(String),
    /// Everything inside a rectangle
    BoundingBox(BoundingBox),
}

impl GraphSource {
    /// Stable identity of the request, used to memoize fetches
    pub fn key(&self) -> String {
        match self {
            GraphSource::Place(place) => format!("place:{}", place),
            GraphSource::BoundingBox(bbox) => format!("bbox:{}", bbox.to_overpass()),
        }
    }
}

/// Where an Overpass query looks
#[derive(Debug, Clone, PartialEq)]
pub enum SearchArea {
    Area(i64),
    Bbox(BoundingBox),
}

impl SearchArea {
    /// Area of a geocoded place: its outline when it has one, else its bounding box.
    pub fn for_place(place: &Place) -> Option<Self> {
        let area = match (place.osm_type.as_deref(), place.osm_id) {
            (Some("relation"), Some(id)) => Some(SearchArea::Area(RELATION_AREA_OFFSET + id)),
            (Some("way"), Some(id)) => Some(SearchArea::Area(WAY_AREA_OFFSET + id)),
            _ => None,
        };
        area.or_else(|| place.bounds.map(|b| SearchArea::Bbox(BoundingBox {
            north: b.north,
            south: b.south,
            east: b.east,
            west: b.west,
        })))
    }
}

/// Build the Overpass QL query for all streets in an area, with their nodes
pub fn overpass_query(area: &SearchArea, timeout_secs: u64) -> String {
    match area {
        SearchArea::Area(id) => format!(
            "[out:json][timeout:{}];area({})->.searchArea;(way{}(area.searchArea);>;);out;",
            timeout_secs, id, NETWORK_FILTER),
        SearchArea::Bbox(bbox) => format!(
            "[out:json][timeout:{}];(way{}({});>;);out;",
            timeout_secs, NETWORK_FILTER, bbox.to_overpass()),
    }
}

/// Anything that can produce a street graph for a source
pub trait GraphFetcher {
    fn fetch_graph(&self, source: &GraphSource) -> StatusOr<StreetGraph>;
}

/// Downloader for street networks from the Overpass API
pub struct Downloader<G = NominatimClient> {
    client: Client,
    overpass_url: String,
    timeout_secs: u64,
    cache: Option<Cache>,
    geocoder: G,
}

impl Downloader<NominatimClient> {
    pub fn new(config: &ServiceConfig) -> StatusOr<Self> {
        let geocoder = NominatimClient::new(config)?;
        Self::with_geocoder(config, geocoder)
    }
}

impl<G: GeocodingService> Downloader<G> {
    /// Create a downloader that resolves place names with `geocoder`
    pub fn with_geocoder(config: &ServiceConfig, geocoder: G) -> StatusOr<Self> {
        let cache = config.cache_dir.as_ref().map(Cache::new).transpose()?;
        Ok(Self {
            client: config.http_client()?,
            overpass_url: config.overpass_url.clone(),
            timeout_secs: config.timeout.as_secs(),
            cache,
            geocoder,
        })
    }

    pub fn geocoder(&self) -> &G {
        &self.geocoder
    }

    fn cache_key(&self, query: &str) -> String {
        format!("{}\n{}", self.overpass_url, query)
    }

    fn search_area(&self, source: &GraphSource) -> StatusOr<SearchArea> {
        match source {
            GraphSource::BoundingBox(bbox) => Ok(SearchArea::Bbox(*bbox)),
            GraphSource::Place(name) => {
                let places = self.geocoder.search(name)?;
                let place = places.first()
                    .ok_or_else(|| MapError::FetchError(format!("Nominatim found nothing for '{}'", name)))?;
                info!("Resolved '{}' to {}", name, place.display_name);
                SearchArea::for_place(place)
                    .ok_or_else(|| MapError::FetchError(format!("'{}' has no outline or bounding box", name)))
            }
        }
    }

    /// Send a query to the Overpass interpreter
    fn run_query(&self, query: &str) -> StatusOr<Vec<u8>> {
        info!("Querying {}", self.overpass_url);
        let response = self.client.post(&self.overpass_url)
            .form(&[("data", query)])
            .send()?;

        if !response.status().is_success() {
            return Err(MapError::FetchError(format!("Overpass returned HTTP {}", response.status())));
        }
        Ok(response.bytes()?.to_vec())
    }
}

impl<G: GeocodingService> GraphFetcher for Downloader<G> {
    fn fetch_graph(&self, source: &GraphSource) -> StatusOr<StreetGraph> {
        let area = self.search_area(source)?;
        let query = overpass_query(&area, self.timeout_secs);
        let key = self.cache_key(&query);

        if let Some(cached) = self.cache.as_ref().and_then(|cache| cache.get(&key)) {
            info!("Using cached Overpass response for {}", source.key());
            return process_overpass_json(&cached);
        }

        let data = self.run_query(&query)?;
        // Parse before caching so a bad reply is never replayed
        let graph = process_overpass_json(&data)?;

        if let Some(cache) = &self.cache {
            let path = cache.save(&key, &data)?;
            info!("Cached Overpass response at {}", path.display());
        }
        Ok(graph)
    }
}
