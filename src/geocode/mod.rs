use geo::Centroid;
use log::{debug, info};
use reqwest::blocking::Client;
use serde::Deserialize;

use crate::cache::Cache;
use crate::config::ServiceConfig;
use crate::error::{MapError, StatusOr};
use crate::model::LatLng;
use crate::notice::Notice;

/// Bounding box as Nominatim reports it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaceBounds {
    pub south: f64,
    pub north: f64,
    pub west: f64,
    pub east: f64,
}

/// One geocoding hit
#[derive(Debug, Clone, PartialEq)]
pub struct Place {
    pub display_name: String,
    /// Centroid of the returned geometry
    pub location: LatLng,
    /// `node`, `way` or `relation`
    pub osm_type: Option<String>,
    pub osm_id: Option<i64>,
    pub bounds: Option<PlaceBounds>,
}

/// Anything that turns a free-form query into places, best match first.
pub trait GeocodingService {
    fn search(&self, query: &str) -> StatusOr<Vec<Place>>;
}

impl<T: GeocodingService + ?Sized> GeocodingService for &T {
    fn search(&self, query: &str) -> StatusOr<Vec<Place>> {
        (**self).search(query)
    }
}

#[derive(Debug, Deserialize)]
struct NominatimPlace {
    lat: String,
    lon: String,
    #[serde(default)]
    display_name: String,
    osm_type: Option<String>,
    osm_id: Option<i64>,
    #[serde(default)]
    boundingbox: Vec<String>,
    geojson: Option<geojson::Geometry>,
}

fn parse_coordinate(value: &str) -> StatusOr<f64> {
    value.parse()
        .map_err(|_| MapError::GeocodeError(format!("invalid coordinate {:?}", value)))
}

impl NominatimPlace {
    fn into_place(self) -> StatusOr<Place> {
        let point = LatLng::new(parse_coordinate(&self.lat)?, parse_coordinate(&self.lon)?);

        // Prefer the centroid of the outline; points and odd geometries fall back to lat/lon
        let location = self.geojson
            .and_then(|geometry| geo::Geometry::<f64>::try_from(geometry).ok())
            .and_then(|geometry| geometry.centroid())
            .map(|centroid| LatLng::new(centroid.y(), centroid.x()))
            .unwrap_or(point);

        let bounds = match self.boundingbox.as_slice() {
            [south, north, west, east] => Some(PlaceBounds {
                south: parse_coordinate(south)?,
                north: parse_coordinate(north)?,
                west: parse_coordinate(west)?,
                east: parse_coordinate(east)?,
            }),
            _ => None,
        };

        Ok(Place {
            display_name: self.display_name,
            location,
            osm_type: self.osm_type,
            osm_id: self.osm_id,
            bounds,
        })
    }
}

/// Parse a Nominatim `format=json` search reply.
pub fn parse_nominatim_json(data: &[u8]) -> StatusOr<Vec<Place>> {
    let places: Vec<NominatimPlace> = serde_json::from_slice(data)?;
    places.into_iter().map(NominatimPlace::into_place).collect()
}

/// Geocoder backed by the Nominatim search API
pub struct NominatimClient {
    client: Client,
    base_url: String,
    cache: Option<Cache>,
}

impl NominatimClient {
    pub fn new(config: &ServiceConfig) -> StatusOr<Self> {
        let cache = config.cache_dir.as_ref().map(Cache::new).transpose()?;
        Ok(Self {
            client: config.http_client()?,
            base_url: config.nominatim_url.clone(),
            cache,
        })
    }

    fn cache_key(&self, query: &str) -> String {
        format!("{}?q={}", self.base_url, query)
    }
}

impl GeocodingService for NominatimClient {
    fn search(&self, query: &str) -> StatusOr<Vec<Place>> {
        let key = self.cache_key(query);
        if let Some(cached) = self.cache.as_ref().and_then(|cache| cache.get(&key)) {
            debug!("Using cached geocoding result for {:?}", query);
            return parse_nominatim_json(&cached);
        }

        info!("Geocoding {:?}", query);
        let response = self.client.get(&self.base_url)
            .query(&[("q", query), ("format", "json"), ("limit", "1"), ("polygon_geojson", "1")])
            .send()?;

        if !response.status().is_success() {
            return Err(MapError::GeocodeError(format!("HTTP {}", response.status())));
        }
        let data = response.bytes()?;
        let places = parse_nominatim_json(&data)?;

        if let Some(cache) = &self.cache {
            cache.save(&key, &data)?;
        }
        Ok(places)
    }
}

/// Coordinates for a place plus whatever the user should be told about how they were found.
#[derive(Debug, Clone, PartialEq)]
pub struct GeocodeOutcome {
    pub location: Option<LatLng>,
    pub notices: Vec<Notice>,
}

/// Resolve a place name, trying "downtown {place}" first when asked and
/// falling back once to the plain name.
pub fn get_place_coordinates<S>(service: &S, place: &str, focus_downtown: bool) -> GeocodeOutcome
where
    S: GeocodingService + ?Sized,
{
    let mut notices = Vec::new();
    let location = resolve(service, place, focus_downtown, &mut notices);
    for notice in &notices {
        notice.log();
    }
    GeocodeOutcome { location, notices }
}

fn resolve<S>(service: &S, place: &str, focus_downtown: bool, notices: &mut Vec<Notice>) -> Option<LatLng>
where
    S: GeocodingService + ?Sized,
{
    let query = if focus_downtown { format!("downtown {}", place) } else { place.to_string() };

    match service.search(&query) {
        Ok(places) => match places.first() {
            Some(found) => Some(found.location),
            None if focus_downtown => {
                notices.push(Notice::Warning(format!(
                    "Could not find downtown for '{}'. Trying general location instead.", place)));
                resolve(service, place, false, notices)
            }
            None => None,
        },
        Err(e) if focus_downtown => {
            debug!("Downtown lookup for {:?} failed: {}", place, e);
            notices.push(Notice::Warning(format!(
                "Error finding downtown for '{}'. Trying general location instead.", place)));
            resolve(service, place, false, notices)
        }
        Err(e) => {
            notices.push(Notice::Error(format!("Error geocoding location: {}", e)));
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeGeocoder;

    #[test]
    fn downtown_hit_needs_one_lookup() {
        let service = FakeGeocoder::new().with_place("downtown Boston, MA", LatLng::new(42.355, -71.06));
        let outcome = get_place_coordinates(&service, "Boston, MA", true);

        assert_eq!(outcome.location, Some(LatLng::new(42.355, -71.06)));
        assert!(outcome.notices.is_empty());
        assert_eq!(service.queries(), ["downtown Boston, MA"]);
    }

    #[test]
    fn empty_downtown_result_falls_back_to_plain_name() {
        let service = FakeGeocoder::new().with_place("Springfield", LatLng::new(39.8, -89.6));
        let outcome = get_place_coordinates(&service, "Springfield", true);

        assert_eq!(outcome.location, Some(LatLng::new(39.8, -89.6)));
        assert_eq!(service.queries(), ["downtown Springfield", "Springfield"]);
        assert_eq!(outcome.notices, vec![Notice::Warning(
            "Could not find downtown for 'Springfield'. Trying general location instead.".into())]);
    }

    #[test]
    fn downtown_error_falls_back_to_plain_name() {
        let service = FakeGeocoder::new()
            .with_error("downtown Reno")
            .with_place("Reno", LatLng::new(39.5, -119.8));
        let outcome = get_place_coordinates(&service, "Reno", true);

        assert_eq!(outcome.location, Some(LatLng::new(39.5, -119.8)));
        assert!(matches!(&outcome.notices[..], [Notice::Warning(m)] if m.starts_with("Error finding downtown")));
    }

    #[test]
    fn unresolvable_place_reports_nothing_found() {
        let service = FakeGeocoder::new();
        let outcome = get_place_coordinates(&service, "Atlantis", true);

        assert_eq!(outcome.location, None);
        assert_eq!(service.queries(), ["downtown Atlantis", "Atlantis"]);
        assert_eq!(outcome.notices.len(), 1);
    }

    #[test]
    fn plain_lookup_error_is_reported() {
        let service = FakeGeocoder::new().with_error("Atlantis");
        let outcome = get_place_coordinates(&service, "Atlantis", false);

        assert_eq!(outcome.location, None);
        assert_eq!(service.queries(), ["Atlantis"]);
        assert!(outcome.notices[0].is_error());
    }

    #[test]
    fn nominatim_reply_uses_polygon_centroid() {
        let json = br#"[{
            "lat": "10.0", "lon": "20.0",
            "display_name": "Square Town",
            "osm_type": "relation", "osm_id": 42,
            "boundingbox": ["0.0", "2.0", "0.0", "2.0"],
            "geojson": {"type": "Polygon", "coordinates": [[[0.0, 0.0], [2.0, 0.0], [2.0, 2.0], [0.0, 2.0], [0.0, 0.0]]]}
        }]"#;
        let places = parse_nominatim_json(json).unwrap();

        assert_eq!(places.len(), 1);
        let place = &places[0];
        assert!((place.location.lat - 1.0).abs() < 1e-9);
        assert!((place.location.lng - 1.0).abs() < 1e-9);
        assert_eq!(place.osm_type.as_deref(), Some("relation"));
        assert_eq!(place.bounds, Some(PlaceBounds { south: 0.0, north: 2.0, west: 0.0, east: 2.0 }));
    }

    #[test]
    fn nominatim_reply_without_geometry_uses_point() {
        let json = br#"[{"lat": "42.3554", "lon": "-71.0605", "display_name": "Boston"}]"#;
        let places = parse_nominatim_json(json).unwrap();
        assert_eq!(places[0].location, LatLng::new(42.3554, -71.0605));
        assert_eq!(places[0].bounds, None);
    }

    #[test]
    fn empty_nominatim_reply_is_no_places() {
        assert!(parse_nominatim_json(b"[]").unwrap().is_empty());
    }
}
