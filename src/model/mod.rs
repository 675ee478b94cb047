use std::collections::HashMap;

use s2::latlng::LatLng as S2LatLng;
use serde::{Deserialize, Serialize};

pub mod processor;

/// Mean earth radius used for segment lengths, in meters
const EARTH_RADIUS_METERS: f64 = 6_371_009.0;

/// A WGS84 position. `lng` matches the map widget's naming.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Latitude within [-90, 90] and longitude within [-180, 180].
    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.lat) && (-180.0..=180.0).contains(&self.lng)
    }

    /// Great-circle distance in meters
    pub fn distance_meters(&self, other: &LatLng) -> f64 {
        let a = S2LatLng::from_degrees(self.lat, self.lng);
        let b = S2LatLng::from_degrees(other.lat, other.lng);
        a.distance(&b).rad() * EARTH_RADIUS_METERS
    }
}

/// The OSM `highway` class of an edge. Simplified edges that span ways of
/// different classes carry every class they cross.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Highway {
    Single(String),
    Multiple(Vec<String>),
}

impl Highway {
    /// Substring test for a single class, element test for a list.
    pub fn contains(&self, needle: &str) -> bool {
        match self {
            Highway::Single(tag) => tag.contains(needle),
            Highway::Multiple(tags) => tags.iter().any(|tag| tag == needle),
        }
    }

    /// Collapse a list of classes, keeping first-seen order and dropping duplicates.
    pub fn from_tags<I: IntoIterator<Item = String>>(tags: I) -> Option<Self> {
        let mut unique: Vec<String> = Vec::new();
        for tag in tags {
            if !unique.contains(&tag) {
                unique.push(tag);
            }
        }
        match unique.len() {
            0 => None,
            1 => unique.pop().map(Highway::Single),
            _ => Some(Highway::Multiple(unique)),
        }
    }
}

/// The attributes the styling reads from an edge.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EdgeAttributes {
    /// Length in meters
    pub length: Option<f64>,
    pub highway: Option<Highway>,
    pub oneway: bool,
    pub name: Option<String>,
}

/// A node is an intersection or a dead end
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Node {
    /// OpenStreetMap node id
    pub id: i64,
    pub lat: f64,
    pub lng: f64,
}

/// An edge is a stretch of street between two nodes
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub source_node_id: i64,
    pub destination_node_id: i64,

    /// Polyline from source to destination as (longitude, latitude)
    pub geometry: Vec<(f64, f64)>,

    pub attributes: EdgeAttributes,
}

/// A street network for one area
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreetGraph {
    pub nodes: HashMap<i64, Node>,
    pub edges: Vec<Edge>,
}

impl StreetGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, node: Node) {
        self.nodes.insert(node.id, node);
    }

    pub fn add_edge(&mut self, edge: Edge) {
        self.edges.push(edge);
    }

    /// A graph without edges has nothing to draw, even if it has nodes.
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn edge_attributes(&self) -> impl Iterator<Item = &EdgeAttributes> {
        self.edges.iter().map(|edge| &edge.attributes)
    }

    pub fn edge_paths(&self) -> Vec<Vec<(f64, f64)>> {
        self.edges.iter().map(|edge| edge.geometry.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coordinate_ranges_are_inclusive() {
        assert!(LatLng::new(90.0, 180.0).is_valid());
        assert!(LatLng::new(-90.0, -180.0).is_valid());
        assert!(!LatLng::new(90.0001, 0.0).is_valid());
        assert!(!LatLng::new(0.0, -180.5).is_valid());
        assert!(!LatLng::new(f64::NAN, 0.0).is_valid());
    }

    #[test]
    fn one_millidegree_of_longitude_at_the_equator() {
        let d = LatLng::new(0.0, 0.0).distance_meters(&LatLng::new(0.0, 0.001));
        assert!((d - 111.2).abs() < 0.1, "got {}", d);
    }

    #[test]
    fn highway_contains_follows_tag_shape() {
        assert!(Highway::Single("primary_link".into()).contains("primary"));
        assert!(!Highway::Multiple(vec!["primary_link".into()]).contains("primary"));
        assert!(Highway::Multiple(vec!["residential".into(), "primary".into()]).contains("primary"));
    }

    #[test]
    fn from_tags_dedupes() {
        assert_eq!(Highway::from_tags(Vec::new()), None);
        assert_eq!(
            Highway::from_tags(vec!["residential".into(), "residential".into()]),
            Some(Highway::Single("residential".into())),
        );
        assert_eq!(
            Highway::from_tags(vec!["residential".into(), "primary".into(), "residential".into()]),
            Some(Highway::Multiple(vec!["residential".into(), "primary".into()])),
        );
    }

    #[test]
    fn highway_deserializes_from_string_or_list() {
        let single: Highway = serde_json::from_str("\"primary\"").unwrap();
        assert_eq!(single, Highway::Single("primary".into()));
        let list: Highway = serde_json::from_str("[\"primary\", \"secondary\"]").unwrap();
        assert!(matches!(list, Highway::Multiple(ref tags) if tags.len() == 2));
    }
}
