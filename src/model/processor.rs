use std::collections::{BTreeMap, HashMap, HashSet};

use log::{info, warn};
use serde::Deserialize;

use crate::error::{MapError, StatusOr};
use crate::model::{Edge, EdgeAttributes, Highway, LatLng, Node, StreetGraph};

/// Body of an Overpass `[out:json]` reply
#[derive(Debug, Deserialize)]
pub struct OverpassResponse {
    #[serde(default)]
    pub elements: Vec<OverpassElement>,
    /// Overpass reports timeouts and memory exhaustion here with a 200 status
    #[serde(default)]
    pub remark: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OverpassElement {
    Node {
        id: i64,
        lat: f64,
        lon: f64,
    },
    Way {
        id: i64,
        #[serde(default)]
        nodes: Vec<i64>,
        #[serde(default)]
        tags: HashMap<String, String>,
    },
    #[serde(other)]
    Other,
}

/// A way reduced to what the graph keeps
struct OsmWay {
    highway: Option<String>,
    name: Option<String>,
    oneway: bool,
}

/// One straight piece between consecutive way nodes
struct Segment {
    a: i64,
    b: i64,
    way: usize,
}

impl Segment {
    fn other_end(&self, node: i64) -> i64 {
        if self.a == node { self.b } else { self.a }
    }
}

fn is_oneway(tags: &HashMap<String, String>) -> bool {
    matches!(tags.get("oneway").map(String::as_str), Some("yes" | "true" | "1" | "-1"))
        || tags.get("junction").is_some_and(|v| v == "roundabout")
}

/// Parse an Overpass reply and build the simplified street graph.
pub fn process_overpass_json(data: &[u8]) -> StatusOr<StreetGraph> {
    let response: OverpassResponse = serde_json::from_slice(data)?;
    if let Some(remark) = &response.remark {
        if response.elements.is_empty() && remark.contains("error") {
            return Err(MapError::FetchError(remark.clone()));
        }
        warn!("Overpass remark: {}", remark);
    }
    Ok(build_street_graph(&response))
}

/// Turn raw OSM ways into a graph whose nodes are intersections and dead
/// ends. Chains of nodes that only continue a street are folded into the
/// geometry of a single edge, whose length is the sum of its pieces.
pub fn build_street_graph(response: &OverpassResponse) -> StreetGraph {
    let mut positions: HashMap<i64, LatLng> = HashMap::new();
    let mut ways: Vec<OsmWay> = Vec::new();
    let mut segments: Vec<Segment> = Vec::new();

    for element in &response.elements {
        if let OverpassElement::Node { id, lat, lon } = element {
            positions.insert(*id, LatLng::new(*lat, *lon));
        }
    }

    for element in &response.elements {
        let OverpassElement::Way { id, nodes, tags } = element else {
            continue;
        };

        let refs: Vec<i64> = nodes.iter().copied().filter(|n| positions.contains_key(n)).collect();
        if refs.len() < nodes.len() {
            warn!("Way {} references {} missing nodes", id, nodes.len() - refs.len());
        }

        let way_idx = ways.len();
        ways.push(OsmWay {
            highway: tags.get("highway").cloned(),
            name: tags.get("name").cloned(),
            oneway: is_oneway(tags),
        });

        for pair in refs.windows(2) {
            if pair[0] != pair[1] {
                segments.push(Segment { a: pair[0], b: pair[1], way: way_idx });
            }
        }
    }

    info!("Collected {} nodes, {} ways and {} segments", positions.len(), ways.len(), segments.len());

    // Segments touching each node; ordered for a deterministic walk
    let mut incident: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
    for (idx, segment) in segments.iter().enumerate() {
        incident.entry(segment.a).or_default().push(idx);
        incident.entry(segment.b).or_default().push(idx);
    }

    let endpoints: HashSet<i64> = incident.iter()
        .filter(|(node, segs)| {
            let neighbors: HashSet<i64> = segs.iter().map(|&s| segments[s].other_end(**node)).collect();
            neighbors.len() != 2 || segs.len() != 2
        })
        .map(|(node, _)| *node)
        .collect();

    info!("Identified {} intersections and dead ends", endpoints.len());

    let mut graph = StreetGraph::new();
    let mut visited = vec![false; segments.len()];

    let walk = |start: i64, first: usize, visited: &mut Vec<bool>, graph: &mut StreetGraph| {
        let mut path = vec![start];
        let mut length = 0.0;
        let mut tags = Vec::new();
        let mut names = Vec::new();
        let mut oneway = true;

        let mut current = start;
        let mut segment_idx = first;
        loop {
            visited[segment_idx] = true;
            let segment = &segments[segment_idx];
            let next = segment.other_end(current);
            length += positions[&current].distance_meters(&positions[&next]);

            let way = &ways[segment.way];
            tags.extend(way.highway.clone());
            names.extend(way.name.clone());
            oneway &= way.oneway;

            path.push(next);
            if endpoints.contains(&next) || next == start {
                break;
            }

            // Interior nodes have exactly two segments
            let onward = incident[&next].iter().copied().find(|&s| s != segment_idx && !visited[s]);
            match onward {
                Some(s) => {
                    current = next;
                    segment_idx = s;
                }
                None => break,
            }
        }

        let end = path[path.len() - 1];
        for id in [start, end] {
            let position = positions[&id];
            graph.add_node(Node { id, lat: position.lat, lng: position.lng });
        }

        let mut unique_names: Vec<String> = Vec::new();
        for name in names {
            if !unique_names.contains(&name) {
                unique_names.push(name);
            }
        }

        graph.add_edge(Edge {
            source_node_id: start,
            destination_node_id: end,
            geometry: path.iter().map(|id| (positions[id].lng, positions[id].lat)).collect(),
            attributes: EdgeAttributes {
                length: Some(length),
                highway: Highway::from_tags(tags),
                oneway,
                name: (!unique_names.is_empty()).then(|| unique_names.join("; ")),
            },
        });
    };

    for (&node, segs) in &incident {
        if !endpoints.contains(&node) {
            continue;
        }
        for &segment_idx in segs {
            if !visited[segment_idx] {
                walk(node, segment_idx, &mut visited, &mut graph);
            }
        }
    }

    // Whatever is left forms closed loops with no intersection on them
    for segment_idx in 0..segments.len() {
        if !visited[segment_idx] {
            let start = segments[segment_idx].a;
            walk(start, segment_idx, &mut visited, &mut graph);
        }
    }

    info!("Built graph with {} nodes and {} edges", graph.nodes.len(), graph.edges.len());
    graph
}
