use crate::color::{css_rgba, highlight_color};
use crate::config::MapConfig;
use crate::geometry::Point;
use crate::route_registry::RouteId;
use crate::save_file::{SegmentRecord, TransportRecord};
use ahash::AHashSet;
use rgb::{RGB, RGBA};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SegmentId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Drawing category of a physical segment, picked from its prefab name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentLayer {
    Airplane,
    Harbour,
    Highway,
    Power,
    Train,
    Metro,
    Road,
    Misc,
}

impl SegmentLayer {
    /// Keyword categories from lowest to highest precedence.
    pub const PRECEDENCE: &'static [SegmentLayer] = &[
        SegmentLayer::Airplane,
        SegmentLayer::Harbour,
        SegmentLayer::Highway,
        SegmentLayer::Power,
        SegmentLayer::Train,
        SegmentLayer::Metro,
        SegmentLayer::Road,
    ];

    pub fn keywords(&self) -> &'static [&'static str] {
        match self {
            SegmentLayer::Airplane => &["Airplane"],
            SegmentLayer::Harbour => &["Harbor"],
            SegmentLayer::Highway => &["Highway"],
            SegmentLayer::Power => &["Power"],
            SegmentLayer::Train => &["Train"],
            SegmentLayer::Metro => &["Metro"],
            SegmentLayer::Road => &["Road", "Avenue", "Oneway", "Alley"],
            SegmentLayer::Misc => &[],
        }
    }

    pub fn matches(&self, name: &str) -> bool {
        self.keywords().iter().any(|keyword| name.contains(keyword))
    }

    /// The highest-precedence category whose keyword occurs in `name`.
    /// A name matching both "Train" and "Road" is a road.
    pub fn classify(name: &str) -> SegmentLayer {
        Self::PRECEDENCE
            .iter()
            .rev()
            .copied()
            .find(|layer| layer.matches(name))
            .unwrap_or(SegmentLayer::Misc)
    }
}

/// A physical network segment.
#[derive(Debug, Clone)]
pub struct RoadSegment {
    pub id: SegmentId,
    pub start_node: NodeId,
    pub end_node: NodeId,
    pub width: f64,
    pub points: Vec<Point>,
    /// Highest elevation along the segment, drives draw order.
    pub max_elevation: f64,
    pub layer: SegmentLayer,
    routes: AHashSet<RouteId>,
}

impl RoadSegment {
    pub fn from_record(record: &SegmentRecord, config: &MapConfig) -> Self {
        let layer = SegmentLayer::classify(&record.name);
        let mut max_elevation = record
            .points
            .iter()
            .map(|p| p.elevation)
            .fold(f64::NEG_INFINITY, f64::max);
        if layer == SegmentLayer::Power {
            max_elevation += config.power_elevation_boost;
        }

        Self {
            id: record.id,
            start_node: record.start_node,
            end_node: record.end_node,
            width: record.width,
            points: record.points.iter().map(|p| p.position).collect(),
            max_elevation,
            layer,
            routes: AHashSet::new(),
        }
    }

    pub fn add_route(&mut self, route: RouteId) {
        self.routes.insert(route);
    }

    /// Number of distinct routes running along this segment.
    pub fn route_count(&self) -> usize {
        self.routes.len()
    }
}

/// Ordered pair of stop nodes a transit path connects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RouteSegmentKey {
    pub start: NodeId,
    pub end: NodeId,
}

impl fmt::Display for RouteSegmentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.start, self.end)
    }
}

/// The chain of physical segments a transit line follows between two stops.
#[derive(Debug, Clone)]
pub struct RouteSegment {
    pub key: RouteSegmentKey,
    pub segments: Vec<SegmentId>,
}

impl RouteSegment {
    pub fn from_record(record: &SegmentRecord, segments: Vec<SegmentId>) -> Self {
        Self {
            key: RouteSegmentKey {
                start: record.start_node,
                end: record.end_node,
            },
            segments,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Route {
    /// 1-based number shown on stop badges, in load order.
    pub index: usize,
    pub id: RouteId,
    /// Identifier as written in the save.
    pub save_id: String,
    pub name: String,
    pub category: String,
    pub color: RGBA<u8>,
    pub stops: Vec<NodeId>,
}

impl Route {
    pub fn from_record(record: &TransportRecord, index: usize, id: RouteId) -> Self {
        Self {
            index,
            id,
            save_id: record.id.clone(),
            name: record.name.clone(),
            category: record.category.clone(),
            color: record.color,
            stops: record.stops.clone(),
        }
    }

    pub fn rgb(&self) -> RGB<u8> {
        RGB::new(self.color.r, self.color.g, self.color.b)
    }

    pub fn css_color(&self) -> String {
        css_rgba(self.color)
    }

    pub fn css_highlight_color(&self) -> String {
        css_rgba(highlight_color(self.color))
    }

    /// Consecutive stop pairs. Lines are loops, so the last stop connects
    /// back to the first.
    pub fn node_pairs(&self) -> Vec<RouteSegmentKey> {
        let mut pairs: Vec<RouteSegmentKey> = self
            .stops
            .windows(2)
            .map(|w| RouteSegmentKey {
                start: w[0],
                end: w[1],
            })
            .collect();
        if let (Some(&first), Some(&last)) = (self.stops.first(), self.stops.last()) {
            pairs.push(RouteSegmentKey {
                start: last,
                end: first,
            });
        }
        pairs
    }
}
