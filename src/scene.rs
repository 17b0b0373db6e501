//! The layered scene handed to whatever draws the map.
//!
//! Layers are listed back to front. Element handles let a host toggle the
//! lines and stop badges of a single route without walking the scene.

use crate::config::MapConfig;
use crate::geometry::{Point, Rect};
use crate::label_placement::{Label, LabelSubject};
use crate::route_registry::RouteId;
use crate::save_file::{BuildingRecord, DistrictRecord};
use crate::segments::{Route, SegmentId, SegmentLayer};
use crate::terrain::Raster;
use itertools::Itertools;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize)]
pub struct PathElement {
    pub segment: SegmentId,
    pub class: SegmentLayer,
    pub points: Vec<Point>,
    pub stroke_width: f64,
    /// CSS colour. Road strokes are styled by class and leave this empty.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stroke: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route: Option<RouteId>,
}

/// A two-tone stroke layer: a wide casing underneath a narrower fill.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StrokeLayer {
    pub casing: Vec<PathElement>,
    pub fill: Vec<PathElement>,
}

impl StrokeLayer {
    pub fn is_empty(&self) -> bool {
        self.casing.is_empty() && self.fill.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "layer", content = "index", rename_all = "snake_case")]
pub enum ElementHandle {
    TransitCasing(usize),
    TransitFill(usize),
    StopMarker(usize),
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TransitLayer {
    pub paths: StrokeLayer,
    /// Path elements drawn for each route.
    pub route_paths: BTreeMap<RouteId, Vec<ElementHandle>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GridLine {
    pub from: Point,
    pub to: Point,
}

#[derive(Debug, Clone, Serialize)]
pub struct DistrictLabel {
    pub name: String,
    /// Text baseline centre.
    pub anchor: Point,
    pub bounds: Rect,
}

#[derive(Debug, Clone, Serialize)]
pub struct BuildingShape {
    pub service: String,
    pub sub_service: String,
    /// Closed polygon, the last point connects to the first.
    pub footprint: Vec<Point>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StopBadge {
    pub route: RouteId,
    pub text: String,
    pub bounds: Rect,
    pub fill: String,
    pub text_color: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct StopMarker {
    pub group: usize,
    /// Leader line from the stop to its label.
    pub leader: [Point; 2],
    pub frame: Rect,
    pub badges: Vec<StopBadge>,
    pub pin_center: Point,
    pub pin_radius: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct LegendEntry {
    pub route: RouteId,
    pub index: usize,
    pub name: String,
    pub color: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LegendCategory {
    pub category: String,
    pub routes: Vec<LegendEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RouteToggle {
    pub route: RouteId,
    pub name: String,
    pub paths: Vec<ElementHandle>,
    pub labels: Vec<ElementHandle>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Background {
    pub terrain: Option<Raster>,
    pub forests: Option<Raster>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Scene {
    pub city_name: Option<String>,
    pub saved_at: Option<String>,
    /// min x, min y, width, height
    pub view_box: [f64; 4],
    pub background: Background,
    pub grid: Vec<GridLine>,
    pub districts: Vec<DistrictLabel>,
    pub buildings: Vec<BuildingShape>,
    pub roads: StrokeLayer,
    pub transit: TransitLayer,
    pub stops: Vec<StopMarker>,
    pub legend: Vec<LegendCategory>,
    pub route_toggles: Vec<RouteToggle>,
}

pub fn view_box(config: &MapConfig) -> [f64; 4] {
    let side = config.canvas_side();
    [-config.half_canvas, -config.half_canvas, side, side]
}

/// Tile grid lines, one vertical and one horizontal per tile boundary.
pub fn build_grid(config: &MapConfig) -> Vec<GridLine> {
    let half = config.half_canvas;
    let tile = config.canvas_side() / config.tile_count.max(1) as f64;
    (1..=config.tile_count)
        .flat_map(|i| {
            let offset = i as f64 * tile - half - config.grid_offset;
            [
                GridLine {
                    from: Point::new(offset, -half),
                    to: Point::new(offset, half),
                },
                GridLine {
                    from: Point::new(-half, offset),
                    to: Point::new(half, offset),
                },
            ]
        })
        .collect()
}

/// District names sorted alphabetically with a rough text box for each.
pub fn build_districts(records: &[DistrictRecord], config: &MapConfig) -> Vec<DistrictLabel> {
    records
        .iter()
        .sorted_by(|a, b| {
            a.name
                .to_lowercase()
                .cmp(&b.name.to_lowercase())
                .then_with(|| a.name.cmp(&b.name))
        })
        .map(|record| {
            let width = record.name.chars().count() as f64 * config.district_char_width;
            let height = config.district_label_height;
            let anchor = record.anchor;
            DistrictLabel {
                name: record.name.clone(),
                anchor,
                // Baseline sits at the anchor, most of the glyph box above it
                bounds: Rect {
                    x1: anchor.x - width / 2.0,
                    y1: anchor.y - height * 0.8,
                    x2: anchor.x + width / 2.0,
                    y2: anchor.y + height * 0.2,
                },
            }
        })
        .collect()
}

/// District labels as fixed obstacles for stop label placement.
pub fn district_obstacles(districts: &[DistrictLabel]) -> impl Iterator<Item = Label> + '_ {
    districts
        .iter()
        .enumerate()
        .map(|(i, d)| Label::with_bounds(d.bounds, LabelSubject::District(i)))
}

pub fn build_buildings(records: &[BuildingRecord]) -> Vec<BuildingShape> {
    records
        .iter()
        .filter(|b| !b.footprint.is_empty())
        .map(|b| BuildingShape {
            service: b.service.clone(),
            sub_service: b.sub_service.clone(),
            footprint: b.footprint.clone(),
        })
        .collect()
}

/// Case-insensitive comparison that orders digit runs by value, so
/// "Line 2" sorts before "Line 10".
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut a_chars = a.chars().peekable();
    let mut b_chars = b.chars().peekable();
    loop {
        match (a_chars.peek().copied(), b_chars.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(ca), Some(cb)) if ca.is_ascii_digit() && cb.is_ascii_digit() => {
                let na: String = a_chars.peeking_take_while(|c| c.is_ascii_digit()).collect();
                let nb: String = b_chars.peeking_take_while(|c| c.is_ascii_digit()).collect();
                let na = na.trim_start_matches('0');
                let nb = nb.trim_start_matches('0');
                let ord = na.len().cmp(&nb.len()).then_with(|| na.cmp(nb));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            (Some(ca), Some(cb)) => {
                let ord = ca.to_lowercase().cmp(cb.to_lowercase());
                if ord != Ordering::Equal {
                    return ord;
                }
                a_chars.next();
                b_chars.next();
            }
        }
    }
}

/// Routes grouped by category for the legend, both sorted naturally.
pub fn build_legend(routes: &[Route]) -> Vec<LegendCategory> {
    let by_category = routes
        .iter()
        .sorted_by(|a, b| {
            natural_cmp(&a.category, &b.category).then_with(|| natural_cmp(&a.name, &b.name))
        })
        .chunk_by(|route| route.category.clone());

    by_category
        .into_iter()
        .map(|(category, members)| LegendCategory {
            category,
            routes: members
                .map(|route| LegendEntry {
                    route: route.id,
                    index: route.index,
                    name: route.name.clone(),
                    color: route.css_color(),
                })
                .collect(),
        })
        .collect()
}

/// Per-route handles for the host's visibility switches.
pub fn build_route_toggles(
    routes: &[Route],
    transit: &TransitLayer,
    stops: &[StopMarker],
) -> Vec<RouteToggle> {
    routes
        .iter()
        .map(|route| RouteToggle {
            route: route.id,
            name: route.name.clone(),
            paths: transit
                .route_paths
                .get(&route.id)
                .cloned()
                .unwrap_or_default(),
            labels: stops
                .iter()
                .enumerate()
                .filter(|(_, marker)| marker.badges.iter().any(|b| b.route == route.id))
                .map(|(i, _)| ElementHandle::StopMarker(i))
                .collect(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segments::NodeId;
    use rgb::RGBA;

    fn route(index: usize, category: &str, name: &str) -> Route {
        Route {
            index,
            id: RouteId(index as u32),
            save_id: index.to_string(),
            name: name.to_string(),
            category: category.to_string(),
            color: RGBA::new(10, 20, 30, 255),
            stops: vec![NodeId(1)],
        }
    }

    #[test]
    fn test_grid_lines() {
        let config = MapConfig::default();
        let grid = build_grid(&config);
        assert_eq!(grid.len(), 18);
        let first = &grid[0];
        let expected = 17300.0 / 9.0 - 8650.0 - 25.0;
        assert!((first.from.x - expected).abs() < 1e-9);
        assert_eq!(first.from.y, -8650.0);
        assert_eq!(first.to.y, 8650.0);
        assert_eq!(grid[1].from.x, -8650.0);
        assert!((grid[1].from.y - expected).abs() < 1e-9);
    }

    #[test]
    fn test_districts_sorted_case_insensitively() {
        let records = vec![
            DistrictRecord {
                name: "harbour".to_string(),
                anchor: Point::new(0.0, 0.0),
            },
            DistrictRecord {
                name: "Airport".to_string(),
                anchor: Point::new(100.0, 0.0),
            },
        ];
        let districts = build_districts(&records, &MapConfig::default());
        assert_eq!(districts[0].name, "Airport");
        assert_eq!(districts[1].name, "harbour");
        let bounds = districts[0].bounds;
        assert_eq!(bounds.width(), 7.0 * 48.0);
        assert_eq!(bounds.center().x, 100.0);

        let obstacles: Vec<Label> = district_obstacles(&districts).collect();
        assert_eq!(obstacles[1].subject, LabelSubject::District(1));
    }

    #[test]
    fn test_natural_cmp() {
        assert_eq!(natural_cmp("Line 2", "Line 10"), Ordering::Less);
        assert_eq!(natural_cmp("line 2", "Line 2"), Ordering::Equal);
        assert_eq!(natural_cmp("Bus", "Metro"), Ordering::Less);
        assert_eq!(natural_cmp("A", "A1"), Ordering::Less);
        assert_eq!(natural_cmp("007", "7"), Ordering::Equal);
    }

    #[test]
    fn test_legend_groups_by_category() {
        let routes = vec![
            route(1, "Metro", "M1"),
            route(2, "Bus", "Line 10"),
            route(3, "Bus", "Line 2"),
        ];
        let legend = build_legend(&routes);
        assert_eq!(legend.len(), 2);
        assert_eq!(legend[0].category, "Bus");
        let names: Vec<&str> = legend[0].routes.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Line 2", "Line 10"]);
        assert_eq!(legend[1].routes[0].index, 1);
        assert_eq!(legend[1].routes[0].color, "rgba(10, 20, 30, 1)");
    }

    #[test]
    fn test_route_toggles_collect_paths_and_labels() {
        let routes = vec![route(1, "Bus", "A"), route(2, "Bus", "B")];
        let mut transit = TransitLayer::default();
        transit.route_paths.insert(
            RouteId(1),
            vec![ElementHandle::TransitCasing(0), ElementHandle::TransitFill(0)],
        );
        let badge = StopBadge {
            route: RouteId(2),
            text: "#2".to_string(),
            bounds: Rect::centered(Point::new(0.0, 0.0), 150.0, 90.0),
            fill: String::new(),
            text_color: "white",
        };
        let stops = vec![StopMarker {
            group: 0,
            leader: [Point::new(0.0, 0.0), Point::new(0.0, 0.0)],
            frame: badge.bounds,
            badges: vec![badge],
            pin_center: Point::new(0.0, 0.0),
            pin_radius: 16.0,
        }];

        let toggles = build_route_toggles(&routes, &transit, &stops);
        assert_eq!(toggles[0].paths.len(), 2);
        assert!(toggles[0].labels.is_empty());
        assert!(toggles[1].paths.is_empty());
        assert_eq!(toggles[1].labels, vec![ElementHandle::StopMarker(0)]);
    }
}
