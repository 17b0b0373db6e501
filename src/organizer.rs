//! Network model built from a save: physical segments in draw order, transit
//! routes resolved onto them, and the stop groups that get labels.

use crate::color::contrasting_text;
use crate::config::{LabelRing, MapConfig};
use crate::errors::{MapError, Result};
use crate::geometry::{Point, Rect};
use crate::label_placement::{Label, LabelPlacement, LabelSubject};
use crate::route_registry::{RouteId, RouteRegistry};
use crate::save_file::SaveFile;
use crate::scene::{ElementHandle, PathElement, StopBadge, StopMarker, StrokeLayer, TransitLayer};
use crate::segments::{NodeId, RoadSegment, Route, RouteSegment, RouteSegmentKey, SegmentId};
use crate::stop_clustering::{StopInstance, TransitStopGroup, group_stops};
use ahash::{AHashMap, AHashSet};
use log::{debug, info};
use ordered_float::OrderedFloat;
use std::f64::consts::PI;

pub struct SegmentOrganizer {
    config: MapConfig,
    nodes: AHashMap<NodeId, Point>,
    /// Sorted by elevation, lowest first.
    segments: Vec<RoadSegment>,
    segment_index: AHashMap<SegmentId, usize>,
    route_segments: AHashMap<RouteSegmentKey, RouteSegment>,
    registry: RouteRegistry,
    routes: Vec<Route>,
    /// For each route, indices into `segments` it runs along, in order.
    route_chains: Vec<Vec<usize>>,
    stop_groups: Vec<TransitStopGroup>,
}

impl SegmentOrganizer {
    /// Builds the network from a parsed save. Any dangling node, segment or
    /// stop-to-stop path reference fails the whole load.
    pub fn load(save: &SaveFile, config: &MapConfig) -> Result<Self> {
        let nodes: AHashMap<NodeId, Point> =
            save.nodes.iter().map(|n| (n.id, n.position)).collect();

        let mut segments = Vec::new();
        let mut route_segments = AHashMap::new();
        for record in &save.segments {
            match &record.path {
                Some(path) => {
                    let route_segment = RouteSegment::from_record(record, path.clone());
                    route_segments.insert(route_segment.key, route_segment);
                }
                None => {
                    for node in [record.start_node, record.end_node] {
                        if !nodes.contains_key(&node) {
                            return Err(MapError::UnknownNode {
                                node: node.0,
                                referenced_by: format!("segment {}", record.id),
                            });
                        }
                    }
                    segments.push(RoadSegment::from_record(record, config));
                }
            }
        }

        // Stable, so equal elevations keep save order
        segments.sort_by_key(|s| OrderedFloat(s.max_elevation));

        let segment_index: AHashMap<SegmentId, usize> =
            segments.iter().enumerate().map(|(i, s)| (s.id, i)).collect();

        let mut organizer = Self {
            config: config.clone(),
            nodes,
            segments,
            segment_index,
            route_segments,
            registry: RouteRegistry::new(),
            routes: Vec::new(),
            route_chains: Vec::new(),
            stop_groups: Vec::new(),
        };

        for record in &save.transports {
            if record.stops.is_empty() {
                debug!("Skipping route '{}' ({}) without stops", record.name, record.id);
                continue;
            }
            let id = organizer.registry.get_or_insert(&record.id);
            let route = Route::from_record(record, organizer.routes.len() + 1, id);
            organizer.add_route(route)?;
        }
        if organizer.registry.is_empty() {
            debug!("Save has no transit routes with stops");
        }

        info!(
            "Loaded {} nodes, {} segments, {} route paths, {} routes ({} distinct ids)",
            organizer.nodes.len(),
            organizer.segments.len(),
            organizer.route_segments.len(),
            organizer.routes.len(),
            organizer.registry.len()
        );

        Ok(organizer)
    }

    fn add_route(&mut self, route: Route) -> Result<()> {
        for stop in &route.stops {
            if !self.nodes.contains_key(stop) {
                return Err(MapError::UnknownNode {
                    node: stop.0,
                    referenced_by: format!("route '{}'", route.save_id),
                });
            }
        }

        let chain = self.resolve_chain(&route)?;
        for &index in &chain {
            self.segments[index].add_route(route.id);
        }

        self.routes.push(route);
        self.route_chains.push(chain);
        Ok(())
    }

    /// Physical segments the route follows, stop to stop and back to the
    /// first stop.
    fn resolve_chain(&self, route: &Route) -> Result<Vec<usize>> {
        let mut chain = Vec::new();
        for key in route.node_pairs() {
            let route_segment =
                self.route_segments
                    .get(&key)
                    .ok_or_else(|| MapError::UnknownRouteSegment {
                        route: route.save_id.clone(),
                        start: key.start.0,
                        end: key.end.0,
                    })?;
            for segment in &route_segment.segments {
                let index =
                    self.segment_index
                        .get(segment)
                        .ok_or_else(|| MapError::UnknownSegment {
                            segment: segment.0,
                            route_segment: key.to_string(),
                        })?;
                chain.push(*index);
            }
        }
        Ok(chain)
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn segments(&self) -> &[RoadSegment] {
        &self.segments
    }

    pub fn stop_groups(&self) -> &[TransitStopGroup] {
        &self.stop_groups
    }

    /// Route by its 1-based display index. Transports sharing a save id
    /// share a `RouteId`, so the index is the only unique handle.
    pub fn route_by_index(&self, index: usize) -> Option<&Route> {
        self.routes.get(index.checked_sub(1)?)
    }

    /// Casing and fill strokes for every physical segment, back to front.
    pub fn build_roads(&self) -> StrokeLayer {
        let mut layer = StrokeLayer::default();
        for segment in &self.segments {
            let element = |stroke_width: f64| PathElement {
                segment: segment.id,
                class: segment.layer,
                points: segment.points.clone(),
                stroke_width,
                stroke: None,
                route: None,
            };
            layer.casing.push(element(segment.width));
            layer
                .fill
                .push(element((segment.width - self.config.casing_inset).max(0.0)));
        }
        layer
    }

    /// Draws every route over the segments it uses and groups the stops.
    ///
    /// Routes sharing a segment split its width evenly, capped at
    /// `max_route_stroke` each. The first route on a segment draws the full
    /// bundle width and each later one a band narrower, so the strokes stack
    /// into one visible band per route.
    pub fn build_transit_routes(&mut self) -> Result<TransitLayer> {
        let mut layer = TransitLayer::default();
        let mut visits: AHashMap<usize, AHashSet<RouteId>> = AHashMap::new();
        let mut stops = Vec::new();

        for (route, chain) in self.routes.iter().zip(&self.route_chains) {
            for node in &route.stops {
                let position = self.nodes.get(node).ok_or_else(|| MapError::UnknownNode {
                    node: node.0,
                    referenced_by: format!("route '{}'", route.save_id),
                })?;
                stops.push(StopInstance {
                    route: route.id,
                    route_index: route.index,
                    position: *position,
                });
            }

            let handles = layer.route_paths.entry(route.id).or_default();
            let casing_color = route.css_highlight_color();
            let fill_color = route.css_color();

            for &index in chain {
                let segment = &self.segments[index];
                let route_count = segment.route_count().max(1);
                let stroke_unit =
                    (segment.width / route_count as f64).min(self.config.max_route_stroke);

                let seen = visits.entry(index).or_default();
                let already_drawn = seen.len();
                if !seen.insert(route.id) {
                    continue;
                }
                let stroke_width = stroke_unit * route_count.saturating_sub(already_drawn) as f64;

                let element = |stroke_width: f64, color: &str| PathElement {
                    segment: segment.id,
                    class: segment.layer,
                    points: segment.points.clone(),
                    stroke_width,
                    stroke: Some(color.to_string()),
                    route: Some(route.id),
                };

                handles.push(ElementHandle::TransitCasing(layer.paths.casing.len()));
                layer.paths.casing.push(element(
                    stroke_width + self.config.route_casing_extra,
                    &casing_color,
                ));
                handles.push(ElementHandle::TransitFill(layer.paths.fill.len()));
                layer.paths.fill.push(element(stroke_width, &fill_color));
            }
        }

        self.stop_groups = group_stops(&stops, self.config.stop_merge_threshold);
        info!(
            "Drew {} transit paths, {} stops in {} groups",
            layer.paths.fill.len(),
            stops.len(),
            self.stop_groups.len()
        );

        Ok(layer)
    }

    /// Rough size of a stop group's badge row.
    pub fn estimate_label_dimensions(&self, group: &TransitStopGroup) -> (f64, f64) {
        (
            self.config.stop_label_cell_width * group.stops.len() as f64,
            self.config.stop_label_height,
        )
    }

    /// Adds rings of candidate label positions around every stop group.
    /// Outer rings are pushed out by half the label width and hold more
    /// candidates.
    pub fn seed_stop_labels(&self, placement: &mut LabelPlacement) {
        let start = self.config.label_start_angle_deg.to_radians();
        for (index, group) in self.stop_groups.iter().enumerate() {
            let Some(center) = group.centroid() else {
                continue;
            };
            let (width, height) = self.estimate_label_dimensions(group);
            for &LabelRing { radius, count } in &self.config.label_rings {
                let radius = radius + width / 2.0;
                for i in 0..count {
                    let angle = start + 2.0 * PI / count as f64 * i as f64;
                    let anchor = Point::new(
                        center.x + angle.cos() * radius,
                        center.y - angle.sin() * radius,
                    );
                    placement.add_candidate(Label::new(
                        anchor,
                        width,
                        height,
                        LabelSubject::StopGroup(index),
                    ));
                }
            }
        }
    }

    /// Stop markers for labels placed on stop groups. Other labels are
    /// ignored.
    pub fn create_stop_markers(&self, labels: &[Label]) -> Vec<StopMarker> {
        labels
            .iter()
            .filter_map(|label| {
                let LabelSubject::StopGroup(index) = label.subject else {
                    return None;
                };
                let group = self.stop_groups.get(index)?;
                let center = group.centroid()?;
                let cell = self.config.stop_label_cell_width;

                let badges = group
                    .stops
                    .iter()
                    .enumerate()
                    .filter_map(|(i, stop)| {
                        let route = self.route_by_index(stop.route_index)?;
                        let x1 = label.bounds.x1 + i as f64 * cell;
                        Some(StopBadge {
                            route: route.id,
                            text: format!("#{}", stop.route_index),
                            bounds: Rect {
                                x1,
                                y1: label.bounds.y1,
                                x2: x1 + cell,
                                y2: label.bounds.y2,
                            },
                            fill: route.css_color(),
                            text_color: contrasting_text(route.rgb()),
                        })
                    })
                    .collect();

                Some(StopMarker {
                    group: index,
                    leader: [center, label.bounds.center()],
                    frame: label.bounds,
                    badges,
                    pin_center: center,
                    pin_radius: (16.0 + (group.stops.len() / 2) as f64 * 6.0).min(34.0),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::save_file::{ElevatedPoint, NodeRecord, SegmentRecord, TransportRecord};
    use rgb::RGBA;

    fn node(id: u32, x: f64, y: f64) -> NodeRecord {
        NodeRecord {
            id: NodeId(id),
            position: Point::new(x, y),
        }
    }

    fn road(id: u32, sn: u32, en: u32, width: f64, name: &str, elevation: f64) -> SegmentRecord {
        SegmentRecord {
            id: SegmentId(id),
            start_node: NodeId(sn),
            end_node: NodeId(en),
            width,
            name: name.to_string(),
            points: vec![
                ElevatedPoint {
                    position: Point::new(0.0, 0.0),
                    elevation,
                },
                ElevatedPoint {
                    position: Point::new(100.0, 0.0),
                    elevation,
                },
            ],
            path: None,
        }
    }

    fn path(sn: u32, en: u32, segments: &[u32]) -> SegmentRecord {
        SegmentRecord {
            id: SegmentId(0),
            start_node: NodeId(sn),
            end_node: NodeId(en),
            width: 0.0,
            name: String::new(),
            points: Vec::new(),
            path: Some(segments.iter().map(|&s| SegmentId(s)).collect()),
        }
    }

    fn transport(id: &str, stops: &[u32]) -> TransportRecord {
        TransportRecord {
            id: id.to_string(),
            name: format!("Line {}", id),
            category: "Bus".to_string(),
            color: RGBA::new(200, 30, 30, 255),
            stops: stops.iter().map(|&n| NodeId(n)).collect(),
        }
    }

    /// Two stops joined by road 10 one way and road 11 the other.
    fn shuttle_save(routes: Vec<TransportRecord>) -> SaveFile {
        SaveFile {
            nodes: vec![node(1, 0.0, 0.0), node(2, 1000.0, 0.0)],
            segments: vec![
                road(10, 1, 2, 24.0, "Basic Road", 5.0),
                road(11, 2, 1, 16.0, "Highway", 2.0),
                path(1, 2, &[10]),
                path(2, 1, &[11]),
            ],
            transports: routes,
            ..SaveFile::default()
        }
    }

    #[test]
    fn test_load_sorts_by_elevation_and_marks_routes() {
        let save = shuttle_save(vec![transport("a", &[1, 2])]);
        let organizer = SegmentOrganizer::load(&save, &MapConfig::default()).unwrap();
        let ids: Vec<SegmentId> = organizer.segments().iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![SegmentId(11), SegmentId(10)]);
        assert!(organizer.segments().iter().all(|s| s.route_count() == 1));
        assert_eq!(organizer.routes()[0].index, 1);
    }

    #[test]
    fn test_equal_elevations_keep_save_order() {
        let save = SaveFile {
            nodes: vec![node(1, 0.0, 0.0), node(2, 10.0, 0.0)],
            segments: vec![
                road(3, 1, 2, 8.0, "Road", 1.0),
                road(1, 1, 2, 8.0, "Road", 1.0),
                road(2, 1, 2, 8.0, "Road", 0.0),
            ],
            ..SaveFile::default()
        };
        let organizer = SegmentOrganizer::load(&save, &MapConfig::default()).unwrap();
        let ids: Vec<u32> = organizer.segments().iter().map(|s| s.id.0).collect();
        assert_eq!(ids, vec![2, 3, 1]);
    }

    #[test]
    fn test_routes_without_stops_are_dropped() {
        let save = shuttle_save(vec![transport("empty", &[]), transport("a", &[1, 2])]);
        let organizer = SegmentOrganizer::load(&save, &MapConfig::default()).unwrap();
        assert_eq!(organizer.routes().len(), 1);
        assert_eq!(organizer.routes()[0].index, 1);
        assert_eq!(organizer.routes()[0].save_id, "a");
    }

    #[test]
    fn test_missing_route_segment_is_fatal() {
        let save = shuttle_save(vec![transport("a", &[1, 2, 1, 2, 2])]);
        match SegmentOrganizer::load(&save, &MapConfig::default()) {
            Err(MapError::UnknownRouteSegment { route, start, end }) => {
                assert_eq!(route, "a");
                assert_eq!((start, end), (2, 2));
            }
            other => panic!("unexpected result: {:?}", other.err()),
        }
    }

    #[test]
    fn test_unknown_stop_node_is_fatal() {
        let save = shuttle_save(vec![transport("a", &[1, 9])]);
        assert!(matches!(
            SegmentOrganizer::load(&save, &MapConfig::default()),
            Err(MapError::UnknownNode { node: 9, .. })
        ));
    }

    #[test]
    fn test_unknown_path_segment_is_fatal() {
        let mut save = shuttle_save(vec![transport("a", &[1, 2])]);
        save.segments[2] = path(1, 2, &[10, 77]);
        assert!(matches!(
            SegmentOrganizer::load(&save, &MapConfig::default()),
            Err(MapError::UnknownSegment { segment: 77, .. })
        ));
    }

    #[test]
    fn test_unknown_segment_endpoint_is_fatal() {
        let mut save = shuttle_save(Vec::new());
        save.segments.push(road(12, 1, 5, 8.0, "Road", 0.0));
        assert!(matches!(
            SegmentOrganizer::load(&save, &MapConfig::default()),
            Err(MapError::UnknownNode { node: 5, .. })
        ));
    }

    #[test]
    fn test_build_roads_insets_fill() {
        let mut save = shuttle_save(Vec::new());
        save.segments.push(road(12, 1, 2, 3.0, "Alley", 9.0));
        let organizer = SegmentOrganizer::load(&save, &MapConfig::default()).unwrap();
        let roads = organizer.build_roads();
        let casing: Vec<f64> = roads.casing.iter().map(|p| p.stroke_width).collect();
        let fill: Vec<f64> = roads.fill.iter().map(|p| p.stroke_width).collect();
        assert_eq!(casing, vec![16.0, 24.0, 3.0]);
        assert_eq!(fill, vec![12.0, 20.0, 0.0]);
        assert!(roads.fill.iter().all(|p| p.stroke.is_none()));
    }

    #[test]
    fn test_shared_segment_strokes_stack() {
        let save = shuttle_save(vec![
            transport("a", &[1, 2]),
            transport("b", &[1, 2]),
            transport("c", &[1, 2]),
        ]);
        let mut organizer = SegmentOrganizer::load(&save, &MapConfig::default()).unwrap();
        let transit = organizer.build_transit_routes().unwrap();

        // Road 10 is 24 wide: 8 per route. Road 11 is 16 wide: 16/3 each.
        let on_road = |id: u32| -> Vec<f64> {
            transit
                .paths
                .fill
                .iter()
                .filter(|p| p.segment == SegmentId(id))
                .map(|p| p.stroke_width)
                .collect()
        };
        assert_eq!(on_road(10), vec![24.0, 16.0, 8.0]);
        let widths = on_road(11);
        let unit = 16.0 / 3.0;
        assert_eq!(widths.len(), 3);
        for (k, width) in widths.iter().enumerate() {
            assert!((width - unit * (3 - k) as f64).abs() < 1e-9);
        }
        // Visible bands add up to the widest stroke, which fits the road
        assert!(widths[0] <= 16.0 + 1e-9);

        let casing: Vec<f64> = transit
            .paths
            .casing
            .iter()
            .filter(|p| p.segment == SegmentId(10))
            .map(|p| p.stroke_width)
            .collect();
        assert_eq!(casing, vec![27.0, 19.0, 11.0]);

        assert_eq!(transit.route_paths.len(), 3);
        assert!(transit.route_paths.values().all(|h| h.len() == 4));
    }

    #[test]
    fn test_route_stroke_is_capped() {
        let save = shuttle_save(vec![transport("a", &[1, 2])]);
        let mut organizer = SegmentOrganizer::load(&save, &MapConfig::default()).unwrap();
        let transit = organizer.build_transit_routes().unwrap();
        assert!(transit.paths.fill.iter().all(|p| p.stroke_width == 10.0));
        assert_eq!(
            transit.paths.fill[0].stroke.as_deref(),
            Some("rgba(200, 30, 30, 1)")
        );
    }

    #[test]
    fn test_repeated_segment_drawn_once_per_route() {
        let mut save = shuttle_save(vec![transport("a", &[1, 2])]);
        save.segments[3] = path(2, 1, &[10]);
        let mut organizer = SegmentOrganizer::load(&save, &MapConfig::default()).unwrap();
        let transit = organizer.build_transit_routes().unwrap();
        assert_eq!(transit.paths.fill.len(), 1);
    }

    #[test]
    fn test_stops_grouped_after_transit() {
        let save = shuttle_save(vec![transport("a", &[1, 2]), transport("b", &[2, 1])]);
        let mut organizer = SegmentOrganizer::load(&save, &MapConfig::default()).unwrap();
        organizer.build_transit_routes().unwrap();
        let groups = organizer.stop_groups();
        assert_eq!(groups.len(), 2);
        assert!(groups.iter().all(|g| g.stops.len() == 2));
    }

    #[test]
    fn test_no_routes_no_transit() {
        let save = shuttle_save(Vec::new());
        let mut organizer = SegmentOrganizer::load(&save, &MapConfig::default()).unwrap();
        assert!(organizer.routes().is_empty());
        let transit = organizer.build_transit_routes().unwrap();
        assert!(transit.paths.is_empty());
        assert!(transit.route_paths.is_empty());
        assert!(organizer.stop_groups().is_empty());
    }

    #[test]
    fn test_seed_stop_labels_rings() {
        let save = shuttle_save(vec![transport("a", &[1, 2]), transport("b", &[1, 2])]);
        let mut organizer = SegmentOrganizer::load(&save, &MapConfig::default()).unwrap();
        organizer.build_transit_routes().unwrap();

        let mut placement = LabelPlacement::default();
        organizer.seed_stop_labels(&mut placement);
        let candidates = placement.candidate_labels();
        assert_eq!(candidates.len(), 2 * (6 + 10 + 15));

        // Group at the origin with two routes: labels are 300 wide
        let first = &candidates[0];
        assert_eq!(first.subject, LabelSubject::StopGroup(0));
        assert_eq!(first.bounds.width(), 300.0);
        assert_eq!(first.bounds.height(), 90.0);
        let r = 120.0 + 150.0;
        let expected = Point::new(r * (PI / 4.0).cos(), -r * (PI / 4.0).sin());
        assert!((first.anchor.x - expected.x).abs() < 1e-9);
        assert!((first.anchor.y - expected.y).abs() < 1e-9);

        let outer = candidates
            .iter()
            .filter(|l| l.subject == LabelSubject::StopGroup(0))
            .last()
            .unwrap();
        assert!((outer.anchor.distance_to(&Point::new(0.0, 0.0)) - 390.0).abs() < 1e-9);
    }

    #[test]
    fn test_shared_save_id_badges_keep_own_colour() {
        let mut second = transport("a", &[1, 2]);
        second.color = RGBA::new(240, 240, 40, 255);
        let save = shuttle_save(vec![transport("a", &[1, 2]), second]);
        let mut organizer = SegmentOrganizer::load(&save, &MapConfig::default()).unwrap();
        assert_eq!(organizer.routes()[0].id, organizer.routes()[1].id);
        organizer.build_transit_routes().unwrap();

        let label = Label::new(Point::new(0.0, 300.0), 300.0, 90.0, LabelSubject::StopGroup(0));
        let markers = organizer.create_stop_markers(&[label]);
        let badges: Vec<(&str, &str, &str)> = markers[0]
            .badges
            .iter()
            .map(|b| (b.text.as_str(), b.fill.as_str(), b.text_color))
            .collect();
        assert_eq!(
            badges,
            vec![
                ("#1", "rgba(200, 30, 30, 1)", "white"),
                ("#2", "rgba(240, 240, 40, 1)", "black"),
            ]
        );
        assert_eq!(organizer.route_by_index(2).unwrap().color, RGBA::new(240, 240, 40, 255));
        assert!(organizer.route_by_index(0).is_none());
        assert!(organizer.route_by_index(3).is_none());
    }

    #[test]
    fn test_stop_markers() {
        let save = shuttle_save(vec![transport("a", &[1, 2]), transport("b", &[1, 2])]);
        let mut organizer = SegmentOrganizer::load(&save, &MapConfig::default()).unwrap();
        organizer.build_transit_routes().unwrap();

        let label = Label::new(Point::new(0.0, 300.0), 300.0, 90.0, LabelSubject::StopGroup(0));
        let obstacle = Label::new(Point::new(0.0, 0.0), 10.0, 10.0, LabelSubject::District(0));
        let markers = organizer.create_stop_markers(&[label, obstacle]);
        assert_eq!(markers.len(), 1);

        let marker = &markers[0];
        assert_eq!(marker.leader, [Point::new(0.0, 0.0), Point::new(0.0, 300.0)]);
        assert_eq!(marker.pin_radius, 22.0);
        let texts: Vec<&str> = marker.badges.iter().map(|b| b.text.as_str()).collect();
        assert_eq!(texts, vec!["#1", "#2"]);
        assert_eq!(marker.badges[1].bounds.x1, 0.0);
        assert_eq!(marker.badges[0].text_color, "white");
    }
}
