//! Reads a city save export into owned records.
//!
//! Only the parts of the document the map needs are kept. Topology sections
//! (`Nodes`, `Segments`, `Transports`) are required; decorative ones
//! (terrain, forests, districts, buildings) may be missing.

use crate::errors::{MapError, Result};
use crate::geometry::Point;
use crate::segments::{NodeId, SegmentId};
use log::debug;
use rgb::RGBA;
use roxmltree::{Document, Node};

/// A polyline vertex along with the save's elevation at that vertex.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ElevatedPoint {
    pub position: Point,
    pub elevation: f64,
}

#[derive(Debug, Clone)]
pub struct DistrictRecord {
    pub name: String,
    pub anchor: Point,
}

#[derive(Debug, Clone)]
pub struct BuildingRecord {
    pub service: String,
    pub sub_service: String,
    pub footprint: Vec<Point>,
}

#[derive(Debug, Clone)]
pub struct NodeRecord {
    pub id: NodeId,
    pub position: Point,
}

#[derive(Debug, Clone)]
pub struct SegmentRecord {
    pub id: SegmentId,
    pub start_node: NodeId,
    pub end_node: NodeId,
    pub width: f64,
    pub name: String,
    pub points: Vec<ElevatedPoint>,
    /// Constituent segments when this record is a transit path between two
    /// stops rather than a physical segment.
    pub path: Option<Vec<SegmentId>>,
}

#[derive(Debug, Clone)]
pub struct TransportRecord {
    pub id: String,
    pub name: String,
    pub category: String,
    pub color: RGBA<u8>,
    pub stops: Vec<NodeId>,
}

#[derive(Debug, Clone, Default)]
pub struct SaveFile {
    pub city: Option<String>,
    pub generated: Option<String>,
    pub sea_level: Option<f64>,
    /// Raw `height:water,...` samples.
    pub terrain: Option<String>,
    pub forest_rows: Vec<String>,
    pub districts: Vec<DistrictRecord>,
    pub buildings: Vec<BuildingRecord>,
    pub nodes: Vec<NodeRecord>,
    pub segments: Vec<SegmentRecord>,
    pub transports: Vec<TransportRecord>,
}

impl SaveFile {
    pub fn parse(text: &str) -> Result<Self> {
        let doc = Document::parse(text)?;
        let root = doc.root_element();

        let city = first_text(root, "City");
        let generated = first_text(root, "Generated");
        let sea_level = match first_text(root, "SeaLevel") {
            Some(value) => Some(parse_number("SeaLevel", "text", &value)?.trunc()),
            None => None,
        };

        let terrain = find(root, "Terrains")
            .and_then(|terrains| find(terrains, "Ter"))
            .and_then(|ter| ter.text().map(|t| t.trim().to_string()));

        let forest_rows = find(root, "Forests")
            .map(|forests| {
                forests
                    .descendants()
                    .filter(|n| n.has_tag_name("Forest"))
                    .map(|n| n.text().unwrap_or_default().trim().to_string())
                    .collect()
            })
            .unwrap_or_default();

        let districts = match find(root, "Districts") {
            Some(section) => elements(section, "Dist")
                .map(parse_district)
                .collect::<Result<Vec<_>>>()?,
            None => Vec::new(),
        };

        let buildings = match find(root, "Buildings") {
            Some(section) => elements(section, "Buil")
                .map(parse_building)
                .collect::<Result<Vec<_>>>()?,
            None => Vec::new(),
        };

        let nodes = elements(required(root, "Nodes")?, "Node")
            .map(parse_node)
            .collect::<Result<Vec<_>>>()?;

        let segments = elements(required(root, "Segments")?, "Seg")
            .map(parse_segment)
            .collect::<Result<Vec<_>>>()?;

        let transports = elements(required(root, "Transports")?, "Trans")
            .map(parse_transport)
            .collect::<Result<Vec<_>>>()?;

        debug!(
            "Parsed save: {} nodes, {} segments, {} transports, {} districts, {} buildings",
            nodes.len(),
            segments.len(),
            transports.len(),
            districts.len(),
            buildings.len()
        );

        Ok(Self {
            city,
            generated,
            sea_level,
            terrain,
            forest_rows,
            districts,
            buildings,
            nodes,
            segments,
            transports,
        })
    }
}

fn find<'a, 'input>(node: Node<'a, 'input>, tag: &str) -> Option<Node<'a, 'input>> {
    node.descendants().find(|n| n.has_tag_name(tag))
}

fn required<'a, 'input>(node: Node<'a, 'input>, tag: &'static str) -> Result<Node<'a, 'input>> {
    find(node, tag).ok_or(MapError::MissingElement { element: tag })
}

fn elements<'a, 'input: 'a>(
    node: Node<'a, 'input>,
    tag: &'static str,
) -> impl Iterator<Item = Node<'a, 'input>> {
    node.descendants().filter(move |n| n.has_tag_name(tag))
}

fn first_text(node: Node, tag: &str) -> Option<String> {
    find(node, tag).map(|n| n.text().unwrap_or_default().trim().to_string())
}

fn parse_number(element: &'static str, attribute: &'static str, value: &str) -> Result<f64> {
    value
        .trim()
        .parse::<f64>()
        .map_err(|_| MapError::InvalidNumber {
            element,
            attribute,
            value: value.to_string(),
        })
}

fn attr_str<'a>(node: Node<'a, '_>, element: &'static str, attribute: &'static str) -> Result<&'a str> {
    node.attribute(attribute)
        .ok_or(MapError::MissingAttribute { element, attribute })
}

fn attr_f64(node: Node, element: &'static str, attribute: &'static str) -> Result<f64> {
    parse_number(element, attribute, attr_str(node, element, attribute)?)
}

/// Integer attributes are truncated toward zero, so "12.9" reads as 12.
fn attr_u32(node: Node, element: &'static str, attribute: &'static str) -> Result<u32> {
    Ok(attr_f64(node, element, attribute)?.trunc() as u32)
}

fn parse_point(node: Node) -> Result<Point> {
    Ok(Point::from_save(attr_f64(node, "P", "x")?, attr_f64(node, "P", "z")?))
}

fn parse_elevated_point(node: Node) -> Result<ElevatedPoint> {
    Ok(ElevatedPoint {
        position: parse_point(node)?,
        elevation: attr_f64(node, "P", "y")?,
    })
}

fn parse_district(dist: Node) -> Result<DistrictRecord> {
    let point = find(dist, "P").ok_or(MapError::MissingElement { element: "P" })?;
    Ok(DistrictRecord {
        name: attr_str(dist, "Dist", "name")?.to_string(),
        anchor: parse_point(point)?,
    })
}

fn parse_building(building: Node) -> Result<BuildingRecord> {
    Ok(BuildingRecord {
        service: building.attribute("srv").unwrap_or_default().to_string(),
        sub_service: building.attribute("subsrv").unwrap_or_default().to_string(),
        footprint: elements(building, "P")
            .map(parse_point)
            .collect::<Result<Vec<_>>>()?,
    })
}

fn parse_node(node: Node) -> Result<NodeRecord> {
    let pos = find(node, "Pos").ok_or(MapError::MissingElement { element: "Pos" })?;
    Ok(NodeRecord {
        id: NodeId(attr_u32(node, "Node", "id")?),
        position: Point::from_save(attr_f64(pos, "Pos", "x")?, attr_f64(pos, "Pos", "z")?),
    })
}

fn parse_segment(seg: Node) -> Result<SegmentRecord> {
    let path = match find(seg, "Path") {
        Some(path) => Some(
            elements(path, "Sg")
                .map(|sg| {
                    let text = sg.text().unwrap_or_default();
                    Ok(SegmentId(parse_number("Sg", "text", text)?.trunc() as u32))
                })
                .collect::<Result<Vec<_>>>()?,
        ),
        None => None,
    };

    // Transit paths are keyed by their endpoints and carry no geometry
    let (id, width, points) = if path.is_some() {
        (SegmentId(0), 0.0, Vec::new())
    } else {
        (
            SegmentId(attr_u32(seg, "Seg", "id")?),
            attr_f64(seg, "Seg", "width")?.trunc(),
            elements(seg, "P")
                .map(parse_elevated_point)
                .collect::<Result<Vec<_>>>()?,
        )
    };

    Ok(SegmentRecord {
        id,
        start_node: NodeId(attr_u32(seg, "Seg", "sn")?),
        end_node: NodeId(attr_u32(seg, "Seg", "en")?),
        width,
        name: first_text(seg, "Name").unwrap_or_default(),
        points,
        path,
    })
}

fn parse_transport(trans: Node) -> Result<TransportRecord> {
    let color = find(trans, "color").ok_or(MapError::MissingElement { element: "color" })?;
    let channel = |name: &'static str| -> Result<u8> {
        Ok(attr_f64(color, "color", name)?.clamp(0.0, 255.0) as u8)
    };

    Ok(TransportRecord {
        id: attr_str(trans, "Trans", "id")?.to_string(),
        name: trans.attribute("name").unwrap_or_default().to_string(),
        category: trans.attribute("type").unwrap_or_default().to_string(),
        color: RGBA::new(channel("r")?, channel("g")?, channel("b")?, channel("a")?),
        stops: elements(trans, "Stop")
            .map(|stop| Ok(NodeId(attr_u32(stop, "Stop", "node")?)))
            .collect::<Result<Vec<_>>>()?,
    })
}
