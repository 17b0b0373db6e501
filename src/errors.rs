//! Errors raised while reading a save file and building its map.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MapError {
    #[error("Save file is not valid XML: {0}")]
    Xml(#[from] roxmltree::Error),
    #[error("Required element <{element}> is missing")]
    MissingElement { element: &'static str },
    #[error("Element <{element}> is missing attribute '{attribute}'")]
    MissingAttribute {
        element: &'static str,
        attribute: &'static str,
    },
    #[error("Element <{element}> has non-numeric '{attribute}': '{value}'")]
    InvalidNumber {
        element: &'static str,
        attribute: &'static str,
        value: String,
    },
    #[error("Node {node} referenced by {referenced_by} does not exist")]
    UnknownNode { node: u32, referenced_by: String },
    #[error("Segment {segment} listed in route segment {route_segment} does not exist")]
    UnknownSegment { segment: u32, route_segment: String },
    #[error("Route '{route}' has no route segment between nodes {start} and {end}")]
    UnknownRouteSegment { route: String, start: u32, end: u32 },
    #[error("Map builder reached unknown stage {0}")]
    UnknownStage(usize),
}

pub type Result<T> = std::result::Result<T, MapError>;
