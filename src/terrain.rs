//! Raster backgrounds: coloured terrain and forest cover.

use crate::color::{HeightMap, lerp};
use crate::config::MapConfig;
use crate::errors::{MapError, Result};
use crate::geometry::Rect;
use serde::Serialize;

const MAX_HEIGHT: f64 = 65535.0;

/// Square RGBA image stretched over `bounds`. Pixels are not serialized,
/// hosts write them out separately.
#[derive(Debug, Clone, Serialize)]
pub struct Raster {
    pub side: usize,
    pub bounds: Rect,
    /// Row 0 is the southern edge, so the image is drawn flipped.
    pub flip_vertical: bool,
    #[serde(skip)]
    pub rgba: Vec<u8>,
}

fn canvas_bounds(config: &MapConfig) -> Rect {
    Rect {
        x1: -config.half_canvas,
        y1: -config.half_canvas,
        x2: config.half_canvas,
        y2: config.half_canvas,
    }
}

fn parse_sample(value: &str, element: &'static str) -> Result<f64> {
    value
        .trim()
        .parse::<f64>()
        .map_err(|_| MapError::InvalidNumber {
            element,
            attribute: "text",
            value: value.to_string(),
        })
}

/// Colours `height:water` samples. Land under water is tinted toward the
/// water colour.
pub fn bake_terrain(
    samples: &str,
    sea_level: f64,
    height_map: &HeightMap,
    config: &MapConfig,
) -> Result<Raster> {
    let side = config.heightmap_side;
    let mut rgba = vec![0u8; side * side * 4];

    let values = samples
        .split([',', ':'])
        .filter(|v| !v.trim().is_empty())
        .map(|v| parse_sample(v, "Ter"))
        .collect::<Result<Vec<f64>>>()?;

    for (pixel, pair) in values.chunks_exact(2).take(side * side).enumerate() {
        let (height, water) = (pair[0], pair[1]);
        let mut color = height_map.interp(height, config.terrain_quantization, sea_level, MAX_HEIGHT);
        if water > sea_level {
            color = lerp(config.water_tint, color, height_map.default_color);
        }
        let at = pixel * 4;
        rgba[at..at + 4].copy_from_slice(&[color.r, color.g, color.b, 255]);
    }

    Ok(Raster {
        side,
        bounds: canvas_bounds(config),
        flip_vertical: true,
        rgba,
    })
}

/// Forest density rows as a translucent green overlay.
pub fn bake_forests(rows: &[String], config: &MapConfig) -> Result<Raster> {
    let side = config.forest_side;
    let mut rgba = vec![0u8; side * side * 4];

    for (y, row) in rows.iter().take(side).enumerate() {
        for (x, cell) in row.split(',').take(side).enumerate() {
            // Blank cells are bare ground
            let alpha = if cell.trim().is_empty() {
                0
            } else {
                parse_sample(cell, "Forest")?.clamp(0.0, 255.0) as u8
            };
            let at = (y * side + x) * 4;
            rgba[at..at + 4].copy_from_slice(&[0, 0x40, 0, alpha]);
        }
    }

    Ok(Raster {
        side,
        bounds: canvas_bounds(config),
        flip_vertical: true,
        rgba,
    })
}
