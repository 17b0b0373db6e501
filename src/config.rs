use serde::Deserialize;

/// One ring of candidate stop labels around a stop group.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
pub struct LabelRing {
    pub radius: f64,
    pub count: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MapConfig {
    // Stops closer than this to a group centroid join the group
    pub stop_merge_threshold: f64,
    // Road fill is drawn this much narrower than its casing
    pub casing_inset: f64,
    pub max_route_stroke: f64,
    // Transit casings are this much wider than their fill
    pub route_casing_extra: f64,
    // Power lines sort too low otherwise
    pub power_elevation_boost: f64,

    pub label_rings: Vec<LabelRing>,
    pub label_start_angle_deg: f64,
    pub stop_label_cell_width: f64,
    pub stop_label_height: f64,
    pub label_window_min: usize,
    pub label_window_divisor: usize,
    pub max_label_passes: usize,

    // Rough glyph metrics for district names, used for label avoidance only
    pub district_char_width: f64,
    pub district_label_height: f64,

    pub half_canvas: f64,
    pub tile_count: u32,
    pub grid_offset: f64,
    pub heightmap_side: usize,
    pub forest_side: usize,
    pub terrain_quantization: f64,
    pub water_tint: f64,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            stop_merge_threshold: 48.0,
            casing_inset: 4.0,
            max_route_stroke: 10.0,
            route_casing_extra: 3.0,
            power_elevation_boost: 20.0,
            label_rings: vec![
                LabelRing {
                    radius: 120.0,
                    count: 6,
                },
                LabelRing {
                    radius: 180.0,
                    count: 10,
                },
                LabelRing {
                    radius: 240.0,
                    count: 15,
                },
            ],
            label_start_angle_deg: 45.0,
            stop_label_cell_width: 150.0,
            stop_label_height: 90.0,
            label_window_min: 20,
            label_window_divisor: 5,
            max_label_passes: 10_000,
            district_char_width: 48.0,
            district_label_height: 96.0,
            half_canvas: 8650.0,
            tile_count: 9,
            grid_offset: 25.0,
            heightmap_side: 1081,
            forest_side: 512,
            terrain_quantization: 0.05,
            water_tint: 0.75,
        }
    }
}

impl MapConfig {
    /// Reads a RON config file. Fields left out keep their defaults.
    pub fn from_ron_str(text: &str) -> Result<Self, ron::error::SpannedError> {
        ron::from_str(text)
    }

    pub fn canvas_side(&self) -> f64 {
        self.half_canvas * 2.0
    }
}
