use rgb::{RGB, RGBA};

pub const WATER_RGB: RGB<u8> = RGB::new(30, 30, 200);

/// Terrain palette from lowland to peaks.
pub const DEFAULT_PALETTE: [RGB<u8>; 5] = [
    RGB::new(94, 117, 46),
    RGB::new(173, 196, 20),
    RGB::new(255, 255, 168),
    RGB::new(219, 161, 79),
    RGB::new(79, 46, 13),
];

/// sqrt(0.299 R^2 + 0.587 G^2 + 0.114 B^2)
pub fn perceived_luminance(color: RGB<u8>) -> f64 {
    let sq = |c: u8| (c as f64) * (c as f64);
    (0.299 * sq(color.r) + 0.587 * sq(color.g) + 0.114 * sq(color.b)).sqrt()
}

pub fn is_dark(color: RGB<u8>) -> bool {
    perceived_luminance(color) <= 127.0
}

/// Contrasting tone of a route colour, used for the casing under its line.
/// Dark colours move halfway to white, light ones halfway to black.
pub fn highlight_color(color: RGBA<u8>) -> RGBA<u8> {
    let dark = is_dark(RGB::new(color.r, color.g, color.b));
    let shift = |c: u8| {
        if dark {
            ((c as u16 + 256) / 2) as u8
        } else {
            c / 2
        }
    };
    RGBA::new(shift(color.r), shift(color.g), shift(color.b), shift(color.a))
}

/// Text colour that stays readable on top of `background`.
pub fn contrasting_text(background: RGB<u8>) -> &'static str {
    if is_dark(background) { "white" } else { "black" }
}

pub fn lerp(offset: f64, low: RGB<u8>, high: RGB<u8>) -> RGB<u8> {
    let mix = |l: u8, h: u8| (l as f64 * (1.0 - offset) + h as f64 * offset).clamp(0.0, 255.0) as u8;
    RGB::new(mix(low.r, high.r), mix(low.g, high.g), mix(low.b, high.b))
}

pub fn css_rgba(color: RGBA<u8>) -> String {
    format!(
        "rgba({}, {}, {}, {})",
        color.r,
        color.g,
        color.b,
        color.a as f64 / 255.0
    )
}

/// Piecewise-linear colour ramp for elevations.
#[derive(Debug, Clone)]
pub struct HeightMap {
    palette: Vec<RGB<u8>>,
    pub default_color: RGB<u8>,
}

impl Default for HeightMap {
    fn default() -> Self {
        Self::new(DEFAULT_PALETTE.to_vec(), WATER_RGB)
    }
}

impl HeightMap {
    pub fn new(palette: Vec<RGB<u8>>, default_color: RGB<u8>) -> Self {
        Self {
            palette,
            default_color,
        }
    }

    /// Colour for `value` scaled into `[min, max]`, snapped to multiples of
    /// `threshold`. Values below `min` get the default colour.
    pub fn interp(&self, value: f64, threshold: f64, min: f64, max: f64) -> RGB<u8> {
        if value < min || self.palette.is_empty() {
            return self.default_color;
        }

        let scale = ((value - min) / max / threshold).round() * threshold;
        let last = self.palette.len() - 1;
        let index_scaled = (scale * last as f64).clamp(0.0, last as f64);
        let low = index_scaled.floor();
        let high = index_scaled.ceil();
        lerp(
            index_scaled - low,
            self.palette[low as usize],
            self.palette[high as usize],
        )
    }
}
