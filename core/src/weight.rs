//! Highlight intensity curve and color gradient.

use serde::{Deserialize, Serialize};

/// Maps a prevalence count to an intensity in `[0, 1]`.
///
/// Logarithmic: the first few repetitions move the value quickly, counts near
/// `max_count` saturate. Counts above `max_count` are clamped.
pub fn weight(count: usize, max_count: usize) -> f64 {
    if max_count == 0 {
        return 0.0;
    }
    let count = count.min(max_count) as f64;
    let max = max_count as f64;
    let t = ((1.0 + count) / (max + 1.0)).ln() + 1.0;
    let scale = 1.0 - (1.0 - t) / -(1.0 / (max + 1.0)).ln();
    scale.clamp(0.0, 1.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl std::fmt::Display for Rgb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "rgb({}, {}, {})", self.r, self.g, self.b)
    }
}

/// Linear blend between the theme's low and high colors.
pub fn gradient_color(intensity: f64, theme: Theme) -> Rgb {
    let (from, to) = match theme {
        Theme::Dark => (Rgb::new(0, 0, 255), Rgb::new(255, 0, 0)),
        Theme::Light => (Rgb::new(255, 255, 237), Rgb::new(204, 85, 0)),
    };
    let t = intensity.clamp(0.0, 1.0);
    let mix = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * t).round() as u8;
    Rgb::new(mix(from.r, to.r), mix(from.g, to.g), mix(from.b, to.b))
}
