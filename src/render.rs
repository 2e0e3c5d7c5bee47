//! Static map snapshots
//!
//! The query service only depends on [`MapRenderer`]. [`MarkerRenderer`] is
//! the built-in implementation: a Web Mercator world canvas with a graticule
//! and a single marker, encoded as PNG.

use std::f64::consts::PI;
use std::io::Cursor;
use std::str::FromStr;

use image::{ImageFormat, Rgba, RgbaImage};
use thiserror::Error;

use crate::models::Position;

/// Largest renderable side, in pixels
pub const MAX_SIDE: u32 = 2048;

/// Latitude limit of the Web Mercator projection
const MAX_LAT: f64 = 85.05112878;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Invalid image size {width}x{height}")]
    InvalidSize { width: u32, height: u32 },

    #[error("Unknown color scheme: {0}")]
    UnknownColorScheme(String),

    #[error("Image encoding failed")]
    Encode(#[from] image::ImageError),

    #[error("Render task failed: {0}")]
    Task(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorScheme {
    #[default]
    Light,
    Dark,
}

impl FromStr for ColorScheme {
    type Err = RenderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "light" => Ok(ColorScheme::Light),
            "dark" => Ok(ColorScheme::Dark),
            _ => Err(RenderError::UnknownColorScheme(s.to_string())),
        }
    }
}

struct Palette {
    water: Rgba<u8>,
    grid: Rgba<u8>,
    marker: Rgba<u8>,
    outline: Rgba<u8>,
}

impl ColorScheme {
    fn palette(self) -> Palette {
        match self {
            ColorScheme::Light => Palette {
                water: Rgba([170, 211, 223, 255]),
                grid: Rgba([140, 180, 196, 255]),
                marker: Rgba([220, 40, 40, 255]),
                outline: Rgba([255, 255, 255, 255]),
            },
            ColorScheme::Dark => Palette {
                water: Rgba([22, 34, 52, 255]),
                grid: Rgba([45, 62, 88, 255]),
                marker: Rgba([255, 170, 0, 255]),
                outline: Rgba([10, 10, 10, 255]),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapOptions {
    pub width: u32,
    pub height: u32,
    pub color_scheme: ColorScheme,
}

impl Default for MapOptions {
    fn default() -> Self {
        Self {
            width: 600,
            height: 400,
            color_scheme: ColorScheme::Light,
        }
    }
}

impl MapOptions {
    pub fn validate(&self) -> Result<(), RenderError> {
        let valid = 1..=MAX_SIDE;
        if !valid.contains(&self.width) || !valid.contains(&self.height) {
            return Err(RenderError::InvalidSize {
                width: self.width,
                height: self.height,
            });
        }
        Ok(())
    }
}

/// Renders a single-marker map image
pub trait MapRenderer: Send + Sync {
    /// Render `position` and return PNG bytes
    fn render(&self, position: Position, options: &MapOptions) -> Result<Vec<u8>, RenderError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MarkerRenderer;

impl MapRenderer for MarkerRenderer {
    fn render(&self, position: Position, options: &MapOptions) -> Result<Vec<u8>, RenderError> {
        options.validate()?;
        let palette = options.color_scheme.palette();
        let (width, height) = (options.width, options.height);

        let mut image = RgbaImage::from_pixel(width, height, palette.water);

        // Graticule every 30 degrees
        for lon in (-150..=150).step_by(30) {
            let (x, _) = project(0.0, lon as f64, width, height);
            for y in 0..height {
                image.put_pixel(x, y, palette.grid);
            }
        }
        for lat in (-60..=60).step_by(30) {
            let (_, y) = project(lat as f64, 0.0, width, height);
            for x in 0..width {
                image.put_pixel(x, y, palette.grid);
            }
        }

        let (cx, cy) = project(position.lat, position.lon, width, height);
        let radius = (width.min(height) / 40).max(3) as i64;
        draw_disc(&mut image, cx, cy, radius + 1, palette.outline);
        draw_disc(&mut image, cx, cy, radius, palette.marker);

        let mut buf = Vec::new();
        image.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
        Ok(buf)
    }
}

/// Project to pixel coordinates on a `width` x `height` Web Mercator canvas
fn project(lat: f64, lon: f64, width: u32, height: u32) -> (u32, u32) {
    let lat = lat.clamp(-MAX_LAT, MAX_LAT);
    let x = (lon + 180.0) / 360.0;
    let lat_rad = lat * PI / 180.0;
    let y = (1.0 - lat_rad.tan().asinh() / PI) / 2.0;

    let px = (x * width as f64).floor().clamp(0.0, (width - 1) as f64) as u32;
    let py = (y * height as f64).floor().clamp(0.0, (height - 1) as f64) as u32;
    (px, py)
}

fn draw_disc(image: &mut RgbaImage, cx: u32, cy: u32, radius: i64, color: Rgba<u8>) {
    let (width, height) = (image.width() as i64, image.height() as i64);
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if dx * dx + dy * dy > radius * radius {
                continue;
            }
            let (x, y) = (cx as i64 + dx, cy as i64 + dy);
            if (0..width).contains(&x) && (0..height).contains(&y) {
                image.put_pixel(x as u32, y as u32, color);
            }
        }
    }
}
