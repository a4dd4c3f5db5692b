#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Flat image previews of generated caves.
//!
//! Rendering only reads a finished [`MapPattern`]; every pixel row is
//! independent, so rows are filled in parallel.

use std::{error::Error, fmt, path::Path};

use anyhow::{Context, Result as AnyResult};
use cave_core::{Cell, CellCoord, CellType};
use cave_pattern::MapPattern;
use rayon::prelude::*;

/// RGBA color used when presenting caves.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Color {
    /// Red channel intensity in the range 0.0..=1.0.
    pub red: f32,
    /// Green channel intensity in the range 0.0..=1.0.
    pub green: f32,
    /// Blue channel intensity in the range 0.0..=1.0.
    pub blue: f32,
    /// Alpha channel intensity in the range 0.0..=1.0.
    pub alpha: f32,
}

impl Color {
    /// Opaque black.
    pub const BLACK: Self = Self::new(0.0, 0.0, 0.0, 1.0);

    /// Opaque white.
    pub const WHITE: Self = Self::new(1.0, 1.0, 1.0, 1.0);

    /// Grey used for wall cells on a region boundary.
    pub const WALL_EDGE: Self = Self::new(0.18, 0.18, 0.18, 1.0);

    /// Marker drawn on the spawn cell.
    pub const SPAWN: Self = Self::new(0.9, 0.16, 0.16, 1.0);

    /// Creates a new color from floating point channels.
    #[must_use]
    pub const fn new(red: f32, green: f32, blue: f32, alpha: f32) -> Self {
        Self {
            red,
            green,
            blue,
            alpha,
        }
    }

    /// Creates an opaque color from byte RGB values.
    #[must_use]
    pub fn from_rgb_u8(red: u8, green: u8, blue: u8) -> Self {
        Self::new(
            f32::from(red) / 255.0,
            f32::from(green) / 255.0,
            f32::from(blue) / 255.0,
            1.0,
        )
    }

    /// Creates an opaque color from hue, saturation and value, all in
    /// 0.0..=1.0. A hue of one wraps around to zero.
    #[must_use]
    pub fn from_hsv(hue: f32, saturation: f32, value: f32) -> Self {
        let hue = hue.rem_euclid(1.0) * 6.0;
        let saturation = saturation.clamp(0.0, 1.0);
        let value = value.clamp(0.0, 1.0);

        let sector = hue.floor();
        let fraction = hue - sector;
        let p = value * (1.0 - saturation);
        let q = value * (1.0 - saturation * fraction);
        let t = value * (1.0 - saturation * (1.0 - fraction));

        let (red, green, blue) = match sector as u32 {
            0 => (value, t, p),
            1 => (q, value, p),
            2 => (p, value, t),
            3 => (p, q, value),
            4 => (t, p, value),
            _ => (value, p, q),
        };
        Self::new(red, green, blue, 1.0)
    }

    /// Converts the color into 8-bit RGBA channels.
    #[must_use]
    pub fn to_rgba8(self) -> [u8; 4] {
        [
            channel_to_u8(self.red),
            channel_to_u8(self.green),
            channel_to_u8(self.blue),
            channel_to_u8(self.alpha),
        ]
    }
}

fn channel_to_u8(channel: f32) -> u8 {
    (channel.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// How cells are colored.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum RenderMode {
    /// Walls black, floors white.
    #[default]
    Monochrome,
    /// Each room gets its own hue and region boundaries are shaded.
    RegionColored,
}

/// Row-major pixel buffer, one pixel per grid cell unless upscaled.
#[derive(Clone, Debug, PartialEq)]
pub struct Image {
    width: u32,
    height: u32,
    pixels: Vec<Color>,
}

impl Image {
    /// Allocates a black image.
    ///
    /// Returns an error when either dimension is zero.
    pub fn new(width: u32, height: u32) -> Result<Self, RenderingError> {
        if width == 0 || height == 0 {
            return Err(RenderingError::EmptyImage { width, height });
        }
        let len = usize::try_from(u64::from(width) * u64::from(height))
            .map_err(|_| RenderingError::ImageTooLarge { width, height })?;
        Ok(Self {
            width,
            height,
            pixels: vec![Color::BLACK; len],
        })
    }

    /// Number of pixel columns.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Number of pixel rows.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Color at the pixel, if it lies inside the image.
    #[must_use]
    pub fn pixel(&self, column: u32, row: u32) -> Option<Color> {
        if column >= self.width || row >= self.height {
            return None;
        }
        let index = usize::try_from(u64::from(row) * u64::from(self.width) + u64::from(column)).ok()?;
        self.pixels.get(index).copied()
    }

    /// Returns a copy where every pixel becomes a `factor × factor` block.
    pub fn upscaled(&self, factor: u32) -> Result<Self, RenderingError> {
        if factor == 0 {
            return Err(RenderingError::InvalidScale { factor });
        }
        let width = self.width.checked_mul(factor);
        let height = self.height.checked_mul(factor);
        let (Some(width), Some(height)) = (width, height) else {
            return Err(RenderingError::ImageTooLarge {
                width: self.width,
                height: self.height,
            });
        };

        let mut scaled = Self::new(width, height)?;
        let row_len = scaled.row_len();
        scaled
            .pixels
            .par_chunks_mut(row_len)
            .enumerate()
            .for_each(|(row, line)| {
                let source_row = row as u32 / factor;
                for (column, pixel) in line.iter_mut().enumerate() {
                    if let Some(color) = self.pixel(column as u32 / factor, source_row) {
                        *pixel = color;
                    }
                }
            });
        Ok(scaled)
    }

    /// Flattens the image into 8-bit RGBA bytes, row-major.
    #[must_use]
    pub fn to_rgba8(&self) -> Vec<u8> {
        self.pixels.iter().flat_map(|color| color.to_rgba8()).collect()
    }

    fn set_pixel(&mut self, coord: CellCoord, color: Color) {
        if coord.column() >= self.width || coord.row() >= self.height {
            return;
        }
        let index = u64::from(coord.row()) * u64::from(self.width) + u64::from(coord.column());
        if let Some(pixel) = usize::try_from(index).ok().and_then(|i| self.pixels.get_mut(i)) {
            *pixel = color;
        }
    }

    fn row_len(&self) -> usize {
        usize::try_from(self.width).unwrap_or(usize::MAX).max(1)
    }
}

/// Draws the cave one pixel per cell, marking the spawn cell.
pub fn render(pattern: &MapPattern, mode: RenderMode) -> Result<Image, RenderingError> {
    let grid = pattern.grid();
    let room_count = pattern.regions().room_count();
    let mut image = Image::new(grid.width(), grid.height())?;
    let row_len = image.row_len();

    image
        .pixels
        .par_chunks_mut(row_len)
        .zip(grid.cells().par_chunks(row_len))
        .for_each(|(pixels, cells)| {
            for (pixel, cell) in pixels.iter_mut().zip(cells) {
                *pixel = cell_color(*cell, mode, room_count);
            }
        });

    if let Some(spawn) = pattern.spawn_point() {
        image.set_pixel(spawn, Color::SPAWN);
    }
    Ok(image)
}

/// Color of a single cell under the provided mode.
#[must_use]
pub fn cell_color(cell: Cell, mode: RenderMode, room_count: usize) -> Color {
    match (mode, cell.cell_type()) {
        (RenderMode::Monochrome, CellType::Wall) => Color::BLACK,
        (RenderMode::Monochrome, CellType::Floor) => Color::WHITE,
        (RenderMode::RegionColored, CellType::Wall) if cell.is_edge() => Color::WALL_EDGE,
        (RenderMode::RegionColored, CellType::Wall) => Color::BLACK,
        (RenderMode::RegionColored, CellType::Floor) => {
            let hue = if room_count == 0 {
                0.0
            } else {
                cell.region_number() as f32 / room_count as f32
            };
            if cell.is_edge() {
                Color::from_hsv(hue, 0.65, 0.8)
            } else {
                Color::from_hsv(hue, 1.0, 1.0)
            }
        }
    }
}

/// Encodes the image as a PNG file.
pub fn save_png(preview: &Image, path: &Path) -> AnyResult<()> {
    let buffer = image::RgbaImage::from_raw(preview.width(), preview.height(), preview.to_rgba8())
        .context("pixel buffer does not match the image dimensions")?;
    buffer
        .save_with_format(path, image::ImageFormat::Png)
        .with_context(|| format!("failed to write {}", path.display()))
}

/// Errors that can occur when building images.
#[derive(Debug, PartialEq, Eq)]
pub enum RenderingError {
    /// Images need at least one pixel along each axis.
    EmptyImage {
        /// Requested width.
        width: u32,
        /// Requested height.
        height: u32,
    },
    /// The pixel count does not fit in memory addressing.
    ImageTooLarge {
        /// Requested width.
        width: u32,
        /// Requested height.
        height: u32,
    },
    /// Upscaling needs a positive factor.
    InvalidScale {
        /// Provided factor that failed validation.
        factor: u32,
    },
}

impl fmt::Display for RenderingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyImage { width, height } => {
                write!(f, "image must not be empty (received {width}x{height})")
            }
            Self::ImageTooLarge { width, height } => {
                write!(f, "image of {width}x{height} pixels is too large")
            }
            Self::InvalidScale { factor } => {
                write!(f, "scale factor must be positive (received {factor})")
            }
        }
    }
}

impl Error for RenderingError {}
