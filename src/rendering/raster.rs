//! Software rasterizer and PNG encoder for paint commands

use super::layout::CELL;
use super::paint::PaintCommand;
use crate::{Error, Result, MAX_VIEWPORT_EDGE};

/// RGBA8 pixel buffer.
#[derive(Debug, Clone)]
pub struct Canvas {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Canvas {
    /// Allocate a transparent canvas; refuses sizes beyond the viewport limit.
    pub fn new(width: u32, height: u32) -> Result<Self> {
        let len = (width <= MAX_VIEWPORT_EDGE && height <= MAX_VIEWPORT_EDGE)
            .then(|| (width as usize).checked_mul(height as usize)?.checked_mul(4))
            .flatten()
            .ok_or_else(|| Error::RenderError(format!("canvas {}x{} is too large", width, height)))?;
        Ok(Self {
            width,
            height,
            pixels: vec![0; len],
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * 4;
        Some([self.pixels[i], self.pixels[i + 1], self.pixels[i + 2], self.pixels[i + 3]])
    }

    /// Fill a rectangle, clipped to the canvas.
    pub fn fill_rect(&mut self, x: i32, y: i32, width: u32, height: u32, rgba: (u8, u8, u8, u8)) {
        let x0 = x.max(0) as u32;
        let y0 = y.max(0) as u32;
        let x1 = (x as i64 + width as i64).clamp(0, self.width as i64) as u32;
        let y1 = (y as i64 + height as i64).clamp(0, self.height as i64) as u32;
        for py in y0..y1 {
            let row = py as usize * self.width as usize;
            for px in x0..x1 {
                let i = (row + px as usize) * 4;
                self.pixels[i..i + 4].copy_from_slice(&[rgba.0, rgba.1, rgba.2, rgba.3]);
            }
        }
    }

    /// Draw text as greeked glyph blocks, one cell per character.
    pub fn draw_text(&mut self, x: i32, y: i32, text: &str, scale: u32) {
        let cell = (CELL * scale) as i32;
        let inset = scale as i32;
        let glyph = CELL * scale - 2 * scale;
        for (row, line) in text.lines().enumerate() {
            let ly = y + row as i32 * cell;
            for (col, ch) in line.chars().enumerate() {
                if ch.is_whitespace() {
                    continue;
                }
                let lx = x + col as i32 * cell;
                self.fill_rect(lx + inset, ly + inset, glyph, glyph, super::paint::BLACK);
            }
        }
    }

    pub fn execute(&mut self, commands: &[PaintCommand]) {
        for cmd in commands {
            match cmd {
                PaintCommand::SolidRect { x, y, width, height, rgba } => {
                    self.fill_rect(*x, *y, *width, *height, *rgba)
                }
                PaintCommand::Text { x, y, text, scale } => self.draw_text(*x, *y, text, *scale),
            }
        }
    }

    pub fn encode_png(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        let mut encoder = png::Encoder::new(&mut out, self.width, self.height);
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder
            .write_header()
            .map_err(|e| Error::RenderError(format!("PNG header: {}", e)))?;
        writer
            .write_image_data(&self.pixels)
            .map_err(|e| Error::RenderError(format!("PNG encoding: {}", e)))?;
        writer
            .finish()
            .map_err(|e| Error::RenderError(format!("PNG encoding: {}", e)))?;
        Ok(out)
    }
}
