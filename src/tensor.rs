//! Channel-first image tensors and the preprocessing policy.
//!
//! Decoded images become `f32` tensors in CHW layout with values normalized
//! to `[0, 1]`. Bilevel sources decode to `{0, 1}` samples and are stretched
//! to full range before normalizing, so black stays 0.0 and white becomes
//! 1.0 regardless of the source bit depth.

use crate::error::{GantryError, Result};
use image::DynamicImage;
use std::io::Cursor;

/// An image as a channel-first float tensor, values in `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageTensor {
    channels: usize,
    height: usize,
    width: usize,
    data: Vec<f32>,
}

impl ImageTensor {
    /// Build a tensor from raw CHW data.
    pub fn new(channels: usize, height: usize, width: usize, data: Vec<f32>) -> Result<Self> {
        if data.len() != channels * height * width {
            return Err(GantryError::InvalidInput(format!(
                "tensor data length {} does not match {}x{}x{}",
                data.len(),
                channels,
                height,
                width
            )));
        }
        Ok(Self {
            channels,
            height,
            width,
            data,
        })
    }

    /// Decode encoded image bytes into a normalized tensor.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let decoded = image::load_from_memory(bytes)?;
        Ok(Self::from_dynamic(decoded))
    }

    /// Convert a decoded image, keeping its channel count where possible.
    pub fn from_dynamic(decoded: DynamicImage) -> Self {
        let (channels, width, height, raw) = match decoded {
            DynamicImage::ImageLuma8(buf) => {
                let (w, h) = buf.dimensions();
                (1, w, h, buf.into_raw())
            }
            DynamicImage::ImageLumaA8(buf) => {
                let (w, h) = buf.dimensions();
                (2, w, h, buf.into_raw())
            }
            DynamicImage::ImageRgb8(buf) => {
                let (w, h) = buf.dimensions();
                (3, w, h, buf.into_raw())
            }
            DynamicImage::ImageRgba8(buf) => {
                let (w, h) = buf.dimensions();
                (4, w, h, buf.into_raw())
            }
            other => {
                let buf = other.to_rgb8();
                let (w, h) = buf.dimensions();
                (3, w, h, buf.into_raw())
            }
        };

        let (width, height) = (width as usize, height as usize);

        // Bilevel sources arrive as single-channel {0, 1} samples.
        let bilevel = channels == 1 && !raw.is_empty() && raw.iter().all(|&p| p <= 1);
        let scale = if bilevel { 255.0 } else { 1.0 };

        // Interleaved HWC bytes to planar CHW floats.
        let mut data = vec![0.0f32; channels * height * width];
        for y in 0..height {
            for x in 0..width {
                for c in 0..channels {
                    let sample = raw[(y * width + x) * channels + c] as f32 * scale;
                    data[c * height * width + y * width + x] = sample / 255.0;
                }
            }
        }

        Self {
            channels,
            height,
            width,
            data,
        }
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Resize so dimensions respect `[min_dim, max_dim]`, preserving aspect
    /// ratio. Images already inside the bounds pass through untouched.
    ///
    /// The larger dimension is checked first: oversized images shrink until
    /// it equals `max_dim`, even when that leaves the smaller dimension under
    /// `min_dim`. Only images within the maximum get upscaled.
    pub fn resize_to_bounds(self, min_dim: u32, max_dim: u32) -> ImageTensor {
        match bounded_size(self.width as u32, self.height as u32, min_dim, max_dim) {
            Some((new_w, new_h)) => self.resize(new_w as usize, new_h as usize),
            None => self,
        }
    }

    /// Bilinear resample to exact dimensions.
    pub fn resize(&self, new_width: usize, new_height: usize) -> ImageTensor {
        let (c, h, w) = (self.channels, self.height, self.width);
        let mut out = vec![0.0f32; c * new_height * new_width];
        let y_ratio = h as f32 / new_height as f32;
        let x_ratio = w as f32 / new_width as f32;

        for ch in 0..c {
            let plane = &self.data[ch * h * w..(ch + 1) * h * w];
            let out_plane = &mut out[ch * new_height * new_width..(ch + 1) * new_height * new_width];
            for oy in 0..new_height {
                let cy = ((oy as f32 + 0.5) * y_ratio - 0.5).clamp(0.0, (h - 1) as f32);
                let y0 = cy.floor() as usize;
                let y1 = (y0 + 1).min(h - 1);
                let fy = cy - y0 as f32;
                for ox in 0..new_width {
                    let cx = ((ox as f32 + 0.5) * x_ratio - 0.5).clamp(0.0, (w - 1) as f32);
                    let x0 = cx.floor() as usize;
                    let x1 = (x0 + 1).min(w - 1);
                    let fx = cx - x0 as f32;

                    let top = plane[y0 * w + x0] * (1.0 - fx) + plane[y0 * w + x1] * fx;
                    let bottom = plane[y1 * w + x0] * (1.0 - fx) + plane[y1 * w + x1] * fx;
                    out_plane[oy * new_width + ox] = top * (1.0 - fy) + bottom * fy;
                }
            }
        }

        ImageTensor {
            channels: c,
            height: new_height,
            width: new_width,
            data: out,
        }
    }

    /// Encode as PNG bytes.
    pub fn to_png(&self) -> Result<Vec<u8>> {
        let (c, h, w) = (self.channels, self.height, self.width);
        let mut raw = vec![0u8; c * h * w];
        for y in 0..h {
            for x in 0..w {
                for ch in 0..c {
                    let v = self.data[ch * h * w + y * w + x];
                    raw[(y * w + x) * c + ch] = (v.clamp(0.0, 1.0) * 255.0).round() as u8;
                }
            }
        }

        let (w, h) = (w as u32, h as u32);
        let encodable = match c {
            1 => image::GrayImage::from_raw(w, h, raw).map(DynamicImage::ImageLuma8),
            2 => image::GrayAlphaImage::from_raw(w, h, raw).map(DynamicImage::ImageLumaA8),
            3 => image::RgbImage::from_raw(w, h, raw).map(DynamicImage::ImageRgb8),
            4 => image::RgbaImage::from_raw(w, h, raw).map(DynamicImage::ImageRgba8),
            other => {
                return Err(GantryError::Decode(format!(
                    "cannot encode {other}-channel tensor as PNG"
                )))
            }
        }
        .ok_or_else(|| GantryError::Internal("tensor buffer size mismatch".to_string()))?;

        let mut bytes = Vec::new();
        encodable.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)?;
        Ok(bytes)
    }
}

/// Target dimensions under the resize policy, or `None` when the image
/// already satisfies the bounds.
pub fn bounded_size(width: u32, height: u32, min_dim: u32, max_dim: u32) -> Option<(u32, u32)> {
    let larger = width.max(height);
    let smaller = width.min(height);

    let scale = if larger > max_dim {
        max_dim as f32 / larger as f32
    } else if smaller < min_dim {
        min_dim as f32 / smaller as f32
    } else {
        return None;
    };

    let new_w = ((width as f32 * scale).round() as u32).max(1);
    let new_h = ((height as f32 * scale).round() as u32).max(1);
    if (new_w, new_h) == (width, height) {
        None
    } else {
        Some((new_w, new_h))
    }
}
