//! Host-side copy of a resolved frame.

use image::Rgba32FImage;

/// Resolved frame, RGBA f32, `width * height` pixels row by row.
#[derive(Debug, Clone, PartialEq)]
pub struct Framebuffer {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<[f32; 4]>,
}

impl Framebuffer {
    /// Transparent black frame.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![[0.0; 4]; width as usize * height as usize],
        }
    }

    /// Flat `width * height * 4` float view.
    pub fn as_floats(&self) -> &[f32] {
        bytemuck::cast_slice(&self.pixels)
    }

    pub fn to_image(&self) -> Option<Rgba32FImage> {
        Rgba32FImage::from_raw(self.width, self.height, self.as_floats().to_vec())
    }
}
