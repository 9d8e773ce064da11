use glam::{Vec2, Vec3};
use image::{Rgba, RgbaImage};

use crate::pipeline::{shade, Sampler};
use crate::uniforms::TransformUniforms;

/// Bilinear lookup into an RGBA8 image, matching `GL_LINEAR` with
/// clamp-to-edge. `uv` origin is bottom-left like a GL texture.
#[derive(Debug, Clone)]
pub struct ImageSampler {
    image: RgbaImage,
}

impl ImageSampler {
    pub fn new(image: RgbaImage) -> Self {
        Self { image }
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    fn texel(&self, x: i64, y: i64) -> Vec3 {
        let w = self.image.width() as i64;
        let h = self.image.height() as i64;
        let x = x.clamp(0, w - 1) as u32;
        // Row 0 of the image is the top; texture row 0 is the bottom.
        let y = (h - 1 - y.clamp(0, h - 1)) as u32;
        let p = self.image.get_pixel(x, y);
        Vec3::new(p[0] as f32, p[1] as f32, p[2] as f32) / 255.0
    }
}

impl Sampler for ImageSampler {
    fn sample(&self, uv: Vec2) -> Vec3 {
        if self.image.width() == 0 || self.image.height() == 0 {
            return Vec3::ZERO;
        }
        let px = uv.x * self.image.width() as f32 - 0.5;
        let py = uv.y * self.image.height() as f32 - 0.5;
        let x0 = px.floor();
        let y0 = py.floor();
        let (fx, fy) = (px - x0, py - y0);
        let (x0, y0) = (x0 as i64, y0 as i64);

        let top = self.texel(x0, y0).lerp(self.texel(x0 + 1, y0), fx);
        let bottom = self.texel(x0, y0 + 1).lerp(self.texel(x0 + 1, y0 + 1), fx);
        top.lerp(bottom, fy)
    }
}

fn to_rgba(c: Vec3) -> Rgba<u8> {
    let c = (c.clamp(Vec3::ZERO, Vec3::ONE) * 255.0).round();
    Rgba([c.x as u8, c.y as u8, c.z as u8, 255])
}

/// Run the pipeline for every pixel of a `width`×`height` frame.
/// The returned image has its origin top-left.
pub fn render_frame(src: &impl Sampler, u: &TransformUniforms, width: u32, height: u32) -> RgbaImage {
    let mut out = RgbaImage::new(width, height);
    let (w, h) = (width.max(1) as f32, height.max(1) as f32);
    for (x, y, px) in out.enumerate_pixels_mut() {
        let v = Vec2::new((x as f32 + 0.5) / w, 1.0 - (y as f32 + 0.5) / h);
        *px = to_rgba(shade(v, u, src));
    }
    out
}
