use std::sync::Arc;

use beam_transform::{render_frame, ImageSampler, Sampler, TransformUniforms};
use glow::HasContext;
use image::RgbaImage;

use crate::error::{RenderError, RenderResult};
use crate::renderer::KaleidoRenderer;

/// Renders the transform once per tick and copies it out on demand.
///
/// `render` fills the offscreen target; `blit` copies it into whatever
/// surface the multiplexer made current; `read_pixels` returns it as
/// top-left-origin RGBA8.
pub trait FrameRenderer {
    fn size(&self) -> (u32, u32);
    fn render(&mut self, uniforms: &TransformUniforms) -> RenderResult<()>;
    fn blit(&mut self, width: u32, height: u32) -> RenderResult<()>;
    fn read_pixels(&mut self) -> RenderResult<Vec<u8>>;
}

/// The live video texture the transform samples.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceTexture {
    pub texture: glow::Texture,
    pub width: u32,
    pub height: u32,
}

/// GPU implementation. Owns the render thread's context handle.
pub struct GlFrameRenderer {
    gl: Arc<glow::Context>,
    renderer: KaleidoRenderer,
    source: Option<SourceTexture>,
}

impl GlFrameRenderer {
    pub fn new(gl: Arc<glow::Context>, width: u32, height: u32) -> RenderResult<Self> {
        let renderer = KaleidoRenderer::new(&gl, width, height)?;
        Ok(Self { gl, renderer, source: None })
    }

    /// Attach the producer's texture. May be called every frame.
    pub fn set_source(&mut self, source: SourceTexture) {
        self.source = Some(source);
    }

    pub fn gl(&self) -> &glow::Context {
        &self.gl
    }
}

impl FrameRenderer for GlFrameRenderer {
    fn size(&self) -> (u32, u32) {
        self.renderer.size()
    }

    fn render(&mut self, uniforms: &TransformUniforms) -> RenderResult<()> {
        let source = self.source.ok_or(RenderError::NoSource)?;
        self.renderer.render_offscreen(&self.gl, source.texture, uniforms);
        Ok(())
    }

    fn blit(&mut self, width: u32, height: u32) -> RenderResult<()> {
        self.renderer.blit_to(&self.gl, width, height);
        let err = unsafe { self.gl.get_error() };
        if err != glow::NO_ERROR {
            return Err(RenderError::gl(format!("blit failed: 0x{err:X}")));
        }
        Ok(())
    }

    fn read_pixels(&mut self) -> RenderResult<Vec<u8>> {
        Ok(self.renderer.capture_frame(&self.gl))
    }
}

impl Drop for GlFrameRenderer {
    fn drop(&mut self) {
        self.renderer.destroy(&self.gl);
    }
}

/// CPU reference implementation over any [`Sampler`]. Used headless and in tests.
pub struct CpuFrameRenderer<S: Sampler = ImageSampler> {
    source: S,
    frame: RgbaImage,
    blits: Vec<(u32, u32)>,
}

impl<S: Sampler> CpuFrameRenderer<S> {
    pub fn new(source: S, width: u32, height: u32) -> Self {
        Self {
            source,
            frame: RgbaImage::new(width, height),
            blits: Vec::new(),
        }
    }

    pub fn set_source(&mut self, source: S) {
        self.source = source;
    }

    pub fn frame(&self) -> &RgbaImage {
        &self.frame
    }

    /// Sizes of every blit since the last call.
    pub fn take_blits(&mut self) -> Vec<(u32, u32)> {
        std::mem::take(&mut self.blits)
    }
}

impl<S: Sampler> FrameRenderer for CpuFrameRenderer<S> {
    fn size(&self) -> (u32, u32) {
        self.frame.dimensions()
    }

    fn render(&mut self, uniforms: &TransformUniforms) -> RenderResult<()> {
        let (w, h) = self.frame.dimensions();
        self.frame = render_frame(&self.source, uniforms, w, h);
        Ok(())
    }

    fn blit(&mut self, width: u32, height: u32) -> RenderResult<()> {
        self.blits.push((width, height));
        Ok(())
    }

    fn read_pixels(&mut self) -> RenderResult<Vec<u8>> {
        Ok(self.frame.as_raw().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Vec2, Vec3};

    #[test]
    fn cpu_renderer_fills_its_frame() {
        let src = |_: Vec2| Vec3::new(1.0, 0.0, 0.0);
        let mut r = CpuFrameRenderer::new(src, 6, 4);
        r.render(&TransformUniforms::default()).unwrap();
        let px = r.read_pixels().unwrap();
        assert_eq!(px.len(), 6 * 4 * 4);
        assert_eq!(&px[0..4], &[255, 0, 0, 255]);
    }

    #[test]
    fn cpu_renderer_records_blits() {
        let mut r = CpuFrameRenderer::new(|_: Vec2| Vec3::ZERO, 2, 2);
        r.blit(1920, 1080).unwrap();
        r.blit(640, 480).unwrap();
        assert_eq!(r.take_blits(), vec![(1920, 1080), (640, 480)]);
        assert!(r.take_blits().is_empty());
    }
}
