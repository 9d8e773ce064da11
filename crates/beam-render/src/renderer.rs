use std::num::NonZeroU32;

use beam_transform::TransformUniforms;
use glow::HasContext;

use crate::cover::CoverTriangle;
use crate::error::RenderResult;
use crate::kaleido_pass::{BlitPass, KaleidoPass};
use crate::target::OffscreenTarget;

/// GL bindings the offscreen pass disturbs, restored afterwards so the
/// host's default framebuffer setup survives.
/// Capabilities the offscreen pass switches off; saved and restored around it.
const OFFSCREEN_DISABLED: [u32; 2] = [glow::SCISSOR_TEST, glow::BLEND];

struct SavedGlState {
    capabilities: [bool; OFFSCREEN_DISABLED.len()],
    framebuffer: Option<glow::Framebuffer>,
    viewport: [i32; 4],
    program: Option<glow::Program>,
    vao: Option<glow::VertexArray>,
    active_texture: i32,
    texture: Option<glow::Texture>,
}

impl SavedGlState {
    unsafe fn save(gl: &glow::Context) -> Self {
        let id = |pname: u32| NonZeroU32::new(gl.get_parameter_i32(pname) as u32);

        let mut viewport = [0i32; 4];
        gl.get_parameter_i32_slice(glow::VIEWPORT, &mut viewport);

        let active_texture = gl.get_parameter_i32(glow::ACTIVE_TEXTURE);
        gl.active_texture(glow::TEXTURE0);
        let texture = id(glow::TEXTURE_BINDING_2D).map(glow::NativeTexture);
        gl.active_texture(active_texture as u32);

        Self {
            capabilities: OFFSCREEN_DISABLED.map(|cap| gl.is_enabled(cap)),
            framebuffer: id(glow::FRAMEBUFFER_BINDING).map(glow::NativeFramebuffer),
            viewport,
            program: id(glow::CURRENT_PROGRAM).map(glow::NativeProgram),
            vao: id(glow::VERTEX_ARRAY_BINDING).map(glow::NativeVertexArray),
            active_texture,
            texture,
        }
    }

    unsafe fn restore(&self, gl: &glow::Context) {
        gl.bind_framebuffer(glow::FRAMEBUFFER, self.framebuffer);
        gl.viewport(self.viewport[0], self.viewport[1], self.viewport[2], self.viewport[3]);
        gl.use_program(self.program);
        gl.bind_vertex_array(self.vao);
        gl.active_texture(glow::TEXTURE0);
        gl.bind_texture(glow::TEXTURE_2D, self.texture);
        gl.active_texture(self.active_texture as u32);
        for (cap, enabled) in OFFSCREEN_DISABLED.into_iter().zip(self.capabilities) {
            if enabled {
                gl.enable(cap);
            } else {
                gl.disable(cap);
            }
        }
    }
}

/// Offscreen kaleidoscope target plus the passes that fill and copy it.
///
/// The target has a fixed size chosen at construction and is independent
/// of every output surface.
pub struct KaleidoRenderer {
    target: OffscreenTarget,
    kaleido: KaleidoPass,
    blit: BlitPass,
    cover: CoverTriangle,
}

impl KaleidoRenderer {
    /// Must be called with the render thread's context current.
    pub fn new(gl: &glow::Context, width: u32, height: u32) -> RenderResult<Self> {
        let target = OffscreenTarget::new(gl, width, height)?;
        let cover = CoverTriangle::new(gl)?;
        let kaleido = KaleidoPass::new(gl)?;
        let blit = BlitPass::new(gl)?;
        log::info!("Offscreen target {width}x{height} ready");
        Ok(Self { target, kaleido, blit, cover })
    }

    pub fn size(&self) -> (u32, u32) {
        self.target.size()
    }

    pub fn texture(&self) -> glow::Texture {
        self.target.texture()
    }

    /// Render one frame of the transform into the offscreen target.
    pub fn render_offscreen(&self, gl: &glow::Context, source: glow::Texture, u: &TransformUniforms) {
        unsafe {
            let saved = SavedGlState::save(gl);
            for cap in OFFSCREEN_DISABLED {
                gl.disable(cap);
            }
            self.target.bind(gl);
            gl.clear_color(0.0, 0.0, 0.0, 1.0);
            gl.clear(glow::COLOR_BUFFER_BIT);
            self.kaleido.render(gl, source, u, &self.cover);
            saved.restore(gl);
        }
    }

    /// Copy the offscreen target into the default framebuffer of whatever
    /// surface is current, stretched over `width`×`height`.
    pub fn blit_to(&self, gl: &glow::Context, width: u32, height: u32) {
        unsafe {
            gl.bind_framebuffer(glow::FRAMEBUFFER, None);
            gl.viewport(0, 0, width as i32, height as i32);
            gl.clear_color(0.0, 0.0, 0.0, 1.0);
            gl.clear(glow::COLOR_BUFFER_BIT);
        }
        self.blit.render(gl, self.target.texture(), &self.cover);
    }

    /// Read the offscreen target back as RGBA8, flipped to a top-left origin.
    pub fn capture_frame(&self, gl: &glow::Context) -> Vec<u8> {
        self.target.read_rgba(gl)
    }

    pub fn destroy(&self, gl: &glow::Context) {
        self.target.destroy(gl);
        self.kaleido.destroy(gl);
        self.blit.destroy(gl);
        self.cover.destroy(gl);
    }
}

/// Reverse row order of a tightly packed RGBA8 buffer (GL origin is bottom-left).
pub fn flip_rows(pixels: &[u8], width: u32, height: u32) -> Vec<u8> {
    let row_bytes = (width * 4) as usize;
    let mut flipped = vec![0u8; pixels.len()];
    for y in 0..height as usize {
        let src_row = y * row_bytes;
        let dst_row = (height as usize - 1 - y) * row_bytes;
        flipped[dst_row..dst_row + row_bytes].copy_from_slice(&pixels[src_row..src_row + row_bytes]);
    }
    flipped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flip_rows_reverses_rows_only() {
        let px: Vec<u8> = (0..16).collect();
        let flipped = flip_rows(&px, 2, 2);
        assert_eq!(&flipped[0..8], &px[8..16]);
        assert_eq!(&flipped[8..16], &px[0..8]);
        assert_eq!(flip_rows(&flipped, 2, 2), px);
    }

    #[test]
    fn offscreen_pass_restores_the_host_scissor() {
        assert!(OFFSCREEN_DISABLED.contains(&glow::SCISSOR_TEST));
        assert!(OFFSCREEN_DISABLED.contains(&glow::BLEND));
    }
}
