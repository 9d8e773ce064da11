use std::num::NonZeroU32;

use glow::HasContext;

use crate::error::{RenderError, RenderResult};
use crate::renderer::flip_rows;

/// The fixed-size offscreen color buffer every surface is blitted from.
///
/// RGBA8, so the encoder and still capture can read it back directly.
pub struct OffscreenTarget {
    framebuffer: glow::Framebuffer,
    color: glow::Texture,
    width: u32,
    height: u32,
}

/// Linear-filtered, edge-clamped RGBA8 texture with undefined contents.
unsafe fn color_texture(gl: &glow::Context, width: u32, height: u32) -> RenderResult<glow::Texture> {
    let tex = gl.create_texture().map_err(RenderError::Gl)?;
    gl.bind_texture(glow::TEXTURE_2D, Some(tex));
    gl.tex_image_2d(
        glow::TEXTURE_2D,
        0,
        glow::RGBA8 as i32,
        width as i32,
        height as i32,
        0,
        glow::RGBA,
        glow::UNSIGNED_BYTE,
        glow::PixelUnpackData::Slice(None),
    );
    for (pname, value) in [
        (glow::TEXTURE_MIN_FILTER, glow::LINEAR),
        (glow::TEXTURE_MAG_FILTER, glow::LINEAR),
        (glow::TEXTURE_WRAP_S, glow::CLAMP_TO_EDGE),
        (glow::TEXTURE_WRAP_T, glow::CLAMP_TO_EDGE),
    ] {
        gl.tex_parameter_i32(glow::TEXTURE_2D, pname, value as i32);
    }
    gl.bind_texture(glow::TEXTURE_2D, None);
    Ok(tex)
}

impl OffscreenTarget {
    pub fn new(gl: &glow::Context, width: u32, height: u32) -> RenderResult<Self> {
        if width == 0 || height == 0 {
            return Err(RenderError::gl(format!("offscreen target cannot be {width}x{height}")));
        }
        unsafe {
            let color = color_texture(gl, width, height)?;
            let framebuffer = gl.create_framebuffer().map_err(|e| {
                gl.delete_texture(color);
                RenderError::Gl(e)
            })?;
            let target = Self { framebuffer, color, width, height };

            gl.bind_framebuffer(glow::FRAMEBUFFER, Some(framebuffer));
            gl.framebuffer_texture_2d(glow::FRAMEBUFFER, glow::COLOR_ATTACHMENT0, glow::TEXTURE_2D, Some(color), 0);
            let status = gl.check_framebuffer_status(glow::FRAMEBUFFER);
            gl.bind_framebuffer(glow::FRAMEBUFFER, None);

            if status != glow::FRAMEBUFFER_COMPLETE {
                target.destroy(gl);
                return Err(RenderError::gl(format!("offscreen framebuffer incomplete (0x{status:X})")));
            }
            Ok(target)
        }
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn texture(&self) -> glow::Texture {
        self.color
    }

    /// Direct draws into the target, covering all of it.
    pub fn bind(&self, gl: &glow::Context) {
        unsafe {
            gl.bind_framebuffer(glow::FRAMEBUFFER, Some(self.framebuffer));
            gl.viewport(0, 0, self.width as i32, self.height as i32);
        }
    }

    /// Read the whole target as RGBA8 with a top-left origin. The
    /// framebuffer binding is left as it was found.
    pub fn read_rgba(&self, gl: &glow::Context) -> Vec<u8> {
        let mut pixels = vec![0u8; (self.width * self.height * 4) as usize];
        unsafe {
            let previous = NonZeroU32::new(gl.get_parameter_i32(glow::FRAMEBUFFER_BINDING) as u32)
                .map(glow::NativeFramebuffer);
            gl.bind_framebuffer(glow::FRAMEBUFFER, Some(self.framebuffer));
            gl.pixel_store_i32(glow::PACK_ALIGNMENT, 1);
            gl.read_pixels(
                0,
                0,
                self.width as i32,
                self.height as i32,
                glow::RGBA,
                glow::UNSIGNED_BYTE,
                glow::PixelPackData::Slice(Some(&mut pixels)),
            );
            gl.bind_framebuffer(glow::FRAMEBUFFER, previous);
        }
        flip_rows(&pixels, self.width, self.height)
    }

    pub fn destroy(&self, gl: &glow::Context) {
        unsafe {
            gl.delete_framebuffer(self.framebuffer);
            gl.delete_texture(self.color);
        }
    }
}
