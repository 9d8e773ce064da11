use glow::HasContext;

use crate::error::{RenderError, RenderResult};

/// One oversized triangle that covers clip space. The vertex shader builds
/// its corners from `gl_VertexID`, so the vertex array holds no buffers;
/// core profiles still require one to be bound for the draw.
pub struct CoverTriangle {
    vao: glow::VertexArray,
}

impl CoverTriangle {
    pub fn new(gl: &glow::Context) -> RenderResult<Self> {
        let vao = unsafe { gl.create_vertex_array() }.map_err(RenderError::Gl)?;
        Ok(Self { vao })
    }

    /// Rasterize every pixel of the current viewport once.
    pub fn draw(&self, gl: &glow::Context) {
        unsafe {
            gl.bind_vertex_array(Some(self.vao));
            gl.draw_arrays(glow::TRIANGLES, 0, 3);
            gl.bind_vertex_array(None);
        }
    }

    pub fn destroy(&self, gl: &glow::Context) {
        unsafe { gl.delete_vertex_array(self.vao) };
    }
}

#[cfg(test)]
mod tests {
    use crate::shaders::FULLSCREEN_VERTEX;

    /// CPU copy of the corner formula in the vertex shader.
    fn corner(id: i32) -> (f32, f32) {
        (((id & 1) << 2) as f32 - 1.0, ((id & 2) << 1) as f32 - 1.0)
    }

    #[test]
    fn corners_enclose_clip_space() {
        let corners: Vec<_> = (0..3).map(corner).collect();
        assert_eq!(corners, vec![(-1.0, -1.0), (3.0, -1.0), (-1.0, 3.0)]);
        // (1, 1) sits on the hypotenuse x + y = 2.
        for (x, y) in [(-1.0f32, -1.0f32), (1.0, -1.0), (-1.0, 1.0), (1.0, 1.0)] {
            assert!(x >= -1.0 && y >= -1.0 && x + y <= 2.0);
        }
    }

    #[test]
    fn vertex_shader_needs_no_attributes() {
        assert!(FULLSCREEN_VERTEX.contains("gl_VertexID"));
        assert!(!FULLSCREEN_VERTEX.contains("layout(location"));
    }
}
