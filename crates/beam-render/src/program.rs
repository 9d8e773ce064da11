use glow::HasContext;

use crate::error::{RenderError, RenderResult};
use crate::shaders;

unsafe fn compile_stage(gl: &glow::Context, stage: u32, src: &str, label: &str) -> RenderResult<glow::Shader> {
    let shader = gl.create_shader(stage).map_err(RenderError::Gl)?;
    gl.shader_source(shader, src);
    gl.compile_shader(shader);
    if !gl.get_shader_compile_status(shader) {
        let log = gl.get_shader_info_log(shader);
        gl.delete_shader(shader);
        return Err(RenderError::gl(format!("{label} shader failed:\n{log}")));
    }
    Ok(shader)
}

/// Compile `frag_src` against the shared fullscreen vertex shader.
pub fn compile_fullscreen_program(gl: &glow::Context, frag_src: &str) -> RenderResult<glow::Program> {
    unsafe {
        let program = gl.create_program().map_err(RenderError::Gl)?;

        let vert = compile_stage(gl, glow::VERTEX_SHADER, shaders::FULLSCREEN_VERTEX, "Vertex").map_err(|e| {
            gl.delete_program(program);
            e
        })?;
        let frag = match compile_stage(gl, glow::FRAGMENT_SHADER, frag_src, "Fragment") {
            Ok(f) => f,
            Err(e) => {
                gl.delete_shader(vert);
                gl.delete_program(program);
                return Err(e);
            }
        };

        gl.attach_shader(program, vert);
        gl.attach_shader(program, frag);
        gl.link_program(program);
        let linked = gl.get_program_link_status(program);

        gl.delete_shader(vert);
        gl.delete_shader(frag);

        if !linked {
            let log = gl.get_program_info_log(program);
            gl.delete_program(program);
            return Err(RenderError::gl(format!("Program linking failed:\n{log}")));
        }
        Ok(program)
    }
}

/// Look up a uniform the program is known to declare.
pub fn uniform(gl: &glow::Context, program: glow::Program, name: &str) -> RenderResult<glow::UniformLocation> {
    unsafe { gl.get_uniform_location(program, name) }
        .ok_or_else(|| RenderError::gl(format!("uniform {name} not found")))
}
