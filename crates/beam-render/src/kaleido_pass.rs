use beam_transform::TransformUniforms;
use glow::HasContext;

use crate::error::RenderResult;
use crate::program::{compile_fullscreen_program, uniform};
use crate::cover::CoverTriangle;
use crate::shaders;

struct KaleidoLocations {
    source: glow::UniformLocation,
    axis: glow::UniformLocation,
    aspect: glow::UniformLocation,
    master_angle: glow::UniformLocation,
    master_zoom: glow::UniformLocation,
    master_translate: glow::UniformLocation,
    master_tilt: glow::UniformLocation,
    master_rgb: glow::UniformLocation,
    mode: glow::UniformLocation,
    scroll: glow::UniformLocation,
    room_shape: glow::UniformLocation,
    fov: glow::UniformLocation,
    curve: glow::UniformLocation,
    twist: glow::UniformLocation,
    flux: glow::UniformLocation,
    camera_angle: glow::UniformLocation,
    camera_zoom: glow::UniformLocation,
    camera_translate: glow::UniformLocation,
    camera_tilt: glow::UniformLocation,
    flip: glow::UniformLocation,
    warp: glow::UniformLocation,
    sensor_rgb: glow::UniformLocation,
    negative: glow::UniformLocation,
    hue: glow::UniformLocation,
    contrast: glow::UniformLocation,
    saturation: glow::UniformLocation,
    bloom: glow::UniformLocation,
}

impl KaleidoLocations {
    fn locate(gl: &glow::Context, program: glow::Program) -> RenderResult<Self> {
        let loc = |name: &str| uniform(gl, program, name);
        Ok(Self {
            source: loc("u_source")?,
            axis: loc("u_axis")?,
            aspect: loc("u_aspect")?,
            master_angle: loc("u_master_angle")?,
            master_zoom: loc("u_master_zoom")?,
            master_translate: loc("u_master_translate")?,
            master_tilt: loc("u_master_tilt")?,
            master_rgb: loc("u_master_rgb")?,
            mode: loc("u_mode")?,
            scroll: loc("u_scroll")?,
            room_shape: loc("u_room_shape")?,
            fov: loc("u_fov")?,
            curve: loc("u_curve")?,
            twist: loc("u_twist")?,
            flux: loc("u_flux")?,
            camera_angle: loc("u_camera_angle")?,
            camera_zoom: loc("u_camera_zoom")?,
            camera_translate: loc("u_camera_translate")?,
            camera_tilt: loc("u_camera_tilt")?,
            flip: loc("u_flip")?,
            warp: loc("u_warp")?,
            sensor_rgb: loc("u_sensor_rgb")?,
            negative: loc("u_negative")?,
            hue: loc("u_hue")?,
            contrast: loc("u_contrast")?,
            saturation: loc("u_saturation")?,
            bloom: loc("u_bloom")?,
        })
    }
}

/// Runs the kaleidoscope fragment shader over the bound target.
pub struct KaleidoPass {
    program: glow::Program,
    loc: KaleidoLocations,
}

impl KaleidoPass {
    pub fn new(gl: &glow::Context) -> RenderResult<Self> {
        let program = compile_fullscreen_program(gl, shaders::KALEIDO_FRAGMENT)?;
        match KaleidoLocations::locate(gl, program) {
            Ok(loc) => Ok(Self { program, loc }),
            Err(e) => {
                unsafe { gl.delete_program(program) };
                Err(e)
            }
        }
    }

    /// Draw the transform of `source` into the currently bound framebuffer.
    pub fn render(&self, gl: &glow::Context, source: glow::Texture, u: &TransformUniforms, cover: &CoverTriangle) {
        let l = &self.loc;
        unsafe {
            gl.use_program(Some(self.program));
            gl.disable(glow::BLEND);

            gl.active_texture(glow::TEXTURE0);
            gl.bind_texture(glow::TEXTURE_2D, Some(source));
            gl.uniform_1_i32(Some(&l.source), 0);

            gl.uniform_1_f32(Some(&l.axis), u.axis_count);
            gl.uniform_1_f32(Some(&l.aspect), u.aspect);

            gl.uniform_1_f32(Some(&l.master_angle), u.master_angle_deg);
            gl.uniform_1_f32(Some(&l.master_zoom), u.master_zoom);
            gl.uniform_2_f32(Some(&l.master_translate), u.master_translate.x, u.master_translate.y);
            gl.uniform_2_f32(Some(&l.master_tilt), u.master_tilt.x, u.master_tilt.y);
            gl.uniform_1_f32(Some(&l.master_rgb), u.master_rgb);

            gl.uniform_1_f32(Some(&l.mode), u.mode);
            gl.uniform_1_f32(Some(&l.scroll), u.scroll);
            gl.uniform_1_f32(Some(&l.room_shape), u.room_shape);
            gl.uniform_1_f32(Some(&l.fov), u.fov);
            gl.uniform_1_f32(Some(&l.curve), u.curve);
            gl.uniform_1_f32(Some(&l.twist), u.twist);
            gl.uniform_1_f32(Some(&l.flux), u.flux);

            gl.uniform_1_f32(Some(&l.camera_angle), u.camera_angle_deg);
            gl.uniform_1_f32(Some(&l.camera_zoom), u.camera_zoom);
            gl.uniform_2_f32(Some(&l.camera_translate), u.camera_translate.x, u.camera_translate.y);
            gl.uniform_2_f32(Some(&l.camera_tilt), u.camera_tilt.x, u.camera_tilt.y);
            gl.uniform_2_f32(Some(&l.flip), u.flip.x, u.flip.y);
            gl.uniform_1_f32(Some(&l.warp), u.warp);
            gl.uniform_1_f32(Some(&l.sensor_rgb), u.sensor_rgb);

            gl.uniform_1_f32(Some(&l.negative), u.grade.negative);
            gl.uniform_1_f32(Some(&l.hue), u.grade.hue);
            gl.uniform_1_f32(Some(&l.contrast), u.grade.contrast);
            gl.uniform_1_f32(Some(&l.saturation), u.grade.saturation);
            gl.uniform_1_f32(Some(&l.bloom), u.grade.bloom);

            cover.draw(gl);

            gl.use_program(None);
        }
    }

    pub fn destroy(&self, gl: &glow::Context) {
        unsafe { gl.delete_program(self.program) };
    }
}

/// Stretched texture copy of a finished frame into whatever is bound.
pub struct BlitPass {
    program: glow::Program,
    loc_texture: glow::UniformLocation,
}

impl BlitPass {
    pub fn new(gl: &glow::Context) -> RenderResult<Self> {
        let program = compile_fullscreen_program(gl, shaders::BLIT_FRAGMENT)?;
        match uniform(gl, program, "u_texture") {
            Ok(loc_texture) => Ok(Self { program, loc_texture }),
            Err(e) => {
                unsafe { gl.delete_program(program) };
                Err(e)
            }
        }
    }

    pub fn render(&self, gl: &glow::Context, texture: glow::Texture, cover: &CoverTriangle) {
        unsafe {
            gl.use_program(Some(self.program));
            gl.disable(glow::BLEND);
            gl.active_texture(glow::TEXTURE0);
            gl.bind_texture(glow::TEXTURE_2D, Some(texture));
            gl.uniform_1_i32(Some(&self.loc_texture), 0);
            cover.draw(gl);
            gl.use_program(None);
        }
    }

    pub fn destroy(&self, gl: &glow::Context) {
        unsafe { gl.delete_program(self.program) };
    }
}
