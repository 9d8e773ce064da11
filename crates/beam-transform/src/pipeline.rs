use std::f32::consts::PI;

use glam::{Vec2, Vec3};

use crate::fold::{axis_fold, tile_mirror};
use crate::grade::smoothstep;
use crate::uniforms::TransformUniforms;

/// Source texture lookup. `uv` is in [0, 1] with the origin bottom-left.
pub trait Sampler {
    fn sample(&self, uv: Vec2) -> Vec3;
}

impl<F: Fn(Vec2) -> Vec3> Sampler for F {
    fn sample(&self, uv: Vec2) -> Vec3 {
        self(uv)
    }
}

#[inline]
fn rotate(v: Vec2, radians: f32) -> Vec2 {
    let (s, c) = radians.sin_cos();
    Vec2::new(v.x * c - v.y * s, v.x * s + v.y * c)
}

/// Perspective divide that fakes a tilted plane.
#[inline]
pub fn tilt(v: Vec2, tilt: Vec2) -> Vec2 {
    let z = 1.0 + v.x * tilt.x + v.y * tilt.y;
    v / z.max(0.1)
}

/// Inner tier: map a tiled coordinate onto the source and sample it.
pub fn sample_camera(uv: Vec2, rgb_shift: f32, u: &TransformUniforms, src: &impl Sampler) -> Vec3 {
    let mut c = tilt(uv - 0.5, u.camera_tilt);
    c *= u.camera_zoom;
    let aspect = u.aspect + (1.0 - u.aspect) * u.warp;
    c.x *= aspect;
    c = rotate(c, u.camera_angle_deg.to_radians());
    c.x /= aspect;
    c += u.camera_translate;

    let mut st = c + 0.5;
    st.x += rgb_shift;
    st = (st - 0.5) * u.flip + 0.5;
    src.sample(tile_mirror(st))
}

/// Outer tier up to the tiled source coordinate for one colour channel.
pub fn master_coord(v: Vec2, channel_offset: f32, u: &TransformUniforms) -> Vec2 {
    let blend = smoothstep(0.0, 1.0, u.mode);
    let tilt_amt = u.master_tilt.lerp(Vec2::ZERO, blend);
    let translate = u.master_translate + Vec2::ZERO.lerp(u.master_tilt * 2.0, blend);

    let mut uv = tilt(v - 0.5, tilt_amt);
    uv.x *= u.aspect;
    uv.x += channel_offset;
    uv = (uv + translate) * u.master_zoom * 4.0;
    uv = rotate(uv, -u.master_angle_deg.to_radians());

    uv = axis_fold(uv, u.axis_count);

    let angle = uv.y.atan2(uv.x);
    let mut dist = uv.length() + (uv.x.abs().max(uv.y.abs()) - uv.length()) * u.room_shape;
    dist += (angle * 4.0 + dist * 10.0).sin() * u.flux * dist;
    let safe = dist.max(0.01);

    let projection = (u.fov * 0.8 + 0.2) / safe;
    let mut tunnel = Vec2::new((angle + (1.0 / safe) * u.twist) / PI, projection + u.scroll);
    if (u.curve - 1.0).abs() > 0.01 {
        tunnel *= 1.0 + (u.curve - 1.0) * (1.0 - safe);
    }

    let flat = Vec2::new(uv.x / u.aspect, uv.y);
    tile_mirror(flat.lerp(tunnel * 0.8, blend))
}

#[inline]
fn channel_offset(channel: usize, amount: f32) -> f32 {
    match channel {
        0 => amount,
        2 => -amount,
        _ => 0.0,
    }
}

/// Ungraded colour at screen coordinate `v` (bottom-left origin, [0, 1]).
///
/// Each channel walks the pipeline separately with its own horizontal
/// offsets, which is where the chromatic fringing comes from.
pub fn shade_ungraded(v: Vec2, u: &TransformUniforms, src: &impl Sampler) -> Vec3 {
    let mut out = Vec3::ZERO;
    for ch in 0..3 {
        let coord = master_coord(v, channel_offset(ch, u.master_rgb), u);
        let smp = sample_camera(coord, channel_offset(ch, u.sensor_rgb), u, src);
        out[ch] = smp[ch];
    }
    out
}

/// Final colour at screen coordinate `v`.
pub fn shade(v: Vec2, u: &TransformUniforms, src: &impl Sampler) -> Vec3 {
    u.grade.apply(shade_ungraded(v, u, src))
}
