use std::f32::consts::TAU;

use glam::Vec2;

/// GLSL `mod`: result has the sign of `y`.
#[inline]
pub fn glsl_mod(x: f32, y: f32) -> f32 {
    x - y * (x / y).floor()
}

/// `|((v + 1) mod 2) - 1|` per component: reflect into [0, 1] with no hard tile edge.
#[inline]
pub fn tile_mirror(v: Vec2) -> Vec2 {
    Vec2::new(
        (glsl_mod(v.x + 1.0, 2.0) - 1.0).abs(),
        (glsl_mod(v.y + 1.0, 2.0) - 1.0).abs(),
    )
}

#[inline]
pub fn is_even_axis(axis_count: f32) -> bool {
    glsl_mod(axis_count, 2.0) < 0.1
}

/// Fold `uv` into a single angular slice of width `2π / axis_count`.
///
/// Even counts also mirror inside the slice. One axis is the identity.
pub fn axis_fold(uv: Vec2, axis_count: f32) -> Vec2 {
    if axis_count <= 1.1 {
        return uv;
    }
    let r = uv.length();
    let slice = TAU / axis_count;
    let mut a = glsl_mod(uv.y.atan2(uv.x), slice);
    if is_even_axis(axis_count) {
        a = (a - slice * 0.5).abs();
    }
    Vec2::new(a.cos(), a.sin()) * r
}
