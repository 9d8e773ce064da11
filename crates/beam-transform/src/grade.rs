use std::f32::consts::TAU;

use glam::Vec3;

const LUMA: Vec3 = Vec3::new(0.299, 0.587, 0.114);
/// Unit grey axis, the rotation axis for hue shifts.
const GREY: Vec3 = Vec3::splat(0.577_35);

pub const BLOOM_THRESHOLD: f32 = 0.4;

#[inline]
pub fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

#[inline]
pub fn luma(c: Vec3) -> f32 {
    c.dot(LUMA)
}

/// Rodrigues rotation of the RGB vector about the grey axis by `angle` radians.
pub fn hue_shift(c: Vec3, angle: f32) -> Vec3 {
    let (s, co) = angle.sin_cos();
    c * co + GREY.cross(c) * s + GREY * GREY.dot(c) * (1.0 - co)
}

/// Grading inputs, all already mapped to their working ranges.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Grade {
    /// Solarize amount; 1 fully inverts.
    pub negative: f32,
    /// Hue rotation in turns.
    pub hue: f32,
    pub contrast: f32,
    pub saturation: f32,
    pub bloom: f32,
}

impl Default for Grade {
    fn default() -> Self {
        Self {
            negative: 0.0,
            hue: 0.0,
            contrast: 1.0,
            saturation: 1.0,
            bloom: 0.0,
        }
    }
}

impl Grade {
    /// Solarize, hue, contrast, saturation, bloom; in that order.
    pub fn apply(&self, color: Vec3) -> Vec3 {
        let mut c = (color - Vec3::splat(self.negative)).abs();
        if self.hue > 0.01 {
            c = hue_shift(c, self.hue * TAU);
        }
        c = (c - 0.5) * self.contrast + 0.5;
        let l = luma(c);
        c = Vec3::splat(l).lerp(c, self.saturation);
        if self.bloom > 0.01 {
            c += smoothstep(BLOOM_THRESHOLD, 1.0, l) * c * self.bloom * 2.0;
        }
        c
    }
}
