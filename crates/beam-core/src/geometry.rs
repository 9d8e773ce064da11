use serde::{Deserialize, Serialize};

pub const MIN_AXIS: u32 = 1;
pub const MAX_AXIS: u32 = 16;

/// Discrete symmetry state. Never interpolated; presets apply it directly.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    pub axis_count: u32,
    pub flip_x: f32,
    pub flip_y: f32,
    pub rot180: bool,
    /// When set, presets leave `axis_count` alone.
    pub axis_locked: bool,
}

impl Default for Geometry {
    fn default() -> Self {
        Self {
            axis_count: 2,
            flip_x: 1.0,
            flip_y: -1.0,
            rot180: false,
            axis_locked: true,
        }
    }
}

impl Geometry {
    pub fn set_axis_count(&mut self, n: u32) {
        self.axis_count = n.clamp(MIN_AXIS, MAX_AXIS);
    }

    /// Restore defaults except the lock, which is a user preference.
    pub fn reset(&mut self) {
        *self = Geometry {
            axis_locked: self.axis_locked,
            ..Geometry::default()
        };
    }

    /// Flip vector as the transform consumes it; rot180 negates both axes.
    pub fn effective_flip(&self) -> (f32, f32) {
        if self.rot180 {
            (-self.flip_x, -self.flip_y)
        } else {
            (self.flip_x, self.flip_y)
        }
    }
}

/// Collapse any value to ±1. Zero and NaN become +1.
pub fn sanitize_flip(v: f32) -> f32 {
    if v < 0.0 {
        -1.0
    } else {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn axis_is_clamped() {
        let mut g = Geometry::default();
        g.set_axis_count(0);
        assert_eq!(g.axis_count, 1);
        g.set_axis_count(40);
        assert_eq!(g.axis_count, MAX_AXIS);
    }

    #[test]
    fn rot180_negates_flip() {
        let mut g = Geometry::default();
        assert_eq!(g.effective_flip(), (1.0, -1.0));
        g.rot180 = true;
        assert_eq!(g.effective_flip(), (-1.0, 1.0));
    }

    #[test]
    fn reset_keeps_lock() {
        let mut g = Geometry { axis_count: 7, axis_locked: false, rot180: true, ..Geometry::default() };
        g.reset();
        assert_eq!(g.axis_count, 2);
        assert!(!g.rot180);
        assert!(!g.axis_locked);
    }

    #[test]
    fn sanitize_flip_is_sign() {
        assert_eq!(sanitize_flip(-0.3), -1.0);
        assert_eq!(sanitize_flip(0.0), 1.0);
        assert_eq!(sanitize_flip(f32::NAN), 1.0);
    }
}
