use serde::{Deserialize, Serialize};

use crate::param::{ParamId, ParameterSet};

/// Unbounded rotation in degrees. Only ever integrated, never wrapped.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RotationAccumulator {
    pub degrees: f64,
}

impl RotationAccumulator {
    pub fn new(degrees: f64) -> Self {
        Self { degrees }
    }

    /// Nearest multiple of 360 degrees; the crossfade target that keeps the
    /// visual rotation path under half a turn.
    pub fn nearest_turn(&self) -> f64 {
        (self.degrees / 360.0).round() * 360.0
    }

    pub fn advance(&mut self, delta: f64) {
        self.degrees += delta;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    /// Degrees per second at full rotation deflection.
    pub rotation_gain: f64,
    /// Rotation control maps linearly onto `[-range, range]` before cubing.
    pub rotation_range: f32,
    pub flight_gain: f32,
    pub flight_exponent: f32,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            rotation_gain: 120.0,
            rotation_range: 1.5,
            flight_gain: 0.6,
            flight_exponent: 2.2,
        }
    }
}

/// Continuously integrated motion that parameters drive but do not own.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MotionState {
    pub master_rotation: RotationAccumulator,
    pub camera_rotation: RotationAccumulator,
    /// Tunnel scroll offset.
    pub scroll: f32,
}

/// Signed speed for a normalized speed control centred on 0.5.
pub fn flight_speed(normalized: f32, cfg: &MotionConfig) -> f32 {
    let s = normalized - 0.5;
    if s == 0.0 {
        return 0.0;
    }
    s.signum() * (2.0 * s).abs().powf(cfg.flight_exponent)
}

/// Degrees per second for a normalized rotation control centred on 0.5.
pub fn rotation_speed(normalized: f32, cfg: &MotionConfig) -> f64 {
    let r = cfg.rotation_range;
    let mapped = (-r + normalized * 2.0 * r) as f64;
    mapped.powi(3) * cfg.rotation_gain
}

impl MotionState {
    /// Integrate one tick from the unmodulated control bases.
    pub fn integrate(&mut self, params: &ParameterSet, dt: f32, cfg: &MotionConfig) {
        let dt = dt.max(0.0);
        self.scroll += flight_speed(params.normalized(ParamId::FlightSpeed), cfg) * dt * cfg.flight_gain;
        self.master_rotation
            .advance(rotation_speed(params.normalized(ParamId::MasterRotation), cfg) * dt as f64);
        self.camera_rotation
            .advance(rotation_speed(params.normalized(ParamId::CameraRotation), cfg) * dt as f64);
    }

    pub fn reset(&mut self) {
        *self = MotionState::default();
    }
}
