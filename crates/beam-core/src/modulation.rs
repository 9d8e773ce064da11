use std::f64::consts::TAU;

use serde::{Deserialize, Serialize};

use crate::param::{ParamId, Parameter, ParameterSet, CONTROL_MAX, PARAM_COUNT};

/// How a modulated value re-enters [0, 1] once it leaves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WrapMode {
    /// Fractional part; 1.0 + e lands at e.
    Wrap,
    /// Triangle fold; 1.0 + e lands at 1.0 - e.
    #[default]
    Mirror,
}

impl WrapMode {
    pub fn apply(self, x: f64) -> f64 {
        match self {
            WrapMode::Wrap => wrap_unit(x),
            WrapMode::Mirror => mirror_unit(x),
        }
    }
}

/// Tuned constants of the oscillator. Presentation defaults, not protocol.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModulationConfig {
    /// Offset added to the normalized rate before cubing.
    pub rate_epsilon: f64,
    /// Drift phase speed relative to the primary rate.
    pub drift_coefficient: f64,
    /// How far the drift bends the primary rate.
    pub drift_wobble: f64,
}

impl Default for ModulationConfig {
    fn default() -> Self {
        Self {
            rate_epsilon: 0.05,
            drift_coefficient: 0.13,
            drift_wobble: 0.4,
        }
    }
}

/// `x - floor(x)`, kept strictly below 1.0.
pub fn wrap_unit(x: f64) -> f64 {
    let f = x - x.floor();
    // Tiny negative inputs round up to exactly 1.0.
    if f >= 1.0 {
        0.0
    } else {
        f
    }
}

/// Reflect into [0, 1]: `t = x mod 2`, then `t` or `2 - t`.
pub fn mirror_unit(x: f64) -> f64 {
    let mut t = x % 2.0;
    if t < 0.0 {
        t += 2.0;
    }
    if t <= 1.0 {
        t
    } else {
        2.0 - t
    }
}

/// Control-domain rate to oscillator frequency in Hz.
pub fn rate_curve(rate: f32, epsilon: f64) -> f64 {
    (rate as f64 / CONTROL_MAX as f64 + epsilon).powi(3)
}

/// Control-domain depth to signal amplitude.
pub fn depth_curve(depth: f32) -> f64 {
    (depth as f64 / CONTROL_MAX as f64).powi(3)
}

/// Control value that yields roughly `hz` through [`rate_curve`].
pub fn rate_control_for(hz: f64, epsilon: f64) -> i32 {
    let r = (hz.max(0.0).cbrt() - epsilon) * CONTROL_MAX as f64;
    (r.round() as i32).clamp(0, CONTROL_MAX)
}

/// Control value that yields roughly `depth` through [`depth_curve`].
pub fn depth_control_for(depth: f64) -> i32 {
    let d = depth.max(0.0).cbrt() * CONTROL_MAX as f64;
    (d.round() as i32).clamp(0, CONTROL_MAX)
}

impl Parameter {
    /// Whether a tick would change the phase or the output.
    pub fn is_modulating(&self) -> bool {
        self.spec().modulated && (self.precise_rate() != 0.0 || self.precise_depth() != 0.0)
    }

    /// Advance the oscillator by `dt` seconds and return the resolved value in [0, 1].
    pub fn resolve(&mut self, dt: f32, cfg: &ModulationConfig) -> f32 {
        let base = self.normalized() as f64;
        if !self.is_modulating() {
            return base as f32;
        }

        let rate = rate_curve(self.precise_rate(), cfg.rate_epsilon);
        let depth = depth_curve(self.precise_depth());
        let dt = dt.max(0.0) as f64;

        self.lfo_drift += rate * cfg.drift_coefficient * dt * TAU;
        self.lfo_phase += (rate + self.lfo_drift.sin() * rate * cfg.drift_wobble) * dt * TAU;

        let signal = self.lfo_phase.sin() * depth;
        let out = self.spec().wrap.apply(base + signal);
        // f64 -> f32 can round 0.99999999 up to 1.0
        match self.spec().wrap {
            WrapMode::Wrap if out as f32 >= 1.0 => 0.0,
            _ => out as f32,
        }
    }
}

/// Resolved values for one tick, indexed by [`ParamId`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedParams(pub [f32; PARAM_COUNT]);

impl Default for ResolvedParams {
    fn default() -> Self {
        Self([0.0; PARAM_COUNT])
    }
}

impl ResolvedParams {
    pub fn get(&self, id: ParamId) -> f32 {
        self.0[id.index()]
    }
}

impl std::ops::Index<ParamId> for ResolvedParams {
    type Output = f32;

    fn index(&self, id: ParamId) -> &f32 {
        &self.0[id.index()]
    }
}

impl ParameterSet {
    pub fn resolve(&mut self, id: ParamId, dt: f32, cfg: &ModulationConfig) -> f32 {
        self.get_mut(id).resolve(dt, cfg)
    }

    /// Advance every oscillator once. Called exactly once per tick.
    pub fn resolve_all(&mut self, dt: f32, cfg: &ModulationConfig) -> ResolvedParams {
        let mut out = ResolvedParams::default();
        for (slot, p) in out.0.iter_mut().zip(self.iter_mut()) {
            *slot = p.resolve(dt, cfg);
        }
        out
    }
}
