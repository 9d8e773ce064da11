use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::easing::Easing;
use crate::geometry::{sanitize_flip, Geometry, MAX_AXIS, MIN_AXIS};
use crate::motion::MotionState;
use crate::param::{ParamId, ParameterSet, Snapshot, PARAM_COUNT};

/// Longest transition reachable from the transition control, in milliseconds.
pub const MAX_TRANSITION_MS: f64 = 30_000.0;

/// Full-state snapshot: discrete geometry plus one [`Snapshot`] per parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preset {
    pub axis: u32,
    #[serde(rename = "flipX")]
    pub flip_x: f32,
    #[serde(rename = "flipY")]
    pub flip_y: f32,
    pub rot180: bool,
    #[serde(rename = "controls")]
    pub snapshots: BTreeMap<ParamId, Snapshot>,
}

impl Default for Preset {
    /// Every parameter at its default, default geometry.
    fn default() -> Self {
        Self::capture(&ParameterSet::new(), &Geometry::default())
    }
}

impl Preset {
    /// Read the quantized state of every parameter plus the geometry flags.
    pub fn capture(params: &ParameterSet, geometry: &Geometry) -> Self {
        Self {
            axis: geometry.axis_count,
            flip_x: geometry.flip_x,
            flip_y: geometry.flip_y,
            rot180: geometry.rot180,
            snapshots: params.iter().map(|p| (p.id(), p.snapshot())).collect(),
        }
    }

    pub fn snapshot(&self, id: ParamId) -> Option<Snapshot> {
        self.snapshots.get(&id).copied()
    }

    /// Clamp out-of-range fields loaded from storage.
    pub fn sanitize(&mut self) {
        self.axis = self.axis.clamp(MIN_AXIS, MAX_AXIS);
        self.flip_x = sanitize_flip(self.flip_x);
        self.flip_y = sanitize_flip(self.flip_y);
    }

    /// Single-line code form listing only the snapshots that differ from a
    /// centred, unmodulated control.
    pub fn preset_code(&self, slot: usize) -> String {
        let m_rot = self
            .snapshot(ParamId::MasterRotation)
            .map(|s| s.value)
            .unwrap_or(500);
        let mut out = format!("presets[{slot}] = p(ax={}, mRot={m_rot}", self.axis);
        for (id, snap) in &self.snapshots {
            if *id == ParamId::MasterRotation {
                continue;
            }
            if snap.value != 500 || snap.rate != 0 || snap.depth != 0 {
                let _ = write!(
                    out,
                    ", \"{}\", {}, {}, {}",
                    id.key(),
                    snap.value,
                    snap.rate,
                    snap.depth
                );
            }
        }
        out.push(')');
        out
    }
}

/// Transition duration for a 0..1000 control: `(p/1000)^3 * 30 s`.
pub fn transition_ms_for_control(p: i32) -> f64 {
    let x = p.clamp(0, 1000) as f64 / 1000.0;
    x.powi(3) * MAX_TRANSITION_MS
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct ChannelStart {
    value: f32,
    rate: f32,
    depth: f32,
}

/// Interpolate, returning the target bit-exact once `t` reaches 1.
fn lerp_exact(start: f32, target: f32, t: f32) -> f32 {
    if t >= 1.0 {
        target
    } else {
        start + (target - start) * t
    }
}

fn lerp_exact_f64(start: f64, target: f64, t: f64) -> f64 {
    if t >= 1.0 {
        target
    } else {
        start + (target - start) * t
    }
}

/// One live crossfade from the state at `apply` time toward a target preset.
#[derive(Debug, Clone)]
pub struct AnimationSession {
    target: Preset,
    starts: [ChannelStart; PARAM_COUNT],
    master_rotation: (f64, f64),
    camera_rotation: (f64, f64),
    elapsed_ms: f64,
    duration_ms: f64,
    easing: Easing,
}

impl AnimationSession {
    /// Record start points from the precise state and the rotation targets.
    pub fn begin(
        target: Preset,
        params: &ParameterSet,
        motion: &MotionState,
        duration_ms: f64,
        easing: Easing,
    ) -> Self {
        let starts = std::array::from_fn(|i| {
            let p = params.get(ParamId::ALL[i]);
            ChannelStart {
                value: p.precise(),
                rate: p.precise_rate(),
                depth: p.precise_depth(),
            }
        });
        Self {
            target,
            starts,
            master_rotation: (
                motion.master_rotation.degrees,
                motion.master_rotation.nearest_turn(),
            ),
            camera_rotation: (
                motion.camera_rotation.degrees,
                motion.camera_rotation.nearest_turn(),
            ),
            elapsed_ms: 0.0,
            duration_ms: duration_ms.max(0.0),
            easing,
        }
    }

    pub fn target(&self) -> &Preset {
        &self.target
    }

    /// Normalized linear progress in [0, 1].
    pub fn progress(&self) -> f32 {
        if self.duration_ms <= 0.0 {
            1.0
        } else {
            (self.elapsed_ms / self.duration_ms).clamp(0.0, 1.0) as f32
        }
    }

    /// Advance by `dt_ms` and write interpolated values. Returns `true` once
    /// the final (t = 1) step has been applied.
    pub fn step(&mut self, dt_ms: f64, params: &mut ParameterSet, motion: &mut MotionState) -> bool {
        self.elapsed_ms += dt_ms.max(0.0);
        let t = self.easing.apply(self.progress());

        for id in ParamId::ALL {
            let Some(target) = self.target.snapshot(id) else {
                continue;
            };
            let start = self.starts[id.index()];
            let p = params.get_mut(id);
            p.set_animated_value(lerp_exact(start.value, target.value as f32, t));
            if p.spec().modulated {
                p.set_animated_rate(lerp_exact(start.rate, target.rate as f32, t));
                p.set_animated_depth(lerp_exact(start.depth, target.depth as f32, t));
            }
        }

        let t64 = t as f64;
        motion.master_rotation.degrees =
            lerp_exact_f64(self.master_rotation.0, self.master_rotation.1, t64);
        motion.camera_rotation.degrees =
            lerp_exact_f64(self.camera_rotation.0, self.camera_rotation.1, t64);

        t >= 1.0
    }
}

/// Owns the single live [`AnimationSession`].
#[derive(Debug, Clone, Default)]
pub struct PresetEngine {
    session: Option<AnimationSession>,
    easing: Easing,
}

impl PresetEngine {
    pub fn new(easing: Easing) -> Self {
        Self { session: None, easing }
    }

    pub fn is_animating(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&self) -> Option<&AnimationSession> {
        self.session.as_ref()
    }

    pub fn cancel(&mut self) {
        if self.session.take().is_some() {
            log::debug!("Preset crossfade cancelled");
        }
    }

    /// Start a crossfade toward `preset`, replacing any running one.
    ///
    /// Geometry flags switch immediately; the axis count only when the axis
    /// is unlocked. A zero duration lands on the target before returning.
    pub fn apply(
        &mut self,
        preset: &Preset,
        duration_ms: f64,
        params: &mut ParameterSet,
        geometry: &mut Geometry,
        motion: &mut MotionState,
    ) {
        self.cancel();

        if !geometry.axis_locked {
            geometry.set_axis_count(preset.axis);
        }
        geometry.flip_x = sanitize_flip(preset.flip_x);
        geometry.flip_y = sanitize_flip(preset.flip_y);
        geometry.rot180 = preset.rot180;

        let mut session = AnimationSession::begin(preset.clone(), params, motion, duration_ms, self.easing);
        if duration_ms <= 0.0 {
            session.step(0.0, params, motion);
            return;
        }
        self.session = Some(session);
    }

    /// Advance the live crossfade, if any. Returns `true` on the tick it completes.
    pub fn tick(&mut self, dt_ms: f64, params: &mut ParameterSet, motion: &mut MotionState) -> bool {
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        if session.step(dt_ms, params, motion) {
            self.session = None;
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motion::RotationAccumulator;

    #[test]
    fn capture_reads_every_parameter() {
        let mut params = ParameterSet::new();
        params.set_base(ParamId::Glow, 420);
        params.set_mod_rate(ParamId::Glow, 10);
        let g = Geometry { axis_count: 6, rot180: true, ..Geometry::default() };
        let p = Preset::capture(&params, &g);
        assert_eq!(p.snapshots.len(), PARAM_COUNT);
        assert_eq!(p.axis, 6);
        assert!(p.rot180);
        assert_eq!(p.snapshot(ParamId::Glow), Some(Snapshot::new(420, 10, 0)));
    }

    #[test]
    fn transition_control_is_cubic() {
        assert_eq!(transition_ms_for_control(0), 0.0);
        assert!((transition_ms_for_control(500) - 3750.0).abs() < 1e-9);
        assert_eq!(transition_ms_for_control(1000), MAX_TRANSITION_MS);
        assert_eq!(transition_ms_for_control(5000), MAX_TRANSITION_MS);
    }

    #[test]
    fn zero_duration_lands_immediately() {
        let mut params = ParameterSet::new();
        let mut geometry = Geometry::default();
        let mut motion = MotionState::default();
        let mut target = Preset::default();
        target.snapshots.insert(ParamId::MasterZoom, Snapshot::new(800, 100, 200));

        let mut engine = PresetEngine::default();
        engine.apply(&target, 0.0, &mut params, &mut geometry, &mut motion);
        assert!(!engine.is_animating());
        assert_eq!(params.get(ParamId::MasterZoom).snapshot(), Snapshot::new(800, 100, 200));
    }

    #[test]
    fn locked_axis_is_left_alone() {
        let mut params = ParameterSet::new();
        let mut geometry = Geometry::default();
        let mut motion = MotionState::default();
        let target = Preset { axis: 9, flip_x: -1.0, ..Preset::default() };

        let mut engine = PresetEngine::default();
        engine.apply(&target, 500.0, &mut params, &mut geometry, &mut motion);
        assert_eq!(geometry.axis_count, 2);
        assert_eq!(geometry.flip_x, -1.0);
    }

    #[test]
    fn new_apply_replaces_running_session() {
        let mut params = ParameterSet::new();
        let mut geometry = Geometry::default();
        let mut motion = MotionState::default();
        let mut a = Preset::default();
        a.snapshots.insert(ParamId::Hue, Snapshot::value(1000));
        let mut b = Preset::default();
        b.snapshots.insert(ParamId::Hue, Snapshot::value(0));

        let mut engine = PresetEngine::default();
        engine.apply(&a, 1000.0, &mut params, &mut geometry, &mut motion);
        engine.tick(500.0, &mut params, &mut motion);
        let mid = params.get(ParamId::Hue).precise();
        assert!(mid > 0.0);

        engine.apply(&b, 1000.0, &mut params, &mut geometry, &mut motion);
        assert_eq!(engine.session().map(|s| s.target().clone()), Some(b));
        while !engine.tick(100.0, &mut params, &mut motion) {}
        assert_eq!(params.get(ParamId::Hue).precise(), 0.0);
    }

    #[test]
    fn rotation_heads_for_nearest_turn() {
        let mut params = ParameterSet::new();
        let mut geometry = Geometry::default();
        let mut motion = MotionState {
            master_rotation: RotationAccumulator::new(370.0),
            camera_rotation: RotationAccumulator::new(-20.0),
            scroll: 0.0,
        };
        let mut engine = PresetEngine::default();
        engine.apply(&Preset::default(), 1000.0, &mut params, &mut geometry, &mut motion);
        engine.tick(250.0, &mut params, &mut motion);
        let d = motion.master_rotation.degrees;
        assert!((360.0..370.0).contains(&d));
        while !engine.tick(250.0, &mut params, &mut motion) {}
        assert_eq!(motion.master_rotation.degrees, 360.0);
        assert_eq!(motion.camera_rotation.degrees, 0.0);
    }

    #[test]
    fn preset_code_lists_only_non_centred_entries() {
        let mut p = Preset::default();
        p.snapshots.insert(ParamId::MasterRotation, Snapshot::value(673));
        p.snapshots.insert(ParamId::MasterZoom, Snapshot::new(268, 293, 517));
        let code = p.preset_code(3);
        assert!(code.starts_with("presets[3] = p(ax=2, mRot=673"));
        assert!(code.contains("\"M_ZOOM\", 268, 293, 517"));
        assert!(!code.contains("M_TX"));
        assert!(code.ends_with(')'));
    }
}
