use serde::{Deserialize, Serialize};

use crate::modulation::WrapMode;

/// Upper bound of the integer control domain shared by values, rates and depths.
pub const CONTROL_MAX: i32 = 1000;

/// Number of tunable parameters. The set is fixed and never grows at runtime.
pub const PARAM_COUNT: usize = 29;

/// Identifier of one tunable. Serialized with the persisted preset keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ParamId {
    #[serde(rename = "3D_MIX")]
    Mix3d,
    #[serde(rename = "S_SHAPE")]
    RoomShape,
    #[serde(rename = "S_SPEED")]
    FlightSpeed,
    #[serde(rename = "S_FOV")]
    FovDepth,
    #[serde(rename = "CURVE")]
    Curve,
    #[serde(rename = "TWIST")]
    Twist,
    #[serde(rename = "FLUX")]
    Flux,
    #[serde(rename = "M_ANGLE")]
    MasterAngle,
    #[serde(rename = "M_ROT")]
    MasterRotation,
    #[serde(rename = "M_ZOOM")]
    MasterZoom,
    #[serde(rename = "M_TX")]
    MasterTx,
    #[serde(rename = "M_TY")]
    MasterTy,
    #[serde(rename = "M_TILTX")]
    MasterTiltX,
    #[serde(rename = "M_TILTY")]
    MasterTiltY,
    #[serde(rename = "M_RGB")]
    MasterRgb,
    #[serde(rename = "C_ANGLE")]
    CameraAngle,
    #[serde(rename = "C_ROT")]
    CameraRotation,
    #[serde(rename = "WARP")]
    Warp,
    #[serde(rename = "C_ZOOM")]
    CameraZoom,
    #[serde(rename = "C_TX")]
    CameraTx,
    #[serde(rename = "C_TY")]
    CameraTy,
    #[serde(rename = "C_TILTX")]
    CameraTiltX,
    #[serde(rename = "C_TILTY")]
    CameraTiltY,
    #[serde(rename = "RGB")]
    SensorRgb,
    #[serde(rename = "HUE")]
    Hue,
    #[serde(rename = "NEG")]
    Negative,
    #[serde(rename = "GLOW")]
    Glow,
    #[serde(rename = "CONTRAST")]
    Contrast,
    #[serde(rename = "VIBRANCE")]
    Vibrance,
}

/// Static description of a parameter: range, default, modulation capability.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamSpec {
    pub id: ParamId,
    pub key: &'static str,
    pub label: &'static str,
    pub min: i32,
    pub max: i32,
    pub default: i32,
    pub modulated: bool,
    pub wrap: WrapMode,
}

const fn spec(
    id: ParamId,
    key: &'static str,
    label: &'static str,
    default: i32,
    modulated: bool,
    wrap: WrapMode,
) -> ParamSpec {
    ParamSpec { id, key, label, min: 0, max: CONTROL_MAX, default, modulated, wrap }
}

use WrapMode::{Mirror, Wrap};

const SPECS: [ParamSpec; PARAM_COUNT] = [
    spec(ParamId::Mix3d, "3D_MIX", "Mix 3D", 0, true, Mirror),
    spec(ParamId::RoomShape, "S_SHAPE", "Room Shape", 0, true, Mirror),
    spec(ParamId::FlightSpeed, "S_SPEED", "Flight Speed", 500, true, Mirror),
    spec(ParamId::FovDepth, "S_FOV", "FOV Depth", 500, true, Mirror),
    spec(ParamId::Curve, "CURVE", "Curve", 500, true, Mirror),
    spec(ParamId::Twist, "TWIST", "Vortex", 500, true, Mirror),
    spec(ParamId::Flux, "FLUX", "Bio-Flux", 0, true, Mirror),
    spec(ParamId::MasterAngle, "M_ANGLE", "Angle", 0, true, Wrap),
    spec(ParamId::MasterRotation, "M_ROT", "Rotation", 500, false, Mirror),
    spec(ParamId::MasterZoom, "M_ZOOM", "Zoom", 160, true, Mirror),
    spec(ParamId::MasterTx, "M_TX", "Translate X", 500, true, Mirror),
    spec(ParamId::MasterTy, "M_TY", "Translate Y", 500, true, Mirror),
    spec(ParamId::MasterTiltX, "M_TILTX", "Tilt X", 500, true, Mirror),
    spec(ParamId::MasterTiltY, "M_TILTY", "Tilt Y", 500, true, Mirror),
    spec(ParamId::MasterRgb, "M_RGB", "RGB Shift", 0, true, Mirror),
    spec(ParamId::CameraAngle, "C_ANGLE", "Angle", 0, true, Wrap),
    spec(ParamId::CameraRotation, "C_ROT", "Rotation", 500, false, Mirror),
    spec(ParamId::Warp, "WARP", "Warp Distort", 0, false, Mirror),
    spec(ParamId::CameraZoom, "C_ZOOM", "Zoom", 300, true, Mirror),
    spec(ParamId::CameraTx, "C_TX", "Translate X", 500, true, Mirror),
    spec(ParamId::CameraTy, "C_TY", "Translate Y", 500, true, Mirror),
    spec(ParamId::CameraTiltX, "C_TILTX", "Tilt X", 500, true, Mirror),
    spec(ParamId::CameraTiltY, "C_TILTY", "Tilt Y", 500, true, Mirror),
    spec(ParamId::SensorRgb, "RGB", "RGB Shift", 0, true, Mirror),
    spec(ParamId::Hue, "HUE", "Hue", 0, true, Wrap),
    spec(ParamId::Negative, "NEG", "Negative", 0, true, Mirror),
    spec(ParamId::Glow, "GLOW", "Glow", 0, true, Mirror),
    spec(ParamId::Contrast, "CONTRAST", "Contrast", 500, false, Mirror),
    spec(ParamId::Vibrance, "VIBRANCE", "Vibrance", 500, false, Mirror),
];

impl ParamId {
    pub const ALL: [ParamId; PARAM_COUNT] = [
        ParamId::Mix3d,
        ParamId::RoomShape,
        ParamId::FlightSpeed,
        ParamId::FovDepth,
        ParamId::Curve,
        ParamId::Twist,
        ParamId::Flux,
        ParamId::MasterAngle,
        ParamId::MasterRotation,
        ParamId::MasterZoom,
        ParamId::MasterTx,
        ParamId::MasterTy,
        ParamId::MasterTiltX,
        ParamId::MasterTiltY,
        ParamId::MasterRgb,
        ParamId::CameraAngle,
        ParamId::CameraRotation,
        ParamId::Warp,
        ParamId::CameraZoom,
        ParamId::CameraTx,
        ParamId::CameraTy,
        ParamId::CameraTiltX,
        ParamId::CameraTiltY,
        ParamId::SensorRgb,
        ParamId::Hue,
        ParamId::Negative,
        ParamId::Glow,
        ParamId::Contrast,
        ParamId::Vibrance,
    ];

    /// Position in array-backed storage.
    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn spec(self) -> ParamSpec {
        SPECS[self as usize]
    }

    /// Persisted key, e.g. `"M_ZOOM"`.
    pub const fn key(self) -> &'static str {
        SPECS[self as usize].key
    }

    pub fn from_key(key: &str) -> Option<Self> {
        SPECS.iter().find(|s| s.key == key).map(|s| s.id)
    }
}

/// Quantized (value, rate, depth) triple: the serializable unit of a preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(rename = "v")]
    pub value: i32,
    #[serde(rename = "r", default)]
    pub rate: i32,
    #[serde(rename = "d", default)]
    pub depth: i32,
}

impl Snapshot {
    pub fn new(value: i32, rate: i32, depth: i32) -> Self {
        Self { value, rate, depth }
    }

    pub fn value(value: i32) -> Self {
        Self { value, rate: 0, depth: 0 }
    }
}

/// A single tunable with an integer control value and its continuous counterpart.
///
/// The integer fields are what a control surface reads and writes; the
/// `precise_*` fields are what the renderer consumes, so crossfades never
/// step visibly. LFO phase and drift only ever increase until reset.
#[derive(Debug, Clone)]
pub struct Parameter {
    spec: ParamSpec,
    value: i32,
    precise: f32,
    mod_rate: i32,
    mod_depth: i32,
    precise_rate: f32,
    precise_depth: f32,
    pub(crate) lfo_phase: f64,
    pub(crate) lfo_drift: f64,
}

impl Parameter {
    pub fn new(spec: ParamSpec) -> Self {
        Self {
            spec,
            value: spec.default,
            precise: spec.default as f32,
            mod_rate: 0,
            mod_depth: 0,
            precise_rate: 0.0,
            precise_depth: 0.0,
            lfo_phase: 0.0,
            lfo_drift: 0.0,
        }
    }

    pub fn id(&self) -> ParamId {
        self.spec.id
    }

    pub fn spec(&self) -> &ParamSpec {
        &self.spec
    }

    pub fn value(&self) -> i32 {
        self.value
    }

    pub fn precise(&self) -> f32 {
        self.precise
    }

    pub fn mod_rate(&self) -> i32 {
        self.mod_rate
    }

    pub fn mod_depth(&self) -> i32 {
        self.mod_depth
    }

    pub fn precise_rate(&self) -> f32 {
        self.precise_rate
    }

    pub fn precise_depth(&self) -> f32 {
        self.precise_depth
    }

    pub fn lfo_phase(&self) -> f64 {
        self.lfo_phase
    }

    pub fn lfo_drift(&self) -> f64 {
        self.lfo_drift
    }

    /// Set the integer base value; the precise value snaps to it.
    pub fn set_base(&mut self, value: i32) {
        self.value = value.clamp(self.spec.min, self.spec.max);
        self.precise = self.value as f32;
    }

    pub fn set_mod_rate(&mut self, rate: i32) {
        self.mod_rate = rate.clamp(0, CONTROL_MAX);
        self.precise_rate = self.mod_rate as f32;
    }

    pub fn set_mod_depth(&mut self, depth: i32) {
        self.mod_depth = depth.clamp(0, CONTROL_MAX);
        self.precise_depth = self.mod_depth as f32;
    }

    /// Set the continuous value. The integer only follows when it crosses a
    /// boundary; returns `true` in that case.
    pub fn set_animated_value(&mut self, v: f32) -> bool {
        self.precise = v.clamp(self.spec.min as f32, self.spec.max as f32);
        let quantized = self.precise as i32;
        let changed = quantized != self.value;
        self.value = quantized;
        changed
    }

    pub fn set_animated_rate(&mut self, v: f32) -> bool {
        self.precise_rate = v.clamp(0.0, CONTROL_MAX as f32);
        let quantized = self.precise_rate as i32;
        let changed = quantized != self.mod_rate;
        self.mod_rate = quantized;
        changed
    }

    pub fn set_animated_depth(&mut self, v: f32) -> bool {
        self.precise_depth = v.clamp(0.0, CONTROL_MAX as f32);
        let quantized = self.precise_depth as i32;
        let changed = quantized != self.mod_depth;
        self.mod_depth = quantized;
        changed
    }

    /// Restore the default value and clear modulation state.
    pub fn reset(&mut self) {
        self.set_base(self.spec.default);
        self.set_mod_rate(0);
        self.set_mod_depth(0);
        self.reset_phases();
    }

    pub fn reset_phases(&mut self) {
        self.lfo_phase = 0.0;
        self.lfo_drift = 0.0;
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot::new(self.value, self.mod_rate, self.mod_depth)
    }

    /// Snap to a snapshot without animation. Rate and depth are only taken
    /// by modulation-capable parameters.
    pub fn restore(&mut self, snapshot: Snapshot) {
        self.set_base(snapshot.value);
        if self.spec.modulated {
            self.set_mod_rate(snapshot.rate);
            self.set_mod_depth(snapshot.depth);
        }
    }

    /// Precise value over the range maximum, in [0, 1].
    pub fn normalized(&self) -> f32 {
        if self.spec.max == 0 {
            return 0.0;
        }
        self.precise / self.spec.max as f32
    }

    /// Unmodulated value mapped linearly into `[out_min, out_max]`.
    pub fn mapped(&self, out_min: f32, out_max: f32) -> f32 {
        out_min + self.normalized() * (out_max - out_min)
    }
}

/// Every parameter, indexed by [`ParamId`]. Created once, never grows.
#[derive(Debug, Clone)]
pub struct ParameterSet {
    params: [Parameter; PARAM_COUNT],
}

impl Default for ParameterSet {
    fn default() -> Self {
        Self::new()
    }
}

impl ParameterSet {
    pub fn new() -> Self {
        Self {
            params: std::array::from_fn(|i| Parameter::new(ParamId::ALL[i].spec())),
        }
    }

    pub fn get(&self, id: ParamId) -> &Parameter {
        &self.params[id.index()]
    }

    pub fn get_mut(&mut self, id: ParamId) -> &mut Parameter {
        &mut self.params[id.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.params.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Parameter> {
        self.params.iter_mut()
    }

    pub fn set_base(&mut self, id: ParamId, value: i32) {
        self.get_mut(id).set_base(value);
    }

    pub fn set_mod_rate(&mut self, id: ParamId, rate: i32) {
        self.get_mut(id).set_mod_rate(rate);
    }

    pub fn set_mod_depth(&mut self, id: ParamId, depth: i32) {
        self.get_mut(id).set_mod_depth(depth);
    }

    pub fn reset(&mut self, id: ParamId) {
        self.get_mut(id).reset();
    }

    pub fn reset_all(&mut self) {
        for p in self.params.iter_mut() {
            p.reset();
        }
    }

    pub fn reset_phases(&mut self) {
        for p in self.params.iter_mut() {
            p.reset_phases();
        }
    }

    pub fn normalized(&self, id: ParamId) -> f32 {
        self.get(id).normalized()
    }

    pub fn mapped(&self, id: ParamId, out_min: f32, out_max: f32) -> f32 {
        self.get(id).mapped(out_min, out_max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_index_their_own_spec() {
        for (i, id) in ParamId::ALL.iter().enumerate() {
            assert_eq!(id.index(), i);
            assert_eq!(id.spec().id, *id);
            assert_eq!(ParamId::from_key(id.key()), Some(*id));
        }
    }

    #[test]
    fn serde_key_matches_persisted_key() {
        for id in ParamId::ALL {
            let json = serde_json::to_string(&id).unwrap();
            assert_eq!(json, format!("\"{}\"", id.key()));
        }
    }

    #[test]
    fn unknown_key_is_none() {
        assert_eq!(ParamId::from_key("AXIS"), None);
        assert_eq!(ParamId::from_key(""), None);
    }

    #[test]
    fn set_base_clamps_and_syncs_precise() {
        let mut set = ParameterSet::new();
        set.set_base(ParamId::MasterZoom, 1500);
        let p = set.get(ParamId::MasterZoom);
        assert_eq!(p.value(), CONTROL_MAX);
        assert_eq!(p.precise(), CONTROL_MAX as f32);
        assert!((p.normalized() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn animated_value_only_quantizes_on_boundary() {
        let mut p = Parameter::new(ParamId::MasterZoom.spec());
        assert_eq!(p.value(), 160);
        assert!(!p.set_animated_value(160.7));
        assert_eq!(p.value(), 160);
        assert!((p.precise() - 160.7).abs() < 1e-4);
        assert!(p.set_animated_value(161.2));
        assert_eq!(p.value(), 161);
    }

    #[test]
    fn restore_ignores_modulation_on_plain_parameter() {
        let mut p = Parameter::new(ParamId::MasterRotation.spec());
        p.restore(Snapshot::new(673, 200, 300));
        assert_eq!(p.snapshot(), Snapshot::new(673, 0, 0));
    }

    #[test]
    fn reset_clears_modulation_and_phases() {
        let mut p = Parameter::new(ParamId::Hue.spec());
        p.set_base(700);
        p.set_mod_rate(300);
        p.set_mod_depth(400);
        p.lfo_phase = 3.0;
        p.lfo_drift = 1.0;
        p.reset();
        assert_eq!(p.snapshot(), Snapshot::new(0, 0, 0));
        assert_eq!(p.lfo_phase(), 0.0);
        assert_eq!(p.lfo_drift(), 0.0);
    }

    #[test]
    fn mapped_spans_output_range() {
        let mut set = ParameterSet::new();
        set.set_base(ParamId::Contrast, 0);
        assert!((set.mapped(ParamId::Contrast, 0.0, 2.0)).abs() < 1e-6);
        set.set_base(ParamId::Contrast, 1000);
        assert!((set.mapped(ParamId::Contrast, 0.0, 2.0) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn snapshot_json_uses_short_keys_and_defaults() {
        let snap: Snapshot = serde_json::from_str(r#"{"v":300}"#).unwrap();
        assert_eq!(snap, Snapshot::value(300));
        let json = serde_json::to_string(&Snapshot::new(1, 2, 3)).unwrap();
        assert_eq!(json, r#"{"v":1,"r":2,"d":3}"#);
    }
}
