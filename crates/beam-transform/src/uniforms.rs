use beam_core::{Geometry, MotionState, ParamId, ParameterSet, ResolvedParams};
use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::grade::Grade;

/// Fixed angular offsets added to each tier's rotation, in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformConfig {
    pub master_rotation_bias_deg: f32,
    pub camera_rotation_bias_deg: f32,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            master_rotation_bias_deg: 90.0,
            camera_rotation_bias_deg: 0.0,
        }
    }
}

/// Everything the per-pixel pipeline reads for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformUniforms {
    pub axis_count: f32,
    /// Offscreen width over height.
    pub aspect: f32,

    pub master_angle_deg: f32,
    pub master_zoom: f32,
    pub master_translate: Vec2,
    pub master_tilt: Vec2,
    /// Horizontal per-channel offset applied before the fold.
    pub master_rgb: f32,

    /// Flat (0) to tunnel (1) blend, already squared.
    pub mode: f32,
    pub scroll: f32,
    pub room_shape: f32,
    pub fov: f32,
    pub curve: f32,
    pub twist: f32,
    pub flux: f32,

    pub camera_angle_deg: f32,
    pub camera_zoom: f32,
    pub camera_translate: Vec2,
    pub camera_tilt: Vec2,
    pub flip: Vec2,
    pub warp: f32,
    /// Horizontal per-channel offset applied after the fold.
    pub sensor_rgb: f32,

    pub grade: Grade,
}

impl Default for TransformUniforms {
    fn default() -> Self {
        Self::from_state(
            &ResolvedParams::default(),
            &ParameterSet::new(),
            &MotionState::default(),
            &Geometry::default(),
            16.0 / 9.0,
            &TransformConfig::default(),
        )
    }
}

/// Curve control: below the midpoint flattens, above it bends harder.
fn curve_from_control(c: f32) -> f32 {
    if c > 0.5 {
        1.0 + (c - 0.5) * 6.0
    } else {
        0.2 + c * 1.6
    }
}

impl TransformUniforms {
    /// Map one tick's state onto pipeline inputs.
    ///
    /// Modulated channels come from `resolved`; shaping controls that never
    /// modulate (curve, twist, warp, contrast, vibrance) read their base.
    pub fn from_state(
        resolved: &ResolvedParams,
        params: &ParameterSet,
        motion: &MotionState,
        geometry: &Geometry,
        aspect: f32,
        cfg: &TransformConfig,
    ) -> Self {
        let r = |id: ParamId| resolved[id];
        let (fx, fy) = geometry.effective_flip();

        Self {
            axis_count: geometry.axis_count as f32,
            aspect,

            master_angle_deg: r(ParamId::MasterAngle) * 360.0
                + motion.master_rotation.degrees as f32
                + cfg.master_rotation_bias_deg,
            master_zoom: 0.1 + r(ParamId::MasterZoom) * 2.5,
            master_translate: Vec2::new(r(ParamId::MasterTx) - 0.5, r(ParamId::MasterTy) - 0.5) * 2.0,
            master_tilt: Vec2::new(r(ParamId::MasterTiltX) - 0.5, r(ParamId::MasterTiltY) - 0.5) * 1.5,
            master_rgb: r(ParamId::MasterRgb) * 0.1,

            mode: r(ParamId::Mix3d).powi(2),
            scroll: motion.scroll,
            room_shape: r(ParamId::RoomShape),
            fov: r(ParamId::FovDepth),
            curve: curve_from_control(params.normalized(ParamId::Curve)),
            twist: params.mapped(ParamId::Twist, -5.0, 5.0),
            flux: r(ParamId::Flux) * 0.2,

            camera_angle_deg: r(ParamId::CameraAngle) * 360.0
                + motion.camera_rotation.degrees as f32
                + cfg.camera_rotation_bias_deg,
            camera_zoom: 0.3 + r(ParamId::CameraZoom) * 2.0,
            camera_translate: Vec2::new(r(ParamId::CameraTx) - 0.5, r(ParamId::CameraTy) - 0.5),
            camera_tilt: Vec2::new(r(ParamId::CameraTiltX) - 0.5, r(ParamId::CameraTiltY) - 0.5) * 1.2,
            flip: Vec2::new(fx, fy),
            warp: params.normalized(ParamId::Warp),
            sensor_rgb: r(ParamId::SensorRgb) * 0.05,

            grade: Grade {
                negative: r(ParamId::Negative),
                hue: r(ParamId::Hue),
                contrast: params.mapped(ParamId::Contrast, 0.0, 2.0),
                saturation: params.mapped(ParamId::Vibrance, 0.0, 2.0),
                bloom: r(ParamId::Glow),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beam_core::{ModulationConfig, RotationAccumulator};

    fn defaults() -> (ResolvedParams, ParameterSet) {
        let mut params = ParameterSet::new();
        let resolved = params.resolve_all(0.0, &ModulationConfig::default());
        (resolved, params)
    }

    #[test]
    fn default_state_maps_to_neutral_inputs() {
        let (resolved, params) = defaults();
        let u = TransformUniforms::from_state(
            &resolved,
            &params,
            &MotionState::default(),
            &Geometry::default(),
            2.0,
            &TransformConfig::default(),
        );
        assert_eq!(u.axis_count, 2.0);
        assert_eq!(u.aspect, 2.0);
        assert!((u.master_angle_deg - 90.0).abs() < 1e-6);
        assert!((u.master_zoom - 0.5).abs() < 1e-6);
        assert!(u.master_translate.length() < 1e-6);
        assert!(u.master_tilt.length() < 1e-6);
        assert!((u.camera_zoom - 0.9).abs() < 1e-6);
        assert_eq!(u.flip, Vec2::new(1.0, -1.0));
        assert!((u.curve - 1.0).abs() < 1e-6);
        assert!(u.twist.abs() < 1e-6);
        assert_eq!(u.grade, Grade::default());
    }

    #[test]
    fn rotation_includes_accumulators_and_bias() {
        let (resolved, params) = defaults();
        let motion = MotionState {
            master_rotation: RotationAccumulator::new(30.0),
            camera_rotation: RotationAccumulator::new(-45.0),
            scroll: 2.5,
        };
        let cfg = TransformConfig { master_rotation_bias_deg: 0.0, camera_rotation_bias_deg: 90.0 };
        let u = TransformUniforms::from_state(&resolved, &params, &motion, &Geometry::default(), 1.0, &cfg);
        assert!((u.master_angle_deg - 30.0).abs() < 1e-5);
        assert!((u.camera_angle_deg - 45.0).abs() < 1e-5);
        assert_eq!(u.scroll, 2.5);
    }

    #[test]
    fn rot180_flips_both_axes() {
        let (resolved, params) = defaults();
        let g = Geometry { rot180: true, ..Geometry::default() };
        let u = TransformUniforms::from_state(&resolved, &params, &MotionState::default(), &g, 1.0, &TransformConfig::default());
        assert_eq!(u.flip, Vec2::new(-1.0, 1.0));
    }

    #[test]
    fn curve_control_has_two_slopes() {
        assert!((curve_from_control(0.0) - 0.2).abs() < 1e-6);
        assert!((curve_from_control(0.5) - 1.0).abs() < 1e-6);
        assert!((curve_from_control(1.0) - 4.0).abs() < 1e-6);
    }
}
