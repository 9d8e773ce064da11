//! Parameter store, LFO modulation, motion accumulators and presets.

pub mod bank;
pub mod easing;
pub mod error;
pub mod geometry;
pub mod modulation;
pub mod motion;
pub mod param;
pub mod preset;

pub use bank::{decode_record, encode_record, PresetBank, SLOT_COUNT};
pub use easing::Easing;
pub use error::{CoreError, CoreResult};
pub use geometry::{Geometry, MAX_AXIS, MIN_AXIS};
pub use modulation::{
    depth_control_for, mirror_unit, rate_control_for, wrap_unit, ModulationConfig, ResolvedParams,
    WrapMode,
};
pub use motion::{MotionConfig, MotionState, RotationAccumulator};
pub use param::{ParamId, ParamSpec, Parameter, ParameterSet, Snapshot, CONTROL_MAX, PARAM_COUNT};
pub use preset::{transition_ms_for_control, AnimationSession, Preset, PresetEngine};
