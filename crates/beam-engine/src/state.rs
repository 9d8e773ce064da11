use beam_core::geometry::sanitize_flip;
use beam_core::{
    transition_ms_for_control, Geometry, MotionState, ParamId, ParameterSet, Preset, PresetBank,
    PresetEngine, ResolvedParams,
};
use beam_transform::TransformUniforms;

use crate::config::EngineConfig;
use crate::error::EngineResult;

/// All mutable state the render loop owns. Nothing here is shared with
/// another thread; control input reaches it through the command queue.
#[derive(Debug, Clone)]
pub struct RenderState {
    pub params: ParameterSet,
    pub geometry: Geometry,
    pub motion: MotionState,
    pub presets: PresetEngine,
    pub bank: PresetBank,
    /// Output of the last resolve.
    pub resolved: ResolvedParams,
    /// Transform inputs of the last tick.
    pub uniforms: TransformUniforms,
    pub transition_ms: f64,
}

impl RenderState {
    pub fn new(cfg: &EngineConfig) -> Self {
        let mut bank = PresetBank::factory();
        if let Some(dir) = &cfg.preset_dir {
            let loaded = bank.load_dir(dir);
            if loaded > 0 {
                log::info!("Merged {loaded} user presets from {}", dir.display());
            }
        }
        Self {
            params: ParameterSet::new(),
            geometry: Geometry::default(),
            motion: MotionState::default(),
            presets: PresetEngine::new(cfg.easing),
            bank,
            resolved: ResolvedParams::default(),
            uniforms: TransformUniforms::default(),
            transition_ms: cfg.transition_ms,
        }
    }

    /// One control-thread-free step: crossfade, physics, resolve, uniforms.
    /// Returns `true` on the tick a crossfade lands.
    pub fn advance(&mut self, dt: f32, cfg: &EngineConfig, aspect: f32) -> bool {
        let dt = dt.max(0.0);
        let landed = self.presets.tick(dt as f64 * 1000.0, &mut self.params, &mut self.motion);
        if landed {
            log::debug!("Preset crossfade complete");
        }
        self.motion.integrate(&self.params, dt, &cfg.motion);
        self.resolved = self.params.resolve_all(dt, &cfg.modulation);
        self.uniforms = TransformUniforms::from_state(
            &self.resolved,
            &self.params,
            &self.motion,
            &self.geometry,
            aspect,
            &cfg.transform,
        );
        landed
    }

    /// Cancel any crossfade and return every parameter, accumulator and
    /// geometry flag to its default. The axis lock survives.
    pub fn global_reset(&mut self) {
        self.presets.cancel();
        self.params.reset_all();
        self.motion.reset();
        self.geometry.reset();
        self.bank.set_active(None);
        log::info!("Global reset");
    }

    /// Crossfade toward bank slot `slot` over the current transition time.
    pub fn apply_preset(&mut self, slot: usize) -> bool {
        let Some(preset) = self.bank.get(slot).cloned() else {
            log::warn!("No preset in slot {slot}");
            return false;
        };
        self.bank.set_active(Some(slot));
        self.presets.apply(
            &preset,
            self.transition_ms,
            &mut self.params,
            &mut self.geometry,
            &mut self.motion,
        );
        log::info!("Applying preset {slot} over {:.0} ms", self.transition_ms);
        true
    }

    /// Capture the current state into `slot`, persisting it when the config
    /// names a preset directory.
    pub fn save_preset(&mut self, slot: usize, cfg: &EngineConfig) -> EngineResult<Preset> {
        let preset = Preset::capture(&self.params, &self.geometry);
        self.bank.store(slot, preset.clone())?;
        log::info!("{}", preset.preset_code(slot));
        if let Some(dir) = &cfg.preset_dir {
            self.bank.save_slot(dir, slot)?;
        }
        Ok(preset)
    }

    pub fn set_transition_control(&mut self, control: i32) {
        self.transition_ms = transition_ms_for_control(control);
    }

    pub fn set_axis(&mut self, n: u32) {
        self.geometry.set_axis_count(n);
    }

    pub fn set_flip_x(&mut self, v: f32) {
        self.geometry.flip_x = sanitize_flip(v);
    }

    pub fn set_flip_y(&mut self, v: f32) {
        self.geometry.flip_y = sanitize_flip(v);
    }

    pub fn resolved(&self, id: ParamId) -> f32 {
        self.resolved[id]
    }
}
