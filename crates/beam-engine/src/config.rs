use std::path::{Path, PathBuf};

use beam_core::{Easing, ModulationConfig, MotionConfig};
use beam_record::RecordConfig;
use beam_transform::TransformConfig;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// Everything tunable about one engine instance. Missing JSON fields take
/// their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Offscreen target size, independent of any display.
    pub offscreen_width: u32,
    pub offscreen_height: u32,
    /// Crossfade length used by preset recalls.
    pub transition_ms: f64,
    pub easing: Easing,
    /// Where user preset records live. `None` keeps presets in memory only.
    pub preset_dir: Option<PathBuf>,
    /// Commands buffered between control threads and the render thread.
    pub command_capacity: usize,
    pub modulation: ModulationConfig,
    pub motion: MotionConfig,
    pub transform: TransformConfig,
    pub record: RecordConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            offscreen_width: 1920,
            offscreen_height: 1080,
            transition_ms: 1000.0,
            easing: Easing::default(),
            preset_dir: None,
            command_capacity: 256,
            modulation: ModulationConfig::default(),
            motion: MotionConfig::default(),
            transform: TransformConfig::default(),
            record: RecordConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Read a JSON config. Unreadable or malformed files are errors;
    /// absent fields are not.
    pub fn load(path: &Path) -> EngineResult<Self> {
        let json = std::fs::read_to_string(path)?;
        let cfg: EngineConfig = serde_json::from_str(&json)?;
        cfg.validate()?;
        log::info!("Loaded engine config from {}", path.display());
        Ok(cfg)
    }

    pub fn save(&self, path: &Path) -> EngineResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn validate(&self) -> EngineResult<()> {
        if self.offscreen_width == 0 || self.offscreen_height == 0 {
            return Err(EngineError::config(format!(
                "offscreen target must not be empty, got {}x{}",
                self.offscreen_width, self.offscreen_height
            )));
        }
        if !self.transition_ms.is_finite() || self.transition_ms < 0.0 {
            return Err(EngineError::config(format!("invalid transition {} ms", self.transition_ms)));
        }
        if self.command_capacity == 0 {
            return Err(EngineError::config("command queue needs room for at least one command"));
        }
        Ok(())
    }

    pub fn aspect(&self) -> f32 {
        self.offscreen_width as f32 / self.offscreen_height.max(1) as f32
    }
}
