//! The render loop: owns all mutable state and wires parameters, the
//! transform, surfaces and the recorder together once per tick.

mod command;
mod config;
mod engine;
mod error;
mod state;

pub use command::{ControlCommand, ControlHandle, StillCallback, StillImage, SurfaceEvent};
pub use config::EngineConfig;
pub use engine::{Engine, TickReport};
pub use error::{EngineError, EngineResult};
pub use state::RenderState;
