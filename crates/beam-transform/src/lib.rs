//! The kaleidoscope transform as plain math.
//!
//! [`TransformUniforms`] maps resolved parameters onto the inputs of the
//! per-pixel pipeline. [`pipeline::shade`] is the reference implementation
//! of that pipeline; the GPU fragment shader in `beam-render` is a line-for-line
//! port of it, and [`frame::render_frame`] runs it on the CPU.

pub mod fold;
pub mod frame;
pub mod grade;
pub mod pipeline;
pub mod uniforms;

pub use frame::{render_frame, ImageSampler};
pub use pipeline::{shade, Sampler};
pub use uniforms::{TransformConfig, TransformUniforms};
