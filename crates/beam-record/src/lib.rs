//! Recording pipeline: encoders, muxer coordination and session lifecycle.

mod audio;
mod backend;
#[cfg(feature = "capture")]
mod capture;
mod codec;
mod config;
mod controller;
mod error;
#[cfg(feature = "video")]
mod ffmpeg;
pub mod memory;
mod mux;
mod session;

pub use audio::{AudioTimestamper, AudioWorker};
pub use backend::{default_factory, UnavailableFactory};
#[cfg(feature = "capture")]
pub use capture::{open_default_input, CpalSource};
pub use codec::{
    AudioEncoder, AudioOpener, AudioSource, BufferFlags, EncodedBuffer, Encoder, EncoderFactory, EncoderOutput,
    Muxer, TrackFormat, TrackKind, VideoEncoder,
};
pub use config::RecordConfig;
pub use controller::{RecordController, StopCallback, StopHandle};
pub use error::{RecordError, RecordResult};
#[cfg(feature = "video")]
pub use ffmpeg::FfmpegFactory;
pub use mux::{drain_encoder, DrainOutcome, MuxCoordinator, WriteOutcome};
pub use session::{crop_rgba, even_dimensions, EncodeSession, SessionState};
