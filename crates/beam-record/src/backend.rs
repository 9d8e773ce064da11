use std::path::Path;

use crate::codec::{AudioEncoder, AudioOpener, EncoderFactory, Muxer, VideoEncoder};
use crate::config::RecordConfig;
use crate::error::{RecordError, RecordResult};

/// The encoder backend compiled into this build.
#[cfg(feature = "video")]
pub fn default_factory() -> RecordResult<Box<dyn EncoderFactory>> {
    Ok(Box::new(crate::ffmpeg::FfmpegFactory::new()?))
}

/// The encoder backend compiled into this build.
#[cfg(not(feature = "video"))]
pub fn default_factory() -> RecordResult<Box<dyn EncoderFactory>> {
    Ok(Box::new(UnavailableFactory))
}

/// Stand-in used when no encoder backend is compiled in. Every session
/// fails at setup, leaving the render loop untouched.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableFactory;

const UNAVAILABLE: &str = "video recording requires the 'video' feature (ffmpeg-next)";

impl EncoderFactory for UnavailableFactory {
    fn create_muxer(&mut self, _path: &Path) -> RecordResult<Box<dyn Muxer>> {
        Err(RecordError::unavailable(UNAVAILABLE))
    }

    fn create_video(&mut self, _width: u32, _height: u32, _cfg: &RecordConfig) -> RecordResult<Box<dyn VideoEncoder>> {
        Err(RecordError::unavailable(UNAVAILABLE))
    }

    fn audio_opener(&mut self) -> Option<AudioOpener> {
        None
    }

    fn create_audio(&mut self, _rate: u32, _channels: u16, _cfg: &RecordConfig) -> RecordResult<Box<dyn AudioEncoder>> {
        Err(RecordError::unavailable(UNAVAILABLE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unavailable_backend_fails_setup() {
        let mut f = UnavailableFactory;
        let err = f.create_muxer(Path::new("out.mp4")).err().unwrap();
        assert!(err.to_string().contains("'video' feature"));
        assert!(f.audio_opener().is_none());
    }
}
