//! Backend-neutral encoder, muxer and capture seams.
//!
//! The shapes mirror hardware codec APIs: input is queued, output is polled
//! with a bounded wait, and the first real output of an encoder is its
//! format announcement.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use crate::config::RecordConfig;
use crate::error::RecordResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackKind {
    Video,
    Audio,
}

impl TrackKind {
    pub(crate) fn slot(self) -> usize {
        match self {
            TrackKind::Video => 0,
            TrackKind::Audio => 1,
        }
    }
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TrackKind::Video => "video",
            TrackKind::Audio => "audio",
        })
    }
}

/// Output format an encoder settles on once it has seen input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackFormat {
    Video { codec: String, width: u32, height: u32 },
    Audio { codec: String, sample_rate: u32, channels: u16 },
}

impl TrackFormat {
    pub fn kind(&self) -> TrackKind {
        match self {
            TrackFormat::Video { .. } => TrackKind::Video,
            TrackFormat::Audio { .. } => TrackKind::Audio,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufferFlags {
    /// Decoder setup data. Registered with the track, never written as a sample.
    pub codec_config: bool,
    pub end_of_stream: bool,
    pub key_frame: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedBuffer {
    pub data: Vec<u8>,
    pub pts_us: i64,
    pub flags: BufferFlags,
}

impl EncodedBuffer {
    pub fn sample(data: Vec<u8>, pts_us: i64, key_frame: bool) -> Self {
        Self {
            data,
            pts_us,
            flags: BufferFlags { key_frame, ..BufferFlags::default() },
        }
    }

    pub fn end_of_stream(pts_us: i64) -> Self {
        Self {
            data: Vec::new(),
            pts_us,
            flags: BufferFlags { end_of_stream: true, ..BufferFlags::default() },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncoderOutput {
    TryAgainLater,
    FormatChanged(TrackFormat),
    Buffer(EncodedBuffer),
}

/// Output side shared by both encoder kinds.
pub trait Encoder {
    /// Poll for the next output, waiting at most `timeout`.
    fn dequeue_output(&mut self, timeout: Duration) -> RecordResult<EncoderOutput>;
    /// No more input follows; output ends with an end-of-stream buffer.
    fn signal_end_of_stream(&mut self) -> RecordResult<()>;
}

pub trait VideoEncoder: Encoder {
    /// Queue one tightly packed, top-left origin RGBA8 frame at the
    /// encoder's dimensions.
    fn queue_frame(&mut self, rgba: &[u8], pts_us: i64) -> RecordResult<()>;
}

pub trait AudioEncoder: Encoder + Send {
    /// Queue interleaved little-endian PCM16.
    fn queue_pcm(&mut self, pcm: &[u8], pts_us: i64) -> RecordResult<()>;
}

/// Container writer. Tracks are added before `start`, samples only after.
pub trait Muxer: Send {
    fn add_track(&mut self, format: &TrackFormat) -> RecordResult<usize>;
    fn start(&mut self) -> RecordResult<()>;
    fn write_sample(&mut self, track: usize, buffer: &EncodedBuffer) -> RecordResult<()>;
    fn stop(&mut self) -> RecordResult<()>;
}

/// Blocking PCM16 capture device. Lives on the audio thread only.
pub trait AudioSource {
    fn sample_rate(&self) -> u32;
    fn channels(&self) -> u16;
    /// Read up to `buf.len()` bytes. Returns 0 when nothing arrived within `timeout`.
    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> RecordResult<usize>;
}

/// Opens the capture device on the thread that will read it.
pub type AudioOpener = Box<dyn FnOnce(&RecordConfig) -> RecordResult<Box<dyn AudioSource>> + Send>;

/// Creates everything a session owns.
///
/// Called in order: muxer, video encoder, then the audio opener and, once
/// the device has opened, the audio encoder.
pub trait EncoderFactory {
    fn create_muxer(&mut self, path: &Path) -> RecordResult<Box<dyn Muxer>>;
    fn create_video(&mut self, width: u32, height: u32, cfg: &RecordConfig) -> RecordResult<Box<dyn VideoEncoder>>;
    /// `None` when this backend has no capture support.
    fn audio_opener(&mut self) -> Option<AudioOpener>;
    fn create_audio(&mut self, sample_rate: u32, channels: u16, cfg: &RecordConfig) -> RecordResult<Box<dyn AudioEncoder>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_know_their_track() {
        let v = TrackFormat::Video { codec: "h264".into(), width: 2, height: 2 };
        let a = TrackFormat::Audio { codec: "aac".into(), sample_rate: 44_100, channels: 1 };
        assert_eq!(v.kind(), TrackKind::Video);
        assert_eq!(a.kind(), TrackKind::Audio);
        assert_ne!(TrackKind::Video.slot(), TrackKind::Audio.slot());
    }

    #[test]
    fn end_of_stream_buffer_is_empty() {
        let eos = EncodedBuffer::end_of_stream(5);
        assert!(eos.flags.end_of_stream);
        assert!(eos.data.is_empty());
        assert!(!EncodedBuffer::sample(vec![1], 0, true).flags.end_of_stream);
    }
}
