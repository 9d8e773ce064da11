use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Encoder, capture and teardown settings for one recording session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordConfig {
    pub fps: u32,
    pub video_bit_rate: usize,
    /// Seconds between key frames.
    pub i_frame_interval_secs: u32,

    pub audio_sample_rate: u32,
    pub audio_channels: u16,
    pub audio_bit_rate: usize,
    /// Size of one blocking capture read.
    pub audio_read_bytes: usize,

    /// Output poll wait on the render thread. Zero keeps it non-blocking.
    pub video_drain_timeout_ms: u64,
    pub audio_drain_timeout_ms: u64,
    /// How long session start waits for the capture device to open.
    pub audio_open_timeout_ms: u64,

    /// Samples per track held back while the muxer waits for formats.
    pub pending_capacity: usize,
    /// Poll limit when flushing an encoder to its end-of-stream marker.
    pub final_drain_polls: u32,
}

impl Default for RecordConfig {
    fn default() -> Self {
        Self {
            fps: 30,
            video_bit_rate: 6_000_000,
            i_frame_interval_secs: 1,
            audio_sample_rate: 44_100,
            audio_channels: 1,
            audio_bit_rate: 128_000,
            audio_read_bytes: 2048,
            video_drain_timeout_ms: 0,
            audio_drain_timeout_ms: 10,
            audio_open_timeout_ms: 500,
            pending_capacity: 256,
            final_drain_polls: 200,
        }
    }
}

impl RecordConfig {
    pub fn video_drain_timeout(&self) -> Duration {
        Duration::from_millis(self.video_drain_timeout_ms)
    }

    pub fn audio_drain_timeout(&self) -> Duration {
        Duration::from_millis(self.audio_drain_timeout_ms)
    }

    pub fn audio_open_timeout(&self) -> Duration {
        Duration::from_millis(self.audio_open_timeout_ms)
    }

    /// Bytes per PCM16 frame across all channels.
    pub fn audio_frame_bytes(&self) -> u32 {
        2 * u32::from(self.audio_channels.max(1))
    }
}
