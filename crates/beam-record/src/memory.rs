//! In-memory codec backend. Encoders pass input straight through as
//! samples, the muxer logs every call, and the capture device produces
//! silence at a fixed pace. Used headless and in tests.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crate::codec::{
    AudioEncoder, AudioOpener, AudioSource, BufferFlags, EncodedBuffer, Encoder, EncoderFactory, EncoderOutput,
    Muxer, TrackFormat, TrackKind, VideoEncoder,
};
use crate::config::RecordConfig;
use crate::error::{RecordError, RecordResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleRecord {
    pub track: usize,
    pub kind: TrackKind,
    pub pts_us: i64,
    pub len: usize,
    pub key_frame: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MuxEvent {
    AddTrack { index: usize, kind: TrackKind },
    Start,
    Sample(SampleRecord),
    Stop,
    /// A call the container would reject, e.g. a sample before start.
    Violation(String),
}

/// Shared view of everything a [`MemoryMuxer`] was asked to do.
#[derive(Debug, Clone, Default)]
pub struct MuxLog(Arc<Mutex<Vec<MuxEvent>>>);

impl MuxLog {
    fn push(&self, event: MuxEvent) {
        if let Ok(mut events) = self.0.lock() {
            events.push(event);
        }
    }

    pub fn events(&self) -> Vec<MuxEvent> {
        self.0.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn count(&self, pred: impl Fn(&MuxEvent) -> bool) -> usize {
        self.events().iter().filter(|e| pred(e)).count()
    }

    pub fn samples(&self) -> Vec<SampleRecord> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                MuxEvent::Sample(s) => Some(s),
                _ => None,
            })
            .collect()
    }

    pub fn samples_of(&self, kind: TrackKind) -> Vec<SampleRecord> {
        self.samples().into_iter().filter(|s| s.kind == kind).collect()
    }

    pub fn violations(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                MuxEvent::Violation(v) => Some(v),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        if let Ok(mut events) = self.0.lock() {
            events.clear();
        }
    }
}

pub struct MemoryMuxer {
    log: MuxLog,
    kinds: Vec<TrackKind>,
    started: bool,
    stopped: bool,
}

impl MemoryMuxer {
    pub fn new() -> (Self, MuxLog) {
        let log = MuxLog::default();
        (Self::with_log(log.clone()), log)
    }

    pub fn with_log(log: MuxLog) -> Self {
        Self { log, kinds: Vec::new(), started: false, stopped: false }
    }

    fn violation(&self, msg: String) -> RecordError {
        self.log.push(MuxEvent::Violation(msg.clone()));
        RecordError::muxer(msg)
    }
}

impl Muxer for MemoryMuxer {
    fn add_track(&mut self, format: &TrackFormat) -> RecordResult<usize> {
        if self.started {
            return Err(self.violation("track added after start".into()));
        }
        let index = self.kinds.len();
        self.kinds.push(format.kind());
        self.log.push(MuxEvent::AddTrack { index, kind: format.kind() });
        Ok(index)
    }

    fn start(&mut self) -> RecordResult<()> {
        if self.started {
            return Err(self.violation("started twice".into()));
        }
        self.started = true;
        self.log.push(MuxEvent::Start);
        Ok(())
    }

    fn write_sample(&mut self, track: usize, buffer: &EncodedBuffer) -> RecordResult<()> {
        if !self.started || self.stopped {
            return Err(self.violation(format!("sample on track {track} outside started window")));
        }
        let Some(&kind) = self.kinds.get(track) else {
            return Err(self.violation(format!("unknown track {track}")));
        };
        self.log.push(MuxEvent::Sample(SampleRecord {
            track,
            kind,
            pts_us: buffer.pts_us,
            len: buffer.data.len(),
            key_frame: buffer.flags.key_frame,
        }));
        Ok(())
    }

    fn stop(&mut self) -> RecordResult<()> {
        if !self.started {
            return Err(self.violation("stopped before start".into()));
        }
        self.stopped = true;
        self.log.push(MuxEvent::Stop);
        Ok(())
    }
}

/// Pass-through encoder core shared by the video and audio flavours.
struct Passthrough {
    format: TrackFormat,
    announced: bool,
    latency: usize,
    held: VecDeque<EncodedBuffer>,
    ready: VecDeque<EncoderOutput>,
    ended: bool,
    fail_after: Option<u64>,
    queued: u64,
}

impl Passthrough {
    fn new(format: TrackFormat, latency: usize) -> Self {
        Self {
            format,
            announced: false,
            latency,
            held: VecDeque::new(),
            ready: VecDeque::new(),
            ended: false,
            fail_after: None,
            queued: 0,
        }
    }

    fn queue(&mut self, data: &[u8], pts_us: i64, key_frame: bool) -> RecordResult<()> {
        if self.ended {
            return Err(RecordError::encoder("input after end of stream"));
        }
        if self.fail_after.is_some_and(|n| self.queued >= n) {
            return Err(RecordError::encoder("device lost"));
        }
        self.queued += 1;
        if !self.announced {
            self.announced = true;
            self.ready.push_back(EncoderOutput::FormatChanged(self.format.clone()));
            self.ready.push_back(EncoderOutput::Buffer(EncodedBuffer {
                data: vec![0xC0, 0xDE],
                pts_us: 0,
                flags: BufferFlags { codec_config: true, ..BufferFlags::default() },
            }));
        }
        // Keep a short prefix as the payload; empty input still yields a sample.
        let mut payload = data[..data.len().min(64)].to_vec();
        if payload.is_empty() {
            payload.push(0);
        }
        self.held.push_back(EncodedBuffer::sample(payload, pts_us, key_frame));
        while self.held.len() > self.latency {
            if let Some(b) = self.held.pop_front() {
                self.ready.push_back(EncoderOutput::Buffer(b));
            }
        }
        Ok(())
    }

    fn end(&mut self) {
        if self.ended {
            return;
        }
        self.ended = true;
        let last_pts = self.held.back().map(|b| b.pts_us).unwrap_or(0);
        while let Some(b) = self.held.pop_front() {
            self.ready.push_back(EncoderOutput::Buffer(b));
        }
        self.ready.push_back(EncoderOutput::Buffer(EncodedBuffer::end_of_stream(last_pts)));
    }

    fn poll(&mut self) -> EncoderOutput {
        self.ready.pop_front().unwrap_or(EncoderOutput::TryAgainLater)
    }
}

pub struct MemoryVideoEncoder {
    core: Passthrough,
    frame_bytes: usize,
}

impl MemoryVideoEncoder {
    pub fn new(width: u32, height: u32) -> Self {
        let format = TrackFormat::Video { codec: "raw".into(), width, height };
        Self { core: Passthrough::new(format, 0), frame_bytes: (width * height * 4) as usize }
    }

    /// Hold back `frames` outputs until later input or end of stream pushes them out.
    pub fn with_latency(mut self, frames: usize) -> Self {
        self.core.latency = frames;
        self
    }

    /// Reject every frame after the first `frames`.
    pub fn failing_after(mut self, frames: u64) -> Self {
        self.core.fail_after = Some(frames);
        self
    }
}

impl Encoder for MemoryVideoEncoder {
    fn dequeue_output(&mut self, _timeout: Duration) -> RecordResult<EncoderOutput> {
        Ok(self.core.poll())
    }

    fn signal_end_of_stream(&mut self) -> RecordResult<()> {
        self.core.end();
        Ok(())
    }
}

impl VideoEncoder for MemoryVideoEncoder {
    fn queue_frame(&mut self, rgba: &[u8], pts_us: i64) -> RecordResult<()> {
        if rgba.len() != self.frame_bytes {
            return Err(RecordError::encoder(format!(
                "frame is {} bytes, expected {}",
                rgba.len(),
                self.frame_bytes
            )));
        }
        self.core.queue(rgba, pts_us, true)
    }
}

pub struct MemoryAudioEncoder {
    core: Passthrough,
}

impl MemoryAudioEncoder {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        let format = TrackFormat::Audio { codec: "pcm".into(), sample_rate, channels };
        Self { core: Passthrough::new(format, 0) }
    }
}

impl Encoder for MemoryAudioEncoder {
    fn dequeue_output(&mut self, timeout: Duration) -> RecordResult<EncoderOutput> {
        let out = self.core.poll();
        if out == EncoderOutput::TryAgainLater && !timeout.is_zero() {
            thread::sleep(timeout.min(Duration::from_millis(1)));
        }
        Ok(out)
    }

    fn signal_end_of_stream(&mut self) -> RecordResult<()> {
        self.core.end();
        Ok(())
    }
}

impl AudioEncoder for MemoryAudioEncoder {
    fn queue_pcm(&mut self, pcm: &[u8], pts_us: i64) -> RecordResult<()> {
        self.core.queue(pcm, pts_us, false)
    }
}

/// Produces silence in `chunk`-byte reads, one read per `pace`.
pub struct MemoryAudioSource {
    sample_rate: u32,
    channels: u16,
    chunk: usize,
    pace: Duration,
}

impl MemoryAudioSource {
    pub fn new(sample_rate: u32, channels: u16, chunk: usize, pace: Duration) -> Self {
        Self { sample_rate, channels, chunk, pace }
    }
}

impl AudioSource for MemoryAudioSource {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> RecordResult<usize> {
        thread::sleep(self.pace.min(timeout));
        let n = self.chunk.min(buf.len());
        buf[..n].fill(0);
        Ok(n)
    }
}

/// Audio behaviour of a [`MemoryFactory`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioMode {
    /// Backend without capture support.
    Absent,
    /// Capture works; one read per `pace`.
    Working { pace: Duration },
    /// The capture device refuses to open.
    DeviceFails,
    /// The device opens but no audio encoder can be created.
    EncoderFails,
}

pub struct MemoryFactory {
    log: MuxLog,
    audio: AudioMode,
    video_fails: bool,
    video_latency: usize,
    video_fail_after: Option<u64>,
    sessions: usize,
}

impl MemoryFactory {
    pub fn new(audio: AudioMode) -> Self {
        Self {
            log: MuxLog::default(),
            audio,
            video_fails: false,
            video_latency: 0,
            video_fail_after: None,
            sessions: 0,
        }
    }

    pub fn log(&self) -> MuxLog {
        self.log.clone()
    }

    pub fn sessions(&self) -> usize {
        self.sessions
    }

    pub fn with_video_failure(mut self) -> Self {
        self.video_fails = true;
        self
    }

    pub fn with_video_latency(mut self, frames: usize) -> Self {
        self.video_latency = frames;
        self
    }

    pub fn with_video_lost_after(mut self, frames: u64) -> Self {
        self.video_fail_after = Some(frames);
        self
    }

    fn silence(pace: Duration) -> AudioOpener {
        Box::new(move |cfg: &RecordConfig| -> RecordResult<Box<dyn AudioSource>> {
            Ok(Box::new(MemoryAudioSource::new(
                cfg.audio_sample_rate,
                cfg.audio_channels,
                cfg.audio_read_bytes,
                pace,
            )))
        })
    }
}

impl EncoderFactory for MemoryFactory {
    fn create_muxer(&mut self, _path: &Path) -> RecordResult<Box<dyn Muxer>> {
        self.sessions += 1;
        Ok(Box::new(MemoryMuxer::with_log(self.log.clone())))
    }

    fn create_video(&mut self, width: u32, height: u32, _cfg: &RecordConfig) -> RecordResult<Box<dyn VideoEncoder>> {
        if self.video_fails {
            return Err(RecordError::unavailable("no video encoder"));
        }
        let mut encoder = MemoryVideoEncoder::new(width, height).with_latency(self.video_latency);
        if let Some(n) = self.video_fail_after {
            encoder = encoder.failing_after(n);
        }
        Ok(Box::new(encoder))
    }

    fn audio_opener(&mut self) -> Option<AudioOpener> {
        match self.audio {
            AudioMode::Absent => None,
            AudioMode::DeviceFails => Some(Box::new(|_cfg: &RecordConfig| -> RecordResult<Box<dyn AudioSource>> {
                Err(RecordError::audio("permission denied"))
            })),
            AudioMode::Working { pace } => Some(Self::silence(pace)),
            AudioMode::EncoderFails => Some(Self::silence(Duration::from_millis(5))),
        }
    }

    fn create_audio(&mut self, sample_rate: u32, channels: u16, _cfg: &RecordConfig) -> RecordResult<Box<dyn AudioEncoder>> {
        if self.audio == AudioMode::EncoderFails {
            return Err(RecordError::unavailable("no audio encoder"));
        }
        Ok(Box::new(MemoryAudioEncoder::new(sample_rate, channels)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn video_encoder_announces_format_then_config_then_samples() {
        let mut enc = MemoryVideoEncoder::new(1, 1);
        enc.queue_frame(&[1, 2, 3, 4], 0).unwrap();
        assert!(matches!(enc.dequeue_output(Duration::ZERO).unwrap(), EncoderOutput::FormatChanged(_)));
        match enc.dequeue_output(Duration::ZERO).unwrap() {
            EncoderOutput::Buffer(b) => assert!(b.flags.codec_config),
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(enc.dequeue_output(Duration::ZERO).unwrap(), EncoderOutput::Buffer(_)));
        assert_eq!(enc.dequeue_output(Duration::ZERO).unwrap(), EncoderOutput::TryAgainLater);
    }

    #[test]
    fn latency_holds_output_until_end_of_stream() {
        let mut enc = MemoryVideoEncoder::new(1, 1).with_latency(2);
        enc.queue_frame(&[0; 4], 0).unwrap();
        enc.queue_frame(&[0; 4], 10).unwrap();
        let mut samples = 0;
        while let EncoderOutput::FormatChanged(_) | EncoderOutput::Buffer(_) = enc.dequeue_output(Duration::ZERO).unwrap() {
            samples += 1;
        }
        assert_eq!(samples, 2, "format + codec config only");
        enc.signal_end_of_stream().unwrap();
        let mut outputs = Vec::new();
        loop {
            match enc.dequeue_output(Duration::ZERO).unwrap() {
                EncoderOutput::Buffer(b) if b.flags.end_of_stream => break,
                EncoderOutput::Buffer(b) => outputs.push(b.pts_us),
                _ => panic!("expected buffers"),
            }
        }
        assert_eq!(outputs, vec![0, 10]);
    }

    #[test]
    fn muxer_flags_samples_before_start() {
        let (mut muxer, log) = MemoryMuxer::new();
        assert!(muxer.write_sample(0, &EncodedBuffer::sample(vec![1], 0, true)).is_err());
        assert_eq!(log.violations().len(), 1);
    }
}
