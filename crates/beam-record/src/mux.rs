//! Serialized access to the container muxer from the render and audio threads.
//!
//! All shared recording state lives behind one mutex: the started flag,
//! track indices, the per-track timestamp floor and the pending queue.
//! Samples can only reach the muxer through [`MuxCoordinator::write_sample`],
//! which holds them back until every active track has registered a format.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use crate::codec::{EncodedBuffer, Encoder, EncoderOutput, Muxer, TrackFormat, TrackKind};
use crate::error::{RecordError, RecordResult};

/// What a [`MuxCoordinator::write_sample`] call did with its buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    Queued,
    Dropped,
}

struct MuxState {
    muxer: Box<dyn Muxer>,
    started: bool,
    stopped: bool,
    expect_audio: bool,
    tracks: [Option<usize>; 2],
    last_pts: [Option<i64>; 2],
    pending: VecDeque<(TrackKind, EncodedBuffer)>,
    pending_per_track: [usize; 2],
    pending_capacity: usize,
    written: [u64; 2],
    dropped: u64,
}

impl MuxState {
    fn try_start(&mut self) -> RecordResult<()> {
        let video_ready = self.tracks[TrackKind::Video.slot()].is_some();
        let audio_ready = !self.expect_audio || self.tracks[TrackKind::Audio.slot()].is_some();
        if self.started || !video_ready || !audio_ready {
            return Ok(());
        }
        self.muxer.start()?;
        self.started = true;
        log::info!(
            "Muxer started ({})",
            if self.expect_audio { "video+audio" } else { "video only" }
        );

        while let Some((kind, buffer)) = self.pending.pop_front() {
            self.pending_per_track[kind.slot()] -= 1;
            self.write_now(kind, buffer)?;
        }
        Ok(())
    }

    fn write_now(&mut self, kind: TrackKind, mut buffer: EncodedBuffer) -> RecordResult<WriteOutcome> {
        let slot = kind.slot();
        let Some(track) = self.tracks[slot] else {
            self.dropped += 1;
            return Ok(WriteOutcome::Dropped);
        };
        // Never let a track's timeline step backwards.
        if let Some(floor) = self.last_pts[slot] {
            if buffer.pts_us < floor {
                log::debug!("Clamping {kind} pts {} to {floor}", buffer.pts_us);
                buffer.pts_us = floor;
            }
        }
        self.muxer.write_sample(track, &buffer)?;
        self.last_pts[slot] = Some(buffer.pts_us);
        self.written[slot] += 1;
        Ok(WriteOutcome::Written)
    }
}

pub struct MuxCoordinator {
    state: Mutex<MuxState>,
}

impl MuxCoordinator {
    pub fn new(muxer: Box<dyn Muxer>, expect_audio: bool, pending_capacity: usize) -> Self {
        Self {
            state: Mutex::new(MuxState {
                muxer,
                started: false,
                stopped: false,
                expect_audio,
                tracks: [None, None],
                last_pts: [None, None],
                pending: VecDeque::new(),
                pending_per_track: [0, 0],
                pending_capacity,
                written: [0, 0],
                dropped: 0,
            }),
        }
    }

    fn lock(&self) -> RecordResult<MutexGuard<'_, MuxState>> {
        self.state
            .lock()
            .map_err(|_| RecordError::muxer("mux state poisoned"))
    }

    /// Add `kind`'s track and start the muxer once every active track is known.
    /// Late announcements after start are ignored.
    pub fn register_track(&self, kind: TrackKind, format: &TrackFormat) -> RecordResult<()> {
        let mut state = self.lock()?;
        if state.started || state.stopped {
            log::warn!("Ignoring {kind} format change after muxer start");
            return Ok(());
        }
        if state.tracks[kind.slot()].is_some() {
            log::warn!("Ignoring repeated {kind} format announcement");
            return Ok(());
        }
        let index = state.muxer.add_track(format)?;
        state.tracks[kind.slot()] = Some(index);
        log::info!("Registered {kind} track #{index}: {format:?}");
        state.try_start()
    }

    /// Stop waiting for an audio track. Any audio held back is discarded.
    pub fn degrade_to_video_only(&self) -> RecordResult<()> {
        let mut state = self.lock()?;
        if !state.expect_audio {
            return Ok(());
        }
        state.expect_audio = false;
        let before = state.pending.len();
        state.pending.retain(|(kind, _)| *kind == TrackKind::Video);
        let discarded = before - state.pending.len();
        state.pending_per_track[TrackKind::Audio.slot()] = 0;
        state.dropped += discarded as u64;
        log::warn!("Audio unavailable, recording video only");
        if !state.started && !state.stopped {
            state.try_start()?;
        }
        Ok(())
    }

    /// Hand a sample to the muxer, or hold it until the muxer starts.
    pub fn write_sample(&self, kind: TrackKind, buffer: EncodedBuffer) -> RecordResult<WriteOutcome> {
        let mut state = self.lock()?;
        if state.stopped {
            state.dropped += 1;
            return Ok(WriteOutcome::Dropped);
        }
        if state.started {
            return state.write_now(kind, buffer);
        }
        if kind == TrackKind::Audio && !state.expect_audio {
            state.dropped += 1;
            return Ok(WriteOutcome::Dropped);
        }
        if state.pending_per_track[kind.slot()] >= state.pending_capacity {
            state.dropped += 1;
            log::warn!("Pending {kind} queue full, dropping sample at {}us", buffer.pts_us);
            return Ok(WriteOutcome::Dropped);
        }
        state.pending_per_track[kind.slot()] += 1;
        state.pending.push_back((kind, buffer));
        Ok(WriteOutcome::Queued)
    }

    /// Finalize the container. Returns whether the muxer ever started, i.e.
    /// whether the output holds a playable file. Idempotent.
    pub fn finish(&self) -> RecordResult<bool> {
        let mut state = self.lock()?;
        if state.stopped {
            return Ok(state.started);
        }
        state.stopped = true;
        let unflushed = state.pending.len();
        if unflushed > 0 {
            log::warn!("Discarding {unflushed} samples that never reached the muxer");
            state.dropped += unflushed as u64;
            state.pending.clear();
        }
        if state.started {
            state.muxer.stop()?;
        }
        Ok(state.started)
    }

    pub fn is_started(&self) -> bool {
        self.lock().map(|s| s.started).unwrap_or(false)
    }

    pub fn has_track(&self, kind: TrackKind) -> bool {
        self.lock().map(|s| s.tracks[kind.slot()].is_some()).unwrap_or(false)
    }

    pub fn expects_audio(&self) -> bool {
        self.lock().map(|s| s.expect_audio).unwrap_or(false)
    }

    pub fn written(&self, kind: TrackKind) -> u64 {
        self.lock().map(|s| s.written[kind.slot()]).unwrap_or(0)
    }

    pub fn dropped(&self) -> u64 {
        self.lock().map(|s| s.dropped).unwrap_or(0)
    }
}

/// How one drain pass ended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainOutcome {
    pub samples: usize,
    pub end_of_stream: bool,
}

/// Pull every ready output from `encoder` into `mux`.
///
/// With `until_eos` unset the pass ends at the first empty poll. With it
/// set, empty polls are retried until the end-of-stream buffer appears or
/// `max_polls` empty polls have passed.
pub fn drain_encoder<E: Encoder + ?Sized>(
    encoder: &mut E,
    mux: &MuxCoordinator,
    kind: TrackKind,
    timeout: Duration,
    until_eos: bool,
    max_polls: u32,
) -> RecordResult<DrainOutcome> {
    let mut outcome = DrainOutcome::default();
    let mut empty_polls = 0;
    loop {
        match encoder.dequeue_output(timeout)? {
            EncoderOutput::TryAgainLater => {
                if !until_eos {
                    break;
                }
                empty_polls += 1;
                if empty_polls >= max_polls {
                    log::warn!("{kind} encoder did not reach end of stream after {max_polls} polls");
                    break;
                }
            }
            EncoderOutput::FormatChanged(format) => mux.register_track(kind, &format)?,
            EncoderOutput::Buffer(buffer) => {
                let eos = buffer.flags.end_of_stream;
                if !buffer.flags.codec_config && !buffer.data.is_empty() {
                    mux.write_sample(kind, buffer)?;
                    outcome.samples += 1;
                }
                if eos {
                    outcome.end_of_stream = true;
                    break;
                }
            }
        }
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryMuxer, MuxEvent};

    fn video_format() -> TrackFormat {
        TrackFormat::Video { codec: "test".into(), width: 4, height: 4 }
    }

    fn audio_format() -> TrackFormat {
        TrackFormat::Audio { codec: "test".into(), sample_rate: 44_100, channels: 1 }
    }

    #[test]
    fn waits_for_every_active_track() {
        let (muxer, log) = MemoryMuxer::new();
        let mux = MuxCoordinator::new(Box::new(muxer), true, 8);
        mux.register_track(TrackKind::Video, &video_format()).unwrap();
        assert!(!mux.is_started());
        mux.register_track(TrackKind::Audio, &audio_format()).unwrap();
        assert!(mux.is_started());
        assert_eq!(log.count(|e| matches!(e, MuxEvent::Start)), 1);
    }

    #[test]
    fn early_samples_are_flushed_in_order_after_start() {
        let (muxer, log) = MemoryMuxer::new();
        let mux = MuxCoordinator::new(Box::new(muxer), true, 8);
        mux.register_track(TrackKind::Video, &video_format()).unwrap();
        let out = mux
            .write_sample(TrackKind::Video, EncodedBuffer::sample(vec![1], 0, true))
            .unwrap();
        assert_eq!(out, WriteOutcome::Queued);
        mux.write_sample(TrackKind::Video, EncodedBuffer::sample(vec![2], 33_000, false))
            .unwrap();
        assert_eq!(log.samples().len(), 0);

        mux.register_track(TrackKind::Audio, &audio_format()).unwrap();
        let pts: Vec<i64> = log.samples().iter().map(|s| s.pts_us).collect();
        assert_eq!(pts, vec![0, 33_000]);
    }

    #[test]
    fn pts_never_decreases_per_track() {
        let (muxer, log) = MemoryMuxer::new();
        let mux = MuxCoordinator::new(Box::new(muxer), false, 8);
        mux.register_track(TrackKind::Video, &video_format()).unwrap();
        for pts in [0, 40, 20, 60] {
            mux.write_sample(TrackKind::Video, EncodedBuffer::sample(vec![0], pts, false))
                .unwrap();
        }
        let pts: Vec<i64> = log.samples().iter().map(|s| s.pts_us).collect();
        assert_eq!(pts, vec![0, 40, 40, 60]);
    }

    #[test]
    fn pending_queue_is_bounded() {
        let (muxer, _log) = MemoryMuxer::new();
        let mux = MuxCoordinator::new(Box::new(muxer), true, 2);
        for i in 0..5 {
            mux.write_sample(TrackKind::Audio, EncodedBuffer::sample(vec![0], i, false))
                .unwrap();
        }
        assert_eq!(mux.dropped(), 3);
    }

    #[test]
    fn degrading_starts_a_video_only_muxer() {
        let (muxer, log) = MemoryMuxer::new();
        let mux = MuxCoordinator::new(Box::new(muxer), true, 8);
        mux.write_sample(TrackKind::Audio, EncodedBuffer::sample(vec![9], 0, false))
            .unwrap();
        mux.register_track(TrackKind::Video, &video_format()).unwrap();
        mux.degrade_to_video_only().unwrap();
        assert!(mux.is_started());
        assert!(log.samples().is_empty());
        assert_eq!(mux.dropped(), 1);
    }

    #[test]
    fn finish_without_start_reports_no_file() {
        let (muxer, log) = MemoryMuxer::new();
        let mux = MuxCoordinator::new(Box::new(muxer), false, 8);
        assert!(!mux.finish().unwrap());
        assert!(!mux.finish().unwrap());
        assert_eq!(log.count(|e| matches!(e, MuxEvent::Stop)), 0);
    }
}
