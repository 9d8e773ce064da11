//! Audio capture thread.
//!
//! The capture device is opened on the worker itself so backends whose
//! streams cannot cross threads still work. Session start waits for the
//! device to open, then hands over the encoder.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, RecvTimeoutError};

use crate::codec::{AudioEncoder, AudioOpener, AudioSource, TrackKind};
use crate::config::RecordConfig;
use crate::error::{RecordError, RecordResult};
use crate::mux::{drain_encoder, MuxCoordinator};

/// Presentation times for a PCM16 stream, derived from bytes captured.
///
/// Each buffer is stamped with the byte count captured before it, so the
/// first sample sits at zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioTimestamper {
    sample_rate: u32,
    frame_bytes: u32,
    total_bytes: u64,
}

impl AudioTimestamper {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate: sample_rate.max(1),
            frame_bytes: 2 * u32::from(channels.max(1)),
            total_bytes: 0,
        }
    }

    /// Timestamp for a buffer of `bytes` just read, in microseconds.
    pub fn stamp(&mut self, bytes: usize) -> i64 {
        let pts = self.pts_at(self.total_bytes);
        self.total_bytes += bytes as u64;
        pts
    }

    pub fn pts_at(&self, bytes: u64) -> i64 {
        let per_second = u64::from(self.sample_rate) * u64::from(self.frame_bytes);
        (bytes * 1_000_000 / per_second) as i64
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }
}

/// Running capture thread. Dropping it without [`stop`](Self::stop) still
/// signals the thread, but does not wait for it.
pub struct AudioWorker {
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<RecordResult<u64>>>,
}

impl AudioWorker {
    /// Open the capture device on a new thread and start feeding `mux`.
    ///
    /// `make_encoder` runs on the caller's thread once the device reports
    /// its rate and channel count. Any failure here leaves no thread behind.
    pub fn spawn<F>(
        opener: AudioOpener,
        make_encoder: F,
        mux: Arc<MuxCoordinator>,
        cfg: &RecordConfig,
    ) -> RecordResult<Self>
    where
        F: FnOnce(u32, u16) -> RecordResult<Box<dyn AudioEncoder>>,
    {
        let (ready_tx, ready_rx) = channel::bounded::<RecordResult<(u32, u16)>>(1);
        let (encoder_tx, encoder_rx) = channel::bounded::<Box<dyn AudioEncoder>>(1);
        let running = Arc::new(AtomicBool::new(true));

        let thread_cfg = cfg.clone();
        let thread_running = Arc::clone(&running);
        let handle = thread::Builder::new()
            .name("beam-audio".to_string())
            .spawn(move || -> RecordResult<u64> {
                let source = match opener(&thread_cfg) {
                    Ok(source) => source,
                    Err(e) => {
                        let msg = e.to_string();
                        let _ = ready_tx.send(Err(e));
                        return Err(RecordError::audio(msg));
                    }
                };
                let _ = ready_tx.send(Ok((source.sample_rate(), source.channels())));
                // Disconnected means setup gave up on audio.
                let Ok(encoder) = encoder_rx.recv() else {
                    return Ok(0);
                };
                capture_loop(source, encoder, &mux, &thread_running, &thread_cfg)
            })?;

        let mut worker = Self { running, thread: Some(handle) };

        let setup = match ready_rx.recv_timeout(cfg.audio_open_timeout()) {
            Ok(Ok((rate, channels))) => make_encoder(rate, channels).map(|e| (e, rate, channels)),
            Ok(Err(e)) => Err(e),
            Err(RecvTimeoutError::Timeout) => Err(RecordError::audio("capture device did not open in time")),
            Err(RecvTimeoutError::Disconnected) => Err(RecordError::audio("capture thread exited during setup")),
        };
        let (encoder, rate, channels) = match setup {
            Ok(ready) => ready,
            Err(e) => {
                // Closing the handoff channel releases a thread still waiting for its encoder.
                drop(encoder_tx);
                worker.abandon();
                return Err(e);
            }
        };
        if encoder_tx.send(encoder).is_err() {
            worker.abandon();
            return Err(RecordError::audio("capture thread exited during setup"));
        }
        log::info!("Audio capture running at {rate} Hz, {channels} ch");
        Ok(worker)
    }

    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Tell the thread to stop capturing, then wait for it to flush its
    /// encoder. Returns the number of PCM bytes captured.
    pub fn stop(mut self) -> RecordResult<u64> {
        self.running.store(false, Ordering::SeqCst);
        match self.thread.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| RecordError::audio("audio thread panicked"))?,
            None => Ok(0),
        }
    }

    fn abandon(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread.take() {
            // The thread only blocks on setup channels here, which are closed.
            let _ = handle.join();
        }
    }
}

impl Drop for AudioWorker {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

fn capture_loop(
    mut source: Box<dyn AudioSource>,
    mut encoder: Box<dyn AudioEncoder>,
    mux: &MuxCoordinator,
    running: &AtomicBool,
    cfg: &RecordConfig,
) -> RecordResult<u64> {
    let mut stamper = AudioTimestamper::new(source.sample_rate(), source.channels());
    let mut buf = vec![0u8; cfg.audio_read_bytes.max(2)];
    let timeout = cfg.audio_drain_timeout();
    let mut failed = false;

    while running.load(Ordering::SeqCst) {
        let n = match source.read(&mut buf, timeout) {
            Ok(n) => n,
            Err(e) => {
                log::error!("Audio capture failed: {e}");
                failed = true;
                break;
            }
        };
        if n == 0 {
            continue;
        }
        let pts = stamper.stamp(n);
        let step = encoder
            .queue_pcm(&buf[..n], pts)
            .and_then(|_| drain_encoder(encoder.as_mut(), mux, TrackKind::Audio, timeout, false, 0));
        if let Err(e) = step {
            log::error!("Audio encoding failed: {e}");
            failed = true;
            break;
        }
    }

    if failed && !mux.is_started() {
        mux.degrade_to_video_only()?;
    }

    encoder.signal_end_of_stream()?;
    let outcome = drain_encoder(
        encoder.as_mut(),
        mux,
        TrackKind::Audio,
        timeout,
        true,
        cfg.final_drain_polls,
    )?;
    log::debug!(
        "Audio drained: {} bytes captured, end of stream {}",
        stamper.total_bytes(),
        outcome.end_of_stream
    );
    Ok(stamper.total_bytes())
}
