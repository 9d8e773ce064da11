use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::audio::AudioWorker;
use crate::codec::{EncoderFactory, TrackKind, VideoEncoder};
use crate::config::RecordConfig;
use crate::error::{RecordError, RecordResult};
use crate::mux::{drain_encoder, MuxCoordinator};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Starting,
    Recording,
    Stopping,
    Draining,
    Released,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Round both dimensions down to even, as most video codecs require.
pub fn even_dimensions(width: u32, height: u32) -> (u32, u32) {
    (width & !1, height & !1)
}

/// Copy the top-left `dst_w`×`dst_h` region out of a packed RGBA8 image.
pub fn crop_rgba(src: &[u8], src_w: u32, src_h: u32, dst_w: u32, dst_h: u32) -> Option<Vec<u8>> {
    if dst_w > src_w || dst_h > src_h || src.len() != (src_w * src_h * 4) as usize {
        return None;
    }
    if dst_w == src_w && dst_h == src_h {
        return Some(src.to_vec());
    }
    let src_row = (src_w * 4) as usize;
    let dst_row = (dst_w * 4) as usize;
    let mut out = Vec::with_capacity(dst_row * dst_h as usize);
    for row in src.chunks_exact(src_row).take(dst_h as usize) {
        out.extend_from_slice(&row[..dst_row]);
    }
    Some(out)
}

/// One recording: a video encoder, an optional audio worker, one muxer.
pub struct EncodeSession {
    state: SessionState,
    path: PathBuf,
    width: u32,
    height: u32,
    cfg: RecordConfig,
    video: Box<dyn VideoEncoder>,
    audio: Option<AudioWorker>,
    mux: Arc<MuxCoordinator>,
    first_frame_ns: Option<i64>,
    frames: u64,
    failed: bool,
}

impl EncodeSession {
    /// Allocate encoders and the muxer for `path`. Audio failures degrade
    /// the session to video only; video failures abort it.
    pub fn start(
        factory: &mut dyn EncoderFactory,
        path: &Path,
        width: u32,
        height: u32,
        cfg: &RecordConfig,
    ) -> RecordResult<Self> {
        let (width, height) = even_dimensions(width, height);
        if width == 0 || height == 0 {
            return Err(RecordError::unavailable(format!("cannot record a {width}x{height} frame")));
        }
        log::info!("Starting recording {width}x{height} to {}", path.display());

        let muxer = factory.create_muxer(path)?;
        let video = factory.create_video(width, height, cfg)?;

        let opener = factory.audio_opener();
        let mux = Arc::new(MuxCoordinator::new(muxer, opener.is_some(), cfg.pending_capacity));

        let audio = match opener {
            Some(opener) => {
                let spawned = AudioWorker::spawn(
                    opener,
                    |rate, channels| factory.create_audio(rate, channels, cfg),
                    Arc::clone(&mux),
                    cfg,
                );
                match spawned {
                    Ok(worker) => Some(worker),
                    Err(e) => {
                        log::warn!("Audio setup failed: {e}");
                        mux.degrade_to_video_only()?;
                        None
                    }
                }
            }
            None => None,
        };

        Ok(Self {
            state: SessionState::Recording,
            path: path.to_path_buf(),
            width,
            height,
            cfg: cfg.clone(),
            video,
            audio,
            mux,
            first_frame_ns: None,
            frames: 0,
            failed: false,
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn has_audio(&self) -> bool {
        self.audio.is_some()
    }

    pub fn has_failed(&self) -> bool {
        self.failed
    }

    pub fn mux(&self) -> &MuxCoordinator {
        &self.mux
    }

    /// Session-relative presentation time a frame shown at `now_ns` would
    /// get. Zero until the first frame is submitted.
    pub fn presentation_time(&self, now_ns: i64) -> i64 {
        let first = self.first_frame_ns.unwrap_or(now_ns);
        (now_ns - first).max(0)
    }

    /// Encode one frame read back from a `src_w`×`src_h` image at clock
    /// time `now_ns`, then pull whatever the encoder has ready without
    /// blocking. The first submitted frame fixes the session's time origin.
    ///
    /// A failure marks the session failed; later frames are ignored and
    /// [`finish`](Self::finish) reports no file.
    pub fn submit_frame(&mut self, rgba: &[u8], src_w: u32, src_h: u32, now_ns: i64) -> RecordResult<()> {
        if self.state != SessionState::Recording {
            return Err(RecordError::State("frames are only accepted while recording"));
        }
        if self.failed {
            return Ok(());
        }
        let first = *self.first_frame_ns.get_or_insert(now_ns);
        let pts_ns = (now_ns - first).max(0);
        let result = self.encode(rgba, src_w, src_h, pts_ns);
        if let Err(e) = &result {
            log::error!("Video encoding failed, session {} is lost: {e}", self.path.display());
            self.failed = true;
        }
        result
    }

    fn encode(&mut self, rgba: &[u8], src_w: u32, src_h: u32, pts_ns: i64) -> RecordResult<()> {
        let frame = crop_rgba(rgba, src_w, src_h, self.width, self.height).ok_or_else(|| {
            RecordError::encoder(format!(
                "{src_w}x{src_h} frame cannot feed a {}x{} encoder",
                self.width, self.height
            ))
        })?;
        self.video.queue_frame(&frame, pts_ns / 1_000)?;
        self.frames += 1;
        drain_encoder(
            self.video.as_mut(),
            &self.mux,
            TrackKind::Video,
            self.cfg.video_drain_timeout(),
            false,
            0,
        )?;
        Ok(())
    }

    /// Tear the session down: signal end of stream, flush both encoders,
    /// join the audio thread, finalize the container. Returns the output
    /// path if the file is playable.
    pub fn finish(mut self) -> RecordResult<PathBuf> {
        self.state = SessionState::Stopping;
        let audio_result = self.audio.take().map(AudioWorker::stop);
        // An audio track that never announced a format must not hold back video.
        if !self.mux.has_track(TrackKind::Audio) {
            if let Err(e) = self.mux.degrade_to_video_only() {
                log::warn!("Could not release the muxer from audio: {e}");
            }
        }
        let eos = self.video.signal_end_of_stream();

        self.state = SessionState::Draining;
        let drained = eos.and_then(|_| {
            drain_encoder(
                self.video.as_mut(),
                &self.mux,
                TrackKind::Video,
                self.cfg.video_drain_timeout(),
                true,
                self.cfg.final_drain_polls,
            )
        });
        if let Some(Err(e)) = &audio_result {
            log::warn!("Audio track ended with an error: {e}");
        }

        self.state = SessionState::Released;
        let finalized = self.mux.finish();
        log::info!(
            "Recording {} released after {} frames ({} video, {} audio samples)",
            self.path.display(),
            self.frames,
            self.mux.written(TrackKind::Video),
            self.mux.written(TrackKind::Audio)
        );

        if self.failed {
            return Err(RecordError::encoder("session lost its video encoder"));
        }
        drained?;
        if !finalized? {
            return Err(RecordError::muxer("no frame reached the muxer"));
        }
        Ok(self.path)
    }
}
