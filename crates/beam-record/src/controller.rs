//! Render-thread ownership of the recording lifecycle.
//!
//! Start is deferred to the next tick. Stop is two-phase: any thread may
//! raise the flag and leave a callback; the render thread tears the session
//! down on its next tick, after that tick's frame has reached the encoder.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::codec::EncoderFactory;
use crate::config::RecordConfig;
use crate::session::{EncodeSession, SessionState};

/// Receives the finished file, or `None` if the session produced nothing playable.
pub type StopCallback = Box<dyn FnOnce(Option<PathBuf>) + Send>;

#[derive(Default)]
struct StopSignal {
    requested: AtomicBool,
    callback: Mutex<Option<StopCallback>>,
}

/// Cloneable, thread-safe way to ask for a stop.
#[derive(Clone, Default)]
pub struct StopHandle(Arc<StopSignal>);

impl StopHandle {
    /// Raise the stop flag and park `callback`. Returns `false` without
    /// storing the callback when a stop is already pending.
    pub fn request(&self, callback: StopCallback) -> bool {
        let Ok(mut slot) = self.0.callback.lock() else {
            return false;
        };
        if self
            .0
            .requested
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            log::debug!("Stop already pending, ignoring");
            return false;
        }
        *slot = Some(callback);
        true
    }

    pub fn is_requested(&self) -> bool {
        self.0.requested.load(Ordering::SeqCst)
    }

    /// Consume a pending request. The outer `None` means nothing was requested.
    fn take(&self) -> Option<Option<StopCallback>> {
        if !self.is_requested() {
            return None;
        }
        let callback = self.0.callback.lock().ok().and_then(|mut slot| slot.take());
        self.0.requested.store(false, Ordering::SeqCst);
        Some(callback)
    }
}

pub struct RecordController {
    cfg: RecordConfig,
    factory: Box<dyn EncoderFactory>,
    pending_start: Option<PathBuf>,
    session: Option<EncodeSession>,
    stop: StopHandle,
    last_error: Option<String>,
}

impl RecordController {
    pub fn new(factory: Box<dyn EncoderFactory>, cfg: RecordConfig) -> Self {
        Self {
            cfg,
            factory,
            pending_start: None,
            session: None,
            stop: StopHandle::default(),
            last_error: None,
        }
    }

    pub fn config(&self) -> &RecordConfig {
        &self.cfg
    }

    /// Record to `path` from the next tick on. Ignored while a session is
    /// active or already pending.
    pub fn request_start(&mut self, path: PathBuf) -> bool {
        if self.session.is_some() || self.pending_start.is_some() {
            log::warn!("Recording already active, ignoring start for {}", path.display());
            return false;
        }
        self.pending_start = Some(path);
        true
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn request_stop(&self, callback: StopCallback) -> bool {
        self.stop.request(callback)
    }

    pub fn state(&self) -> SessionState {
        match (&self.session, &self.pending_start) {
            (Some(session), _) => session.state(),
            (None, Some(_)) => SessionState::Starting,
            (None, None) => SessionState::Idle,
        }
    }

    pub fn is_recording(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&self) -> Option<&EncodeSession> {
        self.session.as_ref()
    }

    /// Setup error of the most recent start attempt, if it failed.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Open the pending session for a `width`×`height` frame. Returns the
    /// encoder dimensions so the caller can attach the encoder surface.
    pub fn begin_pending(&mut self, width: u32, height: u32) -> Option<(u32, u32)> {
        let path = self.pending_start.take()?;
        match EncodeSession::start(self.factory.as_mut(), &path, width, height, &self.cfg) {
            Ok(session) => {
                let dims = session.dimensions();
                self.last_error = None;
                self.session = Some(session);
                Some(dims)
            }
            Err(e) => {
                log::error!("Could not start recording {}: {e}", path.display());
                self.last_error = Some(e.to_string());
                None
            }
        }
    }

    /// Presentation time for this tick's encoder frame, or `None` when no
    /// healthy session wants one.
    pub fn frame_pts(&self, now_ns: i64) -> Option<i64> {
        let session = self.session.as_ref()?;
        if session.has_failed() {
            return None;
        }
        Some(session.presentation_time(now_ns))
    }

    /// Feed one frame shown at clock time `now_ns` to the active session.
    /// Failures stay inside the session.
    pub fn submit_frame(&mut self, rgba: &[u8], width: u32, height: u32, now_ns: i64) {
        if let Some(session) = self.session.as_mut() {
            // Logged and latched by the session.
            let _ = session.submit_frame(rgba, width, height, now_ns);
        }
    }

    /// Perform a requested stop. Returns `true` when a session was torn
    /// down and its encoder surface should be released.
    pub fn service_stop(&mut self) -> bool {
        let Some(callback) = self.stop.take() else {
            return false;
        };
        if self.pending_start.take().is_some() {
            log::info!("Recording stopped before it started");
        }
        let torn_down = self.session.is_some();
        let result = self.session.take().and_then(|session| match session.finish() {
            Ok(path) => {
                log::info!("Recording saved to {}", path.display());
                Some(path)
            }
            Err(e) => {
                log::error!("Recording failed: {e}");
                None
            }
        });
        if let Some(callback) = callback {
            callback(result);
        }
        torn_down
    }

    /// Finish any session on engine shutdown. A pending stop callback
    /// still fires.
    pub fn shutdown(&mut self) -> bool {
        if self.session.is_none() && !self.stop.is_requested() {
            self.pending_start = None;
            return false;
        }
        if !self.stop.is_requested() {
            self.stop.request(Box::new(|_| {}));
        }
        self.service_stop()
    }
}
