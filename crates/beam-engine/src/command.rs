//! Control input for the render thread.
//!
//! Control threads never touch engine state directly. They enqueue
//! [`ControlCommand`]s through a [`ControlHandle`], and the render thread
//! applies everything queued once per tick. Surface lifecycle events
//! travel on their own unbounded lane so a flooded queue can never lose
//! a detach.

use std::path::PathBuf;

use beam_core::ParamId;
use beam_record::{StopCallback, StopHandle};
use beam_render::SurfaceKind;
use crossbeam::channel::{Sender, TrySendError};

/// One RGBA8 readback of the offscreen target, top-left origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StillImage {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

pub type StillCallback = Box<dyn FnOnce(StillImage) + Send>;

/// Display attach/detach notifications, allowed in any order and before
/// the first tick.
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceEvent<N> {
    Available { kind: SurfaceKind, native: N, width: u32, height: u32 },
    Unavailable { kind: SurfaceKind },
}

pub enum ControlCommand<N> {
    SetBase { id: ParamId, value: i32 },
    SetModRate { id: ParamId, rate: i32 },
    SetModDepth { id: ParamId, depth: i32 },
    /// Restore one parameter to its default, modulation off.
    Reset(ParamId),
    GlobalReset,
    /// Crossfade to a bank slot (1-based).
    ApplyPreset(usize),
    /// Capture the current state into a bank slot.
    SavePreset(usize),
    /// Transition length as a 0..1000 control.
    SetTransition(i32),
    SetAxis(u32),
    SetAxisLocked(bool),
    SetFlipX(f32),
    SetFlipY(f32),
    SetRot180(bool),
    Surface(SurfaceEvent<N>),
    StartRecording(PathBuf),
    CaptureStill(StillCallback),
}

/// Cloneable sender side of the engine's command queue.
pub struct ControlHandle<N> {
    tx: Sender<ControlCommand<N>>,
    surfaces: Sender<SurfaceEvent<N>>,
    stop: StopHandle,
}

impl<N> Clone for ControlHandle<N> {
    fn clone(&self) -> Self {
        Self { tx: self.tx.clone(), surfaces: self.surfaces.clone(), stop: self.stop.clone() }
    }
}

impl<N> ControlHandle<N> {
    pub(crate) fn new(tx: Sender<ControlCommand<N>>, surfaces: Sender<SurfaceEvent<N>>, stop: StopHandle) -> Self {
        Self { tx, surfaces, stop }
    }

    /// Queue `cmd` for the next tick. Returns `false` if the queue is full
    /// or the engine is gone; the command is dropped in both cases.
    /// Surface events are never dropped for lack of room.
    pub fn send(&self, cmd: ControlCommand<N>) -> bool {
        let cmd = match cmd {
            ControlCommand::Surface(event) => return self.surfaces.send(event).is_ok(),
            cmd => cmd,
        };
        match self.tx.try_send(cmd) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                log::warn!("Command queue full, dropping command");
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    pub fn set_base(&self, id: ParamId, value: i32) -> bool {
        self.send(ControlCommand::SetBase { id, value })
    }

    pub fn set_mod_rate(&self, id: ParamId, rate: i32) -> bool {
        self.send(ControlCommand::SetModRate { id, rate })
    }

    pub fn set_mod_depth(&self, id: ParamId, depth: i32) -> bool {
        self.send(ControlCommand::SetModDepth { id, depth })
    }

    pub fn apply_preset(&self, slot: usize) -> bool {
        self.send(ControlCommand::ApplyPreset(slot))
    }

    pub fn save_preset(&self, slot: usize) -> bool {
        self.send(ControlCommand::SavePreset(slot))
    }

    pub fn global_reset(&self) -> bool {
        self.send(ControlCommand::GlobalReset)
    }

    pub fn surface_available(&self, kind: SurfaceKind, native: N, width: u32, height: u32) -> bool {
        self.send(ControlCommand::Surface(SurfaceEvent::Available { kind, native, width, height }))
    }

    pub fn surface_unavailable(&self, kind: SurfaceKind) -> bool {
        self.send(ControlCommand::Surface(SurfaceEvent::Unavailable { kind }))
    }

    pub fn start_recording(&self, path: impl Into<PathBuf>) -> bool {
        self.send(ControlCommand::StartRecording(path.into()))
    }

    /// Ask for the active recording to stop. Bypasses the queue: the flag
    /// is raised now and the render thread tears down on its next tick.
    /// Returns `false` if a stop is already pending.
    pub fn stop_recording(&self, callback: StopCallback) -> bool {
        self.stop.request(callback)
    }

    pub fn capture_still(&self, callback: StillCallback) -> bool {
        self.send(ControlCommand::CaptureStill(callback))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam::channel::{self, Receiver};

    fn handle_with(capacity: usize) -> (ControlHandle<u64>, Receiver<ControlCommand<u64>>, Receiver<SurfaceEvent<u64>>) {
        let (tx, rx) = channel::bounded(capacity);
        let (surface_tx, surface_rx) = channel::unbounded();
        (ControlHandle::new(tx, surface_tx, StopHandle::default()), rx, surface_rx)
    }

    #[test]
    fn full_queue_drops_instead_of_blocking() {
        let (handle, rx, _surfaces) = handle_with(1);
        assert!(handle.global_reset());
        assert!(!handle.set_base(ParamId::Glow, 10));
        assert!(matches!(rx.try_recv(), Ok(ControlCommand::GlobalReset)));
        drop(rx);
        assert!(!handle.global_reset());
    }

    #[test]
    fn surface_events_survive_a_full_queue() {
        let (handle, rx, surfaces) = handle_with(1);
        assert!(handle.global_reset());
        assert!(!handle.global_reset());
        assert!(handle.surface_available(SurfaceKind::External, 7, 64, 32));
        assert!(handle.surface_unavailable(SurfaceKind::External));
        assert_eq!(rx.len(), 1);
        assert_eq!(
            surfaces.try_iter().collect::<Vec<_>>(),
            vec![
                SurfaceEvent::Available { kind: SurfaceKind::External, native: 7, width: 64, height: 32 },
                SurfaceEvent::Unavailable { kind: SurfaceKind::External },
            ]
        );
    }

    #[test]
    fn stop_goes_straight_to_the_flag() {
        let (tx, _rx) = channel::bounded::<ControlCommand<u64>>(1);
        let (surface_tx, _surface_rx) = channel::unbounded();
        let stop = StopHandle::default();
        let handle = ControlHandle::new(tx, surface_tx, stop.clone());
        assert!(handle.clone().stop_recording(Box::new(|_| {})));
        assert!(stop.is_requested());
        assert!(!handle.stop_recording(Box::new(|_| {})));
    }
}
