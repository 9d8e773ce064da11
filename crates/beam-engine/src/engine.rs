//! Per-tick orchestration.
//!
//! One tick, in order: apply queued commands, advance the crossfade, run
//! motion physics, resolve every parameter, build the transform inputs,
//! render offscreen, fan the frame out to every surface, feed the encoder,
//! service a pending stop, hand out still captures.

use beam_record::{default_factory, EncoderFactory, RecordController, SessionState};
use beam_render::{FanOutReport, FrameRenderer, SurfaceBackend, SurfaceKind, SurfaceMultiplexer};
use crossbeam::channel::{self, Receiver, Sender};

use crate::command::{ControlCommand, ControlHandle, StillCallback, StillImage, SurfaceEvent};
use crate::config::EngineConfig;
use crate::error::EngineResult;
use crate::state::RenderState;

/// What one tick did.
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub frame: u64,
    pub rendered: bool,
    pub crossfade_landed: bool,
    pub fan_out: FanOutReport,
    /// A frame reached the video encoder this tick.
    pub encoded: bool,
    pub recording: SessionState,
}

pub struct Engine<B: SurfaceBackend> {
    cfg: EngineConfig,
    state: RenderState,
    surfaces: SurfaceMultiplexer<B>,
    commands: Receiver<ControlCommand<B::Native>>,
    command_tx: Sender<ControlCommand<B::Native>>,
    surface_events: Receiver<SurfaceEvent<B::Native>>,
    surface_tx: Sender<SurfaceEvent<B::Native>>,
    recorder: RecordController,
    stills: Vec<StillCallback>,
    clock_ns: i64,
    frame: u64,
}

impl<B: SurfaceBackend> Engine<B> {
    pub fn new(cfg: EngineConfig, factory: Box<dyn EncoderFactory>) -> EngineResult<Self> {
        cfg.validate()?;
        let (command_tx, commands) = channel::bounded(cfg.command_capacity);
        let (surface_tx, surface_events) = channel::unbounded();
        let recorder = RecordController::new(factory, cfg.record.clone());
        Ok(Self {
            state: RenderState::new(&cfg),
            surfaces: SurfaceMultiplexer::new(),
            commands,
            command_tx,
            surface_events,
            surface_tx,
            recorder,
            stills: Vec::new(),
            clock_ns: 0,
            frame: 0,
            cfg,
        })
    }

    /// Engine recording through whatever backend the build enables.
    pub fn with_default_recorder(cfg: EngineConfig) -> EngineResult<Self> {
        let factory = default_factory()?;
        Self::new(cfg, factory)
    }

    pub fn handle(&self) -> ControlHandle<B::Native> {
        ControlHandle::new(self.command_tx.clone(), self.surface_tx.clone(), self.recorder.stop_handle())
    }

    pub fn config(&self) -> &EngineConfig {
        &self.cfg
    }

    pub fn state(&self) -> &RenderState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut RenderState {
        &mut self.state
    }

    pub fn surfaces(&self) -> &SurfaceMultiplexer<B> {
        &self.surfaces
    }

    pub fn recorder(&self) -> &RecordController {
        &self.recorder
    }

    /// Engine clock in nanoseconds, advanced by every tick's `dt`.
    pub fn clock_ns(&self) -> i64 {
        self.clock_ns
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Run one frame. `dt` is the time since the previous tick in seconds.
    ///
    /// Per-frame failures (render, surface, encoder) are logged and
    /// contained; the next tick runs normally.
    pub fn tick<R: FrameRenderer + ?Sized>(&mut self, dt: f32, renderer: &mut R, backend: &mut B) -> TickReport {
        self.drain_commands(backend);

        let (width, height) = renderer.size();
        let aspect = width as f32 / height.max(1) as f32;
        let crossfade_landed = self.state.advance(dt, &self.cfg, aspect);
        self.clock_ns += (f64::from(dt.max(0.0)) * 1e9) as i64;
        self.frame += 1;

        let rendered = match renderer.render(&self.state.uniforms) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Offscreen render failed on frame {}: {e}", self.frame);
                false
            }
        };

        if let Some((w, h)) = self.recorder.begin_pending(width, height) {
            if let Err(e) = self.surfaces.attach_offscreen(backend, SurfaceKind::Encoder, w, h) {
                log::error!("No encoder surface, abandoning recording: {e}");
                self.recorder.stop_handle().request(Box::new(|_| {}));
            }
        }

        let mut fan_out = FanOutReport::default();
        let mut encoded = false;
        if rendered {
            let pts = if self.surfaces.is_attached(SurfaceKind::Encoder) {
                self.recorder.frame_pts(self.clock_ns)
            } else {
                None
            };
            let mut encoder_frame = None;
            fan_out = self.surfaces.fan_out(backend, pts, |kind, w, h| {
                renderer.blit(w, h)?;
                if kind == SurfaceKind::Encoder && pts.is_some() {
                    encoder_frame = Some(renderer.read_pixels()?);
                }
                Ok(())
            });
            if let Some(pixels) = encoder_frame {
                if fan_out.presented(SurfaceKind::Encoder) {
                    self.recorder.submit_frame(&pixels, width, height, self.clock_ns);
                    encoded = true;
                }
            }
        }

        self.recorder.service_stop();
        if !self.recorder.is_recording() && self.surfaces.is_attached(SurfaceKind::Encoder) {
            self.surfaces.detach(backend, SurfaceKind::Encoder);
        }

        if rendered && !self.stills.is_empty() {
            self.deliver_stills(renderer, width, height);
        }

        TickReport {
            frame: self.frame,
            rendered,
            crossfade_landed,
            fan_out,
            encoded,
            recording: self.recorder.state(),
        }
    }

    fn drain_commands(&mut self, backend: &mut B) {
        while let Ok(event) = self.surface_events.try_recv() {
            self.apply_surface_event(event, backend);
        }
        while let Ok(cmd) = self.commands.try_recv() {
            self.apply_command(cmd, backend);
        }
    }

    fn apply_command(&mut self, cmd: ControlCommand<B::Native>, backend: &mut B) {
        match cmd {
            ControlCommand::SetBase { id, value } => self.state.params.set_base(id, value),
            ControlCommand::SetModRate { id, rate } => self.state.params.set_mod_rate(id, rate),
            ControlCommand::SetModDepth { id, depth } => self.state.params.set_mod_depth(id, depth),
            ControlCommand::Reset(id) => self.state.params.reset(id),
            ControlCommand::GlobalReset => self.state.global_reset(),
            ControlCommand::ApplyPreset(slot) => {
                self.state.apply_preset(slot);
            }
            ControlCommand::SavePreset(slot) => {
                if let Err(e) = self.state.save_preset(slot, &self.cfg) {
                    log::warn!("Could not save preset {slot}: {e}");
                }
            }
            ControlCommand::SetTransition(control) => self.state.set_transition_control(control),
            ControlCommand::SetAxis(n) => self.state.set_axis(n),
            ControlCommand::SetAxisLocked(locked) => self.state.geometry.axis_locked = locked,
            ControlCommand::SetFlipX(v) => self.state.set_flip_x(v),
            ControlCommand::SetFlipY(v) => self.state.set_flip_y(v),
            ControlCommand::SetRot180(on) => self.state.geometry.rot180 = on,
            ControlCommand::Surface(event) => self.apply_surface_event(event, backend),
            ControlCommand::StartRecording(path) => {
                self.recorder.request_start(path);
            }
            ControlCommand::CaptureStill(callback) => self.stills.push(callback),
        }
    }

    fn apply_surface_event(&mut self, event: SurfaceEvent<B::Native>, backend: &mut B) {
        match event {
            SurfaceEvent::Available { kind: SurfaceKind::Encoder, .. }
            | SurfaceEvent::Unavailable { kind: SurfaceKind::Encoder } => {
                log::warn!("Encoder surface is managed by the recorder, ignoring event");
            }
            SurfaceEvent::Available { kind, native, width, height } => {
                if let Err(e) = self.surfaces.attach(backend, kind, native, width, height) {
                    log::warn!("Cannot attach {kind} surface: {e}");
                }
            }
            SurfaceEvent::Unavailable { kind } => {
                self.surfaces.detach(backend, kind);
            }
        }
    }

    fn deliver_stills<R: FrameRenderer + ?Sized>(&mut self, renderer: &mut R, width: u32, height: u32) {
        match renderer.read_pixels() {
            Ok(rgba) => {
                let still = StillImage { width, height, rgba };
                for callback in self.stills.drain(..) {
                    callback(still.clone());
                }
            }
            // Pending captures retry next tick.
            Err(e) => log::warn!("Still capture failed: {e}"),
        }
    }

    /// Finish any recording and destroy every surface.
    pub fn shutdown(&mut self, backend: &mut B) {
        self.recorder.shutdown();
        self.surfaces.release_all(backend);
        self.stills.clear();
        log::info!("Engine stopped after {} frames", self.frame);
    }
}
