//! Fan-out of one offscreen frame to every attached output surface.
//!
//! A single rendering context is shared by all surfaces. Each surface is
//! visited through a [`ContextGuard`], which binds the surface and puts the
//! previous binding back when it drops, whatever path the visit takes.

use std::fmt;

use crate::error::RenderResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SurfaceKind {
    Screen,
    External,
    Encoder,
}

impl SurfaceKind {
    /// Presentation order within a tick.
    pub const ALL: [SurfaceKind; 3] = [SurfaceKind::Screen, SurfaceKind::External, SurfaceKind::Encoder];

    fn slot(self) -> usize {
        match self {
            SurfaceKind::Screen => 0,
            SurfaceKind::External => 1,
            SurfaceKind::Encoder => 2,
        }
    }
}

impl fmt::Display for SurfaceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SurfaceKind::Screen => "screen",
            SurfaceKind::External => "external",
            SurfaceKind::Encoder => "encoder",
        };
        f.write_str(name)
    }
}

/// Platform window-system binding for the shared context (EGL, GLX, WGL,
/// or an in-memory stand-in).
pub trait SurfaceBackend {
    /// Backend surface handle.
    type Surface;
    /// Whatever identifies the currently bound draw/read surfaces.
    type Binding;
    /// Native drawable carried by attach events.
    type Native;

    fn create_surface(&mut self, kind: SurfaceKind, native: Self::Native) -> RenderResult<Self::Surface>;
    /// Surface with no window behind it, e.g. an encoder input.
    fn create_offscreen_surface(&mut self, width: u32, height: u32) -> RenderResult<Self::Surface>;
    fn destroy_surface(&mut self, surface: Self::Surface);
    fn current_binding(&self) -> Self::Binding;
    fn make_current(&mut self, surface: &Self::Surface) -> RenderResult<()>;
    /// Swap buffers. `pts_ns` is set for surfaces that need an explicit
    /// presentation timestamp.
    fn present(&mut self, surface: &Self::Surface, pts_ns: Option<i64>) -> RenderResult<()>;
    fn restore(&mut self, binding: Self::Binding);
}

/// Binds a surface for its lifetime and restores the prior binding on drop.
pub struct ContextGuard<'a, B: SurfaceBackend> {
    backend: &'a mut B,
    saved: Option<B::Binding>,
}

impl<'a, B: SurfaceBackend> ContextGuard<'a, B> {
    /// Make `surface` current. On failure the prior binding is already
    /// restored when the error returns.
    pub fn acquire(backend: &'a mut B, surface: &B::Surface) -> RenderResult<Self> {
        let saved = backend.current_binding();
        if let Err(e) = backend.make_current(surface) {
            backend.restore(saved);
            return Err(e);
        }
        Ok(Self { backend, saved: Some(saved) })
    }

    pub fn backend(&mut self) -> &mut B {
        self.backend
    }
}

impl<B: SurfaceBackend> Drop for ContextGuard<'_, B> {
    fn drop(&mut self) {
        if let Some(saved) = self.saved.take() {
            self.backend.restore(saved);
        }
    }
}

struct Attached<S> {
    surface: S,
    width: u32,
    height: u32,
}

/// Outcome of one fan-out pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FanOutReport {
    pub presented: Vec<SurfaceKind>,
    pub skipped: Vec<SurfaceKind>,
}

impl FanOutReport {
    pub fn presented(&self, kind: SurfaceKind) -> bool {
        self.presented.contains(&kind)
    }
}

/// Up to one surface per [`SurfaceKind`]; any subset may be attached.
pub struct SurfaceMultiplexer<B: SurfaceBackend> {
    slots: [Option<Attached<B::Surface>>; 3],
}

impl<B: SurfaceBackend> Default for SurfaceMultiplexer<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: SurfaceBackend> SurfaceMultiplexer<B> {
    pub fn new() -> Self {
        Self { slots: [None, None, None] }
    }

    /// Create a surface for `native`, replacing any surface already in that slot.
    pub fn attach(
        &mut self,
        backend: &mut B,
        kind: SurfaceKind,
        native: B::Native,
        width: u32,
        height: u32,
    ) -> RenderResult<()> {
        let surface = backend.create_surface(kind, native)?;
        self.install(backend, kind, surface, width, height);
        Ok(())
    }

    /// Like [`attach`](Self::attach) for a window-less surface.
    pub fn attach_offscreen(&mut self, backend: &mut B, kind: SurfaceKind, width: u32, height: u32) -> RenderResult<()> {
        let surface = backend.create_offscreen_surface(width, height)?;
        self.install(backend, kind, surface, width, height);
        Ok(())
    }

    fn install(&mut self, backend: &mut B, kind: SurfaceKind, surface: B::Surface, width: u32, height: u32) {
        if let Some(old) = self.slots[kind.slot()].replace(Attached { surface, width, height }) {
            log::info!("Replacing {kind} surface");
            backend.destroy_surface(old.surface);
        } else {
            log::info!("Attached {kind} surface {width}x{height}");
        }
    }

    /// Destroy the surface in `kind`'s slot. Returns whether one was attached.
    pub fn detach(&mut self, backend: &mut B, kind: SurfaceKind) -> bool {
        match self.slots[kind.slot()].take() {
            Some(old) => {
                backend.destroy_surface(old.surface);
                log::info!("Detached {kind} surface");
                true
            }
            None => false,
        }
    }

    pub fn is_attached(&self, kind: SurfaceKind) -> bool {
        self.slots[kind.slot()].is_some()
    }

    pub fn size(&self, kind: SurfaceKind) -> Option<(u32, u32)> {
        self.slots[kind.slot()].as_ref().map(|a| (a.width, a.height))
    }

    pub fn attached_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Visit every attached surface in presentation order: bind, `draw`,
    /// present, restore. A surface whose bind, draw or present fails is
    /// skipped for this tick only.
    ///
    /// `encoder_pts_ns` is passed to the encoder surface's present.
    pub fn fan_out<F>(&self, backend: &mut B, encoder_pts_ns: Option<i64>, mut draw: F) -> FanOutReport
    where
        F: FnMut(SurfaceKind, u32, u32) -> RenderResult<()>,
    {
        let mut report = FanOutReport::default();
        for kind in SurfaceKind::ALL {
            let Some(attached) = &self.slots[kind.slot()] else {
                continue;
            };
            let pts = if kind == SurfaceKind::Encoder { encoder_pts_ns } else { None };

            let result = ContextGuard::acquire(backend, &attached.surface).and_then(|mut guard| {
                draw(kind, attached.width, attached.height)?;
                guard.backend().present(&attached.surface, pts)
            });

            match result {
                Ok(()) => report.presented.push(kind),
                Err(e) => {
                    log::debug!("Skipping {kind} surface this frame: {e}");
                    report.skipped.push(kind);
                }
            }
        }
        report
    }

    /// Destroy every attached surface.
    pub fn release_all(&mut self, backend: &mut B) {
        for kind in SurfaceKind::ALL {
            self.detach(backend, kind);
        }
    }
}
