use std::collections::HashSet;

use crate::error::{RenderError, RenderResult};
use crate::surface::{SurfaceBackend, SurfaceKind};

/// Surface handle of the [`HeadlessBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadlessSurface {
    pub id: u64,
    /// Native handle it was created from; `None` for offscreen surfaces.
    pub native: Option<u64>,
}

/// One successful present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresentRecord {
    pub surface: u64,
    pub pts_ns: Option<i64>,
}

/// In-memory window system: surfaces are counters, natives are plain
/// integers that can be marked stale to simulate a torn-down display.
#[derive(Debug, Default)]
pub struct HeadlessBackend {
    next_id: u64,
    live: HashSet<u64>,
    stale: HashSet<u64>,
    current: Option<u64>,
    presents: Vec<PresentRecord>,
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every surface created from `native` fails to bind from now on.
    pub fn mark_stale(&mut self, native: u64) {
        self.stale.insert(native);
    }

    pub fn live_surfaces(&self) -> usize {
        self.live.len()
    }

    pub fn current(&self) -> Option<u64> {
        self.current
    }

    pub fn take_presents(&mut self) -> Vec<PresentRecord> {
        std::mem::take(&mut self.presents)
    }

    fn alloc(&mut self, native: Option<u64>) -> HeadlessSurface {
        self.next_id += 1;
        self.live.insert(self.next_id);
        HeadlessSurface { id: self.next_id, native }
    }
}

impl SurfaceBackend for HeadlessBackend {
    type Surface = HeadlessSurface;
    type Binding = Option<u64>;
    type Native = u64;

    fn create_surface(&mut self, _kind: SurfaceKind, native: u64) -> RenderResult<HeadlessSurface> {
        if self.stale.contains(&native) {
            return Err(RenderError::surface(format!("native window {native} is gone")));
        }
        Ok(self.alloc(Some(native)))
    }

    fn create_offscreen_surface(&mut self, width: u32, height: u32) -> RenderResult<HeadlessSurface> {
        if width == 0 || height == 0 {
            return Err(RenderError::surface("offscreen surface needs a non-zero size"));
        }
        Ok(self.alloc(None))
    }

    fn destroy_surface(&mut self, surface: HeadlessSurface) {
        self.live.remove(&surface.id);
        if self.current == Some(surface.id) {
            self.current = None;
        }
    }

    fn current_binding(&self) -> Option<u64> {
        self.current
    }

    fn make_current(&mut self, surface: &HeadlessSurface) -> RenderResult<()> {
        let stale = surface.native.is_some_and(|n| self.stale.contains(&n));
        if stale || !self.live.contains(&surface.id) {
            return Err(RenderError::surface(format!("cannot bind surface {}", surface.id)));
        }
        self.current = Some(surface.id);
        Ok(())
    }

    fn present(&mut self, surface: &HeadlessSurface, pts_ns: Option<i64>) -> RenderResult<()> {
        if self.current != Some(surface.id) {
            return Err(RenderError::surface(format!("surface {} is not current", surface.id)));
        }
        self.presents.push(PresentRecord { surface: surface.id, pts_ns });
        Ok(())
    }

    fn restore(&mut self, binding: Option<u64>) {
        self.current = binding;
    }
}
