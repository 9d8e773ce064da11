//! GPU rendering of the kaleidoscope and fan-out to output surfaces.

pub mod cover;
pub mod error;
pub mod frame;
pub mod headless;
pub mod kaleido_pass;
pub mod program;
pub mod renderer;
pub mod shaders;
pub mod surface;
pub mod target;

pub use error::{RenderError, RenderResult};
pub use frame::{CpuFrameRenderer, FrameRenderer, GlFrameRenderer, SourceTexture};
pub use headless::{HeadlessBackend, HeadlessSurface, PresentRecord};
pub use renderer::KaleidoRenderer;
pub use surface::{ContextGuard, FanOutReport, SurfaceBackend, SurfaceKind, SurfaceMultiplexer};
