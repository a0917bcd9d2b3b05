//! Rendering layer
//!
//! The engine never talks to a native graphics API directly. Everything goes
//! through the [`GraphicsBinding`] capability object (devices, textures,
//! render-target views, copies, clears, present) or, for 2D windows, through a
//! [`Surface2D`](painter::Surface2D) collaborator.
//!
//! Each window owns one [`WindowRenderer`] that knows how to run a frame for
//! its backend:
//!
//! - [`painter::PainterRenderer`] for software 2D windows
//! - [`device::DeviceRenderer`] for OpenGL and Direct3D 11 windows
//! - [`crate::xr::VrWindowRenderer`] for OpenXR-backed windows

pub mod binding;
pub mod device;
pub mod headless;
pub mod painter;

pub use binding::{
    AdapterLuid, BindFlags, Color, GraphicsBinding, TextureDesc, TextureFormat, Viewport,
};
pub use device::DeviceRenderer;
pub use headless::{BindingCall, HeadlessBinding, HeadlessSurface};
pub use painter::{BrushCache, Painter, PainterRenderer, Rect, Surface2D};

use crate::engine::EngineError;
use crate::scene::AttachedScene;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for backend operations
pub type BackendResult<T> = Result<T, RenderError>;

/// Handle to a graphics device created by a binding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceHandle(pub u64);

/// Handle to a texture resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub u64);

/// Handle to a render-target view over a texture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderTargetViewHandle(pub u64);

/// Handle to a cached 2D brush
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BrushHandle(pub u64);

/// Which rendering path a window uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BackendKind {
    /// Software 2D painter (clear/rect/text)
    Painter2D,
    /// OpenGL 3D path
    OpenGl,
    /// Direct3D 11 path
    Direct3D11,
    /// OpenXR compositor path
    OpenXr,
}

impl BackendKind {
    /// Short name for diagnostics
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Painter2D => "2d",
            Self::OpenGl => "opengl",
            Self::Direct3D11 => "d3d11",
            Self::OpenXr => "openxr",
        }
    }

    /// Whether this backend presents through the VR compositor
    pub const fn is_vr(self) -> bool {
        matches!(self, Self::OpenXr)
    }
}

/// Rendering errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// Device creation failed
    #[error("Device creation failed: {0}")]
    DeviceCreation(String),

    /// No adapter matches the requested LUID
    #[error("No adapter matches LUID {0}")]
    AdapterNotFound(AdapterLuid),

    /// An operation needed a device that does not exist yet
    #[error("No device has been created")]
    NoDevice,

    /// Texture creation failed
    #[error("Texture creation failed: {0}")]
    TextureCreation(String),

    /// Render-target view creation failed
    #[error("Render target view creation failed: {0}")]
    ViewCreation(String),

    /// A handle was not created by this binding or was already released
    #[error("Unknown resource handle: {0}")]
    UnknownResource(u64),

    /// A resource copy failed
    #[error("Copy failed: {0}")]
    Copy(String),

    /// The 2D surface could not be prepared or blitted
    #[error("Surface error: {0}")]
    Surface(String),

    /// Presenting the frame failed
    #[error("Present failed: {0}")]
    Present(String),

    /// A bounded cache is full
    #[error("Cache capacity of {capacity} entries exceeded")]
    CapacityExceeded {
        /// Configured capacity
        capacity: usize,
    },
}

/// Shared renderer state owned by the engine context
///
/// Only touched from the render thread, so no locking is involved.
#[derive(Debug, Default)]
pub struct SharedRenderState {
    /// Brush cache used by every 2D window
    pub brushes: BrushCache,
    /// Monotonic frame counter across all windows
    pub frame_index: u64,
    /// Seconds since engine start, for animated content
    pub time: f64,
}

/// Per-window frame driver
///
/// One renderer is owned by each window and is only ever used from the thread
/// running the engine loop.
pub trait WindowRenderer {
    /// Rendering path of this renderer
    fn backend(&self) -> BackendKind;

    /// Render one frame of `scene`
    ///
    /// Transient failures are handled inside the renderer. Only errors that
    /// should stop the engine are returned.
    fn render(&mut self, scene: &mut AttachedScene, shared: &mut SharedRenderState) -> Result<(), EngineError>;

    /// Notify the renderer that its window was resized
    fn resize(&mut self, _width: u32, _height: u32) {}

    /// Release every native resource owned by this renderer
    fn shutdown(&mut self, shared: &mut SharedRenderState);

    /// One-line status used by the periodic diagnostics log
    fn status_line(&self) -> String {
        self.backend().as_str().to_string()
    }
}
