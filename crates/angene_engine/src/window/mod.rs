//! Window registry entries and the event-source collaborator
//!
//! Native window creation and message dispatch live outside the engine. The
//! engine needs two things from that layer:
//!
//! - a per-tick batch of [`WindowEvent`]s (close requests, resizes, raw messages)
//! - a native surface for each window, recorded as a [`SurfaceId`] plus an
//!   optional [`RawWindowHandle`] for bindings that need the real handle

use crate::render::{BackendKind, SharedRenderState, WindowRenderer};
use crate::scene::{AttachedScene, SceneContract};
use raw_window_handle::RawWindowHandle;
use std::collections::VecDeque;

slotmap::new_key_type! {
    /// Key of a window in the engine's registry
    pub struct WindowId;
}

/// Native surface identifier used to route events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceId(pub u64);

/// Raw window message as delivered by the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawMessage {
    /// Message identifier
    pub message: u32,
    /// First parameter
    pub wparam: usize,
    /// Second parameter
    pub lparam: isize,
}

impl RawMessage {
    /// Create a raw message
    pub const fn new(message: u32, wparam: usize, lparam: isize) -> Self {
        Self { message, wparam, lparam }
    }
}

/// What happened to a window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowEventKind {
    /// The user asked to close the window
    CloseRequested,
    /// The client area changed size
    Resized {
        /// New width
        width: u32,
        /// New height
        height: u32,
    },
    /// Any other platform message
    Raw(RawMessage),
}

/// Event targeted at one window surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowEvent {
    /// Surface the event belongs to
    pub surface: SurfaceId,
    /// Event payload
    pub kind: WindowEventKind,
}

impl WindowEvent {
    /// Close request for `surface`
    pub const fn close(surface: SurfaceId) -> Self {
        Self {
            surface,
            kind: WindowEventKind::CloseRequested,
        }
    }

    /// Raw message for `surface`
    pub const fn raw(surface: SurfaceId, message: RawMessage) -> Self {
        Self {
            surface,
            kind: WindowEventKind::Raw(message),
        }
    }
}

/// Source of window events, pumped once per engine tick
pub trait WindowEventSource {
    /// Drain every event that arrived since the previous call
    fn poll_events(&mut self) -> Vec<WindowEvent>;
}

/// In-memory event queue
#[derive(Debug, Default)]
pub struct EventQueue {
    pending: VecDeque<WindowEvent>,
}

impl EventQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an event for the next poll
    pub fn push(&mut self, event: WindowEvent) {
        self.pending.push_back(event);
    }
}

impl WindowEventSource for EventQueue {
    fn poll_events(&mut self) -> Vec<WindowEvent> {
        self.pending.drain(..).collect()
    }
}

/// Creation parameters for a window entry
#[derive(Debug, Clone)]
pub struct WindowDesc {
    /// Title used in logs
    pub title: String,
    /// Client width
    pub width: u32,
    /// Client height
    pub height: u32,
    /// Native surface identifier
    pub surface: SurfaceId,
    /// Native handle, when the platform layer provides one
    pub raw_handle: Option<RawWindowHandle>,
}

impl WindowDesc {
    /// Describe a window by title, size and surface id
    pub fn new(title: impl Into<String>, width: u32, height: u32, surface: SurfaceId) -> Self {
        Self {
            title: title.into(),
            width,
            height,
            surface,
            raw_handle: None,
        }
    }

    /// Attach the native handle
    pub fn with_raw_handle(mut self, handle: RawWindowHandle) -> Self {
        self.raw_handle = Some(handle);
        self
    }
}

/// One window in the engine registry
///
/// Owns its renderer and exactly one scene; the scene may be swapped at
/// runtime.
pub struct Window {
    desc: WindowDesc,
    renderer: Box<dyn WindowRenderer>,
    scene: AttachedScene,
}

impl Window {
    /// Create a window entry
    pub fn new(desc: WindowDesc, renderer: Box<dyn WindowRenderer>, scene: Box<dyn SceneContract>) -> Self {
        Self {
            desc,
            renderer,
            scene: AttachedScene::new(scene),
        }
    }

    /// Window title
    pub fn title(&self) -> &str {
        &self.desc.title
    }

    /// Client size in pixels
    pub const fn size(&self) -> (u32, u32) {
        (self.desc.width, self.desc.height)
    }

    /// Native surface identifier
    pub const fn surface(&self) -> SurfaceId {
        self.desc.surface
    }

    /// Native handle, if known
    pub const fn raw_handle(&self) -> Option<RawWindowHandle> {
        self.desc.raw_handle
    }

    /// Rendering path of this window
    pub fn backend(&self) -> BackendKind {
        self.renderer.backend()
    }

    /// Whether frames go to the VR compositor
    pub fn is_vr(&self) -> bool {
        self.backend().is_vr()
    }

    /// Whether the current scene has started
    pub const fn scene_started(&self) -> bool {
        self.scene.is_started()
    }

    /// Replace the attached scene; the new one starts on the next update
    pub fn set_scene(&mut self, scene: Box<dyn SceneContract>) {
        log::info!("Swapping scene on window '{}'", self.desc.title);
        self.scene = AttachedScene::new(scene);
    }

    /// Record a new client size and forward it to the renderer
    pub fn resize(&mut self, width: u32, height: u32) {
        self.desc.width = width;
        self.desc.height = height;
        self.renderer.resize(width, height);
    }

    /// Attached scene
    pub fn scene_mut(&mut self) -> &mut AttachedScene {
        &mut self.scene
    }

    /// Render one frame of the attached scene
    pub fn render(&mut self, shared: &mut SharedRenderState) -> Result<(), crate::engine::EngineError> {
        self.renderer.render(&mut self.scene, shared)
    }

    /// Run the quit hook and release renderer resources
    pub fn close(&mut self, shared: &mut SharedRenderState) {
        self.scene.quit();
        self.renderer.shutdown(shared);
    }

    /// One-line status for diagnostics
    pub fn status_line(&self) -> String {
        format!("'{}' [{}]", self.desc.title, self.renderer.status_line())
    }
}
