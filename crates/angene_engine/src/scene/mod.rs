//! Scene contract
//!
//! Every renderable unit attached to a window implements [`SceneContract`].
//! `update` is the only required hook. The optional hooks are declared up
//! front through [`SceneCapabilities`], which the engine reads once when the
//! scene is attached. The frame loop consults the stored flags and never
//! probes the scene per frame.
//!
//! ## Hook order
//!
//! 1. `start` once, before the first fixed update
//! 2. `update` every fixed step, then `late_update` if declared
//! 3. `on_draw` (2D/3D windows) or `on_render_eye` (VR windows) once per tick
//! 4. `on_application_quit` when the window closes, if the scene started
//!
//! `on_message` receives raw window messages as they are pumped.

pub mod status;

pub use status::StatusScene;

use crate::foundation::math::{Fov, Mat4, Pose};
use crate::render::{
    BackendKind, GraphicsBinding, Painter, RenderError, RenderTargetViewHandle,
};
use crate::window::{RawMessage, SurfaceId};
use bitflags::bitflags;
use thiserror::Error;

bitflags! {
    /// Optional hooks a scene implements
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SceneCapabilities: u32 {
        /// `late_update` runs after each `update`
        const LATE_UPDATE = 1 << 0;
        /// `on_draw` renders 2D and 3D windows
        const DRAW = 1 << 1;
        /// `on_render_eye` renders VR eyes
        const RENDER_EYE = 1 << 2;
        /// `on_application_quit` runs when the window closes
        const APPLICATION_QUIT = 1 << 3;
        /// `on_message` receives raw window messages
        const MESSAGE_HOOK = 1 << 4;
    }
}

/// Errors raised by scene code
#[derive(Error, Debug)]
pub enum SceneError {
    /// A rendering call made by the scene failed
    #[error("Scene render call failed: {0}")]
    Render(#[from] RenderError),

    /// Scene logic failed
    #[error("Scene error: {0}")]
    Custom(String),
}

/// Result type for scene hooks
pub type SceneResult = Result<(), SceneError>;

/// Where `on_draw` renders to
pub enum DrawTarget<'a> {
    /// 2D painter over the window's off-screen surface
    Painter(Painter<'a>),
    /// 3D device back buffer
    Device {
        /// Backend in use (OpenGL or Direct3D 11)
        backend: BackendKind,
        /// Graphics binding to issue commands through
        binding: &'a mut dyn GraphicsBinding,
        /// Back-buffer render target
        target: RenderTargetViewHandle,
        /// Target width
        width: u32,
        /// Target height
        height: u32,
    },
}

/// Everything `on_render_eye` needs to draw one eye
pub struct EyeTarget<'a> {
    /// Graphics binding to issue commands through
    pub binding: &'a mut dyn GraphicsBinding,
    /// Intermediate render target for this eye
    pub target: RenderTargetViewHandle,
    /// Target width
    pub width: u32,
    /// Target height
    pub height: u32,
    /// View matrix derived from the eye pose
    pub view: Mat4,
    /// Projection matrix derived from the eye field of view
    pub projection: Mat4,
    /// Eye index, 0 is left
    pub eye_index: usize,
    /// Tracked eye pose
    pub pose: Pose,
    /// Eye field of view
    pub fov: Fov,
}

/// Interface implemented by user content
pub trait SceneContract {
    /// Optional hooks this scene implements
    fn capabilities(&self) -> SceneCapabilities {
        SceneCapabilities::empty()
    }

    /// Called once before the first update
    fn start(&mut self) -> SceneResult {
        Ok(())
    }

    /// Fixed-step update
    fn update(&mut self, dt: f64) -> SceneResult;

    /// Runs after `update` when [`SceneCapabilities::LATE_UPDATE`] is declared
    fn late_update(&mut self, _dt: f64) -> SceneResult {
        Ok(())
    }

    /// Draw a 2D or 3D window
    fn on_draw(&mut self, _target: &mut DrawTarget<'_>) -> SceneResult {
        Ok(())
    }

    /// Draw one VR eye
    fn on_render_eye(&mut self, _eye: &mut EyeTarget<'_>) -> SceneResult {
        Ok(())
    }

    /// The owning window is closing
    fn on_application_quit(&mut self) {}

    /// Raw window message hook
    fn on_message(&mut self, _surface: SurfaceId, _message: &RawMessage) {}
}

/// A scene attached to a window, with its capabilities resolved
pub struct AttachedScene {
    scene: Box<dyn SceneContract>,
    capabilities: SceneCapabilities,
    started: bool,
}

impl AttachedScene {
    /// Attach a scene, reading its capability flags once
    pub fn new(scene: Box<dyn SceneContract>) -> Self {
        let capabilities = scene.capabilities();
        log::debug!("Attached scene with capabilities {:?}", capabilities);
        Self {
            scene,
            capabilities,
            started: false,
        }
    }

    /// Capabilities resolved at attach time
    pub const fn capabilities(&self) -> SceneCapabilities {
        self.capabilities
    }

    /// Whether `start` has run
    pub const fn is_started(&self) -> bool {
        self.started
    }

    /// Run `start` if it has not run yet
    pub fn start_once(&mut self) -> SceneResult {
        if !self.started {
            self.started = true;
            self.scene.start()?;
        }
        Ok(())
    }

    /// One fixed step: start if needed, update, then late update if declared
    pub fn fixed_update(&mut self, dt: f64) -> SceneResult {
        self.start_once()?;
        self.scene.update(dt)?;
        if self.capabilities.contains(SceneCapabilities::LATE_UPDATE) {
            self.scene.late_update(dt)?;
        }
        Ok(())
    }

    /// Draw a 2D/3D frame if the scene declares [`SceneCapabilities::DRAW`]
    pub fn draw(&mut self, target: &mut DrawTarget<'_>) -> SceneResult {
        if self.capabilities.contains(SceneCapabilities::DRAW) {
            self.scene.on_draw(target)?;
        }
        Ok(())
    }

    /// Whether the scene renders VR eyes
    pub const fn renders_eyes(&self) -> bool {
        self.capabilities.contains(SceneCapabilities::RENDER_EYE)
    }

    /// Draw one VR eye if the scene declares [`SceneCapabilities::RENDER_EYE`]
    pub fn render_eye(&mut self, eye: &mut EyeTarget<'_>) -> SceneResult {
        if self.renders_eyes() {
            self.scene.on_render_eye(eye)?;
        }
        Ok(())
    }

    /// Forward a raw message if the scene declares the hook
    pub fn message(&mut self, surface: SurfaceId, message: &RawMessage) {
        if self.capabilities.contains(SceneCapabilities::MESSAGE_HOOK) {
            self.scene.on_message(surface, message);
        }
    }

    /// Notify a started scene that its window is closing
    pub fn quit(&mut self) {
        if self.started && self.capabilities.contains(SceneCapabilities::APPLICATION_QUIT) {
            self.scene.on_application_quit();
        }
    }
}
