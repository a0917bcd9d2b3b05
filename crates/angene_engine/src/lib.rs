//! # Angene Engine
//!
//! A small rendering runtime that drives several kinds of windows from one
//! fixed-timestep loop.
//!
//! ## Features
//!
//! - **2D windows**: clear/rect/text through an off-screen painter surface
//! - **3D windows**: OpenGL and Direct3D 11 through a [`GraphicsBinding`](render::GraphicsBinding)
//! - **VR windows**: the full OpenXR frame protocol, with stereo frames copied
//!   into runtime-owned swapchain images and submitted as a projection layer
//! - **Graceful degradation**: a VR window that cannot start shows a status
//!   scene instead
//! - **Scene contract**: one trait per renderable unit with optional hooks
//!   declared up front
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use angene_engine::prelude::*;
//!
//! struct Spinner {
//!     angle: f64,
//! }
//!
//! impl SceneContract for Spinner {
//!     fn capabilities(&self) -> SceneCapabilities {
//!         SceneCapabilities::DRAW
//!     }
//!
//!     fn update(&mut self, dt: f64) -> SceneResult {
//!         self.angle += dt;
//!         Ok(())
//!     }
//! }
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut engine = EngineContext::new(EngineConfig::default())?;
//!     engine.add_painter_window(
//!         WindowDesc::new("Spinner", 640, 480, SurfaceId(1)),
//!         Box::new(HeadlessSurface::new()),
//!         Box::new(Spinner { angle: 0.0 }),
//!     );
//!
//!     let mut events = EventQueue::new();
//!     engine.run(&mut events)?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

// Core engine modules
pub mod config;
pub mod core;
pub mod engine;
pub mod foundation;

// Rendering and windows
pub mod render;
pub mod scene;
pub mod window;

// OpenXR pipeline
pub mod xr;

pub use engine::{EngineContext, EngineError};

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        core::config::{EngineConfig, VrConfig},
        foundation::math::{Fov, Mat4, Pose, Quat, Vec3},
        render::{BackendKind, Color, GraphicsBinding, HeadlessBinding, HeadlessSurface, Rect, Surface2D},
        scene::{DrawTarget, EyeTarget, SceneCapabilities, SceneContract, SceneError, SceneResult, StatusScene},
        window::{EventQueue, RawMessage, SurfaceId, WindowDesc, WindowEvent, WindowEventSource, WindowId},
        xr::{SimulatedRuntime, VrError, XrRuntime},
        EngineContext, EngineError,
    };
}
