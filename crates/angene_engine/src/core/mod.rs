//! # Core Engine Module
//!
//! Shared configuration and the fixed-timestep scheduler used by the engine
//! loop.
//!
//! ## Organization
//!
//! - **Config**: engine and VR configuration structures
//! - **Scheduler**: fixed-timestep update driver

pub mod config;
pub mod scheduler;

pub use config::{Config, ConfigError, EngineConfig, FallbackViewConfig, VrConfig};
pub use scheduler::FrameScheduler;
