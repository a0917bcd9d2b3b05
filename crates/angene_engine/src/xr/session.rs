//! VR session lifecycle
//!
//! [`VrSessionManager`] owns one OpenXR session and walks it forward through
//! [`VrSessionState`]:
//!
//! ```text
//! Uninitialized -> Discovering -> DeviceBound -> SessionCreated
//!               -> SpaceBound -> SwapchainsReady -> Running -> Stopped
//! ```
//!
//! Each step requires the state before it, and calling a step out of order
//! returns [`VrError::Sequence`]. The session is begun as part of binding the
//! reference space. Beginning it again is a no-op success.
//!
//! Any failure during bring-up tears down whatever was created so far. The
//! owning window then falls back to 2D rendering.

use super::frame_timing::FrameTiming;
use super::protocol::{ViewEnumeration, VrProtocolClient};
use super::render_target_cache::RenderTargetCache;
use super::result::ProtocolError;
use super::runtime::XrRuntime;
use super::types::{
    ApplicationInfo, GraphicsRequirements, ReferenceSpaceType, SessionHandle, SpaceHandle, SwapchainHandle,
    SwapchainImages,
};
use crate::core::config::VrConfig;
use crate::render::{DeviceHandle, GraphicsBinding, RenderError};
use crate::scene::SceneError;
use std::fmt;
use thiserror::Error;

/// Lifecycle state of a VR session
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum VrSessionState {
    /// Nothing created yet
    Uninitialized,
    /// Instance and system are being found
    Discovering,
    /// Graphics device created on the runtime's adapter
    DeviceBound,
    /// Session created
    SessionCreated,
    /// Reference space created and session begun
    SpaceBound,
    /// One swapchain per view created
    SwapchainsReady,
    /// Frames can be rendered
    Running,
    /// Torn down
    Stopped,
}

impl VrSessionState {
    /// State name for logging
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Discovering => "discovering",
            Self::DeviceBound => "device-bound",
            Self::SessionCreated => "session-created",
            Self::SpaceBound => "space-bound",
            Self::SwapchainsReady => "swapchains-ready",
            Self::Running => "running",
            Self::Stopped => "stopped",
        }
    }
}

impl fmt::Display for VrSessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Broad category of a [`VrError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VrErrorKind {
    /// Loader, instance or system unavailable; VR is disabled
    Discovery,
    /// Device creation or adapter mismatch; VR is disabled for this window
    DeviceBinding,
    /// A call was out of order or failed during bring-up
    ProtocolSequence,
    /// User scene code failed
    Scene,
}

/// VR pipeline errors
#[derive(Error, Debug)]
pub enum VrError {
    /// Instance or system could not be obtained
    #[error("VR discovery failed: {0}")]
    Discovery(#[source] ProtocolError),

    /// The runtime would not report which adapter to use
    #[error("Graphics requirements query failed: {0}")]
    Requirements(#[source] ProtocolError),

    /// The graphics device could not be created on the required adapter
    #[error("VR device binding failed: {0}")]
    DeviceBinding(#[from] RenderError),

    /// A step was called in the wrong state
    #[error("{operation} is not valid in state {state}")]
    Sequence {
        /// Step that was attempted
        operation: &'static str,
        /// State the session was in
        state: VrSessionState,
    },

    /// A bring-up call failed
    #[error("VR {stage} failed: {source}")]
    Protocol {
        /// Bring-up stage
        stage: &'static str,
        /// Underlying protocol failure
        #[source]
        source: ProtocolError,
    },

    /// Scene code failed while rendering an eye
    #[error(transparent)]
    Scene(#[from] SceneError),
}

impl VrError {
    /// Category of this error
    pub const fn kind(&self) -> VrErrorKind {
        match self {
            Self::Discovery(_) => VrErrorKind::Discovery,
            Self::Requirements(_) | Self::DeviceBinding(_) => VrErrorKind::DeviceBinding,
            Self::Sequence { .. } | Self::Protocol { .. } => VrErrorKind::ProtocolSequence,
            Self::Scene(_) => VrErrorKind::Scene,
        }
    }

    fn protocol(stage: &'static str, source: ProtocolError) -> Self {
        Self::Protocol { stage, source }
    }
}

/// Swapchain backing one view
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EyeSwapchain {
    /// Runtime handle
    pub handle: SwapchainHandle,
    /// Image width
    pub width: u32,
    /// Image height
    pub height: u32,
    /// Format the swapchain was created with
    pub format: i64,
    /// Runtime-owned images
    pub images: SwapchainImages,
    /// Image acquired on an earlier frame whose wait timed out
    pub(super) pending_wait: Option<u32>,
}

/// Owner of one OpenXR session and its resources
pub struct VrSessionManager<R: XrRuntime> {
    pub(super) client: VrProtocolClient<R>,
    pub(super) config: VrConfig,
    pub(super) state: VrSessionState,
    pub(super) requirements: Option<GraphicsRequirements>,
    pub(super) device: Option<DeviceHandle>,
    pub(super) session: Option<SessionHandle>,
    pub(super) space: Option<(SpaceHandle, ReferenceSpaceType)>,
    pub(super) session_running: bool,
    pub(super) fallback_views: bool,
    pub(super) swapchains: Vec<EyeSwapchain>,
    pub(super) cache: RenderTargetCache,
    pub(super) timing: FrameTiming,
}

impl<R: XrRuntime> VrSessionManager<R> {
    /// Create a manager; nothing is called on the runtime yet
    pub fn new(runtime: R, config: VrConfig) -> Self {
        let timing = FrameTiming::new(600, config.frame_budget_ms);
        Self {
            client: VrProtocolClient::new(runtime, config.retry),
            config,
            state: VrSessionState::Uninitialized,
            requirements: None,
            device: None,
            session: None,
            space: None,
            session_running: false,
            fallback_views: false,
            swapchains: Vec::new(),
            cache: RenderTargetCache::default(),
            timing,
        }
    }

    /// Current lifecycle state
    pub const fn state(&self) -> VrSessionState {
        self.state
    }

    /// Whether frames can be rendered
    pub fn is_running(&self) -> bool {
        self.state == VrSessionState::Running
    }

    /// Whether the runtime session has been begun
    pub const fn session_running(&self) -> bool {
        self.session_running
    }

    /// Swapchains in view order
    pub fn swapchains(&self) -> &[EyeSwapchain] {
        &self.swapchains
    }

    /// Whether the swapchains were sized from the fallback views
    pub const fn used_fallback_views(&self) -> bool {
        self.fallback_views
    }

    /// Reference space type that was bound
    pub fn reference_space_type(&self) -> Option<ReferenceSpaceType> {
        self.space.map(|(_, ty)| ty)
    }

    /// Device created for the session
    pub const fn device(&self) -> Option<DeviceHandle> {
        self.device
    }

    /// Adapter requirements reported by the runtime
    pub const fn requirements(&self) -> Option<GraphicsRequirements> {
        self.requirements
    }

    /// Staging render targets created so far
    pub fn staging_targets(&self) -> usize {
        self.cache.len()
    }

    /// Frame timing statistics
    pub const fn timing(&self) -> &FrameTiming {
        &self.timing
    }

    /// Configuration in use
    pub const fn config(&self) -> &VrConfig {
        &self.config
    }

    /// Underlying runtime
    pub const fn runtime(&self) -> &R {
        self.client.runtime()
    }

    /// Mutable access to the underlying runtime
    pub fn runtime_mut(&mut self) -> &mut R {
        self.client.runtime_mut()
    }

    fn expect_state(&self, operation: &'static str, expected: VrSessionState) -> Result<(), VrError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(VrError::Sequence {
                operation,
                state: self.state,
            })
        }
    }

    /// Bring the session up to [`VrSessionState::Running`]
    ///
    /// On failure everything created so far is released, the state becomes
    /// [`VrSessionState::Stopped`] and the error is returned.
    pub fn initialize(&mut self, binding: &mut dyn GraphicsBinding) -> Result<(), VrError> {
        let result = self.bring_up(binding);
        match &result {
            Ok(()) => {
                self.state = VrSessionState::Running;
                log::info!(
                    "VR session running: {} views, {} reference space{}",
                    self.swapchains.len(),
                    self.reference_space_type().map_or("no", ReferenceSpaceType::as_str),
                    if self.fallback_views { ", fallback view sizes" } else { "" }
                );
            }
            Err(e) => {
                log::warn!("VR bring-up stopped at {}: {}", self.state, e);
                self.shutdown(binding);
            }
        }
        result
    }

    fn bring_up(&mut self, binding: &mut dyn GraphicsBinding) -> Result<(), VrError> {
        self.discover()?;
        self.bind_device(binding)?;
        self.create_session()?;
        self.bind_space()?;
        self.create_swapchains()
    }

    /// Create the instance and find the system
    pub fn discover(&mut self) -> Result<(), VrError> {
        self.expect_state("discover", VrSessionState::Uninitialized)?;
        self.state = VrSessionState::Discovering;

        let application = ApplicationInfo::new(
            &self.config.application_name,
            &self.config.engine_name,
            self.config.api_version,
        );
        self.client
            .create_instance(application, self.config.requested_extensions())
            .map_err(VrError::Discovery)?;
        self.client
            .get_system(self.config.form_factor)
            .map_err(VrError::Discovery)?;
        Ok(())
    }

    /// Query the required adapter and create the device on it
    pub fn bind_device(&mut self, binding: &mut dyn GraphicsBinding) -> Result<DeviceHandle, VrError> {
        self.expect_state("bind device", VrSessionState::Discovering)?;

        let requirements = self.client.get_graphics_requirements().map_err(VrError::Requirements)?;
        self.requirements = Some(requirements);

        let device = binding.create_device(Some(requirements.adapter_luid))?;
        log::info!("VR device {} created on adapter {}", device.0, requirements.adapter_luid);
        self.device = Some(device);
        self.state = VrSessionState::DeviceBound;
        Ok(device)
    }

    /// Create the session on the bound device
    pub fn create_session(&mut self) -> Result<SessionHandle, VrError> {
        self.expect_state("create session", VrSessionState::DeviceBound)?;
        let device = self.device.ok_or(VrError::Sequence {
            operation: "create session",
            state: self.state,
        })?;

        let session = self
            .client
            .create_session(device)
            .map_err(|e| VrError::protocol("session creation", e))?;
        self.session = Some(session);
        self.state = VrSessionState::SessionCreated;
        Ok(session)
    }

    /// Create the reference space, trying each configured type in order, then begin the session
    pub fn bind_space(&mut self) -> Result<ReferenceSpaceType, VrError> {
        self.expect_state("bind space", VrSessionState::SessionCreated)?;
        let session = self.session.ok_or(VrError::Sequence {
            operation: "bind space",
            state: self.state,
        })?;

        let mut last_error = None;
        for space_type in self.config.reference_space_order.clone() {
            match self.client.create_reference_space(session, space_type) {
                Ok(space) => {
                    log::info!("Reference space {} created", space_type.as_str());
                    self.space = Some((space, space_type));
                    break;
                }
                Err(e) => {
                    log::warn!("Reference space {} unavailable: {}", space_type.as_str(), e);
                    last_error = Some(e);
                }
            }
        }

        let Some((_, space_type)) = self.space else {
            let source = last_error.unwrap_or(ProtocolError::MissingPrerequisite {
                call: super::runtime::entry_points::CREATE_REFERENCE_SPACE,
                missing: "reference space type",
            });
            return Err(VrError::protocol("reference space creation", source));
        };

        self.state = VrSessionState::SpaceBound;
        self.begin_session()?;
        Ok(space_type)
    }

    /// Begin the session
    ///
    /// Once the session is running, further calls succeed without touching
    /// the runtime.
    pub fn begin_session(&mut self) -> Result<(), VrError> {
        if self.session_running {
            log::debug!("Session already running, begin ignored");
            return Ok(());
        }
        let ready = matches!(
            self.state,
            VrSessionState::SpaceBound | VrSessionState::SwapchainsReady | VrSessionState::Running
        );
        let session = match self.session {
            Some(session) if ready => session,
            _ => {
                return Err(VrError::Sequence {
                    operation: "begin session",
                    state: self.state,
                })
            }
        };

        self.client
            .begin_session(session, self.config.view_configuration)
            .map_err(|e| VrError::protocol("session begin", e))?;
        self.session_running = true;
        log::info!("Session {} begun", session.0);
        Ok(())
    }

    /// Create one swapchain per view, sized from view enumeration
    ///
    /// A failure on any view destroys the swapchains already created.
    pub fn create_swapchains(&mut self) -> Result<(), VrError> {
        self.expect_state("create swapchains", VrSessionState::SpaceBound)?;
        let session = self.session.ok_or(VrError::Sequence {
            operation: "create swapchains",
            state: self.state,
        })?;

        let enumeration = self
            .client
            .enumerate_view_configuration_views(self.config.view_configuration, &self.config.fallback_view)
            .map_err(|e| VrError::protocol("view enumeration", e))?;
        self.fallback_views = enumeration.is_fallback();
        let views = match enumeration {
            ViewEnumeration::Runtime(views) | ViewEnumeration::Fallback { views, .. } => views,
        };

        let preference = self.config.swapchain_format_preference.clone();
        for (index, view) in views.iter().enumerate() {
            let (width, height) = (view.recommended_width, view.recommended_height);
            let created = self
                .client
                .create_swapchain(session, width, height, None, &preference)
                .and_then(|(handle, format)| match self.client.enumerate_swapchain_images(handle) {
                    Ok(images) => Ok((handle, format, images)),
                    Err(e) => {
                        if let Err(destroy) = self.client.destroy_swapchain(handle) {
                            log::warn!("Could not destroy swapchain {}: {}", handle.0, destroy);
                        }
                        Err(e)
                    }
                });

            match created {
                Ok((handle, format, images)) => {
                    log::debug!("Swapchain {} for view {} has {} images", handle.0, index, images.len());
                    self.swapchains.push(EyeSwapchain {
                        handle,
                        width,
                        height,
                        format,
                        images,
                        pending_wait: None,
                    });
                }
                Err(e) => {
                    log::error!("Swapchain for view {} failed, aborting VR: {}", index, e);
                    self.destroy_swapchains();
                    return Err(VrError::protocol("swapchain creation", e));
                }
            }
        }

        let capacity = self.swapchains.iter().map(|s| s.images.len()).sum();
        self.cache = RenderTargetCache::with_capacity(capacity);
        self.state = VrSessionState::SwapchainsReady;
        Ok(())
    }

    fn destroy_swapchains(&mut self) {
        for swapchain in self.swapchains.drain(..) {
            if let Err(e) = self.client.destroy_swapchain(swapchain.handle) {
                log::warn!("Could not destroy swapchain {}: {}", swapchain.handle.0, e);
            }
        }
    }

    /// Release every resource and stop the session
    ///
    /// Safe to call more than once.
    pub fn shutdown(&mut self, binding: &mut dyn GraphicsBinding) {
        if self.state == VrSessionState::Stopped {
            return;
        }

        if let Some(session) = self.session {
            if self.session_running {
                if let Err(e) = self.client.end_session(session) {
                    log::warn!("Could not end session {}: {}", session.0, e);
                }
                self.session_running = false;
            }
        }

        self.destroy_swapchains();

        if let Some((space, space_type)) = self.space.take() {
            if let Err(e) = self.client.destroy_space(space) {
                log::warn!("Could not destroy {} space: {}", space_type.as_str(), e);
            }
        }

        if let Some(session) = self.session.take() {
            if let Err(e) = self.client.destroy_session(session) {
                log::warn!("Could not destroy session {}: {}", session.0, e);
            }
        }

        self.cache.release_all(binding);

        if self.timing.total_frames() > 0 {
            log::info!("VR session stopped: {}", self.timing.summary());
        }
        self.state = VrSessionState::Stopped;
    }
}
