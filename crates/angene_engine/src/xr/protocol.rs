//! OpenXR protocol client
//!
//! [`VrProtocolClient`] turns the engine's high-level verbs into runtime calls.
//! Before each verb it resolves the entry point:
//!
//! 1. through the instance-scoped resolver (`xrGetInstanceProcAddr`)
//! 2. failing that, through a direct symbol lookup in the loader library
//!
//! An unresolvable entry point is reported as [`ProtocolError::NotFound`],
//! which is distinct from a runtime failure code.
//!
//! ## Fallbacks
//!
//! View enumeration never fails outright. An unsupported view configuration,
//! a failing properties query, a zero or failing count query, or a buffer that
//! stays unpopulated after the retry policy is exhausted all produce the
//! configured fallback views instead. Swapchain format selection falls back to
//! the first preferred format when the runtime cannot enumerate formats.

use super::result::{check, ProtocolError, XrOutcome, XrResult};
use super::retry::RetryPolicy;
use super::runtime::{entry_points as ep, XrRuntime};
use super::types::{
    ApplicationInfo, FormFactor, FrameEndInfo, FrameState, GraphicsRequirements, InstanceCreateInfo,
    InstanceHandle, ReferenceSpaceType, SessionHandle, SpaceHandle, SwapchainCreateInfo, SwapchainHandle,
    SystemId, View, ViewConfigurationType, ViewConfigurationView, XrTime,
};
use crate::core::config::FallbackViewConfig;
use crate::foundation::math::Pose;
use crate::render::{DeviceHandle, TextureHandle};
use std::collections::HashMap;
use std::time::Duration;

/// Where an entry point was found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcSource {
    /// Returned by the instance-scoped resolver
    InstanceResolver,
    /// Exported directly by the loader library
    Library,
}

/// Why view enumeration fell back to the configured views
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewFallbackReason {
    /// The runtime does not support the requested view configuration
    ConfigurationUnsupported,
    /// An entry point or query needed for enumeration failed
    QueryFailed(ProtocolError),
    /// The runtime reported zero views
    ZeroViews,
    /// The filled buffer never contained usable data
    Unpopulated,
}

/// Outcome of view enumeration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewEnumeration {
    /// Views reported by the runtime
    Runtime(Vec<ViewConfigurationView>),
    /// Configured fallback views
    Fallback {
        /// Fallback views
        views: Vec<ViewConfigurationView>,
        /// What went wrong
        reason: ViewFallbackReason,
    },
}

impl ViewEnumeration {
    /// The views to use, wherever they came from
    pub fn views(&self) -> &[ViewConfigurationView] {
        match self {
            Self::Runtime(views) | Self::Fallback { views, .. } => views,
        }
    }

    /// Whether the fallback was used
    pub const fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback { .. })
    }
}

/// Pick a swapchain format
///
/// With an enumerated list, the first preferred format the runtime supports
/// wins, else the runtime's first format. Without one, the first preferred
/// format is used as is.
pub fn select_swapchain_format(available: Option<&[i64]>, preference: &[i64]) -> Option<i64> {
    match available {
        Some(formats) if !formats.is_empty() => preference
            .iter()
            .copied()
            .find(|format| formats.contains(format))
            .or_else(|| formats.first().copied()),
        _ => preference.first().copied(),
    }
}

/// Typed client over an [`XrRuntime`]
pub struct VrProtocolClient<R: XrRuntime> {
    runtime: R,
    retry: RetryPolicy,
    instance: Option<InstanceHandle>,
    system: Option<SystemId>,
    requirements_queried: bool,
    resolved: HashMap<&'static str, ProcSource>,
}

impl<R: XrRuntime> VrProtocolClient<R> {
    /// Create a client; no runtime call is made yet
    pub fn new(runtime: R, retry: RetryPolicy) -> Self {
        Self {
            runtime,
            retry,
            instance: None,
            system: None,
            requirements_queried: false,
            resolved: HashMap::new(),
        }
    }

    /// Instance created by [`Self::create_instance`]
    pub const fn instance(&self) -> Option<InstanceHandle> {
        self.instance
    }

    /// System found by [`Self::get_system`]
    pub const fn system(&self) -> Option<SystemId> {
        self.system
    }

    /// Underlying runtime
    pub const fn runtime(&self) -> &R {
        &self.runtime
    }

    /// Mutable access to the underlying runtime
    pub fn runtime_mut(&mut self) -> &mut R {
        &mut self.runtime
    }

    /// Look up an entry point, caching successful lookups
    pub fn resolve(&mut self, name: &'static str) -> XrOutcome<ProcSource> {
        if !self.runtime.loader_available() {
            return Err(ProtocolError::LoaderUnavailable);
        }
        if let Some(source) = self.resolved.get(name) {
            return Ok(*source);
        }

        let status = self.runtime.get_instance_proc_addr(self.instance, name);
        let source = if status.is_success() {
            ProcSource::InstanceResolver
        } else if self.runtime.library_symbol(name) {
            log::debug!("{} not returned by the instance resolver ({}), using library export", name, status);
            ProcSource::Library
        } else {
            log::warn!("Entry point {} not found ({})", name, status);
            return Err(ProtocolError::NotFound(name));
        };

        self.resolved.insert(name, source);
        Ok(source)
    }

    fn call<T>(&mut self, name: &'static str, f: impl FnOnce(&mut R) -> Result<T, XrResult>) -> XrOutcome<T> {
        self.resolve(name)?;
        log::trace!("{}", name);
        f(&mut self.runtime).map_err(|result| ProtocolError::runtime(name, result))
    }

    fn call_status(&mut self, name: &'static str, f: impl FnOnce(&mut R) -> XrResult) -> XrOutcome<()> {
        self.resolve(name)?;
        log::trace!("{}", name);
        check(name, f(&mut self.runtime))
    }

    fn require_instance(&self, call: &'static str) -> XrOutcome<InstanceHandle> {
        self.instance.ok_or(ProtocolError::MissingPrerequisite { call, missing: "instance" })
    }

    fn require_system(&self, call: &'static str) -> XrOutcome<(InstanceHandle, SystemId)> {
        let instance = self.require_instance(call)?;
        let system = self.system.ok_or(ProtocolError::MissingPrerequisite { call, missing: "system" })?;
        Ok((instance, system))
    }

    /// Create the runtime instance
    ///
    /// # Arguments
    /// * `application` - application info sent to the runtime
    /// * `extensions` - extensions to enable
    pub fn create_instance(
        &mut self,
        application: ApplicationInfo,
        extensions: Vec<String>,
    ) -> XrOutcome<InstanceHandle> {
        if !self.runtime.loader_available() {
            log::warn!("OpenXR loader not available");
            return Err(ProtocolError::LoaderUnavailable);
        }

        let info = InstanceCreateInfo { application, extensions };
        let instance = self.call(ep::CREATE_INSTANCE, |rt| rt.create_instance(&info))?;
        log::info!(
            "OpenXR instance created for '{}' (api {:#x})",
            info.application.application_name,
            info.application.api_version.packed()
        );
        self.instance = Some(instance);
        Ok(instance)
    }

    /// Find the system for a form factor
    pub fn get_system(&mut self, form_factor: FormFactor) -> XrOutcome<SystemId> {
        let instance = self.require_instance(ep::GET_SYSTEM)?;
        let system = self.call(ep::GET_SYSTEM, |rt| rt.get_system(instance, form_factor))?;
        log::info!("OpenXR system {} found ({:?})", system.0, form_factor);
        self.system = Some(system);
        Ok(system)
    }

    /// Query the adapter the runtime requires
    ///
    /// Must precede session creation.
    pub fn get_graphics_requirements(&mut self) -> XrOutcome<GraphicsRequirements> {
        let (instance, system) = self.require_system(ep::GET_GRAPHICS_REQUIREMENTS)?;
        let requirements = self.call(ep::GET_GRAPHICS_REQUIREMENTS, |rt| rt.graphics_requirements(instance, system))?;
        log::info!(
            "Runtime requires adapter {} (min feature level {:#x})",
            requirements.adapter_luid,
            requirements.min_feature_level
        );
        self.requirements_queried = true;
        Ok(requirements)
    }

    /// Enumerate per-view rendering limits, falling back when the runtime cannot say
    ///
    /// Fails only when instance or system are missing.
    pub fn enumerate_view_configuration_views(
        &mut self,
        view_type: ViewConfigurationType,
        fallback: &FallbackViewConfig,
    ) -> XrOutcome<ViewEnumeration> {
        let (instance, system) = self.require_system(ep::ENUMERATE_VIEW_CONFIGURATION_VIEWS)?;

        let fall_back = |reason: ViewFallbackReason| -> XrOutcome<ViewEnumeration> {
            log::warn!(
                "Using fallback view configuration: {} x {}x{} ({:?})",
                fallback.view_count,
                fallback.recommended_width,
                fallback.recommended_height,
                reason
            );
            Ok(ViewEnumeration::Fallback {
                views: fallback.views(),
                reason,
            })
        };

        match self.call(ep::ENUMERATE_VIEW_CONFIGURATIONS, |rt| {
            rt.enumerate_view_configurations(instance, system)
        }) {
            Ok(types) if !types.contains(&view_type) => {
                return fall_back(ViewFallbackReason::ConfigurationUnsupported);
            }
            Ok(_) => {}
            Err(e) => log::warn!("Could not list view configurations: {}", e),
        }

        if let Err(e) = self.call_status(ep::GET_VIEW_CONFIGURATION_PROPERTIES, |rt| {
            rt.view_configuration_properties(instance, system, view_type)
        }) {
            return fall_back(ViewFallbackReason::QueryFailed(e));
        }

        let count = match self.call(ep::ENUMERATE_VIEW_CONFIGURATION_VIEWS, |rt| {
            rt.view_configuration_view_count(instance, system, view_type)
        }) {
            Ok(0) => return fall_back(ViewFallbackReason::ZeroViews),
            Ok(count) => count,
            Err(e) => return fall_back(ViewFallbackReason::QueryFailed(e)),
        };

        let retry = self.retry;
        let filled = retry.run("View configuration enumeration", |_| {
            let mut buffer = vec![ViewConfigurationView::tagged(); count as usize];
            let written = self.call(ep::ENUMERATE_VIEW_CONFIGURATION_VIEWS, |rt| {
                rt.fill_view_configuration_views(instance, system, view_type, &mut buffer)
            })?;
            buffer.truncate(written as usize);

            if !buffer.is_empty() && buffer.iter().all(ViewConfigurationView::is_populated) {
                Ok(buffer)
            } else {
                Err(ProtocolError::Empty(ep::ENUMERATE_VIEW_CONFIGURATION_VIEWS))
            }
        });

        match filled {
            Ok(views) => {
                for (index, view) in views.iter().enumerate() {
                    log::info!(
                        "View {}: recommended {}x{}, max {}x{}, samples {}/{}",
                        index,
                        view.recommended_width,
                        view.recommended_height,
                        view.max_width,
                        view.max_height,
                        view.recommended_samples,
                        view.max_samples
                    );
                }
                Ok(ViewEnumeration::Runtime(views))
            }
            Err(ProtocolError::Empty(_)) => fall_back(ViewFallbackReason::Unpopulated),
            Err(e) => fall_back(ViewFallbackReason::QueryFailed(e)),
        }
    }

    /// Create a session bound to `device`
    pub fn create_session(&mut self, device: DeviceHandle) -> XrOutcome<SessionHandle> {
        let (instance, system) = self.require_system(ep::CREATE_SESSION)?;
        if !self.requirements_queried {
            return Err(ProtocolError::MissingPrerequisite {
                call: ep::CREATE_SESSION,
                missing: "graphics requirements query",
            });
        }
        let session = self.call(ep::CREATE_SESSION, |rt| rt.create_session(instance, system, device))?;
        log::info!("OpenXR session {} created", session.0);
        Ok(session)
    }

    /// Create a reference space with an identity pose
    pub fn create_reference_space(
        &mut self,
        session: SessionHandle,
        space_type: ReferenceSpaceType,
    ) -> XrOutcome<SpaceHandle> {
        self.call(ep::CREATE_REFERENCE_SPACE, |rt| {
            rt.create_reference_space(session, space_type, Pose::identity())
        })
    }

    /// Begin the session
    pub fn begin_session(&mut self, session: SessionHandle, view_type: ViewConfigurationType) -> XrOutcome<()> {
        self.call_status(ep::BEGIN_SESSION, |rt| rt.begin_session(session, view_type))
    }

    /// End the session
    pub fn end_session(&mut self, session: SessionHandle) -> XrOutcome<()> {
        self.call_status(ep::END_SESSION, |rt| rt.end_session(session))
    }

    /// List the swapchain formats the runtime supports
    pub fn enumerate_swapchain_formats(&mut self, session: SessionHandle) -> XrOutcome<Vec<i64>> {
        self.call(ep::ENUMERATE_SWAPCHAIN_FORMATS, |rt| rt.enumerate_swapchain_formats(session))
    }

    /// Create a color swapchain
    ///
    /// # Arguments
    /// * `format` - explicit format, or `None` to select from `preference`
    /// * `preference` - formats in order of preference
    ///
    /// # Returns
    /// The swapchain and the format it was created with.
    pub fn create_swapchain(
        &mut self,
        session: SessionHandle,
        width: u32,
        height: u32,
        format: Option<i64>,
        preference: &[i64],
    ) -> XrOutcome<(SwapchainHandle, i64)> {
        let format = match format {
            Some(format) => format,
            None => {
                let available = match self.enumerate_swapchain_formats(session) {
                    Ok(formats) => {
                        log::debug!("Runtime swapchain formats: {:?}", formats);
                        Some(formats)
                    }
                    Err(e) => {
                        log::warn!("Swapchain format enumeration failed ({}), using preference list", e);
                        None
                    }
                };
                select_swapchain_format(available.as_deref(), preference).ok_or(
                    ProtocolError::MissingPrerequisite {
                        call: ep::CREATE_SWAPCHAIN,
                        missing: "swapchain format",
                    },
                )?
            }
        };

        let info = SwapchainCreateInfo::color(width, height, format);
        let swapchain = self.call(ep::CREATE_SWAPCHAIN, |rt| rt.create_swapchain(session, &info))?;
        log::info!("Swapchain {} created: {}x{} format {}", swapchain.0, width, height, format);
        Ok((swapchain, format))
    }

    /// List a swapchain's images
    pub fn enumerate_swapchain_images(&mut self, swapchain: SwapchainHandle) -> XrOutcome<Vec<TextureHandle>> {
        let images = self.call(ep::ENUMERATE_SWAPCHAIN_IMAGES, |rt| rt.enumerate_swapchain_images(swapchain))?;
        if images.is_empty() {
            return Err(ProtocolError::Empty(ep::ENUMERATE_SWAPCHAIN_IMAGES));
        }
        Ok(images)
    }

    /// Wait for the next frame
    pub fn wait_frame(&mut self, session: SessionHandle) -> XrOutcome<FrameState> {
        self.call(ep::WAIT_FRAME, |rt| rt.wait_frame(session))
    }

    /// Begin the frame
    pub fn begin_frame(&mut self, session: SessionHandle) -> XrOutcome<()> {
        self.call_status(ep::BEGIN_FRAME, |rt| rt.begin_frame(session))
    }

    /// Locate the views for a display time
    pub fn locate_views(
        &mut self,
        session: SessionHandle,
        view_type: ViewConfigurationType,
        display_time: XrTime,
        space: SpaceHandle,
        view_count: u32,
    ) -> XrOutcome<Vec<View>> {
        self.call(ep::LOCATE_VIEWS, |rt| {
            rt.locate_views(session, view_type, display_time, space, view_count)
        })
    }

    /// Acquire the next image of a swapchain
    pub fn acquire_swapchain_image(&mut self, swapchain: SwapchainHandle) -> XrOutcome<u32> {
        self.call(ep::ACQUIRE_SWAPCHAIN_IMAGE, |rt| rt.acquire_swapchain_image(swapchain))
    }

    /// Wait until the acquired image is writable
    ///
    /// A timeout is reported as a failure even though the runtime classes it
    /// as a qualified success. It comes back as [`ProtocolError::Runtime`]
    /// carrying [`XrResult::TIMEOUT_EXPIRED`] so callers can tell it apart
    /// from a hard failure: after a timeout the image is still acquired.
    pub fn wait_swapchain_image(&mut self, swapchain: SwapchainHandle, timeout: Duration) -> XrOutcome<()> {
        self.resolve(ep::WAIT_SWAPCHAIN_IMAGE)?;
        match self.runtime.wait_swapchain_image(swapchain, timeout) {
            XrResult::TIMEOUT_EXPIRED => Err(ProtocolError::runtime(ep::WAIT_SWAPCHAIN_IMAGE, XrResult::TIMEOUT_EXPIRED)),
            status => check(ep::WAIT_SWAPCHAIN_IMAGE, status),
        }
    }

    /// Release the acquired image
    pub fn release_swapchain_image(&mut self, swapchain: SwapchainHandle) -> XrOutcome<()> {
        self.call_status(ep::RELEASE_SWAPCHAIN_IMAGE, |rt| rt.release_swapchain_image(swapchain))
    }

    /// Submit the frame
    pub fn end_frame(&mut self, session: SessionHandle, info: &FrameEndInfo) -> XrOutcome<()> {
        self.call_status(ep::END_FRAME, |rt| rt.end_frame(session, info))
    }

    /// Destroy a swapchain
    pub fn destroy_swapchain(&mut self, swapchain: SwapchainHandle) -> XrOutcome<()> {
        self.call_status(ep::DESTROY_SWAPCHAIN, |rt| rt.destroy_swapchain(swapchain))
    }

    /// Destroy a reference space
    pub fn destroy_space(&mut self, space: SpaceHandle) -> XrOutcome<()> {
        self.call_status(ep::DESTROY_SPACE, |rt| rt.destroy_space(space))
    }

    /// Destroy a session
    pub fn destroy_session(&mut self, session: SessionHandle) -> XrOutcome<()> {
        self.call_status(ep::DESTROY_SESSION, |rt| rt.destroy_session(session))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xr::simulated::{SimFailure, SimulatedRuntime};
    use crate::xr::types::ApiVersion;

    fn client(runtime: SimulatedRuntime) -> VrProtocolClient<SimulatedRuntime> {
        VrProtocolClient::new(runtime, RetryPolicy::immediate(3))
    }

    fn app() -> ApplicationInfo {
        ApplicationInfo::new("test", "Angene", ApiVersion::V1_0_0)
    }

    fn with_system(runtime: SimulatedRuntime) -> VrProtocolClient<SimulatedRuntime> {
        let mut client = client(runtime);
        client.create_instance(app(), vec!["XR_KHR_D3D11_enable".to_string()]).unwrap();
        client.get_system(FormFactor::HeadMountedDisplay).unwrap();
        client
    }

    #[test]
    fn test_resolve_prefers_instance_resolver() {
        let mut client = client(SimulatedRuntime::new());
        assert_eq!(client.resolve(ep::CREATE_INSTANCE), Ok(ProcSource::InstanceResolver));
    }

    #[test]
    fn test_resolve_falls_back_to_library() {
        let runtime = SimulatedRuntime::new().hide_from_instance_resolver(ep::BEGIN_FRAME);
        let mut client = client(runtime);
        assert_eq!(client.resolve(ep::BEGIN_FRAME), Ok(ProcSource::Library));
    }

    #[test]
    fn test_resolve_reports_not_found() {
        let runtime = SimulatedRuntime::new().without_entry_point(ep::LOCATE_VIEWS);
        let mut client = client(runtime);
        let error = client.resolve(ep::LOCATE_VIEWS).unwrap_err();
        assert_eq!(error, ProtocolError::NotFound(ep::LOCATE_VIEWS));
        assert_eq!(error.status(), XrResult(-2));
    }

    #[test]
    fn test_resolution_is_cached() {
        let mut client = client(SimulatedRuntime::new());
        client.resolve(ep::WAIT_FRAME).unwrap();
        client.resolve(ep::WAIT_FRAME).unwrap();
        assert_eq!(client.runtime().proc_lookups(ep::WAIT_FRAME), 1);
    }

    #[test]
    fn test_create_instance_without_loader() {
        let mut client = client(SimulatedRuntime::new().without_loader());
        assert_eq!(client.create_instance(app(), Vec::new()), Err(ProtocolError::LoaderUnavailable));
        assert!(client.runtime().calls().is_empty());
    }

    #[test]
    fn test_get_system_requires_instance() {
        let mut client = client(SimulatedRuntime::new());
        let error = client.get_system(FormFactor::HeadMountedDisplay).unwrap_err();
        assert!(matches!(error, ProtocolError::MissingPrerequisite { missing: "instance", .. }));
        assert_eq!(error.status(), XrResult(-1));
    }

    #[test]
    fn test_session_requires_graphics_requirements() {
        let mut client = with_system(SimulatedRuntime::new());
        let error = client.create_session(DeviceHandle(1)).unwrap_err();
        assert!(matches!(error, ProtocolError::MissingPrerequisite { .. }));

        client.get_graphics_requirements().unwrap();
        assert!(client.create_session(DeviceHandle(1)).is_ok());
    }

    #[test]
    fn test_runtime_views_reported() {
        let mut client = with_system(SimulatedRuntime::new().with_views(2, 1024, 1024));
        let views = client
            .enumerate_view_configuration_views(ViewConfigurationType::PrimaryStereo, &FallbackViewConfig::default())
            .unwrap();
        assert!(!views.is_fallback());
        assert_eq!(views.views().len(), 2);
        assert_eq!(views.views()[0].recommended_width, 1024);
    }

    #[test]
    fn test_zero_views_use_fallback() {
        let mut client = with_system(SimulatedRuntime::new().with_views(0, 1024, 1024));
        let views = client
            .enumerate_view_configuration_views(ViewConfigurationType::PrimaryStereo, &FallbackViewConfig::default())
            .unwrap();
        assert_eq!(
            views,
            ViewEnumeration::Fallback {
                views: FallbackViewConfig::default().views(),
                reason: ViewFallbackReason::ZeroViews,
            }
        );
    }

    #[test]
    fn test_failed_count_query_uses_fallback() {
        let mut client = with_system(SimulatedRuntime::new().with_failure(SimFailure::ViewCount));
        let views = client
            .enumerate_view_configuration_views(ViewConfigurationType::PrimaryStereo, &FallbackViewConfig::default())
            .unwrap();
        assert!(views.is_fallback());
        assert_eq!(views.views().len(), 2);
        assert!(views.views().iter().all(|v| v.recommended_width == 1832 && v.recommended_height == 1920));
    }

    #[test]
    fn test_failed_properties_query_uses_fallback() {
        let mut client = with_system(SimulatedRuntime::new().with_failure(SimFailure::ViewProperties));
        let views = client
            .enumerate_view_configuration_views(ViewConfigurationType::PrimaryStereo, &FallbackViewConfig::default())
            .unwrap();
        assert!(views.is_fallback());
        assert_eq!(client.runtime().call_count(ep::ENUMERATE_VIEW_CONFIGURATION_VIEWS), 0);
    }

    #[test]
    fn test_unsupported_configuration_uses_fallback() {
        let mut client = with_system(SimulatedRuntime::new());
        let views = client
            .enumerate_view_configuration_views(ViewConfigurationType::PrimaryMono, &FallbackViewConfig::default())
            .unwrap();
        assert!(matches!(
            views,
            ViewEnumeration::Fallback { reason: ViewFallbackReason::ConfigurationUnsupported, .. }
        ));
    }

    #[test]
    fn test_unpopulated_fill_is_retried() {
        let mut client = with_system(SimulatedRuntime::new().with_views(2, 1440, 1600).with_empty_fills(2));
        let views = client
            .enumerate_view_configuration_views(ViewConfigurationType::PrimaryStereo, &FallbackViewConfig::default())
            .unwrap();
        assert!(!views.is_fallback());
        assert_eq!(views.views()[1].recommended_height, 1600);
    }

    #[test]
    fn test_unpopulated_fill_exhausts_retries() {
        let mut client = with_system(SimulatedRuntime::new().with_views(2, 1440, 1600).with_empty_fills(5));
        let views = client
            .enumerate_view_configuration_views(ViewConfigurationType::PrimaryStereo, &FallbackViewConfig::default())
            .unwrap();
        assert!(matches!(views, ViewEnumeration::Fallback { reason: ViewFallbackReason::Unpopulated, .. }));
    }

    #[test]
    fn test_format_selection() {
        let preference = [27, 91, 28, 29];
        assert_eq!(select_swapchain_format(Some(&[29, 91][..]), &preference), Some(91));
        assert_eq!(select_swapchain_format(Some(&[87, 10][..]), &preference), Some(87));
        assert_eq!(select_swapchain_format(None, &preference), Some(27));
        assert_eq!(select_swapchain_format(Some(&[][..]), &preference), Some(27));
        assert_eq!(select_swapchain_format(None, &[]), None);
    }

    #[test]
    fn test_swapchain_uses_preference_when_enumeration_fails() {
        let mut client = with_system(SimulatedRuntime::new().with_failure(SimFailure::SwapchainFormats));
        client.get_graphics_requirements().unwrap();
        let session = client.create_session(DeviceHandle(1)).unwrap();

        let (_, format) = client.create_swapchain(session, 512, 512, None, &[27, 91, 28, 29]).unwrap();
        assert_eq!(format, 27);
    }

    #[test]
    fn test_wait_timeout_is_failure() {
        let mut client = with_system(SimulatedRuntime::new().with_failure(SimFailure::WaitImage(0)));
        client.get_graphics_requirements().unwrap();
        let session = client.create_session(DeviceHandle(1)).unwrap();
        let (swapchain, _) = client.create_swapchain(session, 512, 512, Some(28), &[]).unwrap();
        client.acquire_swapchain_image(swapchain).unwrap();

        let error = client.wait_swapchain_image(swapchain, Duration::from_secs(1)).unwrap_err();
        assert_eq!(error.status(), XrResult::TIMEOUT_EXPIRED);
    }
}
