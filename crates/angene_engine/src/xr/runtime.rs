//! Runtime call surface
//!
//! [`XrRuntime`] is the binding layer between the protocol client and an
//! OpenXR runtime. It mirrors the loader's two ways of finding entry points
//! (the instance-scoped `xrGetInstanceProcAddr` and a direct library symbol
//! lookup) and exposes each verb as a typed method returning the raw
//! [`XrResult`] on failure.
//!
//! Implementations must not be shared across threads: every call happens on
//! the thread that runs the engine loop.

use super::result::XrResult;
use super::types::{
    FormFactor, FrameEndInfo, FrameState, GraphicsRequirements, InstanceCreateInfo, InstanceHandle,
    ReferenceSpaceType, SessionHandle, SpaceHandle, SwapchainCreateInfo, SwapchainHandle,
    SwapchainImages, SystemId, View, ViewConfigurationType, ViewConfigurationView, XrTime,
};
use crate::foundation::math::Pose;
use crate::render::DeviceHandle;
use std::time::Duration;

/// Entry point names resolved before each verb
pub mod entry_points {
    /// xrCreateInstance
    pub const CREATE_INSTANCE: &str = "xrCreateInstance";
    /// xrGetSystem
    pub const GET_SYSTEM: &str = "xrGetSystem";
    /// xrGetD3D11GraphicsRequirementsKHR
    pub const GET_GRAPHICS_REQUIREMENTS: &str = "xrGetD3D11GraphicsRequirementsKHR";
    /// xrEnumerateViewConfigurations
    pub const ENUMERATE_VIEW_CONFIGURATIONS: &str = "xrEnumerateViewConfigurations";
    /// xrGetViewConfigurationProperties
    pub const GET_VIEW_CONFIGURATION_PROPERTIES: &str = "xrGetViewConfigurationProperties";
    /// xrEnumerateViewConfigurationViews
    pub const ENUMERATE_VIEW_CONFIGURATION_VIEWS: &str = "xrEnumerateViewConfigurationViews";
    /// xrCreateSession
    pub const CREATE_SESSION: &str = "xrCreateSession";
    /// xrCreateReferenceSpace
    pub const CREATE_REFERENCE_SPACE: &str = "xrCreateReferenceSpace";
    /// xrBeginSession
    pub const BEGIN_SESSION: &str = "xrBeginSession";
    /// xrEndSession
    pub const END_SESSION: &str = "xrEndSession";
    /// xrEnumerateSwapchainFormats
    pub const ENUMERATE_SWAPCHAIN_FORMATS: &str = "xrEnumerateSwapchainFormats";
    /// xrCreateSwapchain
    pub const CREATE_SWAPCHAIN: &str = "xrCreateSwapchain";
    /// xrEnumerateSwapchainImages
    pub const ENUMERATE_SWAPCHAIN_IMAGES: &str = "xrEnumerateSwapchainImages";
    /// xrWaitFrame
    pub const WAIT_FRAME: &str = "xrWaitFrame";
    /// xrBeginFrame
    pub const BEGIN_FRAME: &str = "xrBeginFrame";
    /// xrLocateViews
    pub const LOCATE_VIEWS: &str = "xrLocateViews";
    /// xrAcquireSwapchainImage
    pub const ACQUIRE_SWAPCHAIN_IMAGE: &str = "xrAcquireSwapchainImage";
    /// xrWaitSwapchainImage
    pub const WAIT_SWAPCHAIN_IMAGE: &str = "xrWaitSwapchainImage";
    /// xrReleaseSwapchainImage
    pub const RELEASE_SWAPCHAIN_IMAGE: &str = "xrReleaseSwapchainImage";
    /// xrEndFrame
    pub const END_FRAME: &str = "xrEndFrame";
    /// xrDestroySwapchain
    pub const DESTROY_SWAPCHAIN: &str = "xrDestroySwapchain";
    /// xrDestroySpace
    pub const DESTROY_SPACE: &str = "xrDestroySpace";
    /// xrDestroySession
    pub const DESTROY_SESSION: &str = "xrDestroySession";
}

/// Raw OpenXR runtime interface
pub trait XrRuntime {
    /// Whether the loader library was found
    fn loader_available(&self) -> bool;

    /// Ask the runtime for an entry point; `instance` is `None` before one exists
    fn get_instance_proc_addr(&mut self, instance: Option<InstanceHandle>, name: &str) -> XrResult;

    /// Whether the loader library exports `name` directly
    fn library_symbol(&self, name: &str) -> bool;

    /// xrCreateInstance
    fn create_instance(&mut self, info: &InstanceCreateInfo) -> Result<InstanceHandle, XrResult>;

    /// xrGetSystem
    fn get_system(&mut self, instance: InstanceHandle, form_factor: FormFactor) -> Result<SystemId, XrResult>;

    /// xrGetD3D11GraphicsRequirementsKHR
    fn graphics_requirements(
        &mut self,
        instance: InstanceHandle,
        system: SystemId,
    ) -> Result<GraphicsRequirements, XrResult>;

    /// xrEnumerateViewConfigurations
    fn enumerate_view_configurations(
        &mut self,
        instance: InstanceHandle,
        system: SystemId,
    ) -> Result<Vec<ViewConfigurationType>, XrResult>;

    /// xrGetViewConfigurationProperties
    fn view_configuration_properties(
        &mut self,
        instance: InstanceHandle,
        system: SystemId,
        view_type: ViewConfigurationType,
    ) -> XrResult;

    /// xrEnumerateViewConfigurationViews, first call: count only
    fn view_configuration_view_count(
        &mut self,
        instance: InstanceHandle,
        system: SystemId,
        view_type: ViewConfigurationType,
    ) -> Result<u32, XrResult>;

    /// xrEnumerateViewConfigurationViews, second call: fill `views`
    ///
    /// Returns how many records were written.
    fn fill_view_configuration_views(
        &mut self,
        instance: InstanceHandle,
        system: SystemId,
        view_type: ViewConfigurationType,
        views: &mut [ViewConfigurationView],
    ) -> Result<u32, XrResult>;

    /// xrCreateSession with a D3D11 graphics binding
    fn create_session(
        &mut self,
        instance: InstanceHandle,
        system: SystemId,
        device: DeviceHandle,
    ) -> Result<SessionHandle, XrResult>;

    /// xrCreateReferenceSpace
    fn create_reference_space(
        &mut self,
        session: SessionHandle,
        space_type: ReferenceSpaceType,
        pose_in_space: Pose,
    ) -> Result<SpaceHandle, XrResult>;

    /// xrBeginSession
    fn begin_session(&mut self, session: SessionHandle, view_type: ViewConfigurationType) -> XrResult;

    /// xrEndSession
    fn end_session(&mut self, session: SessionHandle) -> XrResult;

    /// xrEnumerateSwapchainFormats
    fn enumerate_swapchain_formats(&mut self, session: SessionHandle) -> Result<Vec<i64>, XrResult>;

    /// xrCreateSwapchain
    fn create_swapchain(
        &mut self,
        session: SessionHandle,
        info: &SwapchainCreateInfo,
    ) -> Result<SwapchainHandle, XrResult>;

    /// xrEnumerateSwapchainImages
    fn enumerate_swapchain_images(&mut self, swapchain: SwapchainHandle) -> Result<SwapchainImages, XrResult>;

    /// xrWaitFrame; blocks until the runtime is ready for a new frame
    fn wait_frame(&mut self, session: SessionHandle) -> Result<FrameState, XrResult>;

    /// xrBeginFrame
    fn begin_frame(&mut self, session: SessionHandle) -> XrResult;

    /// xrLocateViews
    fn locate_views(
        &mut self,
        session: SessionHandle,
        view_type: ViewConfigurationType,
        display_time: XrTime,
        space: SpaceHandle,
        capacity: u32,
    ) -> Result<Vec<View>, XrResult>;

    /// xrAcquireSwapchainImage
    fn acquire_swapchain_image(&mut self, swapchain: SwapchainHandle) -> Result<u32, XrResult>;

    /// xrWaitSwapchainImage; blocks up to `timeout`
    fn wait_swapchain_image(&mut self, swapchain: SwapchainHandle, timeout: Duration) -> XrResult;

    /// xrReleaseSwapchainImage
    fn release_swapchain_image(&mut self, swapchain: SwapchainHandle) -> XrResult;

    /// xrEndFrame
    fn end_frame(&mut self, session: SessionHandle, info: &FrameEndInfo) -> XrResult;

    /// xrDestroySwapchain
    fn destroy_swapchain(&mut self, swapchain: SwapchainHandle) -> XrResult;

    /// xrDestroySpace
    fn destroy_space(&mut self, space: SpaceHandle) -> XrResult;

    /// xrDestroySession
    fn destroy_session(&mut self, session: SessionHandle) -> XrResult;
}
