//! Simulated OpenXR runtime
//!
//! [`SimulatedRuntime`] implements [`XrRuntime`] in memory. It enforces the
//! call ordering a conformant runtime enforces (instance before system,
//! requirements before session, wait before begin, acquire before wait before
//! release) and checks that view buffers arrive zeroed and type-tagged.
//! Builder knobs remove the loader, hide entry points, change the reported
//! views and inject failures into individual verbs.
//!
//! The demo uses it when no headset runtime is present; the tests use it to
//! drive the protocol client and the session manager.

use super::result::XrResult;
use super::runtime::{entry_points as ep, XrRuntime};
use super::types::{
    FormFactor, FrameEndInfo, FrameState, GraphicsRequirements, InstanceCreateInfo, InstanceHandle,
    ReferenceSpaceType, SessionHandle, SpaceHandle, SwapchainCreateInfo, SwapchainHandle, SwapchainImages,
    SystemId, View, ViewConfigurationType, ViewConfigurationView, XrTime,
};
use crate::core::config::D3D11_ENABLE_EXTENSION;
use crate::foundation::math::{Fov, Pose, Quat, Vec3};
use crate::render::{AdapterLuid, DeviceHandle, TextureHandle};
use std::collections::{HashMap, HashSet};
use std::time::Duration;

/// Verb a [`SimulatedRuntime`] can be told to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SimFailure {
    /// xrCreateInstance
    CreateInstance,
    /// xrGetSystem
    GetSystem,
    /// xrGetD3D11GraphicsRequirementsKHR
    GraphicsRequirements,
    /// xrEnumerateViewConfigurations
    ViewConfigurations,
    /// xrGetViewConfigurationProperties
    ViewProperties,
    /// Count call of xrEnumerateViewConfigurationViews
    ViewCount,
    /// Fill call of xrEnumerateViewConfigurationViews
    ViewFill,
    /// xrCreateSession
    CreateSession,
    /// xrCreateReferenceSpace for one space type
    ReferenceSpace(ReferenceSpaceType),
    /// xrBeginSession
    BeginSession,
    /// xrEnumerateSwapchainFormats
    SwapchainFormats,
    /// xrCreateSwapchain
    CreateSwapchain,
    /// xrEnumerateSwapchainImages
    SwapchainImages,
    /// xrWaitFrame
    WaitFrame,
    /// xrBeginFrame
    BeginFrame,
    /// xrLocateViews
    LocateViews,
    /// xrAcquireSwapchainImage on the n-th created swapchain
    Acquire(usize),
    /// xrWaitSwapchainImage times out on the n-th created swapchain
    WaitImage(usize),
    /// xrWaitSwapchainImage fails outright on the n-th created swapchain
    WaitImageError(usize),
    /// xrEndFrame
    EndFrame,
}

const SUPPORTED_EXTENSIONS: [&str; 2] = [D3D11_ENABLE_EXTENSION, "XR_EXT_debug_utils"];
const DISPLAY_PERIOD_NS: XrTime = 11_111_111;
const IMAGE_HANDLE_BASE: u64 = 0x1000_0000;
const HALF_IPD: f32 = 0.032;

#[derive(Debug)]
struct SimSwapchain {
    handle: SwapchainHandle,
    info: SwapchainCreateInfo,
    images: SwapchainImages,
    next_image: u32,
    acquired: Option<u32>,
    waited: bool,
    wait_failed: bool,
    destroyed: bool,
}

/// In-memory OpenXR runtime
#[derive(Debug)]
pub struct SimulatedRuntime {
    loader: bool,
    hidden_from_resolver: HashSet<String>,
    missing: HashSet<String>,
    failures: HashSet<SimFailure>,
    view_count: u32,
    view_width: u32,
    view_height: u32,
    empty_fills: u32,
    formats: Vec<i64>,
    images_per_swapchain: u32,
    should_render: bool,
    located_view_count: Option<u32>,
    requirements: GraphicsRequirements,

    next_handle: u64,
    instance: Option<InstanceHandle>,
    system: Option<SystemId>,
    requirements_queried: bool,
    session: Option<SessionHandle>,
    session_destroyed: bool,
    session_running: bool,
    spaces: HashMap<SpaceHandle, ReferenceSpaceType>,
    swapchains: Vec<SimSwapchain>,
    display_time: XrTime,
    frame_waited: bool,
    frame_begun: bool,

    calls: Vec<&'static str>,
    proc_lookups: HashMap<String, u32>,
    begin_session_calls: u32,
    submitted: Vec<FrameEndInfo>,
}

impl Default for SimulatedRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedRuntime {
    /// Stereo runtime reporting two 1024x1024 views and three images per swapchain
    pub fn new() -> Self {
        Self {
            loader: true,
            hidden_from_resolver: HashSet::new(),
            missing: HashSet::new(),
            failures: HashSet::new(),
            view_count: 2,
            view_width: 1024,
            view_height: 1024,
            empty_fills: 0,
            formats: vec![29, 28, 91, 27, 87],
            images_per_swapchain: 3,
            should_render: true,
            located_view_count: None,
            requirements: GraphicsRequirements {
                adapter_luid: AdapterLuid::new(0x0001_0000, 0),
                min_feature_level: 0xb000,
            },
            next_handle: 1,
            instance: None,
            system: None,
            requirements_queried: false,
            session: None,
            session_destroyed: false,
            session_running: false,
            spaces: HashMap::new(),
            swapchains: Vec::new(),
            display_time: 0,
            frame_waited: false,
            frame_begun: false,
            calls: Vec::new(),
            proc_lookups: HashMap::new(),
            begin_session_calls: 0,
            submitted: Vec::new(),
        }
    }

    /// Behave as if the loader library could not be loaded
    pub fn without_loader(mut self) -> Self {
        self.loader = false;
        self
    }

    /// The instance resolver reports `name` missing; the library still exports it
    pub fn hide_from_instance_resolver(mut self, name: &str) -> Self {
        self.hidden_from_resolver.insert(name.to_string());
        self
    }

    /// Neither lookup path finds `name`
    pub fn without_entry_point(mut self, name: &str) -> Self {
        self.missing.insert(name.to_string());
        self
    }

    /// Fail one verb
    pub fn with_failure(mut self, failure: SimFailure) -> Self {
        self.failures.insert(failure);
        self
    }

    /// Report `count` views of `width`x`height`
    pub fn with_views(mut self, count: u32, width: u32, height: u32) -> Self {
        self.view_count = count;
        self.view_width = width;
        self.view_height = height;
        self
    }

    /// Leave the view buffer unfilled for the first `count` fill calls
    pub fn with_empty_fills(mut self, count: u32) -> Self {
        self.empty_fills = count;
        self
    }

    /// Swapchain formats the runtime supports, in its own order
    pub fn with_formats(mut self, formats: Vec<i64>) -> Self {
        self.formats = formats;
        self
    }

    /// Images per swapchain
    pub fn with_images_per_swapchain(mut self, count: u32) -> Self {
        self.images_per_swapchain = count;
        self
    }

    /// Value of `should_render` in every frame state
    pub fn with_should_render(mut self, should_render: bool) -> Self {
        self.should_render = should_render;
        self
    }

    /// Number of views `locate_views` returns, regardless of configuration
    pub fn with_located_view_count(mut self, count: u32) -> Self {
        self.located_view_count = Some(count);
        self
    }

    /// Adapter the runtime requires
    pub fn with_adapter(mut self, luid: AdapterLuid) -> Self {
        self.requirements.adapter_luid = luid;
        self
    }

    /// Toggle a failure after construction
    pub fn set_failure(&mut self, failure: SimFailure, enabled: bool) {
        if enabled {
            self.failures.insert(failure);
        } else {
            self.failures.remove(&failure);
        }
    }

    /// Verbs called so far, in order
    pub fn calls(&self) -> &[&'static str] {
        &self.calls
    }

    /// How many times a verb was called
    pub fn call_count(&self, name: &str) -> usize {
        self.calls.iter().filter(|call| **call == name).count()
    }

    /// How many times the instance resolver was asked for `name`
    pub fn proc_lookups(&self, name: &str) -> u32 {
        self.proc_lookups.get(name).copied().unwrap_or(0)
    }

    /// Underlying begin-session calls, including rejected ones
    pub const fn begin_session_calls(&self) -> u32 {
        self.begin_session_calls
    }

    /// Whether the session is running
    pub const fn session_running(&self) -> bool {
        self.session_running
    }

    /// Whether the session was destroyed
    pub const fn session_destroyed(&self) -> bool {
        self.session_destroyed
    }

    /// Frames accepted by `end_frame`
    pub fn submitted_frames(&self) -> &[FrameEndInfo] {
        &self.submitted
    }

    /// Creation parameters of every swapchain, in creation order
    pub fn swapchain_infos(&self) -> Vec<SwapchainCreateInfo> {
        self.swapchains.iter().map(|s| s.info).collect()
    }

    /// Swapchains created and not destroyed
    pub fn live_swapchains(&self) -> usize {
        self.swapchains.iter().filter(|s| !s.destroyed).count()
    }

    /// Reference spaces created and not destroyed
    pub fn live_spaces(&self) -> usize {
        self.spaces.len()
    }

    fn fails(&self, failure: SimFailure) -> bool {
        self.failures.contains(&failure)
    }

    fn allocate(&mut self) -> u64 {
        let handle = self.next_handle;
        self.next_handle += 1;
        handle
    }

    fn valid_session(&self, session: SessionHandle) -> bool {
        self.session == Some(session) && !self.session_destroyed
    }

    fn swapchain_index(&self, handle: SwapchainHandle) -> Option<usize> {
        self.swapchains.iter().position(|s| s.handle == handle && !s.destroyed)
    }

    fn supported_view_type(view_type: ViewConfigurationType) -> bool {
        view_type == ViewConfigurationType::PrimaryStereo
    }

    fn eye_view(index: u32, count: u32) -> View {
        let offset = if count > 1 {
            (index as f32 / (count - 1) as f32 - 0.5) * 2.0 * HALF_IPD
        } else {
            0.0
        };
        let (left, right) = if index % 2 == 0 { (-0.785, 0.698) } else { (-0.698, 0.785) };
        View {
            pose: Pose::new(Quat::identity(), Vec3::new(offset, 1.6, 0.0)),
            fov: Fov {
                angle_left: left,
                angle_right: right,
                angle_up: 0.768,
                angle_down: -0.801,
            },
        }
    }
}

impl XrRuntime for SimulatedRuntime {
    fn loader_available(&self) -> bool {
        self.loader
    }

    fn get_instance_proc_addr(&mut self, _instance: Option<InstanceHandle>, name: &str) -> XrResult {
        *self.proc_lookups.entry(name.to_string()).or_insert(0) += 1;
        if self.missing.contains(name) || self.hidden_from_resolver.contains(name) {
            XrResult::ERROR_FUNCTION_UNSUPPORTED
        } else {
            XrResult::SUCCESS
        }
    }

    fn library_symbol(&self, name: &str) -> bool {
        self.loader && !self.missing.contains(name)
    }

    fn create_instance(&mut self, info: &InstanceCreateInfo) -> Result<InstanceHandle, XrResult> {
        self.calls.push(ep::CREATE_INSTANCE);
        if self.fails(SimFailure::CreateInstance) {
            return Err(XrResult::ERROR_INITIALIZATION_FAILED);
        }
        if info.application.application_name.is_empty() {
            return Err(XrResult::ERROR_VALIDATION_FAILURE);
        }
        if info.extensions.iter().any(|e| !SUPPORTED_EXTENSIONS.contains(&e.as_str())) {
            return Err(XrResult::ERROR_EXTENSION_NOT_PRESENT);
        }
        let instance = InstanceHandle(self.allocate());
        self.instance = Some(instance);
        Ok(instance)
    }

    fn get_system(&mut self, instance: InstanceHandle, form_factor: FormFactor) -> Result<SystemId, XrResult> {
        self.calls.push(ep::GET_SYSTEM);
        if self.instance != Some(instance) {
            return Err(XrResult::ERROR_HANDLE_INVALID);
        }
        if self.fails(SimFailure::GetSystem) || form_factor != FormFactor::HeadMountedDisplay {
            return Err(XrResult::ERROR_FORM_FACTOR_UNAVAILABLE);
        }
        let system = SystemId(self.allocate());
        self.system = Some(system);
        Ok(system)
    }

    fn graphics_requirements(
        &mut self,
        instance: InstanceHandle,
        system: SystemId,
    ) -> Result<GraphicsRequirements, XrResult> {
        self.calls.push(ep::GET_GRAPHICS_REQUIREMENTS);
        if self.instance != Some(instance) || self.system != Some(system) {
            return Err(XrResult::ERROR_HANDLE_INVALID);
        }
        if self.fails(SimFailure::GraphicsRequirements) {
            return Err(XrResult::ERROR_RUNTIME_FAILURE);
        }
        self.requirements_queried = true;
        Ok(self.requirements)
    }

    fn enumerate_view_configurations(
        &mut self,
        _instance: InstanceHandle,
        _system: SystemId,
    ) -> Result<Vec<ViewConfigurationType>, XrResult> {
        self.calls.push(ep::ENUMERATE_VIEW_CONFIGURATIONS);
        if self.fails(SimFailure::ViewConfigurations) {
            return Err(XrResult::ERROR_RUNTIME_FAILURE);
        }
        Ok(vec![ViewConfigurationType::PrimaryStereo])
    }

    fn view_configuration_properties(
        &mut self,
        _instance: InstanceHandle,
        _system: SystemId,
        view_type: ViewConfigurationType,
    ) -> XrResult {
        self.calls.push(ep::GET_VIEW_CONFIGURATION_PROPERTIES);
        if self.fails(SimFailure::ViewProperties) {
            XrResult::ERROR_RUNTIME_FAILURE
        } else if !Self::supported_view_type(view_type) {
            XrResult::ERROR_VIEW_CONFIGURATION_TYPE_UNSUPPORTED
        } else {
            XrResult::SUCCESS
        }
    }

    fn view_configuration_view_count(
        &mut self,
        _instance: InstanceHandle,
        _system: SystemId,
        view_type: ViewConfigurationType,
    ) -> Result<u32, XrResult> {
        self.calls.push(ep::ENUMERATE_VIEW_CONFIGURATION_VIEWS);
        if self.fails(SimFailure::ViewCount) {
            return Err(XrResult::ERROR_RUNTIME_FAILURE);
        }
        if !Self::supported_view_type(view_type) {
            return Err(XrResult::ERROR_VIEW_CONFIGURATION_TYPE_UNSUPPORTED);
        }
        Ok(self.view_count)
    }

    fn fill_view_configuration_views(
        &mut self,
        _instance: InstanceHandle,
        _system: SystemId,
        _view_type: ViewConfigurationType,
        views: &mut [ViewConfigurationView],
    ) -> Result<u32, XrResult> {
        self.calls.push(ep::ENUMERATE_VIEW_CONFIGURATION_VIEWS);
        if self.fails(SimFailure::ViewFill) {
            return Err(XrResult::ERROR_RUNTIME_FAILURE);
        }
        if views.iter().any(|view| *view != ViewConfigurationView::tagged()) {
            log::error!("View buffer was not zeroed and tagged before the fill call");
            return Err(XrResult::ERROR_VALIDATION_FAILURE);
        }
        if views.len() < self.view_count as usize {
            return Err(XrResult::ERROR_SIZE_INSUFFICIENT);
        }
        if self.empty_fills > 0 {
            self.empty_fills -= 1;
            return Ok(self.view_count);
        }

        for view in views.iter_mut().take(self.view_count as usize) {
            view.recommended_width = self.view_width;
            view.recommended_height = self.view_height;
            view.max_width = self.view_width * 2;
            view.max_height = self.view_height * 2;
            view.recommended_samples = 1;
            view.max_samples = 4;
        }
        Ok(self.view_count)
    }

    fn create_session(
        &mut self,
        instance: InstanceHandle,
        system: SystemId,
        device: DeviceHandle,
    ) -> Result<SessionHandle, XrResult> {
        self.calls.push(ep::CREATE_SESSION);
        if self.instance != Some(instance) || self.system != Some(system) {
            return Err(XrResult::ERROR_HANDLE_INVALID);
        }
        if !self.requirements_queried {
            return Err(XrResult::ERROR_GRAPHICS_REQUIREMENTS_CALL_MISSING);
        }
        if device.0 == 0 {
            return Err(XrResult::ERROR_GRAPHICS_DEVICE_INVALID);
        }
        if self.fails(SimFailure::CreateSession) {
            return Err(XrResult::ERROR_RUNTIME_FAILURE);
        }
        let session = SessionHandle(self.allocate());
        self.session = Some(session);
        self.session_destroyed = false;
        Ok(session)
    }

    fn create_reference_space(
        &mut self,
        session: SessionHandle,
        space_type: ReferenceSpaceType,
        _pose_in_space: Pose,
    ) -> Result<SpaceHandle, XrResult> {
        self.calls.push(ep::CREATE_REFERENCE_SPACE);
        if !self.valid_session(session) {
            return Err(XrResult::ERROR_HANDLE_INVALID);
        }
        if self.fails(SimFailure::ReferenceSpace(space_type)) {
            return Err(XrResult::ERROR_REFERENCE_SPACE_UNSUPPORTED);
        }
        let space = SpaceHandle(self.allocate());
        self.spaces.insert(space, space_type);
        Ok(space)
    }

    fn begin_session(&mut self, session: SessionHandle, view_type: ViewConfigurationType) -> XrResult {
        self.calls.push(ep::BEGIN_SESSION);
        self.begin_session_calls += 1;
        if !self.valid_session(session) {
            return XrResult::ERROR_HANDLE_INVALID;
        }
        if self.session_running {
            return XrResult::ERROR_SESSION_RUNNING;
        }
        if !Self::supported_view_type(view_type) {
            return XrResult::ERROR_VIEW_CONFIGURATION_TYPE_UNSUPPORTED;
        }
        if self.fails(SimFailure::BeginSession) {
            return XrResult::ERROR_SESSION_NOT_READY;
        }
        self.session_running = true;
        XrResult::SUCCESS
    }

    fn end_session(&mut self, session: SessionHandle) -> XrResult {
        self.calls.push(ep::END_SESSION);
        if !self.valid_session(session) {
            return XrResult::ERROR_HANDLE_INVALID;
        }
        if !self.session_running {
            return XrResult::ERROR_SESSION_NOT_RUNNING;
        }
        self.session_running = false;
        XrResult::SUCCESS
    }

    fn enumerate_swapchain_formats(&mut self, session: SessionHandle) -> Result<Vec<i64>, XrResult> {
        self.calls.push(ep::ENUMERATE_SWAPCHAIN_FORMATS);
        if !self.valid_session(session) {
            return Err(XrResult::ERROR_HANDLE_INVALID);
        }
        if self.fails(SimFailure::SwapchainFormats) {
            return Err(XrResult::ERROR_RUNTIME_FAILURE);
        }
        Ok(self.formats.clone())
    }

    fn create_swapchain(
        &mut self,
        session: SessionHandle,
        info: &SwapchainCreateInfo,
    ) -> Result<SwapchainHandle, XrResult> {
        self.calls.push(ep::CREATE_SWAPCHAIN);
        if !self.valid_session(session) {
            return Err(XrResult::ERROR_HANDLE_INVALID);
        }
        if self.fails(SimFailure::CreateSwapchain) {
            return Err(XrResult::ERROR_RUNTIME_FAILURE);
        }
        if !self.formats.contains(&info.format) {
            return Err(XrResult::ERROR_SWAPCHAIN_FORMAT_UNSUPPORTED);
        }
        if info.width == 0 || info.height == 0 {
            return Err(XrResult::ERROR_VALIDATION_FAILURE);
        }

        let handle = SwapchainHandle(self.allocate());
        let base = IMAGE_HANDLE_BASE + (self.swapchains.len() as u64) * 0x100;
        let images = (0..u64::from(self.images_per_swapchain))
            .map(|i| TextureHandle(base + i))
            .collect();
        self.swapchains.push(SimSwapchain {
            handle,
            info: *info,
            images,
            next_image: 0,
            acquired: None,
            waited: false,
            wait_failed: false,
            destroyed: false,
        });
        Ok(handle)
    }

    fn enumerate_swapchain_images(&mut self, swapchain: SwapchainHandle) -> Result<SwapchainImages, XrResult> {
        self.calls.push(ep::ENUMERATE_SWAPCHAIN_IMAGES);
        if self.fails(SimFailure::SwapchainImages) {
            return Err(XrResult::ERROR_RUNTIME_FAILURE);
        }
        let index = self.swapchain_index(swapchain).ok_or(XrResult::ERROR_HANDLE_INVALID)?;
        Ok(self.swapchains[index].images.clone())
    }

    fn wait_frame(&mut self, session: SessionHandle) -> Result<FrameState, XrResult> {
        self.calls.push(ep::WAIT_FRAME);
        if !self.valid_session(session) {
            return Err(XrResult::ERROR_HANDLE_INVALID);
        }
        if !self.session_running {
            return Err(XrResult::ERROR_SESSION_NOT_RUNNING);
        }
        if self.fails(SimFailure::WaitFrame) {
            return Err(XrResult::ERROR_RUNTIME_FAILURE);
        }
        self.display_time += DISPLAY_PERIOD_NS;
        self.frame_waited = true;
        Ok(FrameState {
            predicted_display_time: self.display_time,
            predicted_display_period: DISPLAY_PERIOD_NS,
            should_render: self.should_render,
        })
    }

    fn begin_frame(&mut self, session: SessionHandle) -> XrResult {
        self.calls.push(ep::BEGIN_FRAME);
        if !self.valid_session(session) {
            return XrResult::ERROR_HANDLE_INVALID;
        }
        if !self.frame_waited {
            return XrResult::ERROR_CALL_ORDER_INVALID;
        }
        if self.fails(SimFailure::BeginFrame) {
            return XrResult::ERROR_RUNTIME_FAILURE;
        }
        self.frame_waited = false;
        let discarded = self.frame_begun;
        self.frame_begun = true;
        if discarded {
            XrResult::FRAME_DISCARDED
        } else {
            XrResult::SUCCESS
        }
    }

    fn locate_views(
        &mut self,
        session: SessionHandle,
        view_type: ViewConfigurationType,
        _display_time: XrTime,
        space: SpaceHandle,
        capacity: u32,
    ) -> Result<Vec<View>, XrResult> {
        self.calls.push(ep::LOCATE_VIEWS);
        if !self.valid_session(session) || !self.spaces.contains_key(&space) {
            return Err(XrResult::ERROR_HANDLE_INVALID);
        }
        if self.fails(SimFailure::LocateViews) {
            return Err(XrResult::ERROR_RUNTIME_FAILURE);
        }
        if !Self::supported_view_type(view_type) {
            return Err(XrResult::ERROR_VIEW_CONFIGURATION_TYPE_UNSUPPORTED);
        }
        let count = self.located_view_count.unwrap_or(2);
        if capacity < count {
            return Err(XrResult::ERROR_SIZE_INSUFFICIENT);
        }
        Ok((0..count).map(|i| Self::eye_view(i, count)).collect())
    }

    fn acquire_swapchain_image(&mut self, swapchain: SwapchainHandle) -> Result<u32, XrResult> {
        self.calls.push(ep::ACQUIRE_SWAPCHAIN_IMAGE);
        let index = self.swapchain_index(swapchain).ok_or(XrResult::ERROR_HANDLE_INVALID)?;
        if self.fails(SimFailure::Acquire(index)) {
            return Err(XrResult::ERROR_RUNTIME_FAILURE);
        }
        let chain = &mut self.swapchains[index];
        if chain.acquired.is_some() || chain.images.is_empty() {
            return Err(XrResult::ERROR_CALL_ORDER_INVALID);
        }
        let image = chain.next_image;
        chain.next_image = (chain.next_image + 1) % chain.images.len() as u32;
        chain.acquired = Some(image);
        chain.waited = false;
        chain.wait_failed = false;
        Ok(image)
    }

    fn wait_swapchain_image(&mut self, swapchain: SwapchainHandle, _timeout: Duration) -> XrResult {
        self.calls.push(ep::WAIT_SWAPCHAIN_IMAGE);
        let Some(index) = self.swapchain_index(swapchain) else {
            return XrResult::ERROR_HANDLE_INVALID;
        };
        if self.fails(SimFailure::WaitImage(index)) {
            return XrResult::TIMEOUT_EXPIRED;
        }
        let hard_failure = self.fails(SimFailure::WaitImageError(index));
        let chain = &mut self.swapchains[index];
        if hard_failure {
            // A failed wait still lets the application hand the image back
            chain.wait_failed = chain.acquired.is_some();
            return XrResult::ERROR_RUNTIME_FAILURE;
        }
        if chain.acquired.is_none() || chain.waited {
            return XrResult::ERROR_CALL_ORDER_INVALID;
        }
        chain.waited = true;
        XrResult::SUCCESS
    }

    fn release_swapchain_image(&mut self, swapchain: SwapchainHandle) -> XrResult {
        self.calls.push(ep::RELEASE_SWAPCHAIN_IMAGE);
        let Some(index) = self.swapchain_index(swapchain) else {
            return XrResult::ERROR_HANDLE_INVALID;
        };
        let chain = &mut self.swapchains[index];
        if !chain.waited && !chain.wait_failed {
            return XrResult::ERROR_CALL_ORDER_INVALID;
        }
        chain.acquired = None;
        chain.waited = false;
        chain.wait_failed = false;
        XrResult::SUCCESS
    }

    fn end_frame(&mut self, session: SessionHandle, info: &FrameEndInfo) -> XrResult {
        self.calls.push(ep::END_FRAME);
        if !self.valid_session(session) {
            return XrResult::ERROR_HANDLE_INVALID;
        }
        if !self.frame_begun {
            return XrResult::ERROR_CALL_ORDER_INVALID;
        }
        self.frame_begun = false;
        if info.display_time != self.display_time {
            return XrResult::ERROR_TIME_INVALID;
        }
        for layer in &info.layers {
            if !self.spaces.contains_key(&layer.space) {
                return XrResult::ERROR_HANDLE_INVALID;
            }
            for view in &layer.views {
                let Some(index) = self.swapchain_index(view.sub_image.swapchain) else {
                    return XrResult::ERROR_HANDLE_INVALID;
                };
                let chain = &self.swapchains[index].info;
                let rect = view.sub_image.image_rect;
                if rect.x < 0 || rect.y < 0 || rect.width > chain.width || rect.height > chain.height {
                    return XrResult(-25);
                }
            }
        }
        if self.fails(SimFailure::EndFrame) {
            return XrResult::ERROR_RUNTIME_FAILURE;
        }
        self.submitted.push(info.clone());
        XrResult::SUCCESS
    }

    fn destroy_swapchain(&mut self, swapchain: SwapchainHandle) -> XrResult {
        self.calls.push(ep::DESTROY_SWAPCHAIN);
        match self.swapchain_index(swapchain) {
            Some(index) => {
                self.swapchains[index].destroyed = true;
                XrResult::SUCCESS
            }
            None => XrResult::ERROR_HANDLE_INVALID,
        }
    }

    fn destroy_space(&mut self, space: SpaceHandle) -> XrResult {
        self.calls.push(ep::DESTROY_SPACE);
        if self.spaces.remove(&space).is_some() {
            XrResult::SUCCESS
        } else {
            XrResult::ERROR_HANDLE_INVALID
        }
    }

    fn destroy_session(&mut self, session: SessionHandle) -> XrResult {
        self.calls.push(ep::DESTROY_SESSION);
        if !self.valid_session(session) {
            return XrResult::ERROR_HANDLE_INVALID;
        }
        self.session_destroyed = true;
        self.session_running = false;
        XrResult::SUCCESS
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xr::types::{ApiVersion, ApplicationInfo};
    use approx::assert_relative_eq;

    #[test]
    fn test_fill_rejects_untagged_buffer() {
        let mut runtime = SimulatedRuntime::new();
        let mut views = vec![ViewConfigurationView::tagged(); 2];
        views[1].ty = 0;
        let result = runtime.fill_view_configuration_views(
            InstanceHandle(1),
            SystemId(2),
            ViewConfigurationType::PrimaryStereo,
            &mut views,
        );
        assert_eq!(result, Err(XrResult::ERROR_VALIDATION_FAILURE));
    }

    #[test]
    fn test_session_requires_graphics_requirements() {
        let mut runtime = SimulatedRuntime::new();
        let info = InstanceCreateInfo {
            application: ApplicationInfo::new("sim", "Angene", ApiVersion::V1_0_0),
            extensions: vec![D3D11_ENABLE_EXTENSION.to_string()],
        };
        let instance = runtime.create_instance(&info).unwrap();
        let system = runtime.get_system(instance, FormFactor::HeadMountedDisplay).unwrap();
        assert_eq!(
            runtime.create_session(instance, system, DeviceHandle(5)),
            Err(XrResult::ERROR_GRAPHICS_REQUIREMENTS_CALL_MISSING)
        );
    }

    #[test]
    fn test_eye_views_are_offset_symmetrically() {
        let left = SimulatedRuntime::eye_view(0, 2);
        let right = SimulatedRuntime::eye_view(1, 2);
        assert_relative_eq!(left.pose.position.x, -HALF_IPD);
        assert_relative_eq!(right.pose.position.x, HALF_IPD);
    }
}
