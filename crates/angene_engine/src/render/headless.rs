//! Headless rendering collaborators
//!
//! [`HeadlessBinding`] and [`HeadlessSurface`] implement the binding traits
//! without a GPU. They record every call, track live resources so leaks and
//! double releases are visible, and can be told to fail specific operations.
//! The demo uses them when no native binding is available, and the tests use
//! them everywhere.

use super::{
    AdapterLuid, BackendResult, BrushHandle, Color, DeviceHandle, GraphicsBinding, Rect,
    RenderError, RenderTargetViewHandle, Surface2D, TextureDesc, TextureHandle, Viewport,
};
use std::collections::{HashMap, HashSet};

/// One recorded binding call
#[derive(Debug, Clone, PartialEq)]
pub enum BindingCall {
    /// `create_device`
    CreateDevice(Option<AdapterLuid>),
    /// `create_texture`
    CreateTexture(TextureDesc),
    /// `create_render_target_view`
    CreateView(TextureHandle),
    /// `copy_resource(dst, src)`
    Copy {
        /// Destination texture
        dst: TextureHandle,
        /// Source texture
        src: TextureHandle,
    },
    /// `clear_render_target`
    Clear(RenderTargetViewHandle, Color),
    /// `set_viewport`
    Viewport(Viewport),
    /// `present`
    Present,
    /// `release_texture`
    ReleaseTexture(TextureHandle),
    /// `release_render_target_view`
    ReleaseView(RenderTargetViewHandle),
}

/// GPU-less graphics binding
#[derive(Debug)]
pub struct HeadlessBinding {
    adapters: Vec<AdapterLuid>,
    device: Option<DeviceHandle>,
    next_handle: u64,
    textures: HashMap<TextureHandle, TextureDesc>,
    views: HashMap<RenderTargetViewHandle, TextureHandle>,
    released: HashSet<u64>,
    calls: Vec<BindingCall>,
    fail_device: bool,
    fail_view_creation: bool,
    fail_copy: bool,
}

impl Default for HeadlessBinding {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessBinding {
    /// Binding with a single default adapter
    pub fn new() -> Self {
        Self::with_adapters(vec![AdapterLuid::new(0x0001_0000, 0)])
    }

    /// Binding exposing the given adapters
    pub fn with_adapters(adapters: Vec<AdapterLuid>) -> Self {
        Self {
            adapters,
            device: None,
            next_handle: 1,
            textures: HashMap::new(),
            views: HashMap::new(),
            released: HashSet::new(),
            calls: Vec::new(),
            fail_device: false,
            fail_view_creation: false,
            fail_copy: false,
        }
    }

    /// Make device creation fail
    pub fn with_device_failure(mut self) -> Self {
        self.fail_device = true;
        self
    }

    /// Make render-target view creation fail
    pub fn set_view_creation_failure(&mut self, fail: bool) {
        self.fail_view_creation = fail;
    }

    /// Make `copy_resource` fail
    pub fn set_copy_failure(&mut self, fail: bool) {
        self.fail_copy = fail;
    }

    /// Every call made so far
    pub fn calls(&self) -> &[BindingCall] {
        &self.calls
    }

    /// Textures created and not yet released
    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    /// Views created and not yet released
    pub fn live_views(&self) -> usize {
        self.views.len()
    }

    /// Number of `copy_resource` calls
    pub fn copy_count(&self) -> usize {
        self.calls.iter().filter(|c| matches!(c, BindingCall::Copy { .. })).count()
    }

    /// Number of `create_texture` calls
    pub fn texture_creations(&self) -> usize {
        self.calls.iter().filter(|c| matches!(c, BindingCall::CreateTexture(_))).count()
    }

    /// Number of `present` calls
    pub fn present_count(&self) -> usize {
        self.calls.iter().filter(|c| matches!(c, BindingCall::Present)).count()
    }

    /// Whether a handle value was released at some point
    pub fn was_released(&self, handle: u64) -> bool {
        self.released.contains(&handle)
    }

    fn allocate(&mut self) -> u64 {
        let handle = self.next_handle;
        self.next_handle += 1;
        handle
    }
}

impl GraphicsBinding for HeadlessBinding {
    fn create_device(&mut self, adapter: Option<AdapterLuid>) -> BackendResult<DeviceHandle> {
        self.calls.push(BindingCall::CreateDevice(adapter));
        if self.fail_device {
            return Err(RenderError::DeviceCreation("device creation disabled".to_string()));
        }
        if let Some(luid) = adapter {
            if !self.adapters.contains(&luid) {
                return Err(RenderError::AdapterNotFound(luid));
            }
        }

        let device = DeviceHandle(self.allocate());
        self.device = Some(device);
        Ok(device)
    }

    fn create_texture(&mut self, desc: &TextureDesc) -> BackendResult<TextureHandle> {
        self.calls.push(BindingCall::CreateTexture(*desc));
        if self.device.is_none() {
            return Err(RenderError::NoDevice);
        }
        if desc.width == 0 || desc.height == 0 {
            return Err(RenderError::TextureCreation(format!(
                "invalid size {}x{}",
                desc.width, desc.height
            )));
        }

        let texture = TextureHandle(self.allocate());
        self.textures.insert(texture, *desc);
        Ok(texture)
    }

    fn create_render_target_view(&mut self, texture: TextureHandle) -> BackendResult<RenderTargetViewHandle> {
        self.calls.push(BindingCall::CreateView(texture));
        if self.fail_view_creation {
            return Err(RenderError::ViewCreation("view creation disabled".to_string()));
        }
        if !self.textures.contains_key(&texture) {
            return Err(RenderError::UnknownResource(texture.0));
        }

        let view = RenderTargetViewHandle(self.allocate());
        self.views.insert(view, texture);
        Ok(view)
    }

    fn copy_resource(&mut self, dst: TextureHandle, src: TextureHandle) -> BackendResult<()> {
        self.calls.push(BindingCall::Copy { dst, src });
        if self.fail_copy {
            return Err(RenderError::Copy(format!("{} -> {}", src.0, dst.0)));
        }
        if !self.textures.contains_key(&src) {
            return Err(RenderError::UnknownResource(src.0));
        }
        Ok(())
    }

    fn clear_render_target(&mut self, view: RenderTargetViewHandle, color: Color) -> BackendResult<()> {
        self.calls.push(BindingCall::Clear(view, color));
        if !self.views.contains_key(&view) {
            return Err(RenderError::UnknownResource(view.0));
        }
        Ok(())
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.calls.push(BindingCall::Viewport(viewport));
    }

    fn present(&mut self) -> BackendResult<()> {
        self.calls.push(BindingCall::Present);
        if self.device.is_none() {
            return Err(RenderError::NoDevice);
        }
        Ok(())
    }

    fn release_texture(&mut self, texture: TextureHandle) {
        self.calls.push(BindingCall::ReleaseTexture(texture));
        if self.textures.remove(&texture).is_some() {
            self.released.insert(texture.0);
        } else {
            log::warn!("Release of unknown or already released texture {}", texture.0);
        }
    }

    fn release_render_target_view(&mut self, view: RenderTargetViewHandle) {
        self.calls.push(BindingCall::ReleaseView(view));
        if self.views.remove(&view).is_some() {
            self.released.insert(view.0);
        } else {
            log::warn!("Release of unknown or already released view {}", view.0);
        }
    }

    fn device(&self) -> Option<DeviceHandle> {
        self.device
    }
}

/// GPU-less 2D surface
#[derive(Debug, Default)]
pub struct HeadlessSurface {
    next_brush: u64,
    live_brushes: HashSet<BrushHandle>,
    brushes_created: usize,
    brushes_deleted: usize,
    foreign_fills: usize,
    rects: Vec<Rect>,
    texts: Vec<String>,
    frames: usize,
    blits: usize,
}

impl HeadlessSurface {
    /// Create an empty surface
    pub fn new() -> Self {
        Self::default()
    }

    /// Brushes created so far
    pub const fn brushes_created(&self) -> usize {
        self.brushes_created
    }

    /// Brushes deleted so far
    pub const fn brushes_deleted(&self) -> usize {
        self.brushes_deleted
    }

    /// Brushes created and not yet deleted
    pub fn live_brushes(&self) -> usize {
        self.live_brushes.len()
    }

    /// Fills made with a brush this surface does not own
    pub const fn foreign_fills(&self) -> usize {
        self.foreign_fills
    }

    /// Rectangles filled in the current frame
    pub fn filled_rects(&self) -> &[Rect] {
        &self.rects
    }

    /// Text drawn in the current frame
    pub fn texts(&self) -> &[String] {
        &self.texts
    }

    /// Frames begun
    pub const fn frames(&self) -> usize {
        self.frames
    }

    /// Frames blitted
    pub const fn blits(&self) -> usize {
        self.blits
    }
}

impl Surface2D for HeadlessSurface {
    fn begin_offscreen(&mut self, width: u32, height: u32) -> BackendResult<()> {
        if width == 0 || height == 0 {
            return Err(RenderError::Surface(format!("invalid size {}x{}", width, height)));
        }
        self.frames += 1;
        self.rects.clear();
        self.texts.clear();
        Ok(())
    }

    fn create_brush(&mut self, _color: Color) -> BackendResult<BrushHandle> {
        self.next_brush += 1;
        let brush = BrushHandle(self.next_brush);
        self.live_brushes.insert(brush);
        self.brushes_created += 1;
        Ok(brush)
    }

    fn delete_brush(&mut self, brush: BrushHandle) {
        if self.live_brushes.remove(&brush) {
            self.brushes_deleted += 1;
        }
    }

    fn fill_rect(&mut self, rect: Rect, brush: BrushHandle) {
        if !self.live_brushes.contains(&brush) {
            log::warn!("Fill with brush {} not created by this surface", brush.0);
            self.foreign_fills += 1;
        }
        self.rects.push(rect);
    }

    fn draw_text(&mut self, _x: i32, _y: i32, text: &str, _color: Color) {
        self.texts.push(text.to_string());
    }

    fn blit(&mut self) -> BackendResult<()> {
        self.blits += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::TextureFormat;

    #[test]
    fn test_device_pinned_to_known_adapter() {
        let luid = AdapterLuid::new(42, 1);
        let mut binding = HeadlessBinding::with_adapters(vec![luid]);
        assert!(binding.create_device(Some(luid)).is_ok());
        assert_eq!(binding.device().map(|d| d.0), Some(1));
    }

    #[test]
    fn test_unknown_adapter_rejected() {
        let mut binding = HeadlessBinding::with_adapters(vec![AdapterLuid::new(1, 0)]);
        let result = binding.create_device(Some(AdapterLuid::new(2, 0)));
        assert_eq!(result, Err(RenderError::AdapterNotFound(AdapterLuid::new(2, 0))));
        assert!(binding.device().is_none());
    }

    #[test]
    fn test_resource_tracking() {
        let mut binding = HeadlessBinding::new();
        binding.create_device(None).unwrap();
        let texture = binding
            .create_texture(&TextureDesc::render_target(64, 64, TextureFormat::RGBA8_UNORM))
            .unwrap();
        let view = binding.create_render_target_view(texture).unwrap();
        assert_eq!(binding.live_textures(), 1);
        assert_eq!(binding.live_views(), 1);

        binding.release_render_target_view(view);
        binding.release_texture(texture);
        assert_eq!(binding.live_textures(), 0);
        assert_eq!(binding.live_views(), 0);
        assert!(binding.was_released(texture.0));
    }
}
