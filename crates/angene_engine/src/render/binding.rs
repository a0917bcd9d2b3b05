//! Graphics binding capability
//!
//! The binding is the opaque call surface into a native 3D API. The engine
//! asks it for devices and resources and issues the handful of commands the
//! frame pipeline needs. Resource lifetime is explicit: every texture and view
//! handed out is released exactly once through the matching `release_*` call.

use super::{BackendResult, DeviceHandle, RenderTargetViewHandle, TextureHandle};
use bitflags::bitflags;
use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Locally unique identifier of a GPU adapter
///
/// VR runtimes report the adapter they composite on; the device must be
/// created on that same adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AdapterLuid {
    /// Low 32 bits
    pub low_part: u32,
    /// High 32 bits (signed, as DXGI reports it)
    pub high_part: i32,
}

impl AdapterLuid {
    /// Create a LUID from its two halves
    pub const fn new(low_part: u32, high_part: i32) -> Self {
        Self { low_part, high_part }
    }
}

impl fmt::Display for AdapterLuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x}-{:08x}", self.high_part, self.low_part)
    }
}

/// Raw native texture format code (DXGI numbering)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TextureFormat(pub i64);

impl TextureFormat {
    /// DXGI_FORMAT_R8G8B8A8_TYPELESS
    pub const RGBA8_TYPELESS: Self = Self(27);
    /// DXGI_FORMAT_R8G8B8A8_UNORM
    pub const RGBA8_UNORM: Self = Self(28);
    /// DXGI_FORMAT_R8G8B8A8_UNORM_SRGB
    pub const RGBA8_UNORM_SRGB: Self = Self(29);
    /// DXGI_FORMAT_B8G8R8A8_UNORM_SRGB
    pub const BGRA8_UNORM_SRGB: Self = Self(91);
}

bitflags! {
    /// How a texture may be bound to the pipeline
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BindFlags: u32 {
        /// Readable from shaders
        const SHADER_RESOURCE = 0x8;
        /// Usable as a render target
        const RENDER_TARGET = 0x20;
    }
}

/// Description of a 2D texture to create
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureDesc {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Pixel format
    pub format: TextureFormat,
    /// Bind flags
    pub bind_flags: BindFlags,
    /// Number of mip levels
    pub mip_levels: u32,
    /// Number of array slices
    pub array_size: u32,
}

impl TextureDesc {
    /// Single-mip render target of the given size and format
    pub const fn render_target(width: u32, height: u32, format: TextureFormat) -> Self {
        Self {
            width,
            height,
            format,
            bind_flags: BindFlags::RENDER_TARGET,
            mip_levels: 1,
            array_size: 1,
        }
    }
}

/// Linear RGBA color
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
pub struct Color {
    /// Red
    pub r: f32,
    /// Green
    pub g: f32,
    /// Blue
    pub b: f32,
    /// Alpha
    pub a: f32,
}

impl Color {
    /// Opaque black
    pub const BLACK: Self = Self::rgb(0.0, 0.0, 0.0);
    /// Opaque white
    pub const WHITE: Self = Self::rgb(1.0, 1.0, 1.0);

    /// Create a color from components
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Opaque color from RGB
    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self::new(r, g, b, 1.0)
    }

    /// Components as an array, the layout clear calls expect
    pub fn to_array(self) -> [f32; 4] {
        bytemuck::cast(self)
    }

    /// Pack into a `0x00BBGGRR` value, the key used by GDI-style brushes
    pub fn to_rgb_u32(self) -> u32 {
        let channel = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u32;
        channel(self.r) | (channel(self.g) << 8) | (channel(self.b) << 16)
    }
}

impl From<[f32; 4]> for Color {
    fn from(value: [f32; 4]) -> Self {
        bytemuck::cast(value)
    }
}

/// Viewport rectangle in pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    /// Left edge
    pub x: f32,
    /// Top edge
    pub y: f32,
    /// Width
    pub width: f32,
    /// Height
    pub height: f32,
    /// Minimum depth
    pub min_depth: f32,
    /// Maximum depth
    pub max_depth: f32,
}

impl Viewport {
    /// Full-target viewport with the default depth range
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: width as f32,
            height: height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }
}

/// Capability object wrapping a native graphics API
///
/// Implementations own the native handles. The engine refers to them only
/// through the opaque handle newtypes.
pub trait GraphicsBinding {
    /// Create the device, pinned to `adapter` when given
    ///
    /// Fails with [`RenderError::AdapterNotFound`](super::RenderError::AdapterNotFound)
    /// when no adapter matches.
    fn create_device(&mut self, adapter: Option<AdapterLuid>) -> BackendResult<DeviceHandle>;

    /// Create a 2D texture
    fn create_texture(&mut self, desc: &TextureDesc) -> BackendResult<TextureHandle>;

    /// Create a render-target view over `texture`
    fn create_render_target_view(&mut self, texture: TextureHandle) -> BackendResult<RenderTargetViewHandle>;

    /// Copy the full contents of `src` into `dst`
    fn copy_resource(&mut self, dst: TextureHandle, src: TextureHandle) -> BackendResult<()>;

    /// Clear a render target to `color`
    fn clear_render_target(&mut self, view: RenderTargetViewHandle, color: Color) -> BackendResult<()>;

    /// Set the active viewport
    fn set_viewport(&mut self, viewport: Viewport);

    /// Present the window back buffer
    fn present(&mut self) -> BackendResult<()>;

    /// Release a texture created by [`Self::create_texture`]
    fn release_texture(&mut self, texture: TextureHandle);

    /// Release a view created by [`Self::create_render_target_view`]
    fn release_render_target_view(&mut self, view: RenderTargetViewHandle);

    /// Device created by [`Self::create_device`], if any
    fn device(&self) -> Option<DeviceHandle>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_array_roundtrip() {
        let color = Color::new(0.1, 0.2, 0.3, 1.0);
        assert_eq!(color.to_array(), [0.1, 0.2, 0.3, 1.0]);
        assert_eq!(Color::from([0.1, 0.2, 0.3, 1.0]), color);
    }

    #[test]
    fn test_color_rgb_packing() {
        assert_eq!(Color::rgb(1.0, 0.0, 0.0).to_rgb_u32(), 0x0000_00ff);
        assert_eq!(Color::rgb(0.0, 0.0, 1.0).to_rgb_u32(), 0x00ff_0000);
    }

    #[test]
    fn test_luid_display() {
        assert_eq!(AdapterLuid::new(0x1234, 0).to_string(), "00000000-00001234");
    }
}
