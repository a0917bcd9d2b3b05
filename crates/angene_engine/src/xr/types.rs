//! OpenXR handles and plain data records

use crate::foundation::math::{Fov, Pose};
use crate::render::{AdapterLuid, TextureHandle};
use bitflags::bitflags;
use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

/// Connection to the VR runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstanceHandle(pub u64);

/// HMD system discovered from an instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SystemId(pub u64);

/// Live rendering/tracking context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionHandle(pub u64);

/// Reference space handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SpaceHandle(pub u64);

/// Swapchain handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SwapchainHandle(pub u64);

/// Predicted display time in nanoseconds
pub type XrTime = i64;

/// Packed OpenXR API version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiVersion {
    /// Major version
    pub major: u16,
    /// Minor version
    pub minor: u16,
    /// Patch version
    pub patch: u32,
}

impl ApiVersion {
    /// OpenXR 1.0.0
    pub const V1_0_0: Self = Self { major: 1, minor: 0, patch: 0 };

    /// Pack as `major << 48 | minor << 32 | patch`
    pub const fn packed(self) -> u64 {
        ((self.major as u64) << 48) | ((self.minor as u64) << 32) | self.patch as u64
    }
}

impl Default for ApiVersion {
    fn default() -> Self {
        Self::V1_0_0
    }
}

/// Maximum application/engine name length, including the terminator
pub const MAX_APPLICATION_NAME_SIZE: usize = 128;

/// Application info sent with instance creation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationInfo {
    /// Application name, at most 127 bytes
    pub application_name: String,
    /// Application version
    pub application_version: u32,
    /// Engine name, at most 127 bytes
    pub engine_name: String,
    /// Engine version
    pub engine_version: u32,
    /// Requested API version
    pub api_version: ApiVersion,
}

impl ApplicationInfo {
    /// Build application info, clamping names to the runtime limit
    pub fn new(application_name: &str, engine_name: &str, api_version: ApiVersion) -> Self {
        Self {
            application_name: clamp_name(application_name),
            application_version: 1,
            engine_name: clamp_name(engine_name),
            engine_version: 1,
            api_version,
        }
    }
}

fn clamp_name(name: &str) -> String {
    let limit = MAX_APPLICATION_NAME_SIZE - 1;
    if name.len() <= limit {
        return name.to_string();
    }
    let mut end = limit;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    name[..end].to_string()
}

/// Instance creation parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceCreateInfo {
    /// Application info
    pub application: ApplicationInfo,
    /// Enabled extension names
    pub extensions: Vec<String>,
}

/// Device form factor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FormFactor {
    /// Head-mounted display
    HeadMountedDisplay = 1,
    /// Handheld display
    HandheldDisplay = 2,
}

/// View configuration type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ViewConfigurationType {
    /// Single view
    PrimaryMono = 1,
    /// Two views, one per eye
    PrimaryStereo = 2,
}

/// Reference space type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReferenceSpaceType {
    /// Head-locked space
    View = 1,
    /// Seated space, origin at the initial head position
    Local = 2,
    /// Standing space with a floor-level origin
    Stage = 3,
}

impl ReferenceSpaceType {
    /// Name for logging
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::View => "VIEW",
            Self::Local => "LOCAL",
            Self::Stage => "STAGE",
        }
    }
}

/// How composited layers blend with the real world
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EnvironmentBlendMode {
    /// Fully replace the world
    Opaque = 1,
    /// Additive display
    Additive = 2,
    /// Alpha-blended passthrough
    AlphaBlend = 3,
}

/// Structure type tag of a view configuration view
pub const STRUCTURE_TYPE_VIEW_CONFIGURATION_VIEW: u32 = 41;

/// Per-view rendering limits reported by the runtime
///
/// Buffers of this type are handed to the runtime to fill, so the layout is
/// plain data and the output buffer is zero-initialized and type-tagged
/// before the fill call.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable, Serialize, Deserialize)]
pub struct ViewConfigurationView {
    /// Structure type tag
    pub ty: u32,
    /// Recommended image width
    pub recommended_width: u32,
    /// Maximum image width
    pub max_width: u32,
    /// Recommended image height
    pub recommended_height: u32,
    /// Maximum image height
    pub max_height: u32,
    /// Recommended sample count
    pub recommended_samples: u32,
    /// Maximum sample count
    pub max_samples: u32,
}

impl ViewConfigurationView {
    /// Zeroed record carrying its type tag, ready to be filled
    pub fn tagged() -> Self {
        Self {
            ty: STRUCTURE_TYPE_VIEW_CONFIGURATION_VIEW,
            ..Self::zeroed()
        }
    }

    /// Whether the runtime actually filled this record
    pub const fn is_populated(&self) -> bool {
        self.recommended_width > 0 && self.recommended_height > 0
    }
}

/// Graphics adapter requirements reported by the runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphicsRequirements {
    /// Adapter the device must be created on
    pub adapter_luid: AdapterLuid,
    /// Minimum feature level (D3D_FEATURE_LEVEL numbering)
    pub min_feature_level: u32,
}

bitflags! {
    /// Swapchain image usage
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SwapchainUsageFlags: u64 {
        /// Color render target
        const COLOR_ATTACHMENT = 0x1;
        /// Depth/stencil render target
        const DEPTH_STENCIL_ATTACHMENT = 0x2;
        /// Unordered access
        const UNORDERED_ACCESS = 0x4;
        /// Copy source
        const TRANSFER_SRC = 0x8;
        /// Copy destination
        const TRANSFER_DST = 0x10;
        /// Shader sampling
        const SAMPLED = 0x20;
    }
}

/// Swapchain creation parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapchainCreateInfo {
    /// Creation flags
    pub create_flags: u64,
    /// Image usage
    pub usage_flags: SwapchainUsageFlags,
    /// Native format code
    pub format: i64,
    /// Sample count
    pub sample_count: u32,
    /// Image width
    pub width: u32,
    /// Image height
    pub height: u32,
    /// Cube faces
    pub face_count: u32,
    /// Array layers
    pub array_size: u32,
    /// Mip levels
    pub mip_count: u32,
}

impl SwapchainCreateInfo {
    /// Single-sample color swapchain usable as a copy destination
    pub fn color(width: u32, height: u32, format: i64) -> Self {
        Self {
            create_flags: 0,
            usage_flags: SwapchainUsageFlags::COLOR_ATTACHMENT
                | SwapchainUsageFlags::SAMPLED
                | SwapchainUsageFlags::TRANSFER_DST,
            format,
            sample_count: 1,
            width,
            height,
            face_count: 1,
            array_size: 1,
            mip_count: 1,
        }
    }
}

/// Result of waiting for the next frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameState {
    /// When the frame will be displayed
    pub predicted_display_time: XrTime,
    /// Expected time between displayed frames
    pub predicted_display_period: XrTime,
    /// Whether the application should render this frame
    pub should_render: bool,
}

/// One located view
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct View {
    /// Eye pose in the reference space
    pub pose: Pose,
    /// Eye field of view
    pub fov: Fov,
}

/// Pixel rectangle inside a swapchain image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect2D {
    /// Left offset
    pub x: i32,
    /// Top offset
    pub y: i32,
    /// Width
    pub width: u32,
    /// Height
    pub height: u32,
}

/// Region of a swapchain image referenced by a layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapchainSubImage {
    /// Source swapchain
    pub swapchain: SwapchainHandle,
    /// Pixel region
    pub image_rect: Rect2D,
    /// Array slice
    pub image_array_index: u32,
}

/// One eye of a projection layer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompositionLayerProjectionView {
    /// Pose the eye was rendered with
    pub pose: Pose,
    /// Field of view the eye was rendered with
    pub fov: Fov,
    /// Rendered image
    pub sub_image: SwapchainSubImage,
}

/// Stereo projection layer
#[derive(Debug, Clone, PartialEq)]
pub struct CompositionLayerProjection {
    /// Space the poses are expressed in
    pub space: SpaceHandle,
    /// Per-eye views
    pub views: Vec<CompositionLayerProjectionView>,
}

/// Frame submission parameters
#[derive(Debug, Clone, PartialEq)]
pub struct FrameEndInfo {
    /// Display time from the matching wait
    pub display_time: XrTime,
    /// Blend mode
    pub blend_mode: EnvironmentBlendMode,
    /// Layers to composite, possibly empty
    pub layers: Vec<CompositionLayerProjection>,
}

/// Swapchain images of one eye
pub type SwapchainImages = Vec<TextureHandle>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_version_packing() {
        assert_eq!(ApiVersion::V1_0_0.packed(), 1u64 << 48);
        let version = ApiVersion { major: 1, minor: 2, patch: 3 };
        assert_eq!(version.packed(), (1u64 << 48) | (2u64 << 32) | 3);
    }

    #[test]
    fn test_application_name_clamped() {
        let long = "x".repeat(300);
        let info = ApplicationInfo::new(&long, "Angene", ApiVersion::V1_0_0);
        assert_eq!(info.application_name.len(), MAX_APPLICATION_NAME_SIZE - 1);
        assert_eq!(info.engine_name, "Angene");
    }

    #[test]
    fn test_tagged_view_is_zeroed_except_type() {
        let view = ViewConfigurationView::tagged();
        assert_eq!(view.ty, STRUCTURE_TYPE_VIEW_CONFIGURATION_VIEW);
        assert_eq!(view.recommended_width, 0);
        assert_eq!(view.max_samples, 0);
        assert!(!view.is_populated());
    }
}
