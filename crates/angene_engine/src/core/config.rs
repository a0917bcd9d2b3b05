//! # Engine Configuration
//!
//! Concrete configuration structures for the frame loop and the VR pipeline.
//! All of them implement [`Config`], so they can be loaded from TOML or RON.
//!
//! ## Configuration Categories
//!
//! - **Engine Config**: fixed timestep, delta cap, pacing, diagnostics, quiet mode
//! - **VR Config**: instance parameters, fallbacks for flaky runtimes, frame
//!   timing and projection planes

use crate::render::Color;
use crate::xr::retry::RetryPolicy;
use crate::xr::types::{
    ApiVersion, EnvironmentBlendMode, FormFactor, ReferenceSpaceType, ViewConfigurationType,
    ViewConfigurationView, STRUCTURE_TYPE_VIEW_CONFIGURATION_VIEW,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use crate::config::{Config, ConfigError};

/// # Fallback View Configuration
///
/// Used when the runtime reports no views, or the query fails outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallbackViewConfig {
    /// Number of views
    pub view_count: u32,
    /// Recommended width per view
    pub recommended_width: u32,
    /// Recommended height per view
    pub recommended_height: u32,
    /// Maximum width per view
    pub max_width: u32,
    /// Maximum height per view
    pub max_height: u32,
    /// Recommended sample count
    pub recommended_samples: u32,
    /// Maximum sample count
    pub max_samples: u32,
}

impl Default for FallbackViewConfig {
    fn default() -> Self {
        Self {
            view_count: 2,
            recommended_width: 1832,
            recommended_height: 1920,
            max_width: 4096,
            max_height: 4096,
            recommended_samples: 1,
            max_samples: 4,
        }
    }
}

impl FallbackViewConfig {
    /// Expand into one record per view
    pub fn views(&self) -> Vec<ViewConfigurationView> {
        let view = ViewConfigurationView {
            ty: STRUCTURE_TYPE_VIEW_CONFIGURATION_VIEW,
            recommended_width: self.recommended_width,
            max_width: self.max_width,
            recommended_height: self.recommended_height,
            max_height: self.max_height,
            recommended_samples: self.recommended_samples,
            max_samples: self.max_samples,
        };
        vec![view; self.view_count as usize]
    }
}

/// # VR Configuration
///
/// Parameters for bringing up an OpenXR session and running its frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VrConfig {
    /// Application name sent to the runtime
    pub application_name: String,
    /// Engine name sent to the runtime
    pub engine_name: String,
    /// Requested API version
    pub api_version: ApiVersion,
    /// Extensions to enable; the D3D11 interop extension is always added
    pub extensions: Vec<String>,
    /// Form factor to look for
    pub form_factor: FormFactor,
    /// View configuration to render
    pub view_configuration: ViewConfigurationType,
    /// Blend mode used when submitting frames
    pub blend_mode: EnvironmentBlendMode,
    /// Reference spaces to try, in order
    pub reference_space_order: Vec<ReferenceSpaceType>,
    /// Swapchain formats by preference; the first entry is used if enumeration fails
    pub swapchain_format_preference: Vec<i64>,
    /// Views assumed when enumeration yields nothing
    pub fallback_view: FallbackViewConfig,
    /// Retry policy for view enumeration
    pub retry: RetryPolicy,
    /// Timeout for waiting on a swapchain image, in milliseconds
    pub image_wait_timeout_ms: u64,
    /// Near clip plane in meters
    pub near_plane: f32,
    /// Far clip plane in meters
    pub far_plane: f32,
    /// Color each eye is cleared to before the scene draws
    pub clear_color: Color,
    /// Frame budget used by frame timing statistics, in milliseconds
    pub frame_budget_ms: f64,
}

/// Extension that enables Direct3D 11 interop
pub const D3D11_ENABLE_EXTENSION: &str = "XR_KHR_D3D11_enable";

impl Default for VrConfig {
    fn default() -> Self {
        Self::new("Angene VR")
    }
}

impl VrConfig {
    /// Create a VR configuration for an application
    pub fn new(application_name: impl Into<String>) -> Self {
        Self {
            application_name: application_name.into(),
            engine_name: "Angene".to_string(),
            api_version: ApiVersion::V1_0_0,
            extensions: vec![D3D11_ENABLE_EXTENSION.to_string()],
            form_factor: FormFactor::HeadMountedDisplay,
            view_configuration: ViewConfigurationType::PrimaryStereo,
            blend_mode: EnvironmentBlendMode::Opaque,
            reference_space_order: vec![ReferenceSpaceType::Local, ReferenceSpaceType::View],
            swapchain_format_preference: vec![27, 91, 28, 29],
            fallback_view: FallbackViewConfig::default(),
            retry: RetryPolicy::default(),
            image_wait_timeout_ms: 1000,
            near_plane: 0.1,
            far_plane: 100.0,
            clear_color: Color::new(0.1, 0.2, 0.3, 1.0),
            frame_budget_ms: 11.1,
        }
    }

    /// Set the swapchain format preference list
    pub fn with_format_preference(mut self, formats: Vec<i64>) -> Self {
        self.swapchain_format_preference = formats;
        self
    }

    /// Set the reference space fallback order
    pub fn with_reference_spaces(mut self, order: Vec<ReferenceSpaceType>) -> Self {
        self.reference_space_order = order;
        self
    }

    /// Set the view enumeration retry policy
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Set the near and far clip planes
    pub fn with_clip_planes(mut self, near: f32, far: f32) -> Self {
        self.near_plane = near;
        self.far_plane = far;
        self
    }

    /// Image wait timeout as a duration
    pub const fn image_wait_timeout(&self) -> Duration {
        Duration::from_millis(self.image_wait_timeout_ms)
    }

    /// Extensions to request, with the D3D11 interop extension guaranteed present
    pub fn requested_extensions(&self) -> Vec<String> {
        let mut extensions = self.extensions.clone();
        if !extensions.iter().any(|e| e == D3D11_ENABLE_EXTENSION) {
            extensions.insert(0, D3D11_ENABLE_EXTENSION.to_string());
        }
        extensions
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.application_name.is_empty() {
            return Err(ConfigError::Invalid("application name cannot be empty".to_string()));
        }
        if self.reference_space_order.is_empty() {
            return Err(ConfigError::Invalid("at least one reference space type is required".to_string()));
        }
        if self.swapchain_format_preference.is_empty() {
            return Err(ConfigError::Invalid("swapchain format preference list is empty".to_string()));
        }
        if self.fallback_view.view_count == 0 {
            return Err(ConfigError::Invalid("fallback view count must be at least 1".to_string()));
        }
        if !(self.near_plane > 0.0 && self.far_plane > self.near_plane) {
            return Err(ConfigError::Invalid(format!(
                "clip planes must satisfy 0 < near < far (near={}, far={})",
                self.near_plane, self.far_plane
            )));
        }
        Ok(())
    }
}

impl Config for VrConfig {}

/// # Engine Configuration
///
/// Core loop behavior shared by every window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Fixed update rate in Hz
    pub target_fps: u32,
    /// Largest wall-clock delta accumulated in one tick, in seconds
    pub max_frame_delta: f64,
    /// Fraction of the remaining frame time to sleep when idle
    pub pacing_factor: f64,
    /// Seconds between runtime health log lines; zero disables them
    pub diagnostics_interval_secs: f64,
    /// Suppress the startup banner
    pub quiet: bool,
    /// VR pipeline configuration
    pub vr: VrConfig,
}

impl EngineConfig {
    /// Create an engine configuration with defaults
    pub fn new() -> Self {
        Self {
            target_fps: 60,
            max_frame_delta: 0.1,
            pacing_factor: 0.95,
            diagnostics_interval_secs: 10.0,
            quiet: false,
            vr: VrConfig::default(),
        }
    }

    /// Set the fixed update rate
    pub fn with_target_fps(mut self, fps: u32) -> Self {
        self.target_fps = fps;
        self
    }

    /// Suppress or show the startup banner
    pub fn with_quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// Set the VR configuration
    pub fn with_vr(mut self, vr: VrConfig) -> Self {
        self.vr = vr;
        self
    }

    /// Fixed update interval in seconds
    pub fn fixed_step(&self) -> f64 {
        1.0 / f64::from(self.target_fps.max(1))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.target_fps == 0 {
            return Err(ConfigError::Invalid("target fps must be at least 1".to_string()));
        }
        if self.max_frame_delta <= 0.0 {
            return Err(ConfigError::Invalid("max frame delta must be positive".to_string()));
        }
        if !(0.0..=1.0).contains(&self.pacing_factor) {
            return Err(ConfigError::Invalid("pacing factor must be within 0..=1".to_string()));
        }
        self.vr.validate()
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl Config for EngineConfig {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigFormat;
    use approx::assert_relative_eq;

    #[test]
    fn test_fallback_view_is_two_by_1832x1920() {
        let views = FallbackViewConfig::default().views();
        assert_eq!(views.len(), 2);
        for view in views {
            assert_eq!(view.recommended_width, 1832);
            assert_eq!(view.recommended_height, 1920);
            assert_eq!(view.ty, STRUCTURE_TYPE_VIEW_CONFIGURATION_VIEW);
        }
    }

    #[test]
    fn test_defaults_validate() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_relative_eq!(config.fixed_step(), 1.0 / 60.0);
        assert_eq!(config.vr.swapchain_format_preference, vec![27, 91, 28, 29]);
    }

    #[test]
    fn test_requested_extensions_always_include_d3d11() {
        let mut vr = VrConfig::default();
        vr.extensions = vec!["XR_EXT_debug_utils".to_string()];
        let extensions = vr.requested_extensions();
        assert_eq!(extensions[0], D3D11_ENABLE_EXTENSION);
        assert_eq!(extensions.len(), 2);
    }

    #[test]
    fn test_invalid_clip_planes_rejected() {
        let vr = VrConfig::default().with_clip_planes(1.0, 0.5);
        assert!(matches!(vr.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_toml_and_ron_roundtrip() {
        let config = EngineConfig::new().with_target_fps(90).with_quiet(true);
        for format in [ConfigFormat::Toml, ConfigFormat::Ron] {
            let text = config.to_string_as(format).unwrap();
            let parsed = EngineConfig::from_str_as(&text, format).unwrap();
            assert_eq!(parsed, config);
        }
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let parsed = EngineConfig::from_str_as("target_fps = 72\n", ConfigFormat::Toml).unwrap();
        assert_eq!(parsed.target_fps, 72);
        assert_relative_eq!(parsed.max_frame_delta, 0.1);
        assert_eq!(parsed.vr.fallback_view, FallbackViewConfig::default());
    }
}
