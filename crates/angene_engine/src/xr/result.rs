//! OpenXR result codes and protocol errors

use std::fmt;
use thiserror::Error;

/// Raw status returned by a runtime call
///
/// Zero is success, positive values are qualified successes and negative
/// values are failures. Callers branch on [`XrResult::is_success`]; the
/// specific code is for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct XrResult(pub i32);

impl XrResult {
    /// XR_SUCCESS
    pub const SUCCESS: Self = Self(0);
    /// XR_TIMEOUT_EXPIRED
    pub const TIMEOUT_EXPIRED: Self = Self(1);
    /// XR_SESSION_LOSS_PENDING
    pub const SESSION_LOSS_PENDING: Self = Self(3);
    /// XR_EVENT_UNAVAILABLE
    pub const EVENT_UNAVAILABLE: Self = Self(4);
    /// XR_FRAME_DISCARDED
    pub const FRAME_DISCARDED: Self = Self(9);
    /// XR_ERROR_VALIDATION_FAILURE
    pub const ERROR_VALIDATION_FAILURE: Self = Self(-1);
    /// XR_ERROR_RUNTIME_FAILURE
    pub const ERROR_RUNTIME_FAILURE: Self = Self(-2);
    /// XR_ERROR_INITIALIZATION_FAILED
    pub const ERROR_INITIALIZATION_FAILED: Self = Self(-6);
    /// XR_ERROR_FUNCTION_UNSUPPORTED
    pub const ERROR_FUNCTION_UNSUPPORTED: Self = Self(-7);
    /// XR_ERROR_EXTENSION_NOT_PRESENT
    pub const ERROR_EXTENSION_NOT_PRESENT: Self = Self(-9);
    /// XR_ERROR_SIZE_INSUFFICIENT
    pub const ERROR_SIZE_INSUFFICIENT: Self = Self(-11);
    /// XR_ERROR_HANDLE_INVALID
    pub const ERROR_HANDLE_INVALID: Self = Self(-12);
    /// XR_ERROR_SESSION_RUNNING
    pub const ERROR_SESSION_RUNNING: Self = Self(-14);
    /// XR_ERROR_SESSION_NOT_RUNNING
    pub const ERROR_SESSION_NOT_RUNNING: Self = Self(-16);
    /// XR_ERROR_SWAPCHAIN_FORMAT_UNSUPPORTED
    pub const ERROR_SWAPCHAIN_FORMAT_UNSUPPORTED: Self = Self(-26);
    /// XR_ERROR_SESSION_NOT_READY
    pub const ERROR_SESSION_NOT_READY: Self = Self(-28);
    /// XR_ERROR_TIME_INVALID
    pub const ERROR_TIME_INVALID: Self = Self(-30);
    /// XR_ERROR_REFERENCE_SPACE_UNSUPPORTED
    pub const ERROR_REFERENCE_SPACE_UNSUPPORTED: Self = Self(-31);
    /// XR_ERROR_FORM_FACTOR_UNAVAILABLE
    pub const ERROR_FORM_FACTOR_UNAVAILABLE: Self = Self(-35);
    /// XR_ERROR_CALL_ORDER_INVALID
    pub const ERROR_CALL_ORDER_INVALID: Self = Self(-37);
    /// XR_ERROR_GRAPHICS_DEVICE_INVALID
    pub const ERROR_GRAPHICS_DEVICE_INVALID: Self = Self(-38);
    /// XR_ERROR_VIEW_CONFIGURATION_TYPE_UNSUPPORTED
    pub const ERROR_VIEW_CONFIGURATION_TYPE_UNSUPPORTED: Self = Self(-41);
    /// XR_ERROR_GRAPHICS_REQUIREMENTS_CALL_MISSING
    pub const ERROR_GRAPHICS_REQUIREMENTS_CALL_MISSING: Self = Self(-50);

    /// Whether the call succeeded (including qualified successes)
    pub const fn is_success(self) -> bool {
        self.0 >= 0
    }

    /// Symbolic name for known codes
    pub const fn name(self) -> Option<&'static str> {
        let name = match self.0 {
            0 => "XR_SUCCESS",
            1 => "XR_TIMEOUT_EXPIRED",
            3 => "XR_SESSION_LOSS_PENDING",
            4 => "XR_EVENT_UNAVAILABLE",
            7 => "XR_SPACE_BOUNDS_UNAVAILABLE",
            8 => "XR_SESSION_NOT_FOCUSED",
            9 => "XR_FRAME_DISCARDED",
            -1 => "XR_ERROR_VALIDATION_FAILURE",
            -2 => "XR_ERROR_RUNTIME_FAILURE",
            -3 => "XR_ERROR_OUT_OF_MEMORY",
            -4 => "XR_ERROR_API_VERSION_UNSUPPORTED",
            -6 => "XR_ERROR_INITIALIZATION_FAILED",
            -7 => "XR_ERROR_FUNCTION_UNSUPPORTED",
            -8 => "XR_ERROR_FEATURE_UNSUPPORTED",
            -9 => "XR_ERROR_EXTENSION_NOT_PRESENT",
            -10 => "XR_ERROR_LIMIT_REACHED",
            -11 => "XR_ERROR_SIZE_INSUFFICIENT",
            -12 => "XR_ERROR_HANDLE_INVALID",
            -13 => "XR_ERROR_INSTANCE_LOST",
            -14 => "XR_ERROR_SESSION_RUNNING",
            -16 => "XR_ERROR_SESSION_NOT_RUNNING",
            -17 => "XR_ERROR_SESSION_LOST",
            -18 => "XR_ERROR_SYSTEM_INVALID",
            -19 => "XR_ERROR_PATH_INVALID",
            -20 => "XR_ERROR_PATH_COUNT_EXCEEDED",
            -21 => "XR_ERROR_PATH_FORMAT_INVALID",
            -22 => "XR_ERROR_PATH_UNSUPPORTED",
            -23 => "XR_ERROR_LAYER_INVALID",
            -24 => "XR_ERROR_LAYER_LIMIT_EXCEEDED",
            -25 => "XR_ERROR_SWAPCHAIN_RECT_INVALID",
            -26 => "XR_ERROR_SWAPCHAIN_FORMAT_UNSUPPORTED",
            -27 => "XR_ERROR_ACTION_TYPE_MISMATCH",
            -28 => "XR_ERROR_SESSION_NOT_READY",
            -29 => "XR_ERROR_SESSION_NOT_STOPPING",
            -30 => "XR_ERROR_TIME_INVALID",
            -31 => "XR_ERROR_REFERENCE_SPACE_UNSUPPORTED",
            -32 => "XR_ERROR_FILE_ACCESS_ERROR",
            -33 => "XR_ERROR_FILE_CONTENTS_INVALID",
            -34 => "XR_ERROR_FORM_FACTOR_UNSUPPORTED",
            -35 => "XR_ERROR_FORM_FACTOR_UNAVAILABLE",
            -36 => "XR_ERROR_API_LAYER_NOT_PRESENT",
            -37 => "XR_ERROR_CALL_ORDER_INVALID",
            -38 => "XR_ERROR_GRAPHICS_DEVICE_INVALID",
            -39 => "XR_ERROR_POSE_INVALID",
            -40 => "XR_ERROR_INDEX_OUT_OF_RANGE",
            -41 => "XR_ERROR_VIEW_CONFIGURATION_TYPE_UNSUPPORTED",
            -42 => "XR_ERROR_ENVIRONMENT_BLEND_MODE_UNSUPPORTED",
            -50 => "XR_ERROR_GRAPHICS_REQUIREMENTS_CALL_MISSING",
            _ => return None,
        };
        Some(name)
    }
}

impl fmt::Display for XrResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "XrResult({})", self.0),
        }
    }
}

/// Failure of a single protocol verb
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// The runtime loader library could not be loaded
    #[error("OpenXR loader is not available")]
    LoaderUnavailable,

    /// Neither the instance resolver nor the library exports the entry point
    #[error("entry point {0} not found")]
    NotFound(&'static str),

    /// A call was made before the handle it depends on exists
    #[error("{call} requires {missing}")]
    MissingPrerequisite {
        /// The verb that was attempted
        call: &'static str,
        /// What was missing
        missing: &'static str,
    },

    /// A call succeeded but returned no items where at least one is required
    #[error("{0} returned no items")]
    Empty(&'static str),

    /// The runtime returned a failure code
    #[error("{call} failed: {result}")]
    Runtime {
        /// The verb that failed
        call: &'static str,
        /// Raw runtime status
        result: XrResult,
    },
}

impl ProtocolError {
    /// Raw status code for this failure
    ///
    /// Missing prerequisites report `-1` and unresolved entry points `-2`.
    pub const fn status(&self) -> XrResult {
        match self {
            Self::LoaderUnavailable | Self::MissingPrerequisite { .. } => XrResult(-1),
            Self::NotFound(_) => XrResult(-2),
            Self::Empty(_) => XrResult::ERROR_RUNTIME_FAILURE,
            Self::Runtime { result, .. } => *result,
        }
    }

    /// Wrap a runtime status for `call`
    pub const fn runtime(call: &'static str, result: XrResult) -> Self {
        Self::Runtime { call, result }
    }
}

/// Result type for protocol verbs
pub type XrOutcome<T> = Result<T, ProtocolError>;

/// Convert a bare status into an outcome
pub fn check(call: &'static str, result: XrResult) -> XrOutcome<()> {
    if result.is_success() {
        Ok(())
    } else {
        Err(ProtocolError::runtime(call, result))
    }
}
