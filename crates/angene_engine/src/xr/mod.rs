//! # OpenXR pipeline
//!
//! Everything between the engine and an OpenXR runtime.
//!
//! ## Layers
//!
//! - [`runtime::XrRuntime`]: raw call surface, one method per OpenXR verb
//! - [`protocol::VrProtocolClient`]: entry-point resolution, typed verbs and
//!   the enumeration fallbacks
//! - [`session::VrSessionManager`]: lifecycle state machine and resource
//!   ownership
//! - [`frame`]: the per-frame wait/begin/locate/acquire/render/release/end
//!   protocol
//! - [`renderer::VrWindowRenderer`]: plugs a session into a window
//!
//! [`simulated::SimulatedRuntime`] stands in for a headset runtime.
//!
//! ## Threading
//!
//! Sessions, swapchains and the staging-target cache are only touched from
//! the thread running the engine loop. None of these types are `Sync`, and
//! nothing here locks.

pub mod frame;
pub mod frame_timing;
pub mod protocol;
pub mod render_target_cache;
pub mod renderer;
pub mod result;
pub mod retry;
pub mod runtime;
pub mod session;
pub mod simulated;
pub mod types;

pub use frame::{FrameOutcome, FrameSkip};
pub use frame_timing::{FrameTiming, FrameTimingStats};
pub use protocol::{ProcSource, ViewEnumeration, ViewFallbackReason, VrProtocolClient};
pub use render_target_cache::{RenderTargetCache, RenderTargetEntry, RenderTargetKey};
pub use renderer::VrWindowRenderer;
pub use result::{ProtocolError, XrOutcome, XrResult};
pub use retry::RetryPolicy;
pub use runtime::XrRuntime;
pub use session::{EyeSwapchain, VrError, VrErrorKind, VrSessionManager, VrSessionState};
pub use simulated::{SimFailure, SimulatedRuntime};
