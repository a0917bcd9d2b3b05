//! Window renderer for OpenXR-backed windows

use super::frame::FrameOutcome;
use super::runtime::XrRuntime;
use super::session::{VrError, VrSessionManager};
use crate::core::config::VrConfig;
use crate::engine::EngineError;
use crate::render::{BackendKind, GraphicsBinding, SharedRenderState, WindowRenderer};
use crate::scene::AttachedScene;

/// Renders a window's scene to the headset
///
/// The window itself shows nothing; every tick runs one frame of the VR
/// protocol through the owned session.
pub struct VrWindowRenderer<R: XrRuntime> {
    session: VrSessionManager<R>,
    binding: Box<dyn GraphicsBinding>,
    last_outcome: Option<FrameOutcome>,
}

impl<R: XrRuntime> VrWindowRenderer<R> {
    /// Bring up a VR session on `binding`
    ///
    /// # Errors
    /// Returns the bring-up failure. The runtime and binding are dropped; the
    /// caller is expected to fall back to a 2D renderer.
    pub fn try_new(runtime: R, mut binding: Box<dyn GraphicsBinding>, config: VrConfig) -> Result<Self, VrError> {
        let mut session = VrSessionManager::new(runtime, config);
        session.initialize(binding.as_mut())?;
        Ok(Self {
            session,
            binding,
            last_outcome: None,
        })
    }

    /// Session being rendered
    pub const fn session(&self) -> &VrSessionManager<R> {
        &self.session
    }

    /// Outcome of the most recent frame
    pub const fn last_outcome(&self) -> Option<&FrameOutcome> {
        self.last_outcome.as_ref()
    }
}

impl<R: XrRuntime> WindowRenderer for VrWindowRenderer<R> {
    fn backend(&self) -> BackendKind {
        BackendKind::OpenXr
    }

    fn render(&mut self, scene: &mut AttachedScene, shared: &mut SharedRenderState) -> Result<(), EngineError> {
        let outcome = self.session.render_frame(self.binding.as_mut(), scene)?;
        if let FrameOutcome::Skipped(reason) = &outcome {
            log::trace!("VR frame {} skipped: {:?}", shared.frame_index, reason);
        }
        self.last_outcome = Some(outcome);
        Ok(())
    }

    fn shutdown(&mut self, _shared: &mut SharedRenderState) {
        self.session.shutdown(self.binding.as_mut());
    }

    fn status_line(&self) -> String {
        format!(
            "openxr state={} views={} targets={} {}",
            self.session.state(),
            self.session.swapchains().len(),
            self.session.staging_targets(),
            self.session.timing().summary()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::HeadlessBinding;
    use crate::scene::StatusScene;
    use crate::xr::session::{VrErrorKind, VrSessionState};
    use crate::xr::simulated::SimulatedRuntime;

    #[test]
    fn test_renders_frames_and_shuts_down() {
        let mut renderer = VrWindowRenderer::try_new(
            SimulatedRuntime::new(),
            Box::new(HeadlessBinding::new()),
            VrConfig::default(),
        )
        .unwrap();
        let mut scene = AttachedScene::new(Box::new(StatusScene::new("VR", "running")));
        let mut shared = SharedRenderState::default();

        renderer.render(&mut scene, &mut shared).unwrap();
        assert!(matches!(
            renderer.last_outcome(),
            Some(FrameOutcome::Submitted { projection_views: 2, accepted: true })
        ));
        assert!(renderer.status_line().starts_with("openxr state=running views=2"));

        renderer.shutdown(&mut shared);
        assert_eq!(renderer.session().state(), VrSessionState::Stopped);
    }

    #[test]
    fn test_bring_up_failure_reported() {
        let result = VrWindowRenderer::try_new(
            SimulatedRuntime::new().without_loader(),
            Box::new(HeadlessBinding::new()),
            VrConfig::default(),
        );
        assert!(matches!(result, Err(ref e) if e.kind() == VrErrorKind::Discovery));
    }
}
