//! Per-frame VR protocol
//!
//! One call to [`VrSessionManager::render_frame`] runs one frame:
//!
//! 1. wait for the frame, then begin it
//! 2. if the runtime wants a render, locate the views
//! 3. per eye: acquire, wait, render into the staging target, copy into the
//!    swapchain image, release
//! 4. end the frame with a projection layer holding every eye that made it
//!
//! A failed wait or begin skips the frame. A failed acquire, image wait or
//! copy skips only that eye. Neither is an error for the caller. An image wait
//! that times out keeps the image acquired and waits on it again next frame;
//! every other per-eye failure after acquire releases the image first. A
//! failed end-frame is logged and the loop carries on.

use super::render_target_cache::RenderTargetKey;
use super::result::{ProtocolError, XrResult};
use super::runtime::XrRuntime;
use super::session::{VrError, VrSessionManager, VrSessionState};
use super::types::{
    CompositionLayerProjection, CompositionLayerProjectionView, FrameEndInfo, Rect2D, SessionHandle,
    SwapchainSubImage, View,
};
use crate::foundation::math::{fov_to_projection_matrix, pose_to_view_matrix};
use crate::foundation::time::Stopwatch;
use crate::render::{GraphicsBinding, TextureDesc, TextureFormat, Viewport};
use crate::scene::{AttachedScene, EyeTarget};

/// Why a frame was not submitted with content
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameSkip {
    /// Waiting for the frame failed
    WaitFrame(ProtocolError),
    /// Beginning the frame failed
    BeginFrame(ProtocolError),
    /// Views could not be located
    LocateViews(ProtocolError),
    /// The runtime located a different number of views than there are swapchains
    ViewCountMismatch {
        /// Views located
        located: usize,
        /// Swapchains available
        expected: usize,
    },
}

/// What happened to one frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameOutcome {
    /// The frame was ended with the given number of projection views
    Submitted {
        /// Eyes included in the projection layer
        projection_views: usize,
        /// Whether the runtime accepted the end-frame call
        accepted: bool,
    },
    /// The runtime asked for no rendering; the frame was ended empty
    NotRendered,
    /// The frame was abandoned or ended empty because of a failure
    Skipped(FrameSkip),
}

impl<R: XrRuntime> VrSessionManager<R> {
    /// Run one frame of the VR protocol
    ///
    /// # Errors
    /// Returns [`VrError::Sequence`] when the session is not running, and
    /// [`VrError::Scene`] when the scene fails to render an eye. In the latter
    /// case the frame is still ended so the runtime stays in sync.
    pub fn render_frame(
        &mut self,
        binding: &mut dyn GraphicsBinding,
        scene: &mut AttachedScene,
    ) -> Result<FrameOutcome, VrError> {
        let (session, space) = match (self.state, self.session, self.space) {
            (VrSessionState::Running, Some(session), Some((space, _))) => (session, space),
            _ => {
                return Err(VrError::Sequence {
                    operation: "render frame",
                    state: self.state,
                })
            }
        };

        let wait_timer = Stopwatch::start_new();
        let frame_state = match self.client.wait_frame(session) {
            Ok(state) => state,
            Err(e) => {
                log::warn!("Frame skipped: {}", e);
                self.timing.record_skipped();
                return Ok(FrameOutcome::Skipped(FrameSkip::WaitFrame(e)));
            }
        };
        let wait = wait_timer.elapsed();

        if let Err(e) = self.client.begin_frame(session) {
            log::warn!("Frame skipped: {}", e);
            self.timing.record_skipped();
            return Ok(FrameOutcome::Skipped(FrameSkip::BeginFrame(e)));
        }

        let render_timer = Stopwatch::start_new();
        let mut projection_views = Vec::with_capacity(self.swapchains.len());
        let mut skip = None;

        if frame_state.should_render {
            let expected = self.swapchains.len();
            match self.client.locate_views(
                session,
                self.config.view_configuration,
                frame_state.predicted_display_time,
                space,
                expected as u32,
            ) {
                Ok(views) if views.len() == expected => {
                    for (eye, view) in views.iter().enumerate() {
                        match self.render_eye(binding, scene, eye, view) {
                            Ok(Some(projection_view)) => projection_views.push(projection_view),
                            Ok(None) => {}
                            Err(e) => {
                                self.end_frame(session, frame_state.predicted_display_time, Vec::new());
                                self.timing.record_skipped();
                                return Err(e);
                            }
                        }
                    }
                }
                Ok(views) => {
                    log::warn!("Located {} views for {} swapchains, frame skipped", views.len(), expected);
                    skip = Some(FrameSkip::ViewCountMismatch {
                        located: views.len(),
                        expected,
                    });
                }
                Err(e) => {
                    log::warn!("Frame skipped: {}", e);
                    skip = Some(FrameSkip::LocateViews(e));
                }
            }
        }
        let render = render_timer.elapsed();

        let submit_timer = Stopwatch::start_new();
        let submitted = projection_views.len();
        let layers = if projection_views.is_empty() {
            Vec::new()
        } else {
            vec![CompositionLayerProjection {
                space,
                views: projection_views,
            }]
        };
        let accepted = self.end_frame(session, frame_state.predicted_display_time, layers);

        Ok(match skip {
            Some(reason) => {
                self.timing.record_skipped();
                FrameOutcome::Skipped(reason)
            }
            None => {
                self.timing.record_frame(wait, render, submit_timer.elapsed());
                if frame_state.should_render {
                    FrameOutcome::Submitted {
                        projection_views: submitted,
                        accepted,
                    }
                } else {
                    FrameOutcome::NotRendered
                }
            }
        })
    }

    fn end_frame(
        &mut self,
        session: SessionHandle,
        display_time: i64,
        layers: Vec<CompositionLayerProjection>,
    ) -> bool {
        let info = FrameEndInfo {
            display_time,
            blend_mode: self.config.blend_mode,
            layers,
        };
        match self.client.end_frame(session, &info) {
            Ok(()) => true,
            Err(e) => {
                log::error!("{} (continuing with the next frame)", e);
                false
            }
        }
    }

    fn render_eye(
        &mut self,
        binding: &mut dyn GraphicsBinding,
        scene: &mut AttachedScene,
        eye: usize,
        view: &View,
    ) -> Result<Option<CompositionLayerProjectionView>, VrError> {
        let (handle, width, height, format, pending) = {
            let chain = &mut self.swapchains[eye];
            (chain.handle, chain.width, chain.height, chain.format, chain.pending_wait.take())
        };

        let image_index = match pending {
            Some(index) => index,
            None => match self.client.acquire_swapchain_image(handle) {
                Ok(index) => index,
                Err(e) => {
                    log::warn!("Eye {} skipped: {}", eye, e);
                    return Ok(None);
                }
            },
        };

        match self.client.wait_swapchain_image(handle, self.config.image_wait_timeout()) {
            Ok(()) => {}
            Err(e @ ProtocolError::Runtime {
                result: XrResult::TIMEOUT_EXPIRED,
                ..
            }) => {
                // Still acquired: wait on the same index next frame
                log::warn!("Eye {} skipped: {}", eye, e);
                self.swapchains[eye].pending_wait = Some(image_index);
                return Ok(None);
            }
            Err(e) => {
                log::warn!("Eye {} skipped: {}", eye, e);
                self.release_image(eye);
                return Ok(None);
            }
        }

        let Some(target_texture) = self.swapchains[eye].images.get(image_index as usize).copied() else {
            log::warn!("Eye {} skipped: image index {} out of range", eye, image_index);
            self.release_image(eye);
            return Ok(None);
        };

        let desc = TextureDesc::render_target(width, height, TextureFormat(format));
        let entry = match self
            .cache
            .get_or_create(RenderTargetKey::new(eye, image_index), &desc, target_texture, binding)
        {
            Ok(entry) => entry,
            Err(e) => {
                log::warn!("Eye {} skipped: staging target unavailable: {}", eye, e);
                self.release_image(eye);
                return Ok(None);
            }
        };

        binding.set_viewport(Viewport::full(width, height));
        if let Err(e) = binding.clear_render_target(entry.owned_view, self.config.clear_color) {
            log::warn!("Eye {} clear failed: {}", eye, e);
        }

        let mut target = EyeTarget {
            binding: &mut *binding,
            target: entry.owned_view,
            width,
            height,
            view: pose_to_view_matrix(&view.pose),
            projection: fov_to_projection_matrix(&view.fov, self.config.near_plane, self.config.far_plane),
            eye_index: eye,
            pose: view.pose,
            fov: view.fov,
        };
        if let Err(e) = scene.render_eye(&mut target) {
            log::error!("Scene failed rendering eye {}: {}", eye, e);
            self.release_image(eye);
            return Err(VrError::Scene(e));
        }

        if let Err(e) = binding.copy_resource(target_texture, entry.owned_texture) {
            log::warn!("Eye {} skipped: copy into swapchain image failed: {}", eye, e);
            self.release_image(eye);
            return Ok(None);
        }
        self.release_image(eye);

        Ok(Some(CompositionLayerProjectionView {
            pose: view.pose,
            fov: view.fov,
            sub_image: SwapchainSubImage {
                swapchain: handle,
                image_rect: Rect2D {
                    x: 0,
                    y: 0,
                    width,
                    height,
                },
                image_array_index: 0,
            },
        }))
    }

    fn release_image(&mut self, eye: usize) {
        let handle = self.swapchains[eye].handle;
        if let Err(e) = self.client.release_swapchain_image(handle) {
            log::warn!("Eye {} release failed: {}", eye, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::VrConfig;
    use crate::foundation::math::Mat4;
    use crate::render::{BindingCall, Color, HeadlessBinding};
    use crate::scene::{SceneCapabilities, SceneContract, SceneError, SceneResult};
    use crate::xr::retry::RetryPolicy;
    use crate::xr::runtime::entry_points as ep;
    use crate::xr::simulated::{SimFailure, SimulatedRuntime};
    use approx::assert_relative_eq;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct EyeLog {
        eyes: Vec<(usize, u32, u32)>,
        views: Vec<Mat4>,
    }

    struct EyeScene {
        log: Rc<RefCell<EyeLog>>,
        fail: bool,
    }

    impl SceneContract for EyeScene {
        fn capabilities(&self) -> SceneCapabilities {
            SceneCapabilities::RENDER_EYE
        }

        fn update(&mut self, _dt: f64) -> SceneResult {
            Ok(())
        }

        fn on_render_eye(&mut self, eye: &mut EyeTarget<'_>) -> SceneResult {
            if self.fail {
                return Err(SceneError::Custom("eye shader missing".to_string()));
            }
            eye.binding.clear_render_target(eye.target, Color::rgb(1.0, 0.0, 0.0))?;
            let mut log = self.log.borrow_mut();
            log.eyes.push((eye.eye_index, eye.width, eye.height));
            log.views.push(eye.view);
            Ok(())
        }
    }

    fn running(runtime: SimulatedRuntime) -> (VrSessionManager<SimulatedRuntime>, HeadlessBinding) {
        let mut binding = HeadlessBinding::new();
        let config = VrConfig::new("frame test").with_retry(RetryPolicy::immediate(1));
        let mut session = VrSessionManager::new(runtime, config);
        session.initialize(&mut binding).unwrap();
        (session, binding)
    }

    fn scene(fail: bool) -> (AttachedScene, Rc<RefCell<EyeLog>>) {
        let log = Rc::new(RefCell::new(EyeLog::default()));
        let scene = EyeScene { log: Rc::clone(&log), fail };
        (AttachedScene::new(Box::new(scene)), log)
    }

    #[test]
    fn test_full_stereo_frame() {
        let (mut session, mut binding) = running(SimulatedRuntime::new().with_views(2, 1024, 1024));
        let (mut scene, log) = scene(false);

        let outcome = session.render_frame(&mut binding, &mut scene).unwrap();

        assert_eq!(outcome, FrameOutcome::Submitted { projection_views: 2, accepted: true });
        let runtime = session.runtime();
        assert_eq!(runtime.call_count(ep::ACQUIRE_SWAPCHAIN_IMAGE), 2);
        assert_eq!(runtime.call_count(ep::RELEASE_SWAPCHAIN_IMAGE), 2);
        let frame = &runtime.submitted_frames()[0];
        assert_eq!(frame.layers.len(), 1);
        assert_eq!(frame.layers[0].views.len(), 2);
        assert_eq!(frame.layers[0].views[1].sub_image.image_rect.width, 1024);
        assert_eq!(log.borrow().eyes, vec![(0, 1024, 1024), (1, 1024, 1024)]);
        assert_eq!(binding.copy_count(), 2);
    }

    #[test]
    fn test_eye_view_matrices_differ() {
        let (mut session, mut binding) = running(SimulatedRuntime::new());
        let (mut scene, log) = scene(false);
        session.render_frame(&mut binding, &mut scene).unwrap();

        let log = log.borrow();
        let left = log.views[0];
        let right = log.views[1];
        assert_relative_eq!(left[(0, 3)], -right[(0, 3)], epsilon = 1e-6);
        assert!(left[(0, 3)] > 0.0);
    }

    #[test]
    fn test_acquire_failure_skips_one_eye() {
        let (mut session, mut binding) = running(SimulatedRuntime::new().with_failure(SimFailure::Acquire(1)));
        let (mut scene, log) = scene(false);

        let outcome = session.render_frame(&mut binding, &mut scene).unwrap();

        assert_eq!(outcome, FrameOutcome::Submitted { projection_views: 1, accepted: true });
        let frame = &session.runtime().submitted_frames()[0];
        assert_eq!(frame.layers[0].views.len(), 1);
        assert_eq!(frame.layers[0].views[0].sub_image.swapchain, session.swapchains()[0].handle);
        assert_eq!(log.borrow().eyes.len(), 1);
    }

    #[test]
    fn test_image_wait_timeout_retried_next_frame() {
        let (mut session, mut binding) = running(SimulatedRuntime::new().with_failure(SimFailure::WaitImage(0)));
        let (mut scene, _) = scene(false);

        let first = session.render_frame(&mut binding, &mut scene).unwrap();
        assert_eq!(first, FrameOutcome::Submitted { projection_views: 1, accepted: true });

        session.runtime_mut().set_failure(SimFailure::WaitImage(0), false);
        let second = session.render_frame(&mut binding, &mut scene).unwrap();
        assert_eq!(second, FrameOutcome::Submitted { projection_views: 2, accepted: true });
        assert_eq!(session.runtime().call_count(ep::ACQUIRE_SWAPCHAIN_IMAGE), 3);
    }

    #[test]
    fn test_image_wait_error_releases_image() {
        let (mut session, mut binding) =
            running(SimulatedRuntime::new().with_failure(SimFailure::WaitImageError(0)));
        let (mut scene, log) = scene(false);

        let first = session.render_frame(&mut binding, &mut scene).unwrap();
        assert_eq!(first, FrameOutcome::Submitted { projection_views: 1, accepted: true });
        assert_eq!(session.runtime().call_count(ep::RELEASE_SWAPCHAIN_IMAGE), 2);
        assert_eq!(session.swapchains()[0].pending_wait, None);
        assert_eq!(log.borrow().eyes.len(), 1);

        session.runtime_mut().set_failure(SimFailure::WaitImageError(0), false);
        let second = session.render_frame(&mut binding, &mut scene).unwrap();
        assert_eq!(second, FrameOutcome::Submitted { projection_views: 2, accepted: true });
        assert_eq!(session.runtime().call_count(ep::ACQUIRE_SWAPCHAIN_IMAGE), 4);
    }

    #[test]
    fn test_copy_failure_skips_eye_and_releases() {
        let (mut session, mut binding) = running(SimulatedRuntime::new());
        let (mut scene, _) = scene(false);
        binding.set_copy_failure(true);

        let first = session.render_frame(&mut binding, &mut scene).unwrap();
        assert_eq!(first, FrameOutcome::Submitted { projection_views: 0, accepted: true });
        assert!(session.runtime().submitted_frames()[0].layers.is_empty());
        assert_eq!(session.runtime().call_count(ep::RELEASE_SWAPCHAIN_IMAGE), 2);

        binding.set_copy_failure(false);
        let second = session.render_frame(&mut binding, &mut scene).unwrap();
        assert_eq!(second, FrameOutcome::Submitted { projection_views: 2, accepted: true });
    }

    #[test]
    fn test_begin_frame_failure_skips_frame() {
        let (mut session, mut binding) = running(SimulatedRuntime::new().with_failure(SimFailure::BeginFrame));
        let (mut scene, log) = scene(false);

        let outcome = session.render_frame(&mut binding, &mut scene).unwrap();

        assert!(matches!(outcome, FrameOutcome::Skipped(FrameSkip::BeginFrame(_))));
        assert_eq!(session.runtime().call_count(ep::ACQUIRE_SWAPCHAIN_IMAGE), 0);
        assert_eq!(session.runtime().call_count(ep::END_FRAME), 0);
        assert!(log.borrow().eyes.is_empty());

        session.runtime_mut().set_failure(SimFailure::BeginFrame, false);
        let next = session.render_frame(&mut binding, &mut scene).unwrap();
        assert_eq!(next, FrameOutcome::Submitted { projection_views: 2, accepted: true });
    }

    #[test]
    fn test_locate_views_failure_ends_frame_empty() {
        let (mut session, mut binding) = running(SimulatedRuntime::new().with_failure(SimFailure::LocateViews));
        let (mut scene, log) = scene(false);

        let outcome = session.render_frame(&mut binding, &mut scene).unwrap();

        assert!(matches!(outcome, FrameOutcome::Skipped(FrameSkip::LocateViews(_))));
        let runtime = session.runtime();
        assert_eq!(runtime.call_count(ep::END_FRAME), 1);
        assert!(runtime.submitted_frames()[0].layers.is_empty());
        assert_eq!(runtime.call_count(ep::ACQUIRE_SWAPCHAIN_IMAGE), 0);
        assert!(log.borrow().eyes.is_empty());
    }

    #[test]
    fn test_wait_frame_failure_skips_frame() {
        let (mut session, mut binding) = running(SimulatedRuntime::new().with_failure(SimFailure::WaitFrame));
        let (mut scene, _) = scene(false);

        let outcome = session.render_frame(&mut binding, &mut scene).unwrap();

        assert!(matches!(outcome, FrameOutcome::Skipped(FrameSkip::WaitFrame(_))));
        assert_eq!(session.runtime().call_count(ep::BEGIN_FRAME), 0);
        assert_eq!(session.runtime().call_count(ep::END_FRAME), 0);
        assert_eq!(session.timing().skipped_frames(), 1);
    }

    #[test]
    fn test_view_count_mismatch_ends_frame_empty() {
        let (mut session, mut binding) = running(SimulatedRuntime::new().with_located_view_count(1));
        let (mut scene, log) = scene(false);

        let outcome = session.render_frame(&mut binding, &mut scene).unwrap();

        assert_eq!(
            outcome,
            FrameOutcome::Skipped(FrameSkip::ViewCountMismatch { located: 1, expected: 2 })
        );
        assert!(session.runtime().submitted_frames()[0].layers.is_empty());
        assert!(log.borrow().eyes.is_empty());
    }

    #[test]
    fn test_should_render_false_submits_no_layers() {
        let (mut session, mut binding) = running(SimulatedRuntime::new().with_should_render(false));
        let (mut scene, _) = scene(false);

        let outcome = session.render_frame(&mut binding, &mut scene).unwrap();

        assert_eq!(outcome, FrameOutcome::NotRendered);
        assert_eq!(session.runtime().call_count(ep::LOCATE_VIEWS), 0);
        assert!(session.runtime().submitted_frames()[0].layers.is_empty());
    }

    #[test]
    fn test_end_frame_failure_is_not_fatal() {
        let (mut session, mut binding) = running(SimulatedRuntime::new().with_failure(SimFailure::EndFrame));
        let (mut scene, _) = scene(false);

        let outcome = session.render_frame(&mut binding, &mut scene).unwrap();
        assert_eq!(outcome, FrameOutcome::Submitted { projection_views: 2, accepted: false });

        assert!(session.render_frame(&mut binding, &mut scene).is_ok());
        assert_eq!(session.state(), VrSessionState::Running);
    }

    #[test]
    fn test_staging_targets_reused_across_frames() {
        let (mut session, mut binding) = running(SimulatedRuntime::new().with_images_per_swapchain(3));
        let (mut scene, _) = scene(false);

        for _ in 0..7 {
            session.render_frame(&mut binding, &mut scene).unwrap();
        }

        assert_eq!(session.staging_targets(), 6);
        assert_eq!(binding.texture_creations(), 6);
    }

    #[test]
    fn test_eye_cleared_before_scene_draws() {
        let (mut session, mut binding) = running(SimulatedRuntime::new());
        let (mut scene, _) = scene(false);
        session.render_frame(&mut binding, &mut scene).unwrap();

        let clear_color = session.config().clear_color;
        let first_clear = binding
            .calls()
            .iter()
            .find_map(|call| match call {
                BindingCall::Clear(_, color) => Some(*color),
                _ => None,
            })
            .unwrap();
        assert_eq!(first_clear, clear_color);
    }

    #[test]
    fn test_scene_error_still_ends_frame() {
        let (mut session, mut binding) = running(SimulatedRuntime::new());
        let (mut scene, _) = scene(true);

        let error = session.render_frame(&mut binding, &mut scene).unwrap_err();

        assert!(matches!(error, VrError::Scene(_)));
        let runtime = session.runtime();
        assert_eq!(runtime.call_count(ep::END_FRAME), 1);
        assert_eq!(runtime.call_count(ep::RELEASE_SWAPCHAIN_IMAGE), 1);
    }

    #[test]
    fn test_render_requires_running_session() {
        let mut binding = HeadlessBinding::new();
        let mut session = VrSessionManager::new(SimulatedRuntime::new(), VrConfig::default());
        let (mut scene, _) = scene(false);
        assert!(matches!(
            session.render_frame(&mut binding, &mut scene),
            Err(VrError::Sequence { operation: "render frame", .. })
        ));
    }
}
