//! 3D device path for OpenGL and Direct3D 11 windows

use super::{
    BackendKind, BackendResult, Color, GraphicsBinding, RenderTargetViewHandle, SharedRenderState,
    TextureDesc, TextureFormat, TextureHandle, Viewport, WindowRenderer,
};
use crate::engine::EngineError;
use crate::scene::{AttachedScene, DrawTarget};

/// Back buffer owned by a device renderer
#[derive(Debug, Clone, Copy)]
struct BackBuffer {
    texture: TextureHandle,
    view: RenderTargetViewHandle,
}

/// Frame driver for windows rendered through a [`GraphicsBinding`]
///
/// Each frame sets the viewport, clears the back buffer, lets the scene draw
/// and presents.
pub struct DeviceRenderer {
    backend: BackendKind,
    binding: Box<dyn GraphicsBinding>,
    back_buffer: Option<BackBuffer>,
    width: u32,
    height: u32,
    clear_color: Color,
}

impl DeviceRenderer {
    /// Create the device and a back buffer of the window size
    ///
    /// # Arguments
    /// * `backend` - [`BackendKind::OpenGl`] or [`BackendKind::Direct3D11`]
    /// * `binding` - native API binding for this window
    /// * `width`, `height` - initial window size
    pub fn new(
        backend: BackendKind,
        mut binding: Box<dyn GraphicsBinding>,
        width: u32,
        height: u32,
    ) -> BackendResult<Self> {
        binding.create_device(None)?;
        let back_buffer = Self::create_back_buffer(binding.as_mut(), width, height)?;
        log::info!("{} renderer created ({}x{})", backend.as_str(), width, height);

        Ok(Self {
            backend,
            binding,
            back_buffer: Some(back_buffer),
            width,
            height,
            clear_color: Color::new(0.1, 0.2, 0.3, 1.0),
        })
    }

    fn create_back_buffer(binding: &mut dyn GraphicsBinding, width: u32, height: u32) -> BackendResult<BackBuffer> {
        let texture = binding.create_texture(&TextureDesc::render_target(width, height, TextureFormat::RGBA8_UNORM))?;
        match binding.create_render_target_view(texture) {
            Ok(view) => Ok(BackBuffer { texture, view }),
            Err(e) => {
                binding.release_texture(texture);
                Err(e)
            }
        }
    }

    fn release_back_buffer(&mut self) {
        if let Some(back_buffer) = self.back_buffer.take() {
            self.binding.release_render_target_view(back_buffer.view);
            self.binding.release_texture(back_buffer.texture);
        }
    }
}

impl WindowRenderer for DeviceRenderer {
    fn backend(&self) -> BackendKind {
        self.backend
    }

    fn render(&mut self, scene: &mut AttachedScene, _shared: &mut SharedRenderState) -> Result<(), EngineError> {
        let Some(back_buffer) = self.back_buffer else {
            log::warn!("{} window has no back buffer, skipping frame", self.backend.as_str());
            return Ok(());
        };

        self.binding.set_viewport(Viewport::full(self.width, self.height));
        if let Err(e) = self.binding.clear_render_target(back_buffer.view, self.clear_color) {
            log::warn!("Clear failed: {}", e);
        }

        {
            let mut target = DrawTarget::Device {
                backend: self.backend,
                binding: self.binding.as_mut(),
                target: back_buffer.view,
                width: self.width,
                height: self.height,
            };
            scene.draw(&mut target)?;
        }

        if let Err(e) = self.binding.present() {
            log::warn!("Present failed: {}", e);
        }
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 || (width == self.width && height == self.height) {
            return;
        }

        self.release_back_buffer();
        self.width = width;
        self.height = height;
        match Self::create_back_buffer(self.binding.as_mut(), width, height) {
            Ok(back_buffer) => self.back_buffer = Some(back_buffer),
            Err(e) => log::error!("Failed to recreate back buffer at {}x{}: {}", width, height, e),
        }
    }

    fn shutdown(&mut self, _shared: &mut SharedRenderState) {
        self.release_back_buffer();
    }

    fn status_line(&self) -> String {
        format!("{} {}x{}", self.backend.as_str(), self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::headless::HeadlessBinding;
    use crate::scene::{SceneCapabilities, SceneContract, SceneResult};

    struct ClearScene;

    impl SceneContract for ClearScene {
        fn capabilities(&self) -> SceneCapabilities {
            SceneCapabilities::DRAW
        }

        fn update(&mut self, _dt: f64) -> SceneResult {
            Ok(())
        }

        fn on_draw(&mut self, target: &mut DrawTarget<'_>) -> SceneResult {
            if let DrawTarget::Device { binding, target, .. } = target {
                binding.clear_render_target(*target, Color::WHITE)?;
            }
            Ok(())
        }
    }

    #[test]
    fn test_device_frame_draws_and_presents() {
        let mut renderer =
            DeviceRenderer::new(BackendKind::Direct3D11, Box::new(HeadlessBinding::new()), 800, 600).unwrap();
        let mut scene = AttachedScene::new(Box::new(ClearScene));
        let mut shared = SharedRenderState::default();

        renderer.render(&mut scene, &mut shared).unwrap();
        renderer.render(&mut scene, &mut shared).unwrap();
        assert_eq!(renderer.status_line(), "d3d11 800x600");
    }

    #[test]
    fn test_device_creation_failure_propagates() {
        let binding = HeadlessBinding::new().with_device_failure();
        assert!(DeviceRenderer::new(BackendKind::OpenGl, Box::new(binding), 640, 480).is_err());
    }
}
