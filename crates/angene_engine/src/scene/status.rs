//! Status-only fallback scene
//!
//! Shown when a window's intended pipeline is unavailable, most commonly when
//! VR could not be brought up and the window degraded to 2D.

use super::{DrawTarget, EyeTarget, SceneCapabilities, SceneContract, SceneResult};
use crate::render::Color;

const BACKGROUND: Color = Color::rgb(0.08, 0.08, 0.1);
const TEXT: Color = Color::rgb(0.9, 0.9, 0.9);
const WARNING: Color = Color::rgb(0.95, 0.6, 0.2);

/// Scene that only displays a status message
#[derive(Debug, Clone)]
pub struct StatusScene {
    title: String,
    message: String,
    elapsed: f64,
}

impl StatusScene {
    /// Create a status scene with a title and a detail message
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            elapsed: 0.0,
        }
    }

    /// Status message shown below the title
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Seconds of fixed updates so far
    pub const fn elapsed(&self) -> f64 {
        self.elapsed
    }
}

impl SceneContract for StatusScene {
    fn capabilities(&self) -> SceneCapabilities {
        SceneCapabilities::DRAW | SceneCapabilities::RENDER_EYE
    }

    fn update(&mut self, dt: f64) -> SceneResult {
        self.elapsed += dt;
        Ok(())
    }

    fn on_draw(&mut self, target: &mut DrawTarget<'_>) -> SceneResult {
        match target {
            DrawTarget::Painter(painter) => {
                painter.clear(BACKGROUND);
                painter.draw_text(16, 16, &self.title, WARNING);
                painter.draw_text(16, 40, &self.message, TEXT);
            }
            DrawTarget::Device { binding, target, .. } => {
                binding.clear_render_target(*target, WARNING)?;
            }
        }
        Ok(())
    }

    fn on_render_eye(&mut self, eye: &mut EyeTarget<'_>) -> SceneResult {
        eye.binding.clear_render_target(eye.target, WARNING)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::headless::HeadlessSurface;
    use crate::render::{BrushCache, Painter};
    use crate::window::SurfaceId;

    #[test]
    fn test_status_scene_draws_title_and_message() {
        let mut scene = StatusScene::new("VR unavailable", "OpenXR loader is not available");
        let mut surface = HeadlessSurface::new();
        let mut brushes = BrushCache::new();
        {
            let painter = Painter::new(&mut surface, SurfaceId(1), &mut brushes, 640, 480);
            let mut target = DrawTarget::Painter(painter);
            scene.on_draw(&mut target).unwrap();
        }

        let texts: Vec<&str> = surface.texts().iter().map(String::as_str).collect();
        assert_eq!(texts, vec!["VR unavailable", "OpenXR loader is not available"]);
    }
}
