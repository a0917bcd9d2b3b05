//! Demo scenes

use angene_engine::prelude::*;

const WM_KEYDOWN: u32 = 0x0100;
const KEY_SPACE: usize = 0x20;

/// Desktop scene with an animated clear colour
///
/// Space pauses and resumes the animation.
pub struct PulseScene {
    time: f64,
    paused: bool,
    frames_drawn: u64,
}

impl PulseScene {
    pub fn new() -> Self {
        Self {
            time: 0.0,
            paused: false,
            frames_drawn: 0,
        }
    }

    /// Background colour at the current animation time
    pub fn background(&self) -> Color {
        let phase = self.time as f32;
        Color::rgb(
            0.5 + 0.5 * phase.sin(),
            0.5 + 0.5 * (phase * 0.7 + 2.0).sin(),
            0.5 + 0.5 * (phase * 1.3 + 4.0).sin(),
        )
    }

    pub const fn is_paused(&self) -> bool {
        self.paused
    }
}

impl SceneContract for PulseScene {
    fn capabilities(&self) -> SceneCapabilities {
        SceneCapabilities::DRAW | SceneCapabilities::MESSAGE_HOOK | SceneCapabilities::APPLICATION_QUIT
    }

    fn start(&mut self) -> SceneResult {
        log::info!("Pulse scene started");
        Ok(())
    }

    fn update(&mut self, dt: f64) -> SceneResult {
        if !self.paused {
            self.time += dt;
        }
        Ok(())
    }

    fn on_draw(&mut self, target: &mut DrawTarget<'_>) -> SceneResult {
        let background = self.background();
        match target {
            DrawTarget::Painter(painter) => {
                let (width, height) = painter.size();
                painter.clear(background);

                // Sweep bar across the bottom edge
                let bar_width = (width / 8).max(1);
                let travel = width.saturating_sub(bar_width).max(1);
                let x = ((self.time * 120.0) as u32 % travel) as i32;
                painter.draw_rect(
                    Rect::new(x, height as i32 - 24, bar_width as i32, 16),
                    Color::WHITE,
                );
                painter.draw_text(16, 16, &format!("t = {:.1}s", self.time), Color::BLACK);
            }
            DrawTarget::Device { binding, target, .. } => {
                binding.clear_render_target(*target, background)?;
            }
        }
        self.frames_drawn += 1;
        Ok(())
    }

    fn on_application_quit(&mut self) {
        log::info!("Pulse scene closing after {} frames", self.frames_drawn);
    }

    fn on_message(&mut self, _surface: SurfaceId, message: &RawMessage) {
        if message.message == WM_KEYDOWN && message.wparam == KEY_SPACE {
            self.paused = !self.paused;
            log::info!("Animation {}", if self.paused { "paused" } else { "resumed" });
        }
    }
}

/// Per-eye test pattern for the headset
///
/// Each eye is cleared to a colour derived from the translation of its view
/// matrix, so a swapped or duplicated eye is obvious at a glance.
pub struct EyeTestPattern {
    time: f64,
}

impl EyeTestPattern {
    pub const fn new() -> Self {
        Self { time: 0.0 }
    }
}

/// Test-pattern colour for a view matrix
///
/// The left eye sits at negative x, so its view translation is positive and
/// it comes out red; the right eye comes out blue.
pub fn eye_color(view: &Mat4, time: f64) -> Color {
    let offset = view[(0, 3)];
    let side = (offset * 20.0).clamp(-1.0, 1.0);
    let pulse = 0.15 * (time as f32 * 2.0).sin().abs();
    Color::rgb(side.max(0.0), pulse, (-side).max(0.0))
}

impl SceneContract for EyeTestPattern {
    fn capabilities(&self) -> SceneCapabilities {
        SceneCapabilities::RENDER_EYE
    }

    fn update(&mut self, dt: f64) -> SceneResult {
        self.time += dt;
        Ok(())
    }

    fn on_render_eye(&mut self, eye: &mut EyeTarget<'_>) -> SceneResult {
        let color = eye_color(&eye.view, self.time);
        log::trace!(
            "Eye {} {}x{} -> ({:.2}, {:.2}, {:.2})",
            eye.eye_index,
            eye.width,
            eye.height,
            color.r,
            color.g,
            color.b
        );
        eye.binding.clear_render_target(eye.target, color)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use angene_engine::foundation::math::pose_to_view_matrix;
    use approx::assert_relative_eq;

    #[test]
    fn test_eye_colors_differ_per_eye() {
        let left = pose_to_view_matrix(&Pose::new(Quat::identity(), Vec3::new(-0.032, 0.0, 0.0)));
        let right = pose_to_view_matrix(&Pose::new(Quat::identity(), Vec3::new(0.032, 0.0, 0.0)));

        let left_color = eye_color(&left, 0.0);
        let right_color = eye_color(&right, 0.0);
        assert!(left_color.r > 0.5 && left_color.b < 0.01);
        assert!(right_color.b > 0.5 && right_color.r < 0.01);
    }

    #[test]
    fn test_space_toggles_pause() {
        let mut scene = PulseScene::new();
        scene.update(0.5).unwrap();
        scene.on_message(SurfaceId(1), &RawMessage::new(WM_KEYDOWN, KEY_SPACE, 0));
        assert!(scene.is_paused());

        let before = scene.background();
        scene.update(0.5).unwrap();
        let after = scene.background();
        assert_relative_eq!(before.r, after.r);
        assert_relative_eq!(before.g, after.g);
    }
}
