//! Event sources for the demo
//!
//! A GLFW window hosts the desktop view. When GLFW is unavailable the demo
//! runs headless for a fixed number of frames instead.

use angene_engine::prelude::*;
use angene_engine::window::WindowEventKind;
use raw_window_handle::{HasRawWindowHandle, RawWindowHandle};
use thiserror::Error;

const WM_KEYDOWN: u32 = 0x0100;

/// Host window errors
#[derive(Error, Debug)]
pub enum HostError {
    #[error("GLFW initialization failed: {0}")]
    Init(String),

    #[error("Window creation failed")]
    CreationFailed,
}

/// GLFW window feeding close, resize and key events to the engine
///
/// Closing the host window (or pressing Escape) closes every engine surface
/// listed in `surfaces`.
pub struct GlfwEventSource {
    glfw: glfw::Glfw,
    window: glfw::PWindow,
    events: glfw::GlfwReceiver<(f64, glfw::WindowEvent)>,
    desktop: SurfaceId,
    surfaces: Vec<SurfaceId>,
    closed: bool,
}

impl GlfwEventSource {
    pub fn new(title: &str, width: u32, height: u32, desktop: SurfaceId) -> Result<Self, HostError> {
        let mut glfw = glfw::init(glfw::fail_on_errors).map_err(|e| HostError::Init(format!("{:?}", e)))?;

        // Drawing goes through the engine's surfaces, not a GLFW context
        glfw.window_hint(glfw::WindowHint::ClientApi(glfw::ClientApiHint::NoApi));
        glfw.window_hint(glfw::WindowHint::Resizable(true));

        let (mut window, events) = glfw
            .create_window(width, height, title, glfw::WindowMode::Windowed)
            .ok_or(HostError::CreationFailed)?;

        window.set_key_polling(true);
        window.set_close_polling(true);
        window.set_framebuffer_size_polling(true);

        Ok(Self {
            glfw,
            window,
            events,
            desktop,
            surfaces: vec![desktop],
            closed: false,
        })
    }

    /// Native handle of the host window
    pub fn raw_handle(&self) -> RawWindowHandle {
        self.window.raw_window_handle()
    }

    /// Also close `surface` when the host window closes
    pub fn close_with_host(&mut self, surface: SurfaceId) {
        self.surfaces.push(surface);
    }

    fn close_all(&mut self, out: &mut Vec<WindowEvent>) {
        if !self.closed {
            self.closed = true;
            out.extend(self.surfaces.iter().map(|surface| WindowEvent::close(*surface)));
        }
    }
}

impl WindowEventSource for GlfwEventSource {
    fn poll_events(&mut self) -> Vec<WindowEvent> {
        self.glfw.poll_events();

        let mut out = Vec::new();
        let pending: Vec<glfw::WindowEvent> = glfw::flush_messages(&self.events).map(|(_, event)| event).collect();
        for event in pending {
            match event {
                glfw::WindowEvent::Close | glfw::WindowEvent::Key(glfw::Key::Escape, _, glfw::Action::Press, _) => {
                    self.window.set_should_close(true);
                    self.close_all(&mut out);
                }
                glfw::WindowEvent::FramebufferSize(width, height) if width > 0 && height > 0 => {
                    out.push(WindowEvent {
                        surface: self.desktop,
                        kind: WindowEventKind::Resized {
                            width: width.unsigned_abs(),
                            height: height.unsigned_abs(),
                        },
                    });
                }
                glfw::WindowEvent::Key(key, _, glfw::Action::Press, _) => {
                    let code = usize::try_from(key as i32).unwrap_or(0);
                    out.push(WindowEvent::raw(self.desktop, RawMessage::new(WM_KEYDOWN, code, 0)));
                }
                _ => {}
            }
        }

        if self.window.should_close() {
            self.close_all(&mut out);
        }
        out
    }
}

/// Headless stand-in that closes every surface after `frames` polls
pub struct FrameLimitedEvents {
    remaining: u32,
    surfaces: Vec<SurfaceId>,
}

impl FrameLimitedEvents {
    pub fn new(frames: u32, surfaces: Vec<SurfaceId>) -> Self {
        Self {
            remaining: frames,
            surfaces,
        }
    }
}

impl WindowEventSource for FrameLimitedEvents {
    fn poll_events(&mut self) -> Vec<WindowEvent> {
        if self.remaining == 0 {
            return self.surfaces.drain(..).map(WindowEvent::close).collect();
        }
        self.remaining -= 1;
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_limited_closes_once() {
        let mut events = FrameLimitedEvents::new(2, vec![SurfaceId(1), SurfaceId(2)]);
        assert!(events.poll_events().is_empty());
        assert!(events.poll_events().is_empty());
        assert_eq!(events.poll_events().len(), 2);
        assert!(events.poll_events().is_empty());
    }
}
