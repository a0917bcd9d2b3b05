//! Engine context and main loop
//!
//! [`EngineContext`] owns everything the loop touches: the window registry,
//! the frame clock, the fixed-step scheduler and the render state shared by
//! all windows. Nothing here is global, and the context is not `Send`, so
//! rendering and VR handles stay on the thread that runs the loop.

use crate::config::ConfigError;
use crate::core::config::EngineConfig;
use crate::core::scheduler::FrameScheduler;
use crate::foundation::logging::{print_banner, report_error_chain};
use crate::foundation::time::{FrameClock, Stopwatch};
use crate::render::{
    BackendKind, DeviceRenderer, GraphicsBinding, PainterRenderer, RenderError, SharedRenderState, Surface2D,
    WindowRenderer,
};
use crate::scene::{SceneContract, SceneError, StatusScene};
use crate::window::{SurfaceId, Window, WindowDesc, WindowEvent, WindowEventKind, WindowEventSource, WindowId};
use crate::xr::{VrError, VrWindowRenderer, XrRuntime};
use slotmap::SlotMap;
use std::thread::JoinHandle;
use thiserror::Error;

/// Main engine context
///
/// Windows are registered up front (or while running, from scene code that
/// holds the context) and ticked together: events first, then fixed updates,
/// then one render per window.
pub struct EngineContext {
    config: EngineConfig,
    windows: SlotMap<WindowId, Window>,
    scheduler: FrameScheduler,
    clock: FrameClock,
    shared: SharedRenderState,
    running: bool,
    last_diagnostics: f64,
}

impl EngineContext {
    /// Create a new engine context
    ///
    /// # Errors
    /// Returns [`EngineError::Config`] when the configuration does not validate.
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        log::info!("Initializing engine...");
        config.validate()?;

        let scheduler = FrameScheduler::with_target_fps(config.target_fps, config.max_frame_delta);
        Ok(Self {
            config,
            windows: SlotMap::with_key(),
            scheduler,
            clock: FrameClock::new(),
            shared: SharedRenderState::default(),
            running: true,
            last_diagnostics: 0.0,
        })
    }

    /// Engine configuration
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Register a window with an already constructed renderer
    pub fn add_window(
        &mut self,
        desc: WindowDesc,
        renderer: Box<dyn WindowRenderer>,
        scene: Box<dyn SceneContract>,
    ) -> WindowId {
        log::info!(
            "Adding {} window '{}' ({}x{}{})",
            renderer.backend().as_str(),
            desc.title,
            desc.width,
            desc.height,
            if desc.raw_handle.is_some() { ", native handle" } else { "" }
        );
        self.windows.insert(Window::new(desc, renderer, scene))
    }

    /// Register a 2D window drawn through `surface`
    pub fn add_painter_window(
        &mut self,
        desc: WindowDesc,
        surface: Box<dyn Surface2D>,
        scene: Box<dyn SceneContract>,
    ) -> WindowId {
        let renderer = PainterRenderer::new(surface, desc.surface, desc.width, desc.height);
        self.add_window(desc, Box::new(renderer), scene)
    }

    /// Register an OpenGL or Direct3D 11 window
    ///
    /// # Errors
    /// Returns [`EngineError::Render`] when the device or back buffer cannot be
    /// created.
    pub fn add_device_window(
        &mut self,
        desc: WindowDesc,
        backend: BackendKind,
        binding: Box<dyn GraphicsBinding>,
        scene: Box<dyn SceneContract>,
    ) -> Result<WindowId, EngineError> {
        if backend.is_vr() || backend == BackendKind::Painter2D {
            return Err(EngineError::InitializationFailed(format!(
                "{} is not a device backend",
                backend.as_str()
            )));
        }
        let renderer = DeviceRenderer::new(backend, binding, desc.width, desc.height)?;
        Ok(self.add_window(desc, Box::new(renderer), scene))
    }

    /// Register a VR-backed window, degrading to 2D when VR is unavailable
    ///
    /// The session is brought up immediately. On any bring-up failure the
    /// window is still created, but it draws a [`StatusScene`] describing the
    /// failure onto `fallback_surface` and `scene` is dropped.
    pub fn open_vr_window<R: XrRuntime + 'static>(
        &mut self,
        desc: WindowDesc,
        runtime: R,
        binding: Box<dyn GraphicsBinding>,
        scene: Box<dyn SceneContract>,
        fallback_surface: Box<dyn Surface2D>,
    ) -> WindowId {
        match VrWindowRenderer::try_new(runtime, binding, self.config.vr.clone()) {
            Ok(renderer) => self.add_window(desc, Box::new(renderer), scene),
            Err(e) => {
                log::warn!("VR: {} (continuing in 2D mode)", e);
                let status = StatusScene::new(format!("{} (VR unavailable)", desc.title), e.to_string());
                self.add_painter_window(desc, fallback_surface, Box::new(status))
            }
        }
    }

    /// Replace the scene attached to a window
    ///
    /// Returns `false` if the window no longer exists.
    pub fn set_scene(&mut self, id: WindowId, scene: Box<dyn SceneContract>) -> bool {
        match self.windows.get_mut(id) {
            Some(window) => {
                window.set_scene(scene);
                true
            }
            None => false,
        }
    }

    /// Look up a window
    pub fn window(&self, id: WindowId) -> Option<&Window> {
        self.windows.get(id)
    }

    /// Look up a window mutably
    pub fn window_mut(&mut self, id: WindowId) -> Option<&mut Window> {
        self.windows.get_mut(id)
    }

    /// Number of open windows
    pub fn window_count(&self) -> usize {
        self.windows.len()
    }

    /// Ids of every open window
    pub fn window_ids(&self) -> Vec<WindowId> {
        self.windows.keys().collect()
    }

    /// Find the window drawing to a native surface
    pub fn find_by_surface(&self, surface: SurfaceId) -> Option<WindowId> {
        self.windows
            .iter()
            .find(|(_, window)| window.surface() == surface)
            .map(|(id, _)| id)
    }

    /// Render state shared across windows
    pub const fn shared(&self) -> &SharedRenderState {
        &self.shared
    }

    /// Fixed-step scheduler
    pub const fn scheduler(&self) -> &FrameScheduler {
        &self.scheduler
    }

    /// Whether the loop keeps running
    pub const fn is_running(&self) -> bool {
        self.running
    }

    /// Stop the loop after the current tick
    pub fn quit(&mut self) {
        log::info!("Quit requested");
        self.running = false;
    }

    /// Close one window: quit hook, renderer shutdown, then removal
    pub fn close_window(&mut self, id: WindowId) -> bool {
        match self.windows.remove(id) {
            Some(mut window) => {
                log::info!("Closing window '{}'", window.title());
                window.close(&mut self.shared);
                true
            }
            None => false,
        }
    }

    /// Close every window
    pub fn shutdown(&mut self) {
        for id in self.window_ids() {
            self.close_window(id);
        }
    }

    /// Advance the engine by `dt` seconds
    ///
    /// Drains `events`, runs as many fixed updates as the accumulator allows
    /// and renders each window once. Returns the number of fixed steps.
    ///
    /// # Errors
    /// Scene errors from fixed updates and render failures that the window's
    /// renderer does not recover from itself.
    pub fn tick(&mut self, dt: f64, events: Vec<WindowEvent>) -> Result<u32, EngineError> {
        for event in events {
            self.dispatch_event(event);
        }

        let windows = &mut self.windows;
        let steps = self.scheduler.tick(dt, |step| {
            for window in windows.values_mut() {
                window.scene_mut().fixed_update(step)?;
            }
            Ok::<(), SceneError>(())
        })?;

        self.shared.frame_index += 1;
        self.shared.time += dt.max(0.0);
        for window in self.windows.values_mut() {
            window.render(&mut self.shared)?;
        }

        self.log_diagnostics();
        Ok(steps)
    }

    /// Run the main loop until [`quit`](Self::quit) or until the last window closes
    ///
    /// # Errors
    /// [`EngineError::NoWindows`] if nothing is registered. Any fatal tick
    /// error is logged with its cause chain, every window is closed, and the
    /// error is returned.
    pub fn run(&mut self, events: &mut dyn WindowEventSource) -> Result<(), EngineError> {
        if self.windows.is_empty() {
            return Err(EngineError::NoWindows);
        }

        print_banner(self.config.quiet);
        log::info!("Starting main loop with {} window(s)...", self.windows.len());

        self.running = true;
        self.clock.tick();
        while self.running && !self.windows.is_empty() {
            let frame = Stopwatch::start_new();
            let dt = self.clock.tick();

            if let Err(e) = self.tick(dt, events.poll_events()) {
                report_error_chain("Engine loop failed", &e);
                self.shutdown();
                return Err(e);
            }

            if let Some(sleep) = self.scheduler.pacing_sleep(frame.elapsed(), self.config.pacing_factor) {
                std::thread::sleep(sleep);
            }
        }

        self.shutdown();
        log::info!("Engine shutdown complete");
        Ok(())
    }

    /// Run user work on a named secondary thread
    ///
    /// The closure must be `Send`, so it cannot capture the context or any
    /// window, renderer or VR handle.
    ///
    /// # Errors
    /// Returns [`EngineError::InitializationFailed`] if the thread cannot be spawned.
    pub fn spawn_background<F, T>(&self, name: &str, work: F) -> Result<JoinHandle<T>, EngineError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        std::thread::Builder::new()
            .name(name.to_string())
            .spawn(work)
            .map_err(|e| EngineError::InitializationFailed(format!("Background thread '{}': {}", name, e)))
    }

    fn dispatch_event(&mut self, event: WindowEvent) {
        let Some(id) = self.find_by_surface(event.surface) else {
            log::debug!("Dropping event for unknown surface {:?}", event.surface);
            return;
        };

        match event.kind {
            WindowEventKind::CloseRequested => {
                self.close_window(id);
            }
            WindowEventKind::Resized { width, height } => {
                if let Some(window) = self.windows.get_mut(id) {
                    window.resize(width, height);
                }
            }
            WindowEventKind::Raw(message) => {
                if let Some(window) = self.windows.get_mut(id) {
                    window.scene_mut().message(event.surface, &message);
                }
            }
        }
    }

    fn log_diagnostics(&mut self) {
        let interval = self.config.diagnostics_interval_secs;
        if interval <= 0.0 || self.shared.time - self.last_diagnostics < interval {
            return;
        }
        self.last_diagnostics = self.shared.time;

        log::info!(
            "Runtime: frame {} t={:.1}s windows={} fixed_steps={}",
            self.shared.frame_index,
            self.shared.time,
            self.windows.len(),
            self.scheduler.total_steps()
        );
        for window in self.windows.values() {
            log::info!("  {}", window.status_line());
        }
    }
}

/// Engine-level errors
#[derive(Error, Debug)]
pub enum EngineError {
    /// Engine initialization failed
    #[error("Engine initialization failed: {0}")]
    InitializationFailed(String),

    /// `run` was called without any windows
    #[error("No windows to run")]
    NoWindows,

    /// A scene hook failed
    #[error("Scene error: {0}")]
    Scene(#[from] SceneError),

    /// Rendering failed
    #[error("Rendering error: {0}")]
    Render(#[from] RenderError),

    /// The VR pipeline failed
    #[error("VR error: {0}")]
    Vr(#[from] VrError),

    /// Configuration is invalid
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{HeadlessBinding, HeadlessSurface};
    use crate::scene::{SceneCapabilities, SceneResult};
    use crate::window::{EventQueue, RawMessage};
    use crate::xr::SimulatedRuntime;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct Counts {
        updates: u32,
        quits: u32,
        messages: u32,
        eyes: u32,
    }

    struct CountingScene {
        counts: Rc<RefCell<Counts>>,
        fail_update: bool,
    }

    impl SceneContract for CountingScene {
        fn capabilities(&self) -> SceneCapabilities {
            SceneCapabilities::APPLICATION_QUIT | SceneCapabilities::MESSAGE_HOOK | SceneCapabilities::RENDER_EYE
        }

        fn update(&mut self, _dt: f64) -> SceneResult {
            if self.fail_update {
                return Err(SceneError::Custom("update failed".to_string()));
            }
            self.counts.borrow_mut().updates += 1;
            Ok(())
        }

        fn on_render_eye(&mut self, _eye: &mut crate::scene::EyeTarget<'_>) -> SceneResult {
            self.counts.borrow_mut().eyes += 1;
            Ok(())
        }

        fn on_application_quit(&mut self) {
            self.counts.borrow_mut().quits += 1;
        }

        fn on_message(&mut self, _surface: SurfaceId, _message: &RawMessage) {
            self.counts.borrow_mut().messages += 1;
        }
    }

    fn counting_scene() -> (Box<dyn SceneContract>, Rc<RefCell<Counts>>) {
        let counts = Rc::new(RefCell::new(Counts::default()));
        let scene = CountingScene {
            counts: Rc::clone(&counts),
            fail_update: false,
        };
        (Box::new(scene), counts)
    }

    fn quiet_engine() -> EngineContext {
        EngineContext::new(EngineConfig::new().with_quiet(true)).unwrap()
    }

    fn add_2d(engine: &mut EngineContext, surface: u64, scene: Box<dyn SceneContract>) -> WindowId {
        engine.add_painter_window(
            WindowDesc::new("2d", 320, 240, SurfaceId(surface)),
            Box::new(HeadlessSurface::new()),
            scene,
        )
    }

    #[test]
    fn test_large_delta_capped_across_windows() {
        let mut engine = quiet_engine();
        let (scene, counts) = counting_scene();
        add_2d(&mut engine, 1, scene);

        engine.tick(0.016, Vec::new()).unwrap();
        engine.tick(0.016, Vec::new()).unwrap();
        let before = counts.borrow().updates;
        let steps = engine.tick(0.2, Vec::new()).unwrap();

        assert!(steps <= 6, "got {} steps", steps);
        assert_eq!(counts.borrow().updates - before, steps);
    }

    #[test]
    fn test_close_runs_quit_hook_and_removes_window() {
        let mut engine = quiet_engine();
        let (scene, counts) = counting_scene();
        add_2d(&mut engine, 1, scene);

        engine.tick(0.05, Vec::new()).unwrap();
        engine.tick(0.0, vec![WindowEvent::close(SurfaceId(1))]).unwrap();

        assert_eq!(engine.window_count(), 0);
        assert_eq!(counts.borrow().quits, 1);
    }

    #[test]
    fn test_run_ends_when_last_window_closes() {
        let mut engine = quiet_engine();
        let (scene, counts) = counting_scene();
        add_2d(&mut engine, 3, scene);

        let mut events = EventQueue::new();
        events.push(WindowEvent::raw(SurfaceId(3), RawMessage::new(0x0100, 65, 0)));
        events.push(WindowEvent::close(SurfaceId(3)));

        engine.run(&mut events).unwrap();
        assert_eq!(engine.window_count(), 0);
        assert_eq!(counts.borrow().messages, 1);
    }

    #[test]
    fn test_run_without_windows_fails() {
        let mut engine = quiet_engine();
        let mut events = EventQueue::new();
        assert!(matches!(engine.run(&mut events), Err(EngineError::NoWindows)));
    }

    #[test]
    fn test_events_for_unknown_surface_ignored() {
        let mut engine = quiet_engine();
        let (scene, _) = counting_scene();
        add_2d(&mut engine, 1, scene);

        engine.tick(0.0, vec![WindowEvent::close(SurfaceId(99))]).unwrap();
        assert_eq!(engine.window_count(), 1);
    }

    #[test]
    fn test_resize_event_updates_window() {
        let mut engine = quiet_engine();
        let (scene, _) = counting_scene();
        let id = add_2d(&mut engine, 1, scene);

        let resize = WindowEvent {
            surface: SurfaceId(1),
            kind: WindowEventKind::Resized { width: 640, height: 480 },
        };
        engine.tick(0.0, vec![resize]).unwrap();
        assert_eq!(engine.window(id).unwrap().size(), (640, 480));
    }

    #[test]
    fn test_vr_window_renders_both_eyes() {
        let mut engine = quiet_engine();
        let (scene, counts) = counting_scene();
        let id = engine.open_vr_window(
            WindowDesc::new("vr", 800, 600, SurfaceId(2)),
            SimulatedRuntime::new(),
            Box::new(HeadlessBinding::new()),
            scene,
            Box::new(HeadlessSurface::new()),
        );

        assert!(engine.window(id).unwrap().is_vr());
        engine.tick(0.05, Vec::new()).unwrap();
        assert_eq!(counts.borrow().eyes, 2);

        engine.close_window(id);
        assert_eq!(counts.borrow().quits, 1);
    }

    #[test]
    fn test_vr_window_falls_back_to_status_scene() {
        let mut engine = quiet_engine();
        let (scene, counts) = counting_scene();
        let id = engine.open_vr_window(
            WindowDesc::new("vr", 800, 600, SurfaceId(2)),
            SimulatedRuntime::new().without_loader(),
            Box::new(HeadlessBinding::new()),
            scene,
            Box::new(HeadlessSurface::new()),
        );

        let window = engine.window(id).unwrap();
        assert!(!window.is_vr());
        assert_eq!(window.backend(), BackendKind::Painter2D);

        engine.tick(0.05, Vec::new()).unwrap();
        assert_eq!(counts.borrow().updates, 0);
        assert!(engine.window(id).unwrap().scene_started());
    }

    #[test]
    fn test_scene_error_is_fatal_to_tick() {
        let mut engine = quiet_engine();
        let counts = Rc::new(RefCell::new(Counts::default()));
        add_2d(
            &mut engine,
            1,
            Box::new(CountingScene {
                counts,
                fail_update: true,
            }),
        );

        assert!(matches!(engine.tick(0.05, Vec::new()), Err(EngineError::Scene(_))));
    }

    #[test]
    fn test_set_scene_restarts_scene() {
        let mut engine = quiet_engine();
        let (scene, _) = counting_scene();
        let id = add_2d(&mut engine, 1, scene);
        engine.tick(0.05, Vec::new()).unwrap();
        assert!(engine.window(id).unwrap().scene_started());

        let (replacement, counts) = counting_scene();
        assert!(engine.set_scene(id, replacement));
        assert!(!engine.window(id).unwrap().scene_started());

        engine.tick(0.05, Vec::new()).unwrap();
        assert!(counts.borrow().updates > 0);
    }

    #[test]
    fn test_device_window_rejects_non_device_backend() {
        let mut engine = quiet_engine();
        let (scene, _) = counting_scene();
        let result = engine.add_device_window(
            WindowDesc::new("gl", 320, 240, SurfaceId(4)),
            BackendKind::OpenXr,
            Box::new(HeadlessBinding::new()),
            scene,
        );
        assert!(matches!(result, Err(EngineError::InitializationFailed(_))));
    }

    #[test]
    fn test_spawn_background_runs_on_named_thread() {
        let engine = quiet_engine();
        let handle = engine
            .spawn_background("loader", || std::thread::current().name().map(str::to_string))
            .unwrap();
        assert_eq!(handle.join().unwrap().as_deref(), Some("loader"));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = EngineConfig::new().with_target_fps(0);
        assert!(matches!(EngineContext::new(config), Err(EngineError::Config(_))));
    }
}
