//! VR demo application
//!
//! Opens a desktop window with an animated 2D scene next to a VR-backed
//! window rendering a per-eye test pattern. The headset side runs against the
//! simulated OpenXR runtime and a headless graphics binding. Set
//! `ANGENE_DEMO_NO_VR=1` to watch the VR window degrade to its status scene.
//!
//! Configuration is read from `vr_demo.toml` (or `vr_demo.ron`) when present.

mod events;
mod scenes;

use angene_engine::config::Config;
use angene_engine::foundation::logging;
use angene_engine::prelude::*;
use events::{FrameLimitedEvents, GlfwEventSource};
use scenes::{EyeTestPattern, PulseScene};
use std::path::Path;

const DESKTOP_SURFACE: SurfaceId = SurfaceId(1);
const HEADSET_SURFACE: SurfaceId = SurfaceId(2);
const HEADLESS_FRAMES: u32 = 600;

fn load_config() -> EngineConfig {
    ["vr_demo.toml", "vr_demo.ron"]
        .iter()
        .map(Path::new)
        .find(|path| path.exists())
        .map_or_else(EngineConfig::default, EngineConfig::load_or_default)
}

fn headset_runtime() -> SimulatedRuntime {
    if std::env::var("ANGENE_DEMO_NO_VR").map(|v| v == "1").unwrap_or(false) {
        log::info!("Simulating a machine without an OpenXR loader");
        SimulatedRuntime::new().without_loader()
    } else {
        SimulatedRuntime::new()
    }
}

fn run() -> Result<(), EngineError> {
    let config = load_config();
    let mut engine = EngineContext::new(config)?;

    let host = match GlfwEventSource::new("Angene VR Demo", 800, 600, DESKTOP_SURFACE) {
        Ok(host) => Some(host),
        Err(e) => {
            log::warn!("No desktop window ({}); running {} headless frames", e, HEADLESS_FRAMES);
            None
        }
    };

    let mut desktop = WindowDesc::new("Angene - Desktop", 800, 600, DESKTOP_SURFACE);
    if let Some(host) = &host {
        desktop = desktop.with_raw_handle(host.raw_handle());
    }
    engine.add_painter_window(desktop, Box::new(HeadlessSurface::new()), Box::new(PulseScene::new()));

    let headset = engine.open_vr_window(
        WindowDesc::new("Angene - Headset", 640, 360, HEADSET_SURFACE),
        headset_runtime(),
        Box::new(HeadlessBinding::new()),
        Box::new(EyeTestPattern::new()),
        Box::new(HeadlessSurface::new()),
    );
    if let Some(window) = engine.window(headset) {
        log::info!("Headset window: {}", window.status_line());
    }

    match host {
        Some(mut host) => {
            host.close_with_host(HEADSET_SURFACE);
            engine.run(&mut host)
        }
        None => {
            let mut events = FrameLimitedEvents::new(HEADLESS_FRAMES, vec![DESKTOP_SURFACE, HEADSET_SURFACE]);
            engine.run(&mut events)
        }
    }
}

fn main() {
    logging::init_with_level(logging::LevelFilter::Info);
    logging::install_crash_handler();

    log::info!("Starting Angene VR demo");
    match run() {
        Ok(()) => log::info!("VR demo finished successfully"),
        Err(e) => {
            logging::report_error_chain("VR demo failed", &e);
            std::process::exit(1);
        }
    }
}
