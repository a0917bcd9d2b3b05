//! Software 2D path
//!
//! A 2D window draws into an off-screen surface and blits it to the window
//! once the scene is done. The rasterizer itself is an external collaborator
//! behind [`Surface2D`]; this module adds the brush cache and the frame
//! sequencing.

use super::{
    BackendKind, BackendResult, BrushHandle, Color, SharedRenderState, WindowRenderer,
};
use crate::engine::EngineError;
use crate::scene::{AttachedScene, DrawTarget};
use crate::window::SurfaceId;
use std::collections::HashMap;

/// Axis-aligned rectangle in window pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    /// Left edge
    pub x: i32,
    /// Top edge
    pub y: i32,
    /// Width
    pub width: i32,
    /// Height
    pub height: i32,
}

impl Rect {
    /// Create a rectangle
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }
}

/// Off-screen 2D drawing surface of a single window
pub trait Surface2D {
    /// Prepare an off-screen buffer of the given size for this frame
    fn begin_offscreen(&mut self, width: u32, height: u32) -> BackendResult<()>;

    /// Create a solid brush
    fn create_brush(&mut self, color: Color) -> BackendResult<BrushHandle>;

    /// Destroy a brush created by [`Self::create_brush`]
    fn delete_brush(&mut self, brush: BrushHandle);

    /// Fill a rectangle with a brush
    fn fill_rect(&mut self, rect: Rect, brush: BrushHandle);

    /// Draw a line of text
    fn draw_text(&mut self, x: i32, y: i32, text: &str, color: Color);

    /// Copy the off-screen buffer to the window
    fn blit(&mut self) -> BackendResult<()>;
}

/// Brushes keyed by owning surface and packed RGB
///
/// Lives in the shared render state, but a brush is only valid on the surface
/// that created it, so every entry records its owner.
#[derive(Debug, Default)]
pub struct BrushCache {
    brushes: HashMap<(SurfaceId, u32), BrushHandle>,
}

impl BrushCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the brush `owner` uses for `color`, creating it on first use
    pub fn get_or_create(
        &mut self,
        owner: SurfaceId,
        surface: &mut dyn Surface2D,
        color: Color,
    ) -> BackendResult<BrushHandle> {
        let key = (owner, color.to_rgb_u32());
        if let Some(brush) = self.brushes.get(&key) {
            return Ok(*brush);
        }

        let brush = surface.create_brush(color)?;
        self.brushes.insert(key, brush);
        Ok(brush)
    }

    /// Number of cached brushes across all surfaces
    pub fn len(&self) -> usize {
        self.brushes.len()
    }

    /// Number of brushes owned by one surface
    pub fn len_for(&self, owner: SurfaceId) -> usize {
        self.brushes.keys().filter(|(surface, _)| *surface == owner).count()
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.brushes.is_empty()
    }

    /// Delete the brushes `owner` created, through its own surface
    pub fn release_surface(&mut self, owner: SurfaceId, surface: &mut dyn Surface2D) {
        let mut released = 0;
        self.brushes.retain(|(brush_owner, _), brush| {
            if *brush_owner == owner {
                surface.delete_brush(*brush);
                released += 1;
                false
            } else {
                true
            }
        });
        if released > 0 {
            log::debug!("Released {} brushes of surface {:?}", released, owner);
        }
    }
}

/// Drawing API handed to scenes for 2D windows
pub struct Painter<'a> {
    surface: &'a mut dyn Surface2D,
    owner: SurfaceId,
    brushes: &'a mut BrushCache,
    width: u32,
    height: u32,
}

impl<'a> Painter<'a> {
    /// Wrap a surface and the shared brush cache
    pub fn new(
        surface: &'a mut dyn Surface2D,
        owner: SurfaceId,
        brushes: &'a mut BrushCache,
        width: u32,
        height: u32,
    ) -> Self {
        Self {
            surface,
            owner,
            brushes,
            width,
            height,
        }
    }

    /// Surface size in pixels
    pub const fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Fill the whole surface
    pub fn clear(&mut self, color: Color) {
        let full = Rect::new(0, 0, self.width as i32, self.height as i32);
        self.draw_rect(full, color);
    }

    /// Fill a rectangle
    pub fn draw_rect(&mut self, rect: Rect, color: Color) {
        match self.brushes.get_or_create(self.owner, self.surface, color) {
            Ok(brush) => self.surface.fill_rect(rect, brush),
            Err(e) => log::warn!("Failed to create brush for color {:06x}: {}", color.to_rgb_u32(), e),
        }
    }

    /// Draw text at a pixel position
    pub fn draw_text(&mut self, x: i32, y: i32, text: &str, color: Color) {
        self.surface.draw_text(x, y, text, color);
    }
}

/// Frame driver for 2D windows
pub struct PainterRenderer {
    surface: Box<dyn Surface2D>,
    id: SurfaceId,
    width: u32,
    height: u32,
}

impl PainterRenderer {
    /// Create a renderer over the window surface identified by `id`
    pub fn new(surface: Box<dyn Surface2D>, id: SurfaceId, width: u32, height: u32) -> Self {
        Self {
            surface,
            id,
            width,
            height,
        }
    }
}

impl WindowRenderer for PainterRenderer {
    fn backend(&self) -> BackendKind {
        BackendKind::Painter2D
    }

    fn render(&mut self, scene: &mut AttachedScene, shared: &mut SharedRenderState) -> Result<(), EngineError> {
        if let Err(e) = self.surface.begin_offscreen(self.width, self.height) {
            log::warn!("Skipping 2D frame: {}", e);
            return Ok(());
        }

        {
            let painter = Painter::new(self.surface.as_mut(), self.id, &mut shared.brushes, self.width, self.height);
            let mut target = DrawTarget::Painter(painter);
            scene.draw(&mut target)?;
        }

        if let Err(e) = self.surface.blit() {
            log::warn!("2D blit failed: {}", e);
        }
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }

    fn shutdown(&mut self, shared: &mut SharedRenderState) {
        shared.brushes.release_surface(self.id, self.surface.as_mut());
    }

    fn status_line(&self) -> String {
        format!("2d {}x{}", self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::headless::HeadlessSurface;
    use crate::scene::StatusScene;

    const RED: Color = Color::rgb(1.0, 0.0, 0.0);
    const GREEN: Color = Color::rgb(0.0, 1.0, 0.0);

    #[test]
    fn test_brush_cache_reuses_brushes() {
        let mut surface = HeadlessSurface::new();
        let mut cache = BrushCache::new();
        let owner = SurfaceId(1);

        let first = cache.get_or_create(owner, &mut surface, RED).unwrap();
        let second = cache.get_or_create(owner, &mut surface, RED).unwrap();
        let other = cache.get_or_create(owner, &mut surface, GREEN).unwrap();

        assert_eq!(first, second);
        assert_ne!(first, other);
        assert_eq!(surface.brushes_created(), 2);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_release_deletes_each_brush_once() {
        let mut surface = HeadlessSurface::new();
        let mut cache = BrushCache::new();
        let owner = SurfaceId(1);
        cache.get_or_create(owner, &mut surface, Color::WHITE).unwrap();
        cache.get_or_create(owner, &mut surface, Color::BLACK).unwrap();

        cache.release_surface(owner, &mut surface);
        assert!(cache.is_empty());
        assert_eq!(surface.brushes_deleted(), 2);

        cache.release_surface(owner, &mut surface);
        assert_eq!(surface.brushes_deleted(), 2);
    }

    #[test]
    fn test_surfaces_never_share_brushes() {
        let (a, b) = (SurfaceId(1), SurfaceId(2));
        let mut surface_a = HeadlessSurface::new();
        let mut surface_b = HeadlessSurface::new();
        let mut cache = BrushCache::new();

        for (owner, surface) in [(a, &mut surface_a), (b, &mut surface_b)] {
            let mut painter = Painter::new(surface, owner, &mut cache, 64, 64);
            painter.clear(RED);
        }
        {
            let mut painter = Painter::new(&mut surface_b, b, &mut cache, 64, 64);
            painter.clear(GREEN);
        }
        assert_eq!(surface_a.foreign_fills(), 0);
        assert_eq!(surface_b.foreign_fills(), 0);
        assert_eq!(cache.len_for(a), 1);
        assert_eq!(cache.len_for(b), 2);

        cache.release_surface(a, &mut surface_a);
        assert_eq!(surface_a.live_brushes(), 0);
        assert_eq!(surface_b.live_brushes(), 2);
        assert_eq!(cache.len_for(b), 2);

        cache.release_surface(b, &mut surface_b);
        assert_eq!(surface_b.live_brushes(), 0);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_closing_one_window_keeps_other_brushes() {
        let mut shared = SharedRenderState::default();
        let mut first = PainterRenderer::new(Box::new(HeadlessSurface::new()), SurfaceId(1), 320, 240);
        let mut second = PainterRenderer::new(Box::new(HeadlessSurface::new()), SurfaceId(2), 320, 240);
        let mut scene = AttachedScene::new(Box::new(StatusScene::new("status", "ok")));

        first.render(&mut scene, &mut shared).unwrap();
        second.render(&mut scene, &mut shared).unwrap();
        let second_brushes = shared.brushes.len_for(SurfaceId(2));
        assert!(second_brushes > 0);

        first.shutdown(&mut shared);
        assert_eq!(shared.brushes.len_for(SurfaceId(1)), 0);
        assert_eq!(shared.brushes.len_for(SurfaceId(2)), second_brushes);

        second.shutdown(&mut shared);
        assert!(shared.brushes.is_empty());
    }

    #[test]
    fn test_painter_clear_fills_full_surface() {
        let mut surface = HeadlessSurface::new();
        let mut cache = BrushCache::new();
        {
            let mut painter = Painter::new(&mut surface, SurfaceId(1), &mut cache, 320, 200);
            painter.clear(Color::BLACK);
        }
        assert_eq!(surface.filled_rects(), &[Rect::new(0, 0, 320, 200)]);
    }
}
