//! Staging render targets for swapchain images
//!
//! Runtime-owned swapchain textures are not always bindable as render targets,
//! so each eye renders into a texture the engine owns and the result is copied
//! into the swapchain image before release. One staging target exists per
//! `(swapchain index, image index)` pair; entries are created on first use and
//! kept until [`RenderTargetCache::release_all`].

use crate::render::{
    BackendResult, GraphicsBinding, RenderError, RenderTargetViewHandle, TextureDesc, TextureHandle,
};
use std::collections::HashMap;

/// Cache key: which swapchain and which of its images
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RenderTargetKey {
    /// Swapchain index, in view order
    pub swapchain: usize,
    /// Image index returned by acquire
    pub image: u32,
}

impl RenderTargetKey {
    /// Create a key
    pub const fn new(swapchain: usize, image: u32) -> Self {
        Self { swapchain, image }
    }
}

/// Staging target paired with the swapchain image it is copied into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderTargetEntry {
    /// Texture the eye renders into
    pub owned_texture: TextureHandle,
    /// View over `owned_texture`
    pub owned_view: RenderTargetViewHandle,
    /// Runtime swapchain image the result is copied into
    pub target_texture: TextureHandle,
}

/// Bounded cache of staging render targets
#[derive(Debug, Default)]
pub struct RenderTargetCache {
    entries: HashMap<RenderTargetKey, RenderTargetEntry>,
    capacity: usize,
}

impl RenderTargetCache {
    /// Cache holding at most `capacity` entries (swapchains times images)
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: HashMap::with_capacity(capacity),
            capacity,
        }
    }

    /// Maximum number of entries
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of entries created so far
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no entry has been created yet
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cached entry for `key`, if any
    pub fn get(&self, key: RenderTargetKey) -> Option<&RenderTargetEntry> {
        self.entries.get(&key)
    }

    /// Return the entry for `key`, creating its texture and view on first use
    ///
    /// # Arguments
    /// * `desc` - description matching the swapchain's size and format
    /// * `target_texture` - swapchain image this key maps to
    ///
    /// # Errors
    /// Fails when the cache is full or the binding cannot create the
    /// texture or view. A texture whose view fails is released again.
    pub fn get_or_create(
        &mut self,
        key: RenderTargetKey,
        desc: &TextureDesc,
        target_texture: TextureHandle,
        binding: &mut dyn GraphicsBinding,
    ) -> BackendResult<RenderTargetEntry> {
        if let Some(entry) = self.entries.get(&key) {
            return Ok(*entry);
        }
        if self.entries.len() >= self.capacity {
            return Err(RenderError::CapacityExceeded { capacity: self.capacity });
        }

        let owned_texture = binding.create_texture(desc)?;
        let owned_view = match binding.create_render_target_view(owned_texture) {
            Ok(view) => view,
            Err(e) => {
                binding.release_texture(owned_texture);
                return Err(e);
            }
        };

        let entry = RenderTargetEntry {
            owned_texture,
            owned_view,
            target_texture,
        };
        log::debug!(
            "Staging target for swapchain {} image {}: {}x{} texture {}",
            key.swapchain,
            key.image,
            desc.width,
            desc.height,
            owned_texture.0
        );
        self.entries.insert(key, entry);
        Ok(entry)
    }

    /// Release every owned texture and view, leaving the cache empty
    pub fn release_all(&mut self, binding: &mut dyn GraphicsBinding) {
        let mut entries: Vec<_> = self.entries.drain().collect();
        entries.sort_by_key(|(key, _)| *key);
        for (_, entry) in &entries {
            binding.release_render_target_view(entry.owned_view);
            binding.release_texture(entry.owned_texture);
        }
        if !entries.is_empty() {
            log::debug!("Released {} staging render targets", entries.len());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{HeadlessBinding, TextureFormat};

    fn binding() -> HeadlessBinding {
        let mut binding = HeadlessBinding::new();
        binding.create_device(None).unwrap();
        binding
    }

    fn desc() -> TextureDesc {
        TextureDesc::render_target(1024, 1024, TextureFormat::RGBA8_UNORM)
    }

    #[test]
    fn test_get_or_create_is_idempotent() {
        let mut binding = binding();
        let mut cache = RenderTargetCache::with_capacity(6);
        let key = RenderTargetKey::new(0, 1);

        let first = cache.get_or_create(key, &desc(), TextureHandle(900), &mut binding).unwrap();
        let second = cache.get_or_create(key, &desc(), TextureHandle(900), &mut binding).unwrap();

        assert_eq!(first, second);
        assert_eq!(cache.len(), 1);
        assert_eq!(binding.texture_creations(), 1);
    }

    #[test]
    fn test_keys_are_distinct_per_swapchain_and_image() {
        let mut binding = binding();
        let mut cache = RenderTargetCache::with_capacity(6);
        let a = cache.get_or_create(RenderTargetKey::new(0, 0), &desc(), TextureHandle(900), &mut binding).unwrap();
        let b = cache.get_or_create(RenderTargetKey::new(1, 0), &desc(), TextureHandle(901), &mut binding).unwrap();
        assert_ne!(a.owned_texture, b.owned_texture);
        assert_eq!(b.target_texture, TextureHandle(901));
    }

    #[test]
    fn test_capacity_bound() {
        let mut binding = binding();
        let mut cache = RenderTargetCache::with_capacity(1);
        cache.get_or_create(RenderTargetKey::new(0, 0), &desc(), TextureHandle(900), &mut binding).unwrap();
        let error = cache
            .get_or_create(RenderTargetKey::new(0, 1), &desc(), TextureHandle(901), &mut binding)
            .unwrap_err();
        assert_eq!(error, RenderError::CapacityExceeded { capacity: 1 });
    }

    #[test]
    fn test_failed_view_releases_texture() {
        let mut binding = binding();
        binding.set_view_creation_failure(true);
        let mut cache = RenderTargetCache::with_capacity(2);
        assert!(cache.get_or_create(RenderTargetKey::new(0, 0), &desc(), TextureHandle(900), &mut binding).is_err());
        assert!(cache.is_empty());
        assert_eq!(binding.live_textures(), 0);
    }

    #[test]
    fn test_release_all_releases_once() {
        let mut binding = binding();
        let mut cache = RenderTargetCache::with_capacity(6);
        for image in 0..3 {
            cache
                .get_or_create(RenderTargetKey::new(0, image), &desc(), TextureHandle(900), &mut binding)
                .unwrap();
        }
        assert_eq!(binding.live_textures(), 3);

        cache.release_all(&mut binding);
        cache.release_all(&mut binding);
        assert_eq!(binding.live_textures(), 0);
        assert_eq!(binding.live_views(), 0);
        let releases = binding
            .calls()
            .iter()
            .filter(|call| matches!(call, crate::render::BindingCall::ReleaseTexture(_)))
            .count();
        assert_eq!(releases, 3);
    }
}
