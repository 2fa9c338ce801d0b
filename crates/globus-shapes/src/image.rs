//! RGBA images uploaded as textures on first use.

use std::rc::Rc;

use globus_render::{DrawContext, GpuResource, RenderError, TextureId};

use crate::error::invalid;
use crate::ShapeError;

/// RGBA pixels identified by `key` in the GPU resource cache.
#[derive(Clone, Debug, PartialEq)]
pub struct ImageSource {
    key: String,
    width: u32,
    height: u32,
    rgba: Rc<[u8]>,
}

impl ImageSource {
    pub fn new(key: impl Into<String>, width: u32, height: u32, rgba: Rc<[u8]>) -> Result<Self, ShapeError> {
        if width == 0 || height == 0 {
            return Err(invalid(format!("image dimensions must be positive, got {width}x{height}")));
        }
        let expected = width as usize * height as usize * 4;
        if rgba.len() != expected {
            return Err(invalid(format!(
                "image of {width}x{height} needs {expected} bytes, got {}",
                rgba.len()
            )));
        }
        Ok(Self {
            key: key.into(),
            width,
            height,
            rgba,
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// The image's texture, uploaded on first use and then served from the
    /// GPU resource cache under `category`.
    pub fn texture(&self, dc: &DrawContext, category: &'static str) -> Result<TextureId, RenderError> {
        let cache = dc.gpu_resource_cache();
        if let Some(GpuResource::Texture { id, .. }) = cache.borrow_mut().get(&self.key) {
            return Ok(id);
        }
        let id = dc.gl()?.create_texture(self.width, self.height, &self.rgba);
        tracing::debug!(key = %self.key, width = self.width, height = self.height, category, "uploaded image texture");
        cache.borrow_mut().put(
            &self.key,
            GpuResource::Texture {
                id,
                width: self.width,
                height: self.height,
            },
            category,
            self.rgba.len(),
        );
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;
    use globus_render::Command;

    /// Pixel data must match the dimensions.
    #[test]
    fn test_dimensions_checked() {
        assert!(ImageSource::new("a", 0, 1, Rc::from(Vec::new())).is_err());
        assert!(ImageSource::new("a", 1, 1, Rc::from(vec![0u8; 3])).is_err());
        assert!(ImageSource::new("a", 1, 1, Rc::from(vec![0u8; 4])).is_ok());
    }

    /// The second request hits the cache instead of uploading again.
    #[test]
    fn test_texture_uploaded_once() {
        let f = test_support::frame();
        let image = ImageSource::new("tile", 2, 1, Rc::from(vec![7u8; 8])).unwrap();
        let a = image.texture(&f.dc, "Test").unwrap();
        let b = image.texture(&f.dc, "Test").unwrap();
        assert_eq!(a, b);
        let uploads = f
            .gl
            .borrow()
            .commands()
            .iter()
            .filter(|c| matches!(c, Command::CreateTexture { .. }))
            .count();
        assert_eq!(uploads, 1);
        assert_eq!(f.dc.gpu_resource_cache().borrow().used_capacity(), 8);
    }
}
