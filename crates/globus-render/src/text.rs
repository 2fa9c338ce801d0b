//! Shared text renderers keyed by font.

use std::rc::Rc;

use globus_math::Color;
use rustc_hash::FxHashMap;

use crate::RenderBackend;

/// Draws strings in one font through the backend and estimates their bounds.
#[derive(Debug, PartialEq)]
pub struct TextRenderer {
    font: String,
    size: u32,
}

impl TextRenderer {
    pub fn new(font: impl Into<String>, size: u32) -> Self {
        Self {
            font: font.into(),
            size: size.max(1),
        }
    }

    pub fn font(&self) -> &str {
        &self.font
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    /// Width and height in pixels of `text` on one line.
    pub fn bounds(&self, text: &str) -> (f64, f64) {
        let size = f64::from(self.size);
        (text.chars().count() as f64 * size * 0.6, size)
    }

    pub fn draw(&self, gl: &mut dyn RenderBackend, text: &str, x: f64, y: f64, color: Color) {
        gl.draw_text(text, x, y, color);
    }
}

/// Text renderers shared across shapes and frames, one per font.
#[derive(Debug, Default)]
pub struct TextRendererCache {
    renderers: FxHashMap<(String, u32), Rc<TextRenderer>>,
}

impl TextRendererCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, font: &str, size: u32) -> Option<Rc<TextRenderer>> {
        self.renderers.get(&(font.to_owned(), size)).cloned()
    }

    pub fn get_or_create(&mut self, font: &str, size: u32) -> Rc<TextRenderer> {
        Rc::clone(
            self.renderers
                .entry((font.to_owned(), size))
                .or_insert_with(|| Rc::new(TextRenderer::new(font, size))),
        )
    }

    pub fn remove(&mut self, font: &str, size: u32) -> Option<Rc<TextRenderer>> {
        self.renderers.remove(&(font.to_owned(), size))
    }

    pub fn len(&self) -> usize {
        self.renderers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.renderers.is_empty()
    }

    pub fn clear(&mut self) {
        self.renderers.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_or_create_shares_renderer() {
        let mut cache = TextRendererCache::new();
        let a = cache.get_or_create("Arial", 12);
        let b = cache.get_or_create("Arial", 12);
        assert!(Rc::ptr_eq(&a, &b));
        cache.get_or_create("Arial", 14);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_bounds_scale_with_length() {
        let r = TextRenderer::new("Mono", 10);
        assert_eq!(r.bounds("abcd"), (24.0, 10.0));
    }
}
