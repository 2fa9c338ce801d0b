//! Pick results and the per-renderer bookkeeping that maps pick colors back to
//! the objects drawn with them.

use std::sync::atomic::{AtomicU64, Ordering};

use glam::DVec2;
use globus_math::{Position, Rect};
use rustc_hash::FxHashMap;

use crate::{DrawContext, RenderError};

static NEXT_OBJECT_ID: AtomicU64 = AtomicU64::new(1);

/// Stable identity of a pickable object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub u64);

impl ObjectId {
    /// A process-unique id.
    pub fn next() -> Self {
        Self(NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Identity of the layer a renderable belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LayerId(pub u64);

/// An object found under the pick point or inside the pick rectangle.
#[derive(Clone, Debug, PartialEq)]
pub struct PickedObject {
    pub color_code: u32,
    pub object: ObjectId,
    /// Short type name of the picked object, e.g. `"Box"` or `"Path"`.
    pub kind: &'static str,
    pub position: Option<Position>,
    pub layer: Option<LayerId>,
    /// Set on the object whose color was read under the pick point.
    pub on_top: bool,
}

impl PickedObject {
    pub fn new(color_code: u32, object: ObjectId, kind: &'static str) -> Self {
        Self {
            color_code,
            object,
            kind,
            position: None,
            layer: None,
            on_top: false,
        }
    }

    pub fn with_position(mut self, position: Position) -> Self {
        self.position = Some(position);
        self
    }

    pub fn with_layer(mut self, layer: Option<LayerId>) -> Self {
        self.layer = layer;
        self
    }
}

/// Append-only list of picked objects for one frame.
#[derive(Clone, Debug, Default)]
pub struct PickedObjectList {
    objects: Vec<PickedObject>,
}

impl PickedObjectList {
    /// Append `object`. An on-top object displaces any earlier one, since it
    /// was resolved after everything already in the list was drawn.
    pub fn add(&mut self, object: PickedObject) {
        if object.on_top {
            for o in &mut self.objects {
                o.on_top = false;
            }
        }
        self.objects.push(object);
    }

    /// The object flagged as on top, or else the last one added.
    pub fn top_picked_object(&self) -> Option<&PickedObject> {
        self.objects
            .iter()
            .find(|o| o.on_top)
            .or_else(|| self.objects.last())
    }

    pub fn contains(&self, object: ObjectId) -> bool {
        self.objects.iter().any(|o| o.object == object)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PickedObject> {
        self.objects.iter()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn clear(&mut self) {
        self.objects.clear();
    }
}

/// Collects the pick color assigned to each object a renderer draws during a
/// pick pass, then resolves framebuffer readback into [`PickedObject`]s.
#[derive(Debug, Default)]
pub struct PickSupport {
    candidates: FxHashMap<u32, PickedObject>,
}

impl PickSupport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear_pick_list(&mut self) {
        self.candidates.clear();
    }

    pub fn add_pickable_object(&mut self, object: PickedObject) {
        self.candidates.insert(object.color_code, object);
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Read the color under `pick_point` and return the candidate drawn with
    /// it, if any, without recording it.
    pub fn top_object(
        &self,
        dc: &mut DrawContext,
        pick_point: DVec2,
    ) -> Result<Option<PickedObject>, RenderError> {
        if self.candidates.is_empty() {
            return Ok(None);
        }
        let code = dc.pick_color_at_point(pick_point)?;
        Ok(code.and_then(|c| self.candidates.get(&c).cloned()))
    }

    /// Resolve the object under `pick_point` into the draw context's picked
    /// objects, and every candidate inside the pick rectangle into its
    /// objects-in-rectangle list. Clears the candidates.
    pub fn resolve_pick(
        &mut self,
        dc: &mut DrawContext,
        pick_point: Option<DVec2>,
        layer: Option<LayerId>,
    ) -> Result<Option<PickedObject>, RenderError> {
        let mut picked = None;
        if let Some(point) = pick_point
            && let Some(mut object) = self.top_object(dc, point)?
        {
            if layer.is_some() {
                object.layer = layer;
            }
            object.on_top = true;
            dc.add_picked_object(object.clone());
            picked = Some(object);
        }
        if let Some(rect) = dc.pick_rectangle() {
            self.resolve_rectangle(dc, rect, layer)?;
        }
        self.clear_pick_list();
        Ok(picked)
    }

    fn resolve_rectangle(
        &self,
        dc: &mut DrawContext,
        rect: Rect,
        layer: Option<LayerId>,
    ) -> Result<(), RenderError> {
        if self.candidates.is_empty() {
            return Ok(());
        }
        let codes = dc.pick_colors_in_rectangle(rect, None)?;
        for code in codes {
            if let Some(object) = self.candidates.get(&code) {
                let mut object = object.clone();
                if layer.is_some() {
                    object.layer = layer;
                }
                dc.add_object_in_pick_rectangle(object);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HeadlessBackend;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_object_ids_unique() {
        let a = ObjectId::next();
        let b = ObjectId::next();
        assert_ne!(a, b);
    }

    /// The on-top object wins over the most recently added one.
    #[test]
    fn test_top_picked_object() {
        let mut list = PickedObjectList::default();
        assert!(list.top_picked_object().is_none());
        let a = PickedObject::new(1, ObjectId(1), "A");
        let mut b = PickedObject::new(2, ObjectId(2), "B");
        list.add(a.clone());
        assert_eq!(list.top_picked_object(), Some(&a));
        b.on_top = true;
        list.add(b.clone());
        list.add(PickedObject::new(3, ObjectId(3), "C"));
        assert_eq!(list.top_picked_object(), Some(&b));
        assert!(list.contains(ObjectId(3)));
    }

    /// The object resolved under the pick point is flagged on top, and a
    /// later resolution displaces it.
    #[test]
    fn test_resolve_pick_marks_object_on_top() {
        let gl = Rc::new(RefCell::new(HeadlessBackend::new(10, 10)));
        let mut dc = DrawContext::default();
        dc.initialize(gl.clone());
        let point = Some(DVec2::new(4.0, 4.0));

        let mut support = PickSupport::new();
        support.add_pickable_object(PickedObject::new(7, ObjectId(70), "A"));
        gl.borrow_mut().fill_rect(Rect::new(0, 0, 10, 10), 7);
        let first = support.resolve_pick(&mut dc, point, None).unwrap().unwrap();
        assert!(first.on_top);
        assert!(support.is_empty());

        support.add_pickable_object(PickedObject::new(9, ObjectId(90), "B"));
        gl.borrow_mut().fill_rect(Rect::new(0, 0, 10, 10), 9);
        support.resolve_pick(&mut dc, point, None).unwrap();

        let list = dc.picked_objects();
        assert_eq!(list.len(), 2);
        assert_eq!(list.iter().filter(|o| o.on_top).count(), 1);
        assert_eq!(list.top_picked_object().map(|o| o.object), Some(ObjectId(90)));
    }
}
