//! The ordered collection of objects in a composition.
//!
//! Index order is paint order: the last object is drawn on top and wins
//! hit tests. Reordering only swaps neighbours.

use crate::object::{ObjectId, SceneObject};
use crate::surface::Surface;

#[derive(Debug, Clone, Default)]
pub struct Scene {
    objects: Vec<SceneObject>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Objects in paint order (bottom first).
    pub fn objects(&self) -> &[SceneObject] {
        &self.objects
    }

    pub fn iter(&self) -> impl Iterator<Item = &SceneObject> {
        self.objects.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut SceneObject> {
        self.objects.iter_mut()
    }

    pub fn ids(&self) -> Vec<ObjectId> {
        self.objects.iter().map(SceneObject::id).collect()
    }

    /// Append on top of everything else.
    pub fn add(&mut self, object: SceneObject) -> ObjectId {
        let id = object.id();
        self.objects.push(object);
        id
    }

    pub fn remove(&mut self, id: ObjectId) -> Option<SceneObject> {
        let index = self.index_of(id)?;
        Some(self.objects.remove(index))
    }

    pub fn clear(&mut self) {
        self.objects.clear();
    }

    pub fn index_of(&self, id: ObjectId) -> Option<usize> {
        self.objects.iter().position(|o| o.id() == id)
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.index_of(id).is_some()
    }

    pub fn get(&self, id: ObjectId) -> Option<&SceneObject> {
        self.objects.iter().find(|o| o.id() == id)
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut SceneObject> {
        self.objects.iter_mut().find(|o| o.id() == id)
    }

    /// Swap with the neighbour above. Returns `false` if already on top or
    /// not found.
    pub fn move_up(&mut self, id: ObjectId) -> bool {
        match self.index_of(id) {
            Some(i) if i + 1 < self.objects.len() => {
                self.objects.swap(i, i + 1);
                true
            }
            _ => false,
        }
    }

    /// Swap with the neighbour below. Returns `false` if already at the
    /// bottom or not found.
    pub fn move_down(&mut self, id: ObjectId) -> bool {
        match self.index_of(id) {
            Some(i) if i > 0 => {
                self.objects.swap(i, i - 1);
                true
            }
            _ => false,
        }
    }

    /// Append a deep copy of `id`, shifted by `offset`. Returns the new id.
    pub fn duplicate(&mut self, id: ObjectId, offset: f64) -> Option<ObjectId> {
        let copy = self.get(id)?.duplicate(offset);
        Some(self.add(copy))
    }

    /// Topmost object present at time `t` containing `(x, y)`.
    pub fn hit_test(&self, x: f64, y: f64, t: f64) -> Option<ObjectId> {
        self.objects
            .iter()
            .rev()
            .find(|o| o.is_present_at(t) && o.contains_point(x, y))
            .map(SceneObject::id)
    }

    /// Paint every object bottom to top at scene time `t`.
    pub fn paint(&mut self, surface: &mut dyn Surface, t: f64) {
        for object in &mut self.objects {
            object.paint(surface, t);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Rect;
    use crate::object::{ObjectData, ObjectKind, TextObject};
    use crate::surface::RecordingSurface;

    fn boxed(x: f64) -> SceneObject {
        SceneObject::new(TextObject::new("x"), Rect::new(x, 0.0, 100.0, 100.0))
    }

    #[test]
    fn test_add_remove_preserves_order() {
        let mut scene = Scene::new();
        let a = scene.add(boxed(0.0));
        let b = scene.add(boxed(0.0));
        let c = scene.add(boxed(0.0));
        assert_eq!(scene.ids(), vec![a, b, c]);
        assert!(scene.remove(b).is_some());
        assert_eq!(scene.ids(), vec![a, c]);
        assert!(scene.remove(b).is_none());
    }

    #[test]
    fn test_reorder_swaps_neighbours_only() {
        let mut scene = Scene::new();
        let a = scene.add(boxed(0.0));
        let b = scene.add(boxed(0.0));
        let c = scene.add(boxed(0.0));
        assert!(scene.move_up(a));
        assert_eq!(scene.ids(), vec![b, a, c]);
        assert!(scene.move_down(c));
        assert_eq!(scene.ids(), vec![b, c, a]);
        assert!(!scene.move_up(a));
        assert!(!scene.move_down(b));
    }

    #[test]
    fn test_hit_test_prefers_topmost() {
        let mut scene = Scene::new();
        let bottom = scene.add(boxed(0.0));
        let top = scene.add(boxed(50.0));
        assert_eq!(scene.hit_test(75.0, 50.0, 0.0), Some(top));
        assert_eq!(scene.hit_test(25.0, 50.0, 0.0), Some(bottom));
        assert_eq!(scene.hit_test(500.0, 50.0, 0.0), None);
    }

    #[test]
    fn test_hit_test_skips_objects_not_yet_started() {
        let mut scene = Scene::new();
        let bottom = scene.add(boxed(0.0));
        scene.add(boxed(0.0).with_timing(2000.0, 500.0));
        assert_eq!(scene.hit_test(10.0, 10.0, 1000.0), Some(bottom));
    }

    #[test]
    fn test_duplicate_appends_on_top() {
        let mut scene = Scene::new();
        let a = scene.add(SceneObject::with_defaults(ObjectKind::Counter, 10.0, 10.0));
        let copy = scene.duplicate(a, 20.0).unwrap();
        assert_eq!(scene.ids(), vec![a, copy]);
        assert_eq!(scene.get(copy).unwrap().bounds().x, 30.0);
        assert!(matches!(scene.get(copy).unwrap().data(), ObjectData::Counter(_)));
    }

    #[test]
    fn test_paint_in_order() {
        let mut scene = Scene::new();
        scene.add(SceneObject::new(TextObject::new("first"), Rect::default()).with_timing(0.0, 0.0));
        scene.add(SceneObject::new(TextObject::new("second"), Rect::default()).with_timing(0.0, 0.0));
        let mut surface = RecordingSurface::new(100, 100);
        scene.paint(&mut surface, 0.0);
        assert_eq!(surface.texts(), vec!["first", "second"]);
    }
}
