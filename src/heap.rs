use std::fmt;

use rustc_hash::FxHashMap;

use crate::value::SExpr;

//===----------------------------------------------------------------------===//
// Object identifiers
//===----------------------------------------------------------------------===//

/// Globally unique object handle, rendered as `obj-N`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjId(u64);

impl fmt::Display for ObjId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "obj-{}", self.0)
    }
}

//===----------------------------------------------------------------------===//
// Heap objects
//===----------------------------------------------------------------------===//

/// A mutable record of named fields with a manual reference count. Counts
/// never go below zero; an object whose count is zero is removed on the
/// next release.
#[derive(Debug)]
pub struct HeapObject {
    id: ObjId,
    fields: std::collections::BTreeMap<String, SExpr>,
    refs: i64,
}

impl HeapObject {
    pub fn id(&self) -> ObjId {
        self.id
    }

    pub fn references(&self) -> i64 {
        self.refs
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    pub fn fields(&self) -> impl Iterator<Item = (&String, &SExpr)> {
        self.fields.iter()
    }
}

//===----------------------------------------------------------------------===//
// Heap
//===----------------------------------------------------------------------===//

/// The shared object store. Objects live here; the language only ever holds
/// `ObjId` handles to them. Lifetimes are managed by explicit retain and
/// release calls issued by the binding layer; reference cycles are never
/// collected.
#[derive(Debug, Default)]
pub struct Heap {
    objects: FxHashMap<ObjId, HeapObject>,
    next_id: u64,
}

impl Heap {
    pub fn new() -> Heap {
        Heap::default()
    }

    /// Creates an object with the given fields and a reference count of
    /// zero. Object-valued fields are retained.
    pub fn allocate(&mut self, fields: Vec<(String, SExpr)>) -> ObjId {
        self.next_id += 1;
        let id = ObjId(self.next_id);
        let mut map = std::collections::BTreeMap::new();
        for (name, value) in fields {
            if let Some(fid) = value.object_id() {
                self.retain(fid);
            }
            map.insert(name, value);
        }
        self.objects.insert(id, HeapObject { id, fields: map, refs: 0 });
        id
    }

    pub fn get(&self, id: ObjId) -> Option<&HeapObject> {
        self.objects.get(&id)
    }

    pub fn contains(&self, id: ObjId) -> bool {
        self.objects.contains_key(&id)
    }

    pub fn field(&self, id: ObjId, name: &str) -> Option<SExpr> {
        self.objects.get(&id).and_then(|o| o.fields.get(name).cloned())
    }

    /// Writes a field. The old value is released and the new one retained
    /// when either is an object; storing the null sentinel removes the
    /// field instead.
    pub fn set_field(&mut self, id: ObjId, name: &str, value: SExpr) {
        if !self.objects.contains_key(&id) {
            return;
        }
        if let Some(fid) = value.object_id() {
            self.retain(fid);
        }
        let old = if value.is_null() {
            self.objects.get_mut(&id).and_then(|o| o.fields.remove(name))
        } else {
            self.objects
                .get_mut(&id)
                .and_then(|o| o.fields.insert(name.to_string(), value))
        };
        if let Some(fid) = old.and_then(|v| v.object_id()) {
            self.release(fid);
        }
    }

    pub fn retain(&mut self, id: ObjId) {
        if let Some(obj) = self.objects.get_mut(&id) {
            obj.refs += 1;
        }
    }

    /// Drops one reference. The count is clamped at zero; releasing an
    /// object whose count is already zero removes it, releasing its
    /// object-valued fields in turn.
    pub fn release(&mut self, id: ObjId) {
        let remove = match self.objects.get_mut(&id) {
            Some(obj) => {
                if obj.refs > 0 {
                    obj.refs -= 1;
                }
                obj.refs == 0
            }
            None => false,
        };
        if remove {
            self.remove(id);
        }
    }

    fn remove(&mut self, id: ObjId) {
        if let Some(obj) = self.objects.remove(&id) {
            for (_, value) in obj.fields {
                if let Some(fid) = value.object_id() {
                    self.release(fid);
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn ids(&self) -> Vec<ObjId> {
        let mut ids: Vec<ObjId> = self.objects.keys().copied().collect();
        ids.sort();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{AtomValue, SExpr};

    fn int(v: i64) -> SExpr {
        SExpr::Atom(AtomValue::Int(v))
    }

    #[test]
    fn allocate_starts_at_zero_references() {
        let mut heap = Heap::new();
        let id = heap.allocate(vec![("x".into(), int(1))]);
        assert_eq!(heap.get(id).unwrap().references(), 0);
        assert_eq!(heap.field(id, "x"), Some(int(1)));
    }

    #[test]
    fn release_at_zero_removes() {
        let mut heap = Heap::new();
        let id = heap.allocate(vec![]);
        heap.release(id);
        assert!(!heap.contains(id));
    }

    #[test]
    fn retain_then_release_keeps_object_alive() {
        let mut heap = Heap::new();
        let id = heap.allocate(vec![]);
        heap.retain(id);
        heap.retain(id);
        heap.release(id);
        assert!(heap.contains(id));
        heap.release(id);
        assert!(!heap.contains(id));
    }

    #[test]
    fn removal_cascades_through_object_fields() {
        let mut heap = Heap::new();
        let inner = heap.allocate(vec![]);
        let outer =
            heap.allocate(vec![("child".into(), SExpr::Atom(AtomValue::Object(inner)))]);
        assert_eq!(heap.get(inner).unwrap().references(), 1);
        heap.release(outer);
        assert!(!heap.contains(outer));
        assert!(!heap.contains(inner));
    }

    #[test]
    fn null_field_write_removes_the_field() {
        let mut heap = Heap::new();
        let id = heap.allocate(vec![("x".into(), int(1))]);
        heap.retain(id);
        heap.set_field(id, "x", SExpr::null());
        assert_eq!(heap.field(id, "x"), None);
        assert_eq!(heap.get(id).unwrap().field_count(), 0);
    }

    #[test]
    fn field_overwrite_swaps_references() {
        let mut heap = Heap::new();
        let a = heap.allocate(vec![]);
        let b = heap.allocate(vec![]);
        heap.retain(a);
        heap.retain(b);
        let holder = heap.allocate(vec![("v".into(), SExpr::Atom(AtomValue::Object(a)))]);
        heap.retain(holder);
        heap.set_field(holder, "v", SExpr::Atom(AtomValue::Object(b)));
        assert_eq!(heap.get(a).unwrap().references(), 1);
        assert_eq!(heap.get(b).unwrap().references(), 2);
    }

    #[test]
    fn ids_render_with_prefix() {
        let mut heap = Heap::new();
        let id = heap.allocate(vec![]);
        assert_eq!(id.to_string(), "obj-1");
    }
}
