use std::cell::RefCell;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::heap::{Heap, ObjId};
use crate::value::{AtomValue, Function, SExpr};

//===----------------------------------------------------------------------===//
// Scope chain
//===----------------------------------------------------------------------===//

#[derive(Debug)]
struct Scope {
    bindings: FxHashMap<String, SExpr>,
    parent: Option<Env>,
}

/// A handle to one scope in the chain. Cloning the handle shares the scope;
/// child scopes keep their parent alive through the link.
///
/// Bindings hold values directly. Binding an object atom retains it on the
/// heap; overwriting, removing, or destroying the scope releases it, so a
/// name counts as exactly one reference while it is bound.
#[derive(Debug, Clone)]
pub struct Env {
    scope: Rc<RefCell<Scope>>,
}

impl Env {
    pub fn new() -> Env {
        Env {
            scope: Rc::new(RefCell::new(Scope {
                bindings: FxHashMap::default(),
                parent: None,
            })),
        }
    }

    /// Opens a child scope chained to this one.
    pub fn child(&self) -> Env {
        Env {
            scope: Rc::new(RefCell::new(Scope {
                bindings: FxHashMap::default(),
                parent: Some(self.clone()),
            })),
        }
    }

    pub fn parent(&self) -> Option<Env> {
        self.scope.borrow().parent.clone()
    }

    pub fn root(&self) -> Env {
        let mut cur = self.clone();
        while let Some(p) = cur.parent() {
            cur = p;
        }
        cur
    }

    pub fn depth(&self) -> usize {
        let mut n = 0;
        let mut cur = self.parent();
        while let Some(p) = cur {
            n += 1;
            cur = p.parent();
        }
        n
    }

    /// Snapshot of this scope's own bindings, name-sorted.
    pub fn local_bindings(&self) -> Vec<(String, SExpr)> {
        let scope = self.scope.borrow();
        let mut out: Vec<(String, SExpr)> =
            scope.bindings.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }

    fn get_local(&self, name: &str) -> Option<SExpr> {
        self.scope.borrow().bindings.get(name).cloned()
    }

    /// First binding for `name` walking outward through the chain.
    fn find(&self, name: &str) -> Option<SExpr> {
        let mut cur = Some(self.clone());
        while let Some(env) = cur {
            if let Some(v) = env.get_local(name) {
                return Some(v);
            }
            cur = env.parent();
        }
        None
    }

    //===------------------------------------------------------------------===//
    // Lookup
    //===------------------------------------------------------------------===//

    /// Resolves a possibly dotted name. The first segment walks the scope
    /// chain; each following segment projects a field out of the object
    /// found so far. Returns the value together with the object the final
    /// segment was projected from, when there was one.
    ///
    /// A missing field falls back to the object's `kind-of` delegate, one
    /// hop only. A missing final projection yields the null sentinel; an
    /// intermediate non-object value short-circuits and is returned as is.
    pub fn lookup(&self, heap: &Heap, name: &str) -> Option<(Option<SExpr>, SExpr)> {
        let mut parts = name.split('.');
        let first = parts.next()?;
        let value = self.find(first)?;
        self.project_path(heap, value, parts)
    }

    /// Like `lookup`, but the first segment is checked in this scope's own
    /// bindings only.
    fn lookup_local(&self, heap: &Heap, name: &str) -> Option<(Option<SExpr>, SExpr)> {
        let mut parts = name.split('.');
        let first = parts.next()?;
        let value = self.get_local(first)?;
        self.project_path(heap, value, parts)
    }

    fn project_path<'a>(
        &self,
        heap: &Heap,
        mut value: SExpr,
        parts: impl Iterator<Item = &'a str>,
    ) -> Option<(Option<SExpr>, SExpr)> {
        let mut owner: Option<SExpr> = None;
        for part in parts {
            match value.object_id() {
                Some(id) => {
                    owner = Some(value.clone());
                    match self.project(heap, id, part) {
                        Some(v) => value = v,
                        None => return Some((owner, SExpr::null())),
                    }
                }
                None => return Some((owner, value)),
            }
        }
        Some((owner, value))
    }

    /// Field access with one-hop `kind-of` delegation. The delegate may be
    /// stored as an object atom or as a name resolved through the chain.
    fn project(&self, heap: &Heap, id: ObjId, field: &str) -> Option<SExpr> {
        if let Some(v) = heap.field(id, field) {
            return Some(v);
        }
        let kind = heap.field(id, "kind-of")?;
        let delegate = match kind.object_id() {
            Some(did) => Some(did),
            None => match kind {
                SExpr::Atom(AtomValue::Str(ref s)) => {
                    self.find(s).and_then(|v| v.object_id())
                }
                _ => None,
            },
        }?;
        heap.field(delegate, field)
    }

    /// Function resolution of `name`: the ordinary first-match chain walk,
    /// yielding nothing when the first binding found is not a function. A
    /// shadowing non-function binding therefore suppresses an outer
    /// function.
    pub fn lookup_function(
        &self,
        heap: &Heap,
        name: &str,
    ) -> Option<(Option<SExpr>, Function)> {
        let mut cur = Some(self.clone());
        while let Some(env) = cur {
            if let Some((owner, value)) = env.lookup_local(heap, name) {
                return match value {
                    SExpr::Atom(AtomValue::Function(f)) => Some((owner, f)),
                    _ => None,
                };
            }
            cur = env.parent();
        }
        None
    }

    //===------------------------------------------------------------------===//
    // Mutation
    //===------------------------------------------------------------------===//

    /// Binds in this scope, retaining object values and releasing whatever
    /// object the name previously held.
    pub fn put(&self, heap: &mut Heap, name: &str, value: SExpr) {
        if let Some(id) = value.object_id() {
            heap.retain(id);
        }
        let old = self.scope.borrow_mut().bindings.insert(name.to_string(), value);
        if let Some(id) = old.and_then(|v| v.object_id()) {
            heap.release(id);
        }
    }

    pub fn put_global(&self, heap: &mut Heap, name: &str, value: SExpr) {
        self.root().put(heap, name, value);
    }

    /// Unbinds in this scope only. Returns whether the name was bound.
    pub fn remove(&self, heap: &mut Heap, name: &str) -> bool {
        let old = self.scope.borrow_mut().bindings.remove(name);
        let found = old.is_some();
        if let Some(id) = old.and_then(|v| v.object_id()) {
            heap.release(id);
        }
        found
    }

    pub fn remove_global(&self, heap: &mut Heap, name: &str) -> bool {
        self.root().remove(heap, name)
    }

    /// Tears the scope down, releasing every object it still binds. Called
    /// when a call scope goes out of use.
    pub fn destroy(&self, heap: &mut Heap) {
        let values: Vec<SExpr> =
            self.scope.borrow_mut().bindings.drain().map(|(_, v)| v).collect();
        for v in values {
            if let Some(id) = v.object_id() {
                heap.release(id);
            }
        }
    }
}

impl Default for Env {
    fn default() -> Self {
        Env::new()
    }
}
