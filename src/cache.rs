use crate::hash::ObjectId;
use crate::obj::Object;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// an in-memory cache of parsed objects keyed by id, shared by every reader
/// of one repository session (spec section 3: "commits, trees, and tags
/// outlive any single call and may be cached by identifier"). grounded in
/// the teacher's `BitObjCache`, generalized from a lifetime-bound
/// `FxHashMap<Oid, BitObjKind>` owned by an arena-scoped repository context
/// to a plain `Arc<Object>` cache guarded by one lock - this crate has no
/// arena, so there is nothing left for the cached value to borrow from. the
/// teacher's `VirtualOdb` (a write-path pseudo-odb backed by this cache) has
/// no counterpart here: writing objects is out of scope.
#[derive(Default)]
pub struct ObjectCache {
    objects: Mutex<FxHashMap<ObjectId, Arc<Object>>>,
}

impl ObjectCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: ObjectId) -> Option<Arc<Object>> {
        self.objects.lock().get(&id).cloned()
    }

    pub fn insert(&self, id: ObjectId, obj: Object) -> Arc<Object> {
        let obj = Arc::new(obj);
        self.objects.lock().insert(id, Arc::clone(&obj));
        obj
    }

    /// returns the cached object for `id` if present, otherwise calls `f`,
    /// caches its result, and returns that. `f` is only invoked on a miss.
    pub fn get_or_insert_with(
        &self,
        id: ObjectId,
        f: impl FnOnce() -> crate::error::Result<Object>,
    ) -> crate::error::Result<Arc<Object>> {
        if let Some(obj) = self.get(id) {
            return Ok(obj);
        }
        Ok(self.insert(id, f()?))
    }

    pub fn len(&self) -> usize {
        self.objects.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::obj::Blob;

    #[test]
    fn caches_by_id_and_only_calls_f_once() {
        let cache = ObjectCache::new();
        let id = ObjectId::hash_object("blob", b"hello");
        let mut calls = 0;
        for _ in 0..3 {
            cache
                .get_or_insert_with(id, || {
                    calls += 1;
                    Ok(Object::Blob(Blob::new(b"hello".to_vec())))
                })
                .unwrap();
        }
        assert_eq!(calls, 1);
        assert_eq!(cache.len(), 1);
    }
}
