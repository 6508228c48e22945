//! Engine objects - shared references to scene objects that can be targets
//! of persistent calls or values passed between them.

use crate::error::{ReflectError, Result};
use crate::type_registry::TypeKey;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Stable identifier of an engine object, used when persisting references
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(pub u64);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Trait for objects that can be referenced by events
pub trait EngineObject: Any + Send + Sync + fmt::Debug {
    /// Registered type of this object
    fn type_key(&self) -> TypeKey;

    /// Stable identifier used for persistence
    fn instance_id(&self) -> ObjectId;

    /// Get as Any for downcasting
    fn as_any(&self) -> &dyn Any;

    /// Display name
    fn name(&self) -> String {
        format!("{} {}", self.type_key().short_name(), self.instance_id())
    }
}

/// Shared, nullable-by-`Option` reference to an engine object
///
/// Two references are equal when they point at the same object.
#[derive(Clone)]
pub struct ObjectRef(Arc<dyn EngineObject>);

impl ObjectRef {
    /// Wrap a new object
    pub fn new<T: EngineObject>(object: T) -> Self {
        Self(Arc::new(object))
    }

    /// Wrap an existing shared object
    pub fn from_arc(object: Arc<dyn EngineObject>) -> Self {
        Self(object)
    }

    pub fn type_key(&self) -> TypeKey {
        self.0.type_key()
    }

    pub fn instance_id(&self) -> ObjectId {
        self.0.instance_id()
    }

    pub fn name(&self) -> String {
        self.0.name()
    }

    /// Borrow the underlying object
    pub fn get(&self) -> &dyn EngineObject {
        self.0.as_ref()
    }

    /// Downcast to a concrete object type
    pub fn downcast_ref<T: EngineObject>(&self) -> Option<&T> {
        self.0.as_any().downcast_ref::<T>()
    }

    /// Check if both references point at the same object
    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        Arc::as_ptr(&self.0) as *const () == Arc::as_ptr(&other.0) as *const ()
    }
}

impl<T: EngineObject> From<Arc<T>> for ObjectRef {
    fn from(object: Arc<T>) -> Self {
        let object: Arc<dyn EngineObject> = object;
        Self(object)
    }
}

impl PartialEq for ObjectRef {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for ObjectRef {}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectRef({})", self.name())
    }
}

/// Downcast the target of an instance member
pub fn downcast_target<'a, T: EngineObject>(
    target: Option<&'a ObjectRef>,
    member: &str,
) -> Result<&'a T> {
    let target = target.ok_or_else(|| ReflectError::MissingTarget(member.to_string()))?;
    target.downcast_ref::<T>().ok_or_else(|| {
        ReflectError::type_mismatch(std::any::type_name::<T>(), target.type_key().to_string())
    })
}

// ========== Resolution ==========

/// Looks up live objects by their persisted identifier
pub trait ObjectResolver {
    fn resolve(&self, id: ObjectId) -> Option<ObjectRef>;
}

/// Simple object table keyed by instance id
#[derive(Default)]
pub struct ObjectTable {
    objects: RwLock<HashMap<ObjectId, ObjectRef>>,
}

impl ObjectTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an object, replacing any previous object with the same id
    pub fn insert(&self, object: ObjectRef) -> ObjectId {
        let id = object.instance_id();
        self.objects.write().insert(id, object);
        id
    }

    pub fn remove(&self, id: ObjectId) -> Option<ObjectRef> {
        self.objects.write().remove(&id)
    }

    pub fn get(&self, id: ObjectId) -> Option<ObjectRef> {
        self.objects.read().get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }
}

impl ObjectResolver for ObjectTable {
    fn resolve(&self, id: ObjectId) -> Option<ObjectRef> {
        self.get(id)
    }
}

impl fmt::Debug for ObjectTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectTable")
            .field("object_count", &self.len())
            .finish()
    }
}
