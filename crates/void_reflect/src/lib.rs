//! # void_reflect - Runtime Reflection
//!
//! Name-based type and member lookup for data-driven event bindings.
//! Types register their fields, methods and constructors once at startup;
//! serialized calls find them again by name and invoke them with runtime
//! [`Value`]s.
//!
//! A process-wide [`registry`] and [`cache`] are provided for convenience.
//! Tests and tools can also create their own [`TypeRegistry`].

pub mod cache;
pub mod error;
pub mod object;
pub mod type_registry;
pub mod value;

pub use cache::ReflectionCache;
pub use error::{ReflectError, Result};
pub use object::{downcast_target, EngineObject, ObjectId, ObjectRef, ObjectResolver, ObjectTable};
pub use type_registry::{
    keys, FieldInfo, MemberFilter, MemberHandle, MemberKey, MethodInfo, ParameterInfo,
    PrimitiveType, TypeInfo, TypeKey, TypeKind, TypeRegistry,
};
pub use value::{Color, Color32, OpaqueValue, Quat, Rect, Reflected, Value, Vec2, Vec3, Vec4};

use std::sync::{Arc, OnceLock};

static REGISTRY: OnceLock<TypeRegistry> = OnceLock::new();
static CACHE: OnceLock<ReflectionCache> = OnceLock::new();

/// Global type registry
pub fn registry() -> &'static TypeRegistry {
    REGISTRY.get_or_init(TypeRegistry::new)
}

/// Global lookup cache
pub fn cache() -> &'static ReflectionCache {
    CACHE.get_or_init(ReflectionCache::new)
}

/// Register a type globally and drop any stale cache entry for its key
pub fn register_type(info: TypeInfo) -> Result<Arc<TypeInfo>> {
    let info = registry().register(info)?;
    cache().invalidate_type(info.key.as_str());
    Ok(info)
}

/// Remove a type from the global registry
pub fn unregister_type(key: &str) -> Option<Arc<TypeInfo>> {
    let removed = registry().unregister(key);
    cache().invalidate_type(key);
    removed
}

/// Find a globally registered type by name through the cache
pub fn find_type(name: &str) -> Option<Arc<TypeInfo>> {
    cache().get_type(registry(), name)
}

/// Re-export commonly used types
pub mod prelude {
    pub use crate::error::{ReflectError, Result};
    pub use crate::object::{EngineObject, ObjectId, ObjectRef, ObjectResolver};
    pub use crate::type_registry::{FieldInfo, MemberHandle, MethodInfo, TypeInfo, TypeKey, TypeRegistry};
    pub use crate::value::{Reflected, Value};
    pub use crate::{find_type, register_type, registry};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_registration_refreshes_cache() {
        assert!(find_type("lib_tests::Spawner").is_none());

        register_type(TypeInfo::class("lib_tests::Spawner")).unwrap();
        assert!(find_type("lib_tests::Spawner").is_some());

        unregister_type("lib_tests::Spawner");
        assert!(find_type("lib_tests::Spawner").is_none());
    }
}
