//! Lookup caches for type names and member signatures
//!
//! Persistent calls look their declaring type up by name every time they
//! are resolved. Results are cached here, including failed lookups, until
//! the type is registered again or the cache is cleared.

use crate::type_registry::{MemberHandle, MemberKey, TypeInfo, TypeKey, TypeRegistry};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Name and signature cache
#[derive(Default)]
pub struct ReflectionCache {
    types: RwLock<HashMap<String, Option<Arc<TypeInfo>>>>,
    signatures: RwLock<HashMap<(MemberKey, bool), String>>,
}

impl ReflectionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a type by name, caching the result even when it is missing
    pub fn get_type(&self, registry: &TypeRegistry, name: &str) -> Option<Arc<TypeInfo>> {
        if let Some(cached) = self.types.read().get(name) {
            return cached.clone();
        }

        let info = registry.get(name);
        if info.is_none() {
            log::debug!("Type '{}' not found, caching miss", name);
        }
        self.types.write().insert(name.to_string(), info.clone());
        info
    }

    /// Override the cached entry for a name
    pub fn set_type(&self, name: &str, info: Option<Arc<TypeInfo>>) {
        self.types.write().insert(name.to_string(), info);
    }

    /// Forget a cached name so the next lookup hits the registry
    pub fn invalidate_type(&self, name: &str) {
        self.types.write().remove(name);
        self.signatures
            .write()
            .retain(|(key, _), _| key.declaring_type != name);
    }

    /// Forget everything
    pub fn clear(&self) {
        self.types.write().clear();
        self.signatures.write().clear();
    }

    /// Display signature of a member
    ///
    /// Methods render as `Ret Name (T a, T b)`, or `Ret Name (T, T)` without
    /// parameter names. Fields render as `Type Name`.
    pub fn signature(&self, member: &MemberHandle, include_parameter_names: bool) -> String {
        let key = (member.key(), include_parameter_names);
        if let Some(signature) = self.signatures.read().get(&key) {
            return signature.clone();
        }

        let signature = build_signature(member, include_parameter_names);
        self.signatures.write().insert(key, signature.clone());
        signature
    }

    /// Display name of a type, with or without its module path
    pub fn type_name(&self, key: &TypeKey, full: bool) -> String {
        key.display_name(full).to_string()
    }
}

fn build_signature(member: &MemberHandle, include_parameter_names: bool) -> String {
    match member {
        MemberHandle::Field(field) => {
            format!("{} {}", field.field_type.short_name(), field.name)
        }
        MemberHandle::Method(method) => {
            let return_type = method
                .return_type
                .as_ref()
                .map(|key| key.short_name())
                .unwrap_or("void");
            let parameters: Vec<String> = method
                .parameters
                .iter()
                .map(|p| {
                    if include_parameter_names {
                        format!("{} {}", p.parameter_type.short_name(), p.name)
                    } else {
                        p.parameter_type.short_name().to_string()
                    }
                })
                .collect();
            format!("{} {} ({})", return_type, method.name, parameters.join(", "))
        }
    }
}

impl fmt::Debug for ReflectionCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReflectionCache")
            .field("types", &self.types.read().len())
            .field("signatures", &self.signatures.read().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::type_registry::{keys, FieldInfo, MethodInfo};
    use crate::value::Value;

    fn registry() -> TypeRegistry {
        let registry = TypeRegistry::new();
        registry
            .register(
                TypeInfo::class("cache_tests::Math")
                    .with_method(MethodInfo::function2::<f32, f32, f32, _>(
                        "Max",
                        ["a", "b"],
                        f32::max,
                    ))
                    .with_method(MethodInfo::static_action1::<String, _>("Log", "message", |_| {}))
                    .with_field(
                        FieldInfo::new("Gravity", keys::FLOAT, |_| Ok(Value::Float(9.81))).static_field(),
                    ),
            )
            .unwrap();
        registry
    }

    #[test]
    fn test_missing_type_is_cached() {
        let registry = registry();
        let cache = ReflectionCache::new();

        assert!(cache.get_type(&registry, "cache_tests::Late").is_none());
        registry.register(TypeInfo::class("cache_tests::Late")).unwrap();
        assert!(cache.get_type(&registry, "cache_tests::Late").is_none());

        cache.invalidate_type("cache_tests::Late");
        assert!(cache.get_type(&registry, "cache_tests::Late").is_some());
    }

    #[test]
    fn test_signatures() {
        let registry = registry();
        let cache = ReflectionCache::new();
        let info = cache.get_type(&registry, "cache_tests::Math").unwrap();

        let max = MemberHandle::Method(info.methods()[0].clone());
        assert_eq!(cache.signature(&max, true), "f32 Max (f32 a, f32 b)");
        assert_eq!(cache.signature(&max, false), "f32 Max (f32, f32)");

        let log = MemberHandle::Method(info.methods()[1].clone());
        assert_eq!(cache.signature(&log, true), "void Log (String message)");

        let gravity = MemberHandle::Field(info.fields()[0].clone());
        assert_eq!(cache.signature(&gravity, false), "f32 Gravity");

        let key = TypeKey::new("cache_tests::Math");
        assert_eq!(cache.type_name(&key, false), "Math");
        assert_eq!(cache.type_name(&key, true), "cache_tests::Math");
    }
}
