//! Registry, member lookup and invocation through a local registry

use std::any::Any;
use std::sync::atomic::{AtomicI32, Ordering};
use void_reflect::prelude::*;
use void_reflect::{keys, MemberFilter, ObjectTable, ReflectionCache};

#[derive(Debug)]
struct Door {
    id: u64,
    opened: AtomicI32,
}

impl EngineObject for Door {
    fn type_key(&self) -> TypeKey {
        TypeKey::new("reflect_tests::Door")
    }

    fn instance_id(&self) -> ObjectId {
        ObjectId(self.id)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn setup() -> TypeRegistry {
    let registry = TypeRegistry::new();
    registry
        .register(
            TypeInfo::object("reflect_tests::Prop")
                .with_method(MethodInfo::action0::<Door, _>("Touch", |door| {
                    door.opened.fetch_add(10, Ordering::SeqCst);
                })),
        )
        .unwrap();
    registry
        .register(
            TypeInfo::object("reflect_tests::Door")
                .with_base("reflect_tests::Prop")
                .with_field(FieldInfo::instance::<Door, i32, _, _>(
                    "opened",
                    |door| door.opened.load(Ordering::SeqCst),
                    |door, value| door.opened.store(value, Ordering::SeqCst),
                ))
                .with_method(MethodInfo::instance1::<Door, i32, i32, _>("Open", "times", |door, times| {
                    door.opened.fetch_add(times, Ordering::SeqCst) + times
                }))
                .with_method(MethodInfo::function2::<f32, f32, f32, _>("Max", ["a", "b"], f32::max)),
        )
        .unwrap();
    registry
}

fn door(id: u64) -> ObjectRef {
    ObjectRef::new(Door {
        id,
        opened: AtomicI32::new(0),
    })
}

#[test]
fn test_inherited_members() {
    let registry = setup();
    let target = door(1);

    assert!(registry.is_assignable("reflect_tests::Prop", "reflect_tests::Door"));
    assert!(registry.is_assignable(keys::OBJECT, "reflect_tests::Door"));
    assert!(!registry.is_assignable("reflect_tests::Door", "reflect_tests::Prop"));

    let touch = registry.find_method("reflect_tests::Door", "Touch", &[]).unwrap();
    assert_eq!(touch.declaring_type, "reflect_tests::Prop");
    touch.invoke(Some(&target), &[]).unwrap();

    let opened = registry.find_field("reflect_tests::Door", "opened").unwrap();
    assert_eq!(opened.get_value(Some(&target)).unwrap(), Value::Int(10));

    let own = registry.members(
        "reflect_tests::Door",
        MemberFilter {
            include_inherited: false,
            ..MemberFilter::default()
        },
    );
    assert_eq!(own.len(), 3);
    assert!(registry.members("reflect_tests::Door", MemberFilter::default()).len() > own.len());
}

#[test]
fn test_invocation_errors() {
    let registry = setup();
    let open = registry
        .find_method("reflect_tests::Door", "Open", &[TypeKey::new(keys::INT)])
        .unwrap();

    assert!(matches!(
        open.invoke(None, &[Value::Int(1)]),
        Err(ReflectError::MissingTarget(_))
    ));
    assert!(matches!(
        open.invoke(Some(&door(2)), &[]),
        Err(ReflectError::ArgumentCount { expected: 1, found: 0, .. })
    ));
    assert!(matches!(
        open.invoke(Some(&door(2)), &[Value::String("twice".to_string())]),
        Err(ReflectError::ArgumentType { index: 0, .. })
    ));
    assert_eq!(open.invoke(Some(&door(2)), &[Value::Int(2)]).unwrap(), Value::Int(2));
}

#[test]
fn test_signatures_and_cache() {
    let registry = setup();
    let cache = ReflectionCache::new();

    let max = registry
        .find_method(
            "reflect_tests::Door",
            "Max",
            &[TypeKey::new(keys::FLOAT), TypeKey::new(keys::FLOAT)],
        )
        .unwrap();
    let handle = MemberHandle::from(max);
    assert_eq!(cache.signature(&handle, true), "f32 Max (f32 a, f32 b)");
    assert!(handle.is_static());

    assert!(cache.get_type(&registry, "reflect_tests::Window").is_none());
    registry.register(TypeInfo::class("reflect_tests::Window")).unwrap();
    assert!(cache.get_type(&registry, "reflect_tests::Window").is_none());
    cache.invalidate_type("reflect_tests::Window");
    assert!(cache.get_type(&registry, "reflect_tests::Window").is_some());
}

#[test]
fn test_enums_and_object_table() {
    let registry = setup();
    registry
        .register(TypeInfo::enumeration("reflect_tests::Lock", [("Open", 0), ("Locked", 1)]))
        .unwrap();
    let lock = registry.get("reflect_tests::Lock").unwrap();
    assert!(lock.is_enum());
    assert_eq!(lock.variant_name(1), Some("Locked"));
    assert!(registry.is_supported_native("reflect_tests::Lock"));
    assert!(!registry.is_supported_native(keys::LONG));

    let objects = ObjectTable::new();
    let id = objects.insert(door(9));
    assert_eq!(id, ObjectId(9));
    assert!(objects.resolve(id).is_some());
    assert!(objects.resolve(ObjectId(10)).is_none());
}
