//! End-to-end tests for persistent events against a reflected object type

use parking_lot::Mutex;
use std::any::Any;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use void_event::prelude::*;
use void_event::{
    register_operators, ArgumentKind, EditState, InvocationContext, RuntimeState, OPERATORS_TYPE,
};
use void_reflect::{keys, MemberHandle, ObjectTable, ReflectError};

const RECORDER: &str = "tests::Recorder";

#[derive(Debug, Default)]
struct Recorder {
    id: u64,
    value: Mutex<i32>,
    sets: AtomicUsize,
    log: Mutex<Vec<String>>,
}

impl Recorder {
    fn push(&self, entry: impl Into<String>) {
        self.log.lock().push(entry.into());
    }
}

impl EngineObject for Recorder {
    fn type_key(&self) -> TypeKey {
        TypeKey::new(RECORDER)
    }

    fn instance_id(&self) -> ObjectId {
        ObjectId(self.id)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// Log of the static `Record` method used by the recursion test
static RECORDED: Mutex<Vec<i32>> = Mutex::new(Vec::new());
static RECURSIVE: OnceLock<PersistentEvent<(i32,)>> = OnceLock::new();

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
    recorder_type();
    register_operators().unwrap();
}

fn recorder_type() -> Arc<TypeInfo> {
    static INFO: OnceLock<Arc<TypeInfo>> = OnceLock::new();
    INFO.get_or_init(|| {
        let info = TypeInfo::object(RECORDER)
            .with_field(FieldInfo::instance::<Recorder, i32, _, _>(
                "value",
                |r| *r.value.lock(),
                |r, v| {
                    *r.value.lock() = v;
                    r.sets.fetch_add(1, Ordering::SeqCst);
                },
            ))
            .with_method(MethodInfo::action1::<Recorder, i32, _>("SetValue", "value", |r, v| {
                r.push(format!("SetValue({})", v))
            }))
            .with_method(MethodInfo::instance0::<Recorder, i32, _>("CallA", |r| {
                r.push("CallA");
                7
            }))
            .with_method(MethodInfo::instance0::<Recorder, i32, _>("CallB", |r| {
                r.push("CallB");
                9
            }))
            .with_method(MethodInfo::new("Fail", |_, _| {
                Err(ReflectError::invocation("recorder refused"))
            }))
            .with_method(
                MethodInfo::new("Configure", |target, args| {
                    let recorder = void_reflect::downcast_target::<Recorder>(target, "Configure")?;
                    recorder.push(format!("Configure({})", args[0]));
                    Ok(Value::Null)
                })
                .param_with_default("volume", keys::FLOAT, Value::Float(0.5)),
            )
            .with_method(MethodInfo::function1::<i32, i32, _>("Echo", "value", |v| v))
            .with_method(MethodInfo::static_action1::<i32, _>("Record", "value", |v| {
                RECORDED.lock().push(v)
            }))
            .with_method(MethodInfo::static_action1::<i32, _>("Recurse", "depth", |depth| {
                if depth > 0 {
                    if let Some(event) = RECURSIVE.get() {
                        event.invoke(&(depth - 1,)).unwrap();
                    }
                }
            }))
            .with_constructor(
                MethodInfo::constructor(|args| {
                    let id = args[0].as_int().unwrap_or_default();
                    Ok(Value::Object(ObjectRef::new(Recorder {
                        id: id as u64,
                        ..Default::default()
                    })))
                })
                .param("id", keys::INT),
            );
        register_type(info).unwrap()
    })
    .clone()
}

fn method(name: &str, parameters: &[&str]) -> Arc<MethodInfo> {
    let parameters: Vec<TypeKey> = parameters.iter().copied().map(TypeKey::new).collect();
    registry().find_method(RECORDER, name, &parameters).unwrap()
}

fn recorder(id: u64) -> ObjectRef {
    ObjectRef::new(Recorder {
        id,
        ..Default::default()
    })
}

fn log_of(object: &ObjectRef) -> Vec<String> {
    object.downcast_ref::<Recorder>().unwrap().log.lock().clone()
}

fn set_value_from<P: EventArgs>(
    event: &mut PersistentEvent<P>,
    target: &ObjectRef,
    producer: usize,
) -> usize {
    let mut call = PersistentCall::with_method(&method("SetValue", &[keys::INT]), Some(target.clone()));
    call.argument_mut(0).unwrap().set_return_value_link(producer);
    event.add_persistent_call(call)
}

#[test]
fn test_persistent_calls_run_before_dynamic_calls() {
    init();
    let target = recorder(1);
    let mut event = PersistentEvent::<()>::new();

    let sink = target.clone();
    event.add_dynamic_call(move |_| sink.downcast_ref::<Recorder>().unwrap().push("dynamic"));
    event.add_persistent_call(PersistentCall::with_method(&method("CallA", &[]), Some(target.clone())));

    event.invoke(&()).unwrap();
    assert_eq!(log_of(&target), vec!["CallA", "dynamic"]);
}

#[test]
fn test_operator_result_feeds_next_call() {
    init();
    let target = recorder(2);
    let add = registry()
        .find_method(OPERATORS_TYPE, "Add", &[TypeKey::new(keys::INT), TypeKey::new(keys::INT)])
        .unwrap();

    let mut sum = PersistentCall::with_method(&add, None);
    sum.set_arguments(&[Value::Int(2), Value::Int(3)]).unwrap();
    assert_eq!(sum.member_name(), Some("void_event::Operators.Add"));

    let mut event = PersistentEvent::<()>::new();
    event.add_persistent_call(sum);
    event.add_persistent_call(PersistentCall::with_method(
        &method("SetValue", &[keys::INT]),
        Some(target.clone()),
    ));
    assert_eq!(
        event.link_candidates(1, &TypeKey::new(keys::INT)),
        vec![LinkCandidate::ReturnValue(0)]
    );
    event.link_argument(1, 0, LinkCandidate::ReturnValue(0)).unwrap();

    event.invoke(&()).unwrap();
    assert_eq!(log_of(&target), vec!["SetValue(5)"]);
}

#[test]
fn test_parameter_passthrough() {
    init();
    let target = recorder(3);
    let mut event = PersistentEvent::<(i32,)>::new();
    event
        .bind_persistent(&method("SetValue", &[keys::INT]), Some(target.clone()))
        .unwrap();

    event.invoke(&(42,)).unwrap();
    assert_eq!(log_of(&target), vec!["SetValue(42)"]);
}

#[test]
fn test_removed_producer_keeps_dangling_link() {
    init();
    let target = recorder(4);
    let mut event = PersistentEvent::<()>::new();
    event.add_persistent_call(PersistentCall::with_method(&method("CallA", &[]), Some(target.clone())));
    set_value_from(&mut event, &target, 0);

    event.remove_persistent_call(0).unwrap();
    let argument = &event.persistent_calls()[0].arguments()[0];
    assert_eq!(argument.return_value_index(), Some(0));
    assert_eq!(event.forward_links(), vec![(0, 0)]);

    // The link has no value yet when the call runs, so the default is used
    event.invoke(&()).unwrap();
    assert_eq!(log_of(&target), vec!["SetValue(0)"]);
}

#[test]
fn test_removed_producer_resets_to_constant() {
    init();
    let config = EventConfig::from_toml_str(
        r#"
        link_repair = "reset_to_constant"
        warn_on_unavailable_links = false
        "#,
    )
    .unwrap();
    assert_eq!(config.link_repair, LinkRepair::ResetToConstant);
    assert!(config.warn_on_missing_members);

    let target = recorder(5);
    let mut event = PersistentEvent::<()>::with_config(config);
    event.add_persistent_call(PersistentCall::with_method(&method("CallA", &[]), Some(target.clone())));
    set_value_from(&mut event, &target, 0);

    event.remove_persistent_call(0).unwrap();
    let argument = &event.persistent_calls()[0].arguments()[0];
    assert_eq!(argument.kind(), ArgumentKind::Constant);
    assert_eq!(argument.literal(), Some(&Literal::Int(0)));
    assert!(event.forward_links().is_empty());
}

#[test]
fn test_removal_repoints_to_remaining_producer() {
    init();
    let target = recorder(6);
    let mut event = PersistentEvent::<()>::new();
    event.add_persistent_call(PersistentCall::with_method(&method("CallA", &[]), Some(target.clone())));
    event.add_persistent_call(PersistentCall::with_method(&method("CallB", &[]), Some(target.clone())));
    set_value_from(&mut event, &target, 1);

    event.remove_persistent_call(0).unwrap();
    assert_eq!(event.persistent_calls()[1].arguments()[0].return_value_index(), Some(0));

    event.invoke(&()).unwrap();
    assert_eq!(log_of(&target), vec!["CallB", "SetValue(9)"]);
}

#[test]
fn test_removal_keeps_link_to_same_member() {
    init();
    let first = recorder(7);
    let second = recorder(8);
    let mut event = PersistentEvent::<()>::new();
    event.add_persistent_call(PersistentCall::with_method(&method("CallA", &[]), Some(first.clone())));
    event.add_persistent_call(PersistentCall::with_method(&method("CallA", &[]), Some(second.clone())));
    set_value_from(&mut event, &second, 0);

    event.remove_persistent_call(0).unwrap();
    assert_eq!(event.persistent_calls()[1].arguments()[0].return_value_index(), Some(0));

    event.invoke(&()).unwrap();
    assert!(log_of(&first).is_empty());
    assert_eq!(log_of(&second), vec!["CallA", "SetValue(7)"]);
}

#[test]
fn test_reorder_link_follows_producer() {
    init();
    let target = recorder(9);
    let mut event = PersistentEvent::<()>::new();
    event.add_persistent_call(PersistentCall::with_method(&method("CallB", &[]), Some(target.clone())));
    event.add_persistent_call(PersistentCall::with_method(&method("CallA", &[]), Some(target.clone())));
    set_value_from(&mut event, &target, 1);

    event.move_persistent_call(1, 0).unwrap();
    assert_eq!(event.persistent_calls()[2].arguments()[0].return_value_index(), Some(0));

    event.invoke(&()).unwrap();
    assert_eq!(log_of(&target), vec!["CallA", "CallB", "SetValue(7)"]);
}

#[test]
fn test_field_getter_and_setter() {
    init();
    let target = recorder(10);
    let field = registry().find_field(RECORDER, "value").unwrap();
    let state = target.downcast_ref::<Recorder>().unwrap();

    let getter = PersistentCall::with_field(&field, Some(target.clone()), true);
    assert!(getter.is_getter());
    assert_eq!(getter.member_name(), Some("value="));
    assert_eq!(getter.invoke_standalone().unwrap(), Some(Value::Int(0)));
    assert_eq!(state.sets.load(Ordering::SeqCst), 0);

    let mut setter = PersistentCall::with_field(&field, Some(target.clone()), false);
    setter.set_arguments(&[Value::Int(12)]).unwrap();
    let mut event = PersistentEvent::<()>::new();
    event.add_persistent_call(setter);
    event.add_persistent_call(getter);

    event.invoke(&()).unwrap();
    assert_eq!(state.sets.load(Ordering::SeqCst), 1);
    assert_eq!(*state.value.lock(), 12);
}

#[test]
fn test_missing_type_is_skipped() {
    init();
    let target = recorder(11);
    let mut event = PersistentEvent::<()>::new();
    let missing = PersistentCall::from_parts(None, Some("tests::Missing.Explode".to_string()), Vec::new());
    assert!(!missing.is_invokable());
    event.add_persistent_call(missing);
    event.add_persistent_call(PersistentCall::with_method(&method("CallA", &[]), Some(target.clone())));

    event.invoke(&()).unwrap();
    assert_eq!(log_of(&target), vec!["CallA"]);
}

#[test]
fn test_json_round_trip_resolves_members() {
    init();
    let target = recorder(12);
    let objects = ObjectTable::new();
    objects.insert(target.clone());

    let mut event = PersistentEvent::<(i32,)>::new();
    event.add_persistent_call(PersistentCall::with_method(&method("CallA", &[]), Some(target.clone())));
    set_value_from(&mut event, &target, 0);

    let json = event.to_json().unwrap();
    let loaded = PersistentEvent::<(i32,)>::from_json(&json, &objects).unwrap();

    assert_eq!(loaded.persistent_calls().len(), 2);
    for (before, after) in event.persistent_calls().iter().zip(loaded.persistent_calls()) {
        assert_eq!(before.member(), after.member());
        assert_eq!(before.arguments(), after.arguments());
        assert!(after.target().unwrap().ptr_eq(&target));
    }
    assert_eq!(loaded.to_record(), event.to_record());

    loaded.invoke(&(1,)).unwrap();
    assert_eq!(log_of(&target), vec!["CallA", "SetValue(7)"]);
}

#[test]
fn test_errors_abort_remaining_calls() {
    init();
    let target = recorder(13);
    let ran_dynamic = Arc::new(AtomicUsize::new(0));
    let mut event = PersistentEvent::<()>::new();
    event.add_persistent_call(PersistentCall::with_method(&method("Fail", &[]), Some(target.clone())));
    event.add_persistent_call(PersistentCall::with_method(&method("CallA", &[]), Some(target.clone())));
    let counter = ran_dynamic.clone();
    event.add_dynamic_call(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let err = event.invoke(&()).unwrap_err();
    assert!(matches!(err, EventError::Invocation { .. }));
    assert!(err.to_string().contains("Fail"));

    assert!(!event.invoke_safe(&()));
    assert!(log_of(&target).is_empty());
    assert_eq!(ran_dynamic.load(Ordering::SeqCst), 0);
}

#[test]
fn test_forward_link_uses_default() {
    init();
    let target = recorder(14);
    let mut event = PersistentEvent::<()>::new();
    event.add_persistent_call(PersistentCall::with_method(
        &method("SetValue", &[keys::INT]),
        Some(target.clone()),
    ));
    event.add_persistent_call(PersistentCall::with_method(&method("CallA", &[]), Some(target.clone())));

    let result = event.link_argument(0, 0, LinkCandidate::ReturnValue(1));
    assert!(matches!(
        result,
        Err(EventError::ForwardLink {
            consumer: 0,
            producer: 1
        })
    ));

    event
        .persistent_call_mut(0)
        .unwrap()
        .argument_mut(0)
        .unwrap()
        .set_return_value_link(1);
    assert_eq!(event.forward_links(), vec![(0, 1)]);

    event.invoke(&()).unwrap();
    assert_eq!(log_of(&target), vec!["SetValue(0)", "CallA"]);
}

#[test]
fn test_recursive_invocation_keeps_own_return_values() {
    init();
    let mut event = PersistentEvent::<(i32,)>::new();
    event.bind_persistent(&method("Echo", &[keys::INT]), None).unwrap();
    event.bind_persistent(&method("Recurse", &[keys::INT]), None).unwrap();
    let mut record = PersistentCall::with_method(&method("Record", &[keys::INT]), None);
    record.argument_mut(0).unwrap().set_return_value_link(0);
    event.add_persistent_call(record);
    assert!(RECURSIVE.set(event).is_ok());

    RECURSIVE.get().unwrap().invoke(&(2,)).unwrap();
    assert_eq!(*RECORDED.lock(), vec![0, 1, 2]);
}

#[test]
fn test_bind_depends_on_play_state() {
    init();
    let target = recorder(15);
    let set_value = method("SetValue", &[keys::INT]);
    let mut event = PersistentEvent::<(i32,)>::new();

    let dynamic = event.bind(&RuntimeState, &set_value, Some(target.clone())).unwrap();
    assert!(matches!(dynamic, BoundListener::Dynamic(_)));
    assert!(event.to_record().calls.is_empty());

    let persistent = event.bind(&EditState, &set_value, Some(target.clone())).unwrap();
    assert_eq!(
        persistent,
        BoundListener::Persistent {
            member: MemberHandle::Method(set_value.clone()),
            target: Some(target.clone()),
        }
    );
    assert_eq!(event.to_record().calls.len(), 1);

    event.invoke(&(3,)).unwrap();
    assert_eq!(log_of(&target), vec!["SetValue(3)", "SetValue(3)"]);

    assert!(event.unbind(dynamic));
    assert!(!event.has_dynamic_calls());
}

#[test]
fn test_constructor_call() {
    init();
    let info = recorder_type();
    let constructor = &info.constructors()[0];

    let mut call = PersistentCall::with_method(constructor, None);
    assert_eq!(call.member_name(), Some("tests::Recorder.ctor"));
    call.set_arguments(&[Value::Int(77)]).unwrap();

    let Some(Value::Object(created)) = call.invoke_standalone().unwrap() else {
        panic!("constructor did not produce an object");
    };
    assert_eq!(created.instance_id(), ObjectId(77));
    assert_eq!(created.type_key(), RECORDER);
}

#[test]
fn test_default_parameter_is_seeded() {
    init();
    let target = recorder(16);
    let call = PersistentCall::with_method(&method("Configure", &[keys::FLOAT]), Some(target.clone()));

    let argument = &call.arguments()[0];
    assert_eq!(argument.literal(), Some(&Literal::Float(0.5)));
    let context = InvocationContext::new(&[], EventConfig::default());
    assert_eq!(argument.resolve(&context).unwrap(), Value::Float(0.5));

    call.invoke_standalone().unwrap();
    assert_eq!(log_of(&target), vec!["Configure(0.5)"]);
}

#[test]
fn test_argument_count_mismatch_is_unresolved() {
    init();
    let target = recorder(17);
    let mut call = PersistentCall::with_method(&method("SetValue", &[keys::INT]), Some(target.clone()));
    call.set_argument_list(Vec::new());

    assert!(call.resolve().is_none());
    assert_eq!(call.invoke_standalone().unwrap(), None);
    assert!(log_of(&target).is_empty());
}

#[test]
fn test_unbind_after_earlier_removal() {
    init();
    let set_value = method("SetValue", &[keys::INT]);
    let targets: Vec<ObjectRef> = (20..23).map(recorder).collect();
    let mut event = PersistentEvent::<(i32,)>::new();

    let listeners: Vec<BoundListener> = targets
        .iter()
        .map(|target| event.bind(&EditState, &set_value, Some(target.clone())).unwrap())
        .collect();

    assert!(event.unbind(listeners[0].clone()));
    assert!(event.unbind(listeners[1].clone()));
    assert!(!event.unbind(listeners[1].clone()));

    event.invoke(&(1,)).unwrap();
    assert!(log_of(&targets[0]).is_empty());
    assert!(log_of(&targets[1]).is_empty());
    assert_eq!(log_of(&targets[2]), vec!["SetValue(1)"]);
}

#[test]
fn test_mistyped_link_skips_only_that_call() {
    init();
    let target = recorder(24);
    let add = |ty: &str| {
        registry()
            .find_method(OPERATORS_TYPE, "Add", &[TypeKey::new(ty), TypeKey::new(ty)])
            .unwrap()
    };

    let mut event = PersistentEvent::<()>::new();
    event.add_persistent_call(PersistentCall::with_method(&add(keys::INT), None));
    event.add_persistent_call(PersistentCall::with_method(&add(keys::FLOAT), None));
    set_value_from(&mut event, &target, 0);
    event.add_persistent_call(PersistentCall::with_method(&method("CallA", &[]), Some(target.clone())));

    // The preserved link now points at the f32 producer
    event.remove_persistent_call(0).unwrap();
    assert_eq!(event.persistent_calls()[1].arguments()[0].return_value_index(), Some(0));

    event.invoke(&()).unwrap();
    assert_eq!(log_of(&target), vec!["CallA"]);
}

#[test]
fn test_insert_moves_links_with_producer() {
    init();
    let target = recorder(25);
    let mut event = PersistentEvent::<()>::new();
    event.add_persistent_call(PersistentCall::with_method(&method("CallA", &[]), Some(target.clone())));
    set_value_from(&mut event, &target, 0);

    event
        .insert_persistent_call(
            0,
            PersistentCall::with_method(&method("CallB", &[]), Some(target.clone())),
        )
        .unwrap();
    assert_eq!(event.persistent_calls()[2].arguments()[0].return_value_index(), Some(1));

    event.invoke(&()).unwrap();
    assert_eq!(log_of(&target), vec!["CallB", "CallA", "SetValue(7)"]);
}

#[test]
fn test_failed_resolution_cached_until_cleared() {
    init();
    static PINGS: AtomicUsize = AtomicUsize::new(0);

    let mut event = PersistentEvent::<()>::with_config(EventConfig::default().quiet());
    event.add_persistent_call(PersistentCall::from_parts(
        None,
        Some("tests::LateType.Ping".to_string()),
        Vec::new(),
    ));
    event.invoke(&()).unwrap();
    assert!(event.persistent_calls()[0].resolve().is_none());

    register_type(TypeInfo::class("tests::LateType").with_method(
        MethodInfo::new("Ping", |_, _| {
            PINGS.fetch_add(1, Ordering::SeqCst);
            Ok(Value::Null)
        })
        .static_method(),
    ))
    .unwrap();

    event.invoke(&()).unwrap();
    assert_eq!(PINGS.load(Ordering::SeqCst), 0);

    event.clear_caches();
    assert!(event.persistent_calls()[0].is_invokable());
    event.invoke(&()).unwrap();
    assert_eq!(PINGS.load(Ordering::SeqCst), 1);
}
