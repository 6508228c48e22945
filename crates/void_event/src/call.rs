//! Persistent calls
//!
//! A persistent call stores a member by name together with its target and
//! arguments, so it can be serialized and resolved again later.
//!
//! Member names are encoded as `["<TypeKey>."] <name> ["="]`:
//! - static members and constructors carry the declaring type and have no
//!   target; instance members use the target's type
//! - fields end with `=`; zero arguments read the field, one writes it
//! - constructors are named `ctor`

use crate::argument::{ArgumentKind, InvocationContext, PersistentArgument};
use crate::config::EventConfig;
use crate::error::{EventError, Result};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use void_reflect::{
    find_type, keys, registry, FieldInfo, MemberHandle, MethodInfo, ObjectRef, TypeKey, TypeKind,
    Value,
};

/// Marks a member name as a field
pub const FIELD_NAME_SUFFIX: char = '=';

/// Member name of constructors
pub const CONSTRUCTOR_NAME: &str = MethodInfo::CONSTRUCTOR_NAME;

// ========== Resolved Members ==========

/// Live member a persistent call resolved to
#[derive(Clone, Debug)]
pub enum ResolvedMember {
    FieldGet(Arc<FieldInfo>),
    FieldSet(Arc<FieldInfo>),
    Method(Arc<MethodInfo>),
    Constructor(Arc<MethodInfo>),
}

impl ResolvedMember {
    /// Underlying member handle
    pub fn handle(&self) -> MemberHandle {
        match self {
            ResolvedMember::FieldGet(field) | ResolvedMember::FieldSet(field) => {
                MemberHandle::Field(field.clone())
            }
            ResolvedMember::Method(method) | ResolvedMember::Constructor(method) => {
                MemberHandle::Method(method.clone())
            }
        }
    }

    pub fn name(&self) -> &str {
        match self {
            ResolvedMember::FieldGet(field) | ResolvedMember::FieldSet(field) => &field.name,
            ResolvedMember::Method(method) | ResolvedMember::Constructor(method) => &method.name,
        }
    }

    pub fn declaring_type(&self) -> &TypeKey {
        match self {
            ResolvedMember::FieldGet(field) | ResolvedMember::FieldSet(field) => &field.declaring_type,
            ResolvedMember::Method(method) | ResolvedMember::Constructor(method) => {
                &method.declaring_type
            }
        }
    }

    /// Type of the value passed in for each argument
    pub fn parameter_types(&self) -> Vec<TypeKey> {
        match self {
            ResolvedMember::FieldGet(_) => Vec::new(),
            ResolvedMember::FieldSet(field) => vec![field.field_type.clone()],
            ResolvedMember::Method(method) | ResolvedMember::Constructor(method) => {
                method.parameter_types()
            }
        }
    }

    /// Type of the produced value, `None` when nothing is produced
    pub fn return_type(&self) -> Option<TypeKey> {
        match self {
            ResolvedMember::FieldGet(field) => Some(field.field_type.clone()),
            ResolvedMember::FieldSet(_) => None,
            ResolvedMember::Method(method) | ResolvedMember::Constructor(method) => {
                method.return_type.clone()
            }
        }
    }

    /// Whether a target is required
    pub fn needs_target(&self) -> bool {
        !self.handle().is_static()
    }
}

impl PartialEq for ResolvedMember {
    fn eq(&self, other: &Self) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other) && self.handle() == other.handle()
    }
}

/// Parsed member name
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemberDetails {
    /// Declaring type, from the target or the name's qualifier
    pub declaring_type: Option<TypeKey>,
    /// Bare member name
    pub name: String,
    pub is_field: bool,
}

// ========== Persistent Call ==========

/// Serializable binding of a member, a target and its arguments
pub struct PersistentCall {
    target: Option<ObjectRef>,
    member_name: Option<String>,
    arguments: Vec<PersistentArgument>,
    /// Outer `None` means not resolved yet, inner `None` a cached failure
    resolved: Mutex<Option<Option<ResolvedMember>>>,
}

impl PersistentCall {
    /// Create an empty call
    pub fn new() -> Self {
        Self {
            target: None,
            member_name: None,
            arguments: Vec::new(),
            resolved: Mutex::new(None),
        }
    }

    /// Create a call to a method
    pub fn with_method(method: &Arc<MethodInfo>, target: Option<ObjectRef>) -> Self {
        let mut call = Self::new();
        call.set_method(method, target);
        call
    }

    /// Create a call to a field getter or setter
    pub fn with_field(field: &Arc<FieldInfo>, target: Option<ObjectRef>, is_getter: bool) -> Self {
        let mut call = Self::new();
        call.set_field(field, target, is_getter);
        call
    }

    /// Create a call from raw serialized parts
    pub fn from_parts(
        target: Option<ObjectRef>,
        member_name: Option<String>,
        arguments: Vec<PersistentArgument>,
    ) -> Self {
        Self {
            target,
            member_name,
            arguments,
            resolved: Mutex::new(None),
        }
    }

    // ========== Configuration ==========

    /// Bind to a method or constructor
    ///
    /// Static members drop the target and store a qualified name. The
    /// argument list keeps its entries when the parameter count is
    /// unchanged; constant arguments are seeded with declared defaults.
    pub fn set_method(&mut self, method: &Arc<MethodInfo>, target: Option<ObjectRef>) {
        if method.is_static || method.is_constructor {
            self.member_name = Some(format!("{}.{}", method.declaring_type, method.name));
            self.target = None;
        } else {
            self.member_name = Some(method.name.clone());
            self.target = target;
        }

        if self.arguments.len() != method.parameters.len() {
            self.arguments = method
                .parameters
                .iter()
                .map(|p| PersistentArgument::new(p.parameter_type.clone()))
                .collect();
        }

        for (argument, parameter) in self.arguments.iter_mut().zip(&method.parameters) {
            argument.set_declared_type(parameter.parameter_type.clone());
            if argument.kind() != ArgumentKind::Constant {
                continue;
            }
            if let Some(default) = &parameter.default_value {
                if let Err(e) = argument.set_value(default) {
                    log::warn!(
                        "Default value of parameter '{}' on '{}' cannot be stored: {}",
                        parameter.name,
                        method.full_name(),
                        e
                    );
                }
            }
        }

        let resolved = if method.is_constructor {
            ResolvedMember::Constructor(method.clone())
        } else {
            ResolvedMember::Method(method.clone())
        };
        *self.resolved.get_mut() = Some(Some(resolved));
    }

    /// Bind to a field
    ///
    /// Returns the value argument of a setter.
    pub fn set_field(
        &mut self,
        field: &Arc<FieldInfo>,
        target: Option<ObjectRef>,
        is_getter: bool,
    ) -> Option<&mut PersistentArgument> {
        let name = if field.is_static {
            self.target = None;
            format!("{}.{}", field.declaring_type, field.name)
        } else {
            self.target = target;
            field.name.clone()
        };
        self.member_name = Some(format!("{}{}", name, FIELD_NAME_SUFFIX));

        let argument_count = if is_getter { 0 } else { 1 };
        if self.arguments.len() != argument_count {
            self.arguments = (0..argument_count)
                .map(|_| PersistentArgument::new(field.field_type.clone()))
                .collect();
        }

        let resolved = if is_getter {
            ResolvedMember::FieldGet(field.clone())
        } else {
            ResolvedMember::FieldSet(field.clone())
        };
        *self.resolved.get_mut() = Some(Some(resolved));

        let argument = self.arguments.first_mut()?;
        argument.set_declared_type(field.field_type.clone());
        Some(argument)
    }

    /// Unbind the member
    pub fn clear_member(&mut self) {
        self.member_name = None;
        self.arguments.clear();
        *self.resolved.get_mut() = None;
    }

    /// Change the target; instance members resolve against the new type
    pub fn set_target(&mut self, target: Option<ObjectRef>) {
        self.target = target;
        self.clear_cache();
    }

    /// Set the serialized member name directly
    pub fn set_member_name(&mut self, member_name: Option<String>) {
        self.member_name = member_name;
        self.clear_cache();
    }

    /// Replace the literals of the first arguments
    pub fn set_arguments(&mut self, values: &[Value]) -> Result<()> {
        if values.len() > self.arguments.len() {
            return Err(EventError::ArgumentOutOfRange {
                index: values.len() - 1,
                len: self.arguments.len(),
            });
        }
        for (argument, value) in self.arguments.iter_mut().zip(values) {
            argument.set_value(value)?;
        }
        Ok(())
    }

    /// Replace the whole argument list
    pub fn set_argument_list(&mut self, arguments: Vec<PersistentArgument>) {
        self.arguments = arguments;
        self.clear_cache();
    }

    pub fn arguments(&self) -> &[PersistentArgument] {
        &self.arguments
    }

    /// Mutable arguments
    ///
    /// Changing declared types changes which overload resolves, so call
    /// `clear_cache` afterwards.
    pub fn arguments_mut(&mut self) -> &mut [PersistentArgument] {
        &mut self.arguments
    }

    pub fn argument_mut(&mut self, index: usize) -> Result<&mut PersistentArgument> {
        let len = self.arguments.len();
        self.arguments
            .get_mut(index)
            .ok_or(EventError::ArgumentOutOfRange { index, len })
    }

    pub fn target(&self) -> Option<&ObjectRef> {
        self.target.as_ref()
    }

    pub fn member_name(&self) -> Option<&str> {
        self.member_name.as_deref()
    }

    // ========== Resolution ==========

    /// Whether the name refers to a field
    pub fn is_field(&self) -> bool {
        self.member_name
            .as_deref()
            .is_some_and(|name| name.ends_with(FIELD_NAME_SUFFIX))
    }

    /// Whether a field call reads instead of writes
    pub fn is_getter(&self) -> bool {
        self.arguments.is_empty()
    }

    /// Parse the member name
    pub fn member_details(&self) -> Option<MemberDetails> {
        let raw = self.member_name.as_deref().filter(|name| !name.is_empty())?;

        let (declaring_type, bare) = match &self.target {
            Some(target) => (Some(target.type_key()), raw),
            None => match raw.rsplit_once('.') {
                Some((type_name, bare)) => (Some(TypeKey::new(type_name)), bare),
                None => (None, raw),
            },
        };

        let (name, is_field) = match bare.strip_suffix(FIELD_NAME_SUFFIX) {
            Some(name) => (name, true),
            None => (bare, false),
        };

        Some(MemberDetails {
            declaring_type,
            name: name.to_string(),
            is_field,
        })
    }

    /// Resolve the member, using the cached result when present
    pub fn resolve(&self) -> Option<ResolvedMember> {
        let mut resolved = self.resolved.lock();
        if let Some(cached) = resolved.as_ref() {
            return cached.clone();
        }
        let member = self.lookup();
        *resolved = Some(member.clone());
        member
    }

    fn lookup(&self) -> Option<ResolvedMember> {
        let details = self.member_details()?;
        let declaring_type = details.declaring_type?;
        let info = find_type(declaring_type.as_str())?;
        let registry = registry();

        if details.is_field {
            let field = registry.find_field(info.key.as_str(), &details.name)?;
            return match self.arguments.len() {
                0 => Some(ResolvedMember::FieldGet(field)),
                1 => Some(ResolvedMember::FieldSet(field)),
                count => {
                    log::error!(
                        "Field '{}' is bound with {} arguments; fields take 0 (get) or 1 (set)",
                        field.full_name(),
                        count
                    );
                    None
                }
            };
        }

        let parameter_types: Vec<TypeKey> = self
            .arguments
            .iter()
            .map(|argument| argument.declared_type().clone())
            .collect();

        let method = if details.name == CONSTRUCTOR_NAME {
            registry.find_constructor(info.key.as_str(), &parameter_types)
        } else {
            registry.find_method(info.key.as_str(), &details.name, &parameter_types)
        };

        match method {
            Some(method) if method.is_constructor => Some(ResolvedMember::Constructor(method)),
            Some(method) => Some(ResolvedMember::Method(method)),
            None => {
                let overloads = registry.methods_named(info.key.as_str(), &details.name);
                if !overloads.is_empty() {
                    let counts: Vec<String> = overloads
                        .iter()
                        .map(|m| m.parameters.len().to_string())
                        .collect();
                    log::error!(
                        "No overload of '{}.{}' takes ({}); available overloads take {} argument(s)",
                        info.key,
                        details.name,
                        type_list(&parameter_types),
                        counts.join(" or ")
                    );
                }
                None
            }
        }
    }

    /// Forget the resolved member
    pub fn clear_cache(&self) {
        *self.resolved.lock() = None;
    }

    /// Resolved member handle
    pub fn member(&self) -> Option<MemberHandle> {
        self.resolve().map(|member| member.handle())
    }

    pub fn parameter_types(&self) -> Option<Vec<TypeKey>> {
        self.resolve().map(|member| member.parameter_types())
    }

    /// Type of the produced value, `None` when unresolved or nothing is produced
    pub fn return_type(&self) -> Option<TypeKey> {
        self.resolve().and_then(|member| member.return_type())
    }

    /// Whether invoking would reach a member
    pub fn is_invokable(&self) -> bool {
        match self.resolve() {
            Some(member) => !member.needs_target() || self.target.is_some(),
            None => false,
        }
    }

    /// Whether values of the type can be stored as constant arguments
    pub fn is_supported_native(type_key: &TypeKey) -> bool {
        registry().is_supported_native(type_key.as_str())
    }

    // ========== Invocation ==========

    /// Invoke with the given invocation state
    ///
    /// Returns the produced value, `None` for void members, setters and
    /// unresolved members.
    pub fn invoke(&self, context: &InvocationContext<'_>) -> Result<Option<Value>> {
        let Some(member) = self.resolve() else {
            self.warn_unresolved(context.config());
            return Ok(None);
        };

        let target = self.target.as_ref();
        match &member {
            ResolvedMember::FieldGet(field) => field
                .get_value(target)
                .map(Some)
                .map_err(|e| EventError::invocation(field.full_name(), e)),
            ResolvedMember::FieldSet(field) => {
                let Some(value) = self
                    .resolve_arguments(&member, context)?
                    .and_then(|mut values| values.pop())
                else {
                    return Ok(None);
                };
                field
                    .set_value(target, value)
                    .map(|_| None)
                    .map_err(|e| EventError::invocation(field.full_name(), e))
            }
            ResolvedMember::Method(method) | ResolvedMember::Constructor(method) => {
                let Some(arguments) = self.resolve_arguments(&member, context)? else {
                    return Ok(None);
                };
                if arguments.len() != method.parameters.len() {
                    return Ok(None);
                }
                let value = method
                    .invoke(target, &arguments)
                    .map_err(|e| EventError::invocation(method.full_name(), e))?;
                Ok(method.return_type.as_ref().map(|_| value))
            }
        }
    }

    /// Invoke outside of an event
    pub fn invoke_standalone(&self) -> Result<Option<Value>> {
        let context = InvocationContext::new(&[], EventConfig::default());
        self.invoke(&context)
    }

    /// Resolve every argument
    ///
    /// `None` means an argument does not fit its declared type; the call is
    /// skipped for this invocation.
    fn resolve_arguments(
        &self,
        member: &ResolvedMember,
        context: &InvocationContext<'_>,
    ) -> Result<Option<Vec<Value>>> {
        let mut values = Vec::with_capacity(self.arguments.len());
        for (index, argument) in self.arguments.iter().enumerate() {
            let value = match argument.resolve(context) {
                Ok(value) => value,
                Err(EventError::TypeMismatch { expected, found }) => {
                    log::error!(
                        "Argument {} of '{}.{}' holds a {} literal that does not fit {}; skipping call",
                        index,
                        member.declaring_type(),
                        member.name(),
                        found,
                        expected
                    );
                    return Ok(None);
                }
                Err(e) => return Err(e),
            };

            if !value_fits(argument.declared_type(), &value) {
                log::error!(
                    "Argument {} of '{}.{}' is linked to a {} value that does not fit {}; skipping call",
                    index,
                    member.declaring_type(),
                    member.name(),
                    value.type_name(),
                    argument.declared_type()
                );
                return Ok(None);
            }
            values.push(value);
        }
        Ok(Some(values))
    }

    fn warn_unresolved(&self, config: &EventConfig) {
        if !config.warn_on_missing_members {
            return;
        }
        let kind = if self.is_field() { "field" } else { "method" };
        let member_name = self.member_name.as_deref().unwrap_or("<none>");
        match &self.target {
            Some(target) => log::warn!(
                "Persistent call could not find its {} '{}.{}' (target {})",
                kind,
                target.type_key(),
                member_name,
                target.name()
            ),
            None => log::warn!(
                "Persistent call could not find its {} '{}' (no target)",
                kind,
                member_name
            ),
        }
    }
}

fn type_list(types: &[TypeKey]) -> String {
    types
        .iter()
        .map(|key| key.short_name())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Whether a resolved argument can be passed as `declared_type`
///
/// Numbers follow the widening rules of the typed converters; null fits
/// anything that is not a primitive or an enum.
fn value_fits(declared_type: &TypeKey, value: &Value) -> bool {
    let registry = registry();
    let Some(found) = value.type_key() else {
        return registry
            .get(declared_type.as_str())
            .map_or(true, |info| matches!(info.kind, TypeKind::Object | TypeKind::Class));
    };
    if registry.is_assignable(declared_type.as_str(), found.as_str()) {
        return true;
    }
    match declared_type.as_str() {
        keys::INT => value.as_int().is_some(),
        keys::LONG => value.as_long().is_some(),
        keys::FLOAT => value.as_float().is_some(),
        keys::DOUBLE => value.as_double().is_some(),
        _ => false,
    }
}

impl Default for PersistentCall {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for PersistentCall {
    fn clone(&self) -> Self {
        Self {
            target: self.target.clone(),
            member_name: self.member_name.clone(),
            arguments: self.arguments.clone(),
            resolved: Mutex::new(self.resolved.lock().clone()),
        }
    }
}

impl fmt::Debug for PersistentCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistentCall")
            .field("target", &self.target)
            .field("member_name", &self.member_name)
            .field("arguments", &self.arguments)
            .finish()
    }
}

impl fmt::Display for PersistentCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(target) = &self.target {
            write!(f, "{} -> ", target.name())?;
        }
        write!(f, "{}", self.member_name.as_deref().unwrap_or("<none>"))?;
        let arguments: Vec<String> = self.arguments.iter().map(|a| a.to_string()).collect();
        write!(f, "({})", arguments.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::argument::Literal;
    use std::any::Any;
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::sync::OnceLock;
    use void_reflect::{keys, register_type, EngineObject, ObjectId, TypeInfo};

    #[derive(Debug, Default)]
    struct Lamp {
        brightness: AtomicI32,
        writes: AtomicI32,
    }

    impl EngineObject for Lamp {
        fn type_key(&self) -> TypeKey {
            TypeKey::new("call_tests::Lamp")
        }

        fn instance_id(&self) -> ObjectId {
            ObjectId(77)
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    fn lamp_type() -> Arc<TypeInfo> {
        static INFO: OnceLock<Arc<TypeInfo>> = OnceLock::new();
        INFO.get_or_init(|| {
            register_type(
                TypeInfo::object("call_tests::Lamp")
                    .with_field(FieldInfo::instance::<Lamp, i32, _, _>(
                        "brightness",
                        |lamp| lamp.brightness.load(Ordering::SeqCst),
                        |lamp, value| {
                            lamp.writes.fetch_add(1, Ordering::SeqCst);
                            lamp.brightness.store(value, Ordering::SeqCst)
                        },
                    ))
                    .with_method(MethodInfo::action1::<Lamp, i32, _>("Dim", "amount", |lamp, amount| {
                        lamp.brightness.fetch_sub(amount, Ordering::SeqCst);
                    }))
                    .with_method(
                        MethodInfo::function2::<i32, i32, i32, _>("Clamp", ["value", "max"], i32::min)
                            .param_with_default("inclusive", keys::BOOL, Value::Bool(true)),
                    ),
            )
            .unwrap()
        })
        .clone()
    }

    #[test]
    fn test_method_name_encoding() {
        let info = lamp_type();
        let lamp = ObjectRef::new(Lamp::default());

        let dim = PersistentCall::with_method(&info.methods()[0], Some(lamp.clone()));
        assert_eq!(dim.member_name(), Some("Dim"));
        assert!(dim.target().is_some());

        let clamp = PersistentCall::with_method(&info.methods()[1], Some(lamp));
        assert_eq!(clamp.member_name(), Some("call_tests::Lamp.Clamp"));
        assert!(clamp.target().is_none());
        assert_eq!(clamp.arguments()[2].literal(), Some(&Literal::Bool(true)));
    }

    #[test]
    fn test_field_name_encoding() {
        let info = lamp_type();
        let lamp = ObjectRef::new(Lamp::default());

        let mut call = PersistentCall::new();
        let argument = call.set_field(&info.fields()[0], Some(lamp.clone()), false);
        assert!(argument.is_some());
        assert_eq!(call.member_name(), Some("brightness="));
        assert!(call.is_field());
        assert!(!call.is_getter());

        let details = call.member_details().unwrap();
        assert_eq!(details.name, "brightness");
        assert_eq!(details.declaring_type, Some(TypeKey::new("call_tests::Lamp")));

        assert!(call.set_field(&info.fields()[0], Some(lamp), true).is_none());
        assert!(call.arguments().is_empty());
    }

    #[test]
    fn test_resolve_from_raw_name() {
        lamp_type();
        let lamp = ObjectRef::new(Lamp::default());

        let call = PersistentCall::from_parts(
            Some(lamp.clone()),
            Some("Dim".to_string()),
            vec![PersistentArgument::new(keys::INT)],
        );
        assert!(matches!(call.resolve(), Some(ResolvedMember::Method(_))));
        assert!(call.is_invokable());

        let wrong_count = PersistentCall::from_parts(Some(lamp), Some("Dim".to_string()), Vec::new());
        assert!(wrong_count.resolve().is_none());
    }

    #[test]
    fn test_setter_writes_once_getter_never() {
        let info = lamp_type();
        let lamp = Arc::new(Lamp::default());
        let target = ObjectRef::from(lamp.clone());

        let mut setter = PersistentCall::new();
        setter
            .set_field(&info.fields()[0], Some(target.clone()), false)
            .unwrap()
            .set_constant(Literal::Int(9));
        assert_eq!(setter.invoke_standalone().unwrap(), None);
        assert_eq!(lamp.writes.load(Ordering::SeqCst), 1);

        let getter = PersistentCall::with_field(&info.fields()[0], Some(target), true);
        assert_eq!(getter.invoke_standalone().unwrap(), Some(Value::Int(9)));
        assert_eq!(lamp.writes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unresolved_call_is_skipped() {
        let call = PersistentCall::from_parts(
            None,
            Some("call_tests::Removed.Explode".to_string()),
            Vec::new(),
        );
        assert!(call.resolve().is_none());
        assert!(!call.is_invokable());
        assert_eq!(call.invoke_standalone().unwrap(), None);
    }

    #[test]
    fn test_missing_target_is_an_invocation_error() {
        let info = lamp_type();
        let mut call = PersistentCall::with_method(&info.methods()[0], None);
        assert!(!call.is_invokable());
        assert!(matches!(
            call.invoke_standalone(),
            Err(EventError::Invocation { .. })
        ));

        call.set_target(Some(ObjectRef::new(Lamp::default())));
        assert!(call.is_invokable());
    }

    #[test]
    fn test_display() {
        let info = lamp_type();
        let mut call = PersistentCall::with_method(&info.methods()[1], None);
        call.set_arguments(&[Value::Int(4), Value::Int(2)]).unwrap();
        assert_eq!(call.to_string(), "call_tests::Lamp.Clamp(4, 2, true)");
    }
}
