//! Runtime type registry
//!
//! Types register their fields, methods and constructors by name so that
//! serialized persistent calls can find them again when they are loaded.
//! Members are shared as `Arc`s; two handles refer to the same member when
//! they point at the same registration.

use crate::error::{ReflectError, Result};
use crate::object::{downcast_target, EngineObject, ObjectRef};
use crate::value::{Color, Color32, Quat, Rect, Reflected, Value, Vec2, Vec3, Vec4};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// Keys of the built-in types
pub mod keys {
    pub const BOOL: &str = "bool";
    pub const INT: &str = "i32";
    pub const LONG: &str = "i64";
    pub const FLOAT: &str = "f32";
    pub const DOUBLE: &str = "f64";
    pub const STRING: &str = "String";
    pub const VEC2: &str = "Vec2";
    pub const VEC3: &str = "Vec3";
    pub const VEC4: &str = "Vec4";
    pub const QUAT: &str = "Quat";
    pub const COLOR: &str = "Color";
    pub const COLOR32: &str = "Color32";
    pub const RECT: &str = "Rect";
    /// Root of every engine object type
    pub const OBJECT: &str = "Object";
}

// ========== Type Keys ==========

/// Registered name of a type, e.g. `game::Door`
///
/// Keys never contain '.', which separates the type from the member in
/// serialized member names.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeKey(String);

impl TypeKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Key of a reflected Rust type
    pub fn of<T: Reflected>() -> Self {
        T::type_key()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name without the module path
    pub fn short_name(&self) -> &str {
        self.0.rsplit("::").next().unwrap_or(&self.0)
    }

    /// Name shown to users
    pub fn display_name(&self, full: bool) -> &str {
        if full {
            self.as_str()
        } else {
            self.short_name()
        }
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeKey({:?})", self.0)
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TypeKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for TypeKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl From<&TypeKey> for TypeKey {
    fn from(key: &TypeKey) -> Self {
        key.clone()
    }
}

impl Borrow<str> for TypeKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for TypeKey {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for TypeKey {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

// ========== Type Info ==========

/// Types with a native literal representation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    Bool,
    Int,
    Long,
    Float,
    Double,
    String,
    Vec2,
    Vec3,
    Vec4,
    Quat,
    Color,
    Color32,
    Rect,
}

impl PrimitiveType {
    pub const ALL: [PrimitiveType; 13] = [
        PrimitiveType::Bool,
        PrimitiveType::Int,
        PrimitiveType::Long,
        PrimitiveType::Float,
        PrimitiveType::Double,
        PrimitiveType::String,
        PrimitiveType::Vec2,
        PrimitiveType::Vec3,
        PrimitiveType::Vec4,
        PrimitiveType::Quat,
        PrimitiveType::Color,
        PrimitiveType::Color32,
        PrimitiveType::Rect,
    ];

    pub fn key(self) -> &'static str {
        match self {
            PrimitiveType::Bool => keys::BOOL,
            PrimitiveType::Int => keys::INT,
            PrimitiveType::Long => keys::LONG,
            PrimitiveType::Float => keys::FLOAT,
            PrimitiveType::Double => keys::DOUBLE,
            PrimitiveType::String => keys::STRING,
            PrimitiveType::Vec2 => keys::VEC2,
            PrimitiveType::Vec3 => keys::VEC3,
            PrimitiveType::Vec4 => keys::VEC4,
            PrimitiveType::Quat => keys::QUAT,
            PrimitiveType::Color => keys::COLOR,
            PrimitiveType::Color32 => keys::COLOR32,
            PrimitiveType::Rect => keys::RECT,
        }
    }

    pub fn default_value(self) -> Value {
        match self {
            PrimitiveType::Bool => Value::Bool(false),
            PrimitiveType::Int => Value::Int(0),
            PrimitiveType::Long => Value::Long(0),
            PrimitiveType::Float => Value::Float(0.0),
            PrimitiveType::Double => Value::Double(0.0),
            PrimitiveType::String => Value::String(String::new()),
            PrimitiveType::Vec2 => Value::Vec2(Vec2::default()),
            PrimitiveType::Vec3 => Value::Vec3(Vec3::default()),
            PrimitiveType::Vec4 => Value::Vec4(Vec4::default()),
            PrimitiveType::Quat => Value::Quat(Quat::default()),
            PrimitiveType::Color => Value::Color(Color::default()),
            PrimitiveType::Color32 => Value::Color32(Color32::default()),
            PrimitiveType::Rect => Value::Rect(Rect::default()),
        }
    }

    /// Whether a constant of this type can be stored in an argument cell
    ///
    /// 64-bit integers only travel through links.
    pub fn has_literal(self) -> bool {
        !matches!(self, PrimitiveType::Long)
    }
}

/// Category of a registered type
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TypeKind {
    Primitive(PrimitiveType),
    /// Enum backed by `i32`
    Enum,
    /// Engine object, assignable to `Object`
    Object,
    /// Plain type that only exposes static members
    Class,
}

/// Registered type with its members
pub struct TypeInfo {
    /// Full key
    pub key: TypeKey,
    pub kind: TypeKind,
    /// Base type for assignability and inherited member lookup
    pub base: Option<TypeKey>,
    fields: Vec<Arc<FieldInfo>>,
    methods: Vec<Arc<MethodInfo>>,
    constructors: Vec<Arc<MethodInfo>>,
    variants: Vec<(String, i32)>,
}

impl TypeInfo {
    fn with_kind(key: impl Into<TypeKey>, kind: TypeKind) -> Self {
        Self {
            key: key.into(),
            kind,
            base: None,
            fields: Vec::new(),
            methods: Vec::new(),
            constructors: Vec::new(),
            variants: Vec::new(),
        }
    }

    /// Built-in primitive
    pub fn primitive(primitive: PrimitiveType) -> Self {
        Self::with_kind(primitive.key(), TypeKind::Primitive(primitive))
    }

    /// Engine object type deriving from `Object`
    pub fn object(key: impl Into<TypeKey>) -> Self {
        Self::with_kind(key, TypeKind::Object).with_base(keys::OBJECT)
    }

    /// Type with static members only
    pub fn class(key: impl Into<TypeKey>) -> Self {
        Self::with_kind(key, TypeKind::Class)
    }

    /// Enum with named variants
    pub fn enumeration<I, S>(key: impl Into<TypeKey>, variants: I) -> Self
    where
        I: IntoIterator<Item = (S, i32)>,
        S: Into<String>,
    {
        let mut info = Self::with_kind(key, TypeKind::Enum);
        info.variants = variants
            .into_iter()
            .map(|(name, value)| (name.into(), value))
            .collect();
        info
    }

    /// Set the base type
    pub fn with_base(mut self, base: impl Into<TypeKey>) -> Self {
        self.base = Some(base.into());
        self
    }

    /// Add a field declared by this type
    pub fn with_field(mut self, mut field: FieldInfo) -> Self {
        field.declaring_type = self.key.clone();
        self.fields.push(Arc::new(field));
        self
    }

    /// Add a method declared by this type
    pub fn with_method(mut self, mut method: MethodInfo) -> Self {
        method.declaring_type = self.key.clone();
        self.methods.push(Arc::new(method));
        self
    }

    /// Add a constructor; it returns an instance of this type
    pub fn with_constructor(mut self, mut constructor: MethodInfo) -> Self {
        constructor.name = MethodInfo::CONSTRUCTOR_NAME.to_string();
        constructor.declaring_type = self.key.clone();
        constructor.return_type = Some(self.key.clone());
        constructor.is_constructor = true;
        constructor.is_static = true;
        self.constructors.push(Arc::new(constructor));
        self
    }

    pub fn name(&self) -> &str {
        self.key.short_name()
    }

    pub fn fields(&self) -> &[Arc<FieldInfo>] {
        &self.fields
    }

    pub fn methods(&self) -> &[Arc<MethodInfo>] {
        &self.methods
    }

    pub fn constructors(&self) -> &[Arc<MethodInfo>] {
        &self.constructors
    }

    pub fn variants(&self) -> &[(String, i32)] {
        &self.variants
    }

    pub fn variant_name(&self, value: i32) -> Option<&str> {
        self.variants
            .iter()
            .find(|(_, v)| *v == value)
            .map(|(name, _)| name.as_str())
    }

    pub fn primitive_type(&self) -> Option<PrimitiveType> {
        match self.kind {
            TypeKind::Primitive(p) => Some(p),
            _ => None,
        }
    }

    pub fn is_enum(&self) -> bool {
        self.kind == TypeKind::Enum
    }

    pub fn is_object(&self) -> bool {
        self.kind == TypeKind::Object
    }

    /// Default value of this type
    ///
    /// Enums default to their first variant, objects to null.
    pub fn default_value(&self) -> Value {
        match self.kind {
            TypeKind::Primitive(p) => p.default_value(),
            TypeKind::Enum => Value::Enum {
                type_key: self.key.clone(),
                value: self.variants.first().map(|(_, v)| *v).unwrap_or(0),
            },
            TypeKind::Object | TypeKind::Class => Value::Null,
        }
    }
}

impl fmt::Debug for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeInfo")
            .field("key", &self.key)
            .field("kind", &self.kind)
            .field("base", &self.base)
            .field("fields", &self.fields.len())
            .field("methods", &self.methods.len())
            .field("constructors", &self.constructors.len())
            .finish()
    }
}

// ========== Fields ==========

pub type FieldGetter = Arc<dyn Fn(Option<&ObjectRef>) -> Result<Value> + Send + Sync>;
pub type FieldSetter = Arc<dyn Fn(Option<&ObjectRef>, Value) -> Result<()> + Send + Sync>;

/// Registered field
pub struct FieldInfo {
    pub name: String,
    /// Set by `TypeInfo::with_field`
    pub declaring_type: TypeKey,
    pub field_type: TypeKey,
    pub is_static: bool,
    getter: FieldGetter,
    setter: Option<FieldSetter>,
}

impl FieldInfo {
    /// Create a read-only instance field
    pub fn new<G>(name: impl Into<String>, field_type: impl Into<TypeKey>, getter: G) -> Self
    where
        G: Fn(Option<&ObjectRef>) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            declaring_type: TypeKey::new(keys::OBJECT),
            field_type: field_type.into(),
            is_static: false,
            getter: Arc::new(getter),
            setter: None,
        }
    }

    /// Make the field writable
    pub fn with_setter<S>(mut self, setter: S) -> Self
    where
        S: Fn(Option<&ObjectRef>, Value) -> Result<()> + Send + Sync + 'static,
    {
        self.setter = Some(Arc::new(setter));
        self
    }

    /// Mark as static
    pub fn static_field(mut self) -> Self {
        self.is_static = true;
        self
    }

    /// Writable instance field on a concrete object type
    pub fn instance<T, V, G, S>(name: &str, get: G, set: S) -> Self
    where
        T: EngineObject,
        V: Reflected,
        G: Fn(&T) -> V + Send + Sync + 'static,
        S: Fn(&T, V) + Send + Sync + 'static,
    {
        let get_name = name.to_string();
        let set_name = name.to_string();
        Self::new(name, V::type_key(), move |target| {
            let object = downcast_target::<T>(target, &get_name)?;
            Ok(get(object).into_value())
        })
        .with_setter(move |target, value| {
            let object = downcast_target::<T>(target, &set_name)?;
            let value = V::from_value(&value)
                .ok_or_else(|| ReflectError::type_mismatch(V::type_key().to_string(), value.type_name()))?;
            set(object, value);
            Ok(())
        })
    }

    pub fn is_read_only(&self) -> bool {
        self.setter.is_none()
    }

    /// `Type.name`
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.declaring_type, self.name)
    }

    /// Read the field
    pub fn get_value(&self, target: Option<&ObjectRef>) -> Result<Value> {
        if !self.is_static && target.is_none() {
            return Err(ReflectError::MissingTarget(self.full_name()));
        }
        let target = if self.is_static { None } else { target };
        (self.getter)(target)
    }

    /// Write the field
    pub fn set_value(&self, target: Option<&ObjectRef>, value: Value) -> Result<()> {
        let setter = self
            .setter
            .as_ref()
            .ok_or_else(|| ReflectError::ReadOnlyField(self.full_name()))?;
        if !self.is_static && target.is_none() {
            return Err(ReflectError::MissingTarget(self.full_name()));
        }
        let target = if self.is_static { None } else { target };
        setter(target, value)
    }
}

impl fmt::Debug for FieldInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldInfo")
            .field("name", &self.name)
            .field("declaring_type", &self.declaring_type)
            .field("field_type", &self.field_type)
            .field("is_static", &self.is_static)
            .field("read_only", &self.is_read_only())
            .finish()
    }
}

// ========== Methods ==========

pub type MethodInvoker = Arc<dyn Fn(Option<&ObjectRef>, &[Value]) -> Result<Value> + Send + Sync>;

/// Parameter of a method or constructor
#[derive(Clone, Debug)]
pub struct ParameterInfo {
    pub name: String,
    pub parameter_type: TypeKey,
    /// Declared default, used to seed new argument cells
    pub default_value: Option<Value>,
}

/// Registered method or constructor
pub struct MethodInfo {
    pub name: String,
    /// Set by `TypeInfo::with_method`
    pub declaring_type: TypeKey,
    pub parameters: Vec<ParameterInfo>,
    /// `None` for methods that return nothing
    pub return_type: Option<TypeKey>,
    pub is_static: bool,
    pub is_constructor: bool,
    invoker: MethodInvoker,
}

impl MethodInfo {
    /// Member name used for constructors
    pub const CONSTRUCTOR_NAME: &'static str = "ctor";

    /// Create an instance method with no parameters and no return value
    pub fn new<F>(name: impl Into<String>, invoker: F) -> Self
    where
        F: Fn(Option<&ObjectRef>, &[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            declaring_type: TypeKey::new(keys::OBJECT),
            parameters: Vec::new(),
            return_type: None,
            is_static: false,
            is_constructor: false,
            invoker: Arc::new(invoker),
        }
    }

    /// Create a constructor; finish it with `TypeInfo::with_constructor`
    pub fn constructor<F>(invoker: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        let mut method = Self::new(Self::CONSTRUCTOR_NAME, move |_, args| invoker(args));
        method.is_constructor = true;
        method.is_static = true;
        method
    }

    /// Add a parameter
    pub fn param(mut self, name: impl Into<String>, parameter_type: impl Into<TypeKey>) -> Self {
        self.parameters.push(ParameterInfo {
            name: name.into(),
            parameter_type: parameter_type.into(),
            default_value: None,
        });
        self
    }

    /// Add a parameter with a declared default
    pub fn param_with_default(
        mut self,
        name: impl Into<String>,
        parameter_type: impl Into<TypeKey>,
        default_value: Value,
    ) -> Self {
        self.parameters.push(ParameterInfo {
            name: name.into(),
            parameter_type: parameter_type.into(),
            default_value: Some(default_value),
        });
        self
    }

    /// Set the return type
    pub fn returns(mut self, return_type: impl Into<TypeKey>) -> Self {
        self.return_type = Some(return_type.into());
        self
    }

    /// Mark as static
    pub fn static_method(mut self) -> Self {
        self.is_static = true;
        self
    }

    pub fn parameter_types(&self) -> Vec<TypeKey> {
        self.parameters.iter().map(|p| p.parameter_type.clone()).collect()
    }

    /// Exact parameter type match
    pub fn matches_parameters(&self, parameter_types: &[TypeKey]) -> bool {
        self.parameters.len() == parameter_types.len()
            && self
                .parameters
                .iter()
                .zip(parameter_types)
                .all(|(p, t)| &p.parameter_type == t)
    }

    /// `Type.name`
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.declaring_type, self.name)
    }

    /// Invoke with already converted arguments
    pub fn invoke(&self, target: Option<&ObjectRef>, args: &[Value]) -> Result<Value> {
        if args.len() != self.parameters.len() {
            return Err(ReflectError::ArgumentCount {
                member: self.full_name(),
                expected: self.parameters.len(),
                found: args.len(),
            });
        }
        if self.is_static {
            return (self.invoker)(None, args);
        }
        if target.is_none() {
            return Err(ReflectError::MissingTarget(self.full_name()));
        }
        (self.invoker)(target, args)
    }

    // ========== Typed Helpers ==========

    /// Static function of one argument
    pub fn function1<A, R, F>(name: &str, a: &str, f: F) -> Self
    where
        A: Reflected,
        R: Reflected,
        F: Fn(A) -> R + Send + Sync + 'static,
    {
        let member = name.to_string();
        Self::new(name, move |_, args| {
            let a = arg::<A>(&member, args, 0)?;
            Ok(f(a).into_value())
        })
        .param(a, A::type_key())
        .returns(R::type_key())
        .static_method()
    }

    /// Static function of two arguments
    pub fn function2<A, B, R, F>(name: &str, params: [&str; 2], f: F) -> Self
    where
        A: Reflected,
        B: Reflected,
        R: Reflected,
        F: Fn(A, B) -> R + Send + Sync + 'static,
    {
        Self::try_function2(name, params, move |a: A, b: B| Ok(f(a, b)))
    }

    /// Static fallible function of two arguments
    pub fn try_function2<A, B, R, F>(name: &str, params: [&str; 2], f: F) -> Self
    where
        A: Reflected,
        B: Reflected,
        R: Reflected,
        F: Fn(A, B) -> Result<R> + Send + Sync + 'static,
    {
        let member = name.to_string();
        Self::new(name, move |_, args| {
            let a = arg::<A>(&member, args, 0)?;
            let b = arg::<B>(&member, args, 1)?;
            Ok(f(a, b)?.into_value())
        })
        .param(params[0], A::type_key())
        .param(params[1], B::type_key())
        .returns(R::type_key())
        .static_method()
    }

    /// Static method of one argument returning nothing
    pub fn static_action1<A, F>(name: &str, a: &str, f: F) -> Self
    where
        A: Reflected,
        F: Fn(A) + Send + Sync + 'static,
    {
        let member = name.to_string();
        Self::new(name, move |_, args| {
            f(arg::<A>(&member, args, 0)?);
            Ok(Value::Null)
        })
        .param(a, A::type_key())
        .static_method()
    }

    /// Instance method with no arguments
    pub fn instance0<T, R, F>(name: &str, f: F) -> Self
    where
        T: EngineObject,
        R: Reflected,
        F: Fn(&T) -> R + Send + Sync + 'static,
    {
        let member = name.to_string();
        Self::new(name, move |target, _| {
            let object = downcast_target::<T>(target, &member)?;
            Ok(f(object).into_value())
        })
        .returns(R::type_key())
    }

    /// Instance method of one argument
    pub fn instance1<T, A, R, F>(name: &str, a: &str, f: F) -> Self
    where
        T: EngineObject,
        A: Reflected,
        R: Reflected,
        F: Fn(&T, A) -> R + Send + Sync + 'static,
    {
        let member = name.to_string();
        Self::new(name, move |target, args| {
            let object = downcast_target::<T>(target, &member)?;
            let a = arg::<A>(&member, args, 0)?;
            Ok(f(object, a).into_value())
        })
        .param(a, A::type_key())
        .returns(R::type_key())
    }

    /// Instance method with no arguments returning nothing
    pub fn action0<T, F>(name: &str, f: F) -> Self
    where
        T: EngineObject,
        F: Fn(&T) + Send + Sync + 'static,
    {
        let member = name.to_string();
        Self::new(name, move |target, _| {
            f(downcast_target::<T>(target, &member)?);
            Ok(Value::Null)
        })
    }

    /// Instance method of one argument returning nothing
    pub fn action1<T, A, F>(name: &str, a: &str, f: F) -> Self
    where
        T: EngineObject,
        A: Reflected,
        F: Fn(&T, A) + Send + Sync + 'static,
    {
        let member = name.to_string();
        Self::new(name, move |target, args| {
            let object = downcast_target::<T>(target, &member)?;
            f(object, arg::<A>(&member, args, 0)?);
            Ok(Value::Null)
        })
        .param(a, A::type_key())
    }
}

/// Convert the argument at `index`
fn arg<T: Reflected>(member: &str, args: &[Value], index: usize) -> Result<T> {
    args.get(index)
        .and_then(|value| T::from_value(value))
        .ok_or_else(|| ReflectError::ArgumentType {
            member: member.to_string(),
            index,
            expected: T::type_key().to_string(),
        })
}

impl fmt::Debug for MethodInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodInfo")
            .field("name", &self.name)
            .field("declaring_type", &self.declaring_type)
            .field("parameters", &self.parameter_types())
            .field("return_type", &self.return_type)
            .field("is_static", &self.is_static)
            .field("is_constructor", &self.is_constructor)
            .finish()
    }
}

// ========== Member Handles ==========

/// Handle to a registered field or method
///
/// Equality is identity of the registration.
#[derive(Clone, Debug)]
pub enum MemberHandle {
    Field(Arc<FieldInfo>),
    Method(Arc<MethodInfo>),
}

impl MemberHandle {
    pub fn name(&self) -> &str {
        match self {
            MemberHandle::Field(field) => &field.name,
            MemberHandle::Method(method) => &method.name,
        }
    }

    pub fn declaring_type(&self) -> &TypeKey {
        match self {
            MemberHandle::Field(field) => &field.declaring_type,
            MemberHandle::Method(method) => &method.declaring_type,
        }
    }

    /// Static members and constructors need no target
    pub fn is_static(&self) -> bool {
        match self {
            MemberHandle::Field(field) => field.is_static,
            MemberHandle::Method(method) => method.is_static || method.is_constructor,
        }
    }

    pub fn is_field(&self) -> bool {
        matches!(self, MemberHandle::Field(_))
    }

    pub fn as_method(&self) -> Option<&Arc<MethodInfo>> {
        match self {
            MemberHandle::Method(method) => Some(method),
            MemberHandle::Field(_) => None,
        }
    }

    pub fn as_field(&self) -> Option<&Arc<FieldInfo>> {
        match self {
            MemberHandle::Field(field) => Some(field),
            MemberHandle::Method(_) => None,
        }
    }

    /// Structural key, stable across re-registration
    pub fn key(&self) -> MemberKey {
        match self {
            MemberHandle::Field(field) => MemberKey {
                declaring_type: field.declaring_type.clone(),
                name: field.name.clone(),
                parameters: Vec::new(),
                is_field: true,
            },
            MemberHandle::Method(method) => MemberKey {
                declaring_type: method.declaring_type.clone(),
                name: method.name.clone(),
                parameters: method.parameter_types(),
                is_field: false,
            },
        }
    }
}

impl PartialEq for MemberHandle {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (MemberHandle::Field(a), MemberHandle::Field(b)) => Arc::ptr_eq(a, b),
            (MemberHandle::Method(a), MemberHandle::Method(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Eq for MemberHandle {}

impl From<Arc<FieldInfo>> for MemberHandle {
    fn from(field: Arc<FieldInfo>) -> Self {
        MemberHandle::Field(field)
    }
}

impl From<Arc<MethodInfo>> for MemberHandle {
    fn from(method: Arc<MethodInfo>) -> Self {
        MemberHandle::Method(method)
    }
}

/// Hashable description of a member
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MemberKey {
    pub declaring_type: TypeKey,
    pub name: String,
    pub parameters: Vec<TypeKey>,
    pub is_field: bool,
}

/// Which members `TypeRegistry::members` lists
#[derive(Clone, Copy, Debug)]
pub struct MemberFilter {
    pub include_static: bool,
    pub include_instance: bool,
    /// Include members declared by base types
    pub include_inherited: bool,
}

impl Default for MemberFilter {
    fn default() -> Self {
        Self {
            include_static: true,
            include_instance: true,
            include_inherited: true,
        }
    }
}

// ========== Registry ==========

/// Central registry of reflected types
pub struct TypeRegistry {
    types: RwLock<HashMap<TypeKey, Arc<TypeInfo>>>,
}

impl TypeRegistry {
    /// Create a registry holding the built-in types
    pub fn new() -> Self {
        let registry = Self::empty();
        {
            let mut types = registry.types.write();
            for primitive in PrimitiveType::ALL {
                let info = TypeInfo::primitive(primitive);
                types.insert(info.key.clone(), Arc::new(info));
            }
            let root = TypeInfo::with_kind(keys::OBJECT, TypeKind::Object);
            types.insert(root.key.clone(), Arc::new(root));
        }
        registry
    }

    /// Create a registry without built-in types
    pub fn empty() -> Self {
        Self {
            types: RwLock::new(HashMap::new()),
        }
    }

    /// Register a type, replacing any type with the same key
    pub fn register(&self, info: TypeInfo) -> Result<Arc<TypeInfo>> {
        if info.key.as_str().contains('.') || info.key.as_str().is_empty() {
            return Err(ReflectError::InvalidTypeKey(info.key.to_string()));
        }

        let info = Arc::new(info);
        if self
            .types
            .write()
            .insert(info.key.clone(), info.clone())
            .is_some()
        {
            log::debug!("Replaced registration of type '{}'", info.key);
        }
        Ok(info)
    }

    /// Remove a type
    pub fn unregister(&self, key: &str) -> Option<Arc<TypeInfo>> {
        self.types.write().remove(key)
    }

    /// Get a type by key
    pub fn get(&self, key: &str) -> Option<Arc<TypeInfo>> {
        self.types.read().get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.types.read().contains_key(key)
    }

    /// All registered keys
    pub fn keys(&self) -> Vec<TypeKey> {
        self.types.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.types.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.read().is_empty()
    }

    /// The type followed by its registered bases
    pub fn base_chain(&self, key: &str) -> Vec<Arc<TypeInfo>> {
        let types = self.types.read();
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut current = types.get(key).cloned();

        while let Some(info) = current {
            if !seen.insert(info.key.clone()) {
                log::warn!("Cyclic base chain detected at type '{}'", info.key);
                break;
            }
            current = info.base.as_ref().and_then(|base| types.get(base).cloned());
            chain.push(info);
        }
        chain
    }

    /// Check if a value of type `from` can be used where `to` is expected
    pub fn is_assignable(&self, to: &str, from: &str) -> bool {
        to == from || self.base_chain(from).iter().any(|info| info.key == to)
    }

    /// Find a field by name, searching base types
    pub fn find_field(&self, key: &str, name: &str) -> Option<Arc<FieldInfo>> {
        self.base_chain(key)
            .iter()
            .find_map(|info| info.fields.iter().find(|f| f.name == name).cloned())
    }

    /// Find a method by name and exact parameter types, searching base types
    pub fn find_method(
        &self,
        key: &str,
        name: &str,
        parameter_types: &[TypeKey],
    ) -> Option<Arc<MethodInfo>> {
        self.base_chain(key).iter().find_map(|info| {
            info.methods
                .iter()
                .find(|m| m.name == name && m.matches_parameters(parameter_types))
                .cloned()
        })
    }

    /// Find a constructor by exact parameter types
    pub fn find_constructor(&self, key: &str, parameter_types: &[TypeKey]) -> Option<Arc<MethodInfo>> {
        self.get(key).and_then(|info| {
            info.constructors
                .iter()
                .find(|c| c.matches_parameters(parameter_types))
                .cloned()
        })
    }

    /// All overloads with the given name, including constructors for "ctor"
    pub fn methods_named(&self, key: &str, name: &str) -> Vec<Arc<MethodInfo>> {
        if name == MethodInfo::CONSTRUCTOR_NAME {
            return self
                .get(key)
                .map(|info| info.constructors.clone())
                .unwrap_or_default();
        }
        self.base_chain(key)
            .iter()
            .flat_map(|info| info.methods.iter().filter(|m| m.name == name).cloned())
            .collect()
    }

    /// Enumerate members for pickers
    pub fn members(&self, key: &str, filter: MemberFilter) -> Vec<MemberHandle> {
        let chain = self.base_chain(key);
        let depth = if filter.include_inherited { chain.len() } else { 1 };
        let wanted = |is_static: bool| {
            if is_static {
                filter.include_static
            } else {
                filter.include_instance
            }
        };

        let mut members = Vec::new();
        for info in chain.iter().take(depth) {
            members.extend(
                info.fields
                    .iter()
                    .filter(|f| wanted(f.is_static))
                    .cloned()
                    .map(MemberHandle::Field),
            );
            members.extend(
                info.methods
                    .iter()
                    .filter(|m| wanted(m.is_static))
                    .cloned()
                    .map(MemberHandle::Method),
            );
        }
        if filter.include_static {
            if let Some(info) = chain.first() {
                members.extend(info.constructors.iter().cloned().map(MemberHandle::Method));
            }
        }
        members
    }

    /// Default value of a type, null when unknown
    pub fn default_value(&self, key: &str) -> Value {
        self.get(key)
            .map(|info| info.default_value())
            .unwrap_or(Value::Null)
    }

    /// Whether values of this type can be stored as constants
    pub fn is_supported_native(&self, key: &str) -> bool {
        self.get(key).is_some_and(|info| match info.kind {
            TypeKind::Primitive(p) => p.has_literal(),
            TypeKind::Enum | TypeKind::Object => true,
            TypeKind::Class => false,
        })
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("types", &self.len())
            .finish()
    }
}
