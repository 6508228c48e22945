//! Value - Runtime values for reflected members
//!
//! Values are what flows into and out of fields, methods and constructors
//! when a persistent call is invoked.

use crate::object::ObjectRef;
use crate::type_registry::{keys, TypeKey};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

// ========== Geometry Types ==========

/// 2D vector
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Self = Self::new(0.0, 0.0);

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// 3D vector
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// 4D vector
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec4 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Vec4 {
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0, 0.0);

    pub const fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }
}

/// Rotation quaternion
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quat {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Quat {
    pub const IDENTITY: Self = Self::new(0.0, 0.0, 0.0, 1.0);

    pub const fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }
}

impl Default for Quat {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Linear RGBA color
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const WHITE: Self = Self::new(1.0, 1.0, 1.0, 1.0);

    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::WHITE
    }
}

/// 8-bit per channel RGBA color
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color32 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color32 {
    pub const WHITE: Self = Self::new(255, 255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }
}

impl Default for Color32 {
    fn default() -> Self {
        Self::WHITE
    }
}

/// Axis-aligned 2D rectangle
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }
}

// ========== Value ==========

/// A value of a type that has no native representation
///
/// Opaque values can only travel between calls through parameter or
/// return value links.
#[derive(Clone)]
pub struct OpaqueValue {
    pub type_key: TypeKey,
    pub data: Arc<dyn Any + Send + Sync>,
}

impl fmt::Debug for OpaqueValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Opaque({})", self.type_key)
    }
}

/// Runtime value
#[derive(Clone, Debug, Default)]
pub enum Value {
    /// No value, or a null object reference
    #[default]
    Null,
    Bool(bool),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    Quat(Quat),
    Color(Color),
    Color32(Color32),
    Rect(Rect),
    /// Enum backed by a 32-bit integer
    Enum { type_key: TypeKey, value: i32 },
    /// Engine object reference
    Object(ObjectRef),
    Opaque(OpaqueValue),
}

impl Value {
    /// Wrap an arbitrary value under the given type key
    pub fn opaque<T: Any + Send + Sync>(type_key: impl Into<TypeKey>, data: T) -> Self {
        Value::Opaque(OpaqueValue {
            type_key: type_key.into(),
            data: Arc::new(data),
        })
    }

    /// Runtime type of this value, `None` for null
    pub fn type_key(&self) -> Option<TypeKey> {
        let key = match self {
            Value::Null => return None,
            Value::Bool(_) => keys::BOOL,
            Value::Int(_) => keys::INT,
            Value::Long(_) => keys::LONG,
            Value::Float(_) => keys::FLOAT,
            Value::Double(_) => keys::DOUBLE,
            Value::String(_) => keys::STRING,
            Value::Vec2(_) => keys::VEC2,
            Value::Vec3(_) => keys::VEC3,
            Value::Vec4(_) => keys::VEC4,
            Value::Quat(_) => keys::QUAT,
            Value::Color(_) => keys::COLOR,
            Value::Color32(_) => keys::COLOR32,
            Value::Rect(_) => keys::RECT,
            Value::Enum { type_key, .. } => return Some(type_key.clone()),
            Value::Object(object) => return Some(object.type_key()),
            Value::Opaque(opaque) => return Some(opaque.type_key.clone()),
        };
        Some(TypeKey::new(key))
    }

    /// Type name used in diagnostics
    pub fn type_name(&self) -> String {
        self.type_key()
            .map(|key| key.to_string())
            .unwrap_or_else(|| "null".to_string())
    }

    /// Check if the value is null
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Integer view, accepting enums
    pub fn as_int(&self) -> Option<i32> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Enum { value, .. } => Some(*value),
            _ => None,
        }
    }

    pub fn as_long(&self) -> Option<i64> {
        match self {
            Value::Long(l) => Some(*l),
            Value::Int(i) => Some(*i as i64),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f32> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Double(d) => Some(*d as f32),
            Value::Int(i) => Some(*i as f32),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match self {
            Value::Double(d) => Some(*d),
            Value::Float(f) => Some(*f as f64),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(object) => Some(object),
            _ => None,
        }
    }

    /// Downcast an opaque payload
    pub fn downcast_opaque<T: Any + Send + Sync>(&self) -> Option<&T> {
        match self {
            Value::Opaque(opaque) => opaque.data.downcast_ref::<T>(),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Long(a), Value::Long(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Vec2(a), Value::Vec2(b)) => a == b,
            (Value::Vec3(a), Value::Vec3(b)) => a == b,
            (Value::Vec4(a), Value::Vec4(b)) => a == b,
            (Value::Quat(a), Value::Quat(b)) => a == b,
            (Value::Color(a), Value::Color(b)) => a == b,
            (Value::Color32(a), Value::Color32(b)) => a == b,
            (Value::Rect(a), Value::Rect(b)) => a == b,
            (
                Value::Enum { type_key: ta, value: a },
                Value::Enum { type_key: tb, value: b },
            ) => ta == tb && a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            (Value::Opaque(a), Value::Opaque(b)) => {
                a.type_key == b.type_key
                    && Arc::as_ptr(&a.data) as *const () == Arc::as_ptr(&b.data) as *const ()
            }
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Long(l) => write!(f, "{}", l),
            Value::Float(v) => write!(f, "{}", v),
            Value::Double(v) => write!(f, "{}", v),
            Value::String(s) => write!(f, "\"{}\"", s),
            Value::Vec2(v) => write!(f, "({}, {})", v.x, v.y),
            Value::Vec3(v) => write!(f, "({}, {}, {})", v.x, v.y, v.z),
            Value::Vec4(v) => write!(f, "({}, {}, {}, {})", v.x, v.y, v.z, v.w),
            Value::Quat(q) => write!(f, "({}, {}, {}, {})", q.x, q.y, q.z, q.w),
            Value::Color(c) => write!(f, "RGBA({}, {}, {}, {})", c.r, c.g, c.b, c.a),
            Value::Color32(c) => write!(f, "RGBA({}, {}, {}, {})", c.r, c.g, c.b, c.a),
            Value::Rect(r) => write!(f, "(x:{}, y:{}, width:{}, height:{})", r.x, r.y, r.width, r.height),
            Value::Enum { type_key, value } => write!(f, "{}({})", type_key.short_name(), value),
            Value::Object(object) => write!(f, "{}", object.name()),
            Value::Opaque(opaque) => write!(f, "<{}>", opaque.type_key),
        }
    }
}

// ========== Reflected ==========

/// Rust types with a registered type key and a `Value` representation
///
/// Used for typed event parameters and for the typed member helpers on
/// `MethodInfo` and `FieldInfo`.
pub trait Reflected: Sized {
    /// Registered key for this type
    fn type_key() -> TypeKey;

    /// Convert into a runtime value
    fn into_value(self) -> Value;

    /// Convert from a runtime value
    fn from_value(value: &Value) -> Option<Self>;
}

macro_rules! impl_reflected {
    ($ty:ty, $key:expr, $variant:ident) => {
        impl Reflected for $ty {
            fn type_key() -> TypeKey {
                TypeKey::new($key)
            }

            fn into_value(self) -> Value {
                Value::$variant(self)
            }

            fn from_value(value: &Value) -> Option<Self> {
                match value {
                    Value::$variant(v) => Some(v.clone()),
                    _ => None,
                }
            }
        }
    };
}

impl_reflected!(bool, keys::BOOL, Bool);
impl_reflected!(String, keys::STRING, String);
impl_reflected!(Vec2, keys::VEC2, Vec2);
impl_reflected!(Vec3, keys::VEC3, Vec3);
impl_reflected!(Vec4, keys::VEC4, Vec4);
impl_reflected!(Quat, keys::QUAT, Quat);
impl_reflected!(Color, keys::COLOR, Color);
impl_reflected!(Color32, keys::COLOR32, Color32);
impl_reflected!(Rect, keys::RECT, Rect);

impl Reflected for i32 {
    fn type_key() -> TypeKey {
        TypeKey::new(keys::INT)
    }

    fn into_value(self) -> Value {
        Value::Int(self)
    }

    fn from_value(value: &Value) -> Option<Self> {
        value.as_int()
    }
}

impl Reflected for i64 {
    fn type_key() -> TypeKey {
        TypeKey::new(keys::LONG)
    }

    fn into_value(self) -> Value {
        Value::Long(self)
    }

    fn from_value(value: &Value) -> Option<Self> {
        value.as_long()
    }
}

impl Reflected for f32 {
    fn type_key() -> TypeKey {
        TypeKey::new(keys::FLOAT)
    }

    fn into_value(self) -> Value {
        Value::Float(self)
    }

    fn from_value(value: &Value) -> Option<Self> {
        value.as_float()
    }
}

impl Reflected for f64 {
    fn type_key() -> TypeKey {
        TypeKey::new(keys::DOUBLE)
    }

    fn into_value(self) -> Value {
        Value::Double(self)
    }

    fn from_value(value: &Value) -> Option<Self> {
        value.as_double()
    }
}

impl Reflected for ObjectRef {
    fn type_key() -> TypeKey {
        TypeKey::new(keys::OBJECT)
    }

    fn into_value(self) -> Value {
        Value::Object(self)
    }

    fn from_value(value: &Value) -> Option<Self> {
        value.as_object().cloned()
    }
}

/// Nullable object reference
impl Reflected for Option<ObjectRef> {
    fn type_key() -> TypeKey {
        TypeKey::new(keys::OBJECT)
    }

    fn into_value(self) -> Value {
        self.map(Value::Object).unwrap_or(Value::Null)
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(None),
            Value::Object(object) => Some(Some(object.clone())),
            _ => None,
        }
    }
}
