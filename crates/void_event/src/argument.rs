//! Persistent arguments
//!
//! Each argument of a persistent call is either a stored literal, a link to
//! one of the event's invocation parameters, or a link to the return value
//! of an earlier call in the same event.

use crate::config::EventConfig;
use crate::error::{EventError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use void_reflect::{
    keys, registry, Color, Color32, ObjectRef, PrimitiveType, Quat, Rect, TypeKey, TypeKind,
    Value, Vec2, Vec3, Vec4,
};

// ========== Literals ==========

/// Constant payload of an argument
///
/// Integers also cover `i64` and `i32`-backed enums, floats cover both
/// `f32` and `f64`. `None` stands for the declared type's default value.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Literal {
    #[default]
    None,
    Bool(bool),
    Int(i32),
    Float(f64),
    String(String),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    Quat(Quat),
    Color(Color),
    Color32(Color32),
    Rect(Rect),
    Object(Option<ObjectRef>),
}

impl Literal {
    /// Default literal for a declared type
    pub fn default_for(declared_type: &TypeKey) -> Self {
        let Some(info) = registry().get(declared_type.as_str()) else {
            return Literal::None;
        };
        match info.kind {
            TypeKind::Primitive(PrimitiveType::Long) => Literal::None,
            TypeKind::Primitive(_) | TypeKind::Enum => {
                Literal::from_value(&info.default_value()).unwrap_or_default()
            }
            TypeKind::Object => Literal::Object(None),
            TypeKind::Class => Literal::None,
        }
    }

    /// Literal holding a runtime value, if the value has a literal form
    pub fn from_value(value: &Value) -> Option<Self> {
        let literal = match value {
            Value::Null => Literal::None,
            Value::Bool(b) => Literal::Bool(*b),
            Value::Int(i) => Literal::Int(*i),
            Value::Enum { value, .. } => Literal::Int(*value),
            Value::Float(f) => Literal::Float(*f as f64),
            Value::Double(d) => Literal::Float(*d),
            Value::String(s) => Literal::String(s.clone()),
            Value::Vec2(v) => Literal::Vec2(*v),
            Value::Vec3(v) => Literal::Vec3(*v),
            Value::Vec4(v) => Literal::Vec4(*v),
            Value::Quat(q) => Literal::Quat(*q),
            Value::Color(c) => Literal::Color(*c),
            Value::Color32(c) => Literal::Color32(*c),
            Value::Rect(r) => Literal::Rect(*r),
            Value::Object(object) => Literal::Object(Some(object.clone())),
            Value::Long(_) | Value::Opaque(_) => return None,
        };
        Some(literal)
    }

    /// Convert to a value of the declared type
    pub fn to_value(&self, declared_type: &TypeKey) -> Result<Value> {
        let registry = registry();
        let declared = declared_type.as_str();

        let value = match self {
            Literal::None => Some(registry.default_value(declared)),
            Literal::Bool(b) if declared == keys::BOOL => Some(Value::Bool(*b)),
            Literal::Int(i) => match declared {
                keys::INT => Some(Value::Int(*i)),
                keys::LONG => Some(Value::Long(*i as i64)),
                keys::FLOAT => Some(Value::Float(*i as f32)),
                keys::DOUBLE => Some(Value::Double(*i as f64)),
                _ => registry
                    .get(declared)
                    .filter(|info| info.is_enum())
                    .map(|_| Value::Enum {
                        type_key: declared_type.clone(),
                        value: *i,
                    }),
            },
            Literal::Float(f) => match declared {
                keys::FLOAT => Some(Value::Float(*f as f32)),
                keys::DOUBLE => Some(Value::Double(*f)),
                _ => None,
            },
            Literal::String(s) if declared == keys::STRING => Some(Value::String(s.clone())),
            Literal::Vec2(v) if declared == keys::VEC2 => Some(Value::Vec2(*v)),
            Literal::Vec3(v) if declared == keys::VEC3 => Some(Value::Vec3(*v)),
            Literal::Vec4(v) if declared == keys::VEC4 => Some(Value::Vec4(*v)),
            Literal::Quat(q) if declared == keys::QUAT => Some(Value::Quat(*q)),
            Literal::Color(c) if declared == keys::COLOR => Some(Value::Color(*c)),
            Literal::Color32(c) if declared == keys::COLOR32 => Some(Value::Color32(*c)),
            Literal::Rect(r) if declared == keys::RECT => Some(Value::Rect(*r)),
            Literal::Object(None) if registry.is_assignable(keys::OBJECT, declared) => {
                Some(Value::Null)
            }
            Literal::Object(Some(object))
                if registry.is_assignable(declared, object.type_key().as_str()) =>
            {
                Some(Value::Object(object.clone()))
            }
            _ => None,
        };

        value.ok_or_else(|| EventError::TypeMismatch {
            expected: declared.to_string(),
            found: self.type_name().to_string(),
        })
    }

    /// Check if the literal converts to the declared type
    pub fn is_compatible(&self, declared_type: &TypeKey) -> bool {
        self.to_value(declared_type).is_ok()
    }

    /// Name of the payload kind, used in diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            Literal::None => "none",
            Literal::Bool(_) => "bool",
            Literal::Int(_) => "int",
            Literal::Float(_) => "float",
            Literal::String(_) => "string",
            Literal::Vec2(_) => "vector2",
            Literal::Vec3(_) => "vector3",
            Literal::Vec4(_) => "vector4",
            Literal::Quat(_) => "quaternion",
            Literal::Color(_) => "color",
            Literal::Color32(_) => "color32",
            Literal::Rect(_) => "rect",
            Literal::Object(_) => "object",
        }
    }
}

impl From<Literal> for ArgumentSource {
    fn from(literal: Literal) -> Self {
        ArgumentSource::Constant(literal)
    }
}

// ========== Arguments ==========

/// Where an argument takes its value from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArgumentKind {
    Constant,
    Parameter,
    ReturnValue,
}

/// Source of an argument's value
#[derive(Clone, Debug, PartialEq)]
pub enum ArgumentSource {
    /// Stored literal
    Constant(Literal),
    /// Invocation parameter at the index
    Parameter(usize),
    /// Return value of the call at the index
    ReturnValue(usize),
}

impl ArgumentSource {
    pub fn kind(&self) -> ArgumentKind {
        match self {
            ArgumentSource::Constant(_) => ArgumentKind::Constant,
            ArgumentSource::Parameter(_) => ArgumentKind::Parameter,
            ArgumentSource::ReturnValue(_) => ArgumentKind::ReturnValue,
        }
    }
}

/// One argument of a persistent call
#[derive(Clone, Debug, PartialEq)]
pub struct PersistentArgument {
    declared_type: TypeKey,
    source: ArgumentSource,
}

impl PersistentArgument {
    /// Create a constant argument holding the type's default value
    pub fn new(declared_type: impl Into<TypeKey>) -> Self {
        let declared_type = declared_type.into();
        let literal = Literal::default_for(&declared_type);
        Self {
            declared_type,
            source: ArgumentSource::Constant(literal),
        }
    }

    /// Create an argument with an explicit source
    pub fn with_source(declared_type: impl Into<TypeKey>, source: ArgumentSource) -> Self {
        Self {
            declared_type: declared_type.into(),
            source,
        }
    }

    pub fn declared_type(&self) -> &TypeKey {
        &self.declared_type
    }

    pub fn source(&self) -> &ArgumentSource {
        &self.source
    }

    pub fn kind(&self) -> ArgumentKind {
        self.source.kind()
    }

    /// Stored literal, if constant
    pub fn literal(&self) -> Option<&Literal> {
        match &self.source {
            ArgumentSource::Constant(literal) => Some(literal),
            _ => None,
        }
    }

    /// Linked parameter index, if linked to a parameter
    pub fn parameter_index(&self) -> Option<usize> {
        match self.source {
            ArgumentSource::Parameter(index) => Some(index),
            _ => None,
        }
    }

    /// Linked call index, if linked to a return value
    pub fn return_value_index(&self) -> Option<usize> {
        match self.source {
            ArgumentSource::ReturnValue(index) => Some(index),
            _ => None,
        }
    }

    /// Change the declared type
    ///
    /// A constant that cannot be converted to the new type is reset to the
    /// new type's default. Links are kept.
    pub fn set_declared_type(&mut self, declared_type: impl Into<TypeKey>) {
        self.declared_type = declared_type.into();
        if let ArgumentSource::Constant(literal) = &self.source {
            if !literal.is_compatible(&self.declared_type) {
                self.source = ArgumentSource::Constant(Literal::default_for(&self.declared_type));
            }
        }
    }

    /// Store a literal
    pub fn set_constant(&mut self, literal: Literal) {
        self.source = ArgumentSource::Constant(literal);
    }

    /// Store a runtime value as a literal
    ///
    /// Fails when the value has no literal form or does not fit the
    /// declared type.
    pub fn set_value(&mut self, value: &Value) -> Result<()> {
        let literal = Literal::from_value(value).ok_or_else(|| EventError::TypeMismatch {
            expected: self.declared_type.to_string(),
            found: value.type_name(),
        })?;
        literal.to_value(&self.declared_type)?;
        self.set_constant(literal);
        Ok(())
    }

    /// Link to an invocation parameter
    pub fn set_parameter_link(&mut self, index: usize) {
        self.source = ArgumentSource::Parameter(index);
    }

    /// Link to the return value of an earlier call
    pub fn set_return_value_link(&mut self, index: usize) {
        self.source = ArgumentSource::ReturnValue(index);
    }

    /// Produce the value for the current invocation
    pub fn resolve(&self, context: &InvocationContext<'_>) -> Result<Value> {
        match &self.source {
            ArgumentSource::Constant(literal) => literal.to_value(&self.declared_type),
            ArgumentSource::Parameter(index) => {
                context
                    .parameter(*index)
                    .cloned()
                    .ok_or(EventError::ParameterOutOfRange {
                        index: *index,
                        arity: context.parameters().len(),
                    })
            }
            ArgumentSource::ReturnValue(index) => match context.return_value(*index) {
                Some(value) => Ok(value.clone()),
                None => {
                    if context.config().warn_on_unavailable_links {
                        log::warn!(
                            "Return value of call {} is not available; using the default {}",
                            index,
                            self.declared_type
                        );
                    }
                    Ok(registry().default_value(self.declared_type.as_str()))
                }
            },
        }
    }
}

impl fmt::Display for PersistentArgument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            ArgumentSource::Constant(literal) => match literal.to_value(&self.declared_type) {
                Ok(value) => write!(f, "{}", value),
                Err(_) => write!(f, "<{}>", literal.type_name()),
            },
            ArgumentSource::Parameter(index) => write!(f, "Parameter {}", index),
            ArgumentSource::ReturnValue(index) => write!(f, "Return Value {}", index),
        }
    }
}

// ========== Invocation Context ==========

/// State of a single event invocation
///
/// Holds the invocation parameters and the return values produced so far.
/// A new context is created for every invocation, so nested invocations of
/// the same event never share state.
#[derive(Debug)]
pub struct InvocationContext<'a> {
    parameters: &'a [Value],
    return_values: Vec<Option<Value>>,
    config: EventConfig,
}

impl<'a> InvocationContext<'a> {
    pub fn new(parameters: &'a [Value], config: EventConfig) -> Self {
        Self {
            parameters,
            return_values: Vec::new(),
            config,
        }
    }

    pub fn parameters(&self) -> &[Value] {
        self.parameters
    }

    pub fn parameter(&self, index: usize) -> Option<&Value> {
        self.parameters.get(index)
    }

    /// Value produced by the call at `index` during this invocation
    pub fn return_value(&self, index: usize) -> Option<&Value> {
        self.return_values.get(index).and_then(|value| value.as_ref())
    }

    /// Record the result of the next call
    pub fn push_return_value(&mut self, value: Option<Value>) {
        self.return_values.push(value);
    }

    pub fn config(&self) -> &EventConfig {
        &self.config
    }
}
