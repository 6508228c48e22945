//! Serialized form of persistent events
//!
//! Object references are stored as `ObjectId`s and bound back to live
//! objects through an `ObjectResolver` when a record is loaded.
//!
//! ```json
//! {
//!   "calls": [
//!     {
//!       "target": 12,
//!       "member_name": "SetValue",
//!       "arguments": [
//!         { "kind": "return_value", "declared_type": "i32", "link_index": 0 }
//!       ]
//!     }
//!   ]
//! }
//! ```

use crate::argument::{ArgumentKind, ArgumentSource, Literal, PersistentArgument};
use crate::call::PersistentCall;
use crate::config::EventConfig;
use crate::error::Result;
use crate::event::{EventArgs, PersistentEvent};
use serde::{Deserialize, Serialize};
use void_reflect::{
    Color, Color32, ObjectId, ObjectRef, ObjectResolver, Quat, Rect, TypeKey, Vec2, Vec3, Vec4,
};

/// Serialized event
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    #[serde(default)]
    pub calls: Vec<CallRecord>,
}

/// Serialized persistent call
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CallRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<ObjectId>,
    #[serde(default)]
    pub member_name: Option<String>,
    #[serde(default)]
    pub arguments: Vec<ArgumentRecord>,
}

/// Serialized persistent argument
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ArgumentRecord {
    pub kind: ArgumentKind,
    pub declared_type: TypeKey,
    #[serde(default, skip_serializing_if = "LiteralRecord::is_none")]
    pub literal: LiteralRecord,
    #[serde(default)]
    pub link_index: usize,
}

/// Serialized literal, tagged by payload type
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum LiteralRecord {
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
    Object(Option<ObjectId>),
}

impl LiteralRecord {
    pub fn is_none(&self) -> bool {
        matches!(self, LiteralRecord::None)
    }

    fn from_literal(literal: &Literal) -> Self {
        match literal {
            Literal::None => LiteralRecord::None,
            Literal::Bool(b) => LiteralRecord::Bool(*b),
            Literal::Int(i) => LiteralRecord::Int(*i),
            Literal::Float(f) => LiteralRecord::Float(*f),
            Literal::String(s) => LiteralRecord::String(s.clone()),
            Literal::Vec2(v) => LiteralRecord::Vec2(*v),
            Literal::Vec3(v) => LiteralRecord::Vec3(*v),
            Literal::Vec4(v) => LiteralRecord::Vec4(*v),
            Literal::Quat(q) => LiteralRecord::Quat(*q),
            Literal::Color(c) => LiteralRecord::Color(*c),
            Literal::Color32(c) => LiteralRecord::Color32(*c),
            Literal::Rect(r) => LiteralRecord::Rect(*r),
            Literal::Object(object) => {
                LiteralRecord::Object(object.as_ref().map(|o| o.instance_id()))
            }
        }
    }

    fn to_literal(&self, resolver: &dyn ObjectResolver) -> Literal {
        match self {
            LiteralRecord::None => Literal::None,
            LiteralRecord::Bool(b) => Literal::Bool(*b),
            LiteralRecord::Int(i) => Literal::Int(*i),
            LiteralRecord::Float(f) => Literal::Float(*f),
            LiteralRecord::String(s) => Literal::String(s.clone()),
            LiteralRecord::Vec2(v) => Literal::Vec2(*v),
            LiteralRecord::Vec3(v) => Literal::Vec3(*v),
            LiteralRecord::Vec4(v) => Literal::Vec4(*v),
            LiteralRecord::Quat(q) => Literal::Quat(*q),
            LiteralRecord::Color(c) => Literal::Color(*c),
            LiteralRecord::Color32(c) => Literal::Color32(*c),
            LiteralRecord::Rect(r) => Literal::Rect(*r),
            LiteralRecord::Object(id) => Literal::Object(id.and_then(|id| resolve_object(resolver, id))),
        }
    }
}

fn resolve_object(resolver: &dyn ObjectResolver, id: ObjectId) -> Option<ObjectRef> {
    let object = resolver.resolve(id);
    if object.is_none() {
        log::warn!("Object {} referenced by a persistent call no longer exists", id);
    }
    object
}

impl ArgumentRecord {
    pub fn from_argument(argument: &PersistentArgument) -> Self {
        let (literal, link_index) = match argument.source() {
            ArgumentSource::Constant(literal) => (LiteralRecord::from_literal(literal), 0),
            ArgumentSource::Parameter(index) | ArgumentSource::ReturnValue(index) => {
                (LiteralRecord::None, *index)
            }
        };
        Self {
            kind: argument.kind(),
            declared_type: argument.declared_type().clone(),
            literal,
            link_index,
        }
    }

    pub fn to_argument(&self, resolver: &dyn ObjectResolver) -> PersistentArgument {
        let source = match self.kind {
            ArgumentKind::Constant => ArgumentSource::Constant(self.literal.to_literal(resolver)),
            ArgumentKind::Parameter => ArgumentSource::Parameter(self.link_index),
            ArgumentKind::ReturnValue => ArgumentSource::ReturnValue(self.link_index),
        };
        PersistentArgument::with_source(self.declared_type.clone(), source)
    }
}

impl CallRecord {
    pub fn from_call(call: &PersistentCall) -> Self {
        Self {
            target: call.target().map(|target| target.instance_id()),
            member_name: call.member_name().map(str::to_string),
            arguments: call.arguments().iter().map(ArgumentRecord::from_argument).collect(),
        }
    }

    /// Rebuild the call; missing targets become `None`
    pub fn to_call(&self, resolver: &dyn ObjectResolver) -> PersistentCall {
        let target = self.target.and_then(|id| resolve_object(resolver, id));
        let arguments = self
            .arguments
            .iter()
            .map(|argument| argument.to_argument(resolver))
            .collect();
        PersistentCall::from_parts(target, self.member_name.clone(), arguments)
    }
}

impl EventRecord {
    pub fn from_calls(calls: &[PersistentCall]) -> Self {
        Self {
            calls: calls.iter().map(CallRecord::from_call).collect(),
        }
    }

    pub fn to_calls(&self, resolver: &dyn ObjectResolver) -> Vec<PersistentCall> {
        self.calls.iter().map(|call| call.to_call(resolver)).collect()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl<P: EventArgs> PersistentEvent<P> {
    /// Serialize the persistent calls
    pub fn to_record(&self) -> EventRecord {
        EventRecord::from_calls(self.persistent_calls())
    }

    /// Replace the persistent calls with those of a record
    pub fn load_record(&mut self, record: &EventRecord, resolver: &dyn ObjectResolver) {
        self.clear_persistent_calls();
        for call in record.to_calls(resolver) {
            self.add_persistent_call(call);
        }
    }

    /// Create an event with the default config from a record
    pub fn from_record(record: &EventRecord, resolver: &dyn ObjectResolver) -> Self {
        Self::from_record_with_config(record, resolver, EventConfig::default())
    }

    /// Create an event from a record
    ///
    /// Records hold calls only; the config comes from the caller.
    pub fn from_record_with_config(
        record: &EventRecord,
        resolver: &dyn ObjectResolver,
        config: EventConfig,
    ) -> Self {
        let mut event = Self::with_config(config);
        event.load_record(record, resolver);
        event
    }

    pub fn to_json(&self) -> Result<String> {
        self.to_record().to_json()
    }

    pub fn from_json(json: &str, resolver: &dyn ObjectResolver) -> Result<Self> {
        Self::from_json_with_config(json, resolver, EventConfig::default())
    }

    pub fn from_json_with_config(
        json: &str,
        resolver: &dyn ObjectResolver,
        config: EventConfig,
    ) -> Result<Self> {
        let record = EventRecord::from_json(json)?;
        Ok(Self::from_record_with_config(&record, resolver, config))
    }
}
