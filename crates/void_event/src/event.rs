//! Persistent events
//!
//! A `PersistentEvent<P>` invokes its persistent calls in order, then its
//! dynamic calls in registration order. `P` is a tuple of up to four
//! reflected parameter types.

use crate::argument::{ArgumentSource, InvocationContext};
use crate::call::PersistentCall;
use crate::config::EventConfig;
use crate::error::{EventError, Result};
use crate::links::{self, LinkCandidate, LinkSnapshot, RepairReport};
use std::fmt;
use std::marker::PhantomData;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use void_reflect::{registry, Reflected, TypeKey, Value};

// ========== Event Arguments ==========

/// Parameter tuple of an event
pub trait EventArgs: Clone + Send + Sync + 'static {
    /// Number of parameters
    const ARITY: usize;

    /// Registered type of each parameter
    fn parameter_types() -> Vec<TypeKey>;

    /// Runtime values of each parameter
    fn to_values(&self) -> Vec<Value>;
}

impl EventArgs for () {
    const ARITY: usize = 0;

    fn parameter_types() -> Vec<TypeKey> {
        Vec::new()
    }

    fn to_values(&self) -> Vec<Value> {
        Vec::new()
    }
}

macro_rules! impl_event_args {
    ($arity:expr; $($name:ident: $index:tt),+) => {
        impl<$($name),+> EventArgs for ($($name,)+)
        where
            $($name: Reflected + Clone + Send + Sync + 'static),+
        {
            const ARITY: usize = $arity;

            fn parameter_types() -> Vec<TypeKey> {
                vec![$($name::type_key()),+]
            }

            fn to_values(&self) -> Vec<Value> {
                vec![$(self.$index.clone().into_value()),+]
            }
        }
    };
}

impl_event_args!(1; A: 0);
impl_event_args!(2; A: 0, B: 1);
impl_event_args!(3; A: 0, B: 1, C: 2);
impl_event_args!(4; A: 0, B: 1, C: 2, D: 3);

// ========== Dynamic Calls ==========

/// Identifies a registered dynamic call
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DynamicCallId(u64);

/// Runtime callback of an event
pub type DynamicCall<P> = Arc<dyn Fn(&P) -> Result<()> + Send + Sync>;

// ========== Persistent Event ==========

/// Serializable event with persistent and dynamic calls
pub struct PersistentEvent<P: EventArgs = ()> {
    persistent_calls: Vec<PersistentCall>,
    dynamic_calls: Vec<(DynamicCallId, DynamicCall<P>)>,
    next_dynamic_id: u64,
    config: EventConfig,
    _marker: PhantomData<fn(P)>,
}

impl<P: EventArgs> PersistentEvent<P> {
    /// Create an empty event
    pub fn new() -> Self {
        Self::with_config(EventConfig::default())
    }

    /// Create an empty event with a configuration
    pub fn with_config(config: EventConfig) -> Self {
        Self {
            persistent_calls: Vec::new(),
            dynamic_calls: Vec::new(),
            next_dynamic_id: 0,
            config,
            _marker: PhantomData,
        }
    }

    pub fn config(&self) -> &EventConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: EventConfig) {
        self.config = config;
    }

    /// Number of parameters
    pub fn arity(&self) -> usize {
        P::ARITY
    }

    /// Registered types of the parameters
    pub fn parameter_types(&self) -> Vec<TypeKey> {
        P::parameter_types()
    }

    /// Check if there are no calls of either kind
    pub fn is_empty(&self) -> bool {
        self.persistent_calls.is_empty() && self.dynamic_calls.is_empty()
    }

    // ========== Invocation ==========

    /// Invoke every call
    ///
    /// Persistent calls run first, in order, then dynamic calls. The first
    /// error stops the invocation and is returned.
    pub fn invoke(&self, args: &P) -> Result<()> {
        let parameters = args.to_values();
        let mut context = InvocationContext::new(&parameters, self.config);

        for call in &self.persistent_calls {
            let value = call.invoke(&context)?;
            context.push_return_value(value);
        }

        for (_, callback) in &self.dynamic_calls {
            callback(args)?;
        }
        Ok(())
    }

    /// Invoke every call, logging errors and panics instead of returning them
    ///
    /// A failing call still stops the remaining calls of this invocation.
    /// Returns whether the invocation completed.
    pub fn invoke_safe(&self, args: &P) -> bool {
        match self.invoke_caught(args) {
            Ok(()) => true,
            Err(e) => {
                log::error!("Event invocation failed: {}", e);
                false
            }
        }
    }

    /// Invoke every call, turning a panic into `EventError::Panicked`
    pub fn invoke_caught(&self, args: &P) -> Result<()> {
        panic::catch_unwind(AssertUnwindSafe(|| self.invoke(args))).unwrap_or_else(|payload| {
            Err(EventError::Panicked(panic_message(payload.as_ref())))
        })
    }

    // ========== Persistent Calls ==========

    pub fn persistent_calls(&self) -> &[PersistentCall] {
        &self.persistent_calls
    }

    pub fn persistent_call(&self, index: usize) -> Result<&PersistentCall> {
        let len = self.persistent_calls.len();
        self.persistent_calls
            .get(index)
            .ok_or(EventError::CallOutOfRange { index, len })
    }

    /// Mutable access to one call
    ///
    /// Rebinding a call changes its producer identity; use
    /// `edit_persistent_calls` when other calls link to it.
    pub fn persistent_call_mut(&mut self, index: usize) -> Result<&mut PersistentCall> {
        let len = self.persistent_calls.len();
        self.persistent_calls
            .get_mut(index)
            .ok_or(EventError::CallOutOfRange { index, len })
    }

    /// Append a call and return its index
    pub fn add_persistent_call(&mut self, call: PersistentCall) -> usize {
        self.persistent_calls.push(call);
        self.persistent_calls.len() - 1
    }

    /// Insert a call, shifting later calls and their links
    pub fn insert_persistent_call(&mut self, index: usize, call: PersistentCall) -> Result<()> {
        let len = self.persistent_calls.len();
        if index > len {
            return Err(EventError::CallOutOfRange { index, len });
        }
        self.edit_persistent_calls(|calls| calls.insert(index, call));
        Ok(())
    }

    /// Remove a call, re-pointing links to calls that moved
    pub fn remove_persistent_call(&mut self, index: usize) -> Result<PersistentCall> {
        let len = self.persistent_calls.len();
        if index >= len {
            return Err(EventError::CallOutOfRange { index, len });
        }
        Ok(self.edit_persistent_calls(|calls| calls.remove(index)))
    }

    /// Move a call to a new position
    pub fn move_persistent_call(&mut self, from: usize, to: usize) -> Result<()> {
        let len = self.persistent_calls.len();
        for index in [from, to] {
            if index >= len {
                return Err(EventError::CallOutOfRange { index, len });
            }
        }
        self.edit_persistent_calls(|calls| {
            let call = calls.remove(from);
            calls.insert(to, call);
        });
        Ok(())
    }

    /// Remove every persistent call
    pub fn clear_persistent_calls(&mut self) {
        self.persistent_calls.clear();
    }

    /// Edit the call list, then repair return value links
    pub fn edit_persistent_calls<F, R>(&mut self, edit: F) -> R
    where
        F: FnOnce(&mut Vec<PersistentCall>) -> R,
    {
        let snapshot = LinkSnapshot::capture(&self.persistent_calls);
        let result = edit(&mut self.persistent_calls);
        self.repair_links(&snapshot);
        result
    }

    /// Repair links against a snapshot taken before an edit
    pub fn repair_links(&mut self, snapshot: &LinkSnapshot) -> RepairReport {
        links::repair_links(&mut self.persistent_calls, snapshot, self.config.link_repair)
    }

    // ========== Dynamic Calls ==========

    /// Register a callback
    pub fn add_dynamic_call<F>(&mut self, callback: F) -> DynamicCallId
    where
        F: Fn(&P) + Send + Sync + 'static,
    {
        self.add_fallible_dynamic_call(move |args: &P| {
            callback(args);
            Ok(())
        })
    }

    /// Register a callback whose error stops the invocation
    pub fn add_fallible_dynamic_call<F>(&mut self, callback: F) -> DynamicCallId
    where
        F: Fn(&P) -> Result<()> + Send + Sync + 'static,
    {
        let id = DynamicCallId(self.next_dynamic_id);
        self.next_dynamic_id += 1;
        self.dynamic_calls.push((id, Arc::new(callback)));
        id
    }

    /// Unregister a callback
    pub fn remove_dynamic_call(&mut self, id: DynamicCallId) -> bool {
        let before = self.dynamic_calls.len();
        self.dynamic_calls.retain(|(call_id, _)| *call_id != id);
        self.dynamic_calls.len() != before
    }

    pub fn clear_dynamic_calls(&mut self) {
        self.dynamic_calls.clear();
    }

    pub fn has_dynamic_calls(&self) -> bool {
        !self.dynamic_calls.is_empty()
    }

    pub fn dynamic_call_count(&self) -> usize {
        self.dynamic_calls.len()
    }

    /// Same as `add_dynamic_call`
    pub fn add_listener<F>(&mut self, callback: F) -> DynamicCallId
    where
        F: Fn(&P) + Send + Sync + 'static,
    {
        self.add_dynamic_call(callback)
    }

    /// Same as `remove_dynamic_call`
    pub fn remove_listener(&mut self, id: DynamicCallId) -> bool {
        self.remove_dynamic_call(id)
    }

    // ========== Linking ==========

    /// Values the argument of the call at `call_index` may link to
    pub fn link_candidates(&self, call_index: usize, declared_type: &TypeKey) -> Vec<LinkCandidate> {
        links::link_candidates(
            &P::parameter_types(),
            &self.persistent_calls,
            call_index,
            declared_type,
        )
    }

    /// Link an argument to a parameter or an earlier call's return value
    pub fn link_argument(
        &mut self,
        call_index: usize,
        argument_index: usize,
        candidate: LinkCandidate,
    ) -> Result<()> {
        let call = self.persistent_call(call_index)?;
        let declared_type = call
            .arguments()
            .get(argument_index)
            .map(|argument| argument.declared_type().clone())
            .ok_or(EventError::ArgumentOutOfRange {
                index: argument_index,
                len: call.arguments().len(),
            })?;

        let produced = match candidate {
            LinkCandidate::Parameter(index) => P::parameter_types()
                .get(index)
                .cloned()
                .ok_or(EventError::ParameterOutOfRange {
                    index,
                    arity: P::ARITY,
                })?,
            LinkCandidate::ReturnValue(index) => {
                if index >= call_index {
                    return Err(EventError::ForwardLink {
                        consumer: call_index,
                        producer: index,
                    });
                }
                self.persistent_calls[index]
                    .return_type()
                    .ok_or_else(|| EventError::TypeMismatch {
                        expected: declared_type.to_string(),
                        found: "void".to_string(),
                    })?
            }
        };

        if !registry().is_assignable(declared_type.as_str(), produced.as_str()) {
            return Err(EventError::TypeMismatch {
                expected: declared_type.to_string(),
                found: produced.to_string(),
            });
        }

        let argument = self.persistent_calls[call_index].argument_mut(argument_index)?;
        match candidate {
            LinkCandidate::Parameter(index) => argument.set_parameter_link(index),
            LinkCandidate::ReturnValue(index) => argument.set_return_value_link(index),
        }
        Ok(())
    }

    /// Return value links that point at the calling call or a later one
    pub fn forward_links(&self) -> Vec<(usize, usize)> {
        let mut found = Vec::new();
        for (call_index, call) in self.persistent_calls.iter().enumerate() {
            for argument in call.arguments() {
                if let ArgumentSource::ReturnValue(index) = argument.source() {
                    if *index >= call_index {
                        found.push((call_index, *index));
                    }
                }
            }
        }
        found
    }

    /// Forget every call's resolved member
    pub fn clear_caches(&self) {
        for call in &self.persistent_calls {
            call.clear_cache();
        }
    }
}

/// Message of a caught panic payload
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

impl<P: EventArgs> Default for PersistentEvent<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: EventArgs> Clone for PersistentEvent<P> {
    fn clone(&self) -> Self {
        Self {
            persistent_calls: self.persistent_calls.clone(),
            dynamic_calls: self.dynamic_calls.clone(),
            next_dynamic_id: self.next_dynamic_id,
            config: self.config,
            _marker: PhantomData,
        }
    }
}

impl<P: EventArgs> fmt::Debug for PersistentEvent<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistentEvent")
            .field("parameters", &P::parameter_types())
            .field("persistent_calls", &self.persistent_calls)
            .field("dynamic_calls", &self.dynamic_calls.len())
            .field("config", &self.config)
            .finish()
    }
}

impl<P: EventArgs> fmt::Display for PersistentEvent<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PersistentEvent({} persistent, {} dynamic)",
            self.persistent_calls.len(),
            self.dynamic_calls.len()
        )
    }
}
