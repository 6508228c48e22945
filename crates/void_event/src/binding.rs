//! Binding reflected methods as event listeners
//!
//! `bind_persistent` stores a serializable call whose arguments forward the
//! event's parameters. `bind` decides between persistent and dynamic
//! storage by asking the host whether it is in edit mode.

use crate::call::PersistentCall;
use crate::error::{EventError, Result};
use crate::event::{DynamicCallId, EventArgs, PersistentEvent};
use std::sync::Arc;
use void_reflect::{registry, MemberHandle, MethodInfo, ObjectRef};

/// Host capability queried when binding listeners
pub trait PlayState {
    /// Whether the host is editing data rather than running
    fn is_edit_mode(&self) -> bool;
}

/// Host that is always running
#[derive(Clone, Copy, Debug, Default)]
pub struct RuntimeState;

impl PlayState for RuntimeState {
    fn is_edit_mode(&self) -> bool {
        false
    }
}

/// Host that is always editing
#[derive(Clone, Copy, Debug, Default)]
pub struct EditState;

impl PlayState for EditState {
    fn is_edit_mode(&self) -> bool {
        true
    }
}

/// Where `bind` stored a listener
///
/// Persistent listeners are identified by member and target, so the handle
/// stays valid while other calls are added or removed.
#[derive(Clone, Debug, PartialEq)]
pub enum BoundListener {
    Persistent {
        member: MemberHandle,
        target: Option<ObjectRef>,
    },
    Dynamic(DynamicCallId),
}

impl<P: EventArgs> PersistentEvent<P> {
    /// Check that `method` accepts the event's parameters in order
    pub fn check_listener(&self, method: &MethodInfo) -> Result<()> {
        let incompatible = |reason: String| EventError::IncompatibleListener {
            member: method.full_name(),
            reason,
        };

        if method.parameters.len() != P::ARITY {
            return Err(incompatible(format!(
                "takes {} parameter(s) but the event passes {}",
                method.parameters.len(),
                P::ARITY
            )));
        }

        let registry = registry();
        for (index, (parameter, event_type)) in method
            .parameters
            .iter()
            .zip(P::parameter_types())
            .enumerate()
        {
            if !registry.is_assignable(parameter.parameter_type.as_str(), event_type.as_str()) {
                return Err(incompatible(format!(
                    "parameter {} is {} but the event passes {}",
                    index, parameter.parameter_type, event_type
                )));
            }
        }
        Ok(())
    }

    /// Add a persistent call forwarding the event parameters to `method`
    pub fn bind_persistent(
        &mut self,
        method: &Arc<MethodInfo>,
        target: Option<ObjectRef>,
    ) -> Result<usize> {
        self.check_listener(method)?;

        let mut call = PersistentCall::with_method(method, target);
        for (index, argument) in call.arguments_mut().iter_mut().enumerate() {
            argument.set_parameter_link(index);
        }
        Ok(self.add_persistent_call(call))
    }

    /// Remove the first persistent call of `method` on `target`
    pub fn unbind_persistent(&mut self, method: &Arc<MethodInfo>, target: Option<&ObjectRef>) -> bool {
        self.remove_persistent_member(&MemberHandle::Method(method.clone()), target)
    }

    fn remove_persistent_member(
        &mut self,
        member: &MemberHandle,
        target: Option<&ObjectRef>,
    ) -> bool {
        let needs_target = !member.is_static();
        let position = self.persistent_calls().iter().position(|call| {
            call.member().as_ref() == Some(member) && (!needs_target || call.target() == target)
        });

        match position {
            Some(index) => self.remove_persistent_call(index).is_ok(),
            None => false,
        }
    }

    /// Bind persistently in edit mode, dynamically otherwise
    pub fn bind(
        &mut self,
        state: &dyn PlayState,
        method: &Arc<MethodInfo>,
        target: Option<ObjectRef>,
    ) -> Result<BoundListener> {
        if state.is_edit_mode() {
            let index = self.bind_persistent(method, target)?;
            let call = self.persistent_call(index)?;
            return Ok(BoundListener::Persistent {
                member: MemberHandle::Method(method.clone()),
                target: call.target().cloned(),
            });
        }

        self.check_listener(method)?;
        let method = method.clone();
        let id = self.add_fallible_dynamic_call(move |args: &P| {
            method
                .invoke(target.as_ref(), &args.to_values())
                .map(|_| ())
                .map_err(|e| EventError::invocation(method.full_name(), e))
        });
        Ok(BoundListener::Dynamic(id))
    }

    /// Remove a listener added by `bind`
    pub fn unbind(&mut self, listener: BoundListener) -> bool {
        match listener {
            BoundListener::Persistent { member, target } => {
                self.remove_persistent_member(&member, target.as_ref())
            }
            BoundListener::Dynamic(id) => self.remove_dynamic_call(id),
        }
    }
}
