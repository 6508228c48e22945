//! Event holders
//!
//! Small owners of persistent events that engine hooks forward into.
//! Holders always invoke through `invoke_safe`, so a broken listener cannot
//! interrupt the hook that triggered it.

use crate::event::{EventArgs, PersistentEvent};
use void_reflect::Reflected;

/// A single parameterless event
#[derive(Clone, Debug, Default)]
pub struct EventHolder {
    pub event: PersistentEvent<()>,
}

impl EventHolder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Invoke the event
    pub fn invoke(&self) -> bool {
        self.event.invoke_safe(&())
    }
}

/// Object lifecycle hooks
#[derive(Clone, Debug, Default)]
pub struct LifeCycleEvents {
    pub awake: PersistentEvent<()>,
    pub start: PersistentEvent<()>,
    pub enable: PersistentEvent<()>,
    pub disable: PersistentEvent<()>,
    pub destroy: PersistentEvent<()>,
}

impl LifeCycleEvents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_awake(&self) {
        self.awake.invoke_safe(&());
    }

    pub fn on_start(&self) {
        self.start.invoke_safe(&());
    }

    pub fn on_enable(&self) {
        self.enable.invoke_safe(&());
    }

    pub fn on_disable(&self) {
        self.disable.invoke_safe(&());
    }

    pub fn on_destroy(&self) {
        self.destroy.invoke_safe(&());
    }
}

/// Frame update hooks
#[derive(Clone, Debug, Default)]
pub struct UpdateEvents {
    pub update: PersistentEvent<()>,
    pub late_update: PersistentEvent<()>,
    pub fixed_update: PersistentEvent<()>,
}

impl UpdateEvents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_update(&self) {
        self.update.invoke_safe(&());
    }

    pub fn on_late_update(&self) {
        self.late_update.invoke_safe(&());
    }

    pub fn on_fixed_update(&self) {
        self.fixed_update.invoke_safe(&());
    }
}

/// Contact hooks, for collisions or triggers
///
/// `C` is whatever the physics layer reports for a contact, usually the
/// other object.
#[derive(Clone, Debug)]
pub struct ContactEvents<C>
where
    (C,): EventArgs,
{
    pub enter: PersistentEvent<(C,)>,
    pub stay: PersistentEvent<(C,)>,
    pub exit: PersistentEvent<(C,)>,
}

impl<C> ContactEvents<C>
where
    C: Reflected + Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            enter: PersistentEvent::new(),
            stay: PersistentEvent::new(),
            exit: PersistentEvent::new(),
        }
    }

    pub fn on_enter(&self, contact: C) {
        self.enter.invoke_safe(&(contact,));
    }

    pub fn on_stay(&self, contact: C) {
        self.stay.invoke_safe(&(contact,));
    }

    pub fn on_exit(&self, contact: C) {
        self.exit.invoke_safe(&(contact,));
    }
}

impl<C> Default for ContactEvents<C>
where
    C: Reflected + Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
