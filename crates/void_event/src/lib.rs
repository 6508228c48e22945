//! # void_event - Persistent Events
//!
//! Serializable events whose listeners are stored as data:
//! - Persistent calls naming a reflected field, method or constructor
//! - Arguments that are constants, event parameters or earlier return values
//! - Dynamic calls registered from code at runtime
//! - Link repair when persistent calls are removed or reordered
//! - JSON records and TOML configuration
//!
//! ```ignore
//! use void_event::prelude::*;
//!
//! let mut on_damage = PersistentEvent::<(i32,)>::new();
//! on_damage.bind_persistent(&take_damage, Some(player))?;
//! on_damage.invoke(&(25,))?;
//! ```

pub mod argument;
pub mod binding;
pub mod call;
pub mod config;
pub mod error;
pub mod event;
pub mod holders;
pub mod links;
pub mod operators;
pub mod record;

pub use argument::{ArgumentKind, ArgumentSource, InvocationContext, Literal, PersistentArgument};
pub use binding::{BoundListener, EditState, PlayState, RuntimeState};
pub use call::{MemberDetails, PersistentCall, ResolvedMember, FIELD_NAME_SUFFIX};
pub use config::{ConfigError, ConfigResult, EventConfig};
pub use error::{EventError, Result};
pub use event::{DynamicCall, DynamicCallId, EventArgs, PersistentEvent};
pub use holders::{ContactEvents, EventHolder, LifeCycleEvents, UpdateEvents};
pub use links::{
    index_of_member, link_candidates, repair_links, LinkCandidate, LinkRepair, LinkSnapshot,
    RepairReport,
};
pub use operators::{register_operators, OPERATORS_TYPE};
pub use record::{ArgumentRecord, CallRecord, EventRecord, LiteralRecord};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::argument::{Literal, PersistentArgument};
    pub use crate::binding::{BoundListener, PlayState};
    pub use crate::call::PersistentCall;
    pub use crate::config::EventConfig;
    pub use crate::error::{EventError, Result};
    pub use crate::event::{EventArgs, PersistentEvent};
    pub use crate::holders::{EventHolder, LifeCycleEvents, UpdateEvents};
    pub use crate::links::{LinkCandidate, LinkRepair};
    pub use crate::record::EventRecord;
    pub use void_reflect::prelude::*;
}
