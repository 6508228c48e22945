//! Return value link maintenance
//!
//! Return value links store the index of the producing call. When calls are
//! inserted, removed or reordered, links are re-pointed so they keep
//! following the same producer rather than the same index.

use crate::argument::{ArgumentSource, Literal};
use crate::call::PersistentCall;
use serde::{Deserialize, Serialize};
use void_reflect::{registry, MemberHandle, TypeKey};

/// What to do with a link whose producer no longer exists
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkRepair {
    /// Keep the stored index, even if it now points at a different call
    #[default]
    Preserve,
    /// Replace the link with the declared type's default constant
    ResetToConstant,
}

/// Producer of each call slot, captured before an edit
#[derive(Clone, Debug, Default)]
pub struct LinkSnapshot {
    producers: Vec<Option<MemberHandle>>,
}

impl LinkSnapshot {
    /// Record the resolved member of every call
    pub fn capture(calls: &[PersistentCall]) -> Self {
        Self {
            producers: calls.iter().map(|call| call.member()).collect(),
        }
    }

    /// Producer that occupied `index` when the snapshot was taken
    ///
    /// `None` when the index was out of range, `Some(None)` when the call in
    /// that slot was unresolved.
    pub fn producer(&self, index: usize) -> Option<Option<&MemberHandle>> {
        self.producers.get(index).map(Option::as_ref)
    }

    pub fn len(&self) -> usize {
        self.producers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.producers.is_empty()
    }
}

/// Outcome of a repair pass
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RepairReport {
    /// Links moved to their producer's new index
    pub repointed: usize,
    /// Links whose producer was not found
    pub unmatched: usize,
}

/// Index of the first call resolving to `member`
pub fn index_of_member(calls: &[PersistentCall], member: &MemberHandle) -> Option<usize> {
    calls
        .iter()
        .position(|call| call.member().as_ref() == Some(member))
}

/// Re-point return value links after an edit
///
/// A link stays put when its slot still holds the same producer, otherwise
/// it moves to the first call resolving to that producer. A producer that was
/// unresolved when the snapshot was taken matches the first unresolved call.
/// Links past the end of the snapshot are left alone. Unmatched links are
/// handled by `policy`.
pub fn repair_links(
    calls: &mut [PersistentCall],
    snapshot: &LinkSnapshot,
    policy: LinkRepair,
) -> RepairReport {
    let mut report = RepairReport::default();
    if snapshot.is_empty() {
        return report;
    }

    let current: Vec<Option<MemberHandle>> = calls.iter().map(|call| call.member()).collect();
    let find = |member: Option<&MemberHandle>| current.iter().position(|m| m.as_ref() == member);

    for (call_index, call) in calls.iter_mut().enumerate() {
        for argument in call.arguments_mut() {
            let ArgumentSource::ReturnValue(index) = *argument.source() else {
                continue;
            };
            let Some(producer) = snapshot.producer(index) else {
                continue;
            };
            if current.get(index).map(Option::as_ref) == Some(producer) {
                continue;
            }
            let producer_name = producer.map_or("<unresolved>", |p| p.name());

            match find(producer) {
                Some(new_index) => {
                    argument.set_return_value_link(new_index);
                    report.repointed += 1;
                }
                None => {
                    report.unmatched += 1;
                    match policy {
                        LinkRepair::Preserve => {
                            log::debug!(
                                "Call {} keeps its link to index {} after '{}' was removed",
                                call_index,
                                index,
                                producer_name
                            );
                        }
                        LinkRepair::ResetToConstant => {
                            log::warn!(
                                "Call {} lost its link to '{}'; resetting to a constant",
                                call_index,
                                producer_name
                            );
                            let literal = Literal::default_for(argument.declared_type());
                            argument.set_constant(literal);
                        }
                    }
                }
            }
        }
    }
    report
}

// ========== Link Candidates ==========

/// Value an argument can be linked to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LinkCandidate {
    Parameter(usize),
    ReturnValue(usize),
}

/// Parameters, then strictly earlier calls, whose type fits `declared_type`
pub fn link_candidates(
    parameter_types: &[TypeKey],
    calls: &[PersistentCall],
    call_index: usize,
    declared_type: &TypeKey,
) -> Vec<LinkCandidate> {
    let registry = registry();
    let fits = |from: &TypeKey| registry.is_assignable(declared_type.as_str(), from.as_str());

    let parameters = parameter_types
        .iter()
        .enumerate()
        .filter(|(_, ty)| fits(ty))
        .map(|(i, _)| LinkCandidate::Parameter(i));

    let returns = calls
        .iter()
        .take(call_index)
        .enumerate()
        .filter(|(_, call)| call.return_type().is_some_and(|ty| fits(&ty)))
        .map(|(i, _)| LinkCandidate::ReturnValue(i));

    parameters.chain(returns).collect()
}
