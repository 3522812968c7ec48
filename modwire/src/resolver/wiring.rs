//! Wiring: the binding of requirements to chosen capabilities
//!
//! During a run the resolver mutates a [`TentativeWiring`]; the public
//! [`Wiring`] is the immutable snapshot published once the run converges.

use crate::index::CandidateIndex;
use crate::resource::{CapId, ReqId, ResourceId};
use indexmap::{IndexMap, IndexSet};
use serde::Serialize;

/// The mutable wiring owned by one resolution run
///
/// Constructed and mutated only by the run's own resolver; the constraint
/// checker reads it when validating tentative changes.
#[derive(Debug, Default)]
pub struct TentativeWiring {
    /// Requirement → chosen capability, in commit order
    pub(crate) bindings: IndexMap<ReqId, CapId>,
    /// Resources that completed resolution, in commit order
    pub(crate) resolved: IndexSet<ResourceId>,
}

impl TentativeWiring {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Bindings declared by one resource, in commit order
    pub(crate) fn bindings_of<'s>(
        &'s self,
        resource: &'s ResourceId,
    ) -> impl Iterator<Item = (&'s ReqId, &'s CapId)> {
        self.bindings
            .iter()
            .filter(move |(req, _)| &req.resource == resource)
    }

    /// The capability a resource is bound to for a namespace, if any
    pub(crate) fn binding_for(
        &self,
        index: &CandidateIndex<'_>,
        resource: &ResourceId,
        namespace: &str,
    ) -> Option<(&ReqId, &CapId)> {
        self.bindings.iter().find(|(req, _)| {
            &req.resource == resource
                && index
                    .requirement(req)
                    .map(|r| r.namespace() == namespace)
                    .unwrap_or(false)
        })
    }
}

/// One resolved requirement → capability pair
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Binding {
    pub requirement: ReqId,
    pub capability: CapId,
}

/// The immutable resolution result: requirement bindings plus the set of
/// resources that resolved
///
/// Contains only resolved resources' bindings; optional requirements that
/// stayed unsatisfied are simply absent.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Wiring {
    bindings: Vec<Binding>,
    resolved: Vec<ResourceId>,
}

impl Wiring {
    pub(crate) fn from_tentative(tentative: &TentativeWiring) -> Self {
        let bindings = tentative
            .bindings
            .iter()
            .filter(|(req, _)| tentative.resolved.contains(&req.resource))
            .map(|(req, cap)| Binding {
                requirement: req.clone(),
                capability: cap.clone(),
            })
            .collect();
        Self {
            bindings,
            resolved: tentative.resolved.iter().cloned().collect(),
        }
    }

    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    /// Resources in the wiring, in resolution order
    pub fn resolved(&self) -> &[ResourceId] {
        &self.resolved
    }

    pub fn is_resolved(&self, resource: &ResourceId) -> bool {
        self.resolved.contains(resource)
    }

    /// The capability chosen for a requirement, if the requirement resolved
    pub fn capability_for(&self, requirement: &ReqId) -> Option<&CapId> {
        self.bindings
            .iter()
            .find(|binding| &binding.requirement == requirement)
            .map(|binding| &binding.capability)
    }

    /// True when no requirement was bound
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
