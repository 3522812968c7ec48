//! Global consistency rules over a tentative wiring
//!
//! The checker runs after each tentative choice the resolver makes. A
//! violation is data, not an error: it invalidates the specific choice that
//! caused it and drives backtracking. When one event produces several
//! violations, precedence is singleton > uses-constraint > cycle (cycle
//! violations are raised by the resolver itself when a speculative cycle
//! fails to close).

use crate::index::CandidateIndex;
use crate::resolver::wiring::TentativeWiring;
use crate::resource::{CapId, ReqId, ResourceId};
use indexmap::{IndexMap, IndexSet};
use std::collections::VecDeque;
use tracing::trace;

/// A tentative wiring change to validate
#[derive(Debug, Clone)]
pub enum CheckEvent {
    /// A requirement was tentatively bound to a capability
    Binding { requirement: ReqId, capability: CapId },
    /// A resource completed its requirements and is entering the resolved set
    Resolved { resource: ResourceId },
}

/// A consistency rule broken by a tentative wiring change
#[derive(Debug, Clone, PartialEq)]
pub enum Violation {
    /// Two members of one singleton group in the resolved set
    Singleton {
        resource: ResourceId,
        group: String,
        conflicting: ResourceId,
    },
    /// A resource would see two provider lineages of one namespace
    Uses {
        resource: ResourceId,
        namespace: String,
        chosen: CapId,
        conflicting: CapId,
    },
}

impl Violation {
    /// The resource the violation is reported against
    pub fn resource(&self) -> &ResourceId {
        match self {
            Violation::Singleton { resource, .. } => resource,
            Violation::Uses { resource, .. } => resource,
        }
    }

    fn precedence(&self) -> u8 {
        match self {
            Violation::Singleton { .. } => 0,
            Violation::Uses { .. } => 1,
        }
    }
}

/// Validates tentative wiring changes against the global rules
pub struct ConstraintChecker<'a> {
    index: &'a CandidateIndex<'a>,
}

impl<'a> ConstraintChecker<'a> {
    pub fn new(index: &'a CandidateIndex<'a>) -> Self {
        Self { index }
    }

    /// Check a tentative change; returns all violations found, highest
    /// precedence first. An empty result means the wiring is still
    /// consistent. Every resource touched by the event is checked.
    pub fn check(&self, wiring: &TentativeWiring, event: &CheckEvent) -> Vec<Violation> {
        let mut violations = Vec::new();
        match event {
            CheckEvent::Binding {
                requirement,
                capability,
            } => {
                self.check_uses(wiring, &requirement.resource, &mut violations);
                if capability.resource != requirement.resource {
                    self.check_uses(wiring, &capability.resource, &mut violations);
                }
            }
            CheckEvent::Resolved { resource } => {
                self.check_singleton(wiring, resource, &mut violations);
                // closing a resource re-validates its whole binding set,
                // which is what finally vets speculative cycle bindings
                self.check_uses(wiring, resource, &mut violations);
            }
        }
        violations.sort_by_key(Violation::precedence);
        if !violations.is_empty() {
            trace!(count = violations.len(), "constraint violations");
        }
        violations
    }

    fn check_singleton(
        &self,
        wiring: &TentativeWiring,
        resource_id: &ResourceId,
        out: &mut Vec<Violation>,
    ) {
        let Some(resource) = self.index.resource(resource_id) else {
            return;
        };
        let Some(group) = resource.singleton_group() else {
            return;
        };
        for other_id in &wiring.resolved {
            if other_id == resource_id {
                continue;
            }
            let Some(other) = self.index.resource(other_id) else {
                continue;
            };
            if other.singleton_group() == Some(group) {
                out.push(Violation::Singleton {
                    resource: resource_id.clone(),
                    group: group.to_string(),
                    conflicting: other_id.clone(),
                });
            }
        }
    }

    /// Uses-constraint consistency for one consumer: for every bound
    /// capability, each namespace in its uses closure must come from the
    /// same provider lineage the consumer itself sees for that namespace.
    fn check_uses(
        &self,
        wiring: &TentativeWiring,
        resource_id: &ResourceId,
        out: &mut Vec<Violation>,
    ) {
        let Some(resource) = self.index.resource(resource_id) else {
            return;
        };
        for (_req, cap_id) in wiring.bindings_of(resource_id) {
            for (namespace, provider_source) in self.uses_sources(wiring, cap_id) {
                // what the consumer itself sees for this namespace
                let own = if let Some(ord) = resource
                    .capabilities()
                    .iter()
                    .position(|c| c.namespace() == namespace)
                {
                    Some((resource_id.clone(), resource.cap_id(ord)))
                } else if let Some((_own_req, own_cap)) =
                    wiring.binding_for(self.index, resource_id, &namespace)
                {
                    self.source_of(wiring, &own_cap.resource, &namespace)
                        .map(|source| (source, own_cap.clone()))
                } else {
                    None
                };

                if let Some((own_source, own_cap)) = own {
                    if provider_source != own_source {
                        out.push(Violation::Uses {
                            resource: resource_id.clone(),
                            namespace: namespace.clone(),
                            chosen: cap_id.clone(),
                            conflicting: own_cap,
                        });
                    }
                }
            }
        }
    }

    /// Namespaces a capability transitively re-exposes, each mapped to the
    /// resource ultimately supplying it along the provider's current
    /// lineage. The chain is followed through the uses declarations of the
    /// supplying capabilities themselves.
    fn uses_sources(
        &self,
        wiring: &TentativeWiring,
        cap_id: &CapId,
    ) -> IndexMap<String, ResourceId> {
        let mut sources = IndexMap::new();
        let mut queue: VecDeque<(ResourceId, String)> = VecDeque::new();
        if let Some(capability) = self.index.capability(cap_id) {
            for used in capability.uses_namespaces() {
                queue.push_back((cap_id.resource.clone(), used.clone()));
            }
        }

        while let Some((context, namespace)) = queue.pop_front() {
            if sources.contains_key(&namespace) {
                continue;
            }
            let Some(source) = self.source_of(wiring, &context, &namespace) else {
                continue;
            };
            let Some(source_resource) = self.index.resource(&source) else {
                continue;
            };
            sources.insert(namespace.clone(), source.clone());
            if let Some(supplier) = source_resource
                .capabilities()
                .iter()
                .find(|c| c.namespace() == namespace)
            {
                for used in supplier.uses_namespaces() {
                    queue.push_back((source.clone(), used.clone()));
                }
            }
        }
        sources
    }

    /// The resource ultimately supplying `namespace` as seen from
    /// `provider`: the provider itself when it declares a capability in the
    /// namespace, otherwise the lineage its current binding re-exports.
    fn source_of(
        &self,
        wiring: &TentativeWiring,
        provider: &ResourceId,
        namespace: &str,
    ) -> Option<ResourceId> {
        let mut visited: IndexSet<ResourceId> = IndexSet::new();
        let mut current = provider.clone();
        loop {
            if !visited.insert(current.clone()) {
                return None;
            }
            let resource = self.index.resource(&current)?;
            if resource
                .capabilities()
                .iter()
                .any(|c| c.namespace() == namespace)
            {
                return Some(current);
            }
            let (_req, cap) = wiring.binding_for(self.index, &current, namespace)?;
            current = cap.resource.clone();
        }
    }
}
