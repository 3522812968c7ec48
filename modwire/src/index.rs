//! Candidate index: namespace + filter matching over a resource set
//!
//! Built once from the complete resource set before any lookup. Lookups are
//! read-only and deterministic: capabilities are ordered by declaring
//! resource identity, then by declaration order within the resource, so
//! identical inputs always yield identical candidate sequences.

use crate::resource::{CapId, Capability, ReqId, Requirement, Resource, ResourceId};
use indexmap::IndexMap;
use itertools::Itertools;
use tracing::{trace, warn};

/// Outcome of one candidate search, including the diagnostic breakdown
/// the resolver records alongside the match list
#[derive(Debug, Clone, Default)]
pub struct CandidateSurvey {
    /// Capabilities satisfying namespace + filter, in index order
    pub matched: Vec<CapId>,
    /// Capabilities in the right namespace that the filter rejected
    pub filtered: Vec<CapId>,
    /// Filter evaluation error, if the requirement's filter is malformed;
    /// a malformed filter leaves `matched` empty
    pub malformed: Option<String>,
}

/// Read-only candidate lookup over an indexed resource set
pub struct CandidateIndex<'a> {
    resources: IndexMap<ResourceId, &'a Resource>,
    by_namespace: IndexMap<String, Vec<CapId>>,
}

impl<'a> CandidateIndex<'a> {
    /// Index the complete resource set
    ///
    /// Resources are indexed in identity order regardless of slice order.
    /// A duplicated identity keeps the later declaration and logs a warning.
    pub fn new(resources: &'a [Resource]) -> Self {
        let mut by_id: IndexMap<ResourceId, &'a Resource> = IndexMap::new();
        for resource in resources.iter().sorted_by_key(|r| r.id().clone()) {
            if by_id.insert(resource.id().clone(), resource).is_some() {
                warn!(resource = %resource.id(), "duplicate resource id, later declaration wins");
            }
        }

        let mut by_namespace: IndexMap<String, Vec<CapId>> = IndexMap::new();
        for resource in by_id.values() {
            for (ord, capability) in resource.capabilities().iter().enumerate() {
                by_namespace
                    .entry(capability.namespace().to_string())
                    .or_default()
                    .push(resource.cap_id(ord));
            }
        }

        trace!(
            resources = by_id.len(),
            namespaces = by_namespace.len(),
            "candidate index built"
        );
        Self {
            resources: by_id,
            by_namespace,
        }
    }

    /// All indexed resources, in identity order
    pub fn resources(&self) -> impl Iterator<Item = &'a Resource> + '_ {
        self.resources.values().copied()
    }

    pub fn resource(&self, id: &ResourceId) -> Option<&'a Resource> {
        self.resources.get(id).copied()
    }

    pub fn capability(&self, id: &CapId) -> Option<&'a Capability> {
        self.resource(&id.resource)
            .and_then(|resource| resource.capability(id.ord))
    }

    pub fn requirement(&self, id: &ReqId) -> Option<&'a Requirement> {
        self.resource(&id.resource)
            .and_then(|resource| resource.requirement(id.ord))
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Every capability matching the requirement, in deterministic index
    /// order. An empty result is a valid, non-erroneous answer.
    pub fn find_candidates(&self, requirement: &Requirement) -> Vec<CapId> {
        self.survey(requirement).matched
    }

    /// The same search as [`CandidateIndex::find_candidates`], with the
    /// filtered/malformed breakdown the resolver turns into report entries
    pub fn survey(&self, requirement: &Requirement) -> CandidateSurvey {
        let mut survey = CandidateSurvey::default();
        let Some(capabilities) = self.by_namespace.get(requirement.namespace()) else {
            return survey;
        };

        for cap_id in capabilities {
            let Some(capability) = self.capability(cap_id) else {
                continue;
            };
            match requirement.matches(capability) {
                Ok(true) => survey.matched.push(cap_id.clone()),
                Ok(false) => survey.filtered.push(cap_id.clone()),
                Err(err) => {
                    survey.malformed.get_or_insert_with(|| err.to_string());
                }
            }
        }

        // a malformed filter disqualifies the whole requirement
        if survey.malformed.is_some() {
            survey.matched.clear();
        }
        trace!(
            namespace = requirement.namespace(),
            matched = survey.matched.len(),
            filtered = survey.filtered.len(),
            "candidate survey"
        );
        survey
    }
}
