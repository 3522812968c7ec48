//! Resolution diagnostics report
//!
//! Every decision the resolver takes leaves a typed entry here: candidates
//! rejected by filters, constraint violations, missing providers. Entries are
//! grouped by resource and kept in insertion order, accumulated through a
//! single-use builder and snapshotted into an immutable report that is safe
//! for concurrent readers.

use crate::resource::{CapId, ReqId, ResourceId};
use indexmap::IndexMap;
use serde::Serialize;

/// Discriminant of a report entry, for grouping and assertions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    MissingCapability,
    FilteredCandidate,
    SingletonConflict,
    UsesConstraintViolation,
    CycleDetected,
    UnresolvedRequirement,
    MalformedFilter,
}

/// One diagnostic fact about a resource
///
/// Payloads carry enough context (requirement, rejected capability,
/// conflicting resource) to render a human-readable explanation downstream
/// without re-running the resolver.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReportEntry {
    /// No capability matched a mandatory requirement at all
    MissingCapability {
        requirement: ReqId,
        namespace: String,
        filter: Option<String>,
    },
    /// A capability in the right namespace was rejected by the filter
    FilteredCandidate {
        requirement: ReqId,
        namespace: String,
        capability: CapId,
    },
    /// The resource clashes with an already-resolved member of its
    /// singleton group
    SingletonConflict {
        group: String,
        conflicting: ResourceId,
    },
    /// A chosen capability would expose two providers of one namespace to
    /// the same consumer
    UsesConstraintViolation {
        namespace: String,
        chosen: CapId,
        conflicting: CapId,
    },
    /// A speculative dependency cycle could not be closed
    CycleDetected { with: ResourceId },
    /// A requirement ended the run without a chosen capability; fatal for
    /// mandatory requirements, informational for optional ones
    UnresolvedRequirement {
        requirement: ReqId,
        namespace: String,
        optional: bool,
    },
    /// The requirement's filter could not be evaluated
    MalformedFilter { requirement: ReqId, error: String },
}

impl ReportEntry {
    pub fn kind(&self) -> EntryKind {
        match self {
            ReportEntry::MissingCapability { .. } => EntryKind::MissingCapability,
            ReportEntry::FilteredCandidate { .. } => EntryKind::FilteredCandidate,
            ReportEntry::SingletonConflict { .. } => EntryKind::SingletonConflict,
            ReportEntry::UsesConstraintViolation { .. } => EntryKind::UsesConstraintViolation,
            ReportEntry::CycleDetected { .. } => EntryKind::CycleDetected,
            ReportEntry::UnresolvedRequirement { .. } => EntryKind::UnresolvedRequirement,
            ReportEntry::MalformedFilter { .. } => EntryKind::MalformedFilter,
        }
    }
}

/// Accumulates report entries during one resolution run
///
/// The builder is exclusively owned by its run and single-use: after
/// [`ReportBuilder::build`] it must not be touched again.
#[derive(Debug, Default)]
pub struct ReportBuilder {
    entries: IndexMap<ResourceId, Vec<ReportEntry>>,
    built: bool,
}

impl ReportBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry for a resource; prior entries are never reordered
    /// or overwritten
    ///
    /// # Panics
    ///
    /// Panics when called after [`ReportBuilder::build`]: mutating a built
    /// report is a contract violation by the caller, not a resolution
    /// failure.
    pub fn add_entry(&mut self, resource: &ResourceId, entry: ReportEntry) {
        assert!(!self.built, "report builder used after build()");
        self.entries
            .entry(resource.clone())
            .or_default()
            .push(entry);
    }

    /// Snapshot the accumulated entries into an immutable report
    ///
    /// # Panics
    ///
    /// Panics on a second call; the builder may not be reused.
    pub fn build(&mut self) -> ResolutionReport {
        assert!(!self.built, "report builder built twice");
        self.built = true;
        ResolutionReport {
            entries: std::mem::take(&mut self.entries),
        }
    }
}

/// Immutable mapping from resource to its ordered diagnostic entries
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ResolutionReport {
    entries: IndexMap<ResourceId, Vec<ReportEntry>>,
}

impl ResolutionReport {
    /// Entries recorded for one resource, in insertion order
    pub fn entries_for(&self, resource: &ResourceId) -> &[ReportEntry] {
        self.entries.get(resource).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Resources with at least one entry, in first-entry order
    pub fn resources(&self) -> impl Iterator<Item = &ResourceId> {
        self.entries.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ResourceId, &[ReportEntry])> {
        self.entries.iter().map(|(id, list)| (id, list.as_slice()))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.values().all(Vec::is_empty)
    }

    pub fn total_entries(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }
}
