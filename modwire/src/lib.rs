// modwire Library
// Capability/requirement resolution core for pluggable-module runtimes

// Resource model and matching
pub mod index;
pub mod resource;

// Resolution engine
pub mod constraints;
pub mod resolver;

// Diagnostics
pub mod render;
pub mod report;

// Input boundary
pub mod manifest;

// Re-export the types most callers touch
pub use index::{CandidateIndex, CandidateSurvey};
pub use manifest::{ManifestError, ResourceSetManifest};
pub use report::{EntryKind, ReportBuilder, ReportEntry, ResolutionReport};
pub use resolver::{
    resolve_set, Binding, Resolution, ResolutionState, ResolveOptions, Resolver, Wiring,
};
pub use resource::{
    AttrValue, CapId, Capability, Filter, FilterError, ReqId, Requirement, RequirementMode,
    Resource, ResourceId, Version, VersionError,
};
