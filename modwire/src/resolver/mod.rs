//! Depth-first resolution over a candidate index
//!
//! The resolver walks each requested root with an explicit frame stack: one
//! frame per in-progress resource, holding its requirement cursor and
//! candidate cursor. Tentative wiring mutations are journaled on an undo
//! trail so a constraint violation rolls back exactly the choice that caused
//! it. A provider already in progress on the current path is bound
//! speculatively and validated when the cycle closes.
//!
//! Resolution-domain failures (missing capabilities, conflicts, cycles) are
//! never errors; they become report entries and `Unresolved` states. A run
//! always ends with a complete, readable report.

pub mod wiring;

pub use wiring::{Binding, Wiring};

use crate::constraints::{CheckEvent, ConstraintChecker, Violation};
use crate::index::{CandidateIndex, CandidateSurvey};
use crate::report::{ReportBuilder, ReportEntry, ResolutionReport};
use crate::resource::{CapId, ReqId, Requirement, ResourceId};
use indexmap::{IndexMap, IndexSet};
use serde::Serialize;
use tracing::{debug, trace, warn};
use wiring::TentativeWiring;

/// Per-resource resolution state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionState {
    /// Not yet attempted
    Pending,
    /// A candidate is chosen and dependencies are being resolved
    InProgress,
    /// Every mandatory requirement satisfied without violations
    Resolved,
    /// All candidates exhausted without success
    Unresolved,
}

/// Caller-tunable knobs for one resolution run
#[derive(Debug, Clone, Copy, Default)]
pub struct ResolveOptions {
    /// Publish a wiring even when some requested roots stay unresolved.
    /// Mandatory requirements of resolved resources are still always
    /// satisfied; only whole resources can be missing.
    pub allow_partial: bool,
}

/// Outcome of one resolution run
#[derive(Debug, Clone, Serialize)]
pub struct Resolution {
    roots: Vec<ResourceId>,
    states: IndexMap<ResourceId, ResolutionState>,
    wiring: Option<Wiring>,
    report: ResolutionReport,
}

impl Resolution {
    pub fn roots(&self) -> &[ResourceId] {
        &self.roots
    }

    pub fn state(&self, resource: &ResourceId) -> ResolutionState {
        self.states
            .get(resource)
            .copied()
            .unwrap_or(ResolutionState::Pending)
    }

    /// True when every requested root resolved
    pub fn is_fully_resolved(&self) -> bool {
        self.roots
            .iter()
            .all(|root| self.state(root) == ResolutionState::Resolved)
    }

    /// The published wiring: present when the run fully resolved, or when
    /// the caller opted into partial resolution
    pub fn wiring(&self) -> Option<&Wiring> {
        self.wiring.as_ref()
    }

    pub fn report(&self) -> &ResolutionReport {
        &self.report
    }
}

/// One journaled mutation of the run's shared state
#[derive(Debug)]
enum TrailOp {
    Bound,
    ResolvedAdded,
    StateSet(ResourceId, Option<ResolutionState>),
    SpecPushed,
}

/// A binding committed against a provider still in progress on the path
#[derive(Debug)]
struct Speculation {
    consumer: ReqId,
    provider: ResourceId,
}

/// Search position within one in-progress resource
struct Frame {
    resource: ResourceId,
    /// Trail length when this resource was entered; failing the resource
    /// unwinds everything after it
    entry_checkpoint: usize,
    req_cursor: usize,
    candidates: Option<Vec<CapId>>,
    cand_cursor: usize,
    /// Whether the current requirement had any matching candidate at all,
    /// distinguishing MissingCapability from exhausted-by-rejection
    had_candidates: bool,
    /// Candidate whose provider a child frame is currently resolving
    awaiting: Option<CapId>,
}

fn advance_requirement(frame: &mut Frame) {
    frame.req_cursor += 1;
    frame.candidates = None;
    frame.cand_cursor = 0;
    frame.had_candidates = false;
}

/// Orchestrates one resolution run
///
/// The resolver exclusively owns its tentative wiring and report builder;
/// model data and the candidate index are only borrowed. Roots are resolved
/// one at a time; a caller wanting cancellation checks its flag between
/// [`Resolver::resolve_root`] calls and simply never calls
/// [`Resolver::finish`], so no partial wiring is ever published.
pub struct Resolver<'a> {
    index: &'a CandidateIndex<'a>,
    checker: ConstraintChecker<'a>,
    options: ResolveOptions,
    states: IndexMap<ResourceId, ResolutionState>,
    wiring: TentativeWiring,
    report: ReportBuilder,
    trail: Vec<TrailOp>,
    speculations: Vec<Speculation>,
    surveyed: IndexSet<ReqId>,
    roots: Vec<ResourceId>,
}

impl<'a> Resolver<'a> {
    pub fn new(index: &'a CandidateIndex<'a>, options: ResolveOptions) -> Self {
        Self {
            index,
            checker: ConstraintChecker::new(index),
            options,
            states: IndexMap::new(),
            wiring: TentativeWiring::new(),
            report: ReportBuilder::new(),
            trail: Vec::new(),
            speculations: Vec::new(),
            surveyed: IndexSet::new(),
            roots: Vec::new(),
        }
    }

    /// Resolve several roots in order
    pub fn resolve_all(&mut self, roots: impl IntoIterator<Item = ResourceId>) {
        for root in roots {
            self.resolve_root(&root);
        }
    }

    /// Resolve one requested root and everything it transitively requires
    pub fn resolve_root(&mut self, root: &ResourceId) -> ResolutionState {
        if !self.roots.contains(root) {
            self.roots.push(root.clone());
        }
        if self.index.resource(root).is_none() {
            warn!(resource = %root, "requested root is not in the index");
            self.states
                .insert(root.clone(), ResolutionState::Unresolved);
            return ResolutionState::Unresolved;
        }

        // a failed speculative cycle can leave the root back at Pending;
        // one retry gives it a fresh context before giving up
        let mut attempts = 0;
        while self.state_of(root) == ResolutionState::Pending {
            if attempts >= 2 {
                self.states
                    .insert(root.clone(), ResolutionState::Unresolved);
                break;
            }
            self.dfs(root.clone());
            attempts += 1;
        }
        self.state_of(root)
    }

    /// Finalize the run: publish the wiring (all-or-nothing unless partial
    /// resolution was requested) and snapshot the report
    pub fn finish(mut self) -> Resolution {
        let fully_resolved = self
            .roots
            .iter()
            .all(|root| self.state_of(root) == ResolutionState::Resolved);
        let wiring = if fully_resolved || self.options.allow_partial {
            Some(Wiring::from_tentative(&self.wiring))
        } else {
            None
        };
        debug!(
            roots = self.roots.len(),
            fully_resolved, "resolution run finished"
        );
        let report = self.report.build();
        Resolution {
            roots: self.roots,
            states: self.states,
            wiring,
            report,
        }
    }

    fn state_of(&self, resource: &ResourceId) -> ResolutionState {
        self.states
            .get(resource)
            .copied()
            .unwrap_or(ResolutionState::Pending)
    }

    fn set_state(&mut self, resource: &ResourceId, state: ResolutionState, journaled: bool) {
        let previous = self.states.insert(resource.clone(), state);
        if journaled {
            self.trail.push(TrailOp::StateSet(resource.clone(), previous));
        }
    }

    fn push_frame(&mut self, frames: &mut Vec<Frame>, resource: ResourceId) {
        trace!(resource = %resource, "resolving");
        let entry_checkpoint = self.trail.len();
        self.set_state(&resource, ResolutionState::InProgress, true);
        frames.push(Frame {
            resource,
            entry_checkpoint,
            req_cursor: 0,
            candidates: None,
            cand_cursor: 0,
            had_candidates: false,
            awaiting: None,
        });
    }

    /// Depth-first search from one root over the explicit frame stack
    fn dfs(&mut self, root: ResourceId) {
        let mut frames: Vec<Frame> = Vec::new();
        let mut last_child_ok: Option<bool> = None;
        self.push_frame(&mut frames, root);

        while !frames.is_empty() {
            let fi = frames.len() - 1;
            let resource_id = frames[fi].resource.clone();
            let Some(resource) = self.index.resource(&resource_id) else {
                // frames are only pushed for indexed resources
                frames.pop();
                last_child_ok = Some(false);
                continue;
            };

            // a completed child frame reports back to the candidate that
            // spawned it
            if let Some(ok) = last_child_ok.take() {
                let Some(cap) = frames[fi].awaiting.take() else {
                    continue;
                };
                if ok {
                    let req_id = resource.req_id(frames[fi].req_cursor);
                    let checkpoint = self.trail.len();
                    if self.try_bind(&req_id, &cap, checkpoint, false) {
                        advance_requirement(&mut frames[fi]);
                    } else {
                        frames[fi].cand_cursor += 1;
                    }
                } else {
                    trace!(
                        resource = %resource_id,
                        provider = %cap.resource,
                        "provider failed, trying next candidate"
                    );
                    frames[fi].cand_cursor += 1;
                }
                continue;
            }

            // all requirements handled: close the resource
            if frames[fi].req_cursor >= resource.requirements().len() {
                let entry_checkpoint = frames[fi].entry_checkpoint;
                frames.pop();
                let ok = self.close_resource(&resource_id, entry_checkpoint);
                last_child_ok = Some(ok);
                continue;
            }

            let req_cursor = frames[fi].req_cursor;
            let Some(requirement) = resource.requirement(req_cursor) else {
                advance_requirement(&mut frames[fi]);
                continue;
            };
            let req_id = resource.req_id(req_cursor);

            // survey candidates on first touch of the requirement
            if frames[fi].candidates.is_none() {
                let survey = self.index.survey(requirement);
                self.record_survey(&resource_id, &req_id, requirement, &survey);
                frames[fi].had_candidates = !survey.matched.is_empty();
                frames[fi].candidates = Some(survey.matched);
                frames[fi].cand_cursor = 0;
            }

            let next = frames[fi]
                .candidates
                .as_ref()
                .and_then(|candidates| candidates.get(frames[fi].cand_cursor))
                .cloned();

            match next {
                Some(cap) => {
                    let provider = cap.resource.clone();
                    let provider_state = if provider == resource_id {
                        ResolutionState::Resolved
                    } else {
                        self.state_of(&provider)
                    };
                    match provider_state {
                        ResolutionState::Resolved => {
                            let checkpoint = self.trail.len();
                            if self.try_bind(&req_id, &cap, checkpoint, false) {
                                advance_requirement(&mut frames[fi]);
                            } else {
                                frames[fi].cand_cursor += 1;
                            }
                        }
                        ResolutionState::Unresolved => {
                            frames[fi].cand_cursor += 1;
                        }
                        ResolutionState::InProgress => {
                            // provider is on the current search path: bind
                            // speculatively, validated when the cycle closes
                            let checkpoint = self.trail.len();
                            if self.try_bind(&req_id, &cap, checkpoint, true) {
                                advance_requirement(&mut frames[fi]);
                            } else {
                                frames[fi].cand_cursor += 1;
                            }
                        }
                        ResolutionState::Pending => {
                            frames[fi].awaiting = Some(cap.clone());
                            self.push_frame(&mut frames, provider);
                        }
                    }
                }
                None => {
                    // candidates exhausted for this requirement
                    if requirement.is_mandatory() {
                        let entry = if frames[fi].had_candidates {
                            ReportEntry::UnresolvedRequirement {
                                requirement: req_id,
                                namespace: requirement.namespace().to_string(),
                                optional: false,
                            }
                        } else {
                            ReportEntry::MissingCapability {
                                requirement: req_id,
                                namespace: requirement.namespace().to_string(),
                                filter: requirement.filter().map(|f| f.to_string()),
                            }
                        };
                        self.report.add_entry(&resource_id, entry);
                        debug!(
                            resource = %resource_id,
                            namespace = requirement.namespace(),
                            "mandatory requirement unsatisfiable"
                        );
                        let entry_checkpoint = frames[fi].entry_checkpoint;
                        frames.pop();
                        self.fail_resource(&resource_id, entry_checkpoint, false);
                        last_child_ok = Some(false);
                    } else {
                        trace!(
                            resource = %resource_id,
                            namespace = requirement.namespace(),
                            "optional requirement unsatisfied"
                        );
                        self.report.add_entry(
                            &resource_id,
                            ReportEntry::UnresolvedRequirement {
                                requirement: req_id,
                                namespace: requirement.namespace().to_string(),
                                optional: true,
                            },
                        );
                        advance_requirement(&mut frames[fi]);
                    }
                }
            }
        }
    }

    /// Tentatively bind a requirement and validate the wiring; on violation
    /// the entry is recorded and the trail unwound to `checkpoint`
    fn try_bind(&mut self, req_id: &ReqId, cap: &CapId, checkpoint: usize, speculative: bool) -> bool {
        if speculative {
            self.speculations.push(Speculation {
                consumer: req_id.clone(),
                provider: cap.resource.clone(),
            });
            self.trail.push(TrailOp::SpecPushed);
        }
        self.wiring.bindings.insert(req_id.clone(), cap.clone());
        self.trail.push(TrailOp::Bound);

        let event = CheckEvent::Binding {
            requirement: req_id.clone(),
            capability: cap.clone(),
        };
        let violations = self.checker.check(&self.wiring, &event);
        match violations.first() {
            None => {
                trace!(requirement = %req_id, capability = %cap, speculative, "bound");
                true
            }
            Some(violation) => {
                debug!(requirement = %req_id, capability = %cap, ?violation, "binding rejected");
                self.record_violation(violation);
                self.unwind(checkpoint);
                false
            }
        }
    }

    /// Move a resource whose requirements are all handled into the resolved
    /// set, re-validating its bindings (this is where speculative cycle
    /// bindings are finally vetted)
    fn close_resource(&mut self, resource_id: &ResourceId, entry_checkpoint: usize) -> bool {
        self.wiring.resolved.insert(resource_id.clone());
        self.trail.push(TrailOp::ResolvedAdded);

        let event = CheckEvent::Resolved {
            resource: resource_id.clone(),
        };
        let violations = self.checker.check(&self.wiring, &event);
        match violations.first() {
            None => {
                self.set_state(resource_id, ResolutionState::Resolved, true);
                debug!(resource = %resource_id, "resolved");
                true
            }
            Some(violation) => {
                debug!(resource = %resource_id, ?violation, "violation while closing");
                self.record_violation(violation);
                self.fail_resource(resource_id, entry_checkpoint, true);
                false
            }
        }
    }

    /// Abandon the resource's current attempt: report broken speculative
    /// cycles, unwind the subtree, and settle the final state
    ///
    /// A resource that failed close-time validation while others speculated
    /// on it reverts to `Pending` with its cycle partners (the enclosing
    /// context may retry it); a resource that exhausted candidates stays
    /// `Unresolved` for the rest of the run.
    fn fail_resource(&mut self, resource_id: &ResourceId, entry_checkpoint: usize, closing: bool) {
        let consumers: IndexSet<ResourceId> = self
            .speculations
            .iter()
            .filter(|speculation| &speculation.provider == resource_id)
            .map(|speculation| speculation.consumer.resource.clone())
            .collect();
        for consumer in &consumers {
            self.report.add_entry(
                consumer,
                ReportEntry::CycleDetected {
                    with: resource_id.clone(),
                },
            );
            self.report.add_entry(
                resource_id,
                ReportEntry::CycleDetected {
                    with: consumer.clone(),
                },
            );
        }

        self.unwind(entry_checkpoint);

        if closing && !consumers.is_empty() {
            trace!(resource = %resource_id, "speculative cycle failed, participants revert to pending");
        } else {
            self.set_state(resource_id, ResolutionState::Unresolved, false);
            debug!(resource = %resource_id, "unresolved");
        }
    }

    /// Record candidate-survey diagnostics, once per requirement per run
    fn record_survey(
        &mut self,
        resource_id: &ResourceId,
        req_id: &ReqId,
        requirement: &Requirement,
        survey: &CandidateSurvey,
    ) {
        if !self.surveyed.insert(req_id.clone()) {
            return;
        }
        for capability in &survey.filtered {
            self.report.add_entry(
                resource_id,
                ReportEntry::FilteredCandidate {
                    requirement: req_id.clone(),
                    namespace: requirement.namespace().to_string(),
                    capability: capability.clone(),
                },
            );
        }
        if let Some(error) = &survey.malformed {
            self.report.add_entry(
                resource_id,
                ReportEntry::MalformedFilter {
                    requirement: req_id.clone(),
                    error: error.clone(),
                },
            );
        }
    }

    fn record_violation(&mut self, violation: &Violation) {
        let entry = match violation {
            Violation::Singleton {
                group, conflicting, ..
            } => ReportEntry::SingletonConflict {
                group: group.clone(),
                conflicting: conflicting.clone(),
            },
            Violation::Uses {
                namespace,
                chosen,
                conflicting,
                ..
            } => ReportEntry::UsesConstraintViolation {
                namespace: namespace.clone(),
                chosen: chosen.clone(),
                conflicting: conflicting.clone(),
            },
        };
        self.report.add_entry(violation.resource(), entry);
    }

    /// Roll the shared run state back to a trail checkpoint
    fn unwind(&mut self, checkpoint: usize) {
        while self.trail.len() > checkpoint {
            match self.trail.pop() {
                Some(TrailOp::Bound) => {
                    self.wiring.bindings.pop();
                }
                Some(TrailOp::ResolvedAdded) => {
                    self.wiring.resolved.pop();
                }
                Some(TrailOp::StateSet(resource, previous)) => match previous {
                    Some(state) => {
                        self.states.insert(resource, state);
                    }
                    None => {
                        self.states.shift_remove(&resource);
                    }
                },
                Some(TrailOp::SpecPushed) => {
                    self.speculations.pop();
                }
                None => break,
            }
        }
    }
}

/// Resolve every resource in the index as a root
pub fn resolve_set(index: &CandidateIndex<'_>, options: ResolveOptions) -> Resolution {
    let mut resolver = Resolver::new(index, options);
    let roots: Vec<ResourceId> = index.resources().map(|r| r.id().clone()).collect();
    resolver.resolve_all(roots);
    resolver.finish()
}
