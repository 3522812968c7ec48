use modwire::{
    resolve_set, CandidateIndex, Capability, EntryKind, Filter, ReportEntry, Requirement,
    ResolutionState, ResolveOptions, Resource, ResourceId, Resolver,
};
use pretty_assertions::assert_eq;

fn id(name: &str) -> ResourceId {
    ResourceId::new(name)
}

fn resolve(resources: &[Resource]) -> modwire::Resolution {
    let index = CandidateIndex::new(resources);
    resolve_set(&index, ResolveOptions::default())
}

#[test]
fn test_no_requirements_resolves_with_empty_wiring_and_report() {
    let resources = vec![
        Resource::new("x").with_capability(Capability::new("svc")),
        Resource::new("y"),
    ];
    let resolution = resolve(&resources);

    assert!(resolution.is_fully_resolved());
    assert_eq!(resolution.state(&id("x")), ResolutionState::Resolved);
    assert_eq!(resolution.state(&id("y")), ResolutionState::Resolved);
    let wiring = resolution.wiring().expect("wiring must be published");
    assert!(wiring.is_empty());
    assert!(resolution.report().is_empty());
}

#[test]
fn test_scenario_a_single_provider_binds_cleanly() {
    // X requires "svc"; Y provides it with no attributes
    let resources = vec![
        Resource::new("x").with_requirement(Requirement::mandatory("svc")),
        Resource::new("y").with_capability(Capability::new("svc")),
    ];
    let resolution = resolve(&resources);

    assert!(resolution.is_fully_resolved());
    let wiring = resolution.wiring().expect("wiring must be published");
    let x = resources[0].req_id(0);
    assert_eq!(wiring.capability_for(&x), Some(&resources[1].cap_id(0)));
    assert!(resolution.report().is_empty());
}

#[test]
fn test_scenario_b_missing_capability_reported_exactly_once() {
    let resources = vec![Resource::new("x").with_requirement(Requirement::mandatory("svc"))];
    let resolution = resolve(&resources);

    assert_eq!(resolution.state(&id("x")), ResolutionState::Unresolved);
    assert!(resolution.wiring().is_none());

    let entries = resolution.report().entries_for(&id("x"));
    assert_eq!(entries.len(), 1);
    match &entries[0] {
        ReportEntry::MissingCapability {
            requirement,
            namespace,
            ..
        } => {
            assert_eq!(requirement, &resources[0].req_id(0));
            assert_eq!(namespace, "svc");
        }
        other => panic!("expected MissingCapability, got {:?}", other),
    }
}

#[test]
fn test_scenario_c_singleton_conflict_resolves_exactly_one() {
    let resources = vec![
        Resource::new("a").singleton("s"),
        Resource::new("b").singleton("s"),
    ];
    let index = CandidateIndex::new(&resources);
    let resolution = resolve_set(&index, ResolveOptions { allow_partial: true });

    let states = [resolution.state(&id("a")), resolution.state(&id("b"))];
    assert_eq!(
        states
            .iter()
            .filter(|s| **s == ResolutionState::Resolved)
            .count(),
        1
    );

    // identity order makes "a" the winner; "b" carries the conflict entry
    assert_eq!(resolution.state(&id("a")), ResolutionState::Resolved);
    let entries = resolution.report().entries_for(&id("b"));
    assert_eq!(entries.len(), 1);
    match &entries[0] {
        ReportEntry::SingletonConflict { group, conflicting } => {
            assert_eq!(group, "s");
            assert_eq!(conflicting, &id("a"));
        }
        other => panic!("expected SingletonConflict, got {:?}", other),
    }

    // partial wiring contains only the winner
    let wiring = resolution.wiring().expect("partial wiring requested");
    assert!(wiring.is_resolved(&id("a")));
    assert!(!wiring.is_resolved(&id("b")));
}

#[test]
fn test_scenario_d_clean_cycle_closes_without_entries() {
    // A requires what B provides and vice versa
    let resources = vec![
        Resource::new("a")
            .with_capability(Capability::new("a.api"))
            .with_requirement(Requirement::mandatory("b.api")),
        Resource::new("b")
            .with_capability(Capability::new("b.api"))
            .with_requirement(Requirement::mandatory("a.api")),
    ];
    let resolution = resolve(&resources);

    assert!(resolution.is_fully_resolved());
    assert!(resolution.report().is_empty());
    let wiring = resolution.wiring().expect("wiring must be published");
    assert_eq!(
        wiring.capability_for(&resources[0].req_id(0)),
        Some(&resources[1].cap_id(0))
    );
    assert_eq!(
        wiring.capability_for(&resources[1].req_id(0)),
        Some(&resources[0].cap_id(0))
    );
}

#[test]
fn test_unresolution_cascades_to_mandatory_dependents() {
    // c -> m -> leaf, and nothing provides leaf
    let resources = vec![
        Resource::new("c").with_requirement(Requirement::mandatory("mid")),
        Resource::new("m")
            .with_capability(Capability::new("mid"))
            .with_requirement(Requirement::mandatory("leaf")),
    ];
    let resolution = resolve(&resources);

    assert_eq!(resolution.state(&id("m")), ResolutionState::Unresolved);
    assert_eq!(resolution.state(&id("c")), ResolutionState::Unresolved);

    let m_entries = resolution.report().entries_for(&id("m"));
    assert_eq!(m_entries.len(), 1);
    assert_eq!(m_entries[0].kind(), EntryKind::MissingCapability);

    // the dependent had a candidate, but it could never resolve
    let c_entries = resolution.report().entries_for(&id("c"));
    assert_eq!(c_entries.len(), 1);
    assert_eq!(c_entries[0].kind(), EntryKind::UnresolvedRequirement);
}

#[test]
fn test_optional_requirement_exhaustion_is_not_fatal() {
    let resources = vec![Resource::new("x")
        .with_capability(Capability::new("x.api"))
        .with_requirement(Requirement::optional("nowhere"))];
    let resolution = resolve(&resources);

    assert_eq!(resolution.state(&id("x")), ResolutionState::Resolved);
    let entries = resolution.report().entries_for(&id("x"));
    assert_eq!(entries.len(), 1);
    match &entries[0] {
        ReportEntry::UnresolvedRequirement { optional, .. } => assert!(*optional),
        other => panic!("expected UnresolvedRequirement, got {:?}", other),
    }

    // the unsatisfied optional requirement is absent from the wiring
    let wiring = resolution.wiring().expect("wiring must be published");
    assert!(wiring.capability_for(&resources[0].req_id(0)).is_none());
    assert!(wiring.is_resolved(&id("x")));
}

#[test]
fn test_filtered_candidates_leave_a_trail_even_on_success() {
    let resources = vec![
        Resource::new("x").with_requirement(
            Requirement::mandatory("svc").with_filter(Filter::parse("(tier=fast)").unwrap()),
        ),
        Resource::new("y").with_capability(Capability::new("svc").attr("tier", "slow")),
        Resource::new("z").with_capability(Capability::new("svc").attr("tier", "fast")),
    ];
    let resolution = resolve(&resources);

    assert!(resolution.is_fully_resolved());
    let wiring = resolution.wiring().expect("wiring must be published");
    assert_eq!(
        wiring.capability_for(&resources[0].req_id(0)),
        Some(&resources[2].cap_id(0))
    );

    let entries = resolution.report().entries_for(&id("x"));
    assert_eq!(entries.len(), 1);
    match &entries[0] {
        ReportEntry::FilteredCandidate { capability, .. } => {
            assert_eq!(capability, &resources[1].cap_id(0));
        }
        other => panic!("expected FilteredCandidate, got {:?}", other),
    }
}

#[test]
fn test_malformed_filter_falls_through_to_missing_capability() {
    // ordering a string attribute against a version cannot be evaluated
    let resources = vec![
        Resource::new("x").with_requirement(
            Requirement::mandatory("svc").with_filter(Filter::parse("(tier>=1.0.0)").unwrap()),
        ),
        Resource::new("y").with_capability(Capability::new("svc").attr("tier", "slow")),
    ];
    let resolution = resolve(&resources);

    assert_eq!(resolution.state(&id("x")), ResolutionState::Unresolved);
    let entries = resolution.report().entries_for(&id("x"));
    let kinds: Vec<EntryKind> = entries.iter().map(ReportEntry::kind).collect();
    assert_eq!(
        kinds,
        vec![EntryKind::MalformedFilter, EntryKind::MissingCapability]
    );
}

#[test]
fn test_broken_cycle_reports_both_participants() {
    // a speculates nothing; b speculates on a, then a fails on a missing
    // second requirement, breaking the cycle
    let resources = vec![
        Resource::new("a")
            .with_capability(Capability::new("a.api"))
            .with_requirement(Requirement::mandatory("b.api"))
            .with_requirement(Requirement::mandatory("ghost")),
        Resource::new("b")
            .with_capability(Capability::new("b.api"))
            .with_requirement(Requirement::mandatory("a.api")),
    ];
    let resolution = resolve(&resources);

    assert_eq!(resolution.state(&id("a")), ResolutionState::Unresolved);
    assert_eq!(resolution.state(&id("b")), ResolutionState::Unresolved);

    let a_kinds: Vec<EntryKind> = resolution
        .report()
        .entries_for(&id("a"))
        .iter()
        .map(ReportEntry::kind)
        .collect();
    assert_eq!(
        a_kinds,
        vec![EntryKind::MissingCapability, EntryKind::CycleDetected]
    );

    let b_kinds: Vec<EntryKind> = resolution
        .report()
        .entries_for(&id("b"))
        .iter()
        .map(ReportEntry::kind)
        .collect();
    assert_eq!(
        b_kinds,
        vec![EntryKind::CycleDetected, EntryKind::UnresolvedRequirement]
    );
}

#[test]
fn test_resolving_a_root_twice_is_idempotent() {
    let resources = vec![Resource::new("x").with_requirement(Requirement::mandatory("svc"))];
    let index = CandidateIndex::new(&resources);
    let mut resolver = Resolver::new(&index, ResolveOptions::default());

    assert_eq!(resolver.resolve_root(&id("x")), ResolutionState::Unresolved);
    assert_eq!(resolver.resolve_root(&id("x")), ResolutionState::Unresolved);

    let resolution = resolver.finish();
    // the retry did not duplicate diagnostics
    assert_eq!(resolution.report().entries_for(&id("x")).len(), 1);
}

#[test]
fn test_unknown_root_is_unresolved() {
    let resources = vec![Resource::new("x")];
    let index = CandidateIndex::new(&resources);
    let mut resolver = Resolver::new(&index, ResolveOptions::default());
    assert_eq!(
        resolver.resolve_root(&id("ghost")),
        ResolutionState::Unresolved
    );
    let resolution = resolver.finish();
    assert!(!resolution.is_fully_resolved());
}
