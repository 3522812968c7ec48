use modwire::{
    resolve_set, CandidateIndex, Capability, EntryKind, Filter, ReportEntry, Requirement,
    ResolutionState, ResolveOptions, Resource, ResourceId,
};
use pretty_assertions::assert_eq;

fn id(name: &str) -> ResourceId {
    ResourceId::new(name)
}

/// api re-exposes "log" and is pinned to log-v1, while app's own filter
/// demands log-v2: app must not see both lineages at once.
fn split_lineage_set() -> Vec<Resource> {
    vec![
        Resource::new("api")
            .with_capability(Capability::new("api").uses("log"))
            .with_requirement(
                Requirement::mandatory("log").with_filter(Filter::parse("(impl=v1)").unwrap()),
            ),
        Resource::new("app")
            .with_requirement(Requirement::mandatory("api"))
            .with_requirement(
                Requirement::mandatory("log").with_filter(Filter::parse("(impl=v2)").unwrap()),
            ),
        Resource::new("log-v1").with_capability(Capability::new("log").attr("impl", "v1")),
        Resource::new("log-v2").with_capability(Capability::new("log").attr("impl", "v2")),
    ]
}

#[test]
fn test_uses_violation_rejects_binding_and_unresolves_consumer() {
    let resources = split_lineage_set();
    let index = CandidateIndex::new(&resources);
    let resolution = resolve_set(&index, ResolveOptions { allow_partial: true });

    assert_eq!(resolution.state(&id("api")), ResolutionState::Resolved);
    assert_eq!(resolution.state(&id("app")), ResolutionState::Unresolved);

    let kinds: Vec<EntryKind> = resolution
        .report()
        .entries_for(&id("app"))
        .iter()
        .map(ReportEntry::kind)
        .collect();
    assert_eq!(
        kinds,
        vec![
            EntryKind::FilteredCandidate,
            EntryKind::UsesConstraintViolation,
            EntryKind::UnresolvedRequirement,
        ]
    );

    // the violation names the namespace and both capabilities involved
    let entries = resolution.report().entries_for(&id("app"));
    match &entries[1] {
        ReportEntry::UsesConstraintViolation {
            namespace,
            chosen,
            conflicting,
        } => {
            assert_eq!(namespace, "log");
            assert_eq!(chosen.resource, id("api"));
            assert_eq!(conflicting.resource, id("log-v2"));
        }
        other => panic!("expected UsesConstraintViolation, got {:?}", other),
    }
}

#[test]
fn test_shared_lineage_is_consistent() {
    // same shape, but app accepts whatever lineage api uses
    let resources = vec![
        Resource::new("api")
            .with_capability(Capability::new("api").uses("log"))
            .with_requirement(Requirement::mandatory("log")),
        Resource::new("app")
            .with_requirement(Requirement::mandatory("api"))
            .with_requirement(Requirement::mandatory("log")),
        Resource::new("log-v1").with_capability(Capability::new("log").attr("impl", "v1")),
        Resource::new("log-v2").with_capability(Capability::new("log").attr("impl", "v2")),
    ];
    let index = CandidateIndex::new(&resources);
    let resolution = resolve_set(&index, ResolveOptions::default());

    assert!(resolution.is_fully_resolved());
    let wiring = resolution.wiring().expect("wiring must be published");

    // both api and app end up on log-v1, the first candidate in index order
    assert_eq!(
        wiring.capability_for(&resources[0].req_id(0)),
        Some(&resources[2].cap_id(0))
    );
    assert_eq!(
        wiring.capability_for(&resources[1].req_id(1)),
        Some(&resources[2].cap_id(0))
    );
}

#[test]
fn test_transitive_uses_chain_is_followed() {
    // gateway uses "api", api's capability uses "log": the closure reaches
    // "log" through the chain, so a split on log is still a violation
    let resources = vec![
        Resource::new("api")
            .with_capability(Capability::new("api").uses("log"))
            .with_requirement(
                Requirement::mandatory("log").with_filter(Filter::parse("(impl=v1)").unwrap()),
            ),
        Resource::new("app")
            .with_requirement(Requirement::mandatory("gw"))
            .with_requirement(
                Requirement::mandatory("log").with_filter(Filter::parse("(impl=v2)").unwrap()),
            ),
        Resource::new("gateway")
            .with_capability(Capability::new("gw").uses("api"))
            .with_requirement(Requirement::mandatory("api")),
        Resource::new("log-v1").with_capability(Capability::new("log").attr("impl", "v1")),
        Resource::new("log-v2").with_capability(Capability::new("log").attr("impl", "v2")),
    ];
    let index = CandidateIndex::new(&resources);
    let resolution = resolve_set(&index, ResolveOptions { allow_partial: true });

    assert_eq!(resolution.state(&id("gateway")), ResolutionState::Resolved);
    assert_eq!(resolution.state(&id("app")), ResolutionState::Unresolved);
    let kinds: Vec<EntryKind> = resolution
        .report()
        .entries_for(&id("app"))
        .iter()
        .map(ReportEntry::kind)
        .collect();
    assert!(kinds.contains(&EntryKind::UsesConstraintViolation));
}
