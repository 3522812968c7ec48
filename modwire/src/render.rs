//! Human-readable rendering of resolution reports
//!
//! Report entries carry enough context to explain every failure without
//! re-running the resolver; this module turns them into one line each.

use crate::report::{ReportEntry, ResolutionReport};
use crate::resource::ResourceId;
use std::fmt;

/// One explanation line per entry recorded for a resource
pub fn explain(report: &ResolutionReport, resource: &ResourceId) -> String {
    let entries = report.entries_for(resource);
    if entries.is_empty() {
        return format!("{}: no diagnostics recorded", resource);
    }
    let mut out = String::new();
    for entry in entries {
        out.push_str(&format!("{}: {}\n", resource, entry_line(entry)));
    }
    out
}

fn entry_line(entry: &ReportEntry) -> String {
    match entry {
        ReportEntry::MissingCapability {
            namespace, filter, ..
        } => match filter {
            Some(filter) => format!(
                "no provider for mandatory requirement on '{}' matching {}",
                namespace, filter
            ),
            None => format!("no provider for mandatory requirement on '{}'", namespace),
        },
        ReportEntry::FilteredCandidate {
            namespace,
            capability,
            ..
        } => format!(
            "candidate {} for '{}' was rejected by the requirement filter",
            capability, namespace
        ),
        ReportEntry::SingletonConflict { group, conflicting } => format!(
            "singleton group '{}' is already taken by resolved resource {}",
            group, conflicting
        ),
        ReportEntry::UsesConstraintViolation {
            namespace,
            chosen,
            conflicting,
        } => format!(
            "choosing {} would expose '{}' from two providers (conflicts with {})",
            chosen, namespace, conflicting
        ),
        ReportEntry::CycleDetected { with } => {
            format!("dependency cycle with {} could not be closed", with)
        }
        ReportEntry::UnresolvedRequirement {
            namespace, optional, ..
        } => {
            if *optional {
                format!("optional requirement on '{}' stayed unsatisfied", namespace)
            } else {
                format!(
                    "every candidate for mandatory requirement on '{}' was rejected",
                    namespace
                )
            }
        }
        ReportEntry::MalformedFilter { error, .. } => {
            format!("requirement filter could not be evaluated: {}", error)
        }
    }
}

impl fmt::Display for ResolutionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (resource, entries) in self.iter() {
            writeln!(f, "{}:", resource)?;
            for entry in entries {
                writeln!(f, "  - {}", entry_line(entry))?;
            }
        }
        Ok(())
    }
}
