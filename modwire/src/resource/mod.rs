//! Resource model: resources, the capabilities they offer and the
//! requirements they declare
//!
//! Instances are immutable once constructed and owned by the caller; the
//! resolution core only borrows them for the duration of one run. Back
//! references from capabilities and requirements to their declaring resource
//! are expressed as (resource id, declaration ordinal) handles so that model
//! data stays plain and freely shareable across concurrent runs.

pub mod attrs;
pub mod filter;

pub use attrs::{AttrValue, Version, VersionError};
pub use filter::{Filter, FilterError};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Namespace of the identity capability carrying singleton declarations
pub const IDENTITY_NAMESPACE: &str = "module.identity";
/// Identity attribute naming the singleton group
pub const IDENTITY_ATTR_NAME: &str = "name";
/// Identity attribute flagging singleton membership
pub const IDENTITY_ATTR_SINGLETON: &str = "singleton";

/// Opaque, stable, ordered resource identity
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(String);

impl ResourceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ResourceId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ResourceId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Handle to a capability: declaring resource plus declaration ordinal
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct CapId {
    pub resource: ResourceId,
    pub ord: usize,
}

impl fmt::Display for CapId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#cap{}", self.resource, self.ord)
    }
}

/// Handle to a requirement: declaring resource plus declaration ordinal
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ReqId {
    pub resource: ResourceId,
    pub ord: usize,
}

impl fmt::Display for ReqId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#req{}", self.resource, self.ord)
    }
}

/// A named, attributed fact a resource offers to others
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Capability {
    namespace: String,
    attrs: IndexMap<String, AttrValue>,
    uses: Vec<String>,
}

impl Capability {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            attrs: IndexMap::new(),
            uses: Vec::new(),
        }
    }

    /// Attach an attribute (builder style)
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    /// Declare a namespace this capability transitively re-exposes
    pub fn uses(mut self, namespace: impl Into<String>) -> Self {
        self.uses.push(namespace.into());
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn attrs(&self) -> &IndexMap<String, AttrValue> {
        &self.attrs
    }

    pub fn uses_namespaces(&self) -> &[String] {
        &self.uses
    }
}

/// Whether an unsatisfied requirement fails its declaring resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequirementMode {
    Mandatory,
    Optional,
}

/// A named, filtered need a resource declares against others' capabilities
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Requirement {
    namespace: String,
    filter: Option<Filter>,
    mode: RequirementMode,
}

impl Requirement {
    pub fn mandatory(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            filter: None,
            mode: RequirementMode::Mandatory,
        }
    }

    pub fn optional(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            filter: None,
            mode: RequirementMode::Optional,
        }
    }

    /// Attach a match filter (builder style); no filter matches everything
    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn filter(&self) -> Option<&Filter> {
        self.filter.as_ref()
    }

    pub fn mode(&self) -> RequirementMode {
        self.mode
    }

    pub fn is_mandatory(&self) -> bool {
        self.mode == RequirementMode::Mandatory
    }

    /// A requirement matches a capability iff namespaces are equal and the
    /// filter (if any) evaluates true against the capability's attributes
    pub fn matches(&self, capability: &Capability) -> Result<bool, FilterError> {
        if self.namespace != capability.namespace() {
            return Ok(false);
        }
        match &self.filter {
            None => Ok(true),
            Some(filter) => filter.eval(capability.attrs()),
        }
    }
}

/// One resolvable modular unit with capabilities and requirements
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resource {
    id: ResourceId,
    capabilities: Vec<Capability>,
    requirements: Vec<Requirement>,
}

impl Resource {
    pub fn new(id: impl Into<ResourceId>) -> Self {
        Self {
            id: id.into(),
            capabilities: Vec::new(),
            requirements: Vec::new(),
        }
    }

    /// Append a capability (builder style; declaration order is significant)
    pub fn with_capability(mut self, capability: Capability) -> Self {
        self.capabilities.push(capability);
        self
    }

    /// Append a requirement (builder style; declaration order is significant)
    pub fn with_requirement(mut self, requirement: Requirement) -> Self {
        self.requirements.push(requirement);
        self
    }

    /// Declare membership in a singleton identity group by attaching the
    /// corresponding identity capability
    pub fn singleton(self, group: impl Into<String>) -> Self {
        self.with_capability(
            Capability::new(IDENTITY_NAMESPACE)
                .attr(IDENTITY_ATTR_NAME, group.into())
                .attr(IDENTITY_ATTR_SINGLETON, true),
        )
    }

    pub fn id(&self) -> &ResourceId {
        &self.id
    }

    pub fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }

    pub fn requirements(&self) -> &[Requirement] {
        &self.requirements
    }

    pub fn capability(&self, ord: usize) -> Option<&Capability> {
        self.capabilities.get(ord)
    }

    pub fn requirement(&self, ord: usize) -> Option<&Requirement> {
        self.requirements.get(ord)
    }

    pub fn cap_id(&self, ord: usize) -> CapId {
        CapId {
            resource: self.id.clone(),
            ord,
        }
    }

    pub fn req_id(&self, ord: usize) -> ReqId {
        ReqId {
            resource: self.id.clone(),
            ord,
        }
    }

    /// The singleton group this resource belongs to, if it declares one
    pub fn singleton_group(&self) -> Option<&str> {
        self.capabilities
            .iter()
            .filter(|cap| cap.namespace() == IDENTITY_NAMESPACE)
            .find(|cap| {
                matches!(
                    cap.attrs().get(IDENTITY_ATTR_SINGLETON),
                    Some(AttrValue::Bool(true))
                )
            })
            .and_then(|cap| match cap.attrs().get(IDENTITY_ATTR_NAME) {
                Some(AttrValue::Str(name)) => Some(name.as_str()),
                _ => None,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requirement_matching() {
        let cap = Capability::new("svc.db").attr("engine", "postgres");
        let req = Requirement::mandatory("svc.db");
        assert!(req.matches(&cap).unwrap());

        let req = Requirement::mandatory("svc.cache");
        assert!(!req.matches(&cap).unwrap());

        let req = Requirement::mandatory("svc.db")
            .with_filter(Filter::parse("(engine=postgres)").unwrap());
        assert!(req.matches(&cap).unwrap());

        let req =
            Requirement::mandatory("svc.db").with_filter(Filter::parse("(engine=mysql)").unwrap());
        assert!(!req.matches(&cap).unwrap());
    }

    #[test]
    fn test_singleton_group_declaration() {
        let plain = Resource::new("plain");
        assert_eq!(plain.singleton_group(), None);

        let member = Resource::new("member").singleton("net.stack");
        assert_eq!(member.singleton_group(), Some("net.stack"));

        // a non-singleton identity capability does not create a group
        let named = Resource::new("named").with_capability(
            Capability::new(IDENTITY_NAMESPACE).attr(IDENTITY_ATTR_NAME, "net.stack"),
        );
        assert_eq!(named.singleton_group(), None);
    }

    #[test]
    fn test_handles_track_declaration_order() {
        let resource = Resource::new("r")
            .with_capability(Capability::new("a"))
            .with_capability(Capability::new("b"))
            .with_requirement(Requirement::mandatory("c"));
        assert_eq!(resource.cap_id(1).ord, 1);
        assert_eq!(resource.req_id(0).resource, ResourceId::new("r"));
        assert_eq!(resource.capability(1).unwrap().namespace(), "b");
    }
}
