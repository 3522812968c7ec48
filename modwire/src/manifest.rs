//! Declarative resource-set manifests
//!
//! The input boundary of the core: a JSON document describing resources with
//! their capabilities and requirements, converted into model instances
//! before a run starts. Parsing stops here: the resolver itself never sees
//! raw metadata.
//!
//! ```json
//! {
//!   "resources": [
//!     {
//!       "id": "app",
//!       "requirements": [{ "namespace": "svc.db", "filter": "(engine=postgres)" }]
//!     },
//!     {
//!       "id": "postgres",
//!       "capabilities": [{ "namespace": "svc.db", "attributes": { "engine": "postgres", "version": "15.4.0" } }]
//!     }
//!   ]
//! }
//! ```

use crate::resource::{
    AttrValue, Capability, Filter, FilterError, Requirement, Resource, Version, VersionError,
};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for manifest loading failures
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("manifest is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("resource '{resource}' has an invalid filter: {source}")]
    BadFilter {
        resource: String,
        #[source]
        source: FilterError,
    },

    #[error("resource '{resource}' attribute '{attribute}' is not a valid version: {source}")]
    BadVersion {
        resource: String,
        attribute: String,
        #[source]
        source: VersionError,
    },

    #[error("resource '{resource}' attribute '{attribute}' has an unsupported value")]
    BadAttribute { resource: String, attribute: String },
}

/// A declarative resource set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceSetManifest {
    pub resources: Vec<ResourceManifest>,
}

/// One declared resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceManifest {
    pub id: String,
    #[serde(default)]
    pub capabilities: Vec<CapabilityManifest>,
    #[serde(default)]
    pub requirements: Vec<RequirementManifest>,
}

/// One declared capability
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityManifest {
    pub namespace: String,
    #[serde(default)]
    pub attributes: IndexMap<String, serde_json::Value>,
    #[serde(default)]
    pub uses: Vec<String>,
}

/// One declared requirement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequirementManifest {
    pub namespace: String,
    #[serde(default)]
    pub filter: Option<String>,
    #[serde(default)]
    pub optional: bool,
}

impl ResourceSetManifest {
    /// Parse a manifest from JSON text
    pub fn from_json(text: &str) -> Result<Self, ManifestError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Convert the declarations into model resources
    ///
    /// String attributes named `version` are typed as semantic versions;
    /// everything else keeps its JSON type.
    pub fn into_resources(self) -> Result<Vec<Resource>, ManifestError> {
        let mut resources = Vec::with_capacity(self.resources.len());
        for declared in self.resources {
            let mut resource = Resource::new(declared.id.as_str());
            for capability in declared.capabilities {
                let mut built = Capability::new(capability.namespace);
                for (name, value) in capability.attributes {
                    let typed = attr_value(&declared.id, &name, value)?;
                    built = built.attr(name, typed);
                }
                for used in capability.uses {
                    built = built.uses(used);
                }
                resource = resource.with_capability(built);
            }
            for requirement in declared.requirements {
                let mut built = if requirement.optional {
                    Requirement::optional(requirement.namespace)
                } else {
                    Requirement::mandatory(requirement.namespace)
                };
                if let Some(filter) = requirement.filter {
                    let parsed =
                        Filter::parse(&filter).map_err(|source| ManifestError::BadFilter {
                            resource: declared.id.clone(),
                            source,
                        })?;
                    built = built.with_filter(parsed);
                }
                resource = resource.with_requirement(built);
            }
            resources.push(resource);
        }
        Ok(resources)
    }
}

/// Type one JSON attribute value
fn attr_value(
    resource: &str,
    attribute: &str,
    value: serde_json::Value,
) -> Result<AttrValue, ManifestError> {
    match value {
        serde_json::Value::String(text) => {
            if attribute == "version" {
                let version =
                    Version::parse(&text).map_err(|source| ManifestError::BadVersion {
                        resource: resource.to_string(),
                        attribute: attribute.to_string(),
                        source,
                    })?;
                Ok(AttrValue::Version(version))
            } else {
                Ok(AttrValue::Str(text))
            }
        }
        serde_json::Value::Bool(flag) => Ok(AttrValue::Bool(flag)),
        serde_json::Value::Number(number) => match number.as_i64() {
            Some(int) => Ok(AttrValue::Int(int)),
            None => Err(ManifestError::BadAttribute {
                resource: resource.to_string(),
                attribute: attribute.to_string(),
            }),
        },
        serde_json::Value::Array(items) => {
            let mut list = Vec::with_capacity(items.len());
            for item in items {
                list.push(attr_value(resource, attribute, item)?);
            }
            Ok(AttrValue::List(list))
        }
        serde_json::Value::Null | serde_json::Value::Object(_) => {
            Err(ManifestError::BadAttribute {
                resource: resource.to_string(),
                attribute: attribute.to_string(),
            })
        }
    }
}
