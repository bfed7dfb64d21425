//! Typed handles on other resources
//!
//! A `Dependency<R>` names another resource in the graph. The external runtime
//! resolves it before dispatch by attaching the dependee's config and outputs;
//! within this repository a dependency is either resolved (usable) or declared
//! (id only, usable for equality checks but not for `resolve()`).

use std::fmt;
use std::sync::Arc;

use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

use crate::error::{ResourceError, ResourceResult};
use crate::resource::Resource;

/// The dependee's state as injected by the runtime.
pub struct Resolved<R: Resource> {
    pub config: R::Config,
    pub outputs: Option<R::Outputs>,
}

/// Handle on another resource, resolved by the runtime before invocation.
pub struct Dependency<R: Resource> {
    id: String,
    resolved: Option<Arc<Resolved<R>>>,
}

impl<R: Resource> Dependency<R> {
    /// A declared but not yet resolved dependency.
    pub fn declared(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            resolved: None,
        }
    }

    /// A dependency the runtime has resolved against the dependee's state.
    pub fn resolved(id: impl Into<String>, config: R::Config, outputs: Option<R::Outputs>) -> Self {
        Self {
            id: id.into(),
            resolved: Some(Arc::new(Resolved { config, outputs })),
        }
    }

    /// Graph id of the dependee, e.g. `"gcp/gke:prod-cluster"`.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Access the dependee's resolved state.
    pub fn resolve(&self) -> ResourceResult<&Resolved<R>> {
        self.resolved
            .as_deref()
            .ok_or_else(|| ResourceError::UnresolvedDependency(self.id.clone()))
    }
}

impl<R: Resource> Clone for Dependency<R> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            resolved: self.resolved.clone(),
        }
    }
}

impl<R: Resource> PartialEq for Dependency<R> {
    /// Dependencies compare by id; immutability checks care about identity,
    /// not about the resolved payload.
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<R: Resource> fmt::Debug for Dependency<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dependency")
            .field("id", &self.id)
            .field("resolved", &self.resolved.is_some())
            .finish()
    }
}

#[derive(Serialize, Deserialize)]
struct DependencyRepr {
    #[serde(rename = "$ref")]
    target: String,
}

impl<R: Resource> Serialize for Dependency<R> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        DependencyRepr {
            target: self.id.clone(),
        }
        .serialize(serializer)
    }
}

impl<'de, R: Resource> Deserialize<'de> for Dependency<R> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let repr = DependencyRepr::deserialize(deserializer)?;
        Ok(Dependency::declared(repr.target))
    }
}
