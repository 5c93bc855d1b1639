//! Result extraction from terminal task payloads
//!
//! A finished task carries a semi-structured payload whose shape depends on
//! the operation that created it. A [`ResultExtractor`] turns that payload
//! into a typed value, or fails with [`Error::Extraction`] naming the task.
//!
//! ## Payload shapes
//!
//! `created_resources` comes in two shapes, decoded as [`CreatedResources`]:
//!
//! ```json
//! { "created_resources": { "volumes": ["726ecfcc-..."], "instances": [] } }
//! { "created_resources": [ { "id": "abc-123" } ] }
//! ```
//!
//! Entries may be bare ID strings or objects with an `id` field.

use crate::error::{Error, Result};
use crate::traits::{TaskInfo, TaskState};
use serde::Deserialize;
use serde_json::Value;
use std::str::FromStr;

/// Decodes a terminal task payload into a typed value
///
/// Implemented by the extractors in this module and by any closure
/// `Fn(&TaskInfo) -> Result<T>`:
///
/// ```rust
/// use cloudtask_core::{ResultExtractor, Result, TaskInfo, TaskState};
///
/// let task_type = |task: &TaskInfo| -> Result<String> {
///     Ok(task.extra.get("task_type").and_then(|v| v.as_str()).unwrap_or_default().to_string())
/// };
/// let task = TaskInfo::new("task-1", TaskState::Success);
/// assert_eq!(task_type.extract(&task).unwrap(), "");
/// ```
///
/// Implementations must return [`Error::Extraction`] (naming the task ID)
/// when the expected data is missing or malformed, never a zero value.
pub trait ResultExtractor<T>: Send + Sync {
    /// Extract the value from a terminal-success task
    fn extract(&self, task: &TaskInfo) -> Result<T>;
}

impl<F, T> ResultExtractor<T> for F
where
    F: Fn(&TaskInfo) -> Result<T> + Send + Sync,
{
    fn extract(&self, task: &TaskInfo) -> Result<T> {
        self(task)
    }
}

/// Kinds of resources a task can create
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Volume,
    Instance,
    LoadBalancer,
    Listener,
    Pool,
    Network,
    Subnet,
    Router,
    FloatingIp,
    SecurityGroup,
    Port,
    ServerGroup,
    Snapshot,
    Image,
    K8sCluster,
    K8sPool,
    CdnResource,
    DnsZone,
    Function,
    Storage,
}

impl ResourceKind {
    /// Every kind, in declaration order
    pub const ALL: [ResourceKind; 20] = [
        ResourceKind::Volume,
        ResourceKind::Instance,
        ResourceKind::LoadBalancer,
        ResourceKind::Listener,
        ResourceKind::Pool,
        ResourceKind::Network,
        ResourceKind::Subnet,
        ResourceKind::Router,
        ResourceKind::FloatingIp,
        ResourceKind::SecurityGroup,
        ResourceKind::Port,
        ResourceKind::ServerGroup,
        ResourceKind::Snapshot,
        ResourceKind::Image,
        ResourceKind::K8sCluster,
        ResourceKind::K8sPool,
        ResourceKind::CdnResource,
        ResourceKind::DnsZone,
        ResourceKind::Function,
        ResourceKind::Storage,
    ];

    /// Key of this kind in a keyed `created_resources` map
    pub fn key(self) -> &'static str {
        match self {
            ResourceKind::Volume => "volumes",
            ResourceKind::Instance => "instances",
            ResourceKind::LoadBalancer => "loadbalancers",
            ResourceKind::Listener => "listeners",
            ResourceKind::Pool => "pools",
            ResourceKind::Network => "networks",
            ResourceKind::Subnet => "subnets",
            ResourceKind::Router => "routers",
            ResourceKind::FloatingIp => "floatingips",
            ResourceKind::SecurityGroup => "security_groups",
            ResourceKind::Port => "ports",
            ResourceKind::ServerGroup => "servergroups",
            ResourceKind::Snapshot => "snapshots",
            ResourceKind::Image => "images",
            ResourceKind::K8sCluster => "k8s_clusters",
            ResourceKind::K8sPool => "k8s_pools",
            ResourceKind::CdnResource => "cdn_resources",
            ResourceKind::DnsZone => "zones",
            ResourceKind::Function => "functions",
            ResourceKind::Storage => "storages",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for ResourceKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        ResourceKind::ALL
            .into_iter()
            .find(|kind| kind.key() == s)
            .ok_or_else(|| Error::config(format!("Unknown resource kind: {}", s)))
    }
}

/// One entry of `created_resources`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ResourceRef {
    /// Bare identifier
    Id(String),
    /// Object with an `id` field
    Object {
        /// Identifier
        id: String,
    },
}

impl ResourceRef {
    /// The identifier
    pub fn id(&self) -> &str {
        match self {
            ResourceRef::Id(id) | ResourceRef::Object { id } => id,
        }
    }
}

/// Decoded `created_resources` payload
#[derive(Debug, Clone, PartialEq)]
pub enum CreatedResources {
    /// `[ { "id": .. }, .. ]`
    List(Vec<ResourceRef>),
    /// `{ "volumes": [..], "instances": [..], .. }`, decoded per kind on demand
    ByKind(serde_json::Map<String, Value>),
}

impl CreatedResources {
    /// Decode the `created_resources` payload of a terminal-success task
    ///
    /// # Returns
    ///
    /// - `Ok(CreatedResources)`: Decoded payload
    /// - `Err(Error::Extraction)`: Task not finished, payload absent, or of
    ///   an unexpected shape
    pub fn from_task(task: &TaskInfo) -> Result<Self> {
        if task.state != TaskState::Success {
            return Err(Error::extraction(
                &task.id,
                format!("task is {}, result is only available once FINISHED", task.state),
            ));
        }

        match &task.created_resources {
            None | Some(Value::Null) => Err(Error::extraction(
                &task.id,
                "payload has no created_resources",
            )),
            Some(value @ Value::Array(_)) => {
                let refs = Vec::<ResourceRef>::deserialize(value).map_err(|e| {
                    Error::extraction(&task.id, format!("malformed created_resources list: {}", e))
                })?;
                Ok(CreatedResources::List(refs))
            }
            Some(Value::Object(map)) => Ok(CreatedResources::ByKind(map.clone())),
            Some(other) => Err(Error::extraction(
                &task.id,
                format!("created_resources has unexpected type: {}", json_type(other)),
            )),
        }
    }

    /// Identifiers created by the task
    ///
    /// For a keyed payload `kind` selects the list. A list payload carries no
    /// kinds, so requesting one is an error. Empty identifiers are rejected.
    pub fn ids(&self, task_id: &str, kind: Option<ResourceKind>) -> Result<Vec<String>> {
        let refs = match self {
            CreatedResources::List(refs) => {
                if let Some(kind) = kind {
                    return Err(Error::extraction(
                        task_id,
                        format!("created_resources is a plain list, cannot select {}", kind.key()),
                    ));
                }
                refs.clone()
            }
            CreatedResources::ByKind(map) => {
                let kind = kind.ok_or_else(|| {
                    Error::extraction(
                        task_id,
                        "created_resources is keyed by resource kind but no kind was requested",
                    )
                })?;
                match map.get(kind.key()) {
                    None | Some(Value::Null) => Vec::new(),
                    Some(value) => Vec::<ResourceRef>::deserialize(value).map_err(|e| {
                        Error::extraction(
                            task_id,
                            format!("malformed created_resources.{}: {}", kind.key(), e),
                        )
                    })?,
                }
            }
        };

        refs.iter()
            .map(|r| {
                if r.id().trim().is_empty() {
                    Err(Error::extraction(task_id, "created resource has an empty id"))
                } else {
                    Ok(r.id().to_string())
                }
            })
            .collect()
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// First identifier created by the task
///
/// `CreatedResourceId::of(ResourceKind::Volume)` reads
/// `created_resources.volumes[0]`; `CreatedResourceId::any()` reads
/// `created_resources[0].id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreatedResourceId {
    kind: Option<ResourceKind>,
}

impl CreatedResourceId {
    /// First ID of the given kind
    ///
    /// Only matches keyed payloads; a list-shaped payload is an
    /// extraction error.
    pub fn of(kind: ResourceKind) -> Self {
        Self { kind: Some(kind) }
    }

    /// First ID of a list-shaped payload
    pub fn any() -> Self {
        Self { kind: None }
    }
}

impl ResultExtractor<String> for CreatedResourceId {
    fn extract(&self, task: &TaskInfo) -> Result<String> {
        let ids = CreatedResources::from_task(task)?.ids(&task.id, self.kind)?;
        ids.into_iter().next().ok_or_else(|| {
            let what = self
                .kind
                .map_or_else(|| "created_resources".to_string(), |k| format!("created_resources.{}", k));
            Error::extraction(&task.id, format!("{} is empty", what))
        })
    }
}

/// All identifiers of one kind created by the task (batch creation)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreatedResourceIds {
    kind: Option<ResourceKind>,
}

impl CreatedResourceIds {
    /// All IDs of the given kind
    pub fn of(kind: ResourceKind) -> Self {
        Self { kind: Some(kind) }
    }

    /// All IDs of a list-shaped payload
    pub fn any() -> Self {
        Self { kind: None }
    }
}

impl ResultExtractor<Vec<String>> for CreatedResourceIds {
    fn extract(&self, task: &TaskInfo) -> Result<Vec<String>> {
        let ids = CreatedResources::from_task(task)?.ids(&task.id, self.kind)?;
        if ids.is_empty() {
            return Err(Error::extraction(&task.id, "no resources were created"));
        }
        Ok(ids)
    }
}

/// For tasks with no result payload (delete, resize, attach)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskCompleted;

impl ResultExtractor<()> for TaskCompleted {
    fn extract(&self, _task: &TaskInfo) -> Result<()> {
        Ok(())
    }
}
