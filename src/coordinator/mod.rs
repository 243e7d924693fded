//! # Coordinator collaborator
//!
//! The coordinator owns all job, task, resource and reference state. The UI
//! only ever talks to it through the [`Coordinator`] trait: read-only
//! snapshot lookups plus exactly two mutating operations, job submission and
//! shutdown, which are forwarded verbatim.
//!
//! Implementations must be internally synchronized; every handler calls into
//! the same instance concurrently. Snapshots are owned copies taken at call
//! time and are never cached by the UI.

pub mod memory;

use crate::ids::{DataObjectId, JobId, ResourceId, TaskId};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

pub use memory::InMemoryCoordinator;

macro_rules! symbolic_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $symbol:literal),+ $(,)? } default $default:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $symbol)]
                $variant,
            )+
        }

        impl $name {
            /// Symbolic name used in rendered pages and payloads.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $symbol,)+
                }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                $name::$default
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

symbolic_enum!(
    /// Lifecycle state of a job.
    JobState {
        New => "NEW",
        Created => "CREATED",
        Running => "RUNNING",
        Completed => "COMPLETED",
        Failed => "FAILED",
        Aborted => "ABORTED",
        Unknown => "UNKNOWN",
    } default New
);

symbolic_enum!(
    /// Lifecycle state of a task.
    TaskState {
        Created => "CREATED",
        Blocking => "BLOCKING",
        Runnable => "RUNNABLE",
        Assigned => "ASSIGNED",
        Running => "RUNNING",
        Completed => "COMPLETED",
        Failed => "FAILED",
        Aborted => "ABORTED",
        Delegated => "DELEGATED",
        Unknown => "UNKNOWN",
    } default Created
);

symbolic_enum!(
    /// Availability of a resource.
    ResourceState {
        Unknown => "RESOURCE_UNKNOWN",
        Idle => "RESOURCE_IDLE",
        Busy => "RESOURCE_BUSY",
        Lost => "RESOURCE_LOST",
    } default Unknown
);

symbolic_enum!(
    /// Kind of node in the resource topology.
    ResourceType {
        Pu => "RESOURCE_PU",
        Core => "RESOURCE_CORE",
        Cache => "RESOURCE_CACHE",
        Nic => "RESOURCE_NIC",
        Disk => "RESOURCE_DISK",
        Ssd => "RESOURCE_SSD",
        Machine => "RESOURCE_MACHINE",
        Logical => "RESOURCE_LOGICAL",
        NumaNode => "RESOURCE_NUMA_NODE",
        Socket => "RESOURCE_SOCKET",
        Coordinator => "RESOURCE_COORDINATOR",
    } default Pu
);

symbolic_enum!(
    /// What a data-object reference currently points at.
    ReferenceType {
        Tombstone => "TOMBSTONE",
        Future => "FUTURE",
        Concrete => "CONCRETE",
        Stream => "STREAM",
        Value => "VALUE",
        Error => "ERROR",
    } default Future
);

symbolic_enum!(
    /// Visibility of a reference.
    ReferenceScope {
        Public => "PUBLIC",
        Private => "PRIVATE",
    } default Public
);

/// Reference to a data object produced or consumed by a task.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferenceDescriptor {
    pub id: DataObjectId,
    #[serde(rename = "type")]
    pub reference_type: ReferenceType,
    pub scope: ReferenceScope,
    pub non_deterministic: bool,
    pub size: u64,
    pub producing_task: TaskId,
}

/// One node of a job's dynamic task graph.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskDescriptor {
    pub uid: TaskId,
    pub name: String,
    pub state: TaskState,
    pub spawned: Vec<TaskDescriptor>,
    pub dependencies: Vec<ReferenceDescriptor>,
    pub outputs: Vec<ReferenceDescriptor>,
}

impl TaskDescriptor {
    /// Visit this task and every task it spawned, depth first, parents first.
    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(&'a TaskDescriptor)) {
        visit(self);
        for child in &self.spawned {
            child.walk(visit);
        }
    }
}

/// A job: a named task graph rooted at one task.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobDescriptor {
    pub uuid: JobId,
    pub name: String,
    pub state: JobState,
    pub root_task: TaskDescriptor,
    pub output_ids: Vec<DataObjectId>,
}

/// A schedulable or structural resource.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceDescriptor {
    pub uuid: ResourceId,
    pub friendly_name: String,
    pub state: ResourceState,
    #[serde(rename = "type")]
    pub resource_type: ResourceType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<ResourceId>,
    pub children: Vec<ResourceId>,
}

/// A node of the resource topology tree.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceTopologyNodeDescriptor {
    pub resource_desc: ResourceDescriptor,
    pub children: Vec<ResourceTopologyNodeDescriptor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<ResourceId>,
}

impl ResourceTopologyNodeDescriptor {
    /// Visit every node, parents before children.
    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(&'a ResourceTopologyNodeDescriptor)) {
        visit(self);
        for child in &self.children {
            child.walk(visit);
        }
    }

    /// Number of nodes in this subtree, including this one.
    pub fn node_count(&self) -> usize {
        let mut count = 0;
        self.walk(&mut |_| count += 1);
        count
    }
}

/// Contract consumed from the coordinator process.
///
/// Everything except [`Coordinator::submit_job`] and [`Coordinator::shutdown`]
/// is a read-only snapshot lookup.
pub trait Coordinator: Send + Sync {
    /// Identity of this coordinator, which is itself a resource.
    fn uuid(&self) -> ResourceId;

    fn num_jobs(&self) -> usize;
    fn num_jobs_in_state(&self, state: JobState) -> usize;
    fn num_tasks(&self) -> usize;
    fn num_tasks_in_state(&self, state: TaskState) -> usize;
    /// Resources associated with (local to) this coordinator.
    fn num_resources(&self) -> usize;

    /// Jobs in coordinator iteration order.
    fn active_jobs(&self) -> Vec<JobDescriptor>;
    /// Resources in coordinator iteration order.
    fn associated_resources(&self) -> Vec<ResourceDescriptor>;

    fn job(&self, id: &JobId) -> Option<JobDescriptor>;
    fn resource(&self, id: &ResourceId) -> Option<ResourceDescriptor>;
    fn task(&self, id: TaskId) -> Option<TaskDescriptor>;
    fn reference(&self, id: DataObjectId) -> Option<ReferenceDescriptor>;

    fn local_resource_topology(&self) -> ResourceTopologyNodeDescriptor;

    /// Submit a job; returns the identifier the coordinator assigned.
    fn submit_job(&self, job: JobDescriptor) -> JobId;

    /// Begin coordinator shutdown.
    fn shutdown(&self, reason: &str);
}
