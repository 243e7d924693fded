//! In-process coordinator used by the standalone binary and the test suites.
//!
//! State lives behind one `RwLock`; lookups clone a snapshot out and release
//! the lock before returning, so handlers never hold coordinator locks while
//! rendering.

use super::{
    Coordinator, JobDescriptor, JobState, ReferenceDescriptor, ResourceDescriptor,
    ResourceTopologyNodeDescriptor, ResourceType, TaskDescriptor, TaskState,
};
use crate::ids::{DataObjectId, JobId, ResourceId, TaskId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex, PoisonError, RwLock};
use std::time::Duration;
use tracing::{debug, info};

#[derive(Default)]
struct State {
    jobs: Vec<JobDescriptor>,
    tasks: HashMap<TaskId, TaskDescriptor>,
    references: HashMap<DataObjectId, ReferenceDescriptor>,
    resources: Vec<ResourceDescriptor>,
    topology: ResourceTopologyNodeDescriptor,
}

impl State {
    fn register_tasks(&mut self, root: &TaskDescriptor) {
        root.walk(&mut |task| {
            for reference in task.outputs.iter().chain(task.dependencies.iter()) {
                self.references.insert(reference.id, reference.clone());
            }
            self.tasks.insert(task.uid, task.clone());
        });
    }
}

pub struct InMemoryCoordinator {
    uuid: ResourceId,
    state: RwLock<State>,
    next_task_id: AtomicU64,
    submissions: AtomicUsize,
    shutdown_reason: Mutex<Option<String>>,
    shutdown_signal: Condvar,
}

impl InMemoryCoordinator {
    pub fn new() -> Self {
        Self::with_uuid(ResourceId::generate())
    }

    pub fn with_uuid(uuid: ResourceId) -> Self {
        let topology = ResourceTopologyNodeDescriptor {
            resource_desc: ResourceDescriptor {
                uuid,
                friendly_name: "coordinator".to_string(),
                resource_type: ResourceType::Coordinator,
                ..Default::default()
            },
            ..Default::default()
        };
        Self {
            uuid,
            state: RwLock::new(State {
                topology,
                ..Default::default()
            }),
            next_task_id: AtomicU64::new(1),
            submissions: AtomicUsize::new(0),
            shutdown_reason: Mutex::new(None),
            shutdown_signal: Condvar::new(),
        }
    }

    /// Attach a resource subtree below the coordinator's own topology node.
    ///
    /// Parent links are rewritten to match the tree shape, and every node of
    /// the subtree becomes an associated resource, parents first.
    pub fn add_resource_tree(&self, mut node: ResourceTopologyNodeDescriptor) {
        link_parents(&mut node, self.uuid);
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        node.walk(&mut |n| state.resources.push(n.resource_desc.clone()));
        state
            .topology
            .resource_desc
            .children
            .push(node.resource_desc.uuid);
        state.topology.children.push(node);
    }

    /// Record a job as-is, keeping whatever state it carries.
    pub fn insert_job(&self, mut job: JobDescriptor) -> JobId {
        if job.uuid.is_nil() {
            job.uuid = JobId::generate();
        }
        self.assign_task_ids(&mut job.root_task);
        let id = job.uuid;
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.register_tasks(&job.root_task);
        state.jobs.push(job);
        id
    }

    /// Number of [`Coordinator::submit_job`] calls observed so far.
    pub fn submissions(&self) -> usize {
        self.submissions.load(Ordering::SeqCst)
    }

    /// Reason passed to [`Coordinator::shutdown`], if it has been called.
    pub fn shutdown_reason(&self) -> Option<String> {
        self.shutdown_reason
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Block until shutdown is requested or the timeout elapses.
    pub fn wait_for_shutdown(&self, timeout: Duration) -> Option<String> {
        let guard = self
            .shutdown_reason
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let (guard, _) = self
            .shutdown_signal
            .wait_timeout_while(guard, timeout, |reason| reason.is_none())
            .unwrap_or_else(PoisonError::into_inner);
        guard.clone()
    }

    fn assign_task_ids(&self, task: &mut TaskDescriptor) {
        if task.uid.0 == 0 {
            task.uid = TaskId(self.next_task_id.fetch_add(1, Ordering::SeqCst));
        }
        for output in &mut task.outputs {
            if output.producing_task.0 == 0 {
                output.producing_task = task.uid;
            }
        }
        for child in &mut task.spawned {
            self.assign_task_ids(child);
        }
    }
}

impl Default for InMemoryCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

fn link_parents(node: &mut ResourceTopologyNodeDescriptor, parent: ResourceId) {
    if node.resource_desc.uuid.is_nil() {
        node.resource_desc.uuid = ResourceId::generate();
    }
    node.parent_id = Some(parent);
    node.resource_desc.parent = Some(parent);
    let id = node.resource_desc.uuid;
    for child in &mut node.children {
        link_parents(child, id);
    }
    node.resource_desc.children = node.children.iter().map(|c| c.resource_desc.uuid).collect();
}

impl Coordinator for InMemoryCoordinator {
    fn uuid(&self) -> ResourceId {
        self.uuid
    }

    fn num_jobs(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .jobs
            .len()
    }

    fn num_jobs_in_state(&self, state: JobState) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .jobs
            .iter()
            .filter(|j| j.state == state)
            .count()
    }

    fn num_tasks(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .tasks
            .len()
    }

    fn num_tasks_in_state(&self, state: TaskState) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .tasks
            .values()
            .filter(|t| t.state == state)
            .count()
    }

    fn num_resources(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .resources
            .len()
    }

    fn active_jobs(&self) -> Vec<JobDescriptor> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .jobs
            .clone()
    }

    fn associated_resources(&self) -> Vec<ResourceDescriptor> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .resources
            .clone()
    }

    fn job(&self, id: &JobId) -> Option<JobDescriptor> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .jobs
            .iter()
            .find(|j| &j.uuid == id)
            .cloned()
    }

    fn resource(&self, id: &ResourceId) -> Option<ResourceDescriptor> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .resources
            .iter()
            .find(|r| &r.uuid == id)
            .cloned()
    }

    fn task(&self, id: TaskId) -> Option<TaskDescriptor> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .tasks
            .get(&id)
            .cloned()
    }

    fn reference(&self, id: DataObjectId) -> Option<ReferenceDescriptor> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .references
            .get(&id)
            .cloned()
    }

    fn local_resource_topology(&self) -> ResourceTopologyNodeDescriptor {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .topology
            .clone()
    }

    fn submit_job(&self, mut job: JobDescriptor) -> JobId {
        self.submissions.fetch_add(1, Ordering::SeqCst);
        if job.state == JobState::New {
            job.state = JobState::Created;
        }
        let id = self.insert_job(job);
        info!(job_id = %id, "Job submitted");
        id
    }

    fn shutdown(&self, reason: &str) {
        let mut slot = self
            .shutdown_reason
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if slot.is_none() {
            info!(reason = %reason, "Coordinator shutdown requested");
            *slot = Some(reason.to_string());
            self.shutdown_signal.notify_all();
        } else {
            debug!(reason = %reason, "Coordinator already shutting down");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::{ReferenceType, ResourceState};

    fn pu(name: &str) -> ResourceTopologyNodeDescriptor {
        ResourceTopologyNodeDescriptor {
            resource_desc: ResourceDescriptor {
                friendly_name: name.to_string(),
                state: ResourceState::Idle,
                resource_type: ResourceType::Pu,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_add_resource_tree_links_parents() {
        let coord = InMemoryCoordinator::new();
        let machine = ResourceTopologyNodeDescriptor {
            resource_desc: ResourceDescriptor {
                friendly_name: "m0".into(),
                resource_type: ResourceType::Machine,
                ..Default::default()
            },
            children: vec![pu("pu0"), pu("pu1")],
            ..Default::default()
        };
        coord.add_resource_tree(machine);

        assert_eq!(coord.num_resources(), 3);
        let topo = coord.local_resource_topology();
        assert_eq!(topo.resource_desc.uuid, coord.uuid());
        let m = &topo.children[0];
        assert_eq!(m.parent_id, Some(coord.uuid()));
        assert_eq!(m.resource_desc.children.len(), 2);
        for child in &m.children {
            assert_eq!(child.parent_id, Some(m.resource_desc.uuid));
        }
        let names: Vec<_> = coord
            .associated_resources()
            .into_iter()
            .map(|r| r.friendly_name)
            .collect();
        assert_eq!(names, vec!["m0", "pu0", "pu1"]);
    }

    #[test]
    fn test_submit_assigns_ids_and_registers_tasks() {
        let coord = InMemoryCoordinator::new();
        let job = JobDescriptor {
            name: "wc".into(),
            root_task: TaskDescriptor {
                name: "root".into(),
                outputs: vec![ReferenceDescriptor {
                    id: DataObjectId(77),
                    reference_type: ReferenceType::Future,
                    ..Default::default()
                }],
                spawned: vec![TaskDescriptor {
                    name: "child".into(),
                    ..Default::default()
                }],
                ..Default::default()
            },
            ..Default::default()
        };
        let id = coord.submit_job(job);
        assert!(!id.is_nil());
        assert_eq!(coord.submissions(), 1);

        let stored = coord.job(&id).unwrap();
        assert_eq!(stored.state, JobState::Created);
        let root_uid = stored.root_task.uid;
        assert_ne!(root_uid.0, 0);
        assert_eq!(coord.num_tasks(), 2);
        let reference = coord.reference(DataObjectId(77)).unwrap();
        assert_eq!(reference.producing_task, root_uid);
    }

    #[test]
    fn test_shutdown_records_first_reason() {
        let coord = InMemoryCoordinator::new();
        assert!(coord.wait_for_shutdown(Duration::from_millis(1)).is_none());
        coord.shutdown("first");
        coord.shutdown("second");
        assert_eq!(coord.shutdown_reason().as_deref(), Some("first"));
        assert_eq!(
            coord.wait_for_shutdown(Duration::from_millis(1)).as_deref(),
            Some("first")
        );
    }
}
