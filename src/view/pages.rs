//! One document builder per entity kind.
//!
//! Every builder takes the coordinator's identity plus the snapshot it
//! renders and returns a complete document: header, footer and either the
//! entity's fields or, when the snapshot is absent, an error annotation and
//! no body. Template ids live in [`template`].

use super::dictionary::{ErrorAnnotation, ViewDictionary};
use super::renderer::ViewRenderer;
use crate::coordinator::{
    Coordinator, JobDescriptor, JobState, ReferenceDescriptor, ResourceDescriptor, ResourceType,
    TaskDescriptor, TaskState,
};
use crate::ids::ResourceId;

/// Template identifiers, one per page.
pub mod template {
    pub const MAIN: &str = "main";
    pub const JOBS_LIST: &str = "jobs_list";
    pub const JOB_STATUS: &str = "job_status";
    pub const JOB_DTG: &str = "job_dtg";
    pub const RESOURCES_LIST: &str = "resources_list";
    pub const RESOURCE_STATUS: &str = "resource_status";
    pub const REFERENCE_VIEW: &str = "reference_view";
    pub const TASK_STATUS: &str = "task_status";
}

/// Output count reported for a job whose output list is empty.
///
/// Long-standing behaviour that clients may depend on: an empty list is
/// reported as one output rather than zero.
pub const EMPTY_OUTPUT_COUNT: usize = 1;

/// Counters shown on the overview page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overview {
    pub coordinator_id: ResourceId,
    pub jobs_known: usize,
    pub jobs_running: usize,
    pub tasks_known: usize,
    pub tasks_running: usize,
    pub resources_local: usize,
}

impl Overview {
    /// Snapshot the counters shown on the overview page.
    pub fn collect(coordinator: &dyn Coordinator) -> Self {
        Self {
            coordinator_id: coordinator.uuid(),
            jobs_known: coordinator.num_jobs(),
            jobs_running: coordinator.num_jobs_in_state(JobState::Running),
            tasks_known: coordinator.num_tasks(),
            tasks_running: coordinator.num_tasks_in_state(TaskState::Running),
            resources_local: coordinator.num_resources(),
        }
    }

    /// The coordinator counts itself as a resource.
    pub fn resources_known(&self) -> usize {
        self.resources_local + 1
    }
}

pub fn job_not_found() -> ErrorAnnotation {
    ErrorAnnotation::new(
        "Job not found.",
        "The requested job does not exist or is unknown to this coordinator.",
    )
}

pub fn resource_not_found() -> ErrorAnnotation {
    ErrorAnnotation::new("Resource not found.", "The requested resource does not exist.")
}

pub fn reference_not_found() -> ErrorAnnotation {
    ErrorAnnotation::new(
        "Reference or data object not found.",
        "There exists no local reference for the requested data object ID.",
    )
}

pub fn task_not_found() -> ErrorAnnotation {
    ErrorAnnotation::new(
        "Task not found.",
        "The requested task does not exist or is unknown to this coordinator.",
    )
}

fn framed(name: &str, coordinator: ResourceId, err: Option<&ErrorAnnotation>) -> ViewDictionary {
    let mut doc = ViewRenderer::new_document(name);
    ViewRenderer::add_header(&mut doc, coordinator, err);
    ViewRenderer::add_footer(&mut doc);
    doc
}

pub fn overview(summary: &Overview) -> ViewDictionary {
    let mut doc = framed(template::MAIN, summary.coordinator_id, None);
    doc.set_value("COORD_ID", summary.coordinator_id);
    doc.set_value("NUM_JOBS_KNOWN", summary.jobs_known);
    doc.set_value("NUM_JOBS_RUNNING", summary.jobs_running);
    doc.set_value("NUM_TASKS_KNOWN", summary.tasks_known);
    doc.set_value("NUM_TASKS_RUNNING", summary.tasks_running);
    doc.set_value("NUM_RESOURCES_KNOWN", summary.resources_known());
    doc.set_value("NUM_RESOURCES_LOCAL", summary.resources_local);
    doc
}

pub fn job_list(coordinator: ResourceId, jobs: &[JobDescriptor]) -> ViewDictionary {
    let mut doc = framed(template::JOBS_LIST, coordinator, None);
    for (i, job) in jobs.iter().enumerate() {
        let row = ViewRenderer::add_row(&mut doc, "JOB_DATA");
        row.set_value("JOB_NUM", i);
        row.set_value("JOB_ID", job.uuid);
        row.set_value("JOB_FRIENDLY_NAME", &job.name);
        row.set_value("JOB_ROOT_TASK_ID", job.root_task.uid);
        row.set_value("JOB_STATE", job.state);
    }
    doc
}

pub fn job_status(coordinator: ResourceId, job: Option<&JobDescriptor>) -> ViewDictionary {
    let Some(job) = job else {
        return framed(template::JOB_STATUS, coordinator, Some(&job_not_found()));
    };
    let mut doc = framed(template::JOB_STATUS, coordinator, None);
    doc.set_value("JOB_ID", job.uuid);
    doc.set_value("JOB_NAME", &job.name);
    doc.set_value("JOB_STATUS", job.state);
    doc.set_value("JOB_ROOT_TASK_ID", job.root_task.uid);
    let outputs = if job.output_ids.is_empty() {
        EMPTY_OUTPUT_COUNT
    } else {
        job.output_ids.len()
    };
    doc.set_value("JOB_NUM_OUTPUTS", outputs);
    for output in &job.output_ids {
        ViewRenderer::add_row(&mut doc, "JOB_OUTPUTS").set_value("JOB_OUTPUT_ID", output);
    }
    doc
}

/// Viewer shell for a job's task graph. The id is echoed as given; the
/// viewer fetches the graph itself from `/job/dtg/`.
pub fn job_dtg_view(coordinator: ResourceId, job_id: &str) -> ViewDictionary {
    let mut doc = framed(template::JOB_DTG, coordinator, None);
    doc.set_value("JOB_ID", job_id);
    doc
}

pub fn resource_list(coordinator: ResourceId, resources: &[ResourceDescriptor]) -> ViewDictionary {
    let mut doc = framed(template::RESOURCES_LIST, coordinator, None);
    for (i, res) in resources.iter().enumerate() {
        let row = ViewRenderer::add_row(&mut doc, "RES_DATA");
        row.set_value("RES_NUM", i);
        row.set_value("RES_ID", res.uuid);
        row.set_value("RES_FRIENDLY_NAME", &res.friendly_name);
        row.set_value("RES_STATE", res.state);
        // Only processing units take tasks.
        if res.resource_type != ResourceType::Pu {
            row.add_section_row("RES_NON_SCHEDULABLE");
        }
    }
    doc
}

pub fn resource_status(coordinator: ResourceId, res: Option<&ResourceDescriptor>) -> ViewDictionary {
    let Some(res) = res else {
        return framed(template::RESOURCE_STATUS, coordinator, Some(&resource_not_found()));
    };
    let mut doc = framed(template::RESOURCE_STATUS, coordinator, None);
    doc.set_value("RES_ID", res.uuid);
    doc.set_value("RES_FRIENDLY_NAME", &res.friendly_name);
    doc.set_value("RES_TYPE", res.resource_type);
    doc.set_value("RES_STATUS", res.state);
    doc.set_value(
        "RES_PARENT_ID",
        res.parent.map(|p| p.to_string()).unwrap_or_default(),
    );
    doc.set_value("RES_NUM_CHILDREN", res.children.len());
    doc
}

pub fn reference_view(coordinator: ResourceId, reference: Option<&ReferenceDescriptor>) -> ViewDictionary {
    let Some(reference) = reference else {
        return framed(template::REFERENCE_VIEW, coordinator, Some(&reference_not_found()));
    };
    let mut doc = framed(template::REFERENCE_VIEW, coordinator, None);
    doc.set_value("REF_ID", reference.id);
    doc.set_value("REF_TYPE", reference.reference_type);
    doc.set_value("REF_SCOPE", reference.scope);
    doc.set_value("REF_NONDET", u8::from(reference.non_deterministic));
    doc.set_value("REF_SIZE", reference.size);
    doc.set_value("REF_PRODUCER", reference.producing_task);
    doc
}

pub fn task_status(coordinator: ResourceId, task: Option<&TaskDescriptor>) -> ViewDictionary {
    let Some(task) = task else {
        return framed(template::TASK_STATUS, coordinator, Some(&task_not_found()));
    };
    let mut doc = framed(template::TASK_STATUS, coordinator, None);
    doc.set_value("TASK_ID", task.uid);
    doc.set_value("TASK_STATUS", task.state);
    doc
}
