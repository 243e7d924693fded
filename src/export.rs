//! Structured payloads for machine clients.
//!
//! Snapshots are serialized to JSON with their field names, nesting and
//! repeated-field order intact. No template is involved.

use crate::coordinator::{JobDescriptor, ResourceTopologyNodeDescriptor};
use crate::error::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;

pub const PAYLOAD_CONTENT_TYPE: &str = "application/json";

pub struct StateExporter;

impl StateExporter {
    /// Lossless conversion of one snapshot to a JSON payload.
    pub fn to_payload<T: Serialize>(snapshot: &T) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(snapshot)?)
    }

    /// Parse a payload produced by this exporter back into its snapshot type.
    pub fn from_payload<T: DeserializeOwned>(payload: &[u8]) -> Result<T> {
        Ok(serde_json::from_slice(payload)?)
    }

    /// Task graph of one job: the full job descriptor, root task included.
    pub fn task_graph(job: &JobDescriptor) -> Result<Vec<u8>> {
        Self::to_payload(job)
    }

    /// The local resource tree, children nested under their parents.
    pub fn topology(root: &ResourceTopologyNodeDescriptor) -> Result<Vec<u8>> {
        Self::to_payload(root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::{
        ReferenceDescriptor, ResourceDescriptor, ResourceType, TaskDescriptor, TaskState,
    };
    use crate::ids::{DataObjectId, JobId, ResourceId, TaskId};
    use serde_json::Value;

    fn node(name: &str, children: Vec<ResourceTopologyNodeDescriptor>) -> ResourceTopologyNodeDescriptor {
        ResourceTopologyNodeDescriptor {
            resource_desc: ResourceDescriptor {
                uuid: ResourceId::generate(),
                friendly_name: name.to_string(),
                resource_type: ResourceType::Machine,
                ..Default::default()
            },
            children,
            parent_id: None,
        }
    }

    #[test]
    fn test_topology_preserves_structure() {
        let root = node("m0", vec![node("s0", vec![node("c0", vec![]), node("c1", vec![])])]);
        let payload = StateExporter::topology(&root).unwrap();
        let decoded: ResourceTopologyNodeDescriptor = StateExporter::from_payload(&payload).unwrap();
        assert_eq!(decoded, root);
        let names: Vec<_> = decoded.children[0]
            .children
            .iter()
            .map(|c| c.resource_desc.friendly_name.as_str())
            .collect();
        assert_eq!(names, vec!["c0", "c1"]);
    }

    #[test]
    fn test_task_graph_field_names() {
        let job = JobDescriptor {
            uuid: JobId::generate(),
            name: "wordcount".into(),
            root_task: TaskDescriptor {
                uid: TaskId(1),
                state: TaskState::Running,
                spawned: vec![TaskDescriptor {
                    uid: TaskId(2),
                    ..Default::default()
                }],
                outputs: vec![ReferenceDescriptor {
                    id: DataObjectId(5),
                    ..Default::default()
                }],
                ..Default::default()
            },
            ..Default::default()
        };
        let json: Value = serde_json::from_slice(&StateExporter::task_graph(&job).unwrap()).unwrap();
        assert_eq!(json["name"], "wordcount");
        assert_eq!(json["uuid"], job.uuid.to_string());
        assert_eq!(json["root_task"]["state"], "RUNNING");
        assert_eq!(json["root_task"]["spawned"][0]["uid"], 2);
        assert_eq!(json["root_task"]["outputs"][0]["type"], "FUTURE");
    }

    #[test]
    fn test_malformed_payload_is_export_error() {
        let err = StateExporter::from_payload::<JobDescriptor>(b"{not json").unwrap_err();
        assert!(matches!(err, crate::error::UiError::Export(_)));
    }
}
