//! Contract Test: Result Extraction
//!
//! Verifies that extractors never turn a missing or malformed payload into
//! a silent zero value.
//!
//! Constraints verified:
//! - A well-formed payload yields the created identifier
//! - Missing, empty or malformed payloads yield an extraction error that
//!   names the task
//! - Extractors only accept terminal-success tasks

use cloudtask_core::{
    CreatedResourceId, CreatedResourceIds, Error, ResourceKind, ResultExtractor, TaskInfo,
    TaskState,
};
use serde_json::{Value, json};
use tokio_test::{assert_err, assert_ok};

fn finished(task_id: &str, body: Value) -> TaskInfo {
    let mut task: TaskInfo = serde_json::from_value(body).expect("valid task body");
    task.id = task_id.to_string();
    task
}

fn assert_extraction_error<T: std::fmt::Debug>(result: cloudtask_core::Result<T>, task_id: &str) {
    match result {
        Err(Error::Extraction { task_id: id, message }) => {
            assert_eq!(id, task_id);
            assert!(!message.is_empty());
        }
        other => panic!("expected Extraction error for {}, got {:?}", task_id, other),
    }
}

#[test]
fn list_payload_yields_first_id() {
    let task = finished(
        "task-1",
        json!({
            "id": "ignored",
            "state": "FINISHED",
            "created_resources": [{ "id": "abc-123" }]
        }),
    );

    let id = assert_ok!(CreatedResourceId::any().extract(&task));
    assert_eq!(id, "abc-123");
}

#[test]
fn empty_list_names_the_task() {
    let task = finished(
        "task-7",
        json!({ "id": "task-7", "state": "FINISHED", "created_resources": [] }),
    );

    assert_extraction_error(CreatedResourceId::any().extract(&task), "task-7");
    assert_extraction_error(CreatedResourceIds::any().extract(&task), "task-7");
}

#[test]
fn missing_payload_names_the_task() {
    let task = finished("task-8", json!({ "id": "task-8", "state": "FINISHED" }));

    assert_extraction_error(
        CreatedResourceId::of(ResourceKind::Instance).extract(&task),
        "task-8",
    );
}

#[test]
fn keyed_payload_per_kind() {
    let task = finished(
        "task-9",
        json!({
            "id": "task-9",
            "state": "FINISHED",
            "created_resources": {
                "loadbalancers": ["lb-1"],
                "k8s_clusters": [{ "id": "cluster-1" }],
                "floatingips": []
            }
        }),
    );

    assert_eq!(
        CreatedResourceId::of(ResourceKind::LoadBalancer)
            .extract(&task)
            .expect("load balancer created"),
        "lb-1"
    );
    assert_eq!(
        CreatedResourceId::of(ResourceKind::K8sCluster)
            .extract(&task)
            .expect("cluster created"),
        "cluster-1"
    );
    assert_extraction_error(
        CreatedResourceId::of(ResourceKind::FloatingIp).extract(&task),
        "task-9",
    );
    assert_extraction_error(
        CreatedResourceId::of(ResourceKind::Volume).extract(&task),
        "task-9",
    );
}

#[test]
fn malformed_payload_names_the_task() {
    for created in [json!(42), json!("abc"), json!([{ "name": "no-id" }]), json!([true])] {
        let task = TaskInfo::new("task-10", TaskState::Success).with_created_resources(created);
        assert_extraction_error(CreatedResourceId::any().extract(&task), "task-10");
    }
}

#[test]
fn non_terminal_tasks_are_rejected() {
    for state in [TaskState::Running, TaskState::Error] {
        let task = TaskInfo::new("task-11", state).with_created_resources(json!(["abc"]));
        assert_extraction_error(CreatedResourceIds::any().extract(&task), "task-11");
    }

    let finished =
        TaskInfo::new("task-11", TaskState::Success).with_created_resources(json!(["abc"]));
    let ids = assert_ok!(CreatedResourceIds::any().extract(&finished));
    assert_eq!(ids, vec!["abc"]);
}

#[test]
fn new_state_aliases_running() {
    let task: TaskInfo =
        serde_json::from_value(json!({ "id": "task-12", "state": "NEW" })).expect("valid body");
    assert_eq!(task.state, TaskState::Running);
    assert!(!task.state.is_terminal());

    assert_err!(serde_json::from_value::<TaskInfo>(
        json!({ "id": "task-13", "state": "PAUSED" })
    ));
}
