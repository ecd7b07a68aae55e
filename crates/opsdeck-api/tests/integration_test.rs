// Integration tests for the Opsdeck API
// Requires a running server: cargo run -p opsdeck-api

use opsdeck_core::{RunRecord, RunStatus, Task, TaskStatus};
use serde_json::{json, Value};

const API_BASE_URL: &str = "http://localhost:8000";

#[tokio::test]
#[ignore] // Run with: cargo test -p opsdeck-api --test integration_test -- --ignored
async fn test_full_workflow_run() {
    let client = reqwest::Client::new();

    // Step 1: Registered workflows
    let body: Value = client
        .get(format!("{}/workflows/list", API_BASE_URL))
        .send()
        .await
        .expect("Failed to list workflows")
        .json()
        .await
        .expect("Failed to parse workflow list");
    assert!(body["workflows"]
        .as_array()
        .unwrap()
        .contains(&json!("weekly_review")));

    // Step 2: Execute
    let response = client
        .post(format!("{}/workflows/execute", API_BASE_URL))
        .json(&json!({
            "workflow_name": "weekly_review",
            "params": {"channel": "#ops", "manager_email": "lead@example.com"}
        }))
        .send()
        .await
        .expect("Failed to execute workflow");
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.expect("Failed to parse summary");
    let summary = &body["summary"];
    assert_eq!(summary["executions"].as_array().unwrap().len(), 3);
    let run_id = summary["run_id"].as_i64().expect("run id missing");

    // Step 3: The run is recorded
    let run: RunRecord = client
        .get(format!("{}/workflows/logs/{}", API_BASE_URL, run_id))
        .send()
        .await
        .expect("Failed to get run")
        .json()
        .await
        .expect("Failed to parse run");
    assert_eq!(run.status, RunStatus::Success);
    assert_eq!(run.executions().len(), 3);

    // Step 4: Unknown workflow
    let response = client
        .post(format!("{}/workflows/execute", API_BASE_URL))
        .json(&json!({"workflow_name": "does_not_exist"}))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 404);
}

#[tokio::test]
#[ignore]
async fn test_task_status_flow() {
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/tasks", API_BASE_URL))
        .json(&json!({"source": "notion", "title": "Integration task"}))
        .send()
        .await
        .expect("Failed to create task");
    assert_eq!(response.status(), 201);
    let task: Task = response.json().await.expect("Failed to parse task");
    assert_eq!(task.status, TaskStatus::Open);

    let updated: Task = client
        .patch(format!("{}/tasks/{}/status", API_BASE_URL, task.id))
        .json(&json!({"status": "done"}))
        .send()
        .await
        .expect("Failed to update task")
        .json()
        .await
        .expect("Failed to parse task");
    assert_eq!(updated.status, TaskStatus::Done);

    let overview: Value = client
        .get(format!("{}/analytics/overview", API_BASE_URL))
        .send()
        .await
        .expect("Failed to load overview")
        .json()
        .await
        .expect("Failed to parse overview");
    assert!(overview["average_response_time"].as_f64().is_some());
}
