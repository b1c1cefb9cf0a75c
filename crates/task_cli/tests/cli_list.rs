use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_path(file_name: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!("taskbatch-{nanos}-{file_name}"))
}

fn write_store(path: &Path) {
    let content = serde_json::json!({
        "schema_version": 1,
        "tasks": [
            {
                "id": 1,
                "uuid": "6f1c2d2e-1b7e-4c55-9a52-0f0d5a9a1c01",
                "description": "file taxes",
                "status": "pending",
                "project": "Home",
                "due": "2025-12-10T00:00:00Z"
            },
            {
                "id": 2,
                "uuid": "6f1c2d2e-1b7e-4c55-9a52-0f0d5a9a1c02",
                "description": "plan offsite",
                "status": "pending",
                "project": "Work",
                "priority": "H",
                "tags": ["q4"],
                "due": "2026-01-20T00:00:00Z"
            },
            {
                "uuid": "6f1c2d2e-1b7e-4c55-9a52-0f0d5a9a1c03",
                "description": "ship release",
                "status": "completed",
                "project": "Work"
            },
            {
                "id": 3,
                "uuid": "6f1c2d2e-1b7e-4c55-9a52-0f0d5a9a1c04",
                "description": "no due date",
                "status": "pending",
                "project": "Home"
            }
        ]
    });
    std::fs::write(path, serde_json::to_string_pretty(&content).unwrap()).unwrap();
}

fn taskbatch(store_path: &Path) -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_taskbatch"));
    command
        .env("TASKBATCH_STORE_PATH", store_path)
        .env("TASKBATCH_CONFIG_PATH", temp_path("no-config.json"));
    command
}

#[test]
fn list_json_filters_by_project_and_status() {
    let store_path = temp_path("cli-list-project.json");
    write_store(&store_path);

    let output = taskbatch(&store_path)
        .args(["--json", "list", "--project", "Work", "--status", "pending"])
        .output()
        .expect("failed to run list command");

    std::fs::remove_file(&store_path).ok();
    assert!(output.status.success());
    let parsed: serde_json::Value =
        serde_json::from_str(&String::from_utf8_lossy(&output.stdout)).expect("json output");
    let tasks = parsed.as_array().expect("json array");
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0]["description"], "plan offsite");
    assert_eq!(tasks[0]["priority"], "H");
}

#[test]
fn list_due_before_skips_tasks_without_due_date() {
    let store_path = temp_path("cli-list-due.json");
    write_store(&store_path);

    let output = taskbatch(&store_path)
        .args(["--json", "list", "--due-before", "2025-12-31"])
        .output()
        .expect("failed to run list command");

    std::fs::remove_file(&store_path).ok();
    assert!(output.status.success());
    let parsed: serde_json::Value =
        serde_json::from_str(&String::from_utf8_lossy(&output.stdout)).expect("json output");
    let descriptions: Vec<&str> = parsed
        .as_array()
        .unwrap()
        .iter()
        .map(|task| task["description"].as_str().unwrap())
        .collect();
    assert_eq!(descriptions, vec!["file taxes"]);
}

#[test]
fn list_plain_text_renders_a_table() {
    let store_path = temp_path("cli-list-plain.json");
    write_store(&store_path);

    let output = taskbatch(&store_path)
        .args(["list", "--tag", "q4"])
        .output()
        .expect("failed to run list command");

    std::fs::remove_file(&store_path).ok();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Description"));
    assert!(stdout.contains("plan offsite"));
    assert!(!stdout.contains("file taxes"));
}

#[test]
fn list_with_unknown_status_matches_nothing() {
    let store_path = temp_path("cli-list-bad-status.json");
    write_store(&store_path);

    let output = taskbatch(&store_path)
        .args(["list", "--status", "archived"])
        .output()
        .expect("failed to run list command");

    std::fs::remove_file(&store_path).ok();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("No matching tasks"));
}

#[test]
fn list_does_not_modify_the_store() {
    let store_path = temp_path("cli-list-readonly.json");
    write_store(&store_path);
    let before = std::fs::read_to_string(&store_path).unwrap();

    let output = taskbatch(&store_path)
        .args(["list", "--project", "Home"])
        .output()
        .expect("failed to run list command");

    let after = std::fs::read_to_string(&store_path).unwrap();
    std::fs::remove_file(&store_path).ok();
    assert!(output.status.success());
    assert_eq!(before, after);
}
