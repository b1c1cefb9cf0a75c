//! Gateway over the TaskWarrior command line.
//!
//! Reads go through `task <filter> export`, writes through `task import`.
//! The export format is converted into [`Task`] here and nowhere else.

use crate::batch::MutationKind;
use crate::error::AppError;
use crate::model::timestamp::{format_compact, format_timestamp, parse_compact, parse_timestamp};
use crate::model::{Annotation, Priority, StatusScope, Task, TaskStatus};
use crate::storage::{TaskGateway, TaskRef, check_transition};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::io::Write;
use std::process::{Command, Output, Stdio};
use tracing::debug;

pub const DEFAULT_COMMAND: &str = "task";

const BASE_ARGS: [&str; 3] = ["rc.confirmation=off", "rc.verbose=nothing", "rc.json.array=on"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExternalAnnotation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry: Option<String>,
    pub description: String,
}

/// One record as printed by `task export`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExternalTask {
    #[serde(default, skip_serializing)]
    pub id: Option<u32>,
    pub uuid: String,
    #[serde(default)]
    pub description: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(
        default,
        deserialize_with = "list_or_csv",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub until: Option<String>,
    #[serde(default, skip_serializing)]
    pub urgency: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<ExternalAnnotation>,
    #[serde(
        default,
        deserialize_with = "list_or_csv",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub depends: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recur: Option<String>,
    /// Attributes not modelled above (`scheduled`, `parent`, `mask`, UDAs).
    /// `task import` replaces the whole record, so these travel back as-is.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// Older TaskWarrior releases export `depends` (and occasionally `tags`) as a
// comma separated string instead of an array.
fn list_or_csv<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum ListOrCsv {
        List(Vec<String>),
        Csv(String),
    }

    Ok(match Option::<ListOrCsv>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(ListOrCsv::List(items)) => items,
        Some(ListOrCsv::Csv(raw)) => raw
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect(),
    })
}

fn from_compact(value: Option<String>) -> Result<Option<String>, AppError> {
    value
        .map(|raw| format_timestamp(parse_compact(&raw)?))
        .transpose()
}

fn to_compact(value: &Option<String>) -> Result<Option<String>, AppError> {
    value
        .as_deref()
        .map(|raw| format_compact(parse_timestamp(raw)?))
        .transpose()
}

impl TryFrom<ExternalTask> for Task {
    type Error = AppError;

    fn try_from(external: ExternalTask) -> Result<Self, Self::Error> {
        let status = external
            .status
            .parse::<TaskStatus>()
            .map_err(|err| AppError::invalid_data(err.message().to_string()))?;
        let priority = match external.priority.as_deref() {
            None | Some("") => None,
            Some(raw) => Some(
                raw.parse::<Priority>()
                    .map_err(|err| AppError::invalid_data(err.message().to_string()))?,
            ),
        };
        let annotations = external
            .annotations
            .into_iter()
            .map(|annotation| {
                Ok(Annotation {
                    entry: from_compact(annotation.entry)?,
                    description: annotation.description,
                })
            })
            .collect::<Result<Vec<_>, AppError>>()?;

        Ok(Task {
            id: external.id.filter(|id| *id != 0),
            uuid: external.uuid,
            description: external.description,
            status,
            project: external.project,
            priority,
            tags: external.tags.into_iter().collect(),
            entry: from_compact(external.entry)?,
            modified: from_compact(external.modified)?,
            due: from_compact(external.due)?,
            start: from_compact(external.start)?,
            end: from_compact(external.end)?,
            wait: from_compact(external.wait)?,
            until: from_compact(external.until)?,
            urgency: external.urgency,
            annotations,
            depends: external.depends.into_iter().collect::<BTreeSet<_>>(),
            recur: external.recur,
        })
    }
}

impl TryFrom<&Task> for ExternalTask {
    type Error = AppError;

    fn try_from(task: &Task) -> Result<Self, Self::Error> {
        let annotations = task
            .annotations
            .iter()
            .map(|annotation| {
                Ok(ExternalAnnotation {
                    entry: to_compact(&annotation.entry)?,
                    description: annotation.description.clone(),
                })
            })
            .collect::<Result<Vec<_>, AppError>>()?;

        Ok(ExternalTask {
            id: task.id,
            uuid: task.uuid.clone(),
            description: task.description.clone(),
            status: task.status.as_str().to_string(),
            project: task.project.clone(),
            priority: task.priority.map(|priority| priority.as_str().to_string()),
            tags: task.tags.iter().cloned().collect(),
            entry: to_compact(&task.entry)?,
            modified: to_compact(&task.modified)?,
            due: to_compact(&task.due)?,
            start: to_compact(&task.start)?,
            end: to_compact(&task.end)?,
            wait: to_compact(&task.wait)?,
            until: to_compact(&task.until)?,
            urgency: task.urgency,
            annotations,
            depends: task.depends.iter().cloned().collect(),
            recur: task.recur.clone(),
            extra: Map::new(),
        })
    }
}

/// Parses the output of `task export`.
pub fn parse_export(raw: &str) -> Result<Vec<Task>, AppError> {
    parse_external(raw)?
        .into_iter()
        .map(Task::try_from)
        .collect()
}

fn parse_external(raw: &str) -> Result<Vec<ExternalTask>, AppError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_str(trimmed)?)
}

#[derive(Debug, Clone)]
pub struct TaskwarriorCli {
    command: String,
}

impl TaskwarriorCli {
    pub fn new<C: Into<String>>(command: C) -> Self {
        Self {
            command: command.into(),
        }
    }

    fn run(&self, args: &[String], stdin: Option<&str>) -> Result<Output, AppError> {
        debug!(command = %self.command, ?args, "running task command");
        let mut child = Command::new(&self.command)
            .args(BASE_ARGS)
            .args(args)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| AppError::unavailable(format!("{}: {}", self.command, err)))?;

        if let Some(input) = stdin
            && let Some(mut pipe) = child.stdin.take()
            && let Err(err) = pipe.write_all(input.as_bytes())
        {
            drop(pipe);
            child.kill().ok();
            child.wait().ok();
            return Err(AppError::io(err.to_string()));
        }

        child
            .wait_with_output()
            .map_err(|err| AppError::io(err.to_string()))
    }

    fn export_raw(&self, filter: Vec<String>) -> Result<Vec<ExternalTask>, AppError> {
        let mut args = filter;
        args.push("export".to_string());
        let output = self.run(&args, None)?;
        if !output.status.success() {
            return Err(AppError::io(stderr_message(&output)));
        }
        parse_external(&String::from_utf8_lossy(&output.stdout))
    }

    fn export(&self, filter: Vec<String>) -> Result<Vec<Task>, AppError> {
        self.export_raw(filter)?
            .into_iter()
            .map(Task::try_from)
            .collect()
    }

    fn find_external(&self, uuid: &str) -> Result<Option<ExternalTask>, AppError> {
        Ok(self
            .export_raw(vec![format!("uuid:{uuid}")])?
            .into_iter()
            .find(|external| external.uuid.eq_ignore_ascii_case(uuid)))
    }

    fn find_uuid(&self, uuid: &str) -> Result<Option<Task>, AppError> {
        Ok(self
            .export(vec![format!("uuid:{uuid}")])?
            .into_iter()
            .next())
    }
}

fn stderr_message(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    if stderr.is_empty() {
        format!("task exited with {}", output.status)
    } else {
        stderr
    }
}

impl TaskGateway for TaskwarriorCli {
    fn get_by_id(&self, target: &TaskRef) -> Result<Option<Task>, AppError> {
        match target {
            TaskRef::Id(id) => Ok(self
                .export(vec![id.to_string()])?
                .into_iter()
                .find(|task| target.matches(task))),
            TaskRef::Uuid(uuid) => self.find_uuid(uuid),
        }
    }

    fn get_all(&self, scope: StatusScope) -> Result<Vec<Task>, AppError> {
        let filter = match scope {
            StatusScope::All => Vec::new(),
            StatusScope::Only(status) => vec![format!("status:{status}")],
        };
        Ok(self
            .export(filter)?
            .into_iter()
            .filter(|task| scope.includes(task.status))
            .collect())
    }

    fn save(&self, task: &Task, mutation: MutationKind) -> Result<Task, AppError> {
        let stored_external = self
            .find_external(&task.uuid)?
            .ok_or_else(|| AppError::not_found("task not found"))?;
        let stored = Task::try_from(stored_external.clone())?;
        check_transition(&stored, mutation)?;

        let mut record = ExternalTask::try_from(task)?;
        record.extra = stored_external.extra;
        let payload = serde_json::to_string(&[record])?;
        let output = self.run(&["import".to_string()], Some(&payload))?;
        if !output.status.success() {
            return Err(AppError::rejected(stderr_message(&output)));
        }

        Ok(self.find_uuid(&task.uuid)?.unwrap_or_else(|| task.clone()))
    }

    fn purge(&self) -> Result<usize, AppError> {
        let deleted = self.get_all(StatusScope::Only(TaskStatus::Deleted))?.len();
        if deleted == 0 {
            return Ok(0);
        }

        let output = self.run(&["status:deleted".to_string(), "purge".to_string()], None)?;
        if !output.status.success() {
            return Err(AppError::io(stderr_message(&output)));
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::{ExternalTask, TaskwarriorCli, parse_export};
    use crate::batch::{Mutation, MutationKind};
    use crate::model::{Priority, StatusScope, Task, TaskStatus};
    use crate::storage::{TaskGateway, TaskRef};
    use time::macros::datetime;

    const EXPORT: &str = r#"[
        {
            "id": 1,
            "description": "Write report",
            "entry": "20251201T080000Z",
            "modified": "20251202T080000Z",
            "status": "pending",
            "uuid": "6f1c2d2e-1b7e-4c55-9a52-0f0d5a9a1c01",
            "project": "Work.Reports",
            "priority": "H",
            "tags": ["office", "q4"],
            "due": "20251221T090000Z",
            "urgency": 12.4,
            "annotations": [{"entry": "20251201T081500Z", "description": "draft in drive"}],
            "depends": "1b9f3c4a-5d6e-4f70-8a91-b2c3d4e5f607,2a8e4b5c-6d7f-4081-9b12-c3d4e5f60718"
        },
        {
            "id": 0,
            "description": "Old chore",
            "entry": "20251101T080000Z",
            "end": "20251105T080000Z",
            "status": "completed",
            "uuid": "1b9f3c4a-5d6e-4f70-8a91-b2c3d4e5f607",
            "urgency": 0
        }
    ]"#;

    #[test]
    fn parse_export_converts_fields() {
        let tasks = parse_export(EXPORT).unwrap();

        assert_eq!(tasks.len(), 2);
        let report = &tasks[0];
        assert_eq!(report.id, Some(1));
        assert_eq!(report.project.as_deref(), Some("Work.Reports"));
        assert_eq!(report.priority, Some(Priority::H));
        assert!(report.tags.contains("q4"));
        assert_eq!(report.due.as_deref(), Some("2025-12-21T09:00:00Z"));
        assert_eq!(report.urgency, 12.4);
        assert_eq!(
            report.annotations[0].entry.as_deref(),
            Some("2025-12-01T08:15:00Z")
        );
        assert_eq!(report.depends.len(), 2);

        let chore = &tasks[1];
        assert_eq!(chore.id, None);
        assert_eq!(chore.status, TaskStatus::Completed);
        assert_eq!(chore.end.as_deref(), Some("2025-11-05T08:00:00Z"));
    }

    #[test]
    fn parse_export_accepts_empty_output() {
        assert!(parse_export("").unwrap().is_empty());
        assert!(parse_export("[]").unwrap().is_empty());
    }

    #[test]
    fn parse_export_rejects_unknown_status() {
        let err = parse_export(r#"[{"uuid": "u-1", "status": "archived"}]"#).unwrap_err();
        assert_eq!(err.code(), "invalid_data");
    }

    #[test]
    fn external_conversion_restores_compact_timestamps() {
        let mut task = Task::new("6f1c2d2e-1b7e-4c55-9a52-0f0d5a9a1c01", "demo");
        task.id = Some(7);
        task.due = Some("2025-12-21T09:00:00Z".to_string());
        task.tags.insert("home".to_string());

        let external = ExternalTask::try_from(&task).unwrap();
        let json = serde_json::to_value(&external).unwrap();

        assert_eq!(json["due"], "20251221T090000Z");
        assert_eq!(json["status"], "pending");
        assert_eq!(json["tags"], serde_json::json!(["home"]));
        assert!(json.get("id").is_none());
        assert!(json.get("urgency").is_none());
        assert!(json.get("project").is_none());
    }

    #[test]
    fn missing_binary_is_unavailable() {
        let gateway = TaskwarriorCli::new("/nonexistent/taskbatch-test/task");

        let err = gateway.get_all(StatusScope::All).unwrap_err();
        assert_eq!(err.code(), "unavailable");
        let err = gateway.get_by_id(&TaskRef::Id(1)).unwrap_err();
        assert!(err.is_unavailable());
    }

    #[cfg(unix)]
    const FAKE_TASK: &str = r#"#!/bin/sh
dir=$(dirname "$0")
for arg in "$@"; do
  case "$arg" in
    import)
      if [ -f "$dir/deaf" ]; then
        exit 0
      fi
      cat > "$dir/import.json"
      if [ -f "$dir/reject" ]; then
        echo "import refused" >&2
        exit 1
      fi
      exit 0
      ;;
    purge)
      echo "$@" > "$dir/purge.args"
      exit 0
      ;;
  esac
done
cat "$dir/export.json"
"#;

    /// Installs a shell stand-in for `task` that prints `export_json`, records
    /// whatever `import` receives in `import.json`, and logs `purge` arguments.
    #[cfg(unix)]
    fn fake_task(name: &str, export_json: &str) -> (std::path::PathBuf, TaskwarriorCli) {
        use std::os::unix::fs::PermissionsExt;
        use std::time::{SystemTime, UNIX_EPOCH};

        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let dir = std::env::temp_dir().join(format!("taskbatch-{nanos}-{name}"));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("export.json"), export_json).unwrap();
        let script = dir.join("task");
        std::fs::write(&script, FAKE_TASK).unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let gateway = TaskwarriorCli::new(script.to_string_lossy().to_string());
        (dir, gateway)
    }

    #[cfg(unix)]
    #[test]
    fn export_runs_through_the_command() {
        let (dir, gateway) = fake_task("fake-task-export", EXPORT);

        let pending = gateway
            .get_all(StatusScope::Only(TaskStatus::Pending))
            .unwrap();
        let by_id = gateway.get_by_id(&TaskRef::Id(1)).unwrap();
        std::fs::remove_dir_all(&dir).ok();

        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].description, "Write report");
        assert_eq!(by_id.map(|task| task.id), Some(Some(1)));
    }

    #[cfg(unix)]
    #[test]
    fn save_keeps_attributes_outside_the_model() {
        let export = r#"[{
            "id": 3,
            "uuid": "6f1c2d2e-1b7e-4c55-9a52-0f0d5a9a1c01",
            "description": "weekly review",
            "status": "pending",
            "entry": "20251201T080000Z",
            "scheduled": "20251220T090000Z",
            "parent": "2a8e4b5c-6d7f-4081-9b12-c3d4e5f60718",
            "imask": 3,
            "estimate": "2h",
            "urgency": 4.2
        }]"#;
        let (dir, gateway) = fake_task("fake-task-save", export);

        let stored = gateway
            .get_by_id(&TaskRef::Uuid(
                "6f1c2d2e-1b7e-4c55-9a52-0f0d5a9a1c01".to_string(),
            ))
            .unwrap()
            .unwrap();
        let started = Mutation::Start
            .apply(&stored, datetime!(2025-12-21 09:00:00 UTC))
            .unwrap();
        gateway.save(&started, MutationKind::Start).unwrap();
        let imported = std::fs::read_to_string(dir.join("import.json")).unwrap();
        std::fs::remove_dir_all(&dir).ok();

        let records: serde_json::Value = serde_json::from_str(&imported).unwrap();
        let record = &records[0];
        assert_eq!(record["scheduled"], "20251220T090000Z");
        assert_eq!(record["parent"], "2a8e4b5c-6d7f-4081-9b12-c3d4e5f60718");
        assert_eq!(record["imask"], 3);
        assert_eq!(record["estimate"], "2h");
        assert_eq!(record["start"], "20251221T090000Z");
        assert_eq!(record["description"], "weekly review");
        assert!(record.get("id").is_none());
        assert!(record.get("urgency").is_none());
    }

    #[cfg(unix)]
    #[test]
    fn save_rejects_a_conflicting_transition_without_importing() {
        let export = r#"[{
            "uuid": "6f1c2d2e-1b7e-4c55-9a52-0f0d5a9a1c01",
            "description": "gone",
            "status": "deleted",
            "end": "20251220T090000Z"
        }]"#;
        let (dir, gateway) = fake_task("fake-task-conflict", export);

        let mut task = Task::new("6f1c2d2e-1b7e-4c55-9a52-0f0d5a9a1c01", "gone");
        task.status = TaskStatus::Completed;
        let err = gateway.save(&task, MutationKind::Complete).unwrap_err();
        let imported = dir.join("import.json").exists();
        std::fs::remove_dir_all(&dir).ok();

        assert_eq!(err.code(), "rejected");
        assert!(!imported);
    }

    #[cfg(unix)]
    #[test]
    fn failed_import_is_rejected_with_stderr() {
        let export = r#"[{
            "id": 1,
            "uuid": "6f1c2d2e-1b7e-4c55-9a52-0f0d5a9a1c01",
            "description": "write report",
            "status": "pending"
        }]"#;
        let (dir, gateway) = fake_task("fake-task-refused", export);
        std::fs::write(dir.join("reject"), "").unwrap();

        let mut task = Task::new("6f1c2d2e-1b7e-4c55-9a52-0f0d5a9a1c01", "write report");
        task.status = TaskStatus::Completed;
        let err = gateway.save(&task, MutationKind::Complete).unwrap_err();
        std::fs::remove_dir_all(&dir).ok();

        assert_eq!(err.code(), "rejected");
        assert!(err.message().contains("import refused"));
    }

    #[cfg(unix)]
    #[test]
    fn import_that_closes_stdin_early_is_an_io_error() {
        let export = r#"[{
            "id": 1,
            "uuid": "6f1c2d2e-1b7e-4c55-9a52-0f0d5a9a1c01",
            "description": "write report",
            "status": "pending"
        }]"#;
        let (dir, gateway) = fake_task("fake-task-deaf", export);
        std::fs::write(dir.join("deaf"), "").unwrap();

        // Larger than a pipe buffer, so the write fails once the child exits.
        let mut task = Task::new(
            "6f1c2d2e-1b7e-4c55-9a52-0f0d5a9a1c01",
            "x".repeat(512 * 1024),
        );
        task.status = TaskStatus::Completed;
        let err = gateway.save(&task, MutationKind::Complete).unwrap_err();
        let imported = dir.join("import.json").exists();
        std::fs::remove_dir_all(&dir).ok();

        assert_eq!(err.code(), "io_error");
        assert!(!imported);
    }

    #[cfg(unix)]
    #[test]
    fn purge_counts_deleted_tasks_and_runs_purge() {
        let export = r#"[
            {"uuid": "6f1c2d2e-1b7e-4c55-9a52-0f0d5a9a1c01", "description": "a", "status": "deleted"},
            {"uuid": "6f1c2d2e-1b7e-4c55-9a52-0f0d5a9a1c02", "description": "b", "status": "deleted"},
            {"id": 1, "uuid": "6f1c2d2e-1b7e-4c55-9a52-0f0d5a9a1c03", "description": "c", "status": "pending"}
        ]"#;
        let (dir, gateway) = fake_task("fake-task-purge", export);

        let purged = gateway.purge().unwrap();
        let args = std::fs::read_to_string(dir.join("purge.args")).unwrap();
        std::fs::remove_dir_all(&dir).ok();

        assert_eq!(purged, 2);
        assert!(args.contains("status:deleted"));
        assert!(args.contains("purge"));
    }

    #[cfg(unix)]
    #[test]
    fn purge_skips_the_command_when_nothing_is_deleted() {
        let (dir, gateway) = fake_task("fake-task-purge-empty", EXPORT);

        let purged = gateway.purge().unwrap();
        let ran = dir.join("purge.args").exists();
        std::fs::remove_dir_all(&dir).ok();

        assert_eq!(purged, 0);
        assert!(!ran);
    }
}
