use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use task_core::batch::{BatchRequest, FieldUpdate, ModifyFields, MutationKind, TaskIdentifier};
use task_core::config::ConfigOverrides;
use task_core::model::FilterCriteria;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Output JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Override configuration values (format KEY=VALUE)
    #[arg(long = "config-override", value_name = "KEY=VALUE", global = true)]
    pub config_override: Vec<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Mark tasks as completed
    ///
    /// Example: taskbatch complete 1 2 3
    /// Example: taskbatch complete --project Work --tag q4
    Complete(TargetArgs),
    /// Move completed tasks back to pending
    ///
    /// Example: taskbatch uncomplete 6f1c2d2e-1b7e-4c55-9a52-0f0d5a9a1c01
    Uncomplete(TargetArgs),
    /// Delete tasks
    ///
    /// Example: taskbatch delete --status pending --tag obsolete
    Delete(TargetArgs),
    /// Start tasks
    ///
    /// Example: taskbatch start 4
    Start(TargetArgs),
    /// Stop active tasks
    ///
    /// Example: taskbatch stop 4
    Stop(TargetArgs),
    /// Change project, priority, due date or tags
    ///
    /// Example: taskbatch modify --project Work --set-priority H --add-tag q4
    /// Example: taskbatch modify 1 2 --set-due "" (clears the due date)
    Modify {
        #[command(flatten)]
        target: TargetArgs,
        #[command(flatten)]
        fields: ModifyArgs,
    },
    /// Run a JSON batch request from a file, or stdin when no file is given
    ///
    /// Example: taskbatch run request.json
    Run { file: Option<PathBuf> },
    /// Show the tasks a filter selects without changing them
    ///
    /// Example: taskbatch list --project Work --due-before 2025-12-31
    List {
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Permanently remove deleted tasks
    ///
    /// Example: taskbatch purge
    Purge,
}

#[derive(Args, Debug, Default, Clone)]
pub struct FilterArgs {
    /// Only tasks with this status
    #[arg(long)]
    pub status: Option<String>,
    /// Only tasks in this project
    #[arg(long)]
    pub project: Option<String>,
    /// Tasks carrying any of these tags
    #[arg(long = "tag", value_name = "TAG")]
    pub tags: Vec<String>,
    /// H, M, L or none
    #[arg(long)]
    pub priority: Option<String>,
    #[arg(long)]
    pub description_contains: Option<String>,
    #[arg(long)]
    pub due_before: Option<String>,
    #[arg(long)]
    pub due_after: Option<String>,
    /// Stop after this many matches
    #[arg(long)]
    pub limit: Option<usize>,
}

impl FilterArgs {
    pub fn is_empty(&self) -> bool {
        self.to_criteria() == FilterCriteria::default()
    }

    pub fn to_criteria(&self) -> FilterCriteria {
        FilterCriteria {
            status: self.status.clone(),
            project: self.project.clone(),
            tags: self.tags.clone(),
            priority: self.priority.clone(),
            description_contains: self.description_contains.clone(),
            due_before: self.due_before.clone(),
            due_after: self.due_after.clone(),
            limit: self.limit,
        }
    }
}

#[derive(Args, Debug, Default, Clone)]
pub struct TargetArgs {
    /// Task ids or uuids
    pub ids: Vec<String>,

    #[command(flatten)]
    pub filter: FilterArgs,
}

#[derive(Args, Debug, Default, Clone)]
pub struct ModifyArgs {
    /// New project; an empty value clears it
    #[arg(long, value_name = "PROJECT")]
    pub set_project: Option<String>,
    /// New priority (H, M, L); an empty value or "none" clears it
    #[arg(long, value_name = "PRIORITY")]
    pub set_priority: Option<String>,
    /// New due date; an empty value clears it
    #[arg(long, value_name = "DATE")]
    pub set_due: Option<String>,
    #[arg(long = "add-tag", value_name = "TAG")]
    pub add_tags: Vec<String>,
    #[arg(long = "remove-tag", value_name = "TAG")]
    pub remove_tags: Vec<String>,
}

impl ModifyArgs {
    pub fn to_fields(&self) -> ModifyFields {
        ModifyFields {
            project: flag_update(self.set_project.as_deref()),
            priority: flag_update(self.set_priority.as_deref()),
            due: flag_update(self.set_due.as_deref()),
            add_tags: self.add_tags.clone(),
            remove_tags: self.remove_tags.clone(),
        }
    }
}

fn flag_update(value: Option<&str>) -> FieldUpdate {
    match value {
        None => FieldUpdate::Keep,
        Some(value) => FieldUpdate::from_option(Some(value.to_string())),
    }
}

/// Builds the request a mutation subcommand stands for. Shape errors (no
/// target, both targets) are left to the request validation.
pub fn build_request(
    kind: MutationKind,
    target: &TargetArgs,
    fields: Option<&ModifyArgs>,
) -> BatchRequest {
    let mut request = BatchRequest::new(kind);
    if !target.ids.is_empty() {
        request.task_ids = Some(
            target
                .ids
                .iter()
                .map(|id| TaskIdentifier::Text(id.clone()))
                .collect(),
        );
    }
    if !target.filter.is_empty() {
        request.filters = Some(target.filter.to_criteria());
    }
    request.modify_fields = fields.map(ModifyArgs::to_fields);
    request
}

/// Flag name used to identify config override arguments by the runtime.
pub const CONFIG_OVERRIDE_FLAG: &str = "--config-override";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigOverrideTarget {
    Backend,
    StorePath,
    TaskCommand,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedConfigOverride {
    pub target: ConfigOverrideTarget,
    pub value: String,
}

/// Parse a raw `KEY=VALUE` override string into a structured target.
pub fn parse_config_override(raw: &str) -> Result<ParsedConfigOverride, String> {
    let trimmed = raw.trim();
    let (key_raw, value_raw) = trimmed
        .split_once('=')
        .ok_or_else(|| "override must be in KEY=VALUE format".to_string())?;

    let value = value_raw.trim().to_string();
    let canonical_field =
        canonicalize_flag_name(key_raw).ok_or_else(|| "override key cannot be empty".to_string())?;

    let target = match canonical_field.as_str() {
        "backend" => ConfigOverrideTarget::Backend,
        "store_path" | "store" => ConfigOverrideTarget::StorePath,
        "task_command" | "command" => ConfigOverrideTarget::TaskCommand,
        other => return Err(format!("unknown config field '{other}'")),
    };

    if value.is_empty() {
        return Err(format!("{CONFIG_OVERRIDE_FLAG} {canonical_field} needs a value"));
    }

    Ok(ParsedConfigOverride { target, value })
}

/// Folds every `--config-override` value into one set of overrides; later
/// values win.
pub fn collect_config_overrides(raw: &[String]) -> Result<ConfigOverrides, String> {
    let mut overrides = ConfigOverrides::default();
    for entry in raw {
        let parsed = parse_config_override(entry)?;
        match parsed.target {
            ConfigOverrideTarget::Backend => overrides.backend = Some(parsed.value),
            ConfigOverrideTarget::StorePath => overrides.store_path = Some(parsed.value),
            ConfigOverrideTarget::TaskCommand => overrides.task_command = Some(parsed.value),
        }
    }
    Ok(overrides)
}

fn canonicalize_flag_name(name: &str) -> Option<String> {
    let mut cleaned = String::new();
    let mut previous_underscore = false;

    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            cleaned.push(ch.to_ascii_lowercase());
            previous_underscore = false;
        } else if !previous_underscore && !cleaned.is_empty() {
            cleaned.push('_');
            previous_underscore = true;
        }
    }

    let trimmed = cleaned.trim_matches('_');
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::{
        Cli, Command, ConfigOverrideTarget, build_request, collect_config_overrides,
        parse_config_override,
    };
    use clap::Parser;
    use task_core::batch::{FieldUpdate, MutationKind, TaskIdentifier};

    #[test]
    fn parse_config_override_canonicalizes_field_names() {
        let parsed = parse_config_override(" Store-Path = /tmp/tasks.json ").unwrap();

        assert_eq!(parsed.target, ConfigOverrideTarget::StorePath);
        assert_eq!(parsed.value, "/tmp/tasks.json");
    }

    #[test]
    fn parse_config_override_rejects_unknown_fields() {
        let err = parse_config_override("theme=midnight").unwrap_err();
        assert!(err.contains("unknown config field"));
    }

    #[test]
    fn parse_config_override_rejects_missing_equals() {
        let err = parse_config_override("backend").unwrap_err();
        assert!(err.contains("KEY=VALUE"));
    }

    #[test]
    fn parse_config_override_rejects_empty_value() {
        let err = parse_config_override("task_command=").unwrap_err();
        assert!(err.contains("needs a value"));
    }

    #[test]
    fn later_overrides_win() {
        let overrides = collect_config_overrides(&[
            "backend=json".to_string(),
            "backend=taskwarrior".to_string(),
            "command=/opt/task".to_string(),
        ])
        .unwrap();

        assert_eq!(overrides.backend.as_deref(), Some("taskwarrior"));
        assert_eq!(overrides.task_command.as_deref(), Some("/opt/task"));
        assert_eq!(overrides.store_path, None);
    }

    #[test]
    fn ids_become_text_identifiers() {
        let cli = Cli::try_parse_from(["taskbatch", "complete", "1", "2"]).unwrap();
        let Command::Complete(target) = cli.command else {
            panic!("expected complete");
        };

        let request = build_request(MutationKind::Complete, &target, None);

        assert_eq!(
            request.task_ids,
            Some(vec![
                TaskIdentifier::Text("1".to_string()),
                TaskIdentifier::Text("2".to_string())
            ])
        );
        assert_eq!(request.filters, None);
    }

    #[test]
    fn filter_flags_become_criteria() {
        let cli = Cli::try_parse_from([
            "taskbatch", "delete", "--project", "Work", "--tag", "a", "--tag", "b", "--limit", "5",
        ])
        .unwrap();
        let Command::Delete(target) = cli.command else {
            panic!("expected delete");
        };

        let request = build_request(MutationKind::Delete, &target, None);
        let filters = request.filters.unwrap();

        assert_eq!(filters.project.as_deref(), Some("Work"));
        assert_eq!(filters.tags, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(filters.limit, Some(5));
        assert_eq!(request.task_ids, None);
    }

    #[test]
    fn modify_flags_distinguish_keep_clear_and_set() {
        let cli = Cli::try_parse_from([
            "taskbatch",
            "modify",
            "1",
            "--set-project",
            "",
            "--set-priority",
            "none",
            "--set-due",
            "2025-12-31",
            "--add-tag",
            "q4",
        ])
        .unwrap();
        let Command::Modify { target, fields } = cli.command else {
            panic!("expected modify");
        };

        let request = build_request(MutationKind::Modify, &target, Some(&fields));
        let fields = request.modify_fields.unwrap();

        assert_eq!(fields.project, FieldUpdate::Clear);
        assert_eq!(fields.priority, FieldUpdate::Set("none".to_string()));
        assert_eq!(fields.due, FieldUpdate::Set("2025-12-31".to_string()));
        assert_eq!(fields.add_tags, vec!["q4".to_string()]);
        assert!(fields.remove_tags.is_empty());
    }

    #[test]
    fn modify_without_value_flags_keeps_fields() {
        let cli = Cli::try_parse_from(["taskbatch", "modify", "1", "--add-tag", "x"]).unwrap();
        let Command::Modify { target, fields } = cli.command else {
            panic!("expected modify");
        };

        let fields = build_request(MutationKind::Modify, &target, Some(&fields))
            .modify_fields
            .unwrap();

        assert_eq!(fields.project, FieldUpdate::Keep);
        assert_eq!(fields.due, FieldUpdate::Keep);
    }
}
