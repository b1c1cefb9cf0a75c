use clap::Parser;
use std::io::{self, Read};
use std::path::Path;
use tabled::settings::Style;
use tabled::{Table, Tabled};
use task_cli::cli::{Cli, Command, build_request, collect_config_overrides};
use task_core::batch::{BatchRequest, MutationKind};
use task_core::error::AppError;
use task_core::model::Task;
use task_core::report::BatchReport;
use task_core::task_api;
use tracing_subscriber::{EnvFilter, fmt};

const LOG_ENV_VAR: &str = "TASKBATCH_LOG";
const EXIT_PARTIAL_FAILURE: i32 = 2;

#[derive(Tabled)]
struct TaskRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "UUID")]
    uuid: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Project")]
    project: String,
    #[tabled(rename = "Pri")]
    priority: String,
    #[tabled(rename = "Tags")]
    tags: String,
    #[tabled(rename = "Due")]
    due: String,
    #[tabled(rename = "Description")]
    description: String,
}

impl From<&Task> for TaskRow {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id.map(|id| id.to_string()).unwrap_or_else(|| "-".into()),
            uuid: task.uuid.clone(),
            status: task.status.to_string(),
            project: task.project.clone().unwrap_or_else(|| "-".into()),
            priority: task
                .priority
                .map(|priority| priority.to_string())
                .unwrap_or_else(|| "-".into()),
            tags: task.tags.iter().cloned().collect::<Vec<_>>().join(","),
            due: task.due.clone().unwrap_or_else(|| "-".into()),
            description: task.description.clone(),
        }
    }
}

#[derive(Tabled)]
struct ResultRow {
    #[tabled(rename = "Target")]
    target: String,
    #[tabled(rename = "Outcome")]
    outcome: String,
    #[tabled(rename = "Detail")]
    detail: String,
}

fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new("warn"));
    let subscriber = fmt()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .with_target(false);

    if let Err(err) = subscriber.try_init() {
        eprintln!("WARN: failed to init logging: {err}");
    }
}

fn print_tasks_plain(tasks: &[Task]) {
    if tasks.is_empty() {
        println!("No matching tasks");
        return;
    }

    let rows: Vec<TaskRow> = tasks.iter().map(TaskRow::from).collect();
    let mut table = Table::new(rows);
    table.with(Style::sharp());
    println!("{table}");
}

fn print_tasks_json(tasks: &[Task]) -> Result<(), AppError> {
    println!("{}", serde_json::to_string_pretty(tasks)?);
    Ok(())
}

fn print_report_plain(report: &BatchReport) {
    if !report.results.is_empty() {
        let rows: Vec<ResultRow> = report
            .results
            .iter()
            .map(|item| {
                let detail = [item.reason.as_deref(), item.warning.as_deref()]
                    .into_iter()
                    .flatten()
                    .collect::<Vec<_>>()
                    .join("; ");
                ResultRow {
                    target: item.identifier.clone(),
                    outcome: item.outcome.to_string(),
                    detail,
                }
            })
            .collect();
        let mut table = Table::new(rows);
        table.with(Style::sharp());
        println!("{table}");
    }

    println!(
        "{}: {} attempted, {} succeeded, {} failed",
        report.mutation,
        report.counts.attempted,
        report.counts.succeeded,
        report.counts.failed
    );
}

fn print_report_json(report: &BatchReport) -> Result<(), AppError> {
    println!("{}", report.to_json()?);
    Ok(())
}

fn exit_code(report: &BatchReport) -> i32 {
    if report.success { 0 } else { EXIT_PARTIAL_FAILURE }
}

fn read_request(file: Option<&Path>) -> Result<String, AppError> {
    match file {
        Some(path) => std::fs::read_to_string(path)
            .map_err(|err| AppError::io(format!("{}: {err}", path.display()))),
        None => {
            let mut raw = String::new();
            io::stdin()
                .read_to_string(&mut raw)
                .map_err(|err| AppError::io(err.to_string()))?;
            Ok(raw)
        }
    }
}

fn normalize_parse_error(err: clap::Error) -> AppError {
    let rendered = err.to_string();
    let first_line = rendered.lines().next().unwrap_or("invalid command").trim();
    let message = first_line
        .strip_prefix("error: ")
        .unwrap_or(first_line)
        .to_string();
    AppError::invalid_input(message)
}

fn run_command(cli: Cli) -> Result<i32, AppError> {
    let overrides =
        collect_config_overrides(&cli.config_override).map_err(AppError::invalid_input)?;

    let request = match cli.command {
        Command::Complete(target) => build_request(MutationKind::Complete, &target, None),
        Command::Uncomplete(target) => build_request(MutationKind::Uncomplete, &target, None),
        Command::Delete(target) => build_request(MutationKind::Delete, &target, None),
        Command::Start(target) => build_request(MutationKind::Start, &target, None),
        Command::Stop(target) => build_request(MutationKind::Stop, &target, None),
        Command::Modify { target, fields } => {
            build_request(MutationKind::Modify, &target, Some(&fields))
        }
        Command::Run { file } => {
            let raw = read_request(file.as_deref())?;
            let request = BatchRequest::from_json(&raw)?;
            let report = task_api::run_batch(&request, &overrides)?;
            print_report_json(&report)?;
            return Ok(exit_code(&report));
        }
        Command::List { filter } => {
            let tasks = task_api::list_matching(&filter.to_criteria(), &overrides)?;
            if cli.json {
                print_tasks_json(&tasks)?;
            } else {
                print_tasks_plain(&tasks);
            }
            return Ok(0);
        }
        Command::Purge => {
            let purged = task_api::purge_deleted(&overrides)?;
            if cli.json {
                println!("{}", serde_json::json!({ "purged": purged }));
            } else {
                println!("Purged {purged} deleted task(s)");
            }
            return Ok(0);
        }
    };

    let report = task_api::run_batch(&request, &overrides)?;
    if cli.json {
        print_report_json(&report)?;
    } else {
        print_report_plain(&report);
    }

    Ok(exit_code(&report))
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) if !err.use_stderr() => {
            // --help and --version land here.
            print!("{err}");
            return;
        }
        Err(err) => {
            eprintln!("ERROR: {}", normalize_parse_error(err));
            std::process::exit(1);
        }
    };

    init_tracing();

    match run_command(cli) {
        Ok(0) => {}
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("ERROR: {}", err);
            std::process::exit(1);
        }
    }
}
