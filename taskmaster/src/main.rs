//! `taskmaster`: command-line client for a TaskMaster server.
//!
//! Every command runs against a fresh [`SyncController`]: it refreshes the
//! task list, performs the requested operation, and prints the result.
//! Configuration via CLI flags, environment variables, or config file
//! (`~/.config/taskmaster/config.toml`).
//!
//! ```bash
//! cargo run --bin taskmaster -- --token dev-token list --by-category
//! TASKMASTER_TOKEN=dev-token cargo run --bin taskmaster -- add "Buy milk" --priority high
//! ```

use std::path::Path;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_appender::non_blocking::WorkerGuard;

use taskmaster::config::{CliArgs, ClientConfig};
use taskmaster::remote::http::HttpTaskService;
use taskmaster::sync::SyncError;
use taskmaster::sync::controller::SyncController;
use taskmaster::sync::views::{self, StatusFilter};
use taskmaster_proto::task::{ListFilters, NewTask, Priority, Task, TaskId, TaskPatch, TaskStatus};

#[derive(Parser, Debug)]
#[command(version, about = "Command-line client for a TaskMaster server")]
struct Cli {
    #[command(flatten)]
    args: CliArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List tasks.
    List {
        /// Only tasks with this status (todo, in_progress, done, all).
        #[arg(long, default_value = "all")]
        status: StatusFilter,
        /// Only tasks with this priority (server-side filter).
        #[arg(long)]
        priority: Option<Priority>,
        /// Only tasks in this category id (server-side filter).
        #[arg(long)]
        category_id: Option<String>,
        /// Only tasks whose category name matches.
        #[arg(long)]
        category: Option<String>,
        /// Group the output by category.
        #[arg(long)]
        by_category: bool,
    },
    /// List categories.
    Categories,
    /// Show task counts per status and category.
    Stats,
    /// Create a task.
    Add {
        title: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        category_id: Option<String>,
        #[arg(long, default_value = "medium")]
        priority: Priority,
        /// Comma-separated tags.
        #[arg(long, value_delimiter = ',')]
        tags: Vec<String>,
    },
    /// Update fields of a task.
    Update {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        status: Option<TaskStatus>,
        #[arg(long)]
        priority: Option<Priority>,
        #[arg(long)]
        completion: Option<i64>,
        #[arg(long)]
        category_id: Option<String>,
    },
    /// Delete a task.
    Delete { id: String },
    /// Print suggested task titles.
    Suggest,
    /// Ask the assistant.
    Chat { message: String },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match ClientConfig::load(&cli.args) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Warning: failed to load config file: {e}");
            ClientConfig::default()
        }
    };

    let _log_guard = init_logging(&config.log_level, config.log_file.as_deref());
    tracing::info!(base_url = %config.base_url, "taskmaster starting");

    let service = match config.http_service() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };
    let controller = SyncController::with_options(service, config.sync_options());

    match run(&controller, cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            if matches!(e, SyncError::Unauthorized(_)) {
                eprintln!("hint: pass a valid token with --token or TASKMASTER_TOKEN");
            }
            ExitCode::FAILURE
        }
    }
}

/// Initialize file-based logging so stdout carries only command output.
///
/// The returned guard flushes buffered entries when dropped.
fn init_logging(level: &str, file_path: Option<&Path>) -> Option<WorkerGuard> {
    let default_path = std::env::temp_dir().join("taskmaster.log");
    let log_path = file_path.unwrap_or(&default_path);

    let log_dir = log_path.parent()?;
    let file_name = log_path.file_name()?.to_str()?;

    let file_appender = tracing_appender::rolling::never(log_dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(env_filter)
        .with_ansi(false)
        .init();

    Some(guard)
}

/// Refreshes and fails with the recorded error if the refresh failed.
async fn load(
    controller: &SyncController<HttpTaskService>,
    filters: &ListFilters,
) -> Result<(), SyncError> {
    controller.refresh(filters).await;
    match controller.read().error() {
        Some(e) => Err(e.clone()),
        None => Ok(()),
    }
}

#[allow(clippy::too_many_lines)]
async fn run(
    controller: &SyncController<HttpTaskService>,
    command: Command,
) -> Result<(), SyncError> {
    match command {
        Command::List {
            status,
            priority,
            category_id,
            category,
            by_category,
        } => {
            let filters = ListFilters {
                category_id,
                status: None,
                priority,
            };
            load(controller, &filters).await?;
            let snapshot = controller.read();
            let selected = select_tasks(snapshot.tasks(), category.as_deref(), status);

            if by_category {
                for aggregate in views::category_aggregates(&selected) {
                    println!(
                        "{} ({}/{} done, {}%)",
                        aggregate.name,
                        aggregate.completed,
                        aggregate.count,
                        aggregate.completion_percent()
                    );
                    for task in aggregate.tasks {
                        println!("  {}", task_line(task));
                    }
                }
            } else {
                for task in &selected {
                    println!("{}", task_line(task));
                }
            }
        }
        Command::Categories => {
            for category in controller.categories().await? {
                println!(
                    "{}  {}  {}",
                    category.id,
                    category.name,
                    category.color.as_deref().unwrap_or("-")
                );
            }
        }
        Command::Stats => {
            load(controller, &ListFilters::none()).await?;
            let snapshot = controller.read();
            let counts = views::status_counts(snapshot.tasks());
            println!(
                "total {}  todo {}  in progress {}  done {}",
                counts.total, counts.todo, counts.in_progress, counts.done
            );
            for aggregate in views::category_aggregates(snapshot.tasks()) {
                println!(
                    "{:<20} {:>3}/{:<3} {:>3}%",
                    aggregate.name,
                    aggregate.completed,
                    aggregate.count,
                    aggregate.completion_percent()
                );
            }
        }
        Command::Add {
            title,
            description,
            category_id,
            priority,
            tags,
        } => {
            let mut task = NewTask::new(title).with_priority(priority).with_tags(tags);
            task.description = description;
            task.category_id = category_id;
            let created = controller.create_task(&task).await?;
            println!("created {}", task_line(&created));
        }
        Command::Update {
            id,
            title,
            description,
            status,
            priority,
            completion,
            category_id,
        } => {
            let mut patch = TaskPatch {
                title,
                description,
                category_id,
                priority,
                status,
                ..TaskPatch::default()
            };
            if let Some(percent) = completion {
                patch = patch.with_completion(percent);
            }
            let updated = controller.update_task(&TaskId::new(id), &patch).await?;
            println!("updated {}", task_line(&updated));
        }
        Command::Delete { id } => {
            let id = TaskId::new(id);
            if let Some(pending) = controller.delete_task(&id) {
                pending.wait().await?;
            }
            println!("deleted {id}");
        }
        Command::Suggest => {
            for title in controller.suggestions().await {
                println!("{title}");
            }
        }
        Command::Chat { message } => {
            println!("{}", controller.chat(&message).await?);
        }
    }
    Ok(())
}

/// Tasks in `category` (if given) passing `status`, in snapshot order.
fn select_tasks(tasks: &[Task], category: Option<&str>, status: StatusFilter) -> Vec<Task> {
    let in_category: Vec<Task> = match category {
        Some(name) => views::filter_by_category(tasks, name)
            .into_iter()
            .cloned()
            .collect(),
        None => tasks.to_vec(),
    };
    views::filter_by_status(&in_category, status)
        .into_iter()
        .cloned()
        .collect()
}

fn task_line(task: &Task) -> String {
    format!(
        "{}  [{}] {} ({}, {}%, {})",
        task.id,
        task.status,
        task.title,
        task.priority,
        task.completion_percentage,
        task.resolved_category()
    )
}
