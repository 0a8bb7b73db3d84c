use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use taskdeck::api::{ApiClient, ApiError};
use taskdeck::board::{BoardError, TaskBoard};
use taskdeck::cli::{print_task_detail, print_task_table, resolve_password};
use taskdeck::config::ClientConfig;
use taskdeck::session::SessionStore;
use taskdeck::task::{Task, TaskStatus};
use tracing::warn;
use uuid::Uuid;

#[derive(Parser)]
#[command(
    name = "taskdeck",
    about = "taskdeck — command-line client for the task-management service",
    version
)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Base URL of the task service
    #[arg(long, env = "TASKDECK_API_URL", global = true)]
    api_url: Option<String>,

    /// Data directory for config.toml and the persisted session token
    #[arg(long, env = "TASKDECK_DATA_DIR", global = true)]
    data_dir: Option<std::path::PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "TASKDECK_LOG", global = true)]
    log: Option<String>,

    /// Write logs to this file path (rotated daily). Optional.
    #[arg(long, env = "TASKDECK_LOG_FILE", global = true)]
    log_file: Option<std::path::PathBuf>,

    /// Suppress progress and informational output.
    ///
    /// Errors are still printed to stderr. JSON output (--json flags) is
    /// unaffected. Use this flag when piping output to other tools.
    #[arg(long, short = 'q', global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Log in and persist the session token.
    ///
    /// Sends the credentials form-encoded to the service's /login endpoint
    /// and stores the returned bearer token under the data directory. The
    /// password is taken from --password or read from stdin.
    ///
    /// Examples:
    ///   taskdeck login alice
    ///   echo "pw" | taskdeck login alice
    Login {
        /// Username to authenticate as
        username: String,
        /// Password (read from stdin when omitted)
        #[arg(long)]
        password: Option<String>,
    },
    /// Clear the persisted session token.
    ///
    /// Safe to run when already logged out.
    Logout,
    /// Show whether a session is currently held.
    ///
    /// Exits 0 when logged in, 1 otherwise, so scripts can branch on it.
    Status,
    /// Work with tasks: list, inspect, create, edit, complete, delete.
    Tasks {
        #[command(subcommand)]
        action: TasksAction,
    },
}

#[derive(Subcommand)]
enum TasksAction {
    /// List tasks, optionally filtered by status.
    ///
    /// Fetches the collection from the service and prints a formatted
    /// table. Use --json for machine-readable output suitable for piping.
    ///
    /// Examples:
    ///   taskdeck tasks list
    ///   taskdeck tasks list --status completed
    ///   taskdeck tasks list --json
    List {
        /// Only show tasks with this status (pending, in_progress, completed)
        #[arg(long, short)]
        status: Option<TaskStatus>,
        /// Output as JSON array (for piping)
        #[arg(long)]
        json: bool,
    },
    /// Get the full detail of a task by ID.
    ///
    /// Examples:
    ///   taskdeck tasks get 7b6c8a2e-4f1d-4a2b-9c3d-1e2f3a4b5c6d
    Get {
        /// Task ID
        id: Uuid,
    },
    /// Add a new task.
    ///
    /// Creates a task with the given title and optional metadata. The task
    /// starts as pending unless --status says otherwise.
    ///
    /// Examples:
    ///   taskdeck tasks add --title "Buy milk"
    ///   taskdeck tasks add --title "Write report" --status in_progress
    Add {
        #[arg(long)]
        title: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long, default_value = "pending")]
        status: TaskStatus,
    },
    /// Edit an existing task.
    ///
    /// Fetches the task, applies the given field overrides, and submits the
    /// full updated form. Fields not given keep their current value.
    ///
    /// Examples:
    ///   taskdeck tasks edit <id> --status in_progress
    ///   taskdeck tasks edit <id> --title "Buy oat milk"
    Edit {
        /// Task ID
        id: Uuid,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        status: Option<TaskStatus>,
    },
    /// Mark a task completed.
    ///
    /// Shorthand for `tasks edit <id> --status completed`.
    Done {
        /// Task ID
        id: Uuid,
    },
    /// Delete a task.
    ///
    /// Examples:
    ///   taskdeck tasks rm <id>
    Rm {
        /// Task ID
        id: Uuid,
    },
}

/// Everything a command needs: config, the shared API client, and the
/// session store, initialized from the persisted token before any request.
struct App {
    api: Arc<ApiClient>,
    session: Arc<SessionStore>,
}

impl App {
    fn build(config: &ClientConfig) -> Result<Self> {
        let api = Arc::new(ApiClient::new(config).context("failed to build HTTP client")?);
        let session = Arc::new(SessionStore::new(config.data_dir.clone(), api.clone()));
        session
            .initialize()
            .context("failed to read the persisted session")?;
        Ok(Self { api, session })
    }

    fn board(&self) -> TaskBoard {
        TaskBoard::new(self.api.clone(), self.session.clone())
    }

    /// Fetch one task, with the board's 401 discipline applied.
    async fn get_task(&self, id: Uuid) -> Result<Task> {
        match self.api.get_task(id).await {
            Ok(task) => Ok(task),
            Err(ApiError::Unauthorized) => {
                if let Err(e) = self.session.logout() {
                    warn!(err = %e, "logout during 401 teardown failed");
                }
                anyhow::bail!("session expired — run `taskdeck login` and try again");
            }
            Err(e) => Err(e).with_context(|| format!("failed to fetch task {id}")),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = ClientConfig::new(
        args.api_url.clone(),
        args.data_dir.clone(),
        args.log.clone(),
    );

    // ── Logging setup ────────────────────────────────────────────────────────
    // Init once — must happen before any tracing calls.
    let log_guard = setup_logging(&config.log, args.log_file.as_deref(), &config.log_format);

    let quiet = args.quiet;
    let mut exit_code = 0;
    match &args.command {
        Command::Login { username, password } => {
            let app = App::build(&config)?;
            let username = username.clone();
            let password = resolve_password(password.clone())?;
            app.session
                .login(&username, &password)
                .await
                .context("login failed")?;
            if !quiet {
                println!("Logged in as {username}.");
            }
        }
        Command::Logout => {
            let app = App::build(&config)?;
            app.session.logout().context("logout failed")?;
            if !quiet {
                println!("Logged out.");
            }
        }
        Command::Status => {
            let app = App::build(&config)?;
            let (line, code) = status_report(app.session.is_authenticated());
            if !quiet {
                println!("{line}");
            }
            exit_code = code;
        }
        Command::Tasks { action } => {
            let app = App::build(&config)?;
            run_tasks(&app, action, quiet).await?;
        }
    }

    // Flush the file appender before exiting with a non-zero code.
    drop(log_guard);
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
    Ok(())
}

fn status_report(authenticated: bool) -> (&'static str, i32) {
    if authenticated {
        ("Logged in.", 0)
    } else {
        ("Not logged in.", 1)
    }
}

async fn run_tasks(app: &App, action: &TasksAction, quiet: bool) -> Result<()> {
    let mut board = app.board();

    match action {
        TasksAction::List { status, json } => {
            board.set_filter(*status).await?;
            if *json {
                println!("{}", serde_json::to_string(board.tasks())?);
            } else {
                print_task_table(board.tasks());
            }
        }

        TasksAction::Get { id } => {
            let task = app.get_task(*id).await?;
            print_task_detail(&task);
        }

        TasksAction::Add {
            title,
            description,
            status,
        } => {
            board.open_for_create();
            if let Some(form) = board.form_mut() {
                form.title = title.clone();
                form.description = description.clone().unwrap_or_default();
                form.status = *status;
            }
            finish_mutation(board.submit().await, quiet, || format!("Added: {title}"))?;
        }

        TasksAction::Edit {
            id,
            title,
            description,
            status,
        } => {
            let task = app.get_task(*id).await?;
            board.open_for_edit(&task);
            if let Some(form) = board.form_mut() {
                if let Some(title) = title {
                    form.title = title.clone();
                }
                if let Some(description) = description {
                    form.description = description.clone();
                }
                if let Some(status) = status {
                    form.status = *status;
                }
            }
            finish_mutation(board.submit().await, quiet, || format!("Updated: {id}"))?;
        }

        TasksAction::Done { id } => {
            let task = app.get_task(*id).await?;
            board.open_for_edit(&task);
            if let Some(form) = board.form_mut() {
                form.status = TaskStatus::Completed;
            }
            finish_mutation(board.submit().await, quiet, || {
                format!("Done: {} — {}", task.id, task.title)
            })?;
        }

        TasksAction::Rm { id } => {
            finish_mutation(board.delete(*id).await, quiet, || format!("Deleted: {id}"))?;
        }
    }

    Ok(())
}

/// Report a board mutation result. A refresh failure after a successful
/// mutation prints a warning but exits 0 — the requested change was
/// applied; only the local resync is stale.
fn finish_mutation(
    result: Result<(), BoardError>,
    quiet: bool,
    success_line: impl FnOnce() -> String,
) -> Result<()> {
    match result {
        Ok(()) => {
            if !quiet {
                println!("{}", success_line());
            }
            Ok(())
        }
        Err(BoardError::Refresh(e)) => {
            warn!(err = %e, "task list refresh failed after the mutation");
            if !quiet {
                println!("{}", success_line());
            }
            eprintln!("warning: the change was applied but refreshing the task list failed: {e}");
            Ok(())
        }
        Err(BoardError::SessionExpired) => {
            anyhow::bail!("session expired — run `taskdeck login` and try again")
        }
        Err(e) => Err(e.into()),
    }
}

/// Initialize the tracing subscriber.
/// If `log_file` is set, logs go to both stderr and a daily-rolling file.
/// Returns a `WorkerGuard` that must stay alive for the process lifetime.
///
/// `log_format` may be `"pretty"` (default, human-readable compact format)
/// or `"json"` (structured JSON for log aggregators).
///
/// If the log directory cannot be created, falls back to stderr-only
/// logging with a warning — never panics.
fn setup_logging(
    log_level: &str,
    log_file: Option<&std::path::Path>,
    log_format: &str,
) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let use_json = log_format == "json";

    if let Some(path) = log_file {
        let dir = path.parent().unwrap_or_else(|| std::path::Path::new("."));
        let filename = path
            .file_name()
            .unwrap_or_else(|| std::ffi::OsStr::new("taskdeck.log"));

        // Ensure the directory exists before tracing-appender tries to open it.
        if let Err(e) = std::fs::create_dir_all(dir) {
            eprintln!(
                "warn: could not create log directory '{}': {e} — falling back to stderr",
                dir.display()
            );
            init_stderr_only(log_level, use_json);
            return None;
        }

        let appender = tracing_appender::rolling::daily(dir, filename);
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);

        if use_json {
            tracing_subscriber::registry()
                .with(EnvFilter::new(log_level))
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .with(fmt::layer().json().with_writer(non_blocking))
                .init();
        } else {
            tracing_subscriber::registry()
                .with(EnvFilter::new(log_level))
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .with(fmt::layer().with_writer(non_blocking))
                .init();
        }

        Some(guard)
    } else {
        init_stderr_only(log_level, use_json);
        None
    }
}

fn init_stderr_only(log_level: &str, use_json: bool) {
    if use_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(log_level)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(log_level)
            .compact()
            .with_writer(std::io::stderr)
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_report_maps_session_state_to_exit_code() {
        assert_eq!(status_report(true), ("Logged in.", 0));
        assert_eq!(status_report(false), ("Not logged in.", 1));
    }
}
