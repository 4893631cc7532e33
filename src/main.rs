use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;

use tasklist_lib::config::AppConfig;
use tasklist_lib::seed::SeedState;
use tasklist_lib::{AppResult, AppState, NewTask, Task, TaskId, TaskUpdate};

#[derive(Debug, Parser)]
#[command(name = "tasklist", about = "Local task list seeded from a remote feed", version)]
struct Cli {
    /// Directory holding the database, settings and logs.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
    /// Remote feed used for the first-launch seed.
    #[arg(long, global = true)]
    seed_url: Option<String>,
    /// Print machine-readable JSON instead of text.
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Show every task, newest first. Seeds the store on first use.
    List,
    /// Create a task.
    Add {
        title: String,
        #[arg(long)]
        description: Option<String>,
        /// Epoch milliseconds; defaults to now.
        #[arg(long)]
        date: Option<i64>,
        #[arg(long)]
        completed: bool,
    },
    /// Mark a task completed.
    Complete { id: TaskId },
    /// Mark a task not completed.
    Reopen { id: TaskId },
    /// Replace a task's title.
    Rename { id: TaskId, title: String },
    /// Replace a task's description; omit the text to clear it.
    Describe { id: TaskId, text: Option<String> },
    /// Move a task to another date (epoch milliseconds).
    Redate { id: TaskId, date: i64 },
    /// Remove a task.
    Delete { id: TaskId },
    /// Report whether the first-launch seed has completed.
    SeedStatus,
}

fn main() {
    let cli = Cli::parse();
    let json = cli.json;
    match run(cli) {
        Ok(code) => process::exit(code),
        Err(err) => {
            if json {
                let payload = serde_json::to_string(&err).unwrap_or_else(|_| err.to_string());
                eprintln!("{payload}");
            }
            eprintln!("Error: [{}] {}", err.code(), err.message());
            process::exit(1);
        }
    }
}

fn resolve_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = AppConfig::from_env().context("read configuration")?;
    if let Some(dir) = &cli.data_dir {
        config.data_dir = dir.clone();
    }
    if let Some(url) = &cli.seed_url {
        config.seed_url = url.clone();
    }
    Ok(config)
}

fn run(cli: Cli) -> AppResult<i32> {
    let config = resolve_config(&cli)?;
    let _guard = match tasklist_lib::logging::init(&config) {
        Ok(guard) => Some(guard),
        Err(err) => {
            tasklist_lib::init_logging();
            tracing::warn!(
                target: "tasklist",
                event = "file_logging_unavailable",
                error = %format!("{err:#}")
            );
            None
        }
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("start async runtime")?;

    runtime.block_on(async move {
        let state = AppState::open(&config).await?;
        let outcome = handle_command(&state, cli.command, cli.json).await;
        state.shutdown().await;
        outcome
    })
}

async fn handle_command(state: &AppState, command: Commands, json: bool) -> AppResult<i32> {
    let service = &state.service;
    match command {
        Commands::List => {
            let tasks = service.list_tasks().await?;
            print_tasks(&tasks, json)?;
        }
        Commands::Add {
            title,
            description,
            date,
            completed,
        } => {
            let task = service
                .create_task(NewTask {
                    id: None,
                    title,
                    description,
                    date,
                    is_completed: completed,
                })
                .await?;
            print_task(&task, json)?;
        }
        Commands::Complete { id } => {
            apply(state, id, TaskUpdate::Completed(true), json).await?;
        }
        Commands::Reopen { id } => {
            apply(state, id, TaskUpdate::Completed(false), json).await?;
        }
        Commands::Rename { id, title } => {
            apply(state, id, TaskUpdate::Title(title), json).await?;
        }
        Commands::Describe { id, text } => {
            apply(state, id, TaskUpdate::Description(text), json).await?;
        }
        Commands::Redate { id, date } => {
            apply(state, id, TaskUpdate::Date(date), json).await?;
        }
        Commands::Delete { id } => {
            service.delete_task(id).await?;
            if json {
                println!("{}", json!({ "deleted": id }));
            } else {
                println!("Deleted {id}");
            }
        }
        Commands::SeedStatus => {
            let seeded = state.seeder.state() == SeedState::Seeded;
            if json {
                println!("{}", json!({ "seeded": seeded }));
            } else if seeded {
                println!("seeded");
            } else {
                println!("not seeded");
            }
        }
    }
    Ok(0)
}

async fn apply(state: &AppState, id: TaskId, update: TaskUpdate, json: bool) -> AppResult<()> {
    state.service.update_task_field(id, update).await?;
    let task = state.service.get_task(id).await?;
    print_task(&task, json)
}

fn print_tasks(tasks: &[Task], json: bool) -> AppResult<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(tasks)?);
    } else if tasks.is_empty() {
        println!("No tasks.");
    } else {
        for task in tasks {
            println!("{task}");
        }
    }
    Ok(())
}

fn print_task(task: &Task, json: bool) -> AppResult<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(task)?);
    } else {
        println!("{task}");
        if let Some(description) = task.description.as_deref() {
            println!("    {description}");
        }
    }
    Ok(())
}
