use std::io::{self, Write};
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::app::errors::TaskError;
use crate::app::export::{export_tasks, ExportError, TAG_DELIMITER};
use crate::app::models::{parse_date, parse_tags, Priority, Status, Task, TaskFilter, TaskInput};
use crate::app::repository::TaskRepository;
use crate::app::storage::Storage;

#[derive(Parser, Debug)]
#[command(name = "todo", version, about = "Simple personal task tracker")]
pub struct Cli {
    /// Database file, overrides TODO_DB_PATH
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// Add a task
    Add {
        title: String,
        #[arg(short, long)]
        notes: Option<String>,
        /// YYYY-MM-DD
        #[arg(long)]
        due: Option<String>,
        /// low, med or high
        #[arg(short, long, default_value = "med")]
        priority: String,
        /// May be repeated; a comma separated list also works
        #[arg(short, long = "tag")]
        tags: Vec<String>,
    },
    /// List tasks, optionally filtered
    Ls {
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        priority: Option<String>,
        #[arg(long)]
        tag: Option<String>,
        /// Only tasks due on or before this date (YYYY-MM-DD)
        #[arg(long)]
        due_before: Option<String>,
        /// Case-insensitive search in title and notes
        #[arg(short, long)]
        query: Option<String>,
    },
    /// Mark a task as done
    Done { id: i64 },
    /// Mark a task as in progress
    Start { id: i64 },
    /// Set the status of a task (todo, doing, done)
    Status { id: i64, status: String },
    /// Replace the editable fields of a task; its status is kept
    Edit {
        id: i64,
        #[arg(long)]
        title: String,
        #[arg(long)]
        notes: Option<String>,
        #[arg(long)]
        due: Option<String>,
        #[arg(long, default_value = "med")]
        priority: String,
        #[arg(long = "tag")]
        tags: Vec<String>,
    },
    /// Remove a task
    Rm { id: i64 },
    /// Export every task to a CSV or JSON file
    Export {
        out: PathBuf,
        /// csv or json, taken from the file extension when omitted
        #[arg(short, long)]
        format: Option<String>,
    },
    /// Open the interactive window
    Window,
}

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error(transparent)]
    Task(#[from] TaskError),
    #[error("Not found: task #{0}")]
    NotFound(i64),
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl CliError {
    // 2 for bad input, 1 for everything else
    pub fn exit_code(&self) -> u8 {
        match self {
            CliError::Task(err) if err.is_validation() => 2,
            _ => 1,
        }
    }
}

impl From<crate::app::errors::ValidationError> for CliError {
    fn from(err: crate::app::errors::ValidationError) -> Self {
        CliError::Task(err.into())
    }
}

// Run one command against the store, writing user messages to `out`.
// `Commands::Window` takes over the terminal and is handled by the caller.
pub fn run(command: Commands, storage: &Storage, out: &mut impl Write) -> Result<(), CliError> {
    let repo = TaskRepository::new(storage);

    match command {
        Commands::Add {
            title,
            notes,
            due,
            priority,
            tags,
        } => {
            let input = task_input(title, notes, due, &priority, tags)?;
            let task = repo.add(&input)?;
            writeln!(out, "Added #{}: {}", task.id, task.title)?;
        }
        Commands::Ls {
            status,
            priority,
            tag,
            due_before,
            query,
        } => {
            let filter = TaskFilter {
                status: status.as_deref().map(str::parse).transpose()?,
                priority: priority.as_deref().map(str::parse).transpose()?,
                tag,
                due_before: due_before.as_deref().map(parse_date).transpose()?,
                query,
                ..Default::default()
            };
            let tasks = repo.list(&filter)?;
            write!(out, "{}", render_table(&tasks))?;
        }
        Commands::Done { id } => {
            let task = change_status(&repo, id, Status::Done)?;
            writeln!(out, "Completed #{}: {}", task.id, task.title)?;
        }
        Commands::Start { id } => {
            let task = change_status(&repo, id, Status::Doing)?;
            writeln!(out, "Started #{}: {}", task.id, task.title)?;
        }
        Commands::Status { id, status } => {
            let task = change_status(&repo, id, status.parse()?)?;
            writeln!(out, "Status of #{} is now {}: {}", task.id, task.status, task.title)?;
        }
        Commands::Edit {
            id,
            title,
            notes,
            due,
            priority,
            tags,
        } => {
            let input = task_input(title, notes, due, &priority, tags)?;
            let task = repo.edit(id, &input)?.ok_or(CliError::NotFound(id))?;
            writeln!(out, "Updated #{}: {}", task.id, task.title)?;
        }
        Commands::Rm { id } => {
            if !repo.remove(id)? {
                return Err(CliError::NotFound(id));
            }
            writeln!(out, "Removed #{id}")?;
        }
        Commands::Export { out: path, format } => {
            let count = export_tasks(&repo, &path, format.as_deref())?;
            writeln!(out, "Exported {count} task(s) -> {}", path.display())?;
        }
        Commands::Window => {}
    }
    Ok(())
}

fn change_status(repo: &TaskRepository<'_>, id: i64, status: Status) -> Result<Task, CliError> {
    repo.set_status(id, status)?.ok_or(CliError::NotFound(id))
}

fn task_input(
    title: String,
    notes: Option<String>,
    due: Option<String>,
    priority: &str,
    tags: Vec<String>,
) -> Result<TaskInput, CliError> {
    Ok(TaskInput {
        title,
        notes,
        due: due.as_deref().map(parse_date).transpose()?,
        priority: priority.parse::<Priority>()?,
        tags: tags.iter().flat_map(|tag| parse_tags(tag)).collect(),
    })
}

// Plain text table with a header row
pub fn render_table(tasks: &[Task]) -> String {
    let header = ["id", "title", "status", "priority", "due", "tags"].map(String::from);
    let rows: Vec<[String; 6]> = tasks
        .iter()
        .map(|task| {
            [
                task.id.to_string(),
                task.title.clone(),
                task.status.to_string(),
                task.priority.to_string(),
                task.due.map(|due| due.to_string()).unwrap_or_default(),
                task.tags.join(TAG_DELIMITER),
            ]
        })
        .collect();

    let mut widths = header.clone().map(|cell| cell.chars().count());
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut table = String::new();
    for row in std::iter::once(&header).chain(&rows) {
        let cells: Vec<String> = row
            .iter()
            .zip(widths)
            .map(|(cell, width)| format!("{cell:<width$}"))
            .collect();
        table.push_str(cells.join("  ").trim_end());
        table.push('\n');
    }
    table
}
