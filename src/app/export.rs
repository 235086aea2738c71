// Flat file export of task records.
// JSON keeps the task shape; CSV joins tags into one cell.
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

use crate::app::errors::TaskError;
use crate::app::models::{Task, TaskFilter};
use crate::app::repository::TaskRepository;

pub const CSV_HEADER: [&str; 9] = [
    "id",
    "title",
    "notes",
    "status",
    "priority",
    "due",
    "tags",
    "created_at",
    "updated_at",
];

pub const TAG_DELIMITER: &str = ", ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("unsupported export format '{0}', use csv or json")]
    UnsupportedFormat(String),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Task(#[from] TaskError),
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            _ => Err(ExportError::UnsupportedFormat(s.to_string())),
        }
    }
}

impl ExportFormat {
    // Explicit format wins over the file extension
    pub fn resolve(explicit: Option<&str>, path: &Path) -> Result<ExportFormat, ExportError> {
        match explicit {
            Some(format) => format.parse(),
            None => path
                .extension()
                .and_then(|ext| ext.to_str())
                .unwrap_or_default()
                .parse(),
        }
    }

    pub fn write(&self, writer: impl Write, tasks: &[Task]) -> Result<(), ExportError> {
        match self {
            ExportFormat::Csv => write_csv(writer, tasks),
            ExportFormat::Json => write_json(writer, tasks),
        }
    }
}

// Write every task to `path`, returning how many were written.
// The format is checked before the file is created.
pub fn export_tasks(
    repo: &TaskRepository<'_>,
    path: &Path,
    explicit: Option<&str>,
) -> Result<usize, ExportError> {
    let format = ExportFormat::resolve(explicit, path)?;
    let tasks = repo.list(&TaskFilter::default())?;
    let mut file = BufWriter::new(File::create(path)?);
    format.write(&mut file, &tasks)?;
    file.flush()?;
    tracing::info!(count = tasks.len(), path = %path.display(), ?format, "tasks exported");
    Ok(tasks.len())
}

pub fn write_json(mut writer: impl Write, tasks: &[Task]) -> Result<(), ExportError> {
    serde_json::to_writer_pretty(&mut writer, tasks)?;
    writeln!(writer)?;
    Ok(())
}

pub fn write_csv(mut writer: impl Write, tasks: &[Task]) -> Result<(), ExportError> {
    writeln!(writer, "{}", CSV_HEADER.join(","))?;
    for task in tasks {
        let cells = [
            task.id.to_string(),
            task.title.clone(),
            task.notes.clone().unwrap_or_default(),
            task.status.to_string(),
            task.priority.to_string(),
            task.due.map(|due| due.to_string()).unwrap_or_default(),
            task.tags.join(TAG_DELIMITER),
            task.created_at.to_rfc3339(),
            task.updated_at.to_rfc3339(),
        ];
        let line: Vec<String> = cells.iter().map(|cell| csv_cell(cell)).collect();
        writeln!(writer, "{}", line.join(","))?;
    }
    Ok(())
}

// Quote only when needed, doubling embedded quotes
fn csv_cell(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
