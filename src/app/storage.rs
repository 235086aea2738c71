// Communication with SQLite
// Schema, connection lifecycle and the transaction boundary live here.
// The repository is the only caller; nothing else runs SQL.
use std::fs;
use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{Connection, Row};

use crate::app::errors::{Result, TaskError};
use crate::app::models::{Priority, Status, Task};

// Column order must match TaskRow::from_row
pub const TASK_COLUMNS: &str =
    "id, title, notes, status, priority, due, tags, created_at, updated_at";

pub struct Storage {
    db_con: Connection,
}

impl Storage {
    // Open the database file, creating its directory when missing
    pub fn open(path: &Path) -> Result<Storage> {
        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        tracing::debug!(path = %path.display(), "opening task database");
        Ok(Storage {
            db_con: Connection::open(path)?,
        })
    }

    pub fn open_in_memory() -> Result<Storage> {
        Ok(Storage {
            db_con: Connection::open_in_memory()?,
        })
    }

    // Create the tasks table; safe to call on every start
    pub fn create_table_if_not_exists(&self) -> Result<()> {
        self.db_con.execute_batch(
            "CREATE TABLE IF NOT EXISTS tasks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL CHECK (length(title) BETWEEN 1 AND 200),
                notes TEXT,
                status TEXT NOT NULL DEFAULT 'todo' CHECK (status IN ('todo', 'doing', 'done')),
                priority TEXT NOT NULL DEFAULT 'med' CHECK (priority IN ('low', 'med', 'high')),
                due DATE,
                tags TEXT NOT NULL DEFAULT '[]',
                created_at DATETIME NOT NULL,
                updated_at DATETIME NOT NULL
            );",
        )?;
        Ok(())
    }

    // Run `work` inside one transaction. Commits on Ok; on Err the
    // transaction is dropped uncommitted and rolls back.
    pub fn unit_of_work<T>(&self, work: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        // The connection is not shared across threads and units never nest.
        let tx = self.db_con.unchecked_transaction()?;
        let out = work(&tx)?;
        tx.commit()?;
        Ok(out)
    }
}

// A tasks row before the tags column is decoded
pub struct TaskRow {
    id: i64,
    title: String,
    notes: Option<String>,
    status: Status,
    priority: Priority,
    due: Option<NaiveDate>,
    tags: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TaskRow {
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<TaskRow> {
        Ok(TaskRow {
            id: row.get(0)?,
            title: row.get(1)?,
            notes: row.get(2)?,
            status: row.get(3)?,
            priority: row.get(4)?,
            due: row.get(5)?,
            tags: row.get(6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }

    pub fn into_task(self) -> Result<Task> {
        let tags: Vec<String> = serde_json::from_str(&self.tags)?;
        Ok(Task {
            id: self.id,
            title: self.title,
            notes: self.notes,
            status: self.status,
            priority: self.priority,
            due: self.due,
            tags,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

pub fn encode_tags(tags: &[String]) -> Result<String> {
    serde_json::to_string(tags).map_err(TaskError::from)
}

impl ToSql for Status {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Status {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|err| FromSqlError::Other(Box::new(err)))
    }
}

impl ToSql for Priority {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Priority {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|err| FromSqlError::Other(Box::new(err)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> Storage {
        let storage = Storage::open_in_memory().unwrap();
        storage.create_table_if_not_exists().unwrap();
        storage
    }

    fn count(storage: &Storage) -> i64 {
        storage
            .unit_of_work(|conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM tasks", [], |row| row.get(0))?)
            })
            .unwrap()
    }

    fn insert_one(conn: &Connection) -> Result<()> {
        let now = Utc::now();
        conn.execute(
            "INSERT INTO tasks (title, created_at, updated_at) VALUES ('a', ?1, ?1)",
            [now],
        )?;
        Ok(())
    }

    #[test]
    fn initialize_is_idempotent() {
        let storage = setup();
        storage.create_table_if_not_exists().unwrap();
        assert_eq!(count(&storage), 0);
    }

    #[test]
    fn unit_of_work_commits_on_ok() {
        let storage = setup();
        storage.unit_of_work(insert_one).unwrap();
        assert_eq!(count(&storage), 1);
    }

    #[test]
    fn unit_of_work_rolls_back_on_err() {
        let storage = setup();
        let result: Result<()> = storage.unit_of_work(|conn| {
            insert_one(conn)?;
            Err(TaskError::Validation(
                crate::app::errors::ValidationError::EmptyTitle,
            ))
        });
        assert!(result.is_err());
        assert_eq!(count(&storage), 0);
    }

    #[test]
    fn check_constraints_reject_unknown_enum_values() {
        let storage = setup();
        let result = storage.unit_of_work(|conn| {
            Ok(conn.execute(
                "INSERT INTO tasks (title, priority, created_at, updated_at)
                 VALUES ('a', 'urgent', '2024-01-01', '2024-01-01')",
                [],
            )?)
        });
        assert!(matches!(result, Err(TaskError::Storage(_))));
        assert_eq!(count(&storage), 0);
    }

    #[test]
    fn open_creates_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("todo.db");
        let storage = Storage::open(&path).unwrap();
        storage.create_table_if_not_exists().unwrap();
        assert!(path.exists());
    }
}
