// Single gateway to stored tasks. Each operation validates first, then runs
// in one unit of work; unknown ids come back as Ok(None) or Ok(false).

use chrono::{DateTime, Utc};
use rusqlite::types::ToSql;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};

use crate::app::errors::Result;
use crate::app::models::{Status, Task, TaskFilter, TaskInput};
use crate::app::storage::{encode_tags, Storage, TaskRow, TASK_COLUMNS};

pub struct TaskRepository<'a> {
    storage: &'a Storage,
}

impl<'a> TaskRepository<'a> {
    pub fn new(storage: &'a Storage) -> TaskRepository<'a> {
        TaskRepository { storage }
    }

    // New tasks start as todo with both timestamps set to now
    #[tracing::instrument(skip(self))]
    pub fn add(&self, input: &TaskInput) -> Result<Task> {
        input.validate()?;
        let tags = encode_tags(&input.tags)?;
        let now = Utc::now();

        let task = self.storage.unit_of_work(|conn| {
            conn.execute(
                "INSERT INTO tasks (title, notes, status, priority, due, tags, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
                params![
                    input.title,
                    input.notes,
                    Status::Todo,
                    input.priority,
                    input.due,
                    tags,
                    now
                ],
            )?;
            let id = conn.last_insert_rowid();
            find_by_id(conn, id)?.ok_or_else(|| rusqlite::Error::QueryReturnedNoRows.into())
        })?;

        tracing::info!(id = task.id, "task added");
        Ok(task)
    }

    // Tasks matching every criterion set in the filter, by ascending id
    #[tracing::instrument(skip(self))]
    pub fn list(&self, filter: &TaskFilter) -> Result<Vec<Task>> {
        let mut sql = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE 1 = 1");
        let mut values: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(id) = filter.id {
            sql.push_str(" AND id = ?");
            values.push(Box::new(id));
        }
        if let Some(status) = filter.status {
            sql.push_str(" AND status = ?");
            values.push(Box::new(status));
        }
        if let Some(priority) = filter.priority {
            sql.push_str(" AND priority = ?");
            values.push(Box::new(priority));
        }
        if let Some(tag) = &filter.tag {
            sql.push_str(" AND EXISTS (SELECT 1 FROM json_each(tasks.tags) WHERE json_each.value = ?)");
            values.push(Box::new(tag.clone()));
        }
        if let Some(due_before) = filter.due_before {
            // NULL never compares, so tasks without a due date drop out
            sql.push_str(" AND due <= ?");
            values.push(Box::new(due_before));
        }
        sql.push_str(" ORDER BY id");

        let rows = self.storage.unit_of_work(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(values.iter()), TaskRow::from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })?;

        let mut tasks = Vec::with_capacity(rows.len());
        for row in rows {
            let task = row.into_task()?;
            if filter.matches_query(&task) {
                tasks.push(task);
            }
        }
        tracing::debug!(count = tasks.len(), "tasks listed");
        Ok(tasks)
    }

    pub fn get(&self, id: i64) -> Result<Option<Task>> {
        self.storage.unit_of_work(|conn| find_by_id(conn, id))
    }

    #[tracing::instrument(skip(self))]
    pub fn set_status(&self, id: i64, status: Status) -> Result<Option<Task>> {
        let updated = self.storage.unit_of_work(|conn| {
            let Some(current) = find_by_id(conn, id)? else {
                return Ok(None);
            };
            conn.execute(
                "UPDATE tasks SET status = ?1, updated_at = ?2 WHERE id = ?3",
                params![status, touch(current.updated_at), id],
            )?;
            find_by_id(conn, id)
        })?;

        match &updated {
            Some(_) => tracing::info!(id, %status, "task status changed"),
            None => tracing::debug!(id, "no task to change status of"),
        }
        Ok(updated)
    }

    // Overwrites the editable fields; status and created_at stay.
    // Input is validated before the lookup.
    #[tracing::instrument(skip(self))]
    pub fn edit(&self, id: i64, input: &TaskInput) -> Result<Option<Task>> {
        input.validate()?;
        let tags = encode_tags(&input.tags)?;

        let updated = self.storage.unit_of_work(|conn| {
            let Some(current) = find_by_id(conn, id)? else {
                return Ok(None);
            };
            conn.execute(
                "UPDATE tasks
                 SET title = ?1, notes = ?2, priority = ?3, due = ?4, tags = ?5, updated_at = ?6
                 WHERE id = ?7",
                params![
                    input.title,
                    input.notes,
                    input.priority,
                    input.due,
                    tags,
                    touch(current.updated_at),
                    id
                ],
            )?;
            find_by_id(conn, id)
        })?;

        if updated.is_some() {
            tracing::info!(id, "task edited");
        }
        Ok(updated)
    }

    #[tracing::instrument(skip(self))]
    pub fn remove(&self, id: i64) -> Result<bool> {
        let removed = self.storage.unit_of_work(|conn| {
            let changed = conn.execute("DELETE FROM tasks WHERE id = ?1", [id])?;
            Ok(changed > 0)
        })?;

        if removed {
            tracing::info!(id, "task removed");
        }
        Ok(removed)
    }
}

fn find_by_id(conn: &Connection, id: i64) -> Result<Option<Task>> {
    let row = conn
        .query_row(
            &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"),
            [id],
            TaskRow::from_row,
        )
        .optional()?;
    row.map(TaskRow::into_task).transpose()
}

// Never moves backwards, even if the clock does
fn touch(previous: DateTime<Utc>) -> DateTime<Utc> {
    Utc::now().max(previous)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use chrono::NaiveDate;

    use super::*;
    use crate::app::errors::{TaskError, ValidationError};
    use crate::app::models::Priority;

    fn setup() -> Storage {
        let storage = Storage::open_in_memory().unwrap();
        storage.create_table_if_not_exists().unwrap();
        storage
    }

    fn input(title: &str) -> TaskInput {
        TaskInput::new(title)
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn titles(tasks: &[Task]) -> Vec<&str> {
        tasks.iter().map(|task| task.title.as_str()).collect()
    }

    // --- add ---

    #[test]
    fn add_assigns_distinct_ids_and_defaults() {
        let storage = setup();
        let repo = TaskRepository::new(&storage);

        let mut ids = HashSet::new();
        for i in 0..5 {
            let task = repo.add(&input(&format!("Task {i}"))).unwrap();
            assert!(ids.insert(task.id), "id {} was handed out twice", task.id);
            assert_eq!(task.status, Status::Todo);
            assert_eq!(task.priority, Priority::Med);
            assert_eq!(task.created_at, task.updated_at);
        }
    }

    #[test]
    fn add_rejects_empty_title_without_persisting() {
        let storage = setup();
        let repo = TaskRepository::new(&storage);

        let err = repo.add(&input("")).unwrap_err();
        assert!(err.is_validation());
        assert!(matches!(
            err,
            TaskError::Validation(ValidationError::EmptyTitle)
        ));
        assert!(repo.list(&TaskFilter::default()).unwrap().is_empty());
    }

    #[test]
    fn add_rejects_overlong_title() {
        let storage = setup();
        let repo = TaskRepository::new(&storage);

        assert!(repo.add(&input(&"x".repeat(200))).is_ok());
        let err = repo.add(&input(&"x".repeat(201))).unwrap_err();
        assert!(matches!(
            err,
            TaskError::Validation(ValidationError::TitleTooLong { len: 201 })
        ));
        assert_eq!(repo.list(&TaskFilter::default()).unwrap().len(), 1);
    }

    #[test]
    fn ids_of_removed_tasks_are_not_reused() {
        let storage = setup();
        let repo = TaskRepository::new(&storage);

        let first = repo.add(&input("a")).unwrap();
        let second = repo.add(&input("b")).unwrap();
        assert!(repo.remove(second.id).unwrap());
        let third = repo.add(&input("c")).unwrap();
        assert_ne!(third.id, second.id);
        assert_ne!(third.id, first.id);
    }

    // --- list ---

    #[test]
    fn list_returns_added_minus_removed_in_id_order() {
        let storage = setup();
        let repo = TaskRepository::new(&storage);

        let a = repo.add(&input("a")).unwrap();
        let b = repo.add(&input("b")).unwrap();
        let c = repo.add(&input("c")).unwrap();
        repo.remove(b.id).unwrap();
        let d = repo.add(&input("d")).unwrap();

        let ids: Vec<i64> = repo
            .list(&TaskFilter::default())
            .unwrap()
            .iter()
            .map(|task| task.id)
            .collect();
        assert_eq!(ids, vec![a.id, c.id, d.id]);
    }

    #[test]
    fn list_filters_by_status_and_priority() {
        let storage = setup();
        let repo = TaskRepository::new(&storage);

        let done = repo.add(&input("done one")).unwrap();
        repo.set_status(done.id, Status::Done).unwrap();
        repo.add(&TaskInput {
            priority: Priority::High,
            ..input("urgent todo")
        })
        .unwrap();
        repo.add(&input("plain todo")).unwrap();

        let by_status = repo
            .list(&TaskFilter {
                status: Some(Status::Done),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(titles(&by_status), vec!["done one"]);
        assert!(by_status.iter().all(|task| task.status == Status::Done));

        let by_priority = repo
            .list(&TaskFilter {
                priority: Some(Priority::High),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(titles(&by_priority), vec!["urgent todo"]);
    }

    #[test]
    fn tag_filter_matches_whole_tags_only() {
        let storage = setup();
        let repo = TaskRepository::new(&storage);

        repo.add(&TaskInput {
            tags: vec!["home".into(), "work".into()],
            ..input("tagged work")
        })
        .unwrap();
        repo.add(&TaskInput {
            tags: vec!["works".into(), "homework".into()],
            ..input("tagged works")
        })
        .unwrap();
        repo.add(&input("untagged")).unwrap();

        let tasks = repo
            .list(&TaskFilter {
                tag: Some("work".into()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(titles(&tasks), vec!["tagged work"]);
    }

    #[test]
    fn due_before_is_inclusive_and_skips_undated_tasks() {
        let storage = setup();
        let repo = TaskRepository::new(&storage);

        for (title, due) in [
            ("early", Some(date(2024, 1, 10))),
            ("on the day", Some(date(2024, 1, 15))),
            ("late", Some(date(2024, 2, 1))),
            ("no date", None),
        ] {
            repo.add(&TaskInput { due, ..input(title) }).unwrap();
        }

        let tasks = repo
            .list(&TaskFilter {
                due_before: Some(date(2024, 1, 15)),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(titles(&tasks), vec!["early", "on the day"]);
    }

    #[test]
    fn query_matches_title_or_notes_ignoring_case() {
        let storage = setup();
        let repo = TaskRepository::new(&storage);

        repo.add(&input("Urgent fix")).unwrap();
        repo.add(&TaskInput {
            notes: Some("this is urgent!".into()),
            ..input("call bank")
        })
        .unwrap();
        repo.add(&TaskInput {
            notes: Some("whenever".into()),
            ..input("water plants")
        })
        .unwrap();
        repo.add(&input("no notes")).unwrap();

        let tasks = repo
            .list(&TaskFilter {
                query: Some("urgent".into()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(titles(&tasks), vec!["Urgent fix", "call bank"]);
    }

    #[test]
    fn filters_combine_with_and() {
        let storage = setup();
        let repo = TaskRepository::new(&storage);

        repo.add(&TaskInput {
            priority: Priority::High,
            tags: vec!["work".into()],
            ..input("report")
        })
        .unwrap();
        repo.add(&TaskInput {
            priority: Priority::Low,
            tags: vec!["work".into()],
            ..input("report draft")
        })
        .unwrap();
        repo.add(&TaskInput {
            priority: Priority::High,
            ..input("report at home")
        })
        .unwrap();

        let tasks = repo
            .list(&TaskFilter {
                priority: Some(Priority::High),
                tag: Some("work".into()),
                query: Some("REPORT".into()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(titles(&tasks), vec!["report"]);
    }

    #[test]
    fn round_trip_through_id_filter_keeps_every_field() {
        let storage = setup();
        let repo = TaskRepository::new(&storage);

        let supplied = TaskInput {
            title: "Write report".into(),
            notes: Some("quarterly numbers".into()),
            due: Some(date(2024, 6, 30)),
            priority: Priority::High,
            tags: vec!["work".into(), "q2".into(), "work".into()],
        };
        let added = repo.add(&supplied).unwrap();

        let fetched = repo
            .list(&TaskFilter {
                id: Some(added.id),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(fetched, vec![added.clone()]);
        assert_eq!(TaskInput::from(&fetched[0]), supplied);
        assert_eq!(fetched[0].status, Status::Todo);
        assert_eq!(repo.get(added.id).unwrap(), Some(added));
    }

    // --- set_status ---

    #[test]
    fn set_status_on_missing_id_is_not_found() {
        let storage = setup();
        let repo = TaskRepository::new(&storage);
        let existing = repo.add(&input("keep me")).unwrap();

        assert_eq!(repo.set_status(999, Status::Done).unwrap(), None);
        assert_eq!(repo.list(&TaskFilter::default()).unwrap(), vec![existing]);
    }

    #[test]
    fn set_status_changes_only_status_and_updated_at() {
        let storage = setup();
        let repo = TaskRepository::new(&storage);
        let before = repo.add(&input("ship it")).unwrap();

        let after = repo.set_status(before.id, Status::Doing).unwrap().unwrap();
        assert_eq!(after.status, Status::Doing);
        assert_eq!(after.title, before.title);
        assert_eq!(after.created_at, before.created_at);
        assert!(after.updated_at >= before.updated_at);
    }

    // --- edit ---

    #[test]
    fn edit_overwrites_fields_but_keeps_status() {
        let storage = setup();
        let repo = TaskRepository::new(&storage);
        let task = repo
            .add(&TaskInput {
                tags: vec!["old".into()],
                notes: Some("old notes".into()),
                ..input("old title")
            })
            .unwrap();
        repo.set_status(task.id, Status::Done).unwrap();

        let change = TaskInput {
            title: "new title".into(),
            notes: None,
            due: Some(date(2025, 1, 1)),
            priority: Priority::Low,
            tags: vec!["new".into()],
        };
        let edited = repo.edit(task.id, &change).unwrap().unwrap();

        assert_eq!(edited.status, Status::Done);
        assert_eq!(TaskInput::from(&edited), change);
        assert_eq!(edited.created_at, task.created_at);
    }

    #[test]
    fn edit_validates_and_reports_missing_ids() {
        let storage = setup();
        let repo = TaskRepository::new(&storage);
        let task = repo.add(&input("valid")).unwrap();

        assert_eq!(repo.edit(42, &input("whatever")).unwrap(), None);
        assert!(repo.edit(task.id, &input("")).unwrap_err().is_validation());
        assert_eq!(repo.get(task.id).unwrap().unwrap().title, "valid");
    }

    // --- remove ---

    #[test]
    fn remove_reports_whether_a_task_was_deleted() {
        let storage = setup();
        let repo = TaskRepository::new(&storage);
        let task = repo.add(&input("temporary")).unwrap();

        assert!(repo.remove(task.id).unwrap());
        assert!(!repo.remove(task.id).unwrap());
        assert!(repo.list(&TaskFilter::default()).unwrap().is_empty());
        assert_eq!(repo.get(task.id).unwrap(), None);
    }

    // --- timestamps ---

    #[test]
    fn updated_at_never_decreases_across_mutations() {
        let storage = setup();
        let repo = TaskRepository::new(&storage);
        let mut last = repo.add(&input("tick")).unwrap();

        for status in [Status::Doing, Status::Done, Status::Todo] {
            let next = repo.set_status(last.id, status).unwrap().unwrap();
            assert!(next.updated_at >= last.updated_at);
            assert!(next.updated_at >= next.created_at);
            last = next;
        }
        let edited = repo.edit(last.id, &input("tock")).unwrap().unwrap();
        assert!(edited.updated_at >= last.updated_at);
    }

    #[test]
    fn storage_failures_surface_as_storage_errors() {
        let storage = setup();
        let repo = TaskRepository::new(&storage);
        let task = repo.add(&input("kept")).unwrap();
        storage
            .unit_of_work(|conn| {
                conn.execute_batch("DROP TABLE tasks")?;
                Ok(())
            })
            .unwrap();

        assert!(matches!(repo.add(&input("x")), Err(TaskError::Storage(_))));
        assert!(matches!(
            repo.list(&TaskFilter::default()),
            Err(TaskError::Storage(_))
        ));
        assert!(matches!(
            repo.set_status(task.id, Status::Done),
            Err(TaskError::Storage(_))
        ));
        assert!(matches!(
            repo.edit(task.id, &input("y")),
            Err(TaskError::Storage(_))
        ));
        assert!(matches!(repo.remove(task.id), Err(TaskError::Storage(_))));
        assert!(matches!(repo.get(task.id), Err(TaskError::Storage(_))));
    }
}
