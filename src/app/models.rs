use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::app::errors::{ValidationError, MAX_TITLE_LEN};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Todo,
    Doing,
    Done,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Todo => "todo",
            Status::Doing => "doing",
            Status::Done => "done",
        }
    }
}

impl FromStr for Status {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "todo" => Ok(Status::Todo),
            "doing" => Ok(Status::Doing),
            "done" => Ok(Status::Done),
            other => Err(ValidationError::UnknownStatus(other.to_string())),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Variant order is the priority order, low < med < high
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Med,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Med => "med",
            Priority::High => "high",
        }
    }

    // Wraps around, used by the edit dialog
    pub fn next(&self) -> Priority {
        match self {
            Priority::Low => Priority::Med,
            Priority::Med => Priority::High,
            Priority::High => Priority::Low,
        }
    }
}

impl FromStr for Priority {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Priority::Low),
            "med" => Ok(Priority::Med),
            "high" => Ok(Priority::High),
            other => Err(ValidationError::UnknownPriority(other.to_string())),
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub title: String,
    pub notes: Option<String>,
    pub status: Status,
    pub priority: Priority,
    pub due: Option<NaiveDate>,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// Editable fields of a task, used by add and edit
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TaskInput {
    pub title: String,
    pub notes: Option<String>,
    pub due: Option<NaiveDate>,
    pub priority: Priority,
    pub tags: Vec<String>,
}

impl TaskInput {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    // Only the title needs checking; a Priority always holds a known value
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::EmptyTitle);
        }
        let len = self.title.chars().count();
        if len > MAX_TITLE_LEN {
            return Err(ValidationError::TitleTooLong { len });
        }
        Ok(())
    }
}

impl From<&Task> for TaskInput {
    fn from(task: &Task) -> Self {
        Self {
            title: task.title.clone(),
            notes: task.notes.clone(),
            due: task.due,
            priority: task.priority,
            tags: task.tags.clone(),
        }
    }
}

// Every criterion that is set must hold
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TaskFilter {
    pub id: Option<i64>,
    pub status: Option<Status>,
    pub priority: Option<Priority>,
    pub tag: Option<String>,
    pub due_before: Option<NaiveDate>,
    pub query: Option<String>,
}

impl TaskFilter {
    // Case-insensitive substring match on title or notes
    pub fn matches_query(&self, task: &Task) -> bool {
        let Some(query) = self.query.as_deref() else {
            return true;
        };
        let needle = query.to_lowercase();
        task.title.to_lowercase().contains(&needle)
            || task
                .notes
                .as_deref()
                .is_some_and(|notes| notes.to_lowercase().contains(&needle))
    }
}

// YYYY-MM-DD as typed by a user
pub fn parse_date(input: &str) -> Result<NaiveDate, ValidationError> {
    NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d")
        .map_err(|_| ValidationError::InvalidDate(input.to_string()))
}

// Comma separated, blank entries dropped
pub fn parse_tags(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(String::from)
        .collect()
}
