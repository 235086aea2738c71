use thiserror::Error;

// Counted in characters
pub const MAX_TITLE_LEN: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("title cannot be empty")]
    EmptyTitle,
    #[error("title is {len} characters long, at most {MAX_TITLE_LEN} are allowed")]
    TitleTooLong { len: usize },
    #[error("unknown priority '{0}', expected one of: low, med, high")]
    UnknownPriority(String),
    #[error("unknown status '{0}', expected one of: todo, doing, done")]
    UnknownStatus(String),
    #[error("invalid date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),
}

// Not-found is not an error here; operations report it as Ok(None) or Ok(false)
#[derive(Debug, Error)]
pub enum TaskError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),
    #[error("stored tags are not a valid JSON array: {0}")]
    Tags(#[from] serde_json::Error),
    #[error("cannot prepare the database location: {0}")]
    Io(#[from] std::io::Error),
}

impl TaskError {
    pub fn is_validation(&self) -> bool {
        matches!(self, TaskError::Validation(_))
    }
}

pub type Result<T, E = TaskError> = std::result::Result<T, E>;
