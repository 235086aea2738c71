use std::path::PathBuf;

use serde::Deserialize;

const APP_DIR: &str = ".todo_cli";
const DB_FILE: &str = "todo.db";
const LOG_FILE: &str = "todo.log";

// Settings read from `TODO_*` environment variables.
#[derive(Deserialize, Debug, Clone)]
pub struct AppConfig {
    // `TODO_DB_PATH`
    pub db_path: Option<PathBuf>,
    // `TODO_LOG`, an `EnvFilter` directive such as `debug` or `todo_tracker=info`
    #[serde(default = "default_log")]
    pub log: String,
}

impl AppConfig {
    // Loads configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::Environment::with_prefix("TODO"))
            .build()?;

        let config: AppConfig = settings.try_deserialize()?;
        Ok(config)
    }

    // The database file: `TODO_DB_PATH`, else `~/.todo_cli/todo.db`.
    pub fn database_path(&self) -> PathBuf {
        match &self.db_path {
            Some(path) => path.clone(),
            None => default_app_dir().join(DB_FILE),
        }
    }

    // Log file for the window, placed next to the database.
    pub fn log_path(&self) -> PathBuf {
        let db_path = self.database_path();
        match db_path.parent() {
            Some(dir) => dir.join(LOG_FILE),
            None => PathBuf::from(LOG_FILE),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            log: default_log(),
        }
    }
}

fn default_log() -> String {
    "warn".to_string()
}

// Falls back to the working directory when HOME is unset
fn default_app_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_default()
        .join(APP_DIR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_db_path_wins() {
        let config = AppConfig {
            db_path: Some(PathBuf::from("/tmp/tasks/my.db")),
            log: default_log(),
        };
        assert_eq!(config.database_path(), PathBuf::from("/tmp/tasks/my.db"));
        assert_eq!(config.log_path(), PathBuf::from("/tmp/tasks/todo.log"));
    }

    #[test]
    fn default_db_lives_in_the_app_dir() {
        let config = AppConfig::default();
        let path = config.database_path();
        assert!(path.ends_with(".todo_cli/todo.db"));
    }
}
