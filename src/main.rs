use std::io;
use std::process::ExitCode;

use clap::Parser;
use todo_tracker::app::{storage::Storage, ui};
use todo_tracker::cli::{self, Cli, Commands};
use todo_tracker::config::AppConfig;
use todo_tracker::logging;

// Parse the command, open the store once and hand it to the chosen front end.
fn main() -> anyhow::Result<ExitCode> {
    let args = Cli::parse();
    let config = AppConfig::from_env()?;
    let db_path = args.db.clone().unwrap_or_else(|| config.database_path());

    if matches!(args.command, Commands::Window) {
        logging::init_file(&config.log, &config.log_path())?;
    } else {
        logging::init_stderr(&config.log)?;
    }

    // Initialize the database; creating the table is a no-op after the first run
    let storage = Storage::open(&db_path)?;
    storage.create_table_if_not_exists()?;

    if matches!(args.command, Commands::Window) {
        ui::launch(&storage)?;
        return Ok(ExitCode::SUCCESS);
    }

    let mut stdout = io::stdout().lock();
    match cli::run(args.command, &storage, &mut stdout) {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(err) => {
            tracing::debug!(error = ?err, "command failed");
            eprintln!("Error: {err}");
            Ok(ExitCode::from(err.exit_code()))
        }
    }
}
