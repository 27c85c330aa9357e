//! Error handling and display for the CLI.

use colored::Colorize;
use thiserror::Error;

/// CLI-specific errors.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("{message}")]
    Api { status: u16, message: String },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl CliError {
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }
}

/// Result type for client operations.
pub type CliResult<T> = Result<T, CliError>;

/// Print an error in a user-friendly format, with a hint where one helps.
pub fn print_error(err: &anyhow::Error) {
    eprintln!("{} {}", "Error:".red().bold(), err);

    if let Some(cli_err) = err.downcast_ref::<CliError>() {
        match cli_err {
            CliError::Network(_) => {
                eprintln!(
                    "\n{}",
                    "Hint: is the control plane running? Start it with `orca serve`.".yellow()
                );
            }
            CliError::Api { status, .. } if *status == 404 => {
                eprintln!(
                    "\n{}",
                    "Hint: check the resource name and --project flag.".yellow()
                );
            }
            _ => {}
        }
    }
}
