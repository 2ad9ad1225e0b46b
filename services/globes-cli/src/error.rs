//! CLI-specific error types

use thiserror::Error;

/// Errors in how the command line itself was written.
///
/// API failures are `travel_api::Error` and reach `main` unchanged so the
/// exit code can reflect an expired session.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum Error {
    #[error("missing command")]
    MissingCommand,

    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("{command}: missing argument <{argument}>")]
    MissingArgument {
        command: String,
        argument: &'static str,
    },

    #[error("{command}: unexpected argument {argument:?}")]
    UnexpectedArgument { command: String, argument: String },

    #[error("--config requires a path")]
    MissingConfigPath,
}

/// Result alias using CLI Error
pub type Result<T> = std::result::Result<T, Error>;
