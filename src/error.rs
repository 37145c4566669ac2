//! Crate-wide error type.
//!
//! Every failure the device can hit is local and non-fatal: a bad command
//! line, a rejected HTTP request, a missing file, or a failed network
//! association. Callers report the error on whatever channel the request came
//! from and keep running.

use derive_more::{Display, Error, From};

/// A specialized `Result` where the error is this crate's `Error` type.
pub type Result<T, E = Error> = core::result::Result<T, E>;

#[derive(Debug, Display, Error, From)]
pub enum Error {
    /// A command line was missing a required key or carried an invalid value.
    #[display("{_0}")]
    MalformedCommand(#[error(not(source))] String),

    #[display("Command not recognized.")]
    UnknownCommand,

    /// HTTP request without a valid user id.
    #[display("The User Id was missing or was not a valid User Id.")]
    UnauthorizedCommand,

    /// Storage is not mounted or the file does not exist yet.
    #[display("{_0} could not be read. It may not yet exist.")]
    PersistenceUnavailable(#[error(not(source))] &'static str),

    #[display("Could not connect to '{_0}'.")]
    NetworkAssociationFailure(#[error(not(source))] String),

    #[display("I/O error: {_0}")]
    #[from]
    Io(std::io::Error),
}

impl Error {
    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedCommand(message.into())
    }
}
