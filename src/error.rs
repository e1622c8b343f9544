//! error types shared by parsing, evaluation and session management

use std::io;
use std::path::PathBuf;
use std::sync::Mutex;

use crate::codes;
use crate::conditions::ParseError;

/// error returned by any fallible operation in this crate
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// the condition text is not a valid expression
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// a contract violation at a state-mutation boundary
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// the filesystem could not be accessed
    #[error("an error was encountered while accessing the path \"{}\": {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// the version fields of an executable could not be read
    #[error("an error was encountered while reading the version fields of \"{}\": {message}", path.display())]
    Executable { path: PathBuf, message: String },

    /// a thread panicked while holding a session lock
    #[error("a session lock was poisoned by a panicking thread")]
    PoisonedLock,
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    /// the boundary outcome code for this error
    pub fn code(&self) -> i32 {
        match self {
            Error::Parse(_) => codes::ERROR_PARSING_ERROR,
            Error::InvalidArgument(_) => codes::ERROR_INVALID_ARGS,
            Error::Io { .. } => codes::ERROR_IO_ERROR,
            Error::Executable { .. } => codes::ERROR_PE_PARSING_ERROR,
            Error::PoisonedLock => codes::ERROR_POISONED_THREAD_LOCK,
        }
    }

    /// true for failures of the environment rather than of the caller's input
    pub fn is_evaluation_error(&self) -> bool {
        matches!(
            self,
            Error::Io { .. } | Error::Executable { .. } | Error::PoisonedLock
        )
    }
}

impl<T> From<std::sync::PoisonError<T>> for Error {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        Error::PoisonedLock
    }
}

/// holds the message of the most recent failure
///
/// the message is owned here and stays valid until the next failure overwrites it
/// or the owner is dropped
#[derive(Debug, Default)]
pub struct ErrorRecord {
    message: Mutex<Option<String>>,
}

impl ErrorRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// replace the stored message with a description of `error`
    pub fn record(&self, error: &Error) {
        let message = error.to_string();
        tracing::debug!(code = error.code(), %message, "recording error");

        // a poisoned record still holds a plain string, so keep using it
        let mut slot = match self.message.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *slot = Some(message);
    }

    /// the most recent failure message, if any failure happened
    pub fn message(&self) -> Option<String> {
        match self.message.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// forget the stored message
    pub fn clear(&self) {
        let mut slot = match self.message.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *slot = None;
    }

    /// pass a result through, recording its error if it failed and clearing
    /// the stored message if it succeeded
    pub fn track<T>(&self, result: Result<T, Error>) -> Result<T, Error> {
        match &result {
            Ok(_) => self.clear(),
            Err(e) => self.record(e),
        }
        result
    }
}
