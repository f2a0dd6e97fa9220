use std::path::PathBuf;

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Broad failure classes, used by callers to decide what is fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing or malformed value in `session.json`. Fatal to a load.
    Configuration,
    /// Session path missing or not laid out as a session. Fatal to a load.
    Directory,
    /// One measurement file is unusable. Skipped, the load continues.
    RecordParse,
    /// Dose-rate script failed to load or to run. Never fatal.
    Script,
    /// Record index past the end of the list.
    Index,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("directory does not exist: {}", .0.display())]
    DirectoryNotFound(PathBuf),

    #[error("directory is not a valid session: {}", .0.display())]
    DirectoryNotASession(PathBuf),

    #[error("unable to read directory {}: {source}", path.display())]
    UnreadableDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid session file {}: {reason}", path.display())]
    InvalidSessionFile { path: PathBuf, reason: String },

    #[error("missing required field: {0}")]
    MissingField(String),

    #[error("field {field} is not {expected}")]
    InvalidField {
        field: String,
        expected: &'static str,
    },

    #[error("malformed record {}: {reason}", path.display())]
    MalformedRecord { path: PathBuf, reason: String },

    #[error("loading doserate script {name} failed: {reason}")]
    ScriptLoad { name: String, reason: String },

    #[error("no doserate script loaded")]
    ScriptNotLoaded,

    #[error("doserate script failed: {0}")]
    ScriptRuntime(String),

    #[error("spectrum index {index} out of bounds (count {count})")]
    IndexOutOfBounds { index: usize, count: usize },
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidSessionFile { .. } | Error::MissingField(_) | Error::InvalidField { .. } => {
                ErrorKind::Configuration
            }
            Error::DirectoryNotFound(_)
            | Error::DirectoryNotASession(_)
            | Error::UnreadableDirectory { .. } => ErrorKind::Directory,
            Error::MalformedRecord { .. } => ErrorKind::RecordParse,
            Error::ScriptLoad { .. } | Error::ScriptNotLoaded | Error::ScriptRuntime(_) => {
                ErrorKind::Script
            }
            Error::IndexOutOfBounds { .. } => ErrorKind::Index,
        }
    }

    /// Whether this error aborts a session load.
    pub fn is_fatal(&self) -> bool {
        matches!(self.kind(), ErrorKind::Configuration | ErrorKind::Directory)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxonomy() {
        assert_eq!(Error::MissingField("Session:Name".into()).kind(), ErrorKind::Configuration);
        assert!(Error::DirectoryNotASession(PathBuf::from("/x")).is_fatal());
        assert!(!Error::ScriptRuntime("boom".into()).is_fatal());
        let err = Error::MalformedRecord {
            path: PathBuf::from("json/1.json"),
            reason: "bad".into(),
        };
        assert_eq!(err.kind(), ErrorKind::RecordParse);
        assert!(!err.is_fatal());
    }

    #[test]
    fn messages_name_the_offender() {
        let err = Error::MissingField("Detector:CurrentHV".into());
        assert_eq!(err.to_string(), "missing required field: Detector:CurrentHV");
        let err = Error::IndexOutOfBounds { index: 7, count: 3 };
        assert_eq!(err.to_string(), "spectrum index 7 out of bounds (count 3)");
    }
}
