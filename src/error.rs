use std::{io, path::PathBuf};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed invocation.
    #[error("{0}")]
    Usage(String),

    #[error("directory {} cannot be combined with other inputs", path.display())]
    DirectoryNotAlone { path: PathBuf },

    /// An input could not be stat'ed, opened or read.
    #[error("{}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// An input violates the gzip layout the size probe relies on.
    #[error("{}: {reason}", path.display())]
    Format { path: PathBuf, reason: String },

    #[error("failed writing entry {}: {source}", name.display())]
    Archive {
        name: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed writing archive: {0}")]
    Output(#[source] io::Error),

    #[error("invalid value {value:?} for {var}")]
    Config { var: &'static str, value: String },
}

impl Error {
    pub(crate) fn filesystem(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::Filesystem {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn format(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::Format {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn is_usage(&self) -> bool {
        matches!(self, Error::Usage(_) | Error::DirectoryNotAlone { .. })
    }

    /// Process exit status for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            Error::Usage(_) | Error::DirectoryNotAlone { .. } | Error::Config { .. } => 2,
            _ => 1,
        }
    }
}
