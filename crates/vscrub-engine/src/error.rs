use core::fmt;
use std::io;
use std::path::PathBuf;

use vscrub_domain::{FormatTag, ReasonCode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Open,
    Create,
    CreateDir,
    Read,
    Write,
    Finalize,
}

impl Stage {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Create => "create",
            Self::CreateDir => "create_dir",
            Self::Read => "read",
            Self::Write => "write",
            Self::Finalize => "finalize",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure while transforming one stream. Entry names are already scrubbed.
#[derive(Debug, thiserror::Error)]
pub enum ScrubError {
    #[error("{stage} failed for {entry}: {source}")]
    Io {
        stage: Stage,
        entry: String,
        #[source]
        source: io::Error,
    },
    #[error("malformed {format} stream {entry}: {detail}")]
    Format {
        format: FormatTag,
        entry: String,
        detail: String,
    },
    #[error("staging buffer failed for {entry}: {source}")]
    Staging {
        entry: String,
        #[source]
        source: io::Error,
    },
    #[error("in {entry}: {source}")]
    Nested {
        entry: String,
        #[source]
        source: Box<ScrubError>,
    },
}

impl ScrubError {
    pub fn io(stage: Stage, entry: &str, source: io::Error) -> Self {
        Self::Io {
            stage,
            entry: entry.to_string(),
            source,
        }
    }

    pub fn format(format: FormatTag, entry: &str, detail: impl fmt::Display) -> Self {
        Self::Format {
            format,
            entry: entry.to_string(),
            detail: detail.to_string(),
        }
    }

    pub fn staging(entry: &str, source: io::Error) -> Self {
        Self::Staging {
            entry: entry.to_string(),
            source,
        }
    }

    /// Attaches the enclosing container's name.
    pub fn within(self, entry: &str) -> Self {
        Self::Nested {
            entry: entry.to_string(),
            source: Box::new(self),
        }
    }

    pub fn innermost(&self) -> &ScrubError {
        match self {
            Self::Nested { source, .. } => source.innermost(),
            other => other,
        }
    }

    pub fn reason_code(&self) -> ReasonCode {
        match self.innermost() {
            Self::Io { .. } => ReasonCode::IoError,
            Self::Format { .. } => ReasonCode::FormatError,
            Self::Staging { .. } => ReasonCode::StagingError,
            Self::Nested { .. } => ReasonCode::InternalError,
        }
    }
}

/// Setup failures that stop a tree run before any file is processed.
#[derive(Debug, thiserror::Error)]
pub enum TreeError {
    #[error("input root {} is not a readable directory: {source}", path.display())]
    InputRoot {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot create output root {}: {source}", path.display())]
    OutputRoot {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot start worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

impl TreeError {
    pub fn reason_code(&self) -> ReasonCode {
        match self {
            Self::InputRoot { .. } | Self::OutputRoot { .. } => ReasonCode::IoError,
            Self::WorkerPool(_) => ReasonCode::InternalError,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_errors_report_innermost_reason_and_full_context() {
        let err = ScrubError::format(FormatTag::Zip, "inner.zip", "invalid central directory")
            .within("middle.tar")
            .within("outer.tgz");

        assert_eq!(err.reason_code(), ReasonCode::FormatError);
        let text = err.to_string();
        assert!(text.starts_with("in outer.tgz: in middle.tar: malformed ZIP stream inner.zip"));
    }

    #[test]
    fn io_errors_name_their_stage() {
        let err = ScrubError::io(
            Stage::Write,
            "log.txt",
            io::Error::new(io::ErrorKind::WriteZero, "disk full"),
        );
        assert_eq!(err.reason_code(), ReasonCode::IoError);
        assert_eq!(err.to_string(), "write failed for log.txt: disk full");
    }
}
