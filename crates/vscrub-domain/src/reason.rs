use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReasonCode {
    IoError,
    FormatError,
    StagingError,
    UnclassifiedContent,
    Usage,
    SourceError,
    ConfigError,
    InternalError,
}

impl ReasonCode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::IoError => "IO_ERROR",
            Self::FormatError => "FORMAT_ERROR",
            Self::StagingError => "STAGING_ERROR",
            Self::UnclassifiedContent => "UNCLASSIFIED_CONTENT",
            Self::Usage => "USAGE",
            Self::SourceError => "SOURCE_ERROR",
            Self::ConfigError => "CONFIG_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
