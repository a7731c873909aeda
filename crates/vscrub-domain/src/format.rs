use core::fmt;

/// Transformation branch selected for a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormatTag {
    PlainText,
    Gzip,
    /// Gzip-wrapped tar; the inner stream is renamed with a `.tar` suffix.
    Tgz,
    Tar,
    Zip,
    BinaryOpaque,
}

impl FormatTag {
    pub const fn is_container(self) -> bool {
        matches!(self, Self::Gzip | Self::Tgz | Self::Tar | Self::Zip)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PlainText => "PLAIN_TEXT",
            Self::Gzip => "GZIP",
            Self::Tgz => "TGZ",
            Self::Tar => "TAR",
            Self::Zip => "ZIP",
            Self::BinaryOpaque => "BINARY_OPAQUE",
        }
    }
}

impl fmt::Display for FormatTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
