//! Stream classification.
//!
//! Names decide first: the last extension of the final path component is
//! looked up case-insensitively. Content sniffing only runs for names with no
//! recognized extension, and only when enabled.

use std::io::{self, Read};

use vscrub_domain::{FormatTag, ScrubConfig};

pub const SNIFF_LEN: usize = 512;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const USTAR_MAGIC_OFFSET: usize = 257;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classifier {
    binary_extensions: Vec<String>,
    sniff_unknown: bool,
}

impl Classifier {
    pub fn new(config: &ScrubConfig) -> Self {
        let binary_extensions = config
            .binary_extensions
            .iter()
            .map(|ext| ext.trim_start_matches('.').to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect();
        Self {
            binary_extensions,
            sniff_unknown: config.sniff_unknown,
        }
    }

    pub fn sniff_unknown(&self) -> bool {
        self.sniff_unknown
    }

    /// Returns `None` when the name carries no recognized extension; callers
    /// treat that as plain text or sniff the content.
    pub fn classify_name(&self, name: &str) -> Option<FormatTag> {
        let ext = extension_of(name)?.to_ascii_lowercase();
        match ext.as_str() {
            "zip" => Some(FormatTag::Zip),
            "gz" => Some(FormatTag::Gzip),
            "tgz" => Some(FormatTag::Tgz),
            "tar" => Some(FormatTag::Tar),
            other if self.binary_extensions.iter().any(|b| b == other) => {
                Some(FormatTag::BinaryOpaque)
            }
            _ => None,
        }
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(&ScrubConfig::default())
    }
}

pub fn extension_of(name: &str) -> Option<&str> {
    let file_name = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let (_, ext) = file_name.rsplit_once('.')?;
    if ext.is_empty() {
        return None;
    }
    Some(ext)
}

/// Name used to classify the decompressed stream of a gzip layer.
pub fn inner_name(tag: FormatTag, name: &str) -> String {
    let stem = match extension_of(name) {
        Some(ext) => &name[..name.len() - ext.len() - 1],
        None => name,
    };
    match tag {
        FormatTag::Gzip => stem.to_string(),
        FormatTag::Tgz => format!("{stem}.tar"),
        _ => name.to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sniffed {
    Format(FormatTag),
    /// Binary content with no recognized container signature.
    Unclassified,
}

pub fn sniff_format(probe: &[u8]) -> Sniffed {
    // Gzip payloads seen in support bundles are tar archives.
    if is_gzip_magic(probe) {
        return Sniffed::Format(FormatTag::Tgz);
    }
    if is_zip_magic(probe) {
        return Sniffed::Format(FormatTag::Zip);
    }
    if is_ustar_header(probe) {
        return Sniffed::Format(FormatTag::Tar);
    }
    if looks_binary(probe) {
        return Sniffed::Unclassified;
    }
    Sniffed::Format(FormatTag::PlainText)
}

pub fn is_gzip_magic(probe: &[u8]) -> bool {
    probe.starts_with(&GZIP_MAGIC)
}

pub fn is_zip_magic(probe: &[u8]) -> bool {
    if probe.len() < 4 || probe[0] != b'P' || probe[1] != b'K' {
        return false;
    }
    matches!((probe[2], probe[3]), (1, 2) | (3, 4) | (5, 6) | (7, 8))
}

pub fn is_ustar_header(probe: &[u8]) -> bool {
    probe.len() >= USTAR_MAGIC_OFFSET + 5
        && &probe[USTAR_MAGIC_OFFSET..USTAR_MAGIC_OFFSET + 5] == b"ustar"
}

/// Control bytes that never occur in text files.
pub fn looks_binary(probe: &[u8]) -> bool {
    probe
        .iter()
        .any(|&b| matches!(b, 0x00..=0x08 | 0x0B | 0x0E..=0x1A | 0x1C..=0x1F))
}

/// Reads up to [`SNIFF_LEN`] bytes, stopping early only at end of stream.
pub fn read_probe(reader: &mut dyn Read) -> io::Result<Vec<u8>> {
    let mut probe = Vec::with_capacity(SNIFF_LEN);
    reader.take(SNIFF_LEN as u64).read_to_end(&mut probe)?;
    Ok(probe)
}
