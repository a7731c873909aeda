use std::borrow::Cow;
use std::collections::BTreeMap;
use std::io::{self, Cursor, Read, Write};

use flate2::Compression;
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use tar::EntryType;
use vscrub_domain::{FormatTag, LogContext, ReasonCode, ScrubConfig, log_warn};
use vscrub_index::SubstitutionIndex;
use zip::result::ZipError;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::classify::{Classifier, Sniffed, inner_name, read_probe, sniff_format};
use crate::error::{ScrubError, Stage};
use crate::scrub::{copy_verbatim, scrub_lines};
use crate::staging::{StagingArea, StagingBuffer};

const ZIP64_THRESHOLD: u64 = u32::MAX as u64;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WalkStats {
    pub text_streams: u64,
    pub lines_scrubbed: u64,
    pub binary_streams: u64,
    pub unclassified_streams: u64,
    pub containers: u64,
    pub tar_directories_dropped: u64,
    pub zip_directories_recreated: u64,
}

impl WalkStats {
    pub fn merge(&mut self, other: &WalkStats) {
        self.text_streams += other.text_streams;
        self.lines_scrubbed += other.lines_scrubbed;
        self.binary_streams += other.binary_streams;
        self.unclassified_streams += other.unclassified_streams;
        self.containers += other.containers;
        self.tar_directories_dropped += other.tar_directories_dropped;
        self.zip_directories_recreated += other.zip_directories_recreated;
    }

    pub fn counters(&self) -> BTreeMap<&'static str, u64> {
        let mut counters = BTreeMap::new();
        counters.insert("text_streams", self.text_streams);
        counters.insert("lines_scrubbed", self.lines_scrubbed);
        counters.insert("binary_streams", self.binary_streams);
        counters.insert("unclassified_streams", self.unclassified_streams);
        counters.insert("containers", self.containers);
        counters.insert("tar_directories_dropped", self.tar_directories_dropped);
        counters.insert("zip_directories_recreated", self.zip_directories_recreated);
        counters
    }
}

/// Recursively rewrites one named stream.
///
/// Containers are opened, each member is walked under its own name, and the
/// container is rebuilt in the same format. Member names and metadata are
/// preserved; only text content changes.
pub struct ArchiveWalker<'a> {
    index: &'a SubstitutionIndex,
    classifier: Classifier,
    staging: StagingArea,
    log: LogContext<'a>,
}

impl<'a> ArchiveWalker<'a> {
    pub fn new(index: &'a SubstitutionIndex, config: &ScrubConfig, log: LogContext<'a>) -> Self {
        Self {
            index,
            classifier: Classifier::new(config),
            staging: StagingArea::new(config.staging_dir.clone()),
            log,
        }
    }

    pub fn index(&self) -> &'a SubstitutionIndex {
        self.index
    }

    pub fn scrub_stream(
        &self,
        name: &str,
        reader: &mut dyn Read,
        writer: &mut dyn Write,
    ) -> Result<WalkStats, ScrubError> {
        let mut stats = WalkStats::default();
        self.walk(name, reader, writer, &mut stats)?;
        Ok(stats)
    }

    fn display(&self, name: &str) -> String {
        self.index.display_name(name)
    }

    fn walk(
        &self,
        name: &str,
        reader: &mut dyn Read,
        writer: &mut dyn Write,
        stats: &mut WalkStats,
    ) -> Result<(), ScrubError> {
        if let Some(tag) = self.classifier.classify_name(name) {
            return self.dispatch(tag, name, reader, writer, stats);
        }
        if !self.classifier.sniff_unknown() {
            return self.dispatch(FormatTag::PlainText, name, reader, writer, stats);
        }

        let probe = read_probe(reader)
            .map_err(|e| ScrubError::io(Stage::Read, &self.display(name), e))?;
        let sniffed = sniff_format(&probe);
        let mut replay = Cursor::new(probe).chain(reader);
        match sniffed {
            Sniffed::Format(tag) => self.dispatch(tag, name, &mut replay, writer, stats),
            Sniffed::Unclassified => {
                let display = self.display(name);
                log_warn(
                    self.log,
                    "unclassified_content_copied",
                    ReasonCode::UnclassifiedContent,
                    Some(&display),
                );
                copy_verbatim(&mut replay, writer).map_err(|e| e.at(&display))?;
                stats.unclassified_streams += 1;
                Ok(())
            }
        }
    }

    fn dispatch(
        &self,
        tag: FormatTag,
        name: &str,
        reader: &mut dyn Read,
        writer: &mut dyn Write,
        stats: &mut WalkStats,
    ) -> Result<(), ScrubError> {
        match tag {
            FormatTag::PlainText => {
                let lines = scrub_lines(reader, writer, self.index)
                    .map_err(|e| e.at(&self.display(name)))?;
                stats.text_streams += 1;
                stats.lines_scrubbed += lines;
                Ok(())
            }
            FormatTag::BinaryOpaque => {
                copy_verbatim(reader, writer).map_err(|e| e.at(&self.display(name)))?;
                stats.binary_streams += 1;
                Ok(())
            }
            FormatTag::Gzip | FormatTag::Tgz => self.walk_gzip(tag, name, reader, writer, stats),
            FormatTag::Tar => self.walk_tar(name, reader, writer, stats),
            FormatTag::Zip => self.walk_zip(name, reader, writer, stats),
        }
    }

    fn walk_gzip(
        &self,
        tag: FormatTag,
        name: &str,
        reader: &mut dyn Read,
        writer: &mut dyn Write,
        stats: &mut WalkStats,
    ) -> Result<(), ScrubError> {
        let display = self.display(name);
        let inner = inner_name(tag, name);
        let mut decoder = MultiGzDecoder::new(reader);
        let mut encoder = GzEncoder::new(writer, Compression::default());

        self.walk(&inner, &mut decoder, &mut encoder, stats)
            .map_err(|e| match e {
                ScrubError::Io {
                    stage: Stage::Read,
                    source,
                    ..
                } if is_decode_error(&source) => ScrubError::format(tag, &display, source),
                other => other,
            })?;
        encoder
            .finish()
            .map_err(|e| ScrubError::io(Stage::Finalize, &display, e))?;
        stats.containers += 1;
        Ok(())
    }

    fn walk_tar(
        &self,
        name: &str,
        reader: &mut dyn Read,
        writer: &mut dyn Write,
        stats: &mut WalkStats,
    ) -> Result<(), ScrubError> {
        let display = self.display(name);
        let malformed = |e: io::Error| ScrubError::format(FormatTag::Tar, &display, e);
        let mut archive = tar::Archive::new(reader);
        let mut builder = tar::Builder::new(writer);

        for entry in archive.entries().map_err(malformed)? {
            let mut entry = entry.map_err(malformed)?;
            let raw_name = entry.path_bytes().into_owned();
            let raw_link = entry.link_name_bytes().map(Cow::into_owned);
            let entry_name = String::from_utf8_lossy(&raw_name).into_owned();
            let header = entry.header().clone();
            let entry_type = header.entry_type();

            if entry_type.is_dir() {
                stats.tar_directories_dropped += 1;
                continue;
            }

            if entry_type.is_file() || entry_type.is_gnu_sparse() || entry_type.is_contiguous() {
                self.stage_tar_member(&entry_name, &mut entry, header, &raw_name, &mut builder, stats)
                    .map_err(|e| e.within(&display))?;
                continue;
            }

            // Links carry no payload; every other entry keeps its payload as is.
            let appended = if entry_type.is_symlink() || entry_type.is_hard_link() {
                append_raw_member(&mut builder, header, &raw_name, raw_link.as_deref(), 0, &mut io::empty())
            } else {
                let size = entry.size();
                append_raw_member(&mut builder, header, &raw_name, None, size, &mut entry)
            };
            appended.map_err(|e| {
                ScrubError::io(Stage::Write, &self.display(&entry_name), e).within(&display)
            })?;
        }

        builder
            .into_inner()
            .map_err(|e| ScrubError::io(Stage::Finalize, &display, e))?;
        stats.containers += 1;
        Ok(())
    }

    fn stage_tar_member(
        &self,
        entry_name: &str,
        entry: &mut dyn Read,
        mut header: tar::Header,
        name: &[u8],
        builder: &mut tar::Builder<&mut dyn Write>,
        stats: &mut WalkStats,
    ) -> Result<(), ScrubError> {
        let entry_display = self.display(entry_name);
        let staging_failed = |e: io::Error| ScrubError::staging(&entry_display, e);

        let mut buffer = self.staging.create().map_err(staging_failed)?;
        self.walk(entry_name, entry, &mut buffer, stats)?;
        let size = buffer.rewind().map_err(staging_failed)?;

        if header.entry_type().is_gnu_sparse() {
            clear_sparse_map(&mut header);
        }
        if !header.entry_type().is_file() {
            header.set_entry_type(EntryType::Regular);
        }
        append_raw_member(builder, header, name, None, size, &mut buffer)
            .map_err(|e| ScrubError::io(Stage::Write, &entry_display, e))
    }

    fn walk_zip(
        &self,
        name: &str,
        reader: &mut dyn Read,
        writer: &mut dyn Write,
        stats: &mut WalkStats,
    ) -> Result<(), ScrubError> {
        let display = self.display(name);
        let staging_failed = |e: io::Error| ScrubError::staging(&display, e);

        let mut input = self.staging.create().map_err(staging_failed)?;
        copy_verbatim(reader, &mut input).map_err(|e| e.at(&display))?;
        input.rewind().map_err(staging_failed)?;
        let mut archive =
            ZipArchive::new(&mut input).map_err(|e| zip_read_error(&display, e))?;

        let mut output = self.staging.create().map_err(staging_failed)?;
        self.rebuild_zip(&display, &mut archive, &mut output, stats)?;

        output.rewind().map_err(staging_failed)?;
        copy_verbatim(&mut output, writer).map_err(|e| e.at(&display))?;
        stats.containers += 1;
        Ok(())
    }

    fn rebuild_zip(
        &self,
        display: &str,
        archive: &mut ZipArchive<&mut StagingBuffer>,
        output: &mut StagingBuffer,
        stats: &mut WalkStats,
    ) -> Result<(), ScrubError> {
        let mut zip = ZipWriter::new(output);
        for i in 0..archive.len() {
            let mut file = archive
                .by_index(i)
                .map_err(|e| zip_read_error(display, e))?;
            let entry_name = file.name().to_string();
            let entry_display = self.display(&entry_name);
            let options = member_options(&file);

            if file.is_dir() {
                zip.add_directory(entry_name.as_str(), options)
                    .map_err(|e| zip_write_error(&entry_display, e).within(display))?;
                stats.zip_directories_recreated += 1;
                continue;
            }

            if file.unix_mode().is_some_and(is_unix_symlink) {
                copy_zip_symlink(&mut file, &entry_name, &entry_display, options, &mut zip)
                    .map_err(|e| e.within(display))?;
                stats.binary_streams += 1;
                continue;
            }

            zip.start_file(entry_name.as_str(), options)
                .map_err(|e| zip_write_error(&entry_display, e).within(display))?;
            self.walk(&entry_name, &mut file, &mut zip, stats)
                .map_err(|e| e.within(display))?;
        }
        zip.finish()
            .map_err(|e| zip_write_error(display, e))?;
        Ok(())
    }
}

/// Writes a member with its original name bytes. A GNU long-name or
/// long-link record goes first when the header field cannot carry the
/// whole value.
fn append_raw_member(
    builder: &mut tar::Builder<&mut dyn Write>,
    mut header: tar::Header,
    name: &[u8],
    link: Option<&[u8]>,
    size: u64,
    data: &mut dyn Read,
) -> io::Result<()> {
    let name_fits = *header.path_bytes() == *name;
    if !name_fits {
        append_long_record(builder, EntryType::GNULongName, name)?;
        fill_field(&mut header.as_old_mut().name, name);
        if let Some(ustar) = header.as_ustar_mut() {
            ustar.prefix.fill(0);
        }
    }
    if let Some(link) = link {
        let link_fits = header.link_name_bytes().as_deref() == Some(link);
        if !link_fits {
            append_long_record(builder, EntryType::GNULongLink, link)?;
            fill_field(&mut header.as_old_mut().linkname, link);
        }
    }
    header.set_size(size);
    header.set_cksum();
    builder.append(&header, data)
}

fn append_long_record(
    builder: &mut tar::Builder<&mut dyn Write>,
    kind: EntryType,
    value: &[u8],
) -> io::Result<()> {
    let mut header = tar::Header::new_gnu();
    fill_field(&mut header.as_old_mut().name, b"././@LongLink");
    header.set_mode(0o644);
    header.set_uid(0);
    header.set_gid(0);
    header.set_mtime(0);
    header.set_entry_type(kind);
    header.set_size(value.len() as u64 + 1);
    header.set_cksum();
    builder.append(&header, value.chain(&[0_u8][..]))
}

/// Truncating copy into a NUL-padded header field.
fn fill_field(field: &mut [u8], value: &[u8]) {
    let len = value.len().min(field.len());
    field.fill(0);
    field[..len].copy_from_slice(&value[..len]);
}

fn clear_sparse_map(header: &mut tar::Header) {
    if let Some(gnu) = header.as_gnu_mut() {
        for block in gnu.sparse.iter_mut() {
            block.offset = [0; 12];
            block.numbytes = [0; 12];
        }
        gnu.isextended = [0];
        gnu.realsize = [0; 12];
    }
}

fn is_unix_symlink(mode: u32) -> bool {
    mode & 0o170000 == 0o120000
}

/// Re-creates a zip symlink member; the target is stored bytes, never text.
fn copy_zip_symlink(
    file: &mut zip::read::ZipFile<'_>,
    entry_name: &str,
    entry_display: &str,
    options: FileOptions,
    zip: &mut ZipWriter<&mut StagingBuffer>,
) -> Result<(), ScrubError> {
    let mut target = Vec::new();
    file.read_to_end(&mut target)
        .map_err(|e| ScrubError::io(Stage::Read, entry_display, e))?;
    match String::from_utf8(target) {
        Ok(target) => zip
            .add_symlink(entry_name, target, options)
            .map_err(|e| zip_write_error(entry_display, e)),
        Err(raw) => {
            zip.start_file(entry_name, options)
                .map_err(|e| zip_write_error(entry_display, e))?;
            zip.write_all(raw.as_bytes())
                .map_err(|e| ScrubError::io(Stage::Write, entry_display, e))
        }
    }
}

fn member_options(file: &zip::read::ZipFile<'_>) -> FileOptions {
    let method = match file.compression() {
        CompressionMethod::Stored => CompressionMethod::Stored,
        _ => CompressionMethod::Deflated,
    };
    let mut options = FileOptions::default()
        .compression_method(method)
        .last_modified_time(file.last_modified())
        .large_file(file.size() >= ZIP64_THRESHOLD);
    if let Some(mode) = file.unix_mode() {
        options = options.unix_permissions(mode);
    }
    options
}

fn zip_read_error(entry: &str, err: ZipError) -> ScrubError {
    match err {
        ZipError::Io(e) => ScrubError::io(Stage::Read, entry, e),
        ZipError::InvalidArchive(msg) => ScrubError::format(FormatTag::Zip, entry, msg),
        ZipError::UnsupportedArchive(msg) => ScrubError::format(FormatTag::Zip, entry, msg),
        ZipError::FileNotFound => ScrubError::format(FormatTag::Zip, entry, "member not found"),
    }
}

fn zip_write_error(entry: &str, err: ZipError) -> ScrubError {
    match err {
        ZipError::Io(e) => ScrubError::io(Stage::Write, entry, e),
        other => ScrubError::format(FormatTag::Zip, entry, other),
    }
}

fn is_decode_error(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::InvalidInput | io::ErrorKind::InvalidData | io::ErrorKind::UnexpectedEof
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symlink_mode_is_recognized_by_file_type_bits() {
        assert!(is_unix_symlink(0o120777));
        assert!(!is_unix_symlink(0o100644));
        assert!(!is_unix_symlink(0o040755));
        assert!(!is_unix_symlink(0o777));
    }

    #[test]
    fn fill_field_truncates_and_clears_stale_bytes() {
        let mut field = [b'x'; 8];
        fill_field(&mut field, b"abc");
        assert_eq!(&field, b"abc\0\0\0\0\0");

        fill_field(&mut field, b"0123456789");
        assert_eq!(&field, b"01234567");
    }

    #[test]
    fn long_name_is_written_ahead_of_the_member() {
        let name = format!("/{}/file.log", "d".repeat(120));
        let mut out = Vec::new();
        {
            let mut builder = tar::Builder::new(&mut out as &mut dyn Write);
            let mut header = tar::Header::new_gnu();
            header.set_entry_type(EntryType::Regular);
            header.set_mode(0o644);
            append_raw_member(&mut builder, header, name.as_bytes(), None, 2, &mut &b"ok"[..])
                .expect("append");
            builder.finish().expect("finish");
        }

        let mut archive = tar::Archive::new(out.as_slice());
        let mut entries = archive.entries().expect("entries");
        let mut entry = entries.next().expect("one entry").expect("valid entry");
        assert_eq!(&*entry.path_bytes(), name.as_bytes());
        let mut data = String::new();
        entry.read_to_string(&mut data).expect("read");
        assert_eq!(data, "ok");
    }
}
