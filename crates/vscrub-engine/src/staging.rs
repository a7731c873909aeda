use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

pub const STAGING_PREFIX: &str = "vscrub-";

/// Where nested members are spilled while their container is rebuilt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StagingArea {
    dir: Option<PathBuf>,
}

impl StagingArea {
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self { dir }
    }

    pub fn create(&self) -> io::Result<StagingBuffer> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(STAGING_PREFIX);
        let file = match &self.dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        Ok(StagingBuffer { file })
    }
}

/// A spill file removed when dropped, on success and on error alike.
#[derive(Debug)]
pub struct StagingBuffer {
    file: NamedTempFile,
}

impl StagingBuffer {
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Seeks back to the start and returns the buffered length.
    pub fn rewind(&mut self) -> io::Result<u64> {
        self.file.flush()?;
        let len = self.file.seek(SeekFrom::End(0))?;
        self.file.seek(SeekFrom::Start(0))?;
        Ok(len)
    }
}

impl Read for StagingBuffer {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

impl Write for StagingBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

impl Seek for StagingBuffer {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.file.seek(pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffers_are_prefixed_and_removed_on_drop() {
        let dir = tempfile::tempdir().expect("tempdir");
        let area = StagingArea::new(Some(dir.path().to_path_buf()));

        let mut buffer = area.create().expect("create buffer");
        let path = buffer.path().to_path_buf();
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        assert!(name.starts_with(STAGING_PREFIX));
        assert!(path.starts_with(dir.path()));

        buffer.write_all(b"spilled").expect("write");
        assert_eq!(buffer.rewind().expect("rewind"), 7);
        let mut back = String::new();
        buffer.read_to_string(&mut back).expect("read");
        assert_eq!(back, "spilled");

        drop(buffer);
        assert!(!path.exists());
    }

    #[test]
    fn missing_staging_dir_fails_on_create() {
        let dir = tempfile::tempdir().expect("tempdir");
        let area = StagingArea::new(Some(dir.path().join("absent")));
        assert!(area.create().is_err());
    }
}
