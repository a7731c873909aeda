use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};

use vscrub_index::SubstitutionIndex;

use crate::error::{ScrubError, Stage};

const COPY_BUFFER_LEN: usize = 64 * 1024;

/// Which side of a copy failed.
#[derive(Debug)]
pub enum StreamError {
    Read(io::Error),
    Write(io::Error),
}

impl StreamError {
    pub fn at(self, entry: &str) -> ScrubError {
        match self {
            Self::Read(e) => ScrubError::io(Stage::Read, entry, e),
            Self::Write(e) => ScrubError::io(Stage::Write, entry, e),
        }
    }
}

/// Rewrites a text stream line by line and returns the number of lines.
///
/// Every line, including an unterminated final one, is written back with a
/// single `\n`; a trailing `\r` is dropped.
pub fn scrub_lines(
    reader: &mut dyn Read,
    writer: &mut dyn Write,
    index: &SubstitutionIndex,
) -> Result<u64, StreamError> {
    let mut reader = BufReader::new(reader);
    let mut writer = BufWriter::new(writer);
    let mut line = Vec::new();
    let mut lines = 0_u64;
    loop {
        line.clear();
        let n = reader
            .read_until(b'\n', &mut line)
            .map_err(StreamError::Read)?;
        if n == 0 {
            break;
        }
        let body = trim_line_ending(&line);
        writer
            .write_all(&index.replace_bytes(body))
            .map_err(StreamError::Write)?;
        writer.write_all(b"\n").map_err(StreamError::Write)?;
        lines += 1;
    }
    writer.flush().map_err(StreamError::Write)?;
    Ok(lines)
}

fn trim_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Byte-for-byte copy; returns the number of bytes moved.
pub fn copy_verbatim(reader: &mut dyn Read, writer: &mut dyn Write) -> Result<u64, StreamError> {
    let mut buf = vec![0_u8; COPY_BUFFER_LEN];
    let mut total = 0_u64;
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(StreamError::Read(e)),
        };
        writer.write_all(&buf[..n]).map_err(StreamError::Write)?;
        total += n as u64;
    }
    Ok(total)
}
