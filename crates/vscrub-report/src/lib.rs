//! Cross-reference report mapping every readable token to its replacement.

use std::fmt::Write as _;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use vscrub_index::SubstitutionIndex;

const HEADER: &str = "<html> <table> <tr> <th> Human Readable </th> <th> Anonymized </th> </tr>";
const FOOTER: &str = "</table> </html>";

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("cannot write cross-reference report {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// One row per pair, in index order.
pub fn render_cross_reference(index: &SubstitutionIndex) -> String {
    let mut html = String::with_capacity(HEADER.len() + FOOTER.len() + index.len() * 64);
    html.push_str(HEADER);
    html.push('\n');
    for pair in index.pairs() {
        let _ = writeln!(
            html,
            "<tr> <td> {} </td> <td> {} </td> </tr>",
            escape_html(&pair.readable),
            escape_html(&pair.anonymized)
        );
    }
    html.push_str(FOOTER);
    html.push('\n');
    html
}

/// Writes the report next to its final path and renames it into place.
/// Returns the number of rows written.
pub fn write_cross_reference(index: &SubstitutionIndex, path: &Path) -> Result<usize, ReportError> {
    let fail = |source: io::Error| ReportError::Write {
        path: path.to_path_buf(),
        source,
    };
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let mut staged = tempfile::Builder::new()
        .prefix(".vscrub-report-")
        .tempfile_in(parent)
        .map_err(fail)?;
    staged
        .write_all(render_cross_reference(index).as_bytes())
        .map_err(fail)?;
    staged.as_file().sync_all().map_err(fail)?;
    staged.persist(path).map_err(|e| fail(e.error))?;
    Ok(index.len())
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&#34;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}
