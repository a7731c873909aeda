use std::borrow::Cow;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use aho_corasick::{AhoCorasick, MatchKind};
use serde::{Deserialize, Serialize};
use vscrub_domain::IndexId;

use crate::compute_index_id;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SubstitutionPair {
    pub readable: String,
    pub anonymized: String,
}

impl SubstitutionPair {
    pub fn new(readable: impl Into<String>, anonymized: impl Into<String>) -> Self {
        Self {
            readable: readable.into(),
            anonymized: anonymized.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IndexBuildError {
    #[error("could not compile substitution matcher: {0}")]
    Matcher(#[from] aho_corasick::BuildError),
}

/// Accumulates pairs in insertion order.
///
/// A repeated `readable` token keeps the position of its first insertion and
/// takes the `anonymized` value of its last one. Empty tokens are dropped.
#[derive(Debug, Default)]
pub struct IndexBuilder {
    pairs: Vec<SubstitutionPair>,
    positions: HashMap<String, usize>,
    skipped_empty: u64,
    overridden: u64,
}

impl IndexBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, pair: SubstitutionPair) {
        if pair.readable.is_empty() {
            self.skipped_empty += 1;
            return;
        }

        if let Some(&pos) = self.positions.get(&pair.readable) {
            self.pairs[pos].anonymized = pair.anonymized;
            self.overridden += 1;
            return;
        }

        self.positions.insert(pair.readable.clone(), self.pairs.len());
        self.pairs.push(pair);
    }

    pub fn extend<I>(&mut self, pairs: I)
    where
        I: IntoIterator<Item = SubstitutionPair>,
    {
        for pair in pairs {
            self.push(pair);
        }
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn skipped_empty(&self) -> u64 {
        self.skipped_empty
    }

    pub fn overridden(&self) -> u64 {
        self.overridden
    }

    pub fn build(self) -> Result<SubstitutionIndex, IndexBuildError> {
        SubstitutionIndex::from_ordered_pairs(self.pairs)
    }
}

/// Immutable substitution table with its compiled simultaneous matcher.
#[derive(Debug)]
pub struct SubstitutionIndex {
    pairs: Vec<SubstitutionPair>,
    replacements: Vec<String>,
    matcher: Option<AhoCorasick>,
    index_id: IndexId,
}

impl SubstitutionIndex {
    pub fn empty() -> Self {
        Self {
            pairs: Vec::new(),
            replacements: Vec::new(),
            matcher: None,
            index_id: compute_index_id(&[]),
        }
    }

    fn from_ordered_pairs(pairs: Vec<SubstitutionPair>) -> Result<Self, IndexBuildError> {
        let index_id = compute_index_id(&pairs);
        if pairs.is_empty() {
            return Ok(Self::empty());
        }

        // Leftmost-first: at a shared start position the earlier pair wins.
        let matcher = AhoCorasick::builder()
            .match_kind(MatchKind::LeftmostFirst)
            .build(pairs.iter().map(|p| p.readable.as_bytes()))?;
        let replacements = pairs.iter().map(|p| p.anonymized.clone()).collect();

        Ok(Self {
            pairs,
            replacements,
            matcher: Some(matcher),
            index_id,
        })
    }

    pub fn pairs(&self) -> &[SubstitutionPair] {
        &self.pairs
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn index_id(&self) -> IndexId {
        self.index_id
    }

    pub fn replace_bytes<'h>(&self, haystack: &'h [u8]) -> Cow<'h, [u8]> {
        let Some(matcher) = &self.matcher else {
            return Cow::Borrowed(haystack);
        };
        if !matcher.is_match(haystack) {
            return Cow::Borrowed(haystack);
        }
        Cow::Owned(matcher.replace_all_bytes(haystack, &self.replacements))
    }

    pub fn replace_str<'h>(&self, haystack: &'h str) -> Cow<'h, str> {
        let Some(matcher) = &self.matcher else {
            return Cow::Borrowed(haystack);
        };
        if !matcher.is_match(haystack) {
            return Cow::Borrowed(haystack);
        }
        Cow::Owned(matcher.replace_all(haystack, &self.replacements))
    }

    pub fn contains_readable(&self, haystack: &[u8]) -> bool {
        self.matcher
            .as_ref()
            .map(|m| m.is_match(haystack))
            .unwrap_or(false)
    }

    /// Applies the substitution to the whole path at once, segment
    /// separators included.
    #[cfg(unix)]
    pub fn scrub_path(&self, path: &Path) -> PathBuf {
        use std::ffi::OsString;
        use std::os::unix::ffi::{OsStrExt, OsStringExt};

        match self.replace_bytes(path.as_os_str().as_bytes()) {
            Cow::Borrowed(_) => path.to_path_buf(),
            Cow::Owned(bytes) => PathBuf::from(OsString::from_vec(bytes)),
        }
    }

    #[cfg(not(unix))]
    pub fn scrub_path(&self, path: &Path) -> PathBuf {
        let lossy = path.to_string_lossy();
        PathBuf::from(self.replace_str(&lossy).into_owned())
    }

    /// Scrubbed rendering of a name for logs and error context.
    pub fn display_name(&self, name: &str) -> String {
        self.replace_str(name).into_owned()
    }
}

impl Default for SubstitutionIndex {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(pairs: &[(&str, &str)]) -> SubstitutionIndex {
        let mut builder = IndexBuilder::new();
        builder.extend(pairs.iter().map(|(r, a)| SubstitutionPair::new(*r, *a)));
        builder.build().expect("build index")
    }

    #[test]
    fn replacement_is_simultaneous_not_iterative() {
        let index = build(&[("alpha", "beta"), ("beta", "gamma")]);
        assert_eq!(index.replace_str("alpha beta"), "beta gamma");
    }

    #[test]
    fn earlier_pair_wins_at_shared_start() {
        let index = build(&[("esx", "short"), ("esx05.lab", "host-05")]);
        assert_eq!(index.replace_str("esx05.lab"), "short05.lab");

        let index = build(&[("esx05.lab", "host-05"), ("esx", "short")]);
        assert_eq!(index.replace_str("esx05.lab esx"), "host-05 short");
    }

    #[test]
    fn duplicate_readable_keeps_last_value_at_first_position() {
        let mut builder = IndexBuilder::new();
        builder.push(SubstitutionPair::new("db01", "host-1"));
        builder.push(SubstitutionPair::new("web", "host-2"));
        builder.push(SubstitutionPair::new("db01", "host-9"));
        assert_eq!(builder.overridden(), 1);

        let index = builder.build().expect("build");
        assert_eq!(index.len(), 2);
        assert_eq!(index.pairs()[0], SubstitutionPair::new("db01", "host-9"));
        assert_eq!(index.replace_str("db01 web"), "host-9 host-2");
    }

    #[test]
    fn empty_tokens_are_skipped() {
        let mut builder = IndexBuilder::new();
        builder.push(SubstitutionPair::new("", "nothing"));
        builder.push(SubstitutionPair::new("x", "y"));
        assert_eq!(builder.skipped_empty(), 1);

        let index = builder.build().expect("build");
        assert_eq!(index.replace_str("a x b"), "a y b");
    }

    #[test]
    fn unmatched_input_is_borrowed() {
        let index = build(&[("secret", "redacted")]);
        assert!(matches!(index.replace_str("public"), Cow::Borrowed(_)));
        assert!(matches!(index.replace_bytes(b"public"), Cow::Borrowed(_)));
    }

    #[test]
    fn replace_bytes_handles_non_utf8() {
        let index = build(&[("vc01", "vc-a")]);
        let out = index.replace_bytes(b"\xff\xfevc01\x00");
        assert_eq!(out.as_ref(), b"\xff\xfevc-a\x00");
    }

    #[test]
    fn empty_index_is_identity() {
        let index = SubstitutionIndex::empty();
        assert!(index.is_empty());
        assert_eq!(index.replace_str("anything"), "anything");
        assert!(!index.contains_readable(b"anything"));
    }

    #[test]
    fn path_segments_are_substituted() {
        let index = build(&[("esx05.lab", "host-05")]);
        let out = index.scrub_path(Path::new("out/esx05.lab/log.txt"));
        assert_eq!(out, PathBuf::from("out/host-05/log.txt"));
    }

    #[test]
    fn index_id_tracks_content() {
        let a = build(&[("a", "1")]);
        let b = build(&[("a", "2")]);
        assert_ne!(a.index_id(), b.index_id());
        assert_eq!(a.index_id(), build(&[("a", "1")]).index_id());
    }
}
