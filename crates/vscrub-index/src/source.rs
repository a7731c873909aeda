use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::SubstitutionPair;

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("cannot read substitution source {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed substitution source {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Supplier of substitution pairs, in the order they should be indexed.
pub trait SubstitutionSource {
    fn kind(&self) -> &'static str;

    fn load(&self) -> Result<Vec<SubstitutionPair>, SourceError>;
}

/// User-maintained JSON list of `{"readable": .., "anonymized": ..}` objects.
#[derive(Debug, Clone)]
pub struct CustomListFile {
    path: PathBuf,
}

impl CustomListFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SubstitutionSource for CustomListFile {
    fn kind(&self) -> &'static str {
        "custom_list"
    }

    fn load(&self) -> Result<Vec<SubstitutionPair>, SourceError> {
        read_json(&self.path)
    }
}

/// One object from an inventory export: its display name and the opaque
/// `Type:id` reference the inventory service assigned to it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InventoryRecord {
    pub name: String,
    pub reference: String,
}

/// Inventory snapshot exported as a JSON array of [`InventoryRecord`].
#[derive(Debug, Clone)]
pub struct InventorySnapshotFile {
    path: PathBuf,
    excluded_names: BTreeSet<String>,
}

impl InventorySnapshotFile {
    pub fn new<I, S>(path: impl Into<PathBuf>, excluded_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            path: path.into(),
            excluded_names: excluded_names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn pairs_from_records(&self, records: Vec<InventoryRecord>) -> Vec<SubstitutionPair> {
        records
            .into_iter()
            .filter(|r| !r.name.is_empty() && !self.excluded_names.contains(&r.name))
            .filter_map(|r| {
                let anonymized = anonymized_reference(&r.reference);
                if anonymized.is_empty() {
                    return None;
                }
                Some(SubstitutionPair::new(r.name, anonymized))
            })
            .collect()
    }
}

impl SubstitutionSource for InventorySnapshotFile {
    fn kind(&self) -> &'static str {
        "inventory_snapshot"
    }

    fn load(&self) -> Result<Vec<SubstitutionPair>, SourceError> {
        let records: Vec<InventoryRecord> = read_json(&self.path)?;
        Ok(self.pairs_from_records(records))
    }
}

/// `VirtualMachine:vm-42` becomes `vm-42`; a reference without a colon is
/// used as-is. Only the segment between the first and second colon is kept.
pub fn anonymized_reference(reference: &str) -> &str {
    reference.split(':').nth(1).unwrap_or(reference)
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, SourceError> {
    let bytes = std::fs::read(path).map_err(|source| SourceError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_slice(&bytes).map_err(|source| SourceError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
