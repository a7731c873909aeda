pub mod index;
pub mod index_id;
pub mod source;

pub use index::{IndexBuildError, IndexBuilder, SubstitutionIndex, SubstitutionPair};
pub use index_id::compute_index_id;
pub use source::{
    CustomListFile, InventoryRecord, InventorySnapshotFile, SourceError, SubstitutionSource,
    anonymized_reference,
};
