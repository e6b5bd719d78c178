// File fingerprint entities for rescan/import reconciliation

use serde::{Deserialize, Serialize};

/// Composite key used to match a moved file without content hashing
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileFingerprint {
    pub name: String,
    pub size_bytes: u64,
    pub mtime: i64,
}

/// A file entry as previously recorded in the metadata store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedEntry {
    pub id: i64,
    pub path: String,
    pub name: String,
    pub size_bytes: u64,
    pub mtime: i64,
}

impl RecordedEntry {
    pub fn fingerprint(&self) -> FileFingerprint {
        FileFingerprint {
            name: self.name.clone(),
            size_bytes: self.size_bytes,
            mtime: self.mtime,
        }
    }
}

/// A file as found on disk during a rescan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskEntry {
    pub path: String,
    pub name: String,
    pub size_bytes: u64,
    pub mtime: i64,
}

impl DiskEntry {
    pub fn fingerprint(&self) -> FileFingerprint {
        FileFingerprint {
            name: self.name.clone(),
            size_bytes: self.size_bytes,
            mtime: self.mtime,
        }
    }
}

/// A recorded entry whose fingerprint matched more than one possible
/// disk location. Surfaced to the caller instead of guessing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmbiguousMatch {
    pub recorded: RecordedEntry,
    pub candidates: Vec<DiskEntry>,
}

/// Change-set produced by one reconciliation run. Owned by the caller;
/// applying it (imports, record moves, deletions) is a separate batch job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationResult {
    /// Same path on disk and in records
    pub matched: Vec<(RecordedEntry, DiskEntry)>,
    /// Same fingerprint, different path, exactly one candidate
    pub moved: Vec<(RecordedEntry, DiskEntry)>,
    /// In records, absent from disk
    pub deleted: Vec<RecordedEntry>,
    /// On disk, no matching record
    pub new: Vec<DiskEntry>,
    /// Fingerprint collisions needing operator review
    pub ambiguous: Vec<AmbiguousMatch>,
}

impl ReconciliationResult {
    pub fn is_empty(&self) -> bool {
        self.matched.is_empty()
            && self.moved.is_empty()
            && self.deleted.is_empty()
            && self.new.is_empty()
            && self.ambiguous.is_empty()
    }
}
