//! Directory entries and background traversal tasks.

use crate::cid::Cid;
use serde::{Deserialize, Serialize};

/// Kind of a directory entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
}

/// A single child of a directory node.
///
/// Sizes cross process and persistence boundaries as decimal strings so that
/// values above 2^53 survive JSON consumers that only have doubles.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    /// Entry name. Entries found below the root carry their relative path
    /// (`sub/dir/name`).
    pub name: String,
    /// CID of the entry's node.
    pub cid: Cid,
    /// Size in bytes, if the listing reported one.
    #[serde(default, with = "size_string")]
    pub size: Option<u64>,
    /// File or directory.
    #[serde(rename = "type")]
    pub kind: EntryKind,
}

impl DirectoryEntry {
    /// Create a file entry.
    pub fn file(name: impl Into<String>, cid: Cid, size: Option<u64>) -> Self {
        Self {
            name: name.into(),
            cid,
            size,
            kind: EntryKind::File,
        }
    }

    /// Create a directory entry.
    pub fn directory(name: impl Into<String>, cid: Cid) -> Self {
        Self {
            name: name.into(),
            cid,
            size: None,
            kind: EntryKind::Directory,
        }
    }

    pub fn is_directory(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    /// Return a copy of this entry with its name nested under `parent`.
    pub fn nested_under(&self, parent: &str) -> Self {
        Self {
            name: format!("{parent}/{}", self.name),
            ..self.clone()
        }
    }
}

/// A subdirectory queued for background listing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubdirectoryTask {
    pub name: String,
    pub cid: Cid,
    /// Path relative to the traversal root.
    pub path: String,
}

impl SubdirectoryTask {
    /// Build a task for a directory entry found directly under the root.
    pub fn from_entry(entry: &DirectoryEntry) -> Self {
        Self {
            name: entry.name.clone(),
            cid: entry.cid.clone(),
            path: entry.name.clone(),
        }
    }
}

/// Serde adapter persisting `Option<u64>` as an optional decimal string.
///
/// Deserialization also accepts plain JSON numbers written by older records.
pub mod size_string {
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawSize {
        Text(String),
        Number(u64),
    }

    pub fn serialize<S: Serializer>(value: &Option<u64>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(size) => serializer.serialize_some(&size.to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
        match Option::<RawSize>::deserialize(deserializer)? {
            None => Ok(None),
            Some(RawSize::Number(n)) => Ok(Some(n)),
            Some(RawSize::Text(s)) => s
                .parse::<u64>()
                .map(Some)
                .map_err(|e| serde::de::Error::custom(format!("invalid size {s:?}: {e}"))),
        }
    }
}
