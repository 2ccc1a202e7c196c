//! Grouping of content files with their metadata sidecars.

use crate::entry::DirectoryEntry;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Extensions treated as metadata sidecars.
const METADATA_EXTENSIONS: &[&str] = &["xml", "json"];

/// A content file and its optional metadata sidecar.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilePair {
    /// Path without the final extension, shared by both files.
    pub stem: String,
    pub content: DirectoryEntry,
    pub metadata: Option<DirectoryEntry>,
}

/// Split `dir/name.ext` into (`dir/name`, `ext`).
fn split_stem(name: &str) -> (&str, Option<&str>) {
    let file_start = name.rfind('/').map(|i| i + 1).unwrap_or(0);
    match name[file_start..].rfind('.') {
        Some(0) | None => (name, None),
        Some(dot) => {
            let dot = file_start + dot;
            (&name[..dot], Some(&name[dot + 1..]))
        }
    }
}

fn is_metadata(ext: Option<&str>) -> bool {
    ext.is_some_and(|ext| {
        METADATA_EXTENSIONS
            .iter()
            .any(|m| m.eq_ignore_ascii_case(ext))
    })
}

/// Group file entries by stem.
///
/// Every non-metadata file yields one pair; a `.xml`/`.json` file with the same
/// stem in the same directory is attached as its metadata. Metadata files
/// without a content sibling and directories are dropped. Output order follows
/// the first appearance of each content file.
pub fn extract_pairs(files: &[DirectoryEntry]) -> Vec<FilePair> {
    let mut sidecars: HashMap<&str, &DirectoryEntry> = HashMap::new();
    for entry in files.iter().filter(|e| !e.is_directory()) {
        let (stem, ext) = split_stem(&entry.name);
        if is_metadata(ext) {
            sidecars.entry(stem).or_insert(entry);
        }
    }

    files
        .iter()
        .filter(|e| !e.is_directory())
        .filter_map(|entry| {
            let (stem, ext) = split_stem(&entry.name);
            if is_metadata(ext) {
                return None;
            }
            Some(FilePair {
                stem: stem.to_string(),
                content: entry.clone(),
                metadata: sidecars.get(stem).map(|m| (*m).clone()),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cid::Cid;

    fn cid() -> Cid {
        Cid::parse("bafybeigdyrzt5sfp7udm7hu76uh7y26nf3efuylqabf3oclgtqy55fbzdi").unwrap()
    }

    fn file(name: &str) -> DirectoryEntry {
        DirectoryEntry::file(name, cid(), Some(1))
    }

    #[test]
    fn pairs_content_with_sidecar() {
        let files = vec![
            file("page1.jpg"),
            file("page1.xml"),
            file("page2.tif"),
            DirectoryEntry::directory("page3", cid()),
            file("orphan.json"),
        ];
        let pairs = extract_pairs(&files);
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].stem, "page1");
        assert_eq!(pairs[0].metadata.as_ref().unwrap().name, "page1.xml");
        assert_eq!(pairs[1].content.name, "page2.tif");
        assert!(pairs[1].metadata.is_none());
    }

    #[test]
    fn stems_are_scoped_to_directories() {
        let files = vec![file("a/scan.png"), file("b/scan.XML")];
        let pairs = extract_pairs(&files);
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].stem, "a/scan");
        assert!(pairs[0].metadata.is_none());
    }

    #[test]
    fn split_stem_handles_dotfiles_and_dirs() {
        assert_eq!(split_stem(".hidden"), (".hidden", None));
        assert_eq!(split_stem("dir.v2/readme"), ("dir.v2/readme", None));
        assert_eq!(split_stem("dir/a.tar.gz"), ("dir/a.tar", Some("gz")));
    }
}
