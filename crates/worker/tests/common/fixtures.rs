//! Deterministic test data.

use cairn_core::{Cid, DirectoryEntry, ProgressEvent};
use cairn_worker::ProgressSink;
use std::sync::Mutex;

const BASE32_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz234567";

/// Generate a deterministic, syntactically valid CIDv1 from a seed.
pub fn test_cid(seed: u64) -> Cid {
    let mut state = seed;
    let mut body = String::with_capacity(52);
    for _ in 0..52 {
        state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        body.push(BASE32_ALPHABET[(state >> 59) as usize] as char);
    }
    Cid::parse(&format!("bafybei{body}")).expect("fixture CID must be valid")
}

#[allow(dead_code)]
pub fn file(name: &str, seed: u64, size: u64) -> DirectoryEntry {
    DirectoryEntry::file(name, test_cid(seed), Some(size))
}

#[allow(dead_code)]
pub fn directory(name: &str, seed: u64) -> DirectoryEntry {
    DirectoryEntry::directory(name, test_cid(seed))
}

/// `count` files named `f000`, `f001`, ...
#[allow(dead_code)]
pub fn many_files(count: usize, seed: u64) -> Vec<DirectoryEntry> {
    (0..count)
        .map(|i| file(&format!("f{i:03}"), seed + i as u64, i as u64))
        .collect()
}

/// Progress sink that records every event.
#[allow(dead_code)]
#[derive(Default)]
pub struct Recorder {
    events: Mutex<Vec<ProgressEvent>>,
}

#[allow(dead_code)]
impl Recorder {
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl ProgressSink for Recorder {
    fn emit(&self, event: ProgressEvent) {
        self.events.lock().unwrap().push(event);
    }
}
