use cairn_cache::CacheRecord;
use cairn_core::{Cid, DirectoryEntry};

const BASE32_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz234567";

/// Generate a deterministic, syntactically valid CIDv1 from a seed.
/// Same seed produces the same CID (reproducible tests).
pub fn test_cid(seed: u64) -> Cid {
    let mut state = seed;
    let mut body = String::with_capacity(52);
    for _ in 0..52 {
        // Simple LCG (Linear Congruential Generator)
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
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

/// A record written `age_ms` milliseconds ago.
#[allow(dead_code)]
pub fn old_record(cid: Cid, files: Vec<DirectoryEntry>, age_ms: i64) -> CacheRecord {
    let mut record = CacheRecord::new(cid, files);
    record.timestamp -= age_ms;
    record
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cid_is_deterministic() {
        assert_eq!(test_cid(7), test_cid(7));
        assert_ne!(test_cid(7), test_cid(8));
    }
}
