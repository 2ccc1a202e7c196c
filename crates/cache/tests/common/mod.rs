pub mod fixtures;

#[allow(unused_imports)]
pub use fixtures::{directory, file, old_record, test_cid};
