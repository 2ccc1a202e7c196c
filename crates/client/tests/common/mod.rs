//! Common test utilities and fixtures.

pub mod fixtures;
pub mod page;

#[allow(unused_imports)]
pub use fixtures::*;
#[allow(unused_imports)]
pub use page::*;
