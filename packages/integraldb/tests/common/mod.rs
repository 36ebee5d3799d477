// Common test utilities
#![allow(dead_code)]

pub mod fixtures;
pub mod harness;
pub mod retrievers;

#[allow(unused_imports)]
pub use fixtures::*;
#[allow(unused_imports)]
pub use harness::*;
#[allow(unused_imports)]
pub use retrievers::*;
