//! the test_utils folder here will share utils or test components between
//! unit tests
mod common;
mod fixture;
mod listener;

pub use common::*;
pub use fixture::*;
pub use listener::*;
