pub mod cache;
pub mod catalog;
pub mod diff;
pub mod effects;
pub mod feed;
pub mod index;
pub mod lock;
pub mod merge;
pub mod rubric;
pub mod scan;
pub mod scanner;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
