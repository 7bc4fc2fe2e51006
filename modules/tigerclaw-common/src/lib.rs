pub mod types;
pub mod index;
pub mod keywords;
pub mod names;
pub mod slug;
pub mod config;
pub mod error;

pub use types::*;
pub use index::{IndexEntry, PipelineIndex, Relationships};
pub use names::{check_person_name, is_likely_person_name, NameRejection};
pub use slug::slugify;
pub use config::Config;
pub use error::TigerclawError;
