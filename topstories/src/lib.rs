// Library interface for topstories modules
// This allows tests and other binaries to import modules

pub mod articles;
pub mod error;
pub mod server;
pub mod sources;
pub mod stories;

pub use articles::{Article, DateBucket};
pub use error::StoryError;
pub use sources::{SourceKind, SourceRegistry, StorySource};
pub use stories::{StoryQuery, StoryService};
