//! Git access for fetching packages.
//!
//! - Listing remote branches and tags and resolving versions against them
//! - Cloning a repository at a resolved reference
//! - Switching an existing clone to another revision

mod auth;
mod fetcher;
mod resolver;

pub use auth::{Auth, CancelFlag, RemoteOptions};
pub use fetcher::{FetchMode, Fetcher, GitFetcher};
pub use resolver::{Reference, RevisionResolver, resolve_local, sort_versions};
