//! Filesystem primitives shared across features.

pub mod fileset;
pub mod paths;
pub mod tree;

pub use fileset::{DEFAULT_EXCLUDES, is_glob, resolve_glob};
pub use paths::{expand_home, normalize_relative, relative_link_target};
pub use tree::copy_tree_filtered;
