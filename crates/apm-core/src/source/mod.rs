//! Repository location handling.

mod url;

pub use self::url::{InsteadOf, apply_instead_of, git_config_rules, normalize_url};
