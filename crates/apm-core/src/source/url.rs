//! Package URL normalization and `url.<base>.insteadOf` rewriting.

use tracing::debug;
use url::Url;

use crate::error::{Error, Result};

const DEFAULT_SCHEME: &str = "https://";

/// One `url.<base>.insteadOf = <prefix>` rule from git config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsteadOf {
    pub base: String,
    pub prefix: String,
}

impl InsteadOf {
    pub fn new(base: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            prefix: prefix.into(),
        }
    }
}

/// Normalize a user-supplied repository location.
///
/// Locations without a `scheme://` get `https://`. With `rewrite`, the
/// user's git config `insteadOf` rules are applied afterwards.
pub fn normalize_url(raw: &str, rewrite: bool) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(Error::validation("package url is empty"));
    }

    let candidate = if has_scheme(trimmed) {
        trimmed.to_string()
    } else {
        format!("{DEFAULT_SCHEME}{trimmed}")
    };
    Url::parse(&candidate)
        .map_err(|err| Error::validation(format!("Invalid package url '{raw}': {err}")))?;

    if !rewrite {
        return Ok(candidate);
    }
    let rewritten = apply_instead_of(&candidate, &git_config_rules());
    if rewritten != candidate {
        debug!(from = %candidate, to = %rewritten, "rewrote url from git config");
    }
    Ok(rewritten)
}

/// Replace the longest matching `insteadOf` prefix of `url` with its base.
pub fn apply_instead_of(url: &str, rules: &[InsteadOf]) -> String {
    rules
        .iter()
        .filter(|rule| !rule.prefix.is_empty() && url.starts_with(&rule.prefix))
        .max_by_key(|rule| rule.prefix.len())
        .map(|rule| format!("{}{}", rule.base, &url[rule.prefix.len()..]))
        .unwrap_or_else(|| url.to_string())
}

/// Read `insteadOf` rules from the default git config. An unreadable
/// config yields no rules.
pub fn git_config_rules() -> Vec<InsteadOf> {
    let config = match git2::Config::open_default() {
        Ok(config) => config,
        Err(err) => {
            debug!(error = %err, "git config unavailable, skipping url rewrite");
            return Vec::new();
        }
    };
    let mut rules = Vec::new();
    let mut entries = match config.entries(Some(r"^url\..*\.insteadof$")) {
        Ok(entries) => entries,
        Err(err) => {
            debug!(error = %err, "failed to read git config entries");
            return rules;
        }
    };
    while let Some(entry) = entries.next() {
        let Ok(entry) = entry else {
            continue;
        };
        if let (Some(name), Some(prefix)) = (entry.name(), entry.value())
            && let Some(base) = rule_base(name)
        {
            rules.push(InsteadOf::new(base, prefix));
        }
    }
    rules
}

/// `url.<base>.insteadof` -> `<base>`.
fn rule_base(name: &str) -> Option<&str> {
    const PREFIX: &str = "url.";
    const SUFFIX: &str = ".insteadof";
    if name.len() <= PREFIX.len() + SUFFIX.len() {
        return None;
    }
    let lower = name.to_ascii_lowercase();
    if !lower.starts_with(PREFIX) || !lower.ends_with(SUFFIX) {
        return None;
    }
    Some(&name[PREFIX.len()..name.len() - SUFFIX.len()])
}

fn has_scheme(raw: &str) -> bool {
    raw.split_once("://").is_some_and(|(scheme, _)| {
        !scheme.is_empty()
            && scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prepends_https_without_scheme() {
        assert_eq!(
            normalize_url("github.com/org/roles.git", false).unwrap(),
            "https://github.com/org/roles.git"
        );
    }

    #[test]
    fn keeps_existing_scheme() {
        for raw in [
            "https://github.com/org/roles.git",
            "ssh://git@github.com/org/roles.git",
            "file:///srv/git/roles",
        ] {
            assert_eq!(normalize_url(raw, false).unwrap(), raw);
        }
    }

    #[test]
    fn trims_whitespace() {
        assert_eq!(
            normalize_url("  https://example.org/a  ", false).unwrap(),
            "https://example.org/a"
        );
    }

    #[test]
    fn rejects_empty_and_malformed() {
        assert!(matches!(
            normalize_url("   ", false).unwrap_err(),
            Error::Validation { .. }
        ));
        assert!(matches!(
            normalize_url("https://exa mple.org/a", false).unwrap_err(),
            Error::Validation { .. }
        ));
    }

    #[test]
    fn longest_instead_of_prefix_wins() {
        let rules = vec![
            InsteadOf::new("ssh://git@github.com/", "https://github.com/"),
            InsteadOf::new("ssh://git@mirror.local/org/", "https://github.com/org/"),
        ];
        assert_eq!(
            apply_instead_of("https://github.com/org/roles.git", &rules),
            "ssh://git@mirror.local/org/roles.git"
        );
        assert_eq!(
            apply_instead_of("https://github.com/other/x.git", &rules),
            "ssh://git@github.com/other/x.git"
        );
    }

    #[test]
    fn instead_of_only_replaces_leading_prefix() {
        let rules = vec![InsteadOf::new("https://mirror/", "https://a/")];
        assert_eq!(
            apply_instead_of("https://a/https://a/x", &rules),
            "https://mirror/https://a/x"
        );
        assert_eq!(apply_instead_of("https://b/x", &rules), "https://b/x");
    }

    #[test]
    fn rule_base_parses_config_names() {
        assert_eq!(
            rule_base("url.ssh://git@github.com/.insteadof"),
            Some("ssh://git@github.com/")
        );
        assert_eq!(
            rule_base("url.ssh://git@github.com/.insteadOf"),
            Some("ssh://git@github.com/")
        );
        assert_eq!(rule_base("url..insteadof"), None);
        assert_eq!(rule_base("core.editor"), None);
    }
}
