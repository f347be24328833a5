//! Batch installation: fetch into the cache, then link into the project.

pub mod session;

use std::path::PathBuf;

use tracing::{error, info, warn};

pub use session::InstallSession;

use crate::cache::{CachedPackage, ContentCache};
use crate::error::{Error, Result};
use crate::git::{CancelFlag, Fetcher};
use crate::link::{LinkPlanner, LinkReport};
use crate::package::Package;

/// What to do when one package of a batch fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatchPolicy {
    /// Stop at the first failing package.
    #[default]
    FailFast,
    /// Record the failure and move on to the next package.
    BestEffort,
}

#[derive(Debug, Clone)]
pub struct InstallOptions {
    pub work_dir: PathBuf,
    /// Re-fetch packages even when they are cached.
    pub force: bool,
    /// Reuse the staged clone for consecutive packages from one URL.
    pub once_download: bool,
    pub policy: BatchPolicy,
}

impl InstallOptions {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
            force: false,
            once_download: false,
            policy: BatchPolicy::default(),
        }
    }
}

#[derive(Debug)]
pub struct InstalledPackage {
    pub package: Package,
    pub cached: CachedPackage,
    pub links: LinkReport,
}

#[derive(Debug)]
pub struct FailedPackage {
    pub package: Package,
    pub error: Error,
}

#[derive(Debug, Default)]
pub struct InstallReport {
    pub installed: Vec<InstalledPackage>,
    pub failed: Vec<FailedPackage>,
}

impl InstallReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

pub struct InstallOrchestrator {
    cache: ContentCache,
    fetcher: Box<dyn Fetcher>,
    cancel: CancelFlag,
}

impl InstallOrchestrator {
    pub fn new(cache: ContentCache, fetcher: Box<dyn Fetcher>, cancel: CancelFlag) -> Self {
        Self {
            cache,
            fetcher,
            cancel,
        }
    }

    pub fn cache(&self) -> &ContentCache {
        &self.cache
    }

    pub fn cancel_flag(&self) -> &CancelFlag {
        &self.cancel
    }

    /// Install `packages` in order.
    ///
    /// Storage failures and cancellation abort the batch under any policy.
    /// The staging directory is removed before this returns.
    pub fn install(&self, packages: Vec<Package>, options: &InstallOptions) -> Result<InstallReport> {
        let mut session = InstallSession::new(options.once_download, self.cancel.clone());
        let planner = LinkPlanner::new(&options.work_dir);
        let mut report = InstallReport::default();

        for mut package in packages {
            if self.cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let result = package.validate().and_then(|()| {
                info!(
                    url = %package.url,
                    version = %package.version,
                    path = %package.path,
                    "installing package"
                );
                self.install_one(&package, options.force, &mut session, &planner)
            });

            match result {
                Ok((cached, links)) => {
                    info!(
                        url = %package.url,
                        version = %package.version,
                        fingerprint = %cached.fingerprint,
                        fetched = cached.fetched,
                        links = links.links.len(),
                        "installed package"
                    );
                    report.installed.push(InstalledPackage {
                        package,
                        cached,
                        links,
                    });
                }
                Err(err) if err.is_batch_fatal() || options.policy == BatchPolicy::FailFast => {
                    error!(
                        url = %package.url,
                        version = %package.version,
                        path = %package.path,
                        error = %err,
                        "package install failed"
                    );
                    return Err(err);
                }
                Err(err) => {
                    warn!(
                        url = %package.url,
                        version = %package.version,
                        path = %package.path,
                        error = %err,
                        "package install failed, continuing"
                    );
                    report.failed.push(FailedPackage {
                        package,
                        error: err,
                    });
                }
            }
        }

        Ok(report)
    }

    fn install_one(
        &self,
        package: &Package,
        force: bool,
        session: &mut InstallSession,
        planner: &LinkPlanner,
    ) -> Result<(CachedPackage, LinkReport)> {
        let cached = self
            .cache
            .ensure_cached(package, force, session, self.fetcher.as_ref())?;
        let links = planner.apply(package, &cached.fingerprint, &cached.dir)?;
        Ok((cached, links))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::fs;
    use std::path::Path;
    use std::rc::Rc;

    use crate::git::FetchMode;
    use crate::package::Mapping;

    /// Writes `README.md` and `roles/<version>/main.yml`; fails for URLs
    /// containing "broken".
    #[derive(Clone, Default)]
    struct FakeFetcher {
        calls: Rc<RefCell<usize>>,
    }

    impl Fetcher for FakeFetcher {
        fn fetch(&self, url: &str, version: &str, dest: &Path, _mode: FetchMode) -> Result<()> {
            *self.calls.borrow_mut() += 1;
            if url.contains("broken") {
                return Err(Error::Resolution {
                    url: url.to_string(),
                    version: version.to_string(),
                });
            }
            fs::create_dir_all(dest.join("roles").join(version)).unwrap();
            fs::write(dest.join("README.md"), version).unwrap();
            fs::write(dest.join("roles").join(version).join("main.yml"), "---\n").unwrap();
            Ok(())
        }
    }

    struct Env {
        _tmp: tempfile::TempDir,
        storage: PathBuf,
        work: PathBuf,
        fetcher: FakeFetcher,
    }

    fn env() -> Env {
        let tmp = tempfile::tempdir().unwrap();
        let storage = tmp.path().join("storage");
        let work = tmp.path().join("work");
        fs::create_dir_all(&work).unwrap();
        Env {
            _tmp: tmp,
            storage,
            work,
            fetcher: FakeFetcher::default(),
        }
    }

    fn orchestrator(env: &Env, cancel: CancelFlag) -> InstallOrchestrator {
        let cache = ContentCache::open(&env.storage).unwrap();
        InstallOrchestrator::new(cache, Box::new(env.fetcher.clone()), cancel)
    }

    fn package(url: &str, dest: &str) -> Package {
        Package::new(url)
            .with_version("v1")
            .with_mapping(Mapping::new("roles/v1", dest))
    }

    fn options(env: &Env, policy: BatchPolicy) -> InstallOptions {
        InstallOptions {
            policy,
            ..InstallOptions::new(&env.work)
        }
    }

    #[test]
    fn installs_and_links_packages() {
        let env = env();
        let report = orchestrator(&env, CancelFlag::new())
            .install(
                vec![package("https://example.org/a", "roles/a")],
                &options(&env, BatchPolicy::FailFast),
            )
            .unwrap();

        assert!(report.is_success());
        assert_eq!(report.installed.len(), 1);
        assert!(env.work.join("roles").join("a").join("main.yml").is_file());
    }

    #[test]
    fn validation_fills_defaults_before_install() {
        let env = env();
        let report = orchestrator(&env, CancelFlag::new())
            .install(
                vec![Package::new("https://example.org/a")],
                &options(&env, BatchPolicy::FailFast),
            )
            .unwrap();

        let installed = &report.installed[0].package;
        assert_eq!(installed.version, "master");
        assert_eq!(
            fs::read_to_string(env.work.join("README.md")).unwrap(),
            "master"
        );
    }

    #[test]
    fn fail_fast_stops_at_first_error() {
        let env = env();
        let err = orchestrator(&env, CancelFlag::new())
            .install(
                vec![
                    package("https://example.org/a", "roles/a"),
                    package("https://example.org/broken", "roles/b"),
                    package("https://example.org/c", "roles/c"),
                ],
                &options(&env, BatchPolicy::FailFast),
            )
            .unwrap_err();

        assert!(matches!(err, Error::Resolution { .. }));
        assert!(env.work.join("roles").join("a").exists());
        assert!(!env.work.join("roles").join("c").exists());
    }

    #[test]
    fn best_effort_records_failures_and_continues() {
        let env = env();
        let report = orchestrator(&env, CancelFlag::new())
            .install(
                vec![
                    package("https://example.org/broken", "roles/b"),
                    package("https://example.org/c", "roles/c"),
                ],
                &options(&env, BatchPolicy::BestEffort),
            )
            .unwrap();

        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].package.url, "https://example.org/broken");
        assert_eq!(report.installed.len(), 1);
        assert!(env.work.join("roles").join("c").exists());
    }

    #[test]
    fn conflict_is_a_package_failure() {
        let env = env();
        fs::create_dir_all(env.work.join("roles")).unwrap();
        fs::write(env.work.join("roles").join("a"), "mine").unwrap();

        let report = orchestrator(&env, CancelFlag::new())
            .install(
                vec![
                    package("https://example.org/a", "roles/a"),
                    package("https://example.org/c", "roles/c"),
                ],
                &options(&env, BatchPolicy::BestEffort),
            )
            .unwrap();

        assert!(matches!(report.failed[0].error, Error::Conflict { .. }));
        assert_eq!(
            fs::read_to_string(env.work.join("roles").join("a")).unwrap(),
            "mine"
        );
        assert_eq!(report.installed.len(), 1);
    }

    #[test]
    fn storage_failure_aborts_best_effort_batch() {
        let env = env();
        let orchestrator = orchestrator(&env, CancelFlag::new());
        fs::remove_dir_all(&env.storage).unwrap();
        fs::write(&env.storage, "not a directory").unwrap();

        let err = orchestrator
            .install(
                vec![
                    package("https://example.org/a", "roles/a"),
                    package("https://example.org/c", "roles/c"),
                ],
                &options(&env, BatchPolicy::BestEffort),
            )
            .unwrap_err();

        assert!(matches!(err, Error::Storage { .. }));
        assert_eq!(*env.fetcher.calls.borrow(), 1);
    }

    #[test]
    fn cancelled_batch_installs_nothing() {
        let env = env();
        let cancel = CancelFlag::new();
        cancel.cancel();

        let err = orchestrator(&env, cancel)
            .install(
                vec![package("https://example.org/a", "roles/a")],
                &options(&env, BatchPolicy::BestEffort),
            )
            .unwrap_err();

        assert!(matches!(err, Error::Cancelled));
        assert_eq!(*env.fetcher.calls.borrow(), 0);
    }

    #[test]
    fn invalid_mapping_is_rejected_before_fetch() {
        let env = env();
        let report = orchestrator(&env, CancelFlag::new())
            .install(
                vec![package("https://example.org/a", "../outside")],
                &options(&env, BatchPolicy::BestEffort),
            )
            .unwrap();

        assert!(matches!(report.failed[0].error, Error::Validation { .. }));
        assert_eq!(*env.fetcher.calls.borrow(), 0);
        assert!(!env.work.join(".apm").exists());
        assert_eq!(fs::read_dir(&env.storage).unwrap().count(), 0);
    }

    #[test]
    fn stray_file_at_cache_entry_is_replaced() {
        let env = env();
        let orchestrator = orchestrator(&env, CancelFlag::new());
        let mut pkg = package("https://example.org/a", "roles/a");
        pkg.validate().unwrap();
        let entry = env.storage.join(pkg.cache_key().fingerprint().as_str());
        fs::write(&entry, "junk").unwrap();

        let report = orchestrator
            .install(vec![pkg], &options(&env, BatchPolicy::BestEffort))
            .unwrap();

        assert!(report.is_success());
        assert!(report.installed[0].cached.fetched);
        assert!(entry.is_dir());
        assert!(env.work.join("roles").join("a").join("main.yml").is_file());
    }

    #[test]
    fn cached_package_is_not_fetched_again() {
        let env = env();
        let orchestrator = orchestrator(&env, CancelFlag::new());
        let opts = options(&env, BatchPolicy::FailFast);

        orchestrator
            .install(vec![package("https://example.org/a", "roles/a")], &opts)
            .unwrap();
        let report = orchestrator
            .install(vec![package("https://example.org/a", "roles/a")], &opts)
            .unwrap();

        assert!(!report.installed[0].cached.fetched);
        assert!(!report.installed[0].links.changed());
        assert_eq!(*env.fetcher.calls.borrow(), 1);
    }
}
