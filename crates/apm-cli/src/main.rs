//! apm - dependency manager for file-based artifacts
//!
//! Usage:
//!   apm install                      # Install everything in requirements.yml
//!   apm add <url> -m SRC@VER=DEST    # Install a package and optionally save it
//!   apm list <url>                   # Show versions available on a remote

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::warn;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use apm_core::config::ApmConfig;
use apm_core::context::AppContext;
use apm_core::fs::expand_home;
use apm_core::git::CancelFlag;
use apm_core::install::{BatchPolicy, InstallReport};
use apm_core::manifest::{DEFAULT_MANIFEST, Manifest, RequiredMapping, RequiredPackage};
use apm_core::package::{DEFAULT_PATH, DEFAULT_VERSION};

const DEFAULT_MAPPING: &str = "*@master=.";

#[derive(Parser)]
#[command(name = "apm")]
#[command(version, about = "Dependency manager for files kept in git repositories", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Working directory holding the .apm mount point (current directory by default)
    #[arg(short = 'w', long, global = true)]
    workdir: Option<String>,

    /// Package storage root (default ~/.apm, or `storage` from the config file)
    #[arg(long, global = true)]
    storage: Option<String>,

    /// Do not rewrite URLs with git config insteadOf rules
    #[arg(long, global = true)]
    no_gitconfig: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Install every package listed in the requirements file
    Install {
        /// Path to the requirements file
        #[arg(short, long, default_value = DEFAULT_MANIFEST)]
        file: PathBuf,

        /// Re-fetch packages that are already cached
        #[arg(long)]
        force: bool,
    },

    /// Install a package and optionally record it in the requirements file
    Add(AddArgs),

    /// List versions (branches and tags) of a remote repository
    List {
        /// Repository URL
        url: String,

        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },
}

#[derive(Args)]
struct AddArgs {
    /// Repository URL
    url: String,

    /// Package root inside the repository
    #[arg(short, long, default_value = DEFAULT_PATH)]
    path: String,

    /// Mapping of a package file or directory onto a destination
    ///
    /// Repeatable. Glob sources link every match inside DEST. VERSION
    /// defaults to master.
    #[arg(short, long = "mapping", value_name = "SRC[@VERSION]=DEST")]
    mappings: Vec<String>,

    /// Path to the requirements file
    #[arg(short, long, default_value = DEFAULT_MANIFEST)]
    file: PathBuf,

    /// Save installed mappings to the requirements file
    #[arg(short, long)]
    save: bool,

    /// Re-fetch packages that are already cached
    #[arg(long)]
    force: bool,
}

#[derive(Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    /// Human-readable output
    #[default]
    Table,
    /// Machine-readable JSON
    Json,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.debug {
        "apm=debug,apm_core=debug,info"
    } else {
        "apm=info,apm_core=info,warn"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let ctx = build_context(&cli)?;
    let cancel = ctx.cancel_flag().clone();
    ctrlc::set_handler(move || handle_interrupt(&cancel))
        .context("Failed to install interrupt handler")?;

    match cli.command {
        Commands::Install { file, force } => run_install(&ctx, &file, force),
        Commands::Add(args) => run_add(&ctx, args),
        Commands::List { url, format } => run_list(&ctx, &url, format),
    }
}

/// The first interrupt stops work at the next check so staging is cleaned
/// up; a second one exits immediately.
fn handle_interrupt(cancel: &CancelFlag) {
    if cancel.is_cancelled() {
        std::process::exit(130);
    }
    warn!("interrupted, cancelling (press Ctrl-C again to exit now)");
    cancel.cancel();
}

fn build_context(cli: &Cli) -> Result<AppContext> {
    let config = ApmConfig::load_default().context("Failed to load configuration")?;

    let cwd = std::env::current_dir().context("Failed to determine current directory")?;
    let project_root = match &cli.workdir {
        Some(raw) => cwd.join(expand_home(raw)?),
        None => cwd,
    };

    let mut ctx = AppContext::from_config(&config, project_root)?;
    if let Some(raw) = &cli.storage {
        ctx = ctx.with_storage_root(expand_home(raw)?);
    }
    if cli.no_gitconfig {
        ctx = ctx.with_use_gitconfig(false);
    }
    Ok(ctx)
}

fn run_install(ctx: &AppContext, file: &Path, force: bool) -> Result<()> {
    let manifest_path = ctx.project_path(file);
    let manifest = Manifest::load(&manifest_path)?;

    let mut packages = manifest.packages_for_install();
    if packages.is_empty() {
        println!("Nothing to install in {}", manifest_path.display());
        return Ok(());
    }
    for package in &mut packages {
        package.url = ctx
            .normalize_url(&package.url)
            .with_context(|| format!("Invalid package url in {}", manifest_path.display()))?;
    }

    let report = ctx
        .orchestrator()?
        .install(packages, &ctx.install_options(force, BatchPolicy::FailFast))?;
    print_report(&report);
    Ok(())
}

fn run_add(ctx: &AppContext, args: AddArgs) -> Result<()> {
    let url = ctx.normalize_url(&args.url)?;
    let manifest_path = ctx.project_path(&args.file);
    let mut manifest = Manifest::load(&manifest_path)?;

    let raw_mappings = if args.mappings.is_empty() {
        vec![DEFAULT_MAPPING.to_string()]
    } else {
        args.mappings
    };

    let mut packages = Vec::with_capacity(raw_mappings.len());
    for raw in &raw_mappings {
        let spec = parse_mapping(raw)?;
        let required =
            RequiredMapping::new(manifest_source(&args.path, &spec.src), spec.dest, spec.version);
        packages.push(required.to_package(&url));
    }

    let report = ctx
        .orchestrator()?
        .install(packages, &ctx.install_options(args.force, BatchPolicy::BestEffort))?;
    print_report(&report);

    for installed in &report.installed {
        let package = &installed.package;
        for mapping in &package.mappings {
            manifest.add(RequiredPackage::new(&package.url).with_mapping(RequiredMapping::new(
                manifest_source(&package.path, &mapping.src),
                &mapping.dest,
                &package.version,
            )));
        }
    }

    if args.save && !report.installed.is_empty() {
        manifest
            .save(&manifest_path)
            .with_context(|| format!("Failed to save {}", manifest_path.display()))?;
        println!("Saved {}", manifest_path.display());
    }

    if !report.is_success() {
        warn!(
            failed = report.failed.len(),
            total = report.failed.len() + report.installed.len(),
            "some mappings were not installed"
        );
    }
    Ok(())
}

fn run_list(ctx: &AppContext, url: &str, format: OutputFormat) -> Result<()> {
    let url = ctx.normalize_url(url)?;
    let versions = ctx
        .resolver()
        .list_versions(&url)
        .with_context(|| format!("Failed to list versions of {url}"))?;

    match format {
        OutputFormat::Table => {
            for version in &versions {
                println!("{version}");
            }
        }
        OutputFormat::Json => {
            let output = serde_json::json!({
                "url": url,
                "versions": versions,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }
    Ok(())
}

fn print_report(report: &InstallReport) {
    for installed in &report.installed {
        let package = &installed.package;
        let state = if installed.cached.fetched {
            "fetched"
        } else {
            "cached"
        };
        println!("✓ {}@{} ({state})", package.url, package.version);
        for link in &installed.links.links {
            if link.changed {
                println!("  {} -> {}", link.path.display(), link.target.display());
            }
        }
    }
    for failed in &report.failed {
        println!(
            "✗ {}@{}: {}",
            failed.package.url, failed.package.version, failed.error
        );
    }
}

/// A parsed `SRC[@VERSION]=DEST` argument.
#[derive(Debug, PartialEq, Eq)]
struct MappingSpec {
    src: String,
    version: String,
    dest: String,
}

fn parse_mapping(raw: &str) -> Result<MappingSpec> {
    let (source, dest) = raw
        .trim()
        .split_once('=')
        .ok_or_else(|| anyhow::anyhow!("Invalid mapping '{raw}': expected SRC[@VERSION]=DEST"))?;
    let dest = dest.trim();
    if dest.is_empty() {
        anyhow::bail!("Invalid mapping '{raw}': destination is empty");
    }

    let (src, version) = match source.trim().split_once('@') {
        Some((src, version)) if !version.is_empty() => (src, version),
        Some((src, _)) => (src, DEFAULT_VERSION),
        None => (source.trim(), DEFAULT_VERSION),
    };

    Ok(MappingSpec {
        src: src.to_string(),
        version: version.to_string(),
        dest: dest.to_string(),
    })
}

/// Requirements entries name the package root directly, so fold the
/// package path into the mapping source.
fn manifest_source(path: &str, src: &str) -> String {
    let path = path.trim_end_matches('/');
    let src = src.trim_start_matches("./");
    match (path, src) {
        ("" | ".", src) => src.to_string(),
        (path, "" | ".") => path.to_string(),
        (path, src) => format!("{path}/{src}"),
    }
}
