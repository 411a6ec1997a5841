//! Maintenance tasks for the Oracle client workspace.
//!
//! ```text
//! cargo xtask check            fmt --check, clippy -D warnings, workspace tests
//! cargo xtask test [-p CRATE]  tests, optionally for one crate
//! cargo xtask bench [FILTER]   criterion benches of ora-client
//! cargo xtask fuzz [--secs N]  connect-string fuzzer (cargo-fuzz, nightly)
//! cargo xtask release-check    docs with warnings denied, then semver-checks
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use xshell::{Shell, cmd};

/// Crates whose public API is checked before a release.
const PUBLISHED: [&str; 2] = ["ora-driver-pool", "ora-client"];

/// Only fuzz target in `fuzz/fuzz_targets`.
const FUZZ_TARGET: &str = "connect_string";

#[derive(Parser)]
#[command(name = "xtask", about = "Maintenance tasks for the Oracle client workspace")]
struct Cli {
    #[command(subcommand)]
    task: Task,
}

#[derive(Subcommand)]
enum Task {
    /// Formatting, lints and the full test suite, as CI runs them
    Check,
    /// Run tests
    Test {
        /// Restrict to one crate, e.g. `ora-testing`
        #[arg(short, long)]
        package: Option<String>,
    },
    /// Run the lifecycle benches
    Bench {
        /// Criterion filter, e.g. `environment_cascade`
        filter: Option<String>,
    },
    /// Fuzz connect-string parsing
    Fuzz {
        /// Stop after this many seconds
        #[arg(long, default_value_t = 60)]
        secs: u64,
    },
    /// Build docs with warnings denied and run cargo-semver-checks
    ReleaseCheck,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let sh = Shell::new()?;
    sh.change_dir(workspace_root()?);

    match cli.task {
        Task::Check => {
            cmd!(sh, "cargo fmt --all -- --check").run()?;
            cmd!(sh, "cargo clippy --workspace --all-targets -- -D warnings").run()?;
            cmd!(sh, "cargo test --workspace").run()?;
            eprintln!("check: ok");
        }
        Task::Test { package } => match package {
            Some(package) => cmd!(sh, "cargo test -p {package}").run()?,
            None => cmd!(sh, "cargo test --workspace").run()?,
        },
        Task::Bench { filter } => {
            let filter = filter.as_slice();
            cmd!(sh, "cargo bench -p ora-client --bench lifecycle -- {filter...}").run()?;
        }
        Task::Fuzz { secs } => {
            let _fuzz = sh.push_dir("fuzz");
            let limit = format!("-max_total_time={secs}");
            cmd!(sh, "cargo +nightly fuzz run {FUZZ_TARGET} -- {limit}").run()?;
        }
        Task::ReleaseCheck => {
            let _rustdoc = sh.push_env("RUSTDOCFLAGS", "-D warnings");
            cmd!(sh, "cargo doc --workspace --no-deps").run()?;
            for package in PUBLISHED {
                cmd!(sh, "cargo semver-checks check-release -p {package}")
                    .run()
                    .with_context(|| format!("semver check failed for {package}"))?;
            }
        }
    }
    Ok(())
}

/// The workspace root is the parent of this crate's manifest directory.
fn workspace_root() -> Result<PathBuf> {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .map(Path::to_path_buf)
        .context("xtask manifest has no parent directory")
}
