//! CLI for nixdbg.

mod commands;

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use nixdbg_core::config;
use nixdbg_core::platform::Platform;
use std::path::{Path, PathBuf};

use commands::{run_check_userns, run_checksum, run_completions, run_fetch, run_man, run_manifest};
#[cfg(target_os = "linux")]
use commands::{run_build_image, run_namespace_build};
#[cfg(unix)]
use commands::run_install;

/// Top-level CLI for nixdbg.
#[derive(Debug, Parser)]
#[command(name = "nixdbg", version)]
#[command(about = "nixdbg: pinned Nix bootstrap and debug shell image builder", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Download, verify and unpack the pinned Nix release into DEST/tmp and DEST/unpack.
    Fetch {
        /// Destination directory.
        dest: PathBuf,
        /// Use this platform instead of the detected one.
        #[arg(long, value_name = "OS/ARCH")]
        system: Option<Platform>,
    },

    /// Install Nix into a self-contained base directory.
    #[cfg(unix)]
    Install {
        /// Base directory (becomes /nix inside the namespace).
        #[arg(short, long, default_value = "./nix")]
        path: PathBuf,
    },

    /// Check that unprivileged user namespaces are allowed.
    CheckUserns,

    /// Print the debug shell flake, or write it into a directory.
    Manifest {
        /// Write DIR/flake.nix instead of printing.
        #[arg(long, value_name = "DIR")]
        write: Option<PathBuf>,
    },

    /// Install Nix, build the debug shell in a user namespace and package base.tar.xz.
    #[cfg(target_os = "linux")]
    BuildImage {
        /// Base directory (becomes /nix inside the namespace).
        #[arg(short, long, default_value = "./nix")]
        path: PathBuf,
        /// Output tarball.
        #[arg(short, long, default_value = "base.tar.xz")]
        output: PathBuf,
    },

    /// Namespaced half of build-image; run by build-image in a child process.
    #[cfg(target_os = "linux")]
    #[command(hide = true)]
    NamespaceBuild {
        #[arg(long)]
        path: PathBuf,
        #[arg(long)]
        root: PathBuf,
        #[arg(long)]
        output: PathBuf,
    },

    /// Compute SHA-256 of a file (e.g. a downloaded release).
    Checksum {
        /// Path to the file.
        path: String,
    },

    /// Print shell completions.
    Completions {
        shell: clap_complete::Shell,
    },

    /// Print the man page (roff).
    Man,
}

fn load_config() -> Result<config::NixdbgConfig> {
    let cfg = config::load_or_init()?;
    tracing::debug!("loaded config: {:?}", cfg);
    Ok(cfg)
}

impl CliCommand {
    pub fn run_from_args() -> Result<()> {
        let cli = Cli::parse();

        match cli.command {
            CliCommand::Fetch { dest, system } => run_fetch(&load_config()?, &dest, system)?,
            #[cfg(unix)]
            CliCommand::Install { path } => run_install(&load_config()?, &path)?,
            CliCommand::CheckUserns => run_check_userns()?,
            CliCommand::Manifest { write } => run_manifest(&load_config()?, write.as_deref())?,
            #[cfg(target_os = "linux")]
            CliCommand::BuildImage { path, output } => {
                run_build_image(&load_config()?, &path, &output)?
            }
            #[cfg(target_os = "linux")]
            CliCommand::NamespaceBuild { path, root, output } => {
                run_namespace_build(&load_config()?, &path, &root, &output)?
            }
            CliCommand::Checksum { path } => run_checksum(Path::new(&path))?,
            CliCommand::Completions { shell } => run_completions(Cli::command(), shell)?,
            CliCommand::Man => run_man(Cli::command())?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
