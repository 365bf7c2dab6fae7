//! CLI definitions using clap derive API
//!
//! One submodule per command group:
//! - repository: registry definitions
//! - credential: vault entries
//! - package: install, list, exec, uninstall
//! - build: package a project

use clap::builder::{Styles, styling::AnsiColor};
use clap::{Parser, Subcommand};

pub mod build;
pub mod credential;
pub mod package;
pub mod repository;

pub use build::BuildArgs;
pub use credential::{AddCredentialArgs, CredentialArgs, CredentialSubcommand, RemoveCredentialArgs};
pub use package::{ExecArgs, InstallArgs, PackageArgs, PackageSubcommand, UninstallArgs};
pub use repository::{AddRepositoryArgs, RemoveRepositoryArgs, RepositoryArgs, RepositorySubcommand};

/// ncc - package builder and manager
///
/// Build projects into self-contained packages, install them with their
/// dependencies from GitHub, GitLab and Gitea registries, and run their units.
#[derive(Parser, Debug)]
#[command(
    name = "ncc",
    author,
    version,
    styles = Styles::styled()
        .header(AnsiColor::Green.on_default().bold())
        .usage(AnsiColor::Green.on_default().bold())
        .literal(AnsiColor::Cyan.on_default().bold())
        .placeholder(AnsiColor::Cyan.on_default()),
    about = "Package build, distribution and installation engine",
    after_help = "\x1b[1m\x1b[32mExamples:\x1b[0m\n   \
                  ncc repository add --name github --type github --host github.com\n   \
                  ncc credential add --registry github --token ghp_xxx\n   \
                  ncc package install example/tool@github\n   \
                  ncc package exec com.example.tool main\n   \
                  ncc build --config release\n"
)]
pub struct Cli {
    /// Enable verbose output
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage package registries
    Repository(RepositoryArgs),

    /// Manage registry credentials
    Credential(CredentialArgs),

    /// Install, list, run and remove packages
    Package(PackageArgs),

    /// Build a package from project.yaml
    Build(BuildArgs),

    /// Show version information
    #[command(hide = true)]
    Version,
}
