use clap::{Parser, Subcommand};

/// Arguments for the package command
#[derive(Parser, Debug)]
#[command(after_help = "EXAMPLES:\n  \
                  Install a package and its dependencies:\n    ncc package install example/tool@github\n\n\
                  Install a version range:\n    ncc package install \"example/tool=>=1.2,<2.0@github\"\n\n\
                  Run a unit of an installed package:\n    ncc package exec com.example.tool main -- --help")]
pub struct PackageArgs {
    #[command(subcommand)]
    pub command: PackageSubcommand,
}

#[derive(Subcommand, Debug)]
pub enum PackageSubcommand {
    /// Install packages from their registries
    Install(InstallArgs),

    /// List installed packages
    List,

    /// Run an execution unit of an installed package
    Exec(ExecArgs),

    /// Remove an installed package
    Uninstall(UninstallArgs),
}

#[derive(Parser, Debug)]
pub struct InstallArgs {
    /// Packages as owner/project[=constraint]@registry
    #[arg(required = true, value_name = "PACKAGE")]
    pub packages: Vec<String>,

    /// Install only the named packages
    #[arg(long)]
    pub skip_dependencies: bool,

    /// Fetch again even if already installed
    #[arg(long)]
    pub reinstall: bool,

    /// Prefer statically linked builds when a registry publishes one
    #[arg(long)]
    pub prefer_static: bool,
}

#[derive(Parser, Debug)]
pub struct ExecArgs {
    /// Package id, e.g. com.example.tool
    pub package: String,

    /// Execution unit name
    pub unit: String,

    /// Installed version to run (newest by default)
    #[arg(long)]
    pub version: Option<String>,

    /// Arguments passed to the unit
    #[arg(last = true)]
    pub args: Vec<String>,
}

#[derive(Parser, Debug)]
pub struct UninstallArgs {
    /// Package id, e.g. com.example.tool
    pub package: String,

    /// Remove only this version
    #[arg(long)]
    pub version: Option<String>,
}
