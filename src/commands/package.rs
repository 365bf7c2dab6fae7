//! Package command implementation
//!
//! `install` resolves against the configured registries over HTTP; `list`,
//! `exec` and `uninstall` only look at what is already installed.

use console::{Style, Term};

use crate::cli::{ExecArgs, InstallArgs, PackageArgs, PackageSubcommand, UninstallArgs};
use crate::context::Context;
use crate::error::Result;
use crate::installer::{InstallOptions, InstalledPackages, Installer};
use crate::remote::HttpRegistryClient;
use crate::resolver::RootRequest;
use crate::runtime::{OutputChunk, Runtime, Stream};
use crate::version::Version;

/// Run a package subcommand, returning the exit code for the process
pub fn run(context: &Context, args: PackageArgs) -> Result<i32> {
    match args.command {
        PackageSubcommand::Install(args) => install(context, &args).map(|()| 0),
        PackageSubcommand::List => list(context).map(|()| 0),
        PackageSubcommand::Exec(args) => exec(context, &args),
        PackageSubcommand::Uninstall(args) => uninstall(context, &args).map(|()| 0),
    }
}

fn install(context: &Context, args: &InstallArgs) -> Result<()> {
    let roots = args
        .packages
        .iter()
        .map(|p| RootRequest::parse(p))
        .collect::<Result<Vec<_>>>()?;
    let options = InstallOptions {
        skip_dependencies: args.skip_dependencies,
        reinstall: args.reinstall,
        prefer_static: args.prefer_static,
    };

    let client = HttpRegistryClient::new(context)?;
    let report = Installer::new(context, &client)
        .with_progress(Term::stderr().is_term())
        .install(&roots, &options)?;

    for (id, version) in &report.installed {
        println!(
            "{} {} {}",
            Style::new().green().bold().apply_to("Installed"),
            Style::new().bold().yellow().apply_to(id),
            version
        );
    }
    for (id, version) in &report.up_to_date {
        println!("{} {} {}", Style::new().dim().apply_to("Up to date"), id, version);
    }
    Ok(())
}

fn list(context: &Context) -> Result<()> {
    let entries = InstalledPackages::new(context).list()?;
    if entries.is_empty() {
        println!("No packages installed.");
        return Ok(());
    }

    println!("Installed packages ({}):", entries.len());
    for entry in &entries {
        println!(
            "  {} {}",
            Style::new().bold().yellow().apply_to(&entry.package),
            entry.version
        );
        if let Some(source) = &entry.record.source {
            println!("    {} {}", Style::new().bold().apply_to("Source:"), source);
        }
        println!(
            "    {} {}",
            Style::new().bold().apply_to("Installed:"),
            entry.record.installed_at.to_rfc3339()
        );
    }
    Ok(())
}

fn exec(context: &Context, args: &ExecArgs) -> Result<i32> {
    let version = parse_version(args.version.as_deref())?;
    let package = InstalledPackages::new(context).load(&args.package, version.as_ref())?;

    let mut sink = |chunk: &OutputChunk| match chunk.stream {
        Stream::Stdout => println!("{}", chunk.line),
        Stream::Stderr => eprintln!("{}", chunk.line),
    };
    let mut notify = |message: &str| println!("{}", Style::new().cyan().apply_to(message));

    let outcome =
        Runtime::new(context).execute_with_handlers(&package, &args.unit, &args.args, &mut sink, &mut notify)?;
    Ok(outcome.end_process.unwrap_or(outcome.exit_code))
}

fn uninstall(context: &Context, args: &UninstallArgs) -> Result<()> {
    let version = parse_version(args.version.as_deref())?;
    let removed = InstalledPackages::new(context).uninstall(&args.package, version.as_ref())?;
    for version in removed {
        println!(
            "{} {} {}",
            Style::new().green().bold().apply_to("Removed"),
            Style::new().bold().yellow().apply_to(&args.package),
            version
        );
    }
    Ok(())
}

fn parse_version(version: Option<&str>) -> Result<Option<Version>> {
    version.map(str::parse).transpose()
}
