//! Repository command implementation

use console::Style;

use crate::cli::{AddRepositoryArgs, RepositoryArgs, RepositorySubcommand};
use crate::context::Context;
use crate::error::Result;
use crate::registry::{RepositoryRegistry, RepositoryType};

pub fn run(context: &Context, args: RepositoryArgs) -> Result<()> {
    let registry = RepositoryRegistry::new(context);
    match args.command {
        RepositorySubcommand::Add(args) => add(&registry, &args),
        RepositorySubcommand::List => list(&registry),
        RepositorySubcommand::Remove(args) => {
            registry.delete(&args.name)?;
            println!("Removed repository {}", Style::new().bold().apply_to(&args.name));
            Ok(())
        }
    }
}

fn add(registry: &RepositoryRegistry, args: &AddRepositoryArgs) -> Result<()> {
    let repo_type: RepositoryType = args.repo_type.parse()?;
    let entry = registry.add(&args.name, repo_type, &args.host, args.ssl, args.overwrite)?;
    println!(
        "Added repository {} ({} at {})",
        Style::new().bold().yellow().apply_to(&entry.name),
        entry.repo_type,
        entry.base_url()
    );
    Ok(())
}

fn list(registry: &RepositoryRegistry) -> Result<()> {
    let entries = registry.list()?;
    if entries.is_empty() {
        println!("No repositories configured.");
        return Ok(());
    }

    println!("Repositories ({}):", entries.len());
    for entry in &entries {
        println!(
            "  {} {} {} {}",
            Style::new().bold().yellow().apply_to(&entry.name),
            Style::new().cyan().apply_to(entry.repo_type),
            entry.base_url(),
            Style::new().dim().apply_to(format!("[{}]", entry.scope))
        );
    }
    Ok(())
}
