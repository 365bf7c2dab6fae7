//! Credential command implementation
//!
//! Secrets are passed straight to the vault and never echoed back.

use console::Style;

use crate::cli::{CredentialArgs, CredentialSubcommand};
use crate::context::Context;
use crate::error::{Result, registry::validation};
use crate::vault::{Credential, Vault};

pub fn run(context: &Context, args: CredentialArgs) -> Result<()> {
    let vault = Vault::new(context);
    match args.command {
        CredentialSubcommand::Add(args) => {
            let credential = credential_from(args.token, args.username, args.password)?;
            vault.store(&args.registry, &credential)?;
            println!(
                "Stored {} credential for {}",
                credential.kind(),
                Style::new().bold().yellow().apply_to(&args.registry)
            );
            Ok(())
        }
        CredentialSubcommand::Remove(args) => {
            vault.delete(&args.registry)?;
            println!("Removed credential for {}", Style::new().bold().apply_to(&args.registry));
            Ok(())
        }
        CredentialSubcommand::List => {
            let registries = vault.list()?;
            if registries.is_empty() {
                println!("No credentials stored.");
            }
            for registry in registries {
                println!("  {}", Style::new().bold().yellow().apply_to(registry));
            }
            Ok(())
        }
    }
}

fn credential_from(
    token: Option<String>,
    username: Option<String>,
    password: Option<String>,
) -> Result<Credential> {
    match (token, username, password) {
        (Some(token), None, None) => Ok(Credential::access_token(token)),
        (None, Some(username), Some(password)) => Ok(Credential::username_password(username, password)),
        _ => Err(validation("give either --token or both --username and --password")),
    }
}
