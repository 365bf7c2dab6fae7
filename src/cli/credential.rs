use clap::{ArgGroup, Parser, Subcommand};

/// Arguments for the credential command
#[derive(Parser, Debug)]
#[command(after_help = "EXAMPLES:\n  \
                  Store an access token:\n    ncc credential add --registry github --token ghp_xxx\n\n\
                  Store a username and password:\n    ncc credential add --registry gitlab --username me --password secret")]
pub struct CredentialArgs {
    #[command(subcommand)]
    pub command: CredentialSubcommand,
}

#[derive(Subcommand, Debug)]
pub enum CredentialSubcommand {
    /// Store a credential for a registry, replacing any existing one
    Add(AddCredentialArgs),

    /// Delete the credential of a registry
    Remove(RemoveCredentialArgs),

    /// List registries that have a stored credential
    List,
}

#[derive(Parser, Debug)]
#[command(group(ArgGroup::new("secret").required(true).args(["token", "username"])))]
pub struct AddCredentialArgs {
    #[arg(long)]
    pub registry: String,

    /// Access token sent as a bearer token
    #[arg(long, conflicts_with_all = ["username", "password"])]
    pub token: Option<String>,

    #[arg(long, requires = "password")]
    pub username: Option<String>,

    #[arg(long, requires = "username")]
    pub password: Option<String>,
}

#[derive(Parser, Debug)]
pub struct RemoveCredentialArgs {
    #[arg(long)]
    pub registry: String,
}
