use clap::{ArgAction, Parser, Subcommand};

/// Arguments for the repository command
#[derive(Parser, Debug)]
#[command(after_help = "EXAMPLES:\n  \
                  Add a GitHub registry:\n    ncc repository add --name github --type github --host github.com\n\n\
                  Replace it with a self-hosted Gitea:\n    ncc repository add --name github --type gitea --host git.example.com --ssl=false --overwrite\n\n\
                  Remove a user registry:\n    ncc repository remove --name github")]
pub struct RepositoryArgs {
    #[command(subcommand)]
    pub command: RepositorySubcommand,
}

#[derive(Subcommand, Debug)]
pub enum RepositorySubcommand {
    /// Add a repository to the user scope
    Add(AddRepositoryArgs),

    /// List repositories from the system and user scopes
    List,

    /// Remove a repository from the user scope
    Remove(RemoveRepositoryArgs),
}

#[derive(Parser, Debug)]
pub struct AddRepositoryArgs {
    /// Name used in `owner/project@name` references
    #[arg(long)]
    pub name: String,

    /// Repository type: github, gitlab or gitea
    #[arg(long = "type", value_name = "TYPE")]
    pub repo_type: String,

    /// Host name or IP address, optionally with a port
    #[arg(long)]
    pub host: String,

    /// Connect over HTTPS
    #[arg(
        long,
        num_args = 0..=1,
        default_value_t = true,
        default_missing_value = "true",
        action = ArgAction::Set
    )]
    pub ssl: bool,

    /// Replace an existing user repository of the same name
    #[arg(long)]
    pub overwrite: bool,
}

#[derive(Parser, Debug)]
pub struct RemoveRepositoryArgs {
    #[arg(long)]
    pub name: String,
}
