use clap::Parser;
use std::path::PathBuf;

/// Arguments for the build command
#[derive(Parser, Debug)]
pub struct BuildArgs {
    /// Project directory containing project.yaml
    #[arg(long, short = 'p', default_value = ".")]
    pub path: PathBuf,

    /// Build configuration whose output directory is used
    #[arg(long)]
    pub config: Option<String>,
}
