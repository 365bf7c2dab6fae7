//! Build command implementation

use console::Style;

use crate::cli::BuildArgs;
use crate::error::Result;
use crate::package::JsonParser;
use crate::package::build::Builder;

pub fn run(args: &BuildArgs) -> Result<()> {
    let output = Builder::new(&args.path, &JsonParser).build(args.config.as_deref())?;
    println!(
        "Built {} {} ({} components, {} units)",
        Style::new().bold().yellow().apply_to(output.package.id()),
        output.package.version(),
        output.package.components.len(),
        output.package.execution_units.len()
    );
    println!("  {} {}", Style::new().bold().apply_to("Output:"), output.path.display());
    println!("  {} {}", Style::new().bold().apply_to("Hash:"), output.content_hash);
    Ok(())
}
