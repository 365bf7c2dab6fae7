//! Version command implementation

use crate::package::FORMAT_VERSION;

pub fn run() {
    println!("ncc {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Build info:");
    println!("  Rust version: {}", env!("CARGO_PKG_RUST_VERSION"));
    println!("  Package format: {FORMAT_VERSION}");
    println!("  Profile: {}", build_profile());
}

fn build_profile() -> &'static str {
    if cfg!(debug_assertions) {
        "debug"
    } else {
        "release"
    }
}
