//! Progress bar display for installs

use indicatif::{ProgressBar, ProgressStyle};

/// Progress of one install call: packages written, and the one being extracted
pub struct ProgressDisplay {
    package_pb: ProgressBar,
}

impl ProgressDisplay {
    /// Visible progress for `total_packages` packages
    pub fn new(total_packages: u64) -> Self {
        let package_pb = ProgressBar::new(total_packages);
        if let Ok(style) = ProgressStyle::default_bar().template("[{bar:40.cyan/blue}] {pos}/{len} {msg}") {
            package_pb.set_style(style.progress_chars("#>-"));
        }
        Self { package_pb }
    }

    /// Progress that draws nothing, for tests and non-interactive output
    pub fn hidden() -> Self {
        Self {
            package_pb: ProgressBar::hidden(),
        }
    }

    /// Show the package currently being written
    pub fn update_package(&self, package: &str) {
        self.package_pb.set_message(truncate(package, 50));
    }

    pub fn inc_package(&self) {
        self.package_pb.inc(1);
    }

    pub fn finish(&self) {
        self.package_pb.finish_and_clear();
    }

    /// Leave the bar where it stopped after a failure
    pub fn abandon(&self) {
        self.package_pb.abandon();
    }

    pub fn position(&self) -> u64 {
        self.package_pb.position()
    }
}

fn truncate(text: &str, max: usize) -> String {
    let count = text.chars().count();
    if count <= max {
        return text.to_string();
    }
    let tail: String = text.chars().skip(count - (max - 3)).collect();
    format!("...{tail}")
}
