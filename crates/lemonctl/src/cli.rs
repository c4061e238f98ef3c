use std::path::PathBuf;

use clap::Parser;

/// Drives a status-bar renderer by scheduling block/spark child processes
/// and composing their output into a single markup line.
#[derive(Parser)]
#[command(name = "lemonctl", version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Run even if the resolved format string yields no blocks.
    #[arg(short = 'e', long = "empty")]
    pub run_if_empty: bool,

    /// Bar section name in the config file.
    #[arg(short = 's', long = "section", default_value = "bar")]
    pub bar_section: String,

    /// Path to the config file (defaults to the XDG config location).
    #[arg(short = 'c', long = "config")]
    pub config_path: Option<PathBuf>,
}

impl Cli {
    pub fn into_preferences(self) -> lemon_core::Preferences {
        lemon_core::Preferences {
            config_path: self.config_path,
            bar_section: self.bar_section,
            run_if_empty: self.run_if_empty,
        }
    }
}
