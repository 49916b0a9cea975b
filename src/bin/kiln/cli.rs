//! CLI definitions using clap.

use std::path::PathBuf;

use clap::Parser;

use kiln::ops::{BuildOptions, Mode};
use kiln::util::shell::ColorChoice;

/// Kiln - run build targets with their dependencies and hooks
#[derive(Parser)]
#[command(name = "kiln")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Targets to run (defaults to the declared default target)
    #[arg(value_name = "TARGET")]
    pub targets: Vec<String>,

    /// Path to the build description (defaults to the nearest Kiln.toml)
    #[arg(short = 'f', long = "file", env = "KILN_FILE", value_name = "PATH")]
    pub file: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only print failures
    #[arg(short, long)]
    pub quiet: bool,

    /// Coloring: auto, always, never
    #[arg(long, value_name = "WHEN", default_value = "auto")]
    pub color: ColorChoice,

    /// List targets with their dependencies and hooks
    #[arg(long, conflicts_with_all = ["plan", "graph"])]
    pub list: bool,

    /// Print the execution plan without running it
    #[arg(long, conflicts_with = "graph")]
    pub plan: bool,

    /// Print the target graph in Graphviz DOT format
    #[arg(long)]
    pub graph: bool,
}

impl Cli {
    pub fn mode(&self) -> Mode {
        if self.list {
            Mode::List
        } else if self.plan {
            Mode::Plan
        } else if self.graph {
            Mode::Graph
        } else {
            Mode::Run
        }
    }

    pub fn build_options(&self) -> BuildOptions {
        BuildOptions {
            manifest_path: self.file.clone(),
            targets: self.targets.clone(),
            mode: self.mode(),
        }
    }
}
