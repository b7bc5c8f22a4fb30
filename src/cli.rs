use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "deppy",
    about = "Dependency update bot - keeps Gradle catalogs, the Gradle wrapper and npm manifests current through a pull request",
    version,
    author
)]
pub struct Cli {
    /// Path to the configuration file (defaults to ./deppy.toml when present)
    #[arg(short, long, global = true, env = "DEPPY_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose output for debugging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run periodically and after pushes to the main branch until interrupted
    Serve,

    /// Perform a single update run and exit
    Run,

    /// Show exclusions and the tracked integration branch head
    Status,

    /// Never upgrade to the given versions
    Exclude {
        /// Entries such as "react:18.0.0, com.google.guava:guava:33.0.0-jre"
        #[arg(value_name = "DEPENDENCIES", required = true, num_args = 1..)]
        dependencies: Vec<String>,

        /// Treat names and versions as regular expressions
        #[arg(short, long)]
        pattern: bool,
    },

    /// Remove entries previously added with `exclude`
    Include {
        /// Entries exactly as they were excluded
        #[arg(value_name = "DEPENDENCIES", required = true, num_args = 1..)]
        dependencies: Vec<String>,

        /// Remove from the pattern list instead
        #[arg(short, long)]
        pattern: bool,
    },
}
