use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "lamebatch")]
#[command(author, version, about = "Batch WAV to MP3 converter")]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Convert every selected file/setting pair of a project
    Convert {
        /// Project file (TOML)
        #[arg(required = true)]
        project: PathBuf,

        /// Number of conversions to run at once (overrides the project)
        #[arg(short, long, value_parser = clap::value_parser!(u16).range(1..))]
        jobs: Option<u16>,

        /// Seconds between progress reports
        #[arg(long, default_value = "1")]
        progress_interval: u64,
    },

    /// Validate a WAV file and display its format
    Probe {
        /// File to probe
        #[arg(required = true)]
        file: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate a project file
    Validate {
        /// Project file to validate
        #[arg(required = true)]
        project: PathBuf,
    },

    /// Check a LAME options string against the encoder
    Options {
        /// Options, e.g. "-m j -V 2 --vbr-new"
        #[arg(required = true, allow_hyphen_values = true)]
        options: String,
    },
}
