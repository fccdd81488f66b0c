use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "vgloss")]
#[command(about = "Index a photo gallery and its image metadata", long_about = None)]
pub struct Cli {
    /// Gallery root (defaults to the current directory)
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Initialize the gallery and run a first scan
    Init {
        /// Don't ask for keyboard input
        #[arg(long)]
        noinput: bool,
    },
    /// Detect new, changed and removed files and scan their metadata
    Scan,
    /// Print the index entry for one file, relative to the gallery root
    Show { path: String },
    /// List indexed folders
    Folders,
    /// Print configuration values
    PrintConfig,
}
