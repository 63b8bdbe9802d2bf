//! Command-line argument definitions

use std::path::PathBuf;

use clap::Args;

/// Arguments for the process command
#[derive(Args, Debug)]
pub struct ProcessArgs {
    /// Video files to process
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
}

/// Arguments for the folder command
#[derive(Args, Debug)]
pub struct FolderArgs {
    /// Folder containing the videos
    pub dir: PathBuf,
}
