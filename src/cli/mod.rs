//! CLI module for Sightclip
//!
//! This module handles command-line argument parsing and command execution.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::adapters::LogFormat;

pub mod args;
pub mod commands;

/// Sightclip object-triggered video clipper
///
/// Runs every frame of a video through an object classifier and writes a clip
/// per object class whenever that class stays present long enough.
#[derive(Parser, Debug)]
#[command(name = "sightclip")]
#[command(about = "Sightclip - Clip videos and live streams wherever objects appear")]
#[command(version)]
#[command(long_about = None)]
pub struct Cli {
    /// Configuration file (TOML); defaults apply when it does not exist
    #[arg(long, env = "SIGHTCLIP_CONFIG", default_value = "sightclip.toml", global = true)]
    pub config: PathBuf,

    /// Logging level, overridden by RUST_LOG
    #[arg(long, default_value = "info", global = true)]
    pub log_level: String,

    /// Log output format (pretty or json)
    #[arg(long, default_value = "pretty", global = true)]
    pub log_format: LogFormat,

    /// Root directory for clips and logs
    #[arg(long, env = "SIGHTCLIP_OUTPUT_DIR", global = true)]
    pub output_dir: Option<PathBuf>,

    /// Maximum number of videos processed at once
    #[arg(long, env = "SIGHTCLIP_MAX_JOBS", global = true)]
    pub max_jobs: Option<usize>,

    /// The command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Process one or more video files
    Process(args::ProcessArgs),
    /// Process every video in a folder
    Folder(args::FolderArgs),
    /// Record live channels and process each recording when it ends
    Watch,
    /// Validate the configuration and print the effective values
    CheckConfig,
}
