//! The command line interface of the estimator.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// estimate the area, latency and energy of a compute-in-memory accelerator
#[derive(Parser, Debug)]
#[command(author, about, version)]
pub struct Cli {
    /// where the logs go, stderr by default
    #[clap(long, short)]
    pub log_type: Option<LogType>,
    /// subcommand
    #[clap(subcommand)]
    pub subcmd: Operation,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogType {
    /// an hourly rolling file under output/
    File,
    Stderr,
}

/// the subcommands of the estimator
#[derive(Debug, Subcommand)]
pub enum Operation {
    /// estimate one network and write the json report
    Run(RunArgs),
    /// run every config under a directory in parallel
    Sweep(SweepArgs),
    /// write a preset config
    Init(InitArgs),
}

/// the arguments of the run subcommand
#[derive(Debug, Args)]
pub struct RunArgs {
    /// the config file path
    pub config: PathBuf,
}

#[derive(Debug, Args)]
pub struct SweepArgs {
    /// searched recursively for toml files
    pub dir: PathBuf,
}

#[derive(Debug, Args)]
pub struct InitArgs {
    pub preset: Preset,
    /// the config file to write
    pub output: PathBuf,
    /// technology node in nm
    #[clap(long, default_value_t = 22)]
    pub node: u32,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Preset {
    Sram,
    Rram,
    DigitalSram,
}
