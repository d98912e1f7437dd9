//! a first-order estimator for compute-in-memory neural network accelerators
// #![deny(unsafe_code)]
// #![warn(missing_docs)]
pub mod analysis;
pub mod cim;
pub mod cli;
pub mod tools;

use std::{
    ffi::OsString,
    fs::File,
    io::{self, BufWriter},
    path::Path,
    time::Instant,
};

use clap::Parser;
use cli::{Cli, InitArgs, LogType, Operation, Preset, RunArgs, SweepArgs};
use eyre::{Result, WrapErr};
use rayon::prelude::*;
use tracing::{error, info, metadata::LevelFilter};
use tracing_subscriber::fmt::MakeWriter;
use walkdir::WalkDir;

use crate::{analysis::results::ChipReport, cim::config::Config};
pub use cim::Simulator;

pub fn init_logger_with_ansi(
    filter: LevelFilter,
    writer: impl for<'writer> MakeWriter<'writer> + 'static + Send + Sync,
    ansi: bool,
) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(filter.into())
                .from_env_lossy(),
        )
        .with_writer(writer)
        .with_ansi(ansi)
        .try_init()
        .unwrap_or_else(|e| {
            eprintln!("failed to init logger: {}", e);
        });
}

pub fn init_logger(
    filter: LevelFilter,
    writer: impl for<'writer> MakeWriter<'writer> + 'static + Send + Sync,
) {
    init_logger_with_ansi(filter, writer, false);
}

pub fn init_logger_stderr(filter: LevelFilter) {
    init_logger_with_ansi(filter, io::stderr, true);
}

/// load, estimate and write the report of one config
pub fn run_config(path: &Path) -> Result<ChipReport> {
    let config = Config::new(path)?;
    info!("building simulator for {:?}", path);
    let simulator = Simulator::new(&config)?;
    let layers = simulator.load_workloads(&config)?;
    info!("start estimating {} layers", layers.len());
    let report = simulator.run(&layers);
    if let Some(parent) = config.network.output_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    serde_json::to_writer(
        BufWriter::new(
            File::create(&config.network.output_path)
                .wrap_err_with(|| format!("cannot create {:?}", config.network.output_path))?,
        ),
        &report,
    )?;
    info!("the result is written to {:?}", config.network.output_path);
    Ok(report)
}

fn sweep(dir: &Path) -> Result<()> {
    let configs: Vec<_> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && e.path().extension().is_some_and(|ext| ext == "toml"))
        .map(|e| e.into_path())
        .collect();
    info!("sweeping {} configs under {:?}", configs.len(), dir);
    let results: Vec<_> = configs
        .par_iter()
        .map(|path| (path, run_config(path)))
        .collect();
    println!("{:<40} {:>12} {:>12} {:>12} {:>12}", "config", "TOPS/W", "TOPS", "FPS", "TOPS/mm2");
    let mut failed = 0;
    for (path, result) in results {
        match result {
            Ok(report) => {
                let s = &report.summary;
                println!(
                    "{:<40} {:>12.4} {:>12.4} {:>12.4} {:>12.4}",
                    path.display(),
                    s.tops_per_watt,
                    s.tops,
                    s.fps,
                    s.tops_per_mm2
                );
            }
            Err(e) => {
                failed += 1;
                error!("{:?} failed: {:?}", path, e);
            }
        }
    }
    if failed > 0 {
        eyre::bail!("{failed} configs failed");
    }
    Ok(())
}

/// the main function of the estimator
pub fn main_inner<A, T>(args: A) -> Result<()>
where
    A: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);
    let file_appender = tracing_appender::rolling::hourly("output/", "cim_sim.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    match cli.log_type.unwrap_or(LogType::Stderr) {
        LogType::File => init_logger(LevelFilter::INFO, non_blocking),
        LogType::Stderr => init_logger_stderr(LevelFilter::INFO),
    }
    let current_time = Instant::now();

    match cli.subcmd {
        Operation::Run(RunArgs { config }) => {
            println!("run with config: {:?}", config);
            let report = run_config(&config)?;
            report.show_results();
        }
        Operation::Sweep(SweepArgs { dir }) => sweep(&dir)?,
        Operation::Init(InitArgs { preset, output, node }) => {
            let config = match preset {
                Preset::Sram => Config::from_sram(node),
                Preset::Rram => Config::from_rram(node),
                Preset::DigitalSram => Config::from_digital_sram(node),
            };
            config.save_to_file(&output)?;
            info!("{:?} preset written to {:?}", preset, output);
        }
    };
    info!(
        "time elapsed: {}",
        humantime::format_duration(current_time.elapsed())
    );
    Ok(())
}
