use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::{Parser, ValueEnum};
use lib_famflow::{
    config::PipelineConfig, pipeline::Pipeline, stages::StageKind, tool::ProcessRunner,
};
use log::{LevelFilter, error, info};

use crate::init_logging;

#[derive(Parser)]
pub struct Cli {
    #[clap(long, short = 'l', default_value = "info")]
    log_level: LevelFilter,

    /// A toml file with the pipeline configuration.
    ///
    /// Missing values take their defaults, and the options below override it.
    #[clap(long, short = 'c')]
    config: Option<PathBuf>,

    /// The directory holding the sequence archive and receiving the `families` directory.
    #[clap(long, short = 'a')]
    analysis_dir: Option<PathBuf>,

    /// The directory holding the alphabet and color map of the logos.
    #[clap(long, short = 'd')]
    data_dir: Option<PathBuf>,

    /// The sequence archive, by default inside the analysis directory.
    #[clap(long)]
    archive: Option<PathBuf>,

    /// Families with fewer members are skipped.
    #[clap(long, short = 'm')]
    min_family_size: Option<usize>,

    /// The number of worker threads, 0 for one per core.
    #[clap(long, short = 't')]
    threads: Option<usize>,

    /// Kill external tools that run longer than this many seconds.
    #[clap(long)]
    timeout: Option<u64>,

    /// The first stage to run.
    #[clap(long, default_value = "fasta")]
    from: CliStage,

    /// The last stage to run.
    #[clap(long, default_value = "logo")]
    to: CliStage,

    /// Keep complete artifacts of earlier runs instead of producing them again.
    #[clap(long)]
    reuse_existing: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CliStage {
    Fasta,
    Align,
    Tree,
    DrawTree,
    Profile,
    Logo,
}

impl From<CliStage> for StageKind {
    fn from(value: CliStage) -> Self {
        match value {
            CliStage::Fasta => Self::Fasta,
            CliStage::Align => Self::Alignment,
            CliStage::Tree => Self::TreeInference,
            CliStage::DrawTree => Self::TreeRendering,
            CliStage::Profile => Self::ProfileBuilding,
            CliStage::Logo => Self::LogoRendering,
        }
    }
}

impl Cli {
    fn pipeline_config(&self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => {
                info!("Reading configuration from {path:?}");
                PipelineConfig::read_toml(path)?
            }
            None => PipelineConfig::default(),
        };

        if let Some(analysis_dir) = &self.analysis_dir {
            config.analysis_dir = analysis_dir.clone();
        }
        if let Some(data_dir) = &self.data_dir {
            config.data_dir = data_dir.clone();
        }
        if let Some(archive) = &self.archive {
            config.archive = Some(archive.clone());
        }
        if let Some(min_family_size) = self.min_family_size {
            config.min_family_size = min_family_size;
        }
        if let Some(threads) = self.threads {
            config.threads = threads;
        }
        if let Some(timeout) = self.timeout {
            config.tool_timeout_secs = Some(timeout);
        }
        config.reuse_existing |= self.reuse_existing;

        Ok(config)
    }
}

pub fn cli(cli: Cli) -> Result<()> {
    init_logging(cli.log_level);

    let config = cli.pipeline_config()?;
    let tools = ProcessRunner::new(config.tool_timeout());
    let pipeline =
        Pipeline::new(config, &tools).with_stage_range(cli.from.into(), cli.to.into());
    let report = pipeline.run()?;

    info!("Selected {} families", report.selected.len());
    for summary in &report.stages {
        info!(
            "{}: {} completed, {} reused, {} failed",
            summary.stage, summary.completed, summary.reused, summary.failed
        );
    }
    for (family, failure) in &report.failures {
        error!("Family {family} failed in the {} stage: {}", failure.stage, failure.error);
    }

    if !report.is_success() {
        bail!(
            "{} of {} families failed",
            report.failures.len(),
            report.selected.len()
        );
    }
    Ok(())
}
