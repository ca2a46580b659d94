use std::{io::Write, path::PathBuf};

use anyhow::Result;
use clap::Parser;
use lib_famflow::{
    catalog::SequenceCatalog,
    config::PipelineConfig,
    selection::{DEFAULT_MIN_FAMILY_SIZE, select_families},
};
use log::LevelFilter;

use crate::init_logging;

#[derive(Parser)]
pub struct Cli {
    #[clap(long, short = 'l', default_value = "warn")]
    log_level: LevelFilter,

    /// The sequence archive, `analysis/AMPSphere_v.2022-03.faa.gz` by default.
    #[clap(long, short = 'i')]
    archive: Option<PathBuf>,

    /// Families with fewer members are skipped.
    #[clap(long, short = 'm', default_value_t = DEFAULT_MIN_FAMILY_SIZE)]
    min_family_size: usize,

    /// Write the list here instead of to stdout.
    #[clap(long, short = 'o')]
    output: Option<PathBuf>,
}

pub fn cli(cli: Cli) -> Result<()> {
    init_logging(cli.log_level);

    let archive = cli
        .archive
        .clone()
        .unwrap_or_else(|| PipelineConfig::default().archive_path());
    let catalog = SequenceCatalog::load(archive)?;
    let selected = select_families(catalog.families(), cli.min_family_size);

    let mut output: Box<dyn Write> = match &cli.output {
        Some(path) => Box::new(std::io::BufWriter::new(std::fs::File::create(path)?)),
        None => Box::new(std::io::stdout().lock()),
    };
    write_selection(&mut output, &catalog, selected.iter())?;
    output.flush()?;
    Ok(())
}

/// Writes one `family<TAB>size` line per family.
pub fn write_selection<'family>(
    mut output: impl Write,
    catalog: &SequenceCatalog,
    families: impl IntoIterator<Item = &'family str>,
) -> std::io::Result<()> {
    for family in families {
        let size = catalog.families().members(family).map_or(0, <[String]>::len);
        writeln!(output, "{family}\t{size}")?;
    }
    Ok(())
}
