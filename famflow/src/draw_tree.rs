use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use lib_famshow::{
    ascii_tree::{DEFAULT_COLUMN_WIDTH, draw_ascii},
    newick::{RECURSION_STACK_SIZE, Tree},
};
use log::{LevelFilter, info};

use crate::init_logging;

#[derive(Parser)]
pub struct Cli {
    #[clap(long, short = 'l', default_value = "info")]
    log_level: LevelFilter,

    /// A tree in Newick format.
    #[clap(long, short = 'i')]
    input: PathBuf,

    /// Write the drawing here instead of to stdout.
    #[clap(long, short = 'o')]
    output: Option<PathBuf>,

    /// The width of the drawing in characters.
    #[clap(long, short = 'w', default_value_t = DEFAULT_COLUMN_WIDTH)]
    width: usize,
}

pub fn cli(cli: Cli) -> Result<()> {
    init_logging(cli.log_level);

    info!("Reading tree from {:?}", cli.input);
    let input = std::fs::read_to_string(&cli.input)
        .with_context(|| format!("Unable to read {:?}", cli.input))?;
    let width = cli.width;
    let drawing = std::thread::Builder::new()
        .stack_size(RECURSION_STACK_SIZE)
        .spawn(move || Tree::parse(&input).map(|tree| draw_ascii(&tree, width)))?
        .join()
        .map_err(|_| anyhow!("Drawing the tree panicked"))?
        .with_context(|| format!("Malformed tree in {:?}", cli.input))?;

    match &cli.output {
        Some(output) => {
            info!("Writing drawing to {output:?}");
            std::fs::write(output, drawing)
                .with_context(|| format!("Unable to write {output:?}"))?;
        }
        None => print!("{drawing}"),
    }
    Ok(())
}
