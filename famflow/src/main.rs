use clap::Parser;
use famflow::{draw_tree, run, select};

#[derive(Parser)]
#[command(version, about)]
enum CliCommand {
    /// Run the whole pipeline, or a range of its stages.
    Run(run::Cli),
    /// Print the families that pass the size threshold.
    Select(select::Cli),
    /// Draw a Newick tree as ASCII dendrogram.
    DrawTree(draw_tree::Cli),
}

fn main() -> anyhow::Result<()> {
    match CliCommand::parse() {
        CliCommand::Run(cli) => run::cli(cli),
        CliCommand::Select(cli) => select::cli(cli),
        CliCommand::DrawTree(cli) => draw_tree::cli(cli),
    }
}
