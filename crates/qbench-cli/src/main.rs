use std::error::Error;

use clap::{Parser, Subcommand};
use commands::{
    compare::{self, CompareArgs},
    generate::{self, GenerateArgs},
    run::{self, RunArgs},
    show::{self, ListArgs, ShowArgs},
};

mod commands;
mod config;
mod logging;

#[derive(Parser, Debug)]
#[command(name = "qbench", about = "Parametrized benchmark harness for a query engine")]
struct Cli {
    /// Raise log verbosity (-v debug, -vv trace). `RUST_LOG` takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build, start and sweep the engine for every configured experiment.
    Run(RunArgs),
    /// Write standalone selectivity scripts.
    Generate(GenerateArgs),
    /// Print one stored series.
    Show(ShowArgs),
    /// List stored series names.
    List(ListArgs),
    /// Compare two stored series on the points they share.
    Compare(CompareArgs),
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    logging::init(cli.verbose);
    match cli.command {
        Command::Run(args) => run::run(&args),
        Command::Generate(args) => generate::run(&args),
        Command::Show(args) => show::show(&args),
        Command::List(args) => show::list(&args),
        Command::Compare(args) => compare::run(&args),
    }
}
