mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use serde_json::Value;
use std::process;

use commands::interest_limitation::{CarryForwardArgs, LimitationArgs, ProjectArgs};
use commands::rules::RulesArgs;

/// Interest-limitation (s.94B) and carry-forward ledger calculations
#[derive(Parser)]
#[command(
    name = "tpc",
    version,
    about = "Interest-limitation and carry-forward ledger calculations",
    long_about = "A CLI for the s.94B interest-limitation engine with decimal precision. \
                  Computes the 30% EBITDA cap on associated-enterprise interest, maintains \
                  the eight-year FIFO carry-forward ledger and projects it forward."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Rule table overrides (JSON or YAML); statutory values when omitted
    #[arg(long, global = true)]
    rules: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the interest limitation for one assessment year
    Limitation(LimitationArgs),
    /// Project disallowances and carry-forward utilization over future years
    Project(ProjectArgs),
    /// Advance a carry-forward ledger by one year
    CarryForward(CarryForwardArgs),
    /// Show the rule tables in force for an assessment year
    Rules(RulesArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn main() {
    let cli = Cli::parse();
    let rules_path = cli.rules.clone();
    let load_rules = || input::file::load_rules(rules_path.as_deref());

    let result: Result<Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Limitation(args) => load_rules()
            .and_then(|rules| commands::interest_limitation::run_limitation(args, &rules)),
        Commands::Project(args) => load_rules()
            .and_then(|rules| commands::interest_limitation::run_project(args, &rules)),
        Commands::CarryForward(args) => load_rules()
            .and_then(|rules| commands::interest_limitation::run_carry_forward(args, &rules)),
        Commands::Rules(args) => {
            load_rules().and_then(|rules| commands::rules::run_rules(args, &rules))
        }
        Commands::Version => {
            println!("tpc {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
