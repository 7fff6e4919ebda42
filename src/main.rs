use clap::Parser;
use road_data_scraper::cli::{self, Args};
use road_data_scraper::run_log::RunLog;
use std::process;

fn main() {
    let args = Args::parse();
    let run_log = RunLog::new();
    cli::setup_logging(&args, &run_log);

    let runtime = tokio::runtime::Runtime::new().unwrap_or_else(|e| {
        eprintln!("Failed to create async runtime: {}", e);
        process::exit(1);
    });

    match runtime.block_on(cli::run(&args, run_log)) {
        Ok(summary) => {
            if !args.quiet {
                cli::print_summary(&summary);
            }
            process::exit(0);
        }
        Err(error) => {
            eprintln!("Error: {:#}", error);
            process::exit(1);
        }
    }
}
