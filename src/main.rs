use clap::Parser;
use std::process::ExitCode;

use problabel::ProblabelError;
use problabel::cli::{Cli, Command};
use problabel::{config, pipeline};

fn run() -> Result<(), ProblabelError> {
    let cli = Cli::parse();
    let config = config::load_config()?;

    match cli.command {
        Command::Classify(args) => {
            let summary = pipeline::handle_classify(&args, &config)?;
            println!("{}", summary.output.display());
            Ok(())
        }
        Command::Distribution(args) => pipeline::handle_distribution(&args, &config),
        Command::Merge(args) => {
            pipeline::handle_merge(&args, &config);
            Ok(())
        }
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("problabel: {e}");
            ExitCode::from(1)
        }
    }
}
