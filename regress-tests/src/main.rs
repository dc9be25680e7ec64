//! Main binary for running regression tests

use clap::{CommandFactory, Parser};
use env_logger::Env;
use log::error;
use std::io;
use std::process;

use regress_tests::{config::Args, HarnessError, RegressHarness, RunConfig};

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("warn")).init();

    let args = Args::parse();
    let color = !args.no_color;
    if !color {
        console::set_colors_enabled(false);
    }

    let config = match RunConfig::from_args(args) {
        Ok(config) => config,
        Err(e) => {
            let _ = Args::command().print_help();
            println!();
            eprintln!("Error: {}", e);
            process::exit(e.exit_code());
        }
    };

    let harness = RegressHarness::new(config);

    let stdout = io::stdout();
    let mut out = stdout.lock();

    if let Err(e) = harness.run(&mut out) {
        match &e {
            // Already reported inline with the build transcript
            HarnessError::Build { target, .. } => {
                error!("Build failed for {}", target.as_deref().unwrap_or("default target"));
            }
            _ => eprintln!("Error: {}", e),
        }
        process::exit(e.exit_code());
    }
}
