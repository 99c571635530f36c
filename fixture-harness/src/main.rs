//! Main binary for running fixture tests

use clap::Parser;
use std::process;

use fixture_harness::{FixtureHarness, HarnessConfig, HarnessError};

#[tokio::main]
async fn main() {
    let config = HarnessConfig::parse();

    let default_filter = if config.verbose {
        "debug"
    } else if config.quiet {
        "warn"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).init();

    let harness = match FixtureHarness::new(config) {
        Ok(harness) => harness,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    match harness.run().await {
        Ok(summary) => {
            if !summary.all_passed() {
                process::exit(1);
            }
        }
        Err(HarnessError::MissingReferences(missing)) => {
            eprintln!("Error: Missing reference output files for the following tests:");
            for path in &missing {
                eprintln!("  {}", path.file_name().unwrap_or(path.as_os_str()).to_string_lossy());
            }
            eprintln!("\nPlease ensure all reference output files are present.");
            process::exit(1);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}
