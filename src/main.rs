//! hashcash-pow - command line front end
//!
//! `solve` builds a challenge from the command line and configuration file,
//! solves it and prints the solution record; `verify` checks a solution
//! record read from a file or stdin.

use clap::Parser;
use hashcash_pow::{
    config::{Cli, Command, Config, VerifyArgs},
    core::constants::HASH_NAMES,
    layout::Field,
    logging::init_logging,
    worker::WorkerFactory,
    Error, Result, SolutionRecord, VerificationFailure, APP_DESCRIPTION, APP_NAME, APP_VERSION,
};
use std::path::Path;
use tokio::io::AsyncReadExt;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load and validate configuration
    let config = Config::load(&cli).await?;
    let _guard = init_logging(&config.logging)?;

    let result = match &cli.command {
        Command::Info => {
            print_info();
            Ok(())
        }
        Command::Solve(args) => run_solve(&config, args.output.as_deref()).await,
        Command::Verify(args) => run_verify(args).await,
    };

    if let Err(e) = &result {
        error!(category = e.category(), "{}", e);
    }
    result
}

/// Solve the configured challenge and write the solution record
async fn run_solve(config: &Config, output: Option<&Path>) -> Result<()> {
    let solve = &config.solve;
    let challenge = solve.challenge()?;
    let params = solve.solve_params()?;
    let cancellation = solve.cancel_token()?;
    let worker = WorkerFactory::create(solve.worker, solve.thread_count);

    info!(
        "Starting {} v{} with {} worker (hash={}, leading zero bits={})",
        APP_NAME,
        APP_VERSION,
        worker.worker_type(),
        challenge.hash(),
        challenge.leading_zero_bit_count()
    );

    let signal_token = cancellation.clone();
    let signal_handle = tokio::spawn(async move {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                if signal.is_ok() {
                    warn!("Received interrupt, stopping search");
                    signal_token.cancel_with("interrupted by signal");
                }
            }
            _ = signal_token.cancelled() => {}
        }
    });

    let result = worker.solve(challenge, params, cancellation).await;
    signal_handle.abort();
    let solution = result?;

    let json = SolutionRecord::from(&solution).to_json()?;
    match output {
        Some(path) => {
            tokio::fs::write(path, format!("{}\n", json)).await?;
            info!("Solution written to {}", path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}

/// Read a solution record and verify it
async fn run_verify(args: &VerifyArgs) -> Result<()> {
    let json = match &args.input {
        Some(path) => tokio::fs::read_to_string(path).await?,
        None => {
            let mut buf = String::new();
            tokio::io::stdin().read_to_string(&mut buf).await?;
            buf
        }
    };

    let solution = SolutionRecord::from_json(&json)?.into_solution()?;
    if args.check_alive && !solution.challenge().is_alive() {
        return Err(Error::Verification(VerificationFailure::Expired));
    }
    solution.verify()?;

    info!(nonce = %solution.nonce(), "Solution verified");
    println!("ok");
    Ok(())
}

/// Print program information
fn print_info() {
    println!("{} v{}", APP_NAME, APP_VERSION);
    println!("{}", APP_DESCRIPTION);
    println!();
    println!("Hashes:");
    for name in HASH_NAMES {
        println!("  {}", name);
    }
    println!();
    println!("Layout placeholders:");
    for field in Field::ALL {
        println!("  {{{}}}", field);
    }
}
