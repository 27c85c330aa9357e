//! orca - Kubernetes-inspired AI agent orchestration CLI.

use clap::Parser;

mod client;
mod commands;
mod error;
mod output;

use commands::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(err) = cli.run().await {
        error::print_error(&err);
        std::process::exit(1);
    }
}
