use clap::Parser;
use tracing_subscriber::EnvFilter;

use debtplan::api::{Cli, run_cli};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run_cli(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
