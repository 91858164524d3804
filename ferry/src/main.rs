use std::process::ExitCode;

use clap::{Parser, Subcommand};
use snafu::ResultExt;
use tokio_util::sync::CancellationToken;

use crate::{
    error::{ObservabilitySnafu, Result},
    mapping::MappingArgs,
    write::WriteArgs,
};

mod error;
mod input;
mod mapping;
mod store;
mod write;

#[derive(Parser)]
#[command(name = "ferry")]
#[command(about = "Write tabular records into a search index")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Prepare the index and write NDJSON records into it
    Write {
        #[clap(flatten)]
        inner: WriteArgs,
    },
    /// Print the index body synthesized from a job configuration
    Mapping {
        #[clap(flatten)]
        inner: MappingArgs,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {}", snafu::Report::from_error(&err));
            ExitCode::from(err.kind().exit_code() as u8)
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let guard = ferry_observability::init_observability(
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
    )
    .context(ObservabilitySnafu {})?;

    let ct = CancellationToken::new();

    let ct_clone = ct.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        ct_clone.cancel();
    });

    let result = match cli.command {
        Commands::Write { inner } => inner.run(ct).await,
        Commands::Mapping { inner } => inner.run(ct).await,
    };

    guard.shutdown();
    result
}
