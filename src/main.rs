use clap::Parser;
use songplays_etl::cli::{self, Args};
use songplays_etl::{EtlError, Pipeline};
use std::process;
use tracing::info;

fn main() {
    let args = Args::parse();
    cli::setup_logging(&args);

    let runtime = tokio::runtime::Runtime::new().unwrap_or_else(|e| {
        eprintln!("Failed to create async runtime: {}", e);
        process::exit(1);
    });

    let result = runtime.block_on(async {
        tokio::select! {
            result = run(&args) => result,
            signal = tokio::signal::ctrl_c() => {
                eprintln!("\nReceived CTRL+C, shutting down...");
                let reason = match signal {
                    Ok(()) => "Processing interrupted by user".to_string(),
                    Err(e) => format!("Failed to listen for CTRL+C: {}", e),
                };
                Err(EtlError::Interrupted { reason }.into())
            }
        }
    });

    match result {
        Ok(()) => process::exit(0),
        Err(error) => {
            eprintln!("Error: {:#}", error);
            process::exit(1);
        }
    }
}

async fn run(args: &Args) -> anyhow::Result<()> {
    let config = args.resolve_config()?;
    info!(
        "Processing {} into {}",
        config.storage.input_path.display(),
        config.storage.output_path.display()
    );

    let pipeline = Pipeline::new(config)?.with_progress(args.show_progress());
    let stats = pipeline.run().await?;

    if !args.quiet {
        cli::print_summary(&stats, args.output_format)?;
    }
    Ok(())
}
