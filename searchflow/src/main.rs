//! searchflow CLI - cited web overviews from the command line.

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use searchflow::cancellation::CancellationToken;
use searchflow::observability::init_tracing;
use searchflow::pipeline::Pipeline;
use std::sync::Arc;
use tracing::warn;

#[tokio::main]
async fn main() -> Result<()> {
    // a missing .env is fine
    let _ = dotenvy::dotenv();

    let args = cli::Args::parse();
    let config = args.load_config()?;
    init_tracing(&config.log.level, config.log.json);

    let pipeline = Pipeline::builder()
        .config(config)
        .with_http_adapters()
        .context("Failed to set up HTTP adapters")?
        .build()
        .context("Failed to build pipeline")?;

    let token = Arc::new(CancellationToken::new());
    token.on_cancel(|| warn!("Interrupted, abandoning in-flight requests"));
    {
        let token = Arc::clone(&token);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                token.cancel("interrupted by user");
            }
        });
    }

    let report = pipeline.run_cancellable(&args.query(), &token).await?;

    if args.json {
        println!("{}", report.to_json()?);
        return Ok(());
    }

    print!("{}", report.overview);
    for degradation in &report.degradations {
        warn!(
            stage = %degradation.stage,
            subject = %degradation.subject,
            error = %degradation.error,
            "Degraded"
        );
    }
    Ok(())
}
