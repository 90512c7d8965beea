mod cli;

use anyhow::Result;
use cli::Args;
use emotion_tally::session::{log_summary, run_session};

fn main() -> Result<()> {
    // Load environment variables from .env if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt::init();

    let args = Args::parse_args();
    let config = args.into_config();

    let report = run_session(&config)?;
    log_summary(&report);

    Ok(())
}
