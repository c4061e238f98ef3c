use anyhow::Result;
use clap::Parser;

mod cli;

use cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init()
        .ok();

    let cli = Cli::parse();
    let prefs = cli.into_preferences();

    let state = lemon_config::load(prefs)?;

    let mut event_loop = lemon_loop::EventLoop::bootstrap(state).await?;
    event_loop.run().await?;

    Ok(())
}
