use clap::Parser;
use player_core::ContextFactory;
use tracing::info;

use player::cli::{run, Args};
use player::config::PlayerConfig;

#[cfg(feature = "device")]
fn context_factory() -> ContextFactory<player_core::DeviceContext> {
    Box::new(|| {
        let ctx = player_core::DeviceContext::new()?;
        info!("Using output device: {}", ctx.device_name());
        Ok(ctx)
    })
}

#[cfg(not(feature = "device"))]
fn context_factory() -> ContextFactory<player_core::HeadlessContext> {
    Box::new(|| {
        info!("Built without device output; decoded audio is saved, not played");
        Ok(player_core::HeadlessContext::new())
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let _ = dotenv::dotenv();

    let args = Args::parse();
    let config = args.apply(PlayerConfig::from_env());
    info!(
        "Player configuration: url={}, threshold={} bytes, streaming={}",
        config.url, config.trigger_threshold, config.streaming
    );

    let summary = run(&args, &config, context_factory()).await?;

    if args.metrics {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    }
    Ok(())
}
