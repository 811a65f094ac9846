//! devicedash_demo: in-memory device API for `devicedash --demo`.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use devicedash_demo::sampler::spawn_sampler;
use devicedash_demo::state::now_unix;
use devicedash_demo::{router, AppState, Store};

#[derive(Parser, Debug)]
#[command(name = "devicedash_demo", version, about = "In-memory device API for devicedash")]
struct Args {
    /// Port to listen on
    #[arg(short = 'p', long, default_value_t = 8080, env = "DEVICEDASH_DEMO_PORT")]
    port: u16,

    /// Address to bind
    #[arg(long, default_value = "127.0.0.1")]
    bind: std::net::IpAddr,

    /// Milliseconds between telemetry samples (0 disables the sampler)
    #[arg(long, value_name = "MS", default_value_t = 2000)]
    sample_ms: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let state = AppState::new(Store::seeded(now_unix()));

    if args.sample_ms > 0 {
        let _h_sampler = spawn_sampler(state.clone(), Duration::from_millis(args.sample_ms));
    }

    let addr = SocketAddr::new(args.bind, args.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!("demo API listening on http://{addr} (graphql at /query)");
    axum::serve(listener, router(state)).await?;
    Ok(())
}
