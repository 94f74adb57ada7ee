#![forbid(unsafe_code)]

use std::net::SocketAddr;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpStream;
use tracing::info;
use veil_channel::{Role, SecureChannel};
use veil_common::ChannelConfig;

#[derive(Parser, Debug)]
#[command(name = "veil-client")]
struct Args {
    #[arg(long, env = "VEIL_SERVER", default_value = "127.0.0.1:9300")]
    server: SocketAddr,
    #[arg(long, default_value = "Hello from client!")]
    message: String,
    #[arg(long, env = "VEIL_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    veil_common::init_tracing_with_default(&args.log_level);

    let config = ChannelConfig::from_env().context("invalid channel configuration")?;
    let stream = TcpStream::connect(args.server)
        .await
        .with_context(|| format!("failed to connect to {}", args.server))?;
    info!("connected to {}", args.server);

    let mut channel = SecureChannel::establish(stream, Role::Initiator, &config)
        .await
        .map_err(veil_common::Error::from)?;

    channel
        .send(args.message.as_bytes())
        .await
        .map_err(veil_common::Error::from)?;
    let reply = channel.recv().await.map_err(veil_common::Error::from)?;

    println!("{}", String::from_utf8_lossy(&reply));
    Ok(())
}
