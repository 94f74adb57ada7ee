#![forbid(unsafe_code)]

use std::net::SocketAddr;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tracing::{info, warn};
use veil_channel::{Role, SecureChannel};
use veil_common::ChannelConfig;

const REPLY: &[u8] = b"Hello from server!";

#[derive(Parser, Debug)]
#[command(name = "veil-server")]
struct Args {
    #[arg(long, env = "VEIL_LISTEN", default_value = "0.0.0.0:9300")]
    listen: SocketAddr,
    /// Default log filter when RUST_LOG is unset.
    #[arg(long, env = "VEIL_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    veil_common::init_tracing_with_default(&args.log_level);

    let config = ChannelConfig::from_env().context("invalid channel configuration")?;
    let listener = TcpListener::bind(args.listen)
        .await
        .with_context(|| format!("failed to bind {}", args.listen))?;
    info!(
        "listening on {} (group {}, framing {})",
        args.listen,
        config.group.name(),
        config.framing
    );

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(conn) => conn,
                    Err(err) => {
                        warn!("accept failed: {}", err);
                        continue;
                    }
                };
                let config = config.clone();
                tokio::spawn(async move {
                    if let Err(err) = serve(stream, peer, &config).await {
                        warn!("session with {} ended: {}", peer, err);
                    }
                });
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                break;
            }
        }
    }

    Ok(())
}

/// One session: receive a single message, answer it, close.
async fn serve<S>(stream: S, peer: SocketAddr, config: &ChannelConfig) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    info!("connection from {}", peer);
    let mut channel = SecureChannel::establish(stream, Role::Responder, config)
        .await
        .map_err(veil_common::Error::from)?;

    let message = channel.recv().await.map_err(veil_common::Error::from)?;
    info!("received {} byte message from {}", message.len(), peer);

    channel
        .send(REPLY)
        .await
        .map_err(veil_common::Error::from)?;
    channel.into_inner().shutdown().await?;
    Ok(())
}
