use anyhow::Context;
use clap::Parser;
use minecraft_bridge::{
    auth::FileTokenStore,
    bridge::Bridge,
    config::{AuthType, ProxyConfig},
    identity::PassthroughKey,
    listener,
};
use std::{net::SocketAddr, path::PathBuf, sync::Arc};
use tracing::Level;

/// Lets Bedrock Edition clients join a Java Edition server.
#[derive(Debug, Parser)]
#[command(version)]
struct Args {
    /// JSON config file. Defaults are used when it does not exist.
    #[arg(long, default_value = "config.json")]
    config: PathBuf,
    /// Address to accept frontend connections on.
    #[arg(long)]
    bind: Option<SocketAddr>,
    /// Java server to connect players to, as `host:port`.
    #[arg(long)]
    remote: Option<String>,
    /// Log at debug level.
    #[arg(long)]
    debug: bool,
    /// Where refresh tokens of online logins are kept.
    #[arg(long, default_value = "tokens.json")]
    tokens: PathBuf,
}

#[tokio::main]
pub async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let mut config = if args.config.exists() {
        ProxyConfig::load(&args.config)?
    } else {
        ProxyConfig::default()
    };
    if let Some(bind) = args.bind {
        config.bind_address = bind;
    }
    if let Some(remote) = &args.remote {
        let (address, port) = remote
            .rsplit_once(':')
            .context("--remote must be host:port")?;
        config.remote.address = address.to_owned();
        config.remote.port = port.parse().context("invalid remote port")?;
    }
    config.debug_mode |= args.debug;

    let level = if config.debug_mode {
        Level::DEBUG
    } else {
        Level::INFO
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    let mut builder = Bridge::builder(config.clone())
        .refresh_tokens(Arc::new(FileTokenStore::open(&args.tokens)?));
    if config.remote.auth_type == AuthType::Passthrough {
        let key = PassthroughKey::load(&config.passthrough_key_file).with_context(|| {
            format!(
                "failed to load passthrough key from {}",
                config.passthrough_key_file.display()
            )
        })?;
        builder = builder.passthrough_key(key);
    }

    tracing::info!(
        "Started, forwarding to {}:{} ({} auth)",
        config.remote.address,
        config.remote.port,
        config.remote.auth_type
    );
    listener::run(builder.build()).await
}
