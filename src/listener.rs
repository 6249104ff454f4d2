//! Accepts frontend connections and runs one session per connection.

use crate::{
    bridge::Bridge,
    frontend,
    link::ChannelLink,
    session::{ExecutionContext, Session},
};
use anyhow::Context;
use std::{
    net::SocketAddr,
    sync::Arc,
    thread,
    time::{Duration, Instant},
};
use tokio::{
    net::{TcpListener, TcpStream},
    runtime,
    task::{self, JoinHandle, LocalSet},
};

/// How often expired interactive logins are swept.
const SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Binds the configured address and serves connections until the
/// listener fails.
pub async fn run(bridge: Arc<Bridge>) -> anyhow::Result<()> {
    let address = bridge.config().bind_address;
    let listener = TcpListener::bind(address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;
    serve(listener, bridge).await
}

/// Serves connections from an already bound listener.
pub async fn serve(listener: TcpListener, bridge: Arc<Bridge>) -> anyhow::Result<()> {
    tracing::info!("Listening on {}", listener.local_addr()?);
    let _sweeper = AbortOnDrop(spawn_sweeper(Arc::clone(&bridge)));

    loop {
        let (stream, address) = listener.accept().await.context("listener closed")?;
        if bridge.config().log_player_ip_addresses {
            tracing::debug!("Accepted connection from {address}");
        }

        // Sessions are not Send; each runs on its own LocalSet.
        let bridge = Arc::clone(&bridge);
        let runtime = runtime::Handle::current();
        thread::spawn(move || {
            let local_set = LocalSet::new();
            local_set.spawn_local(async move {
                if let Err(e) = drive_connection(stream, address, bridge).await {
                    tracing::info!("Connection lost: {e:?}");
                }
            });
            runtime.block_on(local_set);
        });
    }
}

/// Times out interactive logins nobody finished.
pub fn spawn_sweeper(bridge: Arc<Bridge>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            let expired = bridge.pending_authentications().sweep(Instant::now());
            if expired > 0 {
                tracing::debug!("Expired {expired} pending login(s)");
            }
        }
    })
}

struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

async fn drive_connection(stream: TcpStream, address: SocketAddr, bridge: Arc<Bridge>) -> anyhow::Result<()> {
    stream.set_nodelay(true)?;
    let (read_half, write_half) = stream.into_split();
    let (link, outbound) = ChannelLink::new(Some(address));
    let session = Session::new(bridge, Box::new(link), ExecutionContext::new());
    let handle = session.handle().clone();

    let writer = task::spawn_local(async move {
        if let Err(e) = frontend::write_loop(write_half, outbound).await {
            tracing::debug!("Frontend writer stopped: {e:?}");
        }
    });
    let reader = task::spawn_local(async move {
        let reason = match frontend::read_loop(read_half, handle.clone()).await {
            Ok(()) => "Disconnected by client".to_owned(),
            Err(e) => format!("{e:#}"),
        };
        handle.disconnect(reason);
    });

    session.run().await;
    reader.abort();
    writer.await.context("frontend writer panicked")?;
    Ok(())
}
