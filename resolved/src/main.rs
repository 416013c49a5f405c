use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::Parser;
use dns_resolver::cache::SharedCache;
use dns_resolver::metrics::Metrics;
use resolved::{dispatcher, fs_util};
use tokio::net::UdpSocket;
use tracing_subscriber::EnvFilter;

/// A recursive/authoritative DNS name server for a single zone.
#[derive(Debug, Parser)]
struct Args {
    /// IP address of the root nameserver to begin iterative resolution from
    root_ip: Ipv4Addr,

    /// Path to the zone file this server is authoritative for
    zone_path: PathBuf,

    /// UDP port to listen on (0 picks an ephemeral port)
    #[clap(long, default_value_t = 0)]
    port: u16,
}

fn begin_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    begin_logging();

    let zone = match fs_util::zone_from_file(&args.zone_path).await {
        Ok(zone) => zone,
        Err(error) => {
            tracing::error!(zone_path = ?args.zone_path, %error, "could not load zone file");
            process::exit(1);
        }
    };
    tracing::info!(apex = %zone.apex(), "loaded zone");

    let socket = match UdpSocket::bind(("127.0.0.1", args.port)).await {
        Ok(socket) => socket,
        Err(error) => {
            tracing::error!(%error, "could not bind UDP socket");
            process::exit(1);
        }
    };
    let bound_port = socket
        .local_addr()
        .map(|addr| addr.port())
        .unwrap_or(args.port);
    tracing::info!(port = bound_port, "listening");

    let cache = SharedCache::new();
    let metrics = Metrics::new();
    let zone = Arc::new(zone);
    let socket = Arc::new(socket);

    let dispatcher = tokio::spawn(dispatcher::run(
        Arc::clone(&socket),
        Arc::clone(&zone),
        cache.clone(),
        args.root_ip,
        metrics.clone(),
    ));
    let sweeper = tokio::spawn(sweep_cache_task(cache));

    tokio::select! {
        _ = dispatcher => {}
        _ = sweeper => {}
        _ = shutdown_signal() => {
            tracing::info!("shutting down");
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(error) => {
                tracing::warn!(%error, "could not subscribe to SIGTERM");
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}

/// Periodically sweep expired cache entries, rather than relying
/// solely on lazy eviction at lookup time.
async fn sweep_cache_task(cache: SharedCache) {
    let mut interval = tokio::time::interval(std::time::Duration::from_secs(60));
    loop {
        interval.tick().await;
        cache.sweep(std::time::Instant::now());
    }
}
