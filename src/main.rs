use std::net::SocketAddr;
use std::process::ExitCode;

use clap::Parser;
use tokio::io::BufReader;
use tracing_subscriber::EnvFilter;

use adsb_ws::hub::{Hub, HubConfig};
use adsb_ws::ingest::{run_ingest, FrameReader, Framing, DEFAULT_MAX_MESSAGE_SIZE};
use adsb_ws::server::{ServerConfig, StreamServer};

/// Relay messages read from stdin to WebSocket clients
#[derive(Parser, Debug)]
#[command(name = "adsb-ws", version)]
struct Args {
    /// Address to accept WebSocket connections on
    #[arg(long, default_value = "0.0.0.0:8080")]
    bind_address: SocketAddr,

    /// Request path for the WebSocket endpoint
    #[arg(long, default_value = "/stream")]
    path: String,

    /// Input framing on stdin: lines or varint
    #[arg(long, default_value = "lines")]
    framing: Framing,

    /// Outbound queue size per client before it is dropped as too slow
    #[arg(long, default_value_t = 256)]
    queue_capacity: usize,

    /// Maximum concurrent clients (0 = unlimited)
    #[arg(long, default_value_t = 0)]
    max_connections: usize,

    /// Largest accepted input message in bytes
    #[arg(long, default_value_t = DEFAULT_MAX_MESSAGE_SIZE)]
    max_message_size: usize,

    /// Log level when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(&args.log_level);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        process_id = std::process::id(),
        framing = %args.framing,
        queue_capacity = args.queue_capacity,
        "Runtime data"
    );

    let (hub, _hub_task) = Hub::spawn(HubConfig::default().queue_capacity(args.queue_capacity));

    let config = ServerConfig::with_addr(args.bind_address)
        .path(args.path)
        .max_connections(args.max_connections);
    let server = StreamServer::new(config, hub.clone());
    let server_task = tokio::spawn(async move { server.run().await });

    let reader = FrameReader::new(BufReader::new(tokio::io::stdin()), args.framing)
        .max_message_size(args.max_message_size);

    tokio::select! {
        result = run_ingest(reader, &hub) => match result {
            Ok(_) => ExitCode::SUCCESS,
            Err(e) => {
                tracing::error!(error = %e, "Input failed");
                ExitCode::FAILURE
            }
        },
        result = server_task => {
            match result {
                Ok(Err(e)) => tracing::error!(error = %e, "Error starting server"),
                Ok(Ok(())) => {}
                Err(e) => tracing::error!(error = %e, "Server task failed"),
            }
            ExitCode::FAILURE
        }
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
