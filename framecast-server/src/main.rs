//! Framecast server — entry point.
//!
//! ```text
//! framecast-server                   Serve with ./framecast.json (or defaults)
//! framecast-server --config <path>   Load a custom config JSON
//! framecast-server --port <port>     Override the configured port
//! framecast-server --gen-config      Write default config to stdout
//! ```

use std::path::PathBuf;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use framecast_core::{StreamConfig, StreamServer};

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "framecast-server", about = "Polled frame-streaming HTTP server")]
struct Cli {
    /// Path to configuration JSON file.
    #[arg(short, long, default_value = "framecast.json")]
    config: PathBuf,

    /// Override the configured listen port.
    #[arg(short, long)]
    port: Option<u16>,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // --gen-config: dump defaults and exit.
    if cli.gen_config {
        let text = serde_json::to_string_pretty(&StreamConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    // Init tracing.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // Load config.
    let mut config = StreamConfig::load(&cli.config);
    if let Some(port) = cli.port {
        config.port = port;
    }

    info!("framecast-server v{}", env!("CARGO_PKG_VERSION"));
    info!("port: {}", config.port);
    info!("resolution: {}x{}", config.x_res, config.y_res);
    info!("target FPS: {}", config.fps);
    if config.video_streaming {
        info!("source: video file {}", config.video_path);
    } else {
        info!("source: live display");
    }

    let server = StreamServer::new(config);
    let addr = server.start().await?;
    info!("serving on {addr}");

    tokio::signal::ctrl_c().await?;
    info!("Ctrl-C received — shutting down");
    server.stop().await?;

    Ok(())
}
