//! MixLink - remote volume mixer pairing gateway
//!
//! Pairs phones and tablets with a short code shown on this console and
//! issues the session tokens they use for every later request.

use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use mixlink_auth::{AuthManager, PairingAnnouncement, SessionFile};
use mixlink_core::Config;
use mixlink_server::{create_router, AppState};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{info, warn, Level};
use tracing_subscriber::EnvFilter;

/// MixLink - Control this computer's volume from your phone
#[derive(Parser, Debug)]
#[command(name = "mixlink")]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Server port
    #[arg(short, long)]
    port: Option<u16>,

    /// Session storage file
    #[arg(long)]
    sessions_file: Option<PathBuf>,

    /// Maximum number of paired sessions
    #[arg(long)]
    max_sessions: Option<usize>,

    /// Extend a session's expiry every time it is used
    #[arg(long)]
    sliding_expiry: bool,

    /// Reject tokens presented from a different address than they were issued to
    #[arg(long)]
    bind_origin: bool,

    /// Reject tokens presented with a different user agent than they were issued to
    #[arg(long)]
    bind_user_agent: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .with_env_filter(EnvFilter::from_default_env().add_directive(log_level.into()))
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();

    info!("MixLink v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(&args)?;

    info!("Initializing session storage...");
    let file = match &config.sessions_file {
        Some(path) => SessionFile::with_path(path.clone())?,
        None => SessionFile::new()?,
    };
    info!("Sessions file: {:?}", file.path());

    let auth = Arc::new(AuthManager::open(&config.auth, file).await);

    let server_url = format!(
        "http://{}:{}",
        get_local_ip().unwrap_or_else(|| "localhost".to_string()),
        config.port
    );

    // Operator console: show every pairing code as it is issued
    let console = tokio::spawn(announce_pairings(auth.subscribe(), server_url.clone()));

    let state = Arc::new(AppState::new(config.clone(), auth.clone()));
    let router = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Starting server on port {}...", config.port);
    info!("");
    info!("  Access URL: {}", server_url);
    info!("");
    info!("Press Ctrl+C to stop.");

    let shutdown = async {
        tokio::signal::ctrl_c().await.ok();
        info!("Shutting down...");
    };

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await?;

    console.abort();
    auth.shutdown().await;

    info!("Goodbye!");
    Ok(())
}

/// Merge the config file (if any) with command-line overrides
fn load_config(args: &Args) -> Result<Config> {
    let path = match &args.config {
        Some(path) => path.clone(),
        None => dirs::config_dir()
            .map(|d| d.join("mixlink").join("config.json"))
            .ok_or_else(|| anyhow::anyhow!("Configuration directory not found"))?,
    };
    let mut config = Config::load(&path)?;

    if let Some(port) = args.port {
        config = config.with_port(port);
    }
    if let Some(path) = &args.sessions_file {
        config = config.with_sessions_file(path.clone());
    }
    if let Some(max) = args.max_sessions {
        config.auth = config.auth.with_session_max_count(max);
    }
    if args.sliding_expiry {
        config.auth = config.auth.with_sliding_expiry(true);
    }
    if args.bind_origin {
        config.auth = config.auth.with_origin_binding(true);
    }
    if args.bind_user_agent {
        config.auth = config.auth.with_user_agent_binding(true);
    }

    config.auth.validate()?;
    Ok(config)
}

/// Print each issued pairing code until the channel closes
async fn announce_pairings(mut rx: broadcast::Receiver<PairingAnnouncement>, server_url: String) {
    loop {
        match rx.recv().await {
            Ok(announcement) => show_pairing_code(&announcement, &server_url),
            Err(RecvError::Lagged(skipped)) => {
                warn!("Console missed {} pairing announcement(s)", skipped);
            }
            Err(RecvError::Closed) => break,
        }
    }
}

/// Deep link encoded into the console QR code
fn pairing_url(announcement: &PairingAnnouncement, server_url: &str) -> String {
    format!(
        "mixlink://pair?url={}&code={}&cid={}",
        urlencoding::encode(server_url),
        announcement.code,
        announcement.correlation_id
    )
}

fn show_pairing_code(announcement: &PairingAnnouncement, server_url: &str) {
    display_qr_code(&pairing_url(announcement, server_url));

    let remaining = (announcement.expires_at - Utc::now()).num_seconds().max(0);
    info!("");
    info!("  ╔══════════════════════════════════════╗");
    info!("  ║        PAIRING CODE: {:<8}        ║", announcement.code);
    info!("  ╚══════════════════════════════════════╝");
    info!("");
    if let Some(device) = &announcement.device_name {
        info!("  Requested by: {}", device);
    }
    if let Some(origin) = &announcement.origin_address {
        info!("  From: {}", origin);
    }
    info!("  Code expires in {} seconds", remaining);
    info!("");
}

/// Get the local IP address
fn get_local_ip() -> Option<String> {
    use std::net::UdpSocket;

    // Connecting a UDP socket sends nothing but selects the outbound interface
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("8.8.8.8:80").ok()?;
    let addr = socket.local_addr().ok()?;
    Some(addr.ip().to_string())
}

/// Display a QR code in the terminal
fn display_qr_code(data: &str) {
    use qrcode::QrCode;

    let code = match QrCode::new(data.as_bytes()) {
        Ok(c) => c,
        Err(e) => {
            warn!("Failed to generate QR code: {}", e);
            return;
        }
    };

    // Render as Unicode block characters for terminal display
    let string = code
        .render::<char>()
        .quiet_zone(true)
        .module_dimensions(2, 1)
        .build();

    for line in string.lines() {
        println!("  {}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn announcement() -> PairingAnnouncement {
        PairingAnnouncement {
            code: "ABC234".to_string(),
            correlation_id: "c0ffee".to_string(),
            device_name: None,
            origin_address: None,
            expires_at: Utc::now(),
        }
    }

    #[test]
    fn test_pairing_url_encodes_server_url() {
        let url = pairing_url(&announcement(), "http://192.168.1.20:8470");
        assert_eq!(
            url,
            "mixlink://pair?url=http%3A%2F%2F192.168.1.20%3A8470&code=ABC234&cid=c0ffee"
        );
    }

    #[test]
    fn test_pairing_url_encodes_non_ascii_as_utf8() {
        let url = pairing_url(&announcement(), "http://hôte:8470");
        assert!(url.starts_with("mixlink://pair?url=http%3A%2F%2Fh%C3%B4te%3A8470&"));
    }
}
