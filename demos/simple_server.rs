//! Simple RTMP front door example
//!
//! Run with: cargo run --example simple_server [BIND_ADDR]
//!
//! Examples:
//!   cargo run --example simple_server                    # binds to 0.0.0.0:1935
//!   cargo run --example simple_server localhost          # binds to 127.0.0.1:1935
//!   cargo run --example simple_server 127.0.0.1:1936     # binds to 127.0.0.1:1936
//!
//! Any RTMP client completes the handshake against this server (watch the
//! debug log for the negotiated mode). After the handshake the example speaks
//! a toy line protocol instead of RTMP chunks, so the registry can be poked
//! with netcat-style tools:
//!
//!   PUBLISH <stream>\n
//!   PLAY <stream>\n
//!
//! The server answers `OK\n` on admission and drops the connection on
//! rejection.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};

use rtmp_hub::protocol::HandshakeMode;
use rtmp_hub::registry::{Admission, Group};
use rtmp_hub::session::{ProtocolFuture, SessionContext, SessionHandle, SessionIo, SessionProtocol};
use rtmp_hub::{RtmpHandler, RtmpServer, ServerConfig};

/// Lets one publisher per stream in, and anyone play
struct MyHandler;

impl RtmpHandler for MyHandler {
    fn on_connection(&self, session: &SessionHandle) -> bool {
        println!("[{}] New connection from {}", session.id(), session.peer_addr());
        true
    }

    fn on_handshake_complete(&self, session: &SessionHandle, mode: HandshakeMode) {
        println!("[{}] Handshake complete ({:?})", session.id(), mode);
    }

    fn decide_publish(&self, session: &SessionHandle, group: &Group) -> bool {
        println!(
            "[{}] Publish request: app={} stream={}",
            session.id(),
            session.app(),
            group.stream_name()
        );
        !group.has_publisher()
    }

    fn decide_subscribe(&self, session: &SessionHandle, group: &Group) -> bool {
        println!(
            "[{}] Play request: stream={} subscribers={}",
            session.id(),
            group.stream_name(),
            group.subscriber_count()
        );
        true
    }

    fn on_session_end(&self, session: &SessionHandle) {
        println!(
            "[{}] Disconnected after {:?} ({:?})",
            session.id(),
            session.duration(),
            session.role()
        );
    }
}

/// Line based stand-in for the RTMP command layer
struct LineCommands;

impl SessionProtocol for LineCommands {
    fn serve<'a>(&'a self, io: &'a mut dyn SessionIo, ctx: &'a SessionContext) -> ProtocolFuture<'a> {
        Box::pin(async move {
            let mut reader = BufReader::new(io);
            let mut line = String::new();
            if reader.read_line(&mut line).await? == 0 {
                return Ok(());
            }

            let admission = match line.trim().split_once(' ') {
                Some(("PUBLISH", stream)) => ctx.publish("live", stream).await?,
                Some(("PLAY", stream)) => ctx.play("live", stream).await?,
                _ => {
                    reader.get_mut().write_all(b"ERR unknown command\n").await?;
                    return Ok(());
                }
            };

            if admission == Admission::Accepted {
                reader.get_mut().write_all(b"OK\n").await?;
            }

            // Hold the session until the peer leaves
            let mut buf = [0u8; 4096];
            while reader.read(&mut buf).await? > 0 {}
            Ok(())
        })
    }
}

fn parse_bind_addr(arg: &str) -> Result<SocketAddr, String> {
    const DEFAULT_PORT: u16 = 1935;

    let normalized = arg.replace("localhost", "127.0.0.1");

    if let Ok(addr) = normalized.parse::<SocketAddr>() {
        return Ok(addr);
    }

    if let Ok(ip) = normalized.parse::<std::net::IpAddr>() {
        return Ok(SocketAddr::new(ip, DEFAULT_PORT));
    }

    Err(format!(
        "Invalid bind address: '{}'. Expected format: IP:PORT or IP or 'localhost'",
        arg
    ))
}

fn print_usage() {
    eprintln!("Usage: simple_server [BIND_ADDR]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  BIND_ADDR    Address to bind to (default: 0.0.0.0:1935)");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }

    let config = match args.get(1) {
        Some(addr_str) => match parse_bind_addr(addr_str) {
            Ok(addr) => ServerConfig::with_addr(addr),
            Err(e) => {
                eprintln!("Error: {}", e);
                eprintln!();
                print_usage();
                std::process::exit(1);
            }
        },
        None => ServerConfig::default(),
    };

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("rtmp_hub=debug".parse()?)
                .add_directive("simple_server=debug".parse()?),
        )
        .init();

    println!("Starting RTMP server on {}", config.bind_addr);

    let server = Arc::new(RtmpServer::new(config, MyHandler, LineCommands));

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                eprintln!("Server error: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            println!("\nShutting down...");
            server.dispose();
        }
    }

    let streams = server.registry().stream_count().await;
    println!("Streams seen: {}", streams);

    Ok(())
}
