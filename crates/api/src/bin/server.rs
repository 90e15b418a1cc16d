//! Concord Conflict Engine REST API Server
//!
//! Serves one in-memory conflict engine over HTTP. Trading agents submit
//! disagreeing signals, callers report realized outcomes, and the engine's
//! learned trust and statistics can be inspected or exported.

use clap::Parser;
use concord_api::{router_with_state, ApiState};
use concord_manager::EngineConfig;
use concord_resolver::DEFAULT_MIN_CONFIDENCE_TO_ACT;
use std::net::SocketAddr;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Concord Conflict Engine REST API Server
#[derive(Parser, Debug)]
#[command(
    name = "concord-server",
    about = "REST API server for the Concord signal conflict engine",
    long_about = "An HTTP server that arbitrates conflicting trading signals,\n\
                  learns per-agent trust from reported outcomes, and exposes the learned state.",
    version
)]
struct Args {
    /// Server host address
    #[arg(
        short = 'H',
        long,
        default_value = "0.0.0.0",
        env = "CONCORD_HOST",
        help = "Host address to bind the server to"
    )]
    host: String,

    /// Server port
    #[arg(
        short,
        long,
        default_value = "3000",
        env = "CONCORD_PORT",
        help = "Port number to bind the server to"
    )]
    port: u16,

    /// Logging level
    #[arg(
        short,
        long,
        default_value = "info",
        env = "RUST_LOG",
        help = "Logging level (trace, debug, info, warn, error)"
    )]
    log_level: String,

    /// Enable JSON formatted logs
    #[arg(
        long,
        default_value = "false",
        env = "CONCORD_JSON_LOGS",
        help = "Output logs in JSON format"
    )]
    json_logs: bool,

    /// Minimum confidence before a weighted method commits to a direction
    #[arg(
        long,
        default_value_t = DEFAULT_MIN_CONFIDENCE_TO_ACT,
        env = "CONCORD_MIN_CONFIDENCE"
    )]
    min_confidence: f64,

    /// Resolved cases kept before the history is halved
    #[arg(long, default_value = "10000", env = "CONCORD_HISTORY_LIMIT")]
    history_limit: usize,

    /// Entries kept per pattern signature (unbounded when unset)
    #[arg(long, env = "CONCORD_PATTERN_HISTORY_LIMIT")]
    pattern_history_limit: Option<usize>,
}

impl Args {
    fn engine_config(&self) -> EngineConfig {
        EngineConfig::new()
            .with_min_confidence_to_act(self.min_confidence)
            .with_history_limit(self.history_limit)
            .with_pattern_history_limit(self.pattern_history_limit)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_tracing(&args);

    let addr: SocketAddr = format!("{}:{}", args.host, args.port)
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid host or port: {}", e))?;

    let config = args.engine_config();
    info!(
        min_confidence_to_act = config.min_confidence_to_act,
        history_limit = config.history_limit,
        pattern_history_limit = ?config.pattern_history_limit,
        "Engine configured"
    );

    let app = router_with_state(ApiState::with_config(config));

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", addr, e))?;

    print_banner(&addr);

    info!("Server starting on http://{}", addr);
    info!("Health check available at http://{}/health", addr);

    axum::serve(listener, app)
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    Ok(())
}

/// Initialize tracing subscriber with appropriate configuration
fn init_tracing(args: &Args) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    if args.json_logs {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }
}

/// Print startup banner with server information
fn print_banner(addr: &SocketAddr) {
    println!();
    println!("  Concord Conflict Engine - REST API Server");
    println!();
    println!("  Server Address:    http://{}", addr);
    println!("  Health Check:      http://{}/health", addr);
    println!();
    println!("  Conflicts:");
    println!("     POST   /conflicts                 - Arbitrate a signal set");
    println!("     POST   /conflicts/{{id}}/outcome    - Report realized outcome");
    println!("     GET    /conflicts/{{id}}            - Retrieve a case");
    println!("     GET    /conflicts/recent          - Recently resolved cases");
    println!("     GET    /conflicts/active          - Unresolved cases");
    println!();
    println!("  Trust:");
    println!("     GET    /trust                     - All trust profiles");
    println!("     GET    /trust/ranked              - Agents by accuracy");
    println!("     GET    /trust/{{agent}}             - One agent's profile");
    println!("     DELETE /trust/{{agent}}             - Reset an agent");
    println!();
    println!("  System:");
    println!("     GET    /health                    - Health check");
    println!("     GET    /stats                     - Resolution statistics");
    println!("     GET    /snapshot                  - Export learned state");
    println!();
}
