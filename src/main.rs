//! sessiond: session RPC intake server.
//!
//! # Architecture Overview
//!
//! ```text
//!                       ┌──────────────────────────────────────────────┐
//!                       │                 SESSIOND                     │
//!                       │                                              │
//!   Client request      │  ┌───────────┐   ┌──────────┐               │
//!   ────────────────────┼─▶│ transport │──▶│ listener │── privileged ─┼─▶ rpc/abort,
//!                       │  │ tcp/local │   │  thread  │   endpoints   │   rpc/http_log
//!                       │  └───────────┘   └────┬─────┘               │
//!                       │                       │ classify            │
//!                       │             ┌─────────┴─────────┐           │
//!                       │             ▼                   ▼           │
//!                       │      ┌────────────┐      ┌────────────┐     │
//!                       │      │ main queue │      │events queue│     │
//!                       │      └─────┬──────┘      └─────┬──────┘     │
//!                       │            ▼                   ▼            │
//!   Client response     │      foreground rpc      event long-poll    │
//!   ◀───────────────────┼──    dispatcher          responder          │
//!                       │                                              │
//!                       └──────────────────────────────────────────────┘
//! ```
//!
//! The listener owns a dedicated background thread; the dispatcher below is
//! a minimal foreground consumer that answers session RPCs until the client
//! requests `quit_session`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use serde_json::{json, Value};

use sessiond::config::{load_config, SessionConfig, TransportKind};
use sessiond::http::response;
use sessiond::http::rpc::{RpcError, RpcRequest, RpcResponse};
use sessiond::net::listener::ConnectionListener;
use sessiond::net::queue::ConnectionQueue;
#[cfg(unix)]
use sessiond::net::transport::LocalTransport;
use sessiond::net::transport::{TcpTransport, Transport};
use sessiond::observability::logging;
use sessiond::security::auth::SharedSecretAuth;
use sessiond::HttpConnection;

/// Command-line arguments.
#[derive(Debug, Parser)]
#[command(name = "sessiond", about = "Session RPC intake server", version)]
struct Args {
    /// Path to the TOML config file.
    #[arg(long, default_value = "sessiond.toml")]
    config: PathBuf,

    /// Override the TCP bind address (implies transport = "tcp").
    #[arg(long)]
    bind: Option<String>,

    /// Override the socket path (implies transport = "local").
    #[arg(long)]
    socket: Option<String>,

    /// Require this shared secret from clients.
    #[arg(long)]
    secret: Option<String>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = if args.config.exists() {
        load_config(&args.config)?
    } else {
        SessionConfig::default()
    };
    if let Some(bind) = args.bind {
        config.listener.bind_address = bind;
        config.listener.transport = TransportKind::Tcp;
    }
    if let Some(socket) = args.socket {
        config.listener.socket_path = socket;
        config.listener.transport = TransportKind::Local;
    }
    if let Some(secret) = args.secret {
        config.listener.shared_secret = Some(secret);
    }

    logging::init(&config.logging.filter);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %args.config.display(),
        "sessiond starting"
    );

    match config.listener.transport {
        TransportKind::Tcp => {
            let address = config.listener.bind_address.parse()?;
            run(TcpTransport::new(address), &config)
        }
        TransportKind::Local => {
            #[cfg(unix)]
            {
                run(
                    LocalTransport::new(config.listener.socket_path.clone()),
                    &config,
                )
            }
            #[cfg(not(unix))]
            {
                Err("local transport is not supported on this platform".into())
            }
        }
    }
}

/// Start the listener and run the foreground dispatcher until the client
/// asks the session to quit.
fn run<T: Transport>(
    transport: T,
    config: &SessionConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut listener = ConnectionListener::new(transport)
        .with_activity_capacity(config.activity_log.capacity)
        .with_stop_timeout(Duration::from_secs(config.listener.stop_timeout_secs));
    if let Some(secret) = &config.listener.shared_secret {
        listener = listener.with_auth_policy(SharedSecretAuth::new(secret.clone()));
    }

    listener.start()?;

    let events_queue = listener.events_queue();
    let events_thread = std::thread::Builder::new()
        .name("session-events".to_string())
        .spawn(move || events_loop(events_queue))?;

    let main_queue = listener.main_queue();
    dispatch_loop(&main_queue);

    listener.stop();
    if events_thread.join().is_err() {
        tracing::error!("Events thread panicked");
    }
    tracing::info!("Shutdown complete");
    Ok(())
}

/// Drain the main queue, answering RPCs until quit_session arrives.
fn dispatch_loop(main_queue: &ConnectionQueue) {
    while let Some(connection) = main_queue.dequeue() {
        if handle_connection(connection) == SessionFlow::Quit {
            break;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionFlow {
    Continue,
    Quit,
}

fn handle_connection(connection: HttpConnection) -> SessionFlow {
    if !connection.request().path().contains("rpc/") {
        tracing::debug!(path = connection.request().path(), "No handler for request");
        if let Err(error) = connection.send_response(response::not_found()) {
            tracing::debug!(error = %error, "Could not deliver 404");
        }
        return SessionFlow::Continue;
    }

    let rpc = match RpcRequest::parse(connection.request()) {
        Ok(rpc) => rpc,
        Err(error) => {
            respond(connection, RpcResponse::error(error));
            return SessionFlow::Continue;
        }
    };

    tracing::debug!(method = %rpc.method, "Dispatching rpc");
    match rpc.method.as_str() {
        "client_init" => {
            respond(
                connection,
                RpcResponse::result(json!({
                    "session_id": std::process::id().to_string(),
                })),
            );
            SessionFlow::Continue
        }
        "ping" => {
            respond(connection, RpcResponse::result(json!("pong")));
            SessionFlow::Continue
        }
        "quit_session" => {
            tracing::info!("Quit requested");
            respond(connection, RpcResponse::result(Value::Bool(true)));
            SessionFlow::Quit
        }
        other => {
            respond(connection, RpcResponse::error(RpcError::method_not_found(other)));
            SessionFlow::Continue
        }
    }
}

fn respond(connection: HttpConnection, response: RpcResponse) {
    if let Err(error) = connection.send_json_rpc(response) {
        tracing::debug!(error = %error, "Could not deliver rpc response");
    }
}

/// Answer event long-polls. No event sources exist in this dispatcher, so
/// every poll gets an empty batch with nothing further pending.
fn events_loop(events_queue: Arc<ConnectionQueue>) {
    while let Some(connection) = events_queue.dequeue() {
        let reply = RpcResponse::result(json!([])).with_events_pending(false);
        if let Err(error) = connection.send_json_rpc(reply) {
            tracing::debug!(error = %error, "Could not answer event poll");
        }
    }
}
