//! Connection listener core.
//!
//! # Responsibilities
//! - Own the background accept thread and its event engine
//! - Accept → validate → read → classify → dispatch, one accept in flight
//! - Answer privileged endpoints on the listener thread itself
//! - Bounded stop: signal, join with timeout, detach if stuck
//!
//! # Design Decisions
//! - The engine is a current-thread runtime; every listener-side completion
//!   runs on the one background thread
//! - The accept loop re-arms unconditionally; one bad connection must never
//!   stall admission
//! - Privileged endpoints bypass the queues so they work when consumers are
//!   wedged
//! - Process termination is an injected signal, not an inline abort call

use std::io;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::Request;
use hyper_util::rt::TokioIo;
use serde_json::Value;
use thiserror::Error;
use tokio::runtime;
use tokio::sync::watch;

use crate::http::request::SessionRequest;
use crate::http::response::{self, SessionResponse};
use crate::http::rpc::RpcResponse;
use crate::lifecycle::signals::SignalBlocker;
use crate::lifecycle::terminate::{ProcessAbort, Terminator};
use crate::net::connection::HttpConnection;
use crate::net::queue::ConnectionQueue;
use crate::net::transport::Transport;
use crate::observability::activity::{ActivityKind, ActivityLog};
use crate::security::auth::{AuthPolicy, PermissiveAuth};

const ABORT_SUFFIX: &str = "rpc/abort";
const HTTP_LOG_SUFFIX: &str = "rpc/http_log";
const GET_EVENTS_SUFFIX: &str = "events/get_events";

/// Default bound on how long `stop` waits for the listener thread to exit.
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(3);

/// Listener lifecycle. A stopped listener is not restartable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    Created,
    Started,
    Stopped,
}

/// Error starting the listener.
#[derive(Debug, Error)]
pub enum StartError {
    #[error("listener already started")]
    AlreadyStarted,

    #[error("transport cleanup failed before bind: {source}")]
    Cleanup {
        #[source]
        source: io::Error,
    },

    #[error("failed to build the listener engine: {source}")]
    Engine {
        #[source]
        source: io::Error,
    },

    #[error("failed to bind {transport} acceptor at {endpoint}: {source}")]
    Bind {
        transport: &'static str,
        endpoint: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to spawn the listener thread: {source}")]
    Thread {
        #[source]
        source: io::Error,
    },
}

/// How a request path is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    /// Privileged: acknowledge, then terminate the process.
    Abort,
    /// Privileged: answer with the activity log.
    HttpLog,
    /// Event long-poll, handed to the events queue.
    Events,
    /// Everything else, handed to the main queue.
    Main,
}

impl Route {
    fn classify(path: &str) -> Self {
        if path.ends_with(ABORT_SUFFIX) {
            Route::Abort
        } else if path.ends_with(HTTP_LOG_SUFFIX) {
            Route::HttpLog
        } else if path.ends_with(GET_EVENTS_SUFFIX) {
            Route::Events
        } else {
            Route::Main
        }
    }
}

/// State shared between the listener handle, the accept loop, and
/// per-connection tasks.
struct ListenerShared<T: Transport> {
    transport: T,
    main_queue: Arc<ConnectionQueue>,
    events_queue: Arc<ConnectionQueue>,
    activity: Arc<ActivityLog>,
    auth: Arc<dyn AuthPolicy>,
    terminator: Arc<dyn Terminator>,
    abort_requested: AtomicBool,
}

impl<T: Transport> ListenerShared<T> {
    /// Route one fully-read connection. Runs on the listener thread.
    fn dispatch(&self, connection: HttpConnection) {
        self.activity.record(ActivityKind::Received, connection.id());

        if !self.auth.authenticate(connection.request()) {
            tracing::warn!(
                id = %connection.id(),
                peer = connection.peer(),
                "Rejected unauthenticated connection"
            );
            if let Err(error) = connection.send_response(response::forbidden()) {
                tracing::debug!(error = %error, "Could not deliver 403");
            }
            return;
        }

        match Route::classify(connection.request().path()) {
            Route::Abort => self.handle_abort(connection),
            Route::HttpLog => self.handle_http_log(connection),
            Route::Events => self.events_queue.enqueue(connection),
            Route::Main => self.main_queue.enqueue(connection),
        }
    }

    /// Acknowledge an abort request and flag the connection's task to
    /// terminate the process once the acknowledgement is flushed.
    fn handle_abort(&self, connection: HttpConnection) {
        let id = connection.id();
        // Best-effort: the abort proceeds whether or not the ack lands.
        let _ = connection.send_json_rpc(RpcResponse::result(Value::Null));
        self.abort_requested.store(true, Ordering::SeqCst);
        tracing::debug!(id = %id, "Abort acknowledged");
    }

    /// Answer a diagnostic log query with the recorded activity. No
    /// foreground state is touched, so this works when consumers are stuck.
    fn handle_http_log(&self, connection: HttpConnection) {
        let reply = RpcResponse::result(self.activity.as_json()).with_events_pending(false);
        if let Err(error) = connection.send_json_rpc(reply) {
            tracing::debug!(error = %error, "Could not deliver activity log");
        }
    }

    /// Final abort steps, run after the acknowledgement has been flushed.
    fn finish_abort(&self) {
        tracing::warn!("Abort requested");
        if let Err(error) = self.transport.cleanup() {
            tracing::error!(error = %error, "Transport cleanup failed during abort");
        }
        self.terminator.terminate();
    }
}

/// Owner of the background accept thread and the two connection queues.
///
/// `start` binds the transport and launches the thread; consumers drain
/// `main_queue` and `events_queue` from the foreground; `stop` shuts the
/// thread down within a bounded wait.
pub struct ConnectionListener<T: Transport> {
    transport: Option<T>,
    main_queue: Arc<ConnectionQueue>,
    events_queue: Arc<ConnectionQueue>,
    activity: Arc<ActivityLog>,
    auth: Arc<dyn AuthPolicy>,
    terminator: Arc<dyn Terminator>,
    stop_timeout: Duration,
    state: ListenerState,
    running: Option<Running<T>>,
}

struct Running<T: Transport> {
    shared: Arc<ListenerShared<T>>,
    shutdown_tx: watch::Sender<bool>,
    thread: thread::JoinHandle<()>,
    done_rx: mpsc::Receiver<()>,
}

impl<T: Transport> ConnectionListener<T> {
    /// Create a listener over `transport` with the default hooks:
    /// permissive authentication and process-abort termination.
    pub fn new(transport: T) -> Self {
        let activity = Arc::new(ActivityLog::default());
        let main_queue = Arc::new(ConnectionQueue::new("main", Arc::clone(&activity)));
        let events_queue = Arc::new(ConnectionQueue::new("events", Arc::clone(&activity)));
        Self {
            transport: Some(transport),
            main_queue,
            events_queue,
            activity,
            auth: Arc::new(PermissiveAuth),
            terminator: Arc::new(ProcessAbort),
            stop_timeout: DEFAULT_STOP_TIMEOUT,
            state: ListenerState::Created,
            running: None,
        }
    }

    /// Replace the authentication hook. Configure before `start`.
    pub fn with_auth_policy(mut self, policy: impl AuthPolicy + 'static) -> Self {
        self.auth = Arc::new(policy);
        self
    }

    /// Replace the termination signal. Configure before `start`.
    pub fn with_terminator(mut self, terminator: impl Terminator + 'static) -> Self {
        self.terminator = Arc::new(terminator);
        self
    }

    /// Resize the activity log. Configure before `start`; this replaces the
    /// queue handles as well.
    pub fn with_activity_capacity(mut self, capacity: usize) -> Self {
        self.activity = Arc::new(ActivityLog::new(capacity));
        self.main_queue = Arc::new(ConnectionQueue::new("main", Arc::clone(&self.activity)));
        self.events_queue = Arc::new(ConnectionQueue::new("events", Arc::clone(&self.activity)));
        self
    }

    /// Change the bound on how long `stop` waits for the thread to exit.
    pub fn with_stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = timeout;
        self
    }

    /// Queue of ordinary request connections.
    pub fn main_queue(&self) -> Arc<ConnectionQueue> {
        Arc::clone(&self.main_queue)
    }

    /// Queue of event long-poll connections.
    pub fn events_queue(&self) -> Arc<ConnectionQueue> {
        Arc::clone(&self.events_queue)
    }

    pub fn activity_log(&self) -> Arc<ActivityLog> {
        Arc::clone(&self.activity)
    }

    pub fn state(&self) -> ListenerState {
        self.state
    }

    /// Bind the transport and launch the background accept thread.
    ///
    /// If this fails before the thread exists the listener stays `Created`
    /// and may be started again; a failed thread spawn leaves it `Stopped`.
    pub fn start(&mut self) -> Result<(), StartError> {
        if self.state != ListenerState::Created {
            return Err(StartError::AlreadyStarted);
        }
        let transport = match self.transport.take() {
            Some(transport) => transport,
            None => return Err(StartError::AlreadyStarted),
        };

        if let Err(source) = transport.cleanup() {
            self.transport = Some(transport);
            return Err(StartError::Cleanup { source });
        }

        let engine = match runtime::Builder::new_current_thread().enable_all().build() {
            Ok(engine) => engine,
            Err(source) => {
                self.transport = Some(transport);
                return Err(StartError::Engine { source });
            }
        };

        let acceptor = match engine.block_on(transport.bind()) {
            Ok(acceptor) => acceptor,
            Err(source) => {
                let error = StartError::Bind {
                    transport: transport.name(),
                    endpoint: transport.describe(),
                    source,
                };
                self.transport = Some(transport);
                return Err(error);
            }
        };

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (done_tx, done_rx) = mpsc::channel();
        let shared = Arc::new(ListenerShared {
            transport,
            main_queue: Arc::clone(&self.main_queue),
            events_queue: Arc::clone(&self.events_queue),
            activity: Arc::clone(&self.activity),
            auth: Arc::clone(&self.auth),
            terminator: Arc::clone(&self.terminator),
            abort_requested: AtomicBool::new(false),
        });

        let loop_shared = Arc::clone(&shared);
        // The spawned thread inherits a fully blocked signal mask; the
        // caller's mask is restored once the spawn returns.
        let blocker = SignalBlocker::block_all();
        let spawned = thread::Builder::new()
            .name("session-listener".to_string())
            .spawn(move || {
                engine.block_on(accept_loop(loop_shared, acceptor, shutdown_rx));
                // Tear the engine down before reporting done, so "done"
                // means every connection task is gone too.
                drop(engine);
                let _ = done_tx.send(());
            });
        drop(blocker);

        let thread = match spawned {
            Ok(thread) => thread,
            Err(source) => {
                self.state = ListenerState::Stopped;
                return Err(StartError::Thread { source });
            }
        };

        tracing::info!(
            transport = shared.transport.name(),
            endpoint = %shared.transport.describe(),
            "Connection listener started"
        );
        self.running = Some(Running {
            shared,
            shutdown_tx,
            thread,
            done_rx,
        });
        self.state = ListenerState::Started;
        Ok(())
    }

    /// Stop the background thread within the stop timeout, then run
    /// transport cleanup and close both queues.
    ///
    /// A thread that does not exit in time is detached with a warning; a
    /// hung listener must never hang shutdown.
    pub fn stop(&mut self) {
        if self.state != ListenerState::Started {
            tracing::warn!(state = ?self.state, "Stop requested but listener is not running");
            return;
        }
        let running = match self.running.take() {
            Some(running) => running,
            None => {
                self.state = ListenerState::Stopped;
                return;
            }
        };
        let Running {
            shared,
            shutdown_tx,
            thread,
            done_rx,
        } = running;

        // The thread may already be gone; a dead receiver is fine.
        let _ = shutdown_tx.send(true);

        match done_rx.recv_timeout(self.stop_timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if thread.join().is_err() {
                    tracing::error!("Listener thread panicked");
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                tracing::warn!(
                    timeout_ms = self.stop_timeout.as_millis() as u64,
                    "Listener thread did not stop in time, detaching"
                );
                drop(thread);
            }
        }

        if let Err(error) = shared.transport.cleanup() {
            tracing::error!(error = %error, "Transport cleanup failed during stop");
        }

        self.main_queue.shutdown();
        self.events_queue.shutdown();
        self.state = ListenerState::Stopped;
        tracing::info!("Connection listener stopped");
    }
}

/// Background accept loop. One accept in flight, raced against shutdown;
/// re-arms after every completion.
async fn accept_loop<T: Transport>(
    shared: Arc<ListenerShared<T>>,
    acceptor: T::Acceptor,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => {
                tracing::debug!(transport = shared.transport.name(), "Accept loop exiting");
                break;
            }
            accepted = shared.transport.accept(&acceptor) => {
                handle_accept(&shared, accepted);
            }
        }
    }
    // Dropping the acceptor here closes the listening endpoint.
}

/// Handle one accept completion. Never lets a bad connection, an accept
/// error, or a panic stop the loop.
fn handle_accept<T: Transport>(
    shared: &Arc<ListenerShared<T>>,
    accepted: io::Result<(T::Stream, T::Peer)>,
) {
    let outcome = catch_unwind(AssertUnwindSafe(|| match accepted {
        Ok((stream, peer)) => {
            if shared.transport.validate_peer(&peer) {
                let peer_desc = format!("{peer:?}");
                tokio::spawn(serve_connection(Arc::clone(shared), stream, peer_desc));
            } else {
                // Closed without a response.
                tracing::warn!(
                    transport = shared.transport.name(),
                    peer = ?peer,
                    "Rejected connection from invalid peer"
                );
            }
        }
        Err(error) => {
            if !is_benign_accept_error(&error) {
                tracing::error!(
                    transport = shared.transport.name(),
                    error = %error,
                    "Accept failed"
                );
            }
        }
    }));
    if outcome.is_err() {
        tracing::error!(
            transport = shared.transport.name(),
            "Panic while handling an accepted connection"
        );
    }
}

/// Accept errors that occur routinely while the acceptor is being shut
/// down. These are not logged; anything else is.
fn is_benign_accept_error(error: &io::Error) -> bool {
    if matches!(
        error.kind(),
        io::ErrorKind::ConnectionAborted | io::ErrorKind::InvalidInput
    ) {
        return true;
    }
    #[cfg(unix)]
    if error.raw_os_error() == Some(libc::EBADF) {
        return true;
    }
    false
}

/// Per-connection task: serve one request, then run deferred abort steps if
/// an abort was acknowledged on this connection.
async fn serve_connection<T: Transport>(
    shared: Arc<ListenerShared<T>>,
    stream: T::Stream,
    peer: String,
) {
    let io = TokioIo::new(stream);
    let service_shared = Arc::clone(&shared);
    let service_peer = peer.clone();
    let service = service_fn(move |request| {
        let shared = Arc::clone(&service_shared);
        let peer = service_peer.clone();
        async move { read_and_dispatch(shared, peer, request).await }
    });

    let served = http1::Builder::new()
        .keep_alive(false)
        .serve_connection(io, service)
        .await;
    if let Err(error) = served {
        tracing::debug!(peer = %peer, error = %error, "Connection ended abnormally");
    }

    // Serving has completed, so the abort ack (if any) has been flushed.
    if shared.abort_requested.load(Ordering::SeqCst) {
        shared.finish_abort();
    }
}

/// Collect the request and hand it to the dispatcher; resolves once a
/// consumer (or a privileged handler) responds.
async fn read_and_dispatch<T: Transport>(
    shared: Arc<ListenerShared<T>>,
    peer: String,
    request: Request<Incoming>,
) -> Result<SessionResponse, ServeError> {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let headers = request.headers().clone();
    let body = request.into_body().collect().await?.to_bytes();

    let snapshot = SessionRequest::new(method, uri, headers, body);
    let (connection, response_rx) =
        HttpConnection::new(snapshot, peer, Arc::clone(&shared.activity));
    tracing::debug!(
        id = %connection.id(),
        path = connection.request().path(),
        "Request read"
    );
    shared.dispatch(connection);

    response_rx.await.map_err(|_| ServeError::Dropped)
}

/// Why a connection could not produce a response.
#[derive(Debug, Error)]
enum ServeError {
    #[error("failed to read request body")]
    Body(#[from] hyper::Error),
    #[error("connection was dropped before a response was sent")]
    Dropped,
}
