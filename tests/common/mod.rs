//! Shared utilities for listener integration testing.
#![allow(dead_code)]

use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use sessiond::lifecycle::terminate::Terminator;
use sessiond::net::transport::Transport;

/// One scripted accept outcome.
pub enum ScriptedAccept {
    /// Deliver a connected stream from this peer.
    Stream(DuplexStream, ScriptedPeer),
    /// Fail the accept with this error.
    Error(std::io::Error),
    /// Hold the listener thread in accept for this long, then fail benignly.
    Stall(Duration),
}

/// Peer identity for the scripted transport.
#[derive(Debug, Clone, Copy)]
pub struct ScriptedPeer {
    pub valid: bool,
    pub panic_on_validate: bool,
}

impl ScriptedPeer {
    pub fn valid() -> Self {
        Self {
            valid: true,
            panic_on_validate: false,
        }
    }

    pub fn invalid() -> Self {
        Self {
            valid: false,
            panic_on_validate: false,
        }
    }

    pub fn poisoned() -> Self {
        Self {
            valid: true,
            panic_on_validate: true,
        }
    }
}

/// Transport driven by a script of accept outcomes, so listener behavior can
/// be exercised without real sockets.
pub struct ScriptedTransport {
    script: Mutex<Option<UnboundedReceiver<ScriptedAccept>>>,
    pub accepts_armed: Arc<AtomicU32>,
    pub cleanup_calls: Arc<AtomicU32>,
}

impl ScriptedTransport {
    pub fn new() -> (Self, UnboundedSender<ScriptedAccept>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let transport = Self {
            script: Mutex::new(Some(rx)),
            accepts_armed: Arc::new(AtomicU32::new(0)),
            cleanup_calls: Arc::new(AtomicU32::new(0)),
        };
        (transport, tx)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    type Acceptor = tokio::sync::Mutex<UnboundedReceiver<ScriptedAccept>>;
    type Stream = DuplexStream;
    type Peer = ScriptedPeer;

    fn name(&self) -> &'static str {
        "scripted"
    }

    fn describe(&self) -> String {
        "script".to_string()
    }

    fn cleanup(&self) -> std::io::Result<()> {
        self.cleanup_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn bind(&self) -> std::io::Result<Self::Acceptor> {
        let rx = self.script.lock().unwrap().take().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::AddrInUse, "script already bound")
        })?;
        Ok(tokio::sync::Mutex::new(rx))
    }

    async fn accept(
        &self,
        acceptor: &Self::Acceptor,
    ) -> std::io::Result<(Self::Stream, Self::Peer)> {
        self.accepts_armed.fetch_add(1, Ordering::SeqCst);
        let next = acceptor.lock().await.recv().await;
        match next {
            Some(ScriptedAccept::Stream(stream, peer)) => Ok((stream, peer)),
            Some(ScriptedAccept::Error(error)) => Err(error),
            Some(ScriptedAccept::Stall(duration)) => {
                // Sleeping synchronously wedges the listener thread, like an
                // accept that never completes.
                std::thread::sleep(duration);
                Err(std::io::Error::from(std::io::ErrorKind::ConnectionAborted))
            }
            // Script exhausted: behave like an endpoint with no more clients.
            None => std::future::pending::<std::io::Result<(Self::Stream, Self::Peer)>>().await,
        }
    }

    fn validate_peer(&self, peer: &ScriptedPeer) -> bool {
        if peer.panic_on_validate {
            panic!("validation blew up");
        }
        peer.valid
    }
}

/// Terminator that records the signal instead of killing the test process.
#[derive(Clone, Default)]
pub struct RecordingTerminator {
    fired: Arc<AtomicBool>,
}

impl RecordingTerminator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fired(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }
}

impl Terminator for RecordingTerminator {
    fn terminate(&self) {
        self.fired.store(true, Ordering::SeqCst);
    }
}

/// Current-thread runtime for driving the client half of duplex streams.
pub fn client_runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

pub fn get_request(path: &str) -> String {
    format!("GET {path} HTTP/1.1\r\nHost: session\r\nConnection: close\r\n\r\n")
}

pub fn get_request_with_header(path: &str, name: &str, value: &str) -> String {
    format!(
        "GET {path} HTTP/1.1\r\nHost: session\r\n{name}: {value}\r\nConnection: close\r\n\r\n"
    )
}

pub fn post_rpc(path: &str, body: &str) -> String {
    format!(
        "POST {path} HTTP/1.1\r\nHost: session\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    )
}

/// Write a raw request and close the write half.
pub async fn send_request(client: &mut DuplexStream, request: &str) {
    client.write_all(request.as_bytes()).await.unwrap();
    client.shutdown().await.unwrap();
}

/// Like `send_request`, tolerating a server that already hung up.
pub async fn send_request_lossy(client: &mut DuplexStream, request: &str) {
    let _ = client.write_all(request.as_bytes()).await;
    let _ = client.shutdown().await;
}

/// Read the whole raw response.
pub async fn read_response(client: &mut DuplexStream) -> String {
    let mut response = Vec::new();
    client.read_to_end(&mut response).await.unwrap();
    String::from_utf8(response).unwrap()
}

/// Full request/response round trip over a duplex stream.
pub async fn roundtrip(mut client: DuplexStream, request: &str) -> String {
    send_request(&mut client, request).await;
    read_response(&mut client).await
}

/// Status code from a raw HTTP response.
pub fn response_status(raw: &str) -> u16 {
    raw.split_whitespace()
        .nth(1)
        .and_then(|code| code.parse().ok())
        .unwrap_or_else(|| panic!("malformed response: {raw:?}"))
}

/// Body portion of a raw HTTP response.
pub fn response_body(raw: &str) -> &str {
    match raw.split_once("\r\n\r\n") {
        Some((_, body)) => body,
        None => "",
    }
}

/// Body portion of a raw HTTP response, parsed as JSON.
pub fn response_json(raw: &str) -> serde_json::Value {
    serde_json::from_str(response_body(raw)).unwrap()
}

/// Blocking raw-HTTP round trip over TCP.
pub fn tcp_roundtrip(addr: &str, request: &str) -> String {
    let mut socket = std::net::TcpStream::connect(addr).unwrap();
    socket.write_all(request.as_bytes()).unwrap();
    socket.shutdown(std::net::Shutdown::Write).unwrap();
    let mut response = String::new();
    socket.read_to_string(&mut response).unwrap();
    response
}

/// Blocking raw-HTTP round trip over a unix socket.
#[cfg(unix)]
pub fn unix_roundtrip(path: &std::path::Path, request: &str) -> String {
    let mut socket = std::os::unix::net::UnixStream::connect(path).unwrap();
    socket.write_all(request.as_bytes()).unwrap();
    socket.shutdown(std::net::Shutdown::Write).unwrap();
    let mut response = String::new();
    socket.read_to_string(&mut response).unwrap();
    response
}

/// Poll until `predicate` holds or the deadline passes.
pub fn wait_for(predicate: impl Fn() -> bool, deadline: Duration) -> bool {
    let started = Instant::now();
    while started.elapsed() < deadline {
        if predicate() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    predicate()
}
