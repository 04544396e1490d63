//! Transport abstraction over listening endpoints.
//!
//! # Responsibilities
//! - Bind/accept for each supported transport (TCP, Unix domain sockets)
//! - Transport-level peer validation before any bytes are read
//! - Cleanup of stale listening state at start and stop
//!
//! # Design Decisions
//! - One trait seam; the listener core is written once against it
//! - TCP accepts loopback peers only; local sockets rely on file permissions
//! - Cleanup is idempotent: it runs at start, at stop, and on the abort path

use std::fmt;
use std::io;
use std::net::SocketAddr;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};

#[cfg(unix)]
use std::fs;
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
#[cfg(unix)]
use std::path::{Path, PathBuf};
#[cfg(unix)]
use tokio::net::{UnixListener, UnixStream};

/// A listening transport the connection listener can drive.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Bound endpoint producing connections.
    type Acceptor: Send + Sync;
    /// Accepted byte stream.
    type Stream: AsyncRead + AsyncWrite + Send + Unpin + 'static;
    /// Transport-level peer identity.
    type Peer: fmt::Debug + Send;

    /// Short transport name for logs.
    fn name(&self) -> &'static str;

    /// Human-readable description of the endpoint.
    fn describe(&self) -> String;

    /// Remove stale listening state. Must be idempotent; runs before bind
    /// and again after shutdown.
    fn cleanup(&self) -> io::Result<()>;

    /// Bind the listening endpoint.
    async fn bind(&self) -> io::Result<Self::Acceptor>;

    /// Wait for one inbound connection.
    async fn accept(&self, acceptor: &Self::Acceptor) -> io::Result<(Self::Stream, Self::Peer)>;

    /// Whether a connection from this peer may proceed. Runs before any
    /// bytes are read; rejected connections are closed without a response.
    fn validate_peer(&self, peer: &Self::Peer) -> bool;
}

/// TCP transport restricted to loopback peers.
#[derive(Debug, Clone)]
pub struct TcpTransport {
    address: SocketAddr,
}

impl TcpTransport {
    pub fn new(address: SocketAddr) -> Self {
        Self { address }
    }

    pub fn address(&self) -> SocketAddr {
        self.address
    }
}

#[async_trait]
impl Transport for TcpTransport {
    type Acceptor = TcpListener;
    type Stream = TcpStream;
    type Peer = SocketAddr;

    fn name(&self) -> &'static str {
        "tcp"
    }

    fn describe(&self) -> String {
        self.address.to_string()
    }

    fn cleanup(&self) -> io::Result<()> {
        Ok(())
    }

    async fn bind(&self) -> io::Result<TcpListener> {
        let listener = TcpListener::bind(self.address).await?;
        let local_addr = listener.local_addr()?;
        tracing::info!(address = %local_addr, "TCP acceptor bound");
        Ok(listener)
    }

    async fn accept(&self, acceptor: &TcpListener) -> io::Result<(TcpStream, SocketAddr)> {
        acceptor.accept().await
    }

    fn validate_peer(&self, peer: &SocketAddr) -> bool {
        peer.ip().is_loopback()
    }
}

/// Unix domain socket transport.
///
/// The socket file is restricted to the owning user, so filesystem
/// permissions are the access gate and peer validation always passes.
#[cfg(unix)]
#[derive(Debug, Clone)]
pub struct LocalTransport {
    path: PathBuf,
}

#[cfg(unix)]
impl LocalTransport {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(unix)]
#[async_trait]
impl Transport for LocalTransport {
    type Acceptor = UnixListener;
    type Stream = UnixStream;
    type Peer = tokio::net::unix::SocketAddr;

    fn name(&self) -> &'static str {
        "local"
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    /// Remove a stale socket file left behind by a previous process.
    fn cleanup(&self) -> io::Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(error) => Err(error),
        }
    }

    async fn bind(&self) -> io::Result<UnixListener> {
        let listener = UnixListener::bind(&self.path)?;
        fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600))?;
        tracing::info!(path = %self.path.display(), "Local socket acceptor bound");
        Ok(listener)
    }

    async fn accept(
        &self,
        acceptor: &UnixListener,
    ) -> io::Result<(UnixStream, tokio::net::unix::SocketAddr)> {
        acceptor.accept().await
    }

    fn validate_peer(&self, _peer: &tokio::net::unix::SocketAddr) -> bool {
        true
    }
}
