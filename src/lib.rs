//! Session RPC intake server library.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod security;

pub use config::schema::SessionConfig;
pub use net::connection::HttpConnection;
pub use net::listener::{ConnectionListener, ListenerState, StartError};
pub use net::queue::ConnectionQueue;
pub use net::transport::{TcpTransport, Transport};
#[cfg(unix)]
pub use net::transport::LocalTransport;
pub use observability::activity::ActivityLog;
