//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges and platform support
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Validation is a pure function: SessionConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::{SessionConfig, TransportKind};

/// One semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener.bind_address '{0}' is not a valid socket address")]
    InvalidBindAddress(String),

    #[error("listener.socket_path must not be empty when transport = \"local\"")]
    EmptySocketPath,

    #[error("listener.shared_secret must not be empty when present")]
    EmptySharedSecret,

    #[error("activity_log.capacity must be at least 1")]
    ZeroActivityCapacity,

    #[error("transport \"local\" is not supported on this platform")]
    LocalTransportUnsupported,
}

/// Check all semantic constraints, collecting every violation.
pub fn validate_config(config: &SessionConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    match config.listener.transport {
        TransportKind::Tcp => {
            if config.listener.bind_address.parse::<SocketAddr>().is_err() {
                errors.push(ValidationError::InvalidBindAddress(
                    config.listener.bind_address.clone(),
                ));
            }
        }
        TransportKind::Local => {
            if config.listener.socket_path.is_empty() {
                errors.push(ValidationError::EmptySocketPath);
            }
            #[cfg(not(unix))]
            errors.push(ValidationError::LocalTransportUnsupported);
        }
    }

    if matches!(config.listener.shared_secret.as_deref(), Some("")) {
        errors.push(ValidationError::EmptySharedSecret);
    }

    if config.activity_log.capacity == 0 {
        errors.push(ValidationError::ZeroActivityCapacity);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
