//! Vantage Core - Execution and protocol-dispatch substrate
//!
//! This crate provides the concurrency substrate for the Vantage
//! remote-device streaming toolkit: an elastic worker pool that executes
//! arbitrary tasks on OS threads, and an opcode-indexed packet registry that
//! turns raw connection bytes into typed packet objects.

pub mod config;
pub mod pool;
pub mod protocol;
pub mod tracing_setup;

// Re-export main types for convenient access
pub use config::VantageConfig;
pub use pool::{PoolError, Task, WorkerPool};
pub use protocol::{
    ConnectionContext, IncomingPacket, PacketDispatcher, ProtocolError, ReceivablePacket,
};

/// Core errors that can bubble up from any Vantage subsystem.
///
/// High-level error types representing failures in core functionality.
#[derive(Debug, thiserror::Error)]
pub enum VantageError {
    #[error("Pool error: {0}")]
    Pool(#[from] PoolError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Configuration error: {reason}")]
    Configuration { reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl VantageError {
    /// Returns a user-friendly error message suitable for display.
    pub fn user_message(&self) -> String {
        match self {
            VantageError::Pool(e) => match e {
                PoolError::QueueFull { depth } => {
                    format!("Task queue is full ({depth} tasks pending)")
                }
                PoolError::InvalidConfig { reason } => {
                    format!("Invalid pool configuration: {reason}")
                }
            },
            VantageError::Protocol(e) => match e {
                ProtocolError::UnknownOpcode { opcode } => {
                    format!("Received a packet with unknown opcode {opcode}")
                }
                ProtocolError::OpcodeOutOfRange { opcode, .. } => {
                    format!("Packet type with opcode {opcode} cannot be registered")
                }
                ProtocolError::MalformedPacket { packet, .. } => {
                    format!("Received a malformed {packet} packet")
                }
            },
            VantageError::Configuration { reason } => {
                format!("Configuration error: {reason}")
            }
            VantageError::Io(_) => "File system error occurred".to_string(),
        }
    }

    /// Checks if this error is a startup configuration error.
    ///
    /// Configuration errors are fatal: callers are expected to abort startup
    /// rather than retry. Everything else is recoverable and scoped to one
    /// submission or one message.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            VantageError::Configuration { .. }
                | VantageError::Pool(PoolError::InvalidConfig { .. })
                | VantageError::Protocol(ProtocolError::OpcodeOutOfRange { .. })
        )
    }
}

pub type Result<T> = std::result::Result<T, VantageError>;
