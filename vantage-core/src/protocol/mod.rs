//! Packet dispatch for device connections.
//!
//! Inbound messages are identified by a single-byte opcode. Application code
//! registers its packet types with a [`PacketDispatcher`] during startup
//! configuration; at runtime the connection layer extracts the opcode from
//! each frame and hands the payload to the dispatcher, which constructs the
//! matching typed packet. Registration happens-before all dispatch and the
//! table is read-only afterwards.

pub mod dispatch;
pub mod input;
pub mod packet;

// Re-export public API
pub use dispatch::PacketDispatcher;
pub use input::{
    InputHandler, KeyInputPacket, KeyState, MouseButton, MouseInputPacket, MouseState,
};
pub use packet::{ConnectionContext, IncomingPacket, ReceivablePacket};

/// Errors that can occur during packet registration and dispatch.
///
/// `OpcodeOutOfRange` is a startup configuration error and should abort the
/// process; the other variants are scoped to a single message and must never
/// take down the connection's peer or the process.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// No packet type is registered for the received opcode.
    #[error("No packet type registered for opcode {opcode}")]
    UnknownOpcode {
        /// Opcode extracted from the inbound frame
        opcode: u8,
    },

    /// A packet type's opcode does not fit the dispatch table.
    #[error("Opcode {opcode} exceeds dispatch table capacity {capacity}")]
    OpcodeOutOfRange {
        /// Opcode declared by the packet type
        opcode: u8,
        /// Table capacity fixed at construction
        capacity: usize,
    },

    /// The payload could not be decoded into the registered packet type.
    #[error("Malformed {packet} payload: {reason}")]
    MalformedPacket {
        /// Name of the packet type that failed to decode
        packet: &'static str,
        /// What was wrong with the payload
        reason: String,
    },
}
