//! Packet capability traits and connection context.

use std::any::Any;
use std::fmt;
use std::net::SocketAddr;

use super::ProtocolError;

/// Connection-scoped context available while decoding a packet.
///
/// Carries the identity of the connection a frame arrived on, so decoded
/// packets can record their sender without the wire format repeating it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionContext {
    /// Stable identifier assigned by the connection layer
    pub connection_id: u64,
    /// Remote endpoint of the connection
    pub remote_addr: SocketAddr,
}

impl ConnectionContext {
    /// Creates context for one connection.
    pub fn new(connection_id: u64, remote_addr: SocketAddr) -> Self {
        Self {
            connection_id,
            remote_addr,
        }
    }
}

/// A decoded inbound packet, returned to the connection layer for handling.
///
/// Object-safe surface of every receivable packet. Callers that need the
/// concrete type downcast through [`as_any`](Self::as_any).
pub trait IncomingPacket: fmt::Debug + Send {
    /// Opcode identifying this packet's concrete type.
    fn opcode(&self) -> u8;

    /// Access to the concrete type for downcasting.
    fn as_any(&self) -> &dyn Any;
}

/// A packet type that can be decoded from an inbound frame.
///
/// Each concrete type declares its immutable [`OPCODE`](Self::OPCODE), fixed
/// for the lifetime of the program, and constructs itself from a payload
/// plus the originating connection's context. Framing and opcode extraction
/// belong to the connection layer; `payload` starts after the opcode byte.
pub trait ReceivablePacket: IncomingPacket + Sized + 'static {
    /// Opcode this type is registered under; doubles as the dispatch table
    /// index
    const OPCODE: u8;

    /// Decodes a packet from the payload of one inbound frame.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::MalformedPacket` - If the payload does not match
    ///   this type's wire layout
    fn decode(payload: &[u8], connection: &ConnectionContext) -> Result<Self, ProtocolError>;
}

#[cfg(test)]
pub(crate) fn test_context() -> ConnectionContext {
    ConnectionContext::new(7, "192.0.2.10:4433".parse().unwrap())
}
