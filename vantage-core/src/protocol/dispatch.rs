//! Opcode-indexed packet registry.

use std::fmt;

use super::ProtocolError;
use super::packet::{ConnectionContext, IncomingPacket, ReceivablePacket};

/// Constructs one concrete packet type from a payload and its connection.
type PacketFactory = Box<
    dyn Fn(&[u8], &ConnectionContext) -> Result<Box<dyn IncomingPacket>, ProtocolError>
        + Send
        + Sync,
>;

/// Registry mapping opcodes to packet factories.
///
/// The table is a dense vector indexed directly by opcode, with capacity
/// fixed at construction. Registration is a startup-configuration operation
/// and must complete before any connection is served; it takes `&mut self`,
/// so a shared dispatcher cannot be mutated concurrently with lookups.
/// During dispatch the table is read-only.
pub struct PacketDispatcher {
    factories: Vec<Option<PacketFactory>>,
}

impl PacketDispatcher {
    /// Creates an empty registry able to hold opcodes `0..capacity`.
    pub fn new(capacity: usize) -> Self {
        Self {
            factories: (0..capacity).map(|_| None).collect(),
        }
    }

    /// Registers packet type `T` under its declared opcode.
    ///
    /// Re-registering an opcode silently replaces the previous factory; the
    /// last registration wins.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::OpcodeOutOfRange` - If `T::OPCODE` is not a valid
    ///   index into the table; the registry is left unchanged
    pub fn register<T: ReceivablePacket>(&mut self) -> Result<(), ProtocolError> {
        let opcode = T::OPCODE;
        if opcode as usize >= self.factories.len() {
            return Err(ProtocolError::OpcodeOutOfRange {
                opcode,
                capacity: self.factories.len(),
            });
        }

        self.factories[opcode as usize] = Some(Box::new(|payload, connection| {
            let packet = T::decode(payload, connection)?;
            Ok(Box::new(packet) as Box<dyn IncomingPacket>)
        }));
        tracing::debug!(opcode, packet = std::any::type_name::<T>(), "registered packet type");
        Ok(())
    }

    /// Decodes one inbound frame into the packet type registered for its
    /// opcode.
    ///
    /// The connection layer has already split the frame into opcode and
    /// payload. Ownership of the decoded packet transfers to the caller.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::UnknownOpcode` - If no type is registered for
    ///   `opcode`; no decoding is attempted
    /// - `ProtocolError::MalformedPacket` - If the registered type rejects
    ///   the payload
    pub fn handle_packet(
        &self,
        opcode: u8,
        payload: &[u8],
        connection: &ConnectionContext,
    ) -> Result<Box<dyn IncomingPacket>, ProtocolError> {
        let factory = self
            .factories
            .get(opcode as usize)
            .and_then(|slot| slot.as_ref())
            .ok_or(ProtocolError::UnknownOpcode { opcode })?;

        factory(payload, connection)
    }

    /// Returns the table capacity fixed at construction.
    pub fn capacity(&self) -> usize {
        self.factories.len()
    }

    /// Checks whether a packet type is registered for `opcode`.
    pub fn is_registered(&self, opcode: u8) -> bool {
        self.factories
            .get(opcode as usize)
            .is_some_and(|slot| slot.is_some())
    }

    /// Returns how many opcodes have a registered packet type.
    pub fn registered_count(&self) -> usize {
        self.factories.iter().filter(|slot| slot.is_some()).count()
    }
}

impl fmt::Debug for PacketDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PacketDispatcher")
            .field("capacity", &self.capacity())
            .field("registered", &self.registered_count())
            .finish()
    }
}
