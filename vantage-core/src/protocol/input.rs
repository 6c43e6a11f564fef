//! Remote-input packets sent from the viewer back to the device.
//!
//! Mouse and keyboard events captured in the web viewer arrive as compact
//! binary frames. The types here are the concrete packets registered with
//! the dispatcher, plus the [`InputHandler`] seam that device-side code
//! implements to consume them.
//!
//! Wire layouts are big-endian. `MouseInputPacket` is fixed-size; the key
//! packet carries a length-prefixed UTF-8 key name.

use bytes::{Buf, BufMut};

use super::ProtocolError;
use super::packet::{ConnectionContext, IncomingPacket, ReceivablePacket};

/// Mouse button referenced by a mouse input event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MouseButton {
    Left = 0,
    Middle = 1,
    Right = 2,
    Wheel = 3,
    Unknown = 4,
}

impl MouseButton {
    /// Converts a wire discriminant back to a button.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Left),
            1 => Some(Self::Middle),
            2 => Some(Self::Right),
            3 => Some(Self::Wheel),
            4 => Some(Self::Unknown),
            _ => None,
        }
    }
}

/// Transition reported for a mouse button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MouseState {
    Down = 0,
    Up = 1,
    DoubleClick = 2,
}

impl MouseState {
    /// Converts a wire discriminant back to a state.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Down),
            1 => Some(Self::Up),
            2 => Some(Self::DoubleClick),
            _ => None,
        }
    }
}

/// Transition reported for a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum KeyState {
    Down = 0,
    Up = 1,
    Press = 2,
}

impl KeyState {
    /// Converts a wire discriminant back to a state.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Down),
            1 => Some(Self::Up),
            2 => Some(Self::Press),
            _ => None,
        }
    }
}

/// Consumer of decoded input events on the device side.
///
/// The connection layer downcasts dispatched packets and feeds them to an
/// implementation of this trait, which injects them into the captured
/// device (or discards them, for view-only sessions).
pub trait InputHandler: Send {
    fn handle_mouse_input(&mut self, packet: &MouseInputPacket);
    fn handle_key_input(&mut self, packet: &KeyInputPacket);
}

/// Mouse event at device-screen coordinates.
///
/// Wire layout: `x: i32, y: i32, button: u8, state: u8` (10 bytes).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MouseInputPacket {
    pub x: i32,
    pub y: i32,
    pub button: MouseButton,
    pub state: MouseState,
    /// Connection the event arrived on; not part of the wire format
    pub source_connection: u64,
}

impl MouseInputPacket {
    const WIRE_LEN: usize = 10;

    /// Encodes the wire payload for this event.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::WIRE_LEN);
        buf.put_i32(self.x);
        buf.put_i32(self.y);
        buf.put_u8(self.button as u8);
        buf.put_u8(self.state as u8);
        buf
    }
}

impl IncomingPacket for MouseInputPacket {
    fn opcode(&self) -> u8 {
        Self::OPCODE
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

impl ReceivablePacket for MouseInputPacket {
    const OPCODE: u8 = 1;

    fn decode(payload: &[u8], connection: &ConnectionContext) -> Result<Self, ProtocolError> {
        if payload.len() != Self::WIRE_LEN {
            return Err(ProtocolError::MalformedPacket {
                packet: "MouseInput",
                reason: format!("expected {} bytes, got {}", Self::WIRE_LEN, payload.len()),
            });
        }

        let mut buf = payload;
        let x = buf.get_i32();
        let y = buf.get_i32();
        let button = buf.get_u8();
        let state = buf.get_u8();

        Ok(Self {
            x,
            y,
            button: MouseButton::from_u8(button).ok_or(ProtocolError::MalformedPacket {
                packet: "MouseInput",
                reason: format!("invalid button {button}"),
            })?,
            state: MouseState::from_u8(state).ok_or(ProtocolError::MalformedPacket {
                packet: "MouseInput",
                reason: format!("invalid state {state}"),
            })?,
            source_connection: connection.connection_id,
        })
    }
}

/// Keyboard event carrying the viewer's key name.
///
/// Wire layout: `state: u8, key_len: u16, key: [u8; key_len]` with the key
/// name UTF-8 encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyInputPacket {
    pub key: String,
    pub state: KeyState,
    /// Connection the event arrived on; not part of the wire format
    pub source_connection: u64,
}

impl KeyInputPacket {
    /// Encodes the wire payload for this event.
    ///
    /// # Panics
    ///
    /// Panics if the key name exceeds `u16::MAX` bytes; viewer key names are
    /// a few characters.
    pub fn encode(&self) -> Vec<u8> {
        let key = self.key.as_bytes();
        assert!(key.len() <= u16::MAX as usize, "key name too long to encode");

        let mut buf = Vec::with_capacity(3 + key.len());
        buf.put_u8(self.state as u8);
        buf.put_u16(key.len() as u16);
        buf.extend_from_slice(key);
        buf
    }
}

impl IncomingPacket for KeyInputPacket {
    fn opcode(&self) -> u8 {
        Self::OPCODE
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

impl ReceivablePacket for KeyInputPacket {
    const OPCODE: u8 = 2;

    fn decode(payload: &[u8], connection: &ConnectionContext) -> Result<Self, ProtocolError> {
        if payload.len() < 3 {
            return Err(ProtocolError::MalformedPacket {
                packet: "KeyInput",
                reason: format!("expected at least 3 bytes, got {}", payload.len()),
            });
        }

        let mut buf = payload;
        let state = buf.get_u8();
        let key_len = buf.get_u16() as usize;
        if buf.remaining() != key_len {
            return Err(ProtocolError::MalformedPacket {
                packet: "KeyInput",
                reason: format!("key length {key_len} does not match remaining {}", buf.remaining()),
            });
        }

        let key = std::str::from_utf8(buf).map_err(|e| ProtocolError::MalformedPacket {
            packet: "KeyInput",
            reason: format!("key is not valid UTF-8: {e}"),
        })?;

        Ok(Self {
            key: key.to_string(),
            state: KeyState::from_u8(state).ok_or(ProtocolError::MalformedPacket {
                packet: "KeyInput",
                reason: format!("invalid state {state}"),
            })?,
            source_connection: connection.connection_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::packet::test_context;
    use super::*;

    #[test]
    fn test_mouse_packet_round_trip() {
        let connection = test_context();
        let original = MouseInputPacket {
            x: -120,
            y: 748,
            button: MouseButton::Right,
            state: MouseState::DoubleClick,
            source_connection: connection.connection_id,
        };

        let decoded = MouseInputPacket::decode(&original.encode(), &connection).unwrap();

        assert_eq!(decoded, original);
    }

    #[test]
    fn test_key_packet_round_trip() {
        let connection = test_context();
        let original = KeyInputPacket {
            key: "ArrowLeft".to_string(),
            state: KeyState::Press,
            source_connection: connection.connection_id,
        };

        let decoded = KeyInputPacket::decode(&original.encode(), &connection).unwrap();

        assert_eq!(decoded, original);
    }

    #[test]
    fn test_mouse_packet_rejects_wrong_length() {
        let result = MouseInputPacket::decode(&[0; 9], &test_context());

        assert!(matches!(
            result.unwrap_err(),
            ProtocolError::MalformedPacket {
                packet: "MouseInput",
                ..
            }
        ));
    }

    #[test]
    fn test_mouse_packet_rejects_invalid_button() {
        let mut payload = MouseInputPacket {
            x: 0,
            y: 0,
            button: MouseButton::Left,
            state: MouseState::Down,
            source_connection: 0,
        }
        .encode();
        payload[8] = 9; // button discriminant

        let result = MouseInputPacket::decode(&payload, &test_context());

        assert!(matches!(
            result.unwrap_err(),
            ProtocolError::MalformedPacket { .. }
        ));
    }

    #[test]
    fn test_key_packet_rejects_length_mismatch() {
        let mut payload = KeyInputPacket {
            key: "a".to_string(),
            state: KeyState::Down,
            source_connection: 0,
        }
        .encode();
        payload[2] = 5; // claimed key length longer than the payload

        let result = KeyInputPacket::decode(&payload, &test_context());

        assert!(matches!(
            result.unwrap_err(),
            ProtocolError::MalformedPacket { packet: "KeyInput", .. }
        ));
    }

    #[test]
    fn test_key_packet_rejects_invalid_utf8() {
        let mut payload = vec![0u8]; // state
        payload.put_u16(2);
        payload.extend_from_slice(&[0xff, 0xfe]);

        let result = KeyInputPacket::decode(&payload, &test_context());

        assert!(matches!(
            result.unwrap_err(),
            ProtocolError::MalformedPacket { packet: "KeyInput", .. }
        ));
    }

    #[test]
    fn test_discriminant_conversions_are_inverse() {
        for value in 0..=4 {
            let button = MouseButton::from_u8(value).unwrap();
            assert_eq!(button as u8, value);
        }
        assert_eq!(MouseButton::from_u8(5), None);
        assert_eq!(MouseState::from_u8(3), None);
        assert_eq!(KeyState::from_u8(3), None);
    }
}
