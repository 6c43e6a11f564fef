//! Configuration-then-dispatch flow of the packet registry.
//!
//! Plays the role of the connection layer: registers the packet types at
//! startup, frames inbound bytes as `opcode | payload`, and routes decoded
//! packets to an input handler, verifying that per-message errors never
//! stall the rest of the stream.

use proptest::prelude::*;
use vantage_core::config::ProtocolConfig;
use vantage_core::protocol::{
    ConnectionContext, InputHandler, KeyInputPacket, KeyState, MouseButton, MouseInputPacket,
    MouseState, PacketDispatcher, ProtocolError, ReceivablePacket,
};

/// Builds the dispatcher the way process startup does: fixed capacity, all
/// application packet types registered before any connection is served.
fn configured_dispatcher() -> PacketDispatcher {
    let config = ProtocolConfig::default();
    let mut dispatcher = PacketDispatcher::new(config.dispatch_capacity);
    dispatcher.register::<MouseInputPacket>().unwrap();
    dispatcher.register::<KeyInputPacket>().unwrap();
    dispatcher
}

fn viewer_connection() -> ConnectionContext {
    ConnectionContext::new(11, "198.51.100.4:9100".parse().unwrap())
}

/// Connection-layer framing stand-in: leading opcode byte, payload after.
fn frame(opcode: u8, payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(1 + payload.len());
    frame.push(opcode);
    frame.extend_from_slice(payload);
    frame
}

#[derive(Debug, Default)]
struct RecordingHandler {
    mouse_events: Vec<MouseInputPacket>,
    key_events: Vec<KeyInputPacket>,
}

impl InputHandler for RecordingHandler {
    fn handle_mouse_input(&mut self, packet: &MouseInputPacket) {
        self.mouse_events.push(packet.clone());
    }

    fn handle_key_input(&mut self, packet: &KeyInputPacket) {
        self.key_events.push(packet.clone());
    }
}

/// Dispatches one framed message and routes it into the handler, the way
/// the connection loop does. Returns the dispatch error, if any, to the
/// caller's drop-or-disconnect policy.
fn route_frame(
    dispatcher: &PacketDispatcher,
    handler: &mut RecordingHandler,
    connection: &ConnectionContext,
    bytes: &[u8],
) -> Result<(), ProtocolError> {
    let (opcode, payload) = bytes.split_first().expect("frame has at least an opcode");
    let packet = dispatcher.handle_packet(*opcode, payload, connection)?;

    if let Some(mouse) = packet.as_any().downcast_ref::<MouseInputPacket>() {
        handler.handle_mouse_input(mouse);
    } else if let Some(key) = packet.as_any().downcast_ref::<KeyInputPacket>() {
        handler.handle_key_input(key);
    }
    Ok(())
}

#[test]
fn viewer_input_frames_reach_the_handler() {
    let dispatcher = configured_dispatcher();
    let connection = viewer_connection();
    let mut handler = RecordingHandler::default();

    let click = MouseInputPacket {
        x: 400,
        y: 300,
        button: MouseButton::Left,
        state: MouseState::Down,
        source_connection: connection.connection_id,
    };
    let key = KeyInputPacket {
        key: "Enter".to_string(),
        state: KeyState::Press,
        source_connection: connection.connection_id,
    };

    let frames = [
        frame(MouseInputPacket::OPCODE, &click.encode()),
        frame(KeyInputPacket::OPCODE, &key.encode()),
    ];
    for bytes in &frames {
        route_frame(&dispatcher, &mut handler, &connection, bytes).unwrap();
    }

    assert_eq!(handler.mouse_events, vec![click]);
    assert_eq!(handler.key_events, vec![key]);
}

/// Decoded packets record which connection they arrived on, taken from the
/// context rather than the wire bytes.
#[test]
fn decoded_packets_carry_connection_identity() {
    let dispatcher = configured_dispatcher();
    let connection = ConnectionContext::new(42, "203.0.113.9:7001".parse().unwrap());
    let mut handler = RecordingHandler::default();

    let payload = MouseInputPacket {
        x: 1,
        y: 2,
        button: MouseButton::Wheel,
        state: MouseState::Up,
        source_connection: 0, // overwritten by decode
    }
    .encode();
    route_frame(
        &dispatcher,
        &mut handler,
        &connection,
        &frame(MouseInputPacket::OPCODE, &payload),
    )
    .unwrap();

    assert_eq!(handler.mouse_events[0].source_connection, 42);
}

/// Unknown opcodes and malformed payloads are per-message errors; the
/// connection keeps processing later frames.
#[test]
fn per_message_errors_do_not_stall_the_stream() {
    let dispatcher = configured_dispatcher();
    let connection = viewer_connection();
    let mut handler = RecordingHandler::default();

    let unknown = route_frame(&dispatcher, &mut handler, &connection, &frame(60, &[1, 2]));
    assert_eq!(unknown, Err(ProtocolError::UnknownOpcode { opcode: 60 }));

    let malformed = route_frame(
        &dispatcher,
        &mut handler,
        &connection,
        &frame(MouseInputPacket::OPCODE, &[0xab; 3]),
    );
    assert!(matches!(
        malformed,
        Err(ProtocolError::MalformedPacket { .. })
    ));

    // A well-formed frame after both failures still goes through.
    let key = KeyInputPacket {
        key: "q".to_string(),
        state: KeyState::Up,
        source_connection: connection.connection_id,
    };
    route_frame(
        &dispatcher,
        &mut handler,
        &connection,
        &frame(KeyInputPacket::OPCODE, &key.encode()),
    )
    .unwrap();

    assert!(handler.mouse_events.is_empty());
    assert_eq!(handler.key_events, vec![key]);
}

fn mouse_button_strategy() -> impl Strategy<Value = MouseButton> {
    prop_oneof![
        Just(MouseButton::Left),
        Just(MouseButton::Middle),
        Just(MouseButton::Right),
        Just(MouseButton::Wheel),
        Just(MouseButton::Unknown),
    ]
}

fn mouse_state_strategy() -> impl Strategy<Value = MouseState> {
    prop_oneof![
        Just(MouseState::Down),
        Just(MouseState::Up),
        Just(MouseState::DoubleClick),
    ]
}

fn key_state_strategy() -> impl Strategy<Value = KeyState> {
    prop_oneof![Just(KeyState::Down), Just(KeyState::Up), Just(KeyState::Press)]
}

proptest! {
    #[test]
    fn mouse_packets_survive_dispatch_round_trip(
        x in any::<i32>(),
        y in any::<i32>(),
        button in mouse_button_strategy(),
        state in mouse_state_strategy(),
    ) {
        let dispatcher = configured_dispatcher();
        let connection = viewer_connection();
        let original = MouseInputPacket {
            x,
            y,
            button,
            state,
            source_connection: connection.connection_id,
        };

        let packet = dispatcher
            .handle_packet(MouseInputPacket::OPCODE, &original.encode(), &connection)
            .unwrap();
        let decoded = packet.as_any().downcast_ref::<MouseInputPacket>().unwrap();

        prop_assert_eq!(decoded, &original);
    }

    #[test]
    fn key_packets_survive_dispatch_round_trip(
        key in "\\PC{0,24}",
        state in key_state_strategy(),
    ) {
        let dispatcher = configured_dispatcher();
        let connection = viewer_connection();
        let original = KeyInputPacket {
            key,
            state,
            source_connection: connection.connection_id,
        };

        let packet = dispatcher
            .handle_packet(KeyInputPacket::OPCODE, &original.encode(), &connection)
            .unwrap();
        let decoded = packet.as_any().downcast_ref::<KeyInputPacket>().unwrap();

        prop_assert_eq!(decoded, &original);
    }
}
