//! Integration tests for the songled-core line protocol.
//!
//! These tests drive the framer and the codec together through the public
//! API: bytes in, typed commands out, and typed commands back to bytes.

use songled_core::{
    decode_line, encode_command, encode_frame,
    protocol::{is_hello_line, Command, LineFramer, Origin},
    EndpointSnapshot,
};

/// Every constructible command survives encode → decode when decoded with
/// the origin of its sender.
fn roundtrip(cmd: &Command) -> Command {
    let origin = cmd.origin().unwrap_or(Origin::Device);
    decode_line(&encode_command(cmd), origin)
}

#[test]
fn test_roundtrip_whole_vocabulary() {
    let commands = vec![
        Command::Hello,
        Command::HelloOk,
        Command::VolumeGet,
        Command::VolumeSet(0),
        Command::VolumeSet(150),
        Command::VolumeSet(-7),
        Command::VolumeAdjust(5),
        Command::VolumeAdjust(-10),
        Command::VolumeAdjust(0),
        Command::Volume(0),
        Command::Volume(100),
        Command::MuteToggle,
        Command::Mute(false),
        Command::Mute(true),
        Command::SpeakerList,
        Command::SpeakerSet(3),
        Command::SpeakerBegin,
        Command::speaker_item(0, "Speakers (Realtek(R) Audio)"),
        Command::speaker_item(1, ""),
        Command::speaker_item(2, "Kopfhörer  mit  Lücken"),
        Command::SpeakerEnd,
        Command::SpeakerCurrent(1),
        Command::Unknown("LRC CUR some lyric".to_string()),
        Command::Unknown("APP LIVE".to_string()),
    ];

    for cmd in &commands {
        assert_eq!(&roundtrip(cmd), cmd, "round trip failed for {cmd:?}");
    }
}

#[test]
fn test_roundtrip_hello_and_hello_ok_from_either_side() {
    for origin in [Origin::Device, Origin::Controller] {
        assert_eq!(decode_line(&encode_command(&Command::Hello), origin), Command::Hello);
        assert_eq!(decode_line(&encode_command(&Command::HelloOk), origin), Command::HelloOk);
    }
}

#[test]
fn test_framer_and_codec_decode_a_fragmented_session() {
    // Arrange: a device burst split at awkward places, as a BLE link would.
    let wire = b"HELLO\r\nVOL GET\nVOL SET 150\nVOL -10\nMUTE\nSPK LIST\nSPK SET 7\nVOL SET abc\n";
    let mut framer = LineFramer::new();
    let mut decoded = Vec::new();

    // Act
    for chunk in wire.chunks(3) {
        for line in framer.feed(chunk).expect("no overflow") {
            if !line.is_empty() {
                decoded.push(decode_line(&line, Origin::Device));
            }
        }
    }

    // Assert
    assert_eq!(
        decoded,
        vec![
            Command::Hello,
            Command::VolumeGet,
            Command::VolumeSet(150),
            Command::VolumeAdjust(-10),
            Command::MuteToggle,
            Command::SpeakerList,
            Command::SpeakerSet(7),
            Command::Unknown("VOL SET abc".to_string()),
        ]
    );
}

#[test]
fn test_snapshot_reply_decodes_back_to_the_same_list() {
    // Arrange
    let snapshot = EndpointSnapshot::new(
        [
            ("id-a".to_string(), "Speakers".to_string()),
            ("id-b".to_string(), "耳机".to_string()),
        ],
        Some("id-b".to_string()),
    );

    // Act: encode to wire bytes, then frame and decode as the device would.
    let wire: Vec<u8> = snapshot.to_commands().iter().flat_map(encode_frame).collect();
    let mut framer = LineFramer::new();
    let lines: Vec<Command> = framer
        .feed(&wire)
        .unwrap()
        .map(|line| decode_line(&line, Origin::Controller))
        .collect();

    // Assert
    assert_eq!(
        lines,
        vec![
            Command::SpeakerBegin,
            Command::SpeakerItem { index: 0, name: "Speakers".to_string() },
            Command::SpeakerItem { index: 1, name: "??".to_string() },
            Command::SpeakerEnd,
            Command::SpeakerCurrent(1),
        ]
    );
}

#[test]
fn test_hello_line_detection_covers_handshake_family() {
    assert!(is_hello_line("HELLO"));
    assert!(is_hello_line("HELLO OK"));
    assert!(is_hello_line("HELLO ACK"));
    assert!(!is_hello_line("HELLOOK"));
    assert!(!is_hello_line("VOL GET"));
}
