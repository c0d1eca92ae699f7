//! Text codec: one protocol line ⇄ one [`Command`].
//!
//! Wire format: a single line of ASCII tokens separated by spaces, no
//! escaping, terminated by `\n` on the wire.  [`encode_command`] produces the
//! line *without* the terminator; [`encode_frame`] appends it.
//!
//! Decoding never fails.  Lines whose first token is not part of the
//! vocabulary, and lines with the wrong number of arguments or a non-numeric
//! numeric field, decode to [`Command::Unknown`] carrying the raw line.  Volume
//! numbers too large for `i32` saturate so they still reach the clamp.  The
//! first token is matched case-sensitively.
//!
//! # Direction
//!
//! `VOL 5` means "turn it up by five" when the device sends it and "the
//! volume is five" when the controller sends it.  [`decode_line`] therefore
//! takes the [`Origin`] of the line.  Absolute requests are recognised only by
//! their `SET` / `GET` keyword, never by the sign of the number.  Relative
//! adjustments are encoded with an explicit sign (`VOL +5`).

use std::num::IntErrorKind;

use crate::protocol::commands::{Command, Origin, VOLUME_MAX};

// ── Public API ────────────────────────────────────────────────────────────────

/// Decodes one trimmed line sent by `origin`.
///
/// # Examples
///
/// ```rust
/// use songled_core::protocol::{decode_line, Command, Origin};
///
/// assert_eq!(decode_line("VOL SET 150", Origin::Device), Command::VolumeSet(150));
/// assert_eq!(decode_line("VOL -10", Origin::Device), Command::VolumeAdjust(-10));
/// assert_eq!(decode_line("VOL 42", Origin::Controller), Command::Volume(42));
/// assert_eq!(
///     decode_line("VOL SET abc", Origin::Device),
///     Command::Unknown("VOL SET abc".to_string())
/// );
/// ```
pub fn decode_line(line: &str, origin: Origin) -> Command {
    let line = line.trim();
    let (head, rest) = split_token(line);

    let decoded = match head {
        "HELLO" => decode_hello(rest),
        "VOL" => decode_volume(rest, origin),
        "MUTE" => decode_mute(rest),
        "SPK" => decode_speaker(rest),
        _ => None,
    };

    decoded.unwrap_or_else(|| Command::Unknown(line.to_string()))
}

/// Encodes `cmd` as one protocol line without the trailing newline.
///
/// ```rust
/// use songled_core::protocol::{encode_command, Command};
///
/// assert_eq!(encode_command(&Command::VolumeAdjust(5)), "VOL +5");
/// assert_eq!(encode_command(&Command::Mute(true)), "MUTE 1");
/// ```
pub fn encode_command(cmd: &Command) -> String {
    match cmd {
        Command::Hello => "HELLO".to_string(),
        Command::HelloOk => "HELLO OK".to_string(),
        Command::VolumeGet => "VOL GET".to_string(),
        Command::VolumeSet(value) => format!("VOL SET {value}"),
        Command::VolumeAdjust(delta) => format!("VOL {delta:+}"),
        Command::Volume(value) => format!("VOL {value}"),
        Command::MuteToggle => "MUTE".to_string(),
        Command::Mute(muted) => format!("MUTE {}", u8::from(*muted)),
        Command::SpeakerList => "SPK LIST".to_string(),
        Command::SpeakerSet(index) => format!("SPK SET {index}"),
        Command::SpeakerBegin => "SPK BEGIN".to_string(),
        Command::SpeakerItem { index, name } if name.is_empty() => format!("SPK ITEM {index}"),
        Command::SpeakerItem { index, name } => format!("SPK ITEM {index} {name}"),
        Command::SpeakerEnd => "SPK END".to_string(),
        Command::SpeakerCurrent(index) => format!("SPK CUR {index}"),
        Command::Unknown(raw) => raw.clone(),
    }
}

/// Encodes `cmd` as wire bytes, newline included.
pub fn encode_frame(cmd: &Command) -> Vec<u8> {
    let mut bytes = encode_command(cmd).into_bytes();
    bytes.push(b'\n');
    bytes
}

/// Returns the first whitespace-separated token of `line` (empty for an
/// empty line).
pub fn first_token(line: &str) -> &str {
    split_token(line.trim()).0
}

/// `true` when the first token of `line` is `HELLO`.
///
/// Used by the transport probe and the greeting wait, which accept any member
/// of the handshake family (`HELLO`, `HELLO OK`, `HELLO ACK`).
pub fn is_hello_line(line: &str) -> bool {
    first_token(line) == "HELLO"
}

// ── Per-family decoders ───────────────────────────────────────────────────────

fn decode_hello(rest: &str) -> Option<Command> {
    match rest {
        "" => Some(Command::Hello),
        "OK" => Some(Command::HelloOk),
        _ => None,
    }
}

fn decode_volume(rest: &str, origin: Origin) -> Option<Command> {
    let (keyword, args) = split_token(rest);
    match keyword {
        "GET" if args.is_empty() => Some(Command::VolumeGet),
        "SET" => parse_saturating(single_arg(args)?).map(Command::VolumeSet),
        "" => None,
        value if args.is_empty() => match origin {
            Origin::Device => parse_saturating(value).map(Command::VolumeAdjust),
            Origin::Controller => value
                .parse::<u8>()
                .ok()
                .filter(|v| *v <= VOLUME_MAX)
                .map(Command::Volume),
        },
        _ => None,
    }
}

fn decode_mute(rest: &str) -> Option<Command> {
    match rest {
        "" => Some(Command::MuteToggle),
        "0" => Some(Command::Mute(false)),
        "1" => Some(Command::Mute(true)),
        _ => None,
    }
}

fn decode_speaker(rest: &str) -> Option<Command> {
    let (keyword, args) = split_token(rest);
    match keyword {
        // `SPK GET` is an older spelling of the list request.
        "LIST" | "GET" if args.is_empty() => Some(Command::SpeakerList),
        "BEGIN" if args.is_empty() => Some(Command::SpeakerBegin),
        "END" if args.is_empty() => Some(Command::SpeakerEnd),
        "SET" => single_arg(args)?.parse().ok().map(Command::SpeakerSet),
        "CUR" => single_arg(args)?.parse().ok().map(Command::SpeakerCurrent),
        "ITEM" => {
            let (index, name) = split_token(args);
            let index = index.parse().ok()?;
            Some(Command::SpeakerItem {
                index,
                name: name.to_string(),
            })
        }
        _ => None,
    }
}

// ── Tokenizer helpers ─────────────────────────────────────────────────────────

/// Splits off the first token; the remainder keeps its inner spacing.
fn split_token(s: &str) -> (&str, &str) {
    let s = s.trim_start();
    match s.find(char::is_whitespace) {
        Some(end) => (&s[..end], s[end..].trim_start()),
        None => (s, ""),
    }
}

/// Parses a signed integer, saturating at the `i32` bounds instead of failing
/// so that huge requests still reach the volume clamp.
fn parse_saturating(token: &str) -> Option<i32> {
    match token.parse::<i32>() {
        Ok(value) => Some(value),
        Err(e) => match e.kind() {
            IntErrorKind::PosOverflow => Some(i32::MAX),
            IntErrorKind::NegOverflow => Some(i32::MIN),
            _ => None,
        },
    }
}

/// Returns `args` if it is exactly one token.
fn single_arg(args: &str) -> Option<&str> {
    if args.is_empty() || args.contains(char::is_whitespace) {
        None
    } else {
        Some(args)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn device(line: &str) -> Command {
        decode_line(line, Origin::Device)
    }

    fn controller(line: &str) -> Command {
        decode_line(line, Origin::Controller)
    }

    fn unknown(line: &str) -> Command {
        Command::Unknown(line.to_string())
    }

    // ── Handshake ─────────────────────────────────────────────────────────────

    #[test]
    fn test_decode_hello_and_hello_ok() {
        assert_eq!(device("HELLO"), Command::Hello);
        assert_eq!(device("HELLO OK"), Command::HelloOk);
        assert_eq!(controller("HELLO OK"), Command::HelloOk);
    }

    #[test]
    fn test_decode_hello_ack_is_unknown_but_still_a_hello_line() {
        assert_eq!(device("HELLO ACK"), unknown("HELLO ACK"));
        assert!(is_hello_line("HELLO ACK"));
    }

    // ── Volume ────────────────────────────────────────────────────────────────

    #[test]
    fn test_decode_volume_get() {
        assert_eq!(device("VOL GET"), Command::VolumeGet);
    }

    #[test]
    fn test_decode_volume_set_keeps_out_of_range_value_for_clamping() {
        assert_eq!(device("VOL SET 150"), Command::VolumeSet(150));
        assert_eq!(device("VOL SET -20"), Command::VolumeSet(-20));
    }

    #[test]
    fn test_decode_bare_volume_from_device_is_relative() {
        assert_eq!(device("VOL -10"), Command::VolumeAdjust(-10));
        assert_eq!(device("VOL +5"), Command::VolumeAdjust(5));
        assert_eq!(device("VOL 5"), Command::VolumeAdjust(5));
    }

    #[test]
    fn test_decode_bare_volume_from_controller_is_report() {
        assert_eq!(controller("VOL 0"), Command::Volume(0));
        assert_eq!(controller("VOL 100"), Command::Volume(100));
        assert_eq!(controller("VOL -1"), unknown("VOL -1"));
        assert_eq!(controller("VOL 101"), unknown("VOL 101"));
    }

    #[test]
    fn test_decode_malformed_volume_lines_are_unknown() {
        for line in ["VOL", "VOL SET", "VOL SET abc", "VOL SET 1 2", "VOL GET 3", "VOL x", "VOL 1 2"] {
            assert_eq!(device(line), unknown(line), "{line}");
        }
    }

    #[test]
    fn test_decode_volume_numbers_beyond_i32_saturate() {
        assert_eq!(device("VOL SET 99999999999"), Command::VolumeSet(i32::MAX));
        assert_eq!(device("VOL SET -99999999999"), Command::VolumeSet(i32::MIN));
        assert_eq!(device("VOL +99999999999"), Command::VolumeAdjust(i32::MAX));
        assert_eq!(device("VOL -99999999999"), Command::VolumeAdjust(i32::MIN));
        assert_eq!(device("VOL SET 9999x"), unknown("VOL SET 9999x"));
    }

    // ── Mute ──────────────────────────────────────────────────────────────────

    #[test]
    fn test_decode_mute_forms() {
        assert_eq!(device("MUTE"), Command::MuteToggle);
        assert_eq!(controller("MUTE 0"), Command::Mute(false));
        assert_eq!(controller("MUTE 1"), Command::Mute(true));
        assert_eq!(device("MUTE 2"), unknown("MUTE 2"));
    }

    // ── Speakers ──────────────────────────────────────────────────────────────

    #[test]
    fn test_decode_speaker_requests() {
        assert_eq!(device("SPK LIST"), Command::SpeakerList);
        assert_eq!(device("SPK GET"), Command::SpeakerList);
        assert_eq!(device("SPK SET 7"), Command::SpeakerSet(7));
        assert_eq!(device("SPK SET -1"), unknown("SPK SET -1"));
        assert_eq!(device("SPK SET"), unknown("SPK SET"));
    }

    #[test]
    fn test_decode_speaker_item_keeps_name_with_spaces() {
        assert_eq!(
            controller("SPK ITEM 1 Speakers (USB Audio)"),
            Command::SpeakerItem {
                index: 1,
                name: "Speakers (USB Audio)".to_string()
            }
        );
    }

    #[test]
    fn test_decode_speaker_item_without_name_has_empty_name() {
        assert_eq!(
            controller("SPK ITEM 3"),
            Command::SpeakerItem {
                index: 3,
                name: String::new()
            }
        );
    }

    #[test]
    fn test_decode_speaker_markers() {
        assert_eq!(controller("SPK BEGIN"), Command::SpeakerBegin);
        assert_eq!(controller("SPK END"), Command::SpeakerEnd);
        assert_eq!(controller("SPK CUR 2"), Command::SpeakerCurrent(2));
        assert_eq!(controller("SPK CUR"), unknown("SPK CUR"));
    }

    // ── Unknown ───────────────────────────────────────────────────────────────

    #[test]
    fn test_decode_is_case_sensitive() {
        assert_eq!(device("hello"), unknown("hello"));
        assert_eq!(device("vol get"), unknown("vol get"));
    }

    #[test]
    fn test_decode_foreign_lines_are_unknown() {
        assert_eq!(device("APP START"), unknown("APP START"));
        assert_eq!(device("[REBUILD] Showing loading"), unknown("[REBUILD] Showing loading"));
        assert_eq!(device(""), unknown(""));
    }

    // ── Encode ────────────────────────────────────────────────────────────────

    #[test]
    fn test_encode_relative_volume_carries_explicit_sign() {
        assert_eq!(encode_command(&Command::VolumeAdjust(5)), "VOL +5");
        assert_eq!(encode_command(&Command::VolumeAdjust(-5)), "VOL -5");
        assert_eq!(encode_command(&Command::VolumeAdjust(0)), "VOL +0");
    }

    #[test]
    fn test_encode_speaker_item() {
        let cmd = Command::speaker_item(0, "Speakers");
        assert_eq!(encode_command(&cmd), "SPK ITEM 0 Speakers");
    }

    #[test]
    fn test_encode_frame_appends_single_newline() {
        assert_eq!(encode_frame(&Command::HelloOk), b"HELLO OK\n".to_vec());
    }

    #[test]
    fn test_encode_unknown_is_verbatim() {
        assert_eq!(encode_command(&unknown("LRC CUR hi")), "LRC CUR hi");
    }

    #[test]
    fn test_first_token_of_blank_line_is_empty() {
        assert_eq!(first_token("   "), "");
        assert_eq!(first_token(" HELLO OK "), "HELLO");
    }
}
