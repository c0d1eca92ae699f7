//! Protocol module: line framing, the command vocabulary, and the text codec.

pub mod codec;
pub mod commands;
pub mod framer;

pub use codec::{decode_line, encode_command, encode_frame, first_token, is_hello_line};
pub use commands::{sanitize_name, Command, Origin, VOLUME_MAX};
pub use framer::{FramerError, LineFramer, Lines, DEFAULT_MAX_UNTERMINATED};
