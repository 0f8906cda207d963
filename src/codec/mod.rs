//! Raw 16-bit PCM codec
//!
//! Outbound capture blocks are quantized to little-endian `i16` words and
//! sent as-is. Inbound synthesized audio arrives as base64 text wrapping the
//! same word layout and is expanded back to normalized `f32` samples.

pub mod decoder;
pub mod encoder;

pub use decoder::decode_chunk;
pub use encoder::{encode_chunk, encode_frame};
