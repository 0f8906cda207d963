//! PCM encoding for outbound frames and transport text

use base64::prelude::*;
use bytes::{BufMut, Bytes, BytesMut};

use crate::constants::{PCM_DECODE_SCALE, PCM_ENCODE_SCALE};

/// Quantize normalized samples into little-endian 16-bit PCM.
///
/// Each sample is clamped to `[-1, 1]`, scaled by 32767 and truncated toward
/// zero. `NaN` encodes as silence.
pub fn encode_frame(samples: &[f32]) -> Bytes {
    let mut out = BytesMut::with_capacity(samples.len() * 2);
    for &sample in samples {
        out.put_i16_le(quantize(sample));
    }
    out.freeze()
}

/// Encode normalized samples as transport text in the inbound chunk layout.
///
/// This is the exact inverse scale of [`decode_chunk`](super::decode_chunk):
/// samples are multiplied by 32768, rounded and saturated to the `i16`
/// range, so a round trip stays within one quantization step.
pub fn encode_chunk(samples: &[f32]) -> String {
    let mut pcm = BytesMut::with_capacity(samples.len() * 2);
    for &sample in samples {
        let scaled = (sample.clamp(-1.0, 1.0) * PCM_DECODE_SCALE).round();
        pcm.put_i16_le(scaled as i16);
    }
    BASE64_STANDARD.encode(&pcm)
}

#[inline]
fn quantize(sample: f32) -> i16 {
    // `as` truncates toward zero and maps NaN to 0
    (sample.clamp(-1.0, 1.0) * PCM_ENCODE_SCALE) as i16
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(bytes: &[u8]) -> Vec<i16> {
        bytes
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect()
    }

    #[test]
    fn test_encode_frame_scaling() {
        let encoded = encode_frame(&[0.0, 1.0, -1.0, 0.5, -0.5]);
        assert_eq!(encoded.len(), 10);
        assert_eq!(words(&encoded), vec![0, 32767, -32767, 16383, -16383]);
    }

    #[test]
    fn test_encode_frame_clamps_out_of_range() {
        let encoded = encode_frame(&[2.5, -7.0, f32::INFINITY, f32::NEG_INFINITY]);
        assert_eq!(words(&encoded), vec![32767, -32767, 32767, -32767]);
    }

    #[test]
    fn test_encode_frame_nan_is_silence() {
        let encoded = encode_frame(&[f32::NAN]);
        assert_eq!(words(&encoded), vec![0]);
    }

    #[test]
    fn test_encode_frame_is_little_endian() {
        let encoded = encode_frame(&[1.0]);
        assert_eq!(&encoded[..], &[0xFF, 0x7F]);
    }

    #[test]
    fn test_encode_chunk_full_scale() {
        let text = encode_chunk(&[-1.0, 1.0]);
        let bytes = BASE64_STANDARD.decode(text).unwrap();
        assert_eq!(words(&bytes), vec![-32768, 32767]);
    }

    #[test]
    fn test_encode_empty() {
        assert!(encode_frame(&[]).is_empty());
        assert_eq!(encode_chunk(&[]), "");
    }
}
