//! PCM decoding for inbound audio chunks

use base64::prelude::*;

use crate::constants::PCM_DECODE_SCALE;
use crate::error::CodecError;

/// Decode a base64 audio chunk into normalized samples.
///
/// Every two bytes are read as a little-endian `i16` and divided by 32768.
/// A trailing odd byte is dropped.
pub fn decode_chunk(text: &str) -> Result<Vec<f32>, CodecError> {
    let bytes = BASE64_STANDARD
        .decode(text.trim())
        .map_err(|e| CodecError::Decode(e.to_string()))?;

    Ok(pcm_to_samples(&bytes))
}

/// Expand raw little-endian 16-bit PCM into normalized samples.
pub fn pcm_to_samples(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / PCM_DECODE_SCALE)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encode_chunk;
    use proptest::prelude::*;

    #[test]
    fn test_decode_known_words() {
        // 0x0000, 0x7FFF, 0x8000, 0x4000
        let text = BASE64_STANDARD.encode([0x00, 0x00, 0xFF, 0x7F, 0x00, 0x80, 0x00, 0x40]);
        let samples = decode_chunk(&text).unwrap();
        assert_eq!(samples, vec![0.0, 32767.0 / 32768.0, -1.0, 0.5]);
    }

    #[test]
    fn test_decode_drops_trailing_odd_byte() {
        let text = BASE64_STANDARD.encode([0x00, 0x40, 0x12]);
        let samples = decode_chunk(&text).unwrap();
        assert_eq!(samples, vec![0.5]);

        let single = BASE64_STANDARD.encode([0x7F]);
        assert!(decode_chunk(&single).unwrap().is_empty());
    }

    #[test]
    fn test_decode_rejects_invalid_text() {
        let err = decode_chunk("not*base64!").unwrap_err();
        assert!(matches!(err, CodecError::Decode(_)));
    }

    #[test]
    fn test_decode_empty() {
        assert!(decode_chunk("").unwrap().is_empty());
    }

    proptest! {
        #[test]
        fn prop_round_trip_within_one_step(samples in prop::collection::vec(-1.0f32..=1.0, 0..512)) {
            let decoded = decode_chunk(&encode_chunk(&samples)).unwrap();
            prop_assert_eq!(decoded.len(), samples.len());
            for (original, restored) in samples.iter().zip(decoded.iter()) {
                prop_assert!((original - restored).abs() <= 1.0 / 32768.0 + 1e-7);
            }
        }
    }
}
