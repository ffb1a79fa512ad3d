// tests/property/codec_test.rs

//! Property-based tests for line framing
//! Tests that decoding does not depend on how the input is split into reads

use bytes::BytesMut;
use proptest::prelude::*;
use smtplane::core::protocol::{LineCodec, LineFrame, OVERFLOW_HEAD_BYTES};
use tokio_util::codec::Decoder;

fn decode_in_chunks(input: &[u8], chunk: usize, max_length: usize) -> Vec<LineFrame> {
    let mut codec = LineCodec::with_max_length(max_length);
    let mut buf = BytesMut::new();
    let mut frames = Vec::new();
    for piece in input.chunks(chunk) {
        buf.extend_from_slice(piece);
        while let Some(frame) = codec.decode(&mut buf).unwrap() {
            frames.push(frame);
        }
    }
    while let Some(frame) = codec.decode_eof(&mut buf).unwrap() {
        frames.push(frame);
    }
    frames
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 128,
        ..ProptestConfig::default()
    })]

    #[test]
    fn test_chunking_does_not_change_frames(
        lines in prop::collection::vec("[ -~]{0,40}", 0..20),
        chunk in 1usize..64,
    ) {
        let input: Vec<u8> = lines
            .iter()
            .flat_map(|line| format!("{line}\r\n").into_bytes())
            .collect();
        let whole = decode_in_chunks(&input, input.len().max(1), 32);
        let pieces = decode_in_chunks(&input, chunk, 32);
        prop_assert_eq!(&whole, &pieces);

        let expected: Vec<LineFrame> = lines
            .iter()
            .map(|line| {
                if line.len() > 32 {
                    LineFrame::Overflow {
                        head: line[..OVERFLOW_HEAD_BYTES].to_string(),
                    }
                } else {
                    LineFrame::Line(line.clone())
                }
            })
            .collect();
        prop_assert_eq!(whole, expected);
    }
}
