// tests/property/sanitizer_test.rs

//! Property-based tests for telnet input sanitization
//! Tests that chunk boundaries never change what the sanitizer produces

use proptest::prelude::*;
use telconsole::core::protocol::{IAC, TelnetSanitizer, sanitize_output};

/// Bytes weighted towards the ones the sanitizer treats specially.
fn wire_bytes() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(
        prop_oneof![
            3 => any::<u8>(),
            1 => Just(IAC),
            1 => Just(b'\r'),
            1 => Just(b'\n'),
        ],
        0..256,
    )
}

fn split_at_points(data: &[u8], mut cuts: Vec<usize>) -> Vec<&[u8]> {
    cuts.iter_mut().for_each(|c| *c %= data.len() + 1);
    cuts.sort_unstable();
    cuts.dedup();

    let mut chunks = Vec::new();
    let mut start = 0;
    for cut in cuts {
        chunks.push(&data[start..cut]);
        start = cut;
    }
    chunks.push(&data[start..]);
    chunks
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        max_shrink_iters: 1000,
        ..ProptestConfig::default()
    })]

    #[test]
    fn test_chunking_does_not_change_output(
        data in wire_bytes(),
        cuts in prop::collection::vec(any::<usize>(), 0..8)
    ) {
        let mut whole = TelnetSanitizer::new(false);
        let expected = whole.sanitize_input(&data);
        let expected_seqs = whole.take_sequences();

        let mut chunked = TelnetSanitizer::new(false);
        let mut actual = Vec::new();
        let mut actual_seqs = Vec::new();
        for chunk in split_at_points(&data, cuts) {
            actual.extend_from_slice(&chunked.sanitize_input(chunk));
            actual_seqs.extend(chunked.take_sequences());
        }

        prop_assert_eq!(&actual[..], &expected[..]);
        prop_assert_eq!(actual_seqs, expected_seqs);
        prop_assert_eq!(chunked.has_pending(), whole.has_pending());
    }

    #[test]
    fn test_escape_byte_never_survives(data in wire_bytes()) {
        let mut sanitizer = TelnetSanitizer::new(false);
        let out = sanitizer.sanitize_input(&data);
        prop_assert!(!out.contains(&IAC));
    }

    #[test]
    fn test_plain_text_survives_input_and_output(
        lines in prop::collection::vec("[a-zA-Z0-9 +*/().=-]{0,20}", 1..10)
    ) {
        let text = lines.join("\n");
        let wire = text.replace('\n', "\r\n");

        let mut sanitizer = TelnetSanitizer::new(false);
        let clean = sanitizer.sanitize_input(wire.as_bytes());
        prop_assert_eq!(&clean[..], text.as_bytes());

        let restored = sanitize_output(std::str::from_utf8(&clean).unwrap());
        prop_assert_eq!(&restored[..], wire.as_bytes());
    }
}
