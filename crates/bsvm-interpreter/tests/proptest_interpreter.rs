use proptest::prelude::*;

use bsvm_interpreter::parsed_opcode::{parse_script, unparse};
use bsvm_interpreter::scriptnum::{minimally_encode, ScriptNumber};
use bsvm_script::Script;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn scriptnum_encode_decode_roundtrip(val in (-0x7FFF_FFFF_FFFF_FFFFi64)..=0x7FFF_FFFF_FFFF_FFFF) {
        let bytes = ScriptNumber::new(val, false).to_bytes();
        let decoded = ScriptNumber::from_bytes(&bytes, 8, true, false).unwrap();
        prop_assert_eq!(decoded.to_int(), val);
    }

    #[test]
    fn scriptnum_encoding_is_minimal(val in (-0x7FFF_FFFF_FFFF_FFFFi64)..=0x7FFF_FFFF_FFFF_FFFF) {
        let bytes = ScriptNumber::new(val, true).to_bytes();
        // The canonical encoding survives a minimality re-pass
        // untouched and passes the minimal-encoding check.
        prop_assert_eq!(minimally_encode(&bytes), bytes.clone());
        prop_assert!(ScriptNumber::from_bytes(&bytes, 9, true, true).is_ok());
    }

    #[test]
    fn decode_encode_is_canonical(bytes in prop::collection::vec(any::<u8>(), 0..8)) {
        // decode-then-encode equals the minimal form of the input.
        let n = ScriptNumber::from_bytes(&bytes, 8, false, false).unwrap();
        prop_assert_eq!(n.to_bytes(), minimally_encode(&bytes));
    }

    #[test]
    fn parser_roundtrip_push_only(payloads in prop::collection::vec(
        prop::collection::vec(any::<u8>(), 0..80), 0..12)
    ) {
        // Build a script of arbitrary pushes; parsing then
        // re-serializing reproduces it byte for byte.
        let mut script = Script::new();
        for p in &payloads {
            script.append_push_data(p).unwrap();
        }
        let ops = parse_script(&script, false).unwrap();
        prop_assert!(ops.iter().all(|op| !op.malformed));
        let unparsed = unparse(&ops);
        prop_assert_eq!(unparsed.to_bytes(), script.to_bytes());
    }

    #[test]
    fn parser_roundtrip_arbitrary(bytes in prop::collection::vec(any::<u8>(), 0..256)) {
        // Any byte string parses (possibly with a trailing error
        // opcode); when it parses cleanly without an OP_RETURN tail it
        // re-serializes exactly.
        let script = Script::from_bytes(&bytes);
        let ops = parse_script(&script, false).unwrap();
        let clean = ops.iter().all(|op| !op.malformed);
        if clean {
            let unparsed = unparse(&ops);
            prop_assert_eq!(unparsed.to_bytes(), script.to_bytes());
        }
    }
}
