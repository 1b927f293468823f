use proptest::prelude::*;

use bsvm_script::Script;
use bsvm_transaction::{Transaction, TransactionInput, TransactionOutput};

prop_compose! {
    fn arb_input()(
        txid in prop::array::uniform32(any::<u8>()),
        vout in any::<u32>(),
        script in prop::collection::vec(any::<u8>(), 0..64),
        sequence in any::<u32>(),
    ) -> TransactionInput {
        let mut input = TransactionInput::new();
        input.source_txid = txid;
        input.source_tx_out_index = vout;
        input.unlocking_script = if script.is_empty() {
            None
        } else {
            Some(Script::from_bytes(&script))
        };
        input.sequence_number = sequence;
        input
    }
}

prop_compose! {
    fn arb_output()(
        satoshis in any::<u64>(),
        script in prop::collection::vec(any::<u8>(), 0..64),
    ) -> TransactionOutput {
        TransactionOutput::with_script(satoshis, Script::from_bytes(&script))
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn transaction_bytes_roundtrip(
        version in 1u32..=2,
        inputs in prop::collection::vec(arb_input(), 1..5),
        outputs in prop::collection::vec(arb_output(), 0..5),
        lock_time in any::<u32>(),
    ) {
        let tx = Transaction { version, inputs, outputs, lock_time };
        let decoded = Transaction::from_bytes(&tx.to_bytes()).unwrap();
        prop_assert_eq!(decoded.to_bytes(), tx.to_bytes());
        prop_assert_eq!(decoded.version, tx.version);
        prop_assert_eq!(decoded.input_count(), tx.input_count());
        prop_assert_eq!(decoded.output_count(), tx.output_count());
        prop_assert_eq!(decoded.lock_time, tx.lock_time);
        prop_assert_eq!(decoded.txid(), tx.txid());
    }

    #[test]
    fn transaction_hex_roundtrip(
        inputs in prop::collection::vec(arb_input(), 1..3),
        outputs in prop::collection::vec(arb_output(), 1..3),
    ) {
        let tx = Transaction { version: 1, inputs, outputs, lock_time: 0 };
        let decoded = Transaction::from_hex(&tx.to_hex()).unwrap();
        prop_assert_eq!(decoded.to_hex(), tx.to_hex());
    }
}
