#![no_main]

use libfuzzer_sys::fuzz_target;
use sealtext_core::core_message::chain::ChainCursor;
use sealtext_core::core_message::types::PlaintextMessage;

fuzz_target!(|data: &[u8]| {
    // Records decoded from attacker-controlled JSON must verify or fail cleanly
    if let Ok(records) = serde_json::from_slice::<Vec<PlaintextMessage>>(data) {
        let mut cursor = ChainCursor::new();
        for record in &records {
            let _ = cursor.advance(record);
        }
    }
});
