#![no_main]

use libfuzzer_sys::fuzz_target;
use sealtext_core::core_crypto::{MessageCipher, SymmetricKey};

fuzz_target!(|data: &[u8]| {
    let cipher = MessageCipher::new(&SymmetricKey::from_bytes([7u8; 32]));

    // Arbitrary text must be rejected without panicking
    if let Ok(token) = std::str::from_utf8(data) {
        let _ = cipher.open(token);
    }

    // Authenticated bytes must come back unchanged
    let token = cipher.seal_bytes(data, 0).expect("sealing never fails for bytes");
    assert_eq!(cipher.open_bytes(&token).expect("own token opens"), data);
});
