#![no_main]

use libfuzzer_sys::fuzz_target;
use ora_client::ConnectString;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(parsed) = ConnectString::parse(s) {
            // Every accepted string yields whitespace-free, non-empty parts.
            assert!(!parsed.target().is_empty());
            assert!(!parsed.target().contains(char::is_whitespace));
            assert!(!parsed.username().contains(char::is_whitespace));
        }
    }
});
