#![no_main]

use csearch::query::{parse_pattern, regexp_query};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|pattern: &str| {
    // Planning any parseable pattern must not panic, and the result must be
    // in canonical form (sorted, deduplicated trigram sets come for free;
    // check the All/None identities held).
    for fold in [false, true] {
        if let Ok(hir) = parse_pattern(pattern, fold) {
            let query = regexp_query(&hir);
            if query.is_all() || query.is_none() {
                assert!(query.trigram.is_empty());
                assert!(query.sub.is_empty());
            }
        }
    }
});
