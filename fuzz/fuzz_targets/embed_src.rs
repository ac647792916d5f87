#![no_main]

use capsync::embed::normalize_embed_src;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        let first = normalize_embed_src(input);
        debug_assert!(first.contains("enablejsapi=1"));
        debug_assert!(first.contains("html5=1"));
        debug_assert!(first.contains("playsinline=1"));
        debug_assert!(first.contains("fs="));
        let second = normalize_embed_src(&first);
        debug_assert_eq!(first, second);
    }
});
