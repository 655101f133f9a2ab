#![no_main]

use libfuzzer_sys::fuzz_target;
use mcpbridge::framing::LineFramer;

fuzz_target!(|data: &[u8]| {
    // Arbitrary chunk boundaries and byte content must never panic the
    // framer, regardless of how the input splits across '\n'/'\r\n'.
    let mut framer = LineFramer::new();
    for chunk in data.chunks(37) {
        let _ = framer.feed(chunk);
    }
});
