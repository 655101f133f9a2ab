#![no_main]

use libfuzzer_sys::fuzz_target;
use mcpbridge::config::schema::MultiServerConfig;

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        let parsed: Result<MultiServerConfig, _> = serde_json::from_str(text);
        if let Ok(config) = parsed {
            let _ = mcpbridge::config::validate_multi_server_config(config);
        }
    }
});
