#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // We don't care about the result, just that parsing arbitrary bytes
    // as a JSON-RPC message never panics.
    let _: Result<mcpbridge::jsonrpc::JsonRpcMessage, _> = serde_json::from_slice(data);
});
