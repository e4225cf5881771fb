#![no_main]

use libfuzzer_sys::fuzz_target;
use mcpbridge_core::framing::{extract_body, is_complete, try_parse_header, HeaderParseResult};

fuzz_target!(|data: &[u8]| {
    let Ok(HeaderParseResult::Complete { content_len, header_len }) = try_parse_header(data, data.len()) else {
        return;
    };

    if is_complete(data.len(), content_len, header_len) {
        let _ = extract_body(data, content_len, header_len);
    }
});
