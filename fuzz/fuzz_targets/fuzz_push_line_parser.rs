#![no_main]

use libfuzzer_sys::fuzz_target;
use mcpbridge_core::push::PushNotification;

fuzz_target!(|data: &str| {
    let _ = PushNotification::from_line(data);
});
