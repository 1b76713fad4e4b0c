#![no_main]

use dostrace::decoder::SyscallDecoder;
use dostrace::TraceStore;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        // Loading must never panic; whatever loads must decode and re-serialize
        if let Ok(store) = TraceStore::from_json(input) {
            let _ = SyscallDecoder::default().decode(&store);
            let _ = store.to_json();
        }
    }
});
