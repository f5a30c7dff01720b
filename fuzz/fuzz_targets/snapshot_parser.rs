#![no_main]

use libfuzzer_sys::fuzz_target;
use netstitch::{ActivitySnapshot, KindProcessor, OperationKind, ProcessOptions, SignatureTable};

fuzz_target!(|data: &[u8]| {
    let Ok(input) = std::str::from_utf8(data) else {
        return;
    };
    // Malformed snapshots must be rejected, never panic
    let Ok(snapshot) = ActivitySnapshot::from_json_str(input) else {
        return;
    };
    let Ok(table) = SignatureTable::default_table() else {
        return;
    };
    for kind in OperationKind::ALL {
        let _ = KindProcessor::new(kind, &snapshot, &table, ProcessOptions::default()).process();
    }
});
