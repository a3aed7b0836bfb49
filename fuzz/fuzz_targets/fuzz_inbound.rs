//! Fuzz target: `ReconciliationEngine::handle_inbound`
//!
//! Feeds arbitrary chunks to a linked engine.  Inbound handling must never
//! panic or open pending writes.
//!
//! cargo fuzz run fuzz_inbound

#![no_main]

use libfuzzer_sys::fuzz_target;
use rigsync::app::ports::{Clock, NullSink};
use rigsync::config::ConsoleConfig;
use rigsync::engine::ReconciliationEngine;

struct Frozen;

impl Clock for Frozen {
    fn now_ms(&self) -> u64 {
        0
    }
}

fuzz_target!(|data: &[u8]| {
    let Ok(mut engine) = ReconciliationEngine::new(&ConsoleConfig::default(), Frozen) else {
        return;
    };
    let mut sink = NullSink;
    engine.link_up(&mut sink);

    for chunk in data.chunks(7) {
        let _ = engine.handle_inbound(chunk, &mut sink);
    }
    assert_eq!(engine.pending_count(), 0);
    assert_eq!(engine.snapshot_all().len(), 11);
});
