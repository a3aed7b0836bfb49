//! Fuzz target: `FrameSplitter::feed`
//!
//! Arbitrary byte sequences, split at an arbitrary point, must never panic
//! the splitter, and every emitted frame ends in the terminator.
//!
//! cargo fuzz run fuzz_frame_splitter

#![no_main]

use libfuzzer_sys::fuzz_target;
use rigsync::protocol::frame::{FRAME_LEN, TERMINATOR};
use rigsync::transport::FrameSplitter;

fuzz_target!(|data: &[u8]| {
    let Some((&cut, rest)) = data.split_first() else {
        return;
    };
    let cut = usize::from(cut).min(rest.len());

    let mut splitter = FrameSplitter::new();
    let mut frames = splitter.feed(&rest[..cut]);
    frames.extend(splitter.feed(&rest[cut..]));

    for frame in &frames {
        assert_eq!(frame[FRAME_LEN - 1], TERMINATOR);
    }
    assert!(splitter.buffered() < FRAME_LEN);
    assert!(frames.len() * FRAME_LEN + splitter.buffered() <= rest.len());
});
