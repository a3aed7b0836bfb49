//! Fuzz target: `protocol::frame::decode`
//!
//! Any input either decodes or is rejected as too short, and a decoded
//! frame re-encodes to the first seven input bytes apart from the
//! terminator.
//!
//! cargo fuzz run fuzz_frame_decode

#![no_main]

use libfuzzer_sys::fuzz_target;
use rigsync::protocol::frame::{FRAME_LEN, decode};

fuzz_target!(|data: &[u8]| {
    match decode(data) {
        Ok(frame) => {
            assert!(data.len() >= FRAME_LEN);
            let raw = frame.encode();
            assert_eq!(&raw[..FRAME_LEN - 1], &data[..FRAME_LEN - 1]);
        }
        Err(_) => assert!(data.len() < FRAME_LEN),
    }
});
