//! Fuzz target for DCC SEND handshake parsing
//!
//! The parser must return Ok or Err for any input, never panic.

#![no_main]

use libfuzzer_sys::fuzz_target;
use shelf_dcc::{DccSend, parse_ctcp};

fuzz_target!(|data: &[u8]| {
    let text = String::from_utf8_lossy(data);

    if let Ok(send) = DccSend::parse(&text) {
        // Anything accepted renders back to a handshake that still parses
        // unless the filename itself carries a quote
        if !send.filename.contains('"') {
            let ctcp = send.to_ctcp();
            let reparsed = parse_ctcp(&ctcp).map(DccSend::parse);
            assert!(matches!(reparsed, Some(Ok(_))));
        }
    }

    if let Some(payload) = parse_ctcp(&text) {
        let _ = DccSend::parse(payload);
    }
});
