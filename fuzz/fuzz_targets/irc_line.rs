//! Fuzz target for IRC line parsing

#![no_main]

use libfuzzer_sys::fuzz_target;
use shelf_relay::irc::IrcLine;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        if let Some(line) = IrcLine::parse(s) {
            let _ = line.nick();
            let _ = line.trailing();
            assert!(!line.command.is_empty());
        }
    }
});
