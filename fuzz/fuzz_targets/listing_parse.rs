//! Fuzz target for search listing parsing and filtering

#![no_main]

use libfuzzer_sys::fuzz_target;
use shelf_core::{filter_by_extension, parse_listing};

fuzz_target!(|data: &[u8]| {
    let results = parse_listing(data);
    let count = results.len();

    let filtered = filter_by_extension(results, &["epub", ".MOBI", ""]);
    assert!(filtered.len() <= count);
});
