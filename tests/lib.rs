//! Shared fixtures for Shelf integration tests.


pub use test_helpers::{FileBot, IrcServer, RunningBot, fast_timeouts, zip_listing};
