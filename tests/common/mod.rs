// Not every test binary uses every fixture.
#![allow(dead_code)]

pub mod recording_client;

pub use recording_client::*;
