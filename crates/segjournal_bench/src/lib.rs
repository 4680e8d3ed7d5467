//! Benchmark support for segjournal.

pub mod utils;
