//! Synthetic event streams for replay tests, demos and benchmarks.

pub mod stream;
