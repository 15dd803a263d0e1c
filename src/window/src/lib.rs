//! Concurrent, memory-bounded sliding window over a stream of decoded variants.
//!
//! [`WindowedBuffer`] pulls raw blocks from a [`VariantSource`], decodes them in parallel, drops
//! the ones failing the minor allele frequency threshold, and serves the rest to any number of
//! consumer threads.

pub mod buffer;
pub use buffer::{BufferStats, WindowedBuffer};

pub mod policy;
pub use policy::{LoadPolicy, WindowConfig};

mod error;
pub use error::WindowError;

pub use bgen::VariantSource;
