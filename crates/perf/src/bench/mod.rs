//! Benchmark modules

pub mod context;
pub mod selector;
pub mod subscription;
