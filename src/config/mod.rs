// src/config/mod.rs
//! Runtime configuration: pipeline settings plus the oracle section.

pub mod ai;
pub mod pipeline;

pub use ai::OracleConfig;
pub use pipeline::PipelineConfig;
