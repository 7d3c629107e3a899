//! Benchmark Executor
//!
//! Runs the timed sweep and renders every line the harness writes to its
//! report stream.
//!
//! ## Pipeline Overview
//!
//! ```text
//! VariantDef (registered via inventory, selected by the reconciled flags)
//!       │
//!       ▼
//! ┌─────────────┐
//! │  execution  │  Seeded key buffers, Measurement::measure per variant
//! └──────┬──────┘
//!        │
//!        ▼
//! ┌─────────────┐
//! │ formatting  │  Verification, clock summary and throughput lines
//! └─────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`execution`] - Size sweep, debug guard and panic containment
//! - [`formatting`] - Human-readable output formatting

mod execution;
mod formatting;

// Re-export public API
pub use execution::{BenchExecutionResult, BenchStatus, BuildProfile, ExecutionConfig, Executor};
pub use formatting::{
    format_bench_line, format_measurement_context, format_size_header, format_verification,
};
