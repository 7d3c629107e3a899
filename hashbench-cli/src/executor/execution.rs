//! Benchmark Execution
//!
//! Runs the timed sweep for every enabled key size across the selected
//! variants, in-process and on the calling thread.
//!
//! ## Data Flow
//!
//! ```text
//! VariantDef (from inventory, already selected)
//!        │
//!        ▼
//!   ExecutionConfig + MeasurementContext
//!        │
//!        ▼
//! ┌──────────────────┐
//! │     Executor     │  Seeded key buffer → Measurement::measure per variant
//! └────────┬─────────┘
//!          │
//!          ▼
//!  BenchExecutionResult (best ns and cycles per hash)
//! ```

use super::formatting::{format_bench_line, format_size_header};
use hashbench_core::{FlagSet, Measurement, MeasurementContext, Sample, SizeClass, VariantDef};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::io::{self, Write};
use tracing::{debug, warn};

/// Whether the harness itself was built with optimisations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildProfile {
    /// Release-like build: run the full sweep
    Optimized,
    /// Debug build: one diagnostic pass, then skip
    Debug,
}

impl BuildProfile {
    /// Profile of the running binary
    pub const fn current() -> Self {
        if cfg!(debug_assertions) {
            BuildProfile::Debug
        } else {
            BuildProfile::Optimized
        }
    }
}

/// Configuration for benchmark execution
#[derive(Debug, Clone)]
pub struct ExecutionConfig {
    /// Seed for the random key buffers
    pub buffer_seed: u64,
    /// Seed passed to every hash invocation
    pub hash_seed: u64,
    /// Print batch statistics next to each result
    pub verbose: bool,
    /// Full sweep or debug guard
    pub profile: BuildProfile,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            buffer_seed: 42,
            hash_seed: 42,
            verbose: false,
            profile: BuildProfile::current(),
        }
    }
}

/// Outcome of timing one variant
#[derive(Debug, Clone, PartialEq)]
pub enum BenchStatus {
    /// A sample was collected
    Measured(Sample),
    /// The variant panicked while being timed
    Crashed {
        /// Panic payload
        message: String,
    },
}

/// Result from timing a single variant at one key size
#[derive(Debug, Clone, PartialEq)]
pub struct BenchExecutionResult {
    /// Variant name
    pub name: String,
    /// Variant is not yet frozen
    pub experimental: bool,
    /// Key length
    pub bytes: usize,
    /// Measured or crashed
    pub status: BenchStatus,
}

impl BenchExecutionResult {
    /// Best nanoseconds per hash, if measured
    pub fn ns_per_hash(&self) -> Option<f64> {
        match &self.status {
            BenchStatus::Measured(sample) => Some(sample.nanos),
            BenchStatus::Crashed { .. } => None,
        }
    }

    /// Nanoseconds per key byte
    pub fn ns_per_byte(&self) -> Option<f64> {
        self.ns_per_hash().map(|ns| ns / self.bytes.max(1) as f64)
    }

    /// Throughput in bytes per nanosecond; `None` when the cost fell below
    /// the clock's resolution after overhead subtraction
    pub fn bytes_per_ns(&self) -> Option<f64> {
        self.ns_per_hash()
            .filter(|&ns| ns > 0.0)
            .map(|ns| self.bytes as f64 / ns)
    }
}

/// Execute the sweep and write results as they are produced
pub struct Executor<'a> {
    config: ExecutionConfig,
    measurement: &'a mut dyn Measurement,
    ctx: &'a MeasurementContext,
}

impl<'a> Executor<'a> {
    /// Bind an executor to an initialised measurement collaborator
    pub fn new(
        config: ExecutionConfig,
        measurement: &'a mut dyn Measurement,
        ctx: &'a MeasurementContext,
    ) -> Self {
        Self {
            config,
            measurement,
            ctx,
        }
    }

    /// Run every enabled size class in ascending order, or the single debug
    /// pass when the harness is unoptimised.
    pub fn execute(
        &mut self,
        enabled: FlagSet,
        variants: &[&VariantDef],
        out: &mut dyn Write,
    ) -> io::Result<Vec<BenchExecutionResult>> {
        if variants.is_empty() {
            warn!("no variants selected for benchmarking");
        }

        let mut results = Vec::new();
        match self.config.profile {
            BuildProfile::Debug => {
                results.extend(self.bench_size(1, "Non-optimized/Debug", variants, out)?);
                writeln!(out, "\nNon-optimized/Debug build, skip benchmark")?;
            }
            BuildProfile::Optimized => {
                for class in SizeClass::enabled_in(enabled) {
                    results.extend(self.bench_size(class.bytes(), class.caption(), variants, out)?);
                }
            }
        }
        Ok(results)
    }

    /// Time every variant on one seeded key buffer of `bytes` bytes
    pub fn bench_size(
        &mut self,
        bytes: usize,
        caption: &str,
        variants: &[&VariantDef],
        out: &mut dyn Write,
    ) -> io::Result<Vec<BenchExecutionResult>> {
        writeln!(out, "{}", format_size_header(caption, bytes))?;
        out.flush()?;

        let mut buffer = vec![0u8; bytes];
        StdRng::seed_from_u64(self.config.buffer_seed).fill(&mut buffer[..]);
        debug!(bytes, variants = variants.len(), "benchmarking size class");

        let mut results = Vec::with_capacity(variants.len());
        for variant in variants {
            let result = self.bench_variant(variant, &buffer);
            writeln!(out, "{}", format_bench_line(&result, self.config.verbose))?;
            out.flush()?;
            results.push(result);
        }
        Ok(results)
    }

    fn bench_variant(&mut self, variant: &VariantDef, buffer: &[u8]) -> BenchExecutionResult {
        let hash = variant.hash;
        let seed = self.config.hash_seed;
        let measurement = &mut *self.measurement;
        let ctx = self.ctx;

        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let mut probe = || hash(std::hint::black_box(buffer), seed);
            measurement.measure(ctx, &mut probe)
        }));

        let status = match outcome {
            Ok(sample) => BenchStatus::Measured(sample),
            Err(panic) => {
                let message = if let Some(s) = panic.downcast_ref::<&str>() {
                    s.to_string()
                } else if let Some(s) = panic.downcast_ref::<String>() {
                    s.clone()
                } else {
                    "Unknown panic".to_string()
                };
                warn!(variant = variant.name, %message, "variant panicked while benchmarking");
                BenchStatus::Crashed { message }
            }
        };

        BenchExecutionResult {
            name: variant.name.to_string(),
            experimental: variant.is_experimental(),
            bytes: buffer.len(),
            status,
        }
    }
}
