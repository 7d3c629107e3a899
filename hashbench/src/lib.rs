#![warn(missing_docs)]
//! # hashbench
//!
//! Correctness-first micro-benchmark harness for families of hash function variants.
//!
//! hashbench decides *what* to run, *in what order*, and *whether to proceed*:
//! - **Option Resolution**: order-sensitive `--X` / `--no-X` tokens folded into
//!   independent enabled and disabled flag sets, with platform defaults
//! - **Capability Gate**: CPUID-derived AES-NI / AVX / AVX2 tiers that narrow the
//!   enabled set before anything runs
//! - **Reference Verification**: every registered variant replayed against its
//!   compiled-in reference table; any mismatch refuses benchmarking
//! - **Timed Sweep**: calibrated clock, per-size throughput for each selected variant
//!
//! The harness never implements a hash; your crate registers the variants.
//!
//! ## Quick Start
//!
//! ```ignore
//! use hashbench::{Flag, FlagSet, VariantDef};
//!
//! fn my_hash64(data: &[u8], seed: u64) -> u64 {
//!     // ...
//! }
//!
//! static MY_REFERENCE: [u64; 81] = [/* expected outputs in probe order */];
//!
//! hashbench::register_variant! {
//!     VariantDef::new(
//!         "my_hash64_le",
//!         my_hash64,
//!         FlagSet::from_flags(&[Flag::Gen1, Flag::Width64, Flag::LittleEndian]),
//!         &MY_REFERENCE,
//!     )
//! }
//!
//! fn main() -> std::process::ExitCode {
//!     hashbench::run()
//! }
//! ```
//!
//! ## Accelerated Variants
//!
//! ```ignore
//! hashbench::register_variant! {
//!     VariantDef::new("my_hash_avx2", my_hash_avx2, FlagSet::of(Flag::Gen0), &MY_AES_REFERENCE)
//!         .accelerated(AccelTier::Wide, FlagSet::of(Flag::Avx2))
//! }
//! ```

use std::process::ExitCode;

// Re-export core types
pub use hashbench_core::{
    ACCEL_ENV, AccelTier, CalibrationStats, Capabilities, Category, ClockMeasurement,
    ClockSettings, CpuFeatures, CpuProbe, FixedProbe, Flag, FlagSet, HAS_CYCLE_COUNTER, HashFn,
    MeasureError, Measurement, MeasurementContext, NativeProbe, Platform, Reconciled, Sample,
    SizeClass, Stability, Timer, VariantDef, registered_variants,
};

// Re-export logic types
pub use hashbench_logic::{
    PROBE_COUNT, Probe, ProbeBuffers, ProbeOutcome, VariantVerification, VerificationStatus,
    VerificationSummary, aggregate_verifications, run_verification, schedule, verify_variant,
};

// Re-export the harness
pub use hashbench_cli::{
    BuildProfile, ExecutionConfig, Harness, HarnessError, HashbenchConfig, Outcome, Resolution,
    Resolved, init_logging, resolve, run_with_args, usage,
};

/// Internal re-exports for macro use
#[doc(hidden)]
pub mod internal {
    pub use hashbench_core::internal::inventory;
}

/// Register one or more [`VariantDef`]s at link time.
///
/// Each argument must be a constant expression.
#[macro_export]
macro_rules! register_variant {
    ($($def:expr),+ $(,)?) => {
        $(
            $crate::internal::inventory::submit! { $def }
        )+
    };
}

/// Run the hashbench harness over the process arguments and registered variants.
///
/// Call this from your harness binary's `main()`:
/// ```ignore
/// fn main() -> std::process::ExitCode {
///     hashbench::run()
/// }
/// ```
pub fn run() -> ExitCode {
    match hashbench_cli::run() {
        Ok(outcome) => ExitCode::from(outcome.exit_code()),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
