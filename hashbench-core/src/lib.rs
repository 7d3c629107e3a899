#![warn(missing_docs)]
//! hashbench Core - Registry and Runtime
//!
//! This crate provides the pieces every other hashbench crate builds on:
//! - `Flag` / `FlagSet` configuration words, size classes and platform defaults
//! - Capability gate over the optional AES-NI / AVX / AVX2 acceleration family
//! - `VariantDef` registration of hash implementations via `inventory`
//! - High-precision timing, CPU pinning and overhead calibration

mod caps;
mod flags;
mod measure;
mod variant;

pub use caps::{
    ACCEL_ENV, AccelTier, Capabilities, CpuFeatures, CpuProbe, FixedProbe, NativeProbe, Reconciled,
};
pub use flags::{Category, Flag, FlagSet, Platform, SizeClass};
/// Whether this platform provides hardware cycle counters (x86_64 RDTSCP or AArch64 CNTVCT_EL0).
/// When `false`, cycle counts are reported as 0 and only wall-clock nanoseconds are available.
pub use measure::HAS_CYCLE_COUNTER;
pub use measure::{
    CalibrationStats, ClockMeasurement, ClockSettings, MeasureError, Measurement,
    MeasurementContext, Sample, Timer, current_cpu, pin_to_cpu,
};
pub use variant::{HashFn, Stability, VariantDef, registered_variants};

/// Internal re-exports for macro use
#[doc(hidden)]
pub mod internal {
    pub use inventory;
}

/// Anchor to prevent LTO from stripping inventory entries
#[used]
#[doc(hidden)]
pub static REGISTRY_ANCHOR: fn() = || {
    for _ in inventory::iter::<VariantDef> {}
};
