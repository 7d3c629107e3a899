#![warn(missing_docs)]
//! hashbench Logic - Reference Verification
//!
//! Replays the canonical probe schedule against every registered variant and
//! compares outputs with compiled-in reference tables. Any single mismatch
//! fails the whole stage, but only after every variant has been checked.

mod probe;
mod verification;

pub use probe::{LONG_PATTERN_LEN, PATTERN, PROBE_COUNT, Probe, ProbeBuffers, Source, schedule};
pub use verification::{
    ProbeOutcome, VariantVerification, VerificationStatus, VerificationSummary,
    aggregate_verifications, run_verification, verify_variant,
};
