//! Verification Execution
//!
//! Runs every registered variant against its reference table with explicit
//! status handling for variants that cannot run on this hardware.

use crate::probe::{Probe, ProbeBuffers, schedule};
use hashbench_core::{Capabilities, VariantDef};
use tracing::{debug, warn};

/// Verification execution status with explicit states for all outcomes.
///
/// A plain pass/fail boolean cannot tell a mismatch apart from a variant that
/// never ran because its tier is unavailable or it has no reference table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationStatus {
    /// Every probe matched its reference value
    Passed,
    /// At least one probe mismatched
    Failed,
    /// Variant was not executed
    Skipped {
        /// Why it was not executed
        reason: String,
    },
}

impl VerificationStatus {
    /// Whether every probe matched
    pub fn is_success(&self) -> bool {
        matches!(self, VerificationStatus::Passed)
    }

    /// Whether any probe mismatched
    pub fn is_failure(&self) -> bool {
        matches!(self, VerificationStatus::Failed)
    }

    /// Skipped variants never fail the run
    pub fn affects_exit_code(&self) -> bool {
        self.is_failure()
    }
}

/// Outcome of a single probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOutcome {
    /// Probe caption
    pub caption: String,
    /// Reference value
    pub expected: u64,
    /// Value the variant produced
    pub actual: u64,
}

impl ProbeOutcome {
    /// Whether the output matched byte for byte
    pub fn passed(&self) -> bool {
        self.expected == self.actual
    }
}

/// Result of verifying one variant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantVerification {
    /// Variant name
    pub name: String,
    /// Variant is not yet frozen
    pub experimental: bool,
    /// Aggregate status
    pub status: VerificationStatus,
    /// Every probe that was executed, in schedule order
    pub probes: Vec<ProbeOutcome>,
}

impl VariantVerification {
    /// Probes that mismatched
    pub fn mismatches(&self) -> impl Iterator<Item = &ProbeOutcome> {
        self.probes.iter().filter(|p| !p.passed())
    }
}

/// Check `variant` against its reference table.
///
/// Every probe is executed even after a mismatch so one report shows them all.
/// A table shorter than the schedule verifies the prefix it covers.
pub fn verify_variant(
    variant: &VariantDef,
    probes: &[Probe],
    buffers: &ProbeBuffers,
) -> VariantVerification {
    let outcomes: Vec<ProbeOutcome> = probes
        .iter()
        .zip(variant.reference.iter())
        .map(|(probe, &expected)| ProbeOutcome {
            caption: probe.caption.clone(),
            expected,
            actual: (variant.hash)(probe.input(buffers), probe.seed),
        })
        .collect();

    if variant.reference.len() > probes.len() {
        debug!(
            variant = variant.name,
            extra = variant.reference.len() - probes.len(),
            "reference table longer than the probe schedule"
        );
    }

    let failed = outcomes.iter().any(|o| !o.passed());
    if failed {
        warn!(variant = variant.name, "reference mismatch");
    }

    VariantVerification {
        name: variant.name.to_string(),
        experimental: variant.is_experimental(),
        status: if failed {
            VerificationStatus::Failed
        } else {
            VerificationStatus::Passed
        },
        probes: outcomes,
    }
}

fn skipped(variant: &VariantDef, reason: String) -> VariantVerification {
    VariantVerification {
        name: variant.name.to_string(),
        experimental: variant.is_experimental(),
        status: VerificationStatus::Skipped { reason },
        probes: Vec::new(),
    }
}

/// Verify every variant, in the order given.
///
/// Variants whose tier is unavailable, or that have no reference table, are
/// reported as skipped rather than failed.
pub fn run_verification(variants: &[&VariantDef], caps: &Capabilities) -> Vec<VariantVerification> {
    let probes = schedule();
    let buffers = ProbeBuffers::new();

    variants
        .iter()
        .map(|variant| {
            if variant.reference.is_empty() {
                return skipped(variant, "no reference table".to_string());
            }
            if !variant.is_runnable(caps) {
                let tier = variant.tier.map_or("acceleration", |t| t.label());
                return skipped(variant, format!("{} not available", tier));
            }
            verify_variant(variant, &probes, &buffers)
        })
        .collect()
}

/// Summary of verification results
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct VerificationSummary {
    /// Variants that passed
    pub passed: usize,
    /// Variants with at least one mismatch
    pub failed: usize,
    /// Variants not executed
    pub skipped: usize,
    /// Individual probe mismatches across all variants
    pub mismatched_probes: usize,
}

impl VerificationSummary {
    /// Logical OR of every variant's failure
    pub fn failed(&self) -> bool {
        self.failed > 0
    }

    /// Variants that were executed
    pub fn total_executed(&self) -> usize {
        self.passed + self.failed
    }
}

/// Aggregate per-variant results into the single failure signal
pub fn aggregate_verifications(results: &[VariantVerification]) -> VerificationSummary {
    let mut summary = VerificationSummary::default();

    for result in results {
        match &result.status {
            VerificationStatus::Passed => summary.passed += 1,
            VerificationStatus::Failed => {
                summary.failed += 1;
                summary.mismatched_probes += result.mismatches().count();
            }
            VerificationStatus::Skipped { .. } => summary.skipped += 1,
        }
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::PROBE_COUNT;
    use hashbench_core::{AccelTier, FixedProbe, Flag, FlagSet};
    use std::sync::OnceLock;

    fn fold(data: &[u8], seed: u64) -> u64 {
        data.iter()
            .fold(seed ^ 0x9E37_79B9_7F4A_7C15, |acc, &b| {
                acc.rotate_left(5).wrapping_mul(31) ^ u64::from(b)
            })
    }

    fn fold_table() -> &'static [u64] {
        static TABLE: OnceLock<Vec<u64>> = OnceLock::new();
        TABLE.get_or_init(|| {
            let buffers = ProbeBuffers::new();
            schedule()
                .iter()
                .map(|p| fold(p.input(&buffers), p.seed))
                .collect()
        })
    }

    fn variant(reference: &'static [u64]) -> VariantDef {
        VariantDef::new("fold", fold, FlagSet::of(Flag::Gen0), reference)
    }

    #[test]
    fn test_matching_table_passes() {
        let v = variant(fold_table());
        let caps = Capabilities::none();
        let results = run_verification(&[&v], &caps);

        assert_eq!(results.len(), 1);
        assert!(results[0].status.is_success());
        assert_eq!(results[0].probes.len(), PROBE_COUNT);
        assert!(!aggregate_verifications(&results).failed());
    }

    #[test]
    fn test_mismatch_does_not_stop_other_probes() {
        let mut table = fold_table().to_vec();
        table[5] ^= 1;
        table[70] ^= 1;
        let table: &'static [u64] = Box::leak(table.into_boxed_slice());
        let v = variant(table);

        let result = verify_variant(&v, &schedule(), &ProbeBuffers::new());
        assert!(result.status.is_failure());
        assert_eq!(result.probes.len(), PROBE_COUNT);
        let bad: Vec<_> = result.mismatches().map(|p| p.caption.as_str()).collect();
        assert_eq!(bad, vec!["bin03-1p02", "align5_F59"]);
    }

    #[test]
    fn test_failure_does_not_stop_other_variants() {
        static WRONG: [u64; 3] = [1, 2, 3];
        let bad = variant(&WRONG);
        let good = variant(fold_table());
        let caps = Capabilities::none();

        let results = run_verification(&[&bad, &good], &caps);
        assert_eq!(results.len(), 2);
        assert!(results[0].status.is_failure());
        assert_eq!(results[0].probes.len(), 3);
        assert!(results[1].status.is_success());

        let summary = aggregate_verifications(&results);
        assert!(summary.failed());
        assert_eq!(summary.passed, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.total_executed(), 2);
    }

    #[test]
    fn test_unavailable_tier_is_skipped() {
        static WRONG: [u64; 1] = [42];
        let accel = variant(&WRONG).accelerated(AccelTier::Base, FlagSet::EMPTY);
        let caps = Capabilities::resolve(&FixedProbe::none());

        let results = run_verification(&[&accel], &caps);
        assert!(matches!(
            results[0].status,
            VerificationStatus::Skipped { ref reason } if reason.contains("AES-NI")
        ));
        assert!(!results[0].status.affects_exit_code());
        assert!(!aggregate_verifications(&results).failed());
    }

    #[test]
    fn test_available_tier_is_verified() {
        let accel = variant(fold_table()).accelerated(AccelTier::Wide, FlagSet::of(Flag::Avx2));
        let caps = Capabilities::resolve(&FixedProbe::tier(AccelTier::Wide));
        let results = run_verification(&[&accel], &caps);
        assert!(results[0].status.is_success());
    }

    #[test]
    fn test_empty_table_is_skipped() {
        let v = variant(&[]);
        let results = run_verification(&[&v], &Capabilities::none());
        assert_eq!(aggregate_verifications(&results).skipped, 1);
    }

    #[test]
    fn test_experimental_flag_is_carried() {
        let v = variant(fold_table()).experimental();
        let results = run_verification(&[&v], &Capabilities::none());
        assert!(results[0].experimental);
    }

    #[cfg(not(miri))]
    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn every_corrupted_probe_is_reported(
                corrupt in proptest::collection::btree_set(0..PROBE_COUNT, 0..12)
            ) {
                let mut table = fold_table().to_vec();
                for &i in &corrupt {
                    table[i] = !table[i];
                }
                let table: &'static [u64] = Box::leak(table.into_boxed_slice());
                let result = verify_variant(&variant(table), &schedule(), &ProbeBuffers::new());

                prop_assert_eq!(result.probes.len(), PROBE_COUNT);
                prop_assert_eq!(result.mismatches().count(), corrupt.len());
                prop_assert_eq!(result.status.is_failure(), !corrupt.is_empty());
            }
        }
    }
}
