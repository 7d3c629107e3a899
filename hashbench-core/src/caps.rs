//! Capability Gate
//!
//! Converts a CPU-feature probe into three booleans (base AES-NI, AES-NI with
//! AVX, AVX2) and narrows an enabled set to what the executing hardware can run.
//! The probe is queried exactly once, in [`Capabilities::resolve`].

use crate::flags::{Flag, FlagSet};
use tracing::{debug, warn};

/// Environment variable that caps the resolved tier (`none|base|extended|wide`).
pub const ACCEL_ENV: &str = "HASHBENCH_ACCEL";

// CPUID leaf 1 ECX
const ECX_AESNI: u32 = 1 << 25;
const ECX_OSXSAVE: u32 = 1 << 27;
const ECX_AVX: u32 = 1 << 28;
const ECX_AES_AVX: u32 = ECX_AESNI | ECX_OSXSAVE | ECX_AVX;
// CPUID leaf 7 EBX
const EBX_AVX2: u32 = 1 << 5;

/// Tier of the optional acceleration family.
///
/// Each tier implies the ones below it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AccelTier {
    /// AES-NI
    Base,
    /// AES-NI with AVX
    Extended,
    /// AES-NI with AVX2
    Wide,
}

impl AccelTier {
    /// Selector flag gated by this tier
    pub const fn flag(self) -> Flag {
        match self {
            AccelTier::Base => Flag::Aes,
            AccelTier::Extended => Flag::Avx,
            AccelTier::Wide => Flag::Avx2,
        }
    }

    /// Human-readable name used in notices
    pub const fn label(self) -> &'static str {
        match self {
            AccelTier::Base => "AES-NI",
            AccelTier::Extended => "AVX",
            AccelTier::Wide => "AVX2",
        }
    }

    fn parse_limit(value: &str) -> Option<Option<AccelTier>> {
        match value.trim().to_ascii_lowercase().as_str() {
            "none" | "off" => Some(None),
            "base" | "aes" => Some(Some(AccelTier::Base)),
            "extended" | "avx" => Some(Some(AccelTier::Extended)),
            "wide" | "avx2" => Some(Some(AccelTier::Wide)),
            _ => None,
        }
    }
}

/// Raw capability words as reported by the CPU.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuFeatures {
    /// CPUID leaf 1, ECX
    pub basic_ecx: u32,
    /// CPUID leaf 7 subleaf 0, EBX (zero when the leaf is absent)
    pub extended7_ebx: u32,
}

/// Source of CPU capability words.
pub trait CpuProbe {
    /// Capability words, or `None` when the acceleration family does not exist
    /// for this target.
    fn features(&self) -> Option<CpuFeatures>;
}

/// Queries the executing CPU.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeProbe;

impl CpuProbe for NativeProbe {
    #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
    #[allow(unused_unsafe)]
    fn features(&self) -> Option<CpuFeatures> {
        #[cfg(target_arch = "x86")]
        use core::arch::x86::{__cpuid, __cpuid_count, __get_cpuid_max};
        #[cfg(target_arch = "x86_64")]
        use core::arch::x86_64::{__cpuid, __cpuid_count, __get_cpuid_max};

        // SAFETY: CPUID is present on every CPU this code can be compiled for.
        let (max_leaf, _) = unsafe { __get_cpuid_max(0) };
        let basic = unsafe { __cpuid(1) };
        let extended7_ebx = if max_leaf >= 7 {
            unsafe { __cpuid_count(7, 0) }.ebx
        } else {
            0
        };

        Some(CpuFeatures {
            basic_ecx: basic.ecx,
            extended7_ebx,
        })
    }

    #[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
    fn features(&self) -> Option<CpuFeatures> {
        None
    }
}

/// Returns canned capability words; used by tests and to pin a tier.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedProbe(pub Option<CpuFeatures>);

impl FixedProbe {
    /// Family not compiled in
    pub const fn absent() -> Self {
        Self(None)
    }

    /// Family present, no tier available
    pub const fn none() -> Self {
        Self(Some(CpuFeatures {
            basic_ecx: 0,
            extended7_ebx: 0,
        }))
    }

    /// Capability words that yield exactly `tier` and everything below it
    pub const fn tier(tier: AccelTier) -> Self {
        let (basic_ecx, extended7_ebx) = match tier {
            AccelTier::Base => (ECX_AESNI, 0),
            AccelTier::Extended => (ECX_AES_AVX, 0),
            AccelTier::Wide => (ECX_AES_AVX, EBX_AVX2),
        };
        Self(Some(CpuFeatures {
            basic_ecx,
            extended7_ebx,
        }))
    }
}

impl CpuProbe for FixedProbe {
    fn features(&self) -> Option<CpuFeatures> {
        self.0
    }
}

/// Result of narrowing an enabled set to the available tiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciled {
    /// Enabled set with unavailable acceleration flags removed
    pub enabled: FlagSet,
    /// Informational lines for groups the user asked for but cannot have
    pub notices: Vec<String>,
}

/// Resolved hardware capability, computed once per run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    compiled: bool,
    base: bool,
    extended: bool,
    wide: bool,
}

impl Capabilities {
    /// Nothing available, family not compiled in
    pub const fn none() -> Self {
        Self {
            compiled: false,
            base: false,
            extended: false,
            wide: false,
        }
    }

    /// Query `probe` once and derive the tier booleans.
    pub fn resolve(probe: &dyn CpuProbe) -> Self {
        let caps = match probe.features() {
            Some(features) => Self::from_features(features),
            None => Self::none(),
        };
        debug!(
            compiled = caps.compiled,
            base = caps.base,
            extended = caps.extended,
            wide = caps.wide,
            "resolved acceleration capabilities"
        );
        caps
    }

    /// Like [`resolve`](Self::resolve), then apply the `HASHBENCH_ACCEL` cap if set.
    pub fn resolve_with_env(probe: &dyn CpuProbe) -> Self {
        let caps = Self::resolve(probe);
        match std::env::var(ACCEL_ENV) {
            Ok(value) => match AccelTier::parse_limit(&value) {
                Some(limit) => caps.limited_to(limit),
                None => {
                    warn!(value = %value, "ignoring invalid {}", ACCEL_ENV);
                    caps
                }
            },
            Err(_) => caps,
        }
    }

    /// Derive the tiers from raw capability words.
    pub const fn from_features(features: CpuFeatures) -> Self {
        let base = features.basic_ecx & ECX_AESNI != 0;
        let extended = base && features.basic_ecx & ECX_AES_AVX == ECX_AES_AVX;
        let wide = extended && features.extended7_ebx & EBX_AVX2 != 0;
        Self {
            compiled: true,
            base,
            extended,
            wide,
        }
    }

    /// Lower the available tiers to at most `limit` (never raises them).
    #[must_use]
    pub fn limited_to(self, limit: Option<AccelTier>) -> Self {
        let allows = |tier: AccelTier| limit.is_some_and(|max| tier <= max);
        Self {
            compiled: self.compiled,
            base: self.base && allows(AccelTier::Base),
            extended: self.extended && allows(AccelTier::Extended),
            wide: self.wide && allows(AccelTier::Wide),
        }
    }

    /// Whether the acceleration family exists on this target at all
    pub const fn family_compiled(&self) -> bool {
        self.compiled
    }

    /// Whether `tier` can run on this hardware
    pub const fn is_available(&self, tier: AccelTier) -> bool {
        match tier {
            AccelTier::Base => self.base,
            AccelTier::Extended => self.extended,
            AccelTier::Wide => self.wide,
        }
    }

    /// Highest available tier
    pub fn best_tier(&self) -> Option<AccelTier> {
        [AccelTier::Wide, AccelTier::Extended, AccelTier::Base]
            .into_iter()
            .find(|t| self.is_available(*t))
    }

    /// Acceleration flags usable on this hardware; empty when the base tier is missing.
    pub fn availability_set(&self) -> FlagSet {
        if !self.base {
            return FlagSet::EMPTY;
        }
        let mut set = FlagSet::from_flags(&[Flag::Aes, Flag::UserWantsAes]);
        if self.extended {
            set.insert(Flag::Avx);
        }
        if self.wide {
            set.insert(Flag::Avx2);
        }
        set
    }

    /// Clear every unavailable tier's flag from `enabled`. A missing base tier
    /// also drops the explicit-request marker.
    ///
    /// Notices are produced only when the acceleration group was explicitly
    /// requested and the family exists on this target. Without the base tier
    /// only the AES-NI notice is given; the wider tiers are cleared silently.
    pub fn reconcile(&self, enabled: FlagSet) -> Reconciled {
        let wanted = self.compiled && enabled.contains(Flag::UserWantsAes);
        let mut out = enabled;
        let mut notices = Vec::new();

        for tier in [AccelTier::Base, AccelTier::Extended, AccelTier::Wide] {
            if self.is_available(tier) {
                continue;
            }
            let flag = tier.flag();
            let requested = match tier {
                AccelTier::Base => true,
                AccelTier::Extended | AccelTier::Wide => self.base && enabled.contains(flag),
            };
            if wanted && requested {
                notices.push(format!(" - {} not available on the current CPU", tier.label()));
            }
            out.remove(flag);
            if tier == AccelTier::Base {
                out.remove(Flag::UserWantsAes);
            }
        }

        if out != enabled {
            debug!(before = %enabled, after = %out, "capability gate narrowed enabled set");
        }

        Reconciled {
            enabled: out,
            notices,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_derivation() {
        let caps = Capabilities::resolve(&FixedProbe::tier(AccelTier::Base));
        assert!(caps.is_available(AccelTier::Base));
        assert!(!caps.is_available(AccelTier::Extended));
        assert!(!caps.is_available(AccelTier::Wide));

        let caps = Capabilities::resolve(&FixedProbe::tier(AccelTier::Wide));
        assert!(caps.is_available(AccelTier::Base));
        assert!(caps.is_available(AccelTier::Extended));
        assert!(caps.is_available(AccelTier::Wide));
        assert_eq!(caps.best_tier(), Some(AccelTier::Wide));
    }

    #[test]
    fn test_avx2_without_avx_is_not_wide() {
        let caps = Capabilities::from_features(CpuFeatures {
            basic_ecx: ECX_AESNI,
            extended7_ebx: EBX_AVX2,
        });
        assert!(caps.is_available(AccelTier::Base));
        assert!(!caps.is_available(AccelTier::Wide));
    }

    #[test]
    fn test_avx_without_aes_is_nothing() {
        let caps = Capabilities::from_features(CpuFeatures {
            basic_ecx: ECX_OSXSAVE | ECX_AVX,
            extended7_ebx: EBX_AVX2,
        });
        assert_eq!(caps.best_tier(), None);
        assert!(caps.availability_set().is_empty());
        assert!(caps.family_compiled());
    }

    #[test]
    fn test_availability_set() {
        assert!(Capabilities::none().availability_set().is_empty());
        assert!(Capabilities::resolve(&FixedProbe::none())
            .availability_set()
            .is_empty());

        let base = Capabilities::resolve(&FixedProbe::tier(AccelTier::Base));
        assert_eq!(
            base.availability_set(),
            FlagSet::from_flags(&[Flag::Aes, Flag::UserWantsAes])
        );

        let wide = Capabilities::resolve(&FixedProbe::tier(AccelTier::Wide));
        assert_eq!(wide.availability_set(), FlagSet::ACCELERATION);
    }

    #[test]
    fn test_reconcile_clears_and_notifies() {
        let caps = Capabilities::resolve(&FixedProbe::none());
        let enabled = FlagSet::DEFAULT | FlagSet::ACCELERATION;
        let out = caps.reconcile(enabled);

        assert!(!out.enabled.intersects(FlagSet::from_flags(&[
            Flag::Aes,
            Flag::Avx,
            Flag::Avx2
        ])));
        assert!(out.enabled.contains_all(FlagSet::DEFAULT));
        assert_eq!(out.notices, vec![" - AES-NI not available on the current CPU"]);
    }

    #[test]
    fn test_reconcile_names_missing_wide_tiers() {
        let caps = Capabilities::resolve(&FixedProbe::tier(AccelTier::Base));
        let out = caps.reconcile(FlagSet::DEFAULT | FlagSet::ACCELERATION);
        assert_eq!(
            out.notices,
            vec![
                " - AVX not available on the current CPU",
                " - AVX2 not available on the current CPU",
            ]
        );
        assert!(out.enabled.contains_all(FlagSet::from_flags(&[Flag::Aes, Flag::UserWantsAes])));

        let extended = Capabilities::resolve(&FixedProbe::tier(AccelTier::Extended));
        let out = extended.reconcile(FlagSet::from_flags(&[Flag::Aes, Flag::Avx2, Flag::UserWantsAes]));
        assert_eq!(out.notices, vec![" - AVX2 not available on the current CPU"]);
    }

    #[test]
    fn test_reconcile_silent_when_family_absent() {
        let caps = Capabilities::none();
        let out = caps.reconcile(FlagSet::ALL - FlagSet::VERBOSITY);
        assert!(out.notices.is_empty());
        assert!(!out.enabled.intersects(FlagSet::ACCELERATION));

        let out = Capabilities::resolve(&FixedProbe::absent()).reconcile(FlagSet::ALL);
        assert!(out.notices.is_empty());
        assert!(!out.enabled.intersects(FlagSet::ACCELERATION));
    }

    #[test]
    fn test_reconcile_silent_without_request() {
        let caps = Capabilities::resolve(&FixedProbe::tier(AccelTier::Base));
        let enabled = FlagSet::from_flags(&[Flag::Gen0, Flag::Aes, Flag::Avx2]);
        let out = caps.reconcile(enabled);
        assert_eq!(out.enabled, FlagSet::from_flags(&[Flag::Gen0, Flag::Aes]));
        assert!(out.notices.is_empty());
    }

    #[test]
    fn test_reconcile_is_idempotent() {
        let caps = Capabilities::resolve(&FixedProbe::tier(AccelTier::Extended));
        let once = caps.reconcile(FlagSet::ALL);
        let twice = caps.reconcile(once.enabled);
        assert_eq!(once.enabled, twice.enabled);
    }

    #[test]
    fn test_limit_never_raises() {
        let base = Capabilities::resolve(&FixedProbe::tier(AccelTier::Base));
        assert_eq!(base.limited_to(Some(AccelTier::Wide)), base);

        let wide = Capabilities::resolve(&FixedProbe::tier(AccelTier::Wide));
        let capped = wide.limited_to(Some(AccelTier::Base));
        assert_eq!(capped.best_tier(), Some(AccelTier::Base));
        assert_eq!(wide.limited_to(None).best_tier(), None);
    }

    #[test]
    fn test_parse_limit() {
        assert_eq!(AccelTier::parse_limit("none"), Some(None));
        assert_eq!(AccelTier::parse_limit(" AVX2 "), Some(Some(AccelTier::Wide)));
        assert_eq!(AccelTier::parse_limit("turbo"), None);
    }

    /// Serialises tests that touch `HASHBENCH_ACCEL`
    static ACCEL_ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

    #[test]
    fn test_env_caps_the_resolved_tier() {
        let _guard = ACCEL_ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let saved = std::env::var_os(ACCEL_ENV);
        let wide = FixedProbe::tier(AccelTier::Wide);

        std::env::set_var(ACCEL_ENV, "extended");
        let caps = Capabilities::resolve_with_env(&wide);
        assert_eq!(caps.best_tier(), Some(AccelTier::Extended));

        std::env::set_var(ACCEL_ENV, "none");
        let caps = Capabilities::resolve_with_env(&wide);
        assert_eq!(caps.best_tier(), None);
        assert!(caps.family_compiled());

        // Never raises what the hardware reports.
        std::env::set_var(ACCEL_ENV, "wide");
        let base = Capabilities::resolve_with_env(&FixedProbe::tier(AccelTier::Base));
        assert_eq!(base.best_tier(), Some(AccelTier::Base));

        std::env::set_var(ACCEL_ENV, "turbo");
        assert_eq!(
            Capabilities::resolve_with_env(&wide),
            Capabilities::resolve(&wide)
        );

        std::env::remove_var(ACCEL_ENV);
        assert_eq!(
            Capabilities::resolve_with_env(&wide),
            Capabilities::resolve(&wide)
        );

        if let Some(value) = saved {
            std::env::set_var(ACCEL_ENV, value);
        }
    }

    #[test]
    fn test_native_probe_is_consistent() {
        let caps = Capabilities::resolve(&NativeProbe);
        // Tiers are nested regardless of hardware
        if caps.is_available(AccelTier::Wide) {
            assert!(caps.is_available(AccelTier::Extended));
        }
        if caps.is_available(AccelTier::Extended) {
            assert!(caps.is_available(AccelTier::Base));
        }
    }

    #[cfg(not(miri))]
    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn reconciled_set_never_holds_unavailable_tier(
                ecx in any::<u32>(),
                ebx in any::<u32>(),
                bits in any::<u32>(),
            ) {
                let caps = Capabilities::from_features(CpuFeatures { basic_ecx: ecx, extended7_ebx: ebx });
                let out = caps.reconcile(FlagSet::from_bits_truncate(bits));
                for tier in [AccelTier::Base, AccelTier::Extended, AccelTier::Wide] {
                    if !caps.is_available(tier) {
                        prop_assert!(!out.enabled.contains(tier.flag()));
                    }
                }
                if !caps.is_available(AccelTier::Base) {
                    prop_assert!(!out.enabled.contains(Flag::UserWantsAes));
                    prop_assert!(out.notices.len() <= 1);
                }
                prop_assert!(FlagSet::from_bits_truncate(bits).contains_all(out.enabled));
            }
        }
    }
}
