//! Hash variant registration
//!
//! The harness never implements a hash. Implementations describe each variant
//! with a [`VariantDef`] and submit it through `inventory`, the same way
//! benchmark binaries register their routines at link time.

use crate::caps::{AccelTier, Capabilities};
use crate::flags::FlagSet;

/// Invocation contract shared by every variant: `(input, seed) -> output`.
pub type HashFn = fn(&[u8], u64) -> u64;

/// Whether a variant's output is frozen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stability {
    /// Output is part of the stable surface
    Stable,
    /// Output may still change; verified to catch regressions early
    Experimental,
}

/// One independently verifiable and benchmarkable hash implementation.
#[derive(Debug, Clone, Copy)]
pub struct VariantDef {
    /// Unique name, e.g. `t1ha1_64le`
    pub name: &'static str,
    /// The implementation
    pub hash: HashFn,
    /// Flags that select this variant (any one enabled is enough)
    pub selectors: FlagSet,
    /// Acceleration flags that must all be enabled
    pub requires: FlagSet,
    /// Capability tier needed to execute the variant at all
    pub tier: Option<AccelTier>,
    /// Frozen or experimental
    pub stability: Stability,
    /// Expected outputs, in canonical probe order; empty disables verification
    pub reference: &'static [u64],
}

impl VariantDef {
    /// Plain stable variant with no acceleration requirement
    pub const fn new(
        name: &'static str,
        hash: HashFn,
        selectors: FlagSet,
        reference: &'static [u64],
    ) -> Self {
        Self {
            name,
            hash,
            selectors,
            requires: FlagSet::EMPTY,
            tier: None,
            stability: Stability::Stable,
            reference,
        }
    }

    /// Mark the variant as not yet frozen
    #[must_use]
    pub const fn experimental(mut self) -> Self {
        self.stability = Stability::Experimental;
        self
    }

    /// Gate the variant behind an acceleration tier; `requires` must all be enabled
    #[must_use]
    pub const fn accelerated(mut self, tier: AccelTier, requires: FlagSet) -> Self {
        self.tier = Some(tier);
        self.requires = requires;
        self
    }

    /// Whether the variant's output is not yet frozen
    pub const fn is_experimental(&self) -> bool {
        matches!(self.stability, Stability::Experimental)
    }

    /// Whether this variant can execute on the current hardware
    pub fn is_runnable(&self, caps: &Capabilities) -> bool {
        self.tier.map_or(true, |tier| caps.is_available(tier))
    }

    /// Whether the variant takes part in the benchmark sweep.
    ///
    /// Any selector enabled, none of selectors or requirements disabled, every
    /// requirement enabled, and the tier available.
    pub fn is_selected(&self, enabled: FlagSet, disabled: FlagSet, caps: &Capabilities) -> bool {
        enabled.intersects(self.selectors)
            && !disabled.intersects(self.selectors | self.requires)
            && enabled.contains_all(self.requires)
            && self.is_runnable(caps)
    }
}

inventory::collect!(VariantDef);

/// Every variant linked into the binary, sorted by name.
pub fn registered_variants() -> Vec<&'static VariantDef> {
    let mut variants: Vec<_> = inventory::iter::<VariantDef>.into_iter().collect();
    variants.sort_by_key(|v| v.name);
    variants
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::caps::FixedProbe;
    use crate::flags::{Flag, Platform};

    fn zero(_: &[u8], _: u64) -> u64 {
        0
    }

    fn gen1_le() -> VariantDef {
        VariantDef::new(
            "gen1_64le",
            zero,
            FlagSet::from_flags(&[Flag::Gen1, Flag::Width64, Flag::LittleEndian]),
            &[],
        )
    }

    #[test]
    fn test_selection_any_enabled_none_disabled() {
        let caps = Capabilities::none();
        let v = gen1_le();

        assert!(v.is_selected(FlagSet::of(Flag::Gen1), FlagSet::EMPTY, &caps));
        assert!(v.is_selected(FlagSet::of(Flag::Width64), FlagSet::EMPTY, &caps));
        assert!(!v.is_selected(FlagSet::of(Flag::Gen0), FlagSet::EMPTY, &caps));
        assert!(!v.is_selected(
            FlagSet::of(Flag::Gen1),
            FlagSet::of(Flag::LittleEndian),
            &caps
        ));
    }

    #[test]
    fn test_default_profile_excludes_opposite_order() {
        let caps = Capabilities::none();
        let le64 = Platform {
            big_endian: false,
            wide_pointers: true,
        };
        let be = VariantDef::new(
            "gen1_64be",
            zero,
            FlagSet::from_flags(&[Flag::Gen1, Flag::Width64, Flag::BigEndian]),
            &[],
        );
        let disabled = le64.default_disabled();
        assert!(gen1_le().is_selected(FlagSet::DEFAULT, disabled, &caps));
        assert!(!be.is_selected(FlagSet::DEFAULT, disabled, &caps));
    }

    #[test]
    fn test_accelerated_selection() {
        let v = VariantDef::new("gen0_aes_avx2", zero, FlagSet::of(Flag::Aes), &[])
            .accelerated(AccelTier::Wide, FlagSet::of(Flag::Avx2));
        let wide = Capabilities::resolve(&FixedProbe::tier(AccelTier::Wide));
        let base = Capabilities::resolve(&FixedProbe::tier(AccelTier::Base));

        let enabled = FlagSet::from_flags(&[Flag::Aes, Flag::Avx2]);
        assert!(v.is_selected(enabled, FlagSet::EMPTY, &wide));
        assert!(!v.is_selected(enabled, FlagSet::EMPTY, &base));
        assert!(!v.is_selected(FlagSet::of(Flag::Aes), FlagSet::EMPTY, &wide));
        assert!(!v.is_selected(enabled, FlagSet::of(Flag::Avx2), &wide));
        assert!(v.is_runnable(&wide));
        assert!(!v.is_runnable(&base));
    }

    #[test]
    fn test_experimental_marker() {
        assert!(!gen1_le().is_experimental());
        assert!(gen1_le().experimental().is_experimental());
    }
}
