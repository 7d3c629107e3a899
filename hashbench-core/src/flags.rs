//! Feature Registry
//!
//! Every benchmarkable selector, size class and behavioural switch is one bit
//! in a [`FlagSet`]. Two independent sets (enabled and disabled) describe a run;
//! nothing here decides precedence between them, that is the resolver's job.

use std::fmt;

/// A single named option flag.
///
/// The discriminant is the bit position; no two flags share a bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Flag {
    /// Print every probe while verifying
    TestVerbose = 0,
    /// Print calibration and sampling details while benchmarking
    BenchVerbose = 1,
    /// Generation 0 functions
    Gen0 = 2,
    /// Generation 1 functions
    Gen1 = 3,
    /// Generation 2 functions
    Gen2 = 4,
    /// Little-endian targets
    LittleEndian = 5,
    /// Big-endian targets
    BigEndian = 6,
    /// 32-bit targets
    Width32 = 7,
    /// 64-bit targets
    Width64 = 8,
    /// AES-NI accelerated functions
    Aes = 9,
    /// AES-NI functions using AVX
    Avx = 10,
    /// AES-NI functions using AVX2
    Avx2 = 11,
    /// Marker: the acceleration group was asked for explicitly
    UserWantsAes = 12,
    /// 5-byte keys
    Tiny = 13,
    /// 31-byte keys
    Small = 14,
    /// 1 KiB keys
    Medium = 15,
    /// 16 KiB keys
    Large = 16,
    /// 256 KiB keys
    Huge = 17,
}

/// Which part of the configuration word a flag belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    /// Output verbosity switches
    Verbosity,
    /// Function-variant selectors
    Function,
    /// Input size classes
    Size,
    /// Bookkeeping bits that select nothing by themselves
    Marker,
}

impl Flag {
    /// All flags in bit order.
    pub const ALL: [Flag; 18] = [
        Flag::TestVerbose,
        Flag::BenchVerbose,
        Flag::Gen0,
        Flag::Gen1,
        Flag::Gen2,
        Flag::LittleEndian,
        Flag::BigEndian,
        Flag::Width32,
        Flag::Width64,
        Flag::Aes,
        Flag::Avx,
        Flag::Avx2,
        Flag::UserWantsAes,
        Flag::Tiny,
        Flag::Small,
        Flag::Medium,
        Flag::Large,
        Flag::Huge,
    ];

    /// Flags reachable through a generic `--<name>` / `--no-<name>` token pair.
    pub const PAIRED: [Flag; 12] = [
        Flag::Gen0,
        Flag::Gen1,
        Flag::Gen2,
        Flag::LittleEndian,
        Flag::BigEndian,
        Flag::Width32,
        Flag::Width64,
        Flag::Tiny,
        Flag::Small,
        Flag::Medium,
        Flag::Large,
        Flag::Huge,
    ];

    /// Bit mask of this flag
    #[inline]
    pub const fn bit(self) -> u32 {
        1u32 << (self as u8)
    }

    /// Category this flag belongs to
    pub const fn category(self) -> Category {
        match self {
            Flag::TestVerbose | Flag::BenchVerbose => Category::Verbosity,
            Flag::Tiny | Flag::Small | Flag::Medium | Flag::Large | Flag::Huge => Category::Size,
            Flag::UserWantsAes => Category::Marker,
            _ => Category::Function,
        }
    }

    /// Canonical name, also the `<name>` part of paired command-line tokens.
    pub const fn name(self) -> &'static str {
        match self {
            Flag::TestVerbose => "test-verbose",
            Flag::BenchVerbose => "bench-verbose",
            Flag::Gen0 => "0",
            Flag::Gen1 => "1",
            Flag::Gen2 => "2",
            Flag::LittleEndian => "le",
            Flag::BigEndian => "be",
            Flag::Width32 => "32",
            Flag::Width64 => "64",
            Flag::Aes => "aes",
            Flag::Avx => "avx",
            Flag::Avx2 => "avx2",
            Flag::UserWantsAes => "user-wants-aes",
            Flag::Tiny => "tiny",
            Flag::Small => "small",
            Flag::Medium => "medium",
            Flag::Large => "large",
            Flag::Huge => "huge",
        }
    }

    /// Look up a paired flag by its token name (`"le"`, `"tiny"`, ...).
    pub fn from_paired_name(name: &str) -> Option<Flag> {
        Flag::PAIRED.iter().copied().find(|f| f.name() == name)
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A configuration word: a set of [`Flag`]s.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct FlagSet(u32);

impl FlagSet {
    /// No flags
    pub const EMPTY: Self = Self(0);

    /// Both verbosity switches
    pub const VERBOSITY: Self = Self(Flag::TestVerbose.bit() | Flag::BenchVerbose.bit());

    /// Acceleration group: every accelerated selector plus the explicit-request marker
    pub const ACCELERATION: Self = Self(
        Flag::Aes.bit() | Flag::Avx.bit() | Flag::Avx2.bit() | Flag::UserWantsAes.bit(),
    );

    /// Every function-variant selector
    pub const FUNCTIONS: Self = Self(
        Flag::Gen0.bit()
            | Flag::Gen1.bit()
            | Flag::Gen2.bit()
            | Flag::LittleEndian.bit()
            | Flag::BigEndian.bit()
            | Flag::Width32.bit()
            | Flag::Width64.bit()
            | Flag::Aes.bit()
            | Flag::Avx.bit()
            | Flag::Avx2.bit(),
    );

    /// Every size class
    pub const SIZES: Self = Self(
        Flag::Tiny.bit()
            | Flag::Small.bit()
            | Flag::Medium.bit()
            | Flag::Large.bit()
            | Flag::Huge.bit(),
    );

    /// Every defined flag
    pub const ALL: Self = Self((1u32 << Flag::ALL.len()) - 1);

    /// Reasonable defaults when no arguments are given
    pub const DEFAULT: Self = Self(
        Flag::Gen0.bit()
            | Flag::Gen1.bit()
            | Flag::Gen2.bit()
            | Flag::Tiny.bit()
            | Flag::Medium.bit(),
    );

    /// Set holding exactly one flag
    #[inline]
    pub const fn of(flag: Flag) -> Self {
        Self(flag.bit())
    }

    /// Build a set from a slice of flags
    pub const fn from_flags(flags: &[Flag]) -> Self {
        let mut bits = 0u32;
        let mut i = 0;
        while i < flags.len() {
            bits |= flags[i].bit();
            i += 1;
        }
        Self(bits)
    }

    /// Raw bits, in [`Flag`] bit order
    #[inline]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Rebuild from raw bits; undefined bits are dropped.
    #[inline]
    pub const fn from_bits_truncate(bits: u32) -> Self {
        Self(bits & Self::ALL.0)
    }

    /// Whether `flag` is a member
    #[inline]
    pub const fn contains(self, flag: Flag) -> bool {
        self.0 & flag.bit() != 0
    }

    /// Whether every member of `other` is also a member of `self`
    #[inline]
    pub const fn contains_all(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether the two sets share any member
    #[inline]
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// Whether the set is empty
    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Members of either set
    #[inline]
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Members of both sets
    #[inline]
    #[must_use]
    pub const fn intersection(self, other: Self) -> Self {
        Self(self.0 & other.0)
    }

    /// Members of `self` that are not in `other`
    #[inline]
    #[must_use]
    pub const fn difference(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }

    /// Every defined flag not in `self`
    #[inline]
    #[must_use]
    pub const fn complement(self) -> Self {
        Self(!self.0 & Self::ALL.0)
    }

    /// Add a flag
    #[inline]
    pub fn insert(&mut self, flag: Flag) {
        self.0 |= flag.bit();
    }

    /// Remove a flag
    #[inline]
    pub fn remove(&mut self, flag: Flag) {
        self.0 &= !flag.bit();
    }

    /// Number of members
    #[inline]
    pub const fn len(self) -> u32 {
        self.0.count_ones()
    }

    /// Members in bit order
    pub fn iter(self) -> impl Iterator<Item = Flag> {
        Flag::ALL.into_iter().filter(move |f| self.contains(*f))
    }
}

impl From<Flag> for FlagSet {
    fn from(flag: Flag) -> Self {
        Self::of(flag)
    }
}

impl FromIterator<Flag> for FlagSet {
    fn from_iter<I: IntoIterator<Item = Flag>>(iter: I) -> Self {
        iter.into_iter().fold(Self::EMPTY, |set, f| set | f.into())
    }
}

impl std::ops::BitOr for FlagSet {
    type Output = Self;

    #[inline]
    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl std::ops::BitOrAssign for FlagSet {
    #[inline]
    fn bitor_assign(&mut self, rhs: Self) {
        *self = self.union(rhs);
    }
}

impl std::ops::BitAnd for FlagSet {
    type Output = Self;

    #[inline]
    fn bitand(self, rhs: Self) -> Self {
        self.intersection(rhs)
    }
}

impl std::ops::BitAndAssign for FlagSet {
    #[inline]
    fn bitand_assign(&mut self, rhs: Self) {
        *self = self.intersection(rhs);
    }
}

impl std::ops::Sub for FlagSet {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self {
        self.difference(rhs)
    }
}

impl std::ops::SubAssign for FlagSet {
    #[inline]
    fn sub_assign(&mut self, rhs: Self) {
        *self = self.difference(rhs);
    }
}

impl fmt::Debug for FlagSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl fmt::Display for FlagSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("(none)");
        }
        for (i, flag) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str(flag.name())?;
        }
        Ok(())
    }
}

/// Byte order and pointer width of the host, which pick the default exclusions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Platform {
    /// Target is big-endian
    pub big_endian: bool,
    /// Pointers are wider than 32 bits
    pub wide_pointers: bool,
}

impl Platform {
    /// The platform this binary was compiled for
    pub const fn current() -> Self {
        Self {
            big_endian: cfg!(target_endian = "big"),
            wide_pointers: cfg!(target_pointer_width = "64"),
        }
    }

    /// Exclusions applied when the harness runs without arguments:
    /// the opposite byte order, and 32-bit targets on wide-pointer hosts.
    pub const fn default_disabled(self) -> FlagSet {
        let order = if self.big_endian {
            FlagSet::of(Flag::LittleEndian)
        } else {
            FlagSet::of(Flag::BigEndian)
        };
        if self.wide_pointers {
            order.union(FlagSet::of(Flag::Width32))
        } else {
            order
        }
    }
}

impl Default for Platform {
    fn default() -> Self {
        Self::current()
    }
}

/// Input-length bucket used to structure the benchmark sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SizeClass {
    /// 5 bytes
    Tiny,
    /// 31 bytes
    Small,
    /// 1 KiB
    Medium,
    /// 16 KiB
    Large,
    /// 256 KiB
    Huge,
}

impl SizeClass {
    /// All size classes in ascending order
    pub const ALL: [SizeClass; 5] = [
        SizeClass::Tiny,
        SizeClass::Small,
        SizeClass::Medium,
        SizeClass::Large,
        SizeClass::Huge,
    ];

    /// Key length in bytes
    pub const fn bytes(self) -> usize {
        match self {
            SizeClass::Tiny => 5,
            SizeClass::Small => 31,
            SizeClass::Medium => 1024,
            SizeClass::Large => 1024 * 16,
            SizeClass::Huge => 1024 * 256,
        }
    }

    /// Flag that enables this class
    pub const fn flag(self) -> Flag {
        match self {
            SizeClass::Tiny => Flag::Tiny,
            SizeClass::Small => Flag::Small,
            SizeClass::Medium => Flag::Medium,
            SizeClass::Large => Flag::Large,
            SizeClass::Huge => Flag::Huge,
        }
    }

    /// Caption used in report headers
    pub const fn caption(self) -> &'static str {
        self.flag().name()
    }

    /// Enabled classes, ascending
    pub fn enabled_in(set: FlagSet) -> impl Iterator<Item = SizeClass> {
        SizeClass::ALL
            .into_iter()
            .filter(move |class| set.contains(class.flag()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bits_are_orthogonal() {
        let mut seen = 0u32;
        for flag in Flag::ALL {
            assert_eq!(seen & flag.bit(), 0, "{} shares a bit", flag);
            seen |= flag.bit();
        }
        assert_eq!(seen, FlagSet::ALL.bits());
    }

    #[test]
    fn test_categories_partition_all_flags() {
        let union = FlagSet::VERBOSITY | FlagSet::FUNCTIONS | FlagSet::SIZES;
        assert_eq!(union | Flag::UserWantsAes.into(), FlagSet::ALL);
        assert!(!FlagSet::FUNCTIONS.intersects(FlagSet::SIZES));
        assert!(!FlagSet::FUNCTIONS.intersects(FlagSet::VERBOSITY));
        for flag in FlagSet::SIZES.iter() {
            assert_eq!(flag.category(), Category::Size);
        }
        for flag in FlagSet::FUNCTIONS.iter() {
            assert_eq!(flag.category(), Category::Function);
        }
    }

    #[test]
    fn test_default_profile() {
        assert_eq!(
            FlagSet::DEFAULT,
            FlagSet::from_flags(&[Flag::Gen0, Flag::Gen1, Flag::Gen2, Flag::Tiny, Flag::Medium])
        );
    }

    #[test]
    fn test_platform_default_exclusions() {
        let le64 = Platform {
            big_endian: false,
            wide_pointers: true,
        };
        assert_eq!(
            le64.default_disabled(),
            FlagSet::from_flags(&[Flag::BigEndian, Flag::Width32])
        );

        let be32 = Platform {
            big_endian: true,
            wide_pointers: false,
        };
        assert_eq!(be32.default_disabled(), FlagSet::of(Flag::LittleEndian));
    }

    #[test]
    fn test_paired_lookup() {
        assert_eq!(Flag::from_paired_name("le"), Some(Flag::LittleEndian));
        assert_eq!(Flag::from_paired_name("huge"), Some(Flag::Huge));
        assert_eq!(Flag::from_paired_name("aes"), None);
        assert_eq!(Flag::from_paired_name("test-verbose"), None);
    }

    #[test]
    fn test_size_classes_ascending() {
        let sizes: Vec<usize> = SizeClass::ALL.iter().map(|c| c.bytes()).collect();
        assert_eq!(sizes, vec![5, 31, 1024, 16384, 262144]);

        let enabled = FlagSet::from_flags(&[Flag::Huge, Flag::Tiny, Flag::Gen0]);
        let classes: Vec<_> = SizeClass::enabled_in(enabled).collect();
        assert_eq!(classes, vec![SizeClass::Tiny, SizeClass::Huge]);
    }

    #[test]
    fn test_display() {
        let set = FlagSet::from_flags(&[Flag::Gen2, Flag::Tiny]);
        assert_eq!(set.to_string(), "2, tiny");
        assert_eq!(FlagSet::EMPTY.to_string(), "(none)");
    }

    #[test]
    fn test_complement_stays_in_range() {
        let set = FlagSet::VERBOSITY.complement();
        assert!(!set.intersects(FlagSet::VERBOSITY));
        assert_eq!(set | FlagSet::VERBOSITY, FlagSet::ALL);
    }

    #[cfg(not(miri))]
    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn flag_set() -> impl Strategy<Value = FlagSet> {
            any::<u32>().prop_map(FlagSet::from_bits_truncate)
        }

        proptest! {
            #[test]
            fn iteration_rebuilds_the_set(set in flag_set()) {
                let rebuilt: FlagSet = set.iter().collect();
                prop_assert_eq!(rebuilt, set);
                prop_assert_eq!(set.iter().count() as u32, set.len());
                prop_assert!(FlagSet::ALL.contains_all(set));
            }

            #[test]
            fn set_algebra_laws(a in flag_set(), b in flag_set()) {
                prop_assert_eq!((a | b) - b, a - b);
                prop_assert_eq!(a & b, b & a);
                prop_assert!(!(a - b).intersects(b));
                prop_assert_eq!((a | b).complement(), a.complement() & b.complement());
                prop_assert_eq!(a.intersects(b), !(a & b).is_empty());
                prop_assert_eq!(a.contains_all(b), (b - a).is_empty());
            }

            #[test]
            fn enabled_sizes_are_ascending(set in flag_set()) {
                let bytes: Vec<usize> = SizeClass::enabled_in(set).map(|c| c.bytes()).collect();
                prop_assert!(bytes.windows(2).all(|w| w[0] < w[1]));
                prop_assert_eq!(bytes.len() as u32, (set & FlagSet::SIZES).len());
            }
        }
    }
}
