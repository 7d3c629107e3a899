//! Minimal harness binary
//!
//! Registers seeded FNV-1a as a stand-in variant to show the wiring.
//!
//! Run with:
//!   cargo run --release --example fnv1a                 # verify, then benchmark defaults
//!   cargo run --release --example fnv1a -- --all-sizes  # every key size
//!   cargo run --example fnv1a -- --test-only -v         # verify only, per-probe detail
//!   cargo run --example fnv1a -- --help                 # show all options

use hashbench::{Flag, FlagSet, VariantDef};
use std::process::ExitCode;

const FNV_OFFSET: u64 = 0xCBF2_9CE4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01B3;

static FNV1A64_REFERENCE: [u64; hashbench::PROBE_COUNT] = include!("../tests/fnv1a64.in");

fn fnv1a64(data: &[u8], seed: u64) -> u64 {
    data.iter().fold(FNV_OFFSET ^ seed, |h, &b| {
        (h ^ u64::from(b)).wrapping_mul(FNV_PRIME)
    })
}

/// Same function, registered as not yet frozen to show the marker.
fn fnv1a64_next(data: &[u8], seed: u64) -> u64 {
    fnv1a64(data, seed)
}

hashbench::register_variant! {
    VariantDef::new(
        "fnv1a64",
        fnv1a64,
        FlagSet::from_flags(&[Flag::Gen0, Flag::Width64]),
        &FNV1A64_REFERENCE,
    ),
    VariantDef::new(
        "fnv1a64_next",
        fnv1a64_next,
        FlagSet::from_flags(&[Flag::Gen2, Flag::Width64]),
        &FNV1A64_REFERENCE,
    )
    .experimental(),
}

fn main() -> ExitCode {
    hashbench::run()
}
