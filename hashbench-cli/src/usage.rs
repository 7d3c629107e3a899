//! Usage text

use hashbench_core::Capabilities;

const GENERIC: &str = "\
By default                  - run reasonable tests and benchmarks
                              for current platform
Generic options:
  --test-only, --no-bench   - just run tests, but don't benchmark
  --test-verbose            - be verbose while testing
  --bench-verbose           - be verbose while benchmarking
  --verbose, -v             - turn on both --test-verbose
                              and --bench-verbose
  --bench-all               - benchmark every variant and key size,
                              dropping all previous exclusions
  --help, -h                - show this help and exit
Keys size choices:
  --tiny, --no-tiny         - include/exclude 5 bytes, i.e tiny keys
  --small, --no-small       - include/exclude 31 bytes, i.e small keys
  --medium, --no-medium     - include/exclude 1K, i.e medium keys
  --large, --no-large       - include/exclude 16K, i.e large keys
  --huge, --no-huge         - include/exclude 256K, i.e huge keys
  --all-sizes               - run benchmark for all sizes of keys
  --all-funcs               - run benchmark for all functions

Functions choices:
  --0, --no-0               - include/exclude generation 0 variants
  --1, --no-1               - include/exclude generation 1 variants
  --2, --no-2               - include/exclude generation 2 variants
  --32, --no-32             - include/exclude 32-bit targets
  --64, --no-64             - include/exclude 64-bit targets
  --le, --no-le             - include/exclude little-endian targets
  --be, --no-be             - include/exclude big-endian targets
";

const ACCELERATION: &str = "\
  --aes, --no-aes           - include/exclude AES-NI accelerated variants,
                              including the AVX and AVX2 flavours
";

/// Render the usage text. The acceleration lines appear only when the
/// acceleration family exists on this target.
pub fn usage(caps: &Capabilities) -> String {
    let mut text = String::from(GENERIC);
    if caps.family_compiled() {
        text.push_str(ACCELERATION);
    }
    text
}
