//! Option Resolver
//!
//! Folds the command-line tokens left to right into two independent flag
//! sets: what was explicitly enabled and what was explicitly disabled. Token
//! order matters; `--test-only` and `--bench-all` are destructive.

use hashbench_core::{Capabilities, Flag, FlagSet, Platform};
use tracing::debug;

/// A recognised command-line token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    /// `--test-only` / `--no-bench`
    TestOnly,
    /// `--test-verbose`
    TestVerbose,
    /// `--bench-verbose`
    BenchVerbose,
    /// `--verbose` / `-v`
    Verbose,
    /// `--bench-all`
    BenchAll,
    /// `--all-funcs`
    AllFuncs,
    /// `--all-sizes`
    AllSizes,
    /// `--aes`
    Aes,
    /// `--no-aes`
    NoAes,
    /// `--<name>` for a paired flag
    Enable(Flag),
    /// `--no-<name>` for a paired flag
    Disable(Flag),
    /// `--help` / `-h`
    Help,
}

impl Token {
    /// Recognise `arg`, or `None` for an unknown token
    pub fn parse(arg: &str) -> Option<Token> {
        let token = match arg {
            "--test-only" | "--no-bench" => Token::TestOnly,
            "--test-verbose" => Token::TestVerbose,
            "--bench-verbose" => Token::BenchVerbose,
            "--verbose" | "-v" => Token::Verbose,
            "--bench-all" => Token::BenchAll,
            "--all-funcs" => Token::AllFuncs,
            "--all-sizes" => Token::AllSizes,
            "--aes" => Token::Aes,
            "--no-aes" => Token::NoAes,
            "--help" | "-h" => Token::Help,
            _ => {
                if let Some(name) = arg.strip_prefix("--no-") {
                    return Flag::from_paired_name(name).map(Token::Disable);
                }
                let name = arg.strip_prefix("--")?;
                return Flag::from_paired_name(name).map(Token::Enable);
            }
        };
        Some(token)
    }
}

/// The two configuration words produced by the resolver
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Explicitly enabled flags, with empty categories backfilled from the defaults
    pub enabled: FlagSet,
    /// Explicitly disabled flags
    pub disabled: FlagSet,
    /// `--test-only` was the last word on benchmarking
    pub tests_only: bool,
    /// Tokens accepted but ignored, e.g. `--no-aes` without acceleration
    pub ignored: Vec<String>,
}

impl Resolution {
    /// The profile used when no arguments are given
    pub fn defaults(platform: Platform) -> Self {
        Self {
            enabled: FlagSet::DEFAULT,
            disabled: platform.default_disabled(),
            tests_only: false,
            ignored: Vec::new(),
        }
    }

    fn empty() -> Self {
        Self {
            enabled: FlagSet::EMPTY,
            disabled: FlagSet::EMPTY,
            tests_only: false,
            ignored: Vec::new(),
        }
    }

    fn apply(&mut self, token: Token, availability: FlagSet) {
        match token {
            Token::TestOnly => {
                self.enabled &= FlagSet::of(Flag::TestVerbose);
                self.tests_only = true;
            }
            Token::TestVerbose => self.enabled.insert(Flag::TestVerbose),
            Token::BenchVerbose => self.enabled.insert(Flag::BenchVerbose),
            Token::Verbose => self.enabled |= FlagSet::VERBOSITY,
            Token::BenchAll => {
                self.enabled |= FlagSet::ALL - FlagSet::VERBOSITY;
                self.disabled = FlagSet::EMPTY;
                self.tests_only = false;
            }
            Token::AllFuncs => {
                self.enabled |= FlagSet::FUNCTIONS;
                self.disabled -= FlagSet::FUNCTIONS;
            }
            Token::AllSizes => {
                self.enabled |= FlagSet::SIZES;
                self.disabled -= FlagSet::SIZES;
            }
            // Unavailable acceleration is handled by the caller before apply.
            Token::Aes => self.enabled |= availability,
            Token::NoAes => {
                self.enabled -= availability;
                self.disabled |= availability;
            }
            Token::Enable(flag) => self.enabled.insert(flag),
            Token::Disable(flag) => {
                self.enabled.remove(flag);
                self.disabled.insert(flag);
            }
            Token::Help => {}
        }
    }

    fn backfill(&mut self) {
        for category in [FlagSet::FUNCTIONS, FlagSet::SIZES] {
            if !self.enabled.intersects(category) {
                self.enabled |= FlagSet::DEFAULT & category;
            }
        }
    }
}

/// What the resolver decided
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    /// Continue with these configuration words
    Run(Resolution),
    /// `--help` was seen; remaining tokens were not examined
    Help,
    /// An unrecognised token
    Unknown {
        /// The offending token
        token: String,
    },
    /// `--aes` without any usable acceleration; parsing stopped here
    AccelUnavailable {
        /// The offending token
        token: String,
    },
}

/// Fold `args` (without the program name) into configuration words.
///
/// `caps` supplies the Availability Set consulted by `--aes` / `--no-aes`.
pub fn resolve<S: AsRef<str>>(args: &[S], caps: &Capabilities, platform: Platform) -> Resolved {
    if args.is_empty() {
        return Resolved::Run(Resolution::defaults(platform));
    }

    let availability = caps.availability_set();
    let mut resolution = Resolution::empty();

    for arg in args {
        let arg = arg.as_ref();
        let Some(token) = Token::parse(arg) else {
            return Resolved::Unknown {
                token: arg.to_string(),
            };
        };
        match token {
            Token::Help => return Resolved::Help,
            Token::Aes if availability.is_empty() => {
                return Resolved::AccelUnavailable {
                    token: arg.to_string(),
                };
            }
            Token::NoAes if availability.is_empty() => {
                resolution.ignored.push(arg.to_string());
                continue;
            }
            _ => {}
        }
        resolution.apply(token, availability);
    }

    resolution.backfill();
    debug!(
        enabled = %resolution.enabled,
        disabled = %resolution.disabled,
        tests_only = resolution.tests_only,
        "resolved options"
    );
    Resolved::Run(resolution)
}

/// Whether any token asks for verbose output, used before resolution to pick a log level.
pub fn wants_verbose<S: AsRef<str>>(args: &[S]) -> bool {
    args.iter().any(|a| {
        matches!(
            Token::parse(a.as_ref()),
            Some(Token::Verbose | Token::TestVerbose | Token::BenchVerbose)
        )
    })
}
