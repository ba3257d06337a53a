use std::time::{SystemTime, UNIX_EPOCH};

use tracing::debug;

use crate::collector::Occurrence;
use crate::error::RebindError;
use crate::scope::ScopeTree;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 1000;

const SUFFIX_DIGITS: usize = 4;

// -----------------------------------------------------------------------------
// Entropy
// -----------------------------------------------------------------------------

/// Randomness used to build synthetic names. The wall-clock source is what the
/// plugin runs with; tests and reproducible builds plug in a seeded one.
pub trait EntropySource {
    fn timestamp(&mut self) -> u64;
    fn next_u64(&mut self) -> u64;
}

pub struct Xorshift64 {
    state: u64,
}

impl Xorshift64 {
    pub fn new(seed: u64) -> Self {
        Self {
            state: if seed == 0 { 1 } else { seed },
        }
    }

    pub fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

pub struct SystemEntropy {
    rng: Xorshift64,
}

impl SystemEntropy {
    pub fn new() -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.subsec_nanos() as u64 ^ d.as_secs())
            .unwrap_or_default();
        Self {
            rng: Xorshift64::new(nanos),
        }
    }
}

impl Default for SystemEntropy {
    fn default() -> Self {
        Self::new()
    }
}

impl EntropySource for SystemEntropy {
    fn timestamp(&mut self) -> u64 {
        now_millis()
    }

    fn next_u64(&mut self) -> u64 {
        self.rng.next_u64()
    }
}

/// Deterministic source: a fixed timestamp and a seeded xorshift stream.
pub struct SeededEntropy {
    timestamp: u64,
    rng: Xorshift64,
}

impl SeededEntropy {
    pub fn new(seed: u64) -> Self {
        Self {
            timestamp: seed,
            rng: Xorshift64::new(seed),
        }
    }
}

impl EntropySource for SeededEntropy {
    fn timestamp(&mut self) -> u64 {
        self.timestamp
    }

    fn next_u64(&mut self) -> u64 {
        self.rng.next_u64()
    }
}

/// Low `SUFFIX_DIGITS` base-36 digits of `n`, zero padded.
pub fn base36_tail(mut n: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut out = [b'0'; SUFFIX_DIGITS];
    for slot in out.iter_mut().rev() {
        *slot = DIGITS[(n % 36) as usize];
        n /= 36;
    }
    out.iter().map(|&b| b as char).collect()
}

/// Eight base-36 characters: the clock tail followed by the random tail.
pub fn entropy_suffix(entropy: &mut dyn EntropySource) -> String {
    let time = base36_tail(entropy.timestamp());
    let rand = base36_tail(entropy.next_u64());
    format!("{time}{rand}")
}

// -----------------------------------------------------------------------------
// Namer
// -----------------------------------------------------------------------------

pub struct SyntheticNamer {
    entropy: Box<dyn EntropySource>,
    max_attempts: u32,
}

impl SyntheticNamer {
    pub fn new(entropy: Box<dyn EntropySource>) -> Self {
        Self {
            entropy,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub(crate) fn entropy(&mut self) -> &mut dyn EntropySource {
        self.entropy.as_mut()
    }

    /// Picks `_<target>_<suffix>` such that no scope visible from any of
    /// `occurrences` already binds it.
    pub fn choose(
        &mut self,
        target: &str,
        occurrences: &[Occurrence],
        scopes: &ScopeTree,
    ) -> Result<String, RebindError> {
        for _ in 0..self.max_attempts {
            let candidate = format!("_{target}_{}", entropy_suffix(self.entropy.as_mut()));
            let taken = occurrences
                .iter()
                .any(|o| scopes.has_binding(o.scope, &candidate));
            if !taken {
                return Ok(candidate);
            }
            debug!(global = target, candidate = %candidate, "synthetic name already bound, retrying");
        }
        Err(RebindError::NameSearchExhausted {
            name: target.to_string(),
            attempts: self.max_attempts,
        })
    }
}

impl Default for SyntheticNamer {
    fn default() -> Self {
        Self::new(Box::new(SystemEntropy::new()))
    }
}
