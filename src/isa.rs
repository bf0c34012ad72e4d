//! CPU feature probing and one-time selection of the vector code path.
//!
//! The probe runs once per process; every transcode afterwards dispatches on
//! the cached tier, so the hot loops carry no per-byte feature branches.

use once_cell::sync::Lazy;

/// The instruction-set tiers the transcoder has code paths for, in
/// increasing order of capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Isa {
    Baseline,
    Sse2,
    Sse42,
    Avx2,
    Avx512bw,
}

impl Isa {
    /// A short human-readable name for the tier.
    pub fn name(self) -> &'static str {
        match self {
            Isa::Baseline => "baseline",
            Isa::Sse2 => "SSE2",
            Isa::Sse42 => "SSE4.2",
            Isa::Avx2 => "AVX2",
            Isa::Avx512bw => "AVX-512BW",
        }
    }
}

static BEST: Lazy<Isa> = Lazy::new(detect);

/// The best tier supported by this process, resolved once.
#[inline]
pub fn best() -> Isa {
    *BEST
}

fn detect() -> Isa {
    let probed = probe();
    match cap_from_env() {
        Some(cap) if cap < probed => cap,
        _ => probed,
    }
}

#[cfg(target_arch = "x86_64")]
fn probe() -> Isa {
    if is_x86_feature_detected!("avx512bw") {
        Isa::Avx512bw
    } else if is_x86_feature_detected!("avx2") {
        Isa::Avx2
    } else if is_x86_feature_detected!("sse4.2") {
        Isa::Sse42
    } else if is_x86_feature_detected!("sse2") {
        Isa::Sse2
    } else {
        Isa::Baseline
    }
}

#[cfg(not(target_arch = "x86_64"))]
fn probe() -> Isa {
    Isa::Baseline
}

// `BSON2JSON_ISA` caps the selected tier, so output identity across tiers
// can be exercised on a single machine. Unrecognized values are ignored.
fn cap_from_env() -> Option<Isa> {
    match std::env::var("BSON2JSON_ISA").ok()?.as_str() {
        "baseline" => Some(Isa::Baseline),
        "sse2" => Some(Isa::Sse2),
        "sse4.2" => Some(Isa::Sse42),
        "avx2" => Some(Isa::Avx2),
        "avx-512bw" => Some(Isa::Avx512bw),
        _ => None,
    }
}
