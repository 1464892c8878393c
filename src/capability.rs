//! DSP capability detection.
//!
//! The scalar path is always correct and always compiled in as the
//! reference; SIMD kernels (gated behind the `simd` feature) are only
//! dispatched to once this module confirms the host CPU actually supports
//! them. Detection runs once per process and is cached, mirroring the
//! `OnceLock`-based SIMD-support detection used elsewhere in this crate
//! family.

use std::sync::OnceLock;

/// A DSP execution path the encoder can dispatch to.
///
/// Variants are listed in ascending order of capability; [`Capability::best`]
/// resolves to the richest variant the host actually supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Capability {
    /// Portable scalar implementation. Always available.
    Scalar,
    /// x86_64 SSE2 f32 kernels.
    SseF32,
    /// x86_64 AVX2 f32 kernels.
    AvxF32,
    /// AArch64 NEON f32 kernels.
    NeonF32,
}

impl Capability {
    /// Whether this capability requires the `simd` feature and host support.
    pub fn is_simd(self) -> bool {
        !matches!(self, Capability::Scalar)
    }
}

static DETECTED: OnceLock<Capability> = OnceLock::new();

fn detect() -> Capability {
    #[cfg(all(feature = "simd", target_arch = "x86_64"))]
    {
        if is_x86_feature_detected!("avx2") {
            return Capability::AvxF32;
        }
        if is_x86_feature_detected!("sse2") {
            return Capability::SseF32;
        }
    }
    #[cfg(all(feature = "simd", target_arch = "aarch64"))]
    {
        if std::arch::is_aarch64_feature_detected!("neon") {
            return Capability::NeonF32;
        }
    }
    Capability::Scalar
}

/// Detects and caches the best [`Capability`] for the host this process is
/// running on. Safe to call repeatedly; only the first call does any work.
pub fn detect_best() -> Capability {
    *DETECTED.get_or_init(detect)
}

/// Runs capability detection eagerly, logging the result. Call once during
/// encoder construction rather than paying the (cheap, but non-zero) cost
/// on the first DSP call.
pub fn init() {
    let cap = detect_best();
    tracing::info!(capability = ?cap, "DSP capability detected");
}

/// Resolves a capability override (from [`crate::config::EncoderConfig`])
/// against what the host actually supports, falling back to scalar when the
/// override is unsupported or the `simd` feature is disabled.
pub fn resolve(requested: Option<Capability>) -> Capability {
    match requested {
        None => detect_best(),
        Some(Capability::Scalar) => Capability::Scalar,
        Some(wanted) => {
            if cfg!(feature = "simd") && detect_best() >= wanted {
                wanted
            } else {
                Capability::Scalar
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_is_always_available() {
        assert!(!Capability::Scalar.is_simd());
    }

    #[test]
    fn detect_best_is_cached() {
        let a = detect_best();
        let b = detect_best();
        assert_eq!(a, b);
    }

    #[test]
    fn resolve_none_matches_detect_best() {
        assert_eq!(resolve(None), detect_best());
    }

    #[test]
    fn resolve_scalar_override_is_always_scalar() {
        assert_eq!(resolve(Some(Capability::Scalar)), Capability::Scalar);
    }

    #[test]
    fn resolve_unsupported_override_falls_back_to_scalar_without_simd_feature() {
        if !cfg!(feature = "simd") {
            assert_eq!(resolve(Some(Capability::AvxF32)), Capability::Scalar);
        }
    }

    #[test]
    fn ordering_places_scalar_lowest() {
        assert!(Capability::Scalar < Capability::SseF32);
        assert!(Capability::SseF32 < Capability::AvxF32);
    }
}
