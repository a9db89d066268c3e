//! Integer samplers used for polynomial generation and trapdoor sampling.
//!
//! Every sampler takes the RNG as an explicit argument; nothing in this crate
//! draws from a process-wide source, so seeding a `ChaCha20Rng` makes the
//! whole pipeline reproducible.

use rand::{CryptoRng, Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;

use crate::error::{DcrtError, Result};

/// Number of standard deviations kept on each side of the center.
pub const TAILCUT: f64 = 6.0;

/// Named coefficient distributions for polynomial generation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Distribution {
    /// Uniform over {0, 1}
    Binary,
    /// Uniform over Z_q in every tower independently
    Uniform,
    /// Discrete Gaussian over Z with the given standard deviation
    Gaussian { sigma: f64 },
    /// Uniform over {-1, 0, 1}
    Ternary,
}

/// Deterministic RNG for tests and reproducible runs.
pub fn seeded_rng(seed: u64) -> ChaCha20Rng {
    ChaCha20Rng::seed_from_u64(seed)
}

/// Discrete Gaussian sampler over Z by rejection from a tail-cut window.
///
/// The density at x is proportional to exp(-(x - c)² / (2σ²)). Centers may
/// be arbitrary reals, which the gadget sampler needs.
#[derive(Clone, Debug)]
pub struct DiscreteGaussianSampler {
    sigma: f64,
}

impl DiscreteGaussianSampler {
    /// # Errors
    /// `InvalidParameters` when σ is not a finite positive number.
    pub fn new(sigma: f64) -> Result<Self> {
        if !sigma.is_finite() || sigma <= 0.0 {
            return Err(DcrtError::InvalidParameters(format!(
                "Gaussian standard deviation must be positive and finite, got {}",
                sigma
            )));
        }
        Ok(Self { sigma })
    }

    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    /// One sample centered at zero.
    pub fn sample<R: RngCore + CryptoRng>(&self, rng: &mut R) -> i64 {
        sample_integer(rng, 0.0, self.sigma)
    }

    /// `len` independent samples centered at zero.
    pub fn sample_vec<R: RngCore + CryptoRng>(&self, rng: &mut R, len: usize) -> Vec<i64> {
        (0..len).map(|_| self.sample(rng)).collect()
    }
}

/// One sample from D_{Z, center, sigma}.
///
/// Callers guarantee `sigma > 0`. The window [⌊c - 6σ⌋, ⌈c + 6σ⌉] always
/// contains round(c).
pub fn sample_integer<R: RngCore + CryptoRng>(rng: &mut R, center: f64, sigma: f64) -> i64 {
    let lo = (center - TAILCUT * sigma).floor() as i64;
    let hi = (center + TAILCUT * sigma).ceil() as i64;
    let two_sigma_sq = 2.0 * sigma * sigma;
    // Acceptance is scaled so the integer nearest the center is always kept.
    let nearest = center - center.round();
    let offset = nearest * nearest;
    loop {
        let x = rng.gen_range(lo..=hi);
        let d = x as f64 - center;
        let accept = (-(d * d - offset) / two_sigma_sq).exp();
        if rng.gen::<f64>() < accept {
            return x;
        }
    }
}

/// Uniform residues in [0, q).
pub fn sample_uniform_mod<R: RngCore + CryptoRng>(rng: &mut R, q: u64, len: usize) -> Vec<u64> {
    (0..len).map(|_| rng.gen_range(0..q)).collect()
}

/// Small signed coefficients for the non-uniform distributions.
///
/// # Returns
/// * `Result<Vec<i64>>` - `len` samples, or `InvalidParameters` for
///   `Distribution::Uniform`, which has no integer-valued form
pub fn sample_small<R: RngCore + CryptoRng>(
    rng: &mut R,
    distribution: Distribution,
    len: usize,
) -> Result<Vec<i64>> {
    match distribution {
        Distribution::Binary => Ok((0..len).map(|_| rng.gen_range(0..=1)).collect()),
        Distribution::Ternary => Ok((0..len).map(|_| rng.gen_range(-1..=1)).collect()),
        Distribution::Gaussian { sigma } => {
            let sampler = DiscreteGaussianSampler::new(sigma)?;
            Ok(sampler.sample_vec(rng, len))
        }
        Distribution::Uniform => Err(DcrtError::InvalidParameters(
            "Uniform distribution is sampled per tower, not as small integers".to_string(),
        )),
    }
}
