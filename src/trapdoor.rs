/// RLWE trapdoor generation and Gaussian preimage sampling
///
/// Generation produces a public matrix A together with a secret pair (R, E)
/// of Gaussian matrices such that
///
/// ```text
/// A = [I_d | Ā | G - (Ā·R + E)]        (d = 1: A = [1, a, g_j - (a·r_j + e_j)])
/// ```
///
/// with Ā uniform and G = I_d ⊗ g the CRT gadget matrix. For a target U the
/// sampler draws a perturbation p, samples Z with G·Z = U - A·p through the
/// gadget sampler, and returns
///
/// ```text
/// X = p + [E·Z; R·Z; Z]
/// ```
///
/// Expanding A·X shows the trapdoor terms cancel, leaving A·p + G·Z = U
/// exactly.
///
/// The perturbation is spherical at σ_large = sqrt(s² - c²) rather than the
/// Σ_p-shaped covariance of Micciancio–Peikert. Preimages are correct and short
/// but their distribution depends on the trapdoor.

use std::path::Path;

use rand::{CryptoRng, RngCore};
use tracing::{debug, info};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::dcrt_matrix::DcrtMatrix;
use crate::dcrt_poly::{DcrtPoly, Format};
use crate::error::{DcrtError, Result};
use crate::gadget::GadgetVector;
use crate::params::ParamsHandle;
use crate::sampling::Distribution;

/// Default Gaussian parameter of the trapdoor secrets.
pub const DEFAULT_SIGMA: f64 = 4.57825;

/// Empirical constant of the spectral-norm estimate.
pub const SPECTRAL_CONSTANT: f64 = 1.8;

/// Parameters shared by trapdoor generation and sampling.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrapdoorConfig {
    /// Standard deviation σ of the secret entries and of the gadget sampler
    pub sigma: f64,

    /// Gadget base b
    pub base: u64,

    /// Reserve an extra gadget digit per tower
    pub balanced: bool,
}

impl Default for TrapdoorConfig {
    fn default() -> Self {
        Self {
            sigma: DEFAULT_SIGMA,
            base: 2,
            balanced: false,
        }
    }
}

impl TrapdoorConfig {
    pub fn new(sigma: f64, base: u64, balanced: bool) -> Result<Self> {
        let config = Self {
            sigma,
            base,
            balanced,
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks σ > 0 (finite) and b ≥ 2.
    pub fn validate(&self) -> Result<()> {
        if !self.sigma.is_finite() || self.sigma <= 0.0 {
            return Err(DcrtError::InvalidParameters(format!(
                "Trapdoor sigma must be positive and finite, got {}",
                self.sigma
            )));
        }
        if self.base < 2 {
            return Err(DcrtError::InvalidParameters(format!(
                "Gadget base must be ≥ 2, got {}",
                self.base
            )));
        }
        Ok(())
    }

    /// Width c = (b + 1)·σ of the gadget sampler.
    pub fn base_width(&self) -> f64 {
        (self.base as f64 + 1.0) * self.sigma
    }
}

/// Secret trapdoor (R, E); both are d×dk Gaussian matrices in EVALUATION.
///
/// The entries are wiped when the pair is dropped.
#[derive(Clone, Debug, Zeroize, ZeroizeOnDrop)]
pub struct TrapdoorPair {
    r: DcrtMatrix,
    e: DcrtMatrix,
}

impl TrapdoorPair {
    pub fn r(&self) -> &DcrtMatrix {
        &self.r
    }

    pub fn e(&self) -> &DcrtMatrix {
        &self.e
    }
}

/// Public matrix, trapdoor and the parameters they were generated with.
///
/// A trapdoor is only meaningful next to the public matrix it was generated
/// with, so the two travel together.
#[derive(Clone, Debug)]
pub struct TrapdoorOutput {
    public_matrix: DcrtMatrix,
    trapdoor: TrapdoorPair,
    gadget: GadgetVector,
    config: TrapdoorConfig,
    dimension: usize,
}

impl TrapdoorOutput {
    /// A, of shape d×d(k+2).
    pub fn public_matrix(&self) -> &DcrtMatrix {
        &self.public_matrix
    }

    pub fn trapdoor(&self) -> &TrapdoorPair {
        &self.trapdoor
    }

    pub fn gadget(&self) -> &GadgetVector {
        &self.gadget
    }

    pub fn config(&self) -> &TrapdoorConfig {
        &self.config
    }

    /// Number of rows d of the public matrix.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Gadget length k.
    pub fn gadget_length(&self) -> usize {
        self.gadget.len()
    }

    pub fn params(&self) -> &ParamsHandle {
        self.public_matrix.params()
    }
}

/// s = 1.8·(b+1)·σ²·(√(d·n·k) + √(2n) + 4.7)
pub fn spectral_bound_d(n: usize, k: usize, base: u64, d: usize, sigma: f64) -> f64 {
    SPECTRAL_CONSTANT
        * (base as f64 + 1.0)
        * sigma
        * sigma
        * (((d * n * k) as f64).sqrt() + ((2 * n) as f64).sqrt() + 4.7)
}

/// `spectral_bound_d` with d = 1.
pub fn spectral_bound(n: usize, k: usize, base: u64, sigma: f64) -> f64 {
    spectral_bound_d(n, k, base, 1, sigma)
}

/// σ_large = sqrt(s² - c²).
///
/// # Errors
/// `SpectralBoundViolation` unless s > c.
pub fn large_sigma(spectral_bound: f64, base_width: f64) -> Result<f64> {
    if !(spectral_bound > base_width) || !spectral_bound.is_finite() {
        return Err(DcrtError::SpectralBoundViolation {
            spectral_bound,
            base_width,
        });
    }
    Ok((spectral_bound * spectral_bound - base_width * base_width).sqrt())
}

/// Generates A = [1, a, g - (a·r + e)] of shape 1×(k+2).
///
/// # Arguments
/// * `params` - Ring parameters
/// * `config` - σ, gadget base and balanced flag
/// * `rng` - Randomness source
///
/// # Returns
/// * `Result<TrapdoorOutput>` - Public matrix with r and e (1×k each)
pub fn trapdoor_gen<R: RngCore + CryptoRng>(
    params: &ParamsHandle,
    config: &TrapdoorConfig,
    rng: &mut R,
) -> Result<TrapdoorOutput> {
    config.validate()?;
    let gadget = GadgetVector::new(params, config.base, config.balanced)?;
    let k = gadget.len();
    let secret = Distribution::Gaussian { sigma: config.sigma };

    let a = DcrtPoly::sample_uniform(params, rng)?;
    let r = DcrtMatrix::sample(params, 1, k, secret, rng)?;
    let e = DcrtMatrix::sample(params, 1, k, secret, rng)?;
    let g = gadget.to_matrix()?;

    let mut public_matrix = DcrtMatrix::create(params, 1, k + 2)?;
    public_matrix.set(0, 0, DcrtPoly::from_constant(params, &1u32.into()))?;
    for j in 0..k {
        let ar = a.multiply(&r.element(0, j)?)?;
        let masked = ar.add(&e.element(0, j)?)?;
        public_matrix.set(0, j + 2, g.element(0, j)?.sub(&masked)?)?;
    }
    public_matrix.set(0, 1, a)?;

    info!(k, base = config.base, sigma = config.sigma, "generated trapdoor");
    Ok(TrapdoorOutput {
        public_matrix,
        trapdoor: TrapdoorPair { r, e },
        gadget,
        config: *config,
        dimension: 1,
    })
}

/// Generates A = [I_d | Ā | G - (Ā·R + E)] of shape d×d(k+2).
///
/// R and E are d×dk Gaussian matrices and Ā is a uniform d×d matrix.
pub fn square_mat_trapdoor_gen<R: RngCore + CryptoRng>(
    params: &ParamsHandle,
    config: &TrapdoorConfig,
    dimension: usize,
    rng: &mut R,
) -> Result<TrapdoorOutput> {
    config.validate()?;
    if dimension == 0 {
        return Err(DcrtError::InvalidParameters(
            "Trapdoor dimension must be at least 1".to_string(),
        ));
    }
    let gadget = GadgetVector::new(params, config.base, config.balanced)?;
    let k = gadget.len();
    let d = dimension;
    let secret = Distribution::Gaussian { sigma: config.sigma };

    let a_bar = DcrtMatrix::sample(params, d, d, Distribution::Uniform, rng)?;
    let r = DcrtMatrix::sample(params, d, d * k, secret, rng)?;
    let e = DcrtMatrix::sample(params, d, d * k, secret, rng)?;
    let g = gadget.gadget_matrix(d)?;

    let masked = a_bar.multiply(&r)?.add(&e)?;
    let right = g.sub(&masked)?;
    let identity = DcrtMatrix::identity(params, d)?;
    let public_matrix = DcrtMatrix::hstack_all(&[&identity, &a_bar, &right])?;

    info!(d, k, base = config.base, sigma = config.sigma, "generated square trapdoor");
    Ok(TrapdoorOutput {
        public_matrix,
        trapdoor: TrapdoorPair { r, e },
        gadget,
        config: *config,
        dimension: d,
    })
}

/// Samples a short x of shape (k+2)×1 with A·x = u.
///
/// Base and σ are taken from the configuration the trapdoor was generated
/// with. The result is in EVALUATION format.
///
/// # Errors
/// - `InvalidParameters` for a square trapdoor or a foreign ring
/// - `SpectralBoundViolation` if s ≤ (b+1)·σ
pub fn gauss_samp<R: RngCore + CryptoRng>(
    output: &TrapdoorOutput,
    target: &DcrtPoly,
    rng: &mut R,
) -> Result<DcrtMatrix> {
    if output.dimension != 1 {
        return Err(DcrtError::InvalidParameters(format!(
            "Trapdoor has dimension {}, use square_mat_gauss_samp",
            output.dimension
        )));
    }
    let params = output.params();
    let mut u = DcrtMatrix::create(params, 1, 1)?;
    u.set(0, 0, target.to_format(Format::Evaluation))?;
    let spectral = spectral_bound(
        params.ring_dimension(),
        output.gadget_length(),
        output.config.base,
        output.config.sigma,
    );
    sample_preimage(output, &u, spectral, rng)
}

/// Samples a short X of shape d(k+2)×m with A·X = U for a d×m target U.
pub fn square_mat_gauss_samp<R: RngCore + CryptoRng>(
    output: &TrapdoorOutput,
    target: &DcrtMatrix,
    rng: &mut R,
) -> Result<DcrtMatrix> {
    if target.rows() != output.dimension {
        return Err(DcrtError::InvalidDimension {
            expected: output.dimension,
            got: target.rows(),
        });
    }
    let mut u = target.clone();
    u.set_format_all(Format::Evaluation);
    let params = output.params();
    let spectral = spectral_bound_d(
        params.ring_dimension(),
        output.gadget_length(),
        output.config.base,
        output.dimension,
        output.config.sigma,
    );
    sample_preimage(output, &u, spectral, rng)
}

/// `gauss_samp` followed by `save_to_file`; returns the persisted preimage.
pub fn gauss_samp_to_file<R: RngCore + CryptoRng, P: AsRef<Path>>(
    output: &TrapdoorOutput,
    target: &DcrtPoly,
    path: P,
    rng: &mut R,
) -> Result<DcrtMatrix> {
    let x = gauss_samp(output, target, rng)?;
    x.save_to_file(path)?;
    Ok(x)
}

/// `square_mat_gauss_samp` followed by `save_to_file`.
pub fn square_mat_gauss_samp_to_file<R: RngCore + CryptoRng, P: AsRef<Path>>(
    output: &TrapdoorOutput,
    target: &DcrtMatrix,
    path: P,
    rng: &mut R,
) -> Result<DcrtMatrix> {
    let x = square_mat_gauss_samp(output, target, rng)?;
    x.save_to_file(path)?;
    Ok(x)
}

fn sample_preimage<R: RngCore + CryptoRng>(
    output: &TrapdoorOutput,
    target: &DcrtMatrix,
    spectral: f64,
    rng: &mut R,
) -> Result<DcrtMatrix> {
    let params = output.params();
    let d = output.dimension;
    let k = output.gadget_length();
    let c = output.config.base_width();
    let sigma_large = large_sigma(spectral, c)?;
    let columns = target.cols();
    debug!(
        d,
        k,
        columns,
        spectral_bound = spectral,
        sigma_large,
        "sampling trapdoor preimage"
    );

    let perturbation = DcrtMatrix::sample(
        params,
        d * (k + 2),
        columns,
        Distribution::Gaussian { sigma: sigma_large },
        rng,
    )?;
    let syndrome = target.sub(&output.public_matrix.multiply(&perturbation)?)?;

    // Z is d·k × m; block i of column j decomposes syndrome (i, j).
    let mut z = DcrtMatrix::create(params, d * k, columns)?;
    for col in 0..columns {
        for row in 0..d {
            let entry = syndrome.element(row, col)?;
            let digits = output.gadget.sample_preimage(&entry, c, rng)?;
            for (index, digit) in digits.into_iter().enumerate() {
                z.set(row * k + index, col, digit)?;
            }
        }
    }

    let trapdoor = &output.trapdoor;
    let correction = DcrtMatrix::vstack_all(&[
        &trapdoor.e.multiply(&z)?,
        &trapdoor.r.multiply(&z)?,
        &z,
    ])?;
    perturbation.add(&correction)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::RingParams;
    use crate::sampling::seeded_rng;

    #[test]
    fn test_default_config() {
        let config = TrapdoorConfig::default();
        assert_eq!(config.sigma, DEFAULT_SIGMA);
        assert_eq!(config.base, 2);
        assert!(!config.balanced);
        assert!(config.validate().is_ok());
        assert!(TrapdoorConfig::new(0.0, 2, false).is_err());
        assert!(TrapdoorConfig::new(4.0, 1, false).is_err());
        assert!(TrapdoorConfig::new(f64::NAN, 2, false).is_err());
    }

    #[test]
    fn test_spectral_bound_formula() {
        let s = spectral_bound(16, 60, 2, 4.0);
        let expected = 1.8 * 3.0 * 16.0 * ((960.0f64).sqrt() + (32.0f64).sqrt() + 4.7);
        assert!((s - expected).abs() < 1e-9);
        assert!(spectral_bound_d(16, 60, 2, 2, 4.0) > s);
        assert_eq!(spectral_bound_d(16, 60, 2, 1, 4.0), s);
    }

    #[test]
    fn test_large_sigma() {
        assert!((large_sigma(5.0, 3.0).unwrap() - 4.0).abs() < 1e-12);
        assert!(matches!(
            large_sigma(3.0, 3.0),
            Err(DcrtError::SpectralBoundViolation { .. })
        ));
        assert!(matches!(
            large_sigma(2.0, 3.0),
            Err(DcrtError::SpectralBoundViolation { .. })
        ));
    }

    #[test]
    fn test_trapdoor_shape_and_relation() {
        let params = RingParams::new(16, 2, 30).unwrap();
        let mut rng = seeded_rng(1);
        let output = trapdoor_gen(&params, &TrapdoorConfig::default(), &mut rng).unwrap();
        let k = output.gadget_length();
        assert_eq!(k, 60);
        assert_eq!(output.public_matrix().shape(), (1, k + 2));
        assert_eq!(output.trapdoor().r().shape(), (1, k));
        assert_eq!(output.trapdoor().e().shape(), (1, k));

        // A·[e; r; I] = g
        let a = output.public_matrix();
        let first = a.get(0, 0).unwrap();
        assert_eq!(first.coefficient_strings()[0], "1");
        let g = output.gadget().to_matrix().unwrap();
        for j in 0..k {
            let e_j = output.trapdoor().e().element(0, j).unwrap();
            let r_j = output.trapdoor().r().element(0, j).unwrap();
            let lhs = e_j
                .add(&a.get(0, 1).unwrap().multiply(&r_j).unwrap())
                .unwrap()
                .add(a.get(0, j + 2).unwrap())
                .unwrap();
            assert_eq!(&lhs, g.get(0, j).unwrap());
        }
    }

    #[test]
    fn test_square_trapdoor_shape() {
        let params = RingParams::new(16, 1, 30).unwrap();
        let mut rng = seeded_rng(2);
        let config = TrapdoorConfig::new(DEFAULT_SIGMA, 4, false).unwrap();
        let output = square_mat_trapdoor_gen(&params, &config, 2, &mut rng).unwrap();
        let k = output.gadget_length();
        assert_eq!(output.dimension(), 2);
        assert_eq!(output.public_matrix().shape(), (2, 2 * (k + 2)));
        assert_eq!(output.trapdoor().r().shape(), (2, 2 * k));
        assert!(output.public_matrix().get(0, 1).unwrap().is_zero());
        assert!(square_mat_trapdoor_gen(&params, &config, 0, &mut rng).is_err());
    }

    #[test]
    fn test_gauss_samp_rejects_square_trapdoor() {
        let params = RingParams::new(16, 1, 30).unwrap();
        let mut rng = seeded_rng(3);
        let output = square_mat_trapdoor_gen(&params, &TrapdoorConfig::default(), 2, &mut rng).unwrap();
        let u = DcrtPoly::zero(&params, Format::Evaluation);
        assert!(matches!(
            gauss_samp(&output, &u, &mut rng),
            Err(DcrtError::InvalidParameters(_))
        ));
    }

    #[test]
    fn test_gauss_samp_satisfies_relation() {
        let params = RingParams::new(16, 2, 30).unwrap();
        let mut rng = seeded_rng(4);
        let output = trapdoor_gen(&params, &TrapdoorConfig::default(), &mut rng).unwrap();
        let u = DcrtPoly::sample_uniform(&params, &mut rng).unwrap();

        let x = gauss_samp(&output, &u, &mut rng).unwrap();
        assert_eq!(x.shape(), (output.gadget_length() + 2, 1));
        let ax = output.public_matrix().multiply(&x).unwrap();
        assert_eq!(ax.get(0, 0).unwrap(), &u);
    }

    #[test]
    fn test_zeroized_trapdoor_stays_well_formed() {
        let params = RingParams::new(16, 2, 30).unwrap();
        let mut rng = seeded_rng(6);
        let output = trapdoor_gen(&params, &TrapdoorConfig::default(), &mut rng).unwrap();
        let k = output.gadget_length();

        let mut pair = output.trapdoor().clone();
        pair.zeroize();
        assert_eq!(pair.r().shape(), (1, k));
        assert_eq!(pair.e().shape(), (1, k));
        for poly in pair.r().elements().iter().chain(pair.e().elements()) {
            assert!(poly.is_zero());
            assert_eq!(poly.coefficients().len(), 16);
        }
        assert!(output.trapdoor().r().elements().iter().any(|p| !p.is_zero()));
    }
}
