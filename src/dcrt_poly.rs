/// Double-CRT polynomials over R_Q = Z_Q[X]/(X^n + 1)
///
/// A `DcrtPoly` stores one native residue polynomial per CRT tower. All towers
/// carry a single shared format tag, so a mixed COEFFICIENT/EVALUATION element
/// cannot be represented.
///
/// Format conventions:
/// - `from_constant`, `from_vec`, `from_evaluation_vec` and every `sample_*`
///   constructor return EVALUATION (the arithmetic format)
/// - `decompose` returns its digit polynomials in COEFFICIENT
/// - `from_signed_coefficients` and `zero` take the format explicitly
///
/// Arithmetic is checked rather than trusted:
/// - operands must share ring parameters (`InvalidParameters`)
/// - operands must share a format (`DomainStateMismatch`)
/// - multiplication requires EVALUATION (`FormatRequired`), because a pointwise
///   product of coefficient vectors is not ring multiplication
///
/// Equality is representation-exact: the same ring element in two different
/// formats compares unequal.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::sync::Arc;

use num_bigint::{BigInt, BigUint};
use num_traits::{One, Signed};
use rand::{CryptoRng, RngCore};
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use zeroize::Zeroize;

use crate::dcrt_matrix::DcrtMatrix;
use crate::error::{DcrtError, Result};
use crate::params::ParamsHandle;
use crate::sampling::{sample_small, sample_uniform_mod, Distribution};

/// Representation of the tower polynomials.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Format {
    /// Coefficient vector of the polynomial
    Coefficient,
    /// Values at the primitive 2n-th roots of unity (NTT domain)
    Evaluation,
}

impl Format {
    /// The other format.
    pub fn flipped(self) -> Self {
        match self {
            Format::Coefficient => Format::Evaluation,
            Format::Evaluation => Format::Coefficient,
        }
    }

    pub(crate) fn to_byte(self) -> u8 {
        match self {
            Format::Coefficient => 0,
            Format::Evaluation => 1,
        }
    }

    pub(crate) fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Format::Coefficient),
            1 => Some(Format::Evaluation),
            _ => None,
        }
    }
}

impl Display for Format {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Format::Coefficient => write!(f, "COEFFICIENT"),
            Format::Evaluation => write!(f, "EVALUATION"),
        }
    }
}

/// Ring element in double-CRT representation.
#[derive(Clone, Debug)]
pub struct DcrtPoly {
    /// Shared ring context
    params: ParamsHandle,

    /// Format of every tower
    format: Format,

    /// towers[i][j] is slot j of the residue polynomial modulo q_i
    towers: Vec<Vec<u64>>,
}

impl DcrtPoly {
    /// The zero element in the requested format.
    pub fn zero(params: &ParamsHandle, format: Format) -> Self {
        let n = params.ring_dimension();
        Self {
            params: Arc::clone(params),
            format,
            towers: vec![vec![0u64; n]; params.tower_count()],
        }
    }

    /// Builds an element from raw tower residues.
    ///
    /// # Errors
    /// - `InvalidDimension` if the tower count or a tower length is wrong
    /// - `InvalidParameters` if a residue is not reduced modulo its tower
    pub fn from_towers(params: &ParamsHandle, towers: Vec<Vec<u64>>, format: Format) -> Result<Self> {
        if towers.len() != params.tower_count() {
            return Err(DcrtError::InvalidDimension {
                expected: params.tower_count(),
                got: towers.len(),
            });
        }
        for (tower, q) in towers.iter().zip(params.moduli()) {
            if tower.len() != params.ring_dimension() {
                return Err(DcrtError::InvalidDimension {
                    expected: params.ring_dimension(),
                    got: tower.len(),
                });
            }
            if let Some(&bad) = tower.iter().find(|&&v| v >= q.value()) {
                return Err(DcrtError::InvalidParameters(format!(
                    "Residue {} not reduced modulo {}",
                    bad,
                    q.value()
                )));
            }
        }
        Ok(Self {
            params: Arc::clone(params),
            format,
            towers,
        })
    }

    /// Constant polynomial `value` (slot 0, zero elsewhere), in EVALUATION.
    ///
    /// The value is reduced modulo every q_i, so values ≥ Q wrap modulo Q.
    pub fn from_constant(params: &ParamsHandle, value: &BigUint) -> Self {
        let mut poly = Self::zero(params, Format::Coefficient);
        let residues = params.crt().decompose(value);
        for (tower, r) in poly.towers.iter_mut().zip(residues) {
            tower[0] = r;
        }
        poly.switch_format();
        poly
    }

    /// Constant polynomial from a decimal string, in EVALUATION.
    ///
    /// Negative values are accepted and mapped to Q - |value|.
    pub fn from_constant_str(params: &ParamsHandle, value: &str) -> Result<Self> {
        let parsed = parse_decimal(value)?;
        let mut poly = Self::zero(params, Format::Coefficient);
        let residues = params.crt().decompose_signed(&parsed);
        for (tower, r) in poly.towers.iter_mut().zip(residues) {
            tower[0] = r;
        }
        poly.switch_format();
        Ok(poly)
    }

    /// Polynomial with the given coefficients (zero padded to n), in EVALUATION.
    ///
    /// # Errors
    /// `InvalidDimension` if more than n coefficients are supplied.
    pub fn from_vec(params: &ParamsHandle, values: &[BigUint]) -> Result<Self> {
        let mut poly = Self::from_values_in_format(params, values, Format::Coefficient)?;
        poly.switch_format();
        Ok(poly)
    }

    /// Like `from_vec`, with coefficients given as decimal strings.
    pub fn from_decimal_strings<S: AsRef<str>>(params: &ParamsHandle, values: &[S]) -> Result<Self> {
        let n = params.ring_dimension();
        if values.len() > n {
            return Err(DcrtError::InvalidDimension {
                expected: n,
                got: values.len(),
            });
        }
        let mut poly = Self::zero(params, Format::Coefficient);
        for (slot, value) in values.iter().enumerate() {
            let parsed = parse_decimal(value.as_ref())?;
            let residues = params.crt().decompose_signed(&parsed);
            for (tower, r) in poly.towers.iter_mut().zip(residues) {
                tower[slot] = r;
            }
        }
        poly.switch_format();
        Ok(poly)
    }

    /// Treats `values` as EVALUATION-domain slots directly (no transform).
    pub fn from_evaluation_vec(params: &ParamsHandle, values: &[BigUint]) -> Result<Self> {
        Self::from_values_in_format(params, values, Format::Evaluation)
    }

    /// Small signed coefficients broadcast to every tower.
    ///
    /// The vector is interpreted in COEFFICIENT format and then converted to
    /// `format`. Used for Gaussian samples and gadget digits.
    pub fn from_signed_coefficients(params: &ParamsHandle, values: &[i64], format: Format) -> Result<Self> {
        let n = params.ring_dimension();
        if values.len() > n {
            return Err(DcrtError::InvalidDimension {
                expected: n,
                got: values.len(),
            });
        }
        let mut poly = Self::zero(params, Format::Coefficient);
        for (tower, q) in poly.towers.iter_mut().zip(params.moduli()) {
            for (slot, &v) in tower.iter_mut().zip(values) {
                *slot = q.reduce_i64(v);
            }
        }
        poly.set_format(format);
        Ok(poly)
    }

    fn from_values_in_format(params: &ParamsHandle, values: &[BigUint], format: Format) -> Result<Self> {
        let n = params.ring_dimension();
        if values.len() > n {
            return Err(DcrtError::InvalidDimension {
                expected: n,
                got: values.len(),
            });
        }
        let mut poly = Self::zero(params, format);
        for (slot, value) in values.iter().enumerate() {
            let residues = params.crt().decompose(value);
            for (tower, r) in poly.towers.iter_mut().zip(residues) {
                tower[slot] = r;
            }
        }
        Ok(poly)
    }

    /// Samples an element from `distribution`, returned in EVALUATION.
    ///
    /// Uniform elements are drawn independently per tower (uniform modulo Q by
    /// CRT) directly in EVALUATION. The small distributions are drawn once as
    /// integers, broadcast to every tower, then transformed.
    pub fn sample<R: RngCore + CryptoRng>(
        params: &ParamsHandle,
        distribution: Distribution,
        rng: &mut R,
    ) -> Result<Self> {
        let n = params.ring_dimension();
        match distribution {
            Distribution::Uniform => {
                let towers = params
                    .moduli()
                    .iter()
                    .map(|q| sample_uniform_mod(rng, q.value(), n))
                    .collect();
                Ok(Self {
                    params: Arc::clone(params),
                    format: Format::Evaluation,
                    towers,
                })
            }
            small => {
                let values = sample_small(rng, small, n)?;
                Self::from_signed_coefficients(params, &values, Format::Evaluation)
            }
        }
    }

    /// Discrete uniform element (EVALUATION).
    pub fn sample_uniform<R: RngCore + CryptoRng>(params: &ParamsHandle, rng: &mut R) -> Result<Self> {
        Self::sample(params, Distribution::Uniform, rng)
    }

    /// Discrete Gaussian element with standard deviation `sigma` (EVALUATION).
    pub fn sample_gaussian<R: RngCore + CryptoRng>(params: &ParamsHandle, sigma: f64, rng: &mut R) -> Result<Self> {
        Self::sample(params, Distribution::Gaussian { sigma }, rng)
    }

    /// Binary {0, 1} element (EVALUATION).
    pub fn sample_binary<R: RngCore + CryptoRng>(params: &ParamsHandle, rng: &mut R) -> Result<Self> {
        Self::sample(params, Distribution::Binary, rng)
    }

    /// Ternary {-1, 0, 1} element (EVALUATION).
    pub fn sample_ternary<R: RngCore + CryptoRng>(params: &ParamsHandle, rng: &mut R) -> Result<Self> {
        Self::sample(params, Distribution::Ternary, rng)
    }

    pub fn params(&self) -> &ParamsHandle {
        &self.params
    }

    pub fn format(&self) -> Format {
        self.format
    }

    pub fn ring_dimension(&self) -> usize {
        self.params.ring_dimension()
    }

    pub fn tower_count(&self) -> usize {
        self.towers.len()
    }

    /// Residues of tower `index` in the current format.
    pub fn tower(&self, index: usize) -> Option<&[u64]> {
        self.towers.get(index).map(|t| t.as_slice())
    }

    pub fn towers(&self) -> &[Vec<u64>] {
        &self.towers
    }

    /// Composite modulus Q of the ring this element lives in.
    pub fn modulus(&self) -> BigUint {
        self.params.modulus()
    }

    pub fn modulus_string(&self) -> String {
        self.params.modulus_string()
    }

    /// Flips the format in place, running an independent (inverse) NTT per tower.
    pub fn switch_format(&mut self) {
        let tables = self.params.ntt_tables();
        let forward = self.format == Format::Coefficient;

        #[cfg(feature = "parallel")]
        self.towers
            .par_iter_mut()
            .zip(tables.par_iter())
            .for_each(|(tower, table)| {
                if forward {
                    table.forward(tower)
                } else {
                    table.inverse(tower)
                }
            });

        #[cfg(not(feature = "parallel"))]
        for (tower, table) in self.towers.iter_mut().zip(tables) {
            if forward {
                table.forward(tower);
            } else {
                table.inverse(tower);
            }
        }

        self.format = self.format.flipped();
    }

    /// Switches to `format` if not already there.
    pub fn set_format(&mut self, format: Format) {
        if self.format != format {
            self.switch_format();
        }
    }

    /// Copy of this element in `format`.
    pub fn to_format(&self, format: Format) -> Self {
        let mut copy = self.clone();
        copy.set_format(format);
        copy
    }

    fn check_params(&self, other: &Self) -> Result<()> {
        if Arc::ptr_eq(&self.params, &other.params) || *self.params == *other.params {
            Ok(())
        } else {
            Err(DcrtError::InvalidParameters(format!(
                "Operands belong to different rings: {} vs {}",
                self.params, other.params
            )))
        }
    }

    fn check_compatible(&self, other: &Self) -> Result<()> {
        self.check_params(other)?;
        if self.format != other.format {
            return Err(DcrtError::DomainStateMismatch {
                left: self.format,
                right: other.format,
            });
        }
        Ok(())
    }

    fn zip_towers(&self, other: &Self, op: impl Fn(&crate::modular_arithmetic::NativeModulus, u64, u64) -> u64) -> Self {
        let towers = self
            .towers
            .iter()
            .zip(&other.towers)
            .zip(self.params.moduli())
            .map(|((a, b), q)| a.iter().zip(b).map(|(&x, &y)| op(q, x, y)).collect())
            .collect();
        Self {
            params: Arc::clone(&self.params),
            format: self.format,
            towers,
        }
    }

    /// Tower-wise modular addition.
    pub fn add(&self, other: &Self) -> Result<Self> {
        self.check_compatible(other)?;
        Ok(self.zip_towers(other, |q, a, b| q.add(a, b)))
    }

    /// Tower-wise modular subtraction.
    pub fn sub(&self, other: &Self) -> Result<Self> {
        self.check_compatible(other)?;
        Ok(self.zip_towers(other, |q, a, b| q.sub(a, b)))
    }

    /// Ring multiplication; both operands must be in EVALUATION.
    pub fn multiply(&self, other: &Self) -> Result<Self> {
        self.check_compatible(other)?;
        if self.format != Format::Evaluation {
            return Err(DcrtError::FormatRequired {
                required: Format::Evaluation,
                found: self.format,
            });
        }
        Ok(self.zip_towers(other, |q, a, b| q.mul(a, b)))
    }

    /// In-place `self += other`.
    pub fn add_assign(&mut self, other: &Self) -> Result<()> {
        self.check_compatible(other)?;
        for ((a, b), q) in self.towers.iter_mut().zip(&other.towers).zip(self.params.moduli()) {
            for (x, &y) in a.iter_mut().zip(b) {
                *x = q.add(*x, y);
            }
        }
        Ok(())
    }

    /// Tower-wise negation.
    pub fn negate(&self) -> Self {
        let towers = self
            .towers
            .iter()
            .zip(self.params.moduli())
            .map(|(t, q)| t.iter().map(|&x| q.neg(x)).collect())
            .collect();
        Self {
            params: Arc::clone(&self.params),
            format: self.format,
            towers,
        }
    }

    /// Multiplication by an integer scalar; valid in either format.
    pub fn mul_scalar(&self, scalar: &BigUint) -> Self {
        let residues = self.params.crt().decompose(scalar);
        let towers = self
            .towers
            .iter()
            .zip(self.params.moduli())
            .zip(residues)
            .map(|((t, q), s)| t.iter().map(|&x| q.mul(x, s)).collect())
            .collect();
        Self {
            params: Arc::clone(&self.params),
            format: self.format,
            towers,
        }
    }

    /// True if every residue is zero (format independent).
    pub fn is_zero(&self) -> bool {
        self.towers.iter().all(|t| t.iter().all(|&x| x == 0))
    }

    /// Representation-exact equality.
    pub fn is_equal(&self, other: &Self) -> bool {
        self == other
    }

    /// Full-precision coefficients modulo Q (length n).
    ///
    /// Works on a COEFFICIENT copy; `self` keeps its format.
    pub fn coefficients(&self) -> Vec<BigUint> {
        let coeff = self.to_format(Format::Coefficient);
        let crt = self.params.crt();
        let mut residues = vec![0u64; coeff.towers.len()];
        (0..self.ring_dimension())
            .map(|slot| {
                for (r, tower) in residues.iter_mut().zip(&coeff.towers) {
                    *r = tower[slot];
                }
                crt.interpolate(&residues)
            })
            .collect()
    }

    /// Coefficients as decimal strings (length n).
    pub fn coefficient_strings(&self) -> Vec<String> {
        self.coefficients()
            .iter()
            .map(|c| c.to_str_radix(10))
            .collect()
    }

    /// Coefficients in the centered range (-Q/2, Q/2].
    pub fn centered_coefficients(&self) -> Vec<BigInt> {
        let coeff = self.to_format(Format::Coefficient);
        let crt = self.params.crt();
        let mut residues = vec![0u64; coeff.towers.len()];
        (0..self.ring_dimension())
            .map(|slot| {
                for (r, tower) in residues.iter_mut().zip(&coeff.towers) {
                    *r = tower[slot];
                }
                crt.interpolate_centered(&residues)
            })
            .collect()
    }

    /// Largest centered coefficient magnitude.
    pub fn infinity_norm(&self) -> BigUint {
        self.centered_coefficients()
            .iter()
            .map(|c| c.abs().magnitude().clone())
            .max()
            .unwrap_or_default()
    }

    /// Base-2^`base_bits` digit decomposition.
    ///
    /// Each coefficient c ∈ [0, Q) is written as Σ_i d_i · 2^{base_bits·i} with
    /// 0 ≤ d_i < 2^{base_bits}. Digit polynomial i is entry (0, i) of the
    /// returned 1×k matrix, k = ⌈log2(Q) / base_bits⌉, in COEFFICIENT format.
    ///
    /// # Errors
    /// `InvalidParameters` if `base_bits` is zero or wider than 63 bits.
    pub fn decompose(&self, base_bits: u32) -> Result<DcrtMatrix> {
        if base_bits == 0 || base_bits > 63 {
            return Err(DcrtError::InvalidParameters(format!(
                "Decomposition base must be 2^b with 1 ≤ b ≤ 63, got b = {}",
                base_bits
            )));
        }
        let modulus_bits = self.params.modulus_bits();
        let digit_count = ((modulus_bits + base_bits as u64 - 1) / base_bits as u64) as usize;
        let mask = (BigUint::one() << base_bits) - BigUint::one();
        let coefficients = self.coefficients();

        let mut digits = Vec::with_capacity(digit_count);
        for i in 0..digit_count {
            let shift = base_bits as usize * i;
            let values: Vec<BigUint> = coefficients.iter().map(|c| (c >> shift) & &mask).collect();
            digits.push(Self::from_values_in_format(&self.params, &values, Format::Coefficient)?);
        }
        DcrtMatrix::from_elements(&self.params, 1, digit_count, digits)
    }
}

impl PartialEq for DcrtPoly {
    fn eq(&self, other: &Self) -> bool {
        (Arc::ptr_eq(&self.params, &other.params) || *self.params == *other.params)
            && self.format == other.format
            && self.towers == other.towers
    }
}

impl Eq for DcrtPoly {}

impl Zeroize for DcrtPoly {
    fn zeroize(&mut self) {
        // Residues are wiped in place so the towers keep length n.
        for tower in self.towers.iter_mut() {
            tower.as_mut_slice().zeroize();
        }
    }
}

impl Display for DcrtPoly {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        writeln!(f, "DcrtPoly[{}]", self.format)?;
        for (i, (tower, q)) in self.towers.iter().zip(self.params.moduli()).enumerate() {
            write!(f, "  tower {} (q = {}): [", i, q.value())?;
            for (j, v) in tower.iter().enumerate() {
                if j > 0 {
                    write!(f, " ")?;
                }
                write!(f, "{}", v)?;
            }
            writeln!(f, "]")?;
        }
        Ok(())
    }
}

fn parse_decimal(value: &str) -> Result<BigInt> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DcrtError::ParseError("empty integer string".to_string()));
    }
    Ok(trimmed.parse::<BigInt>()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::RingParams;
    use crate::sampling::seeded_rng;
    use num_traits::Zero;

    fn params() -> ParamsHandle {
        RingParams::new(16, 2, 30).unwrap()
    }

    #[test]
    fn test_constant_scenario() {
        let params = params();
        let mut poly = DcrtPoly::from_constant_str(&params, "5").unwrap();
        assert_eq!(poly.format(), Format::Evaluation);
        poly.switch_format();
        poly.switch_format();
        let coeffs = poly.coefficient_strings();
        assert_eq!(coeffs.len(), 16);
        assert_eq!(coeffs[0], "5");
        assert!(coeffs[1..].iter().all(|c| c == "0"));
    }

    #[test]
    fn test_constant_is_flat_in_evaluation() {
        let params = params();
        let poly = DcrtPoly::from_constant(&params, &BigUint::from(7u32));
        for (tower, _) in poly.towers().iter().zip(params.moduli()) {
            assert!(tower.iter().all(|&v| v == 7));
        }
    }

    #[test]
    fn test_negative_constant() {
        let params = params();
        let poly = DcrtPoly::from_constant_str(&params, "-3").unwrap();
        let expected = params.modulus() - BigUint::from(3u32);
        assert_eq!(poly.coefficients()[0], expected);
        assert_eq!(poly.centered_coefficients()[0], BigInt::from(-3));
    }

    #[test]
    fn test_parse_errors() {
        let params = params();
        assert!(matches!(
            DcrtPoly::from_constant_str(&params, "12a"),
            Err(DcrtError::ParseError(_))
        ));
        assert!(matches!(
            DcrtPoly::from_constant_str(&params, ""),
            Err(DcrtError::ParseError(_))
        ));
    }

    #[test]
    fn test_vector_round_trip_and_padding() {
        let params = params();
        let values = vec![
            "123456789099999",
            "1234567842539099999",
            "31232189328123893128",
            "24535423544252452453",
        ];
        let poly = DcrtPoly::from_decimal_strings(&params, &values).unwrap();
        let q = params.modulus();
        let coeffs = poly.coefficients();
        assert_eq!(coeffs.len(), 16);
        for (c, v) in coeffs.iter().zip(&values) {
            assert_eq!(*c, v.parse::<BigUint>().unwrap() % &q);
        }
        assert!(coeffs[4..].iter().all(|c| c.is_zero()));
    }

    #[test]
    fn test_too_many_coefficients() {
        let params = params();
        let values = vec![BigUint::one(); 17];
        assert!(matches!(
            DcrtPoly::from_vec(&params, &values),
            Err(DcrtError::InvalidDimension { expected: 16, got: 17 })
        ));
    }

    #[test]
    fn test_evaluation_vector_skips_transform() {
        let params = params();
        let values: Vec<BigUint> = (1..=16u32).map(BigUint::from).collect();
        let poly = DcrtPoly::from_evaluation_vec(&params, &values).unwrap();
        assert_eq!(poly.format(), Format::Evaluation);
        assert_eq!(poly.tower(0).unwrap()[3], 4);
    }

    #[test]
    fn test_additive_inverse() {
        let params = params();
        let mut rng = seeded_rng(1);
        let p = DcrtPoly::sample_uniform(&params, &mut rng).unwrap();
        let sum = p.add(&p.negate()).unwrap();
        assert!(sum.is_zero());
        assert_eq!(sum, DcrtPoly::zero(&params, Format::Evaluation));
    }

    #[test]
    fn test_multiplication_matches_negacyclic_convolution() {
        let params = params();
        let a_coeffs: Vec<i64> = (0..16).map(|i| i - 8).collect();
        let b_coeffs: Vec<i64> = (0..16).map(|i| (i * 3) % 7 - 3).collect();
        let a = DcrtPoly::from_signed_coefficients(&params, &a_coeffs, Format::Evaluation).unwrap();
        let b = DcrtPoly::from_signed_coefficients(&params, &b_coeffs, Format::Evaluation).unwrap();

        let mut expected = vec![0i64; 16];
        for i in 0..16 {
            for j in 0..16 {
                let k = i + j;
                if k < 16 {
                    expected[k] += a_coeffs[i] * b_coeffs[j];
                } else {
                    expected[k - 16] -= a_coeffs[i] * b_coeffs[j];
                }
            }
        }

        let product = a.multiply(&b).unwrap();
        let got: Vec<BigInt> = product.centered_coefficients();
        let expected: Vec<BigInt> = expected.into_iter().map(BigInt::from).collect();
        assert_eq!(got, expected);
    }

    #[test]
    fn test_multiplication_requires_evaluation() {
        let params = params();
        let a = DcrtPoly::zero(&params, Format::Coefficient);
        assert!(matches!(
            a.multiply(&a),
            Err(DcrtError::FormatRequired { .. })
        ));
    }

    #[test]
    fn test_domain_state_mismatch() {
        let params = params();
        let a = DcrtPoly::from_constant(&params, &BigUint::from(3u32));
        let b = a.to_format(Format::Coefficient);
        assert!(matches!(
            a.add(&b),
            Err(DcrtError::DomainStateMismatch { .. })
        ));
        // Same element, different representation: not equal.
        assert!(!a.is_equal(&b));
        assert_eq!(a.coefficients(), b.coefficients());
    }

    #[test]
    fn test_ring_mismatch() {
        let a = DcrtPoly::zero(&params(), Format::Evaluation);
        let other = RingParams::new(16, 3, 30).unwrap();
        let b = DcrtPoly::zero(&other, Format::Evaluation);
        assert!(matches!(a.add(&b), Err(DcrtError::InvalidParameters(_))));
    }

    #[test]
    fn test_equal_params_from_separate_contexts() {
        let a = DcrtPoly::from_constant(&params(), &BigUint::from(9u32));
        let b = DcrtPoly::from_constant(&params(), &BigUint::from(9u32));
        assert_eq!(a, b);
        assert!(a.add(&b).is_ok());
    }

    #[test]
    fn test_sampled_distributions_are_small() {
        let params = params();
        let mut rng = seeded_rng(2);
        let binary = DcrtPoly::sample_binary(&params, &mut rng).unwrap();
        let ternary = DcrtPoly::sample_ternary(&params, &mut rng).unwrap();
        let gaussian = DcrtPoly::sample_gaussian(&params, 3.2, &mut rng).unwrap();
        for poly in [&binary, &ternary, &gaussian] {
            assert_eq!(poly.format(), Format::Evaluation);
        }
        assert!(binary.centered_coefficients().iter().all(|c| *c == BigInt::zero() || *c == BigInt::one()));
        assert!(ternary.infinity_norm() <= BigUint::one());
        assert!(gaussian.infinity_norm() <= BigUint::from(20u32));
    }

    #[test]
    fn test_mul_scalar() {
        let params = params();
        let p = DcrtPoly::from_constant(&params, &BigUint::from(6u32));
        let q = p.mul_scalar(&BigUint::from(7u32));
        assert_eq!(q.coefficients()[0], BigUint::from(42u32));
    }

    #[test]
    fn test_decompose_recombines() {
        let params = params();
        let mut rng = seeded_rng(3);
        let p = DcrtPoly::sample_uniform(&params, &mut rng).unwrap();
        let base_bits = 7;
        let digits = p.decompose(base_bits).unwrap();
        let expected_k = ((params.modulus_bits() + 6) / 7) as usize;
        assert_eq!(digits.shape(), (1, expected_k));

        let mut acc = DcrtPoly::zero(&params, Format::Coefficient);
        for i in 0..digits.cols() {
            let d = digits.get(0, i).unwrap();
            assert_eq!(d.format(), Format::Coefficient);
            assert!(d.coefficients().iter().all(|c| c.bits() <= base_bits as u64));
            let weight = BigUint::one() << (base_bits as usize * i);
            acc.add_assign(&d.mul_scalar(&weight)).unwrap();
        }
        assert_eq!(acc, p.to_format(Format::Coefficient));
        assert!(p.decompose(0).is_err());
    }

    #[test]
    fn test_display_lists_towers() {
        let params = params();
        let p = DcrtPoly::from_constant(&params, &BigUint::from(1u32));
        let text = p.to_string();
        assert!(text.starts_with("DcrtPoly[EVALUATION]"));
        assert_eq!(text.matches("tower").count(), 2);
    }

    #[test]
    fn test_zeroize() {
        let params = params();
        let mut rng = seeded_rng(4);
        let mut p = DcrtPoly::sample_uniform(&params, &mut rng).unwrap();
        p.zeroize();
        assert_eq!(p, DcrtPoly::zero(&params, p.format()));
        assert!(p.towers().iter().all(|t| t.len() == p.ring_dimension()));

        let coeffs = p.coefficients();
        assert_eq!(coeffs.len(), p.ring_dimension());
        assert!(coeffs.iter().all(|c| c.is_zero()));

        let q = DcrtPoly::sample_uniform(&params, &mut rng).unwrap();
        assert_eq!(p.add(&q).unwrap(), q);
    }
}
