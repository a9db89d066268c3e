/// CRT gadget vectors and Gaussian gadget sampling
///
/// The gadget is built tower by tower. For a ring with towers q_0..q_{L-1}
/// and a base b, each tower contributes k_res digits, where k_res is the
/// smallest d with b^d ≥ max q_i (one more when balanced). Entry (t, j) of
/// the gadget, at index t·k_res + j, is the ring element whose residue is
/// b^j in tower t and 0 in every other tower:
///
/// ```text
/// g = (g_{0,0}, ..., g_{0,k_res-1}, g_{1,0}, ..., g_{L-1,k_res-1}),   k = L·k_res
/// ```
///
/// For any u ∈ R_Q, sampling z_t ∈ Z^{k_res} with Σ_j b^j z_{t,j} ≡ u (mod q_t)
/// in every tower independently yields ⟨g, z⟩ = u, because z is an integer
/// vector and the CRT idempotents separate the towers.
///
/// Per-tower sampling follows Genise–Micciancio (EUROCRYPT 2018) for an
/// arbitrary base: a perturbation drawn through the L-factor of the gadget
/// basis covariance, then a one-dimensional walk (SampleC) through the
/// basis' triangular structure.

use std::sync::Arc;

use rand::{CryptoRng, RngCore};
use tracing::trace;

use crate::dcrt_matrix::DcrtMatrix;
use crate::dcrt_poly::{DcrtPoly, Format};
use crate::error::{DcrtError, Result};
use crate::params::ParamsHandle;
use crate::sampling::sample_integer;

/// CRT gadget vector g of length k = L·k_res.
#[derive(Clone, Debug)]
pub struct GadgetVector {
    /// Ring the gadget lives in
    params: ParamsHandle,

    /// Base b (≥ 2)
    base: u64,

    /// Whether an extra digit is reserved per tower
    balanced: bool,

    /// k_res, the number of base-b digits per tower
    digits_per_tower: usize,
}

impl GadgetVector {
    /// Creates the CRT gadget for `params`.
    ///
    /// # Arguments
    /// * `params` - Ring parameters
    /// * `base` - Gadget base b (must be ≥ 2)
    /// * `balanced` - Reserve one extra digit per tower
    ///
    /// # Returns
    /// * `Result<Self>` - Gadget or `InvalidParameters` for a base below 2
    pub fn new(params: &ParamsHandle, base: u64, balanced: bool) -> Result<Self> {
        let digits_per_tower = params.gadget_digits(base, balanced)?;
        if digits_per_tower < 2 {
            return Err(DcrtError::InvalidParameters(format!(
                "Base {} leaves {} digit per tower, gadget sampling needs at least 2",
                base, digits_per_tower
            )));
        }
        Ok(Self {
            params: Arc::clone(params),
            base,
            balanced,
            digits_per_tower,
        })
    }

    pub fn base(&self) -> u64 {
        self.base
    }

    pub fn balanced(&self) -> bool {
        self.balanced
    }

    pub fn digits_per_tower(&self) -> usize {
        self.digits_per_tower
    }

    /// Total length k = L·k_res.
    pub fn len(&self) -> usize {
        self.params.tower_count() * self.digits_per_tower
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entry (t, j): residue b^j mod q_t in tower t, zero elsewhere.
    ///
    /// The element is a constant polynomial, so every EVALUATION slot of tower t
    /// holds the same value.
    pub fn entry(&self, tower: usize, digit: usize) -> Result<DcrtPoly> {
        let q = self.params.tower_modulus(tower).ok_or_else(|| {
            DcrtError::InvalidParameters(format!(
                "Tower {} out of range for {} towers",
                tower,
                self.params.tower_count()
            ))
        })?;
        let power = q.pow(self.base % q.value(), digit as u64);
        let n = self.params.ring_dimension();
        let towers = (0..self.params.tower_count())
            .map(|t| if t == tower { vec![power; n] } else { vec![0u64; n] })
            .collect();
        DcrtPoly::from_towers(&self.params, towers, Format::Evaluation)
    }

    /// g as a 1×k matrix in EVALUATION format.
    pub fn to_matrix(&self) -> Result<DcrtMatrix> {
        let mut entries = Vec::with_capacity(self.len());
        for tower in 0..self.params.tower_count() {
            for digit in 0..self.digits_per_tower {
                entries.push(self.entry(tower, digit)?);
            }
        }
        DcrtMatrix::from_elements(&self.params, 1, self.len(), entries)
    }

    /// G = I_d ⊗ g, a d×dk matrix with g on the block diagonal.
    pub fn gadget_matrix(&self, dimension: usize) -> Result<DcrtMatrix> {
        let k = self.len();
        let g = self.to_matrix()?;
        let mut matrix = DcrtMatrix::create(&self.params, dimension, dimension * k)?;
        for i in 0..dimension {
            for j in 0..k {
                matrix.set(i, i * k + j, g.element(0, j)?)?;
            }
        }
        Ok(matrix)
    }

    /// ⟨g, z⟩ for a length-k slice of EVALUATION polynomials.
    pub fn recompose(&self, digits: &[DcrtPoly]) -> Result<DcrtPoly> {
        if digits.len() != self.len() {
            return Err(DcrtError::InvalidDimension {
                expected: self.len(),
                got: digits.len(),
            });
        }
        let mut acc = DcrtPoly::zero(&self.params, Format::Evaluation);
        for (index, z) in digits.iter().enumerate() {
            let g = self.entry(index / self.digits_per_tower, index % self.digits_per_tower)?;
            acc.add_assign(&g.multiply(z)?)?;
        }
        Ok(acc)
    }

    /// Samples z with ⟨g, z⟩ = `syndrome`.
    ///
    /// # Arguments
    /// * `syndrome` - Target element (any format)
    /// * `c` - Gaussian width (b + 1)·σ of the gadget sampler
    /// * `rng` - Randomness source
    ///
    /// # Returns
    /// * `Result<Vec<DcrtPoly>>` - k digit polynomials in EVALUATION format,
    ///   ordered tower-major like the gadget itself
    pub fn sample_preimage<R: RngCore + CryptoRng>(
        &self,
        syndrome: &DcrtPoly,
        c: f64,
        rng: &mut R,
    ) -> Result<Vec<DcrtPoly>> {
        let syndrome = syndrome.to_format(Format::Coefficient);
        let n = self.params.ring_dimension();
        let mut out = Vec::with_capacity(self.len());
        for tower in 0..self.params.tower_count() {
            let digits = gauss_samp_gq_arb_base(&syndrome, c, self.base, self.digits_per_tower, tower, rng)?;
            for row in digits.chunks(n) {
                out.push(DcrtPoly::from_signed_coefficients(&self.params, row, Format::Evaluation)?);
            }
        }
        Ok(out)
    }
}

/// The `count` least significant base-`base` digits of `value`.
pub fn base_digits(value: u64, base: u64, count: usize) -> Vec<i64> {
    let mut digits = Vec::with_capacity(count);
    let mut rest = value;
    for _ in 0..count {
        digits.push((rest % base) as i64);
        rest /= base;
    }
    digits
}

/// Per-tower constants of the arbitrary-base gadget sampler.
struct ArbBaseTables {
    base: f64,
    sigma: f64,
    /// Diagonal of the perturbation L-factor
    l: Vec<f64>,
    /// Sub-diagonal of the perturbation L-factor
    h: Vec<f64>,
    /// Last column of the gadget basis after forward substitution
    d: Vec<f64>,
    modulus_digits: Vec<i64>,
}

impl ArbBaseTables {
    fn new(modulus: u64, base: u64, k: usize, c: f64) -> Self {
        let b = base as f64;
        let kf = k as f64;
        let modulus_digits = base_digits(modulus, base, k);

        let mut l = vec![0.0; k];
        l[0] = (b * (1.0 + 1.0 / kf) + 1.0).sqrt();
        for (i, li) in l.iter_mut().enumerate().skip(1) {
            *li = (b * (1.0 + 1.0 / (kf - i as f64))).sqrt();
        }

        let mut h = vec![0.0; k];
        for (i, hi) in h.iter_mut().enumerate().skip(1) {
            *hi = (b * (1.0 - 1.0 / (kf - (i as f64 - 1.0)))).sqrt();
        }

        let mut d = vec![0.0; k];
        d[0] = modulus_digits[0] as f64 / b;
        for i in 1..k {
            d[i] = (d[i - 1] + modulus_digits[i] as f64) / b;
        }

        Self {
            base: b,
            sigma: c / (b + 1.0),
            l,
            h,
            d,
            modulus_digits,
        }
    }

    /// Integer perturbation whose covariance follows the gadget basis.
    fn perturb<R: RngCore + CryptoRng>(&self, rng: &mut R) -> Vec<i64> {
        let k = self.l.len();
        let base = self.base as i64;
        let mut z = vec![0i64; k];
        let mut center = 0.0;
        for i in 0..k {
            z[i] = sample_integer(rng, center / self.l[i], self.sigma / self.l[i]);
            if i + 1 < k {
                center = -(z[i] as f64) * self.h[i + 1];
            }
        }

        let mut p = vec![0i64; k];
        p[0] = (2 * base + 1) * z[0] + base * z[1];
        for i in 1..k - 1 {
            p[i] = base * (z[i - 1] + 2 * z[i] + z[i + 1]);
        }
        p[k - 1] = base * (z[k - 2] + 2 * z[k - 1]);
        p
    }

    /// One-dimensional walk through the triangular gadget basis.
    fn sample_c<R: RngCore + CryptoRng>(&self, a: &mut [f64], rng: &mut R) -> Vec<i64> {
        let k = a.len();
        let mut z = vec![0i64; k];
        let last = self.d[k - 1];
        z[k - 1] = sample_integer(rng, -a[k - 1] / last, self.sigma / last);
        for i in 0..k - 1 {
            a[i] -= z[k - 1] as f64 * self.d[i];
            z[i] = sample_integer(rng, -a[i], self.sigma);
        }
        z
    }

    /// Digits t ∈ Z^k with Σ b^i t_i ≡ value (mod q).
    fn sample<R: RngCore + CryptoRng>(&self, value: u64, rng: &mut R) -> Vec<i64> {
        let k = self.l.len();
        let base = self.base as i64;
        let v = base_digits(value, base as u64, k);
        let p = self.perturb(rng);

        let mut a = vec![0.0; k];
        a[0] = (v[0] - p[0]) as f64 / self.base;
        for i in 1..k {
            a[i] = (a[i - 1] + (v[i] - p[i]) as f64) / self.base;
        }
        let z = self.sample_c(&mut a, rng);

        let q = &self.modulus_digits;
        let mut t = vec![0i64; k];
        t[0] = base * z[0] + q[0] * z[k - 1] + v[0];
        for i in 1..k - 1 {
            t[i] = base * z[i] - z[i - 1] + q[i] * z[k - 1] + v[i];
        }
        t[k - 1] = q[k - 1] * z[k - 1] - z[k - 2] + v[k - 1];
        t
    }
}

/// Gaussian gadget sampling for one tower and an arbitrary base.
///
/// For every coefficient u_i of `syndrome` in tower `tower_index`, samples
/// z ∈ Z^digits with Σ_j base^j z_j ≡ u_i (mod q_t), following the gadget
/// lattice Gaussian of width σ = c / (base + 1).
///
/// # Arguments
/// * `syndrome` - Target polynomial, must be in COEFFICIENT format
/// * `c` - Gaussian width (base + 1)·σ
/// * `base` - Gadget base (≥ 2)
/// * `digits` - Digits per coefficient (≥ 2, base^digits ≥ q_t)
/// * `tower_index` - Tower t whose residues are decomposed
/// * `rng` - Randomness source
///
/// # Returns
/// * `Result<Vec<i64>>` - Row-major digits×n matrix: entry (j, i) is digit j
///   of coefficient i
pub fn gauss_samp_gq_arb_base<R: RngCore + CryptoRng>(
    syndrome: &DcrtPoly,
    c: f64,
    base: u64,
    digits: usize,
    tower_index: usize,
    rng: &mut R,
) -> Result<Vec<i64>> {
    if syndrome.format() != Format::Coefficient {
        return Err(DcrtError::FormatRequired {
            required: Format::Coefficient,
            found: syndrome.format(),
        });
    }
    if !c.is_finite() || c <= 0.0 {
        return Err(DcrtError::InvalidParameters(format!(
            "Gadget sampling width must be positive, got {}",
            c
        )));
    }
    if base < 2 || digits < 2 {
        return Err(DcrtError::InvalidParameters(format!(
            "Gadget sampling needs base ≥ 2 and at least 2 digits, got base {} with {} digits",
            base, digits
        )));
    }
    let params = syndrome.params();
    let q = params.tower_modulus(tower_index).ok_or_else(|| {
        DcrtError::InvalidParameters(format!(
            "Tower {} out of range for {} towers",
            tower_index,
            params.tower_count()
        ))
    })?;
    let capacity = (base as u128).checked_pow(digits as u32);
    if capacity.map_or(false, |cap| cap < q.value() as u128) {
        return Err(DcrtError::InvalidParameters(format!(
            "{} base-{} digits cannot represent residues modulo {}",
            digits,
            base,
            q.value()
        )));
    }

    let residues = syndrome.tower(tower_index).ok_or_else(|| {
        DcrtError::InvalidParameters(format!("Tower {} missing", tower_index))
    })?;
    let tables = ArbBaseTables::new(q.value(), base, digits, c);
    trace!(tower = tower_index, modulus = q.value(), digits, "gadget sampling");

    let n = residues.len();
    let mut out = vec![0i64; digits * n];
    for (i, &u) in residues.iter().enumerate() {
        let t = tables.sample(u, rng);
        for (j, &digit) in t.iter().enumerate() {
            out[j * n + i] = digit;
        }
    }
    Ok(out)
}
