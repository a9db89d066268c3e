/// Ring parameters for power-of-two cyclotomic rings in double-CRT form
///
/// A `RingParams` describes R_Q = Z_Q[X]/(X^n + 1) with Q = ∏ q_i, where every
/// tower modulus q_i is a prime congruent to 1 modulo the cyclotomic order
/// m = 2n. The primes are derived deterministically from (n, L, b):
///
/// - q_0 is the largest prime below 2^b with q_0 ≡ 1 (mod 2n)
/// - q_{i+1} is the next smaller prime with the same congruence
///
/// Parameters are immutable after construction and handed out as
/// `ParamsHandle = Arc<RingParams>`, so every polynomial and matrix built
/// against one context shares the same precomputed NTT and CRT tables.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::sync::Arc;

use num_bigint::BigUint;
use tracing::debug;

use crate::crt::CrtBasis;
use crate::error::{DcrtError, Result};
use crate::modular_arithmetic::{is_prime, NativeModulus, MAX_MODULUS_BITS};
use crate::ntt::NttTables;

/// Smallest tower width accepted by the prime search.
pub const MIN_MODULUS_BITS: u32 = 2;

/// Shared read-only handle to a ring context.
pub type ParamsHandle = Arc<RingParams>;

/// Immutable descriptor of a double-CRT cyclotomic ring.
#[derive(Debug)]
pub struct RingParams {
    /// Ring dimension n = m / 2
    ring_dimension: usize,

    /// Requested bit width of every tower modulus
    bit_width: u32,

    /// Tower moduli q_0 > q_1 > ... > q_{L-1}
    moduli: Vec<NativeModulus>,

    /// Per-tower NTT tables, indexed like `moduli`
    ntt_tables: Vec<NttTables>,

    /// CRT constants for decomposition and interpolation modulo Q
    crt: CrtBasis,
}

impl RingParams {
    /// Derives ring parameters from the ring dimension.
    ///
    /// # Arguments
    /// * `ring_dimension` - n (power of two, n ≥ 2)
    /// * `tower_count` - L (number of CRT towers, ≥ 1)
    /// * `bit_width` - b (each q_i < 2^b, 2 ≤ b ≤ 60)
    ///
    /// # Returns
    /// * `Result<ParamsHandle>` - Shared parameters or error
    ///
    /// # Errors
    /// - `InvalidParameters` if n is not a power of two or L is zero
    /// - `InvalidModulus` if the bit width is unsupported or fewer than L
    ///   suitable primes exist below 2^b
    pub fn new(ring_dimension: usize, tower_count: usize, bit_width: u32) -> Result<ParamsHandle> {
        if ring_dimension < 2 || !ring_dimension.is_power_of_two() {
            return Err(DcrtError::InvalidParameters(format!(
                "Ring dimension must be a power of two ≥ 2, got {}",
                ring_dimension
            )));
        }
        if tower_count == 0 {
            return Err(DcrtError::InvalidParameters(
                "Tower count must be at least 1".to_string(),
            ));
        }
        if !(MIN_MODULUS_BITS..=MAX_MODULUS_BITS).contains(&bit_width) {
            return Err(DcrtError::InvalidModulus(format!(
                "Bit width {} outside supported range [{}, {}]",
                bit_width, MIN_MODULUS_BITS, MAX_MODULUS_BITS
            )));
        }

        let moduli = generate_ntt_primes(ring_dimension, tower_count, bit_width)?;
        let ntt_tables = moduli
            .iter()
            .map(|&q| NttTables::new(ring_dimension, q))
            .collect::<Result<Vec<_>>>()?;
        let crt = CrtBasis::new(&moduli)?;

        debug!(
            ring_dimension,
            tower_count,
            bit_width,
            moduli = ?moduli.iter().map(|q| q.value()).collect::<Vec<_>>(),
            "derived ring parameters"
        );

        Ok(Arc::new(Self {
            ring_dimension,
            bit_width,
            moduli,
            ntt_tables,
            crt,
        }))
    }

    /// Derives ring parameters from the cyclotomic order m = 2n.
    pub fn from_cyclotomic_order(
        cyclotomic_order: usize,
        tower_count: usize,
        bit_width: u32,
    ) -> Result<ParamsHandle> {
        if cyclotomic_order < 4 || !cyclotomic_order.is_power_of_two() {
            return Err(DcrtError::InvalidParameters(format!(
                "Cyclotomic order must be a power of two ≥ 4, got {}",
                cyclotomic_order
            )));
        }
        Self::new(cyclotomic_order / 2, tower_count, bit_width)
    }

    /// Ring dimension n.
    pub fn ring_dimension(&self) -> usize {
        self.ring_dimension
    }

    /// Cyclotomic order m = 2n.
    pub fn cyclotomic_order(&self) -> usize {
        2 * self.ring_dimension
    }

    /// Number of CRT towers L.
    pub fn tower_count(&self) -> usize {
        self.moduli.len()
    }

    /// Requested tower bit width b.
    pub fn bit_width(&self) -> u32 {
        self.bit_width
    }

    /// Tower moduli.
    pub fn moduli(&self) -> &[NativeModulus] {
        &self.moduli
    }

    /// Modulus of tower `index`.
    pub fn tower_modulus(&self, index: usize) -> Option<NativeModulus> {
        self.moduli.get(index).copied()
    }

    /// Composite modulus Q = ∏ q_i.
    pub fn modulus(&self) -> BigUint {
        self.crt.modulus().clone()
    }

    /// Composite modulus in decimal.
    pub fn modulus_string(&self) -> String {
        self.crt.modulus().to_str_radix(10)
    }

    /// Bit length of Q.
    pub fn modulus_bits(&self) -> u64 {
        self.crt.modulus().bits()
    }

    pub fn ntt_tables(&self) -> &[NttTables] {
        &self.ntt_tables
    }

    pub fn crt(&self) -> &CrtBasis {
        &self.crt
    }

    /// Number of base-`base` digits needed per tower.
    ///
    /// This is the smallest d with base^d ≥ max q_i, plus one extra digit
    /// for the balanced representation.
    pub fn gadget_digits(&self, base: u64, balanced: bool) -> Result<usize> {
        if base < 2 {
            return Err(DcrtError::InvalidParameters(format!(
                "Gadget base must be ≥ 2, got {}",
                base
            )));
        }
        let max_q = self.moduli.iter().map(|q| q.value()).max().unwrap_or(2) as u128;
        let mut digits = 0usize;
        let mut power = 1u128;
        while power < max_q {
            power *= base as u128;
            digits += 1;
        }
        Ok(if balanced { digits + 1 } else { digits })
    }

    /// Total gadget length k = L · digits-per-tower.
    pub fn gadget_length(&self, base: u64, balanced: bool) -> Result<usize> {
        Ok(self.tower_count() * self.gadget_digits(base, balanced)?)
    }

    /// True when both contexts describe the same ring.
    pub fn is_compatible(&self, other: &RingParams) -> bool {
        self.ring_dimension == other.ring_dimension && self.moduli == other.moduli
    }
}

impl PartialEq for RingParams {
    fn eq(&self, other: &Self) -> bool {
        self.is_compatible(other)
    }
}

impl Eq for RingParams {}

impl Display for RingParams {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(
            f,
            "RingParams(n={}, towers={}, moduli=[",
            self.ring_dimension,
            self.moduli.len()
        )?;
        for (i, q) in self.moduli.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", q.value())?;
        }
        write!(f, "])")
    }
}

/// Finds `count` distinct primes q < 2^bits with q ≡ 1 (mod 2n), largest first.
fn generate_ntt_primes(ring_dimension: usize, count: usize, bits: u32) -> Result<Vec<NativeModulus>> {
    let order = 2 * ring_dimension as u64;
    let upper = 1u64 << bits;

    // Largest candidate below 2^bits in the residue class 1 mod 2n.
    if upper <= order {
        return Err(DcrtError::InvalidModulus(format!(
            "2^{} is too small for cyclotomic order {}",
            bits, order
        )));
    }
    let mut candidate = upper - ((upper - 1) % order);
    if candidate >= upper {
        candidate -= order;
    }

    let mut primes = Vec::with_capacity(count);
    while primes.len() < count {
        if candidate <= order {
            return Err(DcrtError::InvalidModulus(format!(
                "Only {} primes ≡ 1 mod {} found below 2^{}, {} requested",
                primes.len(),
                order,
                bits,
                count
            )));
        }
        if is_prime(candidate) {
            primes.push(NativeModulus::new(candidate)?);
        }
        candidate -= order;
    }
    Ok(primes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prime_derivation() {
        let params = RingParams::new(16, 2, 30).unwrap();
        assert_eq!(params.ring_dimension(), 16);
        assert_eq!(params.cyclotomic_order(), 32);
        assert_eq!(params.tower_count(), 2);

        let moduli: Vec<u64> = params.moduli().iter().map(|q| q.value()).collect();
        assert_ne!(moduli[0], moduli[1], "Tower moduli must be distinct");
        for &q in &moduli {
            assert!(is_prime(q));
            assert_eq!(q % 32, 1, "q must be 1 mod 2n");
            assert!(q < 1 << 30);
            assert!(q > 1 << 29, "q should be close to 2^b");
        }
        assert!(moduli[0] > moduli[1], "Primes are produced largest first");
    }

    #[test]
    fn test_deterministic() {
        let a = RingParams::new(64, 3, 40).unwrap();
        let b = RingParams::new(64, 3, 40).unwrap();
        assert_eq!(*a, *b);
        assert_eq!(a.modulus_string(), b.modulus_string());
    }

    #[test]
    fn test_composite_modulus() {
        let params = RingParams::new(16, 2, 30).unwrap();
        let q0 = BigUint::from(params.moduli()[0].value());
        let q1 = BigUint::from(params.moduli()[1].value());
        assert_eq!(params.modulus(), q0 * q1);
        assert_eq!(params.modulus_string(), params.modulus().to_str_radix(10));
    }

    #[test]
    fn test_cyclotomic_order_constructor() {
        let params = RingParams::from_cyclotomic_order(32, 4, 51).unwrap();
        assert_eq!(params.ring_dimension(), 16);
        assert_eq!(params.tower_count(), 4);
        assert!(RingParams::from_cyclotomic_order(24, 1, 30).is_err());
    }

    #[test]
    fn test_invalid_inputs() {
        assert!(matches!(
            RingParams::new(12, 1, 30),
            Err(DcrtError::InvalidParameters(_))
        ));
        assert!(matches!(
            RingParams::new(16, 0, 30),
            Err(DcrtError::InvalidParameters(_))
        ));
        assert!(matches!(
            RingParams::new(16, 1, 61),
            Err(DcrtError::InvalidModulus(_))
        ));
        // Only a handful of primes ≡ 1 mod 32 exist below 2^8.
        assert!(matches!(
            RingParams::new(16, 50, 8),
            Err(DcrtError::InvalidModulus(_))
        ));
    }

    #[test]
    fn test_gadget_digits() {
        // Four 51-bit towers with base 8 give 17 digits each.
        let params = RingParams::new(16, 4, 51).unwrap();
        assert_eq!(params.gadget_digits(8, false).unwrap(), 17);
        assert_eq!(params.gadget_length(8, false).unwrap(), 68);
        assert_eq!(params.gadget_digits(2, false).unwrap(), 51);
        assert_eq!(params.gadget_digits(2, true).unwrap(), 52);
        assert!(params.gadget_digits(1, false).is_err());
    }
}
