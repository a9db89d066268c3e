/// Negacyclic Number Theoretic Transform for one CRT tower
///
/// The transform is defined over Zq[X]/(X^n + 1) with q ≡ 1 (mod 2n), which
/// guarantees a primitive 2n-th root of unity ψ with ψ^n ≡ -1 (mod q).
///
/// Layout:
/// - Forward: Cooley-Tukey butterflies, natural-order input, bit-reversed output
/// - Inverse: Gentleman-Sande butterflies, bit-reversed input, natural output
/// - Twiddles are powers of ψ stored in bit-reversed order, so no explicit
///   permutation pass is needed in either direction
///
/// Pointwise multiplication of two forward transforms equals the negacyclic
/// convolution of the coefficient vectors, which is what ring multiplication
/// in EVALUATION format relies on.

use crate::error::{DcrtError, Result};
use crate::modular_arithmetic::NativeModulus;

/// Precomputed twiddle factors for a single (n, q) pair.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NttTables {
    /// Ring dimension n (power of two)
    dimension: usize,

    /// Tower modulus q ≡ 1 (mod 2n)
    modulus: NativeModulus,

    /// Primitive 2n-th root of unity ψ
    root_of_unity: u64,

    /// ψ^{bitrev(i)} for i in 0..n
    psi_rev: Vec<u64>,

    /// ψ^{-bitrev(i)} for i in 0..n
    psi_inv_rev: Vec<u64>,

    /// n^{-1} mod q for inverse scaling
    dimension_inv: u64,
}

impl NttTables {
    /// Builds the tables for dimension `n` and prime modulus `q`.
    ///
    /// # Arguments
    /// * `dimension` - Ring dimension n (power of two, n ≥ 2)
    /// * `modulus` - Prime modulus with q ≡ 1 (mod 2n)
    ///
    /// # Returns
    /// * `Result<Self>` - Tables or `InvalidParameters` if q is not NTT friendly
    pub fn new(dimension: usize, modulus: NativeModulus) -> Result<Self> {
        if dimension < 2 || !dimension.is_power_of_two() {
            return Err(DcrtError::InvalidParameters(format!(
                "NTT dimension must be a power of two ≥ 2, got {}",
                dimension
            )));
        }
        let q = modulus.value();
        let two_n = 2 * dimension as u64;
        if q % two_n != 1 {
            return Err(DcrtError::InvalidParameters(format!(
                "Modulus {} is not NTT friendly for n = {} (q mod 2n = {})",
                q,
                dimension,
                q % two_n
            )));
        }

        let psi = Self::find_root_of_unity(dimension, modulus)?;
        let psi_inv = modulus.inv(psi)?;
        let log_n = dimension.trailing_zeros();

        let mut psi_rev = vec![0u64; dimension];
        let mut psi_inv_rev = vec![0u64; dimension];
        let mut power = 1u64;
        let mut power_inv = 1u64;
        for i in 0..dimension {
            let rev = bit_reverse(i, log_n);
            psi_rev[rev] = power;
            psi_inv_rev[rev] = power_inv;
            power = modulus.mul(power, psi);
            power_inv = modulus.mul(power_inv, psi_inv);
        }

        let dimension_inv = modulus.inv(dimension as u64 % q)?;

        Ok(Self {
            dimension,
            modulus,
            root_of_unity: psi,
            psi_rev,
            psi_inv_rev,
            dimension_inv,
        })
    }

    /// Smallest ψ = x^{(q-1)/2n} with ψ^n ≡ -1 (mod q).
    ///
    /// ψ^n = -1 forces the order of ψ to be exactly 2n since 2n is a power
    /// of two, so no further primitivity check is required.
    fn find_root_of_unity(dimension: usize, modulus: NativeModulus) -> Result<u64> {
        let q = modulus.value();
        let exponent = (q - 1) / (2 * dimension as u64);
        for candidate in 2..q {
            let psi = modulus.pow(candidate, exponent);
            if modulus.pow(psi, dimension as u64) == q - 1 {
                return Ok(psi);
            }
        }
        Err(DcrtError::InvalidModulus(format!(
            "No primitive {}-th root of unity modulo {}",
            2 * dimension,
            q
        )))
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn modulus(&self) -> NativeModulus {
        self.modulus
    }

    pub fn root_of_unity(&self) -> u64 {
        self.root_of_unity
    }

    /// In-place forward transform (COEFFICIENT → EVALUATION).
    pub fn forward(&self, values: &mut [u64]) {
        debug_assert_eq!(values.len(), self.dimension);
        let q = self.modulus;
        let n = self.dimension;
        let mut t = n;
        let mut m = 1;
        while m < n {
            t >>= 1;
            for i in 0..m {
                let j1 = 2 * i * t;
                let s = self.psi_rev[m + i];
                for j in j1..j1 + t {
                    let u = values[j];
                    let v = q.mul(values[j + t], s);
                    values[j] = q.add(u, v);
                    values[j + t] = q.sub(u, v);
                }
            }
            m <<= 1;
        }
    }

    /// In-place inverse transform (EVALUATION → COEFFICIENT).
    pub fn inverse(&self, values: &mut [u64]) {
        debug_assert_eq!(values.len(), self.dimension);
        let q = self.modulus;
        let n = self.dimension;
        let mut t = 1;
        let mut m = n;
        while m > 1 {
            let h = m >> 1;
            let mut j1 = 0;
            for i in 0..h {
                let s = self.psi_inv_rev[h + i];
                for j in j1..j1 + t {
                    let u = values[j];
                    let v = values[j + t];
                    values[j] = q.add(u, v);
                    values[j + t] = q.mul(q.sub(u, v), s);
                }
                j1 += 2 * t;
            }
            t <<= 1;
            m = h;
        }
        for value in values.iter_mut() {
            *value = q.mul(*value, self.dimension_inv);
        }
    }
}

/// Reverses the low `bits` bits of `x`.
#[inline]
pub fn bit_reverse(x: usize, bits: u32) -> usize {
    if bits == 0 {
        return 0;
    }
    x.reverse_bits() >> (usize::BITS - bits)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schoolbook_negacyclic(a: &[u64], b: &[u64], q: NativeModulus) -> Vec<u64> {
        let n = a.len();
        let mut out = vec![0u64; n];
        for i in 0..n {
            for j in 0..n {
                let prod = q.mul(a[i], b[j]);
                let k = i + j;
                if k < n {
                    out[k] = q.add(out[k], prod);
                } else {
                    out[k - n] = q.sub(out[k - n], prod);
                }
            }
        }
        out
    }

    #[test]
    fn test_bit_reverse() {
        assert_eq!(bit_reverse(0b001, 3), 0b100);
        assert_eq!(bit_reverse(0b110, 3), 0b011);
        assert_eq!(bit_reverse(5, 0), 0);
    }

    #[test]
    fn test_root_of_unity_order() {
        let q = NativeModulus::new(7681).unwrap();
        let tables = NttTables::new(256, q).unwrap();
        let psi = tables.root_of_unity();
        assert_eq!(q.pow(psi, 256), 7680);
        assert_eq!(q.pow(psi, 512), 1);
    }

    #[test]
    fn test_forward_inverse_round_trip() {
        let q = NativeModulus::new(12289).unwrap();
        let tables = NttTables::new(16, q).unwrap();
        let original: Vec<u64> = (0..16).map(|i| (i * 977 + 3) % 12289).collect();
        let mut values = original.clone();
        tables.forward(&mut values);
        assert_ne!(values, original);
        tables.inverse(&mut values);
        assert_eq!(values, original);
    }

    #[test]
    fn test_pointwise_product_is_negacyclic_convolution() {
        let q = NativeModulus::new(12289).unwrap();
        let tables = NttTables::new(8, q).unwrap();
        let a: Vec<u64> = vec![1, 2, 3, 4, 5, 6, 7, 8];
        let b: Vec<u64> = vec![12288, 0, 5, 0, 0, 11, 0, 1];
        let expected = schoolbook_negacyclic(&a, &b, q);

        let mut fa = a.clone();
        let mut fb = b.clone();
        tables.forward(&mut fa);
        tables.forward(&mut fb);
        let mut prod: Vec<u64> = fa.iter().zip(fb.iter()).map(|(&x, &y)| q.mul(x, y)).collect();
        tables.inverse(&mut prod);
        assert_eq!(prod, expected);
    }

    #[test]
    fn test_rejects_unfriendly_modulus() {
        let q = NativeModulus::new(97).unwrap();
        assert!(NttTables::new(64, q).is_err());
        let q = NativeModulus::new(12289).unwrap();
        assert!(NttTables::new(12, q).is_err());
    }
}
