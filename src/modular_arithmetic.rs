/// Native-width modular arithmetic for the individual CRT towers.
///
/// Every tower modulus is a prime below 2^60, so all products fit in a `u128`
/// before reduction. Residues are kept in standard representation `[0, q)`;
/// signed inputs (Gaussian samples, gadget digits) are mapped into that range
/// with `reduce_i64`.
///
/// The primality test is the deterministic Miller-Rabin variant for 64-bit
/// integers, which is what the prime search in `params` relies on.

use crate::error::{DcrtError, Result};

/// Largest supported tower width in bits.
pub const MAX_MODULUS_BITS: u32 = 60;

/// A single native prime modulus with the arithmetic needed by one tower.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NativeModulus {
    value: u64,
}

impl NativeModulus {
    /// Wraps a modulus value.
    ///
    /// # Arguments
    /// * `value` - Modulus q (must satisfy 2 ≤ q < 2^60)
    ///
    /// # Returns
    /// * `Result<Self>` - Validated modulus or `InvalidModulus`
    pub fn new(value: u64) -> Result<Self> {
        if value < 2 || value >= (1u64 << MAX_MODULUS_BITS) {
            return Err(DcrtError::InvalidModulus(format!(
                "Native modulus {} outside supported range [2, 2^{})",
                value, MAX_MODULUS_BITS
            )));
        }
        Ok(Self { value })
    }

    /// Returns q.
    #[inline]
    pub fn value(&self) -> u64 {
        self.value
    }

    /// (a + b) mod q for a, b < q.
    #[inline]
    pub fn add(&self, a: u64, b: u64) -> u64 {
        let sum = a + b;
        if sum >= self.value {
            sum - self.value
        } else {
            sum
        }
    }

    /// (a - b) mod q for a, b < q.
    #[inline]
    pub fn sub(&self, a: u64, b: u64) -> u64 {
        if a >= b {
            a - b
        } else {
            self.value - b + a
        }
    }

    /// (-a) mod q for a < q.
    #[inline]
    pub fn neg(&self, a: u64) -> u64 {
        if a == 0 {
            0
        } else {
            self.value - a
        }
    }

    /// (a * b) mod q using a 128-bit intermediate.
    #[inline]
    pub fn mul(&self, a: u64, b: u64) -> u64 {
        ((a as u128 * b as u128) % self.value as u128) as u64
    }

    /// base^exp mod q by square-and-multiply.
    pub fn pow(&self, base: u64, mut exp: u64) -> u64 {
        let mut result = 1 % self.value;
        let mut base = base % self.value;
        while exp > 0 {
            if exp & 1 == 1 {
                result = self.mul(result, base);
            }
            exp >>= 1;
            base = self.mul(base, base);
        }
        result
    }

    /// Multiplicative inverse by the extended Euclidean algorithm.
    ///
    /// # Returns
    /// * `Result<u64>` - a^{-1} mod q, or `InvalidParameters` when gcd(a, q) ≠ 1
    pub fn inv(&self, a: u64) -> Result<u64> {
        let (mut t, mut new_t) = (0i128, 1i128);
        let (mut r, mut new_r) = (self.value as i128, (a % self.value) as i128);

        while new_r != 0 {
            let quotient = r / new_r;
            (t, new_t) = (new_t, t - quotient * new_t);
            (r, new_r) = (new_r, r - quotient * new_r);
        }

        if r != 1 {
            return Err(DcrtError::InvalidParameters(format!(
                "{} is not invertible modulo {}",
                a, self.value
            )));
        }
        if t < 0 {
            t += self.value as i128;
        }
        Ok(t as u64)
    }

    /// Maps a signed integer into `[0, q)`.
    #[inline]
    pub fn reduce_i64(&self, x: i64) -> u64 {
        let r = (x as i128).rem_euclid(self.value as i128);
        r as u64
    }

    /// Maps a residue to the centered interval `(-q/2, q/2]`.
    #[inline]
    pub fn center(&self, a: u64) -> i64 {
        if a > self.value / 2 {
            a as i64 - self.value as i64
        } else {
            a as i64
        }
    }
}

/// Deterministic Miller-Rabin primality test for 64-bit integers.
///
/// The witness set {2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37} is exact for
/// every n < 3.3·10^24, which covers the whole `u64` range.
pub fn is_prime(n: u64) -> bool {
    if n < 2 {
        return false;
    }
    const WITNESSES: [u64; 12] = [2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37];
    for &p in WITNESSES.iter() {
        if n % p == 0 {
            return n == p;
        }
    }

    let mut d = n - 1;
    let mut r = 0u32;
    while d % 2 == 0 {
        d /= 2;
        r += 1;
    }

    let mul = |a: u64, b: u64| ((a as u128 * b as u128) % n as u128) as u64;
    let pow = |mut base: u64, mut exp: u64| {
        let mut result = 1u64;
        while exp > 0 {
            if exp & 1 == 1 {
                result = mul(result, base);
            }
            exp >>= 1;
            base = mul(base, base);
        }
        result
    };

    'witness: for &a in WITNESSES.iter() {
        let mut x = pow(a, d);
        if x == 1 || x == n - 1 {
            continue;
        }
        for _ in 1..r {
            x = mul(x, x);
            if x == n - 1 {
                continue 'witness;
            }
        }
        return false;
    }
    true
}
