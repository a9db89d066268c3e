//! Chinese Remainder Theorem helpers for the tower moduli.
//!
//! A value modulo Q = ∏ q_i is represented by its residues modulo each q_i.
//! Decomposition is a plain reduction; interpolation uses the standard
//! Garner-free formula
//!
//!   x = Σ [r_i · (Q/q_i)^{-1} mod q_i] · (Q/q_i)  (mod Q)

use num_bigint::{BigInt, BigUint};
use num_traits::{ToPrimitive, Zero};

use crate::error::{DcrtError, Result};
use crate::modular_arithmetic::NativeModulus;

/// Precomputed CRT constants for a fixed list of pairwise coprime moduli.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CrtBasis {
    moduli: Vec<NativeModulus>,
    modulus: BigUint,
    half_modulus: BigUint,
    /// Q / q_i
    q_hat: Vec<BigUint>,
    /// (Q / q_i)^{-1} mod q_i
    q_hat_inv: Vec<u64>,
}

impl CrtBasis {
    pub fn new(moduli: &[NativeModulus]) -> Result<Self> {
        if moduli.is_empty() {
            return Err(DcrtError::InvalidParameters(
                "CRT basis needs at least one modulus".to_string(),
            ));
        }

        let modulus = moduli
            .iter()
            .fold(BigUint::from(1u32), |acc, q| acc * q.value());

        let mut q_hat = Vec::with_capacity(moduli.len());
        let mut q_hat_inv = Vec::with_capacity(moduli.len());
        for q in moduli {
            let hat = &modulus / q.value();
            let hat_mod_q = (&hat % q.value())
                .to_u64()
                .ok_or_else(|| DcrtError::InvalidModulus("CRT residue overflow".to_string()))?;
            q_hat_inv.push(q.inv(hat_mod_q)?);
            q_hat.push(hat);
        }

        let half_modulus = &modulus >> 1;
        Ok(Self {
            moduli: moduli.to_vec(),
            modulus,
            half_modulus,
            q_hat,
            q_hat_inv,
        })
    }

    /// Composite modulus Q.
    pub fn modulus(&self) -> &BigUint {
        &self.modulus
    }

    pub fn moduli(&self) -> &[NativeModulus] {
        &self.moduli
    }

    /// Residues of `value` modulo every q_i.
    pub fn decompose(&self, value: &BigUint) -> Vec<u64> {
        self.moduli
            .iter()
            .map(|q| {
                // A residue is strictly below q < 2^60.
                (value % q.value()).to_u64().unwrap_or_default()
            })
            .collect()
    }

    /// Residues of a signed value, reduced into `[0, q_i)`.
    pub fn decompose_signed(&self, value: &BigInt) -> Vec<u64> {
        self.moduli
            .iter()
            .map(|q| {
                let m = BigInt::from(q.value());
                let r = ((value % &m) + &m) % &m;
                r.to_u64().unwrap_or_default()
            })
            .collect()
    }

    /// Reconstructs the unique value in `[0, Q)` with the given residues.
    pub fn interpolate(&self, residues: &[u64]) -> BigUint {
        debug_assert_eq!(residues.len(), self.moduli.len());
        let mut acc = BigUint::zero();
        for (i, q) in self.moduli.iter().enumerate() {
            let scaled = q.mul(residues[i] % q.value(), self.q_hat_inv[i]);
            acc += &self.q_hat[i] * scaled;
        }
        acc % &self.modulus
    }

    /// Same as `interpolate`, mapped to `(-Q/2, Q/2]`.
    pub fn interpolate_centered(&self, residues: &[u64]) -> BigInt {
        let value = self.interpolate(residues);
        if value > self.half_modulus {
            BigInt::from(value) - BigInt::from(self.modulus.clone())
        } else {
            BigInt::from(value)
        }
    }
}
