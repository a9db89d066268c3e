//! Double-CRT polynomial rings, polynomial matrices and RLWE trapdoor sampling.
//!
//! Elements of R_Q = Z_Q[X]/(X^n + 1) are stored as one residue polynomial per
//! NTT-friendly prime tower. On top of that the crate provides row-major
//! matrices of ring elements and a gadget-based trapdoor with Gaussian
//! preimage sampling.
//!
//! All sampling takes an explicit RNG, so a seeded `ChaCha20Rng` reproduces
//! every run.

pub mod crt;
pub mod dcrt_matrix;
pub mod dcrt_poly;
pub mod error;
pub mod gadget;
pub mod modular_arithmetic;
pub mod ntt;
pub mod params;
pub mod sampling;
pub mod serialize;
pub mod trapdoor;

pub use dcrt_matrix::DcrtMatrix;
pub use dcrt_poly::{DcrtPoly, Format};
pub use error::{DcrtError, Result};
pub use gadget::{gauss_samp_gq_arb_base, GadgetVector};
pub use params::{ParamsHandle, RingParams};
pub use sampling::{seeded_rng, DiscreteGaussianSampler, Distribution};
pub use serialize::ParsedCoefficients;
pub use trapdoor::{
    gauss_samp, gauss_samp_to_file, large_sigma, spectral_bound, spectral_bound_d,
    square_mat_gauss_samp, square_mat_gauss_samp_to_file, square_mat_trapdoor_gen,
    trapdoor_gen, TrapdoorConfig, TrapdoorOutput, TrapdoorPair, DEFAULT_SIGMA,
};

#[cfg(test)]
mod tests;
