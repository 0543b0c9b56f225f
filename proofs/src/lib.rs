pub mod util;

mod errors;
mod generators;
mod transcript;

pub mod o2omp;
pub mod pssign;
pub mod range_proof;
pub mod sigma;
pub mod sigproof;

pub use crate::errors::ProofError;
pub use crate::generators::{GeneratorsChain, PedersenGens};
pub use crate::transcript::TranscriptProtocol;

pub use ark_bn254::{Fr as Scalar, G1Affine, G2Affine};

/// Target group of the BN254 pairing, written additively.
pub type Gt = ark_ec::pairing::PairingOutput<ark_bn254::Bn254>;
