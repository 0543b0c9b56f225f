//! One-out-of-many proof: knowledge of `r` such that `D_j = H·r` for some
//! hidden index `j` among the commitments `D_1, .., D_n`.
//!
//! This is the linear OR-composition of Schnorr proofs. Branches other than
//! `j` are simulated with their own challenges, and the branch challenges
//! must add up to the transcript challenge.

use ark_bn254::{Fr, G1Affine, G1Projective};
use ark_ec::CurveGroup;
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use ark_std::{UniformRand, Zero};
use merlin::Transcript;
use rand::{CryptoRng, RngCore};
use zeroize::ZeroizeOnDrop;

use crate::errors::ProofError;
use crate::transcript::TranscriptProtocol;

pub struct OneOutOfManyStatement<'a> {
    pub commitments: &'a [G1Affine],
    pub base: G1Affine,
    /// Bytes the proof is bound to.
    pub message: &'a [u8],
}

#[derive(ZeroizeOnDrop)]
pub struct OneOutOfManyWitness {
    pub index: usize,
    pub randomness: Fr,
}

#[derive(Clone, Debug, PartialEq, Eq, CanonicalSerialize, CanonicalDeserialize)]
pub struct OneOutOfManyProof {
    pub challenges: Vec<Fr>,
    pub responses: Vec<Fr>,
}

impl<'a> OneOutOfManyStatement<'a> {
    fn absorb(
        &self,
        transcript: &mut Transcript,
        first_messages: &[G1Affine],
    ) -> Result<(), ProofError> {
        transcript.o2omp_domain_sep(self.commitments.len() as u64);
        transcript.validate_and_append_point(b"H", &self.base)?;
        transcript.append_points(b"D", self.commitments);
        transcript.append_message(b"msg", self.message);
        transcript.append_points(b"A", first_messages);
        Ok(())
    }

    /// `H·z − D·c`
    fn branch(&self, commitment: &G1Affine, response: &Fr, challenge: &Fr) -> G1Projective {
        self.base * response - *commitment * challenge
    }
}

impl OneOutOfManyProof {
    pub fn prove<R: RngCore + CryptoRng>(
        witness: &OneOutOfManyWitness,
        statement: &OneOutOfManyStatement,
        rng: &mut R,
    ) -> Result<Self, ProofError> {
        let n = statement.commitments.len();
        if n == 0 {
            return Err(ProofError::format("empty set of commitments"));
        }
        if witness.index >= n {
            return Err(ProofError::Format(format!(
                "index {} out of a set of {}",
                witness.index, n
            )));
        }

        let mut challenges: Vec<Fr> = (0..n).map(|_| Fr::rand(rng)).collect();
        let mut responses: Vec<Fr> = (0..n).map(|_| Fr::rand(rng)).collect();
        let rho = Fr::rand(rng);

        let first_messages: Vec<G1Projective> = (0..n)
            .map(|i| {
                if i == witness.index {
                    statement.base * rho
                } else {
                    statement.branch(&statement.commitments[i], &responses[i], &challenges[i])
                }
            })
            .collect();
        let first_messages = G1Projective::normalize_batch(&first_messages);

        let mut transcript = Transcript::new(b"zkat-o2omp");
        statement.absorb(&mut transcript, &first_messages)?;
        let challenge: Fr = transcript.challenge_scalar(b"c");

        let simulated = challenges
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != witness.index)
            .fold(Fr::zero(), |acc, (_, c)| acc + c);
        challenges[witness.index] = challenge - simulated;
        responses[witness.index] = rho + challenges[witness.index] * witness.randomness;

        Ok(OneOutOfManyProof {
            challenges,
            responses,
        })
    }

    pub fn verify(&self, statement: &OneOutOfManyStatement) -> Result<(), ProofError> {
        let n = statement.commitments.len();
        if n == 0 {
            return Err(ProofError::format("empty set of commitments"));
        }
        if self.challenges.len() != n || self.responses.len() != n {
            return Err(ProofError::format("proof does not match the set size"));
        }

        let first_messages: Vec<G1Projective> = statement
            .commitments
            .iter()
            .zip(self.responses.iter().zip(&self.challenges))
            .map(|(d, (z, c))| statement.branch(d, z, c))
            .collect();
        let first_messages = G1Projective::normalize_batch(&first_messages);

        let mut transcript = Transcript::new(b"zkat-o2omp");
        statement.absorb(&mut transcript, &first_messages)?;
        let challenge: Fr = transcript.challenge_scalar(b"c");

        let sum = self.challenges.iter().fold(Fr::zero(), |acc, c| acc + c);
        if sum != challenge {
            return Err(ProofError::VerificationError("one-out-of-many challenge mismatch"));
        }
        Ok(())
    }
}
