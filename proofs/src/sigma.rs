//! Pedersen commitments and the generic Fiat-Shamir sigma protocol for
//! knowledge of a discrete-log representation.
//!
//! A prover holding `w` with `statement = Σ g_i·w_i` samples fresh `ρ`,
//! sends `A = Σ g_i·ρ_i`, receives `c` and answers `z_i = ρ_i + c·w_i`.
//! The verifier checks `Σ g_i·z_i − c·statement == A`.

use ark_ec::{AffineRepr, CurveGroup, VariableBaseMSM};
use ark_ff::Field;
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use ark_std::UniformRand;
use merlin::Transcript;
use rand::{CryptoRng, RngCore};
use zeroize::Zeroize;

use crate::errors::ProofError;
use crate::transcript::TranscriptProtocol;

/// Computes `Σ generators[i]·scalars[i]`.
pub fn commit<C: AffineRepr>(
    scalars: &[C::ScalarField],
    generators: &[C],
) -> Result<C::Group, ProofError> {
    if scalars.len() != generators.len() {
        return Err(ProofError::Format(format!(
            "{} scalars for {} generators",
            scalars.len(),
            generators.len()
        )));
    }
    Ok(C::Group::msm_unchecked(generators, scalars))
}

/// Samples the per-proof randomness. Must never be reused across proofs.
pub fn sample_randomness<F: UniformRand, R: RngCore + CryptoRng>(
    n: usize,
    rng: &mut R,
) -> Vec<F> {
    (0..n).map(|_| F::rand(rng)).collect()
}

/// Computes the responses `z_i = ρ_i + c·w_i`.
pub fn respond<F: Field>(
    witness: &[F],
    randomness: &[F],
    challenge: &F,
) -> Result<Vec<F>, ProofError> {
    if witness.len() != randomness.len() {
        return Err(ProofError::Format(format!(
            "{} witness values for {} random values",
            witness.len(),
            randomness.len()
        )));
    }
    Ok(witness
        .iter()
        .zip(randomness)
        .map(|(w, r)| *r + *challenge * w)
        .collect())
}

/// Recomputes the first message `Σ g_i·z_i − c·statement`.
pub fn recompute_commitment<C: AffineRepr>(
    statement: &C,
    responses: &[C::ScalarField],
    challenge: &C::ScalarField,
    generators: &[C],
) -> Result<C::Group, ProofError> {
    Ok(commit(responses, generators)? - *statement * challenge)
}

/// Checks the recomputed first message against `declared`.
pub fn verify<C: AffineRepr>(
    statement: &C,
    responses: &[C::ScalarField],
    challenge: &C::ScalarField,
    generators: &[C],
    declared: &C,
) -> Result<(), ProofError> {
    let recomputed = recompute_commitment(statement, responses, challenge, generators)?;
    if recomputed.into_affine() != *declared {
        return Err(ProofError::VerificationError("sigma commitment mismatch"));
    }
    Ok(())
}

/// Non-interactive proof of knowledge of a representation of `statement`
/// with respect to a vector of generators.
#[derive(Clone, Debug, PartialEq, Eq, CanonicalSerialize, CanonicalDeserialize)]
pub struct SchnorrProof<C: AffineRepr> {
    pub challenge: C::ScalarField,
    pub responses: Vec<C::ScalarField>,
}

impl<C: AffineRepr> SchnorrProof<C> {
    pub fn prove<R: RngCore + CryptoRng>(
        transcript: &mut Transcript,
        generators: &[C],
        statement: &C,
        witness: &[C::ScalarField],
        rng: &mut R,
    ) -> Result<Self, ProofError> {
        if witness.len() != generators.len() {
            return Err(ProofError::format("witness and generators differ in length"));
        }
        let mut randomness = sample_randomness(witness.len(), rng);
        let commitment = commit(&randomness, generators)?.into_affine();

        Self::absorb(transcript, generators, statement, &commitment);
        let challenge = transcript.challenge_scalar(b"c");

        let responses = respond(witness, &randomness, &challenge)?;
        randomness.zeroize();
        Ok(SchnorrProof {
            challenge,
            responses,
        })
    }

    pub fn verify(
        &self,
        transcript: &mut Transcript,
        generators: &[C],
        statement: &C,
    ) -> Result<(), ProofError> {
        if self.responses.len() != generators.len() {
            return Err(ProofError::format("responses and generators differ in length"));
        }
        let commitment =
            recompute_commitment(statement, &self.responses, &self.challenge, generators)?
                .into_affine();

        Self::absorb(transcript, generators, statement, &commitment);
        let challenge: C::ScalarField = transcript.challenge_scalar(b"c");
        if challenge != self.challenge {
            return Err(ProofError::VerificationError("schnorr challenge mismatch"));
        }
        Ok(())
    }

    fn absorb(transcript: &mut Transcript, generators: &[C], statement: &C, commitment: &C) {
        transcript.sigma_domain_sep(generators.len() as u64);
        transcript.append_points(b"G", generators);
        transcript.append_point(b"Y", statement);
        transcript.append_point(b"A", commitment);
    }
}
