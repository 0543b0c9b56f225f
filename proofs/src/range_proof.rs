//! Range proof for token commitments `T = G0·type + G1·v + G2·r` based on
//! the decomposition of `v` in `exponent` digits of base `base`.
//!
//! Each digit `d_i` is committed as `D_i = G0·d_i + G1·s_i` and comes with a
//! proof of knowledge of a PS signature on `d_i`, issued at setup for every
//! digit value. An equality proof then shows that `Σ base^i·D_i` commits to
//! the same `v` as the token, and that all tokens of the statement share one
//! type. Everything is answered with a single challenge.

use ark_bn254::{Fr, G1Affine, G1Projective, G2Affine};
use ark_ec::{CurveGroup, VariableBaseMSM};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use ark_std::UniformRand;
use merlin::Transcript;
use rand::{CryptoRng, RngCore};
use zeroize::ZeroizeOnDrop;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::errors::ProofError;
use crate::generators::PedersenGens;
use crate::pssign::{self, PublicKey, Signature, Signer, Verifier};
use crate::sigma;
use crate::sigproof::{SigCommitments, SigProverState, SigResponses, SigStatement, SigWitness};
use crate::transcript::TranscriptProtocol;
use crate::util;

/// Parameters shared by every range proof.
#[derive(Clone, Debug, PartialEq, Eq, CanonicalSerialize, CanonicalDeserialize)]
pub struct RangeParams {
    pub p: G1Affine,
    pub q: G2Affine,
    /// PS public key for one message, so three elements.
    pub pk: PublicKey,
    /// `signatures[d]` signs the digit `d`.
    pub signatures: Vec<Signature>,
    pub base: u64,
    pub exponent: u32,
}

impl RangeParams {
    /// Generates a fresh membership key and signs every digit. The signing key
    /// is dropped on return.
    pub fn generate<R: RngCore + CryptoRng>(
        base: u64,
        exponent: u32,
        p: G1Affine,
        q: G2Affine,
        rng: &mut R,
    ) -> Result<Self, ProofError> {
        max_value(base, exponent)?;
        let signer = Signer::keygen(1, &q, rng);
        let signatures = (0..base)
            .map(|d| signer.sign(&[Fr::from(d)], rng))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(RangeParams {
            p,
            q,
            pk: signer.pk.clone(),
            signatures,
            base,
            exponent,
        })
    }

    /// `base^exponent`, the first value that cannot be proven.
    pub fn max_value(&self) -> Result<u64, ProofError> {
        max_value(self.base, self.exponent)
    }

    pub fn check(&self) -> Result<(), ProofError> {
        self.max_value()?;
        if self.pk.elements.len() != 3 {
            return Err(ProofError::format("membership public key must have three elements"));
        }
        if self.signatures.len() as u64 != self.base {
            return Err(ProofError::Format(format!(
                "{} digit signatures for base {}",
                self.signatures.len(),
                self.base
            )));
        }
        Ok(())
    }

    /// Checks every digit signature under the membership key.
    pub fn verify_signatures(&self) -> Result<(), ProofError> {
        self.check()?;
        let verifier = Verifier {
            pk: self.pk.clone(),
            q: self.q,
        };
        for (d, signature) in self.signatures.iter().enumerate() {
            verifier
                .verify(&[Fr::from(d as u64)], signature)
                .map_err(|_| ProofError::VerificationError("invalid digit signature"))?;
        }
        Ok(())
    }

    fn membership_statement(
        &self,
        pedersen: &PedersenGens<G1Affine>,
        digit: G1Affine,
    ) -> SigStatement {
        SigStatement {
            hidden_indices: vec![0],
            disclosed_indices: vec![],
            disclosed: vec![],
            commitment: digit,
            pedersen: pedersen.gens[..2].to_vec(),
            p: self.p,
            q: self.q,
            pk: self.pk.clone(),
        }
    }

    fn base_powers(&self) -> Vec<Fr> {
        util::exp_iter(Fr::from(self.base))
            .take(self.exponent as usize)
            .collect()
    }
}

fn max_value(base: u64, exponent: u32) -> Result<u64, ProofError> {
    if base < 2 {
        return Err(ProofError::format("base must be at least 2"));
    }
    if exponent < 1 {
        return Err(ProofError::format("exponent must be at least 1"));
    }
    base.checked_pow(exponent)
        .ok_or_else(|| ProofError::format("base^exponent does not fit in 64 bits"))
}

/// Public inputs: token commitments of one type.
pub struct RangeStatement<'a> {
    pub tokens: &'a [G1Affine],
    /// Type, value and blinding bases.
    pub pedersen: &'a PedersenGens<G1Affine>,
    pub params: &'a RangeParams,
}

#[derive(ZeroizeOnDrop)]
pub struct RangeWitness {
    pub token_type: Fr,
    pub values: Vec<u64>,
    pub blindings: Vec<Fr>,
}

#[derive(Clone, Debug, PartialEq, Eq, CanonicalSerialize, CanonicalDeserialize)]
pub struct MembershipProof {
    pub signature: Signature,
    pub responses: SigResponses,
}

#[derive(Clone, Debug, PartialEq, Eq, CanonicalSerialize, CanonicalDeserialize)]
pub struct TokenRangeProof {
    /// Digit commitments, least significant first.
    pub digits: Vec<G1Affine>,
    pub memberships: Vec<MembershipProof>,
    pub value: Fr,
    pub token_blinding: Fr,
    pub sum_blinding: Fr,
}

#[derive(Clone, Debug, PartialEq, Eq, CanonicalSerialize, CanonicalDeserialize)]
pub struct RangeProof {
    pub challenge: Fr,
    pub token_type: Fr,
    pub tokens: Vec<TokenRangeProof>,
}

#[derive(ZeroizeOnDrop)]
struct TokenRandomness {
    value: Fr,
    token_blinding: Fr,
    sum_blinding: Fr,
    sum_blinding_witness: Fr,
}

impl<'a> RangeStatement<'a> {
    fn check(&self) -> Result<(), ProofError> {
        self.params.check()?;
        if self.pedersen.len() != 3 {
            return Err(ProofError::format("token commitments use three generators"));
        }
        if self.tokens.is_empty() {
            return Err(ProofError::format("range proof over no tokens"));
        }
        Ok(())
    }

    fn absorb_params(&self, transcript: &mut Transcript) {
        transcript.rangeproof_domain_sep(
            self.params.base,
            self.params.exponent as u64,
            self.tokens.len() as u64,
        );
        transcript.append_points(b"pedersen", &self.pedersen.gens);
        transcript.append_point(b"P", &self.params.p);
        transcript.append_point(b"Q", &self.params.q);
        transcript.append_points(b"PK", &self.params.pk.elements);
        transcript.append_points(b"T", self.tokens);
    }

    fn absorb_equality(
        transcript: &mut Transcript,
        token_commitment: &G1Affine,
        sum_commitment: &G1Affine,
    ) {
        transcript.append_point(b"A_T", token_commitment);
        transcript.append_point(b"A_C", sum_commitment);
    }

    /// `Σ base^i·D_i`.
    fn digit_sum(&self, digits: &[G1Affine]) -> G1Projective {
        G1Projective::msm_unchecked(digits, &self.params.base_powers())
    }
}

impl RangeProof {
    pub fn prove<R: RngCore + CryptoRng>(
        witness: &RangeWitness,
        statement: &RangeStatement,
        rng: &mut R,
    ) -> Result<Self, ProofError> {
        statement.check()?;
        let m = statement.tokens.len();
        if witness.values.len() != m || witness.blindings.len() != m {
            return Err(ProofError::format("witness does not match the number of tokens"));
        }
        let max = statement.params.max_value()?;
        let exponent = statement.params.exponent as usize;
        let [g0, g1, g2] = [
            statement.pedersen.gens[0],
            statement.pedersen.gens[1],
            statement.pedersen.gens[2],
        ];

        let mut transcript = Transcript::new(b"zkat-rangeproof");
        statement.absorb_params(&mut transcript);

        let mut per_token = Vec::with_capacity(m);
        for (k, &value) in witness.values.iter().enumerate() {
            if value >= max {
                return Err(ProofError::RangeViolation { value, max });
            }
            let digits = util::digits(value, statement.params.base, exponent)
                .ok_or(ProofError::RangeViolation { value, max })?;

            let mut commitments = Vec::with_capacity(exponent);
            let mut states: Vec<(SigStatement, SigWitness, SigProverState)> =
                Vec::with_capacity(exponent);
            let mut sum_blinding_witness = Fr::from(0u64);
            for (d, power) in digits.iter().zip(statement.params.base_powers()) {
                let digit = Fr::from(*d);
                let blinding = Fr::rand(rng);
                sum_blinding_witness += power * blinding;
                let commitment = (g0 * digit + g1 * blinding).into_affine();

                let sig_statement = statement
                    .params
                    .membership_statement(statement.pedersen, commitment);
                let sig_witness = SigWitness {
                    hidden: vec![digit],
                    signature: statement.params.signatures[*d as usize],
                    hash: pssign::message_hash(&[digit]),
                    com_blinding: blinding,
                };
                let state = sig_statement.commit(&sig_witness, rng)?;
                commitments.push(commitment);
                states.push((sig_statement, sig_witness, state));
            }

            transcript.append_points(b"D", &commitments);
            for (sig_statement, _, state) in &states {
                sig_statement.absorb(&mut transcript, &state.signature, &state.commitments);
            }
            per_token.push((k, commitments, states, sum_blinding_witness));
        }

        let rho_type = Fr::rand(rng);
        let mut randomness = Vec::with_capacity(m);
        for (_, _, _, sum_blinding_witness) in &per_token {
            let r = TokenRandomness {
                value: Fr::rand(rng),
                token_blinding: Fr::rand(rng),
                sum_blinding: Fr::rand(rng),
                sum_blinding_witness: *sum_blinding_witness,
            };
            let a_t =
                sigma::commit(&[rho_type, r.value, r.token_blinding], &[g0, g1, g2])?.into_affine();
            let a_c = sigma::commit(&[r.value, r.sum_blinding], &[g0, g1])?.into_affine();
            RangeStatement::absorb_equality(&mut transcript, &a_t, &a_c);
            randomness.push(r);
        }

        let challenge: Fr = transcript.challenge_scalar(b"c");

        let mut tokens = Vec::with_capacity(m);
        for ((k, digits, states, _), r) in per_token.into_iter().zip(&randomness) {
            let memberships = states
                .iter()
                .map(|(_, sig_witness, state)| -> Result<MembershipProof, ProofError> {
                    Ok(MembershipProof {
                        signature: state.signature,
                        responses: state.respond(sig_witness, &challenge)?,
                    })
                })
                .collect::<Result<Vec<_>, ProofError>>()?;
            tokens.push(TokenRangeProof {
                digits,
                memberships,
                value: r.value + challenge * Fr::from(witness.values[k]),
                token_blinding: r.token_blinding + challenge * witness.blindings[k],
                sum_blinding: r.sum_blinding + challenge * r.sum_blinding_witness,
            });
        }

        Ok(RangeProof {
            challenge,
            token_type: rho_type + challenge * witness.token_type,
            tokens,
        })
    }

    pub fn verify(&self, statement: &RangeStatement) -> Result<(), ProofError> {
        statement.check()?;
        let exponent = statement.params.exponent as usize;
        if self.tokens.len() != statement.tokens.len() {
            return Err(ProofError::format("range proof does not match the number of tokens"));
        }
        for proof in &self.tokens {
            if proof.digits.len() != exponent || proof.memberships.len() != exponent {
                return Err(ProofError::format("range proof does not match the exponent"));
            }
        }
        let [g0, g1, g2] = [
            statement.pedersen.gens[0],
            statement.pedersen.gens[1],
            statement.pedersen.gens[2],
        ];

        let jobs: Vec<(SigStatement, &MembershipProof)> = self
            .tokens
            .iter()
            .flat_map(|proof| {
                proof.digits.iter().zip(&proof.memberships).map(|(digit, membership)| {
                    (
                        statement.params.membership_statement(statement.pedersen, *digit),
                        membership,
                    )
                })
            })
            .collect();

        #[cfg(feature = "parallel")]
        let recomputed = jobs
            .par_iter()
            .map(|(s, p)| s.recompute(&p.signature, &p.responses, &self.challenge))
            .collect::<Result<Vec<SigCommitments>, ProofError>>()?;
        #[cfg(not(feature = "parallel"))]
        let recomputed = jobs
            .iter()
            .map(|(s, p)| s.recompute(&p.signature, &p.responses, &self.challenge))
            .collect::<Result<Vec<SigCommitments>, ProofError>>()?;

        let mut transcript = Transcript::new(b"zkat-rangeproof");
        statement.absorb_params(&mut transcript);
        for (k, proof) in self.tokens.iter().enumerate() {
            transcript.append_points(b"D", &proof.digits);
            for i in 0..exponent {
                let (sig_statement, membership) = &jobs[k * exponent + i];
                sig_statement.absorb(
                    &mut transcript,
                    &membership.signature,
                    &recomputed[k * exponent + i],
                );
            }
        }

        for (token, proof) in statement.tokens.iter().zip(&self.tokens) {
            let a_t = sigma::recompute_commitment(
                token,
                &[self.token_type, proof.value, proof.token_blinding],
                &self.challenge,
                &[g0, g1, g2],
            )?
            .into_affine();
            let sum = statement.digit_sum(&proof.digits).into_affine();
            let a_c = sigma::recompute_commitment(
                &sum,
                &[proof.value, proof.sum_blinding],
                &self.challenge,
                &[g0, g1],
            )?
            .into_affine();
            RangeStatement::absorb_equality(&mut transcript, &a_t, &a_c);
        }

        let challenge: Fr = transcript.challenge_scalar(b"c");
        if challenge != self.challenge {
            return Err(ProofError::VerificationError("range proof challenge mismatch"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_ec::AffineRepr;

    struct Fixture {
        pedersen: PedersenGens<G1Affine>,
        params: RangeParams,
    }

    fn fixture(base: u64, exponent: u32) -> Fixture {
        let mut rng = rand::thread_rng();
        let pedersen = PedersenGens::<G1Affine>::new(b"range-test", 3);
        let p = PedersenGens::<G1Affine>::new(b"range-test-P", 1).gens[0];
        Fixture {
            pedersen,
            params: RangeParams::generate(base, exponent, p, pssign::default_q(), &mut rng)
                .unwrap(),
        }
    }

    fn tokens(f: &Fixture, witness: &RangeWitness) -> Vec<G1Affine> {
        witness
            .values
            .iter()
            .zip(&witness.blindings)
            .map(|(v, r)| {
                f.pedersen
                    .commit(&[witness.token_type, Fr::from(*v), *r])
                    .unwrap()
            })
            .collect()
    }

    fn witness(values: &[u64]) -> RangeWitness {
        let mut rng = rand::thread_rng();
        RangeWitness {
            token_type: util::hash_to_scalar(b"ABC"),
            values: values.to_vec(),
            blindings: values.iter().map(|_| Fr::rand(&mut rng)).collect(),
        }
    }

    #[test]
    fn values_in_range_verify() {
        let mut rng = rand::thread_rng();
        let f = fixture(16, 2);
        let w = witness(&[0, 15, 16, 255]);
        let tokens = tokens(&f, &w);
        let statement = RangeStatement {
            tokens: &tokens,
            pedersen: &f.pedersen,
            params: &f.params,
        };
        let proof = RangeProof::prove(&w, &statement, &mut rng).unwrap();
        assert!(proof.verify(&statement).is_ok());
    }

    #[test]
    fn out_of_range_is_refused() {
        let mut rng = rand::thread_rng();
        let f = fixture(16, 2);
        let w = witness(&[256]);
        let tokens = tokens(&f, &w);
        let statement = RangeStatement {
            tokens: &tokens,
            pedersen: &f.pedersen,
            params: &f.params,
        };
        assert!(matches!(
            RangeProof::prove(&w, &statement, &mut rng),
            Err(ProofError::RangeViolation { value: 256, max: 256 })
        ));
    }

    #[test]
    fn proof_is_bound_to_the_token() {
        let mut rng = rand::thread_rng();
        let f = fixture(16, 2);
        let w = witness(&[42]);
        let tokens = tokens(&f, &w);
        let statement = RangeStatement {
            tokens: &tokens,
            pedersen: &f.pedersen,
            params: &f.params,
        };
        let proof = RangeProof::prove(&w, &statement, &mut rng).unwrap();

        let other = self::tokens(&f, &witness(&[42]));
        let statement = RangeStatement {
            tokens: &other,
            pedersen: &f.pedersen,
            params: &f.params,
        };
        assert!(proof.verify(&statement).is_err());
    }

    #[test]
    fn tokens_of_different_types_fail() {
        let mut rng = rand::thread_rng();
        let f = fixture(16, 2);
        let w = witness(&[3, 4]);
        let mut tokens = tokens(&f, &w);
        let w2 = RangeWitness {
            token_type: util::hash_to_scalar(b"XYZ"),
            values: vec![4],
            blindings: vec![w.blindings[1]],
        };
        tokens[1] = self::tokens(&f, &w2)[0];
        let statement = RangeStatement {
            tokens: &tokens,
            pedersen: &f.pedersen,
            params: &f.params,
        };
        let proof = RangeProof::prove(&w, &statement, &mut rng).unwrap();
        assert!(proof.verify(&statement).is_err());
    }

    #[test]
    fn invalid_params_are_format_errors() {
        let mut rng = rand::thread_rng();
        let q = pssign::default_q();
        let p = G1Affine::generator();
        assert!(matches!(RangeParams::generate(1, 2, p, q, &mut rng), Err(ProofError::Format(_))));
        assert!(matches!(RangeParams::generate(10, 0, p, q, &mut rng), Err(ProofError::Format(_))));
        assert!(matches!(RangeParams::generate(2, 64, p, q, &mut rng), Err(ProofError::Format(_))));
    }

    #[test]
    fn flipped_bytes_are_rejected() {
        let mut rng = rand::thread_rng();
        let f = fixture(4, 2);
        let w = witness(&[9]);
        let tokens = tokens(&f, &w);
        let statement = RangeStatement {
            tokens: &tokens,
            pedersen: &f.pedersen,
            params: &f.params,
        };
        let proof = RangeProof::prove(&w, &statement, &mut rng).unwrap();
        let mut bytes = Vec::new();
        proof.serialize_compressed(&mut bytes).unwrap();

        for i in (0..bytes.len()).step_by(29) {
            let mut tampered = bytes.clone();
            tampered[i] ^= 0x10;
            if let Ok(p) = RangeProof::deserialize_compressed(&tampered[..]) {
                assert!(p.verify(&statement).is_err());
            }
        }
    }
}
