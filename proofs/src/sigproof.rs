//! Proof of knowledge of a Pointcheval-Sanders signature on a message
//! vector, with some messages hidden and the rest disclosed.
//!
//! The hidden messages are also committed in a Pedersen commitment and the
//! proof shows that the same values open the commitment and are signed. The
//! signature is re-randomized and its `S` component is blinded with `P·bf`,
//! which turns the verification equation into the statement
//! `T = e(S'', Q) − e(R', X + Σ_disclosed Y_i m_i)
//!    = e(R', Σ_hidden Y_i m_i + Y_h h) + e(P, Q)·bf`.

use ark_bn254::{Bn254, Fr, G1Affine, G1Projective, G2Affine, G2Projective};
use ark_ec::{pairing::Pairing, AffineRepr, CurveGroup, VariableBaseMSM};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use ark_std::UniformRand;
use merlin::Transcript;
use rand::{CryptoRng, RngCore};
use zeroize::ZeroizeOnDrop;

use crate::errors::ProofError;
use crate::pssign::{PublicKey, Signature};
use crate::sigma;
use crate::transcript::TranscriptProtocol;
use crate::Gt;

/// Public inputs of a signature proof.
#[derive(Clone, Debug)]
pub struct SigStatement {
    pub hidden_indices: Vec<usize>,
    pub disclosed_indices: Vec<usize>,
    pub disclosed: Vec<Fr>,
    /// Pedersen commitment to the hidden messages.
    pub commitment: G1Affine,
    /// One base per hidden message followed by the blinding base.
    pub pedersen: Vec<G1Affine>,
    pub p: G1Affine,
    pub q: G2Affine,
    pub pk: PublicKey,
}

#[derive(ZeroizeOnDrop)]
pub struct SigWitness {
    pub hidden: Vec<Fr>,
    #[zeroize(skip)]
    pub signature: Signature,
    pub hash: Fr,
    pub com_blinding: Fr,
}

/// First messages of the proof.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SigCommitments {
    pub com: G1Affine,
    pub sig: Gt,
}

#[derive(Clone, Debug, PartialEq, Eq, CanonicalSerialize, CanonicalDeserialize)]
pub struct SigResponses {
    pub hidden: Vec<Fr>,
    pub hash: Fr,
    pub sig_blinding: Fr,
    pub com_blinding: Fr,
}

/// Stand-alone proof carrying its own challenge.
#[derive(Clone, Debug, PartialEq, Eq, CanonicalSerialize, CanonicalDeserialize)]
pub struct SigProof {
    pub challenge: Fr,
    /// The re-randomized and blinded signature.
    pub signature: Signature,
    pub responses: SigResponses,
}

/// Prover state between the commit and respond phases.
#[derive(ZeroizeOnDrop)]
pub struct SigProverState {
    rho_hidden: Vec<Fr>,
    rho_hash: Fr,
    rho_sig_blinding: Fr,
    rho_com_blinding: Fr,
    /// Blinding factor of the obfuscated `S`.
    sig_blinding: Fr,
    #[zeroize(skip)]
    pub signature: Signature,
    #[zeroize(skip)]
    pub commitments: SigCommitments,
}

impl SigStatement {
    /// Checks that indices partition the public key and that all lengths agree.
    pub fn check(&self) -> Result<(), ProofError> {
        let n = self.hidden_indices.len() + self.disclosed_indices.len();
        if self.pk.elements.len() != n + 2 {
            return Err(ProofError::Format(format!(
                "{} hidden and {} disclosed messages for a public key of length {}",
                self.hidden_indices.len(),
                self.disclosed_indices.len(),
                self.pk.elements.len()
            )));
        }
        if self.disclosed.len() != self.disclosed_indices.len() {
            return Err(ProofError::format("disclosed values and indices differ in length"));
        }
        if self.pedersen.len() != self.hidden_indices.len() + 1 {
            return Err(ProofError::format(
                "pedersen parameters must have one base per hidden message plus one",
            ));
        }
        let mut seen = vec![false; n];
        for &i in self.hidden_indices.iter().chain(&self.disclosed_indices) {
            if i >= n || seen[i] {
                return Err(ProofError::Format(format!("invalid message index {}", i)));
            }
            seen[i] = true;
        }
        Ok(())
    }

    /// `X + Σ_disclosed Y_i·m_i`, scaled by `scale`.
    fn disclosed_part(&self, scale: &Fr) -> G2Projective {
        let mut bases = Vec::with_capacity(self.disclosed.len() + 1);
        let mut scalars = Vec::with_capacity(self.disclosed.len() + 1);
        bases.push(*self.pk.x());
        scalars.push(*scale);
        for (i, m) in self.disclosed_indices.iter().zip(&self.disclosed) {
            bases.push(*self.pk.y(*i));
            scalars.push(*scale * m);
        }
        G2Projective::msm_unchecked(&bases, &scalars)
    }

    /// `Σ_hidden Y_i·a_i + Y_h·a_h`.
    fn hidden_part(&self, hidden: &[Fr], hash: &Fr) -> G2Projective {
        let mut bases: Vec<G2Affine> = self.hidden_indices.iter().map(|i| *self.pk.y(*i)).collect();
        bases.push(*self.pk.y_hash());
        let mut scalars = hidden.to_vec();
        scalars.push(*hash);
        G2Projective::msm_unchecked(&bases, &scalars)
    }

    /// Appends the statement, the blinded signature and the first messages.
    pub fn absorb(
        &self,
        transcript: &mut Transcript,
        signature: &Signature,
        commitments: &SigCommitments,
    ) {
        transcript.sigproof_domain_sep(
            self.hidden_indices.len() as u64,
            self.disclosed_indices.len() as u64,
        );
        transcript.append_points(b"pedersen", &self.pedersen);
        transcript.append_point(b"C", &self.commitment);
        transcript.append_point(b"P", &self.p);
        transcript.append_point(b"Q", &self.q);
        transcript.append_points(b"PK", &self.pk.elements);
        for i in &self.hidden_indices {
            transcript.append_u64(b"hidden", *i as u64);
        }
        for (i, m) in self.disclosed_indices.iter().zip(&self.disclosed) {
            transcript.append_u64(b"disclosed", *i as u64);
            transcript.append_scalar(b"m", m);
        }
        transcript.append_point(b"R", &signature.r);
        transcript.append_point(b"S", &signature.s);
        transcript.append_point(b"A_com", &commitments.com);
        transcript.append_element(b"A_sig", &commitments.sig);
    }

    /// Samples randomness, blinds the signature and computes the first messages.
    pub fn commit<R: RngCore + CryptoRng>(
        &self,
        witness: &SigWitness,
        rng: &mut R,
    ) -> Result<SigProverState, ProofError> {
        self.check()?;
        if witness.hidden.len() != self.hidden_indices.len() {
            return Err(ProofError::format("witness does not match hidden indices"));
        }

        let randomized = witness.signature.randomize(rng);
        let blinding = Fr::rand(rng);
        let signature = Signature {
            r: randomized.r,
            s: (self.p * blinding + randomized.s).into_affine(),
        };

        let rho_hidden: Vec<Fr> = sigma::sample_randomness(witness.hidden.len(), rng);
        let rho_hash = Fr::rand(rng);
        let rho_sig_blinding = Fr::rand(rng);
        let rho_com_blinding = Fr::rand(rng);

        let mut com_scalars = rho_hidden.clone();
        com_scalars.push(rho_com_blinding);
        let com = sigma::commit(&com_scalars, &self.pedersen)?.into_affine();

        let sig = Bn254::multi_pairing(
            [signature.r, (self.p * rho_sig_blinding).into_affine()],
            [self.hidden_part(&rho_hidden, &rho_hash).into_affine(), self.q],
        );

        Ok(SigProverState {
            rho_hidden,
            rho_hash,
            rho_sig_blinding,
            rho_com_blinding,
            sig_blinding: blinding,
            signature,
            commitments: SigCommitments { com, sig },
        })
    }

    /// Recomputes the first messages from the responses.
    pub fn recompute(
        &self,
        signature: &Signature,
        responses: &SigResponses,
        challenge: &Fr,
    ) -> Result<SigCommitments, ProofError> {
        self.check()?;
        if responses.hidden.len() != self.hidden_indices.len() {
            return Err(ProofError::format("responses do not match hidden indices"));
        }
        if signature.r.is_zero() {
            return Err(ProofError::VerificationError("degenerate signature"));
        }

        let mut com_scalars = responses.hidden.clone();
        com_scalars.push(responses.com_blinding);
        let com = (sigma::commit(&com_scalars, &self.pedersen)? - self.commitment * challenge)
            .into_affine();

        let g2 =
            self.hidden_part(&responses.hidden, &responses.hash) + self.disclosed_part(challenge);
        let g1: G1Projective = self.p * responses.sig_blinding - signature.s * challenge;
        let sig = Bn254::multi_pairing([signature.r, g1.into_affine()], [g2.into_affine(), self.q]);

        Ok(SigCommitments { com, sig })
    }
}

impl SigProverState {
    pub fn respond(
        &self,
        witness: &SigWitness,
        challenge: &Fr,
    ) -> Result<SigResponses, ProofError> {
        Ok(SigResponses {
            hidden: sigma::respond(&witness.hidden, &self.rho_hidden, challenge)?,
            hash: self.rho_hash + *challenge * witness.hash,
            sig_blinding: self.rho_sig_blinding + *challenge * self.sig_blinding,
            com_blinding: self.rho_com_blinding + *challenge * witness.com_blinding,
        })
    }
}

impl SigProof {
    pub fn prove<R: RngCore + CryptoRng>(
        witness: &SigWitness,
        statement: &SigStatement,
        rng: &mut R,
    ) -> Result<Self, ProofError> {
        let state = statement.commit(witness, rng)?;

        let mut transcript = Transcript::new(b"zkat-sigproof");
        statement.absorb(&mut transcript, &state.signature, &state.commitments);
        let challenge = transcript.challenge_scalar(b"c");

        Ok(SigProof {
            challenge,
            signature: state.signature,
            responses: state.respond(witness, &challenge)?,
        })
    }

    pub fn verify(&self, statement: &SigStatement) -> Result<(), ProofError> {
        let commitments = statement.recompute(&self.signature, &self.responses, &self.challenge)?;

        let mut transcript = Transcript::new(b"zkat-sigproof");
        statement.absorb(&mut transcript, &self.signature, &commitments);
        let challenge: Fr = transcript.challenge_scalar(b"c");
        if challenge != self.challenge {
            return Err(ProofError::VerificationError("signature proof challenge mismatch"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generators::PedersenGens;
    use crate::pssign::{self, Signer};

    struct Fixture {
        statement: SigStatement,
        witness: SigWitness,
    }

    // signs four messages and hides the ones at `hidden`
    fn fixture(hidden: &[usize]) -> Fixture {
        let mut rng = rand::thread_rng();
        let q = pssign::default_q();
        let signer = Signer::keygen(4, &q, &mut rng);
        let messages: Vec<Fr> = (0..4).map(|_| Fr::rand(&mut rng)).collect();
        let signature = signer.sign(&messages, &mut rng).unwrap();

        let pedersen = PedersenGens::<G1Affine>::new(b"sigproof-test", hidden.len() + 1).gens;
        let p = PedersenGens::<G1Affine>::new(b"sigproof-test-P", 1).gens[0];
        let hidden_values: Vec<Fr> = hidden.iter().map(|i| messages[*i]).collect();
        let com_blinding = Fr::rand(&mut rng);
        let mut opening = hidden_values.clone();
        opening.push(com_blinding);
        let commitment = sigma::commit(&opening, &pedersen).unwrap().into_affine();

        let disclosed_indices: Vec<usize> = (0..4).filter(|i| !hidden.contains(i)).collect();
        Fixture {
            statement: SigStatement {
                hidden_indices: hidden.to_vec(),
                disclosed: disclosed_indices.iter().map(|i| messages[*i]).collect(),
                disclosed_indices,
                commitment,
                pedersen,
                p,
                q,
                pk: signer.pk.clone(),
            },
            witness: SigWitness {
                hidden: hidden_values,
                signature,
                hash: pssign::message_hash(&messages),
                com_blinding,
            },
        }
    }

    #[test]
    fn selective_disclosure_verifies() {
        let mut rng = rand::thread_rng();
        for hidden in [vec![0, 1, 2, 3], vec![1, 3], vec![2], vec![]] {
            let f = fixture(&hidden);
            let proof = SigProof::prove(&f.witness, &f.statement, &mut rng).unwrap();
            assert!(proof.verify(&f.statement).is_ok());
        }
    }

    #[test]
    fn wrong_disclosed_value_fails() {
        let mut rng = rand::thread_rng();
        let f = fixture(&[0, 2]);
        let proof = SigProof::prove(&f.witness, &f.statement, &mut rng).unwrap();

        let mut statement = f.statement.clone();
        statement.disclosed[0] += Fr::from(1u64);
        assert!(proof.verify(&statement).is_err());
    }

    #[test]
    fn wrong_commitment_fails() {
        let mut rng = rand::thread_rng();
        let f = fixture(&[1]);
        let proof = SigProof::prove(&f.witness, &f.statement, &mut rng).unwrap();

        let mut statement = f.statement.clone();
        statement.commitment =
            (statement.commitment.into_group() + statement.pedersen[0]).into_affine();
        assert!(proof.verify(&statement).is_err());
    }

    #[test]
    fn forged_signature_cannot_prove() {
        let mut rng = rand::thread_rng();
        let mut f = fixture(&[0]);
        f.witness.signature = f.witness.signature.randomize(&mut rng);
        f.witness.signature.s = (f.witness.signature.s.into_group() + f.statement.p).into_affine();
        let proof = SigProof::prove(&f.witness, &f.statement, &mut rng).unwrap();
        assert!(proof.verify(&f.statement).is_err());
    }

    #[test]
    fn length_contract_is_a_format_error() {
        let mut rng = rand::thread_rng();
        let f = fixture(&[0, 1]);

        let mut statement = f.statement.clone();
        statement.disclosed_indices.pop();
        statement.disclosed.pop();
        assert!(matches!(
            SigProof::prove(&f.witness, &statement, &mut rng),
            Err(ProofError::Format(_))
        ));

        let mut statement = f.statement.clone();
        statement.disclosed_indices[0] = 0;
        assert!(matches!(statement.check(), Err(ProofError::Format(_))));
    }

    #[test]
    fn flipped_bytes_are_rejected() {
        let mut rng = rand::thread_rng();
        let f = fixture(&[0, 3]);
        let proof = SigProof::prove(&f.witness, &f.statement, &mut rng).unwrap();
        let mut bytes = Vec::new();
        proof.serialize_compressed(&mut bytes).unwrap();

        for i in (0..bytes.len()).step_by(11) {
            let mut tampered = bytes.clone();
            tampered[i] ^= 0x04;
            if let Ok(p) = SigProof::deserialize_compressed(&tampered[..]) {
                assert!(p.verify(&f.statement).is_err());
            }
        }
    }
}
